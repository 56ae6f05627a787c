//! Vision checkout operator console.
//!
//! Library behind the `vbic` and `vbic_live` binaries. It watches the
//! checkout backends and drives live recognition from a camera:
//!
//! - `live`: the capture-predict loop. At most one prediction is in flight,
//!   results are discarded once their cycle is cancelled, and the camera is
//!   held only while a session is active.
//! - `overlay`: maps model-space bounding boxes onto the displayed image.
//! - `ingest`: frame sources (synthetic, HTTP camera, still image).
//! - `predict`, `recognize`: inference client and single-image recognition.
//! - `health`, `review`, `tools`: service probes, review queue, assistant tools.
//!
//! # Module Structure
//!
//! - `frame`: raw frames, JPEG encoding, upload payloads
//! - `http`: shared blocking HTTP client for the backend services
//! - `config`: file and environment configuration
//! - `ui`: terminal rendering for the binaries

use anyhow::{anyhow, Result};
use std::sync::OnceLock;

pub mod config;
pub mod error;
pub mod frame;
pub mod health;
pub mod http;
pub mod ingest;
pub mod live;
pub mod locale;
pub mod overlay;
pub mod predict;
pub mod recognize;
pub mod review;
pub mod tools;
pub mod ui;

pub use config::ConsoleConfig;
pub use error::{LiveError, LiveResult};
pub use frame::{EncodedImage, Encoder, FrameRead, FrameSource, JpegEncoder, RasterFrame};
pub use health::{HealthPoller, ServiceEndpoint, ServiceHealth};
pub use live::{
    CancelToken, CycleOutcome, LiveHandle, LiveRunner, LiveSession, LiveSessionState,
    LiveSnapshot,
};
pub use locale::Language;
pub use overlay::{DisplayMapping, ImageLayout, OverlayRect};
pub use predict::{BoundingBox, InferenceClient, Prediction, PredictionBatch, Predictor};
pub use review::{ReviewClient, ReviewTask, TaskCreate, TaskPage};
pub use tools::{ToolInfo, ToolsClient};

/// Check a service key against the allowlist `^[a-z0-9-]{1,64}$`
/// (case-insensitive).
pub fn validate_service_key(key: &str) -> Result<()> {
    static SERVICE_KEY_RE: OnceLock<regex::Regex> = OnceLock::new();
    let re = SERVICE_KEY_RE.get_or_init(|| {
        regex::Regex::new(r"^[a-z0-9-]{1,64}$").expect("service key pattern is valid")
    });

    if !re.is_match(&key.to_lowercase()) {
        return Err(anyhow!(
            "service key {:?} must match ^[a-z0-9-]{{1,64}}$",
            key
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_keys() {
        assert!(validate_service_key("review-tasks").is_ok());
        assert!(validate_service_key("Inference").is_ok());
        assert!(validate_service_key("").is_err());
        assert!(validate_service_key("review tasks").is_err());
        assert!(validate_service_key("../etc").is_err());
        assert!(validate_service_key(&"a".repeat(65)).is_err());
    }
}
