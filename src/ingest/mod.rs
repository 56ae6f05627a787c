//! Live frame sources.
//!
//! This module provides the camera backends the live session can own:
//! - Synthetic frames (`stub://`, testing and demos)
//! - HTTP camera endpoints: MJPEG streams or single JPEG snapshots
//! - Local still images (a file path or `file://` URL)
//!
//! All sources implement `FrameSource` and produce `RasterFrame` instances.
//! A source is acquired by `open_source` and released when dropped; the live
//! session holds it exclusively for as long as it is attached.

pub mod http;
pub mod still;
pub mod synthetic;

use anyhow::{anyhow, Context, Result};
use url::Url;

pub use http::{HttpCameraConfig, HttpCameraSource};
pub use still::StillImageSource;
pub use synthetic::{SyntheticConfig, SyntheticSource};

use crate::frame::FrameSource;

/// Open a frame source for `uri`, dispatching on its scheme.
pub fn open_source(uri: &str) -> Result<Box<dyn FrameSource>> {
    let uri = uri.trim();
    if uri.is_empty() {
        return Err(anyhow!("frame source uri is empty"));
    }
    if uri.starts_with("stub://") {
        let config = SyntheticConfig::from_uri(uri)?;
        return Ok(Box::new(SyntheticSource::new(config)));
    }
    if !uri.contains("://") {
        return Ok(Box::new(StillImageSource::open(uri)?));
    }

    let url = Url::parse(uri).with_context(|| format!("parse frame source uri {uri}"))?;
    match url.scheme() {
        "http" | "https" => {
            let mut source = HttpCameraSource::new(HttpCameraConfig {
                url: uri.to_string(),
                ..HttpCameraConfig::default()
            });
            source.connect()?;
            Ok(Box::new(source))
        }
        "file" => {
            let path = url
                .to_file_path()
                .map_err(|_| anyhow!("file uri {uri} is not a local path"))?;
            Ok(Box::new(StillImageSource::open(path)?))
        }
        other => Err(anyhow!(
            "unsupported frame source scheme '{}'; expected stub, http(s), file or a local path",
            other
        )),
    }
}

/// Decode an encoded image (JPEG, PNG, ...) into a packed RGB8 raster.
pub(crate) fn decode_rgb(bytes: &[u8]) -> Result<(Vec<u8>, u32, u32)> {
    let image = image::load_from_memory(bytes).context("decode image")?;
    let rgb = image.into_rgb8();
    let (width, height) = rgb.dimensions();
    Ok((rgb.into_raw(), width, height))
}
