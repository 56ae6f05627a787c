//! Inference service client and prediction types.
//!
//! The inference service accepts one image as a multipart upload and answers
//! with an ordered list of predictions. The first prediction is the "top"
//! one; an empty list is a valid answer meaning nothing was recognized.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{LiveError, LiveResult};
use crate::frame::EncodedImage;
use crate::http::{ServiceClient, TransportFailure};
use crate::live::CancelToken;

/// Multipart field the inference service reads the image from.
pub const UPLOAD_FIELD: &str = "file";

/// Axis-aligned box in source-image pixel coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub label: String,
    /// 0..1
    pub confidence: f64,
    #[serde(rename = "box", default, skip_serializing_if = "Option::is_none")]
    pub bbox: Option<BoundingBox>,
}

impl Prediction {
    /// Confidence as a percentage with one decimal, e.g. `91.0`.
    pub fn confidence_pct(&self) -> String {
        format_confidence(self.confidence)
    }
}

/// Ordered predictions for one image.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PredictionBatch {
    #[serde(default)]
    pub predictions: Vec<Prediction>,
}

impl PredictionBatch {
    pub fn top(&self) -> Option<&Prediction> {
        self.predictions.first()
    }

    pub fn is_empty(&self) -> bool {
        self.predictions.is_empty()
    }
}

/// `0.912` -> `"91.2"`.
pub fn format_confidence(confidence: f64) -> String {
    format!("{:.1}", confidence * 100.0)
}

/// Something that turns an image into predictions.
///
/// Implementations block until the answer arrives. They should check the
/// cancel token before doing expensive work and return `LiveError::Cancelled`
/// when it is set; the live session discards results of cancelled cycles
/// either way.
pub trait Predictor: Send + Sync {
    fn predict(&self, image: &EncodedImage, cancel: &CancelToken) -> LiveResult<PredictionBatch>;
}

/// HTTP client for `POST {inference}/predict`.
#[derive(Clone, Debug)]
pub struct InferenceClient {
    client: ServiceClient,
}

impl InferenceClient {
    pub fn new(base_url: &str, path: &str, timeout: Duration) -> anyhow::Result<Self> {
        Ok(Self {
            client: ServiceClient::new(base_url, path, timeout)?,
        })
    }

    /// Upload without a cancellation scope (single-image recognition).
    pub fn predict_once(&self, image: &EncodedImage) -> LiveResult<PredictionBatch> {
        self.predict(image, &CancelToken::new())
    }
}

impl Predictor for InferenceClient {
    fn predict(&self, image: &EncodedImage, cancel: &CancelToken) -> LiveResult<PredictionBatch> {
        if cancel.is_cancelled() {
            return Err(LiveError::Cancelled);
        }
        let reply = self
            .client
            .post_file("predict", UPLOAD_FIELD, image)
            .map_err(|err| match err.downcast_ref::<TransportFailure>() {
                Some(failure) => LiveError::PredictionFailed(failure.0.clone()),
                None => LiveError::PredictionFailed(format!("{err:#}")),
            })?;
        if cancel.is_cancelled() {
            return Err(LiveError::Cancelled);
        }
        if !reply.is_success() {
            return Err(LiveError::PredictionStatus(reply.status));
        }
        reply
            .json::<PredictionBatch>()
            .map_err(|e| LiveError::PredictionFailed(format!("{e:#}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_predictions_with_and_without_box() {
        let batch: PredictionBatch = serde_json::from_str(
            r#"{"predictions":[
                {"label":"apple","confidence":0.91,"box":{"x":10,"y":20,"w":100,"h":80}},
                {"label":"pear","confidence":0.4,"box":null},
                {"label":"plum","confidence":0.2}
            ]}"#,
        )
        .expect("decode");

        let top = batch.top().expect("top");
        assert_eq!(top.label, "apple");
        assert_eq!(
            top.bbox,
            Some(BoundingBox {
                x: 10.0,
                y: 20.0,
                w: 100.0,
                h: 80.0
            })
        );
        assert_eq!(batch.predictions[1].bbox, None);
        assert_eq!(batch.predictions[2].bbox, None);
    }

    #[test]
    fn empty_batch_has_no_top() {
        let batch: PredictionBatch = serde_json::from_str(r#"{"predictions":[]}"#).unwrap();
        assert!(batch.is_empty());
        assert!(batch.top().is_none());
    }

    #[test]
    fn formats_confidence_with_one_decimal() {
        assert_eq!(format_confidence(0.91), "91.0");
        assert_eq!(format_confidence(0.1234), "12.3");
        assert_eq!(format_confidence(1.0), "100.0");
    }

    #[test]
    fn cancelled_token_short_circuits() {
        let client =
            InferenceClient::new("http://127.0.0.1:9", "/api/inference", Duration::from_millis(50))
                .unwrap();
        let token = CancelToken::new();
        token.cancel();
        let image = EncodedImage::jpeg(vec![1, 2, 3], "x.jpg");
        assert_eq!(client.predict(&image, &token), Err(LiveError::Cancelled));
    }
}
