//! Single-image recognition: upload a file (or one captured frame), show the
//! top prediction with its overlay, and optionally file a review task.

use anyhow::{anyhow, Context, Result};
use std::path::Path;

use crate::frame::{frame_file_name, EncodedImage, Encoder, FrameRead, FrameSource};
use crate::overlay::{ImageLayout, OverlayRect};
use crate::predict::{InferenceClient, Prediction, PredictionBatch};
use crate::review::TaskCreate;

/// File name prefix for frames captured on demand.
pub const CAPTURE_FILE_PREFIX: &str = "webcam-capture";

/// Result of recognizing one image.
#[derive(Clone, Debug)]
pub struct RecognitionReport {
    pub image_name: String,
    pub batch: PredictionBatch,
    /// Pixel dimensions of the uploaded image, when it could be decoded.
    pub natural_size: Option<(u32, u32)>,
}

impl RecognitionReport {
    pub fn top(&self) -> Option<&Prediction> {
        self.batch.top()
    }

    /// Overlay for the top prediction when the image is rendered at
    /// `rendered` display units.
    pub fn overlay(&self, rendered: (f64, f64)) -> Option<OverlayRect> {
        let (width, height) = self.natural_size?;
        let mut layout = ImageLayout::new();
        layout.image_loaded((f64::from(width), f64::from(height)), rendered);
        layout.overlay(self.top().and_then(|top| top.bbox.as_ref()))
    }

    pub fn review_task(&self) -> Result<TaskCreate> {
        TaskCreate::from_top(&self.batch, Some(&self.image_name))
    }
}

/// Read an image from disk for upload under its own file name.
pub fn load_image(path: &Path) -> Result<EncodedImage> {
    let bytes = std::fs::read(path).with_context(|| format!("read image {}", path.display()))?;
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .ok_or_else(|| anyhow!("{} has no file name", path.display()))?;
    Ok(EncodedImage::from_file_bytes(bytes, file_name))
}

/// Grab one frame from `source` as a JPEG named `webcam-capture-<millis>.jpg`.
pub fn capture_still(source: &mut dyn FrameSource, encoder: &dyn Encoder) -> Result<EncodedImage> {
    let frame = match source.current_frame()? {
        FrameRead::Ready(frame) if !frame.is_empty() => frame,
        _ => return Err(anyhow!("camera {} is not streaming yet", source.describe())),
    };
    Ok(encoder.encode(&frame, &frame_file_name(CAPTURE_FILE_PREFIX))?)
}

/// Upload `image` and collect the predictions.
pub fn recognize(client: &InferenceClient, image: &EncodedImage) -> Result<RecognitionReport> {
    let batch = client.predict_once(image)?;
    let natural_size = match image::load_from_memory(&image.bytes) {
        Ok(decoded) => Some((decoded.width(), decoded.height())),
        Err(err) => {
            log::warn!(
                "{}: cannot read image size, no overlay will be drawn: {}",
                image.file_name,
                err
            );
            None
        }
    };
    Ok(RecognitionReport {
        image_name: image.file_name.clone(),
        batch,
        natural_size,
    })
}

pub fn recognize_file(client: &InferenceClient, path: &Path) -> Result<RecognitionReport> {
    let image = load_image(path)?;
    recognize(client, &image)
}

/// Review task for the top prediction of `report`.
pub fn review_task_for(report: &RecognitionReport) -> Result<TaskCreate> {
    report.review_task()
}
