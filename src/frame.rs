//! Frame capture seam.
//!
//! This module isolates everything camera-shaped behind two narrow traits so
//! the capture, predict and overlay logic can run without a real camera:
//!
//! - `FrameSource`: produces the current `RasterFrame`, or reports that the
//!   source is not streaming yet.
//! - `Encoder`: turns a `RasterFrame` into an upload-ready `EncodedImage`.
//!
//! A `RasterFrame` lives for exactly one capture-predict cycle. Sources own
//! the underlying device and release it when dropped.

use std::time::{Instant, SystemTime, UNIX_EPOCH};

use image::codecs::jpeg::JpegEncoder as ImageJpegEncoder;
use image::ExtendedColorType;

use crate::error::{LiveError, LiveResult};

/// JPEG quality used for live and captured frames.
pub const DEFAULT_JPEG_QUALITY: u8 = 90;

/// Bytes per pixel of a `RasterFrame` (packed RGB8).
pub const RGB_CHANNELS: usize = 3;

// ----------------------------------------------------------------------------
// RasterFrame
// ----------------------------------------------------------------------------

/// Transient RGB8 raster captured from a live source.
pub struct RasterFrame {
    pixels: Vec<u8>,
    pub width: u32,
    pub height: u32,
    captured_at: Instant,
}

impl RasterFrame {
    pub fn new(pixels: Vec<u8>, width: u32, height: u32) -> Self {
        Self {
            pixels,
            width,
            height,
            captured_at: Instant::now(),
        }
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// A zero-sized frame means the source has not started streaming.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn age_ms(&self) -> u128 {
        self.captured_at.elapsed().as_millis()
    }

    fn expected_len(&self) -> usize {
        self.width as usize * self.height as usize * RGB_CHANNELS
    }
}

impl std::fmt::Debug for RasterFrame {
    // Pixel content stays out of logs.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RasterFrame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.pixels.len())
            .finish()
    }
}

/// Outcome of reading the current frame.
#[derive(Debug)]
pub enum FrameRead {
    Ready(RasterFrame),
    /// Source is warming up or absent. The cycle is skipped silently.
    NotReady,
}

/// A live video source.
///
/// Implementations own their device exclusively; dropping the source
/// releases it.
pub trait FrameSource: Send {
    /// Short identifier for logs.
    fn describe(&self) -> String;

    /// Read the current frame. Sources that report zero dimensions must be
    /// mapped to `FrameRead::NotReady` by the caller or the source itself.
    fn current_frame(&mut self) -> LiveResult<FrameRead>;
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn describe(&self) -> String {
        (**self).describe()
    }

    fn current_frame(&mut self) -> LiveResult<FrameRead> {
        (**self).current_frame()
    }
}

// ----------------------------------------------------------------------------
// EncodedImage / Encoder
// ----------------------------------------------------------------------------

/// Upload-ready image bytes with the name they are submitted under.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncodedImage {
    pub bytes: Vec<u8>,
    pub file_name: String,
    pub content_type: String,
}

impl EncodedImage {
    pub fn jpeg(bytes: Vec<u8>, file_name: impl Into<String>) -> Self {
        Self {
            bytes,
            file_name: file_name.into(),
            content_type: "image/jpeg".to_string(),
        }
    }

    /// Guess the content type from the file extension; unknown types are
    /// sent as octet streams and left to the inference service.
    pub fn from_file_bytes(bytes: Vec<u8>, file_name: impl Into<String>) -> Self {
        let file_name = file_name.into();
        let content_type = content_type_for(&file_name).to_string();
        Self {
            bytes,
            file_name,
            content_type,
        }
    }
}

fn content_type_for(file_name: &str) -> &'static str {
    let ext = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "webp" => "image/webp",
        "gif" => "image/gif",
        "bmp" => "image/bmp",
        _ => "application/octet-stream",
    }
}

/// Rasterizes a frame into an upload-ready image.
pub trait Encoder: Send {
    fn encode(&self, frame: &RasterFrame, file_name: &str) -> LiveResult<EncodedImage>;
}

/// JPEG encoder backed by the `image` crate.
#[derive(Clone, Debug)]
pub struct JpegEncoder {
    quality: u8,
}

impl JpegEncoder {
    pub fn new(quality: u8) -> Self {
        Self {
            quality: quality.clamp(1, 100),
        }
    }

    pub fn quality(&self) -> u8 {
        self.quality
    }
}

impl Default for JpegEncoder {
    fn default() -> Self {
        Self::new(DEFAULT_JPEG_QUALITY)
    }
}

impl Encoder for JpegEncoder {
    fn encode(&self, frame: &RasterFrame, file_name: &str) -> LiveResult<EncodedImage> {
        if frame.is_empty() {
            return Err(LiveError::Capture("frame has no pixels".to_string()));
        }
        if frame.pixels().len() != frame.expected_len() {
            return Err(LiveError::Capture(format!(
                "raster is {} bytes, expected {} for {}x{}",
                frame.pixels().len(),
                frame.expected_len(),
                frame.width,
                frame.height
            )));
        }
        let mut bytes = Vec::new();
        ImageJpegEncoder::new_with_quality(&mut bytes, self.quality)
            .encode(
                frame.pixels(),
                frame.width,
                frame.height,
                ExtendedColorType::Rgb8,
            )
            .map_err(|e| LiveError::Capture(e.to_string()))?;
        if bytes.is_empty() {
            return Err(LiveError::Capture("encoder produced no data".to_string()));
        }
        Ok(EncodedImage::jpeg(bytes, file_name))
    }
}

/// File name for an uploaded frame, e.g. `webcam-live-1700000000000.jpg`.
pub fn frame_file_name(prefix: &str) -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0);
    format!("{prefix}-{millis}.jpg")
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
