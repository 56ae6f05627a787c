//! Still image source.
//!
//! Serves one decoded image from disk on every read. Useful for replaying a
//! known shelf photo through the live loop without a camera attached.

use anyhow::{anyhow, Context, Result};
use std::path::{Path, PathBuf};

use super::decode_rgb;
use crate::error::LiveResult;
use crate::frame::{FrameRead, FrameSource, RasterFrame};

pub struct StillImageSource {
    path: PathBuf,
    pixels: Vec<u8>,
    width: u32,
    height: u32,
}

impl StillImageSource {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let bytes =
            std::fs::read(&path).with_context(|| format!("read image {}", path.display()))?;
        let (pixels, width, height) = decode_rgb(&bytes)?;
        if width == 0 || height == 0 {
            return Err(anyhow!("image {} has no pixels", path.display()));
        }
        log::info!(
            "StillImageSource: loaded {} ({}x{})",
            path.display(),
            width,
            height
        );
        Ok(Self {
            path,
            pixels,
            width,
            height,
        })
    }
}

impl FrameSource for StillImageSource {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    fn current_frame(&mut self) -> LiveResult<FrameRead> {
        Ok(FrameRead::Ready(RasterFrame::new(
            self.pixels.clone(),
            self.width,
            self.height,
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{Encoder, JpegEncoder};

    #[test]
    fn serves_decoded_image_on_every_read() {
        let frame = RasterFrame::new(vec![200u8; 20 * 10 * 3], 20, 10);
        let encoded = JpegEncoder::default().encode(&frame, "shelf.jpg").unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shelf.jpg");
        std::fs::write(&path, &encoded.bytes).unwrap();

        let mut source = StillImageSource::open(&path).expect("open");
        for _ in 0..2 {
            match source.current_frame().unwrap() {
                FrameRead::Ready(frame) => {
                    assert_eq!((frame.width, frame.height), (20, 10));
                }
                FrameRead::NotReady => panic!("still image is always ready"),
            }
        }
    }

    #[test]
    fn decodes_png_stills() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shelf.png");
        image::RgbImage::from_pixel(12, 7, image::Rgb([10, 200, 30]))
            .save(&path)
            .unwrap();

        let mut source = crate::ingest::open_source(path.to_str().unwrap()).expect("open png");
        match source.current_frame().unwrap() {
            FrameRead::Ready(frame) => {
                assert_eq!((frame.width, frame.height), (12, 7));
                assert_eq!(&frame.pixels()[..3], &[10, 200, 30]);
            }
            FrameRead::NotReady => panic!("still image is always ready"),
        }
    }

    #[test]
    fn rejects_non_image_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, b"not an image").unwrap();
        assert!(StillImageSource::open(&path).is_err());
    }
}
