//! Synthetic frame source (`stub://`).
//!
//! Generates a moving gradient so consecutive frames differ. An optional
//! warm-up count makes the first reads report a zero-sized frame, the same
//! way a camera that has been opened but not started streaming does.

use anyhow::{anyhow, Result};
use url::Url;

use crate::error::LiveResult;
use crate::frame::{FrameRead, FrameSource, RasterFrame, RGB_CHANNELS};

const DEFAULT_WIDTH: u32 = 640;
const DEFAULT_HEIGHT: u32 = 480;

/// Configuration for a synthetic source.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SyntheticConfig {
    pub uri: String,
    pub width: u32,
    pub height: u32,
    /// Reads that report not-ready before frames start.
    pub warmup_reads: u32,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            uri: "stub://camera".to_string(),
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            warmup_reads: 0,
        }
    }
}

impl SyntheticConfig {
    /// Parse `stub://<name>?width=W&height=H&warmup=N`.
    pub fn from_uri(uri: &str) -> Result<Self> {
        let url = Url::parse(uri).map_err(|e| anyhow!("invalid stub uri {}: {}", uri, e))?;
        let mut config = Self {
            uri: uri.to_string(),
            ..Self::default()
        };
        for (key, value) in url.query_pairs() {
            let parsed: u32 = value
                .parse()
                .map_err(|_| anyhow!("stub uri parameter {} must be an integer", key))?;
            match key.as_ref() {
                "width" => config.width = parsed,
                "height" => config.height = parsed,
                "warmup" => config.warmup_reads = parsed,
                other => return Err(anyhow!("unknown stub uri parameter '{}'", other)),
            }
        }
        if config.width == 0 || config.height == 0 {
            return Err(anyhow!("stub frame dimensions must be positive"));
        }
        Ok(config)
    }
}

/// Synthetic source for tests and demos.
pub struct SyntheticSource {
    config: SyntheticConfig,
    reads: u64,
    frame_count: u64,
}

impl SyntheticSource {
    pub fn new(config: SyntheticConfig) -> Self {
        log::info!(
            "SyntheticSource: opened {} ({}x{})",
            config.uri,
            config.width,
            config.height
        );
        Self {
            config,
            reads: 0,
            frame_count: 0,
        }
    }

    pub fn frames_captured(&self) -> u64 {
        self.frame_count
    }

    fn generate_pixels(&self) -> Vec<u8> {
        let width = self.config.width as usize;
        let height = self.config.height as usize;
        let shift = self.frame_count as usize;
        let mut pixels = Vec::with_capacity(width * height * RGB_CHANNELS);
        for y in 0..height {
            for x in 0..width {
                pixels.push(((x + shift) % 256) as u8);
                pixels.push(((y + shift / 2) % 256) as u8);
                pixels.push(((x + y) % 256) as u8);
            }
        }
        pixels
    }
}

impl FrameSource for SyntheticSource {
    fn describe(&self) -> String {
        self.config.uri.clone()
    }

    fn current_frame(&mut self) -> LiveResult<FrameRead> {
        self.reads += 1;
        if self.reads <= u64::from(self.config.warmup_reads) {
            return Ok(FrameRead::NotReady);
        }
        self.frame_count += 1;
        Ok(FrameRead::Ready(RasterFrame::new(
            self.generate_pixels(),
            self.config.width,
            self.config.height,
        )))
    }
}

impl Drop for SyntheticSource {
    fn drop(&mut self) {
        log::debug!(
            "SyntheticSource: released {} after {} frames",
            self.config.uri,
            self.frame_count
        );
    }
}
