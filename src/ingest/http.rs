//! HTTP camera source.
//!
//! This module provides `HttpCameraSource` for cameras that expose frames
//! over HTTP, either as a multipart MJPEG stream or as a JPEG snapshot
//! endpoint that returns one image per request.
//!
//! The source is responsible for:
//! - Connecting to the stream and detecting which flavor it is
//! - Splitting MJPEG streams into individual JPEGs
//! - Decoding JPEG frames in-memory
//!
//! Dropping the source closes the underlying connection.

use anyhow::{anyhow, Context, Result};
use std::io::Read;
use std::time::{Duration, Instant};

use super::decode_rgb;
use crate::error::{LiveError, LiveResult};
use crate::frame::{FrameRead, FrameSource, RasterFrame};

const MAX_JPEG_BYTES: usize = 5 * 1024 * 1024;
const READ_CHUNK_BYTES: usize = 8192;

/// Configuration for an HTTP camera.
#[derive(Clone, Debug)]
pub struct HttpCameraConfig {
    /// Stream or snapshot URL.
    pub url: String,
    /// Timeout applied to connecting, to each stream read and to each
    /// snapshot request. A stalled stream fails the cycle instead of
    /// blocking it.
    pub timeout: Duration,
}

impl Default for HttpCameraConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:81/stream".to_string(),
            timeout: Duration::from_secs(5),
        }
    }
}

/// HTTP MJPEG/JPEG camera source.
pub struct HttpCameraSource {
    config: HttpCameraConfig,
    agent: ureq::Agent,
    stream: Option<HttpStream>,
    connected_at: Option<Instant>,
    frame_count: u64,
}

enum HttpStream {
    Mjpeg(MjpegStream),
    Snapshot,
}

impl HttpCameraSource {
    pub fn new(config: HttpCameraConfig) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(config.timeout)
            .timeout_read(config.timeout)
            .build();
        Self {
            config,
            agent,
            stream: None,
            connected_at: None,
            frame_count: 0,
        }
    }

    /// Connect to the camera and detect the stream flavor.
    pub fn connect(&mut self) -> Result<()> {
        let response = self
            .agent
            .get(&self.config.url)
            .call()
            .with_context(|| format!("connect to camera {}", self.config.url))?;
        let content_type = response.header("Content-Type").unwrap_or("");
        if content_type.to_lowercase().contains("multipart") {
            log::info!("HttpCameraSource: {} is an MJPEG stream", self.config.url);
            self.stream = Some(HttpStream::Mjpeg(MjpegStream::new(response.into_reader())));
        } else {
            log::info!("HttpCameraSource: {} serves snapshots", self.config.url);
            self.stream = Some(HttpStream::Snapshot);
        }
        self.connected_at = Some(Instant::now());
        Ok(())
    }

    pub fn frames_captured(&self) -> u64 {
        self.frame_count
    }

    fn next_jpeg(&mut self) -> Result<Vec<u8>> {
        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| anyhow!("camera not connected; call connect() first"))?;
        match stream {
            HttpStream::Mjpeg(stream) => stream.read_next_jpeg(),
            HttpStream::Snapshot => fetch_snapshot(&self.agent, &self.config),
        }
    }
}

impl FrameSource for HttpCameraSource {
    fn describe(&self) -> String {
        self.config.url.clone()
    }

    fn current_frame(&mut self) -> LiveResult<FrameRead> {
        if self.stream.is_none() {
            return Ok(FrameRead::NotReady);
        }
        let jpeg = self
            .next_jpeg()
            .map_err(|e| LiveError::Capture(format!("{e:#}")))?;
        let (pixels, width, height) =
            decode_rgb(&jpeg).map_err(|e| LiveError::Capture(format!("{e:#}")))?;
        if width == 0 || height == 0 {
            return Ok(FrameRead::NotReady);
        }
        self.frame_count += 1;
        Ok(FrameRead::Ready(RasterFrame::new(pixels, width, height)))
    }
}

impl Drop for HttpCameraSource {
    fn drop(&mut self) {
        if let Some(connected_at) = self.connected_at {
            log::debug!(
                "HttpCameraSource: released {} after {} frames ({}s)",
                self.config.url,
                self.frame_count,
                connected_at.elapsed().as_secs()
            );
        }
    }
}

struct MjpegStream {
    reader: Box<dyn Read + Send + Sync>,
    buffer: Vec<u8>,
    max_frame_bytes: usize,
}

impl MjpegStream {
    fn new(reader: Box<dyn Read + Send + Sync>) -> Self {
        Self::with_limit(reader, MAX_JPEG_BYTES)
    }

    fn with_limit(reader: Box<dyn Read + Send + Sync>, max_frame_bytes: usize) -> Self {
        Self {
            reader,
            buffer: Vec::with_capacity(64 * 1024),
            max_frame_bytes,
        }
    }

    fn read_next_jpeg(&mut self) -> Result<Vec<u8>> {
        let mut chunk = vec![0u8; READ_CHUNK_BYTES];
        loop {
            if let Some((start, end)) = find_jpeg_bounds(&self.buffer) {
                let frame = self.buffer[start..end].to_vec();
                self.buffer.drain(..end);
                if frame.len() > self.max_frame_bytes {
                    return Err(anyhow!("mjpeg frame exceeds {} bytes", self.max_frame_bytes));
                }
                return Ok(frame);
            }

            match find_soi(&self.buffer) {
                // Frame started but still open: give up once it is too big.
                Some(start) if self.buffer.len() - start > self.max_frame_bytes => {
                    self.buffer.clear();
                    return Err(anyhow!("mjpeg frame exceeds {} bytes", self.max_frame_bytes));
                }
                Some(_) => {}
                // No frame yet. Keep the last byte in case it starts a marker.
                None if self.buffer.len() > 1 => {
                    let drain_len = self.buffer.len() - 1;
                    self.buffer.drain(..drain_len);
                }
                None => {}
            }

            let read = self.reader.read(&mut chunk).context("read mjpeg chunk")?;
            if read == 0 {
                return Err(anyhow!("mjpeg stream ended"));
            }
            self.buffer.extend_from_slice(&chunk[..read]);
        }
    }
}

fn fetch_snapshot(agent: &ureq::Agent, config: &HttpCameraConfig) -> Result<Vec<u8>> {
    let response = agent
        .get(&config.url)
        .timeout(config.timeout)
        .call()
        .with_context(|| format!("fetch jpeg snapshot from {}", config.url))?;
    let mut bytes = Vec::new();
    response
        .into_reader()
        .take(MAX_JPEG_BYTES as u64 + 1)
        .read_to_end(&mut bytes)
        .context("read jpeg snapshot")?;
    if bytes.is_empty() {
        return Err(anyhow!("empty jpeg snapshot"));
    }
    if bytes.len() > MAX_JPEG_BYTES {
        return Err(anyhow!("jpeg snapshot exceeds {} bytes", MAX_JPEG_BYTES));
    }
    Ok(bytes)
}

fn find_soi(buffer: &[u8]) -> Option<usize> {
    buffer.windows(2).position(|w| w == [0xFF, 0xD8])
}

/// Locate the first complete JPEG (SOI `FFD8` through EOI `FFD9`).
fn find_jpeg_bounds(buffer: &[u8]) -> Option<(usize, usize)> {
    let start = find_soi(buffer)?;
    let end = buffer[start + 2..]
        .windows(2)
        .position(|w| w == [0xFF, 0xD9])?;
    Some((start, start + 2 + end + 2))
}
