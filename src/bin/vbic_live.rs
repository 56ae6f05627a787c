//! vbic_live - live recognition from a camera
//!
//! This process:
//! 1. Opens the configured frame source
//! 2. Runs capture-predict cycles against the inference service
//! 3. Prints the live caption (and overlay box) whenever it changes
//! 4. Releases the camera on Ctrl-C

use anyhow::{anyhow, Result};
use clap::Parser;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::time::Duration;

use vbic_console::config::ConsoleConfig;
use vbic_console::ui::overlay_line;
use vbic_console::{ingest, InferenceClient, JpegEncoder, Language, LiveRunner, LiveSession};

#[derive(Parser, Debug)]
#[command(author, version, about = "Live recognition from a camera")]
struct Args {
    /// Frame source (stub://, http(s)://, file path); defaults to config
    #[arg(long)]
    source: Option<String>,
    /// Capture period in milliseconds (overrides config)
    #[arg(long)]
    period_ms: Option<u64>,
    /// Rendered video size, e.g. 320x240, to print the overlay box
    #[arg(long)]
    display: Option<String>,
    #[arg(long)]
    base_url: Option<String>,
    #[arg(long)]
    language: Option<Language>,
}

fn parse_display(value: &str) -> Result<(f64, f64)> {
    let (w, h) = value
        .split_once(['x', 'X'])
        .ok_or_else(|| anyhow!("--display expects WIDTHxHEIGHT, got {value}"))?;
    Ok((w.trim().parse()?, h.trim().parse()?))
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut config = ConsoleConfig::load()?;
    if let Some(base_url) = args.base_url {
        config.base_url = base_url;
    }
    if let Some(language) = args.language {
        config.language = language;
    }
    if let Some(period_ms) = args.period_ms {
        config.live.period = Duration::from_millis(period_ms);
    }
    let display = args.display.as_deref().map(parse_display).transpose()?;
    let uri = args.source.unwrap_or_else(|| config.live.source.clone());

    let predictor = Arc::new(InferenceClient::new(
        &config.base_url,
        config.inference_path()?,
        config.http_timeout,
    )?);
    let session = LiveSession::new(predictor, Box::new(JpegEncoder::new(config.live.jpeg_quality)));
    let handle = LiveRunner::new(session, config.live.period).spawn()?;
    handle.attach_source(ingest::open_source(&uri)?)?;
    log::info!(
        "vbic_live running: {} every {}ms",
        uri,
        config.live.period.as_millis()
    );

    let (tx, rx) = mpsc::channel();
    ctrlc::set_handler(move || {
        let _ = tx.send(());
    })
    .map_err(|e| anyhow!("error setting Ctrl-C handler: {e}"))?;

    let mut last_line = String::new();
    loop {
        match rx.recv_timeout(config.live.period) {
            Err(RecvTimeoutError::Timeout) => {}
            _ => break,
        }
        let Some(caption) = handle.caption(config.language) else {
            continue;
        };
        let mut line = caption;
        if let Some(rect) = display.and_then(|size| handle.snapshot().overlay(size)) {
            line = format!("{line}  {}", overlay_line(&rect));
        }
        if line != last_line {
            println!("{line}");
            last_line = line;
        }
    }

    log::info!("shutdown signal received, releasing camera...");
    handle.stop()?;
    Ok(())
}
