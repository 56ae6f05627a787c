use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::health::{default_services, ServiceEndpoint};
use crate::locale::Language;

const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8080";
const DEFAULT_SOURCE: &str = "stub://camera";
const DEFAULT_LIVE_PERIOD_MS: u64 = 800;
const DEFAULT_JPEG_QUALITY: u8 = crate::frame::DEFAULT_JPEG_QUALITY;
const DEFAULT_POLL_SECS: u64 = 5;
const DEFAULT_HTTP_TIMEOUT_MS: u64 = 10_000;

pub const INFERENCE_SERVICE: &str = "inference";
pub const REVIEW_SERVICE: &str = "review-tasks";
pub const ASSISTANT_SERVICE: &str = "operator-assistant";

#[derive(Debug, Deserialize, Default)]
struct ConsoleConfigFile {
    base_url: Option<String>,
    services: Option<Vec<ServiceEndpoint>>,
    live: Option<LiveConfigFile>,
    poll: Option<PollConfigFile>,
    http: Option<HttpConfigFile>,
    language: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct LiveConfigFile {
    source: Option<String>,
    period_ms: Option<u64>,
    jpeg_quality: Option<u8>,
}

#[derive(Debug, Deserialize, Default)]
struct PollConfigFile {
    interval_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
struct HttpConfigFile {
    timeout_ms: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct ConsoleConfig {
    pub base_url: String,
    pub services: Vec<ServiceEndpoint>,
    pub live: LiveSettings,
    pub poll_interval: Duration,
    pub http_timeout: Duration,
    pub language: Language,
}

#[derive(Debug, Clone)]
pub struct LiveSettings {
    pub source: String,
    pub period: Duration,
    pub jpeg_quality: u8,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            services: default_services(),
            live: LiveSettings {
                source: DEFAULT_SOURCE.to_string(),
                period: Duration::from_millis(DEFAULT_LIVE_PERIOD_MS),
                jpeg_quality: DEFAULT_JPEG_QUALITY,
            },
            poll_interval: Duration::from_secs(DEFAULT_POLL_SECS),
            http_timeout: Duration::from_millis(DEFAULT_HTTP_TIMEOUT_MS),
            language: Language::default(),
        }
    }
}

impl ConsoleConfig {
    /// Defaults, then the JSON file named by `VBIC_CONFIG`, then `VBIC_*`
    /// environment overrides.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("VBIC_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) if !path.trim().is_empty() => Some(read_config_file(Path::new(path))?),
            _ => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default())?;
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: ConsoleConfigFile) -> Result<Self> {
        let mut cfg = Self::default();
        if let Some(base_url) = file.base_url {
            cfg.base_url = base_url;
        }
        if let Some(services) = file.services {
            cfg.services = services;
        }
        if let Some(live) = file.live {
            if let Some(source) = live.source {
                cfg.live.source = source;
            }
            if let Some(period_ms) = live.period_ms {
                cfg.live.period = Duration::from_millis(period_ms);
            }
            if let Some(quality) = live.jpeg_quality {
                cfg.live.jpeg_quality = quality;
            }
        }
        if let Some(secs) = file.poll.and_then(|poll| poll.interval_secs) {
            cfg.poll_interval = Duration::from_secs(secs);
        }
        if let Some(timeout_ms) = file.http.and_then(|http| http.timeout_ms) {
            cfg.http_timeout = Duration::from_millis(timeout_ms);
        }
        if let Some(language) = file.language {
            cfg.language = language.parse()?;
        }
        Ok(cfg)
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Some(url) = env_value("VBIC_BASE_URL") {
            self.base_url = url;
        }
        if let Some(source) = env_value("VBIC_SOURCE") {
            self.live.source = source;
        }
        if let Some(period) = env_value("VBIC_LIVE_PERIOD_MS") {
            let ms: u64 = period
                .parse()
                .map_err(|_| anyhow!("VBIC_LIVE_PERIOD_MS must be an integer number of milliseconds"))?;
            self.live.period = Duration::from_millis(ms);
        }
        if let Some(quality) = env_value("VBIC_JPEG_QUALITY") {
            self.live.jpeg_quality = quality
                .parse()
                .map_err(|_| anyhow!("VBIC_JPEG_QUALITY must be an integer between 1 and 100"))?;
        }
        if let Some(secs) = env_value("VBIC_POLL_SECS") {
            let secs: u64 = secs
                .parse()
                .map_err(|_| anyhow!("VBIC_POLL_SECS must be an integer number of seconds"))?;
            self.poll_interval = Duration::from_secs(secs);
        }
        if let Some(timeout) = env_value("VBIC_HTTP_TIMEOUT_MS") {
            let ms: u64 = timeout
                .parse()
                .map_err(|_| anyhow!("VBIC_HTTP_TIMEOUT_MS must be an integer number of milliseconds"))?;
            self.http_timeout = Duration::from_millis(ms);
        }
        if let Some(language) = env_value("VBIC_LANGUAGE") {
            self.language = language.parse()?;
        }
        Ok(())
    }

    fn validate(&mut self) -> Result<()> {
        let base = url::Url::parse(&self.base_url)
            .map_err(|e| anyhow!("invalid base_url {}: {}", self.base_url, e))?;
        if !matches!(base.scheme(), "http" | "https") {
            return Err(anyhow!("base_url must be http or https"));
        }
        for service in &mut self.services {
            crate::validate_service_key(&service.key)?;
            service.key = service.key.to_lowercase();
            if !service.path.starts_with('/') {
                return Err(anyhow!("service {} path must start with '/'", service.key));
            }
        }
        for key in [INFERENCE_SERVICE, REVIEW_SERVICE, ASSISTANT_SERVICE] {
            self.service_path(key)?;
        }
        if self.live.period.is_zero() {
            return Err(anyhow!("live period must be greater than zero"));
        }
        if !(1..=100).contains(&self.live.jpeg_quality) {
            return Err(anyhow!("jpeg_quality must be between 1 and 100"));
        }
        if self.poll_interval.is_zero() {
            return Err(anyhow!("poll interval must be greater than zero"));
        }
        if self.http_timeout.is_zero() {
            return Err(anyhow!("http timeout must be greater than zero"));
        }
        Ok(())
    }

    /// Mount path of the service with `key`.
    pub fn service_path(&self, key: &str) -> Result<&str> {
        self.services
            .iter()
            .find(|service| service.key == key)
            .map(|service| service.path.as_str())
            .ok_or_else(|| anyhow!("no service configured with key {key}"))
    }

    pub fn inference_path(&self) -> Result<&str> {
        self.service_path(INFERENCE_SERVICE)
    }

    pub fn review_path(&self) -> Result<&str> {
        self.service_path(REVIEW_SERVICE)
    }

    pub fn assistant_path(&self) -> Result<&str> {
        self.service_path(ASSISTANT_SERVICE)
    }
}

fn env_value(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .filter(|value| !value.trim().is_empty())
}

fn read_config_file(path: &Path) -> Result<ConsoleConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = serde_json::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}
