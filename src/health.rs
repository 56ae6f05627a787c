//! Service health polling.
//!
//! Each backend exposes `/healthz`, `/readyz` and `/livez`. Only the status
//! code matters; the body is ignored. A code of `0` means the probe never got
//! an HTTP answer (refused, timed out, DNS failure).

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::http::{ServiceClient, UNREACHABLE};
use crate::locale::Language;

/// Probe endpoints, in display order.
pub const PROBES: [&str; 3] = ["healthz", "readyz", "livez"];

/// Default poll period for health and review queue refreshes.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// A backend service mounted under `path` on the console's base URL.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceEndpoint {
    pub key: String,
    pub name: String,
    pub path: String,
}

impl ServiceEndpoint {
    pub fn new(key: &str, name: &str, path: &str) -> Self {
        Self {
            key: key.to_string(),
            name: name.to_string(),
            path: path.to_string(),
        }
    }
}

/// Services the console watches when no config overrides them.
pub fn default_services() -> Vec<ServiceEndpoint> {
    vec![
        ServiceEndpoint::new("catalog", "Catalog", "/api/catalog"),
        ServiceEndpoint::new("inference", "Inference", "/api/inference"),
        ServiceEndpoint::new("review-tasks", "Review Tasks", "/api/review-tasks"),
        ServiceEndpoint::new(
            "operator-assistant",
            "Operator Assistant",
            "/api/operator-assistant",
        ),
    ]
}

/// Probe results for one service.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ServiceHealth {
    pub healthz: u16,
    pub readyz: u16,
    pub livez: u16,
}

impl ServiceHealth {
    pub fn is_healthy(&self) -> bool {
        self.healthz == 200 && self.readyz == 200 && self.livez == 200
    }

    pub fn codes(&self) -> [u16; 3] {
        [self.healthz, self.readyz, self.livez]
    }
}

/// `—` before the first poll, `offline` for unreachable, else the code.
pub fn format_status(language: Language, code: Option<u16>) -> String {
    match code {
        None => "—".to_string(),
        Some(UNREACHABLE) => language.text().offline.to_string(),
        Some(code) => code.to_string(),
    }
}

pub fn badge(language: Language, health: Option<&ServiceHealth>) -> &'static str {
    let text = language.text();
    if health.is_some_and(ServiceHealth::is_healthy) {
        text.healthy
    } else {
        text.attention_needed
    }
}

/// Probes a fixed list of services.
pub struct HealthPoller {
    targets: Vec<(ServiceEndpoint, ServiceClient)>,
}

impl HealthPoller {
    pub fn new(base_url: &str, services: &[ServiceEndpoint], timeout: Duration) -> Result<Self> {
        let targets = services
            .iter()
            .map(|service| {
                ServiceClient::new(base_url, &service.path, timeout)
                    .map(|client| (service.clone(), client))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { targets })
    }

    pub fn services(&self) -> impl Iterator<Item = &ServiceEndpoint> {
        self.targets.iter().map(|(service, _)| service)
    }

    /// Probe every service, one endpoint at a time, in configured order.
    pub fn poll(&self) -> Vec<(ServiceEndpoint, ServiceHealth)> {
        self.targets
            .iter()
            .map(|(service, client)| {
                let health = ServiceHealth {
                    healthz: client.status_of(PROBES[0]),
                    readyz: client.status_of(PROBES[1]),
                    livez: client.status_of(PROBES[2]),
                };
                if !health.is_healthy() {
                    log::warn!(
                        "{} needs attention: healthz={} readyz={} livez={}",
                        service.key,
                        health.healthz,
                        health.readyz,
                        health.livez
                    );
                }
                (service.clone(), health)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn healthy_only_when_all_probes_are_200() {
        let ok = ServiceHealth {
            healthz: 200,
            readyz: 200,
            livez: 200,
        };
        assert!(ok.is_healthy());
        assert!(!ServiceHealth { readyz: 503, ..ok }.is_healthy());
        assert!(!ServiceHealth::default().is_healthy());
    }

    #[test]
    fn formats_codes() {
        assert_eq!(format_status(Language::En, None), "—");
        assert_eq!(format_status(Language::En, Some(0)), "offline");
        assert_eq!(format_status(Language::Uk, Some(0)), "офлайн");
        assert_eq!(format_status(Language::En, Some(503)), "503");
    }

    #[test]
    fn badge_needs_a_healthy_poll() {
        let ok = ServiceHealth {
            healthz: 200,
            readyz: 200,
            livez: 200,
        };
        assert_eq!(badge(Language::En, Some(&ok)), "Healthy");
        assert_eq!(badge(Language::En, None), "Attention needed");
        assert_eq!(badge(Language::Uk, Some(&ServiceHealth::default())), "Потрібна увага");
    }

    #[test]
    fn default_service_paths() {
        let services = default_services();
        assert_eq!(services.len(), 4);
        assert!(services.iter().all(|s| s.path.starts_with("/api/")));
    }
}
