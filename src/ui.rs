//! Terminal output for the console binaries.
//!
//! Long stages get an `indicatif` spinner on a TTY and a plain `==>` line
//! otherwise. Tables are rendered to strings so callers decide where they go.

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::fmt::Write as _;
use std::time::{Duration, Instant};

use crate::health::{badge, format_status, ServiceEndpoint, ServiceHealth};
use crate::locale::Language;
use crate::overlay::OverlayRect;
use crate::recognize::RecognitionReport;
use crate::review::ReviewTask;
use crate::tools::ToolInfo;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UiMode {
    Auto,
    Plain,
    Pretty,
}

impl UiMode {
    pub fn parse(flag: &str) -> Self {
        match flag {
            "plain" => UiMode::Plain,
            "pretty" => UiMode::Pretty,
            _ => UiMode::Auto,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Ui {
    mode: UiMode,
    is_tty: bool,
}

impl Ui {
    pub fn new(mode: UiMode, is_tty: bool) -> Self {
        Self { mode, is_tty }
    }

    fn pretty(&self) -> bool {
        self.is_tty && self.mode != UiMode::Plain
    }

    /// Announce a stage; it is reported done (with elapsed time) on drop.
    pub fn stage(&self, name: &str) -> StageGuard {
        if !self.pretty() {
            eprintln!("==> {}", name);
            return StageGuard::new(name, None);
        }
        let spinner = ProgressBar::new_spinner();
        spinner.set_draw_target(ProgressDrawTarget::stderr());
        spinner.enable_steady_tick(Duration::from_millis(120));
        spinner.set_style(
            ProgressStyle::with_template("{spinner} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        spinner.set_message(format!("{name}…"));
        StageGuard::new(name, Some(spinner))
    }
}

pub struct StageGuard {
    name: String,
    start: Instant,
    spinner: Option<ProgressBar>,
}

impl StageGuard {
    fn new(name: &str, spinner: Option<ProgressBar>) -> Self {
        Self {
            name: name.to_string(),
            start: Instant::now(),
            spinner,
        }
    }
}

impl Drop for StageGuard {
    fn drop(&mut self) {
        let message = format!("✔ {} ({})", self.name, format_elapsed(self.start.elapsed()));
        match &self.spinner {
            Some(spinner) => spinner.finish_with_message(message),
            None => eprintln!("{message}"),
        }
    }
}

fn format_elapsed(elapsed: Duration) -> String {
    if elapsed.as_secs() >= 1 {
        format!("{:.2}s", elapsed.as_secs_f64())
    } else {
        format!("{}ms", elapsed.as_millis())
    }
}

/// One row per service: name, the three probe codes, then the badge.
pub fn health_table(language: Language, rows: &[(ServiceEndpoint, Option<ServiceHealth>)]) -> String {
    let width = rows
        .iter()
        .map(|(service, _)| service.name.chars().count())
        .max()
        .unwrap_or(0)
        .max("SERVICE".len());
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<width$}  {:>8}  {:>8}  {:>8}  STATUS",
        "SERVICE", "HEALTHZ", "READYZ", "LIVEZ"
    );
    for (service, health) in rows {
        let codes = health.map(|h| h.codes());
        let cell = |idx: usize| format_status(language, codes.map(|c| c[idx]));
        let _ = writeln!(
            out,
            "{:<width$}  {:>8}  {:>8}  {:>8}  {}",
            service.name,
            cell(0),
            cell(1),
            cell(2),
            badge(language, health.as_ref())
        );
    }
    out
}

pub fn task_table(language: Language, tasks: &[ReviewTask]) -> String {
    if tasks.is_empty() {
        return format!("{}\n", language.text().no_tasks);
    }
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:>6}  {:<20}  {:<16}  {:>7}  {:<24}  STATUS",
        "ID", "CREATED", "LABEL", "CONF", "IMAGE"
    );
    for task in tasks {
        let _ = writeln!(
            out,
            "{:>6}  {:<20}  {:<16}  {:>7}  {:<24}  {}",
            task.id,
            task.created_at,
            task.label,
            task.confidence_pct(),
            task.image_display(),
            task.status
        );
    }
    out
}

pub fn tool_list(language: Language, tools: &[ToolInfo]) -> String {
    if tools.is_empty() {
        return format!("{}\n", language.text().no_tools);
    }
    tools
        .iter()
        .map(|tool| match &tool.description {
            Some(description) => format!("{}  {}\n", tool.name, description),
            None => format!("{}\n", tool.name),
        })
        .collect()
}

pub fn overlay_line(rect: &OverlayRect) -> String {
    format!(
        "box: left={:.1} top={:.1} width={:.1} height={:.1}",
        rect.left, rect.top, rect.width, rect.height
    )
}

/// Summary of a single-image recognition, top prediction first.
pub fn report_lines(language: Language, report: &RecognitionReport, rendered: Option<(f64, f64)>) -> String {
    let text = language.text();
    let mut out = String::new();
    let _ = writeln!(out, "image: {}", report.image_name);
    match report.top() {
        Some(top) => {
            let _ = writeln!(out, "{}: {} ({}%)", text.detected, top.label, top.confidence_pct());
        }
        None => {
            let _ = writeln!(out, "{}", text.no_confident_match);
        }
    }
    if let Some(rect) = rendered.and_then(|size| report.overlay(size)) {
        let _ = writeln!(out, "{}", overlay_line(&rect));
    }
    for prediction in report.batch.predictions.iter().skip(1) {
        let _ = writeln!(out, "  {} ({}%)", prediction.label, prediction.confidence_pct());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predict::{BoundingBox, Prediction, PredictionBatch};

    #[test]
    fn health_table_marks_offline_and_unpolled() {
        let rows = vec![
            (
                ServiceEndpoint::new("inference", "Inference", "/api/inference"),
                Some(ServiceHealth {
                    healthz: 0,
                    readyz: 0,
                    livez: 0,
                }),
            ),
            (
                ServiceEndpoint::new("catalog", "Catalog", "/api/catalog"),
                None,
            ),
        ];
        let table = health_table(Language::En, &rows);
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[1].contains("offline"));
        assert!(lines[1].ends_with("Attention needed"));
        assert!(lines[2].contains('—'));
    }

    #[test]
    fn empty_lists_use_localized_text() {
        assert_eq!(task_table(Language::En, &[]), format!("{}\n", Language::En.text().no_tasks));
        assert_eq!(tool_list(Language::Uk, &[]), format!("{}\n", Language::Uk.text().no_tools));
    }

    #[test]
    fn report_includes_overlay_when_rendered() {
        let report = RecognitionReport {
            image_name: "a.jpg".into(),
            batch: PredictionBatch {
                predictions: vec![Prediction {
                    label: "apple".into(),
                    confidence: 0.5,
                    bbox: Some(BoundingBox {
                        x: 10.0,
                        y: 10.0,
                        w: 20.0,
                        h: 20.0,
                    }),
                }],
            },
            natural_size: Some((100, 100)),
        };
        let out = report_lines(Language::En, &report, Some((50.0, 50.0)));
        assert!(out.contains("Detected: apple (50.0%)"));
        assert!(out.contains("box: left=5.0 top=5.0 width=10.0 height=10.0"));
        assert!(!report_lines(Language::En, &report, None).contains("box:"));
    }

    #[test]
    fn plain_mode_never_spins() {
        assert!(!Ui::new(UiMode::Plain, true).pretty());
        assert!(!Ui::new(UiMode::Auto, false).pretty());
        assert!(Ui::new(UiMode::parse("pretty"), true).pretty());
    }
}
