//! Human-review task client.
//!
//! Operators file a review task for detections they want a person to check.
//! Tasks are persisted by the review-tasks service; this client only creates
//! and lists them.

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::http::ServiceClient;
use crate::predict::{format_confidence, PredictionBatch};

/// Largest page the review-tasks service accepts.
pub const MAX_PAGE_LIMIT: u32 = 200;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReviewTask {
    pub id: i64,
    pub created_at: String,
    pub label: String,
    pub confidence: f64,
    #[serde(default)]
    pub image_name: Option<String>,
    pub status: String,
}

impl ReviewTask {
    pub fn is_pending(&self) -> bool {
        self.status == "pending"
    }

    pub fn confidence_pct(&self) -> String {
        format!("{}%", format_confidence(self.confidence))
    }

    pub fn image_display(&self) -> &str {
        match self.image_name.as_deref() {
            Some(name) if !name.is_empty() => name,
            _ => "—",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TaskCreate {
    pub label: String,
    pub confidence: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_name: Option<String>,
}

impl TaskCreate {
    /// Task for the top prediction of `batch`.
    pub fn from_top(batch: &PredictionBatch, image_name: Option<&str>) -> Result<Self> {
        let top = batch
            .top()
            .ok_or_else(|| anyhow!("no prediction to file a review task for"))?;
        Ok(Self {
            label: top.label.clone(),
            confidence: top.confidence,
            image_name: image_name.map(str::to_string),
        })
    }
}

/// Window into the task list.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TaskPage {
    pub offset: u32,
    pub limit: u32,
}

impl TaskPage {
    pub fn new(offset: u32, limit: u32) -> Result<Self> {
        if limit == 0 || limit > MAX_PAGE_LIMIT {
            return Err(anyhow!("limit must be between 1 and {}", MAX_PAGE_LIMIT));
        }
        Ok(Self { offset, limit })
    }
}

#[derive(Clone, Debug)]
pub struct ReviewClient {
    client: ServiceClient,
}

impl ReviewClient {
    pub fn new(base_url: &str, path: &str, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: ServiceClient::new(base_url, path, timeout)?,
        })
    }

    /// File a task. Returns the created task when the service echoes it.
    pub fn create_task(&self, task: &TaskCreate) -> Result<Option<ReviewTask>> {
        let reply = self.client.post_json("tasks", task)?;
        if !reply.is_success() {
            return Err(anyhow!("Task creation failed ({})", reply.status));
        }
        log::info!("review task filed for {}", task.label);
        Ok(reply.json::<ReviewTask>().ok())
    }

    pub fn list_tasks(&self, page: Option<TaskPage>) -> Result<Vec<ReviewTask>> {
        let query = match page {
            Some(page) => vec![
                ("offset", page.offset.to_string()),
                ("limit", page.limit.to_string()),
            ],
            None => Vec::new(),
        };
        let reply = self.client.get("tasks", &query)?;
        if !reply.is_success() {
            return Err(anyhow!("Failed to load tasks ({})", reply.status));
        }
        reply.json()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predict::Prediction;

    #[test]
    fn create_body_omits_missing_image_name() {
        let task = TaskCreate {
            label: "apple".into(),
            confidence: 0.5,
            image_name: None,
        };
        let json = serde_json::to_value(&task).unwrap();
        assert_eq!(json, serde_json::json!({"label": "apple", "confidence": 0.5}));
    }

    #[test]
    fn task_from_top_prediction() {
        let batch = PredictionBatch {
            predictions: vec![Prediction {
                label: "apple".into(),
                confidence: 0.91,
                bbox: None,
            }],
        };
        let task = TaskCreate::from_top(&batch, Some("apple.jpg")).unwrap();
        assert_eq!(task.label, "apple");
        assert_eq!(task.image_name.as_deref(), Some("apple.jpg"));
        assert!(TaskCreate::from_top(&PredictionBatch::default(), None).is_err());
    }

    #[test]
    fn page_limit_bounds() {
        assert!(TaskPage::new(0, 0).is_err());
        assert!(TaskPage::new(0, 201).is_err());
        assert!(TaskPage::new(10, 200).is_ok());
    }

    #[test]
    fn display_helpers() {
        let task: ReviewTask = serde_json::from_str(
            r#"{"id":7,"created_at":"2024-05-01T10:00:00","label":"pear",
                "confidence":0.456,"image_name":null,"status":"pending"}"#,
        )
        .unwrap();
        assert!(task.is_pending());
        assert_eq!(task.confidence_pct(), "45.6%");
        assert_eq!(task.image_display(), "—");
    }
}
