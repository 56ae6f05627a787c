//! Operator-facing strings in English and Ukrainian.

use anyhow::{anyhow, Result};
use std::str::FromStr;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Language {
    #[default]
    En,
    Uk,
}

impl FromStr for Language {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_lowercase().as_str() {
            "en" | "english" => Ok(Language::En),
            "uk" | "ua" | "ukrainian" => Ok(Language::Uk),
            other => Err(anyhow!("unsupported language '{}'; expected en or uk", other)),
        }
    }
}

pub struct Text {
    pub offline: &'static str,
    pub healthy: &'static str,
    pub attention_needed: &'static str,
    pub live_starting: &'static str,
    pub live_error: &'static str,
    pub detected: &'static str,
    pub no_confident_match: &'static str,
    pub no_tasks: &'static str,
    pub no_tools: &'static str,
}

const EN: Text = Text {
    offline: "offline",
    healthy: "Healthy",
    attention_needed: "Attention needed",
    live_starting: "Live recognition: starting…",
    live_error: "Live error",
    detected: "Detected",
    no_confident_match: "No confident match",
    no_tasks: "No tasks right now.",
    no_tools: "No tools available",
};

const UK: Text = Text {
    offline: "офлайн",
    healthy: "Працює",
    attention_needed: "Потрібна увага",
    live_starting: "Розпізнавання наживо: запуск…",
    live_error: "Помилка розпізнавання",
    detected: "Виявлено",
    no_confident_match: "Немає впевненого збігу",
    no_tasks: "Зараз завдань немає.",
    no_tools: "Немає доступних інструментів",
};

impl Language {
    pub fn text(self) -> &'static Text {
        match self {
            Language::En => &EN,
            Language::Uk => &UK,
        }
    }
}
