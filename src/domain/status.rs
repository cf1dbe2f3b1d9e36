use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Loading,
    Success,
    Error,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Loading => "loading",
            Severity::Success => "success",
            Severity::Error => "error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusMessage {
    pub text: String,
    pub severity: Severity,
    pub at: DateTime<Utc>,
}

/// Holds at most one status line; every `set` replaces the previous one.
#[derive(Debug, Clone, Default)]
pub struct StatusChannel {
    current: Option<StatusMessage>,
}

impl StatusChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, severity: Severity, text: impl Into<String>) {
        self.current = Some(StatusMessage {
            text: text.into(),
            severity,
            at: Utc::now(),
        });
    }

    pub fn loading(&mut self, text: impl Into<String>) {
        self.set(Severity::Loading, text);
    }

    pub fn success(&mut self, text: impl Into<String>) {
        self.set(Severity::Success, text);
    }

    pub fn error(&mut self, text: impl Into<String>) {
        self.set(Severity::Error, text);
    }

    pub fn clear(&mut self) {
        self.current = None;
    }

    pub fn current(&self) -> Option<&StatusMessage> {
        self.current.as_ref()
    }
}
