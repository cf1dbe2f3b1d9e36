use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AppError {
    InvalidMapping(String),
    IoError(String),
    ConversionError(String),
    MergeError(String),
    ExportError(String),
    UserCancelled,
    InvalidState(String),
    Busy(String),
    ConfigError(String),
}

impl AppError {
    /// Dialog cancellations abort a transition without surfacing anything.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, AppError::UserCancelled)
    }

    /// The detail text without the category prefix, for status lines.
    pub fn message(&self) -> String {
        match self {
            AppError::InvalidMapping(msg)
            | AppError::IoError(msg)
            | AppError::ConversionError(msg)
            | AppError::MergeError(msg)
            | AppError::ExportError(msg)
            | AppError::InvalidState(msg)
            | AppError::Busy(msg)
            | AppError::ConfigError(msg) => msg.clone(),
            AppError::UserCancelled => "已取消".to_string(),
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::InvalidMapping(msg) => write!(f, "Invalid mapping: {}", msg),
            AppError::IoError(msg) => write!(f, "IO error: {}", msg),
            AppError::ConversionError(msg) => write!(f, "Conversion error: {}", msg),
            AppError::MergeError(msg) => write!(f, "Merge error: {}", msg),
            AppError::ExportError(msg) => write!(f, "Export error: {}", msg),
            AppError::UserCancelled => write!(f, "Cancelled by user"),
            AppError::InvalidState(msg) => write!(f, "Invalid state: {}", msg),
            AppError::Busy(msg) => write!(f, "Busy: {}", msg),
            AppError::ConfigError(msg) => write!(f, "Config error: {}", msg),
        }
    }
}

// Implement std::error::Error so Tauri can properly serialize the error
impl std::error::Error for AppError {}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::IoError(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
