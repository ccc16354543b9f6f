//! Transient notices for whoever is driving a session.

use derive_more::Display;
use serde::Serialize;

/// Severity of a notice.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    /// Neutral information.
    #[display("info")]
    Info,
    /// An action succeeded.
    #[display("ok")]
    Success,
    /// Input was rejected; nothing changed.
    #[display("warn")]
    Warning,
    /// An external call failed.
    #[display("error")]
    Error,
}

/// A short message meant to be shown once and forgotten.
#[derive(Debug, Display, Clone, PartialEq, Eq, Serialize)]
#[display("[{level}] {text}")]
pub struct Notice {
    /// Severity.
    pub level: NoticeLevel,
    /// Text to show.
    pub text: String,
}

impl Notice {
    /// Informational notice.
    pub fn info(text: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            text: text.into(),
        }
    }

    /// Success notice.
    pub fn success(text: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Success,
            text: text.into(),
        }
    }

    /// Warning notice.
    pub fn warning(text: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Warning,
            text: text.into(),
        }
    }

    /// Error notice.
    pub fn error(text: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            text: text.into(),
        }
    }
}
