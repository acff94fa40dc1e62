//! Transient user-facing notices

use crate::error::StampError;
use std::time::Duration;

pub const ERROR_TTL: Duration = Duration::from_secs(5);
pub const SUCCESS_TTL: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Error,
    Success,
}

/// A message the host shows briefly and then clears.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub kind: NoticeKind,
    pub message: String,
    pub ttl: Duration,
}

impl Notice {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Success,
            message: message.into(),
            ttl: SUCCESS_TTL,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Error,
            message: message.into(),
            ttl: ERROR_TTL,
        }
    }

    pub fn from_error(err: &StampError) -> Self {
        let message = match err {
            StampError::Input(reason) => reason.clone(),
            StampError::Validation(reason) => {
                format!("Error importing text history. {}", capitalize(reason))
            }
            StampError::RenderResource(_) => {
                "Error updating PDF: no usable font is available.".to_string()
            }
            StampError::Document(_) => "Error loading PDF. Please try again.".to_string(),
            StampError::Storage(_) => "Error saving text history.".to_string(),
            StampError::Raster(_) => "Error rendering page. Please try again.".to_string(),
            StampError::NoDocument => "Please load a PDF first.".to_string(),
        };
        Self::error(message)
    }

    /// Notice for the outcome of a user action.
    pub fn for_result<T>(result: &Result<T, StampError>, success: &str) -> Self {
        match result {
            Ok(_) => Self::success(success),
            Err(e) => Self::from_error(e),
        }
    }

    pub fn is_error(&self) -> bool {
        self.kind == NoticeKind::Error
    }

    pub fn is_expired(&self, elapsed: Duration) -> bool {
        elapsed >= self.ttl
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
