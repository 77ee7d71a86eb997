//! Error types for manualchat.
//!
//! Library crates use [`ManualChatError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all manualchat operations.
#[derive(Debug, thiserror::Error)]
pub enum ManualChatError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Document could not be parsed (corrupt, truncated, or not a PDF).
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Requested page range is inverted or outside the document.
    #[error("range error: pages {start}..={end} invalid for a {pages}-page document")]
    Range { start: u32, end: u32, pages: u32 },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Database or storage layer error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Network/HTTP error while talking to a collaborator.
    #[error("network error: {0}")]
    Network(String),

    /// The upstream completion service failed or returned garbage.
    #[error("upstream error: {0}")]
    Upstream(String),

    /// Data validation error (malformed payload, unknown variant, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, ManualChatError>;

impl ManualChatError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Create a range error for a page span against a document length.
    pub fn range(start: u32, end: u32, pages: u32) -> Self {
        Self::Range { start, end, pages }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether this error means "the document has no usable content".
    pub fn is_document_failure(&self) -> bool {
        matches!(self, Self::Parse { .. } | Self::Io { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = ManualChatError::config("missing API key");
        assert_eq!(err.to_string(), "config error: missing API key");

        let err = ManualChatError::range(5, 2, 10);
        assert!(err.to_string().contains("5..=2"));
        assert!(err.to_string().contains("10-page"));
    }

    #[test]
    fn document_failures_are_classified() {
        assert!(ManualChatError::parse("bad xref").is_document_failure());
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        assert!(ManualChatError::io("/tmp/x.pdf", io).is_document_failure());
        assert!(!ManualChatError::Upstream("boom".into()).is_document_failure());
    }
}
