//! Domain-level error types for gnome-ext-backup.
//!
//! All errors are typed with `thiserror`. The orchestrator converts them into
//! an `OperationError` result record so nothing escapes past a
//! backup or restore call.

use serde::Serialize;
use thiserror::Error;

/// Application-level errors.
#[derive(Error, Debug)]
pub enum AppError {
    /// Caller supplied something unusable (empty selection, bad path, bad name).
    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    /// Filesystem operation failed.
    #[error("IO error: {message}")]
    Io {
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },

    /// The external configuration-store tool is missing or failed.
    #[error("{tool} failed: {message}")]
    ExternalTool {
        tool: String,
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },

    /// Archive could not be read or does not have the expected layout.
    #[error("Invalid archive: {message}")]
    ArchiveFormat {
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },

    /// Configuration or environment error.
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Another backup or restore is still running.
    #[error("Another backup or restore operation is already running")]
    OperationInProgress,
}

/// Tag identifying the class of an [`AppError`], kept in result records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidInput,
    Io,
    ExternalTool,
    ArchiveFormat,
    Config,
    Busy,
}

impl AppError {
    /// Create an invalid input error.
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Create an IO error with context.
    pub fn io(message: impl Into<String>, err: std::io::Error) -> Self {
        Self::Io {
            message: message.into(),
            source: Some(err),
        }
    }

    /// Create an archive format error with context.
    pub fn archive(message: impl Into<String>, err: std::io::Error) -> Self {
        Self::ArchiveFormat {
            message: message.into(),
            source: Some(err),
        }
    }

    /// Create an external tool error without an underlying IO error.
    pub fn tool(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ExternalTool {
            tool: tool.into(),
            message: message.into(),
            source: None,
        }
    }

    /// The tagged kind of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidInput { .. } => ErrorKind::InvalidInput,
            Self::Io { .. } => ErrorKind::Io,
            Self::ExternalTool { .. } => ErrorKind::ExternalTool,
            Self::ArchiveFormat { .. } => ErrorKind::ArchiveFormat,
            Self::Config { .. } => ErrorKind::Config,
            Self::OperationInProgress => ErrorKind::Busy,
        }
    }
}

/// Result type alias using `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_mapping() {
        assert_eq!(AppError::invalid("x").kind(), ErrorKind::InvalidInput);
        assert_eq!(
            AppError::archive("bad", std::io::Error::other("eof")).kind(),
            ErrorKind::ArchiveFormat
        );
        assert_eq!(AppError::tool("dconf", "exit 1").kind(), ErrorKind::ExternalTool);
        assert_eq!(AppError::OperationInProgress.kind(), ErrorKind::Busy);
    }

    #[test]
    fn test_display_includes_tool_name() {
        let err = AppError::tool("dconf", "exited with status 1");
        assert_eq!(err.to_string(), "dconf failed: exited with status 1");
    }
}
