//! Error types and exit codes for codehem

use std::process::ExitCode;
use thiserror::Error;

/// Main error type for codehem operations
#[derive(Error, Debug)]
pub enum CodeHemError {
    #[error("Failed to initialize parser: {message}")]
    Parse { message: String },

    #[error("Malformed path expression '{path}': {message}")]
    PathSyntax { path: String, message: String },

    #[error("No element found at path '{path}'")]
    ElementNotFound { path: String },

    #[error("Write conflict at '{path}': expected hash {expected}, found {actual}")]
    WriteConflict {
        path: String,
        expected: String,
        actual: String,
    },

    #[error("Unsupported language: {language}")]
    UnsupportedLanguage { language: String },

    #[error("Invalid input: {message}")]
    Validation { message: String },

    #[error("Deadline exceeded after {attempts} attempts")]
    Timeout { attempts: usize },

    #[error("Language plug-in error: {message}")]
    Plugin { message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CodeHemError {
    /// Convert error to the CLI exit code:
    /// - 0: Success
    /// - 2: Path not found
    /// - 3: Conflict
    /// - 4: I/O error
    /// - 5: Usage error
    pub fn exit_code(&self) -> ExitCode {
        match self {
            Self::ElementNotFound { .. } => ExitCode::from(2),
            Self::WriteConflict { .. } => ExitCode::from(3),
            Self::Io(_) | Self::Timeout { .. } => ExitCode::from(4),
            Self::PathSyntax { .. }
            | Self::UnsupportedLanguage { .. }
            | Self::Validation { .. } => ExitCode::from(5),
            Self::Parse { .. } | Self::Plugin { .. } => ExitCode::from(4),
        }
    }

    /// Short machine-readable kind name, used in structured patch results.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Parse { .. } => "ParseError",
            Self::PathSyntax { .. } => "PathSyntaxError",
            Self::ElementNotFound { .. } => "ElementNotFoundError",
            Self::WriteConflict { .. } => "WriteConflictError",
            Self::UnsupportedLanguage { .. } => "UnsupportedLanguageError",
            Self::Validation { .. } => "ValidationError",
            Self::Timeout { .. } => "TimeoutError",
            Self::Plugin { .. } => "PluginError",
            Self::Io(_) => "IOError",
        }
    }

    /// Whether a retry policy may re-attempt the failed operation.
    /// Logical errors are never retried; only transient I/O is.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Io(err) => matches!(
                err.kind(),
                std::io::ErrorKind::Interrupted
                    | std::io::ErrorKind::WouldBlock
                    | std::io::ErrorKind::TimedOut
            ),
            _ => false,
        }
    }
}

/// Result type alias for codehem operations
pub type Result<T> = std::result::Result<T, CodeHemError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        let not_found = CodeHemError::ElementNotFound {
            path: "C.f".to_string(),
        };
        assert_eq!(not_found.exit_code(), ExitCode::from(2));

        let conflict = CodeHemError::WriteConflict {
            path: "C.f".to_string(),
            expected: "aa".to_string(),
            actual: "bb".to_string(),
        };
        assert_eq!(conflict.exit_code(), ExitCode::from(3));

        let usage = CodeHemError::PathSyntax {
            path: "".to_string(),
            message: "empty".to_string(),
        };
        assert_eq!(usage.exit_code(), ExitCode::from(5));
    }

    #[test]
    fn test_transient_classification() {
        let interrupted: CodeHemError =
            std::io::Error::new(std::io::ErrorKind::Interrupted, "interrupted").into();
        assert!(interrupted.is_transient());

        let not_found: CodeHemError =
            std::io::Error::new(std::io::ErrorKind::NotFound, "missing").into();
        assert!(!not_found.is_transient());

        let conflict = CodeHemError::WriteConflict {
            path: "x".to_string(),
            expected: String::new(),
            actual: String::new(),
        };
        assert!(!conflict.is_transient());
    }

    #[test]
    fn test_kind_names() {
        let err = CodeHemError::Validation {
            message: "empty code".to_string(),
        };
        assert_eq!(err.kind(), "ValidationError");
    }
}
