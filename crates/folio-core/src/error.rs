//! Error types for Folio

use thiserror::Error;

use crate::document::LibraryError;

/// Result type alias using Folio's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Folio error types with helpful messages and suggestions
#[derive(Error, Debug)]
pub enum Error {
    // Session errors (E001-E099)
    #[error("Session '{0}' not found. It may have been closed or expired; open the document again.")]
    SessionNotFound(String),

    // Document errors (E100-E199)
    #[error("Invalid document '{source_name}': {reason}")]
    InvalidDocument { source_name: String, reason: String },

    #[error("Unsupported document type '{0}'. Expected one of: word, excel, powerpoint, pdf, email.")]
    UnsupportedType(String),

    #[error("Document type mismatch: expected {expected}, found {actual}")]
    DocumentTypeMismatch { expected: String, actual: String },

    // Operation errors (E200-E299)
    #[error("Unsupported {domain} operation '{operation}'. Valid operations: {}", .available.join(", "))]
    UnsupportedOperation {
        domain: String,
        operation: String,
        available: Vec<String>,
    },

    #[error("Operation '{operation}' is registered twice for {domain}")]
    DuplicateOperation { domain: String, operation: String },

    #[error("Operation '{0}' is read-only and cannot modify the document")]
    ReadOnlyContext(String),

    // Parameter errors (E300-E399)
    #[error("Missing required parameter '{name}' for operation '{operation}'")]
    MissingParameter { operation: String, name: String },

    #[error("Invalid parameter '{name}' for operation '{operation}': {reason}")]
    InvalidParameter {
        operation: String,
        name: String,
        reason: String,
    },

    // Persistence errors (E400-E499)
    #[error("Failed to save session '{session_id}': {source}")]
    Save {
        session_id: String,
        #[source]
        source: LibraryError,
    },

    #[error("Document library error: {0}")]
    DocumentLibrary(#[from] LibraryError),

    #[error("Operation '{operation}' failed{}: {source}", session_suffix(.session_id))]
    OperationFailed {
        operation: String,
        session_id: Option<String>,
        #[source]
        source: Box<Error>,
    },

    // Capacity errors (E500-E599)
    #[error("Session limit reached ({0} open sessions). Close unused sessions first.")]
    SessionLimitReached(usize),

    // Generic errors
    #[error("{0}")]
    Other(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

fn session_suffix(session_id: &Option<String>) -> String {
    match session_id {
        Some(id) => format!(" in session '{}'", id),
        None => String::new(),
    }
}

impl Error {
    /// Get error code for this error type
    pub fn code(&self) -> &'static str {
        match self {
            Self::SessionNotFound(_) => "E001",
            Self::InvalidDocument { .. } => "E100",
            Self::UnsupportedType(_) => "E101",
            Self::DocumentTypeMismatch { .. } => "E102",
            Self::UnsupportedOperation { .. } => "E200",
            Self::DuplicateOperation { .. } => "E201",
            Self::ReadOnlyContext(_) => "E202",
            Self::MissingParameter { .. } => "E300",
            Self::InvalidParameter { .. } => "E301",
            Self::Save { .. } => "E400",
            Self::DocumentLibrary(_) => "E401",
            Self::OperationFailed { source, .. } => source.code(),
            Self::SessionLimitReached(_) => "E500",
            Self::Other(_) | Self::Io(_) | Self::Json(_) => "E9999",
        }
    }

    /// Get suggestion for how to fix this error
    pub fn suggestion(&self) -> Option<String> {
        match self {
            Self::SessionNotFound(_) => Some("open the document again to get a new session".to_string()),
            Self::UnsupportedOperation { domain, .. } => {
                Some(format!("folio operations --type {}", domain))
            }
            Self::MissingParameter { name, .. } => Some(format!("provide the '{}' parameter", name)),
            Self::Save { .. } => Some("retry the save; the session still holds the unsaved changes".to_string()),
            Self::SessionLimitReached(_) => Some("close sessions you no longer need".to_string()),
            Self::OperationFailed { source, .. } => source.suggestion(),
            _ => None,
        }
    }

    /// The innermost error, looking through operation-failure wrappers
    pub fn root(&self) -> &Error {
        match self {
            Self::OperationFailed { source, .. } => source.root(),
            other => other,
        }
    }
}
