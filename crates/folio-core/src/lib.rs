//! Folio Core Library
//!
//! This crate provides the core functionality for Folio, including:
//! - Document sessions (pooled handles, per-session locking, idle expiry)
//! - Scratch file management
//! - Operation handlers for Word, Excel, PowerPoint, PDF and Email documents
//! - Dispatch of named operations against sessions or transient documents
//! - A JSON request/response envelope for remote callers

pub mod document;
pub mod session;
pub mod operations;
pub mod dispatch;
pub mod api;
pub mod config;
pub mod error;

pub use error::{Error, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::dispatch::{Dispatcher, OperationOutput, Registries, TransientCall};
    pub use crate::document::{Document, DocumentKind, DocumentLibrary, JsonDocumentLibrary};
    pub use crate::error::{Error, Result};
    pub use crate::session::{DocumentSource, SessionId, SessionStore, SessionStoreConfig};
}
