//! Operation dispatch
//!
//! The [`Dispatcher`] is the composition root for one call: it finds the
//! document (a session's, or a transient one loaded from disk), resolves the
//! handler by name, validates parameters, runs the handler and commits the
//! modification state back into the session.

mod registries;

pub use registries::Registries;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::document::DocumentKind;
use crate::error::{Error, Result};
use crate::operations::ResultType;
use crate::session::{DocumentSource, SessionId, SessionStore, TempFileManager};
use registries::Call;

/// Result of one dispatched operation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OperationOutput {
    pub operation: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    pub result_type: ResultType,
    /// Whether the call changed the document
    pub modified: bool,
    pub value: Value,
    /// Where a modified transient document was written
    #[serde(skip_serializing_if = "Option::is_none")]
    pub saved_to: Option<PathBuf>,
}

/// A one-shot call against a document that is not held in a session
#[derive(Debug, Clone)]
pub struct TransientCall {
    /// Document type; inferred from the path extension when None
    pub kind: Option<DocumentKind>,
    pub path: PathBuf,
    pub operation: String,
    pub params: Value,
    /// Destination for a modified document; defaults to `path`
    pub output_path: Option<PathBuf>,
}

/// Routes operation calls to handlers
#[derive(Debug)]
pub struct Dispatcher {
    store: Arc<SessionStore>,
    registries: Registries,
}

impl Dispatcher {
    pub fn new(store: Arc<SessionStore>, registries: Registries) -> Self {
        Self { store, registries }
    }

    /// Dispatcher over `store` with the built-in handler set
    pub fn with_builtin_handlers(store: Arc<SessionStore>) -> Result<Self> {
        Ok(Self::new(store, Registries::builtin()?))
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    pub fn registries(&self) -> &Registries {
        &self.registries
    }

    /// Open a session; shorthand for [`SessionStore::open`]
    pub async fn open(&self, kind: DocumentKind, source: DocumentSource) -> Result<SessionId> {
        self.store.open(kind, source).await
    }

    /// Run `operation` against an open session's document
    ///
    /// Runs under the session lock. On success the session is marked dirty if
    /// the handler reported a modification, and scratch files the handler
    /// allocated become owned by the session. On failure nothing is marked.
    pub async fn execute(
        &self,
        session_id: &SessionId,
        operation: &str,
        params: Value,
    ) -> Result<OperationOutput> {
        debug!(session_id = %session_id, operation = operation, "Dispatching operation");

        let invocation = self
            .store
            .with_session_access(session_id, |access| {
                let (session, document, temp_paths) = access.into_parts();
                let call = Call {
                    operation,
                    params,
                    session_id: Some(session.id()),
                    temp: self.store.temp(),
                };

                let mut invocation = self
                    .registries
                    .invoke(session.kind(), document, call)
                    .map_err(|e| operation_failed(operation, Some(session_id), e))?;

                if invocation.modified {
                    session.set_dirty(true);
                }
                temp_paths.append(&mut invocation.scratch);
                Ok(invocation)
            })
            .await?;

        if invocation.modified {
            info!(session_id = %session_id, operation = invocation.operation, "Session modified");
        }

        Ok(OperationOutput {
            operation: invocation.operation.to_string(),
            session_id: Some(session_id.to_string()),
            result_type: invocation.result_type,
            modified: invocation.modified,
            value: invocation.value,
            saved_to: None,
        })
    }

    /// Run `operation` against a document loaded for this call only
    ///
    /// A modified document is written to `output_path`, or back to `path`.
    /// Scratch files are released afterwards unless the result refers to them.
    pub async fn execute_transient(&self, call: TransientCall) -> Result<OperationOutput> {
        let TransientCall {
            kind,
            path,
            operation,
            params,
            output_path,
        } = call;

        let kind = match kind {
            Some(kind) => kind,
            None => DocumentKind::from_path(&path)
                .ok_or_else(|| Error::UnsupportedType(path.display().to_string()))?,
        };
        // Fail fast before paying for the load
        self.registries.describe(kind, &operation)?;

        let library = Arc::clone(self.store.library());
        let load_path = path.clone();
        let mut document = tokio::task::spawn_blocking(move || library.load(kind, &load_path))
            .await
            .map_err(|e| Error::Other(format!("Document load task failed: {}", e)))?
            .map_err(|e| Error::InvalidDocument {
                source_name: path.display().to_string(),
                reason: e.to_string(),
            })?;

        let temp: &TempFileManager = self.store.temp();
        let call = Call {
            operation: &operation,
            params,
            session_id: None,
            temp,
        };
        let invocation = self
            .registries
            .invoke(kind, &mut document, call)
            .map_err(|e| operation_failed(&operation, None, e))?;

        for scratch in &invocation.scratch {
            if value_mentions(&invocation.value, scratch) {
                continue;
            }
            if let Err(e) = temp.release(scratch) {
                warn!(path = %scratch.display(), error = %e, "Failed to release scratch file");
            }
        }

        let saved_to = if invocation.modified {
            let target = output_path.unwrap_or_else(|| path.clone());
            self.store
                .write_document(document, target.clone())
                .await?
                .map_err(|e| operation_failed(&operation, None, Error::DocumentLibrary(e)))?;
            info!(operation = invocation.operation, path = %target.display(), "Transient document saved");
            Some(target)
        } else {
            None
        };

        Ok(OperationOutput {
            operation: invocation.operation.to_string(),
            session_id: None,
            result_type: invocation.result_type,
            modified: invocation.modified,
            value: invocation.value,
            saved_to,
        })
    }
}

/// Tag a failure with the operation and session it came from
///
/// Resolution failures are returned as-is.
fn operation_failed(operation: &str, session_id: Option<&SessionId>, error: Error) -> Error {
    match error {
        Error::UnsupportedOperation { .. } | Error::OperationFailed { .. } => error,
        source => Error::OperationFailed {
            operation: operation.to_string(),
            session_id: session_id.map(|id| id.to_string()),
            source: Box::new(source),
        },
    }
}

/// Whether `value` contains `path` as a string anywhere
fn value_mentions(value: &Value, path: &Path) -> bool {
    match value {
        Value::String(s) => Path::new(s) == path,
        Value::Array(items) => items.iter().any(|item| value_mentions(item, path)),
        Value::Object(map) => map.values().any(|item| value_mentions(item, path)),
        _ => false,
    }
}
