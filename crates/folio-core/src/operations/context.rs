//! Per-call binding between a handler and its document

use std::fs;
use std::path::PathBuf;

use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::session::{SessionId, TempFileManager};

enum Binding<'a, D> {
    Shared(&'a D),
    Exclusive(&'a mut D),
}

/// Document view handed to a handler for the duration of one call
///
/// The document is either a session's document (borrowed under the session
/// lock) or a transient document loaded for this call only.
pub struct OperationContext<'a, D> {
    binding: Binding<'a, D>,
    operation: &'static str,
    session_id: Option<&'a SessionId>,
    on_modified: &'a dyn Fn(),
    temp: &'a TempFileManager,
    scratch: Vec<PathBuf>,
}

impl<'a, D> OperationContext<'a, D> {
    pub(crate) fn exclusive(
        document: &'a mut D,
        operation: &'static str,
        session_id: Option<&'a SessionId>,
        on_modified: &'a dyn Fn(),
        temp: &'a TempFileManager,
    ) -> Self {
        Self {
            binding: Binding::Exclusive(document),
            operation,
            session_id,
            on_modified,
            temp,
            scratch: Vec::new(),
        }
    }

    pub(crate) fn shared(
        document: &'a D,
        operation: &'static str,
        session_id: Option<&'a SessionId>,
        on_modified: &'a dyn Fn(),
        temp: &'a TempFileManager,
    ) -> Self {
        Self {
            binding: Binding::Shared(document),
            operation,
            session_id,
            on_modified,
            temp,
            scratch: Vec::new(),
        }
    }

    pub fn document(&self) -> &D {
        match &self.binding {
            Binding::Shared(document) => *document,
            Binding::Exclusive(document) => &**document,
        }
    }

    /// Mutable document access; fails for read-only operations
    pub fn document_mut(&mut self) -> Result<&mut D> {
        match &mut self.binding {
            Binding::Exclusive(document) => Ok(&mut **document),
            Binding::Shared(_) => Err(Error::ReadOnlyContext(self.operation.to_string())),
        }
    }

    pub fn is_read_only(&self) -> bool {
        matches!(self.binding, Binding::Shared(_))
    }

    /// Record that the document was changed by this call
    pub fn mark_modified(&self) {
        if self.is_read_only() {
            warn!(operation = self.operation, "Read-only operation reported a modification; ignored");
            return;
        }
        (self.on_modified)();
    }

    pub fn operation(&self) -> &'static str {
        self.operation
    }

    /// Session the document belongs to; None for transient calls
    pub fn session_id(&self) -> Option<&SessionId> {
        self.session_id
    }

    /// Allocate a scratch file for this call
    ///
    /// Scratch files are adopted by the session after a successful call, and
    /// released otherwise.
    pub fn allocate_scratch(&mut self, extension_hint: &str) -> Result<PathBuf> {
        let path = self.temp.allocate(extension_hint)?;
        self.scratch.push(path.clone());
        Ok(path)
    }

    /// Write `data` to `output_path`, or to a fresh scratch file when None
    pub fn write_output(
        &mut self,
        output_path: Option<PathBuf>,
        extension_hint: &str,
        data: &[u8],
    ) -> Result<PathBuf> {
        let path = match output_path {
            Some(path) => {
                if let Some(parent) = path.parent() {
                    if !parent.as_os_str().is_empty() {
                        fs::create_dir_all(parent)?;
                    }
                }
                path
            }
            None => self.allocate_scratch(extension_hint)?,
        };
        fs::write(&path, data)?;
        debug!(operation = self.operation, path = %path.display(), bytes = data.len(), "Wrote operation output");
        Ok(path)
    }

    pub(crate) fn into_scratch(self) -> Vec<PathBuf> {
        self.scratch
    }
}
