//! The per-domain handler tables and the generic invocation step

use std::cell::Cell;
use std::path::PathBuf;

use serde_json::Value;
use tracing::warn;

use crate::document::{
    Document, DocumentKind, DomainDocument, EmailMessage, PdfDocument, Presentation, Workbook,
    WordDocument,
};
use crate::error::{Error, Result};
use crate::operations::{
    self, Access, HandlerRegistry, OperationContext, OperationDescriptor, Parameters, ResultType,
};
use crate::session::{SessionId, TempFileManager};

/// One handler table per document domain
#[derive(Debug)]
pub struct Registries {
    pub word: HandlerRegistry<WordDocument>,
    pub excel: HandlerRegistry<Workbook>,
    pub powerpoint: HandlerRegistry<Presentation>,
    pub pdf: HandlerRegistry<PdfDocument>,
    pub email: HandlerRegistry<EmailMessage>,
}

/// Inputs of one handler invocation
pub(crate) struct Call<'a> {
    pub operation: &'a str,
    pub params: Value,
    pub session_id: Option<&'a SessionId>,
    pub temp: &'a TempFileManager,
}

/// Outcome of a successful handler invocation
#[derive(Debug)]
pub(crate) struct Invocation {
    pub operation: &'static str,
    pub result_type: ResultType,
    pub value: Value,
    pub modified: bool,
    /// Scratch files allocated by the handler
    pub scratch: Vec<PathBuf>,
}

impl Registries {
    /// The built-in handler set for every domain
    ///
    /// Fails if any domain registers the same operation name twice.
    pub fn builtin() -> Result<Self> {
        Ok(Self {
            word: operations::word::registry()?,
            excel: operations::excel::registry()?,
            powerpoint: operations::powerpoint::registry()?,
            pdf: operations::pdf::registry()?,
            email: operations::email::registry()?,
        })
    }

    /// Sorted operation descriptors for one domain
    pub fn operations(&self, kind: DocumentKind) -> Vec<OperationDescriptor> {
        match kind {
            DocumentKind::Word => self.word.operations(),
            DocumentKind::Excel => self.excel.operations(),
            DocumentKind::PowerPoint => self.powerpoint.operations(),
            DocumentKind::Pdf => self.pdf.operations(),
            DocumentKind::Email => self.email.operations(),
        }
    }

    /// Descriptor of one operation, or `UnsupportedOperation`
    pub fn describe(&self, kind: DocumentKind, operation: &str) -> Result<OperationDescriptor> {
        match kind {
            DocumentKind::Word => self.word.resolve(operation).map(|h| h.descriptor()),
            DocumentKind::Excel => self.excel.resolve(operation).map(|h| h.descriptor()),
            DocumentKind::PowerPoint => self.powerpoint.resolve(operation).map(|h| h.descriptor()),
            DocumentKind::Pdf => self.pdf.resolve(operation).map(|h| h.descriptor()),
            DocumentKind::Email => self.email.resolve(operation).map(|h| h.descriptor()),
        }
    }

    /// Resolve and run `call.operation` against `document`
    ///
    /// The registry is selected by `kind`. Scratch files of a failed call are
    /// released before the error is returned.
    pub(crate) fn invoke(
        &self,
        kind: DocumentKind,
        document: &mut Document,
        call: Call<'_>,
    ) -> Result<Invocation> {
        match kind {
            DocumentKind::Word => invoke_in(&self.word, document, call),
            DocumentKind::Excel => invoke_in(&self.excel, document, call),
            DocumentKind::PowerPoint => invoke_in(&self.powerpoint, document, call),
            DocumentKind::Pdf => invoke_in(&self.pdf, document, call),
            DocumentKind::Email => invoke_in(&self.email, document, call),
        }
    }
}

fn invoke_in<D: DomainDocument>(
    registry: &HandlerRegistry<D>,
    document: &mut Document,
    call: Call<'_>,
) -> Result<Invocation> {
    let handler = registry.resolve(call.operation)?;
    let operation = handler.operation();

    let params = Parameters::from_value(operation, call.params)?;
    params.validate(handler.parameters())?;

    let actual = document.kind();
    let document = D::from_document_mut(document).ok_or_else(|| Error::DocumentTypeMismatch {
        expected: D::KIND.to_string(),
        actual: actual.to_string(),
    })?;

    let modified = Cell::new(false);
    let on_modified = || modified.set(true);
    let mut context = match handler.access() {
        Access::Read => {
            OperationContext::shared(&*document, operation, call.session_id, &on_modified, call.temp)
        }
        Access::Write => {
            OperationContext::exclusive(document, operation, call.session_id, &on_modified, call.temp)
        }
    };

    let result = handler.execute(&mut context, &params);
    let scratch = context.into_scratch();

    match result {
        Ok(value) => Ok(Invocation {
            operation,
            result_type: handler.result_type(),
            value,
            modified: modified.get(),
            scratch,
        }),
        Err(e) => {
            for path in &scratch {
                if let Err(release_err) = call.temp.release(path) {
                    warn!(path = %path.display(), error = %release_err, "Failed to release scratch file");
                }
            }
            Err(e)
        }
    }
}
