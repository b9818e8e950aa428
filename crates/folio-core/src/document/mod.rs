//! Document library boundary
//!
//! The session and dispatch layers treat documents as opaque values obtained
//! from a [`DocumentLibrary`]. Folio ships [`JsonDocumentLibrary`], a small
//! built-in library that stores each domain model as tagged JSON.
//!
//! # Domains
//!
//! - **Word**: paragraphs plus footnotes and endnotes
//! - **Excel**: named worksheets of string cells
//! - **PowerPoint**: slides with title, body and speaker notes
//! - **PDF**: pages, metadata and embedded attachments
//! - **Email**: headers, body and attachments

pub mod email;
pub mod excel;
pub mod pdf;
pub mod powerpoint;
pub mod word;

use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::Error;

pub use email::{EmailAttachment, EmailMessage, RecipientKind};
pub use excel::{Workbook, Worksheet};
pub use pdf::{PdfAttachment, PdfDocument, PdfPage};
pub use powerpoint::{Presentation, Slide};
pub use word::{Note, NoteKind, Paragraph, WordDocument};

/// Result type for document library calls
pub type LibraryResult<T> = std::result::Result<T, LibraryError>;

/// Failures raised by a document library
#[derive(Error, Debug)]
pub enum LibraryError {
    /// The source could not be parsed
    #[error("Parse error: {0}")]
    Parse(String),

    /// The document content is not valid for the requested edit
    #[error("{0}")]
    Invalid(String),

    /// I/O error while reading or writing a document
    #[error("Document I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Document type tag, fixed for the lifetime of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    Word,
    Excel,
    #[serde(alias = "power_point")]
    PowerPoint,
    Pdf,
    Email,
}

impl DocumentKind {
    /// All supported document kinds
    pub const ALL: [DocumentKind; 5] = [
        Self::Word,
        Self::Excel,
        Self::PowerPoint,
        Self::Pdf,
        Self::Email,
    ];

    /// Convert to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Word => "word",
            Self::Excel => "excel",
            Self::PowerPoint => "powerpoint",
            Self::Pdf => "pdf",
            Self::Email => "email",
        }
    }

    /// Default file extension used when materializing documents of this kind
    pub fn default_extension(&self) -> &'static str {
        match self {
            Self::Word => "docx",
            Self::Excel => "xlsx",
            Self::PowerPoint => "pptx",
            Self::Pdf => "pdf",
            Self::Email => "eml",
        }
    }

    /// Infer the document kind from a file path's extension
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(|ext| ext.parse().ok())
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for DocumentKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().trim_start_matches('.').to_ascii_lowercase().as_str() {
            "word" | "docx" | "doc" => Ok(Self::Word),
            "excel" | "xlsx" | "xls" => Ok(Self::Excel),
            "powerpoint" | "pptx" | "ppt" => Ok(Self::PowerPoint),
            "pdf" => Ok(Self::Pdf),
            "email" | "eml" | "msg" => Ok(Self::Email),
            _ => Err(Error::UnsupportedType(s.to_string())),
        }
    }
}

/// An in-memory parsed document of any supported kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "format", rename_all = "snake_case")]
pub enum Document {
    Word(WordDocument),
    Excel(Workbook),
    #[serde(rename = "powerpoint")]
    PowerPoint(Presentation),
    Pdf(PdfDocument),
    Email(EmailMessage),
}

impl Document {
    /// An empty document of the given kind
    pub fn empty(kind: DocumentKind) -> Self {
        match kind {
            DocumentKind::Word => Self::Word(WordDocument::default()),
            DocumentKind::Excel => Self::Excel(Workbook::new()),
            DocumentKind::PowerPoint => Self::PowerPoint(Presentation::default()),
            DocumentKind::Pdf => Self::Pdf(PdfDocument::default()),
            DocumentKind::Email => Self::Email(EmailMessage::default()),
        }
    }

    /// The kind tag of this document
    pub fn kind(&self) -> DocumentKind {
        match self {
            Self::Word(_) => DocumentKind::Word,
            Self::Excel(_) => DocumentKind::Excel,
            Self::PowerPoint(_) => DocumentKind::PowerPoint,
            Self::Pdf(_) => DocumentKind::Pdf,
            Self::Email(_) => DocumentKind::Email,
        }
    }
}

/// A concrete per-domain document model that can be viewed inside a [`Document`]
pub trait DomainDocument: Send + Sync + 'static {
    /// The kind tag for this model
    const KIND: DocumentKind;

    /// Borrow this model out of a document, if the kinds match
    fn from_document(document: &Document) -> Option<&Self>;

    /// Mutably borrow this model out of a document, if the kinds match
    fn from_document_mut(document: &mut Document) -> Option<&mut Self>;
}

macro_rules! domain_document {
    ($model:ty, $variant:ident) => {
        impl DomainDocument for $model {
            const KIND: DocumentKind = DocumentKind::$variant;

            fn from_document(document: &Document) -> Option<&Self> {
                match document {
                    Document::$variant(inner) => Some(inner),
                    _ => None,
                }
            }

            fn from_document_mut(document: &mut Document) -> Option<&mut Self> {
                match document {
                    Document::$variant(inner) => Some(inner),
                    _ => None,
                }
            }
        }

        impl From<$model> for Document {
            fn from(model: $model) -> Self {
                Document::$variant(model)
            }
        }
    };
}

domain_document!(WordDocument, Word);
domain_document!(Workbook, Excel);
domain_document!(Presentation, PowerPoint);
domain_document!(PdfDocument, Pdf);
domain_document!(EmailMessage, Email);

/// Loads and saves documents; the only way the core touches document bytes
pub trait DocumentLibrary: Send + Sync {
    /// Parse the document stored at `path`
    fn load(&self, kind: DocumentKind, path: &Path) -> LibraryResult<Document>;

    /// Serialize `document` to `path`
    fn save(&self, document: &Document, path: &Path) -> LibraryResult<()>;
}

/// Built-in library storing documents as tagged, pretty-printed JSON
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonDocumentLibrary;

impl DocumentLibrary for JsonDocumentLibrary {
    fn load(&self, kind: DocumentKind, path: &Path) -> LibraryResult<Document> {
        let data = fs::read(path)?;
        let document: Document = serde_json::from_slice(&data)
            .map_err(|e| LibraryError::Parse(format!("{}: {}", path.display(), e)))?;

        if document.kind() != kind {
            return Err(LibraryError::Parse(format!(
                "{} contains a {} document, not {}",
                path.display(),
                document.kind(),
                kind
            )));
        }

        Ok(document)
    }

    fn save(&self, document: &Document, path: &Path) -> LibraryResult<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let contents = serde_json::to_vec_pretty(document)
            .map_err(|e| LibraryError::Invalid(format!("Failed to serialize document: {}", e)))?;
        fs::write(path, contents)?;
        Ok(())
    }
}

/// Check a zero-based index against a collection length
pub(crate) fn check_index(what: &str, index: usize, len: usize) -> LibraryResult<()> {
    if index >= len {
        return Err(LibraryError::Invalid(format!(
            "{} index {} is out of range (count: {})",
            what, index, len
        )));
    }
    Ok(())
}
