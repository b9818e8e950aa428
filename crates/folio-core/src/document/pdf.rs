//! PDF document model

use std::collections::BTreeMap;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};

use super::{LibraryError, LibraryResult, check_index};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PdfDocument {
    #[serde(default)]
    pub pages: Vec<PdfPage>,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
    #[serde(default)]
    pub attachments: Vec<PdfAttachment>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PdfPage {
    pub text: String,
}

/// An embedded file; `data` is base64 encoded
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PdfAttachment {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub data: String,
}

impl PdfAttachment {
    pub fn new(name: impl Into<String>, bytes: &[u8], description: Option<String>) -> Self {
        Self {
            name: name.into(),
            description,
            data: STANDARD.encode(bytes),
        }
    }

    /// Decoded attachment payload
    pub fn bytes(&self) -> LibraryResult<Vec<u8>> {
        STANDARD.decode(&self.data).map_err(|e| {
            LibraryError::Parse(format!("attachment '{}' is corrupt: {}", self.name, e))
        })
    }
}

impl PdfDocument {
    pub fn add_page(&mut self, text: impl Into<String>) -> usize {
        self.pages.push(PdfPage { text: text.into() });
        self.pages.len()
    }

    /// Text of one page (1-based), or all pages separated by form feeds
    pub fn text(&self, page: Option<usize>) -> LibraryResult<String> {
        match page {
            Some(0) => Err(LibraryError::Invalid("page numbers start at 1".to_string())),
            Some(number) => {
                check_index("page", number - 1, self.pages.len())?;
                Ok(self.pages[number - 1].text.clone())
            }
            None => Ok(self
                .pages
                .iter()
                .map(|p| p.text.as_str())
                .collect::<Vec<_>>()
                .join("\u{c}")),
        }
    }

    /// Embed a file; names must be unique
    pub fn add_attachment(&mut self, attachment: PdfAttachment) -> LibraryResult<()> {
        if self.attachments.iter().any(|a| a.name == attachment.name) {
            return Err(LibraryError::Invalid(format!(
                "attachment '{}' already exists",
                attachment.name
            )));
        }
        self.attachments.push(attachment);
        Ok(())
    }

    pub fn attachment(&self, name: &str) -> LibraryResult<&PdfAttachment> {
        self.attachments
            .iter()
            .find(|a| a.name == name)
            .ok_or_else(|| LibraryError::Invalid(format!("attachment '{}' not found", name)))
    }
}
