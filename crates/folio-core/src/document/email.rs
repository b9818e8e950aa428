//! Email message model

use std::str::FromStr;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};

use super::{LibraryError, LibraryResult};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EmailMessage {
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub from: String,
    #[serde(default)]
    pub to: Vec<String>,
    #[serde(default)]
    pub cc: Vec<String>,
    #[serde(default)]
    pub bcc: Vec<String>,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub html: bool,
    #[serde(default)]
    pub attachments: Vec<EmailAttachment>,
}

/// A MIME attachment; `data` is base64 encoded
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmailAttachment {
    pub name: String,
    #[serde(default = "default_content_type")]
    pub content_type: String,
    pub data: String,
}

fn default_content_type() -> String {
    "application/octet-stream".to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecipientKind {
    To,
    Cc,
    Bcc,
}

impl FromStr for RecipientKind {
    type Err = LibraryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "to" => Ok(Self::To),
            "cc" => Ok(Self::Cc),
            "bcc" => Ok(Self::Bcc),
            other => Err(LibraryError::Invalid(format!(
                "unknown recipient kind '{}' (expected to, cc or bcc)",
                other
            ))),
        }
    }
}

impl EmailAttachment {
    pub fn new(name: impl Into<String>, content_type: Option<String>, bytes: &[u8]) -> Self {
        Self {
            name: name.into(),
            content_type: content_type.unwrap_or_else(default_content_type),
            data: STANDARD.encode(bytes),
        }
    }

    pub fn bytes(&self) -> LibraryResult<Vec<u8>> {
        STANDARD.decode(&self.data).map_err(|e| {
            LibraryError::Parse(format!("attachment '{}' is corrupt: {}", self.name, e))
        })
    }
}

impl EmailMessage {
    /// Add a recipient; returns false if the address was already present
    pub fn add_recipient(&mut self, kind: RecipientKind, address: &str) -> LibraryResult<bool> {
        let address = address.trim();
        if !address.contains('@') {
            return Err(LibraryError::Invalid(format!(
                "'{}' is not an email address",
                address
            )));
        }

        let list = match kind {
            RecipientKind::To => &mut self.to,
            RecipientKind::Cc => &mut self.cc,
            RecipientKind::Bcc => &mut self.bcc,
        };
        if list.iter().any(|a| a.eq_ignore_ascii_case(address)) {
            return Ok(false);
        }
        list.push(address.to_string());
        Ok(true)
    }

    pub fn add_attachment(&mut self, attachment: EmailAttachment) -> LibraryResult<()> {
        if self.attachments.iter().any(|a| a.name == attachment.name) {
            return Err(LibraryError::Invalid(format!(
                "attachment '{}' already exists",
                attachment.name
            )));
        }
        self.attachments.push(attachment);
        Ok(())
    }

    pub fn attachment(&self, name: &str) -> LibraryResult<&EmailAttachment> {
        self.attachments
            .iter()
            .find(|a| a.name == name)
            .ok_or_else(|| LibraryError::Invalid(format!("attachment '{}' not found", name)))
    }
}
