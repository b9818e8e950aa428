//! Word document model

use serde::{Deserialize, Serialize};

use super::{LibraryError, LibraryResult, check_index};

/// A word-processing document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WordDocument {
    #[serde(default)]
    pub paragraphs: Vec<Paragraph>,
    #[serde(default)]
    pub footnotes: Vec<Note>,
    #[serde(default)]
    pub endnotes: Vec<Note>,
}

/// A single paragraph of text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Paragraph {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
}

/// A footnote or endnote anchored to a paragraph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    /// Reference number shown in the body text, unique per note kind
    pub id: u32,
    pub text: String,
    /// Paragraph carrying the reference mark (None = end of document)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paragraph_index: Option<usize>,
}

/// Which note collection an edit targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoteKind {
    Footnote,
    Endnote,
}

impl NoteKind {
    /// Human-readable name used in results and error messages
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Footnote => "footnote",
            Self::Endnote => "endnote",
        }
    }
}

impl WordDocument {
    /// Append a paragraph, returning its index
    pub fn add_paragraph(&mut self, text: impl Into<String>, style: Option<String>) -> usize {
        self.paragraphs.push(Paragraph {
            text: text.into(),
            style,
        });
        self.paragraphs.len() - 1
    }

    /// Insert a paragraph before `index` (`index == len` appends)
    pub fn insert_paragraph(
        &mut self,
        index: usize,
        text: impl Into<String>,
        style: Option<String>,
    ) -> LibraryResult<()> {
        if index > self.paragraphs.len() {
            return Err(LibraryError::Invalid(format!(
                "paragraph index {} is out of range (count: {})",
                index,
                self.paragraphs.len()
            )));
        }
        self.paragraphs.insert(
            index,
            Paragraph {
                text: text.into(),
                style,
            },
        );
        self.shift_note_anchors(index, 1);
        Ok(())
    }

    /// Remove the paragraph at `index`, along with notes anchored to it
    pub fn delete_paragraph(&mut self, index: usize) -> LibraryResult<Paragraph> {
        check_index("paragraph", index, self.paragraphs.len())?;
        let removed = self.paragraphs.remove(index);

        for notes in [&mut self.footnotes, &mut self.endnotes] {
            notes.retain(|note| note.paragraph_index != Some(index));
            for note in notes.iter_mut() {
                if let Some(anchor) = note.paragraph_index {
                    if anchor > index {
                        note.paragraph_index = Some(anchor - 1);
                    }
                }
            }
        }

        Ok(removed)
    }

    /// Replace every occurrence of `find`, returning the number of replacements
    pub fn replace_text(&mut self, find: &str, replace: &str) -> LibraryResult<usize> {
        if find.is_empty() {
            return Err(LibraryError::Invalid(
                "search text cannot be empty".to_string(),
            ));
        }

        let mut count = 0;
        for paragraph in &mut self.paragraphs {
            let hits = paragraph.text.matches(find).count();
            if hits > 0 {
                paragraph.text = paragraph.text.replace(find, replace);
                count += hits;
            }
        }
        Ok(count)
    }

    /// Body text, one paragraph per line
    pub fn text(&self) -> String {
        self.paragraphs
            .iter()
            .map(|p| p.text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Notes of the given kind
    pub fn notes(&self, kind: NoteKind) -> &[Note] {
        match kind {
            NoteKind::Footnote => &self.footnotes,
            NoteKind::Endnote => &self.endnotes,
        }
    }

    /// Mutable notes of the given kind
    pub fn notes_mut(&mut self, kind: NoteKind) -> &mut Vec<Note> {
        match kind {
            NoteKind::Footnote => &mut self.footnotes,
            NoteKind::Endnote => &mut self.endnotes,
        }
    }

    fn shift_note_anchors(&mut self, from: usize, by: usize) {
        for notes in [&mut self.footnotes, &mut self.endnotes] {
            for note in notes.iter_mut() {
                if let Some(anchor) = note.paragraph_index {
                    if anchor >= from {
                        note.paragraph_index = Some(anchor + by);
                    }
                }
            }
        }
    }
}
