//! Footnote and endnote operations
//!
//! Both note kinds share one implementation. The handler structs differ only
//! in the [`NoteKind`] they carry.

use serde_json::{Value, json};

use super::{Access, OperationContext, OperationHandler, ParamKind, ParamSpec, Parameters, ResultType};
use crate::document::{LibraryError, LibraryResult, Note, NoteKind, WordDocument, check_index};
use crate::error::Result;

/// Append a note, anchored to `paragraph_index` when given
pub(crate) fn add_note(
    document: &mut WordDocument,
    kind: NoteKind,
    text: &str,
    paragraph_index: Option<usize>,
) -> LibraryResult<Note> {
    if text.trim().is_empty() {
        return Err(LibraryError::Invalid(format!(
            "{} text cannot be empty",
            kind.display_name()
        )));
    }
    if let Some(index) = paragraph_index {
        check_index("paragraph", index, document.paragraphs.len())?;
    }

    let notes = document.notes_mut(kind);
    let id = notes
        .iter()
        .map(|note| note.id)
        .max()
        .unwrap_or(0)
        .checked_add(1)
        .ok_or_else(|| {
            LibraryError::Invalid(format!("no {} numbers left", kind.display_name()))
        })?;
    let note = Note {
        id,
        text: text.to_string(),
        paragraph_index,
    };
    notes.push(note.clone());
    Ok(note)
}

/// Remove the note with reference number `id`
pub(crate) fn delete_note(
    document: &mut WordDocument,
    kind: NoteKind,
    id: u32,
) -> LibraryResult<Note> {
    let notes = document.notes_mut(kind);
    let position = notes
        .iter()
        .position(|note| note.id == id)
        .ok_or_else(|| LibraryError::Invalid(format!("{} {} not found", kind.display_name(), id)))?;
    Ok(notes.remove(position))
}

fn note_json(kind: NoteKind, note: &Note) -> Value {
    json!({
        "kind": kind,
        "id": note.id,
        "text": note.text,
        "paragraphIndex": note.paragraph_index,
    })
}

const ADD_PARAMS: &[ParamSpec] = &[
    ParamSpec::required("text", ParamKind::String),
    ParamSpec::optional("paragraphIndex", ParamKind::Integer),
];

const DELETE_PARAMS: &[ParamSpec] = &[ParamSpec::required("noteId", ParamKind::Integer)];

/// `add_footnote` / `add_endnote`
pub struct AddNote(pub NoteKind);

impl OperationHandler<WordDocument> for AddNote {
    fn operation(&self) -> &'static str {
        match self.0 {
            NoteKind::Footnote => "add_footnote",
            NoteKind::Endnote => "add_endnote",
        }
    }

    fn description(&self) -> &'static str {
        match self.0 {
            NoteKind::Footnote => "Add a footnote, optionally anchored to a paragraph",
            NoteKind::Endnote => "Add an endnote, optionally anchored to a paragraph",
        }
    }

    fn parameters(&self) -> &'static [ParamSpec] {
        ADD_PARAMS
    }

    fn result_type(&self) -> ResultType {
        ResultType::Object
    }

    fn execute(
        &self,
        context: &mut OperationContext<'_, WordDocument>,
        params: &Parameters,
    ) -> Result<Value> {
        let text: String = params.required("text")?;
        let paragraph_index: Option<usize> = params.get("paragraphIndex")?;

        let note = add_note(context.document_mut()?, self.0, &text, paragraph_index)?;
        context.mark_modified();
        Ok(note_json(self.0, &note))
    }
}

/// `list_footnotes` / `list_endnotes`
pub struct ListNotes(pub NoteKind);

impl OperationHandler<WordDocument> for ListNotes {
    fn operation(&self) -> &'static str {
        match self.0 {
            NoteKind::Footnote => "list_footnotes",
            NoteKind::Endnote => "list_endnotes",
        }
    }

    fn description(&self) -> &'static str {
        match self.0 {
            NoteKind::Footnote => "List all footnotes",
            NoteKind::Endnote => "List all endnotes",
        }
    }

    fn access(&self) -> Access {
        Access::Read
    }

    fn result_type(&self) -> ResultType {
        ResultType::List
    }

    fn execute(
        &self,
        context: &mut OperationContext<'_, WordDocument>,
        _params: &Parameters,
    ) -> Result<Value> {
        let notes = context.document().notes(self.0);
        Ok(Value::Array(
            notes.iter().map(|note| note_json(self.0, note)).collect(),
        ))
    }
}

/// `delete_footnote` / `delete_endnote`
pub struct DeleteNote(pub NoteKind);

impl OperationHandler<WordDocument> for DeleteNote {
    fn operation(&self) -> &'static str {
        match self.0 {
            NoteKind::Footnote => "delete_footnote",
            NoteKind::Endnote => "delete_endnote",
        }
    }

    fn description(&self) -> &'static str {
        match self.0 {
            NoteKind::Footnote => "Delete a footnote by reference number",
            NoteKind::Endnote => "Delete an endnote by reference number",
        }
    }

    fn parameters(&self) -> &'static [ParamSpec] {
        DELETE_PARAMS
    }

    fn result_type(&self) -> ResultType {
        ResultType::Object
    }

    fn execute(
        &self,
        context: &mut OperationContext<'_, WordDocument>,
        params: &Parameters,
    ) -> Result<Value> {
        let id: u32 = params.required("noteId")?;
        let note = delete_note(context.document_mut()?, self.0, id)?;
        context.mark_modified();
        Ok(note_json(self.0, &note))
    }
}
