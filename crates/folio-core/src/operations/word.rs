//! Word document operations

use serde_json::{Value, json};

use super::notes::{AddNote, DeleteNote, ListNotes};
use super::{
    Access, HandlerRegistry, OperationContext, OperationHandler, ParamKind, ParamSpec, Parameters,
    ResultType,
};
use crate::document::{NoteKind, WordDocument};
use crate::error::Result;

/// Build the Word handler table
pub fn registry() -> Result<HandlerRegistry<WordDocument>> {
    HandlerRegistry::<WordDocument>::new()
        .with(GetText)?
        .with(AddParagraph)?
        .with(InsertParagraph)?
        .with(DeleteParagraph)?
        .with(ReplaceText)?
        .with(AddNote(NoteKind::Footnote))?
        .with(AddNote(NoteKind::Endnote))?
        .with(ListNotes(NoteKind::Footnote))?
        .with(ListNotes(NoteKind::Endnote))?
        .with(DeleteNote(NoteKind::Footnote))?
        .with(DeleteNote(NoteKind::Endnote))
}

pub struct GetText;

impl OperationHandler<WordDocument> for GetText {
    fn operation(&self) -> &'static str {
        "get_text"
    }

    fn description(&self) -> &'static str {
        "Extract the document body as plain text, one paragraph per line"
    }

    fn access(&self) -> Access {
        Access::Read
    }

    fn result_type(&self) -> ResultType {
        ResultType::Text
    }

    fn execute(
        &self,
        context: &mut OperationContext<'_, WordDocument>,
        _params: &Parameters,
    ) -> Result<Value> {
        Ok(Value::String(context.document().text()))
    }
}

const ADD_PARAGRAPH_PARAMS: &[ParamSpec] = &[
    ParamSpec::required("text", ParamKind::String),
    ParamSpec::optional("style", ParamKind::String),
];

pub struct AddParagraph;

impl OperationHandler<WordDocument> for AddParagraph {
    fn operation(&self) -> &'static str {
        "add_paragraph"
    }

    fn description(&self) -> &'static str {
        "Append a paragraph to the end of the document"
    }

    fn parameters(&self) -> &'static [ParamSpec] {
        ADD_PARAGRAPH_PARAMS
    }

    fn result_type(&self) -> ResultType {
        ResultType::Number
    }

    fn execute(
        &self,
        context: &mut OperationContext<'_, WordDocument>,
        params: &Parameters,
    ) -> Result<Value> {
        let text: String = params.required("text")?;
        let style: Option<String> = params.get("style")?;

        let index = context.document_mut()?.add_paragraph(text, style);
        context.mark_modified();
        Ok(json!(index))
    }
}

const INSERT_PARAGRAPH_PARAMS: &[ParamSpec] = &[
    ParamSpec::required("index", ParamKind::Integer),
    ParamSpec::required("text", ParamKind::String),
    ParamSpec::optional("style", ParamKind::String),
];

pub struct InsertParagraph;

impl OperationHandler<WordDocument> for InsertParagraph {
    fn operation(&self) -> &'static str {
        "insert_paragraph"
    }

    fn description(&self) -> &'static str {
        "Insert a paragraph before the given index"
    }

    fn parameters(&self) -> &'static [ParamSpec] {
        INSERT_PARAGRAPH_PARAMS
    }

    fn result_type(&self) -> ResultType {
        ResultType::Number
    }

    fn execute(
        &self,
        context: &mut OperationContext<'_, WordDocument>,
        params: &Parameters,
    ) -> Result<Value> {
        let index: usize = params.required("index")?;
        let text: String = params.required("text")?;
        let style: Option<String> = params.get("style")?;

        context
            .document_mut()?
            .insert_paragraph(index, text, style)?;
        context.mark_modified();
        Ok(json!(index))
    }
}

const DELETE_PARAGRAPH_PARAMS: &[ParamSpec] = &[ParamSpec::required("index", ParamKind::Integer)];

pub struct DeleteParagraph;

impl OperationHandler<WordDocument> for DeleteParagraph {
    fn operation(&self) -> &'static str {
        "delete_paragraph"
    }

    fn description(&self) -> &'static str {
        "Delete a paragraph and any notes anchored to it"
    }

    fn parameters(&self) -> &'static [ParamSpec] {
        DELETE_PARAGRAPH_PARAMS
    }

    fn result_type(&self) -> ResultType {
        ResultType::Text
    }

    fn execute(
        &self,
        context: &mut OperationContext<'_, WordDocument>,
        params: &Parameters,
    ) -> Result<Value> {
        let index: usize = params.required("index")?;
        let removed = context.document_mut()?.delete_paragraph(index)?;
        context.mark_modified();
        Ok(Value::String(removed.text))
    }
}

const REPLACE_TEXT_PARAMS: &[ParamSpec] = &[
    ParamSpec::required("find", ParamKind::String),
    ParamSpec::required("replace", ParamKind::String),
];

pub struct ReplaceText;

impl OperationHandler<WordDocument> for ReplaceText {
    fn operation(&self) -> &'static str {
        "replace_text"
    }

    fn description(&self) -> &'static str {
        "Replace every occurrence of a string in the document body"
    }

    fn parameters(&self) -> &'static [ParamSpec] {
        REPLACE_TEXT_PARAMS
    }

    fn result_type(&self) -> ResultType {
        ResultType::Number
    }

    fn execute(
        &self,
        context: &mut OperationContext<'_, WordDocument>,
        params: &Parameters,
    ) -> Result<Value> {
        let find: String = params.required("find")?;
        let replace: String = params.required("replace")?;

        let count = context.document_mut()?.replace_text(&find, &replace)?;
        // Nothing matched, nothing changed
        if count > 0 {
            context.mark_modified();
        }
        Ok(json!(count))
    }
}
