//! PowerPoint presentation operations

use serde_json::{Value, json};

use super::{
    Access, HandlerRegistry, OperationContext, OperationHandler, ParamKind, ParamSpec, Parameters,
    ResultType,
};
use crate::document::{Presentation, Slide};
use crate::error::Result;

/// Build the PowerPoint handler table
pub fn registry() -> Result<HandlerRegistry<Presentation>> {
    HandlerRegistry::<Presentation>::new()
        .with(ListSlides)?
        .with(AddSlide)?
        .with(DeleteSlide)?
        .with(SetSlideNotes)?
        .with(GetSlide)
}

fn slide_json(index: usize, slide: &Slide) -> Value {
    json!({
        "index": index,
        "title": slide.title,
        "body": slide.body,
        "notes": slide.notes,
    })
}

pub struct ListSlides;

impl OperationHandler<Presentation> for ListSlides {
    fn operation(&self) -> &'static str {
        "list_slides"
    }

    fn description(&self) -> &'static str {
        "List slide titles in order"
    }

    fn access(&self) -> Access {
        Access::Read
    }

    fn result_type(&self) -> ResultType {
        ResultType::List
    }

    fn execute(
        &self,
        context: &mut OperationContext<'_, Presentation>,
        _params: &Parameters,
    ) -> Result<Value> {
        let slides = context
            .document()
            .slides
            .iter()
            .enumerate()
            .map(|(index, slide)| json!({ "index": index, "title": slide.title }))
            .collect();
        Ok(Value::Array(slides))
    }
}

const ADD_SLIDE_PARAMS: &[ParamSpec] = &[
    ParamSpec::required("title", ParamKind::String),
    ParamSpec::optional("body", ParamKind::String),
    ParamSpec::optional("slideIndex", ParamKind::Integer),
];

pub struct AddSlide;

impl OperationHandler<Presentation> for AddSlide {
    fn operation(&self) -> &'static str {
        "add_slide"
    }

    fn description(&self) -> &'static str {
        "Add a slide at the given position, or at the end"
    }

    fn parameters(&self) -> &'static [ParamSpec] {
        ADD_SLIDE_PARAMS
    }

    fn result_type(&self) -> ResultType {
        ResultType::Number
    }

    fn execute(
        &self,
        context: &mut OperationContext<'_, Presentation>,
        params: &Parameters,
    ) -> Result<Value> {
        let slide = Slide {
            title: params.required("title")?,
            body: params.optional("body", String::new())?,
            notes: None,
        };
        let position: Option<usize> = params.get("slideIndex")?;

        let index = context.document_mut()?.add_slide(slide, position)?;
        context.mark_modified();
        Ok(json!(index))
    }
}

const SLIDE_INDEX_PARAMS: &[ParamSpec] = &[ParamSpec::required("slideIndex", ParamKind::Integer)];

pub struct DeleteSlide;

impl OperationHandler<Presentation> for DeleteSlide {
    fn operation(&self) -> &'static str {
        "delete_slide"
    }

    fn description(&self) -> &'static str {
        "Delete a slide"
    }

    fn parameters(&self) -> &'static [ParamSpec] {
        SLIDE_INDEX_PARAMS
    }

    fn result_type(&self) -> ResultType {
        ResultType::Object
    }

    fn execute(
        &self,
        context: &mut OperationContext<'_, Presentation>,
        params: &Parameters,
    ) -> Result<Value> {
        let index: usize = params.required("slideIndex")?;
        let removed = context.document_mut()?.delete_slide(index)?;
        context.mark_modified();
        Ok(slide_json(index, &removed))
    }
}

const SET_NOTES_PARAMS: &[ParamSpec] = &[
    ParamSpec::required("slideIndex", ParamKind::Integer),
    ParamSpec::required("notes", ParamKind::String),
];

pub struct SetSlideNotes;

impl OperationHandler<Presentation> for SetSlideNotes {
    fn operation(&self) -> &'static str {
        "set_slide_notes"
    }

    fn description(&self) -> &'static str {
        "Replace the speaker notes of a slide; an empty string clears them"
    }

    fn parameters(&self) -> &'static [ParamSpec] {
        SET_NOTES_PARAMS
    }

    fn result_type(&self) -> ResultType {
        ResultType::Object
    }

    fn execute(
        &self,
        context: &mut OperationContext<'_, Presentation>,
        params: &Parameters,
    ) -> Result<Value> {
        let index: usize = params.required("slideIndex")?;
        let notes: String = params.required("notes")?;

        let slide = context.document_mut()?.slide_mut(index)?;
        slide.notes = if notes.is_empty() { None } else { Some(notes) };
        let result = slide_json(index, slide);
        context.mark_modified();
        Ok(result)
    }
}

pub struct GetSlide;

impl OperationHandler<Presentation> for GetSlide {
    fn operation(&self) -> &'static str {
        "get_slide"
    }

    fn description(&self) -> &'static str {
        "Read a slide's title, body and notes"
    }

    fn parameters(&self) -> &'static [ParamSpec] {
        SLIDE_INDEX_PARAMS
    }

    fn access(&self) -> Access {
        Access::Read
    }

    fn result_type(&self) -> ResultType {
        ResultType::Object
    }

    fn execute(
        &self,
        context: &mut OperationContext<'_, Presentation>,
        params: &Parameters,
    ) -> Result<Value> {
        let index: usize = params.required("slideIndex")?;
        let slide = context.document().slide(index)?;
        Ok(slide_json(index, slide))
    }
}
