//! PDF document operations

use std::path::{Path, PathBuf};

use serde_json::{Value, json};

use super::{
    Access, HandlerRegistry, OperationContext, OperationHandler, ParamKind, ParamSpec, Parameters,
    ResultType,
};
use crate::document::{PdfAttachment, PdfDocument};
use crate::error::Result;

/// Build the PDF handler table
pub fn registry() -> Result<HandlerRegistry<PdfDocument>> {
    HandlerRegistry::<PdfDocument>::new()
        .with(ExtractText)?
        .with(AddPage)?
        .with(SetMetadata)?
        .with(GetMetadata)?
        .with(AddAttachment)?
        .with(ListAttachments)?
        .with(ExtractAttachment)
}

/// Extension hint for a scratch copy of `file_name`
pub(crate) fn extension_of(file_name: &str) -> &str {
    Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or("bin")
}

const EXTRACT_TEXT_PARAMS: &[ParamSpec] = &[ParamSpec::optional("page", ParamKind::Integer)];

pub struct ExtractText;

impl OperationHandler<PdfDocument> for ExtractText {
    fn operation(&self) -> &'static str {
        "extract_text"
    }

    fn description(&self) -> &'static str {
        "Extract text from one page (1-based) or from the whole document"
    }

    fn parameters(&self) -> &'static [ParamSpec] {
        EXTRACT_TEXT_PARAMS
    }

    fn access(&self) -> Access {
        Access::Read
    }

    fn result_type(&self) -> ResultType {
        ResultType::Text
    }

    fn execute(
        &self,
        context: &mut OperationContext<'_, PdfDocument>,
        params: &Parameters,
    ) -> Result<Value> {
        let page: Option<usize> = params.get("page")?;
        Ok(Value::String(context.document().text(page)?))
    }
}

const ADD_PAGE_PARAMS: &[ParamSpec] = &[ParamSpec::optional("text", ParamKind::String)];

pub struct AddPage;

impl OperationHandler<PdfDocument> for AddPage {
    fn operation(&self) -> &'static str {
        "add_page"
    }

    fn description(&self) -> &'static str {
        "Append a page; returns the new page count"
    }

    fn parameters(&self) -> &'static [ParamSpec] {
        ADD_PAGE_PARAMS
    }

    fn result_type(&self) -> ResultType {
        ResultType::Number
    }

    fn execute(
        &self,
        context: &mut OperationContext<'_, PdfDocument>,
        params: &Parameters,
    ) -> Result<Value> {
        let text: String = params.optional("text", String::new())?;
        let count = context.document_mut()?.add_page(text);
        context.mark_modified();
        Ok(json!(count))
    }
}

const SET_METADATA_PARAMS: &[ParamSpec] = &[
    ParamSpec::required("key", ParamKind::String),
    ParamSpec::optional("value", ParamKind::String),
];

pub struct SetMetadata;

impl OperationHandler<PdfDocument> for SetMetadata {
    fn operation(&self) -> &'static str {
        "set_metadata"
    }

    fn description(&self) -> &'static str {
        "Set a document information entry; omit value to remove it"
    }

    fn parameters(&self) -> &'static [ParamSpec] {
        SET_METADATA_PARAMS
    }

    fn result_type(&self) -> ResultType {
        ResultType::Object
    }

    fn execute(
        &self,
        context: &mut OperationContext<'_, PdfDocument>,
        params: &Parameters,
    ) -> Result<Value> {
        let key: String = params.required("key")?;
        if key.trim().is_empty() {
            return Err(params.invalid("key", "cannot be empty"));
        }
        let value: Option<String> = params.get("value")?;

        let metadata = &mut context.document_mut()?.metadata;
        let previous = match value {
            Some(value) => metadata.insert(key.clone(), value),
            None => metadata.remove(&key),
        };
        context.mark_modified();
        Ok(json!({ "key": key, "previous": previous }))
    }
}

pub struct GetMetadata;

impl OperationHandler<PdfDocument> for GetMetadata {
    fn operation(&self) -> &'static str {
        "get_metadata"
    }

    fn description(&self) -> &'static str {
        "Read all document information entries"
    }

    fn access(&self) -> Access {
        Access::Read
    }

    fn result_type(&self) -> ResultType {
        ResultType::Object
    }

    fn execute(
        &self,
        context: &mut OperationContext<'_, PdfDocument>,
        _params: &Parameters,
    ) -> Result<Value> {
        let document = context.document();
        Ok(json!({
            "pageCount": document.pages.len(),
            "metadata": document.metadata,
        }))
    }
}

const ADD_ATTACHMENT_PARAMS: &[ParamSpec] = &[
    ParamSpec::required("name", ParamKind::String),
    ParamSpec::required("contentBase64", ParamKind::String),
    ParamSpec::optional("description", ParamKind::String),
];

pub struct AddAttachment;

impl OperationHandler<PdfDocument> for AddAttachment {
    fn operation(&self) -> &'static str {
        "add_attachment"
    }

    fn description(&self) -> &'static str {
        "Embed a file in the document"
    }

    fn parameters(&self) -> &'static [ParamSpec] {
        ADD_ATTACHMENT_PARAMS
    }

    fn result_type(&self) -> ResultType {
        ResultType::Object
    }

    fn execute(
        &self,
        context: &mut OperationContext<'_, PdfDocument>,
        params: &Parameters,
    ) -> Result<Value> {
        let name: String = params.required("name")?;
        let bytes = params.bytes("contentBase64")?;
        let description: Option<String> = params.get("description")?;

        let size = bytes.len();
        context
            .document_mut()?
            .add_attachment(PdfAttachment::new(name.clone(), &bytes, description))?;
        context.mark_modified();
        Ok(json!({ "name": name, "size": size }))
    }
}

pub struct ListAttachments;

impl OperationHandler<PdfDocument> for ListAttachments {
    fn operation(&self) -> &'static str {
        "list_attachments"
    }

    fn description(&self) -> &'static str {
        "List embedded files"
    }

    fn access(&self) -> Access {
        Access::Read
    }

    fn result_type(&self) -> ResultType {
        ResultType::List
    }

    fn execute(
        &self,
        context: &mut OperationContext<'_, PdfDocument>,
        _params: &Parameters,
    ) -> Result<Value> {
        let attachments = context
            .document()
            .attachments
            .iter()
            .map(|a| -> Result<Value> {
                Ok(json!({
                    "name": a.name,
                    "description": a.description,
                    "size": a.bytes()?.len(),
                }))
            })
            .collect::<Result<Vec<Value>>>()?;
        Ok(Value::Array(attachments))
    }
}

const EXTRACT_ATTACHMENT_PARAMS: &[ParamSpec] = &[
    ParamSpec::required("name", ParamKind::String),
    ParamSpec::optional("outputPath", ParamKind::String),
];

pub struct ExtractAttachment;

impl OperationHandler<PdfDocument> for ExtractAttachment {
    fn operation(&self) -> &'static str {
        "extract_attachment"
    }

    fn description(&self) -> &'static str {
        "Write an embedded file to outputPath, or to a temp file"
    }

    fn parameters(&self) -> &'static [ParamSpec] {
        EXTRACT_ATTACHMENT_PARAMS
    }

    fn access(&self) -> Access {
        Access::Read
    }

    fn result_type(&self) -> ResultType {
        ResultType::Path
    }

    fn execute(
        &self,
        context: &mut OperationContext<'_, PdfDocument>,
        params: &Parameters,
    ) -> Result<Value> {
        let name: String = params.required("name")?;
        let output_path: Option<PathBuf> = params.get("outputPath")?;

        let bytes = context.document().attachment(&name)?.bytes()?;
        let path = context.write_output(output_path, extension_of(&name), &bytes)?;
        Ok(Value::String(path.display().to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::operations::testing::run;
    use std::fs;

    fn document() -> PdfDocument {
        let mut pdf = PdfDocument::default();
        pdf.add_page("page one");
        pdf.add_page("page two");
        pdf.add_attachment(PdfAttachment::new("data.csv", b"a,b\n1,2\n", None))
            .unwrap();
        pdf
    }

    #[test]
    fn test_extract_text() {
        let mut pdf = document();
        let all = run(&ExtractText, &mut pdf, Value::Null);
        assert_eq!(all.result.unwrap(), "page one\u{c}page two");

        let second = run(&ExtractText, &mut pdf, json!({"page": 2}));
        assert_eq!(second.result.unwrap(), "page two");

        let missing = run(&ExtractText, &mut pdf, json!({"page": 3}));
        assert!(matches!(missing.result, Err(Error::DocumentLibrary(_))));
    }

    #[test]
    fn test_metadata_set_and_remove() {
        let mut pdf = document();
        let set = run(&SetMetadata, &mut pdf, json!({"key": "Title", "value": "Report"}));
        assert!(set.modified);
        assert_eq!(set.result.unwrap()["previous"], Value::Null);

        let get = run(&GetMetadata, &mut pdf, Value::Null);
        assert_eq!(get.result.unwrap()["metadata"]["Title"], "Report");

        let removed = run(&SetMetadata, &mut pdf, json!({"key": "Title"}));
        assert_eq!(removed.result.unwrap()["previous"], "Report");
        assert!(pdf.metadata.is_empty());
    }

    #[test]
    fn test_add_and_list_attachments() {
        let mut pdf = document();
        let added = run(
            &AddAttachment,
            &mut pdf,
            json!({"name": "logo.png", "contentBase64": "AAEC", "description": "Logo"}),
        );
        assert_eq!(added.result.unwrap()["size"], 3);
        assert!(added.modified);

        let listed = run(&ListAttachments, &mut pdf, Value::Null);
        let listed = listed.result.unwrap();
        assert_eq!(listed.as_array().unwrap().len(), 2);
        assert_eq!(listed[1]["description"], "Logo");

        let duplicate = run(
            &AddAttachment,
            &mut pdf,
            json!({"name": "logo.png", "contentBase64": "AAEC"}),
        );
        assert!(duplicate.result.is_err());
        assert!(!duplicate.modified);
    }

    #[test]
    fn test_extract_attachment_to_scratch() {
        let mut pdf = document();
        let extracted = run(&ExtractAttachment, &mut pdf, json!({"name": "data.csv"}));
        assert!(!extracted.modified);
        assert_eq!(extracted.scratch.len(), 1);

        let path = PathBuf::from(extracted.result.unwrap().as_str().unwrap());
        assert_eq!(path, extracted.scratch[0]);
        assert_eq!(path.extension().and_then(|e| e.to_str()), Some("csv"));
        assert_eq!(fs::read(&path).unwrap(), b"a,b\n1,2\n");
    }

    #[test]
    fn test_extract_attachment_to_output_path() {
        let dir = tempfile::TempDir::new().unwrap();
        let target = dir.path().join("copy.csv");
        let mut pdf = document();

        let extracted = run(
            &ExtractAttachment,
            &mut pdf,
            json!({"name": "data.csv", "outputPath": target}),
        );
        assert_eq!(extracted.result.unwrap(), target.display().to_string());
        assert!(extracted.scratch.is_empty());
        assert!(target.exists());
    }

    #[test]
    fn test_extension_of() {
        assert_eq!(extension_of("a.tar.gz"), "gz");
        assert_eq!(extension_of("README"), "bin");
    }
}
