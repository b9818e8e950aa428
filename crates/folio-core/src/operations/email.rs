//! Email message operations

use std::path::PathBuf;

use serde_json::{Value, json};

use super::pdf::extension_of;
use super::{
    Access, HandlerRegistry, OperationContext, OperationHandler, ParamKind, ParamSpec, Parameters,
    ResultType,
};
use crate::document::{EmailAttachment, EmailMessage, LibraryError, RecipientKind};
use crate::error::Result;

/// Build the Email handler table
pub fn registry() -> Result<HandlerRegistry<EmailMessage>> {
    HandlerRegistry::<EmailMessage>::new()
        .with(GetInfo)?
        .with(SetSubject)?
        .with(SetBody)?
        .with(AddRecipient)?
        .with(AddAttachment)?
        .with(ListAttachments)?
        .with(ExtractAttachment)
}

pub struct GetInfo;

impl OperationHandler<EmailMessage> for GetInfo {
    fn operation(&self) -> &'static str {
        "get_info"
    }

    fn description(&self) -> &'static str {
        "Read headers, body and attachment names"
    }

    fn access(&self) -> Access {
        Access::Read
    }

    fn result_type(&self) -> ResultType {
        ResultType::Object
    }

    fn execute(
        &self,
        context: &mut OperationContext<'_, EmailMessage>,
        _params: &Parameters,
    ) -> Result<Value> {
        let mail = context.document();
        Ok(json!({
            "subject": mail.subject,
            "from": mail.from,
            "to": mail.to,
            "cc": mail.cc,
            "bcc": mail.bcc,
            "body": mail.body,
            "html": mail.html,
            "attachments": mail.attachments.iter().map(|a| a.name.as_str()).collect::<Vec<_>>(),
        }))
    }
}

const SET_SUBJECT_PARAMS: &[ParamSpec] = &[ParamSpec::required("subject", ParamKind::String)];

pub struct SetSubject;

impl OperationHandler<EmailMessage> for SetSubject {
    fn operation(&self) -> &'static str {
        "set_subject"
    }

    fn description(&self) -> &'static str {
        "Replace the subject line"
    }

    fn parameters(&self) -> &'static [ParamSpec] {
        SET_SUBJECT_PARAMS
    }

    fn result_type(&self) -> ResultType {
        ResultType::Text
    }

    fn execute(
        &self,
        context: &mut OperationContext<'_, EmailMessage>,
        params: &Parameters,
    ) -> Result<Value> {
        let subject: String = params.required("subject")?;
        let previous = std::mem::replace(&mut context.document_mut()?.subject, subject);
        context.mark_modified();
        Ok(Value::String(previous))
    }
}

const SET_BODY_PARAMS: &[ParamSpec] = &[
    ParamSpec::required("body", ParamKind::String),
    ParamSpec::optional("html", ParamKind::Boolean),
];

pub struct SetBody;

impl OperationHandler<EmailMessage> for SetBody {
    fn operation(&self) -> &'static str {
        "set_body"
    }

    fn description(&self) -> &'static str {
        "Replace the message body as plain text or HTML"
    }

    fn parameters(&self) -> &'static [ParamSpec] {
        SET_BODY_PARAMS
    }

    fn result_type(&self) -> ResultType {
        ResultType::Number
    }

    fn execute(
        &self,
        context: &mut OperationContext<'_, EmailMessage>,
        params: &Parameters,
    ) -> Result<Value> {
        let body: String = params.required("body")?;
        let html: bool = params.optional("html", false)?;

        let length = body.chars().count();
        let mail = context.document_mut()?;
        mail.body = body;
        mail.html = html;
        context.mark_modified();
        Ok(json!(length))
    }
}

const ADD_RECIPIENT_PARAMS: &[ParamSpec] = &[
    ParamSpec::required("address", ParamKind::String),
    ParamSpec::optional("kind", ParamKind::String),
];

pub struct AddRecipient;

impl OperationHandler<EmailMessage> for AddRecipient {
    fn operation(&self) -> &'static str {
        "add_recipient"
    }

    fn description(&self) -> &'static str {
        "Add a to, cc or bcc recipient (default: to)"
    }

    fn parameters(&self) -> &'static [ParamSpec] {
        ADD_RECIPIENT_PARAMS
    }

    fn result_type(&self) -> ResultType {
        ResultType::Object
    }

    fn execute(
        &self,
        context: &mut OperationContext<'_, EmailMessage>,
        params: &Parameters,
    ) -> Result<Value> {
        let address: String = params.required("address")?;
        let kind: RecipientKind = match params.get::<String>("kind")? {
            Some(kind) => kind
                .parse()
                .map_err(|e: LibraryError| params.invalid("kind", e.to_string()))?,
            None => RecipientKind::To,
        };

        let added = context.document_mut()?.add_recipient(kind, &address)?;
        if added {
            context.mark_modified();
        }
        Ok(json!({ "address": address.trim(), "kind": kind, "added": added }))
    }
}

const ADD_ATTACHMENT_PARAMS: &[ParamSpec] = &[
    ParamSpec::required("name", ParamKind::String),
    ParamSpec::required("contentBase64", ParamKind::String),
    ParamSpec::optional("contentType", ParamKind::String),
];

pub struct AddAttachment;

impl OperationHandler<EmailMessage> for AddAttachment {
    fn operation(&self) -> &'static str {
        "add_attachment"
    }

    fn description(&self) -> &'static str {
        "Attach a file to the message"
    }

    fn parameters(&self) -> &'static [ParamSpec] {
        ADD_ATTACHMENT_PARAMS
    }

    fn result_type(&self) -> ResultType {
        ResultType::Object
    }

    fn execute(
        &self,
        context: &mut OperationContext<'_, EmailMessage>,
        params: &Parameters,
    ) -> Result<Value> {
        let name: String = params.required("name")?;
        let bytes = params.bytes("contentBase64")?;
        let content_type: Option<String> = params.get("contentType")?;

        let attachment = EmailAttachment::new(name, content_type, &bytes);
        let result = json!({
            "name": attachment.name,
            "contentType": attachment.content_type,
            "size": bytes.len(),
        });
        context.document_mut()?.add_attachment(attachment)?;
        context.mark_modified();
        Ok(result)
    }
}

pub struct ListAttachments;

impl OperationHandler<EmailMessage> for ListAttachments {
    fn operation(&self) -> &'static str {
        "list_attachments"
    }

    fn description(&self) -> &'static str {
        "List attachments with content type and size"
    }

    fn access(&self) -> Access {
        Access::Read
    }

    fn result_type(&self) -> ResultType {
        ResultType::List
    }

    fn execute(
        &self,
        context: &mut OperationContext<'_, EmailMessage>,
        _params: &Parameters,
    ) -> Result<Value> {
        let attachments = context
            .document()
            .attachments
            .iter()
            .map(|a| -> Result<Value> {
                Ok(json!({
                    "name": a.name,
                    "contentType": a.content_type,
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

impl OperationHandler<EmailMessage> for ExtractAttachment {
    fn operation(&self) -> &'static str {
        "extract_attachment"
    }

    fn description(&self) -> &'static str {
        "Write an attachment to outputPath, or to a temp file"
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
        context: &mut OperationContext<'_, EmailMessage>,
        params: &Parameters,
    ) -> Result<Value> {
        let name: String = params.required("name")?;
        let output_path: Option<PathBuf> = params.get("outputPath")?;

        let bytes = context.document().attachment(&name)?.bytes()?;
        let path = context.write_output(output_path, extension_of(&name), &bytes)?;
        Ok(Value::String(path.display().to_string()))
    }
}
