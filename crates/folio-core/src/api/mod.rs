//! JSON request/response envelope
//!
//! One [`Request`] per call, tagged by `action`. Field names are camelCase to
//! match operation parameters. Every call produces a [`Response`], failures
//! included. A request line may carry an `id` (any JSON value) which is echoed
//! on its response, so pipelined calls can be answered out of order.

use std::path::PathBuf;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::dispatch::{Dispatcher, TransientCall};
use crate::document::DocumentKind;
use crate::error::{Error, Result};
use crate::session::{DocumentSource, SessionId};

/// A single call against the core
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum Request {
    /// Open a document from a path or from base64 content
    Open {
        document_type: Option<String>,
        path: Option<PathBuf>,
        content_base64: Option<String>,
        /// Extension hint for base64 content
        extension: Option<String>,
    },
    /// Run an operation against an open session
    Execute {
        session_id: String,
        operation: String,
        #[serde(default)]
        parameters: Value,
    },
    /// Run an operation against a file without opening a session
    Transient {
        document_type: Option<String>,
        path: PathBuf,
        operation: String,
        #[serde(default)]
        parameters: Value,
        output_path: Option<PathBuf>,
    },
    /// Save to `outputPath`, or back to the path the session was opened from
    Save {
        session_id: String,
        output_path: Option<PathBuf>,
    },
    /// Serialize the document and return it as base64
    Export { session_id: String },
    Touch { session_id: String },
    Close { session_id: String },
    Status { session_id: String },
    List,
    /// Describe the operations available for a document type
    Operations { document_type: String },
}

impl Request {
    /// The action tag, for logging
    pub fn action(&self) -> &'static str {
        match self {
            Self::Open { .. } => "open",
            Self::Execute { .. } => "execute",
            Self::Transient { .. } => "transient",
            Self::Save { .. } => "save",
            Self::Export { .. } => "export",
            Self::Touch { .. } => "touch",
            Self::Close { .. } => "close",
            Self::Status { .. } => "status",
            Self::List => "list",
            Self::Operations { .. } => "operations",
        }
    }
}

/// A request line: the optional caller-chosen `id` plus the request itself
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Envelope {
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(flatten)]
    pub request: Request,
}

/// Error details in a failed response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

/// Outcome of a single call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
}

impl Response {
    pub fn ok(data: Value) -> Self {
        Self {
            id: None,
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn from_error(error: &Error) -> Self {
        Self {
            id: None,
            success: false,
            data: None,
            error: Some(ErrorBody {
                code: error.code().to_string(),
                message: error.to_string(),
                suggestion: error.suggestion(),
            }),
        }
    }

    /// Tag the response with the request's `id`
    pub fn with_id(mut self, id: Option<Value>) -> Self {
        self.id = id;
        self
    }
}

/// Parse one JSON request line and handle it
///
/// A line that is valid JSON but not a valid request still gets its `id`
/// echoed on the error response.
pub async fn handle_line(dispatcher: &Dispatcher, line: &str) -> Response {
    match serde_json::from_str::<Envelope>(line) {
        Ok(Envelope { id, request }) => handle(dispatcher, request).await.with_id(id),
        Err(e) => {
            warn!(error = %e, "Rejected malformed request");
            Response::from_error(&Error::Json(e)).with_id(request_id(line))
        }
    }
}

fn request_id(line: &str) -> Option<Value> {
    let mut value: Value = serde_json::from_str(line).ok()?;
    value.get_mut("id").map(Value::take)
}

/// Handle one request, converting failures into an error response
pub async fn handle(dispatcher: &Dispatcher, request: Request) -> Response {
    let action = request.action();
    debug!(action = action, "Handling request");

    match route(dispatcher, request).await {
        Ok(data) => Response::ok(data),
        Err(e) => {
            debug!(action = action, code = e.code(), error = %e, "Request failed");
            Response::from_error(&e)
        }
    }
}

async fn route(dispatcher: &Dispatcher, request: Request) -> Result<Value> {
    let store = dispatcher.store();
    match request {
        Request::Open {
            document_type,
            path,
            content_base64,
            extension,
        } => {
            let (kind, source) = open_source(document_type, path, content_base64, extension)?;
            let id = dispatcher.open(kind, source).await?;
            Ok(json!({ "sessionId": id, "documentType": kind }))
        }

        Request::Execute {
            session_id,
            operation,
            parameters,
        } => {
            let output = dispatcher
                .execute(&SessionId::from(session_id), &operation, parameters)
                .await?;
            Ok(serde_json::to_value(output)?)
        }

        Request::Transient {
            document_type,
            path,
            operation,
            parameters,
            output_path,
        } => {
            let kind = document_type
                .as_deref()
                .map(str::parse::<DocumentKind>)
                .transpose()?;
            let output = dispatcher
                .execute_transient(TransientCall {
                    kind,
                    path,
                    operation,
                    params: parameters,
                    output_path,
                })
                .await?;
            Ok(serde_json::to_value(output)?)
        }

        Request::Save {
            session_id,
            output_path,
        } => {
            let id = SessionId::from(session_id);
            let target = match output_path {
                Some(path) => path,
                None => store
                    .get(&id)
                    .await?
                    .source_path()
                    .cloned()
                    .ok_or_else(|| Error::MissingParameter {
                        operation: "save".to_string(),
                        name: "outputPath".to_string(),
                    })?,
            };
            store.save(&id, &target).await?;
            Ok(json!({ "sessionId": id, "path": target }))
        }

        Request::Export { session_id } => {
            let id = SessionId::from(session_id);
            let bytes = store.export(&id).await?;
            Ok(json!({
                "sessionId": id,
                "size": bytes.len(),
                "contentBase64": STANDARD.encode(&bytes),
            }))
        }

        Request::Touch { session_id } => {
            let id = SessionId::from(session_id);
            store.touch(&id).await?;
            Ok(json!({ "sessionId": id }))
        }

        Request::Close { session_id } => {
            let id = SessionId::from(session_id);
            let closed = store.close(&id).await?;
            Ok(json!({ "sessionId": id, "closed": closed }))
        }

        Request::Status { session_id } => {
            let info = store.status(&SessionId::from(session_id)).await?;
            Ok(serde_json::to_value(info)?)
        }

        Request::List => Ok(serde_json::to_value(store.list().await)?),

        Request::Operations { document_type } => {
            let kind: DocumentKind = document_type.parse()?;
            Ok(serde_json::to_value(dispatcher.registries().operations(kind))?)
        }
    }
}

/// Resolve the document kind and source of an `open` request
fn open_source(
    document_type: Option<String>,
    path: Option<PathBuf>,
    content_base64: Option<String>,
    extension: Option<String>,
) -> Result<(DocumentKind, DocumentSource)> {
    let declared = document_type
        .as_deref()
        .map(str::parse::<DocumentKind>)
        .transpose()?;

    match (path, content_base64) {
        (Some(_), Some(_)) => Err(Error::InvalidParameter {
            operation: "open".to_string(),
            name: "contentBase64".to_string(),
            reason: "give either path or contentBase64, not both".to_string(),
        }),
        (Some(path), None) => {
            let kind = match declared {
                Some(kind) => kind,
                None => DocumentKind::from_path(&path)
                    .ok_or_else(|| Error::UnsupportedType(path.display().to_string()))?,
            };
            Ok((kind, DocumentSource::Path(path)))
        }
        (None, Some(content)) => {
            let kind = match (declared, extension.as_deref()) {
                (Some(kind), _) => kind,
                (None, Some(ext)) => ext.parse()?,
                (None, None) => {
                    return Err(Error::MissingParameter {
                        operation: "open".to_string(),
                        name: "documentType".to_string(),
                    });
                }
            };
            let data = STANDARD
                .decode(content.trim())
                .map_err(|e| Error::InvalidParameter {
                    operation: "open".to_string(),
                    name: "contentBase64".to_string(),
                    reason: format!("not valid base64: {}", e),
                })?;
            Ok((
                kind,
                DocumentSource::Bytes {
                    data,
                    extension: extension.map(|ext| ext.trim_start_matches('.').to_string()),
                },
            ))
        }
        (None, None) => Err(Error::MissingParameter {
            operation: "open".to_string(),
            name: "path".to_string(),
        }),
    }
}
