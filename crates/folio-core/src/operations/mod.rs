//! Operation handlers
//!
//! Every document operation is a stateless [`OperationHandler`] registered
//! by name in the [`HandlerRegistry`] of its domain. Handlers see the
//! document only through an [`OperationContext`] and report mutations with
//! [`OperationContext::mark_modified`].
//!
//! Registration is an explicit table per domain (see [`word::registry`] and
//! friends); there is no discovery at runtime.

mod context;
pub mod email;
pub mod excel;
mod notes;
mod params;
pub mod pdf;
pub mod powerpoint;
mod registry;
pub mod word;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::document::DomainDocument;
use crate::error::Result;

pub use context::OperationContext;
pub use params::Parameters;
pub use registry::HandlerRegistry;

/// Whether a handler needs to modify the document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Access {
    Read,
    Write,
}

/// Shape of the value a handler returns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultType {
    /// Plain text
    Text,
    /// A JSON object
    Object,
    /// A JSON array
    List,
    /// A count or index
    Number,
    /// A filesystem path
    Path,
}

/// Expected JSON type of a parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamKind {
    String,
    Integer,
    Boolean,
    Array,
    Object,
}

impl ParamKind {
    /// Whether `value` has this kind
    pub fn matches(&self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Integer => value.is_i64() || value.is_u64(),
            Self::Boolean => value.is_boolean(),
            Self::Array => value.is_array(),
            Self::Object => value.is_object(),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Boolean => "boolean",
            Self::Array => "array",
            Self::Object => "object",
        }
    }
}

/// Declared parameter of an operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ParamSpec {
    pub name: &'static str,
    pub kind: ParamKind,
    pub required: bool,
}

impl ParamSpec {
    pub const fn required(name: &'static str, kind: ParamKind) -> Self {
        Self {
            name,
            kind,
            required: true,
        }
    }

    pub const fn optional(name: &'static str, kind: ParamKind) -> Self {
        Self {
            name,
            kind,
            required: false,
        }
    }
}

/// Listing entry for one registered operation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OperationDescriptor {
    pub operation: &'static str,
    pub description: &'static str,
    pub access: Access,
    pub result_type: ResultType,
    pub parameters: Vec<ParamSpec>,
}

/// A single named operation against documents of type `D`
///
/// Handlers hold no per-call state and are shared across concurrent calls.
pub trait OperationHandler<D: DomainDocument>: Send + Sync {
    /// Operation name, unique within the domain
    fn operation(&self) -> &'static str;

    /// One-line description for listings
    fn description(&self) -> &'static str;

    /// Declared parameters, checked before `execute` is called
    fn parameters(&self) -> &'static [ParamSpec] {
        &[]
    }

    /// Read handlers run against a shared view of the document
    fn access(&self) -> Access {
        Access::Write
    }

    fn result_type(&self) -> ResultType;

    /// Run the operation
    ///
    /// Handlers that change the document must call
    /// [`OperationContext::mark_modified`] before returning.
    fn execute(&self, context: &mut OperationContext<'_, D>, params: &Parameters)
    -> Result<Value>;

    fn descriptor(&self) -> OperationDescriptor {
        OperationDescriptor {
            operation: self.operation(),
            description: self.description(),
            access: self.access(),
            result_type: self.result_type(),
            parameters: self.parameters().to_vec(),
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_param_kind_matches() {
        assert!(ParamKind::Integer.matches(&json!(3)));
        assert!(ParamKind::Integer.matches(&json!(-3)));
        assert!(!ParamKind::Integer.matches(&json!(1.5)));
        assert!(!ParamKind::Integer.matches(&json!("3")));
        assert!(ParamKind::String.matches(&json!("x")));
        assert!(ParamKind::Array.matches(&json!(["a"])));
        assert!(ParamKind::Object.matches(&json!({})));
        assert!(ParamKind::Boolean.matches(&json!(false)));
    }

    #[test]
    fn test_descriptor_serializes() {
        let descriptor = OperationDescriptor {
            operation: "get_text",
            description: "Extract the document body as plain text",
            access: Access::Read,
            result_type: ResultType::Text,
            parameters: vec![ParamSpec::optional("page", ParamKind::Integer)],
        };
        let value = serde_json::to_value(&descriptor).unwrap();
        assert_eq!(value["access"], "read");
        assert_eq!(value["result_type"], "text");
        assert_eq!(value["parameters"][0]["kind"], "integer");
        assert_eq!(value["parameters"][0]["required"], false);
    }
}
