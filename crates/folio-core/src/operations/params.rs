//! Typed access to operation parameters

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::debug;

use super::ParamSpec;
use crate::error::{Error, Result};

/// Named parameters of one operation call
#[derive(Debug, Clone, Default)]
pub struct Parameters {
    operation: String,
    values: Map<String, Value>,
}

impl Parameters {
    pub fn new(operation: impl Into<String>, values: Map<String, Value>) -> Self {
        Self {
            operation: operation.into(),
            values,
        }
    }

    /// Build from a JSON value; `null` means no parameters
    pub fn from_value(operation: impl Into<String>, value: Value) -> Result<Self> {
        let operation = operation.into();
        match value {
            Value::Null => Ok(Self::new(operation, Map::new())),
            Value::Object(values) => Ok(Self::new(operation, values)),
            other => Err(Error::InvalidParameter {
                operation,
                name: "parameters".to_string(),
                reason: format!("expected an object, got {}", json_type(&other)),
            }),
        }
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }

    /// Whether a non-null value is present for `name`
    pub fn contains(&self, name: &str) -> bool {
        self.values.get(name).is_some_and(|v| !v.is_null())
    }

    /// Extract a required parameter
    pub fn required<T: DeserializeOwned>(&self, name: &str) -> Result<T> {
        self.get(name)?.ok_or_else(|| Error::MissingParameter {
            operation: self.operation.clone(),
            name: name.to_string(),
        })
    }

    /// Extract an optional parameter, falling back to `default`
    pub fn optional<T: DeserializeOwned>(&self, name: &str, default: T) -> Result<T> {
        Ok(self.get(name)?.unwrap_or(default))
    }

    /// Extract a parameter if present; `null` counts as absent
    pub fn get<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>> {
        match self.values.get(name) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => T::deserialize(value)
                .map(Some)
                .map_err(|e| self.invalid(name, e.to_string())),
        }
    }

    /// Extract a required base64-encoded binary parameter
    pub fn bytes(&self, name: &str) -> Result<Vec<u8>> {
        let encoded: String = self.required(name)?;
        STANDARD
            .decode(encoded.trim())
            .map_err(|e| self.invalid(name, format!("not valid base64: {}", e)))
    }

    /// Check presence and JSON types against the declared specs
    pub fn validate(&self, specs: &[ParamSpec]) -> Result<()> {
        for spec in specs {
            match self.values.get(spec.name) {
                None | Some(Value::Null) if spec.required => {
                    return Err(Error::MissingParameter {
                        operation: self.operation.clone(),
                        name: spec.name.to_string(),
                    });
                }
                None | Some(Value::Null) => {}
                Some(value) if !spec.kind.matches(value) => {
                    return Err(self.invalid(
                        spec.name,
                        format!("expected {}, got {}", spec.kind.as_str(), json_type(value)),
                    ));
                }
                Some(_) => {}
            }
        }

        for name in self.values.keys() {
            if !specs.iter().any(|spec| spec.name == name) {
                debug!(operation = %self.operation, parameter = %name, "Ignoring undeclared parameter");
            }
        }

        Ok(())
    }

    /// Build an `InvalidParameter` error for this call
    pub fn invalid(&self, name: &str, reason: impl Into<String>) -> Error {
        Error::InvalidParameter {
            operation: self.operation.clone(),
            name: name.to_string(),
            reason: reason.into(),
        }
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_f64() => "number",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
