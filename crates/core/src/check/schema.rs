use std::fmt;
use std::sync::Arc;

use serde_json::{json, Value};

use super::{CheckResult, ExchangeCheck};
use crate::error::CheckError;
use crate::traffic::{Exchange, HttpMessageType};

/// A compiled JSON schema, shareable between check trees.
#[derive(Clone)]
pub struct SchemaValidator {
    name: String,
    validator: Arc<jsonschema::Validator>,
}

impl SchemaValidator {
    pub fn from_schema(name: &str, schema: &Value) -> Result<Self, CheckError> {
        let validator = jsonschema::validator_for(schema)
            .map_err(|e| CheckError::Schema(format!("failed to compile schema '{name}': {e}")))?;
        Ok(Self {
            name: name.to_string(),
            validator: Arc::new(validator),
        })
    }

    /// Validator for `#/components/schemas/<name>` of an OpenAPI document.
    ///
    /// The whole document is kept so references between components resolve.
    pub fn for_component(document: &Value, name: &str) -> Result<Self, CheckError> {
        let pointer = format!("/components/schemas/{name}");
        if document.pointer(&pointer).is_none() {
            return Err(CheckError::Schema(format!(
                "no schema '{name}' under #/components/schemas"
            )));
        }
        let mut schema = match document {
            Value::Object(map) => map.clone(),
            _ => return Err(CheckError::Schema("schema document is not an object".into())),
        };
        schema.insert("$ref".to_string(), json!(format!("#{pointer}")));
        Self::from_schema(name, &Value::Object(schema))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Human-readable validation errors; empty when `instance` is valid.
    pub fn validate(&self, instance: &Value) -> Vec<String> {
        self.validator
            .iter_errors(instance)
            .map(|e| format!("Schema validation error: {e}"))
            .collect()
    }
}

impl fmt::Debug for SchemaValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchemaValidator")
            .field("name", &self.name)
            .finish()
    }
}

/// The JSON body of a message conforms to a schema.
#[derive(Debug, Clone)]
pub struct JsonSchemaCheck {
    message_type: HttpMessageType,
    validator: SchemaValidator,
}

impl JsonSchemaCheck {
    pub fn new(message_type: HttpMessageType, validator: SchemaValidator) -> Self {
        Self {
            message_type,
            validator,
        }
    }
}

impl ExchangeCheck for JsonSchemaCheck {
    fn title(&self) -> String {
        format!(
            "The HTTP {} matches the standard JSON schema",
            self.message_type.as_str()
        )
    }

    fn check(&self, exchange: &Exchange) -> Result<CheckResult, CheckError> {
        let body = &exchange.message(self.message_type).body;
        if !body.is_json {
            return Ok(CheckResult::error(format!(
                "The HTTP {} body is not JSON",
                self.message_type.as_str()
            )));
        }
        Ok(CheckResult::from_errors(
            self.validator.validate(&body.as_json()),
        ))
    }
}
