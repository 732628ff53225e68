use parley_core::{CheckError, SchemaValidator};
use serde_json::Value;

const API_DOCUMENT: &str = include_str!("../schemas/sample-api.json");

/// The standard's OpenAPI document.
pub fn api_document() -> Result<Value, CheckError> {
    serde_json::from_str(API_DOCUMENT)
        .map_err(|e| CheckError::Schema(format!("invalid embedded API document: {e}")))
}

/// Compiled validators for every message body the standard defines.
#[derive(Debug, Clone)]
pub struct SampleSchemas {
    pub schedules: SchemaValidator,
    pub subscription_request: SchemaValidator,
    pub subscription: SchemaValidator,
    pub signed_subscription: SchemaValidator,
}

impl SampleSchemas {
    pub fn load() -> Result<Self, CheckError> {
        let document = api_document()?;
        Ok(Self {
            schedules: SchemaValidator::for_component(&document, "Schedules")?,
            subscription_request: SchemaValidator::for_component(&document, "SubscriptionRequest")?,
            subscription: SchemaValidator::for_component(&document, "Subscription")?,
            signed_subscription: SchemaValidator::for_component(&document, "SignedSubscription")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn schedules_schema_resolves_item_reference() {
        let schemas = SampleSchemas::load().unwrap();
        let valid = json!({"schedules": [{
            "vesselName": "Ever Given",
            "interval": "week",
            "startDate": "2024-12-30",
            "endDate": "2025-01-05"
        }]});
        assert!(schemas.schedules.validate(&valid).is_empty());

        let invalid = json!({"schedules": [{"vesselName": "", "interval": "week"}]});
        let errors = schemas.schedules.validate(&invalid);
        assert!(!errors.is_empty());
        assert!(errors.iter().all(|e| e.starts_with("Schema validation error: ")));
    }
}
