use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::check::CheckNode;
use crate::error::{InputError, StateError};
use crate::traffic::Exchange;

/// Fields every action carries regardless of its kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionCore {
    pub id: Uuid,
    pub title: String,
    /// Party expected to act (send the request or supply the input).
    pub source_party: String,
    pub target_party: String,
    /// Titles of this action and all earlier ones in the scenario, joined
    /// with `" - "`. Assigned when the scenario is instantiated.
    pub path: String,
    pub matched_exchange_id: Option<Uuid>,
}

impl ActionCore {
    pub fn new(title: &str, source_party: &str, target_party: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: title.to_string(),
            source_party: source_party.to_string(),
            target_party: target_party.to_string(),
            path: title.to_string(),
            matched_exchange_id: None,
        }
    }

    /// New identity, no matched exchange.
    pub fn reset(&mut self) {
        self.id = Uuid::new_v4();
        self.matched_exchange_id = None;
    }

    pub fn export_state(&self) -> Value {
        json!({
            "id": self.id,
            "matchedExchangeId": self.matched_exchange_id,
        })
    }

    pub fn import_state(&mut self, state: &Value) -> Result<(), StateError> {
        let id = state
            .get("id")
            .ok_or_else(|| StateError::missing(&self.title, "id"))?;
        self.id = Uuid::deserialize(id).map_err(|e| StateError::invalid(&self.title, e))?;
        self.matched_exchange_id = match state.get("matchedExchangeId") {
            None | Some(Value::Null) => None,
            Some(value) => {
                Some(Uuid::deserialize(value).map_err(|e| StateError::invalid(&self.title, e))?)
            }
        };
        Ok(())
    }
}

/// What a party is shown for a pending action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionPrompt {
    pub action_id: Uuid,
    pub action_type: String,
    pub action_title: String,
    pub action_path: String,
    pub party_name: String,
    pub prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt_json: Option<Value>,
    pub input_required: bool,
    pub confirmation_required: bool,
}

/// One step of a scenario.
///
/// An action either waits for party input (`is_input_required`) or for a
/// specific exchange (`try_consume`). Everything the orchestrator needs is a
/// method here, so it never has to know the concrete action type.
///
/// Actions hold their own state plus the [`ActionCore`]; `export_state` and
/// `import_state` must round-trip all of it, including values shared through
/// [`Slot`](super::Slot)s that this action fills.
pub trait Action: Send + Sync {
    fn core(&self) -> &ActionCore;

    fn core_mut(&mut self) -> &mut ActionCore;

    /// Stable name of the action kind, e.g. `"GetSchedules"`.
    fn kind(&self) -> &'static str;

    fn reset(&mut self) {
        self.core_mut().reset();
    }

    fn export_state(&self) -> Value {
        self.core().export_state()
    }

    fn import_state(&mut self, state: &Value) -> Result<(), StateError> {
        self.core_mut().import_state(state)
    }

    /// Instructions for a human or simulated party.
    fn human_prompt(&self) -> String {
        String::new()
    }

    /// Structured data accompanying the prompt, such as suggested input.
    fn prompt_json(&self) -> Option<Value> {
        None
    }

    fn is_input_required(&self) -> bool {
        false
    }

    fn is_confirmation_required(&self) -> bool {
        false
    }

    /// Accept party input for this action.
    fn handle_input(&mut self, input: &Value) -> Result<(), InputError> {
        let _ = input;
        Err(InputError::NotAccepted(self.core().title.clone()))
    }

    /// Whether `exchange` is the one this action waits for. On a match the
    /// action records the exchange id and absorbs any values later actions
    /// depend on.
    fn try_consume(&mut self, exchange: &Exchange) -> bool {
        let _ = exchange;
        false
    }

    /// Checks validating the exchange this action matched.
    fn build_checks(&self, expected_api_version: &str) -> Option<CheckNode> {
        let _ = expected_api_version;
        None
    }

    fn prompt(&self) -> ActionPrompt {
        let core = self.core();
        ActionPrompt {
            action_id: core.id,
            action_type: self.kind().to_string(),
            action_title: core.title.clone(),
            action_path: core.path.clone(),
            party_name: core.source_party.clone(),
            prompt: self.human_prompt(),
            prompt_json: self.prompt_json(),
            input_required: self.is_input_required(),
            confirmation_required: self.is_confirmation_required(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn core_state_round_trips() {
        let mut core = ActionCore::new("Get", "Alice", "Bob");
        core.matched_exchange_id = Some(Uuid::new_v4());
        let state = core.export_state();

        let mut restored = ActionCore::new("Get", "Alice", "Bob");
        restored.import_state(&state).unwrap();
        assert_eq!(restored, core);
    }

    #[test]
    fn reset_changes_identity() {
        let mut core = ActionCore::new("Get", "Alice", "Bob");
        core.matched_exchange_id = Some(Uuid::new_v4());
        let before = core.id;
        core.reset();
        assert_ne!(core.id, before);
        assert!(core.matched_exchange_id.is_none());
    }

    #[test]
    fn import_rejects_missing_id() {
        let mut core = ActionCore::new("Get", "Alice", "Bob");
        let err = core.import_state(&json!({})).unwrap_err();
        assert!(matches!(err, StateError::MissingField { .. }));
    }
}
