use std::fmt;

use serde_json::{json, Value};
use uuid::Uuid;

use super::action::Action;
use crate::error::StateError;

/// One root-to-leaf path through a standard's action tree, with a cursor at
/// the next unconsumed action.
pub struct Scenario {
    id: Uuid,
    module_name: String,
    module_index: usize,
    index: usize,
    actions: Vec<Box<dyn Action>>,
    cursor: usize,
}

impl Scenario {
    pub fn new(
        module_name: &str,
        module_index: usize,
        index: usize,
        mut actions: Vec<Box<dyn Action>>,
    ) -> Self {
        let mut path = String::new();
        for action in &mut actions {
            let core = action.core_mut();
            path = if path.is_empty() {
                core.title.clone()
            } else {
                format!("{path} - {}", core.title)
            };
            core.path = path.clone();
        }
        Self {
            id: Uuid::new_v4(),
            module_name: module_name.to_string(),
            module_index,
            index,
            actions,
            cursor: 0,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn module_name(&self) -> &str {
        &self.module_name
    }

    pub fn module_index(&self) -> usize {
        self.module_index
    }

    /// Position of this scenario in the standard's flattened list.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn actions(&self) -> &[Box<dyn Action>] {
        &self.actions
    }

    /// The full path of the last action.
    pub fn title(&self) -> &str {
        self.actions
            .last()
            .map(|action| action.core().path.as_str())
            .unwrap_or_default()
    }

    pub fn has_next_action(&self) -> bool {
        self.cursor < self.actions.len()
    }

    pub fn peek_next_action(&self) -> Option<&dyn Action> {
        self.actions.get(self.cursor).map(|action| action.as_ref())
    }

    pub fn peek_next_action_mut(&mut self) -> Option<&mut (dyn Action + 'static)> {
        self.actions.get_mut(self.cursor).map(|action| action.as_mut())
    }

    /// Move the cursor past the pending action.
    pub fn advance(&mut self) {
        if self.has_next_action() {
            self.cursor += 1;
        }
    }

    /// Titles of the actions still to come, e.g. `"Supply - Get"`.
    pub fn next_actions_description(&self) -> String {
        self.actions[self.cursor.min(self.actions.len())..]
            .iter()
            .map(|action| action.core().title.as_str())
            .collect::<Vec<_>>()
            .join(" - ")
    }

    /// Back to the first action, with fresh action ids.
    pub fn reset(&mut self) {
        self.cursor = 0;
        for action in &mut self.actions {
            action.reset();
        }
    }

    pub fn export_state(&self) -> Value {
        json!({
            "id": self.id,
            "cursor": self.cursor,
            "actions": self.actions.iter().map(|a| a.export_state()).collect::<Vec<_>>(),
        })
    }

    /// Load a state saved by [`Scenario::export_state`]. On error the
    /// scenario is left exactly as it was.
    pub fn import_state(&mut self, state: &Value) -> Result<(), StateError> {
        let what = format!("scenario {}", self.index);
        let id = state
            .get("id")
            .ok_or_else(|| StateError::missing(&what, "id"))?;
        let id: Uuid = serde_json::from_value(id.clone()).map_err(|e| StateError::invalid(&what, e))?;
        let cursor = state
            .get("cursor")
            .and_then(Value::as_u64)
            .ok_or_else(|| StateError::missing(&what, "cursor"))?;
        let actions = state
            .get("actions")
            .and_then(Value::as_array)
            .ok_or_else(|| StateError::missing(&what, "actions"))?;
        if actions.len() != self.actions.len() {
            return Err(StateError::ActionCountMismatch {
                scenario: what,
                expected: self.actions.len(),
                found: actions.len(),
            });
        }

        let previous: Vec<Value> = self.actions.iter().map(|a| a.export_state()).collect();
        let imported = self
            .actions
            .iter_mut()
            .zip(actions)
            .try_for_each(|(action, action_state)| action.import_state(action_state));
        if let Err(e) = imported {
            for (action, action_state) in self.actions.iter_mut().zip(&previous) {
                // a state this action exported itself always loads back
                let _ = action.import_state(action_state);
            }
            return Err(e);
        }
        self.id = id;
        self.cursor = usize::try_from(cursor)
            .unwrap_or(usize::MAX)
            .min(self.actions.len());
        Ok(())
    }
}

impl fmt::Debug for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scenario")
            .field("id", &self.id)
            .field("index", &self.index)
            .field("title", &self.title())
            .field("cursor", &self.cursor)
            .finish()
    }
}
