use parley_core::{BuildError, InputError, StateError, TrafficError};
use parley_storage::StorageError;
use uuid::Uuid;

/// Errors surfaced by the [`Orchestrator`](crate::Orchestrator).
///
/// Non-conformant traffic is never an error here; it ends up as messages in
/// the report.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("cannot build scenarios: {0}")]
    Build(#[from] BuildError),

    #[error("cannot restore session state: {0}")]
    State(#[from] StateError),

    #[error("invalid exchange: {0}")]
    Traffic(#[from] TrafficError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// No live scenario has a pending action with this id; it was already
    /// consumed, reset, or never existed.
    #[error("no pending action with id {action_id}")]
    UnknownAction { action_id: Uuid },

    #[error("input for action {action_id} rejected: {source}")]
    InputRejected {
        action_id: Uuid,
        #[source]
        source: InputError,
    },

    #[error("configuration error: {0}")]
    Config(String),
}

impl EngineError {
    /// Whether the caller sent something wrong, as opposed to a failure of
    /// the engine or its storage.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            EngineError::UnknownAction { .. }
                | EngineError::InputRejected { .. }
                | EngineError::Traffic(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_errors_convert() {
        let err: EngineError = StorageError::Backend("down".into()).into();
        assert!(matches!(err, EngineError::Storage(_)));
        assert!(!err.is_client_error());
        assert_eq!(err.to_string(), "storage error: storage backend error: down");
    }

    #[test]
    fn rejected_input_is_a_client_error() {
        let err = EngineError::InputRejected {
            action_id: Uuid::nil(),
            source: InputError::Invalid("missing date".into()),
        };
        assert!(err.is_client_error());
        assert!(err.to_string().contains("missing date"));
    }
}
