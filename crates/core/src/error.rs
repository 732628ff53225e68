//! Error types shared across the core crate.
//!
//! Conformance failures are never errors: they are collected as messages on
//! check nodes. The types here cover programming and input mistakes only.

/// Illegal action-tree construction.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BuildError {
    /// `then`/`then_either` called on a node that already has continuations.
    #[error("node '{title}' already has continuations")]
    ContinuationAlreadySet { title: String },

    /// `then_either` called without any alternative.
    #[error("node '{title}' needs at least one alternative")]
    NoAlternatives { title: String },

    /// A standard asked for a role that was not configured.
    #[error("no party configured for role '{0}'")]
    UnknownRole(String),
}

/// A persisted state blob that does not fit the scenario or action it is
/// imported into.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("state for {what} is missing field '{field}'")]
    MissingField { what: String, field: String },

    #[error("expected {expected} scenarios in stored state, found {found}")]
    ScenarioCountMismatch { expected: usize, found: usize },

    #[error("scenario {scenario} has {expected} actions, stored state has {found}")]
    ActionCountMismatch {
        scenario: String,
        expected: usize,
        found: usize,
    },

    #[error("invalid state for {what}: {source}")]
    Invalid {
        what: String,
        #[source]
        source: serde_json::Error,
    },
}

impl StateError {
    pub fn missing(what: &str, field: &str) -> Self {
        StateError::MissingField {
            what: what.to_string(),
            field: field.to_string(),
        }
    }

    pub fn invalid(what: &str, source: serde_json::Error) -> Self {
        StateError::Invalid {
            what: what.to_string(),
            source,
        }
    }
}

/// Party input rejected by the pending action.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InputError {
    #[error("action '{0}' does not accept input")]
    NotAccepted(String),

    #[error("invalid input: {0}")]
    Invalid(String),
}

/// An unexpected failure while evaluating a single check. Isolated to the
/// check node it occurred on.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CheckError {
    #[error("schema error: {0}")]
    Schema(String),

    #[error("{0}")]
    Evaluation(String),
}

/// Problems deriving storage keys from an exchange.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TrafficError {
    #[error("timestamp {0} ms is out of range")]
    TimestampOutOfRange(i64),
}
