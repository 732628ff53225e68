//! Parley session engine.
//!
//! The [`Orchestrator`] composes the storage crate's lease-locked state row
//! and append-only exchange log with a [`Standard`]'s scenarios:
//!
//! - every captured exchange is appended to the session log, then offered to
//!   the live scenarios under the session lease; at most one consumes it
//! - party input is routed to the live scenario whose pending action it names
//! - parties with a new prompt asking for input are notified on a spawned task
//! - reports replay the whole log through the scenarios' check trees

mod config;
mod error;
pub mod keys;
mod notifier;
mod orchestrator;
mod standard;

pub use config::{LockSection, OrchestratorSection, PartyConfig, SandboxConfig};
pub use error::EngineError;
pub use notifier::{HttpNotifier, NoopNotifier, NotifyError, PartyNotifier, RecordingNotifier};
pub use orchestrator::{
    Orchestrator, PartyInput, SessionReport, SessionStatus, DEFAULT_MAX_PARALLEL_SCENARIOS,
};
pub use standard::Standard;
