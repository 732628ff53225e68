//! Application state.

use parley_engine::Orchestrator;
use parley_sample::SampleStandard;
use parley_storage::MemoryStore;

/// The orchestrator the sandbox serves: the sample standard over an
/// in-memory store.
pub(crate) type SandboxOrchestrator = Orchestrator<MemoryStore, SampleStandard>;

/// Application state shared across request handlers.
pub(crate) struct AppState {
    pub(crate) orchestrator: SandboxOrchestrator,
}

impl AppState {
    pub(crate) fn new(orchestrator: SandboxOrchestrator) -> Self {
        Self { orchestrator }
    }

    /// Whether `party_name` plays a role in this session.
    pub(crate) fn knows_party(&self, party_name: &str) -> bool {
        self.orchestrator.context().role_of(party_name).is_some()
    }
}
