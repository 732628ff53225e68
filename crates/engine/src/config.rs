//! Sandbox configuration.
//!
//! # Example
//!
//! ```toml
//! session = "demo"
//!
//! [lock]
//! lease_millis = 60000
//! retry_count = 600
//! retry_delay_millis = 100
//!
//! [orchestrator]
//! max_parallel_scenarios = 10
//!
//! [[parties]]
//! name = "acme-publisher"
//! role = "Publisher"
//! notification_url = "http://localhost:9001"
//!
//! [[parties]]
//! name = "acme-subscriber"
//! role = "Subscriber"
//! ```
//!
//! `PARLEY_LEASE_MILLIS` and `PARLEY_MAX_PARALLEL_SCENARIOS` override the
//! file.

use std::collections::BTreeSet;
use std::path::Path;
use std::time::Duration;

use parley_core::BuildContext;
use parley_storage::LockConfig;
use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::notifier::HttpNotifier;
use crate::orchestrator::DEFAULT_MAX_PARALLEL_SCENARIOS;
use crate::standard::Standard;

// ── Types ─────────────────────────────────────────────────────────────────────

/// Top-level sandbox configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SandboxConfig {
    #[serde(default = "default_session")]
    pub session: String,
    #[serde(default)]
    pub lock: LockSection,
    #[serde(default)]
    pub orchestrator: OrchestratorSection,
    #[serde(default)]
    pub parties: Vec<PartyConfig>,
}

/// `[lock]` section: lease and retry settings of the session state row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LockSection {
    pub lease_millis: u64,
    pub retry_count: u32,
    pub retry_delay_millis: u64,
}

/// `[orchestrator]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorSection {
    /// How many scenarios are live at once.
    pub max_parallel_scenarios: usize,
}

/// One `[[parties]]` entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartyConfig {
    pub name: String,
    pub role: String,
    /// Base URL notifications are sent to; parties without one only poll.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notification_url: Option<String>,
}

fn default_session() -> String {
    "default".to_string()
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            session: default_session(),
            lock: LockSection::default(),
            orchestrator: OrchestratorSection::default(),
            parties: Vec::new(),
        }
    }
}

impl Default for LockSection {
    fn default() -> Self {
        let defaults = LockConfig::default();
        Self {
            lease_millis: defaults.lease_duration.as_millis() as u64,
            retry_count: defaults.retry_count,
            retry_delay_millis: defaults.retry_delay.as_millis() as u64,
        }
    }
}

impl Default for OrchestratorSection {
    fn default() -> Self {
        Self {
            max_parallel_scenarios: DEFAULT_MAX_PARALLEL_SCENARIOS,
        }
    }
}

// ── Loading ───────────────────────────────────────────────────────────────────

impl SandboxConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, EngineError> {
        toml::from_str(content).map_err(|e| EngineError::Config(e.to_string()))
    }

    /// Read and parse a TOML file, then apply environment overrides.
    pub fn load(path: &Path) -> Result<Self, EngineError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            EngineError::Config(format!("could not read '{}': {}", path.display(), e))
        })?;
        let config = toml::from_str::<Self>(&content).map_err(|e| {
            EngineError::Config(format!("could not parse '{}': {}", path.display(), e))
        })?;
        config.with_env_overrides()
    }

    pub fn with_env_overrides(self) -> Result<Self, EngineError> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply `PARLEY_*` overrides looked up through `lookup`.
    pub fn with_overrides(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, EngineError> {
        if let Some(value) = lookup("PARLEY_LEASE_MILLIS") {
            self.lock.lease_millis = parse_override("PARLEY_LEASE_MILLIS", &value)?;
        }
        if let Some(value) = lookup("PARLEY_MAX_PARALLEL_SCENARIOS") {
            self.orchestrator.max_parallel_scenarios =
                parse_override("PARLEY_MAX_PARALLEL_SCENARIOS", &value)?;
        }
        Ok(self)
    }

    pub fn to_toml_string(&self) -> Result<String, EngineError> {
        toml::to_string_pretty(self).map_err(|e| EngineError::Config(e.to_string()))
    }

    /// Check the settings that parsing alone cannot, collecting every problem.
    pub fn validate(&self) -> Result<(), EngineError> {
        let mut errors = Vec::new();
        if self.session.trim().is_empty() {
            errors.push("session must not be empty".to_string());
        }
        if self.lock.lease_millis == 0 {
            errors.push("lock.lease_millis must be positive".to_string());
        }
        if self.orchestrator.max_parallel_scenarios == 0 {
            errors.push("orchestrator.max_parallel_scenarios must be positive".to_string());
        }
        let mut names = BTreeSet::new();
        let mut roles = BTreeSet::new();
        for party in &self.parties {
            if !names.insert(party.name.as_str()) {
                errors.push(format!("party '{}' is configured twice", party.name));
            }
            if !roles.insert(party.role.as_str()) {
                errors.push(format!("role '{}' is played by more than one party", party.role));
            }
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(EngineError::Config(errors.join("; ")))
        }
    }

    pub fn lock_config(&self) -> LockConfig {
        LockConfig::default()
            .with_lease_duration(Duration::from_millis(self.lock.lease_millis))
            .with_retries(
                self.lock.retry_count,
                Duration::from_millis(self.lock.retry_delay_millis),
            )
    }

    /// The build context for `standard` with the configured parties.
    pub fn build_context(&self, standard: &dyn Standard) -> BuildContext {
        self.parties.iter().fold(
            BuildContext::new(standard.name(), standard.version())
                .with_api_version(standard.api_version()),
            |ctx, party| ctx.with_party(&party.role, &party.name),
        )
    }

    pub fn http_notifier(&self) -> HttpNotifier {
        self.parties
            .iter()
            .filter_map(|party| Some((party, party.notification_url.as_deref()?)))
            .fold(HttpNotifier::new(), |notifier, (party, url)| {
                notifier.with_endpoint(&party.name, url)
            })
    }
}

fn parse_override<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, EngineError>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| EngineError::Config(format!("{key}='{value}': {e}")))
}
