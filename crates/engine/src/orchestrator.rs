use std::collections::{BTreeMap, BTreeSet};
use std::ops::Range;
use std::sync::Arc;

use parley_core::{
    ActionPrompt, BuildContext, CheckNode, ConformanceReport, Exchange, Scenario, StateError,
    TrafficIndex,
};
use parley_storage::{ExchangeLog, LockConfig, LockingMap, SortedPartitionsStore, StatefulExecutor};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::SandboxConfig;
use crate::error::EngineError;
use crate::keys::{session_state_key, session_traffic_key};
use crate::notifier::{NoopNotifier, PartyNotifier};
use crate::standard::Standard;

pub const DEFAULT_MAX_PARALLEL_SCENARIOS: usize = 10;

/// Input a party submits for one of its pending actions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartyInput {
    pub action_id: Uuid,
    #[serde(default)]
    pub input: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStatus {
    pub scenarios_left: usize,
    pub batches_left: usize,
}

/// Reports for every role of the standard, plus their rendered forms.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionReport {
    pub reports: BTreeMap<String, ConformanceReport>,
    pub html: String,
    pub json: Value,
}

impl SessionReport {
    fn new(reports: BTreeMap<String, ConformanceReport>) -> Self {
        let html = ConformanceReport::to_html(&reports, false);
        let json = Value::Object(
            reports
                .iter()
                .map(|(role, report)| (role.clone(), report.to_json()))
                .collect(),
        );
        Self {
            reports,
            html,
            json,
        }
    }

    /// The HTML page with every block expanded.
    pub fn printable_html(&self) -> String {
        ConformanceReport::to_html(&self.reports, true)
    }
}

/// Drives one session of one standard.
///
/// All scenario state lives in the session's state row and is only changed
/// inside a [`StatefulExecutor`] cycle, so any number of orchestrators over
/// the same store and session id may serve requests concurrently. Captured
/// exchanges are appended to the session's traffic partition without taking
/// the lease.
///
/// Scenarios run in batches of `max_parallel_scenarios`, in the standard's
/// order; only the first batch with unfinished scenarios is live.
pub struct Orchestrator<S, B> {
    session_id: String,
    standard: Arc<B>,
    context: BuildContext,
    executor: StatefulExecutor<S>,
    log: ExchangeLog<S>,
    notifier: Arc<dyn PartyNotifier>,
    max_parallel_scenarios: usize,
}

/// What one mutation cycle observed: its output and the pending prompts
/// before and after.
struct Transition<T> {
    output: T,
    pending_before: BTreeSet<(String, Uuid)>,
    pending_after: BTreeSet<(String, Uuid)>,
}

impl<S: SortedPartitionsStore, B: Standard> Orchestrator<S, B> {
    /// Fails when the standard's scenarios cannot be built for `context`,
    /// e.g. because a role has no party.
    pub fn new(
        session_id: &str,
        standard: Arc<B>,
        context: BuildContext,
        store: Arc<S>,
        lock_config: LockConfig,
    ) -> Result<Self, EngineError> {
        standard.build_scenarios(&context)?;
        Ok(Self {
            session_id: session_id.to_string(),
            standard,
            context,
            executor: StatefulExecutor::new(LockingMap::new(Arc::clone(&store), lock_config)),
            log: ExchangeLog::new(store),
            notifier: Arc::new(NoopNotifier),
            max_parallel_scenarios: DEFAULT_MAX_PARALLEL_SCENARIOS,
        })
    }

    /// An orchestrator for the configured session, parties, lease and
    /// notification endpoints.
    pub fn from_config(
        config: &SandboxConfig,
        standard: Arc<B>,
        store: Arc<S>,
    ) -> Result<Self, EngineError> {
        config.validate()?;
        let context = config.build_context(standard.as_ref());
        Ok(
            Self::new(&config.session, standard, context, store, config.lock_config())?
                .with_max_parallel_scenarios(config.orchestrator.max_parallel_scenarios)
                .with_notifier(Arc::new(config.http_notifier())),
        )
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn PartyNotifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn with_max_parallel_scenarios(mut self, max_parallel_scenarios: usize) -> Self {
        self.max_parallel_scenarios = max_parallel_scenarios.max(1);
        self
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn standard(&self) -> &B {
        &self.standard
    }

    pub fn context(&self) -> &BuildContext {
        &self.context
    }

    // ── Mutations ────────────────────────────────────────────────────────────

    /// Record `exchange` and offer it to the live scenarios.
    ///
    /// The exchange is appended to the log first, whether or not anything
    /// matches it. Then the live scenarios are scanned in order and the first
    /// whose pending action accepts the exchange advances; the scan stops
    /// there. Returns the id of the consuming action.
    pub async fn handle_exchange(&self, exchange: &Exchange) -> Result<Option<Uuid>, EngineError> {
        let sort_key = exchange.log_sort_key()?;
        self.log
            .append(
                &session_traffic_key(&self.session_id),
                &sort_key,
                serde_json::to_value(exchange)?,
            )
            .await?;

        let transition = self
            .mutate(|scenarios, live| Ok(consume(scenarios, live, exchange)))
            .await?;

        match &transition.output {
            Some((scenario, action_id)) => info!(
                session = %self.session_id,
                exchange = %exchange.id,
                scenario = %scenario,
                action = %action_id,
                "scenario advanced on exchange"
            ),
            None => info!(
                session = %self.session_id,
                exchange = %exchange.id,
                method = %exchange.request.method,
                url = %exchange.request.url,
                "exchange matched no pending action"
            ),
        }
        let output = transition.output.as_ref().map(|(_, id)| *id);
        self.notify_new_prompts(&transition);
        Ok(output)
    }

    /// Hand a party's input to the pending action it names, then advance
    /// that scenario. Only scenarios of the live batch accept input.
    pub async fn handle_party_input(&self, input: &PartyInput) -> Result<(), EngineError> {
        let transition = self
            .mutate(|scenarios, live| {
                let scenario = scenarios[live]
                    .iter_mut()
                    .find(|s| {
                        s.peek_next_action()
                            .is_some_and(|a| a.core().id == input.action_id)
                    })
                    .ok_or(EngineError::UnknownAction {
                        action_id: input.action_id,
                    })?;
                if let Some(action) = scenario.peek_next_action_mut() {
                    action
                        .handle_input(&input.input)
                        .map_err(|source| EngineError::InputRejected {
                            action_id: input.action_id,
                            source,
                        })?;
                }
                scenario.advance();
                Ok(scenario.title().to_string())
            })
            .await?;

        info!(
            session = %self.session_id,
            action = %input.action_id,
            scenario = %transition.output,
            "scenario advanced on party input"
        );
        self.notify_new_prompts(&transition);
        Ok(())
    }

    /// Start every scenario over with fresh action ids. The traffic log is
    /// kept.
    pub async fn reset(&self) -> Result<(), EngineError> {
        let transition = self
            .mutate(|scenarios, _| {
                scenarios.iter_mut().for_each(Scenario::reset);
                Ok(())
            })
            .await?;
        info!(session = %self.session_id, "session reset");
        self.notify_new_prompts(&transition);
        Ok(())
    }

    // ── Queries ──────────────────────────────────────────────────────────────

    /// Prompts of the live actions `party_name` has to act on.
    pub async fn pending_prompts(&self, party_name: &str) -> Result<Vec<ActionPrompt>, EngineError> {
        let scenarios = self.snapshot().await?;
        let live = live_batch(&scenarios, self.max_parallel_scenarios);
        Ok(scenarios[live]
            .iter()
            .filter_map(Scenario::peek_next_action)
            .filter(|action| action.core().source_party == party_name)
            .map(|action| action.prompt())
            .collect())
    }

    pub async fn status(&self) -> Result<SessionStatus, EngineError> {
        let scenarios = self.snapshot().await?;
        Ok(SessionStatus {
            scenarios_left: scenarios.iter().filter(|s| s.has_next_action()).count(),
            batches_left: scenarios
                .chunks(self.max_parallel_scenarios)
                .filter(|batch| batch.iter().any(Scenario::has_next_action))
                .count(),
        })
    }

    /// Every captured exchange of the session, oldest first.
    pub async fn traffic(&self) -> Result<Vec<Exchange>, EngineError> {
        self.log
            .list_by_partition(&session_traffic_key(&self.session_id))
            .await?
            .into_iter()
            .map(|value| serde_json::from_value(value).map_err(EngineError::from))
            .collect()
    }

    /// Replay the whole traffic log through the check trees of the current
    /// scenarios and report per role.
    pub async fn generate_report(&self) -> Result<SessionReport, EngineError> {
        let scenarios = self.snapshot().await?;
        let traffic = TrafficIndex::new(self.traffic().await?);
        let mut root = self.check_tree(&scenarios);
        root.evaluate(&traffic);
        debug!(
            session = %self.session_id,
            exchanges = traffic.len(),
            "report evaluated"
        );
        Ok(SessionReport::new(ConformanceReport::for_roles(
            &root,
            self.standard.role_names().iter().copied(),
        )))
    }

    fn check_tree(&self, scenarios: &[Scenario]) -> CheckNode {
        let api_version = self.standard.api_version();
        CheckNode::group(
            self.standard.report_title(),
            scenarios
                .iter()
                .map(|scenario| {
                    CheckNode::group(
                        scenario.title(),
                        scenario
                            .actions()
                            .iter()
                            .filter_map(|action| action.build_checks(api_version))
                            .collect(),
                    )
                })
                .collect(),
        )
    }

    // ── State handling ───────────────────────────────────────────────────────

    /// Run `change` on the restored scenarios under the session lease and
    /// persist the result. `change` also receives the live batch range.
    async fn mutate<T, F>(&self, mut change: F) -> Result<Transition<T>, EngineError>
    where
        F: FnMut(&mut Vec<Scenario>, Range<usize>) -> Result<T, EngineError>,
    {
        let max = self.max_parallel_scenarios;
        self.executor
            .execute(&session_state_key(&self.session_id), |stored| {
                let mut scenarios = self.restore(stored.as_ref())?;
                let pending_before = pending_set(&scenarios, max);
                let live = live_batch(&scenarios, max);
                let output = change(&mut scenarios, live)?;
                let pending_after = pending_set(&scenarios, max);
                Ok((
                    save_state(&scenarios),
                    Transition {
                        output,
                        pending_before,
                        pending_after,
                    },
                ))
            })
            .await
    }

    /// Lease-free read of the last saved state. A session that was never
    /// saved is built and saved first, so the action ids handed out in
    /// prompts are the ones later input refers to.
    async fn snapshot(&self) -> Result<Vec<Scenario>, EngineError> {
        let stored = match self
            .executor
            .locks()
            .read(&session_state_key(&self.session_id))
            .await?
        {
            Some(state) => state,
            None => {
                let initial = self.mutate(|scenarios, _| Ok(save_state(scenarios))).await?;
                debug!(session = %self.session_id, "initial session state saved");
                initial.output
            }
        };
        self.restore(Some(&stored))
    }

    fn restore(&self, stored: Option<&Value>) -> Result<Vec<Scenario>, EngineError> {
        let mut scenarios = self.standard.build_scenarios(&self.context)?;
        let Some(state) = stored else {
            return Ok(scenarios);
        };
        let states = state
            .get("scenarios")
            .and_then(Value::as_array)
            .ok_or_else(|| StateError::missing("session", "scenarios"))?;
        if states.len() != scenarios.len() {
            return Err(StateError::ScenarioCountMismatch {
                expected: scenarios.len(),
                found: states.len(),
            }
            .into());
        }
        for (scenario, scenario_state) in scenarios.iter_mut().zip(states) {
            scenario.import_state(scenario_state)?;
        }
        Ok(scenarios)
    }

    /// Notify every party that gained a pending prompt asking for input.
    /// Each call runs on its own task and failures are only logged.
    fn notify_new_prompts<T>(&self, transition: &Transition<T>) {
        let parties: BTreeSet<&str> = transition
            .pending_after
            .difference(&transition.pending_before)
            .map(|(party, _)| party.as_str())
            .collect();
        for party in parties {
            let notifier = Arc::clone(&self.notifier);
            let party = party.to_string();
            tokio::spawn(async move {
                if let Err(e) = notifier.notify(&party).await {
                    warn!(%party, error = %e, "party notification failed");
                }
            });
        }
    }
}

fn save_state(scenarios: &[Scenario]) -> Value {
    json!({
        "scenarios": scenarios.iter().map(Scenario::export_state).collect::<Vec<_>>(),
    })
}

/// Index range of the first batch that still has unfinished scenarios.
fn live_batch(scenarios: &[Scenario], batch_size: usize) -> Range<usize> {
    let batch_size = batch_size.max(1);
    (0..scenarios.len())
        .step_by(batch_size)
        .map(|start| start..(start + batch_size).min(scenarios.len()))
        .find(|range| scenarios[range.clone()].iter().any(Scenario::has_next_action))
        .unwrap_or(0..0)
}

/// `(party, action id)` of every pending action in the live batch that
/// waits for party input.
fn pending_set(scenarios: &[Scenario], batch_size: usize) -> BTreeSet<(String, Uuid)> {
    scenarios[live_batch(scenarios, batch_size)]
        .iter()
        .filter_map(Scenario::peek_next_action)
        .filter(|action| action.is_input_required())
        .map(|action| (action.core().source_party.clone(), action.core().id))
        .collect()
}

/// Offer `exchange` to the live scenarios in order; the first taker wins.
fn consume(
    scenarios: &mut [Scenario],
    live: Range<usize>,
    exchange: &Exchange,
) -> Option<(String, Uuid)> {
    for scenario in &mut scenarios[live] {
        let Some(action) = scenario.peek_next_action_mut() else {
            continue;
        };
        if action.is_input_required() || !action.try_consume(exchange) {
            continue;
        }
        action.core_mut().matched_exchange_id = Some(exchange.id);
        let action_id = action.core().id;
        scenario.advance();
        return Some((scenario.title().to_string(), action_id));
    }
    None
}
