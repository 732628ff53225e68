//! Full sessions through the orchestrator: party input, captured traffic,
//! then the per-role report.

mod common;

use std::sync::Arc;

use common::*;
use ed25519_dalek::SigningKey;
use parley_core::{
    BuildContext, BuildError, ConformanceStatus, Scenario, ScenarioNode, ScenarioSuite,
};
use parley_engine::{Orchestrator, PartyInput, SessionReport, Standard};
use parley_sample::{
    get_schedules, supply_parameters, FilterParameter, SampleContext, SampleSchemas,
    SampleStandard, PUBLISHER, STANDARD_NAME, STANDARD_VERSION, SUBSCRIBER,
};
use parley_storage::{LockConfig, MemoryStore};
use serde_json::json;

const SCHEDULES_SCENARIO: &str = "SupplyScenarioParameters(interval, date) - GetSchedules";
const READ_BACK_SCENARIO: &str = "CreateSubscription - GetSubscription";

fn orchestrator(key: &SigningKey) -> Orchestrator<MemoryStore, SampleStandard> {
    Orchestrator::new(
        "e2e",
        Arc::new(standard(key)),
        context(),
        Arc::new(MemoryStore::new()),
        LockConfig::default(),
    )
    .unwrap()
}

fn scenario_status(report: &SessionReport, role: &str, title: &str) -> ConformanceStatus {
    report.reports[role]
        .scenario_statuses()
        .into_iter()
        .find(|(t, _)| *t == title)
        .map(|(_, status)| status)
        .unwrap_or_else(|| panic!("no scenario '{title}' in the {role} report"))
}

async fn run_schedules_scenario(status: u16) -> SessionReport {
    let o = orchestrator(&signing_key());
    let supply = o
        .pending_prompts(PUBLISHER_PARTY)
        .await
        .unwrap()
        .into_iter()
        .find(|p| p.action_title == "SupplyScenarioParameters(interval, date)")
        .unwrap();
    assert!(supply.input_required);
    o.handle_party_input(&PartyInput {
        action_id: supply.action_id,
        input: json!({"interval": "week", "date": "2024-12-31"}),
    })
    .await
    .unwrap();

    let prompt = o
        .pending_prompts(SUBSCRIBER_PARTY)
        .await
        .unwrap()
        .into_iter()
        .find(|p| p.action_type == "GetSchedules")
        .unwrap();
    assert_eq!(
        prompt.prompt_json,
        Some(json!({"interval": "week", "date": "2024-12-31"}))
    );

    let get = exchange(
        "GET",
        "/schedules",
        &[("interval", "week"), ("date", "2024-12-31")],
        None,
        status,
        Some(schedules_body()),
    );
    assert_eq!(o.handle_exchange(&get).await.unwrap(), Some(prompt.action_id));
    o.generate_report().await.unwrap()
}

#[tokio::test]
async fn conformant_schedules_query() {
    let report = run_schedules_scenario(200).await;
    for role in [PUBLISHER, SUBSCRIBER] {
        assert_eq!(
            scenario_status(&report, role, SCHEDULES_SCENARIO),
            ConformanceStatus::Conformant,
            "{role}:\n{}",
            report.reports[role].to_text()
        );
    }
    assert_eq!(
        scenario_status(&report, PUBLISHER, READ_BACK_SCENARIO),
        ConformanceStatus::NoTraffic
    );
}

#[tokio::test]
async fn wrong_status_is_non_conformant_for_the_publisher() {
    let report = run_schedules_scenario(500).await;
    let publisher = &report.reports[PUBLISHER];
    assert_eq!(publisher.status, ConformanceStatus::NonConformant);
    assert_eq!(
        scenario_status(&report, PUBLISHER, SCHEDULES_SCENARIO),
        ConformanceStatus::NonConformant
    );
    assert!(publisher
        .to_text()
        .contains("Response status '500' does not match the expected value '200'"));
    assert_eq!(
        scenario_status(&report, SUBSCRIBER, SCHEDULES_SCENARIO),
        ConformanceStatus::Conformant
    );
    assert_eq!(report.json[PUBLISHER]["status"], "NON_CONFORMANT");
}

/// Only the interval-and-date schedules scenario.
struct SchedulesOnly {
    suite: ScenarioSuite<SampleContext>,
}

impl SchedulesOnly {
    fn new() -> Self {
        let schemas = SampleSchemas::load().unwrap();
        let schedules = ScenarioNode::root()
            .then(
                supply_parameters(&[FilterParameter::Interval, FilterParameter::Date])
                    .then(get_schedules(&schemas))
                    .unwrap(),
            )
            .unwrap();
        Self {
            suite: ScenarioSuite::new().with_module("Schedules", schedules),
        }
    }
}

impl Standard for SchedulesOnly {
    fn name(&self) -> &str {
        STANDARD_NAME
    }
    fn version(&self) -> &str {
        STANDARD_VERSION
    }
    fn role_names(&self) -> &[&'static str] {
        &[PUBLISHER, SUBSCRIBER]
    }
    fn build_scenarios(&self, ctx: &BuildContext) -> Result<Vec<Scenario>, BuildError> {
        self.suite.instantiate(ctx)
    }
}

#[tokio::test]
async fn single_scenario_session_is_conformant_overall() {
    let o = Orchestrator::new(
        "schedules-only",
        Arc::new(SchedulesOnly::new()),
        context(),
        Arc::new(MemoryStore::new()),
        LockConfig::default(),
    )
    .unwrap();
    assert_eq!(o.status().await.unwrap().scenarios_left, 1);

    let supply = o.pending_prompts(PUBLISHER_PARTY).await.unwrap();
    assert_eq!(supply.len(), 1);
    o.handle_party_input(&PartyInput {
        action_id: supply[0].action_id,
        input: json!({"interval": "week", "date": "2024-12-31"}),
    })
    .await
    .unwrap();

    let query = o.pending_prompts(SUBSCRIBER_PARTY).await.unwrap();
    assert_eq!(query.len(), 1);
    let get = exchange(
        "GET",
        "/schedules",
        &[("interval", "week"), ("date", "2024-12-31")],
        None,
        200,
        Some(schedules_body()),
    );
    assert_eq!(o.handle_exchange(&get).await.unwrap(), Some(query[0].action_id));
    assert_eq!(o.status().await.unwrap().scenarios_left, 0);

    let report = o.generate_report().await.unwrap();
    for role in [PUBLISHER, SUBSCRIBER] {
        assert_eq!(
            report.reports[role].status,
            ConformanceStatus::Conformant,
            "{role}:\n{}",
            report.reports[role].to_text()
        );
        assert_eq!(report.json[role]["status"], "CONFORMANT");
    }
}

// A session whose standard trusts `trusted` and whose publisher signs with
// `signer`.
async fn read_back_session(
    trusted: &SigningKey,
    signer: &SigningKey,
    reference_in_payload: &str,
) -> SessionReport {
    let o = orchestrator(trusted);
    let create = exchange(
        "POST",
        "/subscriptions",
        &[],
        Some(json!({"callbackUrl": "https://subscriber.example.com/callback", "interval": "week"})),
        201,
        Some(subscription("sub-1")),
    );
    assert!(o.handle_exchange(&create).await.unwrap().is_some());

    let read = exchange(
        "GET",
        "/subscriptions/sub-1",
        &[],
        None,
        200,
        Some(signed_subscription(signer, reference_in_payload)),
    );
    assert!(o.handle_exchange(&read).await.unwrap().is_some());
    o.generate_report().await.unwrap()
}

#[tokio::test]
async fn signed_subscription_from_the_trusted_key_is_conformant() {
    let key = signing_key();
    let report = read_back_session(&key, &key, "sub-1").await;
    assert_eq!(
        scenario_status(&report, PUBLISHER, READ_BACK_SCENARIO),
        ConformanceStatus::Conformant,
        "{}",
        report.reports[PUBLISHER].to_text()
    );
}

#[tokio::test]
async fn signature_from_another_key_is_reported() {
    let report = read_back_session(&signing_key(), &signing_key(), "sub-1").await;
    assert_eq!(
        scenario_status(&report, PUBLISHER, READ_BACK_SCENARIO),
        ConformanceStatus::NonConformant
    );
    assert!(report.reports[PUBLISHER]
        .to_text()
        .contains("was a valid JWS, but it was not signed by the expected key"));
}

#[tokio::test]
async fn payload_for_another_subscription_is_reported() {
    let key = signing_key();
    let report = read_back_session(&key, &key, "sub-2").await;
    let text = report.reports[PUBLISHER].to_text();
    assert!(
        text.contains("The value of 'subscription.subscriptionReference' was 'sub-2' instead of 'sub-1'"),
        "{text}"
    );
}

#[tokio::test]
async fn create_is_consumed_by_the_first_live_scenario_only() {
    let o = orchestrator(&signing_key());
    let create = exchange(
        "POST",
        "/subscriptions",
        &[],
        Some(json!({"callbackUrl": "https://cb", "interval": "week"})),
        201,
        Some(subscription("sub-1")),
    );
    o.handle_exchange(&create).await.unwrap();
    let types: Vec<String> = o
        .pending_prompts(SUBSCRIBER_PARTY)
        .await
        .unwrap()
        .into_iter()
        .map(|p| p.action_type)
        .collect();
    assert_eq!(types, vec!["GetSubscription", "CreateSubscription"]);
}
