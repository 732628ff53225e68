//! Scenario tree shape and state checkpointing for every action kind.

mod common;

use common::*;
use parley_core::{Action, Scenario};
use parley_engine::Standard;
use serde_json::json;

fn scenarios(standard: &parley_sample::SampleStandard) -> Vec<Scenario> {
    standard.build_scenarios(&context()).unwrap()
}

fn titles(scenarios: &[Scenario]) -> Vec<&str> {
    scenarios.iter().map(Scenario::title).collect()
}

fn pending(scenario: &mut Scenario) -> &mut (dyn Action + 'static) {
    scenario.peek_next_action_mut().unwrap()
}

#[test]
fn tree_flattens_into_four_scenarios() {
    let standard = standard(&signing_key());
    let scenarios = scenarios(&standard);
    assert_eq!(
        titles(&scenarios),
        vec![
            "SupplyScenarioParameters(interval, date) - GetSchedules",
            "SupplyScenarioParameters(date) - GetSchedules",
            "CreateSubscription - GetSubscription",
            "CreateSubscription - DeleteSubscription",
        ]
    );
    assert_eq!(scenarios[2].module_name(), "Subscriptions");
    let supply = scenarios[0].peek_next_action().unwrap();
    assert!(supply.is_input_required());
    assert_eq!(supply.core().source_party, PUBLISHER_PARTY);
    assert_eq!(scenarios[2].actions()[0].core().source_party, SUBSCRIBER_PARTY);
}

#[test]
fn every_action_kind_round_trips_its_state() {
    let key = signing_key();
    let standard = standard(&key);
    let mut driven = scenarios(&standard);

    // SupplyScenarioParameters + GetSchedules
    pending(&mut driven[0])
        .handle_input(&json!({"interval": "week", "date": "2024-12-31"}))
        .unwrap();
    driven[0].advance();
    let get = exchange(
        "GET",
        "/schedules",
        &[("interval", "week"), ("date", "2024-12-31")],
        None,
        200,
        Some(schedules_body()),
    );
    assert!(pending(&mut driven[0]).try_consume(&get));
    pending(&mut driven[0]).core_mut().matched_exchange_id = Some(get.id);
    driven[0].advance();

    // CreateSubscription in both subscription scenarios
    for index in [2, 3] {
        let create = exchange(
            "POST",
            "/subscriptions",
            &[],
            Some(json!({"callbackUrl": "https://cb", "interval": "week"})),
            201,
            Some(subscription(&format!("sub-{index}"))),
        );
        assert!(pending(&mut driven[index]).try_consume(&create));
        driven[index].advance();
    }

    let mut restored = scenarios(&standard);
    for (original, copy) in driven.iter().zip(restored.iter_mut()) {
        copy.import_state(&original.export_state()).unwrap();
        assert_eq!(copy.export_state(), original.export_state());
        assert_eq!(copy.cursor(), original.cursor());
    }

    // values shared through slots survive the round trip
    assert!(restored[0].actions()[1]
        .human_prompt()
        .contains("\"interval\":\"week\""));
    let read_back = exchange("GET", "/subscriptions/sub-2", &[], None, 200, None);
    assert!(pending(&mut restored[2]).try_consume(&read_back));
    let delete = exchange("DELETE", "/subscriptions/sub-3", &[], None, 204, None);
    assert!(!pending(&mut restored[2]).try_consume(&delete));
    assert!(pending(&mut restored[3]).try_consume(&delete));
}

#[test]
fn reset_forgets_supplied_values() {
    let standard = standard(&signing_key());
    let mut all = scenarios(&standard);
    let scenario = &mut all[1];
    pending(scenario)
        .handle_input(&json!({"date": "2024-12-31"}))
        .unwrap();
    scenario.advance();
    scenario.reset();

    let state = scenario.export_state();
    assert_eq!(state["cursor"], 0);
    assert!(state["actions"][0].get("suppliedScenarioParameters").is_none());
}

#[test]
fn get_schedules_requires_the_supplied_query() {
    let standard = standard(&signing_key());
    let mut all = scenarios(&standard);
    let scenario = &mut all[0];
    pending(scenario)
        .handle_input(&json!({"interval": "day", "date": "2024-12-31"}))
        .unwrap();
    scenario.advance();

    let wrong = exchange("GET", "/schedules", &[("interval", "week"), ("date", "2024-12-31")], None, 200, None);
    assert!(!pending(scenario).try_consume(&wrong));
    let post = exchange("POST", "/schedules", &[("interval", "day"), ("date", "2024-12-31")], None, 200, None);
    assert!(!pending(scenario).try_consume(&post));
    let right = exchange("GET", "/schedules", &[("interval", "day"), ("date", "2024-12-31")], None, 200, None);
    assert!(pending(scenario).try_consume(&right));
}

#[test]
fn supply_rejects_invalid_input() {
    let standard = standard(&signing_key());
    let mut all = scenarios(&standard);
    let err = pending(&mut all[0])
        .handle_input(&json!({"interval": "yearly", "date": "2024-12-31"}))
        .unwrap_err();
    assert!(err.to_string().contains("yearly"));
}
