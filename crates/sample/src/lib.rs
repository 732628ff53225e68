//! A reference standard for the Parley engine.
//!
//! Two roles, `Publisher` and `Subscriber`, and two scenario modules:
//!
//! - **Schedules**: the publisher supplies query parameters, then the
//!   subscriber queries `GET /schedules` with them. One scenario per
//!   parameter set.
//! - **Subscriptions**: the subscriber creates a subscription with
//!   `POST /subscriptions`, then either reads it back as a signed payload or
//!   deletes it.

mod actions;
mod parameters;
mod schema;

use std::sync::Arc;

use parley_core::{
    BuildContext, BuildError, CheckError, Scenario, ScenarioNode, ScenarioSuite,
    SignatureVerifier, Slot,
};
use parley_engine::Standard;

pub use actions::{
    get_schedules, supply_parameters, CreateSubscription, DeleteSubscription, GetSchedules,
    GetSubscription, SupplyScenarioParameters,
};
pub use parameters::{intervals, FilterParameter, ScenarioParameters, INTERVALS};
pub use schema::{api_document, SampleSchemas};

pub const PUBLISHER: &str = "Publisher";
pub const SUBSCRIBER: &str = "Subscriber";
pub const STANDARD_NAME: &str = "Sample Schedules";
pub const STANDARD_VERSION: &str = "1.0.0";

#[derive(Debug, thiserror::Error)]
pub enum SampleError {
    #[error(transparent)]
    Schema(#[from] CheckError),

    #[error(transparent)]
    Build(#[from] BuildError),
}

/// Values handed from earlier to later actions of one scenario.
#[derive(Default)]
pub struct SampleContext {
    pub parameters: Slot<ScenarioParameters>,
    pub subscription_reference: Slot<String>,
}

pub struct SampleStandard {
    suite: ScenarioSuite<SampleContext>,
}

impl SampleStandard {
    /// `verifier` checks the publisher's signature on signed subscriptions.
    pub fn new(verifier: Arc<dyn SignatureVerifier>) -> Result<Self, SampleError> {
        let schemas = SampleSchemas::load()?;
        Ok(Self {
            suite: build_suite(&schemas, verifier)?,
        })
    }

    pub fn suite(&self) -> &ScenarioSuite<SampleContext> {
        &self.suite
    }
}

fn build_suite(
    schemas: &SampleSchemas,
    verifier: Arc<dyn SignatureVerifier>,
) -> Result<ScenarioSuite<SampleContext>, BuildError> {
    use crate::parameters::FilterParameter::{Date, Interval};

    let schedules = ScenarioNode::root().then_either([
        actions::supply_parameters(&[Interval, Date]).then(actions::get_schedules(schemas))?,
        actions::supply_parameters(&[Date]).then(actions::get_schedules(schemas))?,
    ])?;
    let subscriptions = ScenarioNode::root().then(
        actions::create_subscription(schemas).then_either([
            actions::get_subscription(schemas, verifier),
            actions::delete_subscription(),
        ])?,
    )?;
    Ok(ScenarioSuite::new()
        .with_module("Schedules", schedules)
        .with_module("Subscriptions", subscriptions))
}

impl Standard for SampleStandard {
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
