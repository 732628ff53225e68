use parley_core::{
    Action, ActionCore, BuildContext, InputError, ScenarioNode, Slot, StateError,
};
use serde_json::Value;

use crate::parameters::{FilterParameter, ScenarioParameters};
use crate::{SampleContext, PUBLISHER, SUBSCRIBER};

/// The publisher chooses the query parameters the subscriber must then use.
pub struct SupplyScenarioParameters {
    core: ActionCore,
    expected: Vec<FilterParameter>,
    supplied: Slot<ScenarioParameters>,
}

impl SupplyScenarioParameters {
    pub fn title(expected: &[FilterParameter]) -> String {
        let names: Vec<&str> = expected.iter().map(|p| p.query_name()).collect();
        format!("SupplyScenarioParameters({})", names.join(", "))
    }

    pub fn new(
        ctx: &BuildContext,
        expected: &[FilterParameter],
        supplied: Slot<ScenarioParameters>,
    ) -> Result<Self, parley_core::BuildError> {
        Ok(Self {
            core: ActionCore::new(
                &Self::title(expected),
                ctx.party(PUBLISHER)?,
                ctx.party(SUBSCRIBER)?,
            ),
            expected: expected.to_vec(),
            supplied,
        })
    }
}

impl Action for SupplyScenarioParameters {
    fn core(&self) -> &ActionCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ActionCore {
        &mut self.core
    }

    fn kind(&self) -> &'static str {
        "SupplyScenarioParameters"
    }

    fn reset(&mut self) {
        self.core.reset();
        self.supplied.clear();
    }

    fn export_state(&self) -> Value {
        let mut state = self.core.export_state();
        if let Some(parameters) = self.supplied.get() {
            state["suppliedScenarioParameters"] = parameters.to_json();
        }
        state
    }

    fn import_state(&mut self, state: &Value) -> Result<(), StateError> {
        self.core.import_state(state)?;
        match state.get("suppliedScenarioParameters") {
            Some(parameters) => self.supplied.set(
                serde_json::from_value(parameters.clone())
                    .map_err(|e| StateError::invalid(&self.core.title, e))?,
            ),
            None => self.supplied.clear(),
        }
        Ok(())
    }

    fn human_prompt(&self) -> String {
        let names: Vec<&str> = self.expected.iter().map(|p| p.query_name()).collect();
        format!(
            "Supply values for the query parameters {} that the subscriber should use \
             to retrieve schedules from your system.",
            names.join(", ")
        )
    }

    fn prompt_json(&self) -> Option<Value> {
        Some(ScenarioParameters::example(&self.expected).to_json())
    }

    fn is_input_required(&self) -> bool {
        true
    }

    fn handle_input(&mut self, input: &Value) -> Result<(), InputError> {
        self.supplied
            .set(ScenarioParameters::parse(&self.expected, input)?);
        Ok(())
    }
}

pub fn supply_parameters(expected: &[FilterParameter]) -> ScenarioNode<SampleContext> {
    let expected = expected.to_vec();
    ScenarioNode::action(
        &SupplyScenarioParameters::title(&expected),
        move |ctx: &BuildContext, sc: &mut SampleContext| {
            Ok(Box::new(SupplyScenarioParameters::new(
                ctx,
                &expected,
                sc.parameters.clone(),
            )?) as Box<dyn Action>)
        },
    )
}
