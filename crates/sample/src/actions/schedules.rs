use parley_core::{
    Action, ActionCore, BuildContext, CheckNode, Exchange, HttpMessageType, JsonContentCheck,
    JsonRule, JsonSchemaCheck, QueryParamCheck, ScenarioNode, SchemaValidator, Slot,
};
use serde_json::{json, Value};

use super::{exchange_checks, leaf};
use crate::parameters::{intervals, ScenarioParameters};
use crate::schema::SampleSchemas;
use crate::{SampleContext, PUBLISHER, SUBSCRIBER};

const PATH: &str = "/schedules";

/// The subscriber queries `GET /schedules` with the supplied parameters.
pub struct GetSchedules {
    core: ActionCore,
    parameters: Slot<ScenarioParameters>,
    response_schema: SchemaValidator,
}

impl GetSchedules {
    pub fn new(
        ctx: &BuildContext,
        parameters: Slot<ScenarioParameters>,
        response_schema: SchemaValidator,
    ) -> Result<Self, parley_core::BuildError> {
        Ok(Self {
            core: ActionCore::new("GetSchedules", ctx.party(SUBSCRIBER)?, ctx.party(PUBLISHER)?),
            parameters,
            response_schema,
        })
    }

    fn content_rules(&self, parameters: &ScenarioParameters) -> Vec<JsonRule> {
        let mut rules = vec![
            JsonRule::all_items("/schedules", JsonRule::must_be_keyword("/interval", intervals())),
            JsonRule::all_items(
                "/schedules",
                JsonRule::cross_field(
                    "/startDate",
                    "/endDate",
                    "the start date must not be after the end date",
                    |start, end| start.as_str() <= end.as_str(),
                ),
            ),
        ];
        if let Some(interval) = parameters.get("interval") {
            rules.push(JsonRule::all_items(
                "/schedules",
                JsonRule::must_equal("/interval", json!(interval)),
            ));
        }
        if let Some(date) = parameters.get("date") {
            let date = date.to_string();
            rules.push(JsonRule::at_least_one(
                "/schedules",
                &format!("At least one schedule covers the date {date}"),
                true,
                move |schedule| {
                    let start = schedule.get("startDate").and_then(Value::as_str);
                    let end = schedule.get("endDate").and_then(Value::as_str);
                    matches!((start, end), (Some(s), Some(e)) if s <= date.as_str() && date.as_str() <= e)
                },
            ));
        }
        rules
    }
}

impl Action for GetSchedules {
    fn core(&self) -> &ActionCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ActionCore {
        &mut self.core
    }

    fn kind(&self) -> &'static str {
        "GetSchedules"
    }

    fn human_prompt(&self) -> String {
        let parameters = self
            .parameters
            .get()
            .map(|p| p.to_json().to_string())
            .unwrap_or_else(|| "{}".to_string());
        format!("Send a GET {PATH} request with the following query parameters: {parameters}")
    }

    fn prompt_json(&self) -> Option<Value> {
        self.parameters.get().map(|p| p.to_json())
    }

    fn try_consume(&mut self, exchange: &Exchange) -> bool {
        let request = &exchange.request;
        request.method == "GET"
            && request.path().ends_with(PATH)
            && self
                .parameters
                .get()
                .is_some_and(|p| p.matches_query(request))
    }

    fn build_checks(&self, expected_api_version: &str) -> Option<CheckNode> {
        let matched = self.core.matched_exchange_id;
        let parameters = self.parameters.get().unwrap_or_default();
        let mut checks = exchange_checks(&self.core, expected_api_version, PATH, 200);
        checks.extend(
            parameters
                .iter()
                .map(|(name, value)| leaf(SUBSCRIBER, matched, QueryParamCheck::equals(name, value))),
        );
        checks.push(leaf(
            PUBLISHER,
            matched,
            JsonSchemaCheck::new(HttpMessageType::Response, self.response_schema.clone()),
        ));
        checks.push(leaf(
            PUBLISHER,
            matched,
            JsonContentCheck::new(
                "The schedules match the query",
                HttpMessageType::Response,
                self.content_rules(&parameters),
            ),
        ));
        Some(CheckNode::group(self.core.title.clone(), checks))
    }
}

/// `GetSchedules`, reading the parameters an earlier supply step stored.
pub fn get_schedules(schemas: &SampleSchemas) -> ScenarioNode<SampleContext> {
    let schema = schemas.schedules.clone();
    ScenarioNode::action(
        "GetSchedules",
        move |ctx: &BuildContext, sc: &mut SampleContext| {
            Ok(Box::new(GetSchedules::new(ctx, sc.parameters.clone(), schema.clone())?)
                as Box<dyn Action>)
        },
    )
}
