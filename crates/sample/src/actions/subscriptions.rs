use std::sync::Arc;

use parley_core::{
    Action, ActionCore, BuildContext, CheckNode, Exchange, HttpMessageType, JsonContentCheck,
    JsonRule, JsonSchemaCheck, ScenarioNode, SchemaValidator, SignatureVerifier, Slot, StateError,
};
use serde_json::{json, Value};

use super::{exchange_checks, leaf};
use crate::parameters::intervals;
use crate::schema::SampleSchemas;
use crate::{SampleContext, PUBLISHER, SUBSCRIBER};

const COLLECTION_PATH: &str = "/subscriptions";

fn subscription_path(reference: Option<&str>) -> String {
    format!("{COLLECTION_PATH}/{}", reference.unwrap_or_default())
}

/// Whether `exchange` is a `method` request on the subscription `reference`.
fn targets_subscription(exchange: &Exchange, method: &str, reference: Option<String>) -> bool {
    let Some(reference) = reference else {
        return false;
    };
    exchange.request.method == method
        && exchange
            .request
            .path()
            .ends_with(&subscription_path(Some(&reference)))
}

// ──────────────────────────────────────────────
// Create
// ──────────────────────────────────────────────

/// `POST /subscriptions`; the publisher answers 201 with the new
/// subscription, whose reference later actions address.
pub struct CreateSubscription {
    core: ActionCore,
    reference: Slot<String>,
    schemas: SampleSchemas,
}

impl CreateSubscription {
    pub fn new(
        ctx: &BuildContext,
        reference: Slot<String>,
        schemas: SampleSchemas,
    ) -> Result<Self, parley_core::BuildError> {
        Ok(Self {
            core: ActionCore::new(
                "CreateSubscription",
                ctx.party(SUBSCRIBER)?,
                ctx.party(PUBLISHER)?,
            ),
            reference,
            schemas,
        })
    }
}

impl Action for CreateSubscription {
    fn core(&self) -> &ActionCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ActionCore {
        &mut self.core
    }

    fn kind(&self) -> &'static str {
        "CreateSubscription"
    }

    fn reset(&mut self) {
        self.core.reset();
        self.reference.clear();
    }

    fn export_state(&self) -> Value {
        let mut state = self.core.export_state();
        if let Some(reference) = self.reference.get() {
            state["subscriptionReference"] = json!(reference);
        }
        state
    }

    fn import_state(&mut self, state: &Value) -> Result<(), StateError> {
        self.core.import_state(state)?;
        match state.get("subscriptionReference").and_then(Value::as_str) {
            Some(reference) => self.reference.set(reference.to_string()),
            None => self.reference.clear(),
        }
        Ok(())
    }

    fn human_prompt(&self) -> String {
        format!(
            "Send a POST {COLLECTION_PATH} request creating a subscription with a callbackUrl \
             and an interval (one of {})",
            crate::INTERVALS.join(", ")
        )
    }

    fn try_consume(&mut self, exchange: &Exchange) -> bool {
        if exchange.request.method != "POST"
            || !exchange.request.path().ends_with(COLLECTION_PATH)
        {
            return false;
        }
        let body = exchange.response.message.body.as_json();
        match body.get("subscriptionReference").and_then(Value::as_str) {
            Some(reference) => self.reference.set(reference.to_string()),
            None => self.reference.clear(),
        }
        true
    }

    fn build_checks(&self, expected_api_version: &str) -> Option<CheckNode> {
        let matched = self.core.matched_exchange_id;
        let mut checks = exchange_checks(&self.core, expected_api_version, COLLECTION_PATH, 201);
        checks.extend([
            leaf(
                SUBSCRIBER,
                matched,
                JsonSchemaCheck::new(
                    HttpMessageType::Request,
                    self.schemas.subscription_request.clone(),
                ),
            ),
            leaf(
                SUBSCRIBER,
                matched,
                JsonContentCheck::new(
                    "The subscription request is valid",
                    HttpMessageType::Request,
                    vec![JsonRule::must_be_keyword("/interval", intervals())],
                ),
            ),
            leaf(
                PUBLISHER,
                matched,
                JsonSchemaCheck::new(HttpMessageType::Response, self.schemas.subscription.clone()),
            ),
            leaf(
                PUBLISHER,
                matched,
                JsonContentCheck::new(
                    "The created subscription echoes the request",
                    HttpMessageType::Response,
                    vec![
                        JsonRule::must_be_present("/subscriptionReference"),
                        JsonRule::must_be_keyword("/interval", intervals()),
                    ],
                ),
            ),
        ]);
        Some(CheckNode::group(self.core.title.clone(), checks))
    }
}

// ──────────────────────────────────────────────
// Get
// ──────────────────────────────────────────────

/// `GET /subscriptions/<reference>`; the publisher returns the subscription
/// as a signed payload.
pub struct GetSubscription {
    core: ActionCore,
    reference: Slot<String>,
    response_schema: SchemaValidator,
    verifier: Arc<dyn SignatureVerifier>,
}

impl GetSubscription {
    pub fn new(
        ctx: &BuildContext,
        reference: Slot<String>,
        response_schema: SchemaValidator,
        verifier: Arc<dyn SignatureVerifier>,
    ) -> Result<Self, parley_core::BuildError> {
        Ok(Self {
            core: ActionCore::new(
                "GetSubscription",
                ctx.party(SUBSCRIBER)?,
                ctx.party(PUBLISHER)?,
            ),
            reference,
            response_schema,
            verifier,
        })
    }
}

impl Action for GetSubscription {
    fn core(&self) -> &ActionCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ActionCore {
        &mut self.core
    }

    fn kind(&self) -> &'static str {
        "GetSubscription"
    }

    fn human_prompt(&self) -> String {
        format!(
            "Send a GET {} request",
            subscription_path(self.reference.get().as_deref())
        )
    }

    fn try_consume(&mut self, exchange: &Exchange) -> bool {
        targets_subscription(exchange, "GET", self.reference.get())
    }

    fn build_checks(&self, expected_api_version: &str) -> Option<CheckNode> {
        let matched = self.core.matched_exchange_id;
        let path = subscription_path(self.reference.get().as_deref());
        let reference = self.reference.clone();
        let payload_rules = vec![
            JsonRule::must_equal_with("/subscription/subscriptionReference", move || {
                reference.get().map(Value::String)
            }),
            JsonRule::checksum_matches("/subscription", "/contentChecksum"),
        ];
        let mut checks = exchange_checks(&self.core, expected_api_version, &path, 200);
        checks.extend([
            leaf(
                PUBLISHER,
                matched,
                JsonSchemaCheck::new(HttpMessageType::Response, self.response_schema.clone()),
            ),
            leaf(
                PUBLISHER,
                matched,
                JsonContentCheck::new(
                    "The signed content is valid",
                    HttpMessageType::Response,
                    vec![JsonRule::signed_payload(
                        "/signedContent",
                        Arc::clone(&self.verifier),
                        payload_rules,
                    )],
                ),
            ),
        ]);
        Some(CheckNode::group(self.core.title.clone(), checks))
    }
}

// ──────────────────────────────────────────────
// Delete
// ──────────────────────────────────────────────

/// `DELETE /subscriptions/<reference>`, answered with 204.
pub struct DeleteSubscription {
    core: ActionCore,
    reference: Slot<String>,
}

impl DeleteSubscription {
    pub fn new(
        ctx: &BuildContext,
        reference: Slot<String>,
    ) -> Result<Self, parley_core::BuildError> {
        Ok(Self {
            core: ActionCore::new(
                "DeleteSubscription",
                ctx.party(SUBSCRIBER)?,
                ctx.party(PUBLISHER)?,
            ),
            reference,
        })
    }
}

impl Action for DeleteSubscription {
    fn core(&self) -> &ActionCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ActionCore {
        &mut self.core
    }

    fn kind(&self) -> &'static str {
        "DeleteSubscription"
    }

    fn human_prompt(&self) -> String {
        format!(
            "Send a DELETE {} request",
            subscription_path(self.reference.get().as_deref())
        )
    }

    fn try_consume(&mut self, exchange: &Exchange) -> bool {
        targets_subscription(exchange, "DELETE", self.reference.get())
    }

    fn build_checks(&self, expected_api_version: &str) -> Option<CheckNode> {
        let path = subscription_path(self.reference.get().as_deref());
        Some(CheckNode::group(
            self.core.title.clone(),
            exchange_checks(&self.core, expected_api_version, &path, 204),
        ))
    }
}

// ── Tree nodes ───────────────────────────────────────────────────────────────

pub(crate) fn create_subscription(schemas: &SampleSchemas) -> ScenarioNode<SampleContext> {
    let schemas = schemas.clone();
    ScenarioNode::action(
        "CreateSubscription",
        move |ctx: &BuildContext, sc: &mut SampleContext| {
            Ok(Box::new(CreateSubscription::new(
                ctx,
                sc.subscription_reference.clone(),
                schemas.clone(),
            )?) as Box<dyn Action>)
        },
    )
}

pub(crate) fn get_subscription(
    schemas: &SampleSchemas,
    verifier: Arc<dyn SignatureVerifier>,
) -> ScenarioNode<SampleContext> {
    let schema = schemas.signed_subscription.clone();
    ScenarioNode::action(
        "GetSubscription",
        move |ctx: &BuildContext, sc: &mut SampleContext| {
            Ok(Box::new(GetSubscription::new(
                ctx,
                sc.subscription_reference.clone(),
                schema.clone(),
                Arc::clone(&verifier),
            )?) as Box<dyn Action>)
        },
    )
}

pub(crate) fn delete_subscription() -> ScenarioNode<SampleContext> {
    ScenarioNode::action(
        "DeleteSubscription",
        |ctx: &BuildContext, sc: &mut SampleContext| {
            Ok(Box::new(DeleteSubscription::new(ctx, sc.subscription_reference.clone())?)
                as Box<dyn Action>)
        },
    )
}
