//! The standard's actions and the tree nodes that create them.

mod schedules;
mod subscriptions;
mod supply;

use parley_core::{
    ActionCore, ApiHeaderCheck, CheckNode, ExchangeCheck, HttpMessageType, ResponseStatusCheck,
    RoleFilter, UrlPathCheck,
};
use uuid::Uuid;

pub use schedules::GetSchedules;
pub use subscriptions::{CreateSubscription, DeleteSubscription, GetSubscription};
pub use supply::SupplyScenarioParameters;

pub use schedules::get_schedules;
pub(crate) use subscriptions::{create_subscription, delete_subscription, get_subscription};
pub use supply::supply_parameters;

use crate::{PUBLISHER, SUBSCRIBER};

fn leaf(role: &str, matched: Option<Uuid>, check: impl ExchangeCheck + 'static) -> CheckNode {
    CheckNode::leaf(RoleFilter::only(role), matched, check)
}

/// Checks every subscriber request to the publisher gets: URL path and
/// request API-Version for the subscriber, status and response API-Version
/// for the publisher.
fn exchange_checks(
    core: &ActionCore,
    api_version: &str,
    path_suffix: &str,
    expected_status: u16,
) -> Vec<CheckNode> {
    let matched = core.matched_exchange_id;
    vec![
        leaf(SUBSCRIBER, matched, UrlPathCheck::new(path_suffix)),
        leaf(
            SUBSCRIBER,
            matched,
            ApiHeaderCheck::new(HttpMessageType::Request, api_version),
        ),
        leaf(PUBLISHER, matched, ResponseStatusCheck::new(expected_status)),
        leaf(
            PUBLISHER,
            matched,
            ApiHeaderCheck::new(HttpMessageType::Response, api_version),
        ),
    ]
}
