use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};

use tracing::warn;
use uuid::Uuid;

use super::{ConformanceStatus, ExchangeCheck, RoleFilter, TrafficIndex};

enum Body {
    Group(Vec<CheckNode>),
    Leaf {
        check: Box<dyn ExchangeCheck>,
        exchange_id: Option<Uuid>,
    },
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
struct Tally {
    conformant: usize,
    non_conformant: usize,
    irrelevant: usize,
    errors: Vec<String>,
}

/// A node of a check tree.
///
/// Groups carry no counts of their own and derive their status from their
/// children. Leaves judge the exchange they are bound to; a leaf whose
/// action never matched an exchange reports `NoTraffic`.
pub struct CheckNode {
    title: String,
    relevance: RoleFilter,
    body: Body,
    tally: Tally,
}

impl CheckNode {
    pub fn group(title: impl Into<String>, children: Vec<CheckNode>) -> Self {
        Self {
            title: title.into(),
            relevance: RoleFilter::all(),
            body: Body::Group(children),
            tally: Tally::default(),
        }
    }

    pub fn leaf(
        relevance: RoleFilter,
        exchange_id: Option<Uuid>,
        check: impl ExchangeCheck + 'static,
    ) -> Self {
        Self {
            title: check.title(),
            relevance,
            body: Body::Leaf {
                check: Box::new(check),
                exchange_id,
            },
            tally: Tally::default(),
        }
    }

    pub fn with_relevance(mut self, relevance: RoleFilter) -> Self {
        self.relevance = relevance;
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Append a child; a leaf becomes a group holding the old leaf first.
    pub fn push(&mut self, child: CheckNode) {
        if let Body::Group(children) = &mut self.body {
            children.push(child);
            return;
        }
        let title = self.title.clone();
        let leaf = std::mem::replace(self, CheckNode::group(title, Vec::new()));
        self.relevance = leaf.relevance.clone();
        if let Body::Group(children) = &mut self.body {
            children.push(leaf.with_relevance(RoleFilter::all()));
            children.push(child);
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn children(&self) -> &[CheckNode] {
        match &self.body {
            Body::Group(children) => children,
            Body::Leaf { .. } => &[],
        }
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self.body, Body::Leaf { .. })
    }

    pub fn is_relevant_for(&self, role: &str) -> bool {
        self.relevance.matches(role)
    }

    pub fn errors(&self) -> &[String] {
        &self.tally.errors
    }

    pub fn conformant_count(&self) -> usize {
        self.tally.conformant
    }

    pub fn non_conformant_count(&self) -> usize {
        self.tally.non_conformant
    }

    /// Run every leaf against its exchange. Evaluating twice replaces the
    /// earlier results.
    pub fn evaluate(&mut self, traffic: &TrafficIndex) {
        self.tally = Tally::default();
        match &mut self.body {
            Body::Group(children) => {
                for child in children {
                    child.evaluate(traffic);
                }
            }
            Body::Leaf { check, exchange_id } => {
                let Some(exchange) = exchange_id.as_ref().and_then(|id| traffic.get(id)) else {
                    return;
                };
                let outcome =
                    panic::catch_unwind(AssertUnwindSafe(|| check.check(exchange)));
                let failure = match outcome {
                    Ok(Ok(result)) => {
                        if !result.relevant {
                            self.tally.irrelevant += 1;
                        } else if result.is_conformant() {
                            self.tally.conformant += 1;
                        } else {
                            self.tally.non_conformant += 1;
                        }
                        for error in result.errors {
                            if !self.tally.errors.contains(&error) {
                                self.tally.errors.push(error);
                            }
                        }
                        return;
                    }
                    Ok(Err(e)) => format!("Check could not be evaluated: {e}"),
                    Err(payload) => format!("Check evaluation failed: {}", panic_message(&*payload)),
                };
                warn!(check = %self.title, exchange = %exchange.id, %failure, "check failed");
                self.tally.non_conformant += 1;
                self.tally.errors.push(failure);
            }
        }
    }

    /// Status of this subtree as seen by `role`.
    pub fn status_for_role(&self, role: &str) -> ConformanceStatus {
        if !self.relevance.matches(role) {
            return ConformanceStatus::NotRelevant;
        }
        match &self.body {
            Body::Group(children) if children.is_empty() => ConformanceStatus::NoTraffic,
            Body::Group(children) => {
                ConformanceStatus::reduce_all(children.iter().map(|c| c.status_for_role(role)))
            }
            Body::Leaf { .. } => {
                let Tally {
                    conformant,
                    non_conformant,
                    irrelevant,
                    ..
                } = self.tally;
                if conformant + non_conformant == 0 && irrelevant > 0 {
                    ConformanceStatus::NotRelevant
                } else {
                    ConformanceStatus::for_exchange_counts(conformant, non_conformant)
                }
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

impl fmt::Debug for CheckNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CheckNode")
            .field("title", &self.title)
            .field("children", &self.children())
            .field("errors", &self.tally.errors)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::check::CheckResult;
    use crate::error::CheckError;
    use crate::traffic::{Exchange, Message, Request, Response};

    struct Fixed(Result<CheckResult, CheckError>);

    impl ExchangeCheck for Fixed {
        fn title(&self) -> String {
            "fixed".into()
        }
        fn check(&self, _: &Exchange) -> Result<CheckResult, CheckError> {
            self.0.clone()
        }
    }

    struct Panics;

    impl ExchangeCheck for Panics {
        fn title(&self) -> String {
            "panics".into()
        }
        fn check(&self, _: &Exchange) -> Result<CheckResult, CheckError> {
            panic!("index out of bounds")
        }
    }

    fn exchange() -> Exchange {
        let message = Message::new("a", "A", "b", "B", 0);
        Exchange::new(
            Request::new("GET", "/x", message.clone()),
            Response::new(200, message.with_json(json!({}))),
        )
    }

    fn leaf(result: Result<CheckResult, CheckError>, id: Option<Uuid>) -> CheckNode {
        CheckNode::leaf(RoleFilter::all(), id, Fixed(result))
    }

    #[test]
    fn leaf_without_traffic_is_no_traffic() {
        let mut node = leaf(Ok(CheckResult::ok()), None);
        node.evaluate(&TrafficIndex::default());
        assert_eq!(node.status_for_role("A"), ConformanceStatus::NoTraffic);
    }

    #[test]
    fn one_failing_leaf_makes_ancestors_non_conformant() {
        let ex = exchange();
        let mut tree = CheckNode::group(
            "root",
            vec![
                leaf(Ok(CheckResult::ok()), Some(ex.id)),
                CheckNode::group(
                    "inner",
                    vec![leaf(Ok(CheckResult::error("bad")), Some(ex.id))],
                ),
            ],
        );
        tree.evaluate(&TrafficIndex::new([ex]));
        assert_eq!(tree.status_for_role("A"), ConformanceStatus::NonConformant);
        assert_eq!(tree.children()[1].children()[0].errors(), ["bad"]);
    }

    #[test]
    fn evaluation_errors_stay_on_their_node() {
        let ex = exchange();
        let mut tree = CheckNode::group(
            "root",
            vec![
                CheckNode::leaf(RoleFilter::all(), Some(ex.id), Panics),
                leaf(Err(CheckError::Evaluation("boom".into())), Some(ex.id)),
                leaf(Ok(CheckResult::ok()), Some(ex.id)),
            ],
        );
        tree.evaluate(&TrafficIndex::new([ex]));
        let children = tree.children();
        assert!(children[0].errors()[0].contains("index out of bounds"));
        assert_eq!(children[1].errors(), ["Check could not be evaluated: boom"]);
        assert_eq!(
            children[2].status_for_role("A"),
            ConformanceStatus::Conformant
        );
    }

    #[test]
    fn irrelevant_nodes_are_neutral() {
        let ex = exchange();
        let mut tree = CheckNode::group(
            "root",
            vec![
                leaf(Ok(CheckResult::ok()), Some(ex.id)),
                leaf(Ok(CheckResult::irrelevant()), Some(ex.id)),
                leaf(Ok(CheckResult::error("publisher only")), Some(ex.id))
                    .with_relevance(RoleFilter::only("B")),
            ],
        );
        tree.evaluate(&TrafficIndex::new([ex]));
        assert_eq!(
            tree.children()[1].status_for_role("A"),
            ConformanceStatus::NotRelevant
        );
        assert_eq!(tree.status_for_role("A"), ConformanceStatus::Conformant);
        assert_eq!(tree.status_for_role("B"), ConformanceStatus::NonConformant);
    }

    #[test]
    fn push_turns_leaf_into_group() {
        let mut node = leaf(Ok(CheckResult::ok()), None).with_relevance(RoleFilter::only("A"));
        node.push(leaf(Ok(CheckResult::ok()), None));
        assert!(!node.is_leaf());
        assert_eq!(node.children().len(), 2);
        assert!(!node.is_relevant_for("B"));
    }
}
