//! Check trees and the check library.
//!
//! Each action contributes a subtree of [`CheckNode`]s once traffic is
//! known. Leaves wrap an [`ExchangeCheck`] bound to the exchange the action
//! matched; inner nodes only aggregate. Evaluation replays the exchange log
//! through every leaf, and [`ConformanceStatus::reduce`] folds the results
//! bottom-up per role.

mod content;
mod http;
mod node;
mod schema;
mod signature;
mod status;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use uuid::Uuid;

use crate::error::CheckError;
use crate::traffic::Exchange;

pub use content::{sha256_hex, JsonContentCheck, JsonRule, KeywordDataset};
pub use http::{
    ApiHeaderCheck, HeaderCheck, QueryParamCheck, ResponseStatusCheck, UrlPathCheck,
    API_VERSION_HEADER,
};
pub use node::CheckNode;
pub use schema::{JsonSchemaCheck, SchemaValidator};
pub use signature::{
    decode_compact_jws, sign_compact_jws, DecodedJws, Ed25519Verifier, JwsError, SignatureVerifier,
};
pub use status::ConformanceStatus;

/// Outcome of one check applied to one exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckResult {
    pub relevant: bool,
    pub errors: Vec<String>,
}

impl CheckResult {
    pub fn ok() -> Self {
        Self {
            relevant: true,
            errors: Vec::new(),
        }
    }

    /// The check does not apply to this exchange; it counts neither way.
    pub fn irrelevant() -> Self {
        Self {
            relevant: false,
            errors: Vec::new(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::from_errors([message.into()])
    }

    pub fn from_errors(errors: impl IntoIterator<Item = String>) -> Self {
        let mut result = Self::ok();
        for error in errors {
            result.push_error(error);
        }
        result
    }

    /// Add a message unless an identical one is already present.
    pub fn push_error(&mut self, message: String) {
        if !self.errors.contains(&message) {
            self.errors.push(message);
        }
    }

    /// Combine two partial results of the same exchange.
    pub fn merge(mut self, other: CheckResult) -> Self {
        self.relevant |= other.relevant;
        for error in other.errors {
            self.push_error(error);
        }
        self
    }

    pub fn is_conformant(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Validation logic of a check-tree leaf.
///
/// Returning `Err` (or panicking) marks only the owning node non-conformant;
/// conformance failures themselves belong in [`CheckResult::errors`].
pub trait ExchangeCheck: Send + Sync {
    fn title(&self) -> String;

    fn check(&self, exchange: &Exchange) -> Result<CheckResult, CheckError>;
}

/// Which roles a check node is relevant for.
#[derive(Clone)]
pub struct RoleFilter(Arc<dyn Fn(&str) -> bool + Send + Sync>);

impl RoleFilter {
    pub fn new(predicate: impl Fn(&str) -> bool + Send + Sync + 'static) -> Self {
        RoleFilter(Arc::new(predicate))
    }

    pub fn all() -> Self {
        Self::new(|_| true)
    }

    pub fn only(role: &str) -> Self {
        let role = role.to_string();
        Self::new(move |candidate| candidate == role)
    }

    pub fn matches(&self, role: &str) -> bool {
        (self.0)(role)
    }
}

impl fmt::Debug for RoleFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("RoleFilter(..)")
    }
}

/// Exchanges of a session by id.
#[derive(Debug, Default, Clone)]
pub struct TrafficIndex {
    exchanges: HashMap<Uuid, Exchange>,
}

impl TrafficIndex {
    pub fn new(exchanges: impl IntoIterator<Item = Exchange>) -> Self {
        Self {
            exchanges: exchanges.into_iter().map(|e| (e.id, e)).collect(),
        }
    }

    pub fn get(&self, id: &Uuid) -> Option<&Exchange> {
        self.exchanges.get(id)
    }

    pub fn len(&self) -> usize {
        self.exchanges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exchanges.is_empty()
    }
}

/// Renders a JSON pointer the way messages show it: `/a/0/b` as `a.0.b`.
pub(crate) fn render_pointer(pointer: &str) -> String {
    pointer.trim_start_matches('/').replace('/', ".")
}
