//! parley-core: the reusable conformance engine.
//!
//! Provides the building blocks every API standard plugs into:
//!
//! - [`traffic`] -- captured request/response exchanges
//! - [`scenario`] -- the action tree built with `then`/`then_either` and the
//!   scenarios flattened from it
//! - [`check`] -- check trees, the status lattice and the check library
//! - [`report`] -- per-role conformance reports rendered as JSON or HTML
//!
//! Storage and orchestration live in `parley-storage` and `parley-engine`.

pub mod check;
pub mod error;
pub mod report;
pub mod scenario;
pub mod traffic;

// ── Convenience re-exports: key types ────────────────────────────────

pub use check::{
    decode_compact_jws, sha256_hex, sign_compact_jws, ApiHeaderCheck, CheckNode, CheckResult,
    ConformanceStatus, DecodedJws, Ed25519Verifier, ExchangeCheck, HeaderCheck,
    JsonContentCheck, JsonRule, JsonSchemaCheck, JwsError, KeywordDataset, QueryParamCheck,
    ResponseStatusCheck, RoleFilter, SchemaValidator, SignatureVerifier, TrafficIndex,
    UrlPathCheck, API_VERSION_HEADER,
};
pub use error::{BuildError, CheckError, InputError, StateError, TrafficError};
pub use report::ConformanceReport;
pub use scenario::{
    Action, ActionCore, ActionFactory, ActionPrompt, BuildContext, Scenario, ScenarioNode,
    ScenarioSuite, Slot,
};
pub use traffic::{Exchange, HttpMessageType, Message, MessageBody, Request, Response};
