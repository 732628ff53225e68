use parley_core::{BuildContext, BuildError, Scenario};

/// A pluggable API standard: its roles and the scenarios that exercise them.
///
/// The engine only ever sees [`Scenario`]s and the `Action` capability
/// methods; a standard's concrete action types stay private to it.
pub trait Standard: Send + Sync + 'static {
    fn name(&self) -> &str;

    fn version(&self) -> &str;

    /// Roles in report order, e.g. `["Publisher", "Subscriber"]`.
    fn role_names(&self) -> &[&'static str];

    /// Fresh scenarios for a session. Must return the same number of
    /// scenarios, in the same order, every time it is called with the same
    /// context; persisted session state is matched up by position.
    fn build_scenarios(&self, ctx: &BuildContext) -> Result<Vec<Scenario>, BuildError>;

    fn report_title(&self) -> String {
        format!("{} v{}", self.name(), self.version())
    }

    /// API version that `API-Version` headers are checked against.
    fn api_version(&self) -> &str {
        self.version()
    }
}
