use std::fmt;
use std::sync::Arc;

use super::action::Action;
use super::context::BuildContext;
use super::run::Scenario;
use crate::error::BuildError;

/// Creates one fresh action for one scenario instance.
///
/// `C` is the per-scenario context: a new `C::default()` is handed down each
/// root-to-leaf path, so a factory can store a [`Slot`](super::Slot) in it for
/// the factories below it to pick up.
pub type ActionFactory<C> =
    Arc<dyn Fn(&BuildContext, &mut C) -> Result<Box<dyn Action>, BuildError> + Send + Sync>;

/// One node of a standard's action tree.
///
/// Nodes are plain values: building a tree has no side effects and the
/// same tree can be instantiated any number of times, concurrently.
pub struct ScenarioNode<C> {
    label: String,
    factory: Option<ActionFactory<C>>,
    children: Vec<ScenarioNode<C>>,
}

impl<C> ScenarioNode<C> {
    /// A node without an action, used as the root of a module.
    pub fn root() -> Self {
        Self {
            label: "root".to_string(),
            factory: None,
            children: Vec::new(),
        }
    }

    pub fn action<F>(label: &str, factory: F) -> Self
    where
        F: Fn(&BuildContext, &mut C) -> Result<Box<dyn Action>, BuildError>
            + Send
            + Sync
            + 'static,
    {
        Self {
            label: label.to_string(),
            factory: Some(Arc::new(factory)),
            children: Vec::new(),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn children(&self) -> &[ScenarioNode<C>] {
        &self.children
    }

    /// Make `next` the only continuation of this node.
    pub fn then(self, next: ScenarioNode<C>) -> Result<Self, BuildError> {
        self.then_either([next])
    }

    /// Register alternative continuations; each one starts its own branch of
    /// scenarios from this point.
    pub fn then_either(
        mut self,
        alternatives: impl IntoIterator<Item = ScenarioNode<C>>,
    ) -> Result<Self, BuildError> {
        if !self.children.is_empty() {
            return Err(BuildError::ContinuationAlreadySet { title: self.label });
        }
        self.children.extend(alternatives);
        if self.children.is_empty() {
            return Err(BuildError::NoAlternatives { title: self.label });
        }
        Ok(self)
    }

    /// Root-to-leaf factory paths in depth-first, left-to-right order.
    pub fn flatten(&self) -> Vec<Vec<ActionFactory<C>>> {
        let mut paths = Vec::new();
        self.collect_paths(&mut Vec::new(), &mut paths);
        paths
    }

    /// Root-to-leaf label paths, in the same order as [`flatten`](Self::flatten).
    pub fn label_paths(&self) -> Vec<Vec<String>> {
        let mut paths = Vec::new();
        self.collect_labels(&mut Vec::new(), &mut paths);
        paths
    }

    fn collect_paths(
        &self,
        prefix: &mut Vec<ActionFactory<C>>,
        out: &mut Vec<Vec<ActionFactory<C>>>,
    ) {
        if let Some(factory) = &self.factory {
            prefix.push(Arc::clone(factory));
        }
        if self.children.is_empty() {
            if !prefix.is_empty() {
                out.push(prefix.clone());
            }
        } else {
            for child in &self.children {
                child.collect_paths(prefix, out);
            }
        }
        if self.factory.is_some() {
            prefix.pop();
        }
    }

    fn collect_labels(&self, prefix: &mut Vec<String>, out: &mut Vec<Vec<String>>) {
        if self.factory.is_some() {
            prefix.push(self.label.clone());
        }
        if self.children.is_empty() {
            if !prefix.is_empty() {
                out.push(prefix.clone());
            }
        } else {
            for child in &self.children {
                child.collect_labels(prefix, out);
            }
        }
        if self.factory.is_some() {
            prefix.pop();
        }
    }
}

impl<C> fmt::Debug for ScenarioNode<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScenarioNode")
            .field("label", &self.label)
            .field("children", &self.children)
            .finish()
    }
}

/// All scenario modules of a standard, in presentation order.
pub struct ScenarioSuite<C> {
    modules: Vec<(String, ScenarioNode<C>)>,
}

impl<C: Default> ScenarioSuite<C> {
    pub fn new() -> Self {
        Self {
            modules: Vec::new(),
        }
    }

    pub fn with_module(mut self, name: &str, root: ScenarioNode<C>) -> Self {
        self.modules.push((name.to_string(), root));
        self
    }

    pub fn modules(&self) -> impl Iterator<Item = (&str, &ScenarioNode<C>)> {
        self.modules.iter().map(|(name, root)| (name.as_str(), root))
    }

    /// Fresh scenarios for every path of every module, numbered in order.
    pub fn instantiate(&self, ctx: &BuildContext) -> Result<Vec<Scenario>, BuildError> {
        let mut scenarios = Vec::new();
        for (module_index, (module_name, root)) in self.modules.iter().enumerate() {
            for path in root.flatten() {
                let mut scenario_context = C::default();
                let actions = path
                    .iter()
                    .map(|factory| factory(ctx, &mut scenario_context))
                    .collect::<Result<Vec<_>, _>>()?;
                let index = scenarios.len();
                scenarios.push(Scenario::new(module_name, module_index, index, actions));
            }
        }
        Ok(scenarios)
    }
}

impl<C: Default> Default for ScenarioSuite<C> {
    fn default() -> Self {
        Self::new()
    }
}
