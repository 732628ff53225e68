//! The scenario action graph.
//!
//! A standard describes its interactions as a tree of [`ScenarioNode`]s built
//! with [`ScenarioNode::then`] and [`ScenarioNode::then_either`]. Every
//! root-to-leaf path is one [`Scenario`]: an ordered list of [`Action`]s with a
//! cursor pointing at the next unconsumed step.
//!
//! Construction never touches ambient state. Everything a factory needs
//! arrives through the [`BuildContext`] and the per-scenario context value
//! threaded top-down along each path, so values discovered by an earlier
//! action reach later ones through a shared [`Slot`] rather than by searching
//! backwards through the path.

mod action;
mod context;
mod node;
mod run;
mod slot;

pub use action::{Action, ActionCore, ActionPrompt};
pub use context::BuildContext;
pub use node::{ActionFactory, ScenarioNode, ScenarioSuite};
pub use run::Scenario;
pub use slot::Slot;
