//! Behavior instance description.

use crate::graph::TaskGraph;
use crate::variables::{VariableSource, VariableStore};

/// Handle identifying an enabled behavior instance within a manager.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BehaviorId(pub u64);

impl std::fmt::Display for BehaviorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "behavior#{}", self.0)
    }
}

/// Everything needed to enable one tree instance: the authored graph, the
/// instance's variable table, and its completion policy.
pub struct Behavior {
    pub name: String,
    pub graph: TaskGraph,
    /// Re-push the root when stack 0 empties instead of disabling.
    pub restart_when_complete: bool,
    pub variables: Box<dyn VariableSource>,
}

impl Behavior {
    pub fn new(graph: TaskGraph) -> Self {
        Self {
            name: graph.name.clone(),
            graph,
            restart_when_complete: false,
            variables: Box::new(VariableStore::new()),
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn restart_when_complete(mut self, restart: bool) -> Self {
        self.restart_when_complete = restart;
        self
    }

    pub fn with_variables(mut self, variables: impl VariableSource + 'static) -> Self {
        self.variables = Box::new(variables);
        self
    }
}
