//! Nested source graphs and the external subtree provider.
//!
//! A [`TaskGraph`] is the authored, nested form of a tree: what a loader or a
//! builder produces and what the compiler flattens. Reference nodes splice in
//! externally stored subtrees resolved through a [`SubtreeOracle`], the
//! interpreter's boundary with whatever persistence layer owns them.

use crate::task::Task;
use crate::variables::{SharedValue, VariableOverride};

/// Authoring-time flags attached to every node.
#[derive(Clone, Debug)]
pub struct TaskConfig {
    /// Friendly name, used in diagnostics and logs.
    pub name: String,
    /// Disabled tasks are skipped by the scheduler and report `Inactive`.
    pub disabled: bool,
    /// Pushing this task raises a breakpoint signal to the host.
    pub breakpoint: bool,
}

impl TaskConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            disabled: false,
            breakpoint: false,
        }
    }
}

/// One node of a nested task graph.
pub struct GraphNode {
    pub config: TaskConfig,
    pub body: GraphBody,
}

/// Node payload: a leaf task, a parent with child slots, or a reference to
/// externally stored subtrees. Child slots are optional so loaders can
/// represent an authored-but-missing child, which the compiler rejects.
pub enum GraphBody {
    Leaf(Box<dyn Task>),
    Parent {
        task: Box<dyn Task>,
        children: Vec<Option<GraphNode>>,
    },
    Reference {
        subtrees: Vec<String>,
        overrides: Vec<VariableOverride>,
    },
}

impl GraphNode {
    pub fn leaf(name: impl Into<String>, task: impl Task + 'static) -> Self {
        Self {
            config: TaskConfig::new(name),
            body: GraphBody::Leaf(Box::new(task)),
        }
    }

    pub fn parent(
        name: impl Into<String>,
        task: impl Task + 'static,
        children: Vec<GraphNode>,
    ) -> Self {
        Self {
            config: TaskConfig::new(name),
            body: GraphBody::Parent {
                task: Box::new(task),
                children: children.into_iter().map(Some).collect(),
            },
        }
    }

    /// A reference to a single external subtree.
    pub fn reference(subtree: impl Into<String>) -> Self {
        Self::references(vec![subtree.into()], Vec::new())
    }

    /// A reference splicing several external subtrees in place, with
    /// variable overrides scoped to the spliced nodes.
    pub fn references(subtrees: Vec<String>, overrides: Vec<VariableOverride>) -> Self {
        let name = subtrees.join(", ");
        Self {
            config: TaskConfig::new(name),
            body: GraphBody::Reference {
                subtrees,
                overrides,
            },
        }
    }

    pub fn disabled(mut self) -> Self {
        self.config.disabled = true;
        self
    }

    pub fn breakpoint(mut self) -> Self {
        self.config.breakpoint = true;
        self
    }
}

/// A complete authored tree: a root node plus the shared variables the tree
/// declares, with their defaults.
pub struct TaskGraph {
    pub name: String,
    pub root: Option<GraphNode>,
    pub variables: Vec<(String, SharedValue)>,
}

impl TaskGraph {
    pub fn new(name: impl Into<String>, root: GraphNode) -> Self {
        Self {
            name: name.into(),
            root: Some(root),
            variables: Vec::new(),
        }
    }

    pub fn with_variable(
        mut self,
        name: impl Into<String>,
        default: impl Into<SharedValue>,
    ) -> Self {
        self.variables.push((name.into(), default.into()));
        self
    }
}

/// Supplies externally stored subtrees to the compiler.
///
/// `instantiate` must return a fresh graph per call: the compiler takes
/// ownership of the returned tasks and splices them into the tree being
/// built.
pub trait SubtreeOracle {
    fn instantiate(&self, name: &str) -> Option<TaskGraph>;
}

/// Oracle with no subtrees, for behaviors that use no references.
pub struct NoSubtrees;

impl SubtreeOracle for NoSubtrees {
    fn instantiate(&self, _name: &str) -> Option<TaskGraph> {
        None
    }
}
