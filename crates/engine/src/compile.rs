//! Tree compilation: nested source graph → flattened index arrays.
//!
//! The compiler walks the authored graph depth-first, assigning dense indices
//! in pre-order and recording parent/child linkage as it goes. Reference
//! nodes never receive an index of their own; the externally stored subtree
//! they name is instantiated and its root spliced into the reference's slot,
//! with variable overrides pushed onto a depth-scoped stack for the duration
//! of the splice. Any structural defect aborts compilation with no partial
//! tree retained.

use crate::graph::{GraphBody, GraphNode, SubtreeOracle, TaskConfig, TaskGraph};
use crate::status::TaskKind;
use crate::task::{AttachInfo, Task, TaskIndex};
use crate::tree::{FlatTree, TaskSlot};
use crate::variables::{OverrideScope, VariableOverride, VariableSource};

/// Structural defects that prevent a behavior from being enabled.
///
/// Each variant names the behavior and, where one exists, the offending
/// task, so the host can report the defect without the tree ever running.
#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    #[error("behavior \"{behavior}\" has no root task")]
    MissingRoot { behavior: String },

    #[error("behavior \"{behavior}\" has a disabled root task")]
    DisabledRoot { behavior: String },

    #[error("behavior \"{behavior}\": parent task \"{task}\" (index {index}) has no children")]
    ChildlessParent {
        behavior: String,
        task: String,
        index: TaskIndex,
    },

    #[error("behavior \"{behavior}\": parent task \"{task}\" (index {index}) has a missing child")]
    MissingChild {
        behavior: String,
        task: String,
        index: TaskIndex,
    },

    #[error("behavior \"{behavior}\": reference task \"{task}\" names no external subtrees")]
    EmptyReference { behavior: String, task: String },

    #[error(
        "behavior \"{behavior}\": reference task \"{task}\" names unknown external subtree \"{subtree}\""
    )]
    UnknownSubtree {
        behavior: String,
        task: String,
        subtree: String,
    },

    #[error("behavior \"{behavior}\": external subtree \"{subtree}\" has no root task")]
    EmptySubtree { behavior: String, subtree: String },

    #[error(
        "behavior \"{behavior}\": reference task \"{task}\" splices more subtrees than its parent can hold"
    )]
    TooManyChildren { behavior: String, task: String },
}

/// Compilation context threaded through the recursive walk.
#[derive(Clone, Copy)]
struct Frame {
    /// Index of the enclosing parent task, if any.
    parent: Option<TaskIndex>,
    /// Index of the nearest composite ancestor, if any.
    composite: Option<TaskIndex>,
}

struct Compiler<'a> {
    behavior: &'a str,
    oracle: &'a dyn SubtreeOracle,
    variables: &'a mut dyn VariableSource,
    scope: OverrideScope,
    out: FlatTree,
}

/// Flattens `graph` into index arrays, resolving external references through
/// `oracle` and seeding `variables` with the graph's declared defaults.
pub(crate) fn compile(
    behavior: &str,
    graph: TaskGraph,
    oracle: &dyn SubtreeOracle,
    variables: &mut dyn VariableSource,
) -> Result<FlatTree, CompileError> {
    let TaskGraph {
        root,
        variables: declared,
        ..
    } = graph;
    let root = root.ok_or_else(|| CompileError::MissingRoot {
        behavior: behavior.to_owned(),
    })?;

    for (name, default) in &declared {
        if !variables.contains(name) {
            variables.set(name, default.clone());
        }
    }

    let mut compiler = Compiler {
        behavior,
        oracle,
        variables,
        scope: OverrideScope::new(),
        out: FlatTree {
            tasks: Vec::new(),
            parent: Vec::new(),
            relative_child: Vec::new(),
            parent_composite: Vec::new(),
            children: Vec::new(),
            child_conditionals: Vec::new(),
        },
    };

    // Root linkage; the ordinal slot is never read for the root.
    compiler.out.parent.push(None);
    compiler.out.relative_child.push(0);
    compiler.out.parent_composite.push(None);

    compiler.add_node(
        root,
        Frame {
            parent: None,
            composite: None,
        },
    )?;

    // Child counts are only final once every splice has landed.
    let mut out = compiler.out;
    for index in 0..out.tasks.len() {
        let child_count = out.children[index].len();
        out.tasks[index].task.on_attach(AttachInfo { index, child_count });
    }
    Ok(out)
}

impl Compiler<'_> {
    /// Adds one graph node (or the splice it references). The caller has
    /// already pushed this node's linkage row.
    fn add_node(&mut self, node: GraphNode, frame: Frame) -> Result<(), CompileError> {
        match node.body {
            GraphBody::Reference {
                subtrees,
                overrides,
            } => self.splice_references(&node.config.name, node.config.disabled, subtrees, overrides, frame),
            GraphBody::Leaf(task) => {
                self.add_task(node.config, task, None, frame)?;
                Ok(())
            }
            GraphBody::Parent { task, children } => {
                self.add_task(node.config, task, Some(children), frame)
            }
        }
    }

    fn splice_references(
        &mut self,
        reference_name: &str,
        disabled: bool,
        subtrees: Vec<String>,
        overrides: Vec<VariableOverride>,
        frame: Frame,
    ) -> Result<(), CompileError> {
        if subtrees.is_empty() {
            return Err(CompileError::EmptyReference {
                behavior: self.behavior.to_owned(),
                task: reference_name.to_owned(),
            });
        }

        self.scope.enter(&overrides);
        let result = self.splice_each(reference_name, disabled, &subtrees, frame);
        self.scope.exit();
        result
    }

    fn splice_each(
        &mut self,
        reference_name: &str,
        disabled: bool,
        subtrees: &[String],
        frame: Frame,
    ) -> Result<(), CompileError> {
        for (j, subtree_name) in subtrees.iter().enumerate() {
            let mut subtree = self.oracle.instantiate(subtree_name).ok_or_else(|| {
                CompileError::UnknownSubtree {
                    behavior: self.behavior.to_owned(),
                    task: reference_name.to_owned(),
                    subtree: subtree_name.clone(),
                }
            })?;
            let mut root = subtree
                .root
                .take()
                .ok_or_else(|| CompileError::EmptySubtree {
                    behavior: self.behavior.to_owned(),
                    subtree: subtree_name.clone(),
                })?;

            // The reference's disabled flag carries over to what it splices.
            root.config.disabled |= disabled;

            // A subtree's declared variables join the enclosing table unless
            // the enclosing behavior already owns a variable of that name.
            for (name, default) in &subtree.variables {
                if !self.variables.contains(name) {
                    self.variables.set(name, default.clone());
                }
            }

            if j > 0 {
                // Extra subtrees become additional children of the
                // reference's parent, if it can hold them.
                let parent = frame.parent.ok_or_else(|| CompileError::TooManyChildren {
                    behavior: self.behavior.to_owned(),
                    task: reference_name.to_owned(),
                })?;
                if self.out.children[parent].len() >= self.out.tasks[parent].task.max_children() {
                    return Err(CompileError::TooManyChildren {
                        behavior: self.behavior.to_owned(),
                        task: reference_name.to_owned(),
                    });
                }
                let ordinal = self.out.children[parent].len();
                self.out.parent.push(Some(parent));
                self.out.relative_child.push(ordinal);
                self.out.parent_composite.push(frame.composite);
                let next = self.out.tasks.len();
                self.out.children[parent].push(next);
            }

            self.add_node(root, frame)?;
        }
        Ok(())
    }

    fn add_task(
        &mut self,
        config: TaskConfig,
        mut task: Box<dyn Task>,
        children: Option<Vec<Option<GraphNode>>>,
        frame: Frame,
    ) -> Result<(), CompileError> {
        let index = self.out.tasks.len();
        if index == 0 && config.disabled {
            return Err(CompileError::DisabledRoot {
                behavior: self.behavior.to_owned(),
            });
        }

        task.bind_variables(&self.scope);
        let kind = task.kind();
        self.out.tasks.push(TaskSlot::new(task, config, kind));
        self.out.children.push(Vec::new());
        self.out.child_conditionals.push(Vec::new());

        if kind == TaskKind::Conditional
            && let Some(composite) = self.out.parent_composite[index]
        {
            self.out.child_conditionals[composite].push(index);
        }

        let Some(children) = children else {
            return Ok(());
        };

        if children.is_empty() {
            return Err(CompileError::ChildlessParent {
                behavior: self.behavior.to_owned(),
                task: self.out.tasks[index].config.name.clone(),
                index,
            });
        }

        let child_frame = Frame {
            parent: Some(index),
            composite: if kind == TaskKind::Composite {
                Some(index)
            } else {
                frame.composite
            },
        };

        for (ordinal, child) in children.into_iter().enumerate() {
            let child = child.ok_or_else(|| CompileError::MissingChild {
                behavior: self.behavior.to_owned(),
                task: self.out.tasks[index].config.name.clone(),
                index,
            })?;
            self.out.parent.push(Some(index));
            self.out.relative_child.push(ordinal);
            self.out.parent_composite.push(child_frame.composite);
            let next = self.out.tasks.len();
            self.out.children[index].push(next);
            self.add_node(child, child_frame)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::NoSubtrees;
    use crate::status::{TaskKind, TaskStatus};
    use crate::task::{Task, TickContext};
    use crate::variables::{SharedValue, VariableStore, VariableSource, VariableOverride};

    struct Leaf;
    impl Task for Leaf {
        fn kind(&self) -> TaskKind {
            TaskKind::Action
        }
    }

    struct Cond;
    impl Task for Cond {
        fn kind(&self) -> TaskKind {
            TaskKind::Conditional
        }
        fn on_update(&mut self, _ctx: &mut TickContext<'_>) -> TaskStatus {
            TaskStatus::Success
        }
    }

    struct Comp;
    impl Task for Comp {
        fn kind(&self) -> TaskKind {
            TaskKind::Composite
        }
        fn can_execute(&self) -> bool {
            false
        }
    }

    struct Deco;
    impl Task for Deco {
        fn kind(&self) -> TaskKind {
            TaskKind::Decorator
        }
    }

    fn flatten(graph: TaskGraph) -> Result<FlatTree, CompileError> {
        let mut vars = VariableStore::new();
        compile("test", graph, &NoSubtrees, &mut vars)
    }

    #[test]
    fn preorder_numbering_holds() {
        let graph = TaskGraph::new(
            "t",
            GraphNode::parent(
                "root",
                Comp,
                vec![
                    GraphNode::leaf("a", Leaf),
                    GraphNode::parent("inner", Comp, vec![GraphNode::leaf("b", Leaf)]),
                    GraphNode::leaf("c", Leaf),
                ],
            ),
        );
        let flat = flatten(graph).unwrap();
        assert_eq!(flat.tasks.len(), 5);
        assert_eq!(flat.parent[0], None);
        for index in 1..flat.tasks.len() {
            assert!(flat.parent[index].unwrap() < index);
        }
        assert_eq!(flat.children[0], vec![1, 2, 4]);
        assert_eq!(flat.children[2], vec![3]);
        assert_eq!(flat.relative_child[4], 2);
    }

    #[test]
    fn nearest_composite_skips_decorators() {
        let graph = TaskGraph::new(
            "t",
            GraphNode::parent(
                "root",
                Comp,
                vec![GraphNode::parent(
                    "deco",
                    Deco,
                    vec![GraphNode::leaf("cond", Cond)],
                )],
            ),
        );
        let flat = flatten(graph).unwrap();
        assert_eq!(flat.parent_composite[2], Some(0));
        assert_eq!(flat.child_conditionals[0], vec![2]);
    }

    #[test]
    fn disabled_root_is_rejected() {
        let graph = TaskGraph::new("t", GraphNode::leaf("root", Leaf).disabled());
        assert!(matches!(
            flatten(graph),
            Err(CompileError::DisabledRoot { .. })
        ));
    }

    #[test]
    fn childless_parent_is_rejected() {
        let graph = TaskGraph::new("t", GraphNode::parent("root", Comp, vec![]));
        assert!(matches!(
            flatten(graph),
            Err(CompileError::ChildlessParent { .. })
        ));
    }

    #[test]
    fn unknown_subtree_is_rejected() {
        let graph = TaskGraph::new(
            "t",
            GraphNode::parent("root", Comp, vec![GraphNode::reference("missing")]),
        );
        assert!(matches!(
            flatten(graph),
            Err(CompileError::UnknownSubtree { .. })
        ));
    }

    struct OneSubtree;
    impl SubtreeOracle for OneSubtree {
        fn instantiate(&self, name: &str) -> Option<TaskGraph> {
            (name == "sub").then(|| {
                TaskGraph::new("sub", GraphNode::leaf("sub-leaf", Leaf))
                    .with_variable("speed", 4i64)
            })
        }
    }

    #[test]
    fn reference_splices_in_place() {
        let graph = TaskGraph::new(
            "t",
            GraphNode::parent(
                "root",
                Comp,
                vec![GraphNode::leaf("a", Leaf), GraphNode::reference("sub")],
            ),
        );
        let mut vars = VariableStore::new();
        let flat = compile("test", graph, &OneSubtree, &mut vars).unwrap();
        // The spliced leaf takes the reference's slot: root, a, sub-leaf.
        assert_eq!(flat.tasks.len(), 3);
        assert_eq!(flat.tasks[2].config.name, "sub-leaf");
        assert_eq!(flat.parent[2], Some(0));
        // Subtree defaults joined the enclosing table.
        assert_eq!(vars.get("speed"), Some(SharedValue::Int(4)));
    }

    #[test]
    fn enclosing_variable_wins_over_subtree_default() {
        let graph = TaskGraph::new(
            "t",
            GraphNode::parent("root", Comp, vec![GraphNode::reference("sub")]),
        );
        let mut vars = VariableStore::new().with("speed", 9i64);
        compile("test", graph, &OneSubtree, &mut vars).unwrap();
        assert_eq!(vars.get("speed"), Some(SharedValue::Int(9)));
    }

    #[test]
    fn decorator_cannot_hold_two_spliced_subtrees() {
        let graph = TaskGraph::new(
            "t",
            GraphNode::parent(
                "deco",
                Deco,
                vec![GraphNode::references(
                    vec!["sub".into(), "sub".into()],
                    vec![VariableOverride::constant("speed", 1i64)],
                )],
            ),
        );
        let mut vars = VariableStore::new();
        assert!(matches!(
            compile("test", graph, &OneSubtree, &mut vars),
            Err(CompileError::TooManyChildren { .. })
        ));
    }
}
