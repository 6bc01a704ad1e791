//! Flattened tree instances and their execution-stack state.
//!
//! The compiler produces a [`FlatTree`]: parallel index arrays describing one
//! behavior's task hierarchy. [`TreeInstance`] wraps that immutable structure
//! with everything that mutates while the tree runs: the active depth-first
//! stacks, per-stack cached statuses and interruption targets, the
//! conditional watch list, and the reevaluatable-parent set.

use crate::behavior::BehaviorId;
use crate::graph::TaskConfig;
use crate::status::{TaskKind, TaskStatus};
use crate::task::{Task, TaskIndex, TickContext};
use crate::variables::VariableSource;

/// One task plus its authored flags and runtime diagnostics.
pub struct TaskSlot {
    pub task: Box<dyn Task>,
    pub config: TaskConfig,
    /// Kind tag cached at compile time; fixed for the task's lifetime.
    pub kind: TaskKind,
    /// Tick at which the task was last pushed; cleared on pop.
    pub push_tick: Option<u64>,
    /// Tick at which the task last popped.
    pub pop_tick: Option<u64>,
    /// Tick at which the task last caused or received an interruption.
    pub interrupt_tick: Option<u64>,
    /// Status recorded at the last pop.
    pub last_status: TaskStatus,
}

impl TaskSlot {
    pub(crate) fn new(task: Box<dyn Task>, config: TaskConfig, kind: TaskKind) -> Self {
        Self {
            task,
            config,
            kind,
            push_tick: None,
            pop_tick: None,
            interrupt_tick: None,
            last_status: TaskStatus::Inactive,
        }
    }
}

/// Immutable flattened structure produced by the compiler.
///
/// Indices are assigned in pre-order: the root is 0 and every task's parent
/// index is strictly smaller than its own. The arrays are append-only during
/// compilation and never change afterward.
pub struct FlatTree {
    pub(crate) tasks: Vec<TaskSlot>,
    /// Parent index per task; `None` for the root.
    pub(crate) parent: Vec<Option<TaskIndex>>,
    /// Ordinal of each task among its parent's children.
    pub(crate) relative_child: Vec<usize>,
    /// Nearest composite ancestor per task; `None` above the first composite.
    pub(crate) parent_composite: Vec<Option<TaskIndex>>,
    /// Child indices per task; empty for leaves.
    pub(crate) children: Vec<Vec<TaskIndex>>,
    /// Conditionals whose nearest composite ancestor is this task.
    pub(crate) child_conditionals: Vec<Vec<TaskIndex>>,
}

/// Cached result of a watched conditional, created when the conditional
/// finishes under a composite whose abort policy requires monitoring.
#[derive(Clone, Copy, Debug)]
pub struct WatchEntry {
    /// The conditional's task index.
    pub index: TaskIndex,
    /// Its last observed status.
    pub status: TaskStatus,
    /// Stack slot the conditional last executed in. Diagnostics only.
    pub stack: usize,
    /// Composite currently eligible to be interrupted by this conditional;
    /// `None` while the entry is abort-ineligible under the current policy.
    pub composite: Option<TaskIndex>,
}

/// One enabled (or paused) behavior: the flattened structure plus all
/// per-instance run state. Exclusively owned by the manager that ticks it.
pub struct TreeInstance {
    pub(crate) id: BehaviorId,
    pub(crate) name: String,
    pub(crate) restart_when_complete: bool,
    /// `Running` while enabled; the final status once finished.
    pub(crate) status: TaskStatus,
    pub(crate) variables: Box<dyn VariableSource>,

    pub(crate) tasks: Vec<TaskSlot>,
    pub(crate) parent: Vec<Option<TaskIndex>>,
    pub(crate) relative_child: Vec<usize>,
    pub(crate) parent_composite: Vec<Option<TaskIndex>>,
    pub(crate) children: Vec<Vec<TaskIndex>>,
    pub(crate) child_conditionals: Vec<Vec<TaskIndex>>,

    /// Active depth-first paths; stack 0 is the primary one. Extra stacks
    /// exist only under parallel-capable composites.
    pub(crate) stacks: Vec<Vec<TaskIndex>>,
    /// Cached across-ticks status of each stack's top non-instant task.
    pub(crate) stack_status: Vec<TaskStatus>,
    /// Pending interruption target per stack.
    pub(crate) interruption: Vec<Option<TaskIndex>>,
    /// Watched conditionals, in discovery order.
    pub(crate) watch: Vec<WatchEntry>,
    /// Parents polled every tick because they opted into reevaluation.
    pub(crate) reevaluate_parents: Vec<TaskIndex>,
    /// Task pushes so far this tick.
    pub(crate) execution_count: u32,
    /// Budget diagnostic already emitted this tick.
    pub(crate) budget_reported: bool,
    /// Teardown in progress; blocks reentrant destruction.
    pub(crate) destroying: bool,
    /// Finished trees are removed from the active list after the tick.
    pub(crate) pending_remove: bool,
    /// Manager tick counter, mirrored here for hook contexts and stamps.
    pub(crate) tick: u64,

    stack_pool: Vec<Vec<TaskIndex>>,
    lca_scratch: Vec<TaskIndex>,
}

impl TreeInstance {
    pub(crate) fn new(
        id: BehaviorId,
        name: String,
        restart_when_complete: bool,
        variables: Box<dyn VariableSource>,
        flat: FlatTree,
    ) -> Self {
        let FlatTree {
            tasks,
            parent,
            relative_child,
            parent_composite,
            children,
            child_conditionals,
        } = flat;
        Self {
            id,
            name,
            restart_when_complete,
            status: TaskStatus::Inactive,
            variables,
            tasks,
            parent,
            relative_child,
            parent_composite,
            children,
            child_conditionals,
            stacks: Vec::new(),
            stack_status: Vec::new(),
            interruption: Vec::new(),
            watch: Vec::new(),
            reevaluate_parents: Vec::new(),
            execution_count: 0,
            budget_reported: false,
            destroying: false,
            pending_remove: false,
            tick: 0,
            stack_pool: Vec::new(),
            lca_scratch: Vec::new(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.status == TaskStatus::Running && !self.pending_remove
    }

    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    pub fn top(&self, stack: usize) -> Option<TaskIndex> {
        self.stacks.get(stack)?.last().copied()
    }

    /// Appends a fresh stack (reusing a pooled allocation) and returns its
    /// slot.
    pub(crate) fn alloc_stack(&mut self) -> usize {
        let stack = self.stack_pool.pop().unwrap_or_default();
        self.stacks.push(stack);
        self.interruption.push(None);
        self.stack_status.push(TaskStatus::Inactive);
        self.stacks.len() - 1
    }

    /// Removes a drained stack, returning its allocation to the pool.
    pub(crate) fn release_stack(&mut self, slot: usize) {
        let mut stack = self.stacks.remove(slot);
        stack.clear();
        self.stack_pool.push(stack);
        self.interruption.remove(slot);
        self.stack_status.remove(slot);
    }

    /// Walks the parent chain: is `ancestor` a strict ancestor of `task`?
    pub fn is_ancestor(&self, ancestor: TaskIndex, task: TaskIndex) -> bool {
        let mut current = task;
        while let Some(next) = self.parent[current] {
            if next == ancestor {
                return true;
            }
            current = next;
        }
        false
    }

    /// Lowest common ancestor of two tasks, via parent pointers. Total for
    /// any pair of valid indices since both chains end at the root.
    pub fn find_lca(&mut self, a: TaskIndex, b: TaskIndex) -> TaskIndex {
        self.lca_scratch.clear();
        let mut current = Some(a);
        while let Some(index) = current {
            self.lca_scratch.push(index);
            current = self.parent[index];
        }
        let mut current = b;
        loop {
            if self.lca_scratch.contains(&current) {
                return current;
            }
            match self.parent[current] {
                Some(next) => current = next,
                // Unreachable for a well-formed tree; the root is shared.
                None => return current,
            }
        }
    }

    /// Position of `index` in the watch list, if watched.
    pub(crate) fn watch_position(&self, index: TaskIndex) -> Option<usize> {
        self.watch.iter().position(|entry| entry.index == index)
    }

    /// Drops every watch entry currently gated by `composite`.
    pub(crate) fn remove_watch_gated_by(&mut self, composite: Option<TaskIndex>) {
        self.watch.retain(|entry| entry.composite != composite);
    }

    /// Runs `f` with a hook context split-borrowed from this instance.
    pub(crate) fn with_task<R>(
        &mut self,
        index: TaskIndex,
        f: impl FnOnce(&mut dyn Task, &mut TickContext<'_>) -> R,
    ) -> R {
        let Self {
            tasks,
            variables,
            name,
            tick,
            ..
        } = self;
        let mut ctx = TickContext {
            variables: variables.as_mut(),
            behavior: name.as_str(),
            tick: *tick,
        };
        f(tasks[index].task.as_mut(), &mut ctx)
    }
}
