//! The behavior manager: compilation, ticking, and the administrative
//! surface for enabled tree instances.
//!
//! One manager owns any number of independent trees and advances each of
//! them by one settled step per [`BehaviorManager::tick`]. Scheduling is
//! single-threaded and run-to-completion: no task hook may block, and
//! everything a tree touches is exclusively owned by the calling thread for
//! the duration of the tick.

mod reevaluate;
mod ticking;

use std::any::Any;
use std::collections::VecDeque;

use crate::behavior::{Behavior, BehaviorId};
use crate::compile::{CompileError, compile};
use crate::config::ManagerConfig;
use crate::events::BehaviorEvent;
use crate::graph::{NoSubtrees, SubtreeOracle};
use crate::status::{TaskKind, TaskStatus};
use crate::task::TaskIndex;
use crate::tree::TreeInstance;

use ticking::Ticker;

/// Summary row of the flattened task list, for hosts and inspectors.
#[derive(Clone, Debug)]
pub struct TaskSummary {
    pub index: TaskIndex,
    pub name: String,
    pub kind: TaskKind,
    pub parent: Option<TaskIndex>,
    pub disabled: bool,
}

/// Owns and schedules behavior tree instances.
pub struct BehaviorManager {
    config: ManagerConfig,
    tick_count: u64,
    next_id: u64,
    trees: Vec<TreeInstance>,
    paused: Vec<TreeInstance>,
    events: VecDeque<BehaviorEvent>,
    breakpoint: Option<BehaviorId>,
}

impl Default for BehaviorManager {
    fn default() -> Self {
        Self::new(ManagerConfig::default())
    }
}

impl BehaviorManager {
    pub fn new(config: ManagerConfig) -> Self {
        Self {
            config,
            tick_count: 0,
            next_id: 0,
            trees: Vec::new(),
            paused: Vec::new(),
            events: VecDeque::new(),
            breakpoint: None,
        }
    }

    /// Compiles and starts a behavior that uses no external subtrees.
    pub fn enable(&mut self, behavior: Behavior) -> Result<BehaviorId, CompileError> {
        self.enable_with(behavior, &NoSubtrees)
    }

    /// Compiles and starts a behavior, resolving external subtree references
    /// through `oracle`. On error nothing is retained: the instance never
    /// runs and no stacks exist for it.
    pub fn enable_with(
        &mut self,
        behavior: Behavior,
        oracle: &dyn SubtreeOracle,
    ) -> Result<BehaviorId, CompileError> {
        let Behavior {
            name,
            graph,
            restart_when_complete,
            mut variables,
        } = behavior;

        let flat = compile(&name, graph, oracle, variables.as_mut())?;

        let id = BehaviorId(self.next_id);
        self.next_id += 1;

        let mut tree = TreeInstance::new(id, name, restart_when_complete, variables, flat);
        tree.tick = self.tick_count;
        tree.alloc_stack();
        for index in 0..tree.task_count() {
            tree.with_task(index, |task, ctx| task.on_awake(ctx));
        }
        tracing::debug!(behavior = %tree.name, tasks = tree.task_count(), id = %id, "enabled");

        self.events.push_back(BehaviorEvent::Enabled { id });
        tree.status = TaskStatus::Running;
        self.trees.push(tree);

        let slot = self.trees.len() - 1;
        let mut ticker = Ticker {
            tree: &mut self.trees[slot],
            events: &mut self.events,
            config: &self.config,
            breakpoint: &mut self.breakpoint,
        };
        ticker.push_task(0, 0);
        Ok(id)
    }

    /// Advances every enabled tree by one logical step.
    pub fn tick(&mut self) {
        self.tick_count += 1;
        for slot in 0..self.trees.len() {
            self.tick_slot(slot);
        }
        self.sweep_finished();
    }

    /// Advances a single tree. No-op for unknown or paused behaviors.
    pub fn tick_behavior(&mut self, id: BehaviorId) {
        self.tick_count += 1;
        if let Some(slot) = self.active_slot(id) {
            self.tick_slot(slot);
        }
        self.sweep_finished();
    }

    fn tick_slot(&mut self, slot: usize) {
        self.trees[slot].tick = self.tick_count;
        if !self.trees[slot].is_enabled() {
            return;
        }
        let mut ticker = Ticker {
            tree: &mut self.trees[slot],
            events: &mut self.events,
            config: &self.config,
            breakpoint: &mut self.breakpoint,
        };
        ticker.tick();
    }

    fn sweep_finished(&mut self) {
        self.trees.retain(|tree| !tree.pending_remove);
    }

    /// Disables a behavior, reporting `Success` as its final status.
    pub fn disable(&mut self, id: BehaviorId) {
        self.disable_with(id, false, TaskStatus::Success);
    }

    /// Disables a behavior. When `paused` the instance is parked and can be
    /// resumed without recompilation; otherwise it is destroyed with
    /// `status` as the final status.
    pub fn disable_with(&mut self, id: BehaviorId, paused: bool, status: TaskStatus) {
        if paused {
            if let Some(slot) = self.active_slot(id) {
                let mut tree = self.trees.remove(slot);
                tree.status = TaskStatus::Inactive;
                for task_slot in &mut tree.tasks {
                    task_slot.task.on_pause(true);
                }
                tracing::debug!(behavior = %tree.name, "paused");
                self.paused.push(tree);
            }
        } else {
            self.destroy_with(id, status);
        }
    }

    /// Resumes a paused behavior. Returns `false` if `id` is not paused.
    pub fn resume(&mut self, id: BehaviorId) -> bool {
        let Some(slot) = self.paused.iter().position(|tree| tree.id == id) else {
            return false;
        };
        let mut tree = self.paused.remove(slot);
        tree.status = TaskStatus::Running;
        for task_slot in &mut tree.tasks {
            task_slot.task.on_pause(false);
        }
        tracing::debug!(behavior = %tree.name, "resumed");
        self.trees.push(tree);
        true
    }

    /// Destroys a behavior with `Success` as the final status.
    pub fn destroy(&mut self, id: BehaviorId) {
        self.destroy_with(id, TaskStatus::Success);
    }

    /// Destroys a behavior: unwinds every stack, fans out completion hooks,
    /// and reports `status` through a `Disabled` event.
    pub fn destroy_with(&mut self, id: BehaviorId, status: TaskStatus) {
        if let Some(slot) = self.paused.iter().position(|tree| tree.id == id) {
            let mut tree = self.paused.remove(slot);
            for task_slot in &mut tree.tasks {
                task_slot.task.on_pause(false);
            }
            tree.status = TaskStatus::Running;
            self.trees.push(tree);
        }
        if let Some(slot) = self.active_slot(id) {
            let mut ticker = Ticker {
                tree: &mut self.trees[slot],
                events: &mut self.events,
                config: &self.config,
                breakpoint: &mut self.breakpoint,
            };
            ticker.teardown(status);
            self.sweep_finished();
        }
    }

    /// Restarts a behavior: unwinds every stack with forced `Success`,
    /// notifies every task, and re-pushes the root.
    pub fn restart(&mut self, id: BehaviorId) {
        if let Some(slot) = self.active_slot(id) {
            let mut ticker = Ticker {
                tree: &mut self.trees[slot],
                events: &mut self.events,
                config: &self.config,
                breakpoint: &mut self.breakpoint,
            };
            ticker.restart_behavior();
        }
    }

    /// Requests an interruption at `task` on every stack crossing it. The
    /// unwind happens at the start of the next tick.
    pub fn interrupt(&mut self, id: BehaviorId, task: TaskIndex) {
        self.interrupt_from(id, task, task);
    }

    /// Like [`interrupt`](Self::interrupt), but stamps `source` as the task
    /// the interruption is attributed to.
    pub fn interrupt_from(&mut self, id: BehaviorId, task: TaskIndex, source: TaskIndex) {
        if let Some(slot) = self.active_slot(id) {
            let mut ticker = Ticker {
                tree: &mut self.trees[slot],
                events: &mut self.events,
                config: &self.config,
                breakpoint: &mut self.breakpoint,
            };
            ticker.request_interrupt(task, source);
        }
    }

    /// Fans `event` out to every task on every active path (leaf to root,
    /// stopping at a disabled task) and to the watched conditionals that are
    /// currently gating.
    pub fn dispatch_event(&mut self, id: BehaviorId, event: &dyn Any) {
        let Some(slot) = self.active_slot(id) else {
            return;
        };
        let tree = &mut self.trees[slot];
        if !tree.is_enabled() {
            return;
        }
        for stack in 0..tree.stacks.len() {
            let Some(leaf) = tree.top(stack) else {
                continue;
            };
            let mut current = Some(leaf);
            while let Some(index) = current {
                if tree.tasks[index].config.disabled {
                    break;
                }
                tree.with_task(index, |task, ctx| task.on_event(ctx, event));
                current = tree.parent[index];
            }
        }
        for position in 0..tree.watch.len() {
            let entry = tree.watch[position];
            if entry.composite.is_some() && !tree.tasks[entry.index].config.disabled {
                tree.with_task(entry.index, |task, ctx| task.on_event(ctx, event));
            }
        }
    }

    /// Whether `id` names an enabled (running, not paused) behavior.
    pub fn is_enabled(&self, id: BehaviorId) -> bool {
        self.find_tree(id).is_some_and(TreeInstance::is_enabled)
    }

    /// Current execution status: `Running` while enabled, `Inactive` while
    /// paused, `None` for unknown behaviors.
    pub fn status(&self, id: BehaviorId) -> Option<TaskStatus> {
        self.find_tree(id)
            .or_else(|| self.paused.iter().find(|tree| tree.id == id))
            .map(|tree| tree.status)
    }

    /// Indices of the active leaf actions, one per stack that currently ends
    /// in an `Action` task.
    pub fn active_leaf_tasks(&self, id: BehaviorId) -> Vec<TaskIndex> {
        let Some(tree) = self.find_tree(id) else {
            return Vec::new();
        };
        (0..tree.stacks.len())
            .filter_map(|stack| tree.top(stack))
            .filter(|&index| tree.tasks[index].kind == TaskKind::Action)
            .collect()
    }

    /// The flattened task list in index order.
    pub fn task_summaries(&self, id: BehaviorId) -> Option<Vec<TaskSummary>> {
        let tree = self.find_tree(id)?;
        Some(
            tree.tasks
                .iter()
                .enumerate()
                .map(|(index, slot)| TaskSummary {
                    index,
                    name: slot.config.name.clone(),
                    kind: slot.kind,
                    parent: tree.parent[index],
                    disabled: slot.config.disabled,
                })
                .collect(),
        )
    }

    /// First task whose friendly name matches, in pre-order.
    pub fn find_task_by_name(&self, id: BehaviorId, name: &str) -> Option<TaskIndex> {
        let tree = self.find_tree(id)?;
        tree.tasks.iter().position(|slot| slot.config.name == name)
    }

    /// Queued lifecycle events, oldest first.
    pub fn drain_events(&mut self) -> Vec<BehaviorEvent> {
        self.events.drain(..).collect()
    }

    /// The behavior currently latched on a breakpoint, if any.
    pub fn breakpoint(&self) -> Option<BehaviorId> {
        self.breakpoint
    }

    /// Releases the breakpoint latch so execution resumes next tick.
    pub fn clear_breakpoint(&mut self) {
        self.breakpoint = None;
    }

    fn active_slot(&self, id: BehaviorId) -> Option<usize> {
        self.trees.iter().position(|tree| tree.id == id)
    }

    fn find_tree(&self, id: BehaviorId) -> Option<&TreeInstance> {
        self.trees
            .iter()
            .find(|tree| tree.id == id)
            .or_else(|| self.paused.iter().find(|tree| tree.id == id))
    }
}
