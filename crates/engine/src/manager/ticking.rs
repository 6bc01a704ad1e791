//! Per-tree stepping: the tick loop, task execution, and stack lifecycle.
//!
//! A [`Ticker`] borrows one tree plus the manager-level pieces the stepping
//! code needs (event queue, configuration, breakpoint latch) so the stack
//! machinery can run without touching the rest of the manager.

use std::collections::VecDeque;

use crate::behavior::BehaviorId;
use crate::config::{ExecutionLimit, ManagerConfig};
use crate::events::BehaviorEvent;
use crate::status::{AbortType, TaskKind, TaskStatus};
use crate::task::TaskIndex;
use crate::tree::{TreeInstance, WatchEntry};

pub(crate) struct Ticker<'a> {
    pub tree: &'a mut TreeInstance,
    pub events: &'a mut VecDeque<BehaviorEvent>,
    pub config: &'a ManagerConfig,
    pub breakpoint: &'a mut Option<BehaviorId>,
}

impl Ticker<'_> {
    /// One logical step for this tree: reevaluation first, then every active
    /// stack advances by at most one settled execution step.
    pub(crate) fn tick(&mut self) {
        self.tree.execution_count = 0;
        self.tree.budget_reported = false;
        self.reevaluate_parent_tasks();
        self.reevaluate_conditional_tasks();

        // Newest stacks first, so short-lived parallel branches resolve
        // before the primary path. Stacks may disappear mid-loop; every
        // access re-checks bounds.
        let mut i = self.tree.stacks.len();
        while i > 0 {
            i -= 1;
            if i >= self.tree.stacks.len() {
                continue;
            }
            let mut status = TaskStatus::Inactive;

            if let Some(target) = self.tree.interruption.get(i).copied().flatten() {
                self.tree.interruption[i] = None;
                // Unwind down to the interruption target with forced
                // failures, then pop the target itself with its own
                // policy-defined status.
                let mut unwind = TaskStatus::Failure;
                while let Some(top) = self.tree.top(i) {
                    if top == target {
                        break;
                    }
                    let depth = self.tree.stacks[i].len();
                    self.pop_task(top, i, &mut unwind, true, true);
                    if depth == 1 {
                        break;
                    }
                }
                if i < self.tree.stacks.len() && self.tree.top(i) == Some(target) {
                    let mut forced =
                        self.tree.tasks[target].task.override_status(TaskStatus::Failure);
                    self.pop_task(target, i, &mut forced, true, true);
                    status = forced;
                }
            }

            // Step until the branch settles into Running, the stack drains,
            // the tree stops, or the same task would execute twice in a row
            // without state change (a synchronous-loop guard).
            let mut last: Option<TaskIndex> = None;
            while status != TaskStatus::Running
                && i < self.tree.stacks.len()
                && !self.tree.stacks[i].is_empty()
            {
                let Some(top) = self.tree.top(i) else {
                    break;
                };
                if last == Some(top) || !self.tree.is_enabled() {
                    break;
                }
                last = Some(top);
                status = self.run_task(top, i, status);
            }
        }
    }

    /// Executes the task at `task_index` on stack `stack_index` for one step.
    pub(crate) fn run_task(
        &mut self,
        task_index: TaskIndex,
        stack_index: usize,
        previous: TaskStatus,
    ) -> TaskStatus {
        if self.tree.tasks[task_index].config.disabled {
            tracing::debug!(
                behavior = %self.tree.name,
                task = %self.tree.tasks[task_index].config.name,
                index = task_index,
                stack = stack_index,
                "skipping disabled task"
            );
            if let Some(parent) = self.tree.parent[task_index] {
                let ordinal = self.tree.relative_child[task_index];
                let parallel = self.tree.tasks[parent].task.can_run_parallel_children();
                self.tree.tasks[parent]
                    .task
                    .on_child_executed(ordinal, TaskStatus::Inactive);
                if parallel {
                    self.tree.release_stack(stack_index);
                }
            }
            return previous;
        }

        // A non-instant task that already settled on a previous tick pops
        // now with the cached status instead of updating again.
        let instant = self.tree.tasks[task_index].task.is_instant();
        if !instant && self.tree.stack_status[stack_index].is_settled() {
            let mut status = self.tree.stack_status[stack_index];
            self.pop_task(task_index, stack_index, &mut status, true, true);
            return status;
        }

        self.push_task(task_index, stack_index);
        if self.breakpoint.is_some() {
            return TaskStatus::Running;
        }

        let mut status;
        if self.tree.tasks[task_index].kind.is_parent() {
            let mut stack = stack_index;
            status = self.run_parent_task(task_index, &mut stack, previous);
            status = self.tree.tasks[task_index].task.override_status(status);
        } else {
            status = self.tree.with_task(task_index, |task, ctx| task.on_update(ctx));
        }

        if status != TaskStatus::Running {
            if instant {
                self.pop_task(task_index, stack_index, &mut status, true, true);
            } else {
                self.tree.stack_status[stack_index] = status;
            }
        }
        status
    }

    /// Drives a composite/decorator's children until the parent yields.
    pub(crate) fn run_parent_task(
        &mut self,
        task_index: TaskIndex,
        stack_index: &mut usize,
        mut status: TaskStatus,
    ) -> TaskStatus {
        let parallel = self.tree.tasks[task_index].task.can_run_parallel_children();
        if parallel
            && self.tree.tasks[task_index]
                .task
                .override_status(TaskStatus::Running)
                == TaskStatus::Running
        {
            // All parallel children already started; nothing to drive until
            // their statuses settle.
            return status;
        }

        let saved_stack = *stack_index;
        let mut child_status = TaskStatus::Inactive;
        let mut previous_child: Option<usize> = None;

        loop {
            if !self.tree.tasks[task_index].task.can_execute() {
                break;
            }
            if child_status == TaskStatus::Running && !parallel {
                break;
            }
            if !self.tree.is_enabled() {
                break;
            }

            let ordinal = self.tree.tasks[task_index].task.current_child_index();
            match self.config.execution_limit {
                ExecutionLimit::NoDuplicates => {
                    if previous_child == Some(ordinal) {
                        status = TaskStatus::Running;
                        break;
                    }
                }
                ExecutionLimit::Count(max) => {
                    if self.tree.execution_count >= max {
                        tracing::warn!(
                            behavior = %self.tree.name,
                            max,
                            "execution budget reached, deferring remaining work to next tick"
                        );
                        if !self.tree.budget_reported {
                            self.tree.budget_reported = true;
                            self.events.push_back(BehaviorEvent::BudgetExceeded {
                                id: self.tree.id,
                                executions: self.tree.execution_count,
                            });
                        }
                        status = TaskStatus::Running;
                        break;
                    }
                }
            }
            previous_child = Some(ordinal);

            let Some(&child_index) = self.tree.children[task_index].get(ordinal) else {
                break;
            };
            if parallel {
                *stack_index = self.tree.alloc_stack();
            }
            self.tree.tasks[task_index].task.on_child_started(ordinal);
            child_status = self.run_task(child_index, *stack_index, status);
            status = child_status;
        }

        *stack_index = saved_stack;
        status
    }

    /// Pushes `task_index` onto the given stack. No-op if it is already on
    /// top or the tree is not running.
    pub(crate) fn push_task(&mut self, task_index: TaskIndex, stack_index: usize) {
        if !self.tree.is_enabled() || stack_index >= self.tree.stacks.len() {
            return;
        }
        if self.tree.top(stack_index) == Some(task_index) {
            return;
        }

        self.tree.stacks[stack_index].push(task_index);
        self.tree.stack_status[stack_index] = TaskStatus::Running;
        self.tree.execution_count += 1;

        let tick = self.tree.tick;
        let slot = &mut self.tree.tasks[task_index];
        slot.push_tick = Some(tick);
        slot.last_status = TaskStatus::Running;
        let breakpoint = slot.config.breakpoint;

        tracing::debug!(
            behavior = %self.tree.name,
            task = %self.tree.tasks[task_index].config.name,
            index = task_index,
            stack = stack_index,
            "push"
        );

        if breakpoint {
            *self.breakpoint = Some(self.tree.id);
            self.events.push_back(BehaviorEvent::BreakpointHit {
                id: self.tree.id,
                task: task_index,
            });
        }

        self.tree.with_task(task_index, |task, ctx| task.on_start(ctx));

        if self.tree.tasks[task_index].kind.is_parent()
            && self.tree.tasks[task_index].task.can_reevaluate()
        {
            self.tree.reevaluate_parents.push(task_index);
        }
    }

    /// Pops `task_index` with the given status, notifying its parent and
    /// maintaining the conditional watch list. No-op unless the task is
    /// exactly the stack's top.
    pub(crate) fn pop_task(
        &mut self,
        task_index: TaskIndex,
        stack_index: usize,
        status: &mut TaskStatus,
        pop_children: bool,
        notify_on_empty: bool,
    ) {
        if !self.tree.is_enabled()
            || stack_index >= self.tree.stacks.len()
            || self.tree.top(stack_index) != Some(task_index)
        {
            return;
        }

        self.tree.stacks[stack_index].pop();
        self.tree.stack_status[stack_index] = TaskStatus::Inactive;

        self.tree.with_task(task_index, |task, ctx| task.on_end(ctx));

        let tick = self.tree.tick;
        let slot = &mut self.tree.tasks[task_index];
        slot.push_tick = None;
        slot.pop_tick = Some(tick);
        slot.last_status = *status;

        tracing::debug!(
            behavior = %self.tree.name,
            task = %self.tree.tasks[task_index].config.name,
            index = task_index,
            stack = stack_index,
            status = %*status,
            "pop"
        );

        let kind = self.tree.tasks[task_index].kind;
        if let Some(parent) = self.tree.parent[task_index] {
            if kind == TaskKind::Conditional {
                self.record_watch_entry(task_index, stack_index, *status);
            }
            let ordinal = self.tree.relative_child[task_index];
            let parallel = self.tree.tasks[parent].task.can_run_parallel_children();
            self.tree.tasks[parent].task.on_child_executed(ordinal, *status);
            if !parallel {
                *status = self.tree.tasks[parent].task.decorate(*status);
            }
        }

        if kind.is_parent() {
            if self.tree.tasks[task_index].task.can_reevaluate()
                && let Some(pos) = self
                    .tree
                    .reevaluate_parents
                    .iter()
                    .rposition(|&idx| idx == task_index)
            {
                self.tree.reevaluate_parents.remove(pos);
            }
            if kind == TaskKind::Composite {
                self.rebind_watch_after_composite_pop(task_index, stack_index);
            }
        }

        if pop_children {
            // Any stack whose leaf lives below the popped task is orphaned.
            let mut m = self.tree.stacks.len();
            while m > stack_index + 1 {
                m -= 1;
                if m >= self.tree.stacks.len() {
                    continue;
                }
                let orphaned = self
                    .tree
                    .top(m)
                    .is_some_and(|leaf| self.tree.is_ancestor(task_index, leaf));
                if orphaned {
                    let mut forced = TaskStatus::Failure;
                    let depth = self.tree.stacks[m].len();
                    for _ in 0..depth {
                        let Some(top) = self.tree.top(m) else {
                            break;
                        };
                        self.pop_task(top, m, &mut forced, false, notify_on_empty);
                    }
                }
            }
        }

        if stack_index < self.tree.stacks.len() && self.tree.stacks[stack_index].is_empty() {
            if stack_index == 0 {
                if notify_on_empty {
                    if self.tree.restart_when_complete {
                        self.restart();
                    } else {
                        self.teardown(*status);
                    }
                }
                *status = TaskStatus::Inactive;
            } else {
                // A parallel branch finished; the owning composite stays
                // active and learns the result through on_child_executed.
                self.tree.release_stack(stack_index);
                *status = TaskStatus::Running;
            }
        }
    }

    /// Creates or refreshes the watch entry for a conditional finishing
    /// under an abort-aware composite.
    fn record_watch_entry(&mut self, task_index: TaskIndex, stack_index: usize, status: TaskStatus) {
        let Some(composite) = self.tree.parent_composite[task_index] else {
            return;
        };
        let abort = self.tree.tasks[composite].task.abort_type();
        if abort == AbortType::None {
            return;
        }
        // LowerPriority entries only start gating once their composite pops;
        // until then the sentinel keeps them dormant.
        let gate = if abort == AbortType::LowerPriority {
            None
        } else {
            Some(composite)
        };
        if let Some(pos) = self.tree.watch_position(task_index) {
            self.tree.watch[pos].composite = gate;
            self.tree.watch[pos].status = status;
        } else {
            self.tree.watch.push(WatchEntry {
                index: task_index,
                status,
                stack: stack_index,
                composite: gate,
            });
        }
    }

    /// Watch-list maintenance when a composite pops: entries it was gating
    /// either dissolve with it or move up to the next composite ancestor,
    /// depending on the abort policy.
    fn rebind_watch_after_composite_pop(&mut self, task_index: TaskIndex, stack_index: usize) {
        let abort = self.tree.tasks[task_index].task.abort_type();
        let stack_empty = self
            .tree
            .stacks
            .get(stack_index)
            .is_none_or(|stack| stack.is_empty());

        match abort {
            AbortType::None | AbortType::SelfOnly => {
                self.tree.remove_watch_gated_by(Some(task_index));
            }
            AbortType::LowerPriority | AbortType::Both if stack_empty => {
                self.tree.remove_watch_gated_by(Some(task_index));
            }
            AbortType::LowerPriority | AbortType::Both => {
                let grandparent = self.tree.parent_composite[task_index];
                if let Some(grand) = grandparent {
                    if self.tree.tasks[grand].task.can_run_parallel_children() {
                        self.tree.remove_watch_gated_by(Some(task_index));
                    } else {
                        // The composite's own conditionals keep watching,
                        // now gating the surrounding composite.
                        for c in 0..self.tree.child_conditionals[task_index].len() {
                            let cond = self.tree.child_conditionals[task_index][c];
                            if let Some(pos) = self.tree.watch_position(cond) {
                                self.tree.watch[pos].composite = grandparent;
                            }
                        }
                    }
                }
                for entry in self.tree.watch.iter_mut() {
                    if entry.composite == Some(task_index) {
                        entry.composite = grandparent;
                    }
                }
            }
        }
    }

    /// Restart from an unwound state: clear the watch list, notify every
    /// task, and re-push the root. The flattened structure is reused as-is.
    pub(crate) fn restart(&mut self) {
        tracing::debug!(behavior = %self.tree.name, "restart");
        self.tree.watch.clear();
        for slot in &mut self.tree.tasks {
            slot.task.on_behavior_restart();
        }
        self.events.push_back(BehaviorEvent::Restarted { id: self.tree.id });
        self.push_task(0, 0);
    }

    /// External restart: unwind every stack with forced `Success`, then
    /// restart from the root.
    pub(crate) fn restart_behavior(&mut self) {
        let mut status = TaskStatus::Success;
        let mut i = self.tree.stacks.len();
        while i > 0 {
            i -= 1;
            if i >= self.tree.stacks.len() {
                continue;
            }
            while let Some(top) = self.tree.top(i) {
                let depth = self.tree.stacks[i].len();
                self.pop_task(top, i, &mut status, true, false);
                if depth == 1 {
                    break;
                }
            }
        }
        self.restart();
    }

    /// Full teardown: unwind whatever is still active, fan out completion
    /// hooks, and mark the tree for removal with its final status.
    pub(crate) fn teardown(&mut self, final_status: TaskStatus) {
        if self.tree.destroying {
            return;
        }
        self.tree.destroying = true;

        let mut status = final_status;
        let mut i = self.tree.stacks.len();
        while i > 0 {
            i -= 1;
            if i >= self.tree.stacks.len() {
                continue;
            }
            while let Some(top) = self.tree.top(i) {
                let depth = self.tree.stacks[i].len();
                self.pop_task(top, i, &mut status, true, false);
                if depth == 1 {
                    break;
                }
            }
        }

        self.tree.watch.clear();
        self.tree.reevaluate_parents.clear();
        for slot in &mut self.tree.tasks {
            slot.task.on_behavior_complete();
        }

        self.tree.destroying = false;
        self.tree.status = final_status;
        self.tree.pending_remove = true;
        self.events.push_back(BehaviorEvent::Disabled {
            id: self.tree.id,
            status: final_status,
        });
        tracing::debug!(behavior = %self.tree.name, status = %final_status, "disabled");
    }

    /// Requests an interruption at `target` on every stack whose active path
    /// crosses it. `source` receives the interruption stamp.
    pub(crate) fn request_interrupt(&mut self, target: TaskIndex, source: TaskIndex) {
        if !self.tree.is_enabled() || target >= self.tree.tasks.len() {
            return;
        }
        for j in 0..self.tree.stacks.len() {
            let Some(leaf) = self.tree.top(j) else {
                continue;
            };
            let mut current = Some(leaf);
            while let Some(index) = current {
                if index == target {
                    self.tree.interruption[j] = Some(target);
                    tracing::debug!(
                        behavior = %self.tree.name,
                        task = %self.tree.tasks[target].config.name,
                        index = target,
                        stack = j,
                        "interrupt"
                    );
                    break;
                }
                current = self.tree.parent[index];
            }
        }
        if source < self.tree.tasks.len() {
            self.tree.tasks[source].interrupt_tick = Some(self.tree.tick);
        }
    }
}
