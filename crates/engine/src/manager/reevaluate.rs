//! Continuous reevaluation and conditional aborts.
//!
//! Runs at the start of every tick, before normal stepping, so a priority
//! change discovered this tick takes effect before execution resumes.
//! Phase A re-polls parents that opted into reevaluation; Phase B recomputes
//! every watched conditional and unwinds the active branches its composite
//! is allowed to interrupt.

use crate::status::{AbortType, TaskKind, TaskStatus};
use crate::task::TaskIndex;

use super::ticking::Ticker;

impl Ticker<'_> {
    /// Phase A: reevaluatable parents. Decorators re-poll their own
    /// `on_update`; a failure interrupts the decorator's subtree. Composites
    /// get to re-run their selection logic off-stack.
    pub(crate) fn reevaluate_parent_tasks(&mut self) {
        let mut i = self.tree.reevaluate_parents.len();
        while i > 0 {
            i -= 1;
            if i >= self.tree.reevaluate_parents.len() {
                continue;
            }
            let index = self.tree.reevaluate_parents[i];
            match self.tree.tasks[index].kind {
                TaskKind::Decorator => {
                    let status = self.tree.with_task(index, |task, ctx| task.on_update(ctx));
                    if status == TaskStatus::Failure {
                        self.request_interrupt(index, index);
                    }
                }
                TaskKind::Composite => {
                    let rerun = self
                        .tree
                        .with_task(index, |task, ctx| task.on_reevaluation_started(ctx));
                    if rerun {
                        let mut stack = 0usize;
                        let status = self.run_parent_task(index, &mut stack, TaskStatus::Inactive);
                        self.tree.tasks[index].task.on_reevaluation_ended(status);
                    }
                }
                _ => {}
            }
        }
    }

    /// Phase B: watched conditionals, in watch-list insertion order. Later
    /// entries can be invalidated or rebound by earlier ones before they are
    /// reached; that order is the documented tie-break when several
    /// conditionals flip in the same tick.
    pub(crate) fn reevaluate_conditional_tasks(&mut self) {
        let mut i = 0;
        while i < self.tree.watch.len() {
            let entry = self.tree.watch[i];
            if let Some(gate) = entry.composite {
                let index = entry.index;
                let status = self.tree.with_task(index, |task, ctx| task.on_update(ctx));
                if status != entry.status {
                    tracing::debug!(
                        behavior = %self.tree.name,
                        conditional = %self.tree.tasks[index].config.name,
                        index,
                        composite = gate,
                        status = %status,
                        "conditional abort"
                    );
                    self.apply_conditional_abort(i, index, gate);
                    self.tree.tasks[index].interrupt_tick = Some(self.tree.tick);
                }
            }
            i += 1;
        }
    }

    fn apply_conditional_abort(&mut self, position: usize, index: TaskIndex, gate: TaskIndex) {
        // Unwind every stack whose active leaf shares enough of the path:
        // the branch is in scope when its LCA with the conditional sits at
        // or below the gating composite.
        let mut j = self.tree.stacks.len();
        while j > 0 {
            j -= 1;
            if j >= self.tree.stacks.len() {
                continue;
            }
            let Some(leaf) = self.tree.top(j) else {
                continue;
            };
            let lca = self.tree.find_lca(index, leaf);
            if lca != gate && !self.tree.is_ancestor(gate, lca) {
                continue;
            }
            let stack_count = self.tree.stacks.len();
            let mut current = Some(leaf);
            while let Some(task) = current {
                if task == lca || self.tree.stacks.len() != stack_count {
                    break;
                }
                let mut forced = TaskStatus::Failure;
                self.pop_task(task, j, &mut forced, false, true);
                current = self.tree.parent[task];
            }
        }

        // Entries whose conditional lives under the interrupting composite
        // are orphaned by the unwind, the triggering entry included.
        let mut k = self.tree.watch.len();
        while k > position {
            k -= 1;
            let cond = self.tree.watch[k].index;
            if self.tree.find_lca(gate, cond) == gate {
                self.tree.watch.remove(k);
            }
        }

        // Earlier entries under the same composite: with LowerPriority the
        // higher-priority siblings stop gating entirely; otherwise they are
        // rebound to the nearest composite on their own branch.
        let own_composite = self.tree.parent_composite[index];
        let abort = own_composite.map(|c| self.tree.tasks[c].task.abort_type());
        let mut l = position.min(self.tree.watch.len());
        while l > 0 {
            l -= 1;
            let other = self.tree.watch[l].index;
            if self.tree.parent_composite[other] != own_composite {
                continue;
            }
            if abort == Some(AbortType::LowerPriority) {
                self.tree.watch[l].composite = None;
            } else {
                self.rebind_to_branch_composite(l, gate);
            }
        }

        // Notify every ancestor from the gating composite down to the
        // conditional's immediate parent, root-to-leaf, with the ordinal of
        // the child branch selection should resume from.
        let mut chain: Vec<(TaskIndex, usize)> = Vec::new();
        let mut child = index;
        let mut parent = self.tree.parent[index];
        while let Some(ancestor) = parent {
            chain.push((ancestor, self.tree.relative_child[child]));
            if ancestor == gate {
                break;
            }
            child = ancestor;
            parent = self.tree.parent[ancestor];
        }
        for &(ancestor, ordinal) in chain.iter().rev() {
            self.tree.tasks[ancestor].task.on_conditional_abort(ordinal);
        }
    }

    /// Re-gates watch slot `slot` onto the first composite found by walking
    /// down the gate's child branch that contains the entry's conditional.
    fn rebind_to_branch_composite(&mut self, slot: usize, gate: TaskIndex) {
        let cond = self.tree.watch[slot].index;
        for m in 0..self.tree.children[gate].len() {
            let branch = self.tree.children[gate][m];
            if !self.tree.is_ancestor(branch, cond) {
                continue;
            }
            let mut current = branch;
            while self.tree.tasks[current].kind != TaskKind::Composite {
                if self.tree.children[current].is_empty() {
                    break;
                }
                current = self.tree.children[current][0];
            }
            if self.tree.tasks[current].kind == TaskKind::Composite {
                self.tree.watch[slot].composite = Some(current);
            }
            break;
        }
    }
}
