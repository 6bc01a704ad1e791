//! Composite tasks.
//!
//! Composites select among multiple children and feed their results back
//! into the selection state. [`Sequence`] is AND logic (fails fast),
//! [`Selector`] is OR logic (succeeds fast), [`Parallel`] runs every child
//! on its own execution stack, and [`RandomSelector`] is a selector over a
//! seeded shuffle of its children.

use bt_engine::{AbortType, AttachInfo, TaskKind, TaskStatus, Task, TickContext};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

/// Runs children in order until one fails.
///
/// Conditional children finishing under a non-`None` abort policy keep being
/// watched after they complete; a status flip rewinds selection to the
/// conditional's branch via `on_conditional_abort`.
pub struct Sequence {
    abort: AbortType,
    child_count: usize,
    current: usize,
    last_status: TaskStatus,
}

impl Sequence {
    pub fn new() -> Self {
        Self::with_abort(AbortType::None)
    }

    pub fn with_abort(abort: AbortType) -> Self {
        Self {
            abort,
            child_count: 0,
            current: 0,
            last_status: TaskStatus::Inactive,
        }
    }
}

impl Default for Sequence {
    fn default() -> Self {
        Self::new()
    }
}

impl Task for Sequence {
    fn kind(&self) -> TaskKind {
        TaskKind::Composite
    }

    fn on_attach(&mut self, info: AttachInfo) {
        self.child_count = info.child_count;
    }

    fn on_start(&mut self, _ctx: &mut TickContext<'_>) {
        self.current = 0;
        self.last_status = TaskStatus::Inactive;
    }

    fn on_end(&mut self, _ctx: &mut TickContext<'_>) {
        self.current = 0;
        self.last_status = TaskStatus::Inactive;
    }

    fn can_execute(&self) -> bool {
        self.current < self.child_count && self.last_status != TaskStatus::Failure
    }

    fn current_child_index(&self) -> usize {
        self.current
    }

    fn on_child_executed(&mut self, _ordinal: usize, status: TaskStatus) {
        self.current += 1;
        self.last_status = status;
    }

    fn on_conditional_abort(&mut self, ordinal: usize) {
        self.current = ordinal;
        self.last_status = TaskStatus::Inactive;
    }

    fn abort_type(&self) -> AbortType {
        self.abort
    }
}

/// Runs children in order until one succeeds.
pub struct Selector {
    abort: AbortType,
    child_count: usize,
    current: usize,
    last_status: TaskStatus,
}

impl Selector {
    pub fn new() -> Self {
        Self::with_abort(AbortType::None)
    }

    pub fn with_abort(abort: AbortType) -> Self {
        Self {
            abort,
            child_count: 0,
            current: 0,
            last_status: TaskStatus::Inactive,
        }
    }
}

impl Default for Selector {
    fn default() -> Self {
        Self::new()
    }
}

impl Task for Selector {
    fn kind(&self) -> TaskKind {
        TaskKind::Composite
    }

    fn on_attach(&mut self, info: AttachInfo) {
        self.child_count = info.child_count;
    }

    fn on_start(&mut self, _ctx: &mut TickContext<'_>) {
        self.current = 0;
        self.last_status = TaskStatus::Inactive;
    }

    fn on_end(&mut self, _ctx: &mut TickContext<'_>) {
        self.current = 0;
        self.last_status = TaskStatus::Inactive;
    }

    fn can_execute(&self) -> bool {
        self.current < self.child_count && self.last_status != TaskStatus::Success
    }

    fn current_child_index(&self) -> usize {
        self.current
    }

    fn on_child_executed(&mut self, _ordinal: usize, status: TaskStatus) {
        self.current += 1;
        self.last_status = status;
    }

    fn on_conditional_abort(&mut self, ordinal: usize) {
        self.current = ordinal;
        self.last_status = TaskStatus::Inactive;
    }

    fn abort_type(&self) -> AbortType {
        self.abort
    }
}

/// Runs every child concurrently, each on its own execution stack.
///
/// The aggregate settles to `Failure` as soon as any child fails, to
/// `Success` once no child is still running, and stays `Running` otherwise.
pub struct Parallel {
    child_count: usize,
    current: usize,
    statuses: Vec<TaskStatus>,
}

impl Parallel {
    pub fn new() -> Self {
        Self {
            child_count: 0,
            current: 0,
            statuses: Vec::new(),
        }
    }
}

impl Default for Parallel {
    fn default() -> Self {
        Self::new()
    }
}

impl Task for Parallel {
    fn kind(&self) -> TaskKind {
        TaskKind::Composite
    }

    fn on_attach(&mut self, info: AttachInfo) {
        self.child_count = info.child_count;
        self.statuses = vec![TaskStatus::Inactive; info.child_count];
    }

    fn on_start(&mut self, _ctx: &mut TickContext<'_>) {
        self.current = 0;
        self.statuses.fill(TaskStatus::Inactive);
    }

    fn on_end(&mut self, _ctx: &mut TickContext<'_>) {
        self.current = 0;
        self.statuses.fill(TaskStatus::Inactive);
    }

    fn can_execute(&self) -> bool {
        self.current < self.child_count
    }

    fn current_child_index(&self) -> usize {
        self.current
    }

    fn can_run_parallel_children(&self) -> bool {
        true
    }

    fn on_child_started(&mut self, ordinal: usize) {
        if let Some(slot) = self.statuses.get_mut(ordinal) {
            *slot = TaskStatus::Running;
        }
        self.current += 1;
    }

    fn on_child_executed(&mut self, ordinal: usize, status: TaskStatus) {
        if let Some(slot) = self.statuses.get_mut(ordinal) {
            *slot = status;
        }
    }

    fn override_status(&self, _status: TaskStatus) -> TaskStatus {
        let mut all_settled = true;
        for &status in &self.statuses {
            match status {
                TaskStatus::Failure => return TaskStatus::Failure,
                TaskStatus::Running => all_settled = false,
                _ => {}
            }
        }
        if all_settled {
            TaskStatus::Success
        } else {
            TaskStatus::Running
        }
    }

    fn on_conditional_abort(&mut self, ordinal: usize) {
        self.current = ordinal;
        for slot in self.statuses.iter_mut().skip(ordinal) {
            *slot = TaskStatus::Inactive;
        }
    }
}

/// A selector that tries its children in a seeded random order.
///
/// The order reshuffles every time the composite starts, so repeated
/// selections are deterministic for a fixed seed but vary run to run.
pub struct RandomSelector {
    rng: StdRng,
    order: Vec<usize>,
    position: usize,
    last_status: TaskStatus,
}

impl RandomSelector {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            order: Vec::new(),
            position: 0,
            last_status: TaskStatus::Inactive,
        }
    }
}

impl Task for RandomSelector {
    fn kind(&self) -> TaskKind {
        TaskKind::Composite
    }

    fn on_attach(&mut self, info: AttachInfo) {
        self.order = (0..info.child_count).collect();
    }

    fn on_start(&mut self, _ctx: &mut TickContext<'_>) {
        self.order.shuffle(&mut self.rng);
        self.position = 0;
        self.last_status = TaskStatus::Inactive;
    }

    fn on_end(&mut self, _ctx: &mut TickContext<'_>) {
        self.position = 0;
        self.last_status = TaskStatus::Inactive;
    }

    fn can_execute(&self) -> bool {
        self.position < self.order.len() && self.last_status != TaskStatus::Success
    }

    fn current_child_index(&self) -> usize {
        self.order[self.position]
    }

    fn on_child_executed(&mut self, _ordinal: usize, status: TaskStatus) {
        self.position += 1;
        self.last_status = status;
    }

    fn on_conditional_abort(&mut self, ordinal: usize) {
        if let Some(position) = self.order.iter().position(|&o| o == ordinal) {
            self.position = position;
        } else {
            self.position = 0;
        }
        self.last_status = TaskStatus::Inactive;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bt_engine::VariableStore;

    fn attach(task: &mut impl Task, child_count: usize) {
        task.on_attach(AttachInfo {
            index: 0,
            child_count,
        });
    }

    fn start(task: &mut impl Task) {
        let mut vars = VariableStore::new();
        let mut ctx = TickContext {
            variables: &mut vars,
            behavior: "test",
            tick: 0,
        };
        task.on_start(&mut ctx);
    }

    #[test]
    fn sequence_stops_on_failure() {
        let mut seq = Sequence::new();
        attach(&mut seq, 3);
        start(&mut seq);

        assert_eq!(seq.current_child_index(), 0);
        seq.on_child_executed(0, TaskStatus::Success);
        assert!(seq.can_execute());
        seq.on_child_executed(1, TaskStatus::Failure);
        assert!(!seq.can_execute());
    }

    #[test]
    fn sequence_rewinds_on_conditional_abort() {
        let mut seq = Sequence::with_abort(AbortType::SelfOnly);
        attach(&mut seq, 3);
        start(&mut seq);

        seq.on_child_executed(0, TaskStatus::Success);
        seq.on_child_executed(1, TaskStatus::Success);
        seq.on_conditional_abort(0);
        assert!(seq.can_execute());
        assert_eq!(seq.current_child_index(), 0);
    }

    #[test]
    fn selector_stops_on_success() {
        let mut sel = Selector::new();
        attach(&mut sel, 2);
        start(&mut sel);

        sel.on_child_executed(0, TaskStatus::Failure);
        assert!(sel.can_execute());
        assert_eq!(sel.current_child_index(), 1);
        sel.on_child_executed(1, TaskStatus::Success);
        assert!(!sel.can_execute());
    }

    #[test]
    fn parallel_aggregates_child_statuses() {
        let mut par = Parallel::new();
        attach(&mut par, 2);
        start(&mut par);

        par.on_child_started(0);
        par.on_child_started(1);
        assert_eq!(par.override_status(TaskStatus::Running), TaskStatus::Running);

        par.on_child_executed(0, TaskStatus::Success);
        assert_eq!(par.override_status(TaskStatus::Running), TaskStatus::Running);

        par.on_child_executed(1, TaskStatus::Success);
        assert_eq!(par.override_status(TaskStatus::Running), TaskStatus::Success);
    }

    #[test]
    fn parallel_fails_as_soon_as_any_child_fails() {
        let mut par = Parallel::new();
        attach(&mut par, 2);
        start(&mut par);

        par.on_child_started(0);
        par.on_child_started(1);
        par.on_child_executed(0, TaskStatus::Failure);
        assert_eq!(par.override_status(TaskStatus::Running), TaskStatus::Failure);
    }
}
