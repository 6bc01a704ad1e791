//! Decorator tasks.
//!
//! Decorators wrap exactly one child and remap its status or gate its
//! execution. [`Guard`] additionally opts into continuous reevaluation: its
//! predicate is re-polled every tick and a failure interrupts the subtree it
//! guards.

use bt_engine::{TaskKind, TaskStatus, Task, TickContext};

/// Inverts the child's settled status.
pub struct Inverter {
    executed: TaskStatus,
}

impl Inverter {
    pub fn new() -> Self {
        Self {
            executed: TaskStatus::Inactive,
        }
    }
}

impl Default for Inverter {
    fn default() -> Self {
        Self::new()
    }
}

impl Task for Inverter {
    fn kind(&self) -> TaskKind {
        TaskKind::Decorator
    }

    fn on_start(&mut self, _ctx: &mut TickContext<'_>) {
        self.executed = TaskStatus::Inactive;
    }

    fn on_end(&mut self, _ctx: &mut TickContext<'_>) {
        self.executed = TaskStatus::Inactive;
    }

    fn can_execute(&self) -> bool {
        self.executed == TaskStatus::Inactive
    }

    fn on_child_executed(&mut self, _ordinal: usize, status: TaskStatus) {
        self.executed = status;
    }

    fn decorate(&self, status: TaskStatus) -> TaskStatus {
        status.invert()
    }
}

/// Reports `Success` no matter how the child settles.
pub struct Succeeder {
    executed: TaskStatus,
}

impl Succeeder {
    pub fn new() -> Self {
        Self {
            executed: TaskStatus::Inactive,
        }
    }
}

impl Default for Succeeder {
    fn default() -> Self {
        Self::new()
    }
}

impl Task for Succeeder {
    fn kind(&self) -> TaskKind {
        TaskKind::Decorator
    }

    fn on_start(&mut self, _ctx: &mut TickContext<'_>) {
        self.executed = TaskStatus::Inactive;
    }

    fn on_end(&mut self, _ctx: &mut TickContext<'_>) {
        self.executed = TaskStatus::Inactive;
    }

    fn can_execute(&self) -> bool {
        self.executed == TaskStatus::Inactive
    }

    fn on_child_executed(&mut self, _ordinal: usize, status: TaskStatus) {
        self.executed = status;
    }

    fn decorate(&self, status: TaskStatus) -> TaskStatus {
        if status.is_settled() {
            TaskStatus::Success
        } else {
            status
        }
    }
}

/// Reports `Failure` no matter how the child settles.
pub struct Failer {
    executed: TaskStatus,
}

impl Failer {
    pub fn new() -> Self {
        Self {
            executed: TaskStatus::Inactive,
        }
    }
}

impl Default for Failer {
    fn default() -> Self {
        Self::new()
    }
}

impl Task for Failer {
    fn kind(&self) -> TaskKind {
        TaskKind::Decorator
    }

    fn on_start(&mut self, _ctx: &mut TickContext<'_>) {
        self.executed = TaskStatus::Inactive;
    }

    fn on_end(&mut self, _ctx: &mut TickContext<'_>) {
        self.executed = TaskStatus::Inactive;
    }

    fn can_execute(&self) -> bool {
        self.executed == TaskStatus::Inactive
    }

    fn on_child_executed(&mut self, _ordinal: usize, status: TaskStatus) {
        self.executed = status;
    }

    fn decorate(&self, status: TaskStatus) -> TaskStatus {
        if status.is_settled() {
            TaskStatus::Failure
        } else {
            status
        }
    }
}

/// Re-runs the child a fixed number of times, optionally stopping early on
/// failure. Iterations are spread across ticks by the scheduler's
/// duplicate-execution guard.
pub struct Repeater {
    count: Option<u64>,
    end_on_failure: bool,
    runs: u64,
    last_status: TaskStatus,
}

impl Repeater {
    pub fn times(count: u64) -> Self {
        Self {
            count: Some(count),
            end_on_failure: false,
            runs: 0,
            last_status: TaskStatus::Inactive,
        }
    }

    pub fn forever() -> Self {
        Self {
            count: None,
            end_on_failure: false,
            runs: 0,
            last_status: TaskStatus::Inactive,
        }
    }

    pub fn end_on_failure(mut self, end: bool) -> Self {
        self.end_on_failure = end;
        self
    }
}

impl Task for Repeater {
    fn kind(&self) -> TaskKind {
        TaskKind::Decorator
    }

    fn on_start(&mut self, _ctx: &mut TickContext<'_>) {
        self.runs = 0;
        self.last_status = TaskStatus::Inactive;
    }

    fn on_end(&mut self, _ctx: &mut TickContext<'_>) {
        self.runs = 0;
        self.last_status = TaskStatus::Inactive;
    }

    fn can_execute(&self) -> bool {
        if self.end_on_failure && self.last_status == TaskStatus::Failure {
            return false;
        }
        match self.count {
            Some(count) => self.runs < count,
            None => true,
        }
    }

    fn on_child_executed(&mut self, _ordinal: usize, status: TaskStatus) {
        self.runs += 1;
        self.last_status = status;
    }
}

/// Re-runs the child until it fails, then reports `Failure`.
pub struct UntilFailure {
    last_status: TaskStatus,
}

impl UntilFailure {
    pub fn new() -> Self {
        Self {
            last_status: TaskStatus::Inactive,
        }
    }
}

impl Default for UntilFailure {
    fn default() -> Self {
        Self::new()
    }
}

impl Task for UntilFailure {
    fn kind(&self) -> TaskKind {
        TaskKind::Decorator
    }

    fn on_start(&mut self, _ctx: &mut TickContext<'_>) {
        self.last_status = TaskStatus::Inactive;
    }

    fn on_end(&mut self, _ctx: &mut TickContext<'_>) {
        self.last_status = TaskStatus::Inactive;
    }

    fn can_execute(&self) -> bool {
        self.last_status != TaskStatus::Failure
    }

    fn on_child_executed(&mut self, _ordinal: usize, status: TaskStatus) {
        self.last_status = status;
    }
}

/// Gates its subtree on a predicate that is re-polled every tick.
///
/// While the subtree runs, the reevaluation engine keeps probing the
/// predicate; the first failed probe interrupts the subtree, which unwinds
/// with forced failures and reports `Failure` upward.
pub struct Guard {
    predicate: Box<dyn FnMut(&mut TickContext<'_>) -> bool + Send>,
    allowed: bool,
    executed: TaskStatus,
}

impl Guard {
    pub fn new(predicate: impl FnMut(&mut TickContext<'_>) -> bool + Send + 'static) -> Self {
        Self {
            predicate: Box::new(predicate),
            allowed: false,
            executed: TaskStatus::Inactive,
        }
    }
}

impl Task for Guard {
    fn kind(&self) -> TaskKind {
        TaskKind::Decorator
    }

    fn can_reevaluate(&self) -> bool {
        true
    }

    fn on_start(&mut self, ctx: &mut TickContext<'_>) {
        self.allowed = (self.predicate)(ctx);
        self.executed = TaskStatus::Inactive;
    }

    fn on_end(&mut self, _ctx: &mut TickContext<'_>) {
        self.executed = TaskStatus::Inactive;
    }

    /// Reevaluation probe. A `Failure` here makes the engine interrupt this
    /// decorator's position on every stack that crosses it.
    fn on_update(&mut self, ctx: &mut TickContext<'_>) -> TaskStatus {
        self.allowed = (self.predicate)(ctx);
        if self.allowed {
            TaskStatus::Success
        } else {
            tracing::trace!("guard predicate failed");
            TaskStatus::Failure
        }
    }

    fn can_execute(&self) -> bool {
        self.allowed && self.executed == TaskStatus::Inactive
    }

    fn on_child_executed(&mut self, _ordinal: usize, status: TaskStatus) {
        self.executed = status;
    }

    fn override_status(&self, status: TaskStatus) -> TaskStatus {
        if !self.allowed {
            TaskStatus::Failure
        } else {
            status
        }
    }
}
