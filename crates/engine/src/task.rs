//! Core task trait.
//!
//! This module defines the [`Task`] trait, the fixed polymorphic contract
//! every node in a behavior tree implements. The scheduler and the
//! abort/reevaluation engine only ever talk to tasks through these hooks;
//! task implementations must not call back into the scheduler except by
//! returning from them.

use std::any::Any;

use crate::status::{AbortType, TaskKind, TaskStatus};
use crate::variables::{OverrideScope, VariableSource};

/// Dense index of a task within its compiled tree. The root is always 0.
pub type TaskIndex = usize;

/// Per-call context handed to the runtime hooks.
///
/// Gives tasks access to the owning behavior's variable table and to the
/// scheduler's tick counter. Everything else a task needs it should own.
pub struct TickContext<'a> {
    pub variables: &'a mut dyn VariableSource,
    /// Name of the owning behavior instance.
    pub behavior: &'a str,
    /// Monotonic tick counter of the owning manager.
    pub tick: u64,
}

/// Compile-time information injected into each task once its tree has been
/// flattened: the task's tree-scoped identity and, for parents, the final
/// child count (which may exceed the authored count when external subtrees
/// were spliced in as extra children).
#[derive(Clone, Copy, Debug)]
pub struct AttachInfo {
    pub index: TaskIndex,
    pub child_count: usize,
}

/// A behavior tree node.
///
/// Leaf kinds (`Action`, `Conditional`) implement the runtime hooks and
/// ignore the parent surface; composite/decorator kinds additionally drive
/// child selection through `can_execute` / `current_child_index` /
/// `on_child_executed` and friends. Default implementations are provided so
/// a leaf only has to supply `kind` and `on_update`.
pub trait Task: Send {
    /// Behavioral kind tag. Fixed for the lifetime of the task.
    fn kind(&self) -> TaskKind;

    /// An instant task settles within the tick that pushed it and never
    /// carries `Running` across ticks. Non-instant tasks have their settled
    /// status cached and are popped on the following tick.
    fn is_instant(&self) -> bool {
        true
    }

    /// Called once after compilation, before `on_awake`.
    fn on_attach(&mut self, _info: AttachInfo) {}

    /// Called while compiling, with the override scope visible at this
    /// task's splice depth. Implementations rewrite their [`VarBinding`]s
    /// through [`OverrideScope::rebind`].
    ///
    /// [`VarBinding`]: crate::variables::VarBinding
    fn bind_variables(&mut self, _scope: &OverrideScope) {}

    /// Called once when the behavior is enabled, for every task in the tree.
    fn on_awake(&mut self, _ctx: &mut TickContext<'_>) {}

    /// Called every time the task is pushed onto an execution stack.
    fn on_start(&mut self, _ctx: &mut TickContext<'_>) {}

    /// One execution step. Parents are not updated through this hook during
    /// normal stepping (their children are driven instead); for them it is
    /// the reevaluation probe.
    fn on_update(&mut self, _ctx: &mut TickContext<'_>) -> TaskStatus {
        TaskStatus::Success
    }

    /// Called every time the task is popped, regardless of status.
    fn on_end(&mut self, _ctx: &mut TickContext<'_>) {}

    /// Called on every task when the behavior is paused or resumed.
    fn on_pause(&mut self, _paused: bool) {}

    /// Called on every task when the behavior restarts.
    fn on_behavior_restart(&mut self) {}

    /// Called on every task when the behavior is destroyed.
    fn on_behavior_complete(&mut self) {}

    /// Host events fanned out along the active path land here.
    fn on_event(&mut self, _ctx: &mut TickContext<'_>, _event: &dyn Any) {}

    // --- parent surface -----------------------------------------------------

    /// Whether the parent still wants to run a child this step.
    fn can_execute(&self) -> bool {
        false
    }

    /// Ordinal of the child to run next. Only consulted while `can_execute`
    /// returns `true`.
    fn current_child_index(&self) -> usize {
        0
    }

    /// Notification that the child at `ordinal` is about to run.
    fn on_child_started(&mut self, _ordinal: usize) {}

    /// Notification that the child at `ordinal` finished with `status`.
    fn on_child_executed(&mut self, _ordinal: usize, _status: TaskStatus) {}

    /// Decorator remapping of a finished child's status. Serial parents only.
    fn decorate(&self, status: TaskStatus) -> TaskStatus {
        status
    }

    /// Final say over the parent's own reported status; parallel composites
    /// aggregate their children's results here.
    fn override_status(&self, status: TaskStatus) -> TaskStatus {
        status
    }

    /// Parallel-capable parents run each child on its own execution stack.
    fn can_run_parallel_children(&self) -> bool {
        false
    }

    /// Opt-in to being polled by the reevaluation engine every tick even
    /// while not at the top of a stack.
    fn can_reevaluate(&self) -> bool {
        false
    }

    /// Reevaluation gate for composites; return `true` to have the selection
    /// logic re-run off-stack this tick.
    fn on_reevaluation_started(&mut self, _ctx: &mut TickContext<'_>) -> bool {
        false
    }

    /// Outcome of an off-stack selection re-run.
    fn on_reevaluation_ended(&mut self, _status: TaskStatus) {}

    /// A watched conditional under this parent changed status; `ordinal` is
    /// the child branch to resume selection from.
    fn on_conditional_abort(&mut self, _ordinal: usize) {}

    /// Abort policy; meaningful for composites only.
    fn abort_type(&self) -> AbortType {
        AbortType::None
    }

    /// How many children this task may own. Used when splicing multiple
    /// external subtrees under one parent.
    fn max_children(&self) -> usize {
        match self.kind() {
            TaskKind::Composite => usize::MAX,
            TaskKind::Decorator => 1,
            TaskKind::Action | TaskKind::Conditional => 0,
        }
    }
}

/// Blanket implementation so boxed tasks compose transparently.
impl Task for Box<dyn Task> {
    fn kind(&self) -> TaskKind {
        (**self).kind()
    }

    fn is_instant(&self) -> bool {
        (**self).is_instant()
    }

    fn on_attach(&mut self, info: AttachInfo) {
        (**self).on_attach(info)
    }

    fn bind_variables(&mut self, scope: &OverrideScope) {
        (**self).bind_variables(scope)
    }

    fn on_awake(&mut self, ctx: &mut TickContext<'_>) {
        (**self).on_awake(ctx)
    }

    fn on_start(&mut self, ctx: &mut TickContext<'_>) {
        (**self).on_start(ctx)
    }

    fn on_update(&mut self, ctx: &mut TickContext<'_>) -> TaskStatus {
        (**self).on_update(ctx)
    }

    fn on_end(&mut self, ctx: &mut TickContext<'_>) {
        (**self).on_end(ctx)
    }

    fn on_pause(&mut self, paused: bool) {
        (**self).on_pause(paused)
    }

    fn on_behavior_restart(&mut self) {
        (**self).on_behavior_restart()
    }

    fn on_behavior_complete(&mut self) {
        (**self).on_behavior_complete()
    }

    fn on_event(&mut self, ctx: &mut TickContext<'_>, event: &dyn Any) {
        (**self).on_event(ctx, event)
    }

    fn can_execute(&self) -> bool {
        (**self).can_execute()
    }

    fn current_child_index(&self) -> usize {
        (**self).current_child_index()
    }

    fn on_child_started(&mut self, ordinal: usize) {
        (**self).on_child_started(ordinal)
    }

    fn on_child_executed(&mut self, ordinal: usize, status: TaskStatus) {
        (**self).on_child_executed(ordinal, status)
    }

    fn decorate(&self, status: TaskStatus) -> TaskStatus {
        (**self).decorate(status)
    }

    fn override_status(&self, status: TaskStatus) -> TaskStatus {
        (**self).override_status(status)
    }

    fn can_run_parallel_children(&self) -> bool {
        (**self).can_run_parallel_children()
    }

    fn can_reevaluate(&self) -> bool {
        (**self).can_reevaluate()
    }

    fn on_reevaluation_started(&mut self, ctx: &mut TickContext<'_>) -> bool {
        (**self).on_reevaluation_started(ctx)
    }

    fn on_reevaluation_ended(&mut self, status: TaskStatus) {
        (**self).on_reevaluation_ended(status)
    }

    fn on_conditional_abort(&mut self, ordinal: usize) {
        (**self).on_conditional_abort(ordinal)
    }

    fn abort_type(&self) -> AbortType {
        (**self).abort_type()
    }

    fn max_children(&self) -> usize {
        (**self).max_children()
    }
}
