//! Leaf tasks: closure-backed actions and conditions, plus a handful of
//! variable-aware leaves that exercise shared-variable bindings.

use bt_engine::{
    OverrideScope, SharedValue, TaskKind, TaskStatus, Task, TickContext, VarBinding,
};

/// Action backed by a closure returning a [`TaskStatus`].
///
/// Instant by default; mark long-running actions non-instant with
/// [`Act::non_instant`] so a settled status is cached and the pop happens on
/// the following tick.
pub struct Act {
    update: Box<dyn FnMut(&mut TickContext<'_>) -> TaskStatus + Send>,
    instant: bool,
}

impl Act {
    pub fn new(update: impl FnMut(&mut TickContext<'_>) -> TaskStatus + Send + 'static) -> Self {
        Self {
            update: Box::new(update),
            instant: true,
        }
    }

    pub fn non_instant(mut self) -> Self {
        self.instant = false;
        self
    }
}

impl Task for Act {
    fn kind(&self) -> TaskKind {
        TaskKind::Action
    }

    fn is_instant(&self) -> bool {
        self.instant
    }

    fn on_update(&mut self, ctx: &mut TickContext<'_>) -> TaskStatus {
        (self.update)(ctx)
    }
}

/// Conditional backed by a boolean closure.
pub struct Condition {
    check: Box<dyn FnMut(&mut TickContext<'_>) -> bool + Send>,
}

impl Condition {
    pub fn new(check: impl FnMut(&mut TickContext<'_>) -> bool + Send + 'static) -> Self {
        Self {
            check: Box::new(check),
        }
    }
}

impl Task for Condition {
    fn kind(&self) -> TaskKind {
        TaskKind::Conditional
    }

    fn on_update(&mut self, ctx: &mut TickContext<'_>) -> TaskStatus {
        if (self.check)(ctx) {
            TaskStatus::Success
        } else {
            TaskStatus::Failure
        }
    }
}

/// Action that stays `Running` for a fixed number of ticks, then succeeds.
pub struct Wait {
    ticks: u64,
    remaining: u64,
}

impl Wait {
    pub fn ticks(ticks: u64) -> Self {
        Self { ticks, remaining: 0 }
    }
}

impl Task for Wait {
    fn kind(&self) -> TaskKind {
        TaskKind::Action
    }

    fn on_start(&mut self, _ctx: &mut TickContext<'_>) {
        self.remaining = self.ticks;
    }

    fn on_update(&mut self, _ctx: &mut TickContext<'_>) -> TaskStatus {
        if self.remaining == 0 {
            TaskStatus::Success
        } else {
            self.remaining -= 1;
            TaskStatus::Running
        }
    }
}

/// Conditional that succeeds while a bound shared variable is truthy.
///
/// The binding participates in compile-time override resolution, so a
/// subtree spliced with an override sees the enclosing tree's variable.
pub struct VarCondition {
    binding: VarBinding,
}

impl VarCondition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            binding: VarBinding::name(name),
        }
    }
}

impl Task for VarCondition {
    fn kind(&self) -> TaskKind {
        TaskKind::Conditional
    }

    fn bind_variables(&mut self, scope: &OverrideScope) {
        scope.rebind(&mut self.binding);
    }

    fn on_update(&mut self, ctx: &mut TickContext<'_>) -> TaskStatus {
        let truthy = self
            .binding
            .get(ctx.variables)
            .and_then(|value| value.as_bool())
            .unwrap_or(false);
        if truthy {
            TaskStatus::Success
        } else {
            TaskStatus::Failure
        }
    }
}

/// Action that writes a constant into a bound shared variable and succeeds.
pub struct SetVar {
    binding: VarBinding,
    value: SharedValue,
}

impl SetVar {
    pub fn new(name: impl Into<String>, value: impl Into<SharedValue>) -> Self {
        Self {
            binding: VarBinding::name(name),
            value: value.into(),
        }
    }
}

impl Task for SetVar {
    fn kind(&self) -> TaskKind {
        TaskKind::Action
    }

    fn bind_variables(&mut self, scope: &OverrideScope) {
        scope.rebind(&mut self.binding);
    }

    fn on_update(&mut self, ctx: &mut TickContext<'_>) -> TaskStatus {
        self.binding.set(ctx.variables, self.value.clone());
        TaskStatus::Success
    }
}
