//! Lifecycle events surfaced to the host.

use crate::behavior::BehaviorId;
use crate::status::TaskStatus;
use crate::task::TaskIndex;

/// Events the manager queues for the host to drain after ticking.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BehaviorEvent {
    /// The behavior compiled and started running.
    Enabled { id: BehaviorId },
    /// The behavior finished or was destroyed, with its final status.
    Disabled { id: BehaviorId, status: TaskStatus },
    /// Stack 0 emptied and the behavior re-pushed its root.
    Restarted { id: BehaviorId },
    /// A task flagged as a breakpoint was pushed; the manager is latched
    /// until the host clears it.
    BreakpointHit { id: BehaviorId, task: TaskIndex },
    /// The per-tick execution ceiling was reached; remaining work was
    /// deferred to the next tick.
    BudgetExceeded { id: BehaviorId, executions: u32 },
}
