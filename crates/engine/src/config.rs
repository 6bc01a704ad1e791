//! Manager configuration.

/// Per-tick execution ceiling for one tree.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ExecutionLimit {
    /// Stop a branch as soon as the same child ordinal would be selected
    /// twice in a row without progress.
    NoDuplicates,
    /// Stop the whole tree once this many task pushes happened this tick.
    /// Remaining work is deferred to the next tick and a budget-exceeded
    /// event is reported.
    Count(u32),
}

impl Default for ExecutionLimit {
    fn default() -> Self {
        ExecutionLimit::NoDuplicates
    }
}

/// Scheduler configuration shared by every tree a manager owns.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ManagerConfig {
    pub execution_limit: ExecutionLimit,
}

impl ManagerConfig {
    pub fn counted(max_executions: u32) -> Self {
        Self {
            execution_limit: ExecutionLimit::Count(max_executions),
        }
    }
}
