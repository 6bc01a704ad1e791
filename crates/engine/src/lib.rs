//! Incremental behavior tree interpreter.
//!
//! This crate executes hierarchical task trees tick by tick: a tree is
//! compiled into a flat, index-addressed structure, advanced by a
//! stack-based scheduler that performs at most one settled step per active
//! branch per tick, and continuously reevaluated so higher-priority
//! conditionals can interrupt running branches mid-tree.
//!
//! # Architecture
//!
//! - [`Task`]: the fixed polymorphic contract every node implements
//! - [`compile`](crate::compile): nested source graph → flattened index arrays
//! - [`BehaviorManager`]: tick scheduler, abort engine, stack lifecycle
//! - [`SubtreeOracle`] / [`VariableSource`]: the external collaborators
//!   supplying stored subtrees and shared-variable storage
//!
//! Task logic itself is supplied externally; the sibling `bt-tasks` crate
//! ships the standard composites, decorators, and leaf wrappers.

pub mod behavior;
pub mod compile;
pub mod config;
pub mod events;
pub mod graph;
pub mod manager;
pub mod status;
pub mod task;
pub mod tree;
pub mod variables;

// Re-export core types for ergonomic API
pub use behavior::{Behavior, BehaviorId};
pub use compile::CompileError;
pub use config::{ExecutionLimit, ManagerConfig};
pub use events::BehaviorEvent;
pub use graph::{GraphBody, GraphNode, NoSubtrees, SubtreeOracle, TaskConfig, TaskGraph};
pub use manager::{BehaviorManager, TaskSummary};
pub use status::{AbortType, TaskKind, TaskStatus};
pub use task::{AttachInfo, Task, TaskIndex, TickContext};
pub use tree::WatchEntry;
pub use variables::{
    OverrideScope, OverrideValue, SharedValue, VarBinding, VariableOverride, VariableSource,
    VariableStore,
};
