//! Standard task library for `bt-engine`.
//!
//! Composites, decorators, and closure-backed leaves implementing the
//! engine's polymorphic task contract, plus builder helpers that assemble
//! them into source graphs.

pub mod builder;
pub mod composites;
pub mod decorators;
pub mod leaves;
pub mod utility;

// Re-export the task types for direct construction
pub use composites::{Parallel, RandomSelector, Selector, Sequence};
pub use decorators::{Failer, Guard, Inverter, Repeater, Succeeder, UntilFailure};
pub use leaves::{Act, Condition, SetVar, VarCondition, Wait};
pub use utility::{Scorer, UtilitySelector};
