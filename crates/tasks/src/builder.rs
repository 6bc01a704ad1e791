//! Builder utilities for ergonomic tree construction.
//!
//! Free functions wrapping the standard tasks into [`GraphNode`]s, so a tree
//! reads as structure instead of boilerplate:
//!
//! ```rust,ignore
//! use bt_tasks::builder::*;
//!
//! let tree = selector(vec![
//!     sequence(vec![
//!         condition("enemy-close", |ctx| enemy_close(ctx)),
//!         action("attack", |ctx| attack(ctx)),
//!     ]),
//!     subtree("patrol"),
//! ]);
//! ```

use bt_engine::{
    AbortType, GraphNode, TaskStatus, TickContext, VariableOverride,
};

use crate::composites::{Parallel, RandomSelector, Selector, Sequence};
use crate::decorators::{Failer, Guard, Inverter, Repeater, Succeeder, UntilFailure};
use crate::leaves::{Act, Condition, SetVar, VarCondition, Wait};
use crate::utility::{Scorer, UtilitySelector};

pub fn sequence(children: Vec<GraphNode>) -> GraphNode {
    GraphNode::parent("Sequence", Sequence::new(), children)
}

pub fn sequence_with_abort(abort: AbortType, children: Vec<GraphNode>) -> GraphNode {
    GraphNode::parent("Sequence", Sequence::with_abort(abort), children)
}

pub fn selector(children: Vec<GraphNode>) -> GraphNode {
    GraphNode::parent("Selector", Selector::new(), children)
}

pub fn selector_with_abort(abort: AbortType, children: Vec<GraphNode>) -> GraphNode {
    GraphNode::parent("Selector", Selector::with_abort(abort), children)
}

pub fn parallel(children: Vec<GraphNode>) -> GraphNode {
    GraphNode::parent("Parallel", Parallel::new(), children)
}

pub fn random_selector(seed: u64, children: Vec<GraphNode>) -> GraphNode {
    GraphNode::parent("RandomSelector", RandomSelector::new(seed), children)
}

pub fn utility_selector(scorers: Vec<Scorer>, children: Vec<GraphNode>) -> GraphNode {
    GraphNode::parent("UtilitySelector", UtilitySelector::new(scorers), children)
}

pub fn invert(child: GraphNode) -> GraphNode {
    GraphNode::parent("Inverter", Inverter::new(), vec![child])
}

pub fn succeed(child: GraphNode) -> GraphNode {
    GraphNode::parent("Succeeder", Succeeder::new(), vec![child])
}

pub fn fail(child: GraphNode) -> GraphNode {
    GraphNode::parent("Failer", Failer::new(), vec![child])
}

pub fn repeat(count: u64, child: GraphNode) -> GraphNode {
    GraphNode::parent("Repeater", Repeater::times(count), vec![child])
}

pub fn until_failure(child: GraphNode) -> GraphNode {
    GraphNode::parent("UntilFailure", UntilFailure::new(), vec![child])
}

pub fn guard(
    name: impl Into<String>,
    predicate: impl FnMut(&mut TickContext<'_>) -> bool + Send + 'static,
    child: GraphNode,
) -> GraphNode {
    GraphNode::parent(name, Guard::new(predicate), vec![child])
}

pub fn action(
    name: impl Into<String>,
    update: impl FnMut(&mut TickContext<'_>) -> TaskStatus + Send + 'static,
) -> GraphNode {
    GraphNode::leaf(name, Act::new(update))
}

/// An action whose settled status is cached and popped on the next tick.
pub fn latched_action(
    name: impl Into<String>,
    update: impl FnMut(&mut TickContext<'_>) -> TaskStatus + Send + 'static,
) -> GraphNode {
    GraphNode::leaf(name, Act::new(update).non_instant())
}

pub fn condition(
    name: impl Into<String>,
    check: impl FnMut(&mut TickContext<'_>) -> bool + Send + 'static,
) -> GraphNode {
    GraphNode::leaf(name, Condition::new(check))
}

pub fn wait(ticks: u64) -> GraphNode {
    GraphNode::leaf("Wait", Wait::ticks(ticks))
}

pub fn var_condition(name: impl Into<String>) -> GraphNode {
    let name = name.into();
    GraphNode::leaf(name.clone(), VarCondition::new(name))
}

pub fn set_var(
    name: impl Into<String>,
    value: impl Into<bt_engine::SharedValue>,
) -> GraphNode {
    let name = name.into();
    GraphNode::leaf(format!("set {name}"), SetVar::new(name, value))
}

pub fn subtree(name: impl Into<String>) -> GraphNode {
    GraphNode::reference(name)
}

pub fn subtree_with(
    names: Vec<String>,
    overrides: Vec<VariableOverride>,
) -> GraphNode {
    GraphNode::references(names, overrides)
}
