//! Scheduler behavior end to end: enabling, stepping, budgets, lifecycle.
//!
//! These tests drive the manager with small purpose-built tasks so every
//! assertion is about scheduler behavior, not library composites.

use std::sync::{Arc, Mutex};

use bt_engine::{
    AttachInfo, Behavior, BehaviorEvent, BehaviorManager, GraphNode, ManagerConfig, TaskGraph,
    TaskKind, TaskStatus, Task, TickContext,
};

type Log = Arc<Mutex<Vec<String>>>;

fn log(log: &Log, entry: impl Into<String>) {
    log.lock().unwrap().push(entry.into());
}

fn entries(log: &Log) -> Vec<String> {
    log.lock().unwrap().clone()
}

fn count_of(log: &Log, entry: &str) -> usize {
    log.lock().unwrap().iter().filter(|e| *e == entry).count()
}

/// Action that walks a scripted status sequence, logging its lifecycle.
struct Scripted {
    name: &'static str,
    script: Vec<TaskStatus>,
    at: usize,
    instant: bool,
    log: Log,
}

impl Scripted {
    fn new(name: &'static str, script: Vec<TaskStatus>, log: &Log) -> Self {
        Self {
            name,
            script,
            at: 0,
            instant: true,
            log: log.clone(),
        }
    }

    fn non_instant(mut self) -> Self {
        self.instant = false;
        self
    }
}

impl Task for Scripted {
    fn kind(&self) -> TaskKind {
        TaskKind::Action
    }

    fn is_instant(&self) -> bool {
        self.instant
    }

    fn on_start(&mut self, _ctx: &mut TickContext<'_>) {
        log(&self.log, format!("start {}", self.name));
    }

    fn on_update(&mut self, _ctx: &mut TickContext<'_>) -> TaskStatus {
        log(&self.log, format!("update {}", self.name));
        let status = self.script[self.at.min(self.script.len() - 1)];
        self.at += 1;
        status
    }

    fn on_end(&mut self, _ctx: &mut TickContext<'_>) {
        log(&self.log, format!("end {}", self.name));
    }

    fn on_pause(&mut self, paused: bool) {
        log(&self.log, format!("pause({paused}) {}", self.name));
    }

    fn on_behavior_restart(&mut self) {
        log(&self.log, format!("restart {}", self.name));
    }

    fn on_behavior_complete(&mut self) {
        log(&self.log, format!("complete {}", self.name));
    }

    fn on_event(&mut self, _ctx: &mut TickContext<'_>, event: &dyn std::any::Any) {
        if let Some(tag) = event.downcast_ref::<&str>() {
            log(&self.log, format!("event({tag}) {}", self.name));
        }
    }
}

/// Minimal fail-fast sequence, enough to exercise child driving.
struct SeqLite {
    child_count: usize,
    current: usize,
    last: TaskStatus,
}

impl SeqLite {
    fn new() -> Self {
        Self {
            child_count: 0,
            current: 0,
            last: TaskStatus::Inactive,
        }
    }
}

impl Task for SeqLite {
    fn kind(&self) -> TaskKind {
        TaskKind::Composite
    }

    fn on_attach(&mut self, info: AttachInfo) {
        self.child_count = info.child_count;
    }

    fn on_start(&mut self, _ctx: &mut TickContext<'_>) {
        self.current = 0;
        self.last = TaskStatus::Inactive;
    }

    fn on_end(&mut self, _ctx: &mut TickContext<'_>) {
        self.current = 0;
        self.last = TaskStatus::Inactive;
    }

    fn can_execute(&self) -> bool {
        self.current < self.child_count && self.last != TaskStatus::Failure
    }

    fn current_child_index(&self) -> usize {
        self.current
    }

    fn on_child_executed(&mut self, _ordinal: usize, status: TaskStatus) {
        self.current += 1;
        self.last = status;
    }
}

fn graph(root: GraphNode) -> TaskGraph {
    TaskGraph::new("test", root)
}

#[test]
fn single_action_root_completes_in_one_tick() {
    let trace: Log = Default::default();
    let mut manager = BehaviorManager::default();
    let id = manager
        .enable(Behavior::new(graph(GraphNode::leaf(
            "act",
            Scripted::new("act", vec![TaskStatus::Success], &trace),
        ))))
        .unwrap();

    manager.tick();

    assert!(!manager.is_enabled(id));
    assert_eq!(count_of(&trace, "start act"), 1);
    assert_eq!(count_of(&trace, "end act"), 1);
    let events = manager.drain_events();
    assert_eq!(events[0], BehaviorEvent::Enabled { id });
    assert_eq!(
        *events.last().unwrap(),
        BehaviorEvent::Disabled {
            id,
            status: TaskStatus::Success
        }
    );
}

#[test]
fn sequence_fails_fast_with_single_start_end_per_child() {
    let trace: Log = Default::default();
    let mut manager = BehaviorManager::default();
    let id = manager
        .enable(Behavior::new(graph(GraphNode::parent(
            "root",
            SeqLite::new(),
            vec![
                GraphNode::leaf("a", Scripted::new("a", vec![TaskStatus::Success], &trace)),
                GraphNode::leaf("b", Scripted::new("b", vec![TaskStatus::Success], &trace)),
                GraphNode::leaf("c", Scripted::new("c", vec![TaskStatus::Failure], &trace)),
            ],
        ))))
        .unwrap();

    while manager.is_enabled(id) {
        manager.tick();
    }

    for name in ["a", "b", "c"] {
        assert_eq!(count_of(&trace, &format!("start {name}")), 1, "{name}");
        assert_eq!(count_of(&trace, &format!("end {name}")), 1, "{name}");
    }
    assert!(matches!(
        manager.drain_events().last(),
        Some(BehaviorEvent::Disabled {
            status: TaskStatus::Failure,
            ..
        })
    ));
}

#[test]
fn non_instant_task_pops_with_cached_status_next_tick() {
    let trace: Log = Default::default();
    let mut manager = BehaviorManager::default();
    let id = manager
        .enable(Behavior::new(graph(GraphNode::leaf(
            "slow",
            Scripted::new("slow", vec![TaskStatus::Running, TaskStatus::Success], &trace)
                .non_instant(),
        ))))
        .unwrap();

    manager.tick(); // Running
    assert!(manager.is_enabled(id));
    manager.tick(); // settles to Success, pop deferred
    assert!(manager.is_enabled(id));
    manager.tick(); // pops with the cached status, no third update
    assert!(!manager.is_enabled(id));

    assert_eq!(count_of(&trace, "update slow"), 2);
    assert_eq!(count_of(&trace, "end slow"), 1);
}

#[test]
fn execution_budget_defers_and_reports_without_failing() {
    let trace: Log = Default::default();
    let mut manager = BehaviorManager::new(ManagerConfig::counted(3));
    let names = ["a", "b", "c", "d", "e"];
    let id = manager
        .enable(Behavior::new(graph(GraphNode::parent(
            "root",
            SeqLite::new(),
            names
                .iter()
                .map(|name| {
                    GraphNode::leaf(*name, Scripted::new(name, vec![TaskStatus::Success], &trace))
                })
                .collect(),
        ))))
        .unwrap();

    manager.tick();
    assert!(
        manager
            .drain_events()
            .iter()
            .any(|event| matches!(event, BehaviorEvent::BudgetExceeded { .. }))
    );
    assert!(manager.is_enabled(id));

    while manager.is_enabled(id) {
        manager.tick();
    }

    // Every child ran exactly once, in authored order.
    let starts: Vec<String> = entries(&trace)
        .into_iter()
        .filter(|entry| entry.starts_with("start "))
        .collect();
    assert_eq!(
        starts,
        names.iter().map(|n| format!("start {n}")).collect::<Vec<_>>()
    );
}

#[test]
fn disabled_child_is_skipped_and_reports_inactive() {
    let trace: Log = Default::default();
    let mut manager = BehaviorManager::default();
    let id = manager
        .enable(Behavior::new(graph(GraphNode::parent(
            "root",
            SeqLite::new(),
            vec![
                GraphNode::leaf(
                    "skipped",
                    Scripted::new("skipped", vec![TaskStatus::Failure], &trace),
                )
                .disabled(),
                GraphNode::leaf("b", Scripted::new("b", vec![TaskStatus::Success], &trace)),
            ],
        ))))
        .unwrap();

    while manager.is_enabled(id) {
        manager.tick();
    }

    assert_eq!(count_of(&trace, "start skipped"), 0);
    assert_eq!(count_of(&trace, "update skipped"), 0);
    assert_eq!(count_of(&trace, "start b"), 1);
    assert!(matches!(
        manager.drain_events().last(),
        Some(BehaviorEvent::Disabled {
            status: TaskStatus::Success,
            ..
        })
    ));
}

#[test]
fn restart_notifies_every_task_once_and_keeps_running() {
    let trace: Log = Default::default();
    let mut manager = BehaviorManager::default();
    let id = manager
        .enable(Behavior::new(graph(GraphNode::parent(
            "root",
            SeqLite::new(),
            vec![GraphNode::leaf(
                "busy",
                Scripted::new("busy", vec![TaskStatus::Running], &trace),
            )],
        ))))
        .unwrap();

    manager.tick();
    manager.restart(id);

    assert!(manager.is_enabled(id));
    assert_eq!(count_of(&trace, "restart busy"), 1);
    assert!(
        manager
            .drain_events()
            .iter()
            .any(|event| matches!(event, BehaviorEvent::Restarted { .. }))
    );
    // The unwound action closed exactly once and resumes on the next tick.
    assert_eq!(count_of(&trace, "end busy"), 1);
    manager.tick();
    assert_eq!(count_of(&trace, "start busy"), 2);
}

#[test]
fn pause_and_resume_fan_out_and_freeze_execution() {
    let trace: Log = Default::default();
    let mut manager = BehaviorManager::default();
    let id = manager
        .enable(Behavior::new(graph(GraphNode::leaf(
            "busy",
            Scripted::new("busy", vec![TaskStatus::Running], &trace),
        ))))
        .unwrap();

    manager.tick();
    let updates_before = count_of(&trace, "update busy");

    manager.disable_with(id, true, TaskStatus::Success);
    assert!(!manager.is_enabled(id));
    assert_eq!(manager.status(id), Some(TaskStatus::Inactive));
    assert_eq!(count_of(&trace, "pause(true) busy"), 1);

    manager.tick();
    manager.tick();
    assert_eq!(count_of(&trace, "update busy"), updates_before);

    assert!(manager.resume(id));
    assert_eq!(count_of(&trace, "pause(false) busy"), 1);
    manager.tick();
    assert!(count_of(&trace, "update busy") > updates_before);
}

#[test]
fn destroy_unwinds_and_fans_out_completion() {
    let trace: Log = Default::default();
    let mut manager = BehaviorManager::default();
    let id = manager
        .enable(Behavior::new(graph(GraphNode::parent(
            "root",
            SeqLite::new(),
            vec![GraphNode::leaf(
                "busy",
                Scripted::new("busy", vec![TaskStatus::Running], &trace),
            )],
        ))))
        .unwrap();

    manager.tick();
    manager.destroy_with(id, TaskStatus::Failure);

    assert!(!manager.is_enabled(id));
    assert_eq!(count_of(&trace, "end busy"), 1);
    assert_eq!(count_of(&trace, "complete busy"), 1);
    assert!(matches!(
        manager.drain_events().last(),
        Some(BehaviorEvent::Disabled {
            status: TaskStatus::Failure,
            ..
        })
    ));
}

#[test]
fn breakpoint_latches_the_manager_until_cleared() {
    let trace: Log = Default::default();
    let mut manager = BehaviorManager::default();
    let id = manager
        .enable(Behavior::new(graph(GraphNode::parent(
            "root",
            SeqLite::new(),
            vec![
                GraphNode::leaf("a", Scripted::new("a", vec![TaskStatus::Success], &trace)),
                GraphNode::leaf("b", Scripted::new("b", vec![TaskStatus::Success], &trace))
                    .breakpoint(),
            ],
        ))))
        .unwrap();

    manager.tick();
    assert_eq!(manager.breakpoint(), Some(id));
    assert!(
        manager
            .drain_events()
            .iter()
            .any(|event| matches!(event, BehaviorEvent::BreakpointHit { task: 2, .. }))
    );
    // Latched: b was pushed but never updated.
    assert_eq!(count_of(&trace, "start b"), 1);
    assert_eq!(count_of(&trace, "update b"), 0);

    manager.tick();
    assert_eq!(count_of(&trace, "update b"), 0);

    manager.clear_breakpoint();
    while manager.is_enabled(id) {
        manager.tick();
    }
    assert_eq!(count_of(&trace, "update b"), 1);
}

#[test]
fn interrupt_unwinds_with_forced_failure() {
    let trace: Log = Default::default();
    let mut manager = BehaviorManager::default();
    let id = manager
        .enable(Behavior::new(graph(GraphNode::parent(
            "root",
            SeqLite::new(),
            vec![GraphNode::leaf(
                "busy",
                Scripted::new("busy", vec![TaskStatus::Running], &trace),
            )],
        ))))
        .unwrap();

    manager.tick();
    manager.interrupt(id, 0);
    manager.tick();

    assert!(!manager.is_enabled(id));
    assert_eq!(count_of(&trace, "end busy"), 1);
    assert!(matches!(
        manager.drain_events().last(),
        Some(BehaviorEvent::Disabled {
            status: TaskStatus::Failure,
            ..
        })
    ));
}

#[test]
fn events_fan_out_to_the_active_path() {
    let trace: Log = Default::default();
    let mut manager = BehaviorManager::default();
    let id = manager
        .enable(Behavior::new(graph(GraphNode::parent(
            "root",
            SeqLite::new(),
            vec![GraphNode::leaf(
                "busy",
                Scripted::new("busy", vec![TaskStatus::Running], &trace),
            )],
        ))))
        .unwrap();

    manager.tick();
    manager.dispatch_event(id, &"ping");

    assert_eq!(count_of(&trace, "event(ping) busy"), 1);
}

#[test]
fn flattened_task_queries_describe_the_tree() {
    let trace: Log = Default::default();
    let mut manager = BehaviorManager::default();
    let id = manager
        .enable(Behavior::new(graph(GraphNode::parent(
            "root",
            SeqLite::new(),
            vec![
                GraphNode::leaf("first", Scripted::new("first", vec![TaskStatus::Running], &trace)),
                GraphNode::leaf("second", Scripted::new("second", vec![TaskStatus::Success], &trace)),
            ],
        ))))
        .unwrap();

    manager.tick();

    let summaries = manager.task_summaries(id).unwrap();
    assert_eq!(summaries.len(), 3);
    assert_eq!(summaries[0].parent, None);
    assert_eq!(summaries[1].parent, Some(0));
    assert_eq!(summaries[1].kind, TaskKind::Action);

    assert_eq!(manager.find_task_by_name(id, "second"), Some(2));
    assert_eq!(manager.active_leaf_tasks(id), vec![1]);
}
