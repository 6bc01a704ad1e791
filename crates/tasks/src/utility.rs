//! Utility-based child selection.

use bt_engine::{AttachInfo, TaskKind, TaskStatus, Task, TickContext};

/// Scoring function evaluated per child when the selector starts.
pub type Scorer = Box<dyn FnMut(&mut TickContext<'_>) -> i64 + Send>;

/// Executes the child with the highest utility score.
///
/// All scorers run when the selector starts; the best-scoring child is
/// committed to and its settled status becomes the selector's own. Children
/// whose score is not positive are never considered; if nothing scores
/// positive the selector fails without running anything.
pub struct UtilitySelector {
    scorers: Vec<Scorer>,
    chosen: Option<usize>,
    last_status: TaskStatus,
}

impl UtilitySelector {
    pub fn new(scorers: Vec<Scorer>) -> Self {
        Self {
            scorers,
            chosen: None,
            last_status: TaskStatus::Inactive,
        }
    }
}

impl Task for UtilitySelector {
    fn kind(&self) -> TaskKind {
        TaskKind::Composite
    }

    fn on_attach(&mut self, info: AttachInfo) {
        // Children past the scorer list can never be selected; truncate the
        // other way around so scores and ordinals line up.
        self.scorers.truncate(info.child_count);
    }

    fn on_start(&mut self, ctx: &mut TickContext<'_>) {
        let mut best: Option<(usize, i64)> = None;
        for (ordinal, scorer) in self.scorers.iter_mut().enumerate() {
            let score = scorer(ctx);
            if score > 0 && best.is_none_or(|(_, top)| score > top) {
                best = Some((ordinal, score));
            }
        }
        self.chosen = best.map(|(ordinal, _)| ordinal);
        self.last_status = TaskStatus::Inactive;
        tracing::trace!(chosen = ?self.chosen, "utility selection");
    }

    fn on_end(&mut self, _ctx: &mut TickContext<'_>) {
        self.chosen = None;
        self.last_status = TaskStatus::Inactive;
    }

    fn can_execute(&self) -> bool {
        self.chosen.is_some() && self.last_status == TaskStatus::Inactive
    }

    fn current_child_index(&self) -> usize {
        self.chosen.unwrap_or(0)
    }

    fn on_child_executed(&mut self, _ordinal: usize, status: TaskStatus) {
        self.last_status = status;
    }

    fn override_status(&self, status: TaskStatus) -> TaskStatus {
        // Nothing scored positive: fail rather than report Inactive.
        if self.chosen.is_none() && status == TaskStatus::Inactive {
            TaskStatus::Failure
        } else {
            status
        }
    }
}
