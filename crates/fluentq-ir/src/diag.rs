//! Per-operation diagnostics scopes.
//!
//! Each logical operation of the pipeline (parse, compile, execute) runs
//! inside its own tracing span with timing recorded on exit. Scopes are
//! per composition and safe to hold on multiple threads at once; they are
//! best-effort and never influence translation outcomes.

use std::time::Instant;
use tracing::{debug_span, Span};

/// Logical operation of the query pipeline currently in progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryStage {
    Parse,
    Compile,
    Execute,
}

impl QueryStage {
    fn name(&self) -> &'static str {
        match self {
            QueryStage::Parse => "parse",
            QueryStage::Compile => "compile",
            QueryStage::Execute => "execute",
        }
    }
}

/// Guard for a stage scope. Logs elapsed time when dropped.
pub struct StageGuard {
    stage: QueryStage,
    started: Instant,
    span: Span,
}

/// Enters a stage scope for the current composition.
pub fn stage(stage: QueryStage) -> StageGuard {
    let span = debug_span!("query_stage", stage = stage.name());
    StageGuard {
        stage,
        started: Instant::now(),
        span,
    }
}

impl StageGuard {
    /// The span covering this stage, for attaching extra fields.
    pub fn span(&self) -> &Span {
        &self.span
    }
}

impl Drop for StageGuard {
    fn drop(&mut self) {
        let _entered = self.span.enter();
        tracing::debug!(
            stage = self.stage.name(),
            elapsed_ms = self.started.elapsed().as_millis() as u64,
            "stage finished"
        );
    }
}
