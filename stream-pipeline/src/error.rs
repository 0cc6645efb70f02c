use std::process::ExitStatus;

use thiserror::Error;

/// Errors surfaced by a pipeline run.
///
/// Cloneable so the first failure of a run can be handed back from the
/// shared cell it is recorded in; OS errors are kept as their messages.
#[derive(Debug, Clone, Error)]
pub enum PipelineError {
    #[error("Failed to launch {name} ({program}): {reason}")]
    Launch {
        name: String,
        program: String,
        reason: String,
    },

    #[error("{name} exited unexpectedly with {status}")]
    ProcessExited { name: String, status: ExitStatus },

    #[error("Failed to wait for {name}: {reason}")]
    ProcessWait { name: String, reason: String },

    #[error("Fan-out pipe failed: {0}")]
    Fanout(String),

    #[error("Failed to prepare {path}: {reason}")]
    Prepare { path: String, reason: String },

    #[error("Pipeline already started")]
    AlreadyStarted,
}
