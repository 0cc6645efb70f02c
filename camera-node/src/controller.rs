//! Owns the one active pipeline run and replaces it on request.

use std::sync::Arc;
use std::time::Duration;

use hls_server::RestartRequest;
use stream_pipeline::{PipelineError, PipelinePlan, PipelineState, PipelineSupervisor};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::cli::FailurePolicy;

/// Pause between tearing a run down and starting the next, giving the
/// camera device time to be released.
pub const RESTART_DELAY: Duration = Duration::from_secs(3);

type RunHandle = JoinHandle<Result<(), PipelineError>>;

enum Event {
    Shutdown,
    Restart(RestartRequest),
    Finished(Result<(), PipelineError>),
}

/// Runs pipelines one after another.
///
/// Every run gets a fresh [`PipelineSupervisor`] built from a freshly
/// resolved plan, so saved settings take effect on the next restart.
pub struct Controller<F> {
    build_plan: F,
    policy: FailurePolicy,
    restarts: mpsc::Receiver<RestartRequest>,
    restart_delay: Duration,
}

impl<F> Controller<F>
where
    F: FnMut() -> PipelinePlan,
{
    pub fn new(build_plan: F, policy: FailurePolicy, restarts: mpsc::Receiver<RestartRequest>) -> Self {
        Self {
            build_plan,
            policy,
            restarts,
            restart_delay: RESTART_DELAY,
        }
    }

    pub fn with_restart_delay(mut self, delay: Duration) -> Self {
        self.restart_delay = delay;
        self
    }

    /// Run until `shutdown` fires, or until a pipeline fails under
    /// [`FailurePolicy::Exit`], in which case that failure is returned.
    pub async fn run(mut self, shutdown: CancellationToken) -> Result<(), PipelineError> {
        let mut first = true;

        loop {
            if !first {
                tokio::select! {
                    biased;
                    _ = shutdown.cancelled() => return Ok(()),
                    _ = tokio::time::sleep(self.restart_delay) => {}
                }
            }
            first = false;

            let supervisor = Arc::new(PipelineSupervisor::new((self.build_plan)()));
            let mut run: RunHandle = {
                let supervisor = supervisor.clone();
                tokio::spawn(async move { supervisor.start().await })
            };

            let event = tokio::select! {
                biased;
                _ = shutdown.cancelled() => Event::Shutdown,
                Some(request) = self.restarts.recv() => Event::Restart(request),
                result = &mut run => Event::Finished(flatten(result)),
            };

            match event {
                Event::Shutdown => {
                    tracing::info!("Shutting down pipeline");
                    stop_and_join(&supervisor, run).await;
                    return Ok(());
                }
                Event::Restart(request) => {
                    tracing::info!("Restart request received ({:?})", request);
                    stop_and_join(&supervisor, run).await;
                }
                Event::Finished(Ok(())) => {
                    tracing::warn!("Pipeline stopped without a request, restarting");
                }
                Event::Finished(Err(e)) => match self.policy {
                    FailurePolicy::Exit => return Err(e),
                    FailurePolicy::Wait => {
                        tracing::error!("Pipeline down: {}. Waiting for a restart request", e);
                        tokio::select! {
                            biased;
                            _ = shutdown.cancelled() => return Ok(()),
                            request = self.restarts.recv() => match request {
                                Some(request) => tracing::info!("Restart request received ({:?})", request),
                                // Nobody can ask for a restart any more
                                None => return Err(e),
                            },
                        }
                    }
                },
            }
        }
    }
}

/// Stop a run and wait for every process of it to be gone.
async fn stop_and_join(supervisor: &PipelineSupervisor, run: RunHandle) {
    // stop() ignores an Idle supervisor, so let the run claim it first
    let mut state = supervisor.subscribe();
    if state.wait_for(|s| *s != PipelineState::Idle).await.is_err() {
        tracing::debug!("Supervisor state channel closed");
    }
    supervisor.stop();

    match flatten(run.await) {
        Ok(()) => {}
        Err(e) => tracing::warn!("Pipeline ended with error while stopping: {}", e),
    }
}

fn flatten(result: Result<Result<(), PipelineError>, tokio::task::JoinError>) -> Result<(), PipelineError> {
    result.unwrap_or_else(|e| {
        Err(PipelineError::ProcessWait {
            name: "supervisor".to_string(),
            reason: e.to_string(),
        })
    })
}
