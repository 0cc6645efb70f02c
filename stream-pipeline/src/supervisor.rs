use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use tokio::process::ChildStdout;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::capture::CaptureConfig;
use crate::commands::{archive_command, capture_command, live_command, Toolchain};
use crate::error::PipelineError;
use crate::fanout::FanoutPipe;
use crate::process::{ManagedProcess, ProcessOutcome, ProcessSpec};

/// Lifecycle of one supervisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Starting,
    Running,
    Stopping,
    Stopped,
}

/// Where the consumers write; `None` disables that consumer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineOutputs {
    pub archive_dir: Option<PathBuf>,
    pub live_dir: Option<PathBuf>,
}

/// Everything needed to launch one pipeline run.
#[derive(Debug, Clone)]
pub struct PipelinePlan {
    pub capture: ProcessSpec,
    pub consumers: Vec<ProcessSpec>,
    /// Directories emptied before any process starts
    pub clear_dirs: Vec<PathBuf>,
}

impl PipelinePlan {
    pub fn new(capture: ProcessSpec) -> Self {
        Self {
            capture,
            consumers: Vec::new(),
            clear_dirs: Vec::new(),
        }
    }

    pub fn with_consumer(mut self, consumer: ProcessSpec) -> Self {
        self.consumers.push(consumer);
        self
    }

    pub fn clearing(mut self, dir: impl Into<PathBuf>) -> Self {
        self.clear_dirs.push(dir.into());
        self
    }

    /// Camera capture feeding the archive and live consumers.
    pub fn for_camera(config: &CaptureConfig, outputs: &PipelineOutputs, tools: &Toolchain) -> Self {
        let mut plan = Self::new(capture_command(tools, config));

        if let Some(dir) = &outputs.archive_dir {
            plan = plan.with_consumer(archive_command(tools, config, dir));
        }
        if let Some(dir) = &outputs.live_dir {
            plan = plan
                .with_consumer(live_command(tools, config, dir))
                .clearing(dir.clone());
        }

        plan
    }
}

/// Final outcome of one process of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessReport {
    pub name: String,
    pub outcome: ProcessOutcome,
}

/// Single-assignment cell holding the first failure of a run.
///
/// Recording a failure also cancels the run's group token, which is what
/// tells every other process to shut down.
struct FirstFailure {
    error: OnceLock<PipelineError>,
    group: CancellationToken,
}

impl FirstFailure {
    fn new(group: CancellationToken) -> Self {
        Self {
            error: OnceLock::new(),
            group,
        }
    }

    fn record(&self, error: PipelineError) {
        match self.error.set(error) {
            Ok(()) => {
                if let Some(first) = self.error.get() {
                    tracing::error!("Pipeline failure: {}", first);
                }
            }
            Err(later) => tracing::debug!("Ignoring later pipeline failure: {}", later),
        }
        self.group.cancel();
    }

    fn get(&self) -> Option<PipelineError> {
        self.error.get().cloned()
    }
}

/// Supervises one capture process and its consumers as a unit.
///
/// A supervisor runs at most once: `start()` moves it from `Idle` through
/// `Running` to `Stopped` and returns when every child has been killed or
/// has exited. Restarting means building a new supervisor.
///
/// ```text
/// capture --stdout--> FanoutPipe --stdin--> archive
///                               \--stdin--> live
/// ```
pub struct PipelineSupervisor {
    plan: PipelinePlan,
    state: watch::Sender<PipelineState>,
    shutdown: CancellationToken,
    reports: Mutex<Vec<ProcessReport>>,
}

impl PipelineSupervisor {
    pub fn new(plan: PipelinePlan) -> Self {
        let (state, _) = watch::channel(PipelineState::Idle);
        Self {
            plan,
            state,
            shutdown: CancellationToken::new(),
            reports: Mutex::new(Vec::new()),
        }
    }

    pub fn state(&self) -> PipelineState {
        *self.state.borrow()
    }

    /// Observe state transitions.
    pub fn subscribe(&self) -> watch::Receiver<PipelineState> {
        self.state.subscribe()
    }

    /// Per-process outcomes of the finished run (empty until `start()` returns).
    pub async fn reports(&self) -> Vec<ProcessReport> {
        self.reports.lock().await.clone()
    }

    /// Request an orderly shutdown of the running pipeline.
    ///
    /// A no-op on a supervisor that has not been started.
    pub fn stop(&self) {
        if self.state() == PipelineState::Idle {
            tracing::debug!("Stop requested on idle pipeline, ignoring");
            return;
        }
        tracing::info!("Stopping pipeline");
        self.shutdown.cancel();
    }

    /// Run the pipeline until a child fails or `stop()` is called.
    ///
    /// Returns the first failure, or `Ok(())` after a clean stop. A second
    /// call is rejected with [`PipelineError::AlreadyStarted`].
    pub async fn start(&self) -> Result<(), PipelineError> {
        let claimed = self.state.send_if_modified(|state| {
            if *state == PipelineState::Idle {
                *state = PipelineState::Starting;
                true
            } else {
                false
            }
        });
        if !claimed {
            return Err(PipelineError::AlreadyStarted);
        }

        tracing::info!("Starting pipeline: {}", self.plan.capture.command_line());
        let result = self.run().await;
        self.state.send_replace(PipelineState::Stopped);

        match &result {
            Ok(()) => tracing::info!("Pipeline stopped"),
            Err(e) => tracing::warn!("Pipeline stopped with error: {}", e),
        }
        result
    }

    async fn run(&self) -> Result<(), PipelineError> {
        for dir in &self.plan.clear_dirs {
            clear_dir(dir).await?;
        }

        // Stop cancels the group through the parent token, a failure cancels it directly
        let group = self.shutdown.child_token();
        let failure = Arc::new(FirstFailure::new(group.clone()));

        let capture_spec = if self.plan.consumers.is_empty() {
            self.plan.capture.clone()
        } else {
            self.plan.capture.clone().piped_stdout()
        };

        let mut capture = ManagedProcess::start(&capture_spec)?;
        let capture_out = capture.take_stdout();

        let mut consumers = Vec::with_capacity(self.plan.consumers.len());
        let mut launch_error = None;
        for spec in &self.plan.consumers {
            match ManagedProcess::start(&spec.clone().piped_stdin()) {
                Ok(process) => consumers.push(process),
                Err(e) => {
                    launch_error = Some(e);
                    break;
                }
            }
        }

        if let Some(e) = launch_error {
            self.abort_launch(capture, consumers).await;
            return Err(e);
        }

        let mut fanout = FanoutPipe::new();
        for consumer in consumers.iter_mut() {
            if let Some(stdin) = consumer.take_stdin() {
                fanout.add_sink(consumer.name().to_string(), stdin);
            }
        }

        let consumer_tasks: Vec<(String, JoinHandle<ProcessReport>)> = consumers
            .into_iter()
            .map(|process| {
                let name = process.name().to_string();
                let task = tokio::spawn(supervise(process, group.clone(), failure.clone()));
                (name, task)
            })
            .collect();

        let consumers_down = CancellationToken::new();
        let pump_task = match capture_out {
            Some(source) if fanout.open_sinks() > 0 => Some(tokio::spawn(pump(
                fanout,
                source,
                group.clone(),
                consumers_down.clone(),
                failure.clone(),
            ))),
            _ => None,
        };

        let capture_name = capture.name().to_string();
        let capture_task = tokio::spawn(supervise(capture, group.clone(), failure.clone()));

        self.state.send_replace(PipelineState::Running);
        tracing::info!("Pipeline running");

        group.cancelled().await;
        self.state.send_replace(PipelineState::Stopping);

        // Consumers go down before their stdin is closed
        let mut reports = Vec::with_capacity(consumer_tasks.len() + 1);
        for (name, task) in consumer_tasks {
            reports.push(join_report(name, task).await);
        }
        consumers_down.cancel();

        if let Some(task) = pump_task {
            if let Err(e) = task.await {
                tracing::warn!("Fan-out task failed: {}", e);
            }
        }

        reports.insert(0, join_report(capture_name, capture_task).await);
        *self.reports.lock().await = reports;

        match failure.get() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    /// Kill everything launched so far after a launch error.
    async fn abort_launch(&self, mut capture: ManagedProcess, consumers: Vec<ManagedProcess>) {
        let mut reports = Vec::with_capacity(consumers.len() + 1);

        for mut process in consumers {
            kill_quietly(&mut process).await;
            reports.push(ProcessReport {
                name: process.name().to_string(),
                outcome: ProcessOutcome::Killed,
            });
        }

        kill_quietly(&mut capture).await;
        reports.insert(
            0,
            ProcessReport {
                name: capture.name().to_string(),
                outcome: ProcessOutcome::Killed,
            },
        );

        *self.reports.lock().await = reports;
    }
}

/// Wait for one process, or kill it once the group is cancelled.
async fn supervise(
    mut process: ManagedProcess,
    group: CancellationToken,
    failure: Arc<FirstFailure>,
) -> ProcessReport {
    let waited = tokio::select! {
        biased;
        _ = group.cancelled() => None,
        result = process.wait() => Some(result),
    };

    let name = process.name().to_string();
    let outcome = match waited {
        None => {
            kill_quietly(&mut process).await;
            ProcessOutcome::Killed
        }
        Some(Ok(status)) => {
            failure.record(PipelineError::ProcessExited {
                name: name.clone(),
                status,
            });
            ProcessOutcome::Exited(status)
        }
        Some(Err(e)) => {
            failure.record(PipelineError::ProcessWait {
                name: name.clone(),
                reason: e.to_string(),
            });
            ProcessOutcome::WaitFailed(e.to_string())
        }
    };

    tracing::info!("{} {}", name, outcome);
    ProcessReport { name, outcome }
}

/// Feed capture output to the consumers, holding their stdin open until
/// they have been killed.
async fn pump(
    mut fanout: FanoutPipe,
    mut source: ChildStdout,
    group: CancellationToken,
    release: CancellationToken,
    failure: Arc<FirstFailure>,
) {
    match fanout.pump(&mut source, &group).await {
        Ok(bytes) => tracing::debug!("Fan-out finished after {} bytes", bytes),
        Err(e) => failure.record(PipelineError::Fanout(e.to_string())),
    }

    release.cancelled().await;
    fanout.close().await;
}

async fn kill_quietly(process: &mut ManagedProcess) {
    if let Err(e) = process.kill().await {
        tracing::warn!("Failed to kill {}: {}", process.name(), e);
    }
}

async fn join_report(name: String, task: JoinHandle<ProcessReport>) -> ProcessReport {
    match task.await {
        Ok(report) => report,
        Err(e) => ProcessReport {
            name,
            outcome: ProcessOutcome::WaitFailed(e.to_string()),
        },
    }
}

/// Remove every entry of `dir`, creating it if missing.
async fn clear_dir(dir: &Path) -> Result<(), PipelineError> {
    let prepare_err = |e: std::io::Error| PipelineError::Prepare {
        path: dir.display().to_string(),
        reason: e.to_string(),
    };

    tokio::fs::create_dir_all(dir).await.map_err(prepare_err)?;

    let mut entries = tokio::fs::read_dir(dir).await.map_err(prepare_err)?;
    while let Some(entry) = entries.next_entry().await.map_err(prepare_err)? {
        let path = entry.path();
        let file_type = entry.file_type().await.map_err(prepare_err)?;
        if file_type.is_dir() {
            tokio::fs::remove_dir_all(&path).await.map_err(prepare_err)?;
        } else {
            tokio::fs::remove_file(&path).await.map_err(prepare_err)?;
        }
    }

    Ok(())
}
