//! Supervised capture pipeline for a single camera.
//!
//! One capture process produces a raw H.264 stream on its stdout. The
//! supervisor duplicates that stream to every consumer's stdin and treats
//! the whole group as one unit: if any member exits or fails, every other
//! member is killed and the first failure is reported.
//!
//! # Architecture
//!
//! ```text
//! raspivid --H.264--> FanoutPipe --> ffmpeg (archive, 15 min mp4 files)
//!                               \--> ffmpeg (live, rolling HLS playlist)
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use stream_pipeline::{CaptureConfig, PipelineOutputs, PipelinePlan, PipelineSupervisor, Toolchain};
//!
//! let plan = PipelinePlan::for_camera(&config, &outputs, &Toolchain::default());
//! let supervisor = PipelineSupervisor::new(plan);
//! supervisor.start().await?;
//! ```

pub mod capture;
pub mod commands;
pub mod error;
pub mod fanout;
pub mod process;
pub mod supervisor;

pub use capture::{CameraDefaults, CaptureConfig, Rotation};
pub use commands::Toolchain;
pub use error::PipelineError;
pub use fanout::{FanoutError, FanoutPipe};
pub use process::{ManagedProcess, ProcessOutcome, ProcessSpec, StdioMode};
pub use supervisor::{PipelineOutputs, PipelinePlan, PipelineState, PipelineSupervisor, ProcessReport};
