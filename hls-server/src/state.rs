use std::path::PathBuf;

use config_manager::{DataLayout, SettingsStore};
use recording_store::{recording_path, RecordingId};
use tokio::sync::mpsc;

use crate::error::HlsError;
use crate::vod::VodTools;

/// Why the HTTP side asked for a pipeline restart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartRequest {
    /// Camera settings were saved and must be picked up
    SettingsChanged,
    /// Explicit request without a settings change
    Manual,
}

/// Shared state for the HTTP handlers.
pub struct HlsState {
    pub layout: DataLayout,
    pub settings: SettingsStore,
    pub tools: VodTools,
    restart_tx: mpsc::Sender<RestartRequest>,
}

impl HlsState {
    pub fn new(layout: DataLayout, tools: VodTools, restart_tx: mpsc::Sender<RestartRequest>) -> Self {
        let settings = SettingsStore::new(layout.settings_path.clone());
        Self {
            layout,
            settings,
            tools,
            restart_tx,
        }
    }

    /// Ask the controller to rebuild the pipeline.
    ///
    /// Requests made while one is already pending are merged into it.
    pub fn request_restart(&self, request: RestartRequest) -> Result<(), HlsError> {
        match self.restart_tx.try_send(request) {
            Ok(()) => {
                tracing::info!("Pipeline restart requested: {:?}", request);
                Ok(())
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::debug!("Pipeline restart already pending, merging {:?}", request);
                Ok(())
            }
            Err(mpsc::error::TrySendError::Closed(_)) => Err(HlsError::ControllerGone),
        }
    }

    /// Resolve a recording id from a request path to its file.
    pub fn recording_path(&self, id: &str) -> Result<PathBuf, HlsError> {
        let id = RecordingId::parse(id)?;
        Ok(recording_path(&self.layout.storage_dir, &id)?)
    }
}
