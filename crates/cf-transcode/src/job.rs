//! JSON build jobs.
//!
//! A [`TranscodeJob`] is everything [`PipelineBuilder::build`] needs apart
//! from the capability snapshot, in a form that can be written by another
//! process and handed to the CLI.

use std::sync::Arc;

use cf_core::config::TranscodeConfig;
use cf_core::{Error, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::builder::{Pipeline, PipelineBuilder};
use crate::capabilities::Capabilities;
use crate::format::HardwareAccelerationMode;
use crate::input::PipelineInputs;
use crate::state::{FfmpegState, FrameState};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscodeJob {
    pub inputs: PipelineInputs,
    pub frame_state: FrameState,
    #[serde(default)]
    pub ffmpeg_state: FfmpegState,
}

impl TranscodeJob {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| Error::Serialization(format!("invalid transcode job: {e}")))
    }

    /// Fill in whatever the job leaves unset from process configuration.
    ///
    /// Explicit job values always win. An unknown `hw_accel` in the
    /// configuration is a validation error.
    pub fn apply_config(&mut self, config: &TranscodeConfig) -> Result<()> {
        let state = &mut self.ffmpeg_state;

        if let Some(accel) = &config.hw_accel {
            let mode: HardwareAccelerationMode = accel.parse()?;
            if !state.decoder_hardware_acceleration.is_hardware()
                && !state.encoder_hardware_acceleration.is_hardware()
            {
                debug!(mode = %mode, "Using configured hardware acceleration");
                state.decoder_hardware_acceleration = mode;
                state.encoder_hardware_acceleration = mode;
            }
        }
        if state.vaapi_device.is_none() {
            state.vaapi_device = Some(config.vaapi_device.to_string_lossy().into_owned());
        }
        if state.vaapi_driver.is_none() {
            state.vaapi_driver = config.vaapi_driver.clone();
        }
        if state.qsv_device.is_none() {
            state.qsv_device = config
                .qsv_device
                .as_ref()
                .map(|d| d.to_string_lossy().into_owned());
        }
        if state.thread_count.is_none() {
            state.thread_count = config.thread_count;
        }
        if state.metadata_service_provider.is_none() && !config.service_provider.is_empty() {
            state.metadata_service_provider = Some(config.service_provider.clone());
        }
        Ok(())
    }

    /// Build the pipeline against `capabilities`.
    pub fn compile(self, capabilities: Arc<Capabilities>) -> Result<Pipeline> {
        PipelineBuilder::new(capabilities).build(self.inputs, &self.ffmpeg_state, &self.frame_state)
    }
}
