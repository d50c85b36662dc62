//! Application configuration types.
//!
//! The top-level [`Config`] struct is deserialized from JSON and carries the
//! tool and transcode sections. Every section defaults sensibly so a
//! completely empty `{}` file is valid.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::Error;

/// Hardware acceleration methods accepted by `transcode.hw_accel`.
pub const HW_ACCEL_METHODS: &[&str] = &["none", "nvenc", "vaapi", "qsv", "videotoolbox"];

/// Output containers accepted by `transcode.output_format`.
pub const OUTPUT_FORMATS: &[&str] = &["mkv", "mpegts", "mp4", "hls"];

// ---------------------------------------------------------------------------
// Top-level Config
// ---------------------------------------------------------------------------

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub tools: ToolsConfig,
    pub transcode: TranscodeConfig,
}

impl Config {
    /// Deserialize a `Config` from a JSON string.
    pub fn from_json(json_str: &str) -> Result<Self> {
        serde_json::from_str(json_str)
            .map_err(|e| Error::Validation(format!("config parse error: {e}")))
    }

    /// Load configuration from a file path, falling back to defaults if the
    /// path is `None` or the file does not exist.
    pub fn load_or_default(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            return Self::default();
        };

        match std::fs::read_to_string(path) {
            Ok(contents) => Self::from_json(&contents).unwrap_or_else(|e| {
                tracing::warn!("Failed to parse config file {}: {e}", path.display());
                Self::default()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("No config file at {}; using defaults", path.display());
                Self::default()
            }
            Err(e) => {
                tracing::warn!("Failed to read config file {}: {e}", path.display());
                Self::default()
            }
        }
    }

    /// Load configuration strictly: a missing or malformed file is an error.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    /// Return a list of validation warnings (non-fatal issues).
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.tools.probe_timeout_secs == 0 {
            warnings.push(
                "tools.probe_timeout_secs is 0; capability probing will always time out".into(),
            );
        }

        if let Some(ref hw) = self.transcode.hw_accel {
            if !HW_ACCEL_METHODS.contains(&hw.as_str()) {
                warnings.push(format!(
                    "transcode.hw_accel '{}' is not a recognized method (valid: {})",
                    hw,
                    HW_ACCEL_METHODS.join(", ")
                ));
            }
        }

        if !OUTPUT_FORMATS.contains(&self.transcode.output_format.as_str()) {
            warnings.push(format!(
                "transcode.output_format '{}' is not a recognized container (valid: {})",
                self.transcode.output_format,
                OUTPUT_FORMATS.join(", ")
            ));
        }

        if self.transcode.thread_count == Some(0) {
            warnings.push("transcode.thread_count is 0; omit it to let ffmpeg decide".into());
        }

        if self.transcode.service_provider.trim().is_empty() {
            warnings.push("transcode.service_provider is empty".into());
        }

        if self.transcode.hw_accel.as_deref() == Some("vaapi")
            && self.transcode.vaapi_device.as_os_str().is_empty()
        {
            warnings.push("transcode.hw_accel is vaapi but vaapi_device is empty".into());
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Sub-configs
// ---------------------------------------------------------------------------

/// External tool path overrides.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    pub ffmpeg_path: Option<PathBuf>,
    pub ffprobe_path: Option<PathBuf>,
    pub probe_timeout_secs: u64,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: None,
            ffprobe_path: None,
            probe_timeout_secs: 10,
        }
    }
}

/// Defaults applied to every transcode this process builds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscodeConfig {
    /// Preferred hardware acceleration method (see [`HW_ACCEL_METHODS`]).
    pub hw_accel: Option<String>,
    /// DRM render node used for VAAPI.
    pub vaapi_device: PathBuf,
    /// Exported as `LIBVA_DRIVER_NAME` when set.
    pub vaapi_driver: Option<String>,
    /// Device used to initialize QSV.
    pub qsv_device: Option<PathBuf>,
    pub thread_count: Option<u32>,
    /// Written into the `service_provider` stream metadata.
    pub service_provider: String,
    pub output_format: String,
}

impl Default for TranscodeConfig {
    fn default() -> Self {
        Self {
            hw_accel: None,
            vaapi_device: PathBuf::from("/dev/dri/renderD128"),
            vaapi_driver: None,
            qsv_device: None,
            thread_count: None,
            service_provider: "castforge".into(),
            output_format: "mpegts".into(),
        }
    }
}
