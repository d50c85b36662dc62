//! Desired output state handed to a pipeline builder.
//!
//! - [`FrameState`] -- what the output video should look like.
//! - [`FfmpegState`] -- global encode parameters (acceleration, seek, container).
//! - [`AudioState`] -- what the output audio should look like.
//! - [`WatermarkState`] -- placement and appearance of an overlay image.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::format::{
    AudioFormat, FrameSize, HardwareAccelerationMode, OutputFormatKind, PixelFormat, VideoFormat,
};
use crate::timecode::duration_secs;

// ---------------------------------------------------------------------------
// FrameState
// ---------------------------------------------------------------------------

/// Desired output video characteristics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameState {
    pub video_format: VideoFormat,
    #[serde(default)]
    pub video_profile: Option<String>,
    #[serde(default)]
    pub pixel_format: Option<PixelFormat>,
    /// Frame size after scaling, before padding.
    pub scaled_size: FrameSize,
    /// Final frame size; `None` means no padding.
    #[serde(default)]
    pub padded_size: Option<FrameSize>,
    #[serde(default)]
    pub cropped_size: Option<FrameSize>,
    /// Keep the source's non-square pixels instead of stretching them square.
    #[serde(default)]
    pub is_anamorphic: bool,
    #[serde(default)]
    pub deinterlaced: bool,
    #[serde(default)]
    pub frame_rate: Option<u32>,
    /// Kilobits per second.
    #[serde(default)]
    pub video_bitrate: Option<u32>,
    /// Kilobits.
    #[serde(default)]
    pub video_buffer_size: Option<u32>,
    #[serde(default)]
    pub video_track_timescale: Option<u32>,
    /// Read input at native speed.
    #[serde(default)]
    pub realtime: bool,
    #[serde(default)]
    pub infinite_loop: bool,
    #[serde(default)]
    pub allow_b_frames: bool,
}

impl FrameState {
    /// A desired state that keeps `size` and encodes to `video_format`.
    pub fn new(video_format: VideoFormat, scaled_size: FrameSize) -> Self {
        Self {
            video_format,
            video_profile: None,
            pixel_format: None,
            scaled_size,
            padded_size: None,
            cropped_size: None,
            is_anamorphic: false,
            deinterlaced: false,
            frame_rate: None,
            video_bitrate: None,
            video_buffer_size: None,
            video_track_timescale: None,
            realtime: false,
            infinite_loop: false,
            allow_b_frames: false,
        }
    }

    /// The frame size after padding (or after scaling, when no pad applies).
    pub fn final_size(&self) -> FrameSize {
        self.padded_size.unwrap_or(self.scaled_size)
    }
}

// ---------------------------------------------------------------------------
// FfmpegState
// ---------------------------------------------------------------------------

/// Desired global encode parameters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FfmpegState {
    pub decoder_hardware_acceleration: HardwareAccelerationMode,
    pub encoder_hardware_acceleration: HardwareAccelerationMode,
    pub vaapi_driver: Option<String>,
    pub vaapi_device: Option<String>,
    pub qsv_device: Option<String>,
    #[serde(with = "duration_secs")]
    pub start: Option<Duration>,
    #[serde(with = "duration_secs")]
    pub finish: Option<Duration>,
    pub do_not_map_metadata: bool,
    pub metadata_service_provider: Option<String>,
    pub metadata_service_name: Option<String>,
    pub metadata_audio_language: Option<String>,
    pub metadata_subtitle_language: Option<String>,
    pub metadata_subtitle_title: Option<String>,
    pub output_format: OutputFormatKind,
    pub hls_playlist_path: Option<String>,
    pub hls_segment_template: Option<String>,
    pub hls_segment_seconds: Option<u32>,
    /// Output timestamp offset, in units of the video track timescale.
    pub pts_offset: i64,
    pub thread_count: Option<u32>,
    /// Realign audio timestamps to zero at the start of the output.
    pub audio_realign: bool,
}

impl FfmpegState {
    /// Start offset, when it is strictly positive.
    pub fn seek(&self) -> Option<Duration> {
        self.start.filter(|s| !s.is_zero())
    }

    /// State for remuxing a concat playlist for `channel_name`.
    pub fn concat(channel_name: impl Into<String>, service_provider: impl Into<String>) -> Self {
        Self {
            do_not_map_metadata: true,
            metadata_service_provider: Some(service_provider.into()),
            metadata_service_name: Some(channel_name.into()),
            ..Self::default()
        }
    }
}

// ---------------------------------------------------------------------------
// AudioState
// ---------------------------------------------------------------------------

/// Loudness normalization filter for the output audio.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioNormalization {
    #[default]
    None,
    LoudNorm,
    DynAudNorm,
}

/// Desired output audio characteristics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioState {
    pub audio_format: Option<AudioFormat>,
    pub audio_channels: Option<u32>,
    /// Kilobits per second.
    pub audio_bitrate: Option<u32>,
    /// Kilobits.
    pub audio_buffer_size: Option<u32>,
    /// Hertz.
    pub audio_sample_rate: Option<u32>,
    /// Pad the audio with silence up to this duration.
    #[serde(with = "duration_secs")]
    pub audio_duration: Option<Duration>,
    pub normalize_loudness: AudioNormalization,
}

impl AudioState {
    pub fn copy() -> Self {
        Self {
            audio_format: Some(AudioFormat::Copy),
            ..Self::default()
        }
    }
}

// ---------------------------------------------------------------------------
// Watermark / subtitles
// ---------------------------------------------------------------------------

/// Corner (or center) a watermark is anchored to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WatermarkLocation {
    TopLeft,
    TopRight,
    BottomLeft,
    #[default]
    BottomRight,
    Center,
}

/// How the watermark image is sized.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WatermarkSize {
    #[default]
    Actual,
    /// Scaled to `width_percent` of the output width.
    Scaled,
}

/// A fade of the watermark in or out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FadePoint {
    pub fade_in: bool,
    /// Seconds from the start of the output.
    pub start: f64,
    pub duration: f64,
}

/// Placement and appearance of a watermark overlay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatermarkState {
    pub location: WatermarkLocation,
    pub size: WatermarkSize,
    pub width_percent: f64,
    pub horizontal_margin_percent: f64,
    pub vertical_margin_percent: f64,
    /// 0..=100
    pub opacity: u32,
    pub fade_points: Vec<FadePoint>,
}

impl Default for WatermarkState {
    fn default() -> Self {
        Self {
            location: WatermarkLocation::BottomRight,
            size: WatermarkSize::Actual,
            width_percent: 15.0,
            horizontal_margin_percent: 5.0,
            vertical_margin_percent: 5.0,
            opacity: 100,
            fade_points: Vec::new(),
        }
    }
}

/// What to do with a selected subtitle stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubtitleMethod {
    /// Render into the video frames.
    #[default]
    Burn,
    /// Pass the stream through.
    Copy,
    /// Re-encode image subtitles as dvdsub.
    Convert,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn final_size_prefers_padding() {
        let mut state = FrameState::new(VideoFormat::H264, FrameSize::new(1920, 800));
        assert_eq!(state.final_size(), FrameSize::new(1920, 800));
        state.padded_size = Some(FrameSize::new(1920, 1080));
        assert_eq!(state.final_size(), FrameSize::new(1920, 1080));
    }

    #[test]
    fn seek_ignores_zero_start() {
        let mut state = FfmpegState::default();
        assert_eq!(state.seek(), None);
        state.start = Some(Duration::ZERO);
        assert_eq!(state.seek(), None);
        state.start = Some(Duration::from_secs(1));
        assert_eq!(state.seek(), Some(Duration::from_secs(1)));
    }

    #[test]
    fn ffmpeg_state_from_json() {
        let json = r#"{
            "encoder_hardware_acceleration": "vaapi",
            "start": 12.5,
            "output_format": "mp4",
            "metadata_service_name": "Retro TV"
        }"#;
        let state: FfmpegState = serde_json::from_str(json).unwrap();
        assert_eq!(state.encoder_hardware_acceleration, HardwareAccelerationMode::Vaapi);
        assert_eq!(state.decoder_hardware_acceleration, HardwareAccelerationMode::None);
        assert_eq!(state.start, Some(Duration::from_millis(12_500)));
        assert_eq!(state.output_format, OutputFormatKind::Mp4);
        assert_eq!(state.metadata_service_name.as_deref(), Some("Retro TV"));
    }

    #[test]
    fn frame_state_from_json_defaults() {
        let json = r#"{"video_format": "hevc", "scaled_size": {"width": 1280, "height": 720}}"#;
        let state: FrameState = serde_json::from_str(json).unwrap();
        assert_eq!(state.video_format, VideoFormat::Hevc);
        assert!(!state.deinterlaced);
        assert!(!state.allow_b_frames);
        assert_eq!(state.padded_size, None);
    }

    #[test]
    fn concat_state_sets_metadata() {
        let state = FfmpegState::concat("Some Channel", "castforge");
        assert!(state.do_not_map_metadata);
        assert_eq!(state.metadata_service_provider.as_deref(), Some("castforge"));
        assert_eq!(state.metadata_service_name.as_deref(), Some("Some Channel"));
    }
}
