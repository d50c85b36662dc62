//! Encoder selection steps.

use serde::Serialize;

use crate::format::{AudioFormat, VideoFormat};

/// Output video encoder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VideoEncoder {
    Copy,
    Libx264,
    Libx265,
    Mpeg2Video,
    /// A device encoder such as `hevc_nvenc` or `h264_vaapi`.
    Hardware {
        name: &'static str,
        format: VideoFormat,
    },
}

impl VideoEncoder {
    /// The software encoder producing `format`, if there is one.
    pub fn software(format: &VideoFormat) -> Option<Self> {
        match format {
            VideoFormat::H264 => Some(VideoEncoder::Libx264),
            VideoFormat::Hevc => Some(VideoEncoder::Libx265),
            VideoFormat::Mpeg2Video => Some(VideoEncoder::Mpeg2Video),
            VideoFormat::Copy => Some(VideoEncoder::Copy),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            VideoEncoder::Copy => "copy",
            VideoEncoder::Libx264 => "libx264",
            VideoEncoder::Libx265 => "libx265",
            VideoEncoder::Mpeg2Video => "mpeg2video",
            VideoEncoder::Hardware { name, .. } => name,
        }
    }

    pub fn is_hardware(&self) -> bool {
        matches!(self, VideoEncoder::Hardware { .. })
    }

    pub fn arguments(&self) -> Vec<String> {
        let mut result = vec!["-c:v".to_string(), self.name().to_string()];
        match self {
            VideoEncoder::Libx265 => {
                result.extend(
                    ["-tag:v", "hvc1", "-x265-params", "log-level=error"].map(String::from),
                );
            }
            VideoEncoder::Hardware {
                format: VideoFormat::Hevc,
                ..
            } => result.extend(["-tag:v", "hvc1"].map(String::from)),
            _ => {}
        }
        result
    }
}

/// Output audio encoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AudioEncoder {
    Copy,
    Aac,
    Ac3,
}

impl AudioEncoder {
    pub fn name(&self) -> &'static str {
        match self {
            AudioEncoder::Copy => "copy",
            AudioEncoder::Aac => "aac",
            AudioEncoder::Ac3 => "ac3",
        }
    }

    pub fn arguments(&self) -> Vec<String> {
        vec!["-c:a".into(), self.name().into()]
    }
}

impl From<AudioFormat> for AudioEncoder {
    fn from(format: AudioFormat) -> Self {
        match format {
            AudioFormat::Aac => AudioEncoder::Aac,
            AudioFormat::Ac3 => AudioEncoder::Ac3,
            AudioFormat::Copy => AudioEncoder::Copy,
        }
    }
}

/// Output subtitle encoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SubtitleEncoder {
    Copy,
    DvdSub,
}

impl SubtitleEncoder {
    pub fn arguments(&self) -> Vec<String> {
        match self {
            SubtitleEncoder::Copy => vec!["-c:s".into(), "copy".into()],
            SubtitleEncoder::DvdSub => vec!["-c:s".into(), "dvdsub".into()],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hevc_encoders_are_tagged() {
        assert_eq!(
            VideoEncoder::Libx265.arguments(),
            vec!["-c:v", "libx265", "-tag:v", "hvc1", "-x265-params", "log-level=error"]
        );
        let nvenc = VideoEncoder::Hardware {
            name: "hevc_nvenc",
            format: VideoFormat::Hevc,
        };
        assert_eq!(nvenc.arguments(), vec!["-c:v", "hevc_nvenc", "-tag:v", "hvc1"]);
        assert!(nvenc.is_hardware());
    }

    #[test]
    fn software_encoder_lookup() {
        assert_eq!(VideoEncoder::software(&VideoFormat::H264), Some(VideoEncoder::Libx264));
        assert_eq!(VideoEncoder::software(&VideoFormat::Vp9), None);
        assert_eq!(VideoEncoder::Copy.arguments(), vec!["-c:v", "copy"]);
    }

    #[test]
    fn audio_encoder_from_format() {
        assert_eq!(AudioEncoder::from(AudioFormat::Ac3).arguments(), vec!["-c:a", "ac3"]);
    }
}
