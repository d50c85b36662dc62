//! Codec, pixel format, and container vocabulary shared by descriptors and
//! pipeline steps.
//!
//! Codec and pixel format names are kept in ffmpeg's own spelling
//! (`mpeg2video`, `yuv420p10le`) so probe output maps onto them directly.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ---------------------------------------------------------------------------
// VideoFormat
// ---------------------------------------------------------------------------

/// A video codec, either as probed from an input stream or as requested for
/// the output.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum VideoFormat {
    H264,
    Hevc,
    Mpeg1Video,
    Mpeg2Video,
    Mpeg4,
    MsMpeg4V2,
    MsMpeg4V3,
    Vc1,
    Vp9,
    Av1,
    /// Pass the stream through without re-encoding.
    Copy,
    /// Let ffmpeg pick the codec (image outputs).
    Undetermined,
    /// Any codec this crate has no special handling for.
    Other(String),
}

impl VideoFormat {
    /// ffmpeg's name for this codec.
    pub fn name(&self) -> &str {
        match self {
            VideoFormat::H264 => "h264",
            VideoFormat::Hevc => "hevc",
            VideoFormat::Mpeg1Video => "mpeg1video",
            VideoFormat::Mpeg2Video => "mpeg2video",
            VideoFormat::Mpeg4 => "mpeg4",
            VideoFormat::MsMpeg4V2 => "msmpeg4v2",
            VideoFormat::MsMpeg4V3 => "msmpeg4v3",
            VideoFormat::Vc1 => "vc1",
            VideoFormat::Vp9 => "vp9",
            VideoFormat::Av1 => "av1",
            VideoFormat::Copy => "copy",
            VideoFormat::Undetermined => "",
            VideoFormat::Other(name) => name,
        }
    }

    /// The explicit software decoder for this codec, if ffmpeg ships one
    /// under a stable name.
    pub fn software_decoder(&self) -> Option<&'static str> {
        match self {
            VideoFormat::H264 => Some("h264"),
            VideoFormat::Hevc => Some("hevc"),
            VideoFormat::Mpeg1Video => Some("mpeg1video"),
            VideoFormat::Mpeg2Video => Some("mpeg2video"),
            VideoFormat::Mpeg4 => Some("mpeg4"),
            VideoFormat::MsMpeg4V2 => Some("msmpeg4v2"),
            VideoFormat::MsMpeg4V3 => Some("msmpeg4v3"),
            VideoFormat::Vc1 => Some("vc1"),
            VideoFormat::Vp9 => Some("vp9"),
            _ => None,
        }
    }
}

impl From<&str> for VideoFormat {
    fn from(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "h264" | "avc" => VideoFormat::H264,
            "hevc" | "h265" => VideoFormat::Hevc,
            "mpeg1video" => VideoFormat::Mpeg1Video,
            "mpeg2video" => VideoFormat::Mpeg2Video,
            "mpeg4" => VideoFormat::Mpeg4,
            "msmpeg4v2" => VideoFormat::MsMpeg4V2,
            "msmpeg4v3" => VideoFormat::MsMpeg4V3,
            "vc1" => VideoFormat::Vc1,
            "vp9" => VideoFormat::Vp9,
            "av1" => VideoFormat::Av1,
            "copy" => VideoFormat::Copy,
            "" => VideoFormat::Undetermined,
            other => VideoFormat::Other(other.to_string()),
        }
    }
}

impl From<String> for VideoFormat {
    fn from(s: String) -> Self {
        VideoFormat::from(s.as_str())
    }
}

impl From<VideoFormat> for String {
    fn from(f: VideoFormat) -> Self {
        f.name().to_string()
    }
}

impl fmt::Display for VideoFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// PixelFormat
// ---------------------------------------------------------------------------

/// A raw frame pixel layout.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PixelFormat {
    Yuv420p,
    /// Full-range 4:2:0, as produced by JPEG and many phone cameras.
    Yuvj420p,
    Yuv420p10le,
    Yuv444p,
    Yuv444p10le,
    Yuva420p,
    Nv12,
    P010le,
    Other(String),
}

impl PixelFormat {
    pub fn name(&self) -> &str {
        match self {
            PixelFormat::Yuv420p => "yuv420p",
            PixelFormat::Yuvj420p => "yuvj420p",
            PixelFormat::Yuv420p10le => "yuv420p10le",
            PixelFormat::Yuv444p => "yuv444p",
            PixelFormat::Yuv444p10le => "yuv444p10le",
            PixelFormat::Yuva420p => "yuva420p",
            PixelFormat::Nv12 => "nv12",
            PixelFormat::P010le => "p010le",
            PixelFormat::Other(name) => name,
        }
    }

    pub fn bit_depth(&self) -> u8 {
        match self {
            PixelFormat::Yuv420p10le | PixelFormat::Yuv444p10le | PixelFormat::P010le => 10,
            _ => 8,
        }
    }

    /// The `format=` value understood by the `colorspace` filter.
    pub fn colorspace_format(&self) -> Option<&'static str> {
        match self {
            PixelFormat::Yuv420p | PixelFormat::Yuvj420p | PixelFormat::Nv12 => Some("yuv420p"),
            PixelFormat::Yuv420p10le | PixelFormat::P010le => Some("yuv420p10"),
            PixelFormat::Yuv444p => Some("yuv444p"),
            PixelFormat::Yuv444p10le => Some("yuv444p10"),
            _ => None,
        }
    }

    /// Software layout of hardware surfaces carrying this format.
    pub fn hardware_surface_format(&self) -> PixelFormat {
        if self.bit_depth() == 10 {
            PixelFormat::P010le
        } else {
            PixelFormat::Nv12
        }
    }
}

impl From<&str> for PixelFormat {
    fn from(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "yuv420p" => PixelFormat::Yuv420p,
            "yuvj420p" => PixelFormat::Yuvj420p,
            "yuv420p10le" => PixelFormat::Yuv420p10le,
            "yuv444p" => PixelFormat::Yuv444p,
            "yuv444p10le" => PixelFormat::Yuv444p10le,
            "yuva420p" => PixelFormat::Yuva420p,
            "nv12" => PixelFormat::Nv12,
            "p010le" => PixelFormat::P010le,
            other => PixelFormat::Other(other.to_string()),
        }
    }
}

impl From<String> for PixelFormat {
    fn from(s: String) -> Self {
        PixelFormat::from(s.as_str())
    }
}

impl From<PixelFormat> for String {
    fn from(f: PixelFormat) -> Self {
        f.name().to_string()
    }
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// AudioFormat
// ---------------------------------------------------------------------------

/// Requested output audio codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    Aac,
    Ac3,
    Copy,
}

impl AudioFormat {
    pub fn name(&self) -> &'static str {
        match self {
            AudioFormat::Aac => "aac",
            AudioFormat::Ac3 => "ac3",
            AudioFormat::Copy => "copy",
        }
    }
}

impl fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// HardwareAccelerationMode
// ---------------------------------------------------------------------------

/// Hardware acceleration family used for decoding and/or encoding.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HardwareAccelerationMode {
    #[default]
    None,
    Nvenc,
    Vaapi,
    Qsv,
    VideoToolbox,
}

impl HardwareAccelerationMode {
    pub fn is_hardware(&self) -> bool {
        !matches!(self, HardwareAccelerationMode::None)
    }
}

impl fmt::Display for HardwareAccelerationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HardwareAccelerationMode::None => write!(f, "none"),
            HardwareAccelerationMode::Nvenc => write!(f, "nvenc"),
            HardwareAccelerationMode::Vaapi => write!(f, "vaapi"),
            HardwareAccelerationMode::Qsv => write!(f, "qsv"),
            HardwareAccelerationMode::VideoToolbox => write!(f, "videotoolbox"),
        }
    }
}

impl FromStr for HardwareAccelerationMode {
    type Err = cf_core::Error;

    fn from_str(s: &str) -> cf_core::Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "none" => Ok(HardwareAccelerationMode::None),
            "nvenc" | "cuda" => Ok(HardwareAccelerationMode::Nvenc),
            "vaapi" => Ok(HardwareAccelerationMode::Vaapi),
            "qsv" => Ok(HardwareAccelerationMode::Qsv),
            "videotoolbox" => Ok(HardwareAccelerationMode::VideoToolbox),
            other => Err(cf_core::Error::validation(format!(
                "unknown hardware acceleration mode '{other}'"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// OutputFormatKind
// ---------------------------------------------------------------------------

/// Container the pipeline writes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormatKind {
    Mkv,
    #[default]
    MpegTs,
    Mp4,
    Hls,
}

impl fmt::Display for OutputFormatKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormatKind::Mkv => write!(f, "mkv"),
            OutputFormatKind::MpegTs => write!(f, "mpegts"),
            OutputFormatKind::Mp4 => write!(f, "mp4"),
            OutputFormatKind::Hls => write!(f, "hls"),
        }
    }
}

impl FromStr for OutputFormatKind {
    type Err = cf_core::Error;

    fn from_str(s: &str) -> cf_core::Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mkv" | "matroska" => Ok(OutputFormatKind::Mkv),
            "mpegts" | "ts" => Ok(OutputFormatKind::MpegTs),
            "mp4" => Ok(OutputFormatKind::Mp4),
            "hls" => Ok(OutputFormatKind::Hls),
            other => Err(cf_core::Error::validation(format!(
                "unknown output format '{other}'"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// ScanKind / FrameSize
// ---------------------------------------------------------------------------

/// Interlacing of a video stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanKind {
    Progressive,
    Interlaced,
    #[default]
    Unknown,
}

/// Width and height of a frame in pixels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FrameSize {
    pub width: u32,
    pub height: u32,
}

impl FrameSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

impl fmt::Display for FrameSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn video_format_names() {
        assert_eq!(VideoFormat::from("hevc"), VideoFormat::Hevc);
        assert_eq!(VideoFormat::from("H265"), VideoFormat::Hevc);
        assert_eq!(VideoFormat::from("mpeg2video").name(), "mpeg2video");
        assert_eq!(VideoFormat::from(""), VideoFormat::Undetermined);
        assert_eq!(
            VideoFormat::from("prores"),
            VideoFormat::Other("prores".into())
        );
        assert_eq!(VideoFormat::Other("prores".into()).to_string(), "prores");
    }

    #[test]
    fn software_decoders() {
        assert_eq!(VideoFormat::H264.software_decoder(), Some("h264"));
        assert_eq!(VideoFormat::Mpeg2Video.software_decoder(), Some("mpeg2video"));
        assert_eq!(VideoFormat::Av1.software_decoder(), None);
        assert_eq!(VideoFormat::Copy.software_decoder(), None);
    }

    #[test]
    fn video_format_serde_uses_ffmpeg_names() {
        let json = serde_json::to_string(&VideoFormat::Mpeg2Video).unwrap();
        assert_eq!(json, "\"mpeg2video\"");
        let parsed: VideoFormat = serde_json::from_str("\"copy\"").unwrap();
        assert_eq!(parsed, VideoFormat::Copy);
    }

    #[test]
    fn pixel_format_bit_depth() {
        assert_eq!(PixelFormat::from("yuv420p10le").bit_depth(), 10);
        assert_eq!(PixelFormat::Yuv420p.bit_depth(), 8);
        assert_eq!(PixelFormat::Yuv420p10le.hardware_surface_format(), PixelFormat::P010le);
        assert_eq!(PixelFormat::Yuv420p.hardware_surface_format(), PixelFormat::Nv12);
        assert_eq!(PixelFormat::Yuv420p10le.colorspace_format(), Some("yuv420p10"));
    }

    #[test]
    fn full_range_is_its_own_format() {
        let full = PixelFormat::from("yuvj420p");
        assert_eq!(full, PixelFormat::Yuvj420p);
        assert_ne!(full, PixelFormat::Yuv420p);
        assert_eq!(full.name(), "yuvj420p");
        assert_eq!(full.bit_depth(), 8);
        assert_eq!(full.hardware_surface_format(), PixelFormat::Nv12);
    }

    #[test]
    fn hw_accel_from_str() {
        assert_eq!(
            "VAAPI".parse::<HardwareAccelerationMode>().unwrap(),
            HardwareAccelerationMode::Vaapi
        );
        assert_eq!(
            "none".parse::<HardwareAccelerationMode>().unwrap(),
            HardwareAccelerationMode::None
        );
        assert!("amf".parse::<HardwareAccelerationMode>().is_err());
        assert_eq!(HardwareAccelerationMode::VideoToolbox.to_string(), "videotoolbox");
    }

    #[test]
    fn output_format_serde() {
        let json = serde_json::to_string(&OutputFormatKind::MpegTs).unwrap();
        assert_eq!(json, "\"mpegts\"");
        assert_eq!("ts".parse::<OutputFormatKind>().unwrap(), OutputFormatKind::MpegTs);
        assert_eq!(OutputFormatKind::default(), OutputFormatKind::MpegTs);
    }

    #[test]
    fn frame_size_display() {
        assert_eq!(FrameSize::new(1920, 1080).to_string(), "1920x1080");
        assert!(FrameSize::new(0, 1080).is_empty());
    }
}
