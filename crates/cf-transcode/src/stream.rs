//! Probed stream descriptors.
//!
//! These are produced once by whoever probes an input file and are never
//! mutated by the pipeline builders.

use serde::{Deserialize, Serialize};

use crate::format::{FrameSize, PixelFormat, ScanKind, VideoFormat};

/// Decimal places used when an aspect ratio has to be rendered as `x:1`.
const ASPECT_DECIMALS: usize = 12;

/// Image-based subtitle codecs (rendered as bitmaps rather than text).
const IMAGE_SUBTITLE_CODECS: &[&str] = &[
    "hdmv_pgs_subtitle",
    "pgssub",
    "dvd_subtitle",
    "dvdsub",
    "dvb_subtitle",
    "dvbsub",
    "xsub",
];

// ---------------------------------------------------------------------------
// Color parameters
// ---------------------------------------------------------------------------

/// Color metadata as reported by ffprobe.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColorParams {
    pub color_range: Option<String>,
    pub color_space: Option<String>,
    pub color_transfer: Option<String>,
    pub color_primaries: Option<String>,
}

impl ColorParams {
    pub fn bt709() -> Self {
        Self {
            color_range: Some("tv".into()),
            color_space: Some("bt709".into()),
            color_transfer: Some("bt709".into()),
            color_primaries: Some("bt709".into()),
        }
    }

    pub fn is_unknown(&self) -> bool {
        self.color_space.is_none() && self.color_transfer.is_none() && self.color_primaries.is_none()
    }

    /// Input color space name for the `colorspace` filter when this stream
    /// has to be converted to bt709. `None` when no conversion applies.
    pub fn conversion_source(&self) -> Option<&'static str> {
        match self.color_space.as_deref()? {
            "bt709" => None,
            "bt470bg" => Some("bt470bg"),
            "smpte170m" => Some("smpte170m"),
            "smpte240m" => Some("smpte240m"),
            "bt2020nc" | "bt2020c" => Some("bt2020"),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Streams
// ---------------------------------------------------------------------------

/// One video stream of an input file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoStream {
    pub index: u32,
    pub codec: VideoFormat,
    #[serde(default)]
    pub pixel_format: Option<PixelFormat>,
    #[serde(default)]
    pub color_params: ColorParams,
    #[serde(default)]
    pub frame_size: FrameSize,
    /// Raw `sample_aspect_ratio` from the probe, e.g. `"1:1"` or `"0:0"`.
    #[serde(default)]
    pub sample_aspect_ratio: Option<String>,
    /// Raw `display_aspect_ratio` from the probe, e.g. `"16:9"`.
    #[serde(default)]
    pub display_aspect_ratio: Option<String>,
    /// Raw frame rate, either a rational (`30000/1001`) or a decimal.
    #[serde(default)]
    pub frame_rate: Option<String>,
    #[serde(default)]
    pub still_image: bool,
    #[serde(default)]
    pub scan_kind: ScanKind,
}

impl VideoStream {
    pub fn new(index: u32, codec: VideoFormat, frame_size: FrameSize) -> Self {
        Self {
            index,
            codec,
            pixel_format: None,
            color_params: ColorParams::default(),
            frame_size,
            sample_aspect_ratio: None,
            display_aspect_ratio: None,
            frame_rate: None,
            still_image: false,
            scan_kind: ScanKind::Unknown,
        }
    }

    /// Sample aspect ratio, normalized.
    ///
    /// A usable probed value is returned as-is. When the probe reported an
    /// unknown ratio (`0:0`, `0:1`, missing) the display aspect ratio is
    /// rendered as a decimal against 1, always with `.` as the separator.
    pub fn sar(&self) -> String {
        if let Some((n, d)) = self.sample_aspect_ratio.as_deref().and_then(parse_ratio) {
            if n > 0 && d > 0 {
                return format!("{n}:{d}");
            }
        }

        match self.display_aspect_ratio.as_deref().and_then(parse_ratio) {
            Some((n, d)) if n > 0 && d > 0 => decimal_ratio(n as f64 / d as f64),
            _ => "1:1".to_string(),
        }
    }

    /// Display aspect ratio, normalized. Falls back to the frame size scaled
    /// by the sample aspect ratio.
    pub fn dar(&self) -> String {
        if let Some((n, d)) = self.display_aspect_ratio.as_deref().and_then(parse_ratio) {
            if n > 0 && d > 0 {
                return format!("{n}:{d}");
            }
        }

        if self.frame_size.is_empty() {
            return "1:1".to_string();
        }

        match self.sample_aspect_ratio.as_deref().and_then(parse_ratio) {
            Some((n, d)) if n > 0 && d > 0 && n != d => {
                let w = self.frame_size.width as f64 * n as f64;
                let h = self.frame_size.height as f64 * d as f64;
                decimal_ratio(w / h)
            }
            _ => format!("{}:{}", self.frame_size.width, self.frame_size.height),
        }
    }

    /// Whether pixels are non-square.
    pub fn is_anamorphic(&self) -> bool {
        match self.sample_aspect_ratio.as_deref() {
            Some("1:1") => false,
            Some(sar) if sar != "0:1" => true,
            _ => match self.display_aspect_ratio.as_deref() {
                None | Some("0:1") => false,
                Some(dar) => {
                    dar != format!("{}:{}", self.frame_size.width, self.frame_size.height)
                }
            },
        }
    }

    /// Frame rate as a number, if the probe reported a parseable one.
    pub fn frame_rate_value(&self) -> Option<f64> {
        let raw = self.frame_rate.as_deref()?.trim();
        let value = match raw.split_once('/') {
            Some((n, d)) => {
                let n: f64 = n.trim().parse().ok()?;
                let d: f64 = d.trim().parse().ok()?;
                if d == 0.0 {
                    return None;
                }
                n / d
            }
            None => raw.parse().ok()?,
        };
        (value > 0.0).then_some(value)
    }
}

/// One audio stream of an input file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioStream {
    pub index: u32,
    pub codec: String,
    pub channels: u32,
    #[serde(default)]
    pub sample_rate: Option<u32>,
}

impl AudioStream {
    pub fn new(index: u32, codec: impl Into<String>, channels: u32) -> Self {
        Self {
            index,
            codec: codec.into(),
            channels,
            sample_rate: None,
        }
    }
}

/// One subtitle stream of an input file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubtitleStream {
    pub index: u32,
    pub codec: String,
}

impl SubtitleStream {
    pub fn is_image_based(&self) -> bool {
        IMAGE_SUBTITLE_CODECS.contains(&self.codec.as_str())
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn parse_ratio(s: &str) -> Option<(u64, u64)> {
    let (n, d) = s.trim().split_once(':')?;
    Some((n.trim().parse().ok()?, d.trim().parse().ok()?))
}

/// `{value}:1` with a fixed number of decimals. Rust float formatting never
/// consults the host locale.
fn decimal_ratio(value: f64) -> String {
    format!("{value:.prec$}:1", prec = ASPECT_DECIMALS)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stream(sar: Option<&str>, dar: Option<&str>, w: u32, h: u32) -> VideoStream {
        let mut s = VideoStream::new(0, VideoFormat::H264, FrameSize::new(w, h));
        s.sample_aspect_ratio = sar.map(String::from);
        s.display_aspect_ratio = dar.map(String::from);
        s
    }

    #[test]
    fn unknown_sar_falls_back_to_decimal_dar() {
        let s = stream(Some("0:0"), Some("4:3"), 626, 476);
        assert_eq!(s.sar(), "1.333333333333:1");
        assert!(!s.sar().contains(','));
    }

    #[test]
    fn known_sar_is_kept() {
        let s = stream(Some("32:27"), Some("16:9"), 720, 480);
        assert_eq!(s.sar(), "32:27");
        assert_eq!(s.dar(), "16:9");
        assert!(s.is_anamorphic());
    }

    #[test]
    fn dar_derived_from_size_and_sar() {
        let s = stream(Some("4:3"), None, 1440, 1080);
        assert_eq!(s.dar(), "1.777777777778:1");

        let square = stream(Some("1:1"), None, 1920, 1080);
        assert_eq!(square.dar(), "1920:1080");
    }

    #[test]
    fn anamorphic_rules() {
        assert!(!stream(Some("1:1"), Some("16:9"), 1920, 1080).is_anamorphic());
        assert!(stream(Some("0:0"), Some("4:3"), 626, 476).is_anamorphic());
        assert!(!stream(Some("0:1"), Some("0:1"), 640, 480).is_anamorphic());
        assert!(!stream(Some("0:1"), Some("640:480"), 640, 480).is_anamorphic());
        assert!(stream(Some("0:1"), Some("4:3"), 640, 480).is_anamorphic());
        assert!(!stream(None, None, 640, 480).is_anamorphic());
    }

    #[test]
    fn frame_rate_parsing() {
        let mut s = stream(None, None, 1920, 1080);
        s.frame_rate = Some("30000/1001".into());
        let fps = s.frame_rate_value().unwrap();
        assert!((fps - 29.97).abs() < 0.01);

        s.frame_rate = Some("25".into());
        assert_eq!(s.frame_rate_value(), Some(25.0));

        s.frame_rate = Some("0/0".into());
        assert_eq!(s.frame_rate_value(), None);
    }

    #[test]
    fn color_conversion_source() {
        assert_eq!(ColorParams::bt709().conversion_source(), None);
        assert!(ColorParams::default().is_unknown());
        let pal = ColorParams {
            color_space: Some("bt470bg".into()),
            ..ColorParams::default()
        };
        assert_eq!(pal.conversion_source(), Some("bt470bg"));
    }

    #[test]
    fn subtitle_kinds() {
        let pgs = SubtitleStream { index: 3, codec: "hdmv_pgs_subtitle".into() };
        let srt = SubtitleStream { index: 4, codec: "subrip".into() };
        assert!(pgs.is_image_based());
        assert!(!srt.is_image_based());
    }
}
