//! Filter-graph fragments.
//!
//! Each variant renders to exactly one comma-separated segment of a filter
//! chain. Chains and labels are assembled by [`crate::complex_filter`].

use serde::Serialize;
use std::time::Duration;

use crate::format::{FrameSize, PixelFormat};
use crate::state::{FadePoint, WatermarkLocation};
use crate::timecode::{format_decimal, format_millis};

/// A video filter.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VideoFilter {
    Yadif,
    YadifCuda,
    DeinterlaceVaapi,
    DeinterlaceQsv,
    /// Software scale. Anamorphic sources are first stretched to square pixels.
    Scale { size: FrameSize, anamorphic: bool },
    ScaleCuda(FrameSize),
    ScaleVaapi(FrameSize),
    ScaleQsv(FrameSize),
    /// Plain scale used for subtitle bitmaps.
    ScaleImage(FrameSize),
    /// Fit inside the box keeping aspect ratio; a missing width follows the height.
    ScaleToFit { width: Option<u32>, height: u32 },
    Pad(FrameSize),
    Crop(FrameSize),
    /// Convert to bt709 from the named source color space.
    Colorspace {
        source: &'static str,
        format: &'static str,
    },
    Format(PixelFormat),
    /// Pixel format conversion on CUDA frames.
    FormatCuda(PixelFormat),
    FormatVaapi(PixelFormat),
    FormatQsv(PixelFormat),
    HardwareDownload(PixelFormat),
    HardwareUploadCuda,
    HardwareUploadVaapi,
    HardwareUploadQsv,
    /// Burn a text subtitle stream from `path` into the frames.
    Subtitles { path: String, stream_index: u32 },
    WatermarkScale { width: u32 },
    WatermarkOpacity { opacity: u32 },
    WatermarkFade(FadePoint),
    OverlayWatermark {
        location: WatermarkLocation,
        margin_x: u32,
        margin_y: u32,
    },
    OverlaySubtitle,
}

impl VideoFilter {
    /// The ffmpeg filter that must be available for this fragment to work.
    pub fn name(&self) -> &'static str {
        match self {
            VideoFilter::Yadif => "yadif",
            VideoFilter::YadifCuda => "yadif_cuda",
            VideoFilter::DeinterlaceVaapi => "deinterlace_vaapi",
            VideoFilter::DeinterlaceQsv => "deinterlace_qsv",
            VideoFilter::Scale { .. } | VideoFilter::ScaleImage(_) => "scale",
            VideoFilter::ScaleToFit { .. } => "scale",
            VideoFilter::WatermarkScale { .. } => "scale",
            VideoFilter::ScaleCuda(_) | VideoFilter::FormatCuda(_) => "scale_cuda",
            VideoFilter::ScaleVaapi(_) | VideoFilter::FormatVaapi(_) => "scale_vaapi",
            VideoFilter::ScaleQsv(_) => "scale_qsv",
            VideoFilter::FormatQsv(_) => "vpp_qsv",
            VideoFilter::Pad(_) => "pad",
            VideoFilter::Crop(_) => "crop",
            VideoFilter::Colorspace { .. } => "colorspace",
            VideoFilter::Format(_) => "format",
            VideoFilter::HardwareDownload(_) => "hwdownload",
            VideoFilter::HardwareUploadCuda => "hwupload_cuda",
            VideoFilter::HardwareUploadVaapi | VideoFilter::HardwareUploadQsv => "hwupload",
            VideoFilter::Subtitles { .. } => "subtitles",
            VideoFilter::WatermarkOpacity { .. } => "colorchannelmixer",
            VideoFilter::WatermarkFade(_) => "fade",
            VideoFilter::OverlayWatermark { .. } | VideoFilter::OverlaySubtitle => "overlay",
        }
    }

    /// Whether frames leave this filter in device memory.
    pub fn outputs_hardware_frames(&self) -> bool {
        matches!(
            self,
            VideoFilter::YadifCuda
                | VideoFilter::DeinterlaceVaapi
                | VideoFilter::DeinterlaceQsv
                | VideoFilter::ScaleCuda(_)
                | VideoFilter::ScaleVaapi(_)
                | VideoFilter::ScaleQsv(_)
                | VideoFilter::FormatCuda(_)
                | VideoFilter::FormatVaapi(_)
                | VideoFilter::FormatQsv(_)
                | VideoFilter::HardwareUploadCuda
                | VideoFilter::HardwareUploadVaapi
                | VideoFilter::HardwareUploadQsv
        )
    }

    pub fn render(&self) -> String {
        match self {
            VideoFilter::Yadif => "yadif=1".into(),
            VideoFilter::YadifCuda => "yadif_cuda".into(),
            VideoFilter::DeinterlaceVaapi => "deinterlace_vaapi".into(),
            VideoFilter::DeinterlaceQsv => "deinterlace_qsv".into(),
            VideoFilter::Scale { size, anamorphic } => {
                let scale = format!(
                    "scale={}:{}:flags=fast_bilinear,setsar=1",
                    size.width, size.height
                );
                if *anamorphic {
                    format!("scale=iw*sar:ih,setsar=1,{scale}")
                } else {
                    scale
                }
            }
            VideoFilter::ScaleCuda(size) => format!("scale_cuda={}:{}", size.width, size.height),
            VideoFilter::ScaleVaapi(size) => {
                format!("scale_vaapi=format=nv12:w={}:h={}", size.width, size.height)
            }
            VideoFilter::ScaleQsv(size) => format!("scale_qsv=w={}:h={}", size.width, size.height),
            VideoFilter::ScaleImage(size) => format!("scale={}:{}", size.width, size.height),
            VideoFilter::ScaleToFit { width, height } => format!(
                "scale={}:{height}:force_original_aspect_ratio=decrease",
                width.map_or_else(|| "-1".to_string(), |w| w.to_string())
            ),
            VideoFilter::Pad(size) => {
                format!("pad={}:{}:(ow-iw)/2:(oh-ih)/2", size.width, size.height)
            }
            VideoFilter::Crop(size) => format!("crop={}:{}", size.width, size.height),
            VideoFilter::Colorspace { source, format } => {
                format!("colorspace=all=bt709:iall={source}:fast=1:format={format}")
            }
            VideoFilter::Format(pf) => format!("format={pf}"),
            VideoFilter::FormatCuda(pf) => format!("scale_cuda=format={pf}"),
            VideoFilter::FormatVaapi(pf) => format!("scale_vaapi=format={pf}"),
            VideoFilter::FormatQsv(pf) => format!("vpp_qsv=format={pf}"),
            VideoFilter::HardwareDownload(pf) => format!("hwdownload,format={pf}"),
            VideoFilter::HardwareUploadCuda => "hwupload_cuda".into(),
            VideoFilter::HardwareUploadVaapi => "format=nv12|vaapi,hwupload".into(),
            VideoFilter::HardwareUploadQsv => "hwupload=extra_hw_frames=64".into(),
            VideoFilter::Subtitles { path, stream_index } => {
                format!("subtitles=filename='{}':si={stream_index}", escape_filter_path(path))
            }
            VideoFilter::WatermarkScale { width } => format!("scale={width}:-1"),
            VideoFilter::WatermarkOpacity { opacity } => format!(
                "colorchannelmixer=aa={}",
                format_decimal(f64::from(*opacity) / 100.0)
            ),
            VideoFilter::WatermarkFade(fade) => format!(
                "fade={}:st={}:d={}:alpha=1",
                if fade.fade_in { "in" } else { "out" },
                format_decimal(fade.start),
                format_decimal(fade.duration)
            ),
            VideoFilter::OverlayWatermark {
                location,
                margin_x,
                margin_y,
            } => {
                let (x, y) = match location {
                    WatermarkLocation::TopLeft => (format!("{margin_x}"), format!("{margin_y}")),
                    WatermarkLocation::TopRight => {
                        (format!("W-w-{margin_x}"), format!("{margin_y}"))
                    }
                    WatermarkLocation::BottomLeft => {
                        (format!("{margin_x}"), format!("H-h-{margin_y}"))
                    }
                    WatermarkLocation::BottomRight => {
                        (format!("W-w-{margin_x}"), format!("H-h-{margin_y}"))
                    }
                    WatermarkLocation::Center => ("(W-w)/2".to_string(), "(H-h)/2".to_string()),
                };
                format!("overlay=x={x}:y={y}")
            }
            VideoFilter::OverlaySubtitle => "overlay=x=(W-w)/2:y=(H-h)/2".into(),
        }
    }
}

/// An audio filter.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AudioFilter {
    /// Stretch/squeeze audio to match timestamps; optionally restart at zero.
    Resample { realign: bool },
    LoudNorm,
    DynAudNorm,
    /// Pad with silence to the whole duration.
    Pad { duration: Duration },
}

impl AudioFilter {
    pub fn name(&self) -> &'static str {
        match self {
            AudioFilter::Resample { .. } => "aresample",
            AudioFilter::LoudNorm => "loudnorm",
            AudioFilter::DynAudNorm => "dynaudnorm",
            AudioFilter::Pad { .. } => "apad",
        }
    }

    pub fn render(&self) -> String {
        match self {
            AudioFilter::Resample { realign: false } => "aresample=async=1".into(),
            AudioFilter::Resample { realign: true } => "aresample=async=1:first_pts=0".into(),
            AudioFilter::LoudNorm => "loudnorm=I=-16:TP=-1.5:LRA=11".into(),
            AudioFilter::DynAudNorm => "dynaudnorm=f=500:g=31".into(),
            AudioFilter::Pad { duration } => format!("apad=whole_dur={}ms", format_millis(*duration)),
        }
    }
}

/// Escape a path for use inside a quoted filter argument.
fn escape_filter_path(path: &str) -> String {
    path.replace('\\', "/")
        .replace('\'', "'\\''")
        .replace(':', "\\:")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scale_and_pad_render() {
        let scale = VideoFilter::Scale {
            size: FrameSize::new(1920, 1000),
            anamorphic: false,
        };
        assert_eq!(scale.render(), "scale=1920:1000:flags=fast_bilinear,setsar=1");
        assert_eq!(
            VideoFilter::Pad(FrameSize::new(1920, 1080)).render(),
            "pad=1920:1080:(ow-iw)/2:(oh-ih)/2"
        );
        assert_eq!(VideoFilter::Yadif.render(), "yadif=1");
    }

    #[test]
    fn scale_to_fit_with_auto_width() {
        let fit = VideoFilter::ScaleToFit { width: None, height: 200 };
        assert_eq!(fit.render(), "scale=-1:200:force_original_aspect_ratio=decrease");
        let fit = VideoFilter::ScaleToFit { width: Some(300), height: 200 };
        assert_eq!(fit.render(), "scale=300:200:force_original_aspect_ratio=decrease");
    }

    #[test]
    fn anamorphic_scale_squares_pixels_first() {
        let scale = VideoFilter::Scale {
            size: FrameSize::new(1280, 720),
            anamorphic: true,
        };
        assert_eq!(
            scale.render(),
            "scale=iw*sar:ih,setsar=1,scale=1280:720:flags=fast_bilinear,setsar=1"
        );
    }

    #[test]
    fn hardware_filters() {
        assert_eq!(
            VideoFilter::ScaleVaapi(FrameSize::new(1280, 720)).render(),
            "scale_vaapi=format=nv12:w=1280:h=720"
        );
        assert_eq!(VideoFilter::ScaleQsv(FrameSize::new(1280, 720)).render(), "scale_qsv=w=1280:h=720");
        assert_eq!(VideoFilter::HardwareUploadVaapi.name(), "hwupload");
        assert!(VideoFilter::HardwareUploadCuda.outputs_hardware_frames());
        assert!(!VideoFilter::HardwareDownload(PixelFormat::Nv12).outputs_hardware_frames());
        assert_eq!(
            VideoFilter::HardwareDownload(PixelFormat::Nv12).render(),
            "hwdownload,format=nv12"
        );
    }

    #[test]
    fn device_format_conversions() {
        let cuda = VideoFilter::FormatCuda(PixelFormat::Yuv420p);
        assert_eq!(cuda.name(), "scale_cuda");
        assert_eq!(cuda.render(), "scale_cuda=format=yuv420p");
        assert!(cuda.outputs_hardware_frames());
        assert_eq!(
            VideoFilter::FormatVaapi(PixelFormat::P010le).render(),
            "scale_vaapi=format=p010le"
        );
        assert_eq!(VideoFilter::FormatQsv(PixelFormat::Nv12).render(), "vpp_qsv=format=nv12");
    }

    #[test]
    fn watermark_filters() {
        assert_eq!(
            VideoFilter::WatermarkOpacity { opacity: 50 }.render(),
            "colorchannelmixer=aa=0.5"
        );
        let overlay = VideoFilter::OverlayWatermark {
            location: WatermarkLocation::BottomRight,
            margin_x: 96,
            margin_y: 54,
        };
        assert_eq!(overlay.render(), "overlay=x=W-w-96:y=H-h-54");
        let fade = VideoFilter::WatermarkFade(FadePoint {
            fade_in: true,
            start: 5.0,
            duration: 1.5,
        });
        assert_eq!(fade.render(), "fade=in:st=5.0:d=1.5:alpha=1");
    }

    #[test]
    fn subtitles_path_is_escaped() {
        let filter = VideoFilter::Subtitles {
            path: "C:\\media\\it's.srt".into(),
            stream_index: 0,
        };
        assert_eq!(filter.render(), "subtitles=filename='C\\:/media/it'\\''s.srt':si=0");
    }

    #[test]
    fn audio_filters() {
        assert_eq!(AudioFilter::Resample { realign: false }.render(), "aresample=async=1");
        assert_eq!(
            AudioFilter::Resample { realign: true }.render(),
            "aresample=async=1:first_pts=0"
        );
        let pad = AudioFilter::Pad {
            duration: Duration::from_micros(1_000_100),
        };
        assert_eq!(pad.render(), "apad=whole_dur=1000.1ms");
    }
}
