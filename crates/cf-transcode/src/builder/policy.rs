//! Per-accelerator knowledge, expressed as data.
//!
//! The build algorithm is shared by every acceleration mode. What differs
//! (encoder names, decoder names, which filters exist on the device, whether
//! an encoder needs frames in device memory) lives in one [`AccelPolicy`]
//! per mode.

use crate::format::{FrameSize, HardwareAccelerationMode, PixelFormat, VideoFormat};
use crate::state::FfmpegState;
use crate::step::{HardwareAccelerationOption, VideoFilter};
use crate::stream::VideoStream;

/// Default VAAPI render node.
pub const DEFAULT_VAAPI_DEVICE: &str = "/dev/dri/renderD128";

/// How an input codec is decoded on the device. `None` means the generic
/// `-hwaccel` path picks the decoder.
type DecoderEntry = (VideoFormat, Option<&'static str>);

#[derive(Debug)]
pub struct AccelPolicy {
    pub mode: HardwareAccelerationMode,
    /// Name reported by `ffmpeg -hwaccels`.
    pub hwaccel: &'static str,
    encoders: &'static [(VideoFormat, &'static str)],
    decoders: &'static [DecoderEntry],
    /// Codecs that must be decoded in software when 10-bit.
    ten_bit_software: &'static [VideoFormat],
    /// Codecs that must be decoded in software when deinterlacing.
    deinterlace_software: &'static [VideoFormat],
    pub deinterlace: Option<VideoFilter>,
    pub scale: Option<fn(FrameSize) -> VideoFilter>,
    pub upload: Option<VideoFilter>,
    /// Pixel format conversion without leaving the device.
    pub device_format: Option<fn(PixelFormat) -> VideoFilter>,
    /// Decode in software when overlays run without device scaling.
    pub software_decode_for_overlays: bool,
    /// The encoder rejects frames in system memory.
    pub encoder_requires_hw_frames: bool,
    /// Hardware decode leaves frames in device memory.
    pub decodes_to_device: bool,
}

static NVENC: AccelPolicy = AccelPolicy {
    mode: HardwareAccelerationMode::Nvenc,
    hwaccel: "cuda",
    encoders: &[
        (VideoFormat::H264, "h264_nvenc"),
        (VideoFormat::Hevc, "hevc_nvenc"),
    ],
    decoders: &[
        (VideoFormat::H264, None),
        (VideoFormat::Hevc, None),
        (VideoFormat::Mpeg2Video, None),
        (VideoFormat::Mpeg4, None),
        (VideoFormat::Vc1, None),
        (VideoFormat::Vp9, None),
        (VideoFormat::Av1, None),
    ],
    ten_bit_software: &[VideoFormat::H264],
    deinterlace_software: &[VideoFormat::Mpeg2Video],
    deinterlace: Some(VideoFilter::YadifCuda),
    scale: Some(VideoFilter::ScaleCuda),
    upload: Some(VideoFilter::HardwareUploadCuda),
    device_format: Some(cuda_format),
    software_decode_for_overlays: false,
    encoder_requires_hw_frames: false,
    decodes_to_device: true,
};

static VAAPI: AccelPolicy = AccelPolicy {
    mode: HardwareAccelerationMode::Vaapi,
    hwaccel: "vaapi",
    encoders: &[
        (VideoFormat::H264, "h264_vaapi"),
        (VideoFormat::Hevc, "hevc_vaapi"),
        (VideoFormat::Mpeg2Video, "mpeg2_vaapi"),
    ],
    decoders: &[
        (VideoFormat::H264, None),
        (VideoFormat::Hevc, None),
        (VideoFormat::Mpeg2Video, None),
        (VideoFormat::Vc1, None),
        (VideoFormat::Vp9, None),
        (VideoFormat::Av1, None),
    ],
    ten_bit_software: &[],
    deinterlace_software: &[],
    deinterlace: Some(VideoFilter::DeinterlaceVaapi),
    scale: Some(VideoFilter::ScaleVaapi),
    upload: Some(VideoFilter::HardwareUploadVaapi),
    device_format: Some(vaapi_format),
    software_decode_for_overlays: true,
    encoder_requires_hw_frames: true,
    decodes_to_device: true,
};

static QSV: AccelPolicy = AccelPolicy {
    mode: HardwareAccelerationMode::Qsv,
    hwaccel: "qsv",
    encoders: &[
        (VideoFormat::H264, "h264_qsv"),
        (VideoFormat::Hevc, "hevc_qsv"),
        (VideoFormat::Mpeg2Video, "mpeg2_qsv"),
    ],
    decoders: &[
        (VideoFormat::H264, Some("h264_qsv")),
        (VideoFormat::Hevc, Some("hevc_qsv")),
        (VideoFormat::Mpeg2Video, Some("mpeg2_qsv")),
        (VideoFormat::Vc1, Some("vc1_qsv")),
        (VideoFormat::Vp9, Some("vp9_qsv")),
    ],
    ten_bit_software: &[VideoFormat::Hevc, VideoFormat::H264],
    deinterlace_software: &[VideoFormat::H264, VideoFormat::Mpeg2Video],
    deinterlace: Some(VideoFilter::DeinterlaceQsv),
    scale: Some(VideoFilter::ScaleQsv),
    upload: Some(VideoFilter::HardwareUploadQsv),
    device_format: Some(qsv_format),
    software_decode_for_overlays: false,
    encoder_requires_hw_frames: false,
    decodes_to_device: true,
};

static VIDEO_TOOLBOX: AccelPolicy = AccelPolicy {
    mode: HardwareAccelerationMode::VideoToolbox,
    hwaccel: "videotoolbox",
    encoders: &[
        (VideoFormat::H264, "h264_videotoolbox"),
        (VideoFormat::Hevc, "hevc_videotoolbox"),
    ],
    decoders: &[(VideoFormat::H264, None), (VideoFormat::Hevc, None)],
    ten_bit_software: &[],
    deinterlace_software: &[],
    deinterlace: None,
    scale: None,
    upload: None,
    device_format: None,
    software_decode_for_overlays: false,
    encoder_requires_hw_frames: false,
    decodes_to_device: false,
};

fn cuda_format(target: PixelFormat) -> VideoFilter {
    VideoFilter::FormatCuda(target)
}

fn vaapi_format(target: PixelFormat) -> VideoFilter {
    VideoFilter::FormatVaapi(target.hardware_surface_format())
}

fn qsv_format(target: PixelFormat) -> VideoFilter {
    VideoFilter::FormatQsv(target.hardware_surface_format())
}

impl AccelPolicy {
    /// The policy for `mode`, or `None` for software.
    pub fn for_mode(mode: HardwareAccelerationMode) -> Option<&'static AccelPolicy> {
        match mode {
            HardwareAccelerationMode::None => None,
            HardwareAccelerationMode::Nvenc => Some(&NVENC),
            HardwareAccelerationMode::Vaapi => Some(&VAAPI),
            HardwareAccelerationMode::Qsv => Some(&QSV),
            HardwareAccelerationMode::VideoToolbox => Some(&VIDEO_TOOLBOX),
        }
    }

    /// Device encoder producing `format`.
    pub fn encoder(&self, format: &VideoFormat) -> Option<&'static str> {
        self.encoders
            .iter()
            .find(|(f, _)| f == format)
            .map(|(_, name)| *name)
    }

    /// Whether `format` can be decoded on the device at all, and the named
    /// decoder when the generic `-hwaccel` path is not used.
    pub fn decoder_entry(&self, format: &VideoFormat) -> Option<Option<&'static str>> {
        self.decoders.iter().find(|(f, _)| f == format).map(|(_, name)| *name)
    }

    /// Device decoder for `stream`.
    ///
    /// `Err(reason)` when the stream must be decoded in software. `Ok(None)`
    /// selects the implicit `-hwaccel` decoder.
    pub fn decoder(
        &self,
        stream: &VideoStream,
        deinterlace: bool,
    ) -> Result<Option<&'static str>, &'static str> {
        let Some(name) = self.decoder_entry(&stream.codec) else {
            return Err("codec has no hardware decoder");
        };
        let ten_bit = stream.pixel_format.as_ref().is_some_and(|pf| pf.bit_depth() == 10);
        if ten_bit && self.ten_bit_software.contains(&stream.codec) {
            return Err("10-bit content is not decoded on this device");
        }
        if deinterlace && self.deinterlace_software.contains(&stream.codec) {
            return Err("interlaced content is deinterlaced in software");
        }
        Ok(name)
    }

    /// Device setup for the global section.
    pub fn device_option(&self, ffmpeg: &FfmpegState, decode: bool) -> HardwareAccelerationOption {
        match self.mode {
            HardwareAccelerationMode::Vaapi => HardwareAccelerationOption::Vaapi {
                device: ffmpeg
                    .vaapi_device
                    .clone()
                    .unwrap_or_else(|| DEFAULT_VAAPI_DEVICE.to_string()),
                decode,
            },
            HardwareAccelerationMode::Qsv => HardwareAccelerationOption::Qsv {
                device: ffmpeg.qsv_device.clone(),
                decode,
            },
            HardwareAccelerationMode::VideoToolbox => {
                HardwareAccelerationOption::VideoToolbox { decode }
            }
            HardwareAccelerationMode::Nvenc | HardwareAccelerationMode::None => {
                HardwareAccelerationOption::Cuda { decode }
            }
        }
    }
}

/// Intel media stack: QSV, or VAAPI on a non-AMD driver.
pub fn is_intel_vaapi_or_qsv(mode: HardwareAccelerationMode, vaapi_driver: Option<&str>) -> bool {
    match mode {
        HardwareAccelerationMode::Qsv => true,
        HardwareAccelerationMode::Vaapi => !vaapi_driver
            .is_some_and(|d| d.to_ascii_lowercase().starts_with("radeon")),
        _ => false,
    }
}
