//! Instruction selection.
//!
//! [`PipelineBuilder::build`] turns probed inputs, the desired frame and
//! ffmpeg state, and a [`Capabilities`] snapshot into an ordered list of
//! [`PipelineStep`]s. One algorithm serves every acceleration mode; the
//! per-device differences come from [`AccelPolicy`].
//!
//! The builder never fails because a device feature is missing. Anything
//! the snapshot does not list is replaced by its software equivalent and a
//! warning is logged. Only contradictory requests are errors.

mod auxiliary;
mod policy;

pub use policy::{is_intel_vaapi_or_qsv, AccelPolicy, DEFAULT_VAAPI_DEVICE};

use std::sync::Arc;

use cf_core::{Error, Result};
use serde::Serialize;
use tracing::{debug, warn};

use crate::capabilities::Capabilities;
use crate::complex_filter::{ComplexFilter, FilterChain, SubtitleStage};
use crate::format::{
    AudioFormat, FrameSize, HardwareAccelerationMode, OutputFormatKind, PixelFormat, ScanKind,
    VideoFormat,
};
use crate::generator::{self, FfmpegCommand};
use crate::input::{InputFile, PipelineInputs};
use crate::state::{
    AudioNormalization, FfmpegState, FrameState, SubtitleMethod, WatermarkSize,
};
use crate::step::{
    AudioEncoder, AudioFilter, Decoder, EnvironmentVariable, GlobalOption, InputOption,
    OutputFormat, OutputOption, PipelineStep, SubtitleEncoder, VideoEncoder, VideoFilter,
};
use crate::stream::VideoStream;

/// `-sc_threshold` value that effectively disables scene-cut keyframes.
const SCENE_DETECT_OFF: u32 = 1_000_000_000;

const READRATE: f64 = 1.0;
/// Read slightly faster than realtime after a seek to refill the buffer.
const READRATE_AFTER_SEEK: f64 = 1.05;

/// Seconds read ahead so loudness filters have lookahead.
const LOUDNORM_BURST: u32 = 5;
const DYNAUDNORM_BURST: u32 = 15;

const DEFAULT_HLS_SEGMENT_SECONDS: u32 = 4;

const HWDOWNLOAD: &str = "hwdownload";

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// A built pipeline: the steps plus the inputs their options were added to.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Pipeline {
    pub steps: Vec<PipelineStep>,
    pub inputs: PipelineInputs,
    /// The selected device path runs on Intel's media stack.
    pub is_intel_vaapi_or_qsv: bool,
}

impl Pipeline {
    /// The ordered argument vector.
    pub fn arguments(&self) -> Vec<String> {
        generator::generate_arguments(&self.inputs, &self.steps)
    }

    pub fn command(&self) -> FfmpegCommand {
        generator::generate(self)
    }

    pub fn video_encoder(&self) -> Option<&VideoEncoder> {
        self.steps.iter().find_map(|s| match s {
            PipelineStep::VideoEncoder(e) => Some(e),
            _ => None,
        })
    }

    pub fn audio_encoder(&self) -> Option<&AudioEncoder> {
        self.steps.iter().find_map(|s| match s {
            PipelineStep::AudioEncoder(e) => Some(e),
            _ => None,
        })
    }

    pub fn decoder(&self) -> Option<&Decoder> {
        self.steps.iter().find_map(|s| match s {
            PipelineStep::Decoder(d) => Some(d),
            _ => None,
        })
    }

    pub fn complex_filter(&self) -> Option<&ComplexFilter> {
        self.steps.iter().find_map(|s| match s {
            PipelineStep::ComplexFilter(f) => Some(f),
            _ => None,
        })
    }

    pub fn is_video_copied(&self) -> bool {
        matches!(self.video_encoder(), Some(VideoEncoder::Copy))
    }

    pub fn uses_hardware_encoder(&self) -> bool {
        self.video_encoder().is_some_and(VideoEncoder::is_hardware)
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Builds pipelines against one capability snapshot.
#[derive(Debug, Clone)]
pub struct PipelineBuilder {
    capabilities: Arc<Capabilities>,
}

/// What the video stream needs, independent of any device.
#[derive(Debug)]
struct VideoPlan {
    deinterlace: bool,
    scale: bool,
    /// Source pixels are stretched to square before scaling.
    anamorphic: bool,
    pad: Option<FrameSize>,
    crop: Option<FrameSize>,
    colorspace: Option<(&'static str, &'static str)>,
    target_pixel_format: PixelFormat,
    watermark: bool,
    /// Any subtitle burned into the frames.
    burn: bool,
    /// A picture subtitle overlaid onto the frames.
    subtitle_overlay: bool,
    copy: bool,
}

impl VideoPlan {
    fn new(stream: &VideoStream, inputs: &PipelineInputs, desired: &FrameState) -> Self {
        let anamorphic = stream.is_anamorphic() && !desired.is_anamorphic;
        let scale = stream.frame_size != desired.scaled_size || anamorphic;
        let deinterlace = desired.deinterlaced && stream.scan_kind != ScanKind::Progressive;
        let pad = desired.padded_size.filter(|p| *p != desired.scaled_size);
        let crop = desired.cropped_size.filter(|c| *c != desired.final_size());
        let target_pixel_format = desired
            .pixel_format
            .clone()
            .or_else(|| stream.pixel_format.clone())
            .unwrap_or(PixelFormat::Yuv420p);
        let colorspace = stream
            .color_params
            .conversion_source()
            .zip(target_pixel_format.colorspace_format());

        let pixel_format_differs = desired
            .pixel_format
            .as_ref()
            .is_some_and(|pf| stream.pixel_format.as_ref() != Some(pf));
        let frame_rate_differs = desired.frame_rate.is_some_and(|rate| {
            stream
                .frame_rate_value()
                .map_or(true, |current| (current - f64::from(rate)).abs() > 0.01)
        });
        let burned = inputs
            .subtitle
            .as_ref()
            .filter(|s| s.method == SubtitleMethod::Burn)
            .and_then(|s| s.subtitle_stream());
        let burn = burned.is_some();
        let subtitle_overlay = burned.is_some_and(|s| s.is_image_based());
        let watermark = inputs.watermark.is_some();

        let copy = desired.video_format == VideoFormat::Copy
            || (desired.video_format == stream.codec
                && !pixel_format_differs
                && !scale
                && pad.is_none()
                && crop.is_none()
                && !deinterlace
                && !frame_rate_differs
                && colorspace.is_none()
                && !watermark
                && !burn
                && !stream.still_image);

        Self {
            deinterlace,
            scale,
            anamorphic,
            pad,
            crop,
            colorspace,
            target_pixel_format,
            watermark,
            burn,
            subtitle_overlay,
            copy,
        }
    }

    /// Whether any stage has no device filter and must see frames in system
    /// memory.
    fn needs_system_memory(&self, policy: &AccelPolicy, capabilities: &Capabilities) -> bool {
        let on_device = |filter: Option<VideoFilter>| {
            filter.is_some_and(|f| capabilities.has_filter(f.name()))
        };
        self.pad.is_some()
            || self.crop.is_some()
            || self.colorspace.is_some()
            || self.watermark
            || self.burn
            || (self.deinterlace && !on_device(policy.deinterlace.clone()))
            || (self.scale
                && (self.anamorphic || !on_device(policy.scale.map(|s| s(FrameSize::default())))))
    }
}

/// Devices chosen for decode and encode after capability checks.
#[derive(Debug)]
struct Acceleration {
    policy: Option<&'static AccelPolicy>,
    decoder: Decoder,
    encoder: VideoEncoder,
}

/// Tracks where frames live and what format they are in while filters are
/// chosen.
struct FrameCursor<'a> {
    capabilities: &'a Capabilities,
    policy: Option<&'static AccelPolicy>,
    hardware_encoder: bool,
    /// Frames may be uploaded mid-chain; they can come back if needed.
    may_upload: bool,
    on_device: bool,
    pixel_format: PixelFormat,
    filters: Vec<VideoFilter>,
}

impl FrameCursor<'_> {
    fn available(&self, filter: &VideoFilter) -> bool {
        self.capabilities.has_filter(filter.name())
    }

    fn upload_filter(&self) -> Option<VideoFilter> {
        self.policy?.upload.clone().filter(|u| self.available(u))
    }

    /// Run `hardware` when frames are on the device, or when uploading them
    /// pays off because the encoder is on the device too. Otherwise run
    /// `software`, downloading first if needed.
    fn apply(&mut self, software: VideoFilter, hardware: Option<VideoFilter>) {
        if let Some(hw) = hardware.filter(|f| self.available(f)) {
            if self.on_device {
                self.push_device_filter(hw);
                return;
            }
            if self.hardware_encoder && self.may_upload {
                if let Some(upload) = self.upload_filter() {
                    self.filters.push(upload);
                    self.push_device_filter(hw);
                    return;
                }
            }
        }
        self.download();
        self.filters.push(software);
    }

    fn push_device_filter(&mut self, filter: VideoFilter) {
        self.on_device = filter.outputs_hardware_frames();
        self.filters.push(filter);
    }

    fn download(&mut self) {
        if self.on_device {
            let format = self.pixel_format.hardware_surface_format();
            self.filters.push(VideoFilter::HardwareDownload(format.clone()));
            self.pixel_format = format;
            self.on_device = false;
        }
    }
}

impl PipelineBuilder {
    pub fn new(capabilities: Arc<Capabilities>) -> Self {
        Self { capabilities }
    }

    pub fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    /// Build the primary transcode pipeline.
    ///
    /// # Errors
    ///
    /// [`Error::Pipeline`] when the inputs cannot feed the request (no video
    /// stream), [`Error::Validation`] when the desired state contradicts
    /// itself (zero duration, padding smaller than the frame, HLS without a
    /// playlist, an output codec nothing can encode).
    pub fn build(
        &self,
        mut inputs: PipelineInputs,
        ffmpeg: &FfmpegState,
        desired: &FrameState,
    ) -> Result<Pipeline> {
        let stream = validate(&inputs, ffmpeg, desired)?;
        let plan = VideoPlan::new(&stream, &inputs, desired);
        let accel = if plan.copy {
            Acceleration {
                policy: None,
                decoder: Decoder::Implicit { hardware: false },
                encoder: VideoEncoder::Copy,
            }
        } else {
            self.accelerate(&stream, &plan, ffmpeg, desired)?
        };
        debug!(
            copy = plan.copy,
            decoder = ?accel.decoder,
            encoder = accel.encoder.name(),
            "Selected video path"
        );

        let mut steps: Vec<PipelineStep> = vec![
            GlobalOption::NoStdin.into(),
            GlobalOption::HideBanner.into(),
            GlobalOption::NoStats.into(),
            GlobalOption::LoglevelError.into(),
            GlobalOption::StandardFormatFlags.into(),
        ];
        if accel.policy.is_some() {
            steps.insert(0, GlobalOption::ThreadCount(1).into());
        } else if let Some(threads) = ffmpeg.thread_count {
            steps.insert(0, GlobalOption::ThreadCount(threads).into());
        }
        if let Some(policy) = accel.policy {
            let device = policy.device_option(ffmpeg, accel.decoder.is_hardware());
            steps.push(GlobalOption::HardwareAcceleration(device).into());
            if policy.mode == HardwareAccelerationMode::Vaapi {
                if let Some(driver) = &ffmpeg.vaapi_driver {
                    steps.push(PipelineStep::Environment(EnvironmentVariable {
                        name: "LIBVA_DRIVER_NAME".into(),
                        value: driver.clone(),
                    }));
                }
            }
        }

        steps.push(OutputOption::NoDemuxDecodeDelay.into());
        steps.push(if ffmpeg.output_format == OutputFormatKind::Mp4 {
            OutputOption::FragmentedMp4.into()
        } else {
            OutputOption::FastStart.into()
        });
        steps.push(OutputOption::ClosedGop.into());
        if !plan.copy && !desired.allow_b_frames {
            steps.push(OutputOption::NoBFrames.into());
        }
        let toolbox_decode = accel.decoder.is_hardware()
            && accel.policy.is_some_and(|p| p.mode == HardwareAccelerationMode::VideoToolbox);
        let scene_detect = if stream.codec == VideoFormat::Mpeg2Video
            || desired.video_format == VideoFormat::Mpeg2Video
            || toolbox_decode
        {
            SCENE_DETECT_OFF
        } else {
            0
        };
        steps.push(OutputOption::SceneDetect(scene_detect).into());
        if let Some(finish) = ffmpeg.finish {
            steps.push(OutputOption::TimeLimit(finish).into());
        }

        self.add_input_options(&mut inputs, &stream, &plan, &accel, ffmpeg, desired);

        let mut chain = FilterChain::default();
        if plan.copy {
            steps.push(PipelineStep::VideoEncoder(VideoEncoder::Copy));
        } else {
            if let Some(rate) = desired.frame_rate {
                steps.push(OutputOption::FrameRate(rate).into());
            }
            if let Some(timescale) = desired.video_track_timescale {
                steps.push(OutputOption::VideoTrackTimescale(timescale).into());
            }
            if let Some(bitrate) = desired.video_bitrate {
                steps.push(OutputOption::VideoBitrate(bitrate).into());
            }
            if let Some(buffer) = desired.video_buffer_size {
                steps.push(OutputOption::VideoBufferSize(buffer).into());
            }

            let output_pixel_format =
                self.plan_video_filters(&mut chain, &mut inputs, &stream, &plan, &accel, desired);

            steps.push(PipelineStep::Decoder(accel.decoder.clone()));
            steps.push(PipelineStep::VideoEncoder(accel.encoder.clone()));
            if let Some(profile) = &desired.video_profile {
                steps.push(OutputOption::VideoProfile(profile.clone()).into());
            }
            if let Some(pixel_format) = output_pixel_format {
                steps.push(OutputOption::PixelFormat(pixel_format).into());
            }
            if ffmpeg.pts_offset > 0 {
                if let Some(timescale) = desired.video_track_timescale {
                    steps.push(
                        OutputOption::OutputTsOffset {
                            pts_offset: ffmpeg.pts_offset,
                            timescale,
                        }
                        .into(),
                    );
                }
            }
        }

        plan_audio(&mut steps, &mut chain, &inputs, ffmpeg);

        let mut map_subtitle = false;
        if let Some(subtitle) = &inputs.subtitle {
            if let Some(stream) = subtitle.subtitle_stream() {
                match subtitle.method {
                    SubtitleMethod::Copy => {
                        steps.push(PipelineStep::SubtitleEncoder(SubtitleEncoder::Copy));
                        map_subtitle = true;
                    }
                    SubtitleMethod::Convert => {
                        let encoder = if stream.is_image_based() {
                            SubtitleEncoder::DvdSub
                        } else {
                            SubtitleEncoder::Copy
                        };
                        steps.push(PipelineStep::SubtitleEncoder(encoder));
                        map_subtitle = true;
                    }
                    SubtitleMethod::Burn => {}
                }
            }
        }

        add_metadata(&mut steps, ffmpeg);
        let segment_seconds = ffmpeg
            .hls_segment_seconds
            .unwrap_or(DEFAULT_HLS_SEGMENT_SECONDS);
        let gop_size = desired
            .frame_rate
            .filter(|_| !plan.copy)
            .map(|rate| rate.saturating_mul(segment_seconds));
        add_output_target(&mut steps, ffmpeg, gop_size)?;

        steps.push(PipelineStep::ComplexFilter(ComplexFilter {
            chain,
            map_default_audio: inputs.audio.is_none(),
            map_subtitle,
        }));

        let accel_mode = accel.policy.map_or(HardwareAccelerationMode::None, |p| p.mode);
        Ok(Pipeline {
            steps,
            inputs,
            is_intel_vaapi_or_qsv: is_intel_vaapi_or_qsv(accel_mode, ffmpeg.vaapi_driver.as_deref()),
        })
    }

    /// Pick encoder and decoder, downgrading to software wherever the
    /// snapshot lacks what a device path needs.
    fn accelerate(
        &self,
        stream: &VideoStream,
        plan: &VideoPlan,
        ffmpeg: &FfmpegState,
        desired: &FrameState,
    ) -> Result<Acceleration> {
        let encoder = self.select_encoder(ffmpeg, desired)?;
        let encode_policy = encoder
            .is_hardware()
            .then(|| AccelPolicy::for_mode(ffmpeg.encoder_hardware_acceleration))
            .flatten();

        let software_decoder = match stream.codec.software_decoder() {
            Some(name) => Decoder::Software(name),
            None => Decoder::Implicit { hardware: false },
        };
        let (decoder, decode_policy) = match AccelPolicy::for_mode(ffmpeg.decoder_hardware_acceleration) {
            None => (software_decoder, None),
            Some(policy) => match self.select_decoder(policy, stream, plan, encode_policy) {
                Some(decoder) => (decoder, Some(policy)),
                None => (software_decoder, None),
            },
        };

        Ok(Acceleration {
            policy: encode_policy.or(decode_policy),
            decoder,
            encoder,
        })
    }

    fn select_encoder(&self, ffmpeg: &FfmpegState, desired: &FrameState) -> Result<VideoEncoder> {
        if let Some(policy) = AccelPolicy::for_mode(ffmpeg.encoder_hardware_acceleration) {
            match policy.encoder(&desired.video_format) {
                Some(name) if self.capabilities.has_encoder(name) && self.can_feed(policy) => {
                    return Ok(VideoEncoder::Hardware {
                        name,
                        format: desired.video_format.clone(),
                    });
                }
                Some(name) => {
                    warn!(encoder = name, mode = %policy.mode, "Hardware encoder unavailable; using software encoder");
                }
                None => {
                    warn!(format = %desired.video_format, mode = %policy.mode, "No hardware encoder for format; using software encoder");
                }
            }
        }

        VideoEncoder::software(&desired.video_format).ok_or_else(|| {
            Error::validation(format!(
                "no encoder produces video format '{}'",
                desired.video_format
            ))
        })
    }

    /// Whether frames can be handed to `policy`'s encoder at all.
    fn can_feed(&self, policy: &AccelPolicy) -> bool {
        !policy.encoder_requires_hw_frames
            || policy
                .upload
                .as_ref()
                .is_some_and(|u| self.capabilities.has_filter(u.name()))
    }

    fn select_decoder(
        &self,
        policy: &'static AccelPolicy,
        stream: &VideoStream,
        plan: &VideoPlan,
        encode_policy: Option<&'static AccelPolicy>,
    ) -> Option<Decoder> {
        if encode_policy.is_some_and(|p| p.mode != policy.mode) {
            warn!(decode = %policy.mode, "Decoder and encoder use different devices; decoding in software");
            return None;
        }
        if !self.capabilities.has_hardware_accel(policy.hwaccel) {
            warn!(hwaccel = policy.hwaccel, "Hardware acceleration unavailable; decoding in software");
            return None;
        }
        if policy.software_decode_for_overlays
            && (plan.watermark || plan.subtitle_overlay)
            && ((plan.watermark && plan.subtitle_overlay) || !plan.scale)
        {
            debug!(mode = %policy.mode, "Overlays without device scaling; decoding in software");
            return None;
        }
        if policy.decodes_to_device
            && !self.capabilities.has_filter(HWDOWNLOAD)
            && (encode_policy.is_none() || plan.needs_system_memory(policy, &self.capabilities))
        {
            warn!(mode = %policy.mode, "Frames could not leave the device without hwdownload; decoding in software");
            return None;
        }
        match policy.decoder(stream, plan.deinterlace) {
            Err(reason) => {
                debug!(codec = %stream.codec, reason, "Decoding in software");
                None
            }
            Ok(Some(name)) if self.capabilities.has_decoder(name) => Some(Decoder::Hardware(name)),
            Ok(Some(name)) => {
                warn!(decoder = name, "Hardware decoder unavailable; decoding in software");
                None
            }
            Ok(None) => Some(Decoder::Implicit { hardware: true }),
        }
    }

    fn add_input_options(
        &self,
        inputs: &mut PipelineInputs,
        stream: &VideoStream,
        plan: &VideoPlan,
        accel: &Acceleration,
        ffmpeg: &FfmpegState,
        desired: &FrameState,
    ) {
        let seek = ffmpeg.seek();
        let readrate = desired.realtime.then(|| {
            let burst = match inputs.audio.as_ref().map(|a| a.desired.normalize_loudness) {
                Some(AudioNormalization::LoudNorm) => Some(LOUDNORM_BURST),
                Some(AudioNormalization::DynAudNorm) => Some(DYNAUDNORM_BURST),
                _ => None,
            };
            InputOption::Readrate {
                speed: if seek.is_some() { READRATE_AFTER_SEEK } else { READRATE },
                initial_burst: burst,
            }
        });
        let burn_text = inputs.subtitle.as_ref().is_some_and(|s| {
            s.method == SubtitleMethod::Burn && s.subtitle_stream().is_some_and(|st| !st.is_image_based())
        });

        if let Some(video) = inputs.video.as_mut() {
            if let Some(start) = seek {
                video.add_option(InputOption::StreamSeek(start));
            }
            if !plan.copy && accel.decoder.name().is_some() {
                video.add_option(InputOption::Decoder(accel.decoder.clone()));
            }
            if stream.still_image {
                video.add_option(InputOption::StillImageLoop);
            }
            if let Some(readrate) = &readrate {
                video.add_option(readrate.clone());
            }
            if desired.infinite_loop && !stream.still_image {
                video.add_option(InputOption::InfiniteLoop);
            }
            if burn_text && seek.is_some() && !plan.copy {
                video.add_option(InputOption::CopyTimestamps);
            }
        }

        if let Some(audio) = inputs.audio.as_mut() {
            if let Some(start) = seek {
                audio.add_option(InputOption::StreamSeek(start));
            }
            if let Some(readrate) = &readrate {
                audio.add_option(readrate.clone());
            }
            if desired.infinite_loop {
                audio.add_option(InputOption::InfiniteLoop);
            }
        }
    }

    /// Fill the video side of `chain`. Returns the `-pix_fmt` the encoder
    /// needs when the conversion cannot happen inside the graph.
    fn plan_video_filters(
        &self,
        chain: &mut FilterChain,
        inputs: &mut PipelineInputs,
        stream: &VideoStream,
        plan: &VideoPlan,
        accel: &Acceleration,
        desired: &FrameState,
    ) -> Option<PixelFormat> {
        let policy = accel.policy;
        let mut cursor = FrameCursor {
            capabilities: &self.capabilities,
            policy,
            hardware_encoder: accel.encoder.is_hardware(),
            may_upload: self.capabilities.has_filter(HWDOWNLOAD)
                || policy.is_some_and(|p| !plan.needs_system_memory(p, &self.capabilities)),
            on_device: accel.decoder.is_hardware() && policy.is_some_and(|p| p.decodes_to_device),
            pixel_format: stream
                .pixel_format
                .clone()
                .unwrap_or_else(|| plan.target_pixel_format.clone()),
            filters: Vec::new(),
        };

        if plan.deinterlace {
            cursor.apply(VideoFilter::Yadif, policy.and_then(|p| p.deinterlace.clone()));
        }
        if plan.scale {
            let size = desired.scaled_size;
            if plan.anamorphic {
                cursor.apply(VideoFilter::Scale { size, anamorphic: true }, None);
            } else {
                cursor.apply(
                    VideoFilter::Scale { size, anamorphic: false },
                    policy.and_then(|p| p.scale).map(|scale| scale(size)),
                );
            }
        }
        if let Some(size) = plan.pad {
            cursor.apply(VideoFilter::Pad(size), None);
        }
        if let Some(size) = plan.crop {
            cursor.apply(VideoFilter::Crop(size), None);
        }
        if let Some((source, format)) = plan.colorspace {
            cursor.apply(VideoFilter::Colorspace { source, format }, None);
            cursor.pixel_format = plan.target_pixel_format.clone();
        }

        let final_size = desired.final_size();
        if let Some(watermark) = inputs.watermark.as_mut() {
            cursor.download();
            let state = &watermark.desired;
            chain.watermark.push(VideoFilter::Format(PixelFormat::Yuva420p));
            if state.size == WatermarkSize::Scaled {
                chain.watermark.push(VideoFilter::WatermarkScale {
                    width: percent_of(final_size.width, state.width_percent),
                });
            }
            if state.opacity < 100 {
                chain.watermark.push(VideoFilter::WatermarkOpacity {
                    opacity: state.opacity,
                });
            }
            chain
                .watermark
                .extend(state.fade_points.iter().cloned().map(VideoFilter::WatermarkFade));
            chain.watermark_overlay = Some(VideoFilter::OverlayWatermark {
                location: state.location,
                margin_x: percent_of(final_size.width, state.horizontal_margin_percent),
                margin_y: percent_of(final_size.height, state.vertical_margin_percent),
            });

            if watermark.is_animated() {
                watermark.add_option(InputOption::DoNotIgnoreLoop);
            } else if !state.fade_points.is_empty() {
                watermark.add_option(InputOption::StillImageLoop);
            }
        }

        if let Some(subtitle) = inputs.subtitle.as_ref().filter(|s| s.method == SubtitleMethod::Burn) {
            if let Some(sub_stream) = subtitle.subtitle_stream() {
                cursor.download();
                if sub_stream.is_image_based() {
                    if plan.scale || plan.pad.is_some() {
                        chain.subtitle.push(VideoFilter::ScaleImage(final_size));
                    }
                    chain.subtitle_stage = Some(SubtitleStage::Overlay(VideoFilter::OverlaySubtitle));
                } else {
                    chain.subtitle_stage = Some(SubtitleStage::Burn(VideoFilter::Subtitles {
                        path: subtitle.path.clone(),
                        stream_index: sub_stream.index,
                    }));
                }
            }
        }

        let target = plan.target_pixel_format.clone();
        let mut output_pixel_format = None;
        if cursor.hardware_encoder {
            let requires_device_frames = policy.is_some_and(|p| p.encoder_requires_hw_frames);
            let converts =
                cursor.pixel_format.hardware_surface_format() != target.hardware_surface_format();
            if converts && cursor.on_device {
                let device_format = policy
                    .and_then(|p| p.device_format)
                    .map(|format| format(target.clone()))
                    .filter(|f| cursor.available(f));
                match device_format {
                    Some(filter) => {
                        chain.tail.push(filter);
                        cursor.pixel_format = target.clone();
                    }
                    None => output_pixel_format = Some(target.clone()),
                }
            } else if converts && requires_device_frames {
                chain.tail.push(VideoFilter::Format(target.clone()));
                cursor.pixel_format = target.clone();
            } else if converts {
                output_pixel_format = Some(target.clone());
            }
            if !cursor.on_device && requires_device_frames {
                if let Some(upload) = cursor.upload_filter() {
                    chain.tail.push(upload);
                }
            }
        } else {
            if cursor.on_device {
                let format = cursor.pixel_format.hardware_surface_format();
                chain.tail.push(VideoFilter::HardwareDownload(format.clone()));
                cursor.pixel_format = format;
            }
            if cursor.pixel_format != target {
                output_pixel_format = Some(target);
            }
        }

        chain.video = cursor.filters;
        output_pixel_format
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn validate(inputs: &PipelineInputs, ffmpeg: &FfmpegState, desired: &FrameState) -> Result<VideoStream> {
    let video = inputs.video.as_ref();
    if desired.deinterlaced && video.map_or(true, |v| v.video_streams.is_empty()) {
        return Err(Error::pipeline(
            "deinterlace",
            "deinterlace requested but the input has no video stream",
        ));
    }
    let video = video.ok_or_else(|| Error::pipeline("video", "no video input"))?;
    let stream = video
        .video_stream()
        .ok_or_else(|| Error::pipeline("video", format!("{} has no video stream", video.path)))?;

    if ffmpeg.finish.is_some_and(|f| f.is_zero()) {
        return Err(Error::validation("output duration must be greater than zero"));
    }
    if desired.video_format != VideoFormat::Copy {
        if desired.scaled_size.is_empty() {
            return Err(Error::validation(format!(
                "scaled size {} has a zero dimension",
                desired.scaled_size
            )));
        }
        if let Some(padded) = desired.padded_size {
            if padded.width < desired.scaled_size.width || padded.height < desired.scaled_size.height {
                return Err(Error::validation(format!(
                    "padded size {padded} is smaller than scaled size {}",
                    desired.scaled_size
                )));
            }
        }
    }
    Ok(stream.clone())
}

/// Audio encoder, its options, and audio filters.
fn plan_audio(
    steps: &mut Vec<PipelineStep>,
    chain: &mut FilterChain,
    inputs: &PipelineInputs,
    ffmpeg: &FfmpegState,
) {
    let Some((audio, stream)) = inputs
        .audio
        .as_ref()
        .and_then(|a| Some((a, a.audio_stream()?)))
    else {
        steps.push(PipelineStep::AudioEncoder(AudioEncoder::Copy));
        return;
    };
    let desired = &audio.desired;

    let format = match desired.audio_format {
        None | Some(AudioFormat::Copy) => {
            steps.push(PipelineStep::AudioEncoder(AudioEncoder::Copy));
            return;
        }
        Some(format) => format,
    };

    let matches = stream.codec == format.name()
        && desired.audio_channels.map_or(true, |c| c == stream.channels)
        && stream.sample_rate.is_some()
        && desired.audio_sample_rate.map_or(true, |r| Some(r) == stream.sample_rate)
        && desired.normalize_loudness == AudioNormalization::None
        && desired.audio_duration.is_none()
        && !ffmpeg.audio_realign;
    if matches {
        steps.push(PipelineStep::AudioEncoder(AudioEncoder::Copy));
        return;
    }

    steps.push(PipelineStep::AudioEncoder(AudioEncoder::from(format)));
    if let Some(channels) = desired.audio_channels.filter(|c| *c != stream.channels) {
        steps.push(OutputOption::AudioChannels(channels).into());
    }
    if let Some(bitrate) = desired.audio_bitrate {
        steps.push(OutputOption::AudioBitrate(bitrate).into());
    }
    if let Some(buffer) = desired.audio_buffer_size {
        steps.push(OutputOption::AudioBufferSize(buffer).into());
    }
    if let Some(rate) = desired.audio_sample_rate {
        steps.push(OutputOption::AudioSampleRate(rate).into());
    }

    chain.audio.push(AudioFilter::Resample {
        realign: ffmpeg.audio_realign,
    });
    match desired.normalize_loudness {
        AudioNormalization::LoudNorm => chain.audio.push(AudioFilter::LoudNorm),
        AudioNormalization::DynAudNorm => chain.audio.push(AudioFilter::DynAudNorm),
        AudioNormalization::None => {}
    }
    if let Some(duration) = desired.audio_duration {
        chain.audio.push(AudioFilter::Pad { duration });
    }
}

fn add_metadata(steps: &mut Vec<PipelineStep>, ffmpeg: &FfmpegState) {
    if ffmpeg.do_not_map_metadata {
        steps.push(OutputOption::DoNotMapMetadata.into());
    }
    if let Some(provider) = &ffmpeg.metadata_service_provider {
        steps.push(OutputOption::MetadataServiceProvider(provider.clone()).into());
    }
    if let Some(name) = &ffmpeg.metadata_service_name {
        steps.push(OutputOption::MetadataServiceName(name.clone()).into());
    }
    if let Some(language) = &ffmpeg.metadata_audio_language {
        steps.push(OutputOption::MetadataAudioLanguage(language.clone()).into());
    }
    if let Some(language) = &ffmpeg.metadata_subtitle_language {
        steps.push(OutputOption::MetadataSubtitleLanguage(language.clone()).into());
    }
    if let Some(title) = &ffmpeg.metadata_subtitle_title {
        steps.push(OutputOption::MetadataSubtitleTitle(title.clone()).into());
    }
}

/// Container flags and the output target, chosen from the output format only.
fn add_output_target(
    steps: &mut Vec<PipelineStep>,
    ffmpeg: &FfmpegState,
    gop_size: Option<u32>,
) -> Result<()> {
    let format = match ffmpeg.output_format {
        OutputFormatKind::Mkv => OutputFormat::Matroska,
        OutputFormatKind::MpegTs => OutputFormat::MpegTs {
            initial_discontinuity: true,
        },
        OutputFormatKind::Mp4 => OutputFormat::Mp4,
        OutputFormatKind::Hls => {
            let (Some(playlist_path), Some(segment_template)) =
                (&ffmpeg.hls_playlist_path, &ffmpeg.hls_segment_template)
            else {
                return Err(Error::validation(
                    "hls output needs both a playlist path and a segment template",
                ));
            };
            steps.push(
                OutputOption::Format(OutputFormat::Hls {
                    segment_seconds: ffmpeg
                        .hls_segment_seconds
                        .unwrap_or(DEFAULT_HLS_SEGMENT_SECONDS),
                    gop_size,
                    segment_template: segment_template.clone(),
                    playlist_path: playlist_path.clone(),
                })
                .into(),
            );
            return Ok(());
        }
    };
    steps.push(OutputOption::Format(format).into());
    steps.push(OutputOption::Pipe.into());
    Ok(())
}

fn percent_of(value: u32, percent: f64) -> u32 {
    (f64::from(value) * percent / 100.0).round() as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::VideoInputFile;

    fn stream() -> VideoStream {
        let mut s = VideoStream::new(0, VideoFormat::H264, FrameSize::new(1920, 1080));
        s.pixel_format = Some(PixelFormat::Yuv420p);
        s
    }

    fn inputs_for(stream: VideoStream) -> PipelineInputs {
        PipelineInputs {
            video: Some(VideoInputFile::new("/media/a.mkv", vec![stream])),
            ..PipelineInputs::default()
        }
    }

    #[test]
    fn plan_copies_identical_video() {
        let desired = FrameState::new(VideoFormat::H264, FrameSize::new(1920, 1080));
        let plan = VideoPlan::new(&stream(), &inputs_for(stream()), &desired);
        assert!(plan.copy);
        assert!(!plan.scale);
    }

    #[test]
    fn plan_transcodes_still_images_and_color_conversions() {
        let desired = FrameState::new(VideoFormat::H264, FrameSize::new(1920, 1080));

        let mut still = stream();
        still.still_image = true;
        assert!(!VideoPlan::new(&still, &inputs_for(still.clone()), &desired).copy);

        let mut pal = stream();
        pal.color_params.color_space = Some("bt470bg".into());
        let plan = VideoPlan::new(&pal, &inputs_for(pal.clone()), &desired);
        assert!(!plan.copy);
        assert_eq!(plan.colorspace, Some(("bt470bg", "yuv420p")));
    }

    #[test]
    fn plan_ignores_small_frame_rate_drift() {
        let mut s = stream();
        s.frame_rate = Some("30000/1001".into());
        let mut desired = FrameState::new(VideoFormat::H264, FrameSize::new(1920, 1080));
        desired.frame_rate = Some(30);
        assert!(!VideoPlan::new(&s, &inputs_for(s.clone()), &desired).copy);

        s.frame_rate = Some("30".into());
        assert!(VideoPlan::new(&s, &inputs_for(s.clone()), &desired).copy);
    }

    #[test]
    fn cursor_downloads_before_software_filters() {
        let caps = Capabilities::empty().with_filters(["hwdownload"]);
        let mut cursor = FrameCursor {
            capabilities: &caps,
            policy: AccelPolicy::for_mode(HardwareAccelerationMode::Nvenc),
            hardware_encoder: false,
            may_upload: true,
            on_device: true,
            pixel_format: PixelFormat::Yuv420p10le,
            filters: Vec::new(),
        };
        cursor.apply(VideoFilter::Yadif, Some(VideoFilter::YadifCuda));
        cursor.apply(VideoFilter::Pad(FrameSize::new(1920, 1080)), None);

        assert_eq!(
            cursor.filters,
            [
                VideoFilter::HardwareDownload(PixelFormat::P010le),
                VideoFilter::Yadif,
                VideoFilter::Pad(FrameSize::new(1920, 1080)),
            ]
        );
        assert!(!cursor.on_device);
    }

    #[test]
    fn zero_duration_is_rejected() {
        let desired = FrameState::new(VideoFormat::H264, FrameSize::new(1920, 1080));
        let ffmpeg = FfmpegState {
            finish: Some(std::time::Duration::ZERO),
            ..FfmpegState::default()
        };
        let err = validate(&inputs_for(stream()), &ffmpeg, &desired).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn percentages_round() {
        assert_eq!(percent_of(1920, 5.0), 96);
        assert_eq!(percent_of(1280, 2.5), 32);
        assert_eq!(percent_of(1080, 0.0), 0);
    }
}
