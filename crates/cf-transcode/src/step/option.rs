//! Flag steps for the global, per-input, and per-output sections.

use serde::Serialize;
use std::time::Duration;

use crate::format::PixelFormat;
use crate::step::decoder::Decoder;
use crate::timecode::{format_decimal, format_timestamp};

/// Flags in `-fflags` applied to every primary transcode.
const STANDARD_FORMAT_FLAGS: &str = "+genpts+discardcorrupt+igndts";

/// Protocols a concat playlist is allowed to reference.
const CONCAT_PROTOCOL_WHITELIST: &str = "file,http,tcp,https,tcp,tls";

const MOVFLAGS_FASTSTART: &str = "+faststart";
const MOVFLAGS_FRAGMENTED: &str =
    "+faststart+frag_keyframe+separate_moof+omit_tfhd_offset+empty_moov+delay_moov";

// ---------------------------------------------------------------------------
// Global
// ---------------------------------------------------------------------------

/// A flag placed before every input.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GlobalOption {
    NoStdin,
    HideBanner,
    NoStats,
    LoglevelError,
    StandardFormatFlags,
    ThreadCount(u32),
    HardwareAcceleration(HardwareAccelerationOption),
}

impl GlobalOption {
    pub fn arguments(&self) -> Vec<String> {
        match self {
            GlobalOption::NoStdin => args(["-nostdin"]),
            GlobalOption::HideBanner => args(["-hide_banner"]),
            GlobalOption::NoStats => args(["-nostats"]),
            GlobalOption::LoglevelError => args(["-loglevel", "error"]),
            GlobalOption::StandardFormatFlags => args(["-fflags", STANDARD_FORMAT_FLAGS]),
            GlobalOption::ThreadCount(n) => vec!["-threads".into(), n.to_string()],
            GlobalOption::HardwareAcceleration(hw) => hw.arguments(),
        }
    }
}

/// Device initialization for one acceleration family. `decode` selects the
/// full `-hwaccel` form; otherwise only the device used by upload filters and
/// encoders is set up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HardwareAccelerationOption {
    Cuda { decode: bool },
    Vaapi { device: String, decode: bool },
    Qsv { device: Option<String>, decode: bool },
    VideoToolbox { decode: bool },
}

impl HardwareAccelerationOption {
    pub fn arguments(&self) -> Vec<String> {
        match self {
            HardwareAccelerationOption::Cuda { decode: true } => {
                args(["-hwaccel", "cuda", "-hwaccel_output_format", "cuda"])
            }
            HardwareAccelerationOption::Cuda { decode: false } => Vec::new(),
            HardwareAccelerationOption::Vaapi { device, decode } => {
                let mut result = Vec::new();
                if *decode {
                    result.extend(args(["-hwaccel", "vaapi"]));
                }
                result.extend(["-vaapi_device".to_string(), device.clone()]);
                if *decode {
                    result.extend(args(["-hwaccel_output_format", "vaapi"]));
                }
                result
            }
            HardwareAccelerationOption::Qsv { device, decode: true } => {
                let mut result = args(["-hwaccel", "qsv"]);
                if let Some(device) = device {
                    result.extend(["-qsv_device".to_string(), device.clone()]);
                }
                result.extend(args(["-hwaccel_output_format", "qsv"]));
                result
            }
            HardwareAccelerationOption::Qsv { device, decode: false } => {
                let init = match device {
                    Some(device) => format!("qsv=hw,child_device={device}"),
                    None => "qsv=hw".to_string(),
                };
                vec![
                    "-init_hw_device".into(),
                    init,
                    "-filter_hw_device".into(),
                    "hw".into(),
                ]
            }
            HardwareAccelerationOption::VideoToolbox { decode: true } => {
                args(["-hwaccel", "videotoolbox"])
            }
            HardwareAccelerationOption::VideoToolbox { decode: false } => Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

/// A flag placed immediately before one input's `-i`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InputOption {
    StreamSeek(Duration),
    Decoder(Decoder),
    /// `-readrate`, with an optional initial burst in seconds.
    Readrate { speed: f64, initial_burst: Option<u32> },
    /// Loop a still image forever.
    StillImageLoop,
    /// Loop the whole input forever.
    InfiniteLoop,
    /// Honor the loop count stored in an animated image.
    DoNotIgnoreLoop,
    CopyTimestamps,
    /// Demux a concat playlist.
    ConcatFormat,
}

impl InputOption {
    pub fn arguments(&self) -> Vec<String> {
        match self {
            InputOption::StreamSeek(start) => vec!["-ss".into(), format_timestamp(*start)],
            InputOption::Decoder(decoder) => decoder.arguments(),
            InputOption::Readrate {
                speed,
                initial_burst,
            } => {
                let mut result = vec!["-readrate".to_string(), format_decimal(*speed)];
                if let Some(burst) = initial_burst {
                    result.extend(["-readrate_initial_burst".to_string(), burst.to_string()]);
                }
                result
            }
            InputOption::StillImageLoop => args(["-loop", "1"]),
            InputOption::InfiniteLoop => args(["-stream_loop", "-1"]),
            InputOption::DoNotIgnoreLoop => args(["-ignore_loop", "0"]),
            InputOption::CopyTimestamps => args(["-copyts"]),
            InputOption::ConcatFormat => args([
                "-f",
                "concat",
                "-safe",
                "0",
                "-protocol_whitelist",
                CONCAT_PROTOCOL_WHITELIST,
                "-probesize",
                "32",
            ]),
        }
    }
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

/// Container selection, always followed by the output target.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    Matroska,
    MpegTs { initial_discontinuity: bool },
    Mp4,
    Hls {
        segment_seconds: u32,
        /// GOP length in frames, when the frame rate is known.
        gop_size: Option<u32>,
        segment_template: String,
        playlist_path: String,
    },
}

impl OutputFormat {
    pub fn arguments(&self) -> Vec<String> {
        match self {
            OutputFormat::Matroska => args(["-f", "matroska"]),
            OutputFormat::MpegTs {
                initial_discontinuity: true,
            } => args(["-f", "mpegts", "-mpegts_flags", "+initial_discontinuity"]),
            OutputFormat::MpegTs {
                initial_discontinuity: false,
            } => args(["-f", "mpegts"]),
            OutputFormat::Mp4 => args(["-f", "mp4"]),
            OutputFormat::Hls {
                segment_seconds,
                gop_size,
                segment_template,
                playlist_path,
            } => {
                let mut result = Vec::new();
                if let Some(gop) = gop_size {
                    result.extend([
                        "-g".to_string(),
                        gop.to_string(),
                        "-keyint_min".to_string(),
                        gop.to_string(),
                        "-force_key_frames".to_string(),
                        format!("expr:gte(t,n_forced*{segment_seconds})"),
                    ]);
                }
                result.extend([
                    "-f".to_string(),
                    "hls".to_string(),
                    "-hls_time".to_string(),
                    segment_seconds.to_string(),
                    "-hls_list_size".to_string(),
                    "0".to_string(),
                    "-segment_list_flags".to_string(),
                    "+live".to_string(),
                    "-hls_segment_filename".to_string(),
                    segment_template.clone(),
                    "-hls_flags".to_string(),
                    "program_date_time+append_list+omit_endlist+independent_segments"
                        .to_string(),
                    "-mpegts_flags".to_string(),
                    "+initial_discontinuity".to_string(),
                    playlist_path.clone(),
                ]);
                result
            }
        }
    }
}

/// A flag placed after the maps, before the output target.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputOption {
    NoDemuxDecodeDelay,
    FastStart,
    FragmentedMp4,
    ClosedGop,
    NoBFrames,
    /// `-sc_threshold`; 0 disables scene-cut keyframes.
    SceneDetect(u32),
    TimeLimit(Duration),
    FrameRate(u32),
    VideoTrackTimescale(u32),
    VideoBitrate(u32),
    VideoBufferSize(u32),
    VideoProfile(String),
    PixelFormat(PixelFormat),
    /// Shift output timestamps by `pts_offset / timescale` seconds.
    OutputTsOffset { pts_offset: i64, timescale: u32 },
    AudioChannels(u32),
    AudioBitrate(u32),
    AudioBufferSize(u32),
    AudioSampleRate(u32),
    DoNotMapMetadata,
    MetadataServiceProvider(String),
    MetadataServiceName(String),
    MetadataAudioLanguage(String),
    MetadataSubtitleLanguage(String),
    MetadataSubtitleTitle(String),
    /// `-map 0`: every stream of the first input.
    MapAllStreams,
    /// `-c copy`: every mapped stream.
    CopyAllStreams,
    /// A simple `-vf` chain for single-input pipelines.
    VideoFilterChain(String),
    Format(OutputFormat),
    /// Write to stdout.
    Pipe,
    File(String),
}

impl OutputOption {
    pub fn arguments(&self) -> Vec<String> {
        match self {
            OutputOption::NoDemuxDecodeDelay => args(["-muxdelay", "0", "-muxpreload", "0"]),
            OutputOption::FastStart => args(["-movflags", MOVFLAGS_FASTSTART]),
            OutputOption::FragmentedMp4 => args(["-movflags", MOVFLAGS_FRAGMENTED]),
            OutputOption::ClosedGop => args(["-flags", "cgop"]),
            OutputOption::NoBFrames => args(["-bf", "0"]),
            OutputOption::SceneDetect(threshold) => {
                vec!["-sc_threshold".into(), threshold.to_string()]
            }
            OutputOption::TimeLimit(finish) => vec!["-t".into(), format_timestamp(*finish)],
            OutputOption::FrameRate(fps) => vec!["-r".into(), fps.to_string()],
            OutputOption::VideoTrackTimescale(ts) => {
                vec!["-video_track_timescale".into(), ts.to_string()]
            }
            OutputOption::VideoBitrate(kbps) => vec![
                "-b:v".into(),
                format!("{kbps}k"),
                "-maxrate:v".into(),
                format!("{kbps}k"),
            ],
            OutputOption::VideoBufferSize(kb) => vec!["-bufsize:v".into(), format!("{kb}k")],
            OutputOption::VideoProfile(profile) => vec!["-profile:v".into(), profile.clone()],
            OutputOption::PixelFormat(pf) => vec!["-pix_fmt".into(), pf.to_string()],
            OutputOption::OutputTsOffset {
                pts_offset,
                timescale,
            } => {
                let seconds = *pts_offset as f64 / f64::from((*timescale).max(1));
                vec!["-output_ts_offset".into(), format_decimal(seconds)]
            }
            OutputOption::AudioChannels(n) => vec!["-ac".into(), n.to_string()],
            OutputOption::AudioBitrate(kbps) => vec![
                "-b:a".into(),
                format!("{kbps}k"),
                "-maxrate:a".into(),
                format!("{kbps}k"),
            ],
            OutputOption::AudioBufferSize(kb) => vec!["-bufsize:a".into(), format!("{kb}k")],
            OutputOption::AudioSampleRate(hz) => vec!["-ar".into(), format_sample_rate(*hz)],
            OutputOption::DoNotMapMetadata => args(["-map_metadata", "-1"]),
            OutputOption::MetadataServiceProvider(p) => {
                vec!["-metadata".into(), format!("service_provider=\"{p}\"")]
            }
            OutputOption::MetadataServiceName(n) => {
                vec!["-metadata".into(), format!("service_name=\"{n}\"")]
            }
            OutputOption::MetadataAudioLanguage(lang) => {
                vec!["-metadata:s:a:0".into(), format!("language={lang}")]
            }
            OutputOption::MetadataSubtitleLanguage(lang) => {
                vec!["-metadata:s:s:0".into(), format!("language={lang}")]
            }
            OutputOption::MetadataSubtitleTitle(title) => {
                vec!["-metadata:s:s:0".into(), format!("title=\"{title}\"")]
            }
            OutputOption::MapAllStreams => args(["-map", "0"]),
            OutputOption::CopyAllStreams => args(["-c", "copy"]),
            OutputOption::VideoFilterChain(chain) => vec!["-vf".into(), chain.clone()],
            OutputOption::Format(format) => format.arguments(),
            OutputOption::Pipe => args(["pipe:1"]),
            OutputOption::File(path) => vec![path.clone()],
        }
    }
}

/// `48000` renders as `48k`; rates that are not whole kilohertz stay in Hz.
fn format_sample_rate(hz: u32) -> String {
    if hz % 1000 == 0 {
        format!("{}k", hz / 1000)
    } else {
        hz.to_string()
    }
}

fn args<const N: usize>(items: [&str; N]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}
