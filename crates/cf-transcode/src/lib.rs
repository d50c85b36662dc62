//! # cf-transcode
//!
//! Compiles a transcode request into an ordered ffmpeg argument vector.
//!
//! This crate provides:
//!
//! - **Capabilities** ([`Capabilities`], [`CapabilityCache`]) -- what the
//!   installed ffmpeg supports, probed once and shared as an immutable
//!   snapshot.
//! - **Descriptors and states** ([`stream`], [`input`], [`state`]) -- probed
//!   streams, input files, and the desired output.
//! - **Steps** ([`step`]) -- self-contained contributions to the command,
//!   each tagged with its section.
//! - **Builders** ([`PipelineBuilder`]) -- instruction selection with
//!   capability-checked hardware paths and software fallback.
//! - **Generator** ([`generator`]) -- deterministic rendering of a
//!   [`Pipeline`] into arguments and environment.
//! - **Tools** ([`ToolRegistry`], [`ToolCommand`]) -- locating and running
//!   the transcoder binaries.

pub mod builder;
pub mod capabilities;
pub mod command;
pub mod complex_filter;
pub mod format;
pub mod generator;
pub mod input;
pub mod job;
pub mod state;
pub mod step;
pub mod stream;
pub mod timecode;
pub mod tools;

// ---- Re-exports for convenience ----

pub use builder::{Pipeline, PipelineBuilder};
pub use capabilities::{probe_capabilities, Capabilities, CapabilityCache};
pub use command::{ToolCommand, ToolOutput};
pub use complex_filter::ComplexFilter;
pub use format::{
    AudioFormat, FrameSize, HardwareAccelerationMode, OutputFormatKind, PixelFormat, ScanKind,
    VideoFormat,
};
pub use generator::{generate_arguments, FfmpegCommand};
pub use input::{
    AudioInputFile, ConcatInputFile, InputFile, PipelineInputs, SubtitleInputFile,
    VideoInputFile, WatermarkInputFile,
};
pub use job::TranscodeJob;
pub use state::{AudioState, FfmpegState, FrameState, SubtitleMethod, WatermarkState};
pub use step::{PipelineStep, StepSection};
pub use stream::{AudioStream, SubtitleStream, VideoStream};
pub use tools::{ToolInfo, ToolRegistry};
