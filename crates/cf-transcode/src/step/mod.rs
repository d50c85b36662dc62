//! Pipeline steps.
//!
//! A [`PipelineStep`] is one self-contained contribution to the final
//! command. Every step declares the [`StepSection`] it belongs to and renders
//! only its own tokens; ordering across sections is the generator's job.

pub mod decoder;
pub mod encoder;
pub mod filter;
pub mod option;

use serde::Serialize;

use crate::complex_filter::ComplexFilter;

pub use decoder::Decoder;
pub use encoder::{AudioEncoder, SubtitleEncoder, VideoEncoder};
pub use filter::{AudioFilter, VideoFilter};
pub use option::{GlobalOption, HardwareAccelerationOption, InputOption, OutputFormat, OutputOption};

/// Where in the command a step's contribution lands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StepSection {
    /// Process environment, not an argument.
    Environment,
    Global,
    /// Attached to an input file's option list.
    Input,
    Filter,
    Output,
}

/// An environment variable the transcoder must be started with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnvironmentVariable {
    pub name: String,
    pub value: String,
}

/// One step of a built pipeline.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case", tag = "step", content = "value")]
pub enum PipelineStep {
    Environment(EnvironmentVariable),
    Global(GlobalOption),
    /// Decoder chosen for the video input. Its tokens live in that input's
    /// option list; the step records the choice for introspection.
    Decoder(Decoder),
    VideoEncoder(VideoEncoder),
    AudioEncoder(AudioEncoder),
    SubtitleEncoder(SubtitleEncoder),
    Output(OutputOption),
    ComplexFilter(ComplexFilter),
}

impl PipelineStep {
    pub fn section(&self) -> StepSection {
        match self {
            PipelineStep::Environment(_) => StepSection::Environment,
            PipelineStep::Global(_) => StepSection::Global,
            PipelineStep::Decoder(_) => StepSection::Input,
            PipelineStep::ComplexFilter(_) => StepSection::Filter,
            PipelineStep::VideoEncoder(_)
            | PipelineStep::AudioEncoder(_)
            | PipelineStep::SubtitleEncoder(_)
            | PipelineStep::Output(_) => StepSection::Output,
        }
    }

    /// Tokens for a global or output step. Other sections render nothing here.
    pub fn arguments(&self) -> Vec<String> {
        match self {
            PipelineStep::Global(option) => option.arguments(),
            PipelineStep::VideoEncoder(encoder) => encoder.arguments(),
            PipelineStep::AudioEncoder(encoder) => encoder.arguments(),
            PipelineStep::SubtitleEncoder(encoder) => encoder.arguments(),
            PipelineStep::Output(option) => option.arguments(),
            PipelineStep::Environment(_)
            | PipelineStep::Decoder(_)
            | PipelineStep::ComplexFilter(_) => Vec::new(),
        }
    }
}

impl From<GlobalOption> for PipelineStep {
    fn from(option: GlobalOption) -> Self {
        PipelineStep::Global(option)
    }
}

impl From<OutputOption> for PipelineStep {
    fn from(option: OutputOption) -> Self {
        PipelineStep::Output(option)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sections() {
        assert_eq!(PipelineStep::from(GlobalOption::NoStdin).section(), StepSection::Global);
        assert_eq!(
            PipelineStep::VideoEncoder(VideoEncoder::Copy).section(),
            StepSection::Output
        );
        assert_eq!(
            PipelineStep::Decoder(Decoder::Implicit { hardware: false }).section(),
            StepSection::Input
        );
    }

    #[test]
    fn decoder_step_renders_nothing_itself() {
        let step = PipelineStep::Decoder(Decoder::Software("h264"));
        assert!(step.arguments().is_empty());
    }

    #[test]
    fn steps_serialize_with_tag() {
        let step = PipelineStep::from(OutputOption::NoBFrames);
        let json = serde_json::to_value(&step).unwrap();
        assert_eq!(json["step"], "output");
        assert_eq!(json["value"], "no_b_frames");
    }
}
