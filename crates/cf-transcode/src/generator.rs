//! Argument generation.
//!
//! Rendering is a pure function of the inputs and the step list. Sections
//! are always emitted in the same order:
//!
//! 1. global options
//! 2. each distinct input path: its options, then `-i path`
//! 3. `-filter_complex` and the `-map` tokens
//! 4. output-section steps, in step order

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

use crate::builder::Pipeline;
use crate::command::ToolCommand;
use crate::input::PipelineInputs;
use crate::step::{PipelineStep, StepSection};

/// The argument vector for `steps` reading from `inputs`.
pub fn generate_arguments(inputs: &PipelineInputs, steps: &[PipelineStep]) -> Vec<String> {
    let mut args: Vec<String> = steps
        .iter()
        .filter(|s| s.section() == StepSection::Global)
        .flat_map(PipelineStep::arguments)
        .collect();

    for input in inputs.opened() {
        args.extend(input.options.iter().flat_map(|o| o.arguments()));
        args.push("-i".into());
        args.push(input.path.to_string());
    }

    for step in steps {
        if let PipelineStep::ComplexFilter(filter) = step {
            args.extend(filter.arguments(inputs));
        }
    }

    args.extend(
        steps
            .iter()
            .filter(|s| s.section() == StepSection::Output)
            .flat_map(PipelineStep::arguments),
    );
    args
}

/// Environment variables requested by `steps`, in step order.
pub fn environment(steps: &[PipelineStep]) -> Vec<(String, String)> {
    steps
        .iter()
        .filter_map(|s| match s {
            PipelineStep::Environment(var) => Some((var.name.clone(), var.value.clone())),
            _ => None,
        })
        .collect()
}

pub fn generate(pipeline: &Pipeline) -> FfmpegCommand {
    FfmpegCommand {
        arguments: generate_arguments(&pipeline.inputs, &pipeline.steps),
        environment: environment(&pipeline.steps),
        is_intel_vaapi_or_qsv: pipeline.is_intel_vaapi_or_qsv,
    }
}

/// A rendered transcoder invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FfmpegCommand {
    pub arguments: Vec<String>,
    pub environment: Vec<(String, String)>,
    pub is_intel_vaapi_or_qsv: bool,
}

impl FfmpegCommand {
    /// A runnable command for the transcoder at `program`.
    pub fn to_tool_command(&self, program: impl Into<PathBuf>) -> ToolCommand {
        let mut command = ToolCommand::new(program.into());
        command.args(self.arguments.iter().cloned());
        for (name, value) in &self.environment {
            command.env(name.clone(), value.clone());
        }
        command
    }
}

/// Shell-like rendering for logs. Not suitable for passing to a shell.
impl fmt::Display for FfmpegCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, value) in &self.environment {
            write!(f, "{name}={value} ")?;
        }
        f.write_str("ffmpeg")?;
        for arg in &self.arguments {
            if arg.is_empty() || arg.contains(char::is_whitespace) {
                write!(f, " '{arg}'")?;
            } else {
                write!(f, " {arg}")?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::complex_filter::{ComplexFilter, FilterChain};
    use crate::input::{InputFile, VideoInputFile};
    use crate::step::{EnvironmentVariable, GlobalOption, InputOption, OutputOption};
    use crate::format::{FrameSize, VideoFormat};
    use crate::stream::VideoStream;

    fn inputs() -> PipelineInputs {
        let mut video = VideoInputFile::new(
            "/media/a b.mkv",
            vec![VideoStream::new(0, VideoFormat::H264, FrameSize::new(1280, 720))],
        );
        video.add_option(InputOption::InfiniteLoop);
        PipelineInputs {
            video: Some(video),
            ..PipelineInputs::default()
        }
    }

    #[test]
    fn sections_are_ordered_regardless_of_step_order() {
        let steps = vec![
            PipelineStep::from(OutputOption::ClosedGop),
            PipelineStep::ComplexFilter(ComplexFilter {
                chain: FilterChain::default(),
                map_default_audio: false,
                map_subtitle: false,
            }),
            PipelineStep::from(GlobalOption::NoStdin),
            PipelineStep::from(OutputOption::Pipe),
        ];
        let args = generate_arguments(&inputs(), &steps);
        assert_eq!(
            args,
            [
                "-nostdin",
                "-stream_loop",
                "-1",
                "-i",
                "/media/a b.mkv",
                "-map",
                "0:0",
                "-flags",
                "cgop",
                "pipe:1"
            ]
        );
    }

    #[test]
    fn environment_is_collected() {
        let steps = vec![PipelineStep::Environment(EnvironmentVariable {
            name: "LIBVA_DRIVER_NAME".into(),
            value: "iHD".into(),
        })];
        assert_eq!(
            environment(&steps),
            [("LIBVA_DRIVER_NAME".to_string(), "iHD".to_string())]
        );
        assert!(generate_arguments(&PipelineInputs::default(), &steps).is_empty());
    }

    #[test]
    fn display_quotes_whitespace() {
        let command = FfmpegCommand {
            arguments: vec!["-i".into(), "/media/a b.mkv".into()],
            environment: vec![("LIBVA_DRIVER_NAME".into(), "iHD".into())],
            is_intel_vaapi_or_qsv: true,
        };
        assert_eq!(
            command.to_string(),
            "LIBVA_DRIVER_NAME=iHD ffmpeg -i '/media/a b.mkv'"
        );
    }

    #[tokio::test]
    async fn tool_command_carries_arguments_and_environment() {
        let command = FfmpegCommand {
            arguments: vec!["-c".into(), "echo $LIBVA_DRIVER_NAME".into()],
            environment: vec![("LIBVA_DRIVER_NAME".into(), "iHD".into())],
            is_intel_vaapi_or_qsv: true,
        };

        if let Ok(output) = command.to_tool_command("sh").execute().await {
            assert_eq!(output.stdout.trim(), "iHD");
        }
    }
}
