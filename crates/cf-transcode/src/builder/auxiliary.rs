//! Pipelines that do not go through frame planning: channel concat remux,
//! segmenter wrapping, and still image resizing.

use cf_core::Result;

use super::{add_metadata, add_output_target, Pipeline, PipelineBuilder, READRATE};
use crate::input::{ConcatInputFile, InputFile, PipelineInputs, VideoInputFile};
use crate::state::FfmpegState;
use crate::step::{GlobalOption, InputOption, OutputFormat, OutputOption, PipelineStep, VideoFilter};

fn quiet_globals() -> Vec<PipelineStep> {
    vec![
        GlobalOption::NoStdin.into(),
        GlobalOption::HideBanner.into(),
        GlobalOption::NoStats.into(),
        GlobalOption::LoglevelError.into(),
    ]
}

impl PipelineBuilder {
    /// Remux a channel's concat playlist into one continuous stream.
    ///
    /// Nothing is re-encoded, so the capability snapshot is not consulted.
    pub fn concat(&self, mut input: ConcatInputFile, ffmpeg: &FfmpegState) -> Result<Pipeline> {
        input.add_option(InputOption::ConcatFormat);
        input.add_option(InputOption::Readrate {
            speed: READRATE,
            initial_burst: None,
        });
        input.add_option(InputOption::InfiniteLoop);

        let mut steps = quiet_globals();
        steps.push(GlobalOption::StandardFormatFlags.into());
        steps.extend([
            OutputOption::NoDemuxDecodeDelay.into(),
            OutputOption::FastStart.into(),
            OutputOption::ClosedGop.into(),
            OutputOption::SceneDetect(0).into(),
            OutputOption::CopyAllStreams.into(),
        ]);
        add_metadata(&mut steps, ffmpeg);
        add_output_target(&mut steps, ffmpeg, None)?;

        Ok(Pipeline {
            steps,
            inputs: PipelineInputs {
                concat: Some(input),
                ..PipelineInputs::default()
            },
            is_intel_vaapi_or_qsv: false,
        })
    }

    /// Relay an already-segmented channel stream at `url` as a single
    /// MPEG-TS stream on stdout.
    pub fn wrap_segmenter(&self, url: impl Into<String>, ffmpeg: &FfmpegState) -> Pipeline {
        let mut input = VideoInputFile::new(url, Vec::new());
        input.add_option(InputOption::Readrate {
            speed: READRATE,
            initial_burst: None,
        });

        let mut steps: Vec<PipelineStep> = vec![
            GlobalOption::NoStdin.into(),
            GlobalOption::ThreadCount(1).into(),
            GlobalOption::HideBanner.into(),
            GlobalOption::LoglevelError.into(),
            GlobalOption::NoStats.into(),
            GlobalOption::StandardFormatFlags.into(),
            OutputOption::MapAllStreams.into(),
            OutputOption::CopyAllStreams.into(),
        ];
        if let Some(provider) = &ffmpeg.metadata_service_provider {
            steps.push(OutputOption::MetadataServiceProvider(provider.clone()).into());
        }
        if let Some(name) = &ffmpeg.metadata_service_name {
            steps.push(OutputOption::MetadataServiceName(name.clone()).into());
        }
        steps.push(
            OutputOption::Format(OutputFormat::MpegTs {
                initial_discontinuity: false,
            })
            .into(),
        );
        steps.push(OutputOption::Pipe.into());

        Pipeline {
            steps,
            inputs: PipelineInputs {
                video: Some(input),
                ..PipelineInputs::default()
            },
            is_intel_vaapi_or_qsv: false,
        }
    }

    /// Scale an image at `input` to `height` (and `width`, when given)
    /// keeping its aspect ratio, writing the result to `output`.
    pub fn resize(
        &self,
        input: impl Into<String>,
        output: impl Into<String>,
        height: u32,
        width: Option<u32>,
    ) -> Pipeline {
        let mut steps = quiet_globals();
        steps.push(OutputOption::VideoFilterChain(VideoFilter::ScaleToFit { width, height }.render()).into());
        steps.push(OutputOption::File(output.into()).into());

        Pipeline {
            steps,
            inputs: PipelineInputs {
                video: Some(VideoInputFile::new(input, Vec::new())),
                ..PipelineInputs::default()
            },
            is_intel_vaapi_or_qsv: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::Capabilities;
    use std::sync::Arc;

    fn builder() -> PipelineBuilder {
        PipelineBuilder::new(Arc::new(Capabilities::empty()))
    }

    #[test]
    fn concat_copies_every_stream() {
        let ffmpeg = FfmpegState::concat("Some Channel", "castforge");
        let pipeline = builder()
            .concat(ConcatInputFile::new("http://localhost:8080/ffmpeg/concat/1"), &ffmpeg)
            .unwrap();
        let args = pipeline.arguments();
        assert!(args.windows(2).any(|w| w == ["-c", "copy"]));
        assert!(pipeline.complex_filter().is_none());
        assert_eq!(args.last().map(String::as_str), Some("pipe:1"));
    }

    #[test]
    fn segmenter_has_no_initial_discontinuity() {
        let ffmpeg = FfmpegState::concat("Some Channel", "castforge");
        let args = builder()
            .wrap_segmenter("http://localhost:8080/iptv/channel/1.m3u8", &ffmpeg)
            .arguments();
        assert!(!args.iter().any(|a| a == "-mpegts_flags"));
        assert!(!args.iter().any(|a| a == "-map_metadata"));
        assert!(args.windows(2).any(|w| w == ["-map", "0"]));
    }

    #[test]
    fn resize_writes_to_file() {
        let args = builder()
            .resize("/in.png", "/out.jpg", 200, Some(300))
            .arguments();
        assert_eq!(
            &args[args.len() - 3..],
            ["-vf", "scale=300:200:force_original_aspect_ratio=decrease", "/out.jpg"]
        );
    }
}
