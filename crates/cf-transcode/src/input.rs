//! Input files handed to a pipeline builder.
//!
//! Each input carries its probed streams plus an option list that the
//! builder appends to. Options are rendered immediately before the input's
//! `-i` token.

use serde::{Deserialize, Serialize};

use crate::state::{AudioState, SubtitleMethod, WatermarkState};
use crate::step::InputOption;
use crate::stream::{AudioStream, SubtitleStream, VideoStream};

/// Common surface of every input variant.
pub trait InputFile {
    /// Path or URL passed to `-i`.
    fn path(&self) -> &str;
    fn options(&self) -> &[InputOption];
    fn add_option(&mut self, option: InputOption);
}

macro_rules! impl_input_file {
    ($ty:ty, $field:ident) => {
        impl InputFile for $ty {
            fn path(&self) -> &str {
                &self.$field
            }

            fn options(&self) -> &[InputOption] {
                &self.options
            }

            fn add_option(&mut self, option: InputOption) {
                self.options.push(option);
            }
        }
    };
}

// ---------------------------------------------------------------------------
// Variants
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoInputFile {
    pub path: String,
    #[serde(default)]
    pub video_streams: Vec<VideoStream>,
    #[serde(default, skip_deserializing)]
    pub options: Vec<InputOption>,
}

impl VideoInputFile {
    pub fn new(path: impl Into<String>, video_streams: Vec<VideoStream>) -> Self {
        Self {
            path: path.into(),
            video_streams,
            options: Vec::new(),
        }
    }

    /// The stream being transcoded.
    pub fn video_stream(&self) -> Option<&VideoStream> {
        self.video_streams.first()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioInputFile {
    pub path: String,
    #[serde(default)]
    pub audio_streams: Vec<AudioStream>,
    #[serde(default)]
    pub desired: AudioState,
    #[serde(default, skip_deserializing)]
    pub options: Vec<InputOption>,
}

impl AudioInputFile {
    pub fn new(path: impl Into<String>, audio_streams: Vec<AudioStream>, desired: AudioState) -> Self {
        Self {
            path: path.into(),
            audio_streams,
            desired,
            options: Vec::new(),
        }
    }

    pub fn audio_stream(&self) -> Option<&AudioStream> {
        self.audio_streams.first()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatermarkInputFile {
    pub path: String,
    #[serde(default)]
    pub video_streams: Vec<VideoStream>,
    #[serde(default)]
    pub desired: WatermarkState,
    #[serde(default, skip_deserializing)]
    pub options: Vec<InputOption>,
}

impl WatermarkInputFile {
    pub fn new(path: impl Into<String>, video_streams: Vec<VideoStream>, desired: WatermarkState) -> Self {
        Self {
            path: path.into(),
            video_streams,
            desired,
            options: Vec::new(),
        }
    }

    /// An animated watermark (gif, video) rather than a single image.
    pub fn is_animated(&self) -> bool {
        self.video_streams.first().is_some_and(|s| !s.still_image)
    }

    pub fn stream_index(&self) -> u32 {
        self.video_streams.first().map_or(0, |s| s.index)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubtitleInputFile {
    pub path: String,
    #[serde(default)]
    pub subtitle_streams: Vec<SubtitleStream>,
    #[serde(default)]
    pub method: SubtitleMethod,
    #[serde(default, skip_deserializing)]
    pub options: Vec<InputOption>,
}

impl SubtitleInputFile {
    pub fn new(path: impl Into<String>, subtitle_streams: Vec<SubtitleStream>, method: SubtitleMethod) -> Self {
        Self {
            path: path.into(),
            subtitle_streams,
            method,
            options: Vec::new(),
        }
    }

    pub fn subtitle_stream(&self) -> Option<&SubtitleStream> {
        self.subtitle_streams.first()
    }

    /// Text subtitles burned with the `subtitles` filter read the file
    /// themselves; every other use needs the file opened as an input.
    pub fn needs_input(&self) -> bool {
        match self.method {
            SubtitleMethod::Burn => self.subtitle_stream().is_some_and(|s| s.is_image_based()),
            SubtitleMethod::Copy | SubtitleMethod::Convert => true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConcatInputFile {
    pub url: String,
    #[serde(default, skip_deserializing)]
    pub options: Vec<InputOption>,
}

impl ConcatInputFile {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            options: Vec::new(),
        }
    }
}

impl_input_file!(VideoInputFile, path);
impl_input_file!(AudioInputFile, path);
impl_input_file!(WatermarkInputFile, path);
impl_input_file!(SubtitleInputFile, path);
impl_input_file!(ConcatInputFile, url);

// ---------------------------------------------------------------------------
// PipelineInputs
// ---------------------------------------------------------------------------

/// Every input a pipeline reads from.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineInputs {
    pub video: Option<VideoInputFile>,
    pub audio: Option<AudioInputFile>,
    pub watermark: Option<WatermarkInputFile>,
    pub subtitle: Option<SubtitleInputFile>,
    pub concat: Option<ConcatInputFile>,
}

/// One `-i` of the final command with its merged options.
#[derive(Debug, Clone, PartialEq)]
pub struct OpenedInput<'a> {
    pub path: &'a str,
    pub options: Vec<&'a InputOption>,
}

impl PipelineInputs {
    /// Inputs in emission order: video, audio, watermark, subtitle, concat.
    fn ordered(&self) -> Vec<&dyn InputFile> {
        let mut result: Vec<&dyn InputFile> = Vec::new();
        if let Some(video) = &self.video {
            result.push(video);
        }
        if let Some(audio) = &self.audio {
            result.push(audio);
        }
        if let Some(watermark) = &self.watermark {
            result.push(watermark);
        }
        if let Some(subtitle) = self.subtitle.as_ref().filter(|s| s.needs_input()) {
            result.push(subtitle);
        }
        if let Some(concat) = &self.concat {
            result.push(concat);
        }
        result
    }

    /// Distinct input paths with their options merged.
    ///
    /// Audio is commonly read from the same file as video; such inputs are
    /// opened once, and an option already present for that path is not
    /// repeated.
    pub fn opened(&self) -> Vec<OpenedInput<'_>> {
        let mut result: Vec<OpenedInput<'_>> = Vec::new();
        for input in self.ordered() {
            match result.iter_mut().find(|o| o.path == input.path()) {
                Some(existing) => {
                    for option in input.options() {
                        if !existing.options.contains(&option) {
                            existing.options.push(option);
                        }
                    }
                }
                None => result.push(OpenedInput {
                    path: input.path(),
                    options: input.options().iter().collect(),
                }),
            }
        }
        result
    }

    /// Index of the `-i` that opens `path`.
    pub fn input_index(&self, path: &str) -> Option<usize> {
        self.opened().iter().position(|o| o.path == path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::{FrameSize, VideoFormat};
    use std::time::Duration;

    fn video(path: &str) -> VideoInputFile {
        VideoInputFile::new(
            path,
            vec![VideoStream::new(0, VideoFormat::H264, FrameSize::new(1920, 1080))],
        )
    }

    #[test]
    fn shared_path_is_opened_once() {
        let mut inputs = PipelineInputs {
            video: Some(video("/media/a.mkv")),
            audio: Some(AudioInputFile::new(
                "/media/a.mkv",
                vec![AudioStream::new(1, "aac", 2)],
                AudioState::default(),
            )),
            ..PipelineInputs::default()
        };
        let seek = InputOption::StreamSeek(Duration::from_secs(1));
        if let Some(v) = inputs.video.as_mut() {
            v.add_option(seek.clone());
        }
        if let Some(a) = inputs.audio.as_mut() {
            a.add_option(seek.clone());
            a.add_option(InputOption::InfiniteLoop);
        }

        let opened = inputs.opened();
        assert_eq!(opened.len(), 1);
        assert_eq!(opened[0].options, vec![&seek, &InputOption::InfiniteLoop]);
        assert_eq!(inputs.input_index("/media/a.mkv"), Some(0));
    }

    #[test]
    fn separate_audio_gets_second_index() {
        let inputs = PipelineInputs {
            video: Some(video("/media/a.mkv")),
            audio: Some(AudioInputFile::new("/media/song.flac", vec![], AudioState::default())),
            ..PipelineInputs::default()
        };
        assert_eq!(inputs.input_index("/media/song.flac"), Some(1));
    }

    #[test]
    fn text_subtitle_burn_is_not_opened() {
        let srt = SubtitleInputFile::new(
            "/media/a.srt",
            vec![SubtitleStream { index: 0, codec: "subrip".into() }],
            SubtitleMethod::Burn,
        );
        assert!(!srt.needs_input());

        let pgs = SubtitleInputFile::new(
            "/media/a.sup",
            vec![SubtitleStream { index: 0, codec: "hdmv_pgs_subtitle".into() }],
            SubtitleMethod::Burn,
        );
        assert!(pgs.needs_input());
    }
}
