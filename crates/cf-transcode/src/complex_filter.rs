//! `-filter_complex` assembly and stream mapping.
//!
//! The builder decides *which* filters run; this module wires them into
//! labeled chains and produces the `-map` tokens that follow the graph:
//!
//! ```text
//! [0:1]aresample=async=1[a];[0:0]yadif=1,scale=...[v];[1:0]format=yuva420p[wm];[v][wm]overlay=...[vf]
//! ```

use serde::Serialize;

use crate::input::PipelineInputs;
use crate::step::{AudioFilter, VideoFilter};

/// How a subtitle stream is composited into the video.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SubtitleStage {
    /// Filter that renders the subtitle file itself (`subtitles=`).
    Burn(VideoFilter),
    /// Overlay of the subtitle input's bitmap stream.
    Overlay(VideoFilter),
}

/// Filters selected by a builder, grouped by the stream they apply to.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FilterChain {
    pub video: Vec<VideoFilter>,
    pub audio: Vec<AudioFilter>,
    /// Preparation of the watermark image before it is overlaid.
    pub watermark: Vec<VideoFilter>,
    pub watermark_overlay: Option<VideoFilter>,
    /// Preparation of a bitmap subtitle stream before it is overlaid.
    pub subtitle: Vec<VideoFilter>,
    pub subtitle_stage: Option<SubtitleStage>,
    /// Filters applied to the composited frame (hardware upload/download).
    pub tail: Vec<VideoFilter>,
}

impl FilterChain {
    pub fn video_filters(&self) -> impl Iterator<Item = &VideoFilter> {
        self.video
            .iter()
            .chain(&self.watermark)
            .chain(&self.watermark_overlay)
            .chain(&self.subtitle)
            .chain(self.subtitle_stage.iter().map(|s| match s {
                SubtitleStage::Burn(f) | SubtitleStage::Overlay(f) => f,
            }))
            .chain(&self.tail)
    }
}

/// The filter section of a pipeline: the graph plus the maps that select
/// its outputs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComplexFilter {
    pub chain: FilterChain,
    /// Map the video input's audio when there is no audio input.
    pub map_default_audio: bool,
    /// Map the subtitle input's stream to the output.
    pub map_subtitle: bool,
}

/// A stream reference inside the graph: either a raw input stream
/// (`0:1`) or the output of a previous chain (`v`).
#[derive(Debug, Clone, PartialEq, Eq)]
struct Label {
    text: String,
    filtered: bool,
}

impl Label {
    fn input(index: usize, stream: u32) -> Self {
        Self {
            text: format!("{index}:{stream}"),
            filtered: false,
        }
    }

    fn filtered(text: &str) -> Self {
        Self {
            text: text.to_string(),
            filtered: true,
        }
    }

    fn as_input(&self) -> String {
        format!("[{}]", self.text)
    }

    fn as_map(&self) -> String {
        if self.filtered {
            format!("[{}]", self.text)
        } else {
            self.text.clone()
        }
    }
}

/// One `inputs filters[output]` segment of the video graph.
struct Stage {
    inputs: String,
    filters: Vec<String>,
    output: &'static str,
}

impl Stage {
    fn render(&self) -> String {
        format!("{}{}[{}]", self.inputs, self.filters.join(","), self.output)
    }
}

impl ComplexFilter {
    /// `-filter_complex` (when any filter applies) followed by the maps.
    pub fn arguments(&self, inputs: &PipelineInputs) -> Vec<String> {
        let mut audio_part = None;
        let mut main_stage: Option<Stage> = None;
        let mut preparations = Vec::new();
        let mut overlays: Vec<Stage> = Vec::new();

        // audio
        let audio = inputs.audio.as_ref().and_then(|a| {
            let stream = a.audio_stream()?;
            Some(Label::input(inputs.input_index(&a.path)?, stream.index))
        });
        let audio_map = match audio {
            Some(label) if !self.chain.audio.is_empty() => {
                audio_part = Some(format!(
                    "{}{}[a]",
                    label.as_input(),
                    render_all(&self.chain.audio, AudioFilter::render)
                ));
                Some(Label::filtered("a").as_map())
            }
            Some(label) => Some(label.as_map()),
            None if self.map_default_audio => inputs
                .video
                .as_ref()
                .and_then(|v| inputs.input_index(&v.path))
                .map(|i| format!("{i}:a")),
            None => None,
        };

        // video
        let video = inputs.video.as_ref().and_then(|v| {
            let stream = v.video_stream()?;
            Some(Label::input(inputs.input_index(&v.path)?, stream.index))
        });
        let Some(source) = video else {
            return self.finish(inputs, audio_part.into_iter().collect(), None, audio_map);
        };

        let mut current = source.clone();
        if !self.chain.video.is_empty() {
            main_stage = Some(Stage {
                inputs: source.as_input(),
                filters: self.chain.video.iter().map(VideoFilter::render).collect(),
                output: "v",
            });
            current = Label::filtered("v");
        }

        if let (Some(overlay), Some(wm)) = (&self.chain.watermark_overlay, &inputs.watermark) {
            if let Some(index) = inputs.input_index(&wm.path) {
                let mut wm_label = Label::input(index, wm.stream_index());
                if !self.chain.watermark.is_empty() {
                    preparations.push(format!(
                        "{}{}[wm]",
                        wm_label.as_input(),
                        render_all(&self.chain.watermark, VideoFilter::render)
                    ));
                    wm_label = Label::filtered("wm");
                }
                overlays.push(Stage {
                    inputs: format!("{}{}", current.as_input(), wm_label.as_input()),
                    filters: vec![overlay.render()],
                    output: "vf",
                });
                current = Label::filtered("vf");
            }
        }

        match &self.chain.subtitle_stage {
            Some(SubtitleStage::Burn(filter)) => {
                overlays.push(Stage {
                    inputs: current.as_input(),
                    filters: vec![filter.render()],
                    output: "vst",
                });
                current = Label::filtered("vst");
            }
            Some(SubtitleStage::Overlay(overlay)) => {
                let subtitle = inputs.subtitle.as_ref().and_then(|s| {
                    let stream = s.subtitle_stream()?;
                    Some(Label::input(inputs.input_index(&s.path)?, stream.index))
                });
                if let Some(mut st_label) = subtitle {
                    if !self.chain.subtitle.is_empty() {
                        preparations.push(format!(
                            "{}{}[st]",
                            st_label.as_input(),
                            render_all(&self.chain.subtitle, VideoFilter::render)
                        ));
                        st_label = Label::filtered("st");
                    }
                    overlays.push(Stage {
                        inputs: format!("{}{}", current.as_input(), st_label.as_input()),
                        filters: vec![overlay.render()],
                        output: "vst",
                    });
                    current = Label::filtered("vst");
                }
            }
            None => {}
        }

        // Tail filters extend whichever stage produced the final frame.
        if !self.chain.tail.is_empty() {
            let tail = self.chain.tail.iter().map(VideoFilter::render);
            if let Some(stage) = overlays.last_mut() {
                stage.filters.extend(tail);
            } else if let Some(stage) = main_stage.as_mut() {
                stage.filters.extend(tail);
            } else {
                main_stage = Some(Stage {
                    inputs: source.as_input(),
                    filters: tail.collect(),
                    output: "v",
                });
                current = Label::filtered("v");
            }
        }

        let mut graph: Vec<String> = audio_part.into_iter().collect();
        graph.extend(main_stage.as_ref().map(Stage::render));
        graph.extend(preparations);
        graph.extend(overlays.iter().map(Stage::render));

        self.finish(inputs, graph, Some(current), audio_map)
    }

    fn finish(
        &self,
        inputs: &PipelineInputs,
        graph: Vec<String>,
        video: Option<Label>,
        audio_map: Option<String>,
    ) -> Vec<String> {
        let mut result = Vec::new();
        if !graph.is_empty() {
            result.push("-filter_complex".to_string());
            result.push(graph.join(";"));
        }

        if let Some(label) = video {
            result.extend(["-map".to_string(), label.as_map()]);
        }
        if let Some(map) = audio_map {
            result.extend(["-map".to_string(), map]);
        }
        if self.map_subtitle {
            let subtitle = inputs.subtitle.as_ref().and_then(|s| {
                Some(format!("{}:{}", inputs.input_index(&s.path)?, s.subtitle_stream()?.index))
            });
            if let Some(map) = subtitle {
                result.extend(["-map".to_string(), map]);
            }
        }
        result
    }
}

fn render_all<T>(filters: &[T], render: impl Fn(&T) -> String) -> String {
    filters.iter().map(render).collect::<Vec<_>>().join(",")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::{FrameSize, PixelFormat, VideoFormat};
    use crate::input::{AudioInputFile, VideoInputFile, WatermarkInputFile};
    use crate::state::{AudioState, WatermarkLocation, WatermarkState};
    use crate::stream::{AudioStream, VideoStream};

    fn inputs() -> PipelineInputs {
        PipelineInputs {
            video: Some(VideoInputFile::new(
                "/media/a.mkv",
                vec![VideoStream::new(0, VideoFormat::H264, FrameSize::new(1920, 1080))],
            )),
            audio: Some(AudioInputFile::new(
                "/media/a.mkv",
                vec![AudioStream::new(1, "aac", 2)],
                AudioState::default(),
            )),
            ..PipelineInputs::default()
        }
    }

    fn complex(chain: FilterChain) -> ComplexFilter {
        ComplexFilter {
            chain,
            map_default_audio: true,
            map_subtitle: false,
        }
    }

    #[test]
    fn no_filters_maps_streams_directly() {
        let args = complex(FilterChain::default()).arguments(&inputs());
        assert_eq!(args, vec!["-map", "0:0", "-map", "0:1"]);
    }

    #[test]
    fn audio_only_graph() {
        let chain = FilterChain {
            audio: vec![AudioFilter::Resample { realign: false }],
            ..FilterChain::default()
        };
        let args = complex(chain).arguments(&inputs());
        assert_eq!(
            args,
            vec!["-filter_complex", "[0:1]aresample=async=1[a]", "-map", "0:0", "-map", "[a]"]
        );
    }

    #[test]
    fn missing_audio_input_maps_default_audio() {
        let mut inputs = inputs();
        inputs.audio = None;
        let args = complex(FilterChain::default()).arguments(&inputs);
        assert_eq!(args, vec!["-map", "0:0", "-map", "0:a"]);
    }

    #[test]
    fn watermark_overlay_chain() {
        let mut inputs = inputs();
        inputs.watermark = Some(WatermarkInputFile::new(
            "/media/logo.png",
            vec![VideoStream::new(0, VideoFormat::Other("png".into()), FrameSize::new(200, 100))],
            WatermarkState::default(),
        ));
        let chain = FilterChain {
            video: vec![VideoFilter::Yadif],
            watermark: vec![VideoFilter::Format(PixelFormat::Yuva420p)],
            watermark_overlay: Some(VideoFilter::OverlayWatermark {
                location: WatermarkLocation::TopLeft,
                margin_x: 10,
                margin_y: 20,
            }),
            ..FilterChain::default()
        };
        let args = complex(chain).arguments(&inputs);
        assert_eq!(
            args[1],
            "[0:0]yadif=1[v];[1:0]format=yuva420p[wm];[v][wm]overlay=x=10:y=20[vf]"
        );
        assert_eq!(&args[2..4], &["-map", "[vf]"]);
    }

    #[test]
    fn tail_without_other_filters_gets_own_stage() {
        let chain = FilterChain {
            tail: vec![VideoFilter::HardwareDownload(PixelFormat::Nv12)],
            ..FilterChain::default()
        };
        let args = complex(chain).arguments(&inputs());
        assert_eq!(args[1], "[0:0]hwdownload,format=nv12[v]");
        assert_eq!(&args[2..4], &["-map", "[v]"]);
    }

    #[test]
    fn tail_extends_last_stage() {
        let chain = FilterChain {
            video: vec![VideoFilter::Scale {
                size: FrameSize::new(1280, 720),
                anamorphic: false,
            }],
            tail: vec![VideoFilter::HardwareUploadVaapi],
            ..FilterChain::default()
        };
        let args = complex(chain).arguments(&inputs());
        assert_eq!(
            args[1],
            "[0:0]scale=1280:720:flags=fast_bilinear,setsar=1,format=nv12|vaapi,hwupload[v]"
        );
    }
}
