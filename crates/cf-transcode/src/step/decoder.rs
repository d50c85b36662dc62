//! Video decoder selection steps.

use serde::Serialize;

/// How the input video stream is decoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Decoder {
    /// No `-c:v`; ffmpeg (or `-hwaccel`) picks the decoder.
    Implicit { hardware: bool },
    Software(&'static str),
    Hardware(&'static str),
}

impl Decoder {
    pub fn is_hardware(&self) -> bool {
        matches!(
            self,
            Decoder::Hardware(_) | Decoder::Implicit { hardware: true }
        )
    }

    pub fn name(&self) -> Option<&'static str> {
        match self {
            Decoder::Implicit { .. } => None,
            Decoder::Software(name) | Decoder::Hardware(name) => Some(name),
        }
    }

    pub fn arguments(&self) -> Vec<String> {
        match self.name() {
            Some(name) => vec!["-c:v".into(), name.into()],
            None => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_decoders_render() {
        assert_eq!(Decoder::Software("h264").arguments(), vec!["-c:v", "h264"]);
        assert_eq!(Decoder::Hardware("hevc_qsv").arguments(), vec!["-c:v", "hevc_qsv"]);
        assert!(Decoder::Implicit { hardware: true }.arguments().is_empty());
    }

    #[test]
    fn hardware_flag() {
        assert!(Decoder::Implicit { hardware: true }.is_hardware());
        assert!(!Decoder::Implicit { hardware: false }.is_hardware());
        assert!(!Decoder::Software("h264").is_hardware());
    }
}
