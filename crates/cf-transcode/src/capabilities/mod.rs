//! What the installed transcoder can do.
//!
//! A [`Capabilities`] value is an immutable snapshot of five name sets.
//! Builders consult it before choosing any hardware encoder, decoder, or
//! filter; an empty snapshot makes every query fail, which drives the
//! builders onto the software path.

mod cache;
mod parse;
mod probe;

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::builder::AccelPolicy;
use crate::format::{HardwareAccelerationMode, VideoFormat};

pub use cache::CapabilityCache;
pub use parse::{parse_codec_listing, parse_filter_listing, parse_hwaccels, parse_pixel_formats};
pub use probe::probe_capabilities;

/// Snapshot of the transcoder's encoders, decoders, hardware acceleration
/// methods, pixel formats, and filters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Capabilities {
    pub encoders: BTreeSet<String>,
    pub decoders: BTreeSet<String>,
    pub hardware_accels: BTreeSet<String>,
    pub pixel_formats: BTreeSet<String>,
    pub filters: BTreeSet<String>,
}

impl Capabilities {
    /// A snapshot that supports nothing.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_encoders<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.encoders.extend(names.into_iter().map(Into::into));
        self
    }

    pub fn with_decoders<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.decoders.extend(names.into_iter().map(Into::into));
        self
    }

    pub fn with_hardware_accels<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.hardware_accels.extend(names.into_iter().map(Into::into));
        self
    }

    pub fn with_pixel_formats<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.pixel_formats.extend(names.into_iter().map(Into::into));
        self
    }

    pub fn with_filters<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.filters.extend(names.into_iter().map(Into::into));
        self
    }

    pub fn has_encoder(&self, name: &str) -> bool {
        self.encoders.contains(name)
    }

    pub fn has_decoder(&self, name: &str) -> bool {
        self.decoders.contains(name)
    }

    pub fn has_hardware_accel(&self, name: &str) -> bool {
        self.hardware_accels.contains(name)
    }

    pub fn has_pixel_format(&self, name: &str) -> bool {
        self.pixel_formats.contains(name)
    }

    pub fn has_filter(&self, name: &str) -> bool {
        self.filters.contains(name)
    }

    /// Whether `mode` has an encoder for `format` in this snapshot.
    pub fn can_encode(&self, mode: HardwareAccelerationMode, format: &VideoFormat) -> bool {
        AccelPolicy::for_mode(mode)
            .and_then(|policy| policy.encoder(format))
            .is_some_and(|name| self.has_encoder(name))
    }

    /// Whether `mode` can decode `format` with this snapshot, ignoring
    /// per-stream restrictions such as bit depth.
    pub fn can_decode(&self, mode: HardwareAccelerationMode, format: &VideoFormat) -> bool {
        let Some(policy) = AccelPolicy::for_mode(mode) else {
            return false;
        };
        if !self.has_hardware_accel(policy.hwaccel) {
            return false;
        }
        match policy.decoder_entry(format) {
            Some(Some(name)) => self.has_decoder(name),
            Some(None) => true,
            None => false,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.encoders.is_empty()
            && self.decoders.is_empty()
            && self.hardware_accels.is_empty()
            && self.pixel_formats.is_empty()
            && self.filters.is_empty()
    }

    /// Load a snapshot previously written with `serde_json`.
    pub fn from_json(json: &str) -> cf_core::Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| cf_core::Error::Serialization(format!("invalid capability snapshot: {e}")))
    }
}
