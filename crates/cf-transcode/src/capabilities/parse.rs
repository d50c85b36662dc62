//! Parsers for ffmpeg's introspection listings.
//!
//! All parsers are lenient: lines that do not look like entries are skipped,
//! so a banner or a warning mixed into the output never fails a probe.

use std::collections::BTreeSet;

const HWACCELS_HEADER: &str = "Hardware acceleration methods:";

/// Names under the `Hardware acceleration methods:` header of `-hwaccels`.
pub fn parse_hwaccels(output: &str) -> BTreeSet<String> {
    output
        .lines()
        .skip_while(|line| !line.trim_start().starts_with(HWACCELS_HEADER))
        .skip(1)
        .map(str::trim)
        .filter(|line| is_identifier(line))
        .map(str::to_string)
        .collect()
}

/// Entry names from `-encoders` or `-decoders`.
///
/// ```text
/// Encoders:
///  V..... = Video
///  ...
///  ------
///  V....D libx264              libx264 H.264 / AVC / MPEG-4 AVC
/// ```
pub fn parse_codec_listing(output: &str) -> BTreeSet<String> {
    parse_flagged_listing(output, 6)
}

/// Entry names from `-filters`. Filter flags are three columns wide and are
/// followed by the filter name and its pad signature.
pub fn parse_filter_listing(output: &str) -> BTreeSet<String> {
    output
        .lines()
        .filter_map(|line| {
            let mut fields = line.split_whitespace();
            let flags = fields.next()?;
            let name = fields.next()?;
            fields.next()?;
            (is_flags(flags, 3) && is_identifier(name)).then(|| name.to_string())
        })
        .collect()
}

/// Pixel format names from `-pix_fmts`.
pub fn parse_pixel_formats(output: &str) -> BTreeSet<String> {
    parse_flagged_listing(output, 5)
}

/// Entries of the form `FLAGS name ...` after the `-----` separator line.
fn parse_flagged_listing(output: &str, flag_width: usize) -> BTreeSet<String> {
    output
        .lines()
        .skip_while(|line| !line.trim_start().starts_with("---"))
        .skip(1)
        .filter_map(|line| {
            let mut fields = line.split_whitespace();
            let flags = fields.next()?;
            let name = fields.next()?;
            (is_flags(flags, flag_width) && is_identifier(name)).then(|| name.to_string())
        })
        .collect()
}

fn is_flags(field: &str, width: usize) -> bool {
    field.len() == width
        && field
            .chars()
            .all(|c| c == '.' || c == '|' || c.is_ascii_uppercase())
}

fn is_identifier(s: &str) -> bool {
    !s.is_empty()
        && s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}
