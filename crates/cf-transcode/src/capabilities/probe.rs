use std::collections::BTreeSet;
use std::path::Path;
use std::time::Duration;

use tracing::{debug, info, warn};

use super::parse::{parse_codec_listing, parse_filter_listing, parse_hwaccels, parse_pixel_formats};
use super::Capabilities;
use crate::command::ToolCommand;

/// Query `ffmpeg` at `path` for everything builders need to know.
///
/// Never fails: a listing that cannot be obtained is logged and treated as
/// empty, so builders degrade to software instead of erroring.
pub async fn probe_capabilities(path: &Path, timeout: Duration) -> Capabilities {
    let (hwaccels, encoders, decoders, filters, pixel_formats) = tokio::join!(
        listing(path, timeout, "-hwaccels", parse_hwaccels),
        listing(path, timeout, "-encoders", parse_codec_listing),
        listing(path, timeout, "-decoders", parse_codec_listing),
        listing(path, timeout, "-filters", parse_filter_listing),
        listing(path, timeout, "-pix_fmts", parse_pixel_formats),
    );

    let capabilities = Capabilities {
        encoders,
        decoders,
        hardware_accels: hwaccels,
        pixel_formats,
        filters,
    };

    info!(
        path = %path.display(),
        encoders = capabilities.encoders.len(),
        decoders = capabilities.decoders.len(),
        hwaccels = capabilities.hardware_accels.len(),
        filters = capabilities.filters.len(),
        pixel_formats = capabilities.pixel_formats.len(),
        "Probed transcoder capabilities"
    );
    capabilities
}

async fn listing(
    path: &Path,
    timeout: Duration,
    flag: &str,
    parse: fn(&str) -> BTreeSet<String>,
) -> BTreeSet<String> {
    let result = ToolCommand::new(path.to_path_buf())
        .args(["-hide_banner", flag])
        .timeout(timeout)
        .execute()
        .await;

    match result {
        Ok(output) => {
            let names = parse(output.listing());
            debug!(flag, count = names.len(), "Parsed capability listing");
            names
        }
        Err(e) => {
            warn!(flag, error = %e, "Capability probe failed; treating as unsupported");
            BTreeSet::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::os::unix::fs::PermissionsExt;

    /// A stand-in transcoder that answers introspection flags from a script.
    fn fake_ffmpeg(dir: &Path) -> std::path::PathBuf {
        let path = dir.join("ffmpeg");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            r#"#!/bin/sh
case "$2" in
  -hwaccels) printf 'Hardware acceleration methods:\ncuda\n' ;;
  -encoders) printf 'Encoders:\n V..... = Video\n ------\n V....D libx264  H.264\n V....D h264_nvenc  NVENC\n' ;;
  -decoders) printf 'Decoders:\n ------\n V....D h264  H.264\n' >&2 ;;
  -filters) printf ' ... scale_cuda  V->V  GPU scaler\n' ;;
  *) exit 1 ;;
esac"#
        )
        .unwrap();
        drop(file);
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[tokio::test]
    async fn probe_parses_each_listing() {
        let dir = tempfile::tempdir().unwrap();
        let ffmpeg = fake_ffmpeg(dir.path());

        let caps = probe_capabilities(&ffmpeg, Duration::from_secs(5)).await;
        assert!(caps.has_hardware_accel("cuda"));
        assert!(caps.has_encoder("h264_nvenc"));
        assert!(caps.has_encoder("libx264"));
        // listing written to stderr is still read
        assert!(caps.has_decoder("h264"));
        assert!(caps.has_filter("scale_cuda"));
        // `-pix_fmts` exits non-zero in the fake
        assert!(caps.pixel_formats.is_empty());
    }

    #[tokio::test]
    async fn missing_binary_yields_empty_snapshot() {
        let caps = probe_capabilities(Path::new("/nonexistent/ffmpeg"), Duration::from_secs(1)).await;
        assert!(caps.is_empty());
    }
}
