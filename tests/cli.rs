//! CLI end-to-end tests
//!
//! Tests for the castforge command-line interface. Nothing here needs ffmpeg
//! installed: builds run against capability snapshots written to a temp dir.

use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::tempdir;

/// Get a command for the castforge binary
#[allow(deprecated)]
fn castforge_cmd() -> Command {
    Command::cargo_bin("castforge").unwrap()
}

const JOB: &str = r#"{
    "inputs": {
        "video": {
            "path": "/tmp/whatever.mkv",
            "video_streams": [{
                "index": 0,
                "codec": "h264",
                "pixel_format": "yuv420p",
                "frame_size": {"width": 1920, "height": 1080}
            }]
        }
    },
    "frame_state": {
        "video_format": "hevc",
        "scaled_size": {"width": 1280, "height": 720}
    },
    "ffmpeg_state": {
        "encoder_hardware_acceleration": "nvenc",
        "decoder_hardware_acceleration": "nvenc"
    }
}"#;

fn write(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, contents).unwrap();
    path
}

#[test]
fn test_cli_no_args_shows_help() {
    let mut cmd = castforge_cmd();
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Usage"));
}

#[test]
fn test_cli_version_command() {
    let mut cmd = castforge_cmd();
    cmd.arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains("castforge"));
}

#[test]
fn test_cli_build_with_empty_snapshot_uses_software() {
    let dir = tempdir().unwrap();
    let job = write(dir.path(), "job.json", JOB);
    let caps = write(dir.path(), "caps.json", "{}");

    let mut cmd = castforge_cmd();
    cmd.arg("build")
        .arg(&job)
        .arg("--capabilities")
        .arg(&caps)
        .assert()
        .success()
        .stdout(predicate::str::contains("libx265"))
        .stdout(predicate::str::contains("hevc_nvenc").not())
        .stdout(predicate::str::contains("-hwaccel").not());
}

#[test]
fn test_cli_build_with_nvenc_snapshot() {
    let dir = tempdir().unwrap();
    let job = write(dir.path(), "job.json", JOB);
    let caps = write(
        dir.path(),
        "caps.json",
        r#"{"encoders": ["hevc_nvenc"], "hardware_accels": ["cuda"], "filters": ["scale_cuda"]}"#,
    );

    let mut cmd = castforge_cmd();
    cmd.arg("build")
        .arg(&job)
        .arg("--capabilities")
        .arg(&caps)
        .assert()
        .success()
        .stdout(predicate::str::contains("hevc_nvenc"))
        .stdout(predicate::str::contains("scale_cuda=1280:720"));
}

#[test]
fn test_cli_build_json_output() {
    let dir = tempdir().unwrap();
    let job = write(dir.path(), "job.json", JOB);
    let caps = write(dir.path(), "caps.json", "{}");

    let output = castforge_cmd()
        .arg("build")
        .arg(&job)
        .arg("--capabilities")
        .arg(&caps)
        .arg("--json")
        .output()
        .unwrap();
    assert!(output.status.success());

    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let arguments = value["command"]["arguments"].as_array().unwrap();
    assert_eq!(arguments[0], "-nostdin");
    assert!(value["steps"].as_array().unwrap().len() > 5);
}

#[test]
fn test_cli_build_invalid_job_exit_code() {
    let dir = tempdir().unwrap();
    let job = write(dir.path(), "job.json", r#"{"inputs": {}}"#);
    let caps = write(dir.path(), "caps.json", "{}");

    let mut cmd = castforge_cmd();
    cmd.arg("build")
        .arg(&job)
        .arg("--capabilities")
        .arg(&caps)
        .assert()
        .code(7)
        .stderr(predicate::str::contains("invalid transcode job"));
}

#[test]
fn test_cli_build_missing_job_fails() {
    let mut cmd = castforge_cmd();
    cmd.arg("build")
        .arg("/nonexistent/job.json")
        .assert()
        .failure()
        .stderr(predicate::str::contains("does not exist"));
}

#[test]
fn test_cli_concat_command() {
    let mut cmd = castforge_cmd();
    cmd.arg("concat")
        .arg("http://localhost:8080/ffmpeg/concat/1")
        .arg("--channel-name")
        .arg("Some Channel")
        .assert()
        .success()
        .stdout(predicate::str::contains("service_name=\"Some Channel\""))
        .stdout(predicate::str::contains("+initial_discontinuity"));
}

#[test]
fn test_cli_segmenter_command() {
    let mut cmd = castforge_cmd();
    cmd.arg("segmenter")
        .arg("http://localhost:8080/iptv/session/1/hls.m3u8")
        .arg("--channel-name")
        .arg("Some Channel")
        .assert()
        .success()
        .stdout(predicate::str::contains("service_provider=\"castforge\""))
        .stdout(predicate::str::contains("+initial_discontinuity").not());
}

#[test]
fn test_cli_resize_command() {
    let mut cmd = castforge_cmd();
    cmd.args(["resize", "/in.png", "/out.jpg", "--height", "200"])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "scale=-1:200:force_original_aspect_ratio=decrease",
        ));
}

#[test]
fn test_cli_validate_config() {
    let dir = tempdir().unwrap();
    let config = write(
        dir.path(),
        "config.json",
        r#"{"transcode": {"hw_accel": "vaapi", "service_provider": "Retro TV"}}"#,
    );

    let mut cmd = castforge_cmd();
    cmd.arg("validate")
        .arg(&config)
        .assert()
        .success()
        .stdout(predicate::str::contains("Configuration is valid"))
        .stdout(predicate::str::contains("Retro TV"));
}

#[test]
fn test_cli_validate_malformed_config_fails() {
    let dir = tempdir().unwrap();
    let config = write(dir.path(), "config.json", "{ not json");

    let mut cmd = castforge_cmd();
    cmd.arg("validate").arg(&config).assert().code(2);
}

#[test]
fn test_cli_check_tools_command() {
    let mut cmd = castforge_cmd();
    cmd.arg("check-tools")
        .assert()
        .success()
        .stdout(predicate::str::contains("ffmpeg"));
}
