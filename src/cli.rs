use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "castforge")]
#[command(author, version, about = "Transcode pipeline compiler for virtual broadcast channels")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Probe the installed ffmpeg and list what it supports
    Capabilities {
        /// Output as JSON (usable as a --capabilities snapshot)
        #[arg(long)]
        json: bool,
    },

    /// Compile a JSON transcode job into an ffmpeg command
    Build {
        /// Job file to compile
        #[arg(required = true)]
        job: PathBuf,

        /// Capability snapshot to build against instead of probing ffmpeg
        #[arg(long)]
        capabilities: Option<PathBuf>,

        /// Output the command and steps as JSON
        #[arg(long)]
        json: bool,
    },

    /// Render the concat remux command for a channel
    Concat {
        /// Concat playlist URL
        url: String,

        /// Channel name written into stream metadata
        #[arg(long)]
        channel_name: String,
    },

    /// Render the command that relays a segmented channel stream
    Segmenter {
        /// Playlist URL of the segmented stream
        url: String,

        /// Channel name written into stream metadata
        #[arg(long)]
        channel_name: String,
    },

    /// Render the command that resizes an image
    Resize {
        /// Source image
        input: String,

        /// Destination image
        output: String,

        /// Target height in pixels
        #[arg(long)]
        height: u32,

        /// Target width in pixels (derived from the aspect ratio if omitted)
        #[arg(long)]
        width: Option<u32>,
    },

    /// Check that required external tools are available
    CheckTools,

    /// Validate configuration file
    Validate {
        /// Config file to validate (uses default if not specified)
        config: Option<PathBuf>,
    },

    /// Display version information
    Version,
}
