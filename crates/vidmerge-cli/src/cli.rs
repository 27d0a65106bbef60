use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "vidmerge")]
#[command(author, version, about = "Merge video files into one, normalizing size, frame rate and audio")]
pub struct Cli {
    /// Path to settings file
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
    /// Merge videos in the given order
    Merge {
        /// Input files, in concatenation order
        #[arg(required = true, num_args = 1..)]
        inputs: Vec<PathBuf>,

        /// Output file (default: merged_<timestamp>.mp4 in the current directory)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Target resolution: 720p, 1080p or 4k
        #[arg(short, long, default_value = "1080p")]
        resolution: String,

        /// Print events as JSON lines
        #[arg(long)]
        json: bool,
    },

    /// Show whether a file has audio and its frame size
    Probe {
        /// File to probe
        #[arg(required = true)]
        file: PathBuf,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check that FFmpeg is available and which encoder will be used
    Check {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}
