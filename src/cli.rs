//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use mediafetch_core::FormatHint;

/// Fetch files and media in the background and track their progress.
///
/// Generic URLs are streamed straight to disk; links on known media hosts
/// are handed to an external extraction tool (yt-dlp by default).
#[derive(Parser, Debug)]
#[command(name = "mediafetch")]
#[command(author, version, about)]
pub struct Args {
    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Directory downloads are written to
    #[arg(long, global = true, value_name = "DIR")]
    pub download_dir: Option<PathBuf>,

    /// Job database file
    #[arg(long, global = true, value_name = "FILE")]
    pub database: Option<PathBuf>,

    /// Config file (default: $XDG_CONFIG_HOME/mediafetch/config.toml)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Submit a URL and wait for the job to finish
    Add {
        /// URL to fetch
        url: String,

        /// Output format: auto, file, mp3, or mp4
        #[arg(short, long, default_value = "auto")]
        format: FormatHint,
    },

    /// List jobs, newest first
    List {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Show one job
    Show {
        /// Job id
        id: String,

        /// Print JSON
        #[arg(long)]
        json: bool,
    },

    /// Delete a job and its file
    Remove {
        /// Job id
        id: String,
    },

    /// Print the local path of a completed job
    Path {
        /// Job id
        id: String,
    },

    /// Delete every job and its file
    Clear,
}
