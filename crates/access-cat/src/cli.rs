use std::path::PathBuf;

use clap::{Args as ClapArgs, Parser, Subcommand};
use file_access::AccessMode;

const VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("GIT_SHA"),
    ", ",
    env!("BUILD_DATE"),
    ")"
);

#[derive(Parser, Debug)]
#[command(name = "access-cat", version = VERSION)]
pub struct Args {
    #[command(subcommand)]
    pub cmd: Command,

    /// Access settings file (TOML)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Access mode: file, stream or kfir (overrides an `access:` prefix)
    #[arg(long, global = true, value_parser = parse_access_mode)]
    pub access: Option<AccessMode>,

    /// Caching value in ms
    #[arg(long, global = true)]
    pub caching: Option<u64>,

    /// Readiness wait slice in ms
    #[arg(long, global = true)]
    pub poll_slice_ms: Option<u64>,
}

/// Endpoint selection shared by every subcommand.
#[derive(ClapArgs, Debug, Clone)]
pub struct Target {
    /// Path, `-` for stdin, or `access:path`
    pub mrl: String,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Copy the source to stdout or a file
    ///
    /// In the default `file` mode a FIFO is read without waiting, so an empty
    /// read ends the copy. Use `stream:<path>` to wait for a writer, or
    /// `--follow` to keep polling.
    Cat {
        #[command(flatten)]
        target: Target,

        /// Write here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Bytes requested per read
        #[arg(long, default_value_t = 64 * 1024)]
        chunk_bytes: usize,

        /// Keep reading after an empty read until interrupted
        #[arg(long)]
        follow: bool,
    },

    /// Print how the source was classified
    Info {
        #[command(flatten)]
        target: Target,

        /// Emit JSON
        #[arg(long)]
        json: bool,
    },

    /// Probe the media container carried by the source
    Probe {
        #[command(flatten)]
        target: Target,
    },
}

fn parse_access_mode(raw: &str) -> Result<AccessMode, String> {
    raw.parse::<AccessMode>().map_err(|e| e.to_string())
}
