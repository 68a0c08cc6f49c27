//! access-cat: read a file, device, pipe or stdin through the file-access layer.
//!
//! ## Commands
//! - `cat`: copy the source to stdout or `--output`, optionally following growth.
//! - `info`: print seekability, size and the read strategy chosen at open.
//! - `probe`: hand the source to Symphonia and list the container tracks.
//!
//! Ctrl-C raises the cancellation flag; a read blocked in the readiness wait
//! returns within one poll slice and the command finishes cleanly.

use access_cat::cli::{self, Command};
use access_cat::config::{Overrides, SessionConfig};
use access_cat::runtime::{self, CatOptions};
use anyhow::Result;
use clap::Parser;
use file_access::InputFlags;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let args = cli::Args::parse();
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("info,access_cat=info,file_access=info")
        }))
        .init();

    let flags = InputFlags::new();
    let flags_for_signal = flags.clone();
    let _ = ctrlc::set_handler(move || {
        tracing::info!("interrupt received, stopping");
        flags_for_signal.cancel();
    });

    let overrides = Overrides {
        config: args.config.clone(),
        access: args.access,
        caching_ms: args.caching,
        poll_slice_ms: args.poll_slice_ms,
    };

    match args.cmd {
        Command::Cat {
            target,
            output,
            chunk_bytes,
            follow,
        } => {
            let session = SessionConfig::resolve(&target.mrl, &overrides)?;
            let opts = CatOptions {
                output,
                chunk_bytes,
                follow,
            };
            runtime::run_cat(&session, &opts, flags)?;
        }
        Command::Info { target, json } => {
            let session = SessionConfig::resolve(&target.mrl, &overrides)?;
            let report = runtime::run_info(&session)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print!("{}", runtime::render_info(&report));
            }
        }
        Command::Probe { target } => {
            let session = SessionConfig::resolve(&target.mrl, &overrides)?;
            let report = runtime::run_probe(&session, flags)?;
            print!("{}", runtime::render_probe(&report));
        }
    }

    Ok(())
}
