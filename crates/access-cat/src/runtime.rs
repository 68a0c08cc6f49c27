//! Subcommand runners.
//!
//! `cat` reads on the calling thread and hands chunks to a writer thread over a
//! bounded channel, so a slow sink never stalls the source's readiness wait.

use std::fs::File;
use std::io::{self, BufWriter, Read, Write};
use std::path::PathBuf;
use std::thread;

use anyhow::{Context, Result, anyhow};
use file_access::probe::{ProbeReport, hint_for, probe_source};
use file_access::{AccessStream, InputFlags, ReadStrategy};
use serde::Serialize;

use crate::config::SessionConfig;

const CHANNEL_DEPTH: usize = 16;

/// Options for [`run_cat`].
#[derive(Clone, Debug)]
pub struct CatOptions {
    pub output: Option<PathBuf>,
    pub chunk_bytes: usize,
    pub follow: bool,
}

/// Byte counts of a finished copy.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CopyStats {
    pub delivered: u64,
    pub written: u64,
}

/// Classification as reported by `info`.
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct InfoReport {
    pub mrl: String,
    pub mode: String,
    pub seekable: bool,
    pub pace_controlled: bool,
    pub total_size: u64,
    pub strategy: String,
    pub caching_ms: u64,
}

fn open(session: &SessionConfig, flags: InputFlags) -> Result<(AccessStream, u64)> {
    let (stream, caching) = AccessStream::open(&session.request, &session.access, flags)
        .with_context(|| format!("open {}", session.request))?;
    Ok((stream, caching.as_millis() as u64))
}

/// Copy the source to the output until the first empty read or cancellation.
///
/// With `follow`, an empty read sleeps for the caching delay and reading goes
/// on until the flags stop it.
pub fn run_cat(session: &SessionConfig, opts: &CatOptions, flags: InputFlags) -> Result<CopyStats> {
    let (mut stream, caching_ms) = open(session, flags.clone())?;
    tracing::info!(mrl = %session.request, caching_ms, "copy started");

    let (tx, rx) = crossbeam_channel::bounded::<Vec<u8>>(CHANNEL_DEPTH);
    let output = opts.output.clone();
    let writer = thread::spawn(move || -> Result<u64> {
        let mut sink: Box<dyn Write> = match &output {
            Some(path) => Box::new(BufWriter::new(
                File::create(path).with_context(|| format!("create {:?}", path))?,
            )),
            None => Box::new(io::stdout().lock()),
        };
        let mut written = 0u64;
        for chunk in rx {
            sink.write_all(&chunk).context("write output")?;
            written += chunk.len() as u64;
        }
        sink.flush().context("flush output")?;
        Ok(written)
    });

    let pause = session.access.caching;
    let mut buf = vec![0u8; opts.chunk_bytes.max(1)];
    let mut delivered = 0u64;
    let mut failure = None;
    while !flags.should_stop() {
        let n = match stream.read(&mut buf) {
            Ok(n) => n,
            Err(e) => {
                flags.fail();
                failure = Some(e);
                break;
            }
        };
        if stream.take_size_changed() {
            tracing::info!(total_size = stream.state().total_size, "source size changed");
        }
        if n == 0 {
            if opts.follow {
                thread::sleep(pause);
                continue;
            }
            break;
        }
        delivered += n as u64;
        if tx.send(buf[..n].to_vec()).is_err() {
            tracing::warn!("writer stopped early");
            break;
        }
    }
    drop(tx);

    let written = writer
        .join()
        .map_err(|_| anyhow!("writer thread panicked"))??;
    stream.close();

    if let Some(e) = failure {
        return Err(e).context("read source");
    }
    tracing::info!(delivered, written, "copy finished");
    Ok(CopyStats { delivered, written })
}

/// Open the source and describe it.
pub fn run_info(session: &SessionConfig) -> Result<InfoReport> {
    let (stream, caching_ms) = open(session, InputFlags::new())?;
    let state = stream.state();
    let strategy = match stream.access().strategy() {
        ReadStrategy::Direct => "direct",
        ReadStrategy::AwaitReadiness => "await-readiness",
        ReadStrategy::RetryOnEmpty => "retry-on-empty",
    };
    let report = InfoReport {
        mrl: session.request.to_string(),
        mode: session.request.mode.to_string(),
        seekable: state.seekable,
        pace_controlled: state.pace_controlled,
        total_size: state.total_size,
        strategy: strategy.to_string(),
        caching_ms,
    };
    stream.close();
    Ok(report)
}

/// Probe the container carried by the source.
pub fn run_probe(session: &SessionConfig, flags: InputFlags) -> Result<ProbeReport> {
    let (stream, _) = open(session, flags)?;
    let hint = hint_for(&session.request.path);
    probe_source(stream, &hint).with_context(|| format!("probe {}", session.request))
}

/// Human-readable `info` output.
pub fn render_info(report: &InfoReport) -> String {
    let size = if report.total_size == 0 {
        "unknown".to_string()
    } else {
        format!("{} bytes", report.total_size)
    };
    format!(
        "{}\n  mode: {}\n  seekable: {}\n  pace control: {}\n  size: {}\n  read strategy: {}\n  caching: {} ms\n",
        report.mrl,
        report.mode,
        report.seekable,
        report.pace_controlled,
        size,
        report.strategy,
        report.caching_ms
    )
}

/// Human-readable `probe` output.
pub fn render_probe(report: &ProbeReport) -> String {
    let mut out = String::new();
    for t in &report.tracks {
        let marker = if report.default_track == Some(t.id) { "*" } else { " " };
        out.push_str(&format!(
            "{marker} track {}: codec={} channels={} rate={} duration_ms={}\n",
            t.id,
            t.codec.as_deref().unwrap_or("?"),
            t.channels.map(|c| c.to_string()).unwrap_or_else(|| "?".into()),
            t.sample_rate.map(|r| r.to_string()).unwrap_or_else(|| "?".into()),
            t.duration_ms.map(|d| d.to_string()).unwrap_or_else(|| "?".into()),
        ));
    }
    if out.is_empty() {
        out.push_str("no tracks\n");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Overrides;
    use file_access::probe::TrackReport;

    fn session_for(path: &std::path::Path) -> SessionConfig {
        SessionConfig::resolve(&path.to_string_lossy(), &Overrides::default()).unwrap()
    }

    #[test]
    fn cat_copies_file_to_output() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("in.ts");
        let dst = dir.path().join("out.ts");
        let payload: Vec<u8> = (0..200_000u32).map(|i| (i % 251) as u8).collect();
        std::fs::write(&src, &payload).unwrap();

        let opts = CatOptions {
            output: Some(dst.clone()),
            chunk_bytes: 4096,
            follow: false,
        };
        let stats = run_cat(&session_for(&src), &opts, InputFlags::new()).unwrap();
        assert_eq!(stats.delivered, payload.len() as u64);
        assert_eq!(stats.written, payload.len() as u64);
        assert_eq!(std::fs::read(&dst).unwrap(), payload);
    }

    #[test]
    fn cat_stops_immediately_when_already_canceled() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("in.ts");
        let dst = dir.path().join("out.ts");
        std::fs::write(&src, [1u8; 64]).unwrap();

        let flags = InputFlags::new();
        flags.cancel();
        let opts = CatOptions {
            output: Some(dst.clone()),
            chunk_bytes: 16,
            follow: true,
        };
        let stats = run_cat(&session_for(&src), &opts, flags).unwrap();
        assert_eq!(stats, CopyStats::default());
        assert!(std::fs::read(&dst).unwrap().is_empty());
    }

    #[test]
    fn cat_reports_open_failure() {
        let dir = tempfile::tempdir().unwrap();
        let opts = CatOptions {
            output: None,
            chunk_bytes: 16,
            follow: false,
        };
        let err = run_cat(&session_for(&dir.path().join("nope")), &opts, InputFlags::new())
            .unwrap_err();
        assert!(format!("{err:#}").contains("cannot stat()"));
    }

    #[test]
    fn info_describes_regular_file() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("x");
        std::fs::write(&src, [0u8; 100]).unwrap();

        let report = run_info(&session_for(&src)).unwrap();
        assert!(report.seekable);
        assert!(report.pace_controlled);
        assert_eq!(report.total_size, 100);
        assert_eq!(report.mode, "file");
        assert_eq!(report.strategy, "direct");
        assert_eq!(report.caching_ms, 300);

        let text = render_info(&report);
        assert!(text.contains("size: 100 bytes"));
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["total_size"], 100);
    }

    #[test]
    fn render_probe_marks_default_track() {
        let report = ProbeReport {
            tracks: vec![TrackReport {
                id: 3,
                codec: Some("FLAC".into()),
                channels: Some(2),
                sample_rate: Some(44_100),
                frames: None,
                duration_ms: None,
            }],
            default_track: Some(3),
        };
        let text = render_probe(&report);
        assert!(text.starts_with("* track 3: codec=FLAC channels=2 rate=44100"));
        assert_eq!(render_probe(&ProbeReport::default()), "no tracks\n");
    }
}
