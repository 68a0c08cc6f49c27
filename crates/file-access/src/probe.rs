//! Container probe over an [`AccessStream`].
//!
//! This is the hand-off to the demux pipeline: Symphonia reads the source
//! through the access layer and reports what it found.

use std::path::Path;

use symphonia::core::codecs::{
    CODEC_TYPE_AAC, CODEC_TYPE_ALAC, CODEC_TYPE_FLAC, CODEC_TYPE_MP3, CODEC_TYPE_PCM_ALAW,
    CODEC_TYPE_PCM_F32BE, CODEC_TYPE_PCM_F32LE, CODEC_TYPE_PCM_F64BE, CODEC_TYPE_PCM_F64LE,
    CODEC_TYPE_PCM_MULAW, CODEC_TYPE_PCM_S8, CODEC_TYPE_PCM_S16BE, CODEC_TYPE_PCM_S16LE,
    CODEC_TYPE_PCM_S24BE, CODEC_TYPE_PCM_S24LE, CODEC_TYPE_PCM_S32BE, CODEC_TYPE_PCM_S32LE,
    CODEC_TYPE_PCM_U8, CODEC_TYPE_VORBIS, CodecParameters, CodecType,
};
use symphonia::core::errors::Result as SymphoniaResult;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::media::AccessStream;

/// One container track.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TrackReport {
    pub id: u32,
    /// Codec name (best-effort).
    pub codec: Option<String>,
    pub channels: Option<usize>,
    pub sample_rate: Option<u32>,
    pub frames: Option<u64>,
    pub duration_ms: Option<u64>,
}

/// What the probe found.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProbeReport {
    pub tracks: Vec<TrackReport>,
    pub default_track: Option<u32>,
}

/// Extension hint for the probe, from the endpoint path.
pub fn hint_for(path: &Path) -> Hint {
    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }
    hint
}

/// Probe the container carried by `source`.
pub fn probe_source(source: AccessStream, hint: &Hint) -> SymphoniaResult<ProbeReport> {
    let mss = MediaSourceStream::new(Box::new(source), Default::default());
    let probed = symphonia::default::get_probe().format(
        hint,
        mss,
        &FormatOptions::default(),
        &MetadataOptions::default(),
    )?;

    let format = probed.format;
    let tracks = format
        .tracks()
        .iter()
        .map(|t| TrackReport {
            id: t.id,
            codec: codec_name(&t.codec_params),
            channels: t.codec_params.channels.map(|c| c.count()),
            sample_rate: t.codec_params.sample_rate,
            frames: t.codec_params.n_frames,
            duration_ms: track_duration_ms(&t.codec_params),
        })
        .collect::<Vec<_>>();
    tracing::debug!(tracks = tracks.len(), "probe complete");

    Ok(ProbeReport {
        tracks,
        default_track: format.default_track().map(|t| t.id),
    })
}

/// Names for the codecs the enabled symphonia features can hand back.
const CODEC_NAMES: &[(CodecType, &str)] = &[
    (CODEC_TYPE_FLAC, "FLAC"),
    (CODEC_TYPE_MP3, "MP3"),
    (CODEC_TYPE_AAC, "AAC"),
    (CODEC_TYPE_ALAC, "ALAC"),
    (CODEC_TYPE_VORBIS, "VORBIS"),
    (CODEC_TYPE_PCM_U8, "PCM_U8"),
    (CODEC_TYPE_PCM_S8, "PCM_S8"),
    (CODEC_TYPE_PCM_S16LE, "PCM_S16"),
    (CODEC_TYPE_PCM_S16BE, "PCM_S16"),
    (CODEC_TYPE_PCM_S24LE, "PCM_S24"),
    (CODEC_TYPE_PCM_S24BE, "PCM_S24"),
    (CODEC_TYPE_PCM_S32LE, "PCM_S32"),
    (CODEC_TYPE_PCM_S32BE, "PCM_S32"),
    (CODEC_TYPE_PCM_F32LE, "PCM_F32"),
    (CODEC_TYPE_PCM_F32BE, "PCM_F32"),
    (CODEC_TYPE_PCM_F64LE, "PCM_F64"),
    (CODEC_TYPE_PCM_F64BE, "PCM_F64"),
    (CODEC_TYPE_PCM_ALAW, "PCM_ALAW"),
    (CODEC_TYPE_PCM_MULAW, "PCM_MULAW"),
];

fn codec_name(params: &CodecParameters) -> Option<String> {
    CODEC_NAMES
        .iter()
        .find(|(codec, _)| *codec == params.codec)
        .map(|(_, name)| (*name).to_string())
}

/// Track length in ms. Prefers the container time base, else frames over rate.
fn track_duration_ms(params: &CodecParameters) -> Option<u64> {
    let frames = params.n_frames?;
    if let Some(tb) = params.time_base {
        let t = tb.calc_time(frames);
        return Some(t.seconds.saturating_mul(1000) + (t.frac * 1000.0).round() as u64);
    }
    match params.sample_rate? {
        0 => None,
        rate => Some(frames.saturating_mul(1000) / u64::from(rate)),
    }
}
