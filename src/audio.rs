use std::path::{Path, PathBuf};

use claxon::FlacReader;

use crate::error::SyncError;
use crate::types::round_secs;

/// Where a segment's final duration came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DurationSource {
    Stored,
    Measured,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DurationDecision {
    pub duration: f64,
    pub source: DurationSource,
}

/// Resolve a segment's `audioUrl` to a file under `media_root`.
///
/// URLs are site paths (`/uploads/audio/x.flac`), so the leading slash is
/// dropped before joining. An absolute path that already exists on disk is
/// taken as-is.
pub fn resolve_audio_path(media_root: &Path, audio_url: &str) -> PathBuf {
    let trimmed = audio_url.trim();
    let direct = Path::new(trimmed);
    if direct.is_absolute() && direct.exists() {
        return direct.to_path_buf();
    }
    media_root.join(trimmed.trim_start_matches('/'))
}

/// Length of a FLAC file in seconds. Other formats yield `Ok(None)`.
pub fn probe_duration_secs(path: &Path) -> Result<Option<f64>, SyncError> {
    let is_flac = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("flac"));
    if !is_flac {
        return Ok(None);
    }

    let mut reader =
        FlacReader::open(path).map_err(|e| SyncError::runtime("decode FLAC stream info", e))?;
    let streaminfo = reader.streaminfo();
    if streaminfo.sample_rate == 0 || streaminfo.channels == 0 {
        return Err(SyncError::invalid_input(format!(
            "FLAC has no usable sample rate or channels: {}",
            path.display()
        )));
    }

    let frames = match streaminfo.samples {
        Some(frames) => frames,
        None => {
            // Stream info may omit the total; count decoded samples instead.
            let channels = streaminfo.channels as u64;
            let mut total = 0u64;
            for sample in reader.samples() {
                sample.map_err(|e| SyncError::runtime("decode FLAC samples", e))?;
                total += 1;
            }
            total / channels
        }
    };
    Ok(Some(frames as f64 / streaminfo.sample_rate as f64))
}

/// Tolerance policy between the stored segment duration and the audio length.
///
/// Synthesized narration often carries a short fade-out tail, so a stored
/// duration within `tolerance_secs` of the measurement is kept. A missing or
/// non-positive stored duration always adopts the measurement.
pub fn resolve_segment_duration(
    stored: f64,
    measured: Option<f64>,
    tolerance_secs: f64,
) -> DurationDecision {
    let stored_decision = DurationDecision {
        duration: stored,
        source: DurationSource::Stored,
    };
    let Some(measured) = measured.filter(|m| m.is_finite() && *m > 0.0) else {
        return stored_decision;
    };

    if !stored.is_finite() || stored <= 0.0 || (measured - stored).abs() > tolerance_secs {
        return DurationDecision {
            duration: round_secs(measured),
            source: DurationSource::Measured,
        };
    }
    stored_decision
}
