use std::path::{Path, PathBuf};

use crate::error::SyncError;
use crate::extract::parse_word_timings;
use crate::pipeline::traits::WordTimingExtractor;
use crate::types::WordTiming;

/// Reads word timings written next to the audio by an offline aligner run:
/// `narration.flac` -> `narration.words.json`.
pub struct SidecarExtractor;

impl SidecarExtractor {
    pub fn sidecar_path(audio_path: &Path) -> PathBuf {
        audio_path.with_extension("words.json")
    }
}

impl WordTimingExtractor for SidecarExtractor {
    fn extract(&self, audio_path: &Path, _transcript: &str) -> Result<Vec<WordTiming>, SyncError> {
        let path = Self::sidecar_path(audio_path);
        let data = std::fs::read_to_string(&path)
            .map_err(|e| SyncError::io("read word timing sidecar", e))?;
        let words = parse_word_timings(&data)?;
        tracing::debug!(
            sidecar = %path.display(),
            word_count = words.len(),
            "extract: loaded sidecar word timings"
        );
        Ok(words)
    }
}
