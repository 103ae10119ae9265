use std::path::Path;

use crate::alignment::report::AlignmentIssue;
use crate::document::{ProjectDocument, Visual};
use crate::error::SyncError;
use crate::types::{MatchResult, WordTiming};

/// Transcribe + forced-align boundary. Implementations may be slow; the
/// aligner calls them at most once per segment and under a timeout.
pub trait WordTimingExtractor: Send + Sync {
    fn extract(&self, audio_path: &Path, transcript: &str) -> Result<Vec<WordTiming>, SyncError>;
}

pub trait TextNormalizer: Send + Sync {
    fn normalize_word(&self, word: &str) -> Vec<String>;
    fn tokenize(&self, text: &str) -> Vec<String>;
}

pub trait ReferenceMatcher: Send + Sync {
    fn locate(&self, reference_text: &str, word_segments: &[WordTiming]) -> MatchResult;
}

pub trait TimelineReconstructor: Send + Sync {
    fn reconstruct(&self, visuals: &mut [Visual], segment_duration: f64) -> Vec<AlignmentIssue>;
}

/// Whole-document persistence. `save` is all-or-nothing.
///
/// `document.revision` must equal the stored revision; on success the store
/// returns the bumped revision it wrote.
pub trait DocumentStore: Send + Sync {
    fn load(&self, project_id: &str) -> Result<Option<ProjectDocument>, SyncError>;
    fn save(&self, document: &ProjectDocument) -> Result<u64, SyncError>;
}
