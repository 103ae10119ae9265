use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::alignment::report::{
    AlignmentIssue, AlignmentReport, ExtractionStatus, MatchOutcome, VisualOutcome,
};
use crate::assets::prefix_image_url;
use crate::audio::{probe_duration_secs, resolve_audio_path, resolve_segment_duration, DurationSource};
use crate::config::SyncConfig;
use crate::document::Segment;
use crate::error::SyncError;
use crate::extract::sanitize_word_timings;
use crate::pipeline::traits::{
    DocumentStore, ReferenceMatcher, TimelineReconstructor, WordTimingExtractor,
};
use crate::store::locks::acquire;
use crate::store::{segment_mut, ProjectLocks, SegmentIndex};
use crate::types::{round_secs, TimingStamp, WordTiming};

/// Visuals needed before a segment's timing is worth reorganizing.
const MIN_VISUALS_TO_ALIGN: usize = 2;

/// Places each visual of a narrated segment on the narration timeline.
pub struct VisualAligner {
    config: SyncConfig,
    extractor: Arc<dyn WordTimingExtractor>,
    matcher: Box<dyn ReferenceMatcher>,
    reconstructor: Box<dyn TimelineReconstructor>,
    store: Arc<dyn DocumentStore>,
    locks: ProjectLocks,
}

pub(crate) struct VisualAlignerParts {
    pub config: SyncConfig,
    pub extractor: Arc<dyn WordTimingExtractor>,
    pub matcher: Box<dyn ReferenceMatcher>,
    pub reconstructor: Box<dyn TimelineReconstructor>,
    pub store: Arc<dyn DocumentStore>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SegmentAlignment {
    pub segment: Segment,
    pub report: AlignmentReport,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectAlignment {
    pub project_id: String,
    /// Revision of the stored document after this run.
    pub revision: u64,
    pub reports: Vec<AlignmentReport>,
}

struct PendingOutcome {
    reference_text: String,
    outcome: MatchOutcome,
    distance: Option<usize>,
}

impl VisualAligner {
    pub(crate) fn from_parts(parts: VisualAlignerParts) -> Self {
        Self {
            config: parts.config,
            extractor: parts.extractor,
            matcher: parts.matcher,
            reconstructor: parts.reconstructor,
            store: parts.store,
            locks: ProjectLocks::new(),
        }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    /// Align one segment in memory. Never fails: extraction and matching
    /// problems degrade into report issues and untouched visuals.
    pub fn organize_segment_visuals(&self, segment: Segment) -> SegmentAlignment {
        let segment_id = segment.id.to_string();
        let visual_count = segment.visuals.len();
        if visual_count < MIN_VISUALS_TO_ALIGN {
            tracing::debug!(
                segment_id = %segment_id,
                visual_count,
                "aligner: too few visuals, segment left unchanged"
            );
            let report = AlignmentReport::skipped(segment_id, segment.duration, visual_count);
            return SegmentAlignment { segment, report };
        }

        let started = Instant::now();
        let mut segment = segment;
        let mut issues = Vec::new();

        let audio_path = (!segment.audio_url.is_blank())
            .then(|| resolve_audio_path(&self.config.media_root, segment.audio_url.as_str()));
        if let Some(path) = &audio_path {
            self.apply_audio_duration(&mut segment, path);
        }

        let (words, extraction) = match audio_path {
            Some(path) if segment.has_narration_audio() => {
                self.extract_words(path, segment.narration_text.as_str().to_string())
            }
            _ => (Vec::new(), ExtractionStatus::NoAudio),
        };
        if words.is_empty() {
            let reason = match &extraction {
                ExtractionStatus::NoAudio => "segment has no narration audio or text".to_string(),
                ExtractionStatus::Empty => "extractor returned no words".to_string(),
                ExtractionStatus::Failed { reason } => reason.clone(),
                ExtractionStatus::TimedOut { timeout_secs } => {
                    format!("extraction timed out after {timeout_secs}s")
                }
                ExtractionStatus::Extracted { .. } => "no usable words".to_string(),
            };
            tracing::warn!(
                segment_id = %segment_id,
                reason = %reason,
                "aligner: no word timings, visuals keep their stored timing"
            );
            issues.push(AlignmentIssue::NoTimingData { reason });
        }

        let mut pending: HashMap<String, VecDeque<PendingOutcome>> = HashMap::new();
        for visual in &mut segment.visuals {
            let reference_text = visual.reference_text.as_str().trim().to_string();
            let (outcome, distance) = if reference_text.is_empty() {
                (MatchOutcome::NoReference, None)
            } else if words.is_empty() {
                (MatchOutcome::NotAttempted, None)
            } else {
                let result = self.matcher.locate(&reference_text, &words);
                match (result.found, result.start, result.end) {
                    (true, Some(start), Some(end)) => {
                        visual.timestamp = round_secs(start);
                        visual.duration = round_secs(end - start);
                        tracing::debug!(
                            segment_id = %segment_id,
                            visual_id = %visual.id,
                            start,
                            end,
                            fuzzy = result.fuzzy_found,
                            "aligner: reference located"
                        );
                        let outcome = if result.fuzzy_found {
                            MatchOutcome::Fuzzy
                        } else {
                            MatchOutcome::Exact
                        };
                        (outcome, result.distance)
                    }
                    _ => {
                        tracing::warn!(
                            segment_id = %segment_id,
                            visual_id = %visual.id,
                            reference_text = %reference_text,
                            "aligner: reference text not found in narration"
                        );
                        issues.push(AlignmentIssue::ReferenceNotFound {
                            visual_id: visual.id.to_string(),
                            reference_text: reference_text.clone(),
                        });
                        (MatchOutcome::NotFound, None)
                    }
                }
            };
            visual
                .image_url
                .map_text(|url| prefix_image_url(url, &self.config.image_url_prefix));
            pending
                .entry(visual.id.to_string())
                .or_default()
                .push_back(PendingOutcome {
                    reference_text,
                    outcome,
                    distance,
                });
        }

        issues.extend(
            self.reconstructor
                .reconstruct(&mut segment.visuals, segment.duration),
        );
        segment.word_timings = words.iter().map(TimingStamp::from).collect();

        let visuals = segment
            .visuals
            .iter()
            .map(|visual| {
                let visual_id = visual.id.to_string();
                let pending = pending
                    .get_mut(&visual_id)
                    .and_then(VecDeque::pop_front)
                    .unwrap_or(PendingOutcome {
                        reference_text: visual.reference_text.as_str().to_string(),
                        outcome: MatchOutcome::NotAttempted,
                        distance: None,
                    });
                VisualOutcome {
                    visual_id,
                    reference_text: pending.reference_text,
                    outcome: pending.outcome,
                    distance: pending.distance,
                    timestamp: visual.timestamp,
                    duration: visual.duration,
                }
            })
            .collect();

        let report = AlignmentReport {
            segment_id,
            skipped: None,
            extraction: Some(extraction),
            segment_duration: segment.duration,
            visuals,
            issues,
        };
        tracing::info!(
            segment_id = %report.segment_id,
            visuals = visual_count,
            exact = report.count(MatchOutcome::Exact),
            fuzzy = report.count(MatchOutcome::Fuzzy),
            not_found = report.count(MatchOutcome::NotFound),
            issues = report.issues.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "aligner: segment organized"
        );
        SegmentAlignment { segment, report }
    }

    /// Align `segment` and write its visuals, word timings and duration into
    /// `project -> section -> segment`. The save is all-or-nothing; its
    /// failure is returned, never retried here.
    pub fn organize_segment_in_project(
        &self,
        project_id: &str,
        section_id: &str,
        segment: Segment,
    ) -> Result<SegmentAlignment, SyncError> {
        if segment.visuals.is_empty() {
            return Err(SyncError::NoVisuals {
                segment_id: segment.id.to_string(),
            });
        }
        if segment.visuals.len() < MIN_VISUALS_TO_ALIGN {
            return Ok(self.organize_segment_visuals(segment));
        }

        let handle = self.locks.handle(project_id);
        let _guard = acquire(&handle);

        let mut document = self.load_project(project_id)?;
        let index = SegmentIndex::build(&document)?;
        let position = index.locate(project_id, section_id, &segment.id.to_string())?;

        let alignment = self.organize_segment_visuals(segment);
        let stored = segment_mut(&mut document, position);
        stored.visuals = alignment.segment.visuals.clone();
        stored.word_timings = alignment.segment.word_timings.clone();
        stored.duration = alignment.segment.duration;

        let revision = self.store.save(&document)?;
        tracing::info!(
            project_id,
            section_id,
            segment_id = %alignment.report.segment_id,
            revision,
            "aligner: segment persisted"
        );
        Ok(alignment)
    }

    /// Align every segment of a stored project and save the document once.
    pub fn organize_project(&self, project_id: &str) -> Result<ProjectAlignment, SyncError> {
        let handle = self.locks.handle(project_id);
        let _guard = acquire(&handle);

        let mut document = self.load_project(project_id)?;
        let mut reports = Vec::new();
        let mut changed = false;
        for section in &mut document.content.sections {
            for stored in &mut section.segments {
                let alignment = self.organize_segment_visuals(stored.clone());
                if alignment.report.skipped.is_none() {
                    stored.visuals = alignment.segment.visuals;
                    stored.word_timings = alignment.segment.word_timings;
                    stored.duration = alignment.segment.duration;
                    changed = true;
                }
                reports.push(alignment.report);
            }
        }

        let revision = if changed {
            self.store.save(&document)?
        } else {
            document.revision
        };
        tracing::info!(
            project_id,
            segments = reports.len(),
            revision,
            saved = changed,
            "aligner: project organized"
        );
        Ok(ProjectAlignment {
            project_id: project_id.to_string(),
            revision,
            reports,
        })
    }

    fn load_project(&self, project_id: &str) -> Result<crate::document::ProjectDocument, SyncError> {
        self.store
            .load(project_id)?
            .ok_or_else(|| SyncError::ProjectNotFound {
                project_id: project_id.to_string(),
            })
    }

    fn apply_audio_duration(&self, segment: &mut Segment, audio_path: &std::path::Path) {
        if !audio_path.exists() {
            tracing::debug!(
                segment_id = %segment.id,
                path = %audio_path.display(),
                "aligner: narration audio missing, keeping stored duration"
            );
            return;
        }
        let measured = match probe_duration_secs(audio_path) {
            Ok(measured) => measured,
            Err(err) => {
                tracing::warn!(
                    segment_id = %segment.id,
                    error = %err,
                    "aligner: could not measure narration audio"
                );
                None
            }
        };
        let decision = resolve_segment_duration(
            segment.duration,
            measured,
            self.config.duration_tolerance_secs,
        );
        if decision.source == DurationSource::Measured && decision.duration != segment.duration {
            tracing::info!(
                segment_id = %segment.id,
                stored = segment.duration,
                measured = decision.duration,
                "aligner: segment duration replaced by audio length"
            );
            segment.duration = decision.duration;
        }
    }

    /// Runs the extractor at most once, on a helper thread, bounded by the
    /// configured timeout. A timed-out helper is detached and its late
    /// result discarded; backends that spawn work bound it by the same
    /// timeout (see `build_extractor`).
    fn extract_words(
        &self,
        audio_path: PathBuf,
        transcript: String,
    ) -> (Vec<WordTiming>, ExtractionStatus) {
        let timeout = self.config.extraction_timeout();
        let extractor = Arc::clone(&self.extractor);
        let (tx, rx) = mpsc::channel();
        let spawned = thread::Builder::new()
            .name("word-timing-extract".to_string())
            .spawn(move || {
                let _ = tx.send(extractor.extract(&audio_path, &transcript));
            });
        if let Err(err) = spawned {
            return failed(format!("could not start extraction thread: {err}"));
        }

        match rx.recv_timeout(timeout) {
            Ok(Ok(words)) => {
                let words = sanitize_word_timings(words);
                if words.is_empty() {
                    (words, ExtractionStatus::Empty)
                } else {
                    let word_count = words.len();
                    (words, ExtractionStatus::Extracted { word_count })
                }
            }
            Ok(Err(err)) => failed(err.to_string()),
            Err(RecvTimeoutError::Timeout) => (
                Vec::new(),
                ExtractionStatus::TimedOut {
                    timeout_secs: duration_secs(timeout),
                },
            ),
            Err(RecvTimeoutError::Disconnected) => {
                failed("extractor stopped without a result".to_string())
            }
        }
    }
}

fn failed(reason: String) -> (Vec<WordTiming>, ExtractionStatus) {
    (Vec::new(), ExtractionStatus::Failed { reason })
}

fn duration_secs(duration: Duration) -> f64 {
    round_secs(duration.as_secs_f64())
}
