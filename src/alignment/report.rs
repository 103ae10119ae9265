use serde::Serialize;

/// Non-fatal conditions met while aligning a segment. They are logged and
/// reported; none of them aborts the run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AlignmentIssue {
    /// Extraction produced no words: silent audio, missing file, extractor failure.
    NoTimingData { reason: String },
    /// A reference text had no acceptable exact or fuzzy match; the visual kept its timing.
    ReferenceNotFound {
        visual_id: String,
        reference_text: String,
    },
    /// Gap-closing produced a negative duration, clamped to zero.
    MalformedTimeline { visual_id: String, raw_duration: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchOutcome {
    Exact,
    Fuzzy,
    NotFound,
    NoReference,
    /// No word timings were available, so matching never ran.
    NotAttempted,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VisualOutcome {
    pub visual_id: String,
    pub reference_text: String,
    pub outcome: MatchOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance: Option<usize>,
    /// Final timing after gap-closing.
    pub timestamp: f64,
    pub duration: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ExtractionStatus {
    Extracted { word_count: usize },
    /// The segment carries no audio reference or no narration text.
    NoAudio,
    Empty,
    Failed { reason: String },
    TimedOut { timeout_secs: f64 },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum SkipReason {
    TooFewVisuals { count: usize },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlignmentReport {
    pub segment_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skipped: Option<SkipReason>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extraction: Option<ExtractionStatus>,
    pub segment_duration: f64,
    pub visuals: Vec<VisualOutcome>,
    pub issues: Vec<AlignmentIssue>,
}

impl AlignmentReport {
    pub(crate) fn skipped(segment_id: String, segment_duration: f64, count: usize) -> Self {
        Self {
            segment_id,
            skipped: Some(SkipReason::TooFewVisuals { count }),
            extraction: None,
            segment_duration,
            visuals: Vec::new(),
            issues: Vec::new(),
        }
    }

    pub fn count(&self, outcome: MatchOutcome) -> usize {
        self.visuals.iter().filter(|v| v.outcome == outcome).count()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct ReportSummary {
    pub segments: u32,
    pub skipped_segments: u32,
    pub visuals: u32,
    pub exact: u32,
    pub fuzzy: u32,
    pub not_found: u32,
    pub no_reference: u32,
    pub not_attempted: u32,
    pub issues: u32,
}

pub fn summarize_reports(reports: &[AlignmentReport]) -> ReportSummary {
    let mut summary = ReportSummary::default();
    for report in reports {
        summary.segments += 1;
        if report.skipped.is_some() {
            summary.skipped_segments += 1;
        }
        summary.issues += to_u32(report.issues.len());
        for visual in &report.visuals {
            summary.visuals += 1;
            match visual.outcome {
                MatchOutcome::Exact => summary.exact += 1,
                MatchOutcome::Fuzzy => summary.fuzzy += 1,
                MatchOutcome::NotFound => summary.not_found += 1,
                MatchOutcome::NoReference => summary.no_reference += 1,
                MatchOutcome::NotAttempted => summary.not_attempted += 1,
            }
        }
    }
    summary
}

fn to_u32(value: usize) -> u32 {
    u32::try_from(value).unwrap_or(u32::MAX)
}
