use crate::alignment::report::AlignmentIssue;
use crate::document::Visual;
use crate::types::round_secs;

/// Close gaps so the visuals partition `[0, segment_duration]` exactly.
///
/// Visuals are stably sorted by timestamp, the first one is pinned to 0 and
/// every duration becomes the distance to the next start; the last visual
/// runs to the end of the segment. Timestamps and durations are rounded to
/// two decimals. A negative duration (last start past the segment end) is
/// clamped to 0 and reported, never reordered.
pub fn reconstruct_timeline(visuals: &mut [Visual], segment_duration: f64) -> Vec<AlignmentIssue> {
    let mut issues = Vec::new();
    if visuals.is_empty() {
        return issues;
    }

    for visual in visuals.iter_mut() {
        if !visual.timestamp.is_finite() {
            tracing::warn!(
                visual_id = %visual.id,
                "timeline: non-finite timestamp treated as 0"
            );
            visual.timestamp = 0.0;
        }
    }
    visuals.sort_by(|a, b| a.timestamp.total_cmp(&b.timestamp));

    visuals[0].timestamp = 0.0;
    for visual in visuals.iter_mut() {
        visual.timestamp = round_secs(visual.timestamp);
    }

    let last = visuals.len() - 1;
    for idx in 0..visuals.len() {
        let next_start = if idx == last {
            segment_duration
        } else {
            visuals[idx + 1].timestamp
        };
        let raw_duration = round_secs(next_start - visuals[idx].timestamp);
        let visual = &mut visuals[idx];
        if raw_duration < 0.0 {
            tracing::warn!(
                visual_id = %visual.id,
                timestamp = visual.timestamp,
                raw_duration,
                segment_duration,
                "timeline: negative duration clamped to zero"
            );
            issues.push(AlignmentIssue::MalformedTimeline {
                visual_id: visual.id.to_string(),
                raw_duration,
            });
            visual.duration = 0.0;
        } else {
            // Normalizes -0.0 from rounding tiny negative noise.
            visual.duration = raw_duration + 0.0;
        }
    }

    issues
}

/// True when the visuals already form a gap-free partition of the segment.
pub fn is_contiguous(visuals: &[Visual], segment_duration: f64) -> bool {
    const EPS: f64 = 1e-6;
    let Some(first) = visuals.first() else {
        return true;
    };
    if first.timestamp.abs() > EPS {
        return false;
    }
    let chained = visuals
        .windows(2)
        .all(|pair| (pair[0].end() - pair[1].timestamp).abs() <= EPS);
    let last_end = visuals.last().map(Visual::end).unwrap_or(0.0);
    chained && (last_end - segment_duration).abs() <= EPS
}
