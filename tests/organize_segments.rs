use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use narration_sync::alignment::report::{ExtractionStatus, MatchOutcome};
use narration_sync::alignment::timeline::is_contiguous;
use narration_sync::config::ExtractorConfig;
use narration_sync::store::{JsonFileStore, MemoryStore};
use narration_sync::{
    AlignmentIssue, DocumentStore, ProjectDocument, Segment, SyncConfig, SyncError, Visual,
    VisualAligner, VisualAlignerBuilder, WordTiming, WordTimingExtractor,
};
use serde_json::json;

struct FixedExtractor(Vec<WordTiming>);

impl WordTimingExtractor for FixedExtractor {
    fn extract(&self, _audio: &Path, _transcript: &str) -> Result<Vec<WordTiming>, SyncError> {
        Ok(self.0.clone())
    }
}

struct FailingExtractor;

impl WordTimingExtractor for FailingExtractor {
    fn extract(&self, audio: &Path, _transcript: &str) -> Result<Vec<WordTiming>, SyncError> {
        Err(SyncError::InvalidInput {
            message: format!("cannot decode {}", audio.display()),
        })
    }
}

struct SlowExtractor(Duration);

impl WordTimingExtractor for SlowExtractor {
    fn extract(&self, _audio: &Path, _transcript: &str) -> Result<Vec<WordTiming>, SyncError> {
        std::thread::sleep(self.0);
        Ok(narration())
    }
}

fn narration() -> Vec<WordTiming> {
    [
        ("Volcanoes", 0.0, 0.6),
        ("form", 0.65, 0.9),
        ("where", 0.95, 1.1),
        ("tectonic", 1.15, 1.6),
        ("plates", 1.65, 2.0),
        ("meet.", 2.05, 2.4),
        ("Lava", 3.0, 3.4),
        ("cools", 3.45, 3.8),
        ("into", 3.85, 4.0),
        ("new", 4.05, 4.3),
        ("rock.", 4.35, 4.9),
    ]
    .into_iter()
    .map(|(word, start, end)| WordTiming::new(word, start, end))
    .collect()
}

fn visual(id: &str, reference_text: &str, image_url: &str) -> Visual {
    let mut visual = Visual::new(id, reference_text);
    visual.image_url = image_url.into();
    visual
}

fn payload_segment() -> Segment {
    let mut segment = Segment::new(7, 6.0);
    segment.narration_text =
        "Volcanoes form where tectonic plates meet. Lava cools into new rock.".into();
    segment.audio_url = "/audio/seg7.flac".into();
    segment.visuals = vec![
        visual("lava", "Lava cools into new rock", "images/lava.png"),
        visual("plates", "tectonic plates meet", "images/plates.png"),
        visual("intro", "Volcanoes form", "https://cdn.example.com/intro.png"),
    ];
    segment
}

fn stored_document() -> ProjectDocument {
    ProjectDocument::from_json(
        "p1",
        json!({
            "id": "p1",
            "title": "Volcanoes",
            "content": {"sections": [{
                "id": "s1",
                "segments": [
                    {"id": 7, "duration": 6.0, "speaker": "narrator", "visuals": []},
                    {"id": 8, "duration": 2.0}
                ]
            }]}
        }),
    )
    .expect("valid document")
}

fn config(media_root: &Path) -> SyncConfig {
    SyncConfig {
        media_root: media_root.to_path_buf(),
        ..SyncConfig::default()
    }
}

fn aligner_with(
    extractor: Arc<dyn WordTimingExtractor>,
    store: Arc<dyn DocumentStore>,
    config: SyncConfig,
) -> VisualAligner {
    VisualAlignerBuilder::new(config)
        .with_extractor(extractor)
        .with_store(store)
        .build()
        .expect("build aligner")
}

fn memory_setup() -> (VisualAligner, Arc<MemoryStore>, tempfile::TempDir) {
    let media = tempfile::tempdir().expect("tempdir");
    let store = Arc::new(MemoryStore::new());
    store.insert(stored_document());
    let aligner = aligner_with(
        Arc::new(FixedExtractor(narration())),
        store.clone(),
        config(media.path()),
    );
    (aligner, store, media)
}

fn assert_close(observed: f64, expected: f64) {
    assert!(
        (observed - expected).abs() < 1e-9,
        "expected {expected}, got {observed}"
    );
}

#[test]
fn segment_visuals_follow_the_narration() {
    let (aligner, store, _media) = memory_setup();
    let alignment = aligner
        .organize_segment_in_project("p1", "s1", payload_segment())
        .expect("organize");

    let visuals = &alignment.segment.visuals;
    let order: Vec<String> = visuals.iter().map(|v| v.id.to_string()).collect();
    assert_eq!(order, ["intro", "plates", "lava"]);
    assert_close(visuals[0].timestamp, 0.0);
    assert_close(visuals[0].duration, 1.15);
    assert_close(visuals[1].timestamp, 1.15);
    assert_close(visuals[1].duration, 1.85);
    assert_close(visuals[2].timestamp, 3.0);
    assert_close(visuals[2].duration, 3.0);
    assert!(is_contiguous(visuals, 6.0));
    assert_eq!(alignment.report.count(MatchOutcome::Exact), 3);

    let stored = store.get("p1").expect("stored project");
    assert_eq!(stored.revision, 1);
    assert_eq!(stored.extra.get("title"), Some(&json!("Volcanoes")));
    let segment = &stored.content.sections[0].segments[0];
    assert_eq!(segment.visuals, alignment.segment.visuals);
    assert_eq!(segment.word_timings.len(), 11);
    assert_eq!(segment.word_timings[6].word, "Lava");
    assert_eq!(segment.extra.get("speaker"), Some(&json!("narrator")));
    assert!(stored.content.sections[0].segments[1].visuals.is_empty());
}

#[test]
fn image_urls_are_prefixed_once() {
    let (aligner, _store, _media) = memory_setup();
    let first = aligner
        .organize_segment_in_project("p1", "s1", payload_segment())
        .expect("first run");
    let urls: Vec<&str> = first
        .segment
        .visuals
        .iter()
        .map(|v| v.image_url.as_str())
        .collect();
    assert_eq!(
        urls,
        [
            "https://cdn.example.com/intro.png",
            "/images/plates.png",
            "/images/lava.png"
        ]
    );

    let second = aligner
        .organize_segment_in_project("p1", "s1", first.segment.clone())
        .expect("second run");
    assert_eq!(second.segment, first.segment);
}

#[test]
fn organizing_twice_is_idempotent() {
    let (aligner, store, _media) = memory_setup();
    let first = aligner
        .organize_segment_in_project("p1", "s1", payload_segment())
        .expect("first run");
    let second = aligner
        .organize_segment_in_project("p1", "s1", payload_segment())
        .expect("second run");
    assert_eq!(first.segment, second.segment);
    assert_eq!(first.report, second.report);
    assert_eq!(store.get("p1").unwrap().revision, 2);
}

#[test]
fn fuzzy_reference_is_accepted() {
    let (aligner, _store, _media) = memory_setup();
    let mut segment = payload_segment();
    segment.visuals[1].reference_text = "tectonic plate meet".into();
    let alignment = aligner
        .organize_segment_in_project("p1", "s1", segment)
        .expect("organize");
    let plates = alignment
        .report
        .visuals
        .iter()
        .find(|v| v.visual_id == "plates")
        .expect("plates outcome");
    assert_eq!(plates.outcome, MatchOutcome::Fuzzy);
    assert_eq!(plates.distance, Some(1));
    assert_close(plates.timestamp, 1.15);
}

#[test]
fn unmatched_reference_keeps_stored_timing_and_is_reported() {
    let (aligner, _store, _media) = memory_setup();
    let mut segment = payload_segment();
    segment.visuals[0].reference_text = "the ocean floor spreads slowly apart".into();
    segment.visuals[0].timestamp = 4.5;
    let alignment = aligner
        .organize_segment_in_project("p1", "s1", segment)
        .expect("organize");

    let lava = alignment
        .segment
        .visuals
        .iter()
        .find(|v| v.id.to_string() == "lava")
        .expect("lava visual");
    assert_close(lava.timestamp, 4.5);
    assert_close(lava.duration, 1.5);
    assert!(alignment.report.issues.iter().any(|issue| matches!(
        issue,
        AlignmentIssue::ReferenceNotFound { visual_id, .. } if visual_id == "lava"
    )));
}

#[test]
fn single_visual_is_returned_unchanged_without_saving() {
    let (aligner, store, _media) = memory_setup();
    let mut segment = payload_segment();
    segment.visuals.truncate(1);
    let alignment = aligner
        .organize_segment_in_project("p1", "s1", segment.clone())
        .expect("organize");
    assert_eq!(alignment.segment, segment);
    assert!(alignment.report.skipped.is_some());
    assert_eq!(store.get("p1").unwrap().revision, 0);
}

#[test]
fn segment_without_visuals_is_rejected() {
    let (aligner, _store, _media) = memory_setup();
    let mut segment = payload_segment();
    segment.visuals.clear();
    let err = aligner
        .organize_segment_in_project("p1", "s1", segment)
        .unwrap_err();
    assert!(matches!(err, SyncError::NoVisuals { .. }));
}

#[test]
fn missing_targets_are_not_found_errors() {
    let (aligner, store, _media) = memory_setup();
    assert!(matches!(
        aligner.organize_segment_in_project("nope", "s1", payload_segment()),
        Err(SyncError::ProjectNotFound { .. })
    ));
    assert!(matches!(
        aligner.organize_segment_in_project("p1", "s9", payload_segment()),
        Err(SyncError::SectionNotFound { .. })
    ));
    let mut stray = payload_segment();
    stray.id = 99.into();
    assert!(matches!(
        aligner.organize_segment_in_project("p1", "s1", stray),
        Err(SyncError::SegmentNotFound { .. })
    ));
    assert_eq!(store.get("p1").unwrap().revision, 0);
}

#[test]
fn extraction_failure_degrades_to_no_timing_data() {
    let media = tempfile::tempdir().expect("tempdir");
    let store = Arc::new(MemoryStore::new());
    store.insert(stored_document());
    let aligner = aligner_with(Arc::new(FailingExtractor), store.clone(), config(media.path()));

    let alignment = aligner
        .organize_segment_in_project("p1", "s1", payload_segment())
        .expect("failure is absorbed");
    assert!(matches!(
        alignment.report.extraction,
        Some(ExtractionStatus::Failed { .. })
    ));
    assert!(matches!(
        alignment.report.issues[0],
        AlignmentIssue::NoTimingData { .. }
    ));
    assert!(alignment.segment.word_timings.is_empty());
    assert_eq!(alignment.report.count(MatchOutcome::NotAttempted), 3);
    assert!(is_contiguous(&alignment.segment.visuals, 6.0));
    assert_eq!(store.get("p1").unwrap().revision, 1);
}

#[test]
fn slow_extraction_times_out() {
    let media = tempfile::tempdir().expect("tempdir");
    let store = Arc::new(MemoryStore::new());
    store.insert(stored_document());
    let config = SyncConfig {
        extraction_timeout_secs: 0.2,
        ..config(media.path())
    };
    let aligner = aligner_with(
        Arc::new(SlowExtractor(Duration::from_secs(3))),
        store,
        config,
    );

    let alignment = aligner
        .organize_segment_in_project("p1", "s1", payload_segment())
        .expect("timeout is absorbed");
    assert_eq!(
        alignment.report.extraction,
        Some(ExtractionStatus::TimedOut { timeout_secs: 0.2 })
    );
    assert!(alignment.segment.word_timings.is_empty());
}

#[cfg(unix)]
#[test]
fn timed_out_command_extractor_does_not_outlive_the_run() {
    let media = tempfile::tempdir().expect("tempdir");
    std::fs::create_dir_all(media.path().join("audio")).expect("audio dir");
    std::fs::write(media.path().join("audio/seg7.flac"), b"not flac").expect("write audio");
    let marker = media.path().join("finished");

    let store = Arc::new(MemoryStore::new());
    store.insert(stored_document());
    let config = SyncConfig {
        extraction_timeout_secs: 0.2,
        extractor: ExtractorConfig::Command {
            program: "sh".to_string(),
            args: vec![
                "-c".to_string(),
                format!(
                    "cat > /dev/null; sleep 1; touch '{}'; echo '[]'",
                    marker.display()
                ),
            ],
        },
        ..config(media.path())
    };
    let aligner = VisualAlignerBuilder::new(config)
        .with_store(store)
        .build()
        .expect("build aligner");

    let alignment = aligner
        .organize_segment_in_project("p1", "s1", payload_segment())
        .expect("timeout is absorbed");
    assert!(alignment.segment.word_timings.is_empty());

    std::thread::sleep(Duration::from_millis(1500));
    assert!(!marker.exists(), "extractor kept running after the timeout");
}

#[test]
fn project_batch_saves_once_through_the_file_store() {
    let media = tempfile::tempdir().expect("tempdir");
    let projects = tempfile::tempdir().expect("tempdir");
    let store = Arc::new(JsonFileStore::new(projects.path()));

    let mut document = stored_document();
    document.content.sections[0].segments[0] = payload_segment();
    store.save(&document).expect("seed project");

    let aligner = aligner_with(
        Arc::new(FixedExtractor(narration())),
        store.clone(),
        config(media.path()),
    );
    let alignment = aligner.organize_project("p1").expect("organize project");
    assert_eq!(alignment.revision, 2);
    assert_eq!(alignment.reports.len(), 2);
    assert!(alignment.reports[0].skipped.is_none());
    assert!(alignment.reports[1].skipped.is_some());

    let reloaded = store.load("p1").unwrap().expect("stored project");
    assert_eq!(reloaded.revision, 2);
    let segment = &reloaded.content.sections[0].segments[0];
    assert!(is_contiguous(&segment.visuals, 6.0));
    assert_eq!(segment.visuals[0].id.to_string(), "intro");
    assert_eq!(segment.word_timings.len(), 11);
}

#[test]
fn project_without_alignable_segments_is_not_rewritten() {
    let (aligner, store, _media) = memory_setup();
    let alignment = aligner.organize_project("p1").expect("organize project");
    assert_eq!(alignment.revision, 0);
    assert!(alignment.reports.iter().all(|r| r.skipped.is_some()));
    assert_eq!(store.get("p1").unwrap().revision, 0);
}

#[test]
fn stored_nulls_survive_a_file_store_run() {
    let media = tempfile::tempdir().expect("tempdir");
    let projects = tempfile::tempdir().expect("tempdir");
    let raw = json!({
        "id": "p1",
        "content": {"sections": [{
            "id": "s1",
            "segments": [{
                "id": 7,
                "narrationText": "Volcanoes form where tectonic plates meet. Lava cools into new rock.",
                "audioUrl": "/audio/seg7.flac",
                "duration": 6.0,
                "visuals": [
                    {"id": "intro", "referenceText": "Volcanoes form", "imageUrl": null,
                     "description": null, "timestamp": null},
                    {"id": "lava", "referenceText": "Lava cools into new rock",
                     "imageUrl": "images/lava.png"}
                ]
            }]
        }]}
    });
    std::fs::write(
        projects.path().join("p1.json"),
        serde_json::to_string(&raw).expect("serialize"),
    )
    .expect("seed project file");

    let store = Arc::new(JsonFileStore::new(projects.path()));
    let aligner = aligner_with(
        Arc::new(FixedExtractor(narration())),
        store.clone(),
        config(media.path()),
    );
    let alignment = aligner.organize_project("p1").expect("organize project");
    assert_eq!(alignment.revision, 1);

    let written: serde_json::Value = serde_json::from_str(
        &std::fs::read_to_string(projects.path().join("p1.json")).expect("read project"),
    )
    .expect("stored json");
    let visuals = &written["content"]["sections"][0]["segments"][0]["visuals"];
    let intro = visuals[0].as_object().expect("intro visual");
    assert_eq!(intro.get("imageUrl"), Some(&serde_json::Value::Null));
    assert_eq!(intro.get("description"), Some(&serde_json::Value::Null));
    assert!(!intro.contains_key("removeBackground"));
    assert_eq!(visuals[1]["imageUrl"], json!("/images/lava.png"));
    assert_eq!(visuals[0]["timestamp"], json!(0.0));
}
