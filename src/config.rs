use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::SyncError;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Directory that relative `audioUrl` values resolve against.
    pub media_root: PathBuf,
    /// Directory holding one `<project_id>.json` document per project.
    pub store_dir: PathBuf,
    pub image_url_prefix: String,
    pub extraction_timeout_secs: f64,
    /// Stored segment durations within this distance of the measured audio
    /// length are kept, absorbing fade-out tails.
    pub duration_tolerance_secs: f64,
    pub matching: MatchPolicy,
    pub extractor: ExtractorConfig,
    pub queue: QueueConfig,
}

impl SyncConfig {
    pub const DEFAULT_IMAGE_URL_PREFIX: &'static str = "/";
    pub const DEFAULT_EXTRACTION_TIMEOUT_SECS: f64 = 120.0;
    pub const DEFAULT_DURATION_TOLERANCE_SECS: f64 = 0.5;

    pub fn load(path: &Path) -> Result<Self, SyncError> {
        let data =
            std::fs::read_to_string(path).map_err(|e| SyncError::io("read sync config", e))?;
        let config: Self =
            serde_json::from_str(&data).map_err(|e| SyncError::json("parse sync config", e))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), SyncError> {
        if !self.extraction_timeout_secs.is_finite() || self.extraction_timeout_secs <= 0.0 {
            return Err(SyncError::invalid_input(format!(
                "extraction_timeout_secs must be positive, got {}",
                self.extraction_timeout_secs
            )));
        }
        if !self.duration_tolerance_secs.is_finite() || self.duration_tolerance_secs < 0.0 {
            return Err(SyncError::invalid_input(format!(
                "duration_tolerance_secs must be >= 0, got {}",
                self.duration_tolerance_secs
            )));
        }
        self.matching.validate()
    }

    pub fn extraction_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.extraction_timeout_secs)
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            media_root: PathBuf::from("."),
            store_dir: PathBuf::from("projects"),
            image_url_prefix: Self::DEFAULT_IMAGE_URL_PREFIX.to_string(),
            extraction_timeout_secs: Self::DEFAULT_EXTRACTION_TIMEOUT_SECS,
            duration_tolerance_secs: Self::DEFAULT_DURATION_TOLERANCE_SECS,
            matching: MatchPolicy::default(),
            extractor: ExtractorConfig::default(),
            queue: QueueConfig::default(),
        }
    }
}

/// Acceptance bounds for fuzzy reference matches.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct MatchPolicy {
    pub fuzzy_ratio: f64,
    pub fuzzy_min_edits: usize,
}

impl MatchPolicy {
    pub const DEFAULT_FUZZY_RATIO: f64 = 0.2;
    pub const DEFAULT_FUZZY_MIN_EDITS: usize = 2;

    /// Largest token edit distance still accepted for a reference of `ref_len` tokens.
    pub fn max_distance(&self, ref_len: usize) -> usize {
        let scaled = (self.fuzzy_ratio * ref_len as f64).floor() as usize;
        scaled.max(self.fuzzy_min_edits)
    }

    fn validate(&self) -> Result<(), SyncError> {
        if !self.fuzzy_ratio.is_finite() || !(0.0..=1.0).contains(&self.fuzzy_ratio) {
            return Err(SyncError::invalid_input(format!(
                "matching.fuzzy_ratio must be within [0, 1], got {}",
                self.fuzzy_ratio
            )));
        }
        Ok(())
    }
}

impl Default for MatchPolicy {
    fn default() -> Self {
        Self {
            fuzzy_ratio: Self::DEFAULT_FUZZY_RATIO,
            fuzzy_min_edits: Self::DEFAULT_FUZZY_MIN_EDITS,
        }
    }
}

/// Which word-timing extractor to wire in at startup.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ExtractorConfig {
    /// Read `<audio stem>.words.json` next to the audio file.
    #[default]
    Sidecar,
    /// Run an external forced aligner; `{audio}` in `args` becomes the audio path.
    Command {
        program: String,
        #[serde(default)]
        args: Vec<String>,
    },
    Disabled,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    pub min_interval_ms: u64,
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            min_interval_ms: 500,
            max_attempts: 3,
            initial_backoff_ms: 1_000,
            max_backoff_ms: 30_000,
        }
    }
}
