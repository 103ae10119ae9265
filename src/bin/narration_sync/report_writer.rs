use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use chrono::Utc;
use narration_sync::alignment::report::{summarize_reports, AlignmentReport, ReportSummary};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ProjectEntry {
    pub project_id: String,
    pub attempts: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revision: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub segments: Vec<AlignmentReport>,
}

#[derive(Debug, Serialize)]
pub struct RunReport {
    pub generated_at: String,
    pub summary: ReportSummary,
    pub projects: Vec<ProjectEntry>,
}

impl RunReport {
    pub fn new(projects: Vec<ProjectEntry>) -> Self {
        let all: Vec<AlignmentReport> = projects
            .iter()
            .flat_map(|entry| entry.segments.iter().cloned())
            .collect();
        Self {
            generated_at: Utc::now().to_rfc3339(),
            summary: summarize_reports(&all),
            projects,
        }
    }
}

pub fn write_report(path: &Path, report: &RunReport) -> Result<(), String> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|err| {
            format!(
                "Failed to create report output directory '{}': {err}",
                parent.display()
            )
        })?;
    }

    let mut file = File::create(path)
        .map_err(|err| format!("Failed to create report file '{}': {err}", path.display()))?;
    serde_json::to_writer_pretty(&mut file, report).map_err(|err| {
        format!(
            "Failed to serialize report JSON '{}': {err}",
            path.display()
        )
    })?;
    file.write_all(b"\n")
        .map_err(|err| format!("Failed to finalize report file '{}': {err}", path.display()))?;
    Ok(())
}
