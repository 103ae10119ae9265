use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tempfile::NamedTempFile;

use crate::document::ProjectDocument;
use crate::error::SyncError;
use crate::pipeline::traits::DocumentStore;

/// One pretty-printed `<project_id>.json` per project under `dir`.
///
/// Saves go to a temp file in the same directory and are renamed over the
/// previous document, so readers see either the old or the new version.
pub struct JsonFileStore {
    dir: PathBuf,
}

#[derive(Deserialize)]
struct RevisionOnly {
    #[serde(default)]
    revision: Option<u64>,
}

impl JsonFileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn document_path(&self, project_id: &str) -> Result<PathBuf, SyncError> {
        let valid = !project_id.is_empty()
            && project_id != "."
            && project_id != ".."
            && !project_id.contains(['/', '\\'])
            && !project_id.contains('\0');
        if !valid {
            return Err(SyncError::invalid_input(format!(
                "project id cannot be used as a file name: {project_id:?}"
            )));
        }
        Ok(self.dir.join(format!("{project_id}.json")))
    }

    fn stored_revision(&self, path: &Path, project_id: &str) -> Result<u64, SyncError> {
        let data = match fs::read_to_string(path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(SyncError::persistence(project_id, e)),
        };
        let stored: RevisionOnly = serde_json::from_str(&data)
            .map_err(|e| SyncError::persistence(project_id, format!("stored document unreadable: {e}")))?;
        Ok(stored.revision.unwrap_or_default())
    }
}

impl DocumentStore for JsonFileStore {
    fn load(&self, project_id: &str) -> Result<Option<ProjectDocument>, SyncError> {
        let path = self.document_path(project_id)?;
        let data = match fs::read_to_string(&path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(SyncError::io("read project document", e)),
        };
        let value = serde_json::from_str(&data).map_err(|e| SyncError::InvalidDocument {
            project_id: project_id.to_string(),
            message: e.to_string(),
        })?;
        let document = ProjectDocument::from_json(project_id, value)?;
        if !document.id.matches(project_id) {
            return Err(SyncError::InvalidDocument {
                project_id: project_id.to_string(),
                message: format!("file holds project '{}'", document.id),
            });
        }
        tracing::debug!(
            project_id,
            revision = document.revision,
            path = %path.display(),
            "store: loaded project document"
        );
        Ok(Some(document))
    }

    fn save(&self, document: &ProjectDocument) -> Result<u64, SyncError> {
        let project_id = document.id.to_string();
        let path = self.document_path(&project_id)?;

        let found = self.stored_revision(&path, &project_id)?;
        if found != document.revision {
            return Err(SyncError::Conflict {
                project_id,
                expected: document.revision,
                found,
            });
        }

        let mut updated = document.clone();
        updated.revision = document.revision + 1;

        fs::create_dir_all(&self.dir).map_err(|e| SyncError::persistence(&project_id, e))?;
        let temp =
            NamedTempFile::new_in(&self.dir).map_err(|e| SyncError::persistence(&project_id, e))?;
        {
            let mut writer = BufWriter::new(temp.as_file());
            serde_json::to_writer_pretty(&mut writer, &updated)
                .map_err(|e| SyncError::persistence(&project_id, e))?;
            writer
                .flush()
                .map_err(|e| SyncError::persistence(&project_id, e))?;
        }
        temp.as_file()
            .sync_all()
            .map_err(|e| SyncError::persistence(&project_id, e))?;
        temp.persist(&path)
            .map_err(|e| SyncError::persistence(&project_id, e.error))?;

        tracing::debug!(
            project_id = %project_id,
            revision = updated.revision,
            path = %path.display(),
            "store: saved project document"
        );
        Ok(updated.revision)
    }
}
