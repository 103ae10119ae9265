use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use crate::document::ProjectDocument;
use crate::error::SyncError;
use crate::pipeline::traits::DocumentStore;

/// In-process store with the same revision rules as [`super::JsonFileStore`].
#[derive(Default)]
pub struct MemoryStore {
    documents: Mutex<HashMap<String, ProjectDocument>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a document as-is, keeping its revision.
    pub fn insert(&self, document: ProjectDocument) {
        let mut documents = self.documents.lock().unwrap_or_else(PoisonError::into_inner);
        documents.insert(document.id.to_string(), document);
    }

    pub fn get(&self, project_id: &str) -> Option<ProjectDocument> {
        let documents = self.documents.lock().unwrap_or_else(PoisonError::into_inner);
        documents.get(project_id).cloned()
    }
}

impl DocumentStore for MemoryStore {
    fn load(&self, project_id: &str) -> Result<Option<ProjectDocument>, SyncError> {
        Ok(self.get(project_id))
    }

    fn save(&self, document: &ProjectDocument) -> Result<u64, SyncError> {
        let project_id = document.id.to_string();
        let mut documents = self.documents.lock().unwrap_or_else(PoisonError::into_inner);
        let found = documents.get(&project_id).map_or(0, |stored| stored.revision);
        if found != document.revision {
            return Err(SyncError::Conflict {
                project_id,
                expected: document.revision,
                found,
            });
        }
        let mut updated = document.clone();
        updated.revision = found + 1;
        let revision = updated.revision;
        documents.insert(project_id, updated);
        Ok(revision)
    }
}
