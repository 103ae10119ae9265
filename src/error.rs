use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("I/O error while {context}: {source}")]
    Io {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },
    #[error("JSON error while {context}: {source}")]
    Json {
        context: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("{context}: {message}")]
    Runtime {
        context: &'static str,
        message: String,
    },
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("invalid project document '{project_id}': {message}")]
    InvalidDocument { project_id: String, message: String },
    #[error("project not found: {project_id}")]
    ProjectNotFound { project_id: String },
    #[error("section '{section_id}' not found in project '{project_id}'")]
    SectionNotFound {
        project_id: String,
        section_id: String,
    },
    #[error("segment '{segment_id}' not found in section '{section_id}' of project '{project_id}'")]
    SegmentNotFound {
        project_id: String,
        section_id: String,
        segment_id: String,
    },
    #[error("segment '{segment_id}' has no visuals")]
    NoVisuals { segment_id: String },
    #[error("failed to save project '{project_id}': {message}")]
    Persistence { project_id: String, message: String },
    #[error("project '{project_id}' changed during alignment (expected revision {expected}, found {found})")]
    Conflict {
        project_id: String,
        expected: u64,
        found: u64,
    },
}

impl SyncError {
    pub(crate) fn io(context: &'static str, source: std::io::Error) -> Self {
        Self::Io { context, source }
    }

    pub(crate) fn json(context: &'static str, source: serde_json::Error) -> Self {
        Self::Json { context, source }
    }

    pub(crate) fn runtime(context: &'static str, err: impl std::fmt::Display) -> Self {
        Self::Runtime {
            context,
            message: err.to_string(),
        }
    }

    pub(crate) fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    pub(crate) fn persistence(project_id: impl Into<String>, err: impl std::fmt::Display) -> Self {
        Self::Persistence {
            project_id: project_id.into(),
            message: err.to_string(),
        }
    }

    /// Only a lost optimistic-concurrency race is worth re-running; every
    /// other failure needs a human or a changed input.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}
