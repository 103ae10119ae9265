//! Project document persistence and lookup.

use std::collections::HashMap;

use crate::document::{ProjectDocument, Segment};
use crate::error::SyncError;

pub mod json_file;
pub mod locks;
pub mod memory;

pub use crate::pipeline::traits::DocumentStore;
pub use json_file::JsonFileStore;
pub use locks::ProjectLocks;
pub use memory::MemoryStore;

/// `(section index, segment index)` inside `content.sections`.
pub type SegmentPosition = (usize, usize);

/// Segment lookup keyed by `(section id, segment id)` string forms.
///
/// Built once per loaded document so placing aligned segments never rescans
/// the nested section lists.
#[derive(Debug, Default)]
pub struct SegmentIndex {
    sections: HashMap<String, usize>,
    segments: HashMap<(String, String), SegmentPosition>,
}

impl SegmentIndex {
    pub fn build(document: &ProjectDocument) -> Result<Self, SyncError> {
        let mut index = Self::default();
        for (section_idx, section) in document.content.sections.iter().enumerate() {
            let section_id = section.id.to_string();
            if index.sections.insert(section_id.clone(), section_idx).is_some() {
                return Err(duplicate(document, format!("section id '{section_id}'")));
            }
            for (segment_idx, segment) in section.segments.iter().enumerate() {
                let key = (section_id.clone(), segment.id.to_string());
                if index
                    .segments
                    .insert(key, (section_idx, segment_idx))
                    .is_some()
                {
                    return Err(duplicate(
                        document,
                        format!("segment id '{}' in section '{section_id}'", segment.id),
                    ));
                }
            }
        }
        Ok(index)
    }

    /// Position of a segment, or the not-found error naming the missing level.
    pub fn locate(
        &self,
        project_id: &str,
        section_id: &str,
        segment_id: &str,
    ) -> Result<SegmentPosition, SyncError> {
        if !self.sections.contains_key(section_id) {
            return Err(SyncError::SectionNotFound {
                project_id: project_id.to_string(),
                section_id: section_id.to_string(),
            });
        }
        self.segments
            .get(&(section_id.to_string(), segment_id.to_string()))
            .copied()
            .ok_or_else(|| SyncError::SegmentNotFound {
                project_id: project_id.to_string(),
                section_id: section_id.to_string(),
                segment_id: segment_id.to_string(),
            })
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

fn duplicate(document: &ProjectDocument, what: String) -> SyncError {
    SyncError::InvalidDocument {
        project_id: document.id.to_string(),
        message: format!("duplicate {what}"),
    }
}

/// Mutable access to an indexed segment.
pub fn segment_mut(document: &mut ProjectDocument, position: SegmentPosition) -> &mut Segment {
    let (section_idx, segment_idx) = position;
    &mut document.content.sections[section_idx].segments[segment_idx]
}
