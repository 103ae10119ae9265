pub mod alignment;
pub mod assets;
pub mod audio;
pub mod config;
pub mod document;
pub mod error;
pub mod extract;
pub mod jobs;
pub mod pipeline;
pub mod store;
pub mod types;

pub use alignment::matcher::get_reference_text_timing;
pub use alignment::report::{AlignmentIssue, AlignmentReport};
pub use config::SyncConfig;
pub use document::{ProjectDocument, Segment, TextField, Visual};
pub use error::SyncError;
pub use pipeline::builder::VisualAlignerBuilder;
pub use pipeline::runtime::{ProjectAlignment, SegmentAlignment, VisualAligner};
pub use pipeline::traits::{DocumentStore, ReferenceMatcher, TimelineReconstructor, WordTimingExtractor};
pub use types::{MatchResult, WordTiming};
