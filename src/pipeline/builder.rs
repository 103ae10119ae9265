use std::sync::Arc;

use crate::config::SyncConfig;
use crate::error::SyncError;
use crate::extract::build_extractor;
use crate::pipeline::defaults::{FuzzyReferenceMatcher, GapClosingReconstructor};
use crate::pipeline::runtime::{VisualAligner, VisualAlignerParts};
use crate::pipeline::traits::{
    DocumentStore, ReferenceMatcher, TimelineReconstructor, WordTimingExtractor,
};
use crate::store::JsonFileStore;

pub struct VisualAlignerBuilder {
    config: SyncConfig,
    extractor: Option<Arc<dyn WordTimingExtractor>>,
    matcher: Option<Box<dyn ReferenceMatcher>>,
    reconstructor: Option<Box<dyn TimelineReconstructor>>,
    store: Option<Arc<dyn DocumentStore>>,
}

impl VisualAlignerBuilder {
    pub fn new(config: SyncConfig) -> Self {
        Self {
            config,
            extractor: None,
            matcher: None,
            reconstructor: None,
            store: None,
        }
    }

    pub fn with_extractor(mut self, extractor: Arc<dyn WordTimingExtractor>) -> Self {
        self.extractor = Some(extractor);
        self
    }

    pub fn with_matcher(mut self, matcher: Box<dyn ReferenceMatcher>) -> Self {
        self.matcher = Some(matcher);
        self
    }

    pub fn with_reconstructor(mut self, reconstructor: Box<dyn TimelineReconstructor>) -> Self {
        self.reconstructor = Some(reconstructor);
        self
    }

    pub fn with_store(mut self, store: Arc<dyn DocumentStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn build(self) -> Result<VisualAligner, SyncError> {
        self.config.validate()?;

        let extractor = self
            .extractor
            .unwrap_or_else(|| {
                build_extractor(&self.config.extractor, self.config.extraction_timeout())
            });
        let store = self
            .store
            .unwrap_or_else(|| Arc::new(JsonFileStore::new(self.config.store_dir.clone())));
        let policy = self.config.matching;

        Ok(VisualAligner::from_parts(VisualAlignerParts {
            config: self.config,
            extractor,
            matcher: self
                .matcher
                .unwrap_or_else(|| Box::new(FuzzyReferenceMatcher::new(policy))),
            reconstructor: self
                .reconstructor
                .unwrap_or_else(|| Box::new(GapClosingReconstructor)),
            store,
        }))
    }
}
