//! Index facets.

use crate::model_builder::ModelBuilder;
use keystone_core::{ConfigurationSource, IndexId, ModelResult};
use keystone_metadata::Index;

/// Handle over one index.
#[derive(Debug)]
pub struct IndexBuilder<'a> {
    builder: &'a mut ModelBuilder,
    id: IndexId,
}

impl<'a> IndexBuilder<'a> {
    pub(crate) fn new(builder: &'a mut ModelBuilder, id: IndexId) -> Self {
        Self { builder, id }
    }

    pub fn id(&self) -> IndexId {
        self.id
    }

    pub fn metadata(&self) -> ModelResult<&Index> {
        self.builder.index_data(self.id)
    }

    pub fn is_unique(&mut self, unique: Option<bool>, source: ConfigurationSource) -> ModelResult<bool> {
        self.builder.index_is_unique(self.id, unique, source)
    }
}

impl ModelBuilder {
    /// Handle over an index.
    pub fn index_builder(&mut self, id: IndexId) -> ModelResult<IndexBuilder<'_>> {
        self.index_data(id)?;
        Ok(IndexBuilder::new(self, id))
    }

    /// Mark the index unique or not. `None` resets it.
    pub fn index_is_unique(
        &mut self,
        index: IndexId,
        unique: Option<bool>,
        source: ConfigurationSource,
    ) -> ModelResult<bool> {
        let data = self.index_data(index)?;
        let value = unique.unwrap_or(false);
        if data.is_unique != value && !source.overrides(data.unique_source) {
            self.reject("index_is_unique", index, source);
            return Ok(false);
        }
        if let Some(data) = self.model.index_mut(index) {
            data.unique_source = unique.map(|_| source.max(data.unique_source));
            data.is_unique = value;
        }
        Ok(true)
    }
}
