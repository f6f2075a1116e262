//! Indexes.

use crate::model_builder::ModelBuilder;
use keystone_core::{ConfigurationSource, EntityTypeId, IndexId, ModelError, ModelResult, PropertyId};

impl ModelBuilder {
    /// Find or add an unnamed index.
    ///
    /// An equal index on a base type is reused. Equal indexes on derived
    /// types are folded into the new one.
    pub fn has_index(
        &mut self,
        entity: EntityTypeId,
        properties: &[PropertyId],
        source: ConfigurationSource,
    ) -> ModelResult<Option<IndexId>> {
        let Some(properties) = self.get_actual_properties(entity, properties)? else {
            return Ok(None);
        };
        if let Some(existing) = self.model.find_index(entity, &properties) {
            if let Some(index) = self.model.index_mut(existing) {
                index.source = source.max(Some(index.source));
            }
            return Ok(Some(existing));
        }

        let derived = self.model.find_derived_indexes(entity, &properties);
        self.batched(|b| {
            let mut detached = Vec::with_capacity(derived.len());
            for index in derived {
                detached.push(b.detach_index(index)?);
            }
            let index = b.add_index_raw(entity, properties, None, source)?;
            for snapshot in &detached {
                b.attach_index(snapshot)?;
            }
            Ok(Some(index))
        })
    }

    /// Find or add a named index.
    ///
    /// A different index holding the name is replaced when `source` overrides
    /// it. Two Explicit indexes may not share a name.
    pub fn has_index_named(
        &mut self,
        entity: EntityTypeId,
        properties: &[PropertyId],
        name: &str,
        source: ConfigurationSource,
    ) -> ModelResult<Option<IndexId>> {
        let Some(properties) = self.get_actual_properties(entity, properties)? else {
            return Ok(None);
        };

        let mut replaced = self.model.find_derived_indexes_by_name(entity, name);
        if let Some(existing) = self.model.find_index_by_name(entity, name) {
            let index = self.index_data(existing)?;
            if index.properties == properties {
                if let Some(index) = self.model.index_mut(existing) {
                    index.source = source.max(Some(index.source));
                }
                return Ok(Some(existing));
            }
            replaced.push(existing);
        }

        let mut inherited_source = None;
        for index in &replaced {
            let current = self.index_data(*index)?;
            let same_properties = current.properties == properties;
            if !same_properties
                && current.source == ConfigurationSource::Explicit
                && source == ConfigurationSource::Explicit
            {
                return Err(ModelError::duplicate_named_index(
                    self.model.entity_name(current.entity),
                    name,
                ));
            }
            if !same_properties && !source.overrides(Some(current.source)) {
                self.reject("has_index_named", name, source);
                return Ok(None);
            }
            if same_properties {
                inherited_source = Some(current.source.max(inherited_source));
            }
        }

        let source = source.max(inherited_source);
        self.batched(|b| {
            for index in replaced {
                if b.model.index(index).is_some() {
                    b.remove_index_raw(index)?;
                }
            }
            let index = b.add_index_raw(entity, properties, Some(name.to_string()), source)?;
            Ok(Some(index))
        })
    }

    /// Remove an index and the implicit properties only it used.
    pub fn has_no_index(&mut self, index: IndexId, source: ConfigurationSource) -> ModelResult<bool> {
        let data = self.index_data(index)?.clone();
        if !source.overrides(Some(data.source)) {
            self.reject("has_no_index", index, source);
            return Ok(false);
        }
        self.batched_flag(|b| {
            b.remove_index_raw(index)?;
            b.remove_unused_implicit_properties(&data.properties)?;
            Ok(true)
        })
    }
}
