//! Entity type settings that carry a value and a source.

use crate::model_builder::ModelBuilder;
use keystone_core::{ConfigurationSource, EntityTypeId, ModelResult};
use keystone_metadata::{ChangeTrackingStrategy, PropertyAccessMode};

/// Apply `value` to a setting slot when `source` may change it.
///
/// An equal value is always accepted and only upgrades the source. Clearing
/// the value clears the source.
fn configure<T: PartialEq>(
    value: &mut Option<T>,
    slot: &mut Option<ConfigurationSource>,
    new: Option<T>,
    source: ConfigurationSource,
) -> bool {
    if *value != new && !source.overrides(*slot) {
        return false;
    }
    *slot = new.as_ref().map(|_| source.max(*slot));
    *value = new;
    true
}

impl ModelBuilder {
    pub fn has_query_filter(
        &mut self,
        entity: EntityTypeId,
        filter: Option<String>,
        source: ConfigurationSource,
    ) -> ModelResult<bool> {
        let data = self.entity_type_data_mut(entity)?;
        let applied = configure(&mut data.query_filter, &mut data.query_filter_source, filter, source);
        if !applied {
            self.reject("has_query_filter", entity, source);
        }
        Ok(applied)
    }

    pub fn has_change_tracking_strategy(
        &mut self,
        entity: EntityTypeId,
        strategy: Option<ChangeTrackingStrategy>,
        source: ConfigurationSource,
    ) -> ModelResult<bool> {
        let data = self.entity_type_data_mut(entity)?;
        let applied = configure(
            &mut data.change_tracking,
            &mut data.change_tracking_source,
            strategy,
            source,
        );
        if !applied {
            self.reject("has_change_tracking_strategy", entity, source);
        }
        Ok(applied)
    }

    pub fn use_property_access_mode(
        &mut self,
        entity: EntityTypeId,
        mode: Option<PropertyAccessMode>,
        source: ConfigurationSource,
    ) -> ModelResult<bool> {
        let data = self.entity_type_data_mut(entity)?;
        let applied = configure(&mut data.access_mode, &mut data.access_mode_source, mode, source);
        if !applied {
            self.reject("use_property_access_mode", entity, source);
        }
        Ok(applied)
    }
}
