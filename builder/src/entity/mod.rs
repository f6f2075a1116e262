//! Entity type operations.
//!
//! The operations are methods on [`ModelBuilder`] that take an entity type id,
//! grouped into one module per concern. [`EntityTypeBuilder`] is the handle
//! over a single entity type that resolves names and delegates.

mod base_type;
mod discriminator;
mod ignore;
mod indexes;
mod keys;
mod ownership;
mod properties;
mod relationships;
mod service_properties;
mod settings;
mod skip_navigations;

use crate::foreign_key::ForeignKeyBuilder;
use crate::model_builder::ModelBuilder;
use crate::property::PropertyBuilder;
use keystone_core::{
    ConfigurationSource, EntityTypeId, ForeignKeyId, IndexId, KeyId, ModelError, ModelResult,
    PropertyId, PropertyType, ServicePropertyId, SkipNavigationId,
};
use keystone_metadata::{ChangeTrackingStrategy, EntityType, PropertyAccessMode};

/// Handle over one entity type.
#[derive(Debug)]
pub struct EntityTypeBuilder<'a> {
    builder: &'a mut ModelBuilder,
    id: EntityTypeId,
}

impl<'a> EntityTypeBuilder<'a> {
    pub(crate) fn new(builder: &'a mut ModelBuilder, id: EntityTypeId) -> Self {
        Self { builder, id }
    }

    pub fn id(&self) -> EntityTypeId {
        self.id
    }

    /// The entity type, or `Orphaned` once it has been removed.
    pub fn metadata(&self) -> ModelResult<&EntityType> {
        self.builder.entity_data(self.id)
    }

    /// The session this handle borrows.
    pub fn session(&mut self) -> &mut ModelBuilder {
        self.builder
    }

    fn entity_named(&self, name: &str) -> ModelResult<EntityTypeId> {
        self.builder
            .model
            .find_entity_type(name)
            .ok_or_else(|| ModelError::unknown_entity_type(name))
    }

    // ==================== Properties ====================

    pub fn property(
        &mut self,
        name: &str,
        ty: Option<PropertyType>,
        source: ConfigurationSource,
    ) -> ModelResult<Option<PropertyId>> {
        self.builder.property(self.id, name, ty, source)
    }

    /// Handle over a property visible on this entity type.
    pub fn property_builder(&mut self, name: &str) -> ModelResult<PropertyBuilder<'_>> {
        let id = self
            .builder
            .model
            .find_property(self.id, name)
            .ok_or_else(|| {
                ModelError::property_not_in_hierarchy(self.builder.model.entity_name(self.id), name)
            })?;
        Ok(PropertyBuilder::new(self.builder, id))
    }

    pub fn has_no_property(&mut self, name: &str, source: ConfigurationSource) -> ModelResult<bool> {
        match self.builder.model.find_declared_property(self.id, name) {
            Some(property) => self.builder.has_no_property(property, source),
            None => Ok(true),
        }
    }

    pub fn service_property(
        &mut self,
        name: &str,
        service_type: Option<&str>,
        source: ConfigurationSource,
    ) -> ModelResult<Option<ServicePropertyId>> {
        self.builder
            .service_property(self.id, name, service_type, source)
    }

    pub fn ignore(&mut self, name: &str, source: ConfigurationSource) -> ModelResult<bool> {
        self.builder.ignore(self.id, name, source)
    }

    // ==================== Keys ====================

    pub fn has_key(&mut self, names: &[&str], source: ConfigurationSource) -> ModelResult<Option<KeyId>> {
        let Some(properties) = self.builder.get_or_create_properties(
            self.id,
            &to_owned(names),
            source,
            None,
            true,
            false,
        )?
        else {
            return Ok(None);
        };
        self.builder.has_key(self.id, &properties, source)
    }

    pub fn primary_key(
        &mut self,
        names: &[&str],
        source: ConfigurationSource,
    ) -> ModelResult<Option<KeyId>> {
        let Some(properties) = self.builder.get_or_create_properties(
            self.id,
            &to_owned(names),
            source,
            None,
            true,
            false,
        )?
        else {
            return Ok(None);
        };
        self.builder.primary_key(self.id, &properties, source)
    }

    pub fn has_no_key(&mut self, key: KeyId, source: ConfigurationSource) -> ModelResult<bool> {
        self.builder.has_no_key(key, source)
    }

    /// Make the entity type keyless.
    pub fn has_no_key_all(&mut self, source: ConfigurationSource) -> ModelResult<bool> {
        self.builder.has_no_key_all(self.id, source)
    }

    // ==================== Indexes ====================

    pub fn has_index(&mut self, names: &[&str], source: ConfigurationSource) -> ModelResult<Option<IndexId>> {
        let Some(properties) = self.builder.get_or_create_properties(
            self.id,
            &to_owned(names),
            source,
            None,
            false,
            false,
        )?
        else {
            return Ok(None);
        };
        self.builder.has_index(self.id, &properties, source)
    }

    pub fn has_index_named(
        &mut self,
        names: &[&str],
        index_name: &str,
        source: ConfigurationSource,
    ) -> ModelResult<Option<IndexId>> {
        let Some(properties) = self.builder.get_or_create_properties(
            self.id,
            &to_owned(names),
            source,
            None,
            false,
            false,
        )?
        else {
            return Ok(None);
        };
        self.builder
            .has_index_named(self.id, &properties, index_name, source)
    }

    pub fn has_no_index(&mut self, index: IndexId, source: ConfigurationSource) -> ModelResult<bool> {
        self.builder.has_no_index(index, source)
    }

    // ==================== Inheritance ====================

    pub fn has_base_type(
        &mut self,
        base: Option<&str>,
        source: ConfigurationSource,
    ) -> ModelResult<Option<EntityTypeId>> {
        let base = base.map(|name| self.entity_named(name)).transpose()?;
        self.builder.has_base_type(self.id, base, source)
    }

    pub fn has_discriminator(
        &mut self,
        name: Option<&str>,
        ty: Option<PropertyType>,
        source: ConfigurationSource,
    ) -> ModelResult<Option<PropertyId>> {
        self.builder.has_discriminator(self.id, name, ty, source)
    }

    pub fn has_no_discriminator(&mut self, source: ConfigurationSource) -> ModelResult<bool> {
        self.builder.has_no_discriminator(self.id, source)
    }

    pub fn has_discriminator_value(
        &mut self,
        value: Option<&str>,
        source: ConfigurationSource,
    ) -> ModelResult<bool> {
        self.builder
            .has_discriminator_value(self.id, value.map(str::to_string), source)
    }

    // ==================== Relationships ====================

    pub fn has_relationship(
        &mut self,
        target: &str,
        navigation: Option<&str>,
        inverse: Option<&str>,
        source: ConfigurationSource,
    ) -> ModelResult<Option<ForeignKeyId>> {
        let target = self.entity_named(target)?;
        self.builder
            .has_relationship(self.id, target, navigation, inverse, None, source)
    }

    /// Handle over a relationship this entity type takes part in.
    pub fn relationship(&mut self, foreign_key: ForeignKeyId) -> ModelResult<ForeignKeyBuilder<'_>> {
        self.builder.foreign_key_data(foreign_key)?;
        Ok(ForeignKeyBuilder::new(self.builder, foreign_key))
    }

    pub fn has_ownership(
        &mut self,
        target_record: &str,
        navigation: &str,
        inverse: Option<&str>,
        source: ConfigurationSource,
    ) -> ModelResult<Option<ForeignKeyId>> {
        self.builder
            .has_ownership(self.id, target_record, navigation, inverse, source)
    }

    pub fn has_skip_navigation(
        &mut self,
        name: &str,
        target: &str,
        is_collection: bool,
        on_dependent: bool,
        source: ConfigurationSource,
    ) -> ModelResult<Option<SkipNavigationId>> {
        let target = self.entity_named(target)?;
        self.builder.has_skip_navigation(
            self.id,
            name,
            target,
            is_collection,
            on_dependent,
            source,
        )
    }

    // ==================== Settings ====================

    pub fn has_query_filter(
        &mut self,
        filter: Option<&str>,
        source: ConfigurationSource,
    ) -> ModelResult<bool> {
        self.builder
            .has_query_filter(self.id, filter.map(str::to_string), source)
    }

    pub fn has_change_tracking_strategy(
        &mut self,
        strategy: Option<ChangeTrackingStrategy>,
        source: ConfigurationSource,
    ) -> ModelResult<bool> {
        self.builder
            .has_change_tracking_strategy(self.id, strategy, source)
    }

    pub fn use_property_access_mode(
        &mut self,
        mode: Option<PropertyAccessMode>,
        source: ConfigurationSource,
    ) -> ModelResult<bool> {
        self.builder.use_property_access_mode(self.id, mode, source)
    }
}

fn to_owned(names: &[&str]) -> Vec<String> {
    names.iter().map(|n| n.to_string()).collect()
}
