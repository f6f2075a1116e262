//! Discriminators. The discriminator property lives on the hierarchy root.

use crate::model_builder::ModelBuilder;
use keystone_core::{ConfigurationSource, EntityTypeId, ModelResult, PropertyId, PropertyType, ScalarType};

impl ModelBuilder {
    /// Set the discriminator property of the hierarchy, creating it when
    /// needed. The property is made required; an old implicit discriminator
    /// property that nothing else uses is removed.
    pub fn has_discriminator(
        &mut self,
        entity: EntityTypeId,
        name: Option<&str>,
        ty: Option<PropertyType>,
        source: ConfigurationSource,
    ) -> ModelResult<Option<PropertyId>> {
        let root = self.model.root_type(entity);
        let data = self.entity_data(root)?;
        let old = data.discriminator;
        let old_source = data.discriminator_source;
        let name = name.map_or_else(|| self.config.discriminator_name.clone(), str::to_string);

        if let Some(current) = old {
            let property = self.property_data(current)?;
            let same = property.name == name && ty.map_or(true, |ty| ty == property.ty);
            if same {
                if let Some(root) = self.model.entity_type_mut(root) {
                    root.discriminator_source = Some(source.max(old_source));
                }
                return Ok(Some(current));
            }
            if !source.overrides(old_source) {
                self.reject("has_discriminator", &name, source);
                return Ok(None);
            }
        }

        let type_source = ty.map(|_| source);
        let ty = ty.unwrap_or_else(|| PropertyType::new(ScalarType::String).make_nullable(false));
        self.batched(|b| {
            let Some(property) = b.property_with(root, &name, Some(ty), type_source, source)? else {
                return Ok(None);
            };
            b.property_is_required(property, Some(true), source)?;
            b.set_discriminator_raw(root, Some(property), Some(source.max(old_source)))?;
            if let Some(old) = old.filter(|old| *old != property) {
                b.remove_unused_implicit_properties(&[old])?;
            }
            tracing::debug!(
                target: "keystone::builder",
                entity = %b.model.entity_name(root),
                discriminator = %name,
                %source,
                "discriminator set"
            );
            Ok(Some(property))
        })
    }

    /// Clear the discriminator of the hierarchy.
    pub fn has_no_discriminator(&mut self, entity: EntityTypeId, source: ConfigurationSource) -> ModelResult<bool> {
        let root = self.model.root_type(entity);
        let data = self.entity_data(root)?;
        let Some(old) = data.discriminator else {
            return Ok(true);
        };
        if !source.overrides(data.discriminator_source) {
            self.reject("has_no_discriminator", root, source);
            return Ok(false);
        }
        self.batched_flag(|b| {
            b.set_discriminator_raw(root, None, None)?;
            b.remove_unused_implicit_properties(&[old])?;
            Ok(true)
        })
    }

    /// Set the discriminator value of this entity type.
    pub fn has_discriminator_value(
        &mut self,
        entity: EntityTypeId,
        value: Option<String>,
        source: ConfigurationSource,
    ) -> ModelResult<bool> {
        let data = self.entity_data(entity)?;
        if data.discriminator_value != value && !source.overrides(data.discriminator_value_source) {
            self.reject("has_discriminator_value", entity, source);
            return Ok(false);
        }
        if let Some(data) = self.model.entity_type_mut(entity) {
            data.discriminator_value_source = value.as_ref().map(|_| source.max(data.discriminator_value_source));
            data.discriminator_value = value;
        }
        Ok(true)
    }
}
