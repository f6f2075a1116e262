//! Built-in conventions.
//!
//! Both run at Convention, so anything configured explicitly or by
//! annotation wins over them. Events may name elements that are gone by the
//! time they are dispatched; those are skipped.

use crate::model_builder::ModelBuilder;
use keystone_conventions::{Convention, ModelEvent};
use keystone_core::{ConfigurationSource, EntityTypeId, ModelResult};

/// Makes `Id` or `<Entity>Id` the primary key of root entity types.
///
/// Keyless types, owned types and types that already have a primary key are
/// left alone.
#[derive(Debug, Default, Clone, Copy)]
pub struct KeyDiscoveryConvention;

impl KeyDiscoveryConvention {
    fn discover(&self, ctx: &mut ModelBuilder, entity: EntityTypeId) -> ModelResult<()> {
        let Some(data) = ctx.model.entity_type(entity) else {
            return Ok(());
        };
        if data.base.is_some()
            || data.is_keyless
            || data.primary_key.is_some()
            || ctx.model.find_ownership(entity).is_some()
        {
            return Ok(());
        }

        let typed_id = format!("{}Id", data.short_name());
        let candidate = data.properties.iter().copied().find(|p| {
            ctx.model
                .property(*p)
                .is_some_and(|p| p.name.eq_ignore_ascii_case("Id") || p.name.eq_ignore_ascii_case(&typed_id))
        });
        if let Some(property) = candidate {
            ctx.primary_key(entity, &[property], ConfigurationSource::Convention)?;
        }
        Ok(())
    }
}

impl Convention<ModelBuilder> for KeyDiscoveryConvention {
    fn name(&self) -> &'static str {
        "key_discovery"
    }

    fn apply(&self, ctx: &mut ModelBuilder, event: &ModelEvent) -> ModelResult<()> {
        match event {
            ModelEvent::EntityTypeAdded { entity } => self.discover(ctx, *entity),
            ModelEvent::PropertyAdded { property } => match ctx.model.property(*property) {
                Some(data) => {
                    let entity = data.entity;
                    self.discover(ctx, entity)
                }
                None => Ok(()),
            },
            ModelEvent::BaseTypeChanged { entity, new_base: None, .. } => self.discover(ctx, *entity),
            ModelEvent::KeylessChanged { entity, keyless: false } => self.discover(ctx, *entity),
            ModelEvent::OwnershipChanged { foreign_key } => match ctx.model.foreign_key(*foreign_key) {
                Some(fk) if !fk.is_ownership => {
                    let dependent = fk.dependent;
                    self.discover(ctx, dependent)
                }
                _ => Ok(()),
            },
            _ => Ok(()),
        }
    }
}

/// Keeps a discriminator on every hierarchy root that has derived types and
/// gives each type in the hierarchy its name as discriminator value.
/// Flattened hierarchies lose the discriminator.
#[derive(Debug, Default, Clone, Copy)]
pub struct DiscriminatorConvention;

impl DiscriminatorConvention {
    fn refresh(&self, ctx: &mut ModelBuilder, root: EntityTypeId) -> ModelResult<()> {
        let Some(data) = ctx.model.entity_type(root) else {
            return Ok(());
        };
        if data.base.is_some() {
            return Ok(());
        }
        let has_discriminator = data.discriminator.is_some();

        if ctx.model.derived_types(root).is_empty() {
            if has_discriminator {
                let removed = ctx.has_no_discriminator(root, ConfigurationSource::Convention)?;
                if removed {
                    ctx.has_discriminator_value(root, None, ConfigurationSource::Convention)?;
                }
            }
            return Ok(());
        }

        if !has_discriminator
            && ctx
                .has_discriminator(root, None, None, ConfigurationSource::Convention)?
                .is_none()
        {
            return Ok(());
        }
        let mut hierarchy = vec![root];
        hierarchy.extend(ctx.model.all_derived_types(root));
        for entity in hierarchy {
            let Some(data) = ctx.model.entity_type(entity) else {
                continue;
            };
            if data.discriminator_value.is_none() {
                let value = data.short_name().to_string();
                ctx.has_discriminator_value(entity, Some(value), ConfigurationSource::Convention)?;
            }
        }
        Ok(())
    }
}

impl Convention<ModelBuilder> for DiscriminatorConvention {
    fn name(&self) -> &'static str {
        "discriminator"
    }

    fn apply(&self, ctx: &mut ModelBuilder, event: &ModelEvent) -> ModelResult<()> {
        match event {
            ModelEvent::BaseTypeChanged {
                entity,
                new_base,
                old_base,
            } => {
                if let Some(old_base) = old_base {
                    if ctx.model.entity_type(*old_base).is_some() {
                        let old_root = ctx.model.root_type(*old_base);
                        self.refresh(ctx, old_root)?;
                    }
                }
                if new_base.is_none() {
                    // A type that left its hierarchy keeps no inherited value
                    let stale = ctx
                        .model
                        .entity_type(*entity)
                        .is_some_and(|e| e.discriminator_value.is_some() && e.discriminator.is_none());
                    if stale && ctx.model.derived_types(*entity).is_empty() {
                        ctx.has_discriminator_value(*entity, None, ConfigurationSource::Convention)?;
                    }
                }
                if ctx.model.entity_type(*entity).is_some() {
                    let root = ctx.model.root_type(*entity);
                    self.refresh(ctx, root)?;
                }
                Ok(())
            }
            ModelEvent::EntityTypeRemoved { .. } => {
                let roots: Vec<EntityTypeId> = ctx
                    .model
                    .entity_types()
                    .filter(|e| e.base.is_none() && e.discriminator.is_some())
                    .map(|e| e.id)
                    .collect();
                for root in roots {
                    self.refresh(ctx, root)?;
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::{BuilderConfig, ModelBuilder};
    use keystone_core::{ConfigurationSource, PropertyType, ScalarType};
    use keystone_metadata::RecordCatalog;

    use ConfigurationSource::*;

    fn session() -> ModelBuilder {
        ModelBuilder::new(RecordCatalog::empty(), BuilderConfig::default()).unwrap()
    }

    // ========== TEST: id_property_becomes_primary_key ==========
    #[test]
    fn test_id_property_becomes_primary_key() {
        // GIVEN conventions on
        let mut mb = session();
        let blog = mb.entity("Blog", Explicit).unwrap().unwrap();

        // WHEN a BlogId property appears
        let id = mb
            .property(blog, "BlogId", Some(PropertyType::new(ScalarType::Int32)), Explicit)
            .unwrap()
            .unwrap();

        // THEN it is the primary key at Convention
        let entity = mb.model().entity_type(blog).unwrap();
        let key = entity.primary_key.unwrap();
        assert_eq!(mb.model().key(key).unwrap().properties, vec![id]);
        assert_eq!(entity.primary_key_source, Some(Convention));
    }

    // ========== TEST: discovered_key_yields_to_explicit ==========
    #[test]
    fn test_discovered_key_yields_to_explicit() {
        let mut mb = session();
        let blog = mb.entity("Blog", Explicit).unwrap().unwrap();
        let int = Some(PropertyType::new(ScalarType::Int32));
        mb.property(blog, "Id", int, Explicit).unwrap();
        let code = mb.property(blog, "Code", int, Explicit).unwrap().unwrap();

        let key = mb.primary_key(blog, &[code], Explicit).unwrap().unwrap();

        assert_eq!(mb.model().find_primary_key(blog), Some(key));
    }

    // ========== TEST: keyless_type_not_keyed ==========
    #[test]
    fn test_keyless_type_not_keyed() {
        let mut mb = session();
        let view = mb.entity("View", Explicit).unwrap().unwrap();
        mb.has_no_key_all(view, Explicit).unwrap();

        mb.property(view, "Id", Some(PropertyType::new(ScalarType::Int32)), Explicit)
            .unwrap();

        assert!(mb.model().find_primary_key(view).is_none());
    }

    // ========== TEST: discriminator_follows_hierarchy ==========
    #[test]
    fn test_discriminator_follows_hierarchy() {
        // GIVEN a root with one derived type
        let mut mb = session();
        let animal = mb.entity("Animal", Explicit).unwrap().unwrap();
        let cat = mb.entity("Cat", Explicit).unwrap().unwrap();
        mb.has_base_type(cat, Some(animal), Explicit).unwrap();

        // THEN the root has a discriminator and both types a value
        let root = mb.model().entity_type(animal).unwrap();
        assert!(root.discriminator.is_some());
        assert_eq!(root.discriminator_value.as_deref(), Some("Animal"));
        assert_eq!(
            mb.model().entity_type(cat).unwrap().discriminator_value.as_deref(),
            Some("Cat")
        );

        // WHEN the hierarchy is flattened
        mb.has_base_type(cat, None, Explicit).unwrap();

        // THEN the discriminator is gone
        let root = mb.model().entity_type(animal).unwrap();
        assert!(root.discriminator.is_none());
        assert!(mb.model().find_property(animal, "Discriminator").is_none());
        assert_eq!(mb.model().entity_type(cat).unwrap().discriminator_value, None);
    }
}
