//! Keys, the primary key and keyless entity types.

use crate::model_builder::ModelBuilder;
use keystone_core::{ConfigurationSource, EntityTypeId, KeyId, ModelResult, PropertyId};

impl ModelBuilder {
    // ==================== Keys ====================

    /// Add a key, or raise the source of an equal one.
    pub fn has_key(
        &mut self,
        entity: EntityTypeId,
        properties: &[PropertyId],
        source: ConfigurationSource,
    ) -> ModelResult<Option<KeyId>> {
        self.batched(|b| b.has_key_internal(entity, properties, source))
    }

    pub(crate) fn has_key_internal(
        &mut self,
        entity: EntityTypeId,
        properties: &[PropertyId],
        source: ConfigurationSource,
    ) -> ModelResult<Option<KeyId>> {
        let data = self.entity_data(entity)?;
        let keyless = data.is_keyless;
        if keyless && !source.overrides(data.keyless_source) {
            self.reject("has_key", &data.name, source);
            return Ok(None);
        }
        let Some(properties) = self.get_actual_properties(entity, properties)? else {
            return Ok(None);
        };

        if let Some(key) = self.model.find_declared_key(entity, &properties) {
            if let Some(data) = self.model.key_mut(key) {
                data.source = source.max(Some(data.source));
            }
            if keyless {
                self.set_keyless_raw(entity, false, Some(source))?;
            }
            return Ok(Some(key));
        }

        // Foreign keys of derived types that use these properties give them up
        let containing: Vec<_> = properties
            .iter()
            .flat_map(|p| self.model.containing_foreign_keys(*p))
            .filter(|fk| self.model.foreign_key(*fk).is_some_and(|fk| fk.dependent != entity))
            .collect();
        let blocked = containing.iter().any(|fk| {
            self.model
                .foreign_key(*fk)
                .is_some_and(|fk| !source.overrides(fk.properties_source))
        });
        if blocked {
            self.reject("has_key", self.model.property_list(&properties), source);
            return Ok(None);
        }

        for fk in containing {
            let pinned = self
                .model
                .foreign_key(fk)
                .is_some_and(|fk| fk.properties_source == Some(ConfigurationSource::Explicit));
            if !pinned && self.model.foreign_key(fk).is_some() {
                self.has_foreign_key(fk, None, source)?;
            }
        }

        for property in &properties {
            self.property_is_required(*property, Some(true), source)?;
        }
        if keyless {
            self.set_keyless_raw(entity, false, Some(source))?;
        }
        let key = self.add_key_raw(entity, properties, source)?;
        tracing::debug!(target: "keystone::builder", %entity, %key, %source, "key added");
        Ok(Some(key))
    }

    /// Remove a key.
    ///
    /// Referencing foreign keys are detached and reattached so they rebind
    /// to the primary key or a temporary key.
    pub fn has_no_key(&mut self, key: KeyId, source: ConfigurationSource) -> ModelResult<bool> {
        let data = self.key_data(key)?.clone();
        if !source.overrides(Some(data.source)) {
            self.reject("has_no_key", key, source);
            return Ok(false);
        }
        let referencing = self.model.referencing_foreign_keys(key);
        let blocked = referencing.iter().any(|fk| {
            self.model
                .foreign_key(*fk)
                .is_some_and(|fk| !source.overrides(Some(fk.source)))
        });
        if blocked {
            self.reject("has_no_key", key, source);
            return Ok(false);
        }

        self.batched_flag(|b| {
            let mut detached = Vec::with_capacity(referencing.len());
            for fk in referencing {
                if b.model.foreign_key(fk).is_some() {
                    let mut snapshot = b.detach_foreign_key(fk)?;
                    snapshot.principal_key_source = None;
                    detached.push(snapshot);
                }
            }

            if b.model.find_primary_key(data.entity) == Some(key) {
                b.set_primary_key_raw(data.entity, None, None)?;
            }
            b.remove_key_raw(key)?;

            for snapshot in &detached {
                b.attach_foreign_key(snapshot)?;
            }
            b.remove_unused_implicit_properties(&data.properties)?;
            b.restore_nullability(&data.properties, source)?;
            Ok(true)
        })
    }

    /// Reset the required flag of properties that no key or required
    /// foreign key holds any more.
    fn restore_nullability(
        &mut self,
        properties: &[PropertyId],
        source: ConfigurationSource,
    ) -> ModelResult<()> {
        for property in properties {
            let Some(data) = self.model.property(*property) else {
                continue;
            };
            if !data.ty.is_nullable() || !self.model.containing_keys(*property).is_empty() {
                continue;
            }
            let required_by_fk = self
                .model
                .containing_foreign_keys(*property)
                .iter()
                .any(|fk| self.model.foreign_key(*fk).is_some_and(|fk| fk.is_required));
            if !required_by_fk {
                self.property_is_required(*property, None, source)?;
            }
        }
        Ok(())
    }

    // ==================== Primary Key ====================

    /// Make the key over `properties` primary, adding it if needed.
    pub fn primary_key(
        &mut self,
        entity: EntityTypeId,
        properties: &[PropertyId],
        source: ConfigurationSource,
    ) -> ModelResult<Option<KeyId>> {
        if let Some(current) = self.model.find_primary_key(entity) {
            let same = self.key_data(current)?.properties == properties;
            if same {
                if let Some(key) = self.model.key_mut(current) {
                    key.source = source.max(Some(key.source));
                }
                if let Some(data) = self.model.entity_type_mut(entity) {
                    data.primary_key_source = Some(source.max(data.primary_key_source));
                }
                return Ok(Some(current));
            }
        }
        if !self.can_set_primary_key(entity, Some(properties), source)? {
            self.reject("primary_key", self.model.property_list(properties), source);
            return Ok(None);
        }
        self.batched(|b| b.replace_primary_key(entity, Some(properties), source))
    }

    /// Clear the primary key. The previous key stays unless unused.
    pub fn has_no_primary_key(
        &mut self,
        entity: EntityTypeId,
        source: ConfigurationSource,
    ) -> ModelResult<bool> {
        if self.model.find_primary_key(entity).is_none() {
            return Ok(true);
        }
        if !self.can_set_primary_key(entity, None, source)? {
            self.reject("has_no_primary_key", entity, source);
            return Ok(false);
        }
        self.batched_flag(|b| {
            b.replace_primary_key(entity, None, source)?;
            Ok(true)
        })
    }

    fn can_set_primary_key(
        &self,
        entity: EntityTypeId,
        properties: Option<&[PropertyId]>,
        source: ConfigurationSource,
    ) -> ModelResult<bool> {
        let data = self.entity_data(entity)?;
        let current = data
            .primary_key
            .and_then(|k| self.model.key(k))
            .map(|k| k.properties.as_slice());
        if current == properties {
            return Ok(true);
        }
        Ok(source.overrides(data.primary_key_source)
            && (properties.is_none() || !data.is_keyless || source.overrides(data.keyless_source)))
    }

    fn replace_primary_key(
        &mut self,
        entity: EntityTypeId,
        properties: Option<&[PropertyId]>,
        source: ConfigurationSource,
    ) -> ModelResult<Option<KeyId>> {
        let previous = self.entity_data(entity)?.primary_key;
        let key = match properties {
            Some(properties) => match self.has_key_internal(entity, properties, source)? {
                Some(key) => Some(key),
                None => return Ok(None),
            },
            None => None,
        };
        self.set_primary_key_raw(entity, key, Some(source))?;

        // Unpinned foreign keys follow the primary key
        let others: Vec<KeyId> = self
            .entity_data(entity)?
            .keys
            .iter()
            .copied()
            .filter(|k| Some(*k) != key)
            .collect();
        let mut detached = Vec::new();
        for other in others {
            for fk in self.model.referencing_foreign_keys(other) {
                let unpinned = self
                    .model
                    .foreign_key(fk)
                    .is_some_and(|fk| fk.principal_key_source.is_none());
                if unpinned {
                    detached.push(self.detach_foreign_key(fk)?);
                }
            }
        }
        for snapshot in &detached {
            self.attach_foreign_key(snapshot)?;
        }

        if let Some(previous) = previous.filter(|p| Some(*p) != key) {
            if self.model.key(previous).is_some() {
                self.remove_key_if_unused(previous)?;
            }
        }
        Ok(key)
    }

    // ==================== Keyless ====================

    /// Make the entity type keyless, removing its keys and every foreign key
    /// that references it.
    pub fn has_no_key_all(
        &mut self,
        entity: EntityTypeId,
        source: ConfigurationSource,
    ) -> ModelResult<bool> {
        let data = self.entity_data(entity)?.clone();
        if data.is_keyless {
            if let Some(entity) = self.model.entity_type_mut(entity) {
                entity.keyless_source = Some(source.max(entity.keyless_source));
            }
            return Ok(true);
        }
        if !source.overrides(data.keyless_source) {
            self.reject("has_no_key_all", &data.name, source);
            return Ok(false);
        }

        let referencing = self.model.declared_referencing_foreign_keys(entity);
        let blocked_fk = referencing.iter().any(|fk| {
            self.model
                .foreign_key(*fk)
                .is_some_and(|fk| !source.overrides(Some(fk.source)))
        });
        let blocked_navigation = data.foreign_keys.iter().any(|fk| {
            self.model
                .foreign_key(*fk)
                .and_then(|fk| fk.principal_to_dependent.as_ref())
                .is_some_and(|n| !source.overrides(Some(n.source)))
        });
        let blocked_key = data
            .keys
            .iter()
            .any(|k| self.model.key(*k).is_some_and(|k| !source.overrides(Some(k.source))));
        if blocked_fk || blocked_navigation || blocked_key {
            self.reject("has_no_key_all", &data.name, source);
            return Ok(false);
        }

        self.batched_flag(|b| {
            for fk in referencing {
                if b.model.foreign_key(fk).is_some() {
                    b.remove_relationship_internal(fk)?;
                }
            }
            for fk in data.foreign_keys.iter().copied() {
                let navigated = b
                    .model
                    .foreign_key(fk)
                    .is_some_and(|fk| fk.principal_to_dependent.is_some());
                if navigated {
                    b.set_navigation_raw(fk, false, None)?;
                }
            }
            if data.primary_key.is_some() {
                b.set_primary_key_raw(entity, None, None)?;
            }
            for key in data.keys.iter().copied() {
                let Some(properties) = b.model.key(key).map(|k| k.properties.clone()) else {
                    continue;
                };
                b.remove_key_raw(key)?;
                b.remove_unused_implicit_properties(&properties)?;
            }
            b.set_keyless_raw(entity, true, Some(source))?;
            Ok(true)
        })
    }

    // ==================== Cleanup ====================

    /// Remove a key that is neither primary nor referenced, at Convention.
    pub fn remove_key_if_unused(&mut self, key: KeyId) -> ModelResult<bool> {
        let Some(data) = self.model.key(key) else {
            return Ok(false);
        };
        if self.model.find_primary_key(data.entity) == Some(key)
            || !self.model.referencing_foreign_keys(key).is_empty()
        {
            return Ok(false);
        }
        self.has_no_key(key, ConfigurationSource::Convention)
    }

    /// Remove implicitly created shadow properties that nothing uses.
    pub fn remove_unused_implicit_properties(&mut self, properties: &[PropertyId]) -> ModelResult<()> {
        for property in properties {
            let removable = self
                .model
                .property(*property)
                .is_some_and(|p| p.is_implicitly_created())
                && !self.model.property_is_used(*property)
                && !self
                    .model
                    .entity_types()
                    .any(|e| e.discriminator == Some(*property));
            if removable {
                self.remove_property_raw(*property)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::{BuilderConfig, ModelBuilder};
    use keystone_core::{ConfigurationSource, PropertyType, ScalarType};
    use keystone_metadata::RecordCatalog;

    use ConfigurationSource::*;

    fn session() -> ModelBuilder {
        ModelBuilder::new(RecordCatalog::empty(), BuilderConfig::minimal()).unwrap()
    }

    fn int() -> Option<PropertyType> {
        Some(PropertyType::new(ScalarType::Int32))
    }

    // ========== TEST: primary_key_same_key_upgrades ==========
    #[test]
    fn test_primary_key_same_key_upgrades() {
        // GIVEN a primary key set by convention
        let mut mb = session();
        let blog = mb.entity("Blog", Explicit).unwrap().unwrap();
        let id = mb.property(blog, "Id", int(), Explicit).unwrap().unwrap();
        let key = mb.primary_key(blog, &[id], Convention).unwrap().unwrap();

        // WHEN the same key is made primary explicitly
        let again = mb.primary_key(blog, &[id], Explicit).unwrap();

        // THEN the key is kept and only sources rise
        assert_eq!(again, Some(key));
        let entity = mb.model().entity_type(blog).unwrap();
        assert_eq!(entity.primary_key_source, Some(Explicit));
        assert_eq!(mb.model().key(key).unwrap().source, Explicit);
    }

    // ========== TEST: weaker_primary_key_rejected ==========
    #[test]
    fn test_weaker_primary_key_rejected() {
        let mut mb = session();
        let blog = mb.entity("Blog", Explicit).unwrap().unwrap();
        let id = mb.property(blog, "Id", int(), Explicit).unwrap().unwrap();
        let code = mb.property(blog, "Code", int(), Explicit).unwrap().unwrap();
        let key = mb.primary_key(blog, &[id], Explicit).unwrap().unwrap();

        let result = mb.primary_key(blog, &[code], Convention).unwrap();

        assert_eq!(result, None);
        assert_eq!(mb.model().find_primary_key(blog), Some(key));
    }

    // ========== TEST: replaced_primary_key_removed_when_unused ==========
    #[test]
    fn test_replaced_primary_key_removed_when_unused() {
        // GIVEN a convention primary key
        let mut mb = session();
        let blog = mb.entity("Blog", Explicit).unwrap().unwrap();
        let id = mb.property(blog, "Id", int(), Explicit).unwrap().unwrap();
        let code = mb.property(blog, "Code", int(), Explicit).unwrap().unwrap();
        let old = mb.primary_key(blog, &[id], Convention).unwrap().unwrap();

        // WHEN another key becomes primary explicitly
        let new = mb.primary_key(blog, &[code], Explicit).unwrap().unwrap();

        // THEN the old key is gone
        assert_ne!(old, new);
        assert!(mb.model().key(old).is_none());
        assert_eq!(mb.model().find_primary_key(blog), Some(new));
    }

    // ========== TEST: key_properties_made_required ==========
    #[test]
    fn test_key_properties_made_required() {
        let mut mb = session();
        let blog = mb.entity("Blog", Explicit).unwrap().unwrap();
        let code = mb
            .property(blog, "Code", Some(PropertyType::nullable(ScalarType::Int32)), Explicit)
            .unwrap()
            .unwrap();

        mb.has_key(blog, &[code], Explicit).unwrap().unwrap();

        assert!(!mb.model().property(code).unwrap().is_nullable);
    }

    // ========== TEST: referenced_key_needs_overriding_source ==========
    #[test]
    fn test_referenced_key_needs_overriding_source() {
        // GIVEN Post -> Blog through Blog's alternate key, configured explicitly
        let mut mb = session();
        let blog = mb.entity("Blog", Explicit).unwrap().unwrap();
        let post = mb.entity("Post", Explicit).unwrap().unwrap();
        let id = mb.property(blog, "Id", int(), Explicit).unwrap().unwrap();
        let code = mb.property(blog, "Code", int(), Explicit).unwrap().unwrap();
        mb.primary_key(blog, &[id], Explicit).unwrap();
        let alternate = mb.has_key(blog, &[code], Convention).unwrap().unwrap();
        let blog_code = mb.property(post, "BlogCode", int(), Explicit).unwrap().unwrap();
        let fk = mb
            .has_relationship_with_properties(post, blog, &[blog_code], Some(&[code][..]), Explicit)
            .unwrap()
            .unwrap();

        // WHEN the key is removed at DataAnnotation
        let removed = mb.has_no_key(alternate, DataAnnotation).unwrap();

        // THEN nothing changes
        assert!(!removed);
        assert_eq!(mb.model().foreign_key(fk).unwrap().principal_key, alternate);

        // WHEN it is removed explicitly
        let removed = mb.has_no_key(alternate, Explicit).unwrap();

        // THEN the foreign key rebinds to the primary key
        assert!(removed);
        assert!(mb.model().key(alternate).is_none());
        let rebound = mb.model().foreign_keys().next().unwrap();
        assert_eq!(Some(rebound.principal_key), mb.model().find_primary_key(blog));
    }

    // ========== TEST: keyless_removes_keys ==========
    #[test]
    fn test_keyless_removes_keys() {
        let mut mb = session();
        let view = mb.entity("View", Explicit).unwrap().unwrap();
        let id = mb.property(view, "Id", int(), Convention).unwrap().unwrap();
        mb.primary_key(view, &[id], Convention).unwrap();

        let keyless = mb.has_no_key_all(view, Explicit).unwrap();

        assert!(keyless);
        let entity = mb.model().entity_type(view).unwrap();
        assert!(entity.is_keyless);
        assert!(entity.keys.is_empty());
        assert_eq!(entity.primary_key, None);
    }

    // ========== TEST: keyless_rejects_weaker_key ==========
    #[test]
    fn test_keyless_rejects_weaker_key() {
        let mut mb = session();
        let view = mb.entity("View", Explicit).unwrap().unwrap();
        let id = mb.property(view, "Id", int(), Explicit).unwrap().unwrap();
        mb.has_no_key_all(view, Explicit).unwrap();

        assert_eq!(mb.has_key(view, &[id], Convention).unwrap(), None);
        assert!(mb.model().entity_type(view).unwrap().is_keyless);

        assert!(mb.has_key(view, &[id], Explicit).unwrap().is_some());
        assert!(!mb.model().entity_type(view).unwrap().is_keyless);
    }
}
