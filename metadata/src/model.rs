//! The schema graph.
//!
//! `Model` owns every element in id-addressed arenas. The mutations here are
//! raw: they keep the structural invariants (unique member names, keys on the
//! root, matching foreign key shapes, no dangling references) but know nothing
//! about configuration precedence. Precedence and cascading live in the
//! builder layer.

use crate::arena::Arena;
use crate::catalog::RecordCatalog;
use crate::elements::{
    DefiningNavigation, EntityType, ForeignKey, Index, Key, Navigation, Property, ServiceProperty,
    SkipNavigation,
};
use keystone_core::{
    ConfigurationSource, EntityTypeId, ForeignKeyId, IndexId, KeyId, ModelError, ModelResult,
    PropertyId, PropertyType, ServicePropertyId, SkipNavigationId,
};
use std::collections::{BTreeMap, HashMap};

/// The schema graph.
#[derive(Debug, Clone, Default)]
pub struct Model {
    pub(crate) catalog: RecordCatalog,
    pub(crate) entities: Arena<EntityTypeId, EntityType>,
    pub(crate) properties: Arena<PropertyId, Property>,
    pub(crate) keys: Arena<KeyId, Key>,
    pub(crate) indexes: Arena<IndexId, Index>,
    pub(crate) foreign_keys: Arena<ForeignKeyId, ForeignKey>,
    pub(crate) skip_navigations: Arena<SkipNavigationId, SkipNavigation>,
    pub(crate) service_properties: Arena<ServicePropertyId, ServiceProperty>,
    pub(crate) entity_names: HashMap<String, EntityTypeId>,
    pub(crate) ignored_entity_types: BTreeMap<String, ConfigurationSource>,
}

impl Model {
    /// Create an empty model over a record catalog.
    pub fn new(catalog: RecordCatalog) -> Self {
        Self {
            catalog,
            ..Self::default()
        }
    }

    /// The record catalog backing this model.
    pub fn catalog(&self) -> &RecordCatalog {
        &self.catalog
    }

    // ==================== Element Access ====================

    pub fn entity_type(&self, id: EntityTypeId) -> Option<&EntityType> {
        self.entities.get(id)
    }

    pub fn entity_type_mut(&mut self, id: EntityTypeId) -> Option<&mut EntityType> {
        self.entities.get_mut(id)
    }

    pub fn property(&self, id: PropertyId) -> Option<&Property> {
        self.properties.get(id)
    }

    pub fn property_mut(&mut self, id: PropertyId) -> Option<&mut Property> {
        self.properties.get_mut(id)
    }

    pub fn key(&self, id: KeyId) -> Option<&Key> {
        self.keys.get(id)
    }

    pub fn key_mut(&mut self, id: KeyId) -> Option<&mut Key> {
        self.keys.get_mut(id)
    }

    pub fn index(&self, id: IndexId) -> Option<&Index> {
        self.indexes.get(id)
    }

    pub fn index_mut(&mut self, id: IndexId) -> Option<&mut Index> {
        self.indexes.get_mut(id)
    }

    pub fn foreign_key(&self, id: ForeignKeyId) -> Option<&ForeignKey> {
        self.foreign_keys.get(id)
    }

    pub fn foreign_key_mut(&mut self, id: ForeignKeyId) -> Option<&mut ForeignKey> {
        self.foreign_keys.get_mut(id)
    }

    pub fn skip_navigation(&self, id: SkipNavigationId) -> Option<&SkipNavigation> {
        self.skip_navigations.get(id)
    }

    pub fn skip_navigation_mut(&mut self, id: SkipNavigationId) -> Option<&mut SkipNavigation> {
        self.skip_navigations.get_mut(id)
    }

    pub fn service_property(&self, id: ServicePropertyId) -> Option<&ServiceProperty> {
        self.service_properties.get(id)
    }

    pub fn service_property_mut(&mut self, id: ServicePropertyId) -> Option<&mut ServiceProperty> {
        self.service_properties.get_mut(id)
    }

    /// Find an entity type by name.
    pub fn find_entity_type(&self, name: &str) -> Option<EntityTypeId> {
        self.entity_names.get(name).copied()
    }

    /// All entity types in creation order.
    pub fn entity_types(&self) -> impl Iterator<Item = &EntityType> {
        self.entities.iter().map(|(_, e)| e)
    }

    /// All foreign keys in creation order.
    pub fn foreign_keys(&self) -> impl Iterator<Item = &ForeignKey> {
        self.foreign_keys.iter().map(|(_, fk)| fk)
    }

    /// All skip navigations in creation order.
    pub fn skip_navigations(&self) -> impl Iterator<Item = &SkipNavigation> {
        self.skip_navigations.iter().map(|(_, s)| s)
    }

    /// Number of entity types.
    pub fn entity_type_count(&self) -> usize {
        self.entities.len()
    }

    /// Display name of an entity type, tolerant of stale ids.
    pub fn entity_name(&self, id: EntityTypeId) -> String {
        self.entities
            .get(id)
            .map(|e| e.name.clone())
            .unwrap_or_else(|| id.to_string())
    }

    /// Display name of a property, tolerant of stale ids.
    pub fn property_name(&self, id: PropertyId) -> String {
        self.properties
            .get(id)
            .map(|p| p.name.clone())
            .unwrap_or_else(|| id.to_string())
    }

    /// Names of a property list, comma separated.
    pub fn property_list(&self, ids: &[PropertyId]) -> String {
        ids.iter()
            .map(|p| self.property_name(*p))
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub(crate) fn require_entity(&self, id: EntityTypeId) -> ModelResult<&EntityType> {
        self.entities.get(id).ok_or_else(|| ModelError::orphaned(id))
    }

    pub(crate) fn require_entity_mut(&mut self, id: EntityTypeId) -> ModelResult<&mut EntityType> {
        self.entities
            .get_mut(id)
            .ok_or_else(|| ModelError::orphaned(id))
    }

    // ==================== Entity Types ====================

    /// Add an entity type.
    pub fn add_entity_type(
        &mut self,
        name: impl Into<String>,
        record: Option<String>,
        source: ConfigurationSource,
        defining: Option<DefiningNavigation>,
    ) -> ModelResult<EntityTypeId> {
        let name = name.into();
        if self.entity_names.contains_key(&name) {
            return Err(ModelError::duplicate_entity_type(name));
        }
        if let Some(record) = &record {
            if !self.catalog.contains(record) {
                return Err(ModelError::unknown_record(record.clone()));
            }
        }
        if let Some(defining) = &defining {
            self.require_entity(defining.entity)?;
        }

        let id = self
            .entities
            .insert_with(|id| EntityType::new(id, name.clone(), record, source, defining));
        self.entity_names.insert(name, id);
        Ok(id)
    }

    /// Remove an entity type and everything it declares.
    ///
    /// Fails while derived types, defined types, or other entities' foreign
    /// keys and skip navigations still point at it.
    pub fn remove_entity_type(&mut self, id: EntityTypeId) -> ModelResult<EntityType> {
        let entity = self.require_entity(id)?;
        let name = entity.name.clone();

        if let Some((_, derived)) = self.entities.iter().find(|(_, e)| e.base == Some(id)) {
            return Err(ModelError::entity_type_in_use(
                name,
                format!("derived type {}", derived.name),
            ));
        }
        if let Some((_, defined)) = self
            .entities
            .iter()
            .find(|(_, e)| e.defining.as_ref().is_some_and(|d| d.entity == id))
        {
            return Err(ModelError::entity_type_in_use(
                name,
                format!("defined type {}", defined.name),
            ));
        }
        if let Some((_, fk)) = self
            .foreign_keys
            .iter()
            .find(|(_, fk)| fk.principal == id && fk.dependent != id)
        {
            return Err(ModelError::entity_type_in_use(
                name,
                format!("foreign key on {}", self.entity_name(fk.dependent)),
            ));
        }
        if let Some((_, skip)) = self
            .skip_navigations
            .iter()
            .find(|(_, s)| s.target == id && s.entity != id)
        {
            return Err(ModelError::entity_type_in_use(
                name,
                format!("skip navigation {}", skip.name),
            ));
        }

        let entity = self.require_entity(id)?.clone();
        for skip in &entity.skip_navigations {
            self.remove_skip_navigation(*skip)?;
        }
        for fk in &entity.foreign_keys {
            self.remove_foreign_key(*fk)?;
        }
        for index in &entity.indexes {
            self.remove_index(*index)?;
        }
        self.set_primary_key(id, None, None)?;
        for key in &entity.keys {
            self.remove_key(*key)?;
        }
        for service in &entity.service_properties {
            self.remove_service_property(*service)?;
        }
        self.require_entity_mut(id)?.discriminator = None;
        for property in &entity.properties {
            self.remove_property(*property)?;
        }

        self.entity_names.remove(&name);
        self.entities.remove(id).ok_or_else(|| ModelError::orphaned(id))
    }

    /// Point an entity type at a new base type (or none).
    pub fn set_base_type(
        &mut self,
        id: EntityTypeId,
        base: Option<EntityTypeId>,
        source: Option<ConfigurationSource>,
    ) -> ModelResult<()> {
        let entity = self.require_entity(id)?;
        if entity.base == base {
            self.require_entity_mut(id)?.base_source = source;
            return Ok(());
        }

        if let Some(base) = base {
            self.require_entity(base)?;
            if self.base_chain(base).contains(&id) {
                return Err(ModelError::circular_inheritance(
                    self.entity_name(id),
                    self.entity_name(base),
                ));
            }
            if !entity.keys.is_empty() {
                return Err(ModelError::derived_entity_type_key(
                    self.entity_name(id),
                    self.entity_name(self.root_type(base)),
                ));
            }

            // Members of this hierarchy may not shadow members of the new base
            for derived in self.derived_types_inclusive(id) {
                for member in self.declared_members(derived) {
                    let name = self.member_name(member);
                    if !self.find_members(base, &name).is_empty() {
                        return Err(ModelError::duplicate_member_on_base(
                            self.entity_name(derived),
                            self.entity_name(base),
                            name,
                        ));
                    }
                }
            }
        }

        let entity = self.require_entity_mut(id)?;
        entity.base = base;
        entity.base_source = source;
        Ok(())
    }

    // ==================== Properties ====================

    /// Add a scalar property.
    pub fn add_property(
        &mut self,
        entity: EntityTypeId,
        name: impl Into<String>,
        ty: PropertyType,
        type_source: Option<ConfigurationSource>,
        source: ConfigurationSource,
        is_shadow: bool,
    ) -> ModelResult<PropertyId> {
        let name = name.into();
        self.check_member_name_free(entity, &name)?;

        let id = self.properties.insert_with(|id| Property {
            id,
            entity,
            name,
            ty,
            type_source,
            source,
            is_shadow,
            is_nullable: ty.is_nullable(),
            nullable_source: None,
            value_generated: Default::default(),
            value_generated_source: None,
        });
        self.require_entity_mut(entity)?.properties.push(id);
        Ok(id)
    }

    /// Remove a property that no key, index or foreign key uses.
    pub fn remove_property(&mut self, id: PropertyId) -> ModelResult<Property> {
        let property = self.properties.get(id).ok_or_else(|| ModelError::orphaned(id))?;
        let entity_name = self.entity_name(property.entity);

        if !self.containing_keys(id).is_empty() {
            return Err(ModelError::property_in_use(entity_name, &property.name, "key"));
        }
        if !self.containing_indexes(id).is_empty() {
            return Err(ModelError::property_in_use(entity_name, &property.name, "index"));
        }
        if !self.containing_foreign_keys(id).is_empty() {
            return Err(ModelError::property_in_use(
                entity_name,
                &property.name,
                "foreign key",
            ));
        }

        let property = self.properties.remove(id).ok_or_else(|| ModelError::orphaned(id))?;
        for (_, entity) in self.entities.iter_mut() {
            if entity.discriminator == Some(id) {
                entity.discriminator = None;
            }
        }
        if let Some(entity) = self.entities.get_mut(property.entity) {
            entity.properties.retain(|p| *p != id);
        }
        Ok(property)
    }

    // ==================== Keys ====================

    /// Add a key to a root entity type.
    pub fn add_key(
        &mut self,
        entity: EntityTypeId,
        properties: Vec<PropertyId>,
        source: ConfigurationSource,
    ) -> ModelResult<KeyId> {
        self.check_root(entity)?;
        if properties.is_empty() {
            return Err(ModelError::empty_key(self.entity_name(entity)));
        }
        for property in &properties {
            let declared_here = self
                .properties
                .get(*property)
                .is_some_and(|p| p.entity == entity);
            if !declared_here {
                return Err(ModelError::property_not_in_hierarchy(
                    self.entity_name(entity),
                    self.property_name(*property),
                ));
            }
        }
        if self.find_declared_key(entity, &properties).is_some() {
            return Err(ModelError::conflicting_member(
                self.entity_name(entity),
                self.property_list(&properties),
                "key",
            ));
        }

        let id = self.keys.insert_with(|id| Key {
            id,
            entity,
            properties,
            source,
        });
        self.require_entity_mut(entity)?.keys.push(id);
        Ok(id)
    }

    /// Remove a key no foreign key references.
    pub fn remove_key(&mut self, id: KeyId) -> ModelResult<Key> {
        let key = self.keys.get(id).ok_or_else(|| ModelError::orphaned(id))?;
        if let Some(fk) = self.referencing_foreign_keys(id).first() {
            let dependent = self
                .foreign_keys
                .get(*fk)
                .map(|fk| self.entity_name(fk.dependent))
                .unwrap_or_default();
            return Err(ModelError::key_in_use(
                self.entity_name(key.entity),
                self.property_list(&key.properties),
                dependent,
            ));
        }

        let key = self.keys.remove(id).ok_or_else(|| ModelError::orphaned(id))?;
        if let Some(entity) = self.entities.get_mut(key.entity) {
            entity.keys.retain(|k| *k != id);
            if entity.primary_key == Some(id) {
                entity.primary_key = None;
            }
        }
        Ok(key)
    }

    /// Set (or clear) the primary key of a root entity type.
    pub fn set_primary_key(
        &mut self,
        entity: EntityTypeId,
        key: Option<KeyId>,
        source: Option<ConfigurationSource>,
    ) -> ModelResult<()> {
        if let Some(key) = key {
            self.check_root(entity)?;
            let owned = self.keys.get(key).is_some_and(|k| k.entity == entity);
            if !owned {
                return Err(ModelError::orphaned(key));
            }
        }
        let entity = self.require_entity_mut(entity)?;
        entity.primary_key = key;
        entity.primary_key_source = source;
        Ok(())
    }

    // ==================== Indexes ====================

    /// Add an index over properties visible on the entity type.
    pub fn add_index(
        &mut self,
        entity: EntityTypeId,
        properties: Vec<PropertyId>,
        name: Option<String>,
        source: ConfigurationSource,
    ) -> ModelResult<IndexId> {
        self.check_properties_visible(entity, &properties)?;
        if let Some(name) = &name {
            if self.find_index_by_name(entity, name).is_some()
                || !self.find_derived_indexes_by_name(entity, name).is_empty()
            {
                return Err(ModelError::duplicate_named_index(
                    self.entity_name(entity),
                    name.clone(),
                ));
            }
        } else if self.find_declared_index(entity, &properties).is_some() {
            return Err(ModelError::conflicting_member(
                self.entity_name(entity),
                self.property_list(&properties),
                "index",
            ));
        }

        let id = self.indexes.insert_with(|id| Index {
            id,
            entity,
            name,
            properties,
            source,
            is_unique: false,
            unique_source: None,
        });
        self.require_entity_mut(entity)?.indexes.push(id);
        Ok(id)
    }

    /// Remove an index.
    pub fn remove_index(&mut self, id: IndexId) -> ModelResult<Index> {
        let index = self.indexes.remove(id).ok_or_else(|| ModelError::orphaned(id))?;
        if let Some(entity) = self.entities.get_mut(index.entity) {
            entity.indexes.retain(|i| *i != id);
        }
        Ok(index)
    }

    // ==================== Foreign Keys ====================

    /// Check that dependent properties can reference the principal key.
    pub fn validate_foreign_key(
        &self,
        dependent: EntityTypeId,
        properties: &[PropertyId],
        principal: EntityTypeId,
        principal_key: KeyId,
    ) -> ModelResult<()> {
        self.require_entity(dependent)?;
        self.require_entity(principal)?;
        let key = self
            .keys
            .get(principal_key)
            .ok_or_else(|| ModelError::orphaned(principal_key))?;
        if key.entity != self.root_type(principal) {
            return Err(ModelError::property_not_in_hierarchy(
                self.entity_name(principal),
                self.property_list(&key.properties),
            ));
        }
        self.check_properties_visible(dependent, properties)?;

        if properties.len() != key.properties.len() {
            return Err(ModelError::foreign_key_count_mismatch(
                self.entity_name(dependent),
                self.entity_name(principal),
                properties.len(),
                key.properties.len(),
            ));
        }
        for (dependent_property, principal_property) in properties.iter().zip(&key.properties) {
            let (Some(d), Some(p)) = (
                self.properties.get(*dependent_property),
                self.properties.get(*principal_property),
            ) else {
                return Err(ModelError::orphaned(*dependent_property));
            };
            if !d.ty.is_compatible_with(&p.ty) {
                return Err(ModelError::foreign_key_type_mismatch(
                    &d.name,
                    d.ty.to_string(),
                    &p.name,
                    p.ty.to_string(),
                ));
            }
        }
        Ok(())
    }

    /// Add a foreign key. `component_source` is recorded for both the
    /// dependent properties and the principal key.
    pub fn add_foreign_key(
        &mut self,
        dependent: EntityTypeId,
        properties: Vec<PropertyId>,
        principal: EntityTypeId,
        principal_key: KeyId,
        component_source: Option<ConfigurationSource>,
        source: ConfigurationSource,
    ) -> ModelResult<ForeignKeyId> {
        self.validate_foreign_key(dependent, &properties, principal, principal_key)?;

        let id = self.foreign_keys.insert_with(|id| ForeignKey {
            id,
            source,
            dependent,
            properties,
            properties_source: component_source,
            principal,
            principal_key,
            principal_key_source: component_source,
            principal_end_source: None,
            dependent_to_principal: None,
            principal_to_dependent: None,
            is_required: false,
            required_source: None,
            is_unique: false,
            unique_source: None,
            is_ownership: false,
            ownership_source: None,
            delete_behavior: Default::default(),
            delete_behavior_source: None,
        });
        self.require_entity_mut(dependent)?.foreign_keys.push(id);
        Ok(id)
    }

    /// Repoint a foreign key at new dependent properties and principal key.
    pub fn set_foreign_key_properties(
        &mut self,
        id: ForeignKeyId,
        properties: Vec<PropertyId>,
        principal_key: KeyId,
        properties_source: Option<ConfigurationSource>,
        principal_key_source: Option<ConfigurationSource>,
    ) -> ModelResult<()> {
        let fk = self.foreign_keys.get(id).ok_or_else(|| ModelError::orphaned(id))?;
        self.validate_foreign_key(fk.dependent, &properties, fk.principal, principal_key)?;

        let fk = self
            .foreign_keys
            .get_mut(id)
            .ok_or_else(|| ModelError::orphaned(id))?;
        fk.properties = properties;
        fk.principal_key = principal_key;
        fk.properties_source = properties_source;
        fk.principal_key_source = principal_key_source;
        Ok(())
    }

    /// Remove a foreign key; skip navigations using it lose their binding.
    pub fn remove_foreign_key(&mut self, id: ForeignKeyId) -> ModelResult<ForeignKey> {
        let fk = self
            .foreign_keys
            .remove(id)
            .ok_or_else(|| ModelError::orphaned(id))?;
        for (_, skip) in self.skip_navigations.iter_mut() {
            if skip.foreign_key == Some(id) {
                skip.foreign_key = None;
                skip.foreign_key_source = None;
            }
        }
        if let Some(entity) = self.entities.get_mut(fk.dependent) {
            entity.foreign_keys.retain(|f| *f != id);
        }
        Ok(fk)
    }

    /// Set or clear the navigation on one end of a foreign key.
    pub fn set_navigation(
        &mut self,
        id: ForeignKeyId,
        on_dependent: bool,
        navigation: Option<Navigation>,
    ) -> ModelResult<()> {
        let fk = self.foreign_keys.get(id).ok_or_else(|| ModelError::orphaned(id))?;
        if let Some(navigation) = &navigation {
            let declaring = if on_dependent { fk.dependent } else { fk.principal };
            let same_name = fk
                .navigation(on_dependent)
                .is_some_and(|current| current.name == navigation.name);
            if !same_name {
                self.check_member_name_free(declaring, &navigation.name)?;
            }
        }

        let fk = self
            .foreign_keys
            .get_mut(id)
            .ok_or_else(|| ModelError::orphaned(id))?;
        if on_dependent {
            fk.dependent_to_principal = navigation;
        } else {
            fk.principal_to_dependent = navigation;
        }
        Ok(())
    }

    // ==================== Skip Navigations ====================

    /// Add a skip navigation.
    pub fn add_skip_navigation(
        &mut self,
        entity: EntityTypeId,
        name: impl Into<String>,
        target: EntityTypeId,
        is_collection: bool,
        is_on_dependent: bool,
        source: ConfigurationSource,
    ) -> ModelResult<SkipNavigationId> {
        let name = name.into();
        self.require_entity(target)?;
        self.check_member_name_free(entity, &name)?;

        let id = self.skip_navigations.insert_with(|id| SkipNavigation {
            id,
            entity,
            name,
            target,
            source,
            is_collection,
            is_on_dependent,
            foreign_key: None,
            foreign_key_source: None,
            inverse: None,
            inverse_source: None,
        });
        self.require_entity_mut(entity)?.skip_navigations.push(id);
        Ok(id)
    }

    /// Remove a skip navigation; its inverse loses the back pointer.
    pub fn remove_skip_navigation(&mut self, id: SkipNavigationId) -> ModelResult<SkipNavigation> {
        let skip = self
            .skip_navigations
            .remove(id)
            .ok_or_else(|| ModelError::orphaned(id))?;
        for (_, other) in self.skip_navigations.iter_mut() {
            if other.inverse == Some(id) {
                other.inverse = None;
                other.inverse_source = None;
            }
        }
        if let Some(entity) = self.entities.get_mut(skip.entity) {
            entity.skip_navigations.retain(|s| *s != id);
        }
        Ok(skip)
    }

    /// Set (or clear) the inverse of a skip navigation. Only this side is updated.
    pub fn set_skip_navigation_inverse(
        &mut self,
        id: SkipNavigationId,
        inverse: Option<SkipNavigationId>,
        source: Option<ConfigurationSource>,
    ) -> ModelResult<()> {
        let skip = self
            .skip_navigations
            .get(id)
            .ok_or_else(|| ModelError::orphaned(id))?;
        if let Some(inverse) = inverse {
            let other = self
                .skip_navigations
                .get(inverse)
                .ok_or_else(|| ModelError::orphaned(inverse))?;
            let matches = self.in_same_hierarchy(other.entity, skip.target)
                && self.in_same_hierarchy(other.target, skip.entity);
            if !matches {
                return Err(ModelError::skip_navigation_inverse_mismatch(
                    &skip.name,
                    &other.name,
                ));
            }
        }

        let skip = self
            .skip_navigations
            .get_mut(id)
            .ok_or_else(|| ModelError::orphaned(id))?;
        skip.inverse = inverse;
        skip.inverse_source = inverse.and(source);
        Ok(())
    }

    /// Bind (or unbind) the join foreign key of a skip navigation.
    pub fn set_skip_navigation_foreign_key(
        &mut self,
        id: SkipNavigationId,
        foreign_key: Option<ForeignKeyId>,
        source: Option<ConfigurationSource>,
    ) -> ModelResult<()> {
        let skip = self
            .skip_navigations
            .get(id)
            .ok_or_else(|| ModelError::orphaned(id))?;
        if let Some(foreign_key) = foreign_key {
            let fk = self
                .foreign_keys
                .get(foreign_key)
                .ok_or_else(|| ModelError::orphaned(foreign_key))?;
            if !self.in_same_hierarchy(fk.principal, skip.entity) {
                return Err(ModelError::skip_navigation_foreign_key_mismatch(
                    self.entity_name(skip.entity),
                    &skip.name,
                    self.entity_name(fk.principal),
                ));
            }
        }

        let skip = self
            .skip_navigations
            .get_mut(id)
            .ok_or_else(|| ModelError::orphaned(id))?;
        skip.foreign_key = foreign_key;
        skip.foreign_key_source = foreign_key.and(source);
        Ok(())
    }

    // ==================== Service Properties ====================

    /// Add a service property.
    pub fn add_service_property(
        &mut self,
        entity: EntityTypeId,
        name: impl Into<String>,
        service_type: impl Into<String>,
        source: ConfigurationSource,
    ) -> ModelResult<ServicePropertyId> {
        let name = name.into();
        self.check_member_name_free(entity, &name)?;

        let id = self.service_properties.insert_with(|id| ServiceProperty {
            id,
            entity,
            name,
            service_type: service_type.into(),
            source,
        });
        self.require_entity_mut(entity)?.service_properties.push(id);
        Ok(id)
    }

    /// Remove a service property.
    pub fn remove_service_property(&mut self, id: ServicePropertyId) -> ModelResult<ServiceProperty> {
        let service = self
            .service_properties
            .remove(id)
            .ok_or_else(|| ModelError::orphaned(id))?;
        if let Some(entity) = self.entities.get_mut(service.entity) {
            entity.service_properties.retain(|s| *s != id);
        }
        Ok(service)
    }

    // ==================== Ignored Names ====================

    /// Record `name` as ignored on the entity type.
    pub fn add_ignored(
        &mut self,
        entity: EntityTypeId,
        name: impl Into<String>,
        source: ConfigurationSource,
    ) -> ModelResult<()> {
        self.require_entity_mut(entity)?
            .ignored
            .insert(name.into(), source);
        Ok(())
    }

    /// Forget an ignored name. Returns the source it was ignored at.
    pub fn remove_ignored(
        &mut self,
        entity: EntityTypeId,
        name: &str,
    ) -> ModelResult<Option<ConfigurationSource>> {
        Ok(self.require_entity_mut(entity)?.ignored.remove(name))
    }

    /// Record an entity type name as ignored model-wide.
    pub fn add_ignored_entity_type(&mut self, name: impl Into<String>, source: ConfigurationSource) {
        self.ignored_entity_types.insert(name.into(), source);
    }

    /// Forget an ignored entity type name.
    pub fn remove_ignored_entity_type(&mut self, name: &str) -> Option<ConfigurationSource> {
        self.ignored_entity_types.remove(name)
    }

    /// The source an entity type name was ignored at.
    pub fn find_ignored_entity_type_source(&self, name: &str) -> Option<ConfigurationSource> {
        self.ignored_entity_types.get(name).copied()
    }

    // ==================== Invariant Checks ====================

    fn check_root(&self, entity: EntityTypeId) -> ModelResult<()> {
        let root = self.root_type(entity);
        if root != entity {
            return Err(ModelError::derived_entity_type_key(
                self.entity_name(entity),
                self.entity_name(root),
            ));
        }
        self.require_entity(entity).map(|_| ())
    }

    fn check_member_name_free(&self, entity: EntityTypeId, name: &str) -> ModelResult<()> {
        self.require_entity(entity)?;
        if let Some(existing) = self.find_members_in_hierarchy(entity, name).first() {
            return Err(ModelError::conflicting_member(
                self.entity_name(entity),
                name,
                self.member_kind(*existing).name(),
            ));
        }
        Ok(())
    }

    fn check_properties_visible(
        &self,
        entity: EntityTypeId,
        properties: &[PropertyId],
    ) -> ModelResult<()> {
        let chain = self.base_chain(entity);
        for property in properties {
            let visible = self
                .properties
                .get(*property)
                .is_some_and(|p| chain.contains(&p.entity));
            if !visible {
                return Err(ModelError::property_not_in_hierarchy(
                    self.entity_name(entity),
                    self.property_name(*property),
                ));
            }
        }
        Ok(())
    }
}
