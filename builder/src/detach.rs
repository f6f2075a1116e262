//! Detach and reattach.
//!
//! A destructive edit first takes every element that structurally depends on
//! what it changes out of the model, as a snapshot described by names and
//! configuration sources. After the edit the snapshot is replayed through the
//! ordinary builder operations at the recorded sources, so it lands on
//! whatever shape the model has by then. An element that cannot be recreated
//! is dropped whole.

use crate::model_builder::ModelBuilder;
use keystone_core::{
    ConfigurationSource, ElementId, EntityTypeId, ForeignKeyId, IndexId, KeyId, ModelResult,
    PropertyId, PropertyType, ServicePropertyId, SkipNavigationId,
};
use keystone_metadata::{DeleteBehavior, ElementIdentity, Navigation, ValueGenerated};
use std::collections::BTreeSet;

// ==================== Snapshots ====================

/// A detached property.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertySnapshot {
    pub entity: String,
    pub name: String,
    pub ty: PropertyType,
    pub type_source: Option<ConfigurationSource>,
    pub source: ConfigurationSource,
    pub is_nullable: bool,
    pub nullable_source: Option<ConfigurationSource>,
    pub value_generated: ValueGenerated,
    pub value_generated_source: Option<ConfigurationSource>,
}

/// A detached key and the foreign keys that referenced it.
#[derive(Debug, Clone, PartialEq)]
pub struct KeySnapshot {
    pub entity: String,
    pub properties: Vec<String>,
    pub source: ConfigurationSource,
    /// Set when the key was primary.
    pub primary_key_source: Option<ConfigurationSource>,
    pub referencing: Vec<ForeignKeySnapshot>,
}

/// A detached index.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexSnapshot {
    pub entity: String,
    pub name: Option<String>,
    pub properties: Vec<String>,
    pub source: ConfigurationSource,
    pub is_unique: bool,
    pub unique_source: Option<ConfigurationSource>,
}

/// A skip navigation that used a detached foreign key as its join key.
#[derive(Debug, Clone, PartialEq)]
pub struct SkipBinding {
    pub entity: String,
    pub name: String,
    pub source: Option<ConfigurationSource>,
}

/// A detached foreign key.
#[derive(Debug, Clone, PartialEq)]
pub struct ForeignKeySnapshot {
    pub dependent: String,
    pub properties: Vec<String>,
    pub properties_source: Option<ConfigurationSource>,
    pub principal: String,
    pub principal_key: Vec<String>,
    pub principal_key_source: Option<ConfigurationSource>,
    pub principal_end_source: Option<ConfigurationSource>,
    pub source: ConfigurationSource,
    pub dependent_to_principal: Option<Navigation>,
    pub principal_to_dependent: Option<Navigation>,
    pub is_required: bool,
    pub required_source: Option<ConfigurationSource>,
    pub is_unique: bool,
    pub unique_source: Option<ConfigurationSource>,
    pub is_ownership: bool,
    pub ownership_source: Option<ConfigurationSource>,
    pub delete_behavior: DeleteBehavior,
    pub delete_behavior_source: Option<ConfigurationSource>,
    pub skip_navigations: Vec<SkipBinding>,
}

/// A detached skip navigation.
#[derive(Debug, Clone, PartialEq)]
pub struct SkipNavigationSnapshot {
    pub entity: String,
    pub name: String,
    pub target: String,
    pub source: ConfigurationSource,
    pub is_collection: bool,
    pub is_on_dependent: bool,
    pub foreign_key: Option<ElementIdentity>,
    pub foreign_key_source: Option<ConfigurationSource>,
    /// Declaring entity and name of the inverse.
    pub inverse: Option<(String, String)>,
    pub inverse_source: Option<ConfigurationSource>,
}

/// A detached service property.
#[derive(Debug, Clone, PartialEq)]
pub struct ServicePropertySnapshot {
    pub entity: String,
    pub name: String,
    pub service_type: String,
    pub source: ConfigurationSource,
}

/// Properties together with everything that used them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PropertiesSnapshot {
    pub properties: Vec<PropertySnapshot>,
    pub keys: Vec<KeySnapshot>,
    pub indexes: Vec<IndexSnapshot>,
    pub foreign_keys: Vec<ForeignKeySnapshot>,
}

impl PropertiesSnapshot {
    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
            && self.keys.is_empty()
            && self.indexes.is_empty()
            && self.foreign_keys.is_empty()
    }

    pub fn extend(&mut self, other: PropertiesSnapshot) {
        self.properties.extend(other.properties);
        self.keys.extend(other.keys);
        self.indexes.extend(other.indexes);
        self.foreign_keys.extend(other.foreign_keys);
    }
}

/// Everything an entity type declared, as kept by
/// [`ModelBuilder::detach_all_members`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MembersSnapshot {
    pub entity: String,
    pub ignored: Vec<(String, ConfigurationSource)>,
    pub properties: Vec<PropertySnapshot>,
    pub service_properties: Vec<ServicePropertySnapshot>,
    pub keys: Vec<KeySnapshot>,
    pub indexes: Vec<IndexSnapshot>,
    pub skip_navigations: Vec<SkipNavigationSnapshot>,
    pub foreign_keys: Vec<ForeignKeySnapshot>,
}

impl MembersSnapshot {
    /// Point every reference to entity type `from` at `to`.
    pub fn retarget(&mut self, from: &str, to: &str) {
        let rename = |name: &mut String| {
            if *name == from {
                *name = to.to_string();
            }
        };
        rename(&mut self.entity);
        for property in &mut self.properties {
            rename(&mut property.entity);
        }
        for service in &mut self.service_properties {
            rename(&mut service.entity);
        }
        for key in &mut self.keys {
            rename(&mut key.entity);
            for fk in &mut key.referencing {
                fk.retarget(from, to);
            }
        }
        for index in &mut self.indexes {
            rename(&mut index.entity);
        }
        for skip in &mut self.skip_navigations {
            rename(&mut skip.entity);
            rename(&mut skip.target);
            if let Some((entity, _)) = &mut skip.inverse {
                rename(entity);
            }
        }
        for fk in &mut self.foreign_keys {
            fk.retarget(from, to);
        }
    }
}

impl ForeignKeySnapshot {
    fn retarget(&mut self, from: &str, to: &str) {
        if self.dependent == from {
            self.dependent = to.to_string();
        }
        if self.principal == from {
            self.principal = to.to_string();
        }
        for binding in &mut self.skip_navigations {
            if binding.entity == from {
                binding.entity = to.to_string();
            }
        }
    }

    /// Forget the dependent properties so reattaching synthesizes new ones.
    pub fn forget_properties(&mut self) {
        self.properties.clear();
        self.properties_source = None;
    }
}

impl ModelBuilder {
    // ==================== Capture ====================

    pub(crate) fn capture_property(&self, id: PropertyId) -> ModelResult<PropertySnapshot> {
        let property = self.property_data(id)?;
        Ok(PropertySnapshot {
            entity: self.model.entity_name(property.entity),
            name: property.name.clone(),
            ty: property.ty,
            type_source: property.type_source,
            source: property.source,
            is_nullable: property.is_nullable,
            nullable_source: property.nullable_source,
            value_generated: property.value_generated,
            value_generated_source: property.value_generated_source,
        })
    }

    fn capture_foreign_key(&self, id: ForeignKeyId) -> ModelResult<ForeignKeySnapshot> {
        let fk = self.foreign_key_data(id)?;
        let principal_key = self.key_data(fk.principal_key)?;
        let skip_navigations = self
            .model
            .referencing_skip_navigations(id)
            .into_iter()
            .filter_map(|s| self.model.skip_navigation(s))
            .map(|s| SkipBinding {
                entity: self.model.entity_name(s.entity),
                name: s.name.clone(),
                source: s.foreign_key_source,
            })
            .collect();

        Ok(ForeignKeySnapshot {
            dependent: self.model.entity_name(fk.dependent),
            properties: self.model.property_names(&fk.properties),
            properties_source: fk.properties_source,
            principal: self.model.entity_name(fk.principal),
            principal_key: self.model.property_names(&principal_key.properties),
            principal_key_source: fk.principal_key_source,
            principal_end_source: fk.principal_end_source,
            source: fk.source,
            dependent_to_principal: fk.dependent_to_principal.clone(),
            principal_to_dependent: fk.principal_to_dependent.clone(),
            is_required: fk.is_required,
            required_source: fk.required_source,
            is_unique: fk.is_unique,
            unique_source: fk.unique_source,
            is_ownership: fk.is_ownership,
            ownership_source: fk.ownership_source,
            delete_behavior: fk.delete_behavior,
            delete_behavior_source: fk.delete_behavior_source,
            skip_navigations,
        })
    }

    // ==================== Detach ====================

    /// Take a foreign key out of the model.
    ///
    /// Skip navigations lose their binding and implicitly created dependent
    /// properties are removed so their names are free on reattach.
    pub fn detach_foreign_key(&mut self, id: ForeignKeyId) -> ModelResult<ForeignKeySnapshot> {
        let snapshot = self.capture_foreign_key(id)?;
        for skip in self.model.referencing_skip_navigations(id) {
            self.model.set_skip_navigation_foreign_key(skip, None, None)?;
        }
        let removed = self.remove_foreign_key_raw(id)?;
        self.remove_unused_implicit_properties(&removed.properties)?;
        tracing::debug!(
            target: "keystone::detach",
            dependent = %snapshot.dependent,
            principal = %snapshot.principal,
            properties = ?snapshot.properties,
            "foreign key detached"
        );
        Ok(snapshot)
    }

    /// Take a key out of the model together with its referencing foreign keys.
    pub fn detach_key(&mut self, id: KeyId) -> ModelResult<KeySnapshot> {
        let key = self.key_data(id)?.clone();
        let entity = self.entity_data(key.entity)?;
        let primary_key_source = if entity.primary_key == Some(id) {
            Some(entity.primary_key_source.unwrap_or(key.source))
        } else {
            None
        };
        let mut snapshot = KeySnapshot {
            entity: entity.name.clone(),
            properties: self.model.property_names(&key.properties),
            source: key.source,
            primary_key_source,
            referencing: Vec::new(),
        };

        for fk in self.model.referencing_foreign_keys(id) {
            if self.model.foreign_key(fk).is_some() {
                snapshot.referencing.push(self.detach_foreign_key(fk)?);
            }
        }
        if self.model.key(id).is_some() {
            self.remove_key_raw(id)?;
        }
        tracing::debug!(
            target: "keystone::detach",
            entity = %snapshot.entity,
            properties = ?snapshot.properties,
            referencing = snapshot.referencing.len(),
            "key detached"
        );
        Ok(snapshot)
    }

    pub fn detach_index(&mut self, id: IndexId) -> ModelResult<IndexSnapshot> {
        let index = self.index_data(id)?;
        let snapshot = IndexSnapshot {
            entity: self.model.entity_name(index.entity),
            name: index.name.clone(),
            properties: self.model.property_names(&index.properties),
            source: index.source,
            is_unique: index.is_unique,
            unique_source: index.unique_source,
        };
        self.remove_index_raw(id)?;
        tracing::debug!(
            target: "keystone::detach",
            entity = %snapshot.entity,
            properties = ?snapshot.properties,
            "index detached"
        );
        Ok(snapshot)
    }

    /// Take properties out of the model with the keys, indexes and foreign
    /// keys that contain them.
    pub fn detach_properties(&mut self, properties: &[PropertyId]) -> ModelResult<PropertiesSnapshot> {
        let mut snapshot = PropertiesSnapshot::default();
        for property in properties {
            for fk in self.model.containing_foreign_keys(*property) {
                if self.model.foreign_key(fk).is_some() {
                    snapshot.foreign_keys.push(self.detach_foreign_key(fk)?);
                }
            }
            for key in self.model.containing_keys(*property) {
                if self.model.key(key).is_some() {
                    snapshot.keys.push(self.detach_key(key)?);
                }
            }
            for index in self.model.containing_indexes(*property) {
                if self.model.index(index).is_some() {
                    snapshot.indexes.push(self.detach_index(index)?);
                }
            }
        }

        // Implicit properties may already be gone with their foreign keys
        for property in properties {
            if self.model.property(*property).is_some() {
                snapshot.properties.push(self.capture_property(*property)?);
                self.remove_property_raw(*property)?;
            }
        }
        Ok(snapshot)
    }

    pub fn detach_skip_navigation(&mut self, id: SkipNavigationId) -> ModelResult<SkipNavigationSnapshot> {
        let skip = self.skip_navigation_data(id)?;
        let inverse = skip
            .inverse
            .and_then(|inverse| self.model.skip_navigation(inverse))
            .map(|inverse| (self.model.entity_name(inverse.entity), inverse.name.clone()));
        let snapshot = SkipNavigationSnapshot {
            entity: self.model.entity_name(skip.entity),
            name: skip.name.clone(),
            target: self.model.entity_name(skip.target),
            source: skip.source,
            is_collection: skip.is_collection,
            is_on_dependent: skip.is_on_dependent,
            foreign_key: skip
                .foreign_key
                .and_then(|fk| self.model.identity_of(ElementId::from(fk))),
            foreign_key_source: skip.foreign_key_source,
            inverse,
            inverse_source: skip.inverse_source,
        };
        self.remove_skip_navigation_raw(id)?;
        Ok(snapshot)
    }

    pub fn detach_service_property(
        &mut self,
        id: ServicePropertyId,
    ) -> ModelResult<ServicePropertySnapshot> {
        let service = self.service_property_data(id)?;
        let snapshot = ServicePropertySnapshot {
            entity: self.model.entity_name(service.entity),
            name: service.name.clone(),
            service_type: service.service_type.clone(),
            source: service.source,
        };
        self.remove_service_property_raw(id)?;
        Ok(snapshot)
    }

    /// Strip an entity type of everything it declares.
    ///
    /// Only foreign keys configured at DataAnnotation or above and ownerships
    /// are kept in the snapshot, and of the keys and indexes only Explicit
    /// ones. The rest is removed for good.
    pub fn detach_all_members(&mut self, entity: EntityTypeId) -> ModelResult<MembersSnapshot> {
        let data = self.entity_data(entity)?.clone();
        let mut snapshot = MembersSnapshot {
            entity: data.name.clone(),
            ignored: data
                .ignored
                .iter()
                .map(|(name, source)| (name.clone(), *source))
                .collect(),
            ..MembersSnapshot::default()
        };

        let mut relationships: BTreeSet<ForeignKeyId> = self
            .model
            .declared_referencing_foreign_keys(entity)
            .into_iter()
            .collect();
        relationships.extend(data.foreign_keys.iter().copied());
        for fk in relationships {
            if self.model.foreign_key(fk).is_none() {
                continue;
            }
            let detached = self.detach_foreign_key(fk)?;
            if detached.source >= ConfigurationSource::DataAnnotation || detached.is_ownership {
                snapshot.foreign_keys.push(detached);
            }
        }

        for skip in data.skip_navigations.iter().copied() {
            if self.model.skip_navigation(skip).is_some() {
                snapshot
                    .skip_navigations
                    .push(self.detach_skip_navigation(skip)?);
            }
        }

        if data.primary_key.is_some() {
            self.set_primary_key_raw(entity, None, None)?;
        }
        for key in data.keys.iter().copied() {
            if self.model.key(key).is_none() {
                continue;
            }
            let mut detached = self.detach_key(key)?;
            if data.primary_key == Some(key) {
                detached.primary_key_source = data.primary_key_source;
            }
            let kept = detached.source == ConfigurationSource::Explicit;
            for fk in std::mem::take(&mut detached.referencing) {
                if fk.source >= ConfigurationSource::DataAnnotation || fk.is_ownership {
                    snapshot.foreign_keys.push(fk);
                }
            }
            if kept {
                snapshot.keys.push(detached);
            }
        }

        for index in data.indexes.iter().copied() {
            if self.model.index(index).is_none() {
                continue;
            }
            let detached = self.detach_index(index)?;
            if detached.source == ConfigurationSource::Explicit {
                snapshot.indexes.push(detached);
            }
        }

        let properties = self.entity_data(entity)?.properties.clone();
        let detached = self.detach_properties(&properties)?;
        snapshot.properties = detached.properties;

        for service in data.service_properties.iter().copied() {
            if self.model.service_property(service).is_some() {
                snapshot
                    .service_properties
                    .push(self.detach_service_property(service)?);
            }
        }

        tracing::debug!(
            target: "keystone::detach",
            entity = %data.name,
            properties = snapshot.properties.len(),
            keys = snapshot.keys.len(),
            foreign_keys = snapshot.foreign_keys.len(),
            "all members detached"
        );
        Ok(snapshot)
    }

    // ==================== Attach ====================

    fn dropped(&self, kind: &'static str, owner: &str, detail: impl std::fmt::Debug) {
        tracing::warn!(
            target: "keystone::detach",
            kind,
            owner,
            detail = ?detail,
            "detached element dropped"
        );
    }

    pub fn attach_property(&mut self, snapshot: &PropertySnapshot) -> ModelResult<Option<PropertyId>> {
        let Some(entity) = self.model.find_entity_type(&snapshot.entity) else {
            self.dropped("property", &snapshot.entity, &snapshot.name);
            return Ok(None);
        };

        let stronger = self.model.find_property(entity, &snapshot.name).filter(|id| {
            self.model.property(*id).is_some_and(|p| {
                p.source.overrides(Some(snapshot.source))
                    || p.type_source
                        .is_some_and(|s| s.overrides_strictly(snapshot.type_source))
            })
        });
        let id = match stronger {
            Some(id) => {
                if let Some(property) = self.model.property_mut(id) {
                    property.source = snapshot.source.max(Some(property.source));
                }
                Some(id)
            }
            None => self.property_with(
                entity,
                &snapshot.name,
                Some(snapshot.ty),
                snapshot.type_source,
                snapshot.source,
            )?,
        };
        let Some(id) = id else {
            self.dropped("property", &snapshot.entity, &snapshot.name);
            return Ok(None);
        };

        if let Some(source) = snapshot.nullable_source {
            self.property_is_required(id, Some(!snapshot.is_nullable), source)?;
        }
        if let Some(source) = snapshot.value_generated_source {
            self.property_value_generated(id, Some(snapshot.value_generated), source)?;
        }
        Ok(Some(id))
    }

    /// Reattach a key onto the root of its entity type, then the foreign keys
    /// that referenced it.
    pub fn attach_key(&mut self, snapshot: &KeySnapshot) -> ModelResult<Option<KeyId>> {
        let Some(entity) = self.model.find_entity_type(&snapshot.entity) else {
            self.dropped("key", &snapshot.entity, &snapshot.properties);
            return Ok(None);
        };
        let root = self.model.root_type(entity);
        let Some(properties) = self
            .model
            .find_properties(root, &snapshot.properties)
            .filter(|found| found.iter().all(|p| self.model.property(*p).is_some_and(|p| p.entity == root)))
        else {
            self.dropped("key", &snapshot.entity, &snapshot.properties);
            return Ok(None);
        };

        let Some(mut key) = self.has_key_internal(root, &properties, snapshot.source)? else {
            self.dropped("key", &snapshot.entity, &snapshot.properties);
            return Ok(None);
        };
        if let Some(source) = snapshot.primary_key_source {
            if let Some(primary) = self.primary_key(root, &properties, source)? {
                key = primary;
            }
        }

        for fk in &snapshot.referencing {
            self.attach_foreign_key(fk)?;
        }
        Ok(Some(key))
    }

    pub fn attach_index(&mut self, snapshot: &IndexSnapshot) -> ModelResult<Option<IndexId>> {
        let found = self
            .model
            .find_entity_type(&snapshot.entity)
            .and_then(|e| Some((e, self.model.find_properties(e, &snapshot.properties)?)));
        let Some((entity, properties)) = found else {
            self.dropped("index", &snapshot.entity, &snapshot.properties);
            return Ok(None);
        };

        let index = match &snapshot.name {
            Some(name) => self.has_index_named(entity, &properties, name, snapshot.source)?,
            None => self.has_index(entity, &properties, snapshot.source)?,
        };
        let Some(index) = index else {
            self.dropped("index", &snapshot.entity, &snapshot.properties);
            return Ok(None);
        };
        if let Some(source) = snapshot.unique_source {
            self.index_is_unique(index, Some(snapshot.is_unique), source)?;
        }
        Ok(Some(index))
    }

    /// Recreate a foreign key.
    ///
    /// A pinned principal key is looked up (or added) by name; otherwise the
    /// foreign key binds to the primary key, falling back to a temporary key.
    /// Dependent properties are reused by name only when they were
    /// configured, and synthesized otherwise.
    pub fn attach_foreign_key(
        &mut self,
        snapshot: &ForeignKeySnapshot,
    ) -> ModelResult<Option<ForeignKeyId>> {
        let (Some(dependent), Some(principal)) = (
            self.model.find_entity_type(&snapshot.dependent),
            self.model.find_entity_type(&snapshot.principal),
        ) else {
            self.dropped("foreign key", &snapshot.dependent, &snapshot.principal);
            return Ok(None);
        };

        match self.attach_foreign_key_to(snapshot, dependent, principal) {
            Ok(Some(fk)) => Ok(Some(fk)),
            Ok(None) => {
                self.dropped("foreign key", &snapshot.dependent, &snapshot.properties);
                Ok(None)
            }
            Err(err) => {
                self.dropped("foreign key", &snapshot.dependent, err.to_string());
                Ok(None)
            }
        }
    }

    fn attach_foreign_key_to(
        &mut self,
        snapshot: &ForeignKeySnapshot,
        dependent: EntityTypeId,
        principal: EntityTypeId,
    ) -> ModelResult<Option<ForeignKeyId>> {
        let named_key = self
            .model
            .find_properties(principal, &snapshot.principal_key)
            .map(|properties| (self.model.find_key(principal, &properties), properties));

        let principal_key = match (snapshot.principal_key_source, named_key) {
            (Some(source), Some((Some(key), _))) => {
                if let Some(key) = self.model.key_mut(key) {
                    key.source = source.max(Some(key.source));
                }
                Some(key)
            }
            (Some(source), Some((None, properties))) => {
                let root = self.model.root_type(principal);
                match self.has_key_internal(root, &properties, source)? {
                    Some(key) => Some(key),
                    None => return Ok(None),
                }
            }
            (Some(_), None) => return Ok(None),
            (None, Some((Some(key), _))) if self.model.find_primary_key(principal).is_none() => {
                Some(key)
            }
            (None, _) => None,
        };

        let properties = match snapshot.properties_source {
            Some(_) if !snapshot.properties.is_empty() => {
                self.model.find_properties(dependent, &snapshot.properties)
            }
            _ => None,
        };
        let properties_restored = properties.is_some();

        let navigation_hint = snapshot
            .dependent_to_principal
            .as_ref()
            .map(|n| n.name.clone());
        let Some(fk) = self.create_foreign_key(
            dependent,
            principal,
            properties,
            principal_key,
            navigation_hint.as_deref(),
            snapshot.is_required,
            snapshot.source,
        )?
        else {
            return Ok(None);
        };

        if let Some(data) = self.model.foreign_key_mut(fk) {
            data.properties_source = if properties_restored {
                snapshot.properties_source
            } else {
                None
            };
            data.principal_key_source = snapshot.principal_key_source;
            data.principal_end_source = snapshot.principal_end_source;
        }

        for (on_dependent, navigation) in [
            (true, &snapshot.dependent_to_principal),
            (false, &snapshot.principal_to_dependent),
        ] {
            if let Some(navigation) = navigation {
                let set = self.has_navigation(fk, Some(&navigation.name), on_dependent, navigation.source)?;
                if set.is_none() {
                    self.dropped("navigation", &snapshot.dependent, &navigation.name);
                }
            }
        }

        if let Some(source) = snapshot.required_source {
            self.foreign_key_is_required(fk, Some(snapshot.is_required), source)?;
        }
        if let Some(source) = snapshot.unique_source {
            self.foreign_key_is_unique(fk, Some(snapshot.is_unique), source)?;
        }
        if let Some(source) = snapshot.delete_behavior_source {
            self.foreign_key_on_delete(fk, Some(snapshot.delete_behavior), source)?;
        }
        if snapshot.is_ownership {
            self.set_ownership_raw(fk, true, snapshot.ownership_source)?;
        }

        for binding in &snapshot.skip_navigations {
            // Skip navigations detached with this key bind it when they are attached
            let Some(skip) = self
                .model
                .find_entity_type(&binding.entity)
                .and_then(|e| self.model.find_declared_skip_navigation(e, &binding.name))
            else {
                continue;
            };
            if self
                .model
                .set_skip_navigation_foreign_key(skip, Some(fk), binding.source)
                .is_err()
            {
                self.dropped("skip navigation binding", &binding.entity, &binding.name);
            }
        }

        tracing::debug!(
            target: "keystone::detach",
            dependent = %snapshot.dependent,
            principal = %snapshot.principal,
            "foreign key reattached"
        );
        Ok(Some(fk))
    }

    pub fn attach_skip_navigation(
        &mut self,
        snapshot: &SkipNavigationSnapshot,
    ) -> ModelResult<Option<SkipNavigationId>> {
        let (Some(entity), Some(target)) = (
            self.model.find_entity_type(&snapshot.entity),
            self.model.find_entity_type(&snapshot.target),
        ) else {
            self.dropped("skip navigation", &snapshot.entity, &snapshot.name);
            return Ok(None);
        };

        let Some(skip) = self.has_skip_navigation(
            entity,
            &snapshot.name,
            target,
            snapshot.is_collection,
            snapshot.is_on_dependent,
            snapshot.source,
        )?
        else {
            self.dropped("skip navigation", &snapshot.entity, &snapshot.name);
            return Ok(None);
        };

        if let Some(identity) = &snapshot.foreign_key {
            if let Some(ElementId::ForeignKey(fk)) = self.model.resolve_identity(identity) {
                let source = snapshot.foreign_key_source.unwrap_or(snapshot.source);
                self.skip_navigation_has_foreign_key(skip, Some(fk), source)?;
            }
        }
        if let Some((inverse_entity, inverse_name)) = &snapshot.inverse {
            let inverse = self
                .model
                .find_entity_type(inverse_entity)
                .and_then(|e| self.model.find_skip_navigation(e, inverse_name));
            if let Some(inverse) = inverse {
                let source = snapshot.inverse_source.unwrap_or(snapshot.source);
                self.skip_navigation_has_inverse(skip, Some(inverse), source)?;
            }
        }
        Ok(Some(skip))
    }

    pub fn attach_service_property(
        &mut self,
        snapshot: &ServicePropertySnapshot,
    ) -> ModelResult<Option<ServicePropertyId>> {
        let Some(entity) = self.model.find_entity_type(&snapshot.entity) else {
            self.dropped("service property", &snapshot.entity, &snapshot.name);
            return Ok(None);
        };
        let service = self.service_property(
            entity,
            &snapshot.name,
            Some(snapshot.service_type.as_str()),
            snapshot.source,
        )?;
        if service.is_none() {
            self.dropped("service property", &snapshot.entity, &snapshot.name);
        }
        Ok(service)
    }

    /// Reattach properties, then keys, indexes and foreign keys.
    pub fn attach_properties(&mut self, snapshot: &PropertiesSnapshot) -> ModelResult<()> {
        for property in &snapshot.properties {
            self.attach_property(property)?;
        }
        let mut foreign_keys = Vec::new();
        for key in &snapshot.keys {
            let mut key = key.clone();
            foreign_keys.append(&mut key.referencing);
            self.attach_key(&key)?;
        }
        for index in &snapshot.indexes {
            self.attach_index(index)?;
        }
        for fk in snapshot.foreign_keys.iter().chain(&foreign_keys) {
            self.attach_foreign_key(fk)?;
        }
        Ok(())
    }

    /// Reattach everything [`detach_all_members`](Self::detach_all_members) kept.
    pub fn attach_members(&mut self, snapshot: &MembersSnapshot) -> ModelResult<()> {
        if let Some(entity) = self.model.find_entity_type(&snapshot.entity) {
            for (name, source) in &snapshot.ignored {
                if self.model.find_declared_ignored_source(entity, name).is_none() {
                    self.model.add_ignored(entity, name.clone(), *source)?;
                }
            }
        }
        for property in &snapshot.properties {
            self.attach_property(property)?;
        }
        for service in &snapshot.service_properties {
            self.attach_service_property(service)?;
        }
        let mut foreign_keys = Vec::new();
        for key in &snapshot.keys {
            let mut key = key.clone();
            foreign_keys.append(&mut key.referencing);
            self.attach_key(&key)?;
        }
        for index in &snapshot.indexes {
            self.attach_index(index)?;
        }
        for fk in snapshot.foreign_keys.iter().chain(&foreign_keys) {
            self.attach_foreign_key(fk)?;
        }
        for skip in &snapshot.skip_navigations {
            self.attach_skip_navigation(skip)?;
        }
        Ok(())
    }
}
