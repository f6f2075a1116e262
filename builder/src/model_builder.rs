//! The model builder session.
//!
//! A `ModelBuilder` owns the schema graph, the convention dispatcher and the
//! convention set. Builder operations are methods on the session that take
//! element ids; the handle types in this crate carry an id next to
//! `&mut ModelBuilder` and delegate here.
//!
//! Every structural edit goes through one of the raw edit helpers at the
//! bottom of this file so that the matching `ModelEvent` is raised.

use crate::config::BuilderConfig;
use crate::conventions::{DiscriminatorConvention, KeyDiscoveryConvention};
use crate::entity::EntityTypeBuilder;
use keystone_conventions::{ConventionBatch, ConventionDispatcher, ConventionSet, ModelEvent};
use keystone_core::{
    ConfigurationSource, EntityTypeId, ForeignKeyId, IndexId, KeyId, ModelError, ModelResult,
    PropertyId, PropertyType, ServicePropertyId, SkipNavigationId,
};
use keystone_metadata::{
    DefiningNavigation, EntityType, ForeignKey, Index, Key, MemberType, Model, NameRules,
    Navigation, Property, RecordCatalog, ServiceProperty, SkipNavigation, Trackable,
};
use std::rc::Rc;

/// A model building session.
#[derive(Debug)]
pub struct ModelBuilder {
    pub(crate) model: Model,
    dispatcher: ConventionDispatcher,
    conventions: Rc<ConventionSet<ModelBuilder>>,
    pub(crate) config: BuilderConfig,
    names: NameRules,
}

impl ModelBuilder {
    /// Start a session over a record catalog, installing the built-in
    /// conventions when the configuration asks for them.
    pub fn new(catalog: RecordCatalog, config: BuilderConfig) -> ModelResult<Self> {
        let mut conventions = ConventionSet::new();
        if config.use_default_conventions {
            conventions
                .add(KeyDiscoveryConvention)
                .add(DiscriminatorConvention);
        }
        Self::with_conventions(catalog, config, conventions)
    }

    /// Start a session with a caller-supplied convention set.
    pub fn with_conventions(
        catalog: RecordCatalog,
        config: BuilderConfig,
        conventions: ConventionSet<ModelBuilder>,
    ) -> ModelResult<Self> {
        Ok(Self {
            model: Model::new(catalog),
            dispatcher: ConventionDispatcher::new(),
            conventions: Rc::new(conventions),
            config,
            names: NameRules::new()?,
        })
    }

    pub fn model(&self) -> &Model {
        &self.model
    }

    pub fn into_model(self) -> Model {
        self.model
    }

    pub fn config(&self) -> &BuilderConfig {
        &self.config
    }

    /// Returns true while events are queued rather than dispatched.
    pub fn is_delayed(&self) -> bool {
        self.dispatcher.is_delayed()
    }

    // ==================== Batches ====================

    /// Open a convention batch. Hand it back to [`run`](Self::run).
    pub fn delay_conventions(&mut self) -> ConventionBatch {
        self.dispatcher.delay_conventions()
    }

    /// Close a batch and re-resolve `outcome` against the model as it stands
    /// after any convention pass the close triggered.
    ///
    /// Returns `None` when the outcome did not survive the pass.
    pub fn run<T: Trackable>(&mut self, batch: ConventionBatch, outcome: T) -> ModelResult<Option<T>> {
        let identity = outcome.track(&self.model);
        if self.dispatcher.close(batch)? {
            self.flush()?;
        }
        Ok(outcome.resolve(identity.as_ref(), &self.model))
    }

    /// Run `edit` inside a batch.
    pub(crate) fn batched<T, F>(&mut self, edit: F) -> ModelResult<Option<T>>
    where
        T: Trackable,
        F: FnOnce(&mut Self) -> ModelResult<Option<T>>,
    {
        let batch = self.delay_conventions();
        match edit(self) {
            Ok(Some(outcome)) => self.run(batch, outcome),
            Ok(None) => {
                self.run(batch, ())?;
                Ok(None)
            }
            Err(err) => {
                self.abandon(batch);
                Err(err)
            }
        }
    }

    /// Close a batch whose edit failed. The edit's error is the one reported;
    /// a misordered close has already been logged by the dispatcher.
    fn abandon(&mut self, batch: ConventionBatch) {
        if let Ok(true) = self.dispatcher.close(batch) {
            self.dispatcher.abort_flush();
        }
    }

    /// Run `edit` inside a batch, for edits that report success as a flag.
    pub(crate) fn batched_flag<F>(&mut self, edit: F) -> ModelResult<bool>
    where
        F: FnOnce(&mut Self) -> ModelResult<bool>,
    {
        let batch = self.delay_conventions();
        match edit(self) {
            Ok(applied) => {
                self.run(batch, ())?;
                Ok(applied)
            }
            Err(err) => {
                self.abandon(batch);
                Err(err)
            }
        }
    }

    fn flush(&mut self) -> ModelResult<()> {
        if self.dispatcher.pending() == 0 {
            return Ok(());
        }
        self.dispatcher.begin_flush(self.config.max_convention_events);
        let conventions = Rc::clone(&self.conventions);
        loop {
            let event = match self.dispatcher.next_event() {
                Ok(Some(event)) => event,
                Ok(None) => break,
                Err(err) => {
                    self.dispatcher.abort_flush();
                    return Err(err);
                }
            };
            if let Err(err) = conventions.dispatch(self, &event) {
                self.dispatcher.abort_flush();
                return Err(err);
            }
        }
        let dispatched = self.dispatcher.end_flush();
        tracing::debug!(
            target: "keystone::conventions",
            dispatched,
            "convention pass finished"
        );
        Ok(())
    }

    /// Queue an event; dispatch right away when no batch is open.
    pub(crate) fn notify(&mut self, event: ModelEvent) -> ModelResult<()> {
        self.dispatcher.notify(event);
        if self.dispatcher.is_delayed() {
            Ok(())
        } else {
            self.flush()
        }
    }

    // ==================== Element Access ====================

    pub(crate) fn entity_data(&self, id: EntityTypeId) -> ModelResult<&EntityType> {
        self.model.entity_type(id).ok_or_else(|| ModelError::orphaned(id))
    }

    pub(crate) fn entity_type_data_mut(&mut self, id: EntityTypeId) -> ModelResult<&mut EntityType> {
        self.model
            .entity_type_mut(id)
            .ok_or_else(|| ModelError::orphaned(id))
    }

    pub(crate) fn property_data(&self, id: PropertyId) -> ModelResult<&Property> {
        self.model.property(id).ok_or_else(|| ModelError::orphaned(id))
    }

    pub(crate) fn key_data(&self, id: KeyId) -> ModelResult<&Key> {
        self.model.key(id).ok_or_else(|| ModelError::orphaned(id))
    }

    pub(crate) fn index_data(&self, id: IndexId) -> ModelResult<&Index> {
        self.model.index(id).ok_or_else(|| ModelError::orphaned(id))
    }

    pub(crate) fn foreign_key_data(&self, id: ForeignKeyId) -> ModelResult<&ForeignKey> {
        self.model.foreign_key(id).ok_or_else(|| ModelError::orphaned(id))
    }

    pub(crate) fn skip_navigation_data(&self, id: SkipNavigationId) -> ModelResult<&SkipNavigation> {
        self.model
            .skip_navigation(id)
            .ok_or_else(|| ModelError::orphaned(id))
    }

    pub(crate) fn service_property_data(
        &self,
        id: ServicePropertyId,
    ) -> ModelResult<&ServiceProperty> {
        self.model
            .service_property(id)
            .ok_or_else(|| ModelError::orphaned(id))
    }

    /// Handle for an entity type. Fails once the entity type is removed.
    pub fn entity_builder(&mut self, id: EntityTypeId) -> ModelResult<EntityTypeBuilder<'_>> {
        self.entity_data(id)?;
        Ok(EntityTypeBuilder::new(self, id))
    }

    pub(crate) fn check_member_name(&self, name: &str) -> ModelResult<()> {
        if self.config.validate_names {
            self.names.validate_member(name)
        } else {
            Ok(())
        }
    }

    pub(crate) fn check_entity_name(&self, name: &str) -> ModelResult<()> {
        if self.config.validate_names {
            self.names.validate_entity(name)
        } else {
            Ok(())
        }
    }

    /// Whether an edit at `source` must respect an ignore of `name`.
    pub(crate) fn is_ignored(
        &self,
        entity: EntityTypeId,
        name: &str,
        source: ConfigurationSource,
    ) -> bool {
        source != ConfigurationSource::Explicit
            && !source.overrides_strictly(self.model.find_ignored_source(entity, name))
    }

    pub(crate) fn reject(&self, operation: &'static str, target: impl std::fmt::Display, source: ConfigurationSource) {
        tracing::trace!(
            target: "keystone::builder",
            operation,
            %target,
            %source,
            "rejected by precedence"
        );
    }

    // ==================== Entity Types ====================

    /// Find or add the entity type `name`.
    ///
    /// The backing record is the catalog record of the same name; without
    /// one the entity type is shadow-only.
    pub fn entity(
        &mut self,
        name: &str,
        source: ConfigurationSource,
    ) -> ModelResult<Option<EntityTypeId>> {
        if let Some(id) = self.model.find_entity_type(name) {
            if let Some(entity) = self.model.entity_type_mut(id) {
                entity.source = source.max(Some(entity.source));
            }
            return Ok(Some(id));
        }
        self.check_entity_name(name)?;

        if let Some(ignored) = self.model.find_ignored_entity_type_source(name) {
            if source != ConfigurationSource::Explicit && !source.overrides_strictly(Some(ignored)) {
                self.reject("entity", name, source);
                return Ok(None);
            }
            self.model.remove_ignored_entity_type(name);
        }

        let record = self
            .model
            .catalog()
            .contains(name)
            .then(|| name.to_string());
        self.add_entity_type_raw(name, record, source, None).map(Some)
    }

    /// Find or add the defining-navigation entity type for `record` under
    /// `defining_entity.navigation`.
    pub fn owned_entity(
        &mut self,
        record: &str,
        navigation: &str,
        defining_entity: EntityTypeId,
        source: ConfigurationSource,
    ) -> ModelResult<Option<EntityTypeId>> {
        let owner = self.entity_data(defining_entity)?.name.clone();
        let name = format!("{}.{}#{}", owner, navigation, record);
        if let Some(id) = self.model.find_entity_type(&name) {
            if let Some(entity) = self.model.entity_type_mut(id) {
                entity.source = source.max(Some(entity.source));
            }
            return Ok(Some(id));
        }
        self.check_entity_name(&name)?;
        let defining = DefiningNavigation {
            entity: defining_entity,
            navigation: navigation.to_string(),
        };
        self.add_entity_type_raw(&name, Some(record.to_string()), source, Some(defining))
            .map(Some)
    }

    /// Remove an entity type.
    ///
    /// Derived types are rebased onto its base, and foreign keys, skip
    /// navigations and defined types that point at it are removed first.
    pub fn has_no_entity_type(
        &mut self,
        entity: EntityTypeId,
        source: ConfigurationSource,
    ) -> ModelResult<bool> {
        let current = self.entity_data(entity)?.source;
        if !source.overrides(Some(current)) {
            self.reject("has_no_entity_type", entity, source);
            return Ok(false);
        }
        self.batched_flag(|b| b.remove_entity_type_internal(entity, source))
    }

    pub(crate) fn remove_entity_type_internal(
        &mut self,
        entity: EntityTypeId,
        source: ConfigurationSource,
    ) -> ModelResult<bool> {
        let Some(data) = self.model.entity_type(entity).cloned() else {
            return Ok(false);
        };

        for derived in self.model.derived_types(entity) {
            self.has_base_type(derived, data.base, source)?;
        }

        let referencing: Vec<ForeignKeyId> = self
            .model
            .declared_referencing_foreign_keys(entity)
            .into_iter()
            .filter(|fk| {
                self.model
                    .foreign_key(*fk)
                    .is_some_and(|fk| fk.dependent != entity)
            })
            .collect();
        for fk in referencing {
            if self.model.foreign_key(fk).is_some() {
                self.remove_relationship_internal(fk)?;
            }
        }

        let targeting: Vec<SkipNavigationId> = self
            .model
            .skip_navigations()
            .filter(|s| s.target == entity && s.entity != entity)
            .map(|s| s.id)
            .collect();
        for skip in targeting {
            self.remove_skip_navigation_raw(skip)?;
        }

        for defined in self.model.defined_types(entity) {
            self.remove_entity_type_internal(defined, source)?;
        }

        let principal_keys: Vec<KeyId> = data
            .foreign_keys
            .iter()
            .filter_map(|fk| self.model.foreign_key(*fk))
            .filter(|fk| fk.principal != entity)
            .map(|fk| fk.principal_key)
            .collect();

        self.remove_entity_type_raw(entity)?;

        for key in principal_keys {
            if self.model.key(key).is_some() {
                self.remove_key_if_unused(key)?;
            }
        }
        Ok(true)
    }

    /// Ignore an entity type name model-wide, removing the entity type if
    /// it exists.
    pub fn ignore_entity(&mut self, name: &str, source: ConfigurationSource) -> ModelResult<bool> {
        if let Some(existing) = self.model.find_ignored_entity_type_source(name) {
            if existing.overrides(Some(source)) {
                return Ok(true);
            }
        }
        if let Some(id) = self.model.find_entity_type(name) {
            if !self.has_no_entity_type(id, source)? {
                return Ok(false);
            }
        }
        self.model.add_ignored_entity_type(name, source);
        Ok(true)
    }

    // ==================== Raw Edits ====================

    pub(crate) fn add_entity_type_raw(
        &mut self,
        name: &str,
        record: Option<String>,
        source: ConfigurationSource,
        defining: Option<DefiningNavigation>,
    ) -> ModelResult<EntityTypeId> {
        let id = self.model.add_entity_type(name, record, source, defining)?;
        tracing::debug!(target: "keystone::builder", entity = name, %source, "entity type added");
        self.notify(ModelEvent::EntityTypeAdded { entity: id })?;
        Ok(id)
    }

    pub(crate) fn remove_entity_type_raw(&mut self, id: EntityTypeId) -> ModelResult<()> {
        let removed = self.model.remove_entity_type(id)?;
        tracing::debug!(target: "keystone::builder", entity = %removed.name, "entity type removed");
        self.notify(ModelEvent::EntityTypeRemoved { name: removed.name })
    }

    pub(crate) fn set_base_type_raw(
        &mut self,
        entity: EntityTypeId,
        base: Option<EntityTypeId>,
        source: Option<ConfigurationSource>,
    ) -> ModelResult<()> {
        let old_base = self.entity_data(entity)?.base;
        self.model.set_base_type(entity, base, source)?;
        if old_base != base {
            self.notify(ModelEvent::BaseTypeChanged {
                entity,
                new_base: base,
                old_base,
            })?;
        }
        Ok(())
    }

    pub(crate) fn add_property_raw(
        &mut self,
        entity: EntityTypeId,
        name: &str,
        ty: PropertyType,
        type_source: Option<ConfigurationSource>,
        source: ConfigurationSource,
    ) -> ModelResult<PropertyId> {
        let is_shadow = !matches!(
            self.model.record_member(entity, name).map(|m| &m.ty),
            Some(MemberType::Scalar(_))
        );
        let id = self
            .model
            .add_property(entity, name, ty, type_source, source, is_shadow)?;
        self.notify(ModelEvent::PropertyAdded { property: id })?;
        Ok(id)
    }

    pub(crate) fn remove_property_raw(&mut self, id: PropertyId) -> ModelResult<()> {
        let was_discriminator = self
            .model
            .entity_types()
            .find(|e| e.discriminator == Some(id))
            .map(|e| e.id);
        let removed = self.model.remove_property(id)?;
        if let Some(entity) = was_discriminator {
            self.notify(ModelEvent::DiscriminatorChanged { entity })?;
        }
        self.notify(ModelEvent::PropertyRemoved {
            entity: removed.entity,
            name: removed.name,
        })
    }

    pub(crate) fn add_key_raw(
        &mut self,
        entity: EntityTypeId,
        properties: Vec<PropertyId>,
        source: ConfigurationSource,
    ) -> ModelResult<KeyId> {
        let id = self.model.add_key(entity, properties, source)?;
        self.notify(ModelEvent::KeyAdded { key: id })?;
        Ok(id)
    }

    pub(crate) fn remove_key_raw(&mut self, id: KeyId) -> ModelResult<()> {
        let key = self.key_data(id)?;
        let entity = key.entity;
        let properties = self.model.property_names(&key.properties);
        let was_primary = self.model.find_primary_key(entity) == Some(id);

        self.model.remove_key(id)?;
        if was_primary {
            self.notify(ModelEvent::PrimaryKeyChanged {
                entity,
                new_key: None,
                old_key: Some(id),
            })?;
        }
        self.notify(ModelEvent::KeyRemoved { entity, properties })
    }

    pub(crate) fn set_primary_key_raw(
        &mut self,
        entity: EntityTypeId,
        key: Option<KeyId>,
        source: Option<ConfigurationSource>,
    ) -> ModelResult<()> {
        let old_key = self.entity_data(entity)?.primary_key;
        self.model.set_primary_key(entity, key, source)?;
        if old_key != key {
            self.notify(ModelEvent::PrimaryKeyChanged {
                entity,
                new_key: key,
                old_key,
            })?;
        }
        Ok(())
    }

    pub(crate) fn add_index_raw(
        &mut self,
        entity: EntityTypeId,
        properties: Vec<PropertyId>,
        name: Option<String>,
        source: ConfigurationSource,
    ) -> ModelResult<IndexId> {
        let id = self.model.add_index(entity, properties, name, source)?;
        self.notify(ModelEvent::IndexAdded { index: id })?;
        Ok(id)
    }

    pub(crate) fn remove_index_raw(&mut self, id: IndexId) -> ModelResult<()> {
        let index = self.model.remove_index(id)?;
        let properties = self.model.property_names(&index.properties);
        self.notify(ModelEvent::IndexRemoved {
            entity: index.entity,
            properties,
        })
    }

    pub(crate) fn add_foreign_key_raw(
        &mut self,
        dependent: EntityTypeId,
        properties: Vec<PropertyId>,
        principal: EntityTypeId,
        principal_key: KeyId,
        component_source: Option<ConfigurationSource>,
        source: ConfigurationSource,
    ) -> ModelResult<ForeignKeyId> {
        let id = self.model.add_foreign_key(
            dependent,
            properties,
            principal,
            principal_key,
            component_source,
            source,
        )?;
        self.notify(ModelEvent::ForeignKeyAdded { foreign_key: id })?;
        Ok(id)
    }

    pub(crate) fn remove_foreign_key_raw(&mut self, id: ForeignKeyId) -> ModelResult<ForeignKey> {
        let fk = self.model.remove_foreign_key(id)?;
        if let Some(navigation) = &fk.dependent_to_principal {
            self.notify(ModelEvent::NavigationRemoved {
                entity: fk.dependent,
                name: navigation.name.clone(),
            })?;
        }
        if let Some(navigation) = &fk.principal_to_dependent {
            self.notify(ModelEvent::NavigationRemoved {
                entity: fk.principal,
                name: navigation.name.clone(),
            })?;
        }
        self.notify(ModelEvent::ForeignKeyRemoved {
            dependent: fk.dependent,
            principal: fk.principal,
        })?;
        Ok(fk)
    }

    pub(crate) fn set_navigation_raw(
        &mut self,
        id: ForeignKeyId,
        on_dependent: bool,
        navigation: Option<Navigation>,
    ) -> ModelResult<()> {
        let fk = self.foreign_key_data(id)?;
        let declaring = if on_dependent { fk.dependent } else { fk.principal };
        let old = fk.navigation(on_dependent).map(|n| n.name.clone());
        let new = navigation.as_ref().map(|n| n.name.clone());

        self.model.set_navigation(id, on_dependent, navigation)?;
        if old == new {
            return Ok(());
        }
        if let Some(name) = old {
            self.notify(ModelEvent::NavigationRemoved {
                entity: declaring,
                name,
            })?;
        }
        if new.is_some() {
            self.notify(ModelEvent::NavigationAdded {
                foreign_key: id,
                on_dependent,
            })?;
        }
        Ok(())
    }

    pub(crate) fn set_ownership_raw(
        &mut self,
        id: ForeignKeyId,
        ownership: bool,
        source: Option<ConfigurationSource>,
    ) -> ModelResult<()> {
        let fk = self
            .model
            .foreign_key_mut(id)
            .ok_or_else(|| ModelError::orphaned(id))?;
        let changed = fk.is_ownership != ownership;
        fk.is_ownership = ownership;
        fk.ownership_source = source;
        if changed {
            self.notify(ModelEvent::OwnershipChanged { foreign_key: id })?;
        }
        Ok(())
    }

    pub(crate) fn add_skip_navigation_raw(
        &mut self,
        entity: EntityTypeId,
        name: &str,
        target: EntityTypeId,
        is_collection: bool,
        is_on_dependent: bool,
        source: ConfigurationSource,
    ) -> ModelResult<SkipNavigationId> {
        let id = self.model.add_skip_navigation(
            entity,
            name,
            target,
            is_collection,
            is_on_dependent,
            source,
        )?;
        self.notify(ModelEvent::SkipNavigationAdded {
            skip_navigation: id,
        })?;
        Ok(id)
    }

    pub(crate) fn remove_skip_navigation_raw(&mut self, id: SkipNavigationId) -> ModelResult<()> {
        let skip = self.model.remove_skip_navigation(id)?;
        self.notify(ModelEvent::SkipNavigationRemoved {
            entity: skip.entity,
            name: skip.name,
        })
    }

    pub(crate) fn add_service_property_raw(
        &mut self,
        entity: EntityTypeId,
        name: &str,
        service_type: &str,
        source: ConfigurationSource,
    ) -> ModelResult<ServicePropertyId> {
        let id = self
            .model
            .add_service_property(entity, name, service_type, source)?;
        self.notify(ModelEvent::ServicePropertyAdded {
            service_property: id,
        })?;
        Ok(id)
    }

    pub(crate) fn remove_service_property_raw(&mut self, id: ServicePropertyId) -> ModelResult<()> {
        let service = self.model.remove_service_property(id)?;
        self.notify(ModelEvent::ServicePropertyRemoved {
            entity: service.entity,
            name: service.name,
        })
    }

    pub(crate) fn add_ignored_raw(
        &mut self,
        entity: EntityTypeId,
        name: &str,
        source: ConfigurationSource,
    ) -> ModelResult<()> {
        self.model.add_ignored(entity, name, source)?;
        self.notify(ModelEvent::MemberIgnored {
            entity,
            name: name.to_string(),
        })
    }

    pub(crate) fn set_keyless_raw(
        &mut self,
        entity: EntityTypeId,
        keyless: bool,
        source: Option<ConfigurationSource>,
    ) -> ModelResult<()> {
        let data = self
            .model
            .entity_type_mut(entity)
            .ok_or_else(|| ModelError::orphaned(entity))?;
        let changed = data.is_keyless != keyless;
        data.is_keyless = keyless;
        data.keyless_source = source;
        if changed {
            self.notify(ModelEvent::KeylessChanged { entity, keyless })?;
        }
        Ok(())
    }

    pub(crate) fn set_discriminator_raw(
        &mut self,
        entity: EntityTypeId,
        property: Option<PropertyId>,
        source: Option<ConfigurationSource>,
    ) -> ModelResult<()> {
        let data = self
            .model
            .entity_type_mut(entity)
            .ok_or_else(|| ModelError::orphaned(entity))?;
        let changed = data.discriminator != property;
        data.discriminator = property;
        data.discriminator_source = source;
        if changed {
            self.notify(ModelEvent::DiscriminatorChanged { entity })?;
        }
        Ok(())
    }
}
