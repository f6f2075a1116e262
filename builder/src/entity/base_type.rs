//! Base type changes.
//!
//! Moving an entity type to another hierarchy detaches everything that would
//! be invalid under the new base, applies the base pointer and reattaches the
//! rest in dependency order: duplicated properties, service properties,
//! properties, keys, indexes, foreign keys and skip navigations. The whole
//! migration runs in one batch so conventions only see the settled result.

use crate::detach::{
    ForeignKeySnapshot, IndexSnapshot, KeySnapshot, PropertySnapshot, ServicePropertySnapshot,
    SkipNavigationSnapshot,
};
use crate::model_builder::ModelBuilder;
use keystone_core::{
    ConfigurationSource, EntityTypeId, ForeignKeyId, ModelError, ModelResult, PropertyId,
    ServicePropertyId, SkipNavigationId,
};
use keystone_metadata::MemberRef;
use std::collections::BTreeSet;

/// Members of the moving hierarchy that clash with members of the new base.
#[derive(Debug, Default)]
struct Conflicts {
    /// Same-kind members, reattached onto the base member.
    properties: Vec<PropertyId>,
    service_properties: Vec<ServicePropertyId>,
    skip_navigations: Vec<SkipNavigationId>,
    /// Members of another kind, removed for good.
    removed: Vec<MemberRef>,
    /// Declared ignores of names the base holds.
    ignored: Vec<String>,
    /// Foreign keys whose properties share names with the base's keys.
    reset_foreign_keys: Vec<ForeignKeyId>,
}

/// Everything detached during a migration, waiting to be reattached.
#[derive(Debug, Default)]
struct Detached {
    duplicated: Vec<PropertySnapshot>,
    service_properties: Vec<ServicePropertySnapshot>,
    properties: Vec<PropertySnapshot>,
    keys: Vec<KeySnapshot>,
    indexes: Vec<IndexSnapshot>,
    skip_navigations: Vec<SkipNavigationSnapshot>,
    foreign_keys: Vec<ForeignKeySnapshot>,
}

impl ModelBuilder {
    /// Set or clear the base type.
    pub fn has_base_type(
        &mut self,
        entity: EntityTypeId,
        base: Option<EntityTypeId>,
        source: ConfigurationSource,
    ) -> ModelResult<Option<EntityTypeId>> {
        let data = self.entity_data(entity)?.clone();
        if data.base == base {
            if let Some(e) = self.model.entity_type_mut(entity) {
                e.base_source = Some(source.max(e.base_source));
            }
            return Ok(Some(entity));
        }
        if !source.overrides(data.base_source) {
            self.reject("has_base_type", &data.name, source);
            return Ok(None);
        }

        let removal_source = source.max(Some(ConfigurationSource::DataAnnotation));
        let conflicts = match base {
            Some(base) => {
                self.entity_data(base)?;
                if self.model.base_chain(base).contains(&entity) {
                    return Err(ModelError::circular_inheritance(
                        &data.name,
                        self.model.entity_name(base),
                    ));
                }
                match self.find_base_conflicts(entity, base, removal_source)? {
                    Some(conflicts) => conflicts,
                    None => {
                        self.reject("has_base_type", &data.name, source);
                        return Ok(None);
                    }
                }
            }
            None => Conflicts::default(),
        };

        self.batched(|b| {
            let mut detached = Detached::default();
            b.detach_conflicts(conflicts, removal_source, entity, &mut detached)?;

            // A non-root entity type owns no keys
            for key in b.entity_data(entity)?.keys.clone() {
                let mut snapshot = b.detach_key(key)?;
                if data.primary_key == Some(key) {
                    snapshot.primary_key_source = data.primary_key_source;
                }
                detached.foreign_keys.append(&mut snapshot.referencing);
                detached.keys.push(snapshot);
            }
            if data.is_keyless {
                b.set_keyless_raw(entity, false, None)?;
            }

            if let Some(old_base) = data.base {
                b.detach_old_base_dependents(entity, old_base, base, &mut detached)?;
            }

            b.set_base_type_raw(entity, base, Some(source))?;
            tracing::debug!(
                target: "keystone::builder",
                entity = %data.name,
                base = ?base.map(|base| b.model.entity_name(base)),
                %source,
                "base type changed"
            );

            b.reattach(&detached)?;
            Ok(Some(entity))
        })
    }

    /// Collect the clashes between the hierarchy rooted at `entity` and the
    /// members of `base`. Returns `None` when one of them cannot be resolved
    /// at `removal_source`.
    fn find_base_conflicts(
        &self,
        entity: EntityTypeId,
        base: EntityTypeId,
        removal_source: ConfigurationSource,
    ) -> ModelResult<Option<Conflicts>> {
        let data = self.entity_data(entity)?;
        if data.primary_key.is_some() && !removal_source.overrides(data.primary_key_source) {
            return Ok(None);
        }
        if data.is_keyless && !removal_source.overrides(data.keyless_source) {
            return Ok(None);
        }

        let mut conflicts = Conflicts::default();
        let hierarchy = self.model.derived_types_inclusive(entity);
        for declaring in &hierarchy {
            for member in self.model.declared_members(*declaring) {
                let name = self.model.member_name(member);
                let base_members = self.model.find_members(base, &name);
                if base_members.is_empty() {
                    continue;
                }
                if !self.can_remove_member(member, removal_source) {
                    return Ok(None);
                }
                let same_kind = base_members
                    .iter()
                    .any(|m| self.model.member_kind(*m) == self.model.member_kind(member));
                match member {
                    MemberRef::Property(p) if same_kind => conflicts.properties.push(p),
                    MemberRef::ServiceProperty(s) if same_kind => {
                        conflicts.service_properties.push(s)
                    }
                    MemberRef::SkipNavigation(s) if same_kind => conflicts.skip_navigations.push(s),
                    _ => conflicts.removed.push(member),
                }
            }
        }

        for (name, ignored_source) in &data.ignored {
            if self.model.find_members(base, name).is_empty() {
                continue;
            }
            if !removal_source.overrides(Some(*ignored_source)) {
                return Ok(None);
            }
            conflicts.ignored.push(name.clone());
        }

        let base_key_names: BTreeSet<String> = self
            .model
            .keys_of(self.model.root_type(base))
            .into_iter()
            .filter_map(|k| self.model.key(k))
            .flat_map(|k| self.model.property_names(&k.properties))
            .collect();
        for declaring in &hierarchy {
            for fk in self.model.declared_foreign_keys(*declaring) {
                let Some(data) = self.model.foreign_key(fk) else {
                    continue;
                };
                let overlaps = self
                    .model
                    .property_names(&data.properties)
                    .iter()
                    .any(|name| base_key_names.contains(name));
                if !overlaps {
                    continue;
                }
                if !removal_source.overrides(data.properties_source) {
                    return Ok(None);
                }
                conflicts.reset_foreign_keys.push(fk);
            }
        }
        Ok(Some(conflicts))
    }

    fn detach_conflicts(
        &mut self,
        conflicts: Conflicts,
        removal_source: ConfigurationSource,
        entity: EntityTypeId,
        detached: &mut Detached,
    ) -> ModelResult<()> {
        for fk in conflicts.reset_foreign_keys {
            if self.model.foreign_key(fk).is_some() {
                let mut snapshot = self.detach_foreign_key(fk)?;
                snapshot.forget_properties();
                detached.foreign_keys.push(snapshot);
            }
        }

        let properties: Vec<PropertyId> = conflicts
            .properties
            .into_iter()
            .filter(|p| self.model.property(*p).is_some())
            .collect();
        let snapshot = self.detach_properties(&properties)?;
        detached.properties.extend(snapshot.properties);
        detached.keys.extend(snapshot.keys);
        detached.indexes.extend(snapshot.indexes);
        detached.foreign_keys.extend(snapshot.foreign_keys);

        for service in conflicts.service_properties {
            if self.model.service_property(service).is_some() {
                detached
                    .service_properties
                    .push(self.detach_service_property(service)?);
            }
        }
        for skip in conflicts.skip_navigations {
            if self.model.skip_navigation(skip).is_some() {
                detached
                    .skip_navigations
                    .push(self.detach_skip_navigation(skip)?);
            }
        }
        for member in conflicts.removed {
            if self.model.member_entity(member).is_some() {
                self.remove_member(member, removal_source)?;
            }
        }
        for name in conflicts.ignored {
            self.model.remove_ignored(entity, &name)?;
        }
        Ok(())
    }

    /// Detach foreign keys and indexes of the moving hierarchy that use
    /// properties of the old base, remembering those properties so they are
    /// duplicated onto `entity`.
    fn detach_old_base_dependents(
        &mut self,
        entity: EntityTypeId,
        old_base: EntityTypeId,
        new_base: Option<EntityTypeId>,
        detached: &mut Detached,
    ) -> ModelResult<()> {
        let new_chain = new_base
            .map(|base| self.model.base_chain(base))
            .unwrap_or_default();
        let leaving: BTreeSet<PropertyId> = self
            .model
            .base_chain(old_base)
            .into_iter()
            .filter(|t| !new_chain.contains(t))
            .filter_map(|t| self.model.entity_type(t))
            .flat_map(|t| t.properties.iter().copied())
            .collect();
        let new_root = new_base.map_or(entity, |base| self.model.root_type(base));

        let mut duplicated: BTreeSet<PropertyId> = BTreeSet::new();
        for declaring in self.model.derived_types_inclusive(entity) {
            for fk in self.model.declared_foreign_keys(declaring) {
                let Some(data) = self.model.foreign_key(fk) else {
                    continue;
                };
                let used: Vec<PropertyId> = data
                    .properties
                    .iter()
                    .copied()
                    .filter(|p| leaving.contains(p))
                    .collect();
                if !used.is_empty() {
                    duplicated.extend(used);
                    detached.foreign_keys.push(self.detach_foreign_key(fk)?);
                }
            }

            // The principal key of these lives on the old root
            for fk in self.model.declared_referencing_foreign_keys(declaring) {
                let stale_key = self
                    .model
                    .foreign_key(fk)
                    .and_then(|fk| self.model.key(fk.principal_key))
                    .filter(|key| key.entity != new_root)
                    .map(|key| key.properties.clone());
                if let Some(properties) = stale_key {
                    duplicated.extend(properties.into_iter().filter(|p| leaving.contains(p)));
                    detached.foreign_keys.push(self.detach_foreign_key(fk)?);
                }
            }

            let indexes = self.entity_data(declaring)?.indexes.clone();
            for index in indexes {
                let Some(data) = self.model.index(index) else {
                    continue;
                };
                let used: Vec<PropertyId> = data
                    .properties
                    .iter()
                    .copied()
                    .filter(|p| leaving.contains(p))
                    .collect();
                if !used.is_empty() {
                    duplicated.extend(used);
                    detached.indexes.push(self.detach_index(index)?);
                }
            }
        }

        let entity_name = self.model.entity_name(entity);
        for property in duplicated {
            if self.model.property(property).is_none() {
                continue;
            }
            let mut snapshot = self.capture_property(property)?;
            snapshot.entity = entity_name.clone();
            detached.duplicated.push(snapshot);
        }
        Ok(())
    }

    fn reattach(&mut self, detached: &Detached) -> ModelResult<()> {
        for property in &detached.duplicated {
            self.attach_property(property)?;
        }
        for service in &detached.service_properties {
            self.attach_service_property(service)?;
        }
        for property in &detached.properties {
            self.attach_property(property)?;
        }
        for key in &detached.keys {
            self.attach_key(key)?;
        }
        for index in &detached.indexes {
            self.attach_index(index)?;
        }
        for fk in &detached.foreign_keys {
            self.attach_foreign_key(fk)?;
        }
        for skip in &detached.skip_navigations {
            self.attach_skip_navigation(skip)?;
        }
        Ok(())
    }
}
