//! Relationship configuration.
//!
//! Operations on a single foreign key: its navigations, its ends, its
//! dependent properties and principal key, and its flags. They are methods
//! on [`ModelBuilder`] taking a foreign key id; [`ForeignKeyBuilder`] is the
//! handle that resolves names and delegates.

use crate::model_builder::ModelBuilder;
use keystone_core::{
    ConfigurationSource, EntityTypeId, ForeignKeyId, KeyId, ModelError, ModelResult, PropertyId,
};
use keystone_metadata::{DeleteBehavior, ForeignKey, MemberKind, MemberRef, Navigation};

/// Handle over one foreign key.
///
/// Operations that rebuild the foreign key move the handle to the new id.
#[derive(Debug)]
pub struct ForeignKeyBuilder<'a> {
    builder: &'a mut ModelBuilder,
    id: ForeignKeyId,
}

impl<'a> ForeignKeyBuilder<'a> {
    pub(crate) fn new(builder: &'a mut ModelBuilder, id: ForeignKeyId) -> Self {
        Self { builder, id }
    }

    pub fn id(&self) -> ForeignKeyId {
        self.id
    }

    /// The foreign key, or `Orphaned` once it has been removed.
    pub fn metadata(&self) -> ModelResult<&ForeignKey> {
        self.builder.foreign_key_data(self.id)
    }

    fn follow(&mut self, outcome: Option<ForeignKeyId>) -> Option<ForeignKeyId> {
        if let Some(id) = outcome {
            self.id = id;
        }
        outcome
    }

    fn entity_named(&self, name: &str) -> ModelResult<EntityTypeId> {
        self.builder
            .model
            .find_entity_type(name)
            .ok_or_else(|| ModelError::unknown_entity_type(name))
    }

    pub fn has_navigation(
        &mut self,
        name: Option<&str>,
        on_dependent: bool,
        source: ConfigurationSource,
    ) -> ModelResult<Option<ForeignKeyId>> {
        let outcome = self
            .builder
            .has_navigation(self.id, name, on_dependent, source)?;
        Ok(self.follow(outcome))
    }

    pub fn has_navigations(
        &mut self,
        navigation: Option<&str>,
        inverse: Option<&str>,
        source: ConfigurationSource,
    ) -> ModelResult<Option<ForeignKeyId>> {
        let outcome = self
            .builder
            .has_navigations(self.id, navigation, inverse, source)?;
        Ok(self.follow(outcome))
    }

    pub fn has_entity_types(
        &mut self,
        principal: &str,
        dependent: &str,
        source: ConfigurationSource,
    ) -> ModelResult<Option<ForeignKeyId>> {
        let principal = self.entity_named(principal)?;
        let dependent = self.entity_named(dependent)?;
        let outcome = self
            .builder
            .has_entity_types(self.id, principal, dependent, source)?;
        Ok(self.follow(outcome))
    }

    /// Pin the dependent properties by name, creating them if needed, or
    /// go back to synthesized ones with `None`.
    pub fn has_foreign_key(
        &mut self,
        names: Option<&[&str]>,
        source: ConfigurationSource,
    ) -> ModelResult<Option<ForeignKeyId>> {
        let properties = match names {
            Some(names) => {
                let data = self.builder.foreign_key_data(self.id)?;
                let dependent = data.dependent;
                let referenced = self.builder.key_data(data.principal_key)?.properties.clone();
                let names: Vec<String> = names.iter().map(|n| n.to_string()).collect();
                match self.builder.get_or_create_properties(
                    dependent,
                    &names,
                    source,
                    Some(&referenced),
                    false,
                    true,
                )? {
                    Some(properties) => Some(properties),
                    None => return Ok(None),
                }
            }
            None => None,
        };
        let outcome = self.builder.has_foreign_key(self.id, properties, source)?;
        Ok(self.follow(outcome))
    }

    /// Pin the principal key by property names, or go back to the primary
    /// key with `None`.
    pub fn has_principal_key(
        &mut self,
        names: Option<&[&str]>,
        source: ConfigurationSource,
    ) -> ModelResult<Option<ForeignKeyId>> {
        let properties = match names {
            Some(names) => {
                let principal = self.builder.foreign_key_data(self.id)?.principal;
                let names: Vec<String> = names.iter().map(|n| n.to_string()).collect();
                match self.builder.get_or_create_properties(
                    principal, &names, source, None, true, true,
                )? {
                    Some(properties) => Some(properties),
                    None => return Ok(None),
                }
            }
            None => None,
        };
        let outcome = self
            .builder
            .has_principal_key(self.id, properties.as_deref(), source)?;
        Ok(self.follow(outcome))
    }

    pub fn is_required(&mut self, required: Option<bool>, source: ConfigurationSource) -> ModelResult<bool> {
        self.builder.foreign_key_is_required(self.id, required, source)
    }

    pub fn is_unique(&mut self, unique: Option<bool>, source: ConfigurationSource) -> ModelResult<bool> {
        self.builder.foreign_key_is_unique(self.id, unique, source)
    }

    pub fn is_ownership(&mut self, ownership: bool, source: ConfigurationSource) -> ModelResult<bool> {
        self.builder.foreign_key_is_ownership(self.id, ownership, source)
    }

    pub fn on_delete(
        &mut self,
        behavior: Option<DeleteBehavior>,
        source: ConfigurationSource,
    ) -> ModelResult<bool> {
        self.builder.foreign_key_on_delete(self.id, behavior, source)
    }

    pub fn is_weak_type_definition(&mut self, source: ConfigurationSource) -> ModelResult<Option<ForeignKeyId>> {
        let outcome = self.builder.is_weak_type_definition(self.id, source)?;
        Ok(self.follow(outcome))
    }

    pub fn should_reuniquify_temporary_properties(&self) -> ModelResult<bool> {
        self.builder.should_reuniquify_temporary_properties(self.id)
    }
}

impl ModelBuilder {
    // ==================== Navigations ====================

    /// Set, rename or (with `None`) clear the navigation on one end.
    pub fn has_navigation(
        &mut self,
        fk: ForeignKeyId,
        name: Option<&str>,
        on_dependent: bool,
        source: ConfigurationSource,
    ) -> ModelResult<Option<ForeignKeyId>> {
        let data = self.foreign_key_data(fk)?;
        let declaring = if on_dependent { data.dependent } else { data.principal };
        let current = data.navigation(on_dependent).cloned();

        match (&current, name) {
            (None, None) => return Ok(Some(fk)),
            (Some(current), Some(name)) if current.name == name => {
                let upgraded = Navigation {
                    name: current.name.clone(),
                    source: source.max(Some(current.source)),
                };
                self.set_navigation_raw(fk, on_dependent, Some(upgraded))?;
                return Ok(Some(fk));
            }
            (Some(current), _) if !source.overrides(Some(current.source)) => {
                self.reject("has_navigation", &current.name, source);
                return Ok(None);
            }
            _ => {}
        }

        let Some(name) = name else {
            return self.batched(|b| {
                b.set_navigation_raw(fk, on_dependent, None)?;
                Ok(Some(fk))
            });
        };

        self.check_member_name(name)?;
        let entity_name = self.model.entity_name(declaring);
        if self.is_ignored(declaring, name, source) {
            self.reject("has_navigation", format!("{}.{}", entity_name, name), source);
            return Ok(None);
        }

        let own = MemberRef::Navigation(keystone_metadata::NavigationRef {
            foreign_key: fk,
            on_dependent,
        });
        let conflicts: Vec<MemberRef> = self
            .model
            .find_members_in_hierarchy(declaring, name)
            .into_iter()
            .filter(|m| *m != own)
            .collect();
        for conflict in &conflicts {
            let explicit_property = self.model.member_kind(*conflict) == MemberKind::Property
                && self.model.member_source(*conflict) == Some(ConfigurationSource::Explicit);
            if explicit_property && source == ConfigurationSource::Explicit {
                return Err(ModelError::conflicting_member(&entity_name, name, "property"));
            }
            if !self.can_remove_member(*conflict, source) {
                self.reject("has_navigation", format!("{}.{}", entity_name, name), source);
                return Ok(None);
            }
        }

        self.batched(|b| {
            b.model.remove_ignored(declaring, name)?;
            for conflict in conflicts {
                if b.model.member_source(conflict).is_some() {
                    b.remove_member(conflict, source)?;
                }
            }
            if b.model.foreign_key(fk).is_none() {
                return Ok(None);
            }
            let navigation = Navigation {
                name: name.to_string(),
                source,
            };
            b.set_navigation_raw(fk, on_dependent, Some(navigation))?;
            tracing::debug!(
                target: "keystone::builder",
                entity = %entity_name,
                navigation = name,
                foreign_key = %fk,
                %source,
                "navigation set"
            );
            Ok(Some(fk))
        })
    }

    /// Set both navigations. A `None` side is left as it is.
    pub fn has_navigations(
        &mut self,
        fk: ForeignKeyId,
        navigation: Option<&str>,
        inverse: Option<&str>,
        source: ConfigurationSource,
    ) -> ModelResult<Option<ForeignKeyId>> {
        self.batched(|b| {
            if navigation.is_some() && b.has_navigation(fk, navigation, true, source)?.is_none() {
                return Ok(None);
            }
            if inverse.is_some() && b.has_navigation(fk, inverse, false, source)?.is_none() {
                return Ok(None);
            }
            Ok(Some(fk))
        })
    }

    // ==================== Ends ====================

    /// Point the foreign key at `principal` and `dependent`, inverting it
    /// when the ends are swapped. The foreign key is rebuilt, so the result
    /// may be a new id.
    pub fn has_entity_types(
        &mut self,
        fk: ForeignKeyId,
        principal: EntityTypeId,
        dependent: EntityTypeId,
        source: ConfigurationSource,
    ) -> ModelResult<Option<ForeignKeyId>> {
        let data = self.foreign_key_data(fk)?;
        if data.principal == principal && data.dependent == dependent {
            if let Some(data) = self.model.foreign_key_mut(fk) {
                data.principal_end_source = Some(source.max(data.principal_end_source));
            }
            return Ok(Some(fk));
        }
        if !source.overrides(data.principal_end_source) || (data.is_ownership && !source.overrides(data.ownership_source)) {
            self.reject("has_entity_types", fk, source);
            return Ok(None);
        }
        let inverted = data.principal == dependent && data.dependent == principal;
        let principal_name = self.entity_data(principal)?.name.clone();
        let dependent_name = self.entity_data(dependent)?.name.clone();

        self.batched(|b| {
            let mut snapshot = b.detach_foreign_key(fk)?;
            if inverted {
                std::mem::swap(&mut snapshot.dependent_to_principal, &mut snapshot.principal_to_dependent);
                snapshot.is_ownership = false;
                snapshot.ownership_source = None;
                snapshot.required_source = None;
            }
            snapshot.principal = principal_name;
            snapshot.dependent = dependent_name;
            snapshot.forget_properties();
            snapshot.principal_key.clear();
            snapshot.principal_key_source = None;
            snapshot.principal_end_source = Some(source);
            snapshot.source = source.max(Some(snapshot.source));

            let Some(rebuilt) = b.attach_foreign_key(&snapshot)? else {
                return Ok(None);
            };
            tracing::debug!(
                target: "keystone::builder",
                old = %fk,
                new = %rebuilt,
                inverted,
                "foreign key ends changed"
            );
            Ok(Some(rebuilt))
        })
    }

    /// Turn the owned dependent into a defining-navigation type named after
    /// the principal's navigation, carrying its members over.
    pub fn is_weak_type_definition(
        &mut self,
        fk: ForeignKeyId,
        source: ConfigurationSource,
    ) -> ModelResult<Option<ForeignKeyId>> {
        let data = self.foreign_key_data(fk)?;
        let (dependent, principal) = (data.dependent, data.principal);
        let Some(navigation) = data.principal_to_dependent.as_ref().map(|n| n.name.clone()) else {
            self.reject("is_weak_type_definition", fk, source);
            return Ok(None);
        };
        let entity = self.entity_data(dependent)?;
        if entity.defining.is_some() {
            return Ok(Some(fk));
        }
        let (Some(record), true) = (entity.record.clone(), source.overrides(Some(entity.source))) else {
            self.reject("is_weak_type_definition", &entity.name, source);
            return Ok(None);
        };
        let old_name = entity.name.clone();

        self.batched(|b| {
            let mut members = b.detach_all_members(dependent)?;
            b.remove_entity_type_internal(dependent, source)?;
            let Some(owned) = b.owned_entity(&record, &navigation, principal, source)? else {
                return Ok(None);
            };
            let new_name = b.model.entity_name(owned);
            members.retarget(&old_name, &new_name);
            b.attach_members(&members)?;
            tracing::debug!(
                target: "keystone::builder",
                old = %old_name,
                new = %new_name,
                "owned type made weak"
            );
            Ok(b.model.find_navigation(principal, &navigation).map(|n| n.foreign_key))
        })
    }

    // ==================== Properties & Keys ====================

    /// Pin the dependent properties, or with `None` replace them with fresh
    /// synthesized ones.
    pub fn has_foreign_key(
        &mut self,
        fk: ForeignKeyId,
        properties: Option<Vec<PropertyId>>,
        source: ConfigurationSource,
    ) -> ModelResult<Option<ForeignKeyId>> {
        let data = self.foreign_key_data(fk)?.clone();
        let properties = match properties {
            Some(properties) => match self.get_actual_properties(data.dependent, &properties)? {
                Some(properties) => Some(properties),
                None => return Ok(None),
            },
            None => None,
        };

        if properties.as_ref() == Some(&data.properties) {
            if let Some(fk) = self.model.foreign_key_mut(fk) {
                fk.properties_source = Some(source.max(fk.properties_source));
            }
            return Ok(Some(fk));
        }
        if !source.overrides(data.properties_source) {
            self.reject("has_foreign_key", fk, source);
            return Ok(None);
        }

        let key = match &properties {
            Some(properties) if !self.key_accepts(data.principal_key, Some(properties)) => {
                if !source.overrides(data.principal_key_source) {
                    self.reject("has_foreign_key", fk, source);
                    return Ok(None);
                }
                None
            }
            _ => Some(data.principal_key),
        };

        self.batched(|b| {
            let (key, key_source) = match key {
                Some(key) => (key, data.principal_key_source),
                None => match b.principal_key_for(data.principal, properties.as_deref())? {
                    Some(key) => (key, None),
                    None => return Ok(None),
                },
            };
            let properties_source = properties.as_ref().map(|_| source);
            b.repoint(fk, properties, key, properties_source, key_source)
        })
    }

    /// Pin the principal key to `properties`, or with `None` go back to the
    /// primary key. Dependent properties that no longer fit are replaced
    /// when they were not configured.
    pub fn has_principal_key(
        &mut self,
        fk: ForeignKeyId,
        properties: Option<&[PropertyId]>,
        source: ConfigurationSource,
    ) -> ModelResult<Option<ForeignKeyId>> {
        let data = self.foreign_key_data(fk)?.clone();
        let current = self.key_data(data.principal_key)?.properties.clone();
        if properties == Some(current.as_slice()) {
            if let Some(fk) = self.model.foreign_key_mut(fk) {
                fk.principal_key_source = Some(source.max(fk.principal_key_source));
            }
            return Ok(Some(fk));
        }
        if !source.overrides(data.principal_key_source) {
            self.reject("has_principal_key", fk, source);
            return Ok(None);
        }

        self.batched(|b| {
            let key = match properties {
                Some(properties) => {
                    let root = b.model.root_type(data.principal);
                    b.has_key_internal(root, properties, source)?
                }
                None => b.principal_key_for(data.principal, None)?,
            };
            let Some(key) = key else {
                return Ok(None);
            };

            let fits = b.key_accepts(key, Some(&data.properties));
            let dependent = if fits {
                Some(data.properties.clone())
            } else if source.overrides(data.properties_source) {
                None
            } else {
                b.reject("has_principal_key", fk, source);
                return Ok(None);
            };
            let properties_source = if fits { data.properties_source } else { None };
            let key_source = properties.map(|_| source);
            b.repoint(fk, dependent, key, properties_source, key_source)
        })
    }

    /// The primary key of the principal if it can take `properties`,
    /// otherwise a temporary key.
    fn principal_key_for(
        &mut self,
        principal: EntityTypeId,
        properties: Option<&[PropertyId]>,
    ) -> ModelResult<Option<KeyId>> {
        let primary = self
            .model
            .find_primary_key(principal)
            .filter(|key| self.key_accepts(*key, properties));
        match primary {
            Some(key) => Ok(Some(key)),
            None => self.create_temporary_key(principal, properties),
        }
    }

    /// Move the foreign key onto new properties and key, synthesizing the
    /// properties when none are given, and clean up what it left behind.
    fn repoint(
        &mut self,
        fk: ForeignKeyId,
        properties: Option<Vec<PropertyId>>,
        key: KeyId,
        properties_source: Option<ConfigurationSource>,
        principal_key_source: Option<ConfigurationSource>,
    ) -> ModelResult<Option<ForeignKeyId>> {
        let old = self.foreign_key_data(fk)?.clone();
        let properties = match properties {
            Some(properties) => properties,
            None => {
                let base_name = match &old.dependent_to_principal {
                    Some(navigation) => navigation.name.clone(),
                    None => self.entity_data(old.principal)?.short_name().to_string(),
                };
                let key_properties = self.key_data(key)?.properties.clone();
                match self.create_unique_properties(old.dependent, &base_name, &key_properties, old.is_required)? {
                    Some(properties) => properties,
                    None => return Ok(None),
                }
            }
        };

        self.model
            .set_foreign_key_properties(fk, properties, key, properties_source, principal_key_source)?;
        self.remove_unused_implicit_properties(&old.properties)?;
        if old.principal_key != key {
            self.remove_key_if_unused(old.principal_key)?;
        }
        tracing::debug!(
            target: "keystone::builder",
            foreign_key = %fk,
            key = %key,
            "foreign key repointed"
        );
        Ok(Some(fk))
    }

    /// Whether the synthesized dependent properties would come out different
    /// if they were created now, by name or by type.
    pub fn should_reuniquify_temporary_properties(&self, fk: ForeignKeyId) -> ModelResult<bool> {
        let data = self.foreign_key_data(fk)?;
        if data.properties_source.is_some() {
            return Ok(false);
        }
        let implicit = data
            .properties
            .iter()
            .all(|p| self.model.property(*p).is_some_and(|p| p.is_implicitly_created()));
        if !implicit {
            return Ok(false);
        }
        let base_name = match &data.dependent_to_principal {
            Some(navigation) => navigation.name.clone(),
            None => self.entity_data(data.principal)?.short_name().to_string(),
        };
        let key_properties = &self.key_data(data.principal_key)?.properties;
        let (names, _) =
            self.unique_property_names(data.dependent, &base_name, key_properties, Some(&data.properties));
        if names != self.model.property_names(&data.properties) {
            return Ok(true);
        }
        for (current, principal) in data.properties.iter().zip(key_properties) {
            let expected = self.property_data(*principal)?.ty.make_nullable(!data.is_required);
            if self.property_data(*current)?.ty != expected {
                return Ok(true);
            }
        }
        Ok(false)
    }

    // ==================== Flags ====================

    /// Mark the foreign key required or optional. `None` resets it.
    ///
    /// Dependent properties follow; implicit ones widen their type to allow
    /// nulls.
    pub fn foreign_key_is_required(
        &mut self,
        fk: ForeignKeyId,
        required: Option<bool>,
        source: ConfigurationSource,
    ) -> ModelResult<bool> {
        let data = self.foreign_key_data(fk)?;
        let value = required.unwrap_or(false);
        if data.is_required != value && !source.overrides(data.required_source) {
            self.reject("foreign_key_is_required", fk, source);
            return Ok(false);
        }
        let properties = data.properties.clone();

        self.batched_flag(|b| {
            if let Some(data) = b.model.foreign_key_mut(fk) {
                data.required_source = required.map(|_| source.max(data.required_source));
                data.is_required = value;
            }
            for property in properties {
                // Key properties stay required
                if !value && !b.model.containing_keys(property).is_empty() {
                    continue;
                }
                b.property_is_required(property, required, source)?;
            }
            Ok(true)
        })
    }

    pub fn foreign_key_is_unique(
        &mut self,
        fk: ForeignKeyId,
        unique: Option<bool>,
        source: ConfigurationSource,
    ) -> ModelResult<bool> {
        let data = self.foreign_key_data(fk)?;
        let value = unique.unwrap_or(false);
        if data.is_unique != value && !source.overrides(data.unique_source) {
            self.reject("foreign_key_is_unique", fk, source);
            return Ok(false);
        }
        if let Some(data) = self.model.foreign_key_mut(fk) {
            data.unique_source = unique.map(|_| source.max(data.unique_source));
            data.is_unique = value;
        }
        Ok(true)
    }

    /// Mark the foreign key as the ownership of its dependent. A dependent
    /// has at most one ownership.
    pub fn foreign_key_is_ownership(
        &mut self,
        fk: ForeignKeyId,
        ownership: bool,
        source: ConfigurationSource,
    ) -> ModelResult<bool> {
        let data = self.foreign_key_data(fk)?;
        if data.is_ownership == ownership {
            let upgraded = Some(source.max(data.ownership_source));
            self.set_ownership_raw(fk, ownership, upgraded)?;
            return Ok(true);
        }
        if !source.overrides(data.ownership_source) {
            self.reject("foreign_key_is_ownership", fk, source);
            return Ok(false);
        }
        let other = self
            .model
            .find_ownership(data.dependent)
            .filter(|other| *other != fk && ownership);
        if let Some(other) = other {
            let other_source = self.foreign_key_data(other)?.ownership_source;
            if !source.overrides(other_source) {
                self.reject("foreign_key_is_ownership", fk, source);
                return Ok(false);
            }
        }

        self.batched_flag(|b| {
            if let Some(other) = other {
                b.set_ownership_raw(other, false, None)?;
            }
            b.set_ownership_raw(fk, ownership, Some(source))?;
            Ok(true)
        })
    }

    pub fn foreign_key_on_delete(
        &mut self,
        fk: ForeignKeyId,
        behavior: Option<DeleteBehavior>,
        source: ConfigurationSource,
    ) -> ModelResult<bool> {
        let data = self.foreign_key_data(fk)?;
        let value = behavior.unwrap_or_default();
        if data.delete_behavior != value && !source.overrides(data.delete_behavior_source) {
            self.reject("foreign_key_on_delete", fk, source);
            return Ok(false);
        }
        if let Some(data) = self.model.foreign_key_mut(fk) {
            data.delete_behavior_source = behavior.map(|_| source.max(data.delete_behavior_source));
            data.delete_behavior = value;
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use crate::{BuilderConfig, ModelBuilder};
    use keystone_core::{ConfigurationSource, EntityTypeId, ModelError, PropertyType, ScalarType};
    use keystone_metadata::{DeleteBehavior, RecordCatalog};

    use ConfigurationSource::*;

    fn session() -> ModelBuilder {
        ModelBuilder::new(RecordCatalog::empty(), BuilderConfig::minimal()).unwrap()
    }

    fn int() -> Option<PropertyType> {
        Some(PropertyType::new(ScalarType::Int32))
    }

    fn blog_and_post(mb: &mut ModelBuilder) -> (EntityTypeId, EntityTypeId) {
        let blog = mb.entity("Blog", Explicit).unwrap().unwrap();
        let id = mb.property(blog, "Id", int(), Explicit).unwrap().unwrap();
        mb.primary_key(blog, &[id], Explicit).unwrap();
        let post = mb.entity("Post", Explicit).unwrap().unwrap();
        (blog, post)
    }

    // ========== TEST: navigation_renamed_and_cleared ==========
    #[test]
    fn test_navigation_renamed_and_cleared() {
        let mut mb = session();
        let (blog, post) = blog_and_post(&mut mb);
        let fk = mb
            .has_relationship(post, blog, Some("Blog"), None, None, Convention)
            .unwrap()
            .unwrap();

        mb.has_navigation(fk, Some("Owner"), true, DataAnnotation)
            .unwrap();
        assert_eq!(
            mb.model().foreign_key(fk).unwrap().dependent_to_principal.as_ref().unwrap().name,
            "Owner"
        );

        assert_eq!(mb.has_navigation(fk, None, true, Convention).unwrap(), None);
        mb.has_navigation(fk, None, true, Explicit).unwrap();
        assert!(mb.model().foreign_key(fk).unwrap().dependent_to_principal.is_none());
    }

    // ========== TEST: navigation_over_explicit_property_errors ==========
    #[test]
    fn test_navigation_over_explicit_property_errors() {
        let mut mb = session();
        let (blog, post) = blog_and_post(&mut mb);
        mb.property(post, "Blog", int(), Explicit).unwrap();
        let fk = mb
            .has_relationship(post, blog, None, None, None, Explicit)
            .unwrap()
            .unwrap();

        let result = mb.has_navigation(fk, Some("Blog"), true, Explicit);

        assert!(matches!(result, Err(ModelError::ConflictingMember { .. })));
    }

    // ========== TEST: entity_types_inverted ==========
    #[test]
    fn test_entity_types_inverted() {
        // GIVEN Post depending on Blog
        let mut mb = session();
        let (blog, post) = blog_and_post(&mut mb);
        let post_id = mb.property(post, "Id", int(), Explicit).unwrap().unwrap();
        mb.primary_key(post, &[post_id], Explicit).unwrap();
        let fk = mb
            .has_relationship(post, blog, Some("Blog"), Some("Posts"), None, Convention)
            .unwrap()
            .unwrap();

        // WHEN the ends are swapped
        let inverted = mb
            .has_entity_types(fk, post, blog, Explicit)
            .unwrap()
            .unwrap();

        // THEN the navigations swap with them
        let data = mb.model().foreign_key(inverted).unwrap();
        assert_eq!(data.dependent, blog);
        assert_eq!(data.principal, post);
        assert_eq!(data.dependent_to_principal.as_ref().unwrap().name, "Posts");
        assert_eq!(data.principal_to_dependent.as_ref().unwrap().name, "Blog");
        assert_eq!(data.principal_end_source, Some(Explicit));
        assert_eq!(mb.model().foreign_keys().count(), 1);
    }

    // ========== TEST: pinned_properties_replace_shadow ==========
    #[test]
    fn test_pinned_properties_replace_shadow() {
        let mut mb = session();
        let (blog, post) = blog_and_post(&mut mb);
        let fk = mb
            .has_relationship(post, blog, Some("Blog"), None, None, Convention)
            .unwrap()
            .unwrap();
        let shadow = mb.model().foreign_key(fk).unwrap().properties.clone();
        let blog_ref = mb.property(post, "BlogRef", int(), Explicit).unwrap().unwrap();

        mb.has_foreign_key(fk, Some(vec![blog_ref]), DataAnnotation)
            .unwrap();

        let data = mb.model().foreign_key(fk).unwrap();
        assert_eq!(data.properties, vec![blog_ref]);
        assert_eq!(data.properties_source, Some(DataAnnotation));
        assert!(mb.model().property(shadow[0]).is_none());
        assert_eq!(mb.has_foreign_key(fk, None, Convention).unwrap(), None);
    }

    // ========== TEST: principal_key_pinned_and_reset ==========
    #[test]
    fn test_principal_key_pinned_and_reset() {
        let mut mb = session();
        let (blog, post) = blog_and_post(&mut mb);
        let code = mb.property(blog, "Code", int(), Explicit).unwrap().unwrap();
        let fk = mb
            .has_relationship(post, blog, Some("Blog"), None, None, Convention)
            .unwrap()
            .unwrap();

        mb.has_principal_key(fk, Some(&[code]), Explicit).unwrap();
        let key = mb.model().foreign_key(fk).unwrap().principal_key;
        assert_eq!(mb.model().key(key).unwrap().properties, vec![code]);

        mb.has_principal_key(fk, None, Explicit).unwrap();
        let data = mb.model().foreign_key(fk).unwrap();
        assert_eq!(Some(data.principal_key), mb.model().find_primary_key(blog));
        assert!(mb.model().key(key).is_none());
    }

    // ========== TEST: required_flag_drives_nullability ==========
    #[test]
    fn test_required_flag_drives_nullability() {
        let mut mb = session();
        let (blog, post) = blog_and_post(&mut mb);
        let fk = mb
            .has_relationship(post, blog, Some("Blog"), None, None, Convention)
            .unwrap()
            .unwrap();
        let property = mb.model().foreign_key(fk).unwrap().properties[0];

        assert!(mb.foreign_key_is_required(fk, Some(true), DataAnnotation).unwrap());
        assert!(!mb.model().property(property).unwrap().is_nullable);

        assert!(!mb.foreign_key_is_required(fk, Some(false), Convention).unwrap());
        assert!(mb.foreign_key_is_required(fk, Some(false), Explicit).unwrap());
        assert!(mb.model().property(property).unwrap().is_nullable);
    }

    // ========== TEST: delete_behavior_precedence ==========
    #[test]
    fn test_delete_behavior_precedence() {
        let mut mb = session();
        let (blog, post) = blog_and_post(&mut mb);
        let fk = mb
            .has_relationship(post, blog, None, None, None, Convention)
            .unwrap()
            .unwrap();

        assert!(mb.foreign_key_on_delete(fk, Some(DeleteBehavior::Cascade), DataAnnotation).unwrap());
        assert!(!mb.foreign_key_on_delete(fk, Some(DeleteBehavior::Restrict), Convention).unwrap());

        let data = mb.model().foreign_key(fk).unwrap();
        assert_eq!(data.delete_behavior, DeleteBehavior::Cascade);
        assert_eq!(data.delete_behavior_source, Some(DataAnnotation));
    }

    // ========== TEST: reuniquify_after_name_freed ==========
    #[test]
    fn test_reuniquify_after_name_freed() {
        let mut mb = session();
        let (blog, post) = blog_and_post(&mut mb);
        let taken = mb.property(post, "BlogId", int(), Explicit).unwrap().unwrap();
        let fk = mb
            .has_relationship(post, blog, None, None, None, Convention)
            .unwrap()
            .unwrap();
        assert_eq!(
            mb.model().property_names(&mb.model().foreign_key(fk).unwrap().properties),
            vec!["BlogId1"]
        );
        assert!(!mb.should_reuniquify_temporary_properties(fk).unwrap());

        mb.has_no_property(taken, Explicit).unwrap();

        assert!(mb.should_reuniquify_temporary_properties(fk).unwrap());
    }

    // ========== TEST: reuniquify_after_type_drift ==========
    #[test]
    fn test_reuniquify_after_type_drift() {
        // GIVEN an optional relationship with a nullable shadow BlogId
        let mut mb = session();
        let (blog, post) = blog_and_post(&mut mb);
        let fk = mb
            .has_relationship(post, blog, None, None, None, Convention)
            .unwrap()
            .unwrap();
        let blog_id = mb.model().foreign_key(fk).unwrap().properties[0];
        assert!(mb.model().property(blog_id).unwrap().ty.is_nullable());
        assert!(!mb.should_reuniquify_temporary_properties(fk).unwrap());

        // WHEN the relationship becomes required
        mb.foreign_key_is_required(fk, Some(true), Explicit).unwrap();

        // THEN the name still fits but the nullable type does not
        assert!(mb.model().property(blog_id).unwrap().ty.is_nullable());
        assert!(mb.should_reuniquify_temporary_properties(fk).unwrap());
    }
}
