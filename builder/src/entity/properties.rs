//! Scalar properties.

use crate::detach::PropertiesSnapshot;
use crate::model_builder::ModelBuilder;
use keystone_core::{
    ConfigurationSource, EntityTypeId, ModelError, ModelResult, PropertyId, PropertyType,
    ScalarType,
};
use keystone_metadata::{MemberRef, MemberType};

impl ModelBuilder {
    /// Find or add the property `name`.
    ///
    /// Without a type the backing record member decides it.
    pub fn property(
        &mut self,
        entity: EntityTypeId,
        name: &str,
        ty: Option<PropertyType>,
        source: ConfigurationSource,
    ) -> ModelResult<Option<PropertyId>> {
        self.property_with(entity, name, ty, ty.map(|_| source), source)
    }

    pub(crate) fn property_with(
        &mut self,
        entity: EntityTypeId,
        name: &str,
        ty: Option<PropertyType>,
        type_source: Option<ConfigurationSource>,
        source: ConfigurationSource,
    ) -> ModelResult<Option<PropertyId>> {
        self.check_member_name(name)?;
        let entity_name = self.entity_data(entity)?.name.clone();

        if let Some(existing) = self.model.find_property(entity, name) {
            return self.update_property(entity, existing, ty, type_source, source);
        }

        if self.is_ignored(entity, name, source) {
            self.reject("property", format!("{}.{}", entity_name, name), source);
            return Ok(None);
        }

        // Members of another kind under the same name must give way
        let conflicts: Vec<MemberRef> = self
            .model
            .find_members_in_hierarchy(entity, name)
            .into_iter()
            .filter(|m| !matches!(m, MemberRef::Property(_)))
            .collect();
        for conflict in &conflicts {
            let conflict_source = self.model.member_source(*conflict);
            if let MemberRef::Navigation(_) = conflict {
                if conflict_source == Some(ConfigurationSource::Explicit)
                    && source == ConfigurationSource::Explicit
                {
                    return Err(ModelError::property_called_on_navigation(&entity_name, name));
                }
            }
            if !source.overrides(conflict_source) {
                self.reject("property", format!("{}.{}", entity_name, name), source);
                return Ok(None);
            }
        }

        let (ty, type_source) = match ty {
            Some(ty) => (ty, type_source),
            None => match self.model.record_member(entity, name).map(|m| &m.ty) {
                Some(MemberType::Scalar(ty)) => (*ty, Some(ConfigurationSource::Explicit)),
                _ => return Err(ModelError::no_property_type(&entity_name, name)),
            },
        };
        let derived = self.model.find_derived_properties(entity, name);

        self.batched(|b| {
            b.model.remove_ignored(entity, name)?;
            let snapshot = b.detach_properties(&derived)?;
            b.evict_conflicting_members(&conflicts, source)?;

            let property = b.add_property_raw(entity, name, ty, type_source, source)?;
            tracing::debug!(
                target: "keystone::builder",
                entity = %entity_name,
                property = name,
                %ty,
                %source,
                "property added"
            );
            b.attach_properties(&snapshot)?;
            Ok(Some(property))
        })
    }

    fn update_property(
        &mut self,
        entity: EntityTypeId,
        existing: PropertyId,
        ty: Option<PropertyType>,
        type_source: Option<ConfigurationSource>,
        source: ConfigurationSource,
    ) -> ModelResult<Option<PropertyId>> {
        let data = self.property_data(existing)?.clone();
        if data.entity != entity && !self.is_ignored(entity, &data.name, source) {
            self.model.remove_ignored(entity, &data.name)?;
        }

        let compatible = ty.map_or(true, |ty| ty.is_compatible_with(&data.ty));
        if compatible {
            let property = self
                .model
                .property_mut(existing)
                .ok_or_else(|| ModelError::orphaned(existing))?;
            property.source = source.max(Some(property.source));
            if let (Some(ty), Some(new_source)) = (ty, type_source) {
                if ty == property.ty {
                    property.type_source = Some(new_source.max(property.type_source));
                } else if new_source.overrides(property.type_source) {
                    property.ty = ty;
                    property.type_source = Some(new_source);
                    if property.nullable_source.is_none() {
                        property.is_nullable = ty.is_nullable();
                    }
                }
            }
            return Ok(Some(existing));
        }

        let Some(ty) = ty else {
            return Ok(Some(existing));
        };
        let replaceable = source.overrides(Some(data.source))
            && type_source.is_some_and(|s| s.overrides(data.type_source));
        if !replaceable {
            self.reject("property", format!("{}: {}", data.name, ty), source);
            return Ok(None);
        }

        self.batched(|b| {
            let mut snapshot = b.detach_properties(&[existing])?;
            snapshot.properties.clear();
            let property = b.add_property_raw(
                data.entity,
                &data.name,
                ty,
                type_source,
                source.max(Some(data.source)),
            )?;
            tracing::debug!(
                target: "keystone::builder",
                property = %data.name,
                old = %data.ty,
                new = %ty,
                "property type replaced"
            );
            b.attach_properties(&snapshot)?;
            Ok(Some(property))
        })
    }

    /// Remove members of other kinds that hold the name of a new property.
    fn evict_conflicting_members(
        &mut self,
        conflicts: &[MemberRef],
        source: ConfigurationSource,
    ) -> ModelResult<()> {
        for conflict in conflicts {
            match *conflict {
                MemberRef::Navigation(navigation) => {
                    let Some(fk) = self.model.foreign_key(navigation.foreign_key) else {
                        continue;
                    };
                    if fk.source == ConfigurationSource::Convention {
                        self.remove_relationship_internal(navigation.foreign_key)?;
                    } else {
                        self.has_navigation(
                            navigation.foreign_key,
                            None,
                            navigation.on_dependent,
                            source,
                        )?;
                    }
                }
                MemberRef::SkipNavigation(skip) => self.remove_skip_navigation_pair(skip)?,
                MemberRef::ServiceProperty(service) => {
                    if self.model.service_property(service).is_some() {
                        self.remove_service_property_raw(service)?;
                    }
                }
                MemberRef::Property(_) => {}
            }
        }
        Ok(())
    }

    /// Remove a declared property.
    pub fn has_no_property(&mut self, property: PropertyId, source: ConfigurationSource) -> ModelResult<bool> {
        let data = self.property_data(property)?;
        if !source.overrides(Some(data.source)) {
            self.reject("has_no_property", &data.name, source);
            return Ok(false);
        }
        self.batched_flag(|b| b.remove_property_internal(property, source, true))
    }

    /// Remove a property with the keys and indexes over it. Foreign keys
    /// over it are reattached with new properties.
    pub(crate) fn remove_property_internal(
        &mut self,
        property: PropertyId,
        source: ConfigurationSource,
        can_override_same_source: bool,
    ) -> ModelResult<bool> {
        let Some(data) = self.model.property(property) else {
            return Ok(true);
        };
        let allowed = if can_override_same_source {
            source.overrides(Some(data.source))
        } else {
            source.overrides_strictly(Some(data.source))
        };
        if !allowed {
            self.reject("has_no_property", &data.name, source);
            return Ok(false);
        }

        let mut detached = PropertiesSnapshot::default();
        for fk in self.model.containing_foreign_keys(property) {
            if self.model.foreign_key(fk).is_some() {
                detached.foreign_keys.push(self.detach_foreign_key(fk)?);
            }
        }
        for key in self.model.containing_keys(property) {
            let Some(entity) = self.model.key(key).map(|k| k.entity) else {
                continue;
            };
            for fk in self.model.referencing_foreign_keys(key) {
                if self.model.foreign_key(fk).is_some() {
                    detached.foreign_keys.push(self.detach_foreign_key(fk)?);
                }
            }
            if self.model.find_primary_key(entity) == Some(key) {
                self.set_primary_key_raw(entity, None, None)?;
            }
            self.remove_key_raw(key)?;
        }
        for index in self.model.containing_indexes(property) {
            if self.model.index(index).is_some() {
                self.remove_index_raw(index)?;
            }
        }
        if self.model.property(property).is_some() {
            self.remove_property_raw(property)?;
        }

        for fk in &detached.foreign_keys {
            self.attach_foreign_key(fk)?;
        }
        Ok(true)
    }

    // ==================== Property Resolution ====================

    /// Resolve each name to a property, creating missing ones.
    ///
    /// New properties take the type of the matching `referenced` property,
    /// else the backing record member, else `int32` when
    /// `use_default_type` is set.
    pub fn get_or_create_properties(
        &mut self,
        entity: EntityTypeId,
        names: &[String],
        source: ConfigurationSource,
        referenced: Option<&[PropertyId]>,
        required: bool,
        use_default_type: bool,
    ) -> ModelResult<Option<Vec<PropertyId>>> {
        let mut properties = Vec::with_capacity(names.len());
        for (i, name) in names.iter().enumerate() {
            let existing = self.model.find_property(entity, name);
            let property = match existing {
                Some(_) => self.property_with(entity, name, None, None, source)?,
                None => {
                    let referenced_type = referenced
                        .and_then(|r| r.get(i))
                        .and_then(|p| self.model.property(*p))
                        .map(|p| p.ty.make_nullable(!required));
                    let has_record_type = matches!(
                        self.model.record_member(entity, name).map(|m| &m.ty),
                        Some(MemberType::Scalar(_))
                    );
                    let ty = referenced_type.or_else(|| {
                        (use_default_type && !has_record_type).then(|| {
                            PropertyType::new(ScalarType::Int32).make_nullable(!required)
                        })
                    });
                    self.property_with(entity, name, ty, None, source)?
                }
            };
            let Some(property) = property else {
                return Ok(None);
            };
            properties.push(property);
        }

        if required {
            for property in &properties {
                self.property_is_required(*property, Some(true), source)?;
            }
        }
        Ok(Some(properties))
    }

    /// Re-resolve property ids against the entity type's hierarchy.
    ///
    /// A live property of another hierarchy is looked up by name; a removed
    /// one cannot be resolved.
    pub fn get_actual_properties(
        &self,
        entity: EntityTypeId,
        properties: &[PropertyId],
    ) -> ModelResult<Option<Vec<PropertyId>>> {
        self.entity_data(entity)?;
        let chain = self.model.base_chain(entity);
        Ok(properties
            .iter()
            .map(|p| {
                let data = self.model.property(*p)?;
                if chain.contains(&data.entity) {
                    Some(*p)
                } else {
                    self.model.find_property(entity, &data.name)
                }
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use crate::{BuilderConfig, ModelBuilder};
    use keystone_core::{ConfigurationSource, ModelError, PropertyType, ScalarType};
    use keystone_metadata::{CatalogBuilder, RecordCatalog};

    use ConfigurationSource::*;

    fn session() -> ModelBuilder {
        ModelBuilder::new(RecordCatalog::empty(), BuilderConfig::minimal()).unwrap()
    }

    fn ty(scalar: ScalarType) -> Option<PropertyType> {
        Some(PropertyType::new(scalar))
    }

    // ========== TEST: existing_property_upgraded ==========
    #[test]
    fn test_existing_property_upgraded() {
        // GIVEN a convention property
        let mut mb = session();
        let blog = mb.entity("Blog", Explicit).unwrap().unwrap();
        let name = mb.property(blog, "Name", ty(ScalarType::String), Convention).unwrap().unwrap();

        // WHEN it is configured again explicitly without a type
        let again = mb.property(blog, "Name", None, Explicit).unwrap();

        // THEN the same property is returned with the stronger source
        assert_eq!(again, Some(name));
        assert_eq!(mb.model().property(name).unwrap().source, Explicit);
    }

    // ========== TEST: incompatible_type_replaced ==========
    #[test]
    fn test_incompatible_type_replaced() {
        let mut mb = session();
        let blog = mb.entity("Blog", Explicit).unwrap().unwrap();
        let old = mb.property(blog, "Rating", ty(ScalarType::Int32), Convention).unwrap().unwrap();

        let new = mb.property(blog, "Rating", ty(ScalarType::Float64), Explicit).unwrap().unwrap();

        assert_ne!(old, new);
        assert!(mb.model().property(old).is_none());
        assert_eq!(mb.model().property(new).unwrap().ty.scalar, ScalarType::Float64);
    }

    // ========== TEST: incompatible_type_weaker_rejected ==========
    #[test]
    fn test_incompatible_type_weaker_rejected() {
        let mut mb = session();
        let blog = mb.entity("Blog", Explicit).unwrap().unwrap();
        let old = mb.property(blog, "Rating", ty(ScalarType::Int32), Explicit).unwrap().unwrap();

        let result = mb.property(blog, "Rating", ty(ScalarType::Float64), Convention).unwrap();

        assert_eq!(result, None);
        assert_eq!(mb.model().property(old).unwrap().ty.scalar, ScalarType::Int32);
    }

    // ========== TEST: missing_type_is_error ==========
    #[test]
    fn test_missing_type_is_error() {
        let mut mb = session();
        let blog = mb.entity("Blog", Explicit).unwrap().unwrap();

        let result = mb.property(blog, "Name", None, Explicit);

        assert!(matches!(result, Err(ModelError::NoPropertyType { .. })));
    }

    // ========== TEST: type_from_record_member ==========
    #[test]
    fn test_type_from_record_member() {
        let mut catalog = CatalogBuilder::new();
        catalog.add_record("Blog").scalar("Url", ScalarType::String).done().unwrap();
        let mut mb = ModelBuilder::new(catalog.build().unwrap(), BuilderConfig::minimal()).unwrap();
        let blog = mb.entity("Blog", Explicit).unwrap().unwrap();

        let url = mb.property(blog, "Url", None, Convention).unwrap().unwrap();

        let property = mb.model().property(url).unwrap();
        assert_eq!(property.ty.scalar, ScalarType::String);
        assert!(!property.is_shadow);
    }

    // ========== TEST: ignored_name_rejects_weaker_property ==========
    #[test]
    fn test_ignored_name_rejects_weaker_property() {
        let mut mb = session();
        let blog = mb.entity("Blog", Explicit).unwrap().unwrap();
        mb.ignore(blog, "Secret", DataAnnotation).unwrap();

        assert_eq!(mb.property(blog, "Secret", ty(ScalarType::String), Convention).unwrap(), None);
        assert!(mb.property(blog, "Secret", ty(ScalarType::String), Explicit).unwrap().is_some());
        assert_eq!(mb.model().find_declared_ignored_source(blog, "Secret"), None);
    }

    // ========== TEST: derived_property_merged_upward ==========
    #[test]
    fn test_derived_property_merged_upward() {
        // GIVEN Derived : Base where Derived declares Name with an index
        let mut mb = session();
        let base = mb.entity("Base", Explicit).unwrap().unwrap();
        let derived = mb.entity("Derived", Explicit).unwrap().unwrap();
        mb.has_base_type(derived, Some(base), Explicit).unwrap();
        let name = mb.property(derived, "Name", ty(ScalarType::String), Explicit).unwrap().unwrap();
        mb.has_index(derived, &[name], Explicit).unwrap().unwrap();

        // WHEN Base declares Name
        let lifted = mb.property(base, "Name", ty(ScalarType::String), Explicit).unwrap().unwrap();

        // THEN the derived property is gone and its index now uses the base one
        assert!(mb.model().property(name).is_none());
        assert_eq!(mb.model().find_property(derived, "Name"), Some(lifted));
        let index = mb.model().entity_type(derived).unwrap().indexes[0];
        assert_eq!(mb.model().index(index).unwrap().properties, vec![lifted]);
    }

    // ========== TEST: remove_property_drops_key ==========
    #[test]
    fn test_remove_property_drops_key() {
        let mut mb = session();
        let blog = mb.entity("Blog", Explicit).unwrap().unwrap();
        let code = mb.property(blog, "Code", ty(ScalarType::Int32), Convention).unwrap().unwrap();
        let key = mb.has_key(blog, &[code], Convention).unwrap().unwrap();

        assert!(mb.has_no_property(code, Explicit).unwrap());

        assert!(mb.model().key(key).is_none());
        assert!(mb.model().property(code).is_none());
    }
}
