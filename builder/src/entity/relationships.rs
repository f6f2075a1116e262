//! Relationships between entity types.
//!
//! `entity` is the dependent side throughout: `navigation` is declared on it
//! and points at the principal, `inverse` is declared on the principal.

use crate::model_builder::ModelBuilder;
use crate::unique::next_unique_name;
use keystone_core::{
    ConfigurationSource, EntityTypeId, ForeignKeyId, KeyId, ModelResult, PropertyId,
    PropertyType, ScalarType,
};
use keystone_metadata::{ForeignKey, MemberType};

impl ModelBuilder {
    /// Find or create the relationship between `entity` and `target`.
    ///
    /// `target_is_principal` forces the orientation; `Some(false)` makes
    /// `target` the dependent. Without it the orientation is inferred from
    /// the backing record members of the navigations.
    pub fn has_relationship(
        &mut self,
        entity: EntityTypeId,
        target: EntityTypeId,
        navigation: Option<&str>,
        inverse: Option<&str>,
        target_is_principal: Option<bool>,
        source: ConfigurationSource,
    ) -> ModelResult<Option<ForeignKeyId>> {
        self.entity_data(entity)?;
        self.entity_data(target)?;

        if target_is_principal == Some(false) {
            return self.has_relationship(target, entity, inverse, navigation, Some(true), source);
        }

        if let Some(fk) = self.find_candidate(entity, target, navigation, inverse) {
            return self.reuse_relationship(fk, navigation, inverse, target_is_principal, source);
        }
        if target_is_principal.is_none() {
            if let Some(fk) = self.find_candidate(target, entity, inverse, navigation) {
                return self.reuse_relationship(fk, inverse, navigation, None, source);
            }
        }

        // Inferred inversion leaves the principal end unconfigured
        if target_is_principal.is_none() && self.navigation_points_at_many(entity, target, navigation, inverse) {
            return self.has_relationship(target, entity, inverse, navigation, None, source);
        }

        let fk = self.batched(|b| {
            let Some(fk) = b.create_foreign_key(entity, target, None, None, navigation, false, source)?
            else {
                return Ok(None);
            };
            if target_is_principal.is_some() {
                if let Some(data) = b.model.foreign_key_mut(fk) {
                    data.principal_end_source = Some(source);
                }
            }
            let wired = match b.has_navigations(fk, navigation, inverse, source) {
                Ok(outcome) => outcome.is_some() && b.navigations_match(fk, navigation, inverse),
                Err(err) => {
                    b.remove_relationship_internal(fk)?;
                    return Err(err);
                }
            };
            if !wired {
                b.remove_relationship_internal(fk)?;
                return Ok(None);
            }
            Ok(Some(fk))
        })?;

        if let Some(fk) = fk {
            tracing::debug!(
                target: "keystone::builder",
                dependent = %self.model.entity_name(entity),
                principal = %self.model.entity_name(target),
                foreign_key = %fk,
                %source,
                "relationship added"
            );
        }
        Ok(fk)
    }

    /// Whether the navigation on `entity` can only be read with `entity` as
    /// the principal: a collection, or a reference to a record `target`
    /// cannot be assigned to.
    fn navigation_points_at_many(
        &self,
        entity: EntityTypeId,
        target: EntityTypeId,
        navigation: Option<&str>,
        inverse: Option<&str>,
    ) -> bool {
        let (Some(navigation), None) = (navigation, inverse) else {
            return false;
        };
        let Some(member) = self.model.record_member(entity, navigation) else {
            return false;
        };
        match &member.ty {
            MemberType::Collection(_) => true,
            MemberType::Reference(record) => self
                .model
                .entity_type(target)
                .and_then(|t| t.record.as_deref())
                .is_some_and(|target_record| !self.model.catalog().is_assignable(record, target_record)),
            _ => false,
        }
    }

    /// An existing foreign key from `dependent` to `principal` that agrees
    /// with the requested navigation names, preferring exact name matches.
    fn find_candidate(
        &self,
        dependent: EntityTypeId,
        principal: EntityTypeId,
        navigation: Option<&str>,
        inverse: Option<&str>,
    ) -> Option<ForeignKeyId> {
        let agrees = |requested: Option<&str>, existing: Option<&str>| match (requested, existing) {
            (Some(requested), Some(existing)) => requested == existing,
            _ => true,
        };
        self.model
            .foreign_keys()
            .filter(|fk| {
                self.model.is_assignable_from(fk.dependent, dependent)
                    && self.model.in_same_hierarchy(fk.principal, principal)
            })
            .filter_map(|fk| {
                let dependent_name = fk.dependent_to_principal.as_ref().map(|n| n.name.as_str());
                let principal_name = fk.principal_to_dependent.as_ref().map(|n| n.name.as_str());
                if !agrees(navigation, dependent_name) || !agrees(inverse, principal_name) {
                    return None;
                }
                let exact = usize::from(navigation.is_some() && navigation == dependent_name)
                    + usize::from(inverse.is_some() && inverse == principal_name);
                let unnavigated = dependent_name.is_none() && principal_name.is_none();
                (exact > 0 || unnavigated).then_some((exact, fk.id))
            })
            .max_by_key(|(exact, id)| (*exact, std::cmp::Reverse(*id)))
            .map(|(_, id)| id)
    }

    fn reuse_relationship(
        &mut self,
        fk: ForeignKeyId,
        navigation: Option<&str>,
        inverse: Option<&str>,
        target_is_principal: Option<bool>,
        source: ConfigurationSource,
    ) -> ModelResult<Option<ForeignKeyId>> {
        self.batched(|b| {
            if b.has_navigations(fk, navigation, inverse, source)?.is_none() {
                return Ok(None);
            }
            if let Some(data) = b.model.foreign_key_mut(fk) {
                data.source = source.max(Some(data.source));
                if target_is_principal.is_some() {
                    data.principal_end_source = Some(source.max(data.principal_end_source));
                }
            }
            Ok(Some(fk))
        })
    }

    fn navigations_match(&self, fk: ForeignKeyId, navigation: Option<&str>, inverse: Option<&str>) -> bool {
        let Some(data) = self.model.foreign_key(fk) else {
            return false;
        };
        let named = |requested: Option<&str>, on_dependent: bool| {
            requested.map_or(true, |name| {
                data.navigation(on_dependent).is_some_and(|n| n.name == name)
            })
        };
        named(navigation, true) && named(inverse, false)
    }

    /// Create a foreign key from `dependent` to `principal`.
    ///
    /// Without a principal key the primary key is used when it can take the
    /// dependent properties, otherwise a temporary key is synthesized.
    /// Without dependent properties, shadow properties mirroring the
    /// principal key are created and named after the navigation.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn create_foreign_key(
        &mut self,
        dependent: EntityTypeId,
        principal: EntityTypeId,
        properties: Option<Vec<PropertyId>>,
        principal_key: Option<KeyId>,
        navigation_hint: Option<&str>,
        required: bool,
        source: ConfigurationSource,
    ) -> ModelResult<Option<ForeignKeyId>> {
        let principal_key_source = principal_key.map(|_| source);
        let principal_key = match principal_key {
            Some(key) => key,
            None => {
                let primary = self
                    .model
                    .find_primary_key(principal)
                    .filter(|key| self.key_accepts(*key, properties.as_deref()));
                match primary {
                    Some(key) => key,
                    None => match self.create_temporary_key(principal, properties.as_deref())? {
                        Some(key) => key,
                        None => return Ok(None),
                    },
                }
            }
        };

        let synthesized = properties.is_none();
        let properties = match properties {
            Some(properties) => properties,
            None => {
                let base_name = match navigation_hint {
                    Some(navigation) => navigation.to_string(),
                    None => self.entity_data(principal)?.short_name().to_string(),
                };
                let key_properties = self.key_data(principal_key)?.properties.clone();
                match self.create_unique_properties(dependent, &base_name, &key_properties, required)? {
                    Some(properties) => properties,
                    None => return Ok(None),
                }
            }
        };

        let component_source = (!synthesized).then_some(source);
        let fk = self.add_foreign_key_raw(
            dependent,
            properties,
            principal,
            principal_key,
            component_source,
            source,
        )?;
        if let Some(data) = self.model.foreign_key_mut(fk) {
            data.principal_key_source = principal_key_source;
            data.is_required = required;
        }
        debug_assert!(self
            .model
            .foreign_key(fk)
            .is_some_and(|fk| self.model.key(fk.principal_key).is_some()));
        Ok(Some(fk))
    }

    /// Whether the key could back a foreign key over `properties`.
    pub(crate) fn key_accepts(&self, key: KeyId, properties: Option<&[PropertyId]>) -> bool {
        let Some(properties) = properties else {
            return true;
        };
        let Some(key) = self.model.key(key) else {
            return false;
        };
        key.properties.len() == properties.len()
            && key.properties.iter().zip(properties).all(|(k, p)| {
                match (self.model.property(*k), self.model.property(*p)) {
                    (Some(k), Some(p)) => p.ty.is_compatible_with(&k.ty),
                    _ => false,
                }
            })
    }

    /// Add a Convention key of fresh shadow properties on the principal's
    /// root, typed after `dependent_properties` or a single int.
    pub(crate) fn create_temporary_key(
        &mut self,
        principal: EntityTypeId,
        dependent_properties: Option<&[PropertyId]>,
    ) -> ModelResult<Option<KeyId>> {
        let root = self.model.root_type(principal);
        let types: Vec<PropertyType> = match dependent_properties {
            Some(properties) => properties
                .iter()
                .map(|p| self.property_data(*p).map(|p| p.ty.make_nullable(false)))
                .collect::<ModelResult<_>>()?,
            None => vec![PropertyType::new(ScalarType::Int32)],
        };

        let base_name = self.config.temporary_key_name.clone();
        let mut properties = Vec::with_capacity(types.len());
        for ty in types {
            let name = next_unique_name(&base_name, |n| self.is_name_taken(root, n));
            match self.property_with(root, &name, Some(ty), None, ConfigurationSource::Convention)? {
                Some(property) => properties.push(property),
                None => {
                    self.remove_unused_implicit_properties(&properties)?;
                    return Ok(None);
                }
            }
        }
        let key = self.has_key_internal(root, &properties, ConfigurationSource::Convention)?;
        if key.is_none() {
            self.remove_unused_implicit_properties(&properties)?;
        }
        Ok(key)
    }

    /// Find or create a relationship over explicit dependent properties and,
    /// optionally, an explicit principal key.
    pub fn has_relationship_with_properties(
        &mut self,
        dependent: EntityTypeId,
        principal: EntityTypeId,
        properties: &[PropertyId],
        principal_key: Option<&[PropertyId]>,
        source: ConfigurationSource,
    ) -> ModelResult<Option<ForeignKeyId>> {
        let Some(properties) = self.get_actual_properties(dependent, properties)? else {
            return Ok(None);
        };
        let existing = self
            .model
            .declared_foreign_keys(dependent)
            .into_iter()
            .find(|fk| {
                self.model
                    .foreign_key(*fk)
                    .is_some_and(|fk| fk.principal == principal && fk.properties == properties)
            });

        self.batched(|b| {
            let key = match principal_key {
                Some(key_properties) => {
                    let root = b.model.root_type(principal);
                    match b.has_key_internal(root, key_properties, source)? {
                        Some(key) => Some(key),
                        None => return Ok(None),
                    }
                }
                None => None,
            };

            let fk = match existing {
                Some(fk) => {
                    if let Some(key) = key {
                        let current = b.foreign_key_data(fk)?;
                        if current.principal_key != key {
                            if !source.overrides(current.principal_key_source) {
                                return Ok(None);
                            }
                            let properties_source = current.properties_source;
                            b.model.set_foreign_key_properties(
                                fk,
                                properties.clone(),
                                key,
                                properties_source,
                                Some(source),
                            )?;
                        }
                    }
                    fk
                }
                None => match b.create_foreign_key(
                    dependent,
                    principal,
                    Some(properties.clone()),
                    key,
                    None,
                    false,
                    source,
                )? {
                    Some(fk) => fk,
                    None => return Ok(None),
                },
            };

            if let Some(data) = b.model.foreign_key_mut(fk) {
                data.source = source.max(Some(data.source));
                data.properties_source = Some(source.max(data.properties_source));
                if key.is_some() {
                    data.principal_key_source = Some(source.max(data.principal_key_source));
                }
            }
            Ok(Some(fk))
        })
    }

    /// Remove a relationship.
    pub fn has_no_relationship(&mut self, fk: ForeignKeyId, source: ConfigurationSource) -> ModelResult<bool> {
        let current = self.foreign_key_data(fk)?.source;
        if !source.overrides(Some(current)) {
            self.reject("has_no_relationship", fk, source);
            return Ok(false);
        }
        self.batched_flag(|b| {
            b.remove_relationship_internal(fk)?;
            Ok(true)
        })
    }

    /// Remove a foreign key with everything that only existed for it: skip
    /// navigation bindings, implicit dependent properties, an unused
    /// principal key and a defining-navigation dependent.
    pub(crate) fn remove_relationship_internal(&mut self, fk: ForeignKeyId) -> ModelResult<()> {
        if self.model.foreign_key(fk).is_none() {
            return Ok(());
        }
        for skip in self.model.referencing_skip_navigations(fk) {
            self.model.set_skip_navigation_foreign_key(skip, None, None)?;
        }
        let removed: ForeignKey = self.remove_foreign_key_raw(fk)?;
        self.remove_unused_implicit_properties(&removed.properties)?;
        if self.model.key(removed.principal_key).is_some() {
            self.remove_key_if_unused(removed.principal_key)?;
        }
        tracing::debug!(
            target: "keystone::builder",
            dependent = %self.model.entity_name(removed.dependent),
            principal = %self.model.entity_name(removed.principal),
            "relationship removed"
        );

        let defined = removed.is_ownership
            && self
                .model
                .entity_type(removed.dependent)
                .and_then(|e| e.defining.as_ref())
                .is_some_and(|d| d.entity == removed.principal);
        if defined {
            self.remove_entity_type_internal(removed.dependent, removed.source)?;
        }
        Ok(())
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

    fn int() -> Option<PropertyType> {
        Some(PropertyType::new(ScalarType::Int32))
    }

    fn blog_and_post(mb: &mut ModelBuilder) -> (keystone_core::EntityTypeId, keystone_core::EntityTypeId) {
        let blog = mb.entity("Blog", Explicit).unwrap().unwrap();
        let id = mb.property(blog, "Id", int(), Explicit).unwrap().unwrap();
        mb.primary_key(blog, &[id], Explicit).unwrap();
        let post = mb.entity("Post", Explicit).unwrap().unwrap();
        (blog, post)
    }

    // ========== TEST: relationship_creates_shadow_properties ==========
    #[test]
    fn test_relationship_creates_shadow_properties() {
        let mut mb = session();
        let (blog, post) = blog_and_post(&mut mb);

        let fk = mb
            .has_relationship(post, blog, Some("Blog"), Some("Posts"), None, Convention)
            .unwrap()
            .unwrap();

        let data = mb.model().foreign_key(fk).unwrap();
        assert_eq!(data.dependent, post);
        assert_eq!(mb.model().property_names(&data.properties), vec!["BlogId"]);
        assert!(mb.model().property(data.properties[0]).unwrap().is_shadow);
        assert_eq!(data.dependent_to_principal.as_ref().unwrap().name, "Blog");
        assert_eq!(data.principal_to_dependent.as_ref().unwrap().name, "Posts");
    }

    // ========== TEST: swapped_call_returns_same_foreign_key ==========
    #[test]
    fn test_swapped_call_returns_same_foreign_key() {
        let mut mb = session();
        let (blog, post) = blog_and_post(&mut mb);
        let fk = mb
            .has_relationship(post, blog, Some("Blog"), Some("Posts"), None, Convention)
            .unwrap()
            .unwrap();

        let again = mb
            .has_relationship(blog, post, Some("Posts"), Some("Blog"), None, DataAnnotation)
            .unwrap();

        assert_eq!(again, Some(fk));
        assert_eq!(mb.model().foreign_keys().count(), 1);
        assert_eq!(mb.model().foreign_key(fk).unwrap().source, DataAnnotation);
    }

    // ========== TEST: collection_navigation_inverts ==========
    #[test]
    fn test_collection_navigation_inverts() {
        let mut catalog = CatalogBuilder::new();
        catalog
            .add_record("Customer")
            .scalar("Id", ScalarType::Int32)
            .collection("Orders", "Order")
            .done()
            .unwrap();
        catalog
            .add_record("Order")
            .scalar("Id", ScalarType::Int32)
            .done()
            .unwrap();
        let mut mb = ModelBuilder::new(catalog.build().unwrap(), BuilderConfig::minimal()).unwrap();
        let customer = mb.entity("Customer", Explicit).unwrap().unwrap();
        let order = mb.entity("Order", Explicit).unwrap().unwrap();
        let id = mb.property(customer, "Id", None, Explicit).unwrap().unwrap();
        mb.primary_key(customer, &[id], Explicit).unwrap();

        let fk = mb
            .has_relationship(customer, order, Some("Orders"), None, None, Explicit)
            .unwrap()
            .unwrap();

        let data = mb.model().foreign_key(fk).unwrap();
        assert_eq!(data.dependent, order);
        assert_eq!(data.principal, customer);
        assert_eq!(data.principal_to_dependent.as_ref().unwrap().name, "Orders");
        assert_eq!(
            mb.has_relationship(order, customer, None, Some("Orders"), None, Explicit)
                .unwrap(),
            Some(fk)
        );
    }

    // ========== TEST: inferred_inversion_leaves_principal_end_open ==========
    #[test]
    fn test_inferred_inversion_leaves_principal_end_open() {
        // GIVEN Customer.Orders backed by a collection member
        let mut catalog = CatalogBuilder::new();
        catalog
            .add_record("Customer")
            .scalar("Id", ScalarType::Int32)
            .collection("Orders", "Order")
            .done()
            .unwrap();
        catalog
            .add_record("Order")
            .scalar("Id", ScalarType::Int32)
            .done()
            .unwrap();
        let mut mb = ModelBuilder::new(catalog.build().unwrap(), BuilderConfig::minimal()).unwrap();
        let customer = mb.entity("Customer", Explicit).unwrap().unwrap();
        let order = mb.entity("Order", Explicit).unwrap().unwrap();
        let id = mb.property(customer, "Id", None, Explicit).unwrap().unwrap();
        mb.primary_key(customer, &[id], Explicit).unwrap();

        // WHEN a convention asks for the relationship from the collection side
        let fk = mb
            .has_relationship(customer, order, Some("Orders"), None, None, Convention)
            .unwrap()
            .unwrap();

        // THEN Order is dependent but the orientation is not pinned
        let data = mb.model().foreign_key(fk).unwrap();
        assert_eq!(data.dependent, order);
        assert_eq!(data.principal_end_source, None);
    }

    // ========== TEST: navigation_conflict_leaves_graph_untouched ==========
    #[test]
    fn test_navigation_conflict_leaves_graph_untouched() {
        // GIVEN Post with an explicit property named like the navigation
        let mut mb = session();
        let (blog, post) = blog_and_post(&mut mb);
        mb.property(post, "Blog", int(), Explicit).unwrap().unwrap();
        let properties_before = mb.model().properties_of(post).len();

        // WHEN the relationship asks for a Blog navigation
        let result = mb.has_relationship(post, blog, Some("Blog"), None, None, Explicit);

        // THEN it fails and neither the foreign key nor its shadow property remain
        assert!(matches!(result, Err(ModelError::ConflictingMember { .. })));
        assert_eq!(mb.model().foreign_keys().count(), 0);
        assert_eq!(mb.model().properties_of(post).len(), properties_before);
        assert!(mb.model().find_property(post, "BlogId").is_none());
        assert!(!mb.is_delayed());
    }

    // ========== TEST: temporary_key_without_primary_key ==========
    #[test]
    fn test_temporary_key_without_primary_key() {
        let mut mb = session();
        let tag = mb.entity("Tag", Explicit).unwrap().unwrap();
        let post = mb.entity("Post", Explicit).unwrap().unwrap();

        let fk = mb
            .has_relationship(post, tag, None, None, None, Convention)
            .unwrap()
            .unwrap();

        let data = mb.model().foreign_key(fk).unwrap();
        let key = mb.model().key(data.principal_key).unwrap();
        assert_eq!(mb.model().property_names(&key.properties), vec!["TempId"]);
        assert_eq!(key.source, Convention);
    }

    // ========== TEST: removing_relationship_cleans_up ==========
    #[test]
    fn test_removing_relationship_cleans_up() {
        let mut mb = session();
        let tag = mb.entity("Tag", Explicit).unwrap().unwrap();
        let post = mb.entity("Post", Explicit).unwrap().unwrap();
        let fk = mb
            .has_relationship(post, tag, Some("Tag"), None, None, Convention)
            .unwrap()
            .unwrap();
        let data = mb.model().foreign_key(fk).unwrap().clone();

        assert!(mb.has_no_relationship(fk, Explicit).unwrap());

        assert!(mb.model().foreign_key(fk).is_none());
        assert!(mb.model().property(data.properties[0]).is_none());
        assert!(mb.model().key(data.principal_key).is_none());
    }

    // ========== TEST: mismatched_property_types_error ==========
    #[test]
    fn test_mismatched_property_types_error() {
        let mut mb = session();
        let (blog, post) = blog_and_post(&mut mb);
        let text = mb
            .property(post, "BlogRef", Some(PropertyType::new(ScalarType::String)), Explicit)
            .unwrap()
            .unwrap();
        let blog_id = mb.model().find_property(blog, "Id").unwrap();

        let result = mb.has_relationship_with_properties(post, blog, &[text], Some(&[blog_id][..]), Explicit);

        assert!(matches!(result, Err(ModelError::ForeignKeyTypeMismatch { .. })));
    }
}
