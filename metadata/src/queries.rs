//! Member, key, index and relationship lookups.

use crate::catalog::RecordMember;
use crate::elements::Navigation;
use crate::model::Model;
use keystone_core::{
    ConfigurationSource, EntityTypeId, ForeignKeyId, IndexId, KeyId, PropertyId,
    ServicePropertyId, SkipNavigationId,
};

/// One end of a foreign key that carries a navigation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NavigationRef {
    pub foreign_key: ForeignKeyId,
    /// True for the dependent-to-principal end.
    pub on_dependent: bool,
}

/// Any named member of an entity type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemberRef {
    Property(PropertyId),
    Navigation(NavigationRef),
    SkipNavigation(SkipNavigationId),
    ServiceProperty(ServicePropertyId),
}

/// The kind of a member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemberKind {
    Property,
    Navigation,
    SkipNavigation,
    ServiceProperty,
}

impl MemberKind {
    pub fn name(&self) -> &'static str {
        match self {
            MemberKind::Property => "property",
            MemberKind::Navigation => "navigation",
            MemberKind::SkipNavigation => "skip navigation",
            MemberKind::ServiceProperty => "service property",
        }
    }
}

impl Model {
    // ==================== Members ====================

    pub fn member_kind(&self, member: MemberRef) -> MemberKind {
        match member {
            MemberRef::Property(_) => MemberKind::Property,
            MemberRef::Navigation(_) => MemberKind::Navigation,
            MemberRef::SkipNavigation(_) => MemberKind::SkipNavigation,
            MemberRef::ServiceProperty(_) => MemberKind::ServiceProperty,
        }
    }

    pub fn member_name(&self, member: MemberRef) -> String {
        match member {
            MemberRef::Property(id) => self.property_name(id),
            MemberRef::Navigation(nav) => self
                .navigation(nav)
                .map(|n| n.name.clone())
                .unwrap_or_default(),
            MemberRef::SkipNavigation(id) => self
                .skip_navigations
                .get(id)
                .map(|s| s.name.clone())
                .unwrap_or_default(),
            MemberRef::ServiceProperty(id) => self
                .service_properties
                .get(id)
                .map(|s| s.name.clone())
                .unwrap_or_default(),
        }
    }

    /// The source that established the member.
    pub fn member_source(&self, member: MemberRef) -> Option<ConfigurationSource> {
        match member {
            MemberRef::Property(id) => self.properties.get(id).map(|p| p.source),
            MemberRef::Navigation(nav) => self.navigation(nav).map(|n| n.source),
            MemberRef::SkipNavigation(id) => self.skip_navigations.get(id).map(|s| s.source),
            MemberRef::ServiceProperty(id) => self.service_properties.get(id).map(|s| s.source),
        }
    }

    /// The entity type that declares the member.
    pub fn member_entity(&self, member: MemberRef) -> Option<EntityTypeId> {
        match member {
            MemberRef::Property(id) => self.properties.get(id).map(|p| p.entity),
            MemberRef::Navigation(nav) => self.navigation_declaring_entity(nav),
            MemberRef::SkipNavigation(id) => self.skip_navigations.get(id).map(|s| s.entity),
            MemberRef::ServiceProperty(id) => self.service_properties.get(id).map(|s| s.entity),
        }
    }

    /// Members declared directly on the entity type.
    pub fn declared_members(&self, entity: EntityTypeId) -> Vec<MemberRef> {
        let Some(e) = self.entities.get(entity) else {
            return Vec::new();
        };
        let mut members: Vec<MemberRef> =
            e.properties.iter().copied().map(MemberRef::Property).collect();
        members.extend(
            self.declared_navigations(entity)
                .into_iter()
                .map(MemberRef::Navigation),
        );
        members.extend(e.skip_navigations.iter().copied().map(MemberRef::SkipNavigation));
        members.extend(
            e.service_properties
                .iter()
                .copied()
                .map(MemberRef::ServiceProperty),
        );
        members
    }

    /// Members named `name` declared directly on the entity type.
    pub fn find_declared_members(&self, entity: EntityTypeId, name: &str) -> Vec<MemberRef> {
        self.declared_members(entity)
            .into_iter()
            .filter(|m| self.member_name(*m) == name)
            .collect()
    }

    /// Members named `name` on the entity type or its base types.
    pub fn find_members(&self, entity: EntityTypeId, name: &str) -> Vec<MemberRef> {
        self.base_chain(entity)
            .into_iter()
            .flat_map(|e| self.find_declared_members(e, name))
            .collect()
    }

    /// Members named `name` on derived types.
    pub fn find_derived_members(&self, entity: EntityTypeId, name: &str) -> Vec<MemberRef> {
        self.all_derived_types(entity)
            .into_iter()
            .flat_map(|e| self.find_declared_members(e, name))
            .collect()
    }

    /// Members named `name` anywhere up or down the hierarchy.
    pub fn find_members_in_hierarchy(&self, entity: EntityTypeId, name: &str) -> Vec<MemberRef> {
        let mut members = self.find_members(entity, name);
        members.extend(self.find_derived_members(entity, name));
        members
    }

    // ==================== Properties ====================

    pub fn find_declared_property(&self, entity: EntityTypeId, name: &str) -> Option<PropertyId> {
        self.entities.get(entity).and_then(|e| {
            e.properties
                .iter()
                .copied()
                .find(|p| self.properties.get(*p).is_some_and(|p| p.name == name))
        })
    }

    /// Find a property on the entity type or its base types.
    pub fn find_property(&self, entity: EntityTypeId, name: &str) -> Option<PropertyId> {
        self.base_chain(entity)
            .into_iter()
            .find_map(|e| self.find_declared_property(e, name))
    }

    /// Find every named property, or `None` if any is missing.
    pub fn find_properties(&self, entity: EntityTypeId, names: &[String]) -> Option<Vec<PropertyId>> {
        names.iter().map(|n| self.find_property(entity, n)).collect()
    }

    pub fn find_derived_properties(&self, entity: EntityTypeId, name: &str) -> Vec<PropertyId> {
        self.all_derived_types(entity)
            .into_iter()
            .filter_map(|e| self.find_declared_property(e, name))
            .collect()
    }

    pub fn find_properties_in_hierarchy(&self, entity: EntityTypeId, name: &str) -> Vec<PropertyId> {
        let mut found: Vec<PropertyId> = self.find_property(entity, name).into_iter().collect();
        found.extend(self.find_derived_properties(entity, name));
        found
    }

    /// Properties visible on the entity type, base types first.
    pub fn properties_of(&self, entity: EntityTypeId) -> Vec<PropertyId> {
        let mut chain = self.base_chain(entity);
        chain.reverse();
        chain
            .into_iter()
            .filter_map(|e| self.entities.get(e))
            .flat_map(|e| e.properties.iter().copied())
            .collect()
    }

    /// Names of a property list.
    pub fn property_names(&self, properties: &[PropertyId]) -> Vec<String> {
        properties.iter().map(|p| self.property_name(*p)).collect()
    }

    /// Returns true if a key, index or foreign key uses the property.
    pub fn property_is_used(&self, property: PropertyId) -> bool {
        !self.containing_keys(property).is_empty()
            || !self.containing_indexes(property).is_empty()
            || !self.containing_foreign_keys(property).is_empty()
    }

    // ==================== Keys ====================

    /// Keys of the hierarchy (declared on the root).
    pub fn keys_of(&self, entity: EntityTypeId) -> Vec<KeyId> {
        self.entities
            .get(self.root_type(entity))
            .map(|e| e.keys.clone())
            .unwrap_or_default()
    }

    pub fn find_declared_key(&self, entity: EntityTypeId, properties: &[PropertyId]) -> Option<KeyId> {
        self.entities.get(entity).and_then(|e| {
            e.keys
                .iter()
                .copied()
                .find(|k| self.keys.get(*k).is_some_and(|k| k.properties == properties))
        })
    }

    /// Find a key with exactly these properties on the hierarchy root.
    pub fn find_key(&self, entity: EntityTypeId, properties: &[PropertyId]) -> Option<KeyId> {
        self.find_declared_key(self.root_type(entity), properties)
    }

    /// The primary key of the hierarchy.
    pub fn find_primary_key(&self, entity: EntityTypeId) -> Option<KeyId> {
        self.entities
            .get(self.root_type(entity))
            .and_then(|e| e.primary_key)
    }

    pub fn containing_keys(&self, property: PropertyId) -> Vec<KeyId> {
        self.keys
            .iter()
            .filter(|(_, k)| k.properties.contains(&property))
            .map(|(id, _)| id)
            .collect()
    }

    /// Foreign keys whose principal key is `key`.
    pub fn referencing_foreign_keys(&self, key: KeyId) -> Vec<ForeignKeyId> {
        self.foreign_keys
            .iter()
            .filter(|(_, fk)| fk.principal_key == key)
            .map(|(id, _)| id)
            .collect()
    }

    // ==================== Indexes ====================

    /// Find an unnamed index declared on the entity type.
    pub fn find_declared_index(
        &self,
        entity: EntityTypeId,
        properties: &[PropertyId],
    ) -> Option<IndexId> {
        self.entities.get(entity).and_then(|e| {
            e.indexes.iter().copied().find(|i| {
                self.indexes
                    .get(*i)
                    .is_some_and(|i| i.name.is_none() && i.properties == properties)
            })
        })
    }

    /// Find an unnamed index on the entity type or its base types.
    pub fn find_index(&self, entity: EntityTypeId, properties: &[PropertyId]) -> Option<IndexId> {
        self.base_chain(entity)
            .into_iter()
            .find_map(|e| self.find_declared_index(e, properties))
    }

    /// Find a named index on the entity type or its base types.
    pub fn find_index_by_name(&self, entity: EntityTypeId, name: &str) -> Option<IndexId> {
        self.base_chain(entity).into_iter().find_map(|e| {
            self.entities.get(e).and_then(|e| {
                e.indexes.iter().copied().find(|i| {
                    self.indexes
                        .get(*i)
                        .is_some_and(|i| i.name.as_deref() == Some(name))
                })
            })
        })
    }

    pub fn find_derived_indexes(&self, entity: EntityTypeId, properties: &[PropertyId]) -> Vec<IndexId> {
        self.all_derived_types(entity)
            .into_iter()
            .filter_map(|e| self.find_declared_index(e, properties))
            .collect()
    }

    pub fn find_derived_indexes_by_name(&self, entity: EntityTypeId, name: &str) -> Vec<IndexId> {
        self.all_derived_types(entity)
            .into_iter()
            .filter_map(|e| self.entities.get(e))
            .flat_map(|e| e.indexes.iter().copied())
            .filter(|i| {
                self.indexes
                    .get(*i)
                    .is_some_and(|i| i.name.as_deref() == Some(name))
            })
            .collect()
    }

    pub fn containing_indexes(&self, property: PropertyId) -> Vec<IndexId> {
        self.indexes
            .iter()
            .filter(|(_, i)| i.properties.contains(&property))
            .map(|(id, _)| id)
            .collect()
    }

    // ==================== Foreign Keys ====================

    pub fn declared_foreign_keys(&self, entity: EntityTypeId) -> Vec<ForeignKeyId> {
        self.entities
            .get(entity)
            .map(|e| e.foreign_keys.clone())
            .unwrap_or_default()
    }

    /// Foreign keys declared on the entity type or its base types.
    pub fn foreign_keys_of(&self, entity: EntityTypeId) -> Vec<ForeignKeyId> {
        self.base_chain(entity)
            .into_iter()
            .flat_map(|e| self.declared_foreign_keys(e))
            .collect()
    }

    pub fn find_declared_foreign_keys(
        &self,
        entity: EntityTypeId,
        properties: &[PropertyId],
    ) -> Vec<ForeignKeyId> {
        self.declared_foreign_keys(entity)
            .into_iter()
            .filter(|fk| {
                self.foreign_keys
                    .get(*fk)
                    .is_some_and(|fk| fk.properties == properties)
            })
            .collect()
    }

    /// Foreign keys that use the property as a dependent property.
    pub fn containing_foreign_keys(&self, property: PropertyId) -> Vec<ForeignKeyId> {
        self.foreign_keys
            .iter()
            .filter(|(_, fk)| fk.properties.contains(&property))
            .map(|(id, _)| id)
            .collect()
    }

    /// Foreign keys whose principal is exactly this entity type.
    pub fn declared_referencing_foreign_keys(&self, entity: EntityTypeId) -> Vec<ForeignKeyId> {
        self.foreign_keys
            .iter()
            .filter(|(_, fk)| fk.principal == entity)
            .map(|(id, _)| id)
            .collect()
    }

    /// Foreign keys whose principal is the entity type or one of its bases.
    pub fn referencing_foreign_keys_of(&self, entity: EntityTypeId) -> Vec<ForeignKeyId> {
        self.base_chain(entity)
            .into_iter()
            .flat_map(|e| self.declared_referencing_foreign_keys(e))
            .collect()
    }

    /// The ownership declared on the entity type.
    pub fn find_ownership(&self, entity: EntityTypeId) -> Option<ForeignKeyId> {
        self.declared_foreign_keys(entity)
            .into_iter()
            .find(|fk| self.foreign_keys.get(*fk).is_some_and(|fk| fk.is_ownership))
    }

    // ==================== Navigations ====================

    pub fn navigation(&self, nav: NavigationRef) -> Option<&Navigation> {
        self.foreign_keys
            .get(nav.foreign_key)
            .and_then(|fk| fk.navigation(nav.on_dependent))
    }

    pub fn navigation_declaring_entity(&self, nav: NavigationRef) -> Option<EntityTypeId> {
        self.foreign_keys
            .get(nav.foreign_key)
            .map(|fk| if nav.on_dependent { fk.dependent } else { fk.principal })
    }

    pub fn navigation_target(&self, nav: NavigationRef) -> Option<EntityTypeId> {
        self.foreign_keys
            .get(nav.foreign_key)
            .map(|fk| if nav.on_dependent { fk.principal } else { fk.dependent })
    }

    /// Navigations declared on the entity type.
    pub fn declared_navigations(&self, entity: EntityTypeId) -> Vec<NavigationRef> {
        let mut navigations = Vec::new();
        for (id, fk) in self.foreign_keys.iter() {
            if fk.dependent == entity && fk.dependent_to_principal.is_some() {
                navigations.push(NavigationRef {
                    foreign_key: id,
                    on_dependent: true,
                });
            }
            if fk.principal == entity && fk.principal_to_dependent.is_some() {
                navigations.push(NavigationRef {
                    foreign_key: id,
                    on_dependent: false,
                });
            }
        }
        navigations
    }

    pub fn find_declared_navigation(&self, entity: EntityTypeId, name: &str) -> Option<NavigationRef> {
        self.declared_navigations(entity)
            .into_iter()
            .find(|n| self.navigation(*n).is_some_and(|n| n.name == name))
    }

    /// Find a navigation on the entity type or its base types.
    pub fn find_navigation(&self, entity: EntityTypeId, name: &str) -> Option<NavigationRef> {
        self.base_chain(entity)
            .into_iter()
            .find_map(|e| self.find_declared_navigation(e, name))
    }

    pub fn find_derived_navigations(&self, entity: EntityTypeId, name: &str) -> Vec<NavigationRef> {
        self.all_derived_types(entity)
            .into_iter()
            .filter_map(|e| self.find_declared_navigation(e, name))
            .collect()
    }

    pub fn find_navigations_in_hierarchy(&self, entity: EntityTypeId, name: &str) -> Vec<NavigationRef> {
        let mut found: Vec<NavigationRef> = self.find_navigation(entity, name).into_iter().collect();
        found.extend(self.find_derived_navigations(entity, name));
        found
    }

    // ==================== Skip Navigations ====================

    pub fn find_declared_skip_navigation(
        &self,
        entity: EntityTypeId,
        name: &str,
    ) -> Option<SkipNavigationId> {
        self.entities.get(entity).and_then(|e| {
            e.skip_navigations
                .iter()
                .copied()
                .find(|s| self.skip_navigations.get(*s).is_some_and(|s| s.name == name))
        })
    }

    pub fn find_skip_navigation(&self, entity: EntityTypeId, name: &str) -> Option<SkipNavigationId> {
        self.base_chain(entity)
            .into_iter()
            .find_map(|e| self.find_declared_skip_navigation(e, name))
    }

    pub fn find_derived_skip_navigations(
        &self,
        entity: EntityTypeId,
        name: &str,
    ) -> Vec<SkipNavigationId> {
        self.all_derived_types(entity)
            .into_iter()
            .filter_map(|e| self.find_declared_skip_navigation(e, name))
            .collect()
    }

    /// Skip navigations bound to the foreign key.
    pub fn referencing_skip_navigations(&self, fk: ForeignKeyId) -> Vec<SkipNavigationId> {
        self.skip_navigations
            .iter()
            .filter(|(_, s)| s.foreign_key == Some(fk))
            .map(|(id, _)| id)
            .collect()
    }

    // ==================== Service Properties ====================

    pub fn find_declared_service_property(
        &self,
        entity: EntityTypeId,
        name: &str,
    ) -> Option<ServicePropertyId> {
        self.entities.get(entity).and_then(|e| {
            e.service_properties
                .iter()
                .copied()
                .find(|s| self.service_properties.get(*s).is_some_and(|s| s.name == name))
        })
    }

    pub fn find_service_property(&self, entity: EntityTypeId, name: &str) -> Option<ServicePropertyId> {
        self.base_chain(entity)
            .into_iter()
            .find_map(|e| self.find_declared_service_property(e, name))
    }

    pub fn find_derived_service_properties(
        &self,
        entity: EntityTypeId,
        name: &str,
    ) -> Vec<ServicePropertyId> {
        self.all_derived_types(entity)
            .into_iter()
            .filter_map(|e| self.find_declared_service_property(e, name))
            .collect()
    }

    // ==================== Ignored Names ====================

    pub fn find_declared_ignored_source(
        &self,
        entity: EntityTypeId,
        name: &str,
    ) -> Option<ConfigurationSource> {
        self.entities
            .get(entity)
            .and_then(|e| e.ignored.get(name).copied())
    }

    /// The strongest source `name` is ignored at on the entity type or its bases.
    pub fn find_ignored_source(&self, entity: EntityTypeId, name: &str) -> Option<ConfigurationSource> {
        self.base_chain(entity)
            .into_iter()
            .filter_map(|e| self.find_declared_ignored_source(e, name))
            .max()
    }

    // ==================== Records ====================

    /// The backing record member for `name`, if the entity type has a record.
    pub fn record_member(&self, entity: EntityTypeId, name: &str) -> Option<&RecordMember> {
        let record = self.entities.get(entity)?.record.as_deref()?;
        self.catalog.find_member(record, name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keystone_core::{PropertyType, ScalarType};

    const SRC: ConfigurationSource = ConfigurationSource::Explicit;

    fn int() -> PropertyType {
        PropertyType::new(ScalarType::Int32)
    }

    // ========== TEST: member_lookup_walks_hierarchy ==========
    #[test]
    fn test_member_lookup_walks_hierarchy() {
        // GIVEN Derived : Base with Base.Id and Derived.Name
        let mut model = Model::default();
        let base = model.add_entity_type("Base", None, SRC, None).unwrap();
        let derived = model.add_entity_type("Derived", None, SRC, None).unwrap();
        model.set_base_type(derived, Some(base), Some(SRC)).unwrap();
        let id = model.add_property(base, "Id", int(), None, SRC, true).unwrap();
        let name = model
            .add_property(derived, "Name", PropertyType::new(ScalarType::String), None, SRC, true)
            .unwrap();

        // THEN lookups see up the chain, derived lookups see down
        assert_eq!(model.find_property(derived, "Id"), Some(id));
        assert_eq!(model.find_declared_property(derived, "Id"), None);
        assert_eq!(model.find_derived_properties(base, "Name"), vec![name]);
        assert_eq!(model.find_members_in_hierarchy(base, "Name").len(), 1);
        assert_eq!(model.properties_of(derived), vec![id, name]);
    }

    // ========== TEST: conflicting_member_rejected ==========
    #[test]
    fn test_conflicting_member_rejected() {
        // GIVEN Derived : Base with Derived.Name
        let mut model = Model::default();
        let base = model.add_entity_type("Base", None, SRC, None).unwrap();
        let derived = model.add_entity_type("Derived", None, SRC, None).unwrap();
        model.set_base_type(derived, Some(base), Some(SRC)).unwrap();
        model.add_property(derived, "Name", int(), None, SRC, true).unwrap();

        // WHEN Base declares Name too
        let result = model.add_service_property(base, "Name", "Logger", SRC);

        // THEN the derived declaration conflicts
        assert!(matches!(
            result,
            Err(keystone_core::ModelError::ConflictingMember { .. })
        ));
    }

    // ========== TEST: key_in_use ==========
    #[test]
    fn test_key_in_use() {
        // GIVEN Order.CustomerId -> Customer.Id
        let mut model = Model::default();
        let customer = model.add_entity_type("Customer", None, SRC, None).unwrap();
        let order = model.add_entity_type("Order", None, SRC, None).unwrap();
        let id = model.add_property(customer, "Id", int(), None, SRC, true).unwrap();
        let key = model.add_key(customer, vec![id], SRC).unwrap();
        let fk_prop = model
            .add_property(order, "CustomerId", int(), None, SRC, true)
            .unwrap();
        let fk = model
            .add_foreign_key(order, vec![fk_prop], customer, key, Some(SRC), SRC)
            .unwrap();

        // THEN neither the key nor its property can go
        assert_eq!(model.referencing_foreign_keys(key), vec![fk]);
        assert!(model.remove_key(key).is_err());
        assert!(model.remove_property(id).is_err());
        assert!(model.property_is_used(fk_prop));

        // WHEN the foreign key goes first
        model.remove_foreign_key(fk).unwrap();

        // THEN the key can be removed
        assert!(model.remove_key(key).is_ok());
    }

    // ========== TEST: navigation_lookup ==========
    #[test]
    fn test_navigation_lookup() {
        let mut model = Model::default();
        let customer = model.add_entity_type("Customer", None, SRC, None).unwrap();
        let order = model.add_entity_type("Order", None, SRC, None).unwrap();
        let id = model.add_property(customer, "Id", int(), None, SRC, true).unwrap();
        let key = model.add_key(customer, vec![id], SRC).unwrap();
        let fk_prop = model
            .add_property(order, "CustomerId", int(), None, SRC, true)
            .unwrap();
        let fk = model
            .add_foreign_key(order, vec![fk_prop], customer, key, None, SRC)
            .unwrap();
        let nav = Navigation {
            name: "Orders".into(),
            source: SRC,
        };
        model.set_navigation(fk, false, Some(nav)).unwrap();

        let found = model.find_navigation(customer, "Orders").unwrap();
        assert_eq!(found.foreign_key, fk);
        assert!(!found.on_dependent);
        assert_eq!(model.navigation_target(found), Some(order));

        // A property with the same name now conflicts
        assert!(model
            .add_property(customer, "Orders", int(), None, SRC, true)
            .is_err());
    }

    // ========== TEST: foreign_key_shape_validated ==========
    #[test]
    fn test_foreign_key_shape_validated() {
        let mut model = Model::default();
        let customer = model.add_entity_type("Customer", None, SRC, None).unwrap();
        let order = model.add_entity_type("Order", None, SRC, None).unwrap();
        let id = model.add_property(customer, "Id", int(), None, SRC, true).unwrap();
        let key = model.add_key(customer, vec![id], SRC).unwrap();
        let text = model
            .add_property(order, "CustomerName", PropertyType::new(ScalarType::String), None, SRC, true)
            .unwrap();

        let mismatch = model.add_foreign_key(order, vec![text], customer, key, None, SRC);
        assert!(matches!(
            mismatch,
            Err(keystone_core::ModelError::ForeignKeyTypeMismatch { .. })
        ));

        let count = model.add_foreign_key(order, vec![], customer, key, None, SRC);
        assert!(matches!(
            count,
            Err(keystone_core::ModelError::ForeignKeyCountMismatch { .. })
        ));
    }
}
