//! Inheritance queries.

use crate::model::Model;
use keystone_core::EntityTypeId;
use std::collections::HashSet;

impl Model {
    /// The entity type followed by its base types, most derived first.
    pub fn base_chain(&self, id: EntityTypeId) -> Vec<EntityTypeId> {
        let mut chain = Vec::new();
        let mut seen = HashSet::new();
        let mut current = self.entities.get(id).map(|_| id);
        while let Some(entity) = current {
            if !seen.insert(entity) {
                break;
            }
            chain.push(entity);
            current = self.entities.get(entity).and_then(|e| e.base);
        }
        chain
    }

    /// The root of the hierarchy the entity type belongs to.
    pub fn root_type(&self, id: EntityTypeId) -> EntityTypeId {
        self.base_chain(id).last().copied().unwrap_or(id)
    }

    /// Entity types whose base is exactly `id`.
    pub fn derived_types(&self, id: EntityTypeId) -> Vec<EntityTypeId> {
        self.entities
            .iter()
            .filter(|(_, e)| e.base == Some(id))
            .map(|(derived, _)| derived)
            .collect()
    }

    /// All transitive derived types, breadth first, not including `id`.
    pub fn all_derived_types(&self, id: EntityTypeId) -> Vec<EntityTypeId> {
        let mut result = Vec::new();
        let mut frontier = vec![id];
        while !frontier.is_empty() {
            let mut next = Vec::new();
            for entity in frontier {
                for derived in self.derived_types(entity) {
                    if !result.contains(&derived) && derived != id {
                        result.push(derived);
                        next.push(derived);
                    }
                }
            }
            frontier = next;
        }
        result
    }

    /// `id` followed by all of its transitive derived types.
    pub fn derived_types_inclusive(&self, id: EntityTypeId) -> Vec<EntityTypeId> {
        let mut result = vec![id];
        result.extend(self.all_derived_types(id));
        result
    }

    /// Returns true if `derived` is `base` or inherits from it.
    pub fn is_assignable_from(&self, base: EntityTypeId, derived: EntityTypeId) -> bool {
        self.base_chain(derived).contains(&base)
    }

    /// Returns true if one type is assignable from the other.
    pub fn in_same_hierarchy(&self, a: EntityTypeId, b: EntityTypeId) -> bool {
        self.is_assignable_from(a, b) || self.is_assignable_from(b, a)
    }

    /// Returns true if the two types share a root.
    pub fn share_root(&self, a: EntityTypeId, b: EntityTypeId) -> bool {
        self.root_type(a) == self.root_type(b)
    }

    /// Entity types defined through a navigation on `id`.
    pub fn defined_types(&self, id: EntityTypeId) -> Vec<EntityTypeId> {
        self.entities
            .iter()
            .filter(|(_, e)| e.defining.as_ref().is_some_and(|d| d.entity == id))
            .map(|(defined, _)| defined)
            .collect()
    }

    /// Entity types backed by `record` that exist under a defining navigation.
    pub fn entity_types_with_defining_navigation(&self, record: &str) -> Vec<EntityTypeId> {
        self.entities
            .iter()
            .filter(|(_, e)| e.defining.is_some() && e.record.as_deref() == Some(record))
            .map(|(id, _)| id)
            .collect()
    }

    /// Returns true if `id` has a defining navigation.
    pub fn has_defining_navigation(&self, id: EntityTypeId) -> bool {
        self.entities.get(id).is_some_and(|e| e.defining.is_some())
    }
}
