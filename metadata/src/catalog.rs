//! Record catalog: the backing record types entity types are mapped from.
//!
//! A record is a named type with an optional base record and a list of
//! members. Members are scalars, references to other records, collections of
//! records, or injected services. The catalog is immutable once built.

use keystone_core::{PropertyType, ScalarType};
use std::collections::{HashMap, HashSet};
use thiserror::Error;

/// Errors that can occur during catalog construction.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Duplicate record name: {0}")]
    DuplicateRecordName(String),

    #[error("Duplicate member '{member}' on record {record}")]
    DuplicateMember { record: String, member: String },

    #[error("Unknown base record: {0}")]
    UnknownBaseRecord(String),

    #[error("Unknown target record '{target}' for member {record}.{member}")]
    UnknownTargetRecord {
        record: String,
        member: String,
        target: String,
    },

    #[error("Inheritance cycle detected involving record: {0}")]
    InheritanceCycle(String),
}

/// The declared type of a record member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemberType {
    /// A scalar value.
    Scalar(PropertyType),
    /// A single reference to another record.
    Reference(String),
    /// A collection of another record.
    Collection(String),
    /// An injected service of the named type.
    Service(String),
}

impl MemberType {
    /// The record this member navigates to, if it is a navigation.
    pub fn target_record(&self) -> Option<&str> {
        match self {
            MemberType::Reference(target) | MemberType::Collection(target) => Some(target),
            _ => None,
        }
    }

    /// Returns true for collection navigations.
    pub fn is_collection(&self) -> bool {
        matches!(self, MemberType::Collection(_))
    }
}

/// A member of a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordMember {
    pub name: String,
    pub ty: MemberType,
}

/// A backing record type.
#[derive(Debug, Clone)]
pub struct RecordType {
    pub name: String,
    pub base: Option<String>,
    pub members: Vec<RecordMember>,
}

impl RecordType {
    /// Find a member declared directly on this record.
    pub fn declared_member(&self, name: &str) -> Option<&RecordMember> {
        self.members.iter().find(|m| m.name == name)
    }
}

/// Immutable set of record types.
#[derive(Debug, Clone, Default)]
pub struct RecordCatalog {
    records: HashMap<String, RecordType>,
}

impl RecordCatalog {
    /// An empty catalog: every entity type is shadow-only.
    pub fn empty() -> Self {
        Self::default()
    }

    // ==================== Record Lookups ====================

    /// Get a record by name.
    pub fn get(&self, name: &str) -> Option<&RecordType> {
        self.records.get(name)
    }

    /// Check if a record exists.
    pub fn contains(&self, name: &str) -> bool {
        self.records.contains_key(name)
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true if the catalog holds no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    // ==================== Member Lookups ====================

    /// Find a member on the record or any of its base records.
    pub fn find_member(&self, record: &str, member: &str) -> Option<&RecordMember> {
        self.base_chain(record)
            .into_iter()
            .find_map(|r| r.declared_member(member))
    }

    /// All members visible on the record, base records first.
    pub fn members_in_hierarchy(&self, record: &str) -> Vec<&RecordMember> {
        let mut chain = self.base_chain(record);
        chain.reverse();
        chain.into_iter().flat_map(|r| r.members.iter()).collect()
    }

    // ==================== Inheritance Queries ====================

    /// The record followed by its base records, most derived first.
    pub fn base_chain(&self, record: &str) -> Vec<&RecordType> {
        let mut chain = Vec::new();
        let mut seen = HashSet::new();
        let mut current = self.records.get(record);
        while let Some(r) = current {
            if !seen.insert(r.name.as_str()) {
                break;
            }
            chain.push(r);
            current = r.base.as_deref().and_then(|b| self.records.get(b));
        }
        chain
    }

    /// Returns true if a value of record `from` can be stored in a member typed `to`.
    pub fn is_assignable(&self, to: &str, from: &str) -> bool {
        self.base_chain(from).iter().any(|r| r.name == to)
    }

    /// The scalar type of a member, if it is a scalar.
    pub fn scalar_type(&self, record: &str, member: &str) -> Option<PropertyType> {
        match self.find_member(record, member).map(|m| &m.ty) {
            Some(MemberType::Scalar(ty)) => Some(*ty),
            _ => None,
        }
    }
}

/// Builder for constructing an immutable RecordCatalog.
#[derive(Debug, Default)]
pub struct CatalogBuilder {
    records: HashMap<String, RecordType>,
    order: Vec<String>,
}

impl CatalogBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a record definition.
    pub fn add_record(&mut self, name: impl Into<String>) -> RecordBuilder<'_> {
        RecordBuilder {
            builder: self,
            name: name.into(),
            base: None,
            members: Vec::new(),
        }
    }

    /// Build the immutable catalog, validating bases and navigation targets.
    pub fn build(self) -> Result<RecordCatalog, CatalogError> {
        for name in &self.order {
            let Some(record) = self.records.get(name) else {
                continue;
            };

            if let Some(base) = &record.base {
                if !self.records.contains_key(base) {
                    return Err(CatalogError::UnknownBaseRecord(base.clone()));
                }
            }

            for member in &record.members {
                if let Some(target) = member.ty.target_record() {
                    if !self.records.contains_key(target) {
                        return Err(CatalogError::UnknownTargetRecord {
                            record: record.name.clone(),
                            member: member.name.clone(),
                            target: target.to_string(),
                        });
                    }
                }
            }

            // Walk the base chain; revisiting a record means a cycle
            let mut seen = HashSet::new();
            let mut current = Some(record);
            while let Some(r) = current {
                if !seen.insert(r.name.as_str()) {
                    return Err(CatalogError::InheritanceCycle(record.name.clone()));
                }
                current = r.base.as_deref().and_then(|b| self.records.get(b));
            }
        }

        Ok(RecordCatalog {
            records: self.records,
        })
    }
}

/// Builder for a record definition.
pub struct RecordBuilder<'a> {
    builder: &'a mut CatalogBuilder,
    name: String,
    base: Option<String>,
    members: Vec<RecordMember>,
}

impl<'a> RecordBuilder<'a> {
    /// Set the base record by name.
    pub fn extends(mut self, base: impl Into<String>) -> Self {
        self.base = Some(base.into());
        self
    }

    /// Add a scalar member with the natural nullability of its kind.
    pub fn scalar(self, name: impl Into<String>, scalar: ScalarType) -> Self {
        self.member(name, MemberType::Scalar(PropertyType::new(scalar)))
    }

    /// Add a nullable scalar member.
    pub fn nullable(self, name: impl Into<String>, scalar: ScalarType) -> Self {
        self.member(name, MemberType::Scalar(PropertyType::nullable(scalar)))
    }

    /// Add a reference navigation member.
    pub fn reference(self, name: impl Into<String>, target: impl Into<String>) -> Self {
        self.member(name, MemberType::Reference(target.into()))
    }

    /// Add a collection navigation member.
    pub fn collection(self, name: impl Into<String>, target: impl Into<String>) -> Self {
        self.member(name, MemberType::Collection(target.into()))
    }

    /// Add an injected service member.
    pub fn service(self, name: impl Into<String>, service_type: impl Into<String>) -> Self {
        self.member(name, MemberType::Service(service_type.into()))
    }

    fn member(mut self, name: impl Into<String>, ty: MemberType) -> Self {
        self.members.push(RecordMember {
            name: name.into(),
            ty,
        });
        self
    }

    /// Finish building this record.
    pub fn done(self) -> Result<(), CatalogError> {
        if self.builder.records.contains_key(&self.name) {
            return Err(CatalogError::DuplicateRecordName(self.name));
        }

        let mut seen = HashSet::new();
        for member in &self.members {
            if !seen.insert(member.name.as_str()) {
                return Err(CatalogError::DuplicateMember {
                    record: self.name.clone(),
                    member: member.name.clone(),
                });
            }
        }

        let record = RecordType {
            name: self.name.clone(),
            base: self.base,
            members: self.members,
        };

        self.builder.order.push(self.name.clone());
        self.builder.records.insert(self.name, record);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order_catalog() -> RecordCatalog {
        let mut builder = CatalogBuilder::new();
        builder
            .add_record("BaseOrder")
            .scalar("Id", ScalarType::Int32)
            .done()
            .unwrap();
        builder
            .add_record("Order")
            .extends("BaseOrder")
            .scalar("CustomerId", ScalarType::Int32)
            .reference("Customer", "Customer")
            .done()
            .unwrap();
        builder
            .add_record("Customer")
            .scalar("Id", ScalarType::Int32)
            .collection("Orders", "Order")
            .done()
            .unwrap();
        builder.build().unwrap()
    }

    // ========== TEST: find_member_walks_bases ==========
    #[test]
    fn test_find_member_walks_bases() {
        // GIVEN Order extends BaseOrder
        let catalog = order_catalog();

        // WHEN find_member(Order, Id)
        let member = catalog.find_member("Order", "Id");

        // THEN the member declared on BaseOrder is found
        assert!(member.is_some());
        assert_eq!(
            catalog.scalar_type("Order", "Id"),
            Some(PropertyType::new(ScalarType::Int32))
        );
    }

    // ========== TEST: is_assignable ==========
    #[test]
    fn test_is_assignable() {
        let catalog = order_catalog();

        assert!(catalog.is_assignable("BaseOrder", "Order"));
        assert!(catalog.is_assignable("Order", "Order"));
        assert!(!catalog.is_assignable("Order", "BaseOrder"));
        assert!(!catalog.is_assignable("Customer", "Order"));
    }

    // ========== TEST: unknown_base_rejected ==========
    #[test]
    fn test_unknown_base_rejected() {
        // GIVEN a record extending a missing base
        let mut builder = CatalogBuilder::new();
        builder.add_record("Orphan").extends("Nope").done().unwrap();

        // WHEN built
        let result = builder.build();

        // THEN UnknownBaseRecord
        assert!(matches!(result, Err(CatalogError::UnknownBaseRecord(name)) if name == "Nope"));
    }

    // ========== TEST: inheritance_cycle_rejected ==========
    #[test]
    fn test_inheritance_cycle_rejected() {
        let mut builder = CatalogBuilder::new();
        builder.add_record("A").extends("B").done().unwrap();
        builder.add_record("B").extends("A").done().unwrap();

        assert!(matches!(
            builder.build(),
            Err(CatalogError::InheritanceCycle(_))
        ));
    }

    // ========== TEST: duplicate_member_rejected ==========
    #[test]
    fn test_duplicate_member_rejected() {
        let mut builder = CatalogBuilder::new();
        let result = builder
            .add_record("A")
            .scalar("X", ScalarType::Bool)
            .scalar("X", ScalarType::Int32)
            .done();

        assert!(matches!(result, Err(CatalogError::DuplicateMember { .. })));
    }

    #[test]
    fn test_members_in_hierarchy_base_first() {
        let catalog = order_catalog();
        let names: Vec<&str> = catalog
            .members_in_hierarchy("Order")
            .iter()
            .map(|m| m.name.as_str())
            .collect();
        assert_eq!(names, vec!["Id", "CustomerId", "Customer"]);
    }
}
