//! Model error types.
//!
//! Precedence conflicts are not errors: builder operations report them by
//! returning `None`. Everything here is an invariant violation that the
//! caller has to fix.

use crate::ElementId;
use thiserror::Error;

/// Result type for model operations.
pub type ModelResult<T> = Result<T, ModelError>;

/// Errors that can occur while building or mutating the schema graph.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ModelError {
    #[error("Unknown entity type: {name}")]
    UnknownEntityType { name: String },

    #[error("Entity type already exists: {name}")]
    DuplicateEntityType { name: String },

    #[error("Cannot remove entity type {entity}: still used by {user}")]
    EntityTypeInUse { entity: String, user: String },

    #[error("Element {element} is no longer part of the model")]
    Orphaned { element: ElementId },

    #[error("Cannot configure '{property}' on {entity} as a property: it is a navigation")]
    PropertyCalledOnNavigation { entity: String, property: String },

    #[error("Property '{property}' on {entity} has no type and no backing member")]
    NoPropertyType { entity: String, property: String },

    #[error("Cannot ignore '{member}' on {entity}: it is declared on base type {base}")]
    InheritedMemberCannotBeIgnored {
        entity: String,
        member: String,
        base: String,
    },

    #[error("Member '{member}' on {entity} conflicts with an existing {existing}")]
    ConflictingMember {
        entity: String,
        member: String,
        existing: String,
    },

    #[error("Member '{member}' of {entity} conflicts with a different kind of member on base {base}")]
    DuplicateMemberOnBase {
        entity: String,
        base: String,
        member: String,
    },

    #[error("Setting {base} as base of {entity} would create an inheritance cycle")]
    CircularInheritance { entity: String, base: String },

    #[error("Cannot define a key on {entity}: keys belong to the root type {root}")]
    DerivedEntityTypeKey { entity: String, root: String },

    #[error("A key must contain at least one property ({entity})")]
    EmptyKey { entity: String },

    #[error("Key {{{properties}}} on {entity} is referenced by foreign key on {dependent}")]
    KeyInUse {
        entity: String,
        properties: String,
        dependent: String,
    },

    #[error("Property '{property}' on {entity} is in use by a {user}")]
    PropertyInUse {
        entity: String,
        property: String,
        user: String,
    },

    #[error("Foreign key on {dependent} has {dependent_count} properties but principal key on {principal} has {principal_count}")]
    ForeignKeyCountMismatch {
        dependent: String,
        principal: String,
        dependent_count: usize,
        principal_count: usize,
    },

    #[error("Foreign key property '{property}' ({dependent_type}) is not compatible with principal key property '{principal_property}' ({principal_type})")]
    ForeignKeyTypeMismatch {
        property: String,
        dependent_type: String,
        principal_property: String,
        principal_type: String,
    },

    #[error("Property '{property}' does not belong to the hierarchy of {entity}")]
    PropertyNotInHierarchy { entity: String, property: String },

    #[error("An index named '{name}' already exists on {entity} with different properties")]
    DuplicateNamedIndex { entity: String, name: String },

    #[error("Skip navigation '{navigation}' on {entity} cannot use a foreign key whose principal is {principal}")]
    SkipNavigationForeignKeyMismatch {
        entity: String,
        navigation: String,
        principal: String,
    },

    #[error("Skip navigation '{navigation}' cannot be the inverse of '{inverse}'")]
    SkipNavigationInverseMismatch { navigation: String, inverse: String },

    #[error("Invalid name '{name}': {reason}")]
    InvalidName { name: String, reason: String },

    #[error("Unknown record type: {name}")]
    UnknownRecord { name: String },

    #[error("Convention batch closed out of order: expected depth {expected}, got {actual}")]
    BatchOutOfOrder { expected: usize, actual: usize },

    #[error("Convention pass did not settle after {limit} events")]
    ConventionOverflow { limit: usize },
}

impl ModelError {
    pub fn unknown_entity_type(name: impl Into<String>) -> Self {
        ModelError::UnknownEntityType { name: name.into() }
    }

    pub fn duplicate_entity_type(name: impl Into<String>) -> Self {
        ModelError::DuplicateEntityType { name: name.into() }
    }

    pub fn entity_type_in_use(entity: impl Into<String>, user: impl Into<String>) -> Self {
        ModelError::EntityTypeInUse {
            entity: entity.into(),
            user: user.into(),
        }
    }

    pub fn orphaned(element: impl Into<ElementId>) -> Self {
        ModelError::Orphaned {
            element: element.into(),
        }
    }

    pub fn property_called_on_navigation(
        entity: impl Into<String>,
        property: impl Into<String>,
    ) -> Self {
        ModelError::PropertyCalledOnNavigation {
            entity: entity.into(),
            property: property.into(),
        }
    }

    pub fn no_property_type(entity: impl Into<String>, property: impl Into<String>) -> Self {
        ModelError::NoPropertyType {
            entity: entity.into(),
            property: property.into(),
        }
    }

    pub fn inherited_member_cannot_be_ignored(
        entity: impl Into<String>,
        member: impl Into<String>,
        base: impl Into<String>,
    ) -> Self {
        ModelError::InheritedMemberCannotBeIgnored {
            entity: entity.into(),
            member: member.into(),
            base: base.into(),
        }
    }

    pub fn conflicting_member(
        entity: impl Into<String>,
        member: impl Into<String>,
        existing: impl Into<String>,
    ) -> Self {
        ModelError::ConflictingMember {
            entity: entity.into(),
            member: member.into(),
            existing: existing.into(),
        }
    }

    pub fn duplicate_member_on_base(
        entity: impl Into<String>,
        base: impl Into<String>,
        member: impl Into<String>,
    ) -> Self {
        ModelError::DuplicateMemberOnBase {
            entity: entity.into(),
            base: base.into(),
            member: member.into(),
        }
    }

    pub fn circular_inheritance(entity: impl Into<String>, base: impl Into<String>) -> Self {
        ModelError::CircularInheritance {
            entity: entity.into(),
            base: base.into(),
        }
    }

    pub fn derived_entity_type_key(entity: impl Into<String>, root: impl Into<String>) -> Self {
        ModelError::DerivedEntityTypeKey {
            entity: entity.into(),
            root: root.into(),
        }
    }

    pub fn empty_key(entity: impl Into<String>) -> Self {
        ModelError::EmptyKey {
            entity: entity.into(),
        }
    }

    pub fn key_in_use(
        entity: impl Into<String>,
        properties: impl Into<String>,
        dependent: impl Into<String>,
    ) -> Self {
        ModelError::KeyInUse {
            entity: entity.into(),
            properties: properties.into(),
            dependent: dependent.into(),
        }
    }

    pub fn property_in_use(
        entity: impl Into<String>,
        property: impl Into<String>,
        user: impl Into<String>,
    ) -> Self {
        ModelError::PropertyInUse {
            entity: entity.into(),
            property: property.into(),
            user: user.into(),
        }
    }

    pub fn foreign_key_count_mismatch(
        dependent: impl Into<String>,
        principal: impl Into<String>,
        dependent_count: usize,
        principal_count: usize,
    ) -> Self {
        ModelError::ForeignKeyCountMismatch {
            dependent: dependent.into(),
            principal: principal.into(),
            dependent_count,
            principal_count,
        }
    }

    pub fn foreign_key_type_mismatch(
        property: impl Into<String>,
        dependent_type: impl Into<String>,
        principal_property: impl Into<String>,
        principal_type: impl Into<String>,
    ) -> Self {
        ModelError::ForeignKeyTypeMismatch {
            property: property.into(),
            dependent_type: dependent_type.into(),
            principal_property: principal_property.into(),
            principal_type: principal_type.into(),
        }
    }

    pub fn property_not_in_hierarchy(
        entity: impl Into<String>,
        property: impl Into<String>,
    ) -> Self {
        ModelError::PropertyNotInHierarchy {
            entity: entity.into(),
            property: property.into(),
        }
    }

    pub fn duplicate_named_index(entity: impl Into<String>, name: impl Into<String>) -> Self {
        ModelError::DuplicateNamedIndex {
            entity: entity.into(),
            name: name.into(),
        }
    }

    pub fn skip_navigation_foreign_key_mismatch(
        entity: impl Into<String>,
        navigation: impl Into<String>,
        principal: impl Into<String>,
    ) -> Self {
        ModelError::SkipNavigationForeignKeyMismatch {
            entity: entity.into(),
            navigation: navigation.into(),
            principal: principal.into(),
        }
    }

    pub fn skip_navigation_inverse_mismatch(
        navigation: impl Into<String>,
        inverse: impl Into<String>,
    ) -> Self {
        ModelError::SkipNavigationInverseMismatch {
            navigation: navigation.into(),
            inverse: inverse.into(),
        }
    }

    pub fn invalid_name(name: impl Into<String>, reason: impl Into<String>) -> Self {
        ModelError::InvalidName {
            name: name.into(),
            reason: reason.into(),
        }
    }

    pub fn unknown_record(name: impl Into<String>) -> Self {
        ModelError::UnknownRecord { name: name.into() }
    }

    pub fn batch_out_of_order(expected: usize, actual: usize) -> Self {
        ModelError::BatchOutOfOrder { expected, actual }
    }

    pub fn convention_overflow(limit: usize) -> Self {
        ModelError::ConventionOverflow { limit }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::KeyId;

    #[test]
    fn test_error_messages() {
        let err = ModelError::property_called_on_navigation("Order", "Customer");
        assert_eq!(
            err.to_string(),
            "Cannot configure 'Customer' on Order as a property: it is a navigation"
        );

        let err = ModelError::orphaned(KeyId::new(4));
        assert_eq!(err.to_string(), "Element k4 is no longer part of the model");

        let err = ModelError::key_in_use("Customer", "Id", "Order");
        assert_eq!(
            err.to_string(),
            "Key {Id} on Customer is referenced by foreign key on Order"
        );
    }
}
