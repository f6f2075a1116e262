//! Identity types for schema graph elements.
//!
//! All identifiers are 32-bit values that are:
//! - Unique within their element kind
//! - Never reused once the element is removed
//! - Opaque to external users

use std::fmt;

macro_rules! element_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub u32);

        impl $name {
            /// Create a new id from a raw value.
            pub fn new(id: u32) -> Self {
                Self(id)
            }

            /// Get the raw value.
            pub fn raw(&self) -> u32 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "{}"), self.0)
            }
        }
    };
}

element_id!(
    /// Identifier for an entity type.
    EntityTypeId,
    "et"
);
element_id!(
    /// Identifier for a scalar property.
    PropertyId,
    "p"
);
element_id!(
    /// Identifier for a key.
    KeyId,
    "k"
);
element_id!(
    /// Identifier for an index.
    IndexId,
    "ix"
);
element_id!(
    /// Identifier for a foreign key (and the navigations it carries).
    ForeignKeyId,
    "fk"
);
element_id!(
    /// Identifier for a skip navigation.
    SkipNavigationId,
    "sn"
);
element_id!(
    /// Identifier for a service property.
    ServicePropertyId,
    "sp"
);

/// Unified reference to any element of the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementId {
    EntityType(EntityTypeId),
    Property(PropertyId),
    Key(KeyId),
    Index(IndexId),
    ForeignKey(ForeignKeyId),
    SkipNavigation(SkipNavigationId),
    ServiceProperty(ServicePropertyId),
}

impl ElementId {
    /// Short name of the element kind, used in diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            ElementId::EntityType(_) => "entity type",
            ElementId::Property(_) => "property",
            ElementId::Key(_) => "key",
            ElementId::Index(_) => "index",
            ElementId::ForeignKey(_) => "foreign key",
            ElementId::SkipNavigation(_) => "skip navigation",
            ElementId::ServiceProperty(_) => "service property",
        }
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ElementId::EntityType(id) => write!(f, "{}", id),
            ElementId::Property(id) => write!(f, "{}", id),
            ElementId::Key(id) => write!(f, "{}", id),
            ElementId::Index(id) => write!(f, "{}", id),
            ElementId::ForeignKey(id) => write!(f, "{}", id),
            ElementId::SkipNavigation(id) => write!(f, "{}", id),
            ElementId::ServiceProperty(id) => write!(f, "{}", id),
        }
    }
}

macro_rules! element_from {
    ($($id:ident => $variant:ident),* $(,)?) => {
        $(
            impl From<$id> for ElementId {
                fn from(id: $id) -> Self {
                    ElementId::$variant(id)
                }
            }
        )*
    };
}

element_from!(
    EntityTypeId => EntityType,
    PropertyId => Property,
    KeyId => Key,
    IndexId => Index,
    ForeignKeyId => ForeignKey,
    SkipNavigationId => SkipNavigation,
    ServicePropertyId => ServiceProperty,
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_prefixes() {
        assert_eq!(EntityTypeId::new(3).to_string(), "et3");
        assert_eq!(ForeignKeyId::new(0).to_string(), "fk0");
        assert_eq!(ElementId::from(KeyId::new(7)).to_string(), "k7");
    }

    #[test]
    fn test_element_kind() {
        assert_eq!(ElementId::from(PropertyId::new(1)).kind(), "property");
        assert_eq!(
            ElementId::from(SkipNavigationId::new(1)).kind(),
            "skip navigation"
        );
    }
}
