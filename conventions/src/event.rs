//! Model events.

use keystone_core::{
    EntityTypeId, ForeignKeyId, IndexId, KeyId, PropertyId, ServicePropertyId, SkipNavigationId,
};
use std::fmt;

/// A structural change to the schema graph.
///
/// Events carry ids at the time of the change. By the time a delayed event
/// is dispatched the element may be gone; conventions must look it up and
/// skip it if so. Removal events carry names for that reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelEvent {
    EntityTypeAdded {
        entity: EntityTypeId,
    },
    EntityTypeRemoved {
        name: String,
    },
    BaseTypeChanged {
        entity: EntityTypeId,
        new_base: Option<EntityTypeId>,
        old_base: Option<EntityTypeId>,
    },
    PropertyAdded {
        property: PropertyId,
    },
    PropertyRemoved {
        entity: EntityTypeId,
        name: String,
    },
    KeyAdded {
        key: KeyId,
    },
    KeyRemoved {
        entity: EntityTypeId,
        properties: Vec<String>,
    },
    PrimaryKeyChanged {
        entity: EntityTypeId,
        new_key: Option<KeyId>,
        old_key: Option<KeyId>,
    },
    IndexAdded {
        index: IndexId,
    },
    IndexRemoved {
        entity: EntityTypeId,
        properties: Vec<String>,
    },
    ForeignKeyAdded {
        foreign_key: ForeignKeyId,
    },
    ForeignKeyRemoved {
        dependent: EntityTypeId,
        principal: EntityTypeId,
    },
    NavigationAdded {
        foreign_key: ForeignKeyId,
        on_dependent: bool,
    },
    NavigationRemoved {
        entity: EntityTypeId,
        name: String,
    },
    SkipNavigationAdded {
        skip_navigation: SkipNavigationId,
    },
    SkipNavigationRemoved {
        entity: EntityTypeId,
        name: String,
    },
    ServicePropertyAdded {
        service_property: ServicePropertyId,
    },
    ServicePropertyRemoved {
        entity: EntityTypeId,
        name: String,
    },
    MemberIgnored {
        entity: EntityTypeId,
        name: String,
    },
    KeylessChanged {
        entity: EntityTypeId,
        keyless: bool,
    },
    DiscriminatorChanged {
        entity: EntityTypeId,
    },
    OwnershipChanged {
        foreign_key: ForeignKeyId,
    },
}

impl ModelEvent {
    /// Short kind name, used as a tracing field.
    pub fn kind(&self) -> &'static str {
        match self {
            ModelEvent::EntityTypeAdded { .. } => "entity_type_added",
            ModelEvent::EntityTypeRemoved { .. } => "entity_type_removed",
            ModelEvent::BaseTypeChanged { .. } => "base_type_changed",
            ModelEvent::PropertyAdded { .. } => "property_added",
            ModelEvent::PropertyRemoved { .. } => "property_removed",
            ModelEvent::KeyAdded { .. } => "key_added",
            ModelEvent::KeyRemoved { .. } => "key_removed",
            ModelEvent::PrimaryKeyChanged { .. } => "primary_key_changed",
            ModelEvent::IndexAdded { .. } => "index_added",
            ModelEvent::IndexRemoved { .. } => "index_removed",
            ModelEvent::ForeignKeyAdded { .. } => "foreign_key_added",
            ModelEvent::ForeignKeyRemoved { .. } => "foreign_key_removed",
            ModelEvent::NavigationAdded { .. } => "navigation_added",
            ModelEvent::NavigationRemoved { .. } => "navigation_removed",
            ModelEvent::SkipNavigationAdded { .. } => "skip_navigation_added",
            ModelEvent::SkipNavigationRemoved { .. } => "skip_navigation_removed",
            ModelEvent::ServicePropertyAdded { .. } => "service_property_added",
            ModelEvent::ServicePropertyRemoved { .. } => "service_property_removed",
            ModelEvent::MemberIgnored { .. } => "member_ignored",
            ModelEvent::KeylessChanged { .. } => "keyless_changed",
            ModelEvent::DiscriminatorChanged { .. } => "discriminator_changed",
            ModelEvent::OwnershipChanged { .. } => "ownership_changed",
        }
    }
}

impl fmt::Display for ModelEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelEvent::EntityTypeAdded { entity } => write!(f, "entity type {} added", entity),
            ModelEvent::EntityTypeRemoved { name } => write!(f, "entity type {} removed", name),
            ModelEvent::BaseTypeChanged { entity, new_base, .. } => match new_base {
                Some(base) => write!(f, "base of {} set to {}", entity, base),
                None => write!(f, "base of {} cleared", entity),
            },
            ModelEvent::PropertyAdded { property } => write!(f, "property {} added", property),
            ModelEvent::PropertyRemoved { entity, name } => {
                write!(f, "property {}.{} removed", entity, name)
            }
            ModelEvent::KeyAdded { key } => write!(f, "key {} added", key),
            ModelEvent::KeyRemoved { entity, properties } => {
                write!(f, "key {{{}}} on {} removed", properties.join(", "), entity)
            }
            ModelEvent::PrimaryKeyChanged { entity, .. } => {
                write!(f, "primary key of {} changed", entity)
            }
            ModelEvent::IndexAdded { index } => write!(f, "index {} added", index),
            ModelEvent::IndexRemoved { entity, properties } => {
                write!(f, "index {{{}}} on {} removed", properties.join(", "), entity)
            }
            ModelEvent::ForeignKeyAdded { foreign_key } => {
                write!(f, "foreign key {} added", foreign_key)
            }
            ModelEvent::ForeignKeyRemoved {
                dependent,
                principal,
            } => write!(f, "foreign key {} -> {} removed", dependent, principal),
            ModelEvent::NavigationAdded {
                foreign_key,
                on_dependent,
            } => write!(
                f,
                "navigation on {} end of {} added",
                if *on_dependent { "dependent" } else { "principal" },
                foreign_key
            ),
            ModelEvent::NavigationRemoved { entity, name } => {
                write!(f, "navigation {}.{} removed", entity, name)
            }
            ModelEvent::SkipNavigationAdded { skip_navigation } => {
                write!(f, "skip navigation {} added", skip_navigation)
            }
            ModelEvent::SkipNavigationRemoved { entity, name } => {
                write!(f, "skip navigation {}.{} removed", entity, name)
            }
            ModelEvent::ServicePropertyAdded { service_property } => {
                write!(f, "service property {} added", service_property)
            }
            ModelEvent::ServicePropertyRemoved { entity, name } => {
                write!(f, "service property {}.{} removed", entity, name)
            }
            ModelEvent::MemberIgnored { entity, name } => {
                write!(f, "member {}.{} ignored", entity, name)
            }
            ModelEvent::KeylessChanged { entity, keyless } => {
                write!(f, "{} keyless = {}", entity, keyless)
            }
            ModelEvent::DiscriminatorChanged { entity } => {
                write!(f, "discriminator of {} changed", entity)
            }
            ModelEvent::OwnershipChanged { foreign_key } => {
                write!(f, "ownership of {} changed", foreign_key)
            }
        }
    }
}
