//! Name-based element identities.
//!
//! Conventions run at the end of a batch may replace an element with an
//! equivalent one (a key moved to the new root, a foreign key rebuilt on
//! other properties). An identity captures the element by names so the
//! caller's id can be re-resolved afterwards.

use crate::model::Model;
use keystone_core::{
    ElementId, EntityTypeId, ForeignKeyId, IndexId, KeyId, PropertyId, ServicePropertyId,
    SkipNavigationId,
};

/// An element described by names rather than ids.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ElementIdentity {
    EntityType {
        name: String,
    },
    Property {
        entity: String,
        name: String,
    },
    Key {
        entity: String,
        properties: Vec<String>,
    },
    Index {
        entity: String,
        properties: Vec<String>,
        name: Option<String>,
    },
    ForeignKey {
        dependent: String,
        properties: Vec<String>,
        principal: String,
        principal_key: Vec<String>,
    },
    SkipNavigation {
        entity: String,
        name: String,
    },
    ServiceProperty {
        entity: String,
        name: String,
    },
}

impl Model {
    /// Capture the identity of a live element.
    pub fn identity_of(&self, element: ElementId) -> Option<ElementIdentity> {
        match element {
            ElementId::EntityType(id) => {
                self.entities.get(id).map(|e| ElementIdentity::EntityType {
                    name: e.name.clone(),
                })
            }
            ElementId::Property(id) => self.properties.get(id).map(|p| ElementIdentity::Property {
                entity: self.entity_name(p.entity),
                name: p.name.clone(),
            }),
            ElementId::Key(id) => self.keys.get(id).map(|k| ElementIdentity::Key {
                entity: self.entity_name(k.entity),
                properties: self.property_names(&k.properties),
            }),
            ElementId::Index(id) => self.indexes.get(id).map(|i| ElementIdentity::Index {
                entity: self.entity_name(i.entity),
                properties: self.property_names(&i.properties),
                name: i.name.clone(),
            }),
            ElementId::ForeignKey(id) => {
                let fk = self.foreign_keys.get(id)?;
                let key = self.keys.get(fk.principal_key)?;
                Some(ElementIdentity::ForeignKey {
                    dependent: self.entity_name(fk.dependent),
                    properties: self.property_names(&fk.properties),
                    principal: self.entity_name(fk.principal),
                    principal_key: self.property_names(&key.properties),
                })
            }
            ElementId::SkipNavigation(id) => {
                self.skip_navigations
                    .get(id)
                    .map(|s| ElementIdentity::SkipNavigation {
                        entity: self.entity_name(s.entity),
                        name: s.name.clone(),
                    })
            }
            ElementId::ServiceProperty(id) => {
                self.service_properties
                    .get(id)
                    .map(|s| ElementIdentity::ServiceProperty {
                        entity: self.entity_name(s.entity),
                        name: s.name.clone(),
                    })
            }
        }
    }

    /// Find the element an identity currently describes.
    pub fn resolve_identity(&self, identity: &ElementIdentity) -> Option<ElementId> {
        match identity {
            ElementIdentity::EntityType { name } => {
                self.find_entity_type(name).map(ElementId::from)
            }
            ElementIdentity::Property { entity, name } => {
                let entity = self.find_entity_type(entity)?;
                self.find_property(entity, name).map(ElementId::from)
            }
            ElementIdentity::Key { entity, properties } => {
                let entity = self.find_entity_type(entity)?;
                let properties = self.find_properties(entity, properties)?;
                self.find_key(entity, &properties).map(ElementId::from)
            }
            ElementIdentity::Index {
                entity,
                properties,
                name,
            } => {
                let entity = self.find_entity_type(entity)?;
                match name {
                    Some(name) => self.find_index_by_name(entity, name),
                    None => {
                        let properties = self.find_properties(entity, properties)?;
                        self.find_index(entity, &properties)
                    }
                }
                .map(ElementId::from)
            }
            ElementIdentity::ForeignKey {
                dependent,
                properties,
                principal,
                principal_key,
            } => {
                let dependent = self.find_entity_type(dependent)?;
                let principal = self.find_entity_type(principal)?;
                let properties = self.find_properties(dependent, properties)?;
                let key_properties = self.find_properties(principal, principal_key)?;
                let key = self.find_key(principal, &key_properties)?;
                self.foreign_keys_of(dependent)
                    .into_iter()
                    .find(|id| {
                        self.foreign_keys.get(*id).is_some_and(|fk| {
                            fk.properties == properties
                                && fk.principal_key == key
                                && self.in_same_hierarchy(fk.principal, principal)
                        })
                    })
                    .map(ElementId::from)
            }
            ElementIdentity::SkipNavigation { entity, name } => {
                let entity = self.find_entity_type(entity)?;
                self.find_skip_navigation(entity, name).map(ElementId::from)
            }
            ElementIdentity::ServiceProperty { entity, name } => {
                let entity = self.find_entity_type(entity)?;
                self.find_service_property(entity, name).map(ElementId::from)
            }
        }
    }

    /// Returns true if the element is still part of the model.
    pub fn contains(&self, element: ElementId) -> bool {
        match element {
            ElementId::EntityType(id) => self.entities.contains(id),
            ElementId::Property(id) => self.properties.contains(id),
            ElementId::Key(id) => self.keys.contains(id),
            ElementId::Index(id) => self.indexes.contains(id),
            ElementId::ForeignKey(id) => self.foreign_keys.contains(id),
            ElementId::SkipNavigation(id) => self.skip_navigations.contains(id),
            ElementId::ServiceProperty(id) => self.service_properties.contains(id),
        }
    }
}

/// A value that can be carried across a convention pass.
///
/// `track` captures what is needed before the pass; `resolve` maps the value
/// onto the model as it stands afterwards. Plain values resolve to themselves.
pub trait Trackable: Sized {
    fn track(&self, model: &Model) -> Option<ElementIdentity>;
    fn resolve(self, identity: Option<&ElementIdentity>, model: &Model) -> Option<Self>;
}

macro_rules! trackable_id {
    ($($id:ident => $variant:ident),* $(,)?) => {
        $(
            impl Trackable for $id {
                fn track(&self, model: &Model) -> Option<ElementIdentity> {
                    model.identity_of(ElementId::from(*self))
                }

                fn resolve(self, identity: Option<&ElementIdentity>, model: &Model) -> Option<Self> {
                    if model.contains(ElementId::from(self)) {
                        return Some(self);
                    }
                    match model.resolve_identity(identity?) {
                        Some(ElementId::$variant(id)) => Some(id),
                        _ => None,
                    }
                }
            }
        )*
    };
}

trackable_id!(
    EntityTypeId => EntityType,
    PropertyId => Property,
    KeyId => Key,
    IndexId => Index,
    ForeignKeyId => ForeignKey,
    SkipNavigationId => SkipNavigation,
    ServicePropertyId => ServiceProperty,
);

impl<T: Trackable> Trackable for Option<T> {
    fn track(&self, model: &Model) -> Option<ElementIdentity> {
        self.as_ref()?.track(model)
    }

    fn resolve(self, identity: Option<&ElementIdentity>, model: &Model) -> Option<Self> {
        match self {
            Some(value) => value.resolve(identity, model).map(Some),
            None => Some(None),
        }
    }
}

impl Trackable for () {
    fn track(&self, _model: &Model) -> Option<ElementIdentity> {
        None
    }

    fn resolve(self, _identity: Option<&ElementIdentity>, _model: &Model) -> Option<Self> {
        Some(self)
    }
}

impl Trackable for bool {
    fn track(&self, _model: &Model) -> Option<ElementIdentity> {
        None
    }

    fn resolve(self, _identity: Option<&ElementIdentity>, _model: &Model) -> Option<Self> {
        Some(self)
    }
}
