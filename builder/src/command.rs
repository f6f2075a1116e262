//! Entity commands.
//!
//! Conventions and annotation readers describe what they want as an
//! [`EntityCommand`] and hand it to [`ModelBuilder::apply`], which runs it at
//! DataAnnotation or Convention.

use crate::model_builder::ModelBuilder;
use keystone_core::{ConfigurationSource, ElementId, EntityTypeId, ModelResult, PropertyType};

/// An operation on one entity type, with members and targets named.
#[derive(Debug, Clone, PartialEq)]
pub enum EntityCommand {
    Property {
        name: String,
        ty: Option<PropertyType>,
    },
    Ignore {
        name: String,
    },
    HasKey {
        properties: Vec<String>,
    },
    PrimaryKey {
        properties: Vec<String>,
    },
    HasNoKey,
    HasIndex {
        properties: Vec<String>,
        name: Option<String>,
    },
    HasBaseType {
        base: Option<String>,
    },
    HasRelationship {
        target: String,
        navigation: Option<String>,
        inverse: Option<String>,
    },
    HasOwnership {
        target_record: String,
        navigation: String,
        inverse: Option<String>,
    },
    HasSkipNavigation {
        name: String,
        target: String,
        is_collection: bool,
    },
    ServiceProperty {
        name: String,
        service_type: Option<String>,
    },
    HasDiscriminator {
        name: Option<String>,
    },
    HasQueryFilter {
        filter: Option<String>,
    },
}

impl EntityCommand {
    /// Short name, used as a tracing field.
    pub fn kind(&self) -> &'static str {
        match self {
            EntityCommand::Property { .. } => "property",
            EntityCommand::Ignore { .. } => "ignore",
            EntityCommand::HasKey { .. } => "has_key",
            EntityCommand::PrimaryKey { .. } => "primary_key",
            EntityCommand::HasNoKey => "has_no_key",
            EntityCommand::HasIndex { .. } => "has_index",
            EntityCommand::HasBaseType { .. } => "has_base_type",
            EntityCommand::HasRelationship { .. } => "has_relationship",
            EntityCommand::HasOwnership { .. } => "has_ownership",
            EntityCommand::HasSkipNavigation { .. } => "has_skip_navigation",
            EntityCommand::ServiceProperty { .. } => "service_property",
            EntityCommand::HasDiscriminator { .. } => "has_discriminator",
            EntityCommand::HasQueryFilter { .. } => "has_query_filter",
        }
    }
}

impl ModelBuilder {
    /// Run a command against `entity`.
    ///
    /// Returns the element the command produced or touched, or `None` when
    /// it lost to stronger configuration. Commands that only report success
    /// return the entity type itself.
    pub fn apply(
        &mut self,
        entity: EntityTypeId,
        command: &EntityCommand,
        from_data_annotation: bool,
    ) -> ModelResult<Option<ElementId>> {
        let source = ConfigurationSource::from_data_annotation(from_data_annotation);
        tracing::trace!(
            target: "keystone::builder",
            %entity,
            command = command.kind(),
            %source,
            "applying command"
        );
        let touched = |applied: bool| applied.then_some(ElementId::from(entity));
        let mut builder = self.entity_builder(entity)?;

        let outcome = match command {
            EntityCommand::Property { name, ty } => {
                builder.property(name, *ty, source)?.map(ElementId::from)
            }
            EntityCommand::Ignore { name } => touched(builder.ignore(name, source)?),
            EntityCommand::HasKey { properties } => {
                builder.has_key(&names(properties), source)?.map(ElementId::from)
            }
            EntityCommand::PrimaryKey { properties } => builder
                .primary_key(&names(properties), source)?
                .map(ElementId::from),
            EntityCommand::HasNoKey => touched(builder.has_no_key_all(source)?),
            EntityCommand::HasIndex { properties, name } => {
                let index = match name {
                    Some(name) => builder.has_index_named(&names(properties), name, source)?,
                    None => builder.has_index(&names(properties), source)?,
                };
                index.map(ElementId::from)
            }
            EntityCommand::HasBaseType { base } => {
                let applied = builder.has_base_type(base.as_deref(), source)?.is_some();
                touched(applied)
            }
            EntityCommand::HasRelationship {
                target,
                navigation,
                inverse,
            } => builder
                .has_relationship(target, navigation.as_deref(), inverse.as_deref(), source)?
                .map(ElementId::from),
            EntityCommand::HasOwnership {
                target_record,
                navigation,
                inverse,
            } => builder
                .has_ownership(target_record, navigation, inverse.as_deref(), source)?
                .map(ElementId::from),
            EntityCommand::HasSkipNavigation {
                name,
                target,
                is_collection,
            } => builder
                .has_skip_navigation(name, target, *is_collection, false, source)?
                .map(ElementId::from),
            EntityCommand::ServiceProperty { name, service_type } => builder
                .service_property(name, service_type.as_deref(), source)?
                .map(ElementId::from),
            EntityCommand::HasDiscriminator { name } => builder
                .has_discriminator(name.as_deref(), None, source)?
                .map(ElementId::from),
            EntityCommand::HasQueryFilter { filter } => {
                touched(builder.has_query_filter(filter.as_deref(), source)?)
            }
        };
        Ok(outcome)
    }
}

fn names(owned: &[String]) -> Vec<&str> {
    owned.iter().map(String::as_str).collect()
}
