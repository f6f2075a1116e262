//! Element definitions of the schema graph.
//!
//! Every element records the configuration source that established it, and
//! most configurable facets carry their own source next to the value.

use keystone_core::{
    ConfigurationSource, EntityTypeId, ForeignKeyId, IndexId, KeyId, PropertyId, PropertyType,
    ServicePropertyId, SkipNavigationId,
};
use std::collections::BTreeMap;

/// An entity type.
#[derive(Debug, Clone)]
pub struct EntityType {
    pub id: EntityTypeId,
    /// Unique name. Defining-navigation types use `Owner.Navigation#Record`.
    pub name: String,
    /// Backing record, if any. Entities without one are shadow-only.
    pub record: Option<String>,
    pub source: ConfigurationSource,

    pub base: Option<EntityTypeId>,
    pub base_source: Option<ConfigurationSource>,
    /// Set for owned types that only exist under one owner navigation.
    pub defining: Option<DefiningNavigation>,

    pub properties: Vec<PropertyId>,
    pub keys: Vec<KeyId>,
    pub primary_key: Option<KeyId>,
    pub primary_key_source: Option<ConfigurationSource>,
    pub indexes: Vec<IndexId>,
    /// Foreign keys declared with this entity as the dependent.
    pub foreign_keys: Vec<ForeignKeyId>,
    pub skip_navigations: Vec<SkipNavigationId>,
    pub service_properties: Vec<ServicePropertyId>,
    pub ignored: BTreeMap<String, ConfigurationSource>,

    pub is_keyless: bool,
    pub keyless_source: Option<ConfigurationSource>,

    pub discriminator: Option<PropertyId>,
    pub discriminator_source: Option<ConfigurationSource>,
    pub discriminator_value: Option<String>,
    pub discriminator_value_source: Option<ConfigurationSource>,

    pub query_filter: Option<String>,
    pub query_filter_source: Option<ConfigurationSource>,
    pub change_tracking: Option<ChangeTrackingStrategy>,
    pub change_tracking_source: Option<ConfigurationSource>,
    pub access_mode: Option<PropertyAccessMode>,
    pub access_mode_source: Option<ConfigurationSource>,
}

impl EntityType {
    pub(crate) fn new(
        id: EntityTypeId,
        name: String,
        record: Option<String>,
        source: ConfigurationSource,
        defining: Option<DefiningNavigation>,
    ) -> Self {
        Self {
            id,
            name,
            record,
            source,
            base: None,
            base_source: None,
            defining,
            properties: Vec::new(),
            keys: Vec::new(),
            primary_key: None,
            primary_key_source: None,
            indexes: Vec::new(),
            foreign_keys: Vec::new(),
            skip_navigations: Vec::new(),
            service_properties: Vec::new(),
            ignored: BTreeMap::new(),
            is_keyless: false,
            keyless_source: None,
            discriminator: None,
            discriminator_source: None,
            discriminator_value: None,
            discriminator_value_source: None,
            query_filter: None,
            query_filter_source: None,
            change_tracking: None,
            change_tracking_source: None,
            access_mode: None,
            access_mode_source: None,
        }
    }

    /// Short name used for synthesized property names.
    pub fn short_name(&self) -> &str {
        match &self.defining {
            Some(_) => self
                .name
                .rsplit_once('#')
                .map(|(_, record)| record)
                .unwrap_or(&self.name),
            None => &self.name,
        }
    }
}

/// The owner navigation that gives a defining-navigation type its identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefiningNavigation {
    pub entity: EntityTypeId,
    pub navigation: String,
}

/// A scalar property.
#[derive(Debug, Clone)]
pub struct Property {
    pub id: PropertyId,
    pub entity: EntityTypeId,
    pub name: String,
    pub ty: PropertyType,
    pub type_source: Option<ConfigurationSource>,
    pub source: ConfigurationSource,
    /// No backing record member.
    pub is_shadow: bool,
    pub is_nullable: bool,
    pub nullable_source: Option<ConfigurationSource>,
    pub value_generated: ValueGenerated,
    pub value_generated_source: Option<ConfigurationSource>,
}

impl Property {
    /// Shadow properties created by a convention may be dropped when unused.
    pub fn is_implicitly_created(&self) -> bool {
        self.is_shadow && self.source == ConfigurationSource::Convention
    }
}

/// A key: an ordered set of properties that identify an instance.
#[derive(Debug, Clone)]
pub struct Key {
    pub id: KeyId,
    pub entity: EntityTypeId,
    pub properties: Vec<PropertyId>,
    pub source: ConfigurationSource,
}

/// An index over an ordered set of properties.
#[derive(Debug, Clone)]
pub struct Index {
    pub id: IndexId,
    pub entity: EntityTypeId,
    pub name: Option<String>,
    pub properties: Vec<PropertyId>,
    pub source: ConfigurationSource,
    pub is_unique: bool,
    pub unique_source: Option<ConfigurationSource>,
}

/// A navigation carried by a foreign key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Navigation {
    pub name: String,
    pub source: ConfigurationSource,
}

/// A relationship between a dependent and a principal entity type.
#[derive(Debug, Clone)]
pub struct ForeignKey {
    pub id: ForeignKeyId,
    pub source: ConfigurationSource,

    pub dependent: EntityTypeId,
    pub properties: Vec<PropertyId>,
    pub properties_source: Option<ConfigurationSource>,

    pub principal: EntityTypeId,
    pub principal_key: KeyId,
    pub principal_key_source: Option<ConfigurationSource>,
    /// Source of the decision which side is principal.
    pub principal_end_source: Option<ConfigurationSource>,

    /// Declared on the dependent, points at the principal.
    pub dependent_to_principal: Option<Navigation>,
    /// Declared on the principal, points at the dependent.
    pub principal_to_dependent: Option<Navigation>,

    pub is_required: bool,
    pub required_source: Option<ConfigurationSource>,
    pub is_unique: bool,
    pub unique_source: Option<ConfigurationSource>,
    pub is_ownership: bool,
    pub ownership_source: Option<ConfigurationSource>,
    pub delete_behavior: DeleteBehavior,
    pub delete_behavior_source: Option<ConfigurationSource>,
}

impl ForeignKey {
    /// The navigation on the given end.
    pub fn navigation(&self, on_dependent: bool) -> Option<&Navigation> {
        if on_dependent {
            self.dependent_to_principal.as_ref()
        } else {
            self.principal_to_dependent.as_ref()
        }
    }

    /// Returns true if both ends are the same entity type.
    pub fn is_self_referencing(&self) -> bool {
        self.dependent == self.principal
    }
}

/// A many-to-many navigation without an owning foreign key on either side.
#[derive(Debug, Clone)]
pub struct SkipNavigation {
    pub id: SkipNavigationId,
    pub entity: EntityTypeId,
    pub name: String,
    pub target: EntityTypeId,
    pub source: ConfigurationSource,
    pub is_collection: bool,
    pub is_on_dependent: bool,
    /// Join foreign key whose principal is the declaring entity.
    pub foreign_key: Option<ForeignKeyId>,
    pub foreign_key_source: Option<ConfigurationSource>,
    pub inverse: Option<SkipNavigationId>,
    pub inverse_source: Option<ConfigurationSource>,
}

/// A member bound to an injected service rather than stored data.
#[derive(Debug, Clone)]
pub struct ServiceProperty {
    pub id: ServicePropertyId,
    pub entity: EntityTypeId,
    pub name: String,
    pub service_type: String,
    pub source: ConfigurationSource,
}

/// What happens to dependents when the principal is deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DeleteBehavior {
    /// Dependents are deleted.
    Cascade,
    /// Deletion is refused while dependents exist.
    Restrict,
    /// Dependent foreign key values are nulled.
    SetNull,
    /// Nulled only for tracked dependents.
    #[default]
    ClientSetNull,
}

/// When a property value is generated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ValueGenerated {
    #[default]
    Never,
    OnAdd,
    OnAddOrUpdate,
}

/// How changes to instances are detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeTrackingStrategy {
    Snapshot,
    ChangedNotifications,
    ChangingAndChangedNotifications,
}

/// Whether members are read through their field or their accessor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PropertyAccessMode {
    Field,
    FieldDuringConstruction,
    Property,
    PreferField,
    PreferProperty,
}
