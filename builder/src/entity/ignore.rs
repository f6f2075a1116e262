//! Ignored member names.

use crate::model_builder::ModelBuilder;
use keystone_core::{ConfigurationSource, EntityTypeId, ModelError, ModelResult};
use keystone_metadata::MemberRef;

impl ModelBuilder {
    /// Ignore `name` on the entity type, removing whatever member holds it
    /// here and on derived types.
    pub fn ignore(
        &mut self,
        entity: EntityTypeId,
        name: &str,
        source: ConfigurationSource,
    ) -> ModelResult<bool> {
        let entity_name = self.entity_data(entity)?.name.clone();

        // A weaker ignore is re-applied in full so derived types are checked again
        if let Some(existing) = self.model.find_ignored_source(entity, name) {
            if existing.overrides(Some(source)) {
                return Ok(true);
            }
        }

        let members = self.model.find_members(entity, name);
        for member in &members {
            if let Some(declaring) = self.model.member_entity(*member).filter(|e| *e != entity) {
                return Err(ModelError::inherited_member_cannot_be_ignored(
                    &entity_name,
                    name,
                    self.model.entity_name(declaring),
                ));
            }
        }
        if !members.iter().all(|m| self.can_remove_member(*m, source)) {
            self.reject("ignore", format!("{}.{}", entity_name, name), source);
            return Ok(false);
        }

        self.batched_flag(|b| {
            b.add_ignored_raw(entity, name, source)?;
            for member in members {
                b.remove_member(member, source)?;
            }

            for derived in b.model.all_derived_types(entity) {
                if let Some(derived_source) = b.model.find_declared_ignored_source(derived, name) {
                    if source.overrides(Some(derived_source)) {
                        b.model.remove_ignored(derived, name)?;
                    }
                    continue;
                }
                for member in b.model.find_declared_members(derived, name) {
                    b.remove_derived_member(member, source)?;
                }
            }
            tracing::debug!(
                target: "keystone::builder",
                entity = %entity_name,
                member = name,
                %source,
                "member ignored"
            );
            Ok(true)
        })
    }

    /// Whether `source` may remove the member along with everything that
    /// depends on it.
    pub(crate) fn can_remove_member(&self, member: MemberRef, source: ConfigurationSource) -> bool {
        if !source.overrides(self.model.member_source(member)) {
            return false;
        }
        let MemberRef::Property(property) = member else {
            return true;
        };
        let keys = self
            .model
            .containing_keys(property)
            .into_iter()
            .filter_map(|k| self.model.key(k))
            .all(|k| source.overrides(Some(k.source)));
        let indexes = self
            .model
            .containing_indexes(property)
            .into_iter()
            .filter_map(|i| self.model.index(i))
            .all(|i| source.overrides(Some(i.source)));
        let foreign_keys = self
            .model
            .containing_foreign_keys(property)
            .into_iter()
            .filter_map(|fk| self.model.foreign_key(fk))
            .all(|fk| source.overrides(Some(fk.source.max(fk.properties_source))));
        keys && indexes && foreign_keys
    }

    /// Remove a member outright. A navigation configured apart from its
    /// foreign key only loses the navigation.
    pub(crate) fn remove_member(
        &mut self,
        member: MemberRef,
        source: ConfigurationSource,
    ) -> ModelResult<()> {
        match member {
            MemberRef::Navigation(navigation) => {
                let Some(fk) = self.model.foreign_key(navigation.foreign_key) else {
                    return Ok(());
                };
                let same_source = fk
                    .navigation(navigation.on_dependent)
                    .is_some_and(|n| n.source == fk.source);
                if same_source {
                    self.remove_relationship_internal(navigation.foreign_key)?;
                } else {
                    self.set_navigation_raw(navigation.foreign_key, navigation.on_dependent, None)?;
                }
            }
            MemberRef::Property(property) => {
                self.remove_property_internal(property, source, true)?;
            }
            MemberRef::SkipNavigation(skip) => self.remove_skip_navigation_pair(skip)?,
            MemberRef::ServiceProperty(service) => {
                if self.model.service_property(service).is_some() {
                    self.remove_service_property_raw(service)?;
                }
            }
        }
        Ok(())
    }

    fn remove_derived_member(
        &mut self,
        member: MemberRef,
        source: ConfigurationSource,
    ) -> ModelResult<()> {
        match member {
            MemberRef::Navigation(navigation) => {
                let Some(fk) = self.model.foreign_key(navigation.foreign_key) else {
                    return Ok(());
                };
                if fk.source != ConfigurationSource::Explicit {
                    self.remove_relationship_internal(navigation.foreign_key)?;
                } else {
                    self.set_navigation_raw(navigation.foreign_key, navigation.on_dependent, None)?;
                }
            }
            MemberRef::Property(property) => {
                self.remove_property_internal(
                    property,
                    source,
                    source != ConfigurationSource::Explicit,
                )?;
            }
            MemberRef::SkipNavigation(skip) => {
                let removable = self
                    .model
                    .skip_navigation(skip)
                    .is_some_and(|s| source.overrides(Some(s.source)));
                if removable {
                    self.remove_skip_navigation_pair(skip)?;
                }
            }
            MemberRef::ServiceProperty(service) => {
                let removable = self
                    .model
                    .service_property(service)
                    .is_some_and(|s| source.overrides(Some(s.source)));
                if removable {
                    self.remove_service_property_raw(service)?;
                }
            }
        }
        Ok(())
    }
}
