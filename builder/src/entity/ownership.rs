//! Owned types.

use crate::model_builder::ModelBuilder;
use keystone_core::{ConfigurationSource, EntityTypeId, ForeignKeyId, ModelResult};

impl ModelBuilder {
    /// Make `entity` the owner of the type backed by `target_record`,
    /// reached through `navigation` on the owner.
    ///
    /// A record already owned through another navigation is split: the
    /// existing owned type becomes a defining-navigation type and the new
    /// owner gets one of its own.
    pub fn has_ownership(
        &mut self,
        entity: EntityTypeId,
        target_record: &str,
        navigation: &str,
        inverse: Option<&str>,
        source: ConfigurationSource,
    ) -> ModelResult<Option<ForeignKeyId>> {
        self.entity_data(entity)?;

        if let Some(existing) = self.existing_ownership(entity, navigation) {
            return self.batched(|b| {
                b.foreign_key_is_ownership(existing, true, source)?;
                if let Some(data) = b.model.foreign_key_mut(existing) {
                    data.source = source.max(Some(data.source));
                }
                if inverse.is_some() && b.has_navigation(existing, inverse, true, source)?.is_none() {
                    return Ok(None);
                }
                Ok(Some(existing))
            });
        }

        self.batched(|b| {
            let Some(target) = b.ownership_target(entity, target_record, navigation, source)? else {
                return Ok(None);
            };
            let Some(fk) =
                b.has_relationship(target, entity, inverse, Some(navigation), Some(true), source)?
            else {
                return Ok(None);
            };
            if !b.foreign_key_is_ownership(fk, true, source)? {
                return Ok(None);
            }
            b.foreign_key_is_required(fk, Some(true), source)?;
            tracing::debug!(
                target: "keystone::builder",
                owner = %b.model.entity_name(entity),
                owned = %b.model.entity_name(target),
                navigation,
                %source,
                "ownership configured"
            );
            Ok(Some(fk))
        })
    }

    fn existing_ownership(&self, entity: EntityTypeId, navigation: &str) -> Option<ForeignKeyId> {
        let found = self.model.find_navigation(entity, navigation)?;
        let fk = self.model.foreign_key(found.foreign_key)?;
        (!found.on_dependent && fk.is_ownership).then_some(fk.id)
    }

    /// The entity type that will be owned through `owner.navigation`.
    fn ownership_target(
        &mut self,
        owner: EntityTypeId,
        record: &str,
        navigation: &str,
        source: ConfigurationSource,
    ) -> ModelResult<Option<EntityTypeId>> {
        if let Some(existing) = self.model.find_entity_type(record) {
            let previous = self
                .model
                .find_ownership(existing)
                .filter(|fk| !self.owned_through(*fk, owner, navigation));
            let Some(previous) = previous else {
                return Ok(Some(existing));
            };
            if self.is_weak_type_definition(previous, source)?.is_none() {
                return Ok(None);
            }
            return self.owned_entity(record, navigation, owner, source);
        }

        if !self.model.entity_types_with_defining_navigation(record).is_empty() {
            return self.owned_entity(record, navigation, owner, source);
        }
        self.entity(record, source)
    }

    fn owned_through(&self, fk: ForeignKeyId, owner: EntityTypeId, navigation: &str) -> bool {
        self.model.foreign_key(fk).is_some_and(|fk| {
            fk.principal == owner
                && fk
                    .principal_to_dependent
                    .as_ref()
                    .map_or(true, |n| n.name == navigation)
        })
    }
}
