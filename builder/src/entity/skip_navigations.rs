//! Skip navigations.

use crate::detach::SkipNavigationSnapshot;
use crate::model_builder::ModelBuilder;
use keystone_core::{ConfigurationSource, EntityTypeId, ModelResult, SkipNavigationId};
use keystone_metadata::MemberRef;

impl ModelBuilder {
    /// Find or add the skip navigation `name` pointing at `target`.
    ///
    /// Same-named skip navigations on derived types are detached with their
    /// inverses and reattached onto the new one.
    pub fn has_skip_navigation(
        &mut self,
        entity: EntityTypeId,
        name: &str,
        target: EntityTypeId,
        is_collection: bool,
        on_dependent: bool,
        source: ConfigurationSource,
    ) -> ModelResult<Option<SkipNavigationId>> {
        self.check_member_name(name)?;
        let entity_name = self.entity_data(entity)?.name.clone();
        self.entity_data(target)?;

        let mut replaced = None;
        if let Some(existing) = self.model.find_skip_navigation(entity, name) {
            let data = self.skip_navigation_data(existing)?;
            if self.model.in_same_hierarchy(data.target, target) {
                if let Some(skip) = self.model.skip_navigation_mut(existing) {
                    skip.source = source.max(Some(skip.source));
                }
                return Ok(Some(existing));
            }
            if !source.overrides(Some(data.source)) {
                self.reject("has_skip_navigation", format!("{}.{}", entity_name, name), source);
                return Ok(None);
            }
            replaced = Some(existing);
        }

        if self.is_ignored(entity, name, source) {
            self.reject("has_skip_navigation", format!("{}.{}", entity_name, name), source);
            return Ok(None);
        }

        let derived = self.model.find_derived_skip_navigations(entity, name);
        let conflicts: Vec<MemberRef> = self
            .model
            .find_members_in_hierarchy(entity, name)
            .into_iter()
            .filter(|m| match m {
                MemberRef::SkipNavigation(skip) => Some(*skip) != replaced && !derived.contains(skip),
                _ => true,
            })
            .collect();
        if !conflicts.iter().all(|m| self.can_remove_member(*m, source)) {
            self.reject("has_skip_navigation", format!("{}.{}", entity_name, name), source);
            return Ok(None);
        }

        self.batched(|b| {
            b.model.remove_ignored(entity, name)?;
            if let Some(replaced) = replaced {
                b.remove_skip_navigation_raw(replaced)?;
            }
            for member in conflicts {
                if b.model.member_source(member).is_some() {
                    b.remove_member(member, source)?;
                }
            }
            let detached = b.detach_derived_skip_navigations(&derived)?;

            let skip = b.add_skip_navigation_raw(entity, name, target, is_collection, on_dependent, source)?;
            tracing::debug!(
                target: "keystone::builder",
                entity = %entity_name,
                skip_navigation = name,
                %source,
                "skip navigation added"
            );
            for snapshot in &detached {
                b.attach_skip_navigation(snapshot)?;
            }
            Ok(Some(skip))
        })
    }

    /// Detach the skip navigations and their inverses, inverses last so
    /// they reattach against the merged navigation.
    fn detach_derived_skip_navigations(
        &mut self,
        derived: &[SkipNavigationId],
    ) -> ModelResult<Vec<SkipNavigationSnapshot>> {
        let mut detached = Vec::new();
        let mut inverses = Vec::new();
        for skip in derived {
            let Some(data) = self.model.skip_navigation(*skip) else {
                continue;
            };
            if let Some(inverse) = data.inverse.filter(|i| i != skip) {
                inverses.push(inverse);
            }
            detached.push(self.detach_skip_navigation(*skip)?);
        }
        for inverse in inverses {
            if self.model.skip_navigation(inverse).is_some() {
                detached.push(self.detach_skip_navigation(inverse)?);
            }
        }
        Ok(detached)
    }

    /// Remove a skip navigation. Its inverse only loses the back pointer.
    pub fn has_no_skip_navigation(
        &mut self,
        skip: SkipNavigationId,
        source: ConfigurationSource,
    ) -> ModelResult<bool> {
        let current = self.skip_navigation_data(skip)?.source;
        if !source.overrides(Some(current)) {
            self.reject("has_no_skip_navigation", skip, source);
            return Ok(false);
        }
        self.batched_flag(|b| {
            b.remove_skip_navigation_raw(skip)?;
            Ok(true)
        })
    }

    /// Remove a skip navigation together with its inverse.
    pub(crate) fn remove_skip_navigation_pair(&mut self, skip: SkipNavigationId) -> ModelResult<()> {
        let Some(inverse) = self.model.skip_navigation(skip).map(|s| s.inverse) else {
            return Ok(());
        };
        self.remove_skip_navigation_raw(skip)?;
        if let Some(inverse) = inverse.filter(|i| self.model.skip_navigation(*i).is_some()) {
            self.remove_skip_navigation_raw(inverse)?;
        }
        Ok(())
    }
}
