//! Skip navigation facets: the inverse and the join foreign key.

use crate::model_builder::ModelBuilder;
use keystone_core::{ConfigurationSource, ForeignKeyId, ModelResult, SkipNavigationId};
use keystone_metadata::SkipNavigation;

/// Handle over one skip navigation.
#[derive(Debug)]
pub struct SkipNavigationBuilder<'a> {
    builder: &'a mut ModelBuilder,
    id: SkipNavigationId,
}

impl<'a> SkipNavigationBuilder<'a> {
    pub(crate) fn new(builder: &'a mut ModelBuilder, id: SkipNavigationId) -> Self {
        Self { builder, id }
    }

    pub fn id(&self) -> SkipNavigationId {
        self.id
    }

    pub fn metadata(&self) -> ModelResult<&SkipNavigation> {
        self.builder.skip_navigation_data(self.id)
    }

    pub fn has_inverse(
        &mut self,
        inverse: Option<SkipNavigationId>,
        source: ConfigurationSource,
    ) -> ModelResult<bool> {
        self.builder
            .skip_navigation_has_inverse(self.id, inverse, source)
    }

    pub fn has_foreign_key(
        &mut self,
        foreign_key: Option<ForeignKeyId>,
        source: ConfigurationSource,
    ) -> ModelResult<bool> {
        self.builder
            .skip_navigation_has_foreign_key(self.id, foreign_key, source)
    }
}

impl ModelBuilder {
    /// Handle over a skip navigation.
    pub fn skip_navigation_builder(&mut self, id: SkipNavigationId) -> ModelResult<SkipNavigationBuilder<'_>> {
        self.skip_navigation_data(id)?;
        Ok(SkipNavigationBuilder::new(self, id))
    }

    /// Pair the skip navigation with `inverse`, updating both sides. Former
    /// partners of either side lose their back pointer.
    pub fn skip_navigation_has_inverse(
        &mut self,
        skip: SkipNavigationId,
        inverse: Option<SkipNavigationId>,
        source: ConfigurationSource,
    ) -> ModelResult<bool> {
        let data = self.skip_navigation_data(skip)?;
        let current = data.inverse;
        let current_source = data.inverse_source;
        if current == inverse {
            if let Some(data) = self.model.skip_navigation_mut(skip) {
                data.inverse_source = inverse.map(|_| source.max(current_source));
            }
            if let Some(inverse) = inverse {
                if let Some(other) = self.model.skip_navigation_mut(inverse) {
                    other.inverse_source = Some(source.max(other.inverse_source));
                }
            }
            return Ok(true);
        }
        if !source.overrides(current_source) {
            self.reject("skip_navigation_has_inverse", skip, source);
            return Ok(false);
        }

        let displaced = match inverse {
            Some(inverse) => {
                let other = self.skip_navigation_data(inverse)?;
                match other.inverse.filter(|i| *i != skip) {
                    Some(_) if !source.overrides(other.inverse_source) => {
                        self.reject("skip_navigation_has_inverse", inverse, source);
                        return Ok(false);
                    }
                    partner => partner,
                }
            }
            None => None,
        };

        for stale in [current, displaced].into_iter().flatten() {
            if self.model.skip_navigation(stale).is_some() {
                self.model.set_skip_navigation_inverse(stale, None, None)?;
            }
        }
        self.model
            .set_skip_navigation_inverse(skip, inverse, Some(source))?;
        if let Some(inverse) = inverse {
            self.model
                .set_skip_navigation_inverse(inverse, Some(skip), Some(source))?;
        }
        tracing::trace!(
            target: "keystone::builder",
            %skip,
            inverse = ?inverse,
            %source,
            "skip navigation inverse set"
        );
        Ok(true)
    }

    /// Bind the join foreign key. The foreign key must have its principal in
    /// the hierarchy of the skip navigation's entity type.
    pub fn skip_navigation_has_foreign_key(
        &mut self,
        skip: SkipNavigationId,
        foreign_key: Option<ForeignKeyId>,
        source: ConfigurationSource,
    ) -> ModelResult<bool> {
        let data = self.skip_navigation_data(skip)?;
        if data.foreign_key == foreign_key {
            let upgraded = foreign_key.map(|_| source.max(data.foreign_key_source));
            if let Some(data) = self.model.skip_navigation_mut(skip) {
                data.foreign_key_source = upgraded;
            }
            return Ok(true);
        }
        if !source.overrides(data.foreign_key_source) {
            self.reject("skip_navigation_has_foreign_key", skip, source);
            return Ok(false);
        }
        self.model
            .set_skip_navigation_foreign_key(skip, foreign_key, Some(source))?;
        Ok(true)
    }
}
