//! Unique names for synthesized properties.

use crate::model_builder::ModelBuilder;
use keystone_core::{ConfigurationSource, EntityTypeId, ModelResult, PropertyId};

/// First of `base`, `base1`, `base2`, ... for which `is_taken` is false.
pub fn next_unique_name(base: &str, mut is_taken: impl FnMut(&str) -> bool) -> String {
    if !is_taken(base) {
        return base.to_string();
    }
    let mut n = 1usize;
    loop {
        let candidate = format!("{}{}", base, n);
        if !is_taken(&candidate) {
            return candidate;
        }
        n += 1;
    }
}

impl ModelBuilder {
    /// Whether `name` is unavailable for a new member of the entity type.
    ///
    /// Members anywhere in the hierarchy, record members of the entity or its
    /// derived types, and ignored names all count.
    pub(crate) fn is_name_taken(&self, entity: EntityTypeId, name: &str) -> bool {
        if !self.model.find_members_in_hierarchy(entity, name).is_empty() {
            return true;
        }
        let mut hierarchy = self.model.base_chain(entity);
        hierarchy.extend(self.model.all_derived_types(entity));
        hierarchy.into_iter().any(|e| {
            self.model.record_member(e, name).is_some()
                || self.model.find_declared_ignored_source(e, name).is_some()
        })
    }

    /// Names for foreign key properties mirroring `principal_properties`.
    ///
    /// A principal property whose name already starts with `base_name` is used
    /// as is, otherwise the name is `base_name` followed by it. Names held by
    /// `current` are treated as free. The flag reports whether every name came
    /// out as its plain candidate, i.e. re-running would not change anything.
    pub(crate) fn unique_property_names(
        &self,
        entity: EntityTypeId,
        base_name: &str,
        principal_properties: &[PropertyId],
        current: Option<&[PropertyId]>,
    ) -> (Vec<String>, bool) {
        let current_names: Vec<String> = current
            .map(|c| self.model.property_names(c))
            .unwrap_or_default();
        let mut names: Vec<String> = Vec::with_capacity(principal_properties.len());
        let mut all_plain = true;

        for principal in principal_properties {
            let key_name = self.model.property_name(*principal);
            let candidate = if key_name
                .to_lowercase()
                .starts_with(&base_name.to_lowercase())
            {
                key_name
            } else {
                format!("{}{}", base_name, key_name)
            };
            let name = next_unique_name(&candidate, |n| {
                names.iter().any(|taken| taken == n)
                    || (!current_names.iter().any(|c| c == n) && self.is_name_taken(entity, n))
            });
            all_plain &= name == candidate;
            names.push(name);
        }
        (names, all_plain)
    }

    /// Create shadow properties that can reference `principal_properties`.
    pub(crate) fn create_unique_properties(
        &mut self,
        entity: EntityTypeId,
        base_name: &str,
        principal_properties: &[PropertyId],
        required: bool,
    ) -> ModelResult<Option<Vec<PropertyId>>> {
        let (names, _) = self.unique_property_names(entity, base_name, principal_properties, None);
        let mut created = Vec::with_capacity(names.len());
        for (name, principal) in names.iter().zip(principal_properties) {
            let ty = self.property_data(*principal)?.ty.make_nullable(!required);
            match self.property_with(entity, name, Some(ty), None, ConfigurationSource::Convention)? {
                Some(property) => created.push(property),
                None => {
                    self.remove_unused_implicit_properties(&created)?;
                    return Ok(None);
                }
            }
        }
        Ok(Some(created))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    // ========== TEST: plain_name_when_free ==========
    #[test]
    fn test_plain_name_when_free() {
        assert_eq!(next_unique_name("CustomerId", |_| false), "CustomerId");
    }

    // ========== TEST: counter_appended ==========
    #[test]
    fn test_counter_appended() {
        let taken = ["CustomerId", "CustomerId1"];
        let name = next_unique_name("CustomerId", |n| taken.contains(&n));
        assert_eq!(name, "CustomerId2");
    }

    proptest! {
        // ========== TEST: result_never_taken ==========
        #[test]
        fn test_result_never_taken(base in "[A-Z][a-z]{0,6}", count in 0usize..8) {
            let mut taken: Vec<String> = vec![base.clone()];
            taken.extend((1..count).map(|n| format!("{}{}", base, n)));

            let name = next_unique_name(&base, |n| taken.iter().any(|t| t == n));

            prop_assert!(!taken.contains(&name));
            prop_assert!(name.starts_with(&base));
        }
    }
}
