//! Name validation for entity types and members.

use keystone_core::{ModelError, ModelResult};
use regex_lite::Regex;

/// Compiled name rules.
#[derive(Debug, Clone)]
pub struct NameRules {
    member: Regex,
    entity: Regex,
}

impl NameRules {
    pub fn new() -> ModelResult<Self> {
        let member = Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$")
            .map_err(|e| ModelError::invalid_name("member pattern", e.to_string()))?;
        // Defining-navigation types are named Owner.Navigation#Record
        let entity = Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*(\.[A-Za-z_][A-Za-z0-9_]*)*(#[A-Za-z_][A-Za-z0-9_]*)?$")
            .map_err(|e| ModelError::invalid_name("entity pattern", e.to_string()))?;
        Ok(Self { member, entity })
    }

    /// Check a property, navigation or service property name.
    pub fn validate_member(&self, name: &str) -> ModelResult<()> {
        if self.member.is_match(name) {
            Ok(())
        } else {
            Err(ModelError::invalid_name(
                name,
                "member names start with a letter or '_' and contain only letters, digits and '_'",
            ))
        }
    }

    /// Check an entity type name.
    pub fn validate_entity(&self, name: &str) -> ModelResult<()> {
        if self.entity.is_match(name) {
            Ok(())
        } else {
            Err(ModelError::invalid_name(
                name,
                "entity type names are identifiers, optionally qualified as Owner.Navigation#Record",
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_member_names() {
        let rules = NameRules::new().unwrap();
        assert!(rules.validate_member("CustomerId").is_ok());
        assert!(rules.validate_member("_shadow1").is_ok());
        assert!(rules.validate_member("1st").is_err());
        assert!(rules.validate_member("").is_err());
        assert!(rules.validate_member("Order.Id").is_err());
    }

    #[test]
    fn test_entity_names() {
        let rules = NameRules::new().unwrap();
        assert!(rules.validate_entity("Order").is_ok());
        assert!(rules.validate_entity("Order.ShippingAddress#Address").is_ok());
        assert!(rules.validate_entity("Order#").is_err());
        assert!(rules.validate_entity("has space").is_err());
    }
}
