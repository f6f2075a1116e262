//! Configuration for a model builder session

/// Configuration for a model builder session
#[derive(Debug, Clone)]
pub struct BuilderConfig {
    /// Events a single convention pass may dispatch before it is abandoned
    pub max_convention_events: usize,
    /// Reject entity and member names that are not identifiers
    pub validate_names: bool,
    /// Default name of a discriminator property
    pub discriminator_name: String,
    /// Base name of properties synthesized for temporary principal keys
    pub temporary_key_name: String,
    /// Install the built-in conventions
    pub use_default_conventions: bool,
}

impl Default for BuilderConfig {
    fn default() -> Self {
        Self {
            max_convention_events: 10_000,
            validate_names: true,
            discriminator_name: "Discriminator".to_string(),
            temporary_key_name: "TempId".to_string(),
            use_default_conventions: true,
        }
    }
}

impl BuilderConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_convention_events(mut self, limit: usize) -> Self {
        self.max_convention_events = limit;
        self
    }

    pub fn with_validate_names(mut self, validate: bool) -> Self {
        self.validate_names = validate;
        self
    }

    pub fn with_discriminator_name(mut self, name: impl Into<String>) -> Self {
        self.discriminator_name = name.into();
        self
    }

    pub fn with_temporary_key_name(mut self, name: impl Into<String>) -> Self {
        self.temporary_key_name = name.into();
        self
    }

    pub fn with_default_conventions(mut self, enabled: bool) -> Self {
        self.use_default_conventions = enabled;
        self
    }

    /// No conventions; every element comes from explicit calls.
    pub fn minimal() -> Self {
        Self {
            use_default_conventions: false,
            ..Self::default()
        }
    }

    /// Conventions on, with a tight event limit so runaway passes fail fast.
    pub fn strict() -> Self {
        Self {
            max_convention_events: 500,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets() {
        let config = BuilderConfig::minimal();
        assert!(!config.use_default_conventions);
        assert_eq!(config.discriminator_name, "Discriminator");

        let config = BuilderConfig::strict().with_validate_names(false);
        assert_eq!(config.max_convention_events, 500);
        assert!(!config.validate_names);
    }
}
