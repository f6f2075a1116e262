//! Configuration precedence.
//!
//! Every element of the schema graph remembers the strongest authority that
//! configured it. A later edit may only replace that configuration when its
//! own source overrides the recorded one.

use std::fmt;

/// Who configured a value, ordered from weakest to strongest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ConfigurationSource {
    /// Inferred by a convention pass.
    Convention,
    /// Read from an attribute on the backing record.
    DataAnnotation,
    /// Set through the configuration surface.
    Explicit,
}

impl ConfigurationSource {
    /// All sources, weakest first.
    pub const ALL: [ConfigurationSource; 3] = [
        ConfigurationSource::Convention,
        ConfigurationSource::DataAnnotation,
        ConfigurationSource::Explicit,
    ];

    /// Whether an edit at `self` may replace a value recorded at `current`.
    ///
    /// Equal sources override each other; nothing recorded is always overridden.
    pub fn overrides(self, current: Option<ConfigurationSource>) -> bool {
        match current {
            None => true,
            Some(current) => self >= current,
        }
    }

    /// Like [`overrides`](Self::overrides) but an equal source does not win.
    pub fn overrides_strictly(self, current: Option<ConfigurationSource>) -> bool {
        match current {
            None => true,
            Some(current) => self > current,
        }
    }

    /// The stronger of the two sources.
    pub fn max(self, other: Option<ConfigurationSource>) -> ConfigurationSource {
        match other {
            Some(other) if other > self => other,
            _ => self,
        }
    }

    /// Maps the adapter-level `from_data_annotation` flag.
    pub fn from_data_annotation(from_data_annotation: bool) -> ConfigurationSource {
        if from_data_annotation {
            ConfigurationSource::DataAnnotation
        } else {
            ConfigurationSource::Convention
        }
    }
}

impl fmt::Display for ConfigurationSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigurationSource::Convention => write!(f, "Convention"),
            ConfigurationSource::DataAnnotation => write!(f, "DataAnnotation"),
            ConfigurationSource::Explicit => write!(f, "Explicit"),
        }
    }
}

/// Overrides over optional sources: a missing new source satisfies nothing.
pub fn overrides(new: Option<ConfigurationSource>, current: Option<ConfigurationSource>) -> bool {
    new.is_some_and(|new| new.overrides(current))
}

/// The stronger of two optional sources.
pub fn max_source(
    a: Option<ConfigurationSource>,
    b: Option<ConfigurationSource>,
) -> Option<ConfigurationSource> {
    match (a, b) {
        (Some(a), b) => Some(a.max(b)),
        (None, b) => b,
    }
}

/// Raise `slot` to `source` if it is stronger than what is recorded.
pub fn update_source(slot: &mut Option<ConfigurationSource>, source: ConfigurationSource) {
    *slot = Some(source.max(*slot));
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use ConfigurationSource::*;

    // ========== TEST: overrides_ordering ==========
    #[test]
    fn test_overrides_ordering() {
        // GIVEN the three sources
        // WHEN compared pairwise
        // THEN stronger or equal sources override
        assert!(Explicit.overrides(Some(Convention)));
        assert!(Explicit.overrides(Some(Explicit)));
        assert!(DataAnnotation.overrides(Some(Convention)));
        assert!(!Convention.overrides(Some(DataAnnotation)));
        assert!(!DataAnnotation.overrides(Some(Explicit)));
    }

    // ========== TEST: overrides_none ==========
    #[test]
    fn test_overrides_none() {
        // GIVEN nothing recorded
        // THEN every source overrides it
        for source in ConfigurationSource::ALL {
            assert!(source.overrides(None));
            assert!(source.overrides_strictly(None));
        }

        // AND a missing new source satisfies nothing
        assert!(!overrides(None, None));
        assert!(!overrides(None, Some(Convention)));
    }

    // ========== TEST: overrides_strictly_rejects_equal ==========
    #[test]
    fn test_overrides_strictly_rejects_equal() {
        assert!(!Explicit.overrides_strictly(Some(Explicit)));
        assert!(Explicit.overrides_strictly(Some(DataAnnotation)));
    }

    // ========== TEST: update_source_never_lowers ==========
    #[test]
    fn test_update_source_never_lowers() {
        // GIVEN a slot at DataAnnotation
        let mut slot = Some(DataAnnotation);

        // WHEN updated with Convention
        update_source(&mut slot, Convention);

        // THEN the slot stays at DataAnnotation
        assert_eq!(slot, Some(DataAnnotation));

        // AND Explicit raises it
        update_source(&mut slot, Explicit);
        assert_eq!(slot, Some(Explicit));
    }

    #[test]
    fn test_from_data_annotation() {
        assert_eq!(ConfigurationSource::from_data_annotation(true), DataAnnotation);
        assert_eq!(ConfigurationSource::from_data_annotation(false), Convention);
    }

    fn any_source() -> impl Strategy<Value = ConfigurationSource> {
        prop_oneof![Just(Convention), Just(DataAnnotation), Just(Explicit)]
    }

    proptest! {
        #[test]
        fn prop_overrides_is_total(a in any_source(), b in any_source()) {
            prop_assert!(a.overrides(Some(b)) || b.overrides(Some(a)));
        }

        #[test]
        fn prop_strict_implies_plain(a in any_source(), b in any_source()) {
            if a.overrides_strictly(Some(b)) {
                prop_assert!(a.overrides(Some(b)));
                prop_assert!(!b.overrides(Some(a)));
            }
        }

        #[test]
        fn prop_max_overrides_both(a in any_source(), b in any_source()) {
            let m = a.max(Some(b));
            prop_assert!(m.overrides(Some(a)));
            prop_assert!(m.overrides(Some(b)));
        }
    }
}
