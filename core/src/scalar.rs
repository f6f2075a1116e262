//! Scalar types for entity properties.
//!
//! A property's storage type is a scalar kind plus whether it admits null.
//! String and Bytes are reference-like and always admit null.

use std::fmt;

/// The scalar kind of a property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarType {
    Bool,
    Int16,
    Int32,
    Int64,
    Float64,
    Decimal,
    String,
    Guid,
    DateTime,
    Bytes,
}

impl ScalarType {
    /// Returns true for kinds that always admit null.
    pub fn is_reference(&self) -> bool {
        matches!(self, ScalarType::String | ScalarType::Bytes)
    }

    /// Lowercase display name.
    pub fn name(&self) -> &'static str {
        match self {
            ScalarType::Bool => "bool",
            ScalarType::Int16 => "int16",
            ScalarType::Int32 => "int32",
            ScalarType::Int64 => "int64",
            ScalarType::Float64 => "float64",
            ScalarType::Decimal => "decimal",
            ScalarType::String => "string",
            ScalarType::Guid => "guid",
            ScalarType::DateTime => "datetime",
            ScalarType::Bytes => "bytes",
        }
    }
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// The type of a property: a scalar kind and whether it admits null.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PropertyType {
    pub scalar: ScalarType,
    pub nullable: bool,
}

impl PropertyType {
    /// The natural type of a scalar; reference kinds are nullable.
    pub fn new(scalar: ScalarType) -> Self {
        Self {
            scalar,
            nullable: scalar.is_reference(),
        }
    }

    /// A nullable wrapper around a scalar.
    pub fn nullable(scalar: ScalarType) -> Self {
        Self {
            scalar,
            nullable: true,
        }
    }

    /// Add or strip the nullable wrapper. Reference kinds stay nullable.
    pub fn make_nullable(self, nullable: bool) -> Self {
        Self {
            scalar: self.scalar,
            nullable: nullable || self.scalar.is_reference(),
        }
    }

    /// Returns true if values of this type may be null.
    pub fn is_nullable(&self) -> bool {
        self.nullable
    }

    /// Returns true if the two types store the same scalar kind.
    pub fn is_compatible_with(&self, other: &PropertyType) -> bool {
        self.scalar == other.scalar
    }
}

impl From<ScalarType> for PropertyType {
    fn from(scalar: ScalarType) -> Self {
        PropertyType::new(scalar)
    }
}

impl fmt::Display for PropertyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.nullable && !self.scalar.is_reference() {
            write!(f, "{}?", self.scalar)
        } else {
            write!(f, "{}", self.scalar)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_types_are_nullable() {
        assert!(PropertyType::new(ScalarType::String).is_nullable());
        assert!(!PropertyType::new(ScalarType::Int32).is_nullable());
        assert!(PropertyType::new(ScalarType::Bytes)
            .make_nullable(false)
            .is_nullable());
    }

    #[test]
    fn test_make_nullable_round_trip() {
        let ty = PropertyType::new(ScalarType::Int64).make_nullable(true);
        assert_eq!(ty.to_string(), "int64?");
        assert_eq!(ty.make_nullable(false), PropertyType::new(ScalarType::Int64));
    }

    #[test]
    fn test_compatibility_ignores_nullability() {
        let a = PropertyType::new(ScalarType::Guid);
        let b = PropertyType::nullable(ScalarType::Guid);
        assert!(a.is_compatible_with(&b));
        assert!(!a.is_compatible_with(&PropertyType::new(ScalarType::Int32)));
    }
}
