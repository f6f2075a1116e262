//! Keystone Core Types
//!
//! This crate provides the foundational types shared by every keystone crate:
//! - Element identifiers (EntityTypeId, PropertyId, KeyId, IndexId, ForeignKeyId, ...)
//! - Configuration precedence (ConfigurationSource and the overrides relation)
//! - Scalar property types
//! - The model error type

mod error;
mod id;
mod scalar;
mod source;

pub use error::*;
pub use id::*;
pub use scalar::*;
pub use source::*;
