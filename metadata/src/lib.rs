//! Keystone Metadata Graph
//!
//! The schema graph itself, stored as an arena of elements addressed by
//! stable ids.
//!
//! Responsibilities:
//! - Record catalog (the backing record types and their members)
//! - Element definitions (entity types, properties, keys, indexes, foreign keys,
//!   navigations, skip navigations, service properties)
//! - Raw structural mutations with invariant checks but no precedence rules
//! - Hierarchy and member queries
//! - Element identities used to re-resolve ids after a convention pass

mod arena;
mod catalog;
mod elements;
mod hierarchy;
mod identity;
mod model;
mod naming;
mod queries;

pub use catalog::*;
pub use elements::*;
pub use identity::*;
pub use model::Model;
pub use naming::NameRules;
pub use queries::{MemberKind, MemberRef, NavigationRef};
