//! Keystone Model Builder
//!
//! The configuration layer over the schema graph. Every operation carries a
//! `ConfigurationSource`; a change that would override stronger configuration
//! is rejected without touching the model.
//!
//! Responsibilities:
//! - The `ModelBuilder` session and its convention batches
//! - Entity type, property, index, relationship and skip navigation operations
//! - Detaching dependent elements before destructive edits and replaying them after
//! - Unique names for synthesized foreign key properties
//! - Built-in conventions and the entity command surface they use

mod command;
mod config;
mod conventions;
mod detach;
mod entity;
mod foreign_key;
mod index;
mod model_builder;
mod property;
mod skip_navigation;
mod unique;

pub use command::EntityCommand;
pub use config::BuilderConfig;
pub use conventions::{DiscriminatorConvention, KeyDiscoveryConvention};
pub use detach::{
    ForeignKeySnapshot, IndexSnapshot, KeySnapshot, MembersSnapshot, PropertiesSnapshot,
    PropertySnapshot, ServicePropertySnapshot, SkipBinding, SkipNavigationSnapshot,
};
pub use entity::EntityTypeBuilder;
pub use foreign_key::ForeignKeyBuilder;
pub use index::IndexBuilder;
pub use model_builder::ModelBuilder;
pub use property::PropertyBuilder;
pub use skip_navigation::SkipNavigationBuilder;
pub use unique::next_unique_name;
