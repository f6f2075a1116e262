//! Keystone integration fixtures.
//!
//! Sessions, record catalogs and small helpers shared by the scenarios
//! under `tests/`. Scenario files pull everything in through the prelude.

use keystone_builder::{BuilderConfig, ModelBuilder};
use keystone_core::{ConfigurationSource, EntityTypeId, PropertyId, PropertyType, ScalarType};
use keystone_metadata::{CatalogBuilder, RecordCatalog};

pub mod prelude {
    pub use crate::{
        blog_catalog, entity_with_key, init_tracing, int, minimal_session, session, shop_catalog,
        string,
    };
    pub use keystone_builder::{BuilderConfig, EntityCommand, ModelBuilder};
    pub use keystone_core::{
        ConfigurationSource, ConfigurationSource::*, ElementId, EntityTypeId, ForeignKeyId,
        ModelError, PropertyId, PropertyType, ScalarType,
    };
    pub use keystone_metadata::{DeleteBehavior, Model, RecordCatalog};
}

/// Route builder logs to the test harness. Safe to call from every test.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::TRACE)
        .with_test_writer()
        .try_init();
}

/// A session with the built-in conventions.
pub fn session(catalog: RecordCatalog) -> ModelBuilder {
    init_tracing();
    ModelBuilder::new(catalog, BuilderConfig::default()).expect("session")
}

/// A session without conventions over an empty catalog.
pub fn minimal_session() -> ModelBuilder {
    init_tracing();
    ModelBuilder::new(RecordCatalog::empty(), BuilderConfig::minimal()).expect("session")
}

pub fn int() -> Option<PropertyType> {
    Some(PropertyType::new(ScalarType::Int32))
}

pub fn string() -> Option<PropertyType> {
    Some(PropertyType::nullable(ScalarType::String))
}

/// An entity type with an `Id` primary key, all at `source`.
pub fn entity_with_key(
    mb: &mut ModelBuilder,
    name: &str,
    source: ConfigurationSource,
) -> (EntityTypeId, PropertyId) {
    let entity = mb.entity(name, source).expect("entity").expect("entity added");
    let id = mb.property(entity, "Id", int(), source).expect("property").expect("property added");
    mb.primary_key(entity, &[id], source).expect("key").expect("key added");
    (entity, id)
}

/// Blogs and posts, with a collection navigation on the blog side.
pub fn blog_catalog() -> RecordCatalog {
    let mut catalog = CatalogBuilder::new();
    catalog
        .add_record("Blog")
        .scalar("Id", ScalarType::Int32)
        .nullable("Url", ScalarType::String)
        .collection("Posts", "Post")
        .done()
        .expect("Blog");
    catalog
        .add_record("Post")
        .scalar("Id", ScalarType::Int32)
        .nullable("Title", ScalarType::String)
        .reference("Blog", "Blog")
        .done()
        .expect("Post");
    catalog.build().expect("catalog")
}

/// Customers and orders with an owned address, plus a `BaseOrder` record.
pub fn shop_catalog() -> RecordCatalog {
    let mut catalog = CatalogBuilder::new();
    catalog
        .add_record("Customer")
        .scalar("Id", ScalarType::Int32)
        .reference("Address", "Address")
        .collection("Orders", "Order")
        .done()
        .expect("Customer");
    catalog
        .add_record("Address")
        .nullable("Street", ScalarType::String)
        .done()
        .expect("Address");
    catalog
        .add_record("BaseOrder")
        .scalar("Id", ScalarType::Int32)
        .done()
        .expect("BaseOrder");
    catalog
        .add_record("Order")
        .scalar("Id", ScalarType::Int32)
        .scalar("CustomerId", ScalarType::Int32)
        .reference("Customer", "Customer")
        .done()
        .expect("Order");
    catalog.build().expect("catalog")
}
