//! Property facets: nullability and value generation.

use crate::model_builder::ModelBuilder;
use keystone_core::{ConfigurationSource, ModelResult, PropertyId, PropertyType};
use keystone_metadata::{Property, ValueGenerated};

/// Handle over one property.
#[derive(Debug)]
pub struct PropertyBuilder<'a> {
    builder: &'a mut ModelBuilder,
    id: PropertyId,
}

impl<'a> PropertyBuilder<'a> {
    pub(crate) fn new(builder: &'a mut ModelBuilder, id: PropertyId) -> Self {
        Self { builder, id }
    }

    pub fn id(&self) -> PropertyId {
        self.id
    }

    pub fn metadata(&self) -> ModelResult<&Property> {
        self.builder.property_data(self.id)
    }

    /// Change the type. Replacing an incompatible type rebuilds the property,
    /// so the handle moves to the new id.
    pub fn has_type(&mut self, ty: PropertyType, source: ConfigurationSource) -> ModelResult<bool> {
        let data = self.builder.property_data(self.id)?;
        let (entity, name) = (data.entity, data.name.clone());
        match self.builder.property(entity, &name, Some(ty), source)? {
            Some(id) => {
                self.id = id;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn is_required(&mut self, required: Option<bool>, source: ConfigurationSource) -> ModelResult<bool> {
        self.builder.property_is_required(self.id, required, source)
    }

    pub fn value_generated(
        &mut self,
        value_generated: Option<ValueGenerated>,
        source: ConfigurationSource,
    ) -> ModelResult<bool> {
        self.builder
            .property_value_generated(self.id, value_generated, source)
    }
}

impl ModelBuilder {
    /// Make the property required or optional. `None` goes back to what the
    /// type allows.
    ///
    /// Key properties never become optional. A property whose type cannot
    /// hold null only becomes optional when it is a shadow property; its type
    /// is widened.
    pub fn property_is_required(
        &mut self,
        property: PropertyId,
        required: Option<bool>,
        source: ConfigurationSource,
    ) -> ModelResult<bool> {
        let data = self.property_data(property)?;
        let nullable = required.map_or_else(|| data.ty.is_nullable(), |required| !required);

        if data.is_nullable == nullable {
            let current = data.nullable_source;
            let updated = match required {
                Some(_) => Some(source.max(current)),
                None if source.overrides(current) => None,
                None => current,
            };
            if let Some(data) = self.model.property_mut(property) {
                data.nullable_source = updated;
            }
            return Ok(true);
        }

        let name = data.name.clone();
        let widen = nullable && !data.ty.is_nullable();
        if !source.overrides(data.nullable_source)
            || (nullable && !self.model.containing_keys(property).is_empty())
            || (widen && !data.is_shadow)
        {
            self.reject("property_is_required", name, source);
            return Ok(false);
        }

        if let Some(data) = self.model.property_mut(property) {
            if widen {
                data.ty = data.ty.make_nullable(true);
            }
            data.is_nullable = nullable;
            data.nullable_source = required.map(|_| source);
        }
        tracing::trace!(
            target: "keystone::builder",
            property = %name,
            nullable,
            %source,
            "nullability changed"
        );
        Ok(true)
    }

    pub fn property_value_generated(
        &mut self,
        property: PropertyId,
        value_generated: Option<ValueGenerated>,
        source: ConfigurationSource,
    ) -> ModelResult<bool> {
        let data = self.property_data(property)?;
        let value = value_generated.unwrap_or_default();
        if data.value_generated != value && !source.overrides(data.value_generated_source) {
            self.reject("property_value_generated", &data.name, source);
            return Ok(false);
        }
        if let Some(data) = self.model.property_mut(property) {
            data.value_generated_source = value_generated.map(|_| source.max(data.value_generated_source));
            data.value_generated = value;
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use crate::{BuilderConfig, ModelBuilder};
    use keystone_core::{ConfigurationSource, PropertyType, ScalarType};
    use keystone_metadata::{CatalogBuilder, RecordCatalog, ValueGenerated};

    use ConfigurationSource::*;

    fn session() -> ModelBuilder {
        ModelBuilder::new(RecordCatalog::empty(), BuilderConfig::minimal()).unwrap()
    }

    // ========== TEST: required_then_reset ==========
    #[test]
    fn test_required_then_reset() {
        let mut mb = session();
        let blog = mb.entity("Blog", Explicit).unwrap().unwrap();
        let title = mb
            .property(blog, "Title", Some(PropertyType::nullable(ScalarType::String)), Explicit)
            .unwrap()
            .unwrap();

        assert!(mb.property_is_required(title, Some(true), DataAnnotation).unwrap());
        assert!(!mb.model().property(title).unwrap().is_nullable);
        assert!(!mb.property_is_required(title, None, Convention).unwrap());

        assert!(mb.property_is_required(title, None, Explicit).unwrap());
        let data = mb.model().property(title).unwrap();
        assert!(data.is_nullable);
        assert_eq!(data.nullable_source, None);
    }

    // ========== TEST: key_property_stays_required ==========
    #[test]
    fn test_key_property_stays_required() {
        let mut mb = session();
        let blog = mb.entity("Blog", Explicit).unwrap().unwrap();
        let id = mb
            .property(blog, "Id", Some(PropertyType::nullable(ScalarType::Int32)), Explicit)
            .unwrap()
            .unwrap();
        mb.primary_key(blog, &[id], Explicit).unwrap();

        assert!(!mb.property_is_required(id, Some(false), Explicit).unwrap());
        assert!(!mb.model().property(id).unwrap().is_nullable);
    }

    // ========== TEST: record_member_not_widened ==========
    #[test]
    fn test_record_member_not_widened() {
        // GIVEN a record-backed property whose type cannot hold null
        let mut catalog = CatalogBuilder::new();
        catalog
            .add_record("Blog")
            .scalar("Rating", ScalarType::Int32)
            .done()
            .unwrap();
        let mut mb = ModelBuilder::new(catalog.build().unwrap(), BuilderConfig::minimal()).unwrap();
        let blog = mb.entity("Blog", Explicit).unwrap().unwrap();
        let rating = mb.property(blog, "Rating", None, Explicit).unwrap().unwrap();
        let shadow = mb
            .property(blog, "Score", Some(PropertyType::new(ScalarType::Int32)), Explicit)
            .unwrap()
            .unwrap();

        // WHEN both are made optional
        let rating_changed = mb.property_is_required(rating, Some(false), Explicit).unwrap();
        let shadow_changed = mb.property_is_required(shadow, Some(false), Explicit).unwrap();

        // THEN only the shadow property widens its type
        assert!(!rating_changed);
        assert!(shadow_changed);
        assert!(mb.model().property(shadow).unwrap().ty.is_nullable());
    }

    // ========== TEST: value_generated_precedence ==========
    #[test]
    fn test_value_generated_precedence() {
        let mut mb = session();
        let blog = mb.entity("Blog", Explicit).unwrap().unwrap();
        let id = mb
            .property(blog, "Id", Some(PropertyType::new(ScalarType::Int32)), Explicit)
            .unwrap()
            .unwrap();

        let mut builder = mb.entity_builder(blog).unwrap();
        let mut property = builder.property_builder("Id").unwrap();
        assert!(property.value_generated(Some(ValueGenerated::OnAdd), DataAnnotation).unwrap());
        assert!(!property.value_generated(Some(ValueGenerated::Never), Convention).unwrap());

        let data = mb.model().property(id).unwrap();
        assert_eq!(data.value_generated, ValueGenerated::OnAdd);
        assert_eq!(data.value_generated_source, Some(DataAnnotation));
    }
}
