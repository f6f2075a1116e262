//! Service properties.

use crate::model_builder::ModelBuilder;
use keystone_core::{ConfigurationSource, EntityTypeId, ModelError, ModelResult, ServicePropertyId};
use keystone_metadata::MemberType;

impl ModelBuilder {
    /// Find or add the service property `name`.
    ///
    /// Without a service type the backing record member decides it.
    pub fn service_property(
        &mut self,
        entity: EntityTypeId,
        name: &str,
        service_type: Option<&str>,
        source: ConfigurationSource,
    ) -> ModelResult<Option<ServicePropertyId>> {
        self.check_member_name(name)?;
        let entity_name = self.entity_data(entity)?.name.clone();

        if let Some(existing) = self.model.find_service_property(entity, name) {
            let data = self.service_property_data(existing)?;
            let retyped = service_type.filter(|ty| *ty != data.service_type);
            if retyped.is_some() && !source.overrides(Some(data.source)) {
                self.reject("service_property", format!("{}.{}", entity_name, name), source);
                return Ok(None);
            }
            if let Some(service) = self.model.service_property_mut(existing) {
                service.source = source.max(Some(service.source));
                if let Some(ty) = retyped {
                    service.service_type = ty.to_string();
                }
            }
            return Ok(Some(existing));
        }

        if self.is_ignored(entity, name, source) {
            self.reject("service_property", format!("{}.{}", entity_name, name), source);
            return Ok(None);
        }

        let service_type = match service_type {
            Some(ty) => ty.to_string(),
            None => match self.model.record_member(entity, name).map(|m| &m.ty) {
                Some(MemberType::Service(ty)) => ty.clone(),
                _ => return Err(ModelError::no_property_type(&entity_name, name)),
            },
        };

        let conflicts = self.model.find_members_in_hierarchy(entity, name);
        if !conflicts.iter().all(|m| self.can_remove_member(*m, source)) {
            self.reject("service_property", format!("{}.{}", entity_name, name), source);
            return Ok(None);
        }

        self.batched(|b| {
            b.model.remove_ignored(entity, name)?;
            for member in conflicts {
                if b.model.member_source(member).is_some() {
                    b.remove_member(member, source)?;
                }
            }
            let service = b.add_service_property_raw(entity, name, &service_type, source)?;
            tracing::debug!(
                target: "keystone::builder",
                entity = %entity_name,
                service_property = name,
                service_type = %service_type,
                %source,
                "service property added"
            );
            Ok(Some(service))
        })
    }

    /// Remove a service property.
    pub fn has_no_service_property(
        &mut self,
        service: ServicePropertyId,
        source: ConfigurationSource,
    ) -> ModelResult<bool> {
        let current = self.service_property_data(service)?.source;
        if !source.overrides(Some(current)) {
            self.reject("has_no_service_property", service, source);
            return Ok(false);
        }
        self.batched_flag(|b| {
            b.remove_service_property_raw(service)?;
            Ok(true)
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::{BuilderConfig, ModelBuilder};
    use keystone_core::{ConfigurationSource, ModelError, ScalarType};
    use keystone_metadata::{CatalogBuilder, RecordCatalog};

    use ConfigurationSource::*;

    fn session() -> ModelBuilder {
        let mut catalog = CatalogBuilder::new();
        catalog
            .add_record("Blog")
            .scalar("Id", ScalarType::Int32)
            .service("Loader", "ILazyLoader")
            .done()
            .unwrap();
        ModelBuilder::new(catalog.build().unwrap(), BuilderConfig::minimal()).unwrap()
    }

    // ========== TEST: service_type_from_record ==========
    #[test]
    fn test_service_type_from_record() {
        let mut mb = session();
        let blog = mb.entity("Blog", Explicit).unwrap().unwrap();

        let service = mb
            .service_property(blog, "Loader", None, Convention)
            .unwrap()
            .unwrap();

        let data = mb.model().service_property(service).unwrap();
        assert_eq!(data.service_type, "ILazyLoader");
        assert_eq!(data.source, Convention);
    }

    // ========== TEST: missing_service_type_error ==========
    #[test]
    fn test_missing_service_type_error() {
        let mut mb = ModelBuilder::new(RecordCatalog::empty(), BuilderConfig::minimal()).unwrap();
        let blog = mb.entity("Blog", Explicit).unwrap().unwrap();

        let result = mb.service_property(blog, "Loader", None, Explicit);

        assert!(matches!(result, Err(ModelError::NoPropertyType { .. })));
    }

    // ========== TEST: retype_needs_precedence ==========
    #[test]
    fn test_retype_needs_precedence() {
        let mut mb = session();
        let blog = mb.entity("Blog", Explicit).unwrap().unwrap();
        let service = mb
            .service_property(blog, "Loader", None, DataAnnotation)
            .unwrap()
            .unwrap();

        assert_eq!(
            mb.service_property(blog, "Loader", Some("Other"), Convention)
                .unwrap(),
            None
        );
        assert_eq!(
            mb.service_property(blog, "Loader", Some("Other"), Explicit)
                .unwrap(),
            Some(service)
        );
        assert_eq!(mb.model().service_property(service).unwrap().service_type, "Other");
    }

    // ========== TEST: service_property_removed ==========
    #[test]
    fn test_service_property_removed() {
        let mut mb = session();
        let blog = mb.entity("Blog", Explicit).unwrap().unwrap();
        let service = mb
            .service_property(blog, "Loader", None, Explicit)
            .unwrap()
            .unwrap();

        assert!(!mb.has_no_service_property(service, DataAnnotation).unwrap());
        assert!(mb.has_no_service_property(service, Explicit).unwrap());
        assert!(mb.model().find_service_property(blog, "Loader").is_none());
    }
}
