//! End-to-end configuration scenarios.

use keystone_tests::prelude::*;
use pretty_assertions::assert_eq;

mod swapped_relationship {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_same_navigation_pair_from_either_end() {
        // GIVEN Post -> Blog with navigations on both ends
        let mut mb = minimal_session();
        let (blog, _) = entity_with_key(&mut mb, "Blog", Explicit);
        let post = mb.entity("Post", Explicit).unwrap().unwrap();
        let fk = mb
            .has_relationship(post, blog, Some("Blog"), Some("Posts"), None, Explicit)
            .unwrap()
            .unwrap();

        // WHEN the same pair is configured from the blog side
        let again = mb
            .has_relationship(blog, post, Some("Posts"), Some("Blog"), None, DataAnnotation)
            .unwrap();

        // THEN it is the same relationship, still with Post dependent
        assert_eq!(again, Some(fk));
        assert_eq!(mb.model().foreign_keys().count(), 1);
        let data = mb.model().foreign_key(fk).unwrap();
        assert_eq!(data.dependent, post);
        assert_eq!(data.principal, blog);
    }
}

mod owned_address {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_commands_with_conventions() {
        // GIVEN a customer configured through commands with conventions on
        let mut mb = session(shop_catalog());
        let customer = mb.entity("Customer", Explicit).unwrap().unwrap();
        let id = mb
            .apply(customer, &EntityCommand::Property { name: "Id".into(), ty: int() }, false)
            .unwrap();
        let Some(ElementId::Property(id)) = id else {
            panic!("expected a property, got {:?}", id);
        };

        // WHEN the address is owned through an annotation
        let owned = mb
            .apply(
                customer,
                &EntityCommand::HasOwnership {
                    target_record: "Address".into(),
                    navigation: "Address".into(),
                    inverse: None,
                },
                true,
            )
            .unwrap();

        // THEN the customer was keyed by convention and owns the address
        assert_eq!(mb.model().find_primary_key(customer).map(|k| mb.model().key(k).unwrap().properties.clone()), Some(vec![id]));
        assert_eq!(mb.model().entity_type(customer).unwrap().primary_key_source, Some(Convention));

        let Some(ElementId::ForeignKey(fk)) = owned else {
            panic!("expected a foreign key, got {:?}", owned);
        };
        let data = mb.model().foreign_key(fk).unwrap();
        assert!(data.is_ownership);
        assert!(data.is_required);
        assert_eq!(data.principal, customer);
        assert_eq!(data.principal_to_dependent.as_ref().unwrap().name, "Address");
        assert_eq!(mb.model().find_ownership(data.dependent), Some(fk));
    }

    #[test]
    fn test_annotation_ignore_beats_convention_property() {
        let mut mb = session(shop_catalog());
        let customer = mb.entity("Customer", Explicit).unwrap().unwrap();
        let note = mb.property(customer, "Note", string(), Convention).unwrap().unwrap();

        let outcome = mb
            .apply(customer, &EntityCommand::Ignore { name: "Note".into() }, true)
            .unwrap();

        assert_eq!(outcome, Some(ElementId::EntityType(customer)));
        assert!(mb.model().property(note).is_none());
        assert_eq!(mb.model().find_ignored_source(customer, "Note"), Some(DataAnnotation));

        // A convention cannot bring it back
        assert_eq!(mb.property(customer, "Note", string(), Convention).unwrap(), None);
    }
}

mod entity_removal {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_removed_principal_takes_relationships_along() {
        let mut mb = minimal_session();
        let (blog, _) = entity_with_key(&mut mb, "Blog", Explicit);
        let post = mb.entity("Post", Explicit).unwrap().unwrap();
        mb.has_relationship(post, blog, Some("Blog"), Some("Posts"), None, Explicit)
            .unwrap()
            .unwrap();

        assert!(mb.has_no_entity_type(blog, Explicit).unwrap());

        assert!(mb.model().entity_type(blog).is_none());
        assert_eq!(mb.model().foreign_keys().count(), 0);
        assert!(mb.model().find_navigation(post, "Blog").is_none());
    }
}

mod misordered_batches {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_session_recovers_after_outer_batch_runs_first() {
        // GIVEN two nested batches opened by the caller
        let mut mb = session(shop_catalog());
        let outer = mb.delay_conventions();
        let _inner = mb.delay_conventions();

        // WHEN the outer one is run while the inner is still open
        let result = mb.run(outer, ());

        // THEN the misuse is reported and conventions are live again
        assert_eq!(result, Err(ModelError::batch_out_of_order(2, 1)));
        assert!(!mb.is_delayed());
        let customer = mb.entity("Customer", Explicit).unwrap().unwrap();
        let id = mb.property(customer, "Id", int(), Explicit).unwrap().unwrap();
        let key = mb.model().find_primary_key(customer).unwrap();
        assert_eq!(mb.model().key(key).unwrap().properties, vec![id]);
    }
}
