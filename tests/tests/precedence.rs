//! Precedence between configuration sources.
//!
//! A change at a weaker source than the one that configured an element must
//! leave both the value and the recorded source alone.

use keystone_tests::prelude::*;
use pretty_assertions::assert_eq;
use proptest::prelude::*;

fn any_source() -> impl Strategy<Value = ConfigurationSource> {
    prop_oneof![Just(Convention), Just(DataAnnotation), Just(Explicit)]
}

mod idempotent_rejection {
    use super::*;
    use pretty_assertions::assert_eq;

    fn blog_and_post(mb: &mut ModelBuilder) -> (EntityTypeId, EntityTypeId, ForeignKeyId) {
        let (blog, _) = entity_with_key(mb, "Blog", Explicit);
        let post = mb.entity("Post", Explicit).unwrap().unwrap();
        let fk = mb
            .has_relationship(post, blog, Some("Blog"), None, None, Explicit)
            .unwrap()
            .unwrap();
        (blog, post, fk)
    }

    proptest! {
        #[test]
        fn test_nullability_keeps_stronger_source(first in any_source(), second in any_source()) {
            let mut mb = minimal_session();
            let blog = mb.entity("Blog", Explicit).unwrap().unwrap();
            let url = mb.property(blog, "Url", string(), Explicit).unwrap().unwrap();
            mb.property_is_required(url, Some(true), first).unwrap();

            let applied = mb.property_is_required(url, Some(false), second).unwrap();

            let data = mb.model().property(url).unwrap();
            prop_assert_eq!(applied, second >= first);
            if applied {
                prop_assert!(data.is_nullable);
                prop_assert_eq!(data.nullable_source, Some(second));
            } else {
                prop_assert!(!data.is_nullable);
                prop_assert_eq!(data.nullable_source, Some(first));
            }
        }

        #[test]
        fn test_delete_behavior_keeps_stronger_source(first in any_source(), second in any_source()) {
            let mut mb = minimal_session();
            let (_, _, fk) = blog_and_post(&mut mb);
            mb.foreign_key_on_delete(fk, Some(DeleteBehavior::Cascade), first).unwrap();

            let applied = mb.foreign_key_on_delete(fk, Some(DeleteBehavior::Restrict), second).unwrap();

            let data = mb.model().foreign_key(fk).unwrap();
            prop_assert_eq!(applied, second >= first);
            let expected = if applied { DeleteBehavior::Restrict } else { DeleteBehavior::Cascade };
            prop_assert_eq!(data.delete_behavior, expected);
            prop_assert_eq!(data.delete_behavior_source, Some(if applied { second } else { first }));
        }

        #[test]
        fn test_ignore_blocks_weaker_property(first in any_source(), second in any_source()) {
            let mut mb = minimal_session();
            let blog = mb.entity("Blog", Explicit).unwrap().unwrap();
            mb.ignore(blog, "Url", first).unwrap();

            let added = mb.property(blog, "Url", string(), second).unwrap();

            let expected = second == Explicit || second > first;
            prop_assert_eq!(added.is_some(), expected);
            prop_assert_eq!(mb.model().find_ignored_source(blog, "Url").is_none(), expected);
        }
    }

    #[test]
    fn test_rejected_navigation_leaves_name() {
        let mut mb = minimal_session();
        let (_, _, fk) = blog_and_post(&mut mb);

        let outcome = mb.has_navigation(fk, Some("Owner"), true, DataAnnotation).unwrap();

        assert_eq!(outcome, None);
        let navigation = mb.model().foreign_key(fk).unwrap().dependent_to_principal.clone().unwrap();
        assert_eq!(navigation.name, "Blog");
        assert_eq!(navigation.source, Explicit);
    }
}

mod referenced_key_removal {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_removal_needs_every_referencing_foreign_key() {
        // GIVEN an alternate key referenced by an annotated relationship
        let mut mb = minimal_session();
        let (blog, _) = entity_with_key(&mut mb, "Blog", Explicit);
        let code = mb.property(blog, "Code", int(), Explicit).unwrap().unwrap();
        let post = mb.entity("Post", Explicit).unwrap().unwrap();
        let fk = mb
            .has_relationship(post, blog, Some("Blog"), None, None, DataAnnotation)
            .unwrap()
            .unwrap();
        mb.has_principal_key(fk, Some(&[code]), Convention).unwrap();
        let alternate = mb.model().foreign_key(fk).unwrap().principal_key;
        assert_eq!(mb.model().key(alternate).unwrap().properties, vec![code]);

        // WHEN a convention tries to remove the key
        let removed = mb.has_no_key(alternate, Convention).unwrap();

        // THEN it stays, and the relationship with it
        assert!(!removed);
        assert!(mb.model().key(alternate).is_some());
        assert_eq!(mb.model().foreign_key(fk).unwrap().principal_key, alternate);

        // WHEN the annotation level removes it
        assert!(mb.has_no_key(alternate, DataAnnotation).unwrap());

        // THEN the relationship falls back to the primary key
        assert!(mb.model().key(alternate).is_none());
        let fk = mb.model().foreign_keys().next().unwrap();
        assert_eq!(Some(fk.principal_key), mb.model().find_primary_key(blog));
        assert_eq!(fk.dependent, post);
    }
}

mod rejected_ignore {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_convention_ignore_of_explicit_foreign_key_property() {
        // GIVEN a required relationship pinned explicitly to CustomerId
        let mut mb = minimal_session();
        let (customer, _) = entity_with_key(&mut mb, "Customer", Explicit);
        let order = mb.entity("Order", Explicit).unwrap().unwrap();
        let customer_id = mb.property(order, "CustomerId", int(), Convention).unwrap().unwrap();
        let fk = mb
            .has_relationship_with_properties(order, customer, &[customer_id], None, Explicit)
            .unwrap()
            .unwrap();
        mb.foreign_key_is_required(fk, Some(true), Explicit).unwrap();

        // WHEN a convention ignores the property
        let ignored = mb.ignore(order, "CustomerId", Convention).unwrap();

        // THEN nothing changes
        assert!(!ignored);
        assert_eq!(mb.model().find_property(order, "CustomerId"), Some(customer_id));
        assert_eq!(mb.model().foreign_key(fk).unwrap().properties, vec![customer_id]);
        assert!(mb.model().find_ignored_source(order, "CustomerId").is_none());
    }

    #[test]
    fn test_explicit_ignore_removes_relationship_property() {
        let mut mb = minimal_session();
        let (customer, _) = entity_with_key(&mut mb, "Customer", Explicit);
        let order = mb.entity("Order", Explicit).unwrap().unwrap();
        let customer_id = mb.property(order, "CustomerId", int(), Convention).unwrap().unwrap();
        mb.has_relationship_with_properties(order, customer, &[customer_id], None, DataAnnotation)
            .unwrap()
            .unwrap();

        assert!(mb.ignore(order, "CustomerId", Explicit).unwrap());

        assert!(mb.model().property(customer_id).is_none());
        assert_eq!(mb.model().find_ignored_source(order, "CustomerId"), Some(Explicit));
    }
}
