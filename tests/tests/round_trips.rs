//! Detach and reattach round trips.

use keystone_tests::prelude::*;
use pretty_assertions::assert_eq;

/// Member names declared on an entity type, sorted.
fn member_names(model: &Model, entity: EntityTypeId) -> Vec<String> {
    let mut names: Vec<String> = model
        .declared_members(entity)
        .into_iter()
        .map(|m| model.member_name(m))
        .collect();
    names.sort();
    names
}

mod key_round_trip {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_key_and_referencing_foreign_keys_restored() {
        // GIVEN an alternate key on Blog referenced by Post
        let mut mb = minimal_session();
        let (blog, _) = entity_with_key(&mut mb, "Blog", Explicit);
        let code = mb.property(blog, "Code", int(), Explicit).unwrap().unwrap();
        let alternate = mb.has_key(blog, &[code], Explicit).unwrap().unwrap();
        let post = mb.entity("Post", Explicit).unwrap().unwrap();
        let fk = mb
            .has_relationship(post, blog, Some("Blog"), Some("Posts"), None, Explicit)
            .unwrap()
            .unwrap();
        mb.has_principal_key(fk, Some(&[code]), Explicit).unwrap();
        mb.foreign_key_on_delete(fk, Some(DeleteBehavior::Cascade), Explicit)
            .unwrap();

        // WHEN the key is detached and reattached
        let snapshot = mb.detach_key(alternate).unwrap();
        assert!(mb.model().key(alternate).is_none());
        assert_eq!(mb.model().foreign_keys().count(), 0);
        let restored = mb.attach_key(&snapshot).unwrap().unwrap();

        // THEN an equal key comes back with the relationship on it
        let key = mb.model().key(restored).unwrap();
        assert_eq!(key.properties, vec![code]);
        assert_eq!(key.source, Explicit);

        let fk = mb.model().foreign_keys().next().unwrap();
        assert_eq!(fk.principal_key, restored);
        assert_eq!(fk.dependent, post);
        assert_eq!(fk.dependent_to_principal.as_ref().unwrap().name, "Blog");
        assert_eq!(fk.principal_to_dependent.as_ref().unwrap().name, "Posts");
        assert_eq!(fk.delete_behavior, DeleteBehavior::Cascade);
        assert_eq!(fk.principal_key_source, Some(Explicit));
    }

    #[test]
    fn test_primary_key_role_restored() {
        let mut mb = minimal_session();
        let (blog, id) = entity_with_key(&mut mb, "Blog", Explicit);
        let key = mb.model().find_primary_key(blog).unwrap();

        let snapshot = mb.detach_key(key).unwrap();
        assert_eq!(snapshot.primary_key_source, Some(Explicit));
        let restored = mb.attach_key(&snapshot).unwrap().unwrap();

        assert_eq!(mb.model().find_primary_key(blog), Some(restored));
        assert_eq!(mb.model().key(restored).unwrap().properties, vec![id]);
    }
}

mod base_type_round_trip {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_members_survive_leaving_and_rejoining() {
        // GIVEN Cat derived from Animal, with its own members and a relationship
        let mut mb = minimal_session();
        let (animal, _) = entity_with_key(&mut mb, "Animal", Explicit);
        let cat = mb.entity("Cat", Explicit).unwrap().unwrap();
        mb.has_base_type(cat, Some(animal), Explicit).unwrap();
        let lives = mb.property(cat, "Lives", int(), Explicit).unwrap().unwrap();
        mb.has_index(cat, &[lives], DataAnnotation).unwrap();
        let (owner, _) = entity_with_key(&mut mb, "Owner", Explicit);
        mb.has_relationship(cat, owner, Some("Owner"), Some("Cats"), None, Explicit)
            .unwrap()
            .unwrap();
        let before = member_names(mb.model(), cat);

        // WHEN Cat leaves the hierarchy and comes back
        mb.has_base_type(cat, None, Explicit).unwrap();
        mb.has_base_type(cat, Some(animal), Explicit).unwrap();

        // THEN it declares the same members
        assert_eq!(mb.model().entity_type(cat).unwrap().base, Some(animal));
        assert_eq!(member_names(mb.model(), cat), before);
        let lives = mb.model().find_declared_property(cat, "Lives").unwrap();
        assert_eq!(mb.model().containing_indexes(lives).len(), 1);
        let fk = mb.model().find_navigation(cat, "Owner").unwrap().foreign_key;
        assert_eq!(mb.model().foreign_key(fk).unwrap().principal, owner);
    }
}

mod order_and_base_order {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_duplicate_key_dropped_index_kept() {
        // GIVEN BaseOrder keyed on Id, and Order with its own Id key and an index
        let mut mb = minimal_session();
        let (base_order, base_id) = entity_with_key(&mut mb, "BaseOrder", Explicit);
        let order = mb.entity("Order", Explicit).unwrap().unwrap();
        let order_id = mb.property(order, "Id", int(), Explicit).unwrap().unwrap();
        let own_key = mb.has_key(order, &[order_id], Explicit).unwrap().unwrap();
        let customer_id = mb.property(order, "CustomerId", int(), Explicit).unwrap().unwrap();
        let index = mb.has_index(order, &[customer_id], Convention).unwrap().unwrap();

        // WHEN Order derives from BaseOrder
        let rebased = mb.has_base_type(order, Some(base_order), Explicit).unwrap();

        // THEN Order's key is gone for good and its index is untouched
        assert_eq!(rebased, Some(order));
        let model = mb.model();
        assert!(model.key(own_key).is_none());
        assert!(model.entity_type(order).unwrap().keys.is_empty());
        assert_eq!(model.keys_of(base_order).len(), 1);
        assert_eq!(model.find_property(order, "Id"), Some(base_id));

        let index = model.index(index).unwrap();
        assert_eq!(index.entity, order);
        assert_eq!(index.properties, vec![customer_id]);
        assert_eq!(index.source, Convention);
    }
}
