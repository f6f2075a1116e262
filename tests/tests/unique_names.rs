//! Names of synthesized foreign key properties.

use keystone_builder::next_unique_name;
use keystone_tests::prelude::*;
use proptest::prelude::*;
use std::collections::BTreeSet;

/// Principal key property names, some of which collide once prefixed with
/// `Blog` (`Id` becomes `BlogId`).
fn principal_names() -> impl Strategy<Value = Vec<String>> {
    proptest::sample::subsequence(vec!["Id", "BlogId", "Code", "BlogCode", "BlogId1"], 1..=5)
        .prop_map(|names| names.into_iter().map(String::from).collect())
}

fn taken_names() -> impl Strategy<Value = BTreeSet<String>> {
    proptest::collection::btree_set(
        prop_oneof![
            Just("BlogId".to_string()),
            Just("BlogId1".to_string()),
            Just("BlogId2".to_string()),
            Just("BlogId3".to_string()),
        ],
        0..4,
    )
}

proptest! {
    #[test]
    fn test_foreign_key_property_avoids_members(taken in taken_names()) {
        let mut mb = minimal_session();
        let (blog, _) = entity_with_key(&mut mb, "Blog", Explicit);
        let post = mb.entity("Post", Explicit).unwrap().unwrap();
        for name in &taken {
            mb.property(post, name, string(), Explicit).unwrap().unwrap();
        }

        let fk = mb
            .has_relationship(post, blog, None, None, Some(true), Explicit)
            .unwrap()
            .unwrap();

        let properties = mb.model().foreign_key(fk).unwrap().properties.clone();
        prop_assert_eq!(properties.len(), 1);
        let name = mb.model().property_name(properties[0]);
        prop_assert!(!taken.contains(&name));
        prop_assert_eq!(name, next_unique_name("BlogId", |n| taken.contains(n)));
    }

    #[test]
    fn test_ignored_names_are_skipped(ignored in taken_names()) {
        let mut mb = minimal_session();
        let (blog, _) = entity_with_key(&mut mb, "Blog", Explicit);
        let post = mb.entity("Post", Explicit).unwrap().unwrap();
        for name in &ignored {
            mb.ignore(post, name, Explicit).unwrap();
        }

        let fk = mb
            .has_relationship(post, blog, None, None, Some(true), Explicit)
            .unwrap()
            .unwrap();

        let property = mb.model().foreign_key(fk).unwrap().properties[0];
        let name = mb.model().property_name(property);
        prop_assert!(!ignored.contains(&name));
        prop_assert!(mb.model().find_ignored_source(post, &name).is_none());
    }

    #[test]
    fn test_composite_key_names_distinct_and_free(
        principal in principal_names(),
        taken in taken_names(),
    ) {
        // GIVEN Blog keyed on several properties and Post holding some names
        let mut mb = minimal_session();
        let blog = mb.entity("Blog", Explicit).unwrap().unwrap();
        let mut key = Vec::new();
        for name in &principal {
            key.push(mb.property(blog, name, int(), Explicit).unwrap().unwrap());
        }
        mb.primary_key(blog, &key, Explicit).unwrap().unwrap();
        let post = mb.entity("Post", Explicit).unwrap().unwrap();
        for name in &taken {
            mb.property(post, name, string(), Explicit).unwrap().unwrap();
        }

        // WHEN a relationship synthesizes the dependent properties
        let fk = mb
            .has_relationship(post, blog, None, None, Some(true), Explicit)
            .unwrap()
            .unwrap();

        // THEN there is one per key property, pairwise distinct and not shared
        let properties = mb.model().foreign_key(fk).unwrap().properties.clone();
        let names: Vec<String> = properties.iter().map(|p| mb.model().property_name(*p)).collect();
        prop_assert_eq!(names.len(), principal.len());
        let distinct: BTreeSet<&String> = names.iter().collect();
        prop_assert_eq!(distinct.len(), names.len());
        for (name, property) in names.iter().zip(&properties) {
            prop_assert!(!taken.contains(name));
            prop_assert_eq!(mb.model().find_members_in_hierarchy(post, name).len(), 1);
            prop_assert_eq!(mb.model().find_property(post, name), Some(*property));
        }
    }
}
