//! Id-addressed element storage.

use keystone_core::{
    EntityTypeId, ForeignKeyId, IndexId, KeyId, PropertyId, ServicePropertyId, SkipNavigationId,
};
use std::collections::BTreeMap;
use std::marker::PhantomData;

/// Conversion between a typed id and its raw slot number.
pub(crate) trait RawId: Copy {
    fn from_raw(raw: u32) -> Self;
    fn to_raw(self) -> u32;
}

macro_rules! raw_id {
    ($($id:ident),*) => {
        $(
            impl RawId for $id {
                fn from_raw(raw: u32) -> Self {
                    $id::new(raw)
                }

                fn to_raw(self) -> u32 {
                    self.raw()
                }
            }
        )*
    };
}

raw_id!(
    EntityTypeId,
    PropertyId,
    KeyId,
    IndexId,
    ForeignKeyId,
    SkipNavigationId,
    ServicePropertyId
);

/// Storage for one element kind. Ids are allocated monotonically and never
/// reused, so a stale id resolves to nothing instead of to a newer element.
/// Iteration follows creation order.
#[derive(Debug, Clone)]
pub(crate) struct Arena<I, T> {
    items: BTreeMap<u32, T>,
    next: u32,
    _id: PhantomData<I>,
}

impl<I, T> Default for Arena<I, T> {
    fn default() -> Self {
        Self {
            items: BTreeMap::new(),
            next: 0,
            _id: PhantomData,
        }
    }
}

impl<I: RawId, T> Arena<I, T> {
    /// Allocate an id and store the element built for it.
    pub fn insert_with(&mut self, build: impl FnOnce(I) -> T) -> I {
        let id = I::from_raw(self.next);
        self.next += 1;
        self.items.insert(id.to_raw(), build(id));
        id
    }

    pub fn get(&self, id: I) -> Option<&T> {
        self.items.get(&id.to_raw())
    }

    pub fn get_mut(&mut self, id: I) -> Option<&mut T> {
        self.items.get_mut(&id.to_raw())
    }

    pub fn remove(&mut self, id: I) -> Option<T> {
        self.items.remove(&id.to_raw())
    }

    pub fn contains(&self, id: I) -> bool {
        self.items.contains_key(&id.to_raw())
    }

    pub fn iter(&self) -> impl Iterator<Item = (I, &T)> {
        self.items.iter().map(|(raw, item)| (I::from_raw(*raw), item))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (I, &mut T)> {
        self.items
            .iter_mut()
            .map(|(raw, item)| (I::from_raw(*raw), item))
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }
}
