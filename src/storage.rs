//! Binding storage for the kernel
//!
//! Uses DashMap for lock-free concurrent access.

use crate::factory::{AnyArc, AnyFactory};
use crate::Lifetime;
use ahash::RandomState;
use dashmap::DashMap;
use std::any::TypeId;
use std::sync::Arc;

/// A factory plus the name of the contract it was bound under
pub(crate) struct Entry {
    pub factory: AnyFactory,
    pub type_name: &'static str,
}

/// Thread-safe storage for bindings
///
/// Supports a parent chain so scopes resolve through their ancestors.
pub(crate) struct ServiceStorage {
    factories: DashMap<TypeId, Entry, RandomState>,
    parent: Option<Arc<ServiceStorage>>,
}

impl ServiceStorage {
    /// Create new empty storage.
    ///
    /// 8 shards keep creation cheap; kernels rarely hold more than a few
    /// dozen bindings.
    #[inline]
    pub fn new() -> Self {
        Self {
            factories: DashMap::with_capacity_and_hasher_and_shard_amount(
                0,
                RandomState::new(),
                8,
            ),
            parent: None,
        }
    }

    /// Create a child storage that falls back to `parent`.
    #[inline]
    pub fn with_parent(parent: Arc<ServiceStorage>) -> Self {
        Self {
            parent: Some(parent),
            ..Self::new()
        }
    }

    /// Insert or replace the binding for `type_id`.
    ///
    /// Returns true when an existing binding was replaced.
    #[inline]
    pub fn insert(&self, type_id: TypeId, type_name: &'static str, factory: AnyFactory) -> bool {
        self.factories
            .insert(type_id, Entry { factory, type_name })
            .is_some()
    }

    #[inline]
    pub fn contains(&self, type_id: &TypeId) -> bool {
        self.factories.contains_key(type_id)
    }

    #[inline]
    pub fn resolve(&self, type_id: &TypeId) -> Option<AnyArc> {
        self.factories.get(type_id).map(|e| e.factory.resolve())
    }

    /// Resolve from the nearest scope in the chain that binds `type_id`.
    pub fn resolve_from_chain(&self, type_id: &TypeId) -> Option<AnyArc> {
        self.chain().find_map(|storage| storage.resolve(type_id))
    }

    pub fn contains_in_chain(&self, type_id: &TypeId) -> bool {
        self.chain().any(|storage| storage.contains(type_id))
    }

    /// Lifetimes of every binding for `type_id`, nearest scope first.
    ///
    /// The second element is the number of hops from this storage.
    pub fn bindings_in_chain(&self, type_id: &TypeId) -> Vec<(&'static str, Lifetime, u32)> {
        self.chain()
            .zip(0u32..)
            .filter_map(|(storage, hops)| {
                storage
                    .factories
                    .get(type_id)
                    .map(|e| (e.type_name, e.factory.lifetime(), hops))
            })
            .collect()
    }

    /// This storage followed by each ancestor.
    fn chain(&self) -> impl Iterator<Item = &ServiceStorage> {
        std::iter::successors(Some(self), |storage| storage.parent.as_deref())
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.factories.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }

    /// Remove every binding (the parent reference is kept)
    #[inline]
    pub fn clear(&self) {
        self.factories.clear();
    }
}

impl std::fmt::Debug for ServiceStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceStorage")
            .field("count", &self.len())
            .field("has_parent", &self.parent.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone)]
    struct TestService {
        value: i32,
    }

    fn insert(storage: &ServiceStorage, value: i32) -> bool {
        storage.insert(
            TypeId::of::<TestService>(),
            std::any::type_name::<TestService>(),
            AnyFactory::singleton(TestService { value }),
        )
    }

    #[test]
    fn test_storage_insert_and_resolve() {
        let storage = ServiceStorage::new();
        assert!(!insert(&storage, 42));

        let service = storage
            .resolve(&TypeId::of::<TestService>())
            .unwrap()
            .downcast::<TestService>()
            .unwrap();
        assert_eq!(service.value, 42);
    }

    #[test]
    fn test_storage_insert_replaces() {
        let storage = ServiceStorage::new();
        insert(&storage, 1);
        assert!(insert(&storage, 2));
        assert_eq!(storage.len(), 1);
    }

    #[test]
    fn test_chain_bindings_nearest_first() {
        let root = Arc::new(ServiceStorage::new());
        insert(&root, 1);
        let middle = Arc::new(ServiceStorage::with_parent(Arc::clone(&root)));
        let leaf = ServiceStorage::with_parent(Arc::clone(&middle));
        insert(&leaf, 3);

        let found = leaf.bindings_in_chain(&TypeId::of::<TestService>());
        let hops: Vec<u32> = found.iter().map(|(_, _, hops)| *hops).collect();
        assert_eq!(hops, vec![0, 2]);
        assert!(middle.contains_in_chain(&TypeId::of::<TestService>()));
        assert!(!middle.contains(&TypeId::of::<TestService>()));
    }

    #[test]
    fn test_clear_keeps_parent() {
        let root = Arc::new(ServiceStorage::new());
        insert(&root, 1);
        let child = ServiceStorage::with_parent(Arc::clone(&root));
        insert(&child, 2);

        child.clear();
        assert!(child.is_empty());
        assert!(child.resolve_from_chain(&TypeId::of::<TestService>()).is_some());
    }
}
