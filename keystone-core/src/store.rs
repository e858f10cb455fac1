//! Concurrent identity → instance storage.
//!
//! Insertion is a single atomic insert-if-absent on the backing [`DashMap`];
//! entries are never replaced or removed. Reads take a shard read lock only,
//! so lookups from request threads need no external locking.

use std::any::{type_name, Any};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::error::RepositoryError;
use crate::identity::Identity;

// ---------------------------------------------------------------------------
// Instance handle
// ---------------------------------------------------------------------------

/// A type-erased, cheaply cloneable reference to a stored instance.
///
/// Holds the caller's `Arc<T>` (which may be a trait object) and remembers
/// the data address for reverse lookup.
#[derive(Clone)]
pub struct InstanceHandle {
    value: Arc<dyn Any + Send + Sync>,
    address: usize,
    type_name: &'static str,
}

impl InstanceHandle {
    pub fn new<T: ?Sized + Send + Sync + 'static>(instance: Arc<T>) -> Self {
        let address = address_of(&instance);
        Self {
            value: Arc::new(instance),
            address,
            type_name: type_name::<T>(),
        }
    }

    /// Returns the instance if it was stored as an `Arc<T>`.
    pub fn downcast<T: ?Sized + Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.value.downcast_ref::<Arc<T>>().cloned()
    }

    /// Type the instance was registered as.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// True if `other` points at the same allocation as this handle.
    pub fn is_same<T: ?Sized>(&self, other: &Arc<T>) -> bool {
        self.address == address_of(other)
    }
}

impl fmt::Debug for InstanceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstanceHandle")
            .field("type_name", &self.type_name)
            .field("address", &format_args!("{:#x}", self.address))
            .finish()
    }
}

fn address_of<T: ?Sized>(instance: &Arc<T>) -> usize {
    Arc::as_ptr(instance) as *const () as usize
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct InstanceStore {
    entries: DashMap<Identity, InstanceHandle>,
}

impl InstanceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `handle` under `identity` unless the identity is already taken.
    ///
    /// On [`RepositoryError::DuplicateKey`] nothing changes and the original
    /// instance stays retrievable.
    pub fn register(&self, identity: Identity, handle: InstanceHandle) -> Result<(), RepositoryError> {
        match self.entries.entry(identity) {
            Entry::Occupied(existing) => Err(RepositoryError::DuplicateKey {
                identity: existing.key().clone(),
            }),
            Entry::Vacant(slot) => {
                slot.insert(handle);
                Ok(())
            }
        }
    }

    pub fn lookup(&self, identity: &Identity) -> Option<InstanceHandle> {
        self.entries.get(identity).map(|entry| entry.value().clone())
    }

    pub fn contains(&self, identity: &Identity) -> bool {
        self.entries.contains_key(identity)
    }

    /// Copy of every entry; later registrations do not show up in it.
    pub fn snapshot(&self) -> HashMap<Identity, InstanceHandle> {
        self.entries
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }

    /// Identity of the entry holding `instance`, by pointer identity.
    pub fn identify<T: ?Sized>(&self, instance: &Arc<T>) -> Option<Identity> {
        self.snapshot()
            .into_iter()
            .find(|(_, handle)| handle.is_same(instance))
            .map(|(identity, _)| identity)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Barrier;
    use std::thread;

    use super::*;

    trait Source: Send + Sync {
        fn id(&self) -> u32;
    }

    struct FixedSource(u32);

    impl Source for FixedSource {
        fn id(&self) -> u32 {
            self.0
        }
    }

    #[test]
    fn trait_object_roundtrips_through_handle() {
        let source: Arc<dyn Source> = Arc::new(FixedSource(7));
        let handle = InstanceHandle::new(source.clone());
        let back = handle.downcast::<dyn Source>().expect("downcast");
        assert_eq!(back.id(), 7);
        assert!(handle.is_same(&source));
        assert!(handle.downcast::<FixedSource>().is_none());
    }

    #[test]
    fn duplicate_register_keeps_original() {
        let store = InstanceStore::new();
        let id = Identity::of::<FixedSource>("default");
        let first = Arc::new(FixedSource(1));
        store.register(id.clone(), InstanceHandle::new(first.clone())).expect("first");

        let err = store
            .register(id.clone(), InstanceHandle::new(Arc::new(FixedSource(2))))
            .unwrap_err();
        assert!(matches!(err, RepositoryError::DuplicateKey { .. }));

        let stored = store.lookup(&id).and_then(|h| h.downcast::<FixedSource>()).expect("lookup");
        assert!(Arc::ptr_eq(&stored, &first));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn snapshot_is_detached_from_store() {
        let store = InstanceStore::new();
        store
            .register(Identity::of::<FixedSource>("a"), InstanceHandle::new(Arc::new(FixedSource(1))))
            .expect("a");
        let snapshot = store.snapshot();
        store
            .register(Identity::of::<FixedSource>("b"), InstanceHandle::new(Arc::new(FixedSource(2))))
            .expect("b");
        assert_eq!(snapshot.len(), 1);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn concurrent_registration_has_exactly_one_winner() {
        const THREADS: usize = 16;
        let store = Arc::new(InstanceStore::new());
        let barrier = Arc::new(Barrier::new(THREADS));
        let handles: Vec<_> = (0..THREADS)
            .map(|n| {
                let store = Arc::clone(&store);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    let instance = Arc::new(FixedSource(n as u32));
                    store
                        .register(Identity::of::<FixedSource>("contended"), InstanceHandle::new(instance))
                        .is_ok()
                })
            })
            .collect();

        let winners = handles
            .into_iter()
            .map(|h| h.join().expect("join"))
            .filter(|won| *won)
            .count();
        assert_eq!(winners, 1);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn identify_finds_by_pointer_not_value() {
        let store = InstanceStore::new();
        let stored = Arc::new(FixedSource(3));
        store
            .register(Identity::of::<FixedSource>("x"), InstanceHandle::new(stored.clone()))
            .expect("register");
        assert_eq!(store.identify(&stored), Some(Identity::of::<FixedSource>("x")));
        assert_eq!(store.identify(&Arc::new(FixedSource(3))), None);
    }
}
