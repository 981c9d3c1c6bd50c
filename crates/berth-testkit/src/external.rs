//! In-memory external tier with failure injection.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use berth_core::ObjectId;
use berth_store::{ExternalStore, ExternalStoreError};
use bytes::Bytes;
use parking_lot::Mutex;

/// External tier backed by a hash map.
#[derive(Default)]
pub struct MemoryExternalStore {
    objects: Mutex<HashMap<ObjectId, Bytes>>,
    fail_puts: AtomicBool,
    fail_gets: AtomicBool,
}

impl MemoryExternalStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `put` fail.
    pub fn set_fail_puts(&self, fail: bool) {
        self.fail_puts.store(fail, Ordering::SeqCst);
    }

    /// Make every subsequent `get` fail.
    pub fn set_fail_gets(&self, fail: bool) {
        self.fail_gets.store(fail, Ordering::SeqCst);
    }

    /// Whether the tier holds an object.
    pub fn contains(&self, id: &ObjectId) -> bool {
        self.objects.lock().contains_key(id)
    }

    /// Number of staged objects.
    pub fn len(&self) -> usize {
        self.objects.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.lock().is_empty()
    }
}

impl ExternalStore for MemoryExternalStore {
    fn put(&self, ids: &[ObjectId], buffers: &[Bytes]) -> Result<(), ExternalStoreError> {
        if self.fail_puts.load(Ordering::SeqCst) {
            return Err(ExternalStoreError::Io("injected put failure".into()));
        }
        assert_eq!(ids.len(), buffers.len(), "mismatched put batch");
        let mut objects = self.objects.lock();
        for (id, buffer) in ids.iter().zip(buffers) {
            objects.insert(*id, buffer.clone());
        }
        Ok(())
    }

    fn get(&self, ids: &[ObjectId]) -> Result<Vec<Bytes>, ExternalStoreError> {
        if self.fail_gets.load(Ordering::SeqCst) {
            return Err(ExternalStoreError::Io("injected get failure".into()));
        }
        let objects = self.objects.lock();
        ids.iter()
            .map(|id| {
                objects
                    .get(id)
                    .cloned()
                    .ok_or(ExternalStoreError::Missing(*id))
            })
            .collect()
    }
}
