//! The pin adapter.

use std::collections::HashMap;
use std::sync::Arc;

use berth_core::{ClientId, ObjectId};
use berth_store::{DirectoryError, ObjectDirectory, ShmAllocator};
use bytes::Bytes;
use thiserror::Error;
use tracing::{debug, warn};

/// Errors surfaced by the pin adapter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PinError {
    #[error(transparent)]
    Directory(#[from] DirectoryError),
}

/// A pinned object's buffers, kept alive by the adapter's directory-side
/// reference.
#[derive(Debug, Clone)]
pub struct PinnedObject {
    pub data: Bytes,
    pub metadata: Bytes,
}

/// Caller-side pin adapter.
///
/// Owned by a single event loop; not thread-safe by itself. Every pin maps
/// to one directory-side client reference held until [`unpin_object`]
/// releases it.
///
/// [`unpin_object`]: Self::unpin_object
pub struct ObjectPinner {
    directory: Arc<ObjectDirectory>,
    allocator: Arc<dyn ShmAllocator>,
    client: ClientId,
    pinned: HashMap<ObjectId, PinnedObject>,
}

impl ObjectPinner {
    /// Build a pinner acting as `client` against the given directory.
    ///
    /// The allocator must be the same one backing the directory; the pinner
    /// reads pinned buffers through its data plane the way an out-of-process
    /// client would read its mapping.
    #[must_use]
    pub fn new(
        directory: Arc<ObjectDirectory>,
        allocator: Arc<dyn ShmAllocator>,
        client: ClientId,
    ) -> Self {
        Self {
            directory,
            allocator,
            client,
            pinned: HashMap::new(),
        }
    }

    /// Synthesize a sentinel object whose metadata is the decimal form of
    /// `error_code`. Idempotent: an existing object with the same id counts
    /// as success, keeping the first writer's payload.
    ///
    /// # Errors
    /// Propagates store failures other than `ObjectExists`.
    pub fn mark_object_as_failed(&self, id: ObjectId, error_code: i32) -> Result<(), PinError> {
        let metadata = error_code.to_string();
        match self
            .directory
            .create_and_seal_object(id, true, &[], metadata.as_bytes(), self.client)
        {
            Ok(_) | Err(DirectoryError::ObjectExists(_)) => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    /// Pin a batch of objects with a non-blocking get.
    ///
    /// The get never waits: objects that are absent, unsealed, or evicted
    /// without a restorable copy are logged and skipped, and the caller is
    /// expected to retry. Pinning an id that is already pinned is a bug.
    ///
    /// # Panics
    /// If an id in `ids` is already pinned.
    pub fn pin_objects(&mut self, ids: &[ObjectId]) {
        let result = self.directory.get_objects(ids, self.client);
        let available: std::collections::HashSet<ObjectId> = result
            .sealed
            .iter()
            .chain(result.reconstructed.iter())
            .copied()
            .collect();

        for id in ids {
            if !available.contains(id) {
                warn!(object_id = %id, "object was evicted before it could be pinned");
                continue;
            }
            let handle = self
                .directory
                .register_sealed_object_to_client(*id, self.client);
            let data = self
                .allocator
                .read(handle.store_fd, handle.data_offset, handle.data_size);
            let metadata = self.allocator.read(
                handle.store_fd,
                handle.metadata_offset,
                handle.metadata_size,
            );
            debug!(object_id = %id, size = handle.total_size(), "pinned object");
            let previous = self.pinned.insert(*id, PinnedObject { data, metadata });
            assert!(previous.is_none(), "object {id} pinned twice");
        }
    }

    /// Release a pin, dropping the directory-side reference with it.
    /// Unknown ids are ignored.
    pub fn unpin_object(&mut self, id: &ObjectId) {
        if self.pinned.remove(id).is_some() {
            debug!(object_id = %id, "unpinned object");
            self.directory.remove_client_reference(*id, self.client);
        }
    }

    /// Access a pinned object's buffers.
    #[must_use]
    pub fn get_pinned(&self, id: &ObjectId) -> Option<&PinnedObject> {
        self.pinned.get(id)
    }

    /// Number of objects currently pinned.
    #[must_use]
    pub fn pinned_count(&self) -> usize {
        self.pinned.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use berth_testkit::{fixtures, RecordingSink, TestAllocator};

    fn setup(limit: u64) -> (ObjectPinner, Arc<ObjectDirectory>, ClientId) {
        let allocator = Arc::new(TestAllocator::new(limit));
        let sink = RecordingSink::new();
        let directory = Arc::new(ObjectDirectory::new(
            allocator.clone(),
            None,
            sink.sink(),
        ));
        let pinner = ObjectPinner::new(directory.clone(), allocator, fixtures::client(99));
        (pinner, directory, fixtures::client(1))
    }

    fn create_sealed(directory: &ObjectDirectory, id: ObjectId, payload: &[u8], client: ClientId) {
        directory
            .create_and_seal_object(id, true, payload, &[], client)
            .unwrap();
    }

    #[test]
    fn failure_sentinel_is_idempotent_and_keeps_first_metadata() {
        let (mut pinner, directory, _) = setup(1024);
        let id = fixtures::object_id(1);

        pinner.mark_object_as_failed(id, 3).unwrap();
        // A second mark with a different code is absorbed.
        pinner.mark_object_as_failed(id, 7).unwrap();

        let handle = directory.mark_object_as_reconstructed(id);
        assert_eq!(handle.data_size, 0);
        assert_eq!(handle.metadata_size, 1);

        pinner.pin_objects(&[id]);
        let pinned = pinner.get_pinned(&id).unwrap();
        assert!(pinned.data.is_empty());
        assert_eq!(&pinned.metadata[..], b"3");
    }

    #[test]
    fn pin_holds_reference_and_unpin_releases_it() {
        let (mut pinner, directory, client) = setup(1024);
        let id = fixtures::object_id(1);
        create_sealed(&directory, id, b"payload", client);

        pinner.pin_objects(&[id]);
        assert_eq!(pinner.pinned_count(), 1);
        assert_eq!(&pinner.get_pinned(&id).unwrap().data[..], b"payload");

        // Pinned objects cannot be deleted out from under the caller.
        assert_eq!(
            directory.delete_object(id),
            Err(DirectoryError::ObjectInUse(id))
        );

        // Dropping the pin completes the deferred delete.
        pinner.unpin_object(&id);
        assert_eq!(pinner.pinned_count(), 0);
        assert!(!directory.contains_object(id));
    }

    #[test]
    fn unpin_restores_pre_pin_reference_count() {
        let (mut pinner, directory, client) = setup(1024);
        let a = fixtures::object_id(1);
        let b = fixtures::object_id(2);
        create_sealed(&directory, a, b"aa", client);
        create_sealed(&directory, b, b"bb", client);

        pinner.pin_objects(&[a, b]);
        pinner.unpin_object(&a);
        pinner.unpin_object(&b);

        // Both objects are back to unreferenced-sealed: a plain delete
        // succeeds immediately.
        assert_eq!(directory.delete_object(a), Ok(()));
        assert_eq!(directory.delete_object(b), Ok(()));
    }

    #[test]
    fn missing_objects_are_skipped() {
        let (mut pinner, directory, client) = setup(1024);
        let present = fixtures::object_id(1);
        let absent = fixtures::object_id(2);
        create_sealed(&directory, present, b"here", client);

        pinner.pin_objects(&[present, absent]);
        assert_eq!(pinner.pinned_count(), 1);
        assert!(pinner.get_pinned(&absent).is_none());
    }

    #[test]
    fn unsealed_objects_are_not_pinnable() {
        let (mut pinner, directory, client) = setup(1024);
        let id = fixtures::object_id(1);
        directory.create_object(id, false, 8, 0, 0, client).unwrap();

        pinner.pin_objects(&[id]);
        assert_eq!(pinner.pinned_count(), 0);
    }

    #[test]
    #[should_panic(expected = "pinned twice")]
    fn double_pin_is_a_bug() {
        let (mut pinner, directory, client) = setup(1024);
        let id = fixtures::object_id(1);
        create_sealed(&directory, id, b"x", client);

        pinner.pin_objects(&[id]);
        pinner.pin_objects(&[id]);
    }

    #[test]
    fn unpin_of_unknown_id_is_ignored() {
        let (mut pinner, _, _) = setup(1024);
        pinner.unpin_object(&fixtures::object_id(42));
        assert_eq!(pinner.pinned_count(), 0);
    }
}
