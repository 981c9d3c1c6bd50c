//! The object directory: the authoritative registry of every object in the
//! store.
//!
//! All state transitions flow through one coarse mutex. Public operations
//! lock it for their entire duration; the external tier is the only
//! collaborator invoked while it is held. Notification batches are published
//! under the lock, after the table mutation they describe, so subscribers
//! observe per-id records in state-transition order.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use berth_core::{ClientId, ObjectHandle, ObjectId, ObjectInfo, ObjectState};
use chrono::Utc;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::allocator::{DeviceAllocator, MapInfo, ShmAllocator, BLOCK_ALIGN};
use crate::entry::ObjectTableEntry;
use crate::error::DirectoryError;
use crate::eviction::{EvictionPolicy, LruPolicy};
use crate::external::ExternalStore;

/// Callback consuming notification batches, invoked under the table mutex.
pub type NotificationSink = Box<dyn Fn(&[ObjectInfo]) + Send + Sync>;

/// Result of a multi-get: ids bucketed by how they can be served.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GetObjectsResult {
    /// Resident and readable.
    pub sealed: Vec<ObjectId>,
    /// Restored from the external tier during this call.
    pub reconstructed: Vec<ObjectId>,
    /// Absent, unreadable, or unrestorable for this request.
    pub nonexistent: Vec<ObjectId>,
}

/// Point-in-time counters for observability.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryStats {
    pub objects_created: usize,
    pub objects_sealed: usize,
    pub objects_evicted: usize,
    /// Bytes of primary (or device) memory currently held by entries.
    pub resident_bytes: u64,
    /// Bytes represented by evicted entries awaiting restore.
    pub evicted_bytes: u64,
    pub evictable_objects: usize,
    pub evictable_bytes: u64,
    pub pending_deletes: usize,
    pub clients_with_references: usize,
}

/// Everything guarded by the table mutex.
struct DirectoryInner {
    object_table: HashMap<ObjectId, ObjectTableEntry>,
    /// Ids whose delete was requested but could not be honored yet.
    deletion_cache: HashSet<ObjectId>,
    /// Object ids each connected client currently holds.
    client_objects: HashMap<ClientId, HashSet<ObjectId>>,
    policy: Box<dyn EvictionPolicy>,
}

/// A fresh primary allocation, not yet attached to an entry.
struct PrimaryAllocation {
    pointer: u64,
    mapinfo: MapInfo,
}

/// The shared-memory object store directory.
pub struct ObjectDirectory {
    inner: Mutex<DirectoryInner>,
    allocator: Arc<dyn ShmAllocator>,
    device_allocator: Option<Arc<dyn DeviceAllocator>>,
    external_store: Option<Arc<dyn ExternalStore>>,
    notification_sink: NotificationSink,
}

fn now() -> i64 {
    Utc::now().timestamp()
}

impl ObjectDirectory {
    /// Build a directory with the default strict-LRU policy sized to the
    /// allocator's footprint limit.
    #[must_use]
    pub fn new(
        allocator: Arc<dyn ShmAllocator>,
        external_store: Option<Arc<dyn ExternalStore>>,
        notification_sink: NotificationSink,
    ) -> Self {
        let policy = Box::new(LruPolicy::new(allocator.footprint_limit()));
        Self::with_policy(allocator, policy, external_store, notification_sink)
    }

    /// Build a directory around an explicit eviction policy.
    #[must_use]
    pub fn with_policy(
        allocator: Arc<dyn ShmAllocator>,
        policy: Box<dyn EvictionPolicy>,
        external_store: Option<Arc<dyn ExternalStore>>,
        notification_sink: NotificationSink,
    ) -> Self {
        Self {
            inner: Mutex::new(DirectoryInner {
                object_table: HashMap::new(),
                deletion_cache: HashSet::new(),
                client_objects: HashMap::new(),
                policy,
            }),
            allocator,
            device_allocator: None,
            external_store,
            notification_sink,
        }
    }

    /// Attach an optional device-memory allocator.
    #[must_use]
    pub fn with_device_allocator(mut self, device_allocator: Arc<dyn DeviceAllocator>) -> Self {
        self.device_allocator = Some(device_allocator);
        self
    }

    // ── Public operations ───────────────────────────────────────────────────

    /// Create a new mutable object and hand its creator a mapping handle.
    ///
    /// # Errors
    /// `ObjectExists` if the id is already in the table (any state);
    /// `OutOfMemory` if allocation fails even after eviction.
    ///
    /// # Panics
    /// If `data_size + metadata_size == 0`.
    pub fn create_object(
        &self,
        id: ObjectId,
        evict_if_full: bool,
        data_size: u64,
        metadata_size: u64,
        device_num: u32,
        client: ClientId,
    ) -> Result<ObjectHandle, DirectoryError> {
        let mut inner = self.inner.lock();
        self.create_object_internal(
            &mut inner,
            id,
            evict_if_full,
            data_size,
            metadata_size,
            device_num,
            client,
        )?;
        Ok(inner.object_table[&id].handle())
    }

    /// Create, fill, and seal a host object in one step, then drop the
    /// creator's reference — the store-side equivalent of a client that
    /// creates, seals, and releases. Used to synthesize sentinel objects.
    ///
    /// # Errors
    /// Same as [`create_object`](Self::create_object).
    pub fn create_and_seal_object(
        &self,
        id: ObjectId,
        evict_if_full: bool,
        data: &[u8],
        metadata: &[u8],
        client: ClientId,
    ) -> Result<ObjectHandle, DirectoryError> {
        let mut inner = self.inner.lock();
        self.create_object_internal(
            &mut inner,
            id,
            evict_if_full,
            data.len() as u64,
            metadata.len() as u64,
            0,
            client,
        )?;
        let (fd, offset, data_size) = {
            let entry = &inner.object_table[&id];
            (entry.fd, entry.offset, entry.data_size)
        };
        self.allocator.write(fd, offset, data);
        self.allocator.write(fd, offset + data_size, metadata);
        self.seal_objects_internal(&mut inner, &[id]);
        let released = self.remove_client_reference_internal(&mut inner, id, client);
        assert!(released, "creator did not hold its own creation");
        Ok(inner.object_table[&id].handle())
    }

    /// Seal a batch of objects a client has finished writing.
    ///
    /// # Panics
    /// If any id is absent or not in `Created` state.
    pub fn seal_objects(&self, ids: &[ObjectId]) {
        let mut inner = self.inner.lock();
        self.seal_objects_internal(&mut inner, ids);
    }

    /// Serve a multi-get, restoring evicted objects from the external tier
    /// when possible. Every id reported `sealed` or `reconstructed` leaves
    /// the caller holding a reference.
    pub fn get_objects(&self, ids: &[ObjectId], client: ClientId) -> GetObjectsResult {
        let mut inner = self.inner.lock();
        let mut result = GetObjectsResult::default();
        let mut restoring: Vec<ObjectId> = Vec::new();

        for &id in ids {
            match inner.object_table.get(&id).map(|entry| entry.state) {
                None => result.nonexistent.push(id),
                Some(ObjectState::Sealed) => {
                    self.add_client_reference_internal(&mut inner, id, client);
                    result.sealed.push(id);
                }
                Some(ObjectState::Evicted) => {
                    if self.external_store.is_none() {
                        // Nothing can bring the bytes back.
                        result.nonexistent.push(id);
                        continue;
                    }
                    let size = inner.object_table[&id].object_size();
                    match self.allocate_primary(&mut inner, size, true, client, false) {
                        Ok(allocation) => {
                            let entry = inner
                                .object_table
                                .get_mut(&id)
                                .expect("restoring entry vanished");
                            entry.assign_host_allocation(
                                allocation.mapinfo,
                                allocation.pointer,
                                now(),
                            );
                            inner.policy.object_created(id, size, client, false);
                            self.add_client_reference_internal(&mut inner, id, client);
                            restoring.push(id);
                        }
                        Err(err) => {
                            // Stays evicted; some later request can retry.
                            debug!(object_id = %id, error = %err, "cannot reallocate for restore");
                            result.nonexistent.push(id);
                        }
                    }
                }
                // Not yet readable.
                Some(ObjectState::Created) => result.nonexistent.push(id),
            }
        }

        if !restoring.is_empty() {
            self.restore_from_external(&mut inner, &restoring, client, &mut result);
        }
        result
    }

    /// Delete a sealed, unreferenced object. Anything else is parked in the
    /// deletion cache and completes later.
    ///
    /// # Errors
    /// `ObjectNonexistent`, `ObjectNotSealed` (deferred), `ObjectInUse`
    /// (deferred).
    pub fn delete_object(&self, id: ObjectId) -> Result<(), DirectoryError> {
        let mut inner = self.inner.lock();
        let Some(entry) = inner.object_table.get(&id) else {
            return Err(DirectoryError::ObjectNonexistent(id));
        };
        if entry.state != ObjectState::Sealed {
            inner.deletion_cache.insert(id);
            return Err(DirectoryError::ObjectNotSealed(id));
        }
        if entry.ref_count != 0 {
            inner.deletion_cache.insert(id);
            return Err(DirectoryError::ObjectInUse(id));
        }
        let (data_size, metadata_size) = (entry.data_size, entry.metadata_size);
        inner.policy.remove_object(id);
        self.erase_object(&mut inner, id);
        (self.notification_sink)(&[ObjectInfo {
            object_id: id,
            data_size,
            metadata_size,
            is_deletion: true,
        }]);
        debug!(object_id = %id, "deleted object");
        Ok(())
    }

    /// Abort an unsealed object. Only the creator may abort; any other
    /// caller is ignored. Returns whether the abort happened.
    ///
    /// # Panics
    /// If the id is absent or the object is not in `Created` state.
    pub fn abort_object(&self, id: ObjectId, client: ClientId) -> bool {
        let mut inner = self.inner.lock();
        let entry = inner
            .object_table
            .get(&id)
            .expect("aborting object not in the table");
        assert_eq!(
            entry.state,
            ObjectState::Created,
            "aborting object that left the created state"
        );
        let is_creator = inner
            .client_objects
            .get_mut(&client)
            .is_some_and(|held| held.remove(&id));
        if !is_creator {
            return false;
        }
        inner.policy.remove_object(id);
        self.erase_object(&mut inner, id);
        debug!(object_id = %id, %client, "aborted object");
        true
    }

    /// Voluntarily evict up to `num_bytes` of sealed, unreferenced objects.
    /// Returns the bytes covered by the chosen victims.
    pub fn evict_objects(&self, num_bytes: u64) -> u64 {
        let mut inner = self.inner.lock();
        let mut victims = Vec::new();
        let bytes_evicted = inner.policy.choose_objects_to_evict(num_bytes, &mut victims);
        self.evict_objects_internal(&mut inner, &victims);
        bytes_evicted
    }

    /// Whether the object is present as `Sealed` or `Evicted`.
    pub fn contains_object(&self, id: ObjectId) -> bool {
        let inner = self.inner.lock();
        inner
            .object_table
            .get(&id)
            .is_some_and(|entry| matches!(entry.state, ObjectState::Sealed | ObjectState::Evicted))
    }

    /// Record that `client` is using a sealed object and return its handle.
    ///
    /// # Panics
    /// If the id is absent or the object is not sealed.
    pub fn register_sealed_object_to_client(
        &self,
        id: ObjectId,
        client: ClientId,
    ) -> ObjectHandle {
        let mut inner = self.inner.lock();
        let entry = inner
            .object_table
            .get(&id)
            .expect("registering object not in the table");
        assert_eq!(
            entry.state,
            ObjectState::Sealed,
            "registering object that is not sealed"
        );
        let handle = entry.handle();
        self.add_client_reference_internal(&mut inner, id, client);
        handle
    }

    /// Return the handle of an entry without touching its references.
    ///
    /// # Panics
    /// If the id is absent.
    pub fn mark_object_as_reconstructed(&self, id: ObjectId) -> ObjectHandle {
        let inner = self.inner.lock();
        inner
            .object_table
            .get(&id)
            .expect("marking object not in the table")
            .handle()
    }

    /// Purge a dead client: release its sealed references and abort its
    /// unsealed creations.
    pub fn disconnect_client(&self, client: ClientId) {
        let mut inner = self.inner.lock();
        let held = inner.client_objects.remove(&client).unwrap_or_default();
        let mut sealed = Vec::new();
        for id in held {
            let Some(entry) = inner.object_table.get(&id) else {
                continue;
            };
            match entry.state {
                // Deferred: releasing here would mutate state mid-iteration.
                ObjectState::Sealed => sealed.push(id),
                // Unsealed objects die with their creator, unannounced.
                ObjectState::Created => {
                    inner.policy.remove_object(id);
                    self.erase_object(&mut inner, id);
                }
                ObjectState::Evicted => {
                    unreachable!("client held a reference to an evicted object")
                }
            }
        }
        for id in sealed {
            self.release_reference(&mut inner, id);
        }
        inner.policy.client_disconnected(client);
        debug!(%client, "client disconnected");
    }

    /// Snapshot of every sealed object's id and sizes.
    pub fn get_sealed_objects_info(&self) -> Vec<ObjectInfo> {
        let inner = self.inner.lock();
        inner
            .object_table
            .iter()
            .filter(|(_, entry)| entry.state == ObjectState::Sealed)
            .map(|(id, entry)| ObjectInfo {
                object_id: *id,
                data_size: entry.data_size,
                metadata_size: entry.metadata_size,
                is_deletion: false,
            })
            .collect()
    }

    /// Record that `client` is using the object (no-op if it already does).
    ///
    /// # Panics
    /// If the id is absent.
    pub fn add_client_reference(&self, id: ObjectId, client: ClientId) {
        let mut inner = self.inner.lock();
        self.add_client_reference_internal(&mut inner, id, client);
    }

    /// Drop `client`'s reference. Returns false if the client did not hold
    /// the object. A count reaching zero makes the object evictable, or
    /// completes a deferred delete.
    pub fn remove_client_reference(&self, id: ObjectId, client: ClientId) -> bool {
        let mut inner = self.inner.lock();
        self.remove_client_reference_internal(&mut inner, id, client)
    }

    /// Assign or clear a client's private memory quota.
    pub fn set_client_quota(&self, client: ClientId, quota: Option<u64>) -> bool {
        let mut inner = self.inner.lock();
        inner.policy.set_client_quota(client, quota)
    }

    /// Point-in-time counters.
    pub fn stats(&self) -> DirectoryStats {
        let inner = self.inner.lock();
        let mut stats = DirectoryStats {
            evictable_objects: inner.policy.evictable_count(),
            evictable_bytes: inner.policy.evictable_bytes(),
            pending_deletes: inner.deletion_cache.len(),
            clients_with_references: inner
                .client_objects
                .values()
                .filter(|held| !held.is_empty())
                .count(),
            ..DirectoryStats::default()
        };
        for entry in inner.object_table.values() {
            match entry.state {
                ObjectState::Created => stats.objects_created += 1,
                ObjectState::Sealed => stats.objects_sealed += 1,
                ObjectState::Evicted => stats.objects_evicted += 1,
            }
            if entry.is_resident() {
                stats.resident_bytes += entry.object_size();
            } else {
                stats.evicted_bytes += entry.object_size();
            }
        }
        stats
    }

    // ── Internals (table mutex held) ────────────────────────────────────────

    fn create_object_internal(
        &self,
        inner: &mut DirectoryInner,
        id: ObjectId,
        evict_if_full: bool,
        data_size: u64,
        metadata_size: u64,
        device_num: u32,
        client: ClientId,
    ) -> Result<(), DirectoryError> {
        debug!(object_id = %id, data_size, metadata_size, device_num, "creating object");
        if inner.object_table.contains_key(&id) {
            return Err(DirectoryError::ObjectExists(id));
        }
        let total = data_size + metadata_size;
        assert!(total > 0, "allocation size must be positive");

        let entry = if device_num == 0 {
            let allocation = self.allocate_primary(inner, total, evict_if_full, client, true)?;
            ObjectTableEntry::new_host(
                allocation.mapinfo,
                allocation.pointer,
                data_size,
                metadata_size,
                now(),
            )
        } else {
            let (pointer, ipc_handle) = self.allocate_device(device_num, total)?;
            ObjectTableEntry::new_device(
                device_num,
                pointer,
                ipc_handle,
                data_size,
                metadata_size,
                now(),
            )
        };
        inner.object_table.insert(id, entry);
        if device_num == 0 {
            // Device memory is outside the primary footprint and quota.
            inner.policy.object_created(id, total, client, true);
        }
        self.add_client_reference_internal(&mut *inner, id, client);
        Ok(())
    }

    /// Allocate primary memory, evicting on demand.
    ///
    /// Eviction is consulted only after an allocation attempt fails, so
    /// opportunistic headroom is used first; the loop terminates because the
    /// policy's eligible set shrinks on every pass and `require_space`
    /// reports exhaustion.
    fn allocate_primary(
        &self,
        inner: &mut DirectoryInner,
        size: u64,
        evict_if_full: bool,
        client: ClientId,
        is_create: bool,
    ) -> Result<PrimaryAllocation, DirectoryError> {
        if evict_if_full {
            let mut victims = Vec::new();
            if !inner
                .policy
                .enforce_per_client_quota(client, size, is_create, &mut victims)
            {
                return Err(DirectoryError::out_of_memory(
                    size,
                    "per-client quota exhausted",
                ));
            }
            self.evict_objects_internal(inner, &victims);
        }
        loop {
            if let Some(pointer) = self.allocator.memalign(BLOCK_ALIGN, size) {
                let mapinfo = self
                    .allocator
                    .mapinfo(pointer)
                    .expect("allocator returned an address without map info");
                assert!(mapinfo.fd.is_valid(), "allocation mapped to an invalid segment");
                return Ok(PrimaryAllocation { pointer, mapinfo });
            }
            if !evict_if_full {
                return Err(DirectoryError::out_of_memory(size, "segment full"));
            }
            let mut victims = Vec::new();
            let satisfied = inner.policy.require_space(size, &mut victims);
            self.evict_objects_internal(inner, &victims);
            if !satisfied {
                return Err(DirectoryError::out_of_memory(
                    size,
                    "cannot free enough space",
                ));
            }
        }
    }

    fn allocate_device(
        &self,
        device_num: u32,
        size: u64,
    ) -> Result<(u64, Option<bytes::Bytes>), DirectoryError> {
        let Some(device) = &self.device_allocator else {
            return Err(DirectoryError::out_of_memory(
                size,
                "device memory is not available",
            ));
        };
        let Some(pointer) = device.allocate(device_num, size) else {
            return Err(DirectoryError::out_of_memory(size, "device allocation failed"));
        };
        Ok((pointer, device.ipc_handle(device_num, pointer)))
    }

    fn seal_objects_internal(&self, inner: &mut DirectoryInner, ids: &[ObjectId]) {
        debug!(count = ids.len(), "sealing objects");
        let mut infos = Vec::with_capacity(ids.len());
        for id in ids {
            let entry = inner
                .object_table
                .get_mut(id)
                .expect("sealing object not in the table");
            assert_eq!(
                entry.state,
                ObjectState::Created,
                "sealing object that is not in the created state"
            );
            entry.state = ObjectState::Sealed;
            entry.construct_duration = Some(now() - entry.create_time);
            infos.push(ObjectInfo {
                object_id: *id,
                data_size: entry.data_size,
                metadata_size: entry.metadata_size,
                is_deletion: false,
            });
        }
        (self.notification_sink)(&infos);
    }

    /// Fill the provisional allocations from the external tier, or roll
    /// every one of them back to `Evicted`.
    fn restore_from_external(
        &self,
        inner: &mut DirectoryInner,
        restoring: &[ObjectId],
        client: ClientId,
        result: &mut GetObjectsResult,
    ) {
        let external = self
            .external_store
            .as_ref()
            .expect("restore attempted without an external tier");
        match external.get(restoring) {
            Ok(buffers) => {
                assert_eq!(
                    buffers.len(),
                    restoring.len(),
                    "external tier returned a mismatched batch"
                );
                for (id, buffer) in restoring.iter().zip(&buffers) {
                    let entry = inner
                        .object_table
                        .get_mut(id)
                        .expect("restored entry vanished");
                    assert_eq!(
                        buffer.len() as u64,
                        entry.object_size(),
                        "external tier returned a mismatched object image"
                    );
                    self.allocator.write(entry.fd, entry.offset, buffer);
                    entry.state = ObjectState::Sealed;
                    entry.construct_duration = Some(now() - entry.create_time);
                    debug!(object_id = %id, "restored object from external tier");
                }
                result.reconstructed.extend_from_slice(restoring);
            }
            Err(err) => {
                error!(
                    error = %err,
                    count = restoring.len(),
                    "external tier get failed, rolling back restore"
                );
                for &id in restoring {
                    self.rollback_restore(inner, id, client);
                    result.nonexistent.push(id);
                }
            }
        }
    }

    /// Undo a provisional restore allocation: release the memory, the
    /// requester's reference, and the policy accounting.
    fn rollback_restore(&self, inner: &mut DirectoryInner, id: ObjectId, client: ClientId) {
        let entry = inner
            .object_table
            .get_mut(&id)
            .expect("rolling back unknown object");
        assert_eq!(entry.ref_count, 1, "provisional restore gained extra references");
        entry.free_memory(self.allocator.as_ref(), self.device_allocator.as_deref());
        entry.state = ObjectState::Evicted;
        entry.ref_count = 0;
        inner.policy.remove_object(id);
        if let Some(held) = inner.client_objects.get_mut(&client) {
            held.remove(&id);
        }
    }

    fn add_client_reference_internal(
        &self,
        inner: &mut DirectoryInner,
        id: ObjectId,
        client: ClientId,
    ) {
        let held = inner.client_objects.entry(client).or_default();
        if !held.insert(id) {
            return;
        }
        let entry = inner
            .object_table
            .get_mut(&id)
            .expect("referencing object not in the table");
        if entry.ref_count == 0 && entry.device_num == 0 {
            inner.policy.begin_object_access(id, entry.object_size());
        }
        entry.ref_count += 1;
    }

    fn remove_client_reference_internal(
        &self,
        inner: &mut DirectoryInner,
        id: ObjectId,
        client: ClientId,
    ) -> bool {
        let removed = inner
            .client_objects
            .get_mut(&client)
            .is_some_and(|held| held.remove(&id));
        if !removed {
            return false;
        }
        self.release_reference(inner, id);
        true
    }

    /// Decrement a reference that is known to be held by someone.
    fn release_reference(&self, inner: &mut DirectoryInner, id: ObjectId) {
        let entry = inner
            .object_table
            .get_mut(&id)
            .expect("releasing object not in the table");
        assert!(entry.ref_count > 0, "reference count underflow");
        entry.ref_count -= 1;
        if entry.ref_count > 0 {
            return;
        }
        // Only sealed objects may become idle; releasing an unsealed object
        // means client and store disagree about the protocol.
        assert_eq!(
            entry.state,
            ObjectState::Sealed,
            "released object must be sealed"
        );
        let size = entry.object_size();
        let device_num = entry.device_num;
        if inner.deletion_cache.remove(&id) {
            // A deferred delete completes now that the object is idle.
            inner.policy.remove_object(id);
            self.evict_objects_internal(inner, &[id]);
        } else if device_num == 0 {
            inner.policy.end_object_access(id, size);
        }
    }

    /// Evict the given sealed, unreferenced objects, in order.
    ///
    /// With an external tier the batch is staged first and entries are kept
    /// as `Evicted` metadata; a failed put leaves them resident and sealed.
    /// Without one the entries are erased outright and announced as
    /// deletions.
    fn evict_objects_internal(&self, inner: &mut DirectoryInner, victims: &[ObjectId]) {
        if victims.is_empty() {
            return;
        }
        for id in victims {
            let entry = inner
                .object_table
                .get(id)
                .expect("evicting object not in the table");
            assert_eq!(
                entry.state,
                ObjectState::Sealed,
                "evicting object that is not sealed"
            );
            assert_eq!(entry.ref_count, 0, "evicting object that is still referenced");
        }

        if let Some(external) = &self.external_store {
            let buffers: Vec<_> = victims
                .iter()
                .map(|id| {
                    let entry = &inner.object_table[id];
                    self.allocator.read(entry.fd, entry.offset, entry.object_size())
                })
                .collect();
            if let Err(err) = external.put(victims, &buffers) {
                error!(
                    error = %err,
                    count = victims.len(),
                    "external tier put failed, keeping objects resident"
                );
                return;
            }
            for id in victims {
                let entry = inner
                    .object_table
                    .get_mut(id)
                    .expect("evicting object vanished");
                entry.free_memory(self.allocator.as_ref(), self.device_allocator.as_deref());
                entry.state = ObjectState::Evicted;
                debug!(object_id = %id, "spilled object to external tier");
            }
        } else {
            let mut infos = Vec::with_capacity(victims.len());
            for id in victims {
                let mut entry = inner
                    .object_table
                    .remove(id)
                    .expect("evicting object vanished");
                infos.push(ObjectInfo {
                    object_id: *id,
                    data_size: entry.data_size,
                    metadata_size: entry.metadata_size,
                    is_deletion: true,
                });
                entry.free_memory(self.allocator.as_ref(), self.device_allocator.as_deref());
                inner.deletion_cache.remove(id);
                debug!(object_id = %id, "evicted object");
            }
            (self.notification_sink)(&infos);
        }
    }

    fn erase_object(&self, inner: &mut DirectoryInner, id: ObjectId) {
        let mut entry = inner
            .object_table
            .remove(&id)
            .expect("erasing object not in the table");
        entry.free_memory(self.allocator.as_ref(), self.device_allocator.as_deref());
        // A stale deferred delete must not shadow a future object with the
        // same id.
        inner.deletion_cache.remove(&id);
    }
}
