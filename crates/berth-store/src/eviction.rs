//! Eviction policy: victim selection and per-client quota accounting.
//!
//! The policy only ever sees sealed, unreferenced objects as candidates.
//! The directory drives it through reference-count edges: an object enters
//! the eligible set when its last reference drops and leaves it when a
//! reference appears, it is deleted, or it is chosen as a victim.

use std::collections::{BTreeMap, HashMap};

use berth_core::{ClientId, ObjectId};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Victim selection and quota accounting, invoked under the directory mutex.
///
/// Selection operations remove chosen victims from the policy's own
/// structures immediately; the caller must then perform the eviction in the
/// returned order.
pub trait EvictionPolicy: Send {
    /// Account for a successful allocation. Charges the client's quota when
    /// `is_create` is true (restores do not charge the requester).
    fn object_created(&mut self, id: ObjectId, size: u64, client: ClientId, is_create: bool);

    /// The object's reference count went 0 → 1; it is no longer evictable.
    fn begin_object_access(&mut self, id: ObjectId, size: u64);

    /// The object's reference count went 1 → 0; it joins the MRU end of the
    /// eligible set.
    fn end_object_access(&mut self, id: ObjectId, size: u64);

    /// Forget an object entirely (deletion, abort, restore rollback).
    fn remove_object(&mut self, id: ObjectId);

    /// Forget a client's quota accounting.
    fn client_disconnected(&mut self, client: ClientId);

    /// Select victims in LRU order until their summed size reaches `needed`.
    ///
    /// Victims selected so far are appended to `victims` even when the
    /// eligible set is exhausted first; the return value says whether the
    /// requirement was met.
    fn require_space(&mut self, needed: u64, victims: &mut Vec<ObjectId>) -> bool;

    /// Select victims from the client's private LRU so that granting `size`
    /// stays within the client's quota. Returns false, selecting nothing,
    /// when that is impossible.
    fn enforce_per_client_quota(
        &mut self,
        client: ClientId,
        size: u64,
        is_create: bool,
        victims: &mut Vec<ObjectId>,
    ) -> bool;

    /// Voluntary eviction for external pressure signals: select up to
    /// `num_bytes` worth of victims and return the bytes actually covered.
    fn choose_objects_to_evict(&mut self, num_bytes: u64, victims: &mut Vec<ObjectId>) -> u64;

    /// Assign or clear a client's private memory quota. Returns false when
    /// the quota exceeds the footprint limit.
    fn set_client_quota(&mut self, client: ClientId, quota: Option<u64>) -> bool;

    /// Number of objects currently evictable.
    fn evictable_count(&self) -> usize;

    /// Bytes currently evictable.
    fn evictable_bytes(&self) -> u64;
}

/// Options for [`LruPolicy`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LruPolicyOptions {
    /// Quota assigned to clients that never call `set_client_quota`.
    /// `None` means unlimited.
    pub default_client_quota: Option<u64>,
}

/// Insertion-ordered LRU set with byte accounting.
///
/// Tie-break between equally old entries is insertion order, which the
/// monotone sequence number encodes exactly.
#[derive(Debug, Default)]
struct LruQueue {
    entries: HashMap<ObjectId, QueueSlot>,
    order: BTreeMap<u64, ObjectId>,
    next_seq: u64,
    total_bytes: u64,
}

#[derive(Debug, Clone, Copy)]
struct QueueSlot {
    seq: u64,
    size: u64,
}

impl LruQueue {
    fn insert(&mut self, id: ObjectId, size: u64) {
        assert!(
            !self.entries.contains_key(&id),
            "object {id} already in LRU queue"
        );
        let seq = self.next_seq;
        self.next_seq += 1;
        self.entries.insert(id, QueueSlot { seq, size });
        self.order.insert(seq, id);
        self.total_bytes += size;
    }

    fn remove(&mut self, id: &ObjectId) -> Option<u64> {
        let slot = self.entries.remove(id)?;
        self.order.remove(&slot.seq);
        self.total_bytes -= slot.size;
        Some(slot.size)
    }

    fn pop_lru(&mut self) -> Option<(ObjectId, u64)> {
        let (&seq, &id) = self.order.iter().next()?;
        self.order.remove(&seq);
        let slot = self.entries.remove(&id).expect("order/entries desync");
        self.total_bytes -= slot.size;
        Some((id, slot.size))
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    const fn bytes(&self) -> u64 {
        self.total_bytes
    }
}

/// Per-client quota accounting.
#[derive(Debug, Default)]
struct ClientAccounting {
    quota: Option<u64>,
    /// Bytes charged for objects this client created and that still exist.
    used: u64,
    /// The client's private LRU: its created objects that are currently
    /// evictable (also present in the global eligible set).
    owned: LruQueue,
}

/// Strict-LRU reference policy with per-client quotas.
pub struct LruPolicy {
    capacity: u64,
    eligible: LruQueue,
    /// Creator and size of every live created object, for quota refunds.
    owners: HashMap<ObjectId, (ClientId, u64)>,
    clients: HashMap<ClientId, ClientAccounting>,
    options: LruPolicyOptions,
}

impl LruPolicy {
    /// Build a policy over a segment with the given footprint limit.
    #[must_use]
    pub fn new(footprint_limit: u64) -> Self {
        Self::with_options(footprint_limit, LruPolicyOptions::default())
    }

    #[must_use]
    pub fn with_options(footprint_limit: u64, options: LruPolicyOptions) -> Self {
        Self {
            capacity: footprint_limit,
            eligible: LruQueue::default(),
            owners: HashMap::new(),
            clients: HashMap::new(),
            options,
        }
    }

    fn accounting(&mut self, client: ClientId) -> &mut ClientAccounting {
        let default_quota = self.options.default_client_quota;
        self.clients.entry(client).or_insert_with(|| ClientAccounting {
            quota: default_quota,
            ..ClientAccounting::default()
        })
    }

    /// Drop a victim from every structure and refund its creator.
    fn forget_victim(&mut self, id: &ObjectId) {
        self.eligible.remove(id);
        if let Some((owner, size)) = self.owners.remove(id) {
            if let Some(acct) = self.clients.get_mut(&owner) {
                acct.owned.remove(id);
                acct.used = acct.used.saturating_sub(size);
            }
        }
    }
}

impl EvictionPolicy for LruPolicy {
    fn object_created(&mut self, id: ObjectId, size: u64, client: ClientId, is_create: bool) {
        if !is_create {
            return;
        }
        self.owners.insert(id, (client, size));
        self.accounting(client).used += size;
    }

    fn begin_object_access(&mut self, id: ObjectId, _size: u64) {
        // Tolerate ids already outside the eligible set: victims of a failed
        // external put stay sealed but were removed during selection.
        self.eligible.remove(&id);
        if let Some((owner, _)) = self.owners.get(&id).copied() {
            if let Some(acct) = self.clients.get_mut(&owner) {
                acct.owned.remove(&id);
            }
        }
    }

    fn end_object_access(&mut self, id: ObjectId, size: u64) {
        self.eligible.insert(id, size);
        if let Some((owner, _)) = self.owners.get(&id).copied() {
            if let Some(acct) = self.clients.get_mut(&owner) {
                acct.owned.insert(id, size);
            }
        }
    }

    fn remove_object(&mut self, id: ObjectId) {
        self.forget_victim(&id);
    }

    fn client_disconnected(&mut self, client: ClientId) {
        self.clients.remove(&client);
        // Orphaned objects stay in the global eligible set; only the quota
        // bookkeeping dies with the client.
        self.owners.retain(|_, (owner, _)| *owner != client);
    }

    fn require_space(&mut self, needed: u64, victims: &mut Vec<ObjectId>) -> bool {
        let mut freed = 0_u64;
        while freed < needed {
            let Some((id, size)) = self.eligible.pop_lru() else {
                break;
            };
            freed += size;
            victims.push(id);
            if let Some((owner, osize)) = self.owners.remove(&id) {
                if let Some(acct) = self.clients.get_mut(&owner) {
                    acct.owned.remove(&id);
                    acct.used = acct.used.saturating_sub(osize);
                }
            }
        }
        debug!(
            needed,
            freed,
            victims = victims.len(),
            "selected eviction victims"
        );
        freed >= needed
    }

    fn enforce_per_client_quota(
        &mut self,
        client: ClientId,
        size: u64,
        is_create: bool,
        victims: &mut Vec<ObjectId>,
    ) -> bool {
        if !is_create {
            return true;
        }
        let Some(acct) = self.clients.get_mut(&client) else {
            return true;
        };
        let Some(quota) = acct.quota else {
            return true;
        };
        if size > quota {
            return false;
        }
        let needed = (acct.used + size).saturating_sub(quota);
        if needed == 0 {
            return true;
        }
        // Refuse without selecting anything when the client's evictable
        // objects cannot cover the shortfall; the caller does not evict on a
        // failed grant.
        if acct.owned.bytes() < needed {
            return false;
        }
        let mut freed = 0_u64;
        let start = victims.len();
        while freed < needed {
            let (id, vsize) = acct.owned.pop_lru().expect("private LRU drained early");
            freed += vsize;
            acct.used = acct.used.saturating_sub(vsize);
            victims.push(id);
        }
        for id in &victims[start..] {
            self.eligible.remove(id);
            self.owners.remove(id);
        }
        true
    }

    fn choose_objects_to_evict(&mut self, num_bytes: u64, victims: &mut Vec<ObjectId>) -> u64 {
        let mut freed = 0_u64;
        while freed < num_bytes {
            let Some((id, size)) = self.eligible.pop_lru() else {
                break;
            };
            freed += size;
            victims.push(id);
            if let Some((owner, osize)) = self.owners.remove(&id) {
                if let Some(acct) = self.clients.get_mut(&owner) {
                    acct.owned.remove(&id);
                    acct.used = acct.used.saturating_sub(osize);
                }
            }
        }
        freed
    }

    fn set_client_quota(&mut self, client: ClientId, quota: Option<u64>) -> bool {
        if let Some(limit) = quota {
            if limit > self.capacity {
                return false;
            }
        }
        self.accounting(client).quota = quota;
        true
    }

    fn evictable_count(&self) -> usize {
        self.eligible.len()
    }

    fn evictable_bytes(&self) -> u64 {
        self.eligible.bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(n: u8) -> ObjectId {
        ObjectId::from_bytes([n; ObjectId::LENGTH])
    }

    fn client(n: u64) -> ClientId {
        ClientId::new(n)
    }

    /// Seal-and-release an object so it becomes evictable.
    fn make_evictable(policy: &mut LruPolicy, oid: ObjectId, size: u64, owner: ClientId) {
        policy.object_created(oid, size, owner, true);
        policy.begin_object_access(oid, size);
        policy.end_object_access(oid, size);
    }

    #[test]
    fn victims_come_out_in_lru_order() {
        let mut policy = LruPolicy::new(1024);
        make_evictable(&mut policy, id(1), 100, client(1));
        make_evictable(&mut policy, id(2), 100, client(1));
        make_evictable(&mut policy, id(3), 100, client(1));

        let mut victims = Vec::new();
        assert!(policy.require_space(150, &mut victims));
        assert_eq!(victims, vec![id(1), id(2)]);
        assert_eq!(policy.evictable_count(), 1);
    }

    #[test]
    fn accessed_objects_are_not_victims() {
        let mut policy = LruPolicy::new(1024);
        make_evictable(&mut policy, id(1), 100, client(1));
        make_evictable(&mut policy, id(2), 100, client(1));

        // A reader picks up object 1; it must not be selected.
        policy.begin_object_access(id(1), 100);

        let mut victims = Vec::new();
        assert!(policy.require_space(100, &mut victims));
        assert_eq!(victims, vec![id(2)]);
    }

    #[test]
    fn release_reinserts_at_mru_end() {
        let mut policy = LruPolicy::new(1024);
        make_evictable(&mut policy, id(1), 100, client(1));
        make_evictable(&mut policy, id(2), 100, client(1));

        // Touch object 1: it becomes the most recently used.
        policy.begin_object_access(id(1), 100);
        policy.end_object_access(id(1), 100);

        let mut victims = Vec::new();
        assert!(policy.require_space(100, &mut victims));
        assert_eq!(victims, vec![id(2)]);
    }

    #[test]
    fn require_space_reports_exhaustion() {
        let mut policy = LruPolicy::new(1024);
        make_evictable(&mut policy, id(1), 64, client(1));

        let mut victims = Vec::new();
        assert!(!policy.require_space(1000, &mut victims));
        // The one candidate is still drained into the victim list.
        assert_eq!(victims, vec![id(1)]);
        assert_eq!(policy.evictable_count(), 0);
    }

    #[test]
    fn require_space_zero_selects_nothing() {
        let mut policy = LruPolicy::new(1024);
        make_evictable(&mut policy, id(1), 64, client(1));

        let mut victims = Vec::new();
        assert!(policy.require_space(0, &mut victims));
        assert!(victims.is_empty());
    }

    #[test]
    fn choose_objects_reports_partial_coverage() {
        let mut policy = LruPolicy::new(1024);
        make_evictable(&mut policy, id(1), 48, client(1));
        make_evictable(&mut policy, id(2), 48, client(1));

        let mut victims = Vec::new();
        assert_eq!(policy.choose_objects_to_evict(200, &mut victims), 96);
        assert_eq!(victims, vec![id(1), id(2)]);
    }

    #[test]
    fn removed_objects_leave_all_accounting() {
        let mut policy = LruPolicy::new(1024);
        make_evictable(&mut policy, id(1), 100, client(1));
        policy.remove_object(id(1));

        assert_eq!(policy.evictable_count(), 0);
        assert_eq!(policy.evictable_bytes(), 0);
        let mut victims = Vec::new();
        assert!(!policy.require_space(1, &mut victims));
        assert!(victims.is_empty());
    }

    #[test]
    fn quota_passes_without_assignment() {
        let mut policy = LruPolicy::new(1024);
        let mut victims = Vec::new();
        assert!(policy.enforce_per_client_quota(client(1), 512, true, &mut victims));
        assert!(victims.is_empty());
    }

    #[test]
    fn quota_rejects_oversized_request() {
        let mut policy = LruPolicy::new(1024);
        assert!(policy.set_client_quota(client(1), Some(128)));

        let mut victims = Vec::new();
        assert!(!policy.enforce_per_client_quota(client(1), 256, true, &mut victims));
        assert!(victims.is_empty());
    }

    #[test]
    fn quota_evicts_from_private_lru() {
        let mut policy = LruPolicy::new(1024);
        assert!(policy.set_client_quota(client(1), Some(200)));
        make_evictable(&mut policy, id(1), 100, client(1));
        make_evictable(&mut policy, id(2), 100, client(1));

        // A third 100-byte create needs 100 bytes back; the client's oldest
        // object goes first.
        let mut victims = Vec::new();
        assert!(policy.enforce_per_client_quota(client(1), 100, true, &mut victims));
        assert_eq!(victims, vec![id(1)]);
        // The victim also left the global eligible set.
        assert_eq!(policy.evictable_count(), 1);
    }

    #[test]
    fn quota_ignores_other_clients_objects() {
        let mut policy = LruPolicy::new(1024);
        assert!(policy.set_client_quota(client(1), Some(100)));
        make_evictable(&mut policy, id(9), 100, client(2));
        make_evictable(&mut policy, id(1), 80, client(1));

        // Client 1 must make room out of its own objects only, even though
        // client 2's object is older in the global LRU.
        let mut victims = Vec::new();
        assert!(policy.enforce_per_client_quota(client(1), 60, true, &mut victims));
        assert_eq!(victims, vec![id(1)]);
        assert!(policy.require_space(100, &mut victims));
        assert_eq!(victims, vec![id(1), id(9)]);
    }

    #[test]
    fn quota_failure_selects_nothing() {
        let mut policy = LruPolicy::new(1024);
        assert!(policy.set_client_quota(client(1), Some(100)));
        // 80 bytes created but still referenced: nothing is privately
        // evictable, so the grant must fail cleanly.
        policy.object_created(id(1), 80, client(1), true);
        policy.begin_object_access(id(1), 80);

        let mut victims = Vec::new();
        assert!(!policy.enforce_per_client_quota(client(1), 60, true, &mut victims));
        assert!(victims.is_empty());
    }

    #[test]
    fn quota_does_not_charge_reads() {
        let mut policy = LruPolicy::new(1024);
        assert!(policy.set_client_quota(client(1), Some(64)));

        let mut victims = Vec::new();
        assert!(policy.enforce_per_client_quota(client(1), 4096, false, &mut victims));
    }

    #[test]
    fn quota_above_capacity_is_refused() {
        let mut policy = LruPolicy::new(1024);
        assert!(!policy.set_client_quota(client(1), Some(4096)));
        assert!(policy.set_client_quota(client(1), Some(1024)));
    }

    #[test]
    fn disconnect_forgets_quota_but_keeps_eligible() {
        let mut policy = LruPolicy::new(1024);
        assert!(policy.set_client_quota(client(1), Some(512)));
        make_evictable(&mut policy, id(1), 100, client(1));

        policy.client_disconnected(client(1));

        // The object is still globally evictable.
        let mut victims = Vec::new();
        assert!(policy.require_space(100, &mut victims));
        assert_eq!(victims, vec![id(1)]);
    }

    #[test]
    fn begin_access_tolerates_missing_entries() {
        let mut policy = LruPolicy::new(1024);
        // A victim of a failed external put is sealed but absent from the
        // eligible set; re-reading it must not panic.
        policy.begin_object_access(id(1), 100);
        policy.end_object_access(id(1), 100);
        assert_eq!(policy.evictable_count(), 1);
    }
}
