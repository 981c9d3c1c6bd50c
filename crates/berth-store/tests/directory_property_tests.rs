//! Property-based tests for the object directory.
//!
//! ## Test Categories
//! 1. **Footprint safety**: no operation sequence pushes primary usage past
//!    the allocator's footprint limit, and the directory's resident byte
//!    accounting always agrees with the allocator's
//! 2. **Reference-count round trips**: any number of acquire/release cycles
//!    returns an object to unreferenced-sealed with its size intact
//! 3. **Victim selection**: the policy only ever selects sealed,
//!    unreferenced objects, in release order

#![allow(clippy::cast_possible_truncation)]

use std::collections::HashMap;
use std::sync::Arc;

use berth_core::{ClientId, ObjectId};
use berth_store::{
    DirectoryError, EvictionPolicy, ExternalStore, LruPolicy, ObjectDirectory,
};
use berth_testkit::{fixtures, MemoryExternalStore, RecordingSink, TestAllocator};
use proptest::prelude::*;

const FOOTPRINT: u64 = 256;
const ID_POOL: u8 = 4;
const CLIENT_POOL: u8 = 3;

// ─────────────────────────────────────────────────────────────────────────────
// Proptest Strategies
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
enum Op {
    Create { id: u8, client: u8, size: u64, evict: bool },
    Seal { id: u8 },
    Get { id: u8, client: u8 },
    Release { id: u8, client: u8 },
    Delete { id: u8 },
    Abort { id: u8, client: u8 },
    Evict { bytes: u64 },
    Disconnect { client: u8 },
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0..ID_POOL, 0..CLIENT_POOL, 1_u64..=96, any::<bool>())
            .prop_map(|(id, client, size, evict)| Op::Create { id, client, size, evict }),
        (0..ID_POOL).prop_map(|id| Op::Seal { id }),
        (0..ID_POOL, 0..CLIENT_POOL).prop_map(|(id, client)| Op::Get { id, client }),
        (0..ID_POOL, 0..CLIENT_POOL).prop_map(|(id, client)| Op::Release { id, client }),
        (0..ID_POOL).prop_map(|id| Op::Delete { id }),
        (0..ID_POOL, 0..CLIENT_POOL).prop_map(|(id, client)| Op::Abort { id, client }),
        (1_u64..=FOOTPRINT).prop_map(|bytes| Op::Evict { bytes }),
        (0..CLIENT_POOL).prop_map(|client| Op::Disconnect { client }),
    ]
}

fn op_sequence() -> impl Strategy<Value = Vec<Op>> {
    prop::collection::vec(op_strategy(), 1..60)
}

// ─────────────────────────────────────────────────────────────────────────────
// Shadow model
// ─────────────────────────────────────────────────────────────────────────────

/// Just enough client-side state to keep generated operations legal: the
/// directory treats illegal transitions (sealing twice, releasing an
/// unsealed object) as fatal bugs, by design.
#[derive(Default)]
struct Shadow {
    /// Unsealed objects: id -> creator.
    created: HashMap<u8, u8>,
}

fn oid(n: u8) -> ObjectId {
    fixtures::object_id(n)
}

fn cid(n: u8) -> ClientId {
    fixtures::client(u64::from(n))
}

/// Drive one legal operation against the directory, updating the shadow.
fn apply_op(directory: &ObjectDirectory, shadow: &mut Shadow, op: &Op) {
    match *op {
        Op::Create { id, client, size, evict } => {
            if shadow.created.contains_key(&id) {
                return;
            }
            if directory
                .create_object(oid(id), evict, size, 0, 0, cid(client))
                .is_ok()
            {
                shadow.created.insert(id, client);
            }
        }
        Op::Seal { id } => {
            if shadow.created.remove(&id).is_some() {
                directory.seal_objects(&[oid(id)]);
            }
        }
        Op::Get { id, client } => {
            let _ = directory.get_objects(&[oid(id)], cid(client));
        }
        Op::Release { id, client } => {
            // Releasing an unsealed object is a protocol violation; the
            // creator keeps its reference until seal or abort.
            if !shadow.created.contains_key(&id) {
                let _ = directory.remove_client_reference(oid(id), cid(client));
            }
        }
        Op::Delete { id } => {
            let _ = directory.delete_object(oid(id));
        }
        Op::Abort { id, client } => {
            if shadow.created.get(&id) == Some(&client) && directory.abort_object(oid(id), cid(client)) {
                shadow.created.remove(&id);
            }
        }
        Op::Evict { bytes } => {
            let _ = directory.evict_objects(bytes);
        }
        Op::Disconnect { client } => {
            directory.disconnect_client(cid(client));
            shadow.created.retain(|_, creator| *creator != client);
        }
    }
}

fn build_directory(with_external: bool) -> (Arc<ObjectDirectory>, Arc<TestAllocator>) {
    let allocator = Arc::new(TestAllocator::new(FOOTPRINT));
    let external = with_external
        .then(|| Arc::new(MemoryExternalStore::new()) as Arc<dyn ExternalStore>);
    let sink = RecordingSink::new();
    let directory = Arc::new(ObjectDirectory::new(
        allocator.clone(),
        external,
        sink.sink(),
    ));
    (directory, allocator)
}

// ─────────────────────────────────────────────────────────────────────────────
// Property Tests: Footprint Safety
// ─────────────────────────────────────────────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    /// No operation sequence exceeds the footprint limit, and the directory's
    /// resident-byte accounting matches the allocator at every step.
    #[test]
    fn prop_footprint_never_exceeded(ops in op_sequence(), with_external in any::<bool>()) {
        let (directory, allocator) = build_directory(with_external);
        let mut shadow = Shadow::default();

        for op in &ops {
            apply_op(&directory, &mut shadow, op);

            prop_assert!(allocator.allocated_bytes() <= FOOTPRINT);
            let stats = directory.stats();
            prop_assert_eq!(stats.resident_bytes, allocator.allocated_bytes());
        }
    }

    /// After disconnecting every client, no unsealed object survives and all
    /// remaining sealed objects are idle (deletable on the spot).
    #[test]
    fn prop_disconnect_drains_references(ops in op_sequence(), with_external in any::<bool>()) {
        let (directory, allocator) = build_directory(with_external);
        let mut shadow = Shadow::default();
        for op in &ops {
            apply_op(&directory, &mut shadow, op);
        }

        for client in 0..CLIENT_POOL {
            directory.disconnect_client(cid(client));
        }
        prop_assert_eq!(directory.stats().objects_created, 0);
        prop_assert_eq!(directory.stats().clients_with_references, 0);

        for info in directory.get_sealed_objects_info() {
            prop_assert_eq!(directory.delete_object(info.object_id), Ok(()));
        }
        prop_assert_eq!(directory.stats().objects_sealed, 0);
        if !with_external {
            // Every byte went back to the segment.
            prop_assert_eq!(allocator.allocated_bytes(), 0);
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Property Tests: Reference Round Trips
// ─────────────────────────────────────────────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// `k` acquire/release cycles are a no-op with respect to size and leave
    /// the object deletable, with exactly one announcement and one deletion.
    #[test]
    fn prop_reference_cycles_round_trip(k in 1_usize..6, size in 1_u64..128) {
        let allocator = Arc::new(TestAllocator::new(1024));
        let sink = RecordingSink::new();
        let directory = ObjectDirectory::new(allocator.clone(), None, sink.sink());
        let id = fixtures::object_id(1);
        let writer = fixtures::client(0);

        directory.create_object(id, false, size, 0, 0, writer).unwrap();
        directory.seal_objects(&[id]);
        prop_assert!(directory.remove_client_reference(id, writer));
        let resident = allocator.allocated_bytes();

        for n in 0..k {
            directory.add_client_reference(id, fixtures::client(n as u64 + 1));
        }
        // References change nothing about the object's size.
        prop_assert_eq!(allocator.allocated_bytes(), resident);
        prop_assert_eq!(
            directory.delete_object(id),
            Err(DirectoryError::ObjectInUse(id))
        );
        for n in 0..k {
            prop_assert!(directory.remove_client_reference(id, fixtures::client(n as u64 + 1)));
        }

        // The deferred delete completed on the last release.
        prop_assert!(!directory.contains_object(id));
        prop_assert_eq!(allocator.allocated_bytes(), 0);
        prop_assert_eq!(sink.announcements(), vec![id]);
        prop_assert_eq!(sink.deletions(), vec![id]);
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Property Tests: Victim Selection
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
enum PolicyOp {
    /// Object becomes evictable (reference count hit zero).
    EndAccess { id: u8, size: u64 },
    /// Object picked up again.
    BeginAccess { id: u8 },
    /// Object deleted.
    Remove { id: u8 },
}

fn policy_op_strategy() -> impl Strategy<Value = PolicyOp> {
    prop_oneof![
        (0_u8..8, 1_u64..=64).prop_map(|(id, size)| PolicyOp::EndAccess { id, size }),
        (0_u8..8).prop_map(|id| PolicyOp::BeginAccess { id }),
        (0_u8..8).prop_map(|id| PolicyOp::Remove { id }),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    /// Victims are exactly the model's oldest evictable entries, in release
    /// order, and never anything that was re-referenced or removed.
    #[test]
    fn prop_victims_match_model(
        ops in prop::collection::vec(policy_op_strategy(), 1..40),
        needed in 1_u64..256,
    ) {
        let mut policy = LruPolicy::new(FOOTPRINT);
        // Model: evictable entries, oldest first.
        let mut model: Vec<(u8, u64)> = Vec::new();

        for op in &ops {
            match *op {
                PolicyOp::EndAccess { id, size } => {
                    if !model.iter().any(|(mid, _)| *mid == id) {
                        policy.end_object_access(oid(id), size);
                        model.push((id, size));
                    }
                }
                PolicyOp::BeginAccess { id } => {
                    policy.begin_object_access(oid(id), 0);
                    model.retain(|(mid, _)| *mid != id);
                }
                PolicyOp::Remove { id } => {
                    policy.remove_object(oid(id));
                    model.retain(|(mid, _)| *mid != id);
                }
            }
        }

        prop_assert_eq!(policy.evictable_count(), model.len());
        prop_assert_eq!(
            policy.evictable_bytes(),
            model.iter().map(|(_, size)| size).sum::<u64>()
        );

        // Expected victims: the model prefix covering `needed` bytes.
        let mut expected = Vec::new();
        let mut covered = 0_u64;
        for (id, size) in &model {
            if covered >= needed {
                break;
            }
            covered += size;
            expected.push(oid(*id));
        }

        let mut victims = Vec::new();
        let satisfied = policy.require_space(needed, &mut victims);
        prop_assert_eq!(satisfied, covered >= needed);
        prop_assert_eq!(victims, expected);
    }
}
