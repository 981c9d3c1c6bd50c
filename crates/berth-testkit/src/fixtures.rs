//! Deterministic test fixtures.

use berth_core::{ClientId, ObjectId};

/// Object id with every byte set to `n`.
#[must_use]
pub fn object_id(n: u8) -> ObjectId {
    ObjectId::from_bytes([n; ObjectId::LENGTH])
}

/// Client id `n`.
#[must_use]
pub const fn client(n: u64) -> ClientId {
    ClientId::new(n)
}
