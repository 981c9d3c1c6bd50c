//! Error types for the object directory.

use berth_core::ObjectId;
use thiserror::Error;

/// Errors surfaced by directory operations.
///
/// `ObjectNotSealed` and `ObjectInUse` are deferral outcomes, not failures:
/// the delete request has been parked in the deletion cache and completes
/// once the object seals or its last reference drops.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DirectoryError {
    #[error("object already exists: {0}")]
    ObjectExists(ObjectId),

    #[error("object does not exist: {0}")]
    ObjectNonexistent(ObjectId),

    #[error("object not sealed, deletion deferred: {0}")]
    ObjectNotSealed(ObjectId),

    #[error("object still referenced, deletion deferred: {0}")]
    ObjectInUse(ObjectId),

    #[error("out of memory: cannot allocate {requested} bytes ({reason})")]
    OutOfMemory { requested: u64, reason: String },
}

impl DirectoryError {
    pub(crate) fn out_of_memory(requested: u64, reason: &str) -> Self {
        Self::OutOfMemory {
            requested,
            reason: reason.to_owned(),
        }
    }
}

/// Errors reported by the external (secondary) tier.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExternalStoreError {
    #[error("object missing from external tier: {0}")]
    Missing(ObjectId),

    #[error("external tier I/O failed: {0}")]
    Io(String),
}
