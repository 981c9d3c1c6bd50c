//! External (secondary) tier capability.
//!
//! The directory spills evicted objects here and restores them on demand.
//! Both calls happen while the table mutex is held, so implementations are
//! expected to be fast or the caller accepts serializing on them.

use berth_core::ObjectId;
use bytes::Bytes;

use crate::error::ExternalStoreError;

/// Durable secondary store for evicted objects.
///
/// Buffers are whole-object images: data immediately followed by metadata.
pub trait ExternalStore: Send + Sync {
    /// Durably stage a batch. `ids` and `buffers` are parallel slices.
    ///
    /// # Errors
    /// Returns an error if the batch could not be staged; the directory then
    /// leaves the objects resident.
    fn put(&self, ids: &[ObjectId], buffers: &[Bytes]) -> Result<(), ExternalStoreError>;

    /// Fetch a batch, one buffer per id, in input order.
    ///
    /// # Errors
    /// Returns an error if any id cannot be produced; partial results are
    /// not returned.
    fn get(&self, ids: &[ObjectId]) -> Result<Vec<Bytes>, ExternalStoreError>;
}
