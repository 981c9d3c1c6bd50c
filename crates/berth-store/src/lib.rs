//! Berth Store - the shared-memory object store directory.
//!
//! This crate implements the in-process registry for immutable objects held
//! in a shared-memory segment:
//!
//! # Overview
//!
//! - **Object Directory**: the authoritative table of every object, its
//!   lifecycle state, and its per-client reference counts, guarded by a
//!   single coarse mutex
//! - **Allocation**: primary memory via an injected [`ShmAllocator`]
//!   capability, with an eviction loop that frees space on demand
//! - **Eviction Policy**: pluggable LRU selection over sealed, unreferenced
//!   objects, plus per-client quota accounting
//! - **External Tier**: optional spill/restore of evicted objects through an
//!   [`ExternalStore`] capability
//! - **Notifications**: batched [`berth_core::ObjectInfo`] records published
//!   in state-transition order
//!
//! # Design Principles
//!
//! 1. **One mutex, whole operations**: every public directory operation
//!    acquires the table mutex for its entire duration; the external tier is
//!    the only collaborator called while holding it.
//!
//! 2. **Capabilities are injected**: allocator, device allocator, external
//!    tier, and the notification sink are all constructor arguments. There
//!    is no process-wide store instance.
//!
//! 3. **Invariant violations are bugs**: a wrong-state seal, an unknown
//!    abort target, or a referenced eviction victim indicates protocol
//!    desync between client and store and aborts rather than erroring.

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

mod allocator;
mod directory;
mod entry;
mod error;
mod eviction;
mod external;

pub use allocator::{DeviceAllocator, MapInfo, ShmAllocator, BLOCK_ALIGN};
pub use directory::{
    DirectoryStats, GetObjectsResult, NotificationSink, ObjectDirectory,
};
pub use entry::ObjectTableEntry;
pub use error::{DirectoryError, ExternalStoreError};
pub use eviction::{EvictionPolicy, LruPolicy, LruPolicyOptions};
pub use external::ExternalStore;
