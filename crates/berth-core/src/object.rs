//! Object primitives: `ObjectId`, lifecycle state, and the records shared
//! between the directory and its callers.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Fixed-width object identifier (20 bytes).
///
/// Ids are opaque and globally unique within a cluster; equality is bytewise.
/// The `Display` form is lowercase hex, used for logging.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectId(#[serde(with = "hex::serde")] [u8; 20]);

impl ObjectId {
    /// Byte width of every object id.
    pub const LENGTH: usize = 20;

    /// Construct an `ObjectId` from raw bytes.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; Self::LENGTH]) -> Self {
        Self(bytes)
    }

    /// Borrow the raw bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; Self::LENGTH] {
        &self.0
    }

    /// Hex form of the id.
    #[must_use]
    pub fn hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ObjectId").field(&self.hex()).finish()
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.hex())
    }
}

impl AsRef<[u8]> for ObjectId {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Lifecycle state of an object held by the directory.
///
/// Valid transitions: `Created → Sealed → Evicted → Created → Sealed`.
/// `Created` entries leave the table on abort or creator disconnect; `Sealed`
/// entries leave it on delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectState {
    /// Allocated and mutable; only the creator may write or seal it.
    Created,
    /// Finalized and immutable; readable and, when unreferenced, evictable.
    Sealed,
    /// Primary memory released; metadata retained for external-tier restore.
    Evicted,
}

impl ObjectState {
    /// Human-readable name for this state.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Sealed => "sealed",
            Self::Evicted => "evicted",
        }
    }
}

impl fmt::Display for ObjectState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Descriptor of a shared-memory segment, as handed to clients for mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SegmentFd(i32);

impl SegmentFd {
    /// Sentinel for objects with no host segment (device memory).
    pub const INVALID: Self = Self(-1);

    #[must_use]
    pub const fn new(fd: i32) -> Self {
        Self(fd)
    }

    #[must_use]
    pub const fn as_raw(&self) -> i32 {
        self.0
    }

    /// Whether this descriptor refers to a real host segment.
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.0 >= 0
    }
}

impl fmt::Display for SegmentFd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fd:{}", self.0)
    }
}

/// One record in a notification batch published by the directory.
///
/// Subscribers observe, per id, `is_deletion = false` records in
/// state-transition order followed by at most one `is_deletion = true`
/// record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectInfo {
    pub object_id: ObjectId,
    pub data_size: u64,
    pub metadata_size: u64,
    pub is_deletion: bool,
}

/// Mapping handle returned to a client for an object it may access.
///
/// Carries everything needed to map the object's bytes: the segment
/// descriptor, the intra-segment offsets of the data and metadata regions,
/// their sizes, and the device the object lives on (0 = host).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectHandle {
    pub store_fd: SegmentFd,
    pub data_offset: u64,
    pub metadata_offset: u64,
    pub data_size: u64,
    pub metadata_size: u64,
    pub device_num: u32,
    pub map_size: u64,
}

impl ObjectHandle {
    /// Total number of payload bytes (data + metadata).
    #[must_use]
    pub const fn total_size(&self) -> u64 {
        self.data_size + self.metadata_size
    }
}
