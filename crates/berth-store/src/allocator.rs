//! Allocator capabilities: primary shared memory and optional device memory.
//!
//! The directory never maps or touches segment memory itself; everything
//! flows through these traits so the concrete mapping strategy stays outside
//! the core.

use berth_core::SegmentFd;
use bytes::Bytes;

/// Alignment for primary allocations.
///
/// Allocations are aligned to a 64-byte boundary so client-side hashing can
/// run over aligned data.
pub const BLOCK_ALIGN: u64 = 64;

/// Shared-memory descriptor and intra-segment placement for an allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MapInfo {
    pub fd: SegmentFd,
    pub map_size: u64,
    pub offset: u64,
}

/// Primary allocator over a shared-memory region.
///
/// Addresses are opaque values in the allocator's own space; they are only
/// ever passed back to the same allocator. The data-plane methods
/// ([`write`](Self::write) / [`read`](Self::read)) address bytes by
/// `(segment, offset)` pairs, the same way an out-of-process client maps
/// them.
pub trait ShmAllocator: Send + Sync {
    /// Allocate `size` bytes aligned to `align`.
    ///
    /// Returns the address of the allocation, or `None` when the segment
    /// cannot fit the request.
    fn memalign(&self, align: u64, size: u64) -> Option<u64>;

    /// Release an allocation previously returned by [`memalign`](Self::memalign).
    fn free(&self, addr: u64, size: u64);

    /// Look up the segment descriptor and offset for an allocated address.
    ///
    /// Must succeed for any address returned by [`memalign`](Self::memalign);
    /// the directory treats a failed lookup as fatal.
    fn mapinfo(&self, addr: u64) -> Option<MapInfo>;

    /// Static capacity ceiling for the segment.
    fn footprint_limit(&self) -> u64;

    /// Copy `data` into the segment at `(fd, offset)`.
    fn write(&self, fd: SegmentFd, offset: u64, data: &[u8]);

    /// Read `len` bytes from the segment at `(fd, offset)`.
    fn read(&self, fd: SegmentFd, offset: u64, len: u64) -> Bytes;
}

/// Optional device-memory allocator, indexed by device number (>= 1).
///
/// When no device allocator is configured, every request with a nonzero
/// device number fails deterministically.
pub trait DeviceAllocator: Send + Sync {
    /// Allocate `size` bytes on the given device.
    fn allocate(&self, device_num: u32, size: u64) -> Option<u64>;

    /// Release a device allocation.
    fn free(&self, device_num: u32, addr: u64, size: u64);

    /// Opaque IPC handle for sharing a device allocation across processes.
    fn ipc_handle(&self, device_num: u32, addr: u64) -> Option<Bytes>;
}
