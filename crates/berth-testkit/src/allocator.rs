//! A capacity-bounded segment allocator for tests.

use std::collections::{BTreeMap, HashMap};

use berth_core::SegmentFd;
use berth_store::{MapInfo, ShmAllocator};
use bytes::Bytes;
use parking_lot::Mutex;

/// Single-segment allocator backed by a plain byte vector.
///
/// Addresses are offsets into the segment, handed out first-fit from a
/// coalescing free list, so the footprint limit is enforced exactly and
/// fragmentation behaves like a real segment.
pub struct TestAllocator {
    fd: SegmentFd,
    capacity: u64,
    state: Mutex<AllocState>,
}

struct AllocState {
    data: Vec<u8>,
    /// Free blocks by start offset.
    free: BTreeMap<u64, u64>,
    /// Live allocations by address.
    allocated: HashMap<u64, u64>,
    allocated_bytes: u64,
}

impl TestAllocator {
    /// Build an allocator over a fresh segment of `capacity` bytes.
    #[must_use]
    pub fn new(capacity: u64) -> Self {
        let mut free = BTreeMap::new();
        if capacity > 0 {
            free.insert(0, capacity);
        }
        Self {
            fd: SegmentFd::new(1),
            capacity,
            state: Mutex::new(AllocState {
                data: vec![0; usize::try_from(capacity).expect("capacity fits usize")],
                free,
                allocated: HashMap::new(),
                allocated_bytes: 0,
            }),
        }
    }

    /// Bytes currently handed out.
    pub fn allocated_bytes(&self) -> u64 {
        self.state.lock().allocated_bytes
    }

    /// Number of live allocations.
    pub fn allocation_count(&self) -> usize {
        self.state.lock().allocated.len()
    }
}

impl ShmAllocator for TestAllocator {
    fn memalign(&self, align: u64, size: u64) -> Option<u64> {
        assert!(size > 0, "zero-sized allocation");
        assert!(align.is_power_of_two(), "alignment must be a power of two");
        let mut state = self.state.lock();

        let mut found = None;
        for (&start, &len) in &state.free {
            let aligned = start.div_ceil(align) * align;
            let pad = aligned - start;
            if pad + size <= len {
                found = Some((start, len, aligned, pad));
                break;
            }
        }
        let (start, len, aligned, pad) = found?;

        state.free.remove(&start);
        if pad > 0 {
            state.free.insert(start, pad);
        }
        let tail = len - pad - size;
        if tail > 0 {
            state.free.insert(aligned + size, tail);
        }
        state.allocated.insert(aligned, size);
        state.allocated_bytes += size;
        Some(aligned)
    }

    fn free(&self, addr: u64, size: u64) {
        let mut state = self.state.lock();
        let recorded = state.allocated.remove(&addr);
        assert_eq!(
            recorded,
            Some(size),
            "freeing unknown or mismatched allocation at {addr}"
        );
        state.allocated_bytes -= size;

        // Coalesce with adjacent free blocks.
        let mut start = addr;
        let mut len = size;
        let prev = state
            .free
            .range(..addr)
            .next_back()
            .map(|(&s, &l)| (s, l));
        if let Some((pstart, plen)) = prev {
            if pstart + plen == addr {
                state.free.remove(&pstart);
                start = pstart;
                len += plen;
            }
        }
        let next = state
            .free
            .range(addr + size..)
            .next()
            .map(|(&s, &l)| (s, l));
        if let Some((nstart, nlen)) = next {
            if addr + size == nstart {
                state.free.remove(&nstart);
                len += nlen;
            }
        }
        state.free.insert(start, len);
    }

    fn mapinfo(&self, addr: u64) -> Option<MapInfo> {
        let state = self.state.lock();
        state.allocated.contains_key(&addr).then_some(MapInfo {
            fd: self.fd,
            map_size: self.capacity,
            offset: addr,
        })
    }

    fn footprint_limit(&self) -> u64 {
        self.capacity
    }

    fn write(&self, fd: SegmentFd, offset: u64, data: &[u8]) {
        assert_eq!(fd, self.fd, "write to foreign segment");
        let mut state = self.state.lock();
        let start = usize::try_from(offset).expect("offset fits usize");
        state.data[start..start + data.len()].copy_from_slice(data);
    }

    fn read(&self, fd: SegmentFd, offset: u64, len: u64) -> Bytes {
        assert_eq!(fd, self.fd, "read from foreign segment");
        let state = self.state.lock();
        let start = usize::try_from(offset).expect("offset fits usize");
        let end = start + usize::try_from(len).expect("length fits usize");
        Bytes::copy_from_slice(&state.data[start..end])
    }
}
