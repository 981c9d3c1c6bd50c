//! Per-object record in the directory's table.

use berth_core::{ObjectHandle, ObjectState, SegmentFd};
use bytes::Bytes;

use crate::allocator::{DeviceAllocator, MapInfo, ShmAllocator};

/// One entry in the object table.
///
/// Whenever the table mutex is not held by a mutator mid-transition:
/// `pointer` is `Some` iff `state` is `Created` or `Sealed`, and an entry
/// with `ref_count > 0` is never in the eviction policy's eligible set.
#[derive(Debug, Clone)]
pub struct ObjectTableEntry {
    pub state: ObjectState,
    /// 0 = host memory, >= 1 = device.
    pub device_num: u32,
    /// Address in the allocator's space while primary memory is held.
    pub pointer: Option<u64>,
    pub fd: SegmentFd,
    pub map_size: u64,
    pub offset: u64,
    pub data_size: u64,
    pub metadata_size: u64,
    /// Number of distinct clients currently holding this object.
    pub ref_count: u32,
    /// Epoch seconds at allocation.
    pub create_time: i64,
    /// Seconds spent between allocation and seal; unset until sealed.
    pub construct_duration: Option<i64>,
    /// Device IPC handle, present only for device objects.
    pub ipc_handle: Option<Bytes>,
}

impl ObjectTableEntry {
    /// Build an entry for a fresh host allocation.
    #[must_use]
    pub fn new_host(
        mapinfo: MapInfo,
        pointer: u64,
        data_size: u64,
        metadata_size: u64,
        create_time: i64,
    ) -> Self {
        Self {
            state: ObjectState::Created,
            device_num: 0,
            pointer: Some(pointer),
            fd: mapinfo.fd,
            map_size: mapinfo.map_size,
            offset: mapinfo.offset,
            data_size,
            metadata_size,
            ref_count: 0,
            create_time,
            construct_duration: None,
            ipc_handle: None,
        }
    }

    /// Build an entry for a fresh device allocation.
    #[must_use]
    pub fn new_device(
        device_num: u32,
        pointer: u64,
        ipc_handle: Option<Bytes>,
        data_size: u64,
        metadata_size: u64,
        create_time: i64,
    ) -> Self {
        Self {
            state: ObjectState::Created,
            device_num,
            pointer: Some(pointer),
            fd: SegmentFd::INVALID,
            map_size: 0,
            offset: 0,
            data_size,
            metadata_size,
            ref_count: 0,
            create_time,
            construct_duration: None,
            ipc_handle,
        }
    }

    /// Total payload bytes (data + metadata).
    #[must_use]
    pub const fn object_size(&self) -> u64 {
        self.data_size + self.metadata_size
    }

    /// Whether this entry currently holds primary (or device) memory.
    #[must_use]
    pub const fn is_resident(&self) -> bool {
        self.pointer.is_some()
    }

    /// Release the entry's memory back to its allocator and clear the
    /// placement fields. The caller decides the resulting state.
    pub fn free_memory(
        &mut self,
        shm: &dyn ShmAllocator,
        device: Option<&dyn DeviceAllocator>,
    ) {
        let Some(addr) = self.pointer.take() else {
            return;
        };
        let size = self.object_size();
        if self.device_num == 0 {
            shm.free(addr, size);
        } else {
            // The device allocator is present whenever a device allocation
            // was handed out, so a missing one here is a wiring bug.
            device
                .expect("device allocation without a device allocator")
                .free(self.device_num, addr, size);
        }
        self.fd = SegmentFd::INVALID;
        self.map_size = 0;
        self.offset = 0;
        self.ipc_handle = None;
    }

    /// Apply a new host allocation to an evicted entry being restored.
    pub fn assign_host_allocation(&mut self, mapinfo: MapInfo, pointer: u64, create_time: i64) {
        self.pointer = Some(pointer);
        self.fd = mapinfo.fd;
        self.map_size = mapinfo.map_size;
        self.offset = mapinfo.offset;
        self.state = ObjectState::Created;
        self.create_time = create_time;
        self.construct_duration = None;
    }

    /// Fill the mapping handle a client needs to access this object.
    #[must_use]
    pub const fn handle(&self) -> ObjectHandle {
        ObjectHandle {
            store_fd: self.fd,
            data_offset: self.offset,
            metadata_offset: self.offset + self.data_size,
            data_size: self.data_size,
            metadata_size: self.metadata_size,
            device_num: self.device_num,
            map_size: self.map_size,
        }
    }
}
