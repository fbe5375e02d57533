//! Allocator configuration constants

/// Page size constant (4KB); the segment provider hands out whole pages.
pub const PAGE_SIZE: usize = 4096;

/// Payload alignment; every pointer returned by the allocator is a
/// multiple of this.
pub const ALIGNMENT: usize = 8;

/// Minimum payload size. A free block needs room for two list pointers,
/// so anything smaller cannot be threaded onto a bucket.
pub const MIN_PAYLOAD: usize = 16;

/// Number of segregated free-list buckets.
pub const NUM_BUCKETS: usize = 15;

/// Pages requested when the heap is (re-)initialised.
pub const INIT_PAGES: usize = 1;

/// Largest payload a single request may ask for. The size field keeps its
/// low three bits and bit 31 for flags, so payloads are capped at the
/// largest multiple of 8 that fits the remaining 28 bits.
pub const MAX_REQUEST: usize = 0x7FFF_FFF8;

const _: () = assert!(PAGE_SIZE.is_power_of_two());
const _: () = assert!(ALIGNMENT.is_power_of_two());
const _: () = assert!(MIN_PAYLOAD >= 2 * core::mem::size_of::<*mut u8>());
const _: () = assert!(MAX_REQUEST % ALIGNMENT == 0);
