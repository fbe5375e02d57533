//! segfit - Segregated-Fit Heap Allocator
//!
//! A general-purpose heap allocator over a page-granular memory segment
//! supplied by a host runtime. Blocks carry packed boundary-tag headers,
//! free blocks are indexed by fifteen segregated size-class lists, and the
//! segment grows page by page when no listed block fits.
//!
//! # Features
//!
//! - **Segregated free lists**: clz-binned buckets kept in ascending size
//!   order for bounded best-fit behaviour
//! - **Boundary tags**: O(1) backward navigation and neighbour coalescing
//! - **Packed headers**: size and free/adjacency flags share one 32-bit
//!   word; payloads stay 8-byte aligned
//! - **Provider seam**: the page segment is abstracted behind
//!   [`SegmentProvider`]; `FixedSegment` serves caller memory and
//!   `MmapSegment` (feature `mmap`) a host reservation
//!
//! # Usage
//!
//! ```ignore
//! use segfit::{Heap, MmapSegment};
//!
//! let segment = MmapSegment::reserve(1024)?; // up to 4 MiB
//! let mut heap = Heap::new(segment)?;
//!
//! let p = heap.alloc(100);
//! assert!(!p.is_null());
//! unsafe { heap.free(p) };
//! ```
//!
//! A process-global front with the classic C surface is also available:
//! [`init_global`], [`heap_alloc`], [`heap_free`], [`heap_realloc`],
//! [`heap_validate`]. It serialises callers through one spinlock.

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_op_in_unsafe_fn)]

pub mod block;
pub mod config;
pub mod error;
pub mod freelist;
pub mod heap;
pub mod lock;
pub mod segment;
pub mod traits;

use core::ptr;
use core::sync::atomic::{AtomicBool, Ordering};

pub use error::{AllocError, SegmentError};
pub use heap::Heap;
pub use segment::FixedSegment;
#[cfg(feature = "mmap")]
pub use segment::MmapSegment;
pub use traits::SegmentProvider;

use lock::SpinLock;

/// Function pointer types for type-erased dispatch
type AllocFn = unsafe fn(*mut (), usize) -> *mut u8;
type FreeFn = unsafe fn(*mut (), *mut u8);
type ReallocFn = unsafe fn(*mut (), *mut u8, usize) -> *mut u8;
type ValidateFn = unsafe fn(*const ()) -> bool;
type DropFn = unsafe fn(*mut ());

/// Size of the buffer the global heap is stored in
const HEAP_STORAGE_SIZE: usize = 1024;

/// Type-erased storage for the process-global heap
///
/// The concrete `Heap<P>` is written into a fixed buffer and reached
/// through monomorphised function pointers recorded at init time, so the
/// global front works with any provider type without allocation.
struct GlobalFront {
    storage: [u8; HEAP_STORAGE_SIZE],
    heap_ptr: *mut (),
    alloc_fn: Option<AllocFn>,
    free_fn: Option<FreeFn>,
    realloc_fn: Option<ReallocFn>,
    validate_fn: Option<ValidateFn>,
    drop_fn: Option<DropFn>,
}

// SAFETY: all access goes through the FRONT spinlock, and only heaps over
// Send providers are ever stored.
unsafe impl Send for GlobalFront {}

impl GlobalFront {
    const fn new() -> Self {
        Self {
            storage: [0; HEAP_STORAGE_SIZE],
            heap_ptr: ptr::null_mut(),
            alloc_fn: None,
            free_fn: None,
            realloc_fn: None,
            validate_fn: None,
            drop_fn: None,
        }
    }

    /// Tear down the stored heap, if any.
    fn teardown(&mut self) {
        if let Some(drop_fn) = self.drop_fn {
            // SAFETY: heap_ptr points at the heap drop_fn was recorded for.
            unsafe { drop_fn(self.heap_ptr) };
        }
        self.heap_ptr = ptr::null_mut();
        self.alloc_fn = None;
        self.free_fn = None;
        self.realloc_fn = None;
        self.validate_fn = None;
        self.drop_fn = None;
    }
}

static FRONT: SpinLock<GlobalFront> = SpinLock::new(GlobalFront::new());
static INITIALISED: AtomicBool = AtomicBool::new(false);

unsafe fn alloc_impl<P: SegmentProvider>(heap: *mut (), size: usize) -> *mut u8 {
    // SAFETY: heap points at a live Heap<P> inside the global storage
    let heap = unsafe { &mut *(heap as *mut Heap<P>) };
    heap.alloc(size)
}

unsafe fn free_impl<P: SegmentProvider>(heap: *mut (), ptr: *mut u8) {
    let heap = unsafe { &mut *(heap as *mut Heap<P>) };
    // SAFETY: forwarded caller contract
    unsafe { heap.free(ptr) };
}

unsafe fn realloc_impl<P: SegmentProvider>(
    heap: *mut (),
    ptr: *mut u8,
    new_size: usize,
) -> *mut u8 {
    let heap = unsafe { &mut *(heap as *mut Heap<P>) };
    // SAFETY: forwarded caller contract
    unsafe { heap.realloc(ptr, new_size) }
}

unsafe fn validate_impl<P: SegmentProvider>(heap: *const ()) -> bool {
    let heap = unsafe { &*(heap as *const Heap<P>) };
    heap.validate()
}

unsafe fn drop_impl<P: SegmentProvider>(heap: *mut ()) {
    // SAFETY: heap points at a live, initialised Heap<P>
    unsafe { ptr::drop_in_place(heap as *mut Heap<P>) };
}

/// Initialise (or reset) the process-global heap over `provider`.
///
/// A second call tears the previous heap down first, invalidating every
/// pointer it handed out, and starts over on the new provider.
pub fn init_global<P>(provider: P) -> Result<(), AllocError>
where
    P: SegmentProvider + Send + 'static,
{
    let heap_size = core::mem::size_of::<Heap<P>>();
    let heap_align = core::mem::align_of::<Heap<P>>();
    if heap_size + heap_align > HEAP_STORAGE_SIZE {
        return Err(AllocError::InvalidConfig);
    }

    let mut front = FRONT.lock();
    INITIALISED.store(false, Ordering::Release);
    front.teardown();

    let heap = Heap::new(provider)?;

    // Align within the storage buffer and move the heap in.
    let base = front.storage.as_mut_ptr() as usize;
    let aligned = (base + heap_align - 1) & !(heap_align - 1);
    let location = aligned as *mut Heap<P>;
    // SAFETY: the size/align check above guarantees the write stays inside
    // the storage buffer, and teardown left it unoccupied.
    unsafe { ptr::write(location, heap) };

    front.heap_ptr = location as *mut ();
    front.alloc_fn = Some(alloc_impl::<P>);
    front.free_fn = Some(free_impl::<P>);
    front.realloc_fn = Some(realloc_impl::<P>);
    front.validate_fn = Some(validate_impl::<P>);
    front.drop_fn = Some(drop_impl::<P>);

    INITIALISED.store(true, Ordering::Release);
    Ok(())
}

/// Whether the global heap has been initialised
pub fn is_initialised() -> bool {
    INITIALISED.load(Ordering::Acquire)
}

/// Allocate from the global heap. NULL before init, for zero sizes, and
/// when the segment refuses to grow.
pub fn heap_alloc(size: usize) -> *mut u8 {
    if !is_initialised() {
        return ptr::null_mut();
    }
    let front = FRONT.lock();
    let Some(alloc_fn) = front.alloc_fn else {
        return ptr::null_mut();
    };
    // SAFETY: fn pointer and heap_ptr were recorded together at init.
    unsafe { alloc_fn(front.heap_ptr, size) }
}

/// Free a pointer obtained from the global heap. NULL is a no-op.
///
/// # Safety
/// `ptr` must be NULL or a live payload returned by the global heap since
/// the last `init_global`.
pub unsafe fn heap_free(ptr: *mut u8) {
    if !is_initialised() {
        return;
    }
    let front = FRONT.lock();
    let Some(free_fn) = front.free_fn else {
        return;
    };
    // SAFETY: fn pointer and heap_ptr were recorded together at init;
    // pointer validity is the caller's contract.
    unsafe { free_fn(front.heap_ptr, ptr) };
}

/// Resize a global-heap allocation, C-realloc style.
///
/// # Safety
/// `ptr` must be NULL or a live payload returned by the global heap since
/// the last `init_global`.
pub unsafe fn heap_realloc(ptr: *mut u8, new_size: usize) -> *mut u8 {
    if !is_initialised() {
        return ptr::null_mut();
    }
    let front = FRONT.lock();
    let Some(realloc_fn) = front.realloc_fn else {
        return ptr::null_mut();
    };
    // SAFETY: as in `heap_free`.
    unsafe { realloc_fn(front.heap_ptr, ptr, new_size) }
}

/// Walk the global heap and check its structural invariants.
///
/// Returns false when the heap is uninitialised or inconsistent.
pub fn heap_validate() -> bool {
    if !is_initialised() {
        return false;
    }
    let front = FRONT.lock();
    let Some(validate_fn) = front.validate_fn else {
        return false;
    };
    // SAFETY: fn pointer and heap_ptr were recorded together at init.
    unsafe { validate_fn(front.heap_ptr as *const ()) }
}
