//! Core heap implementation
//!
//! `Heap` lays a boundary-tagged block list over the pages of a segment
//! provider and serves allocation requests from a segregated free-list
//! index. Oversized fits are split, freed blocks are fused with free
//! neighbours, and when no listed block suffices the segment is grown by
//! whole pages.

use core::ptr::{self, NonNull};

use crate::block::{Block, FREE_MASK, HEADER_SIZE, INIT_MASK, NEXT_FREE, PREV_FREE};
use crate::config::{ALIGNMENT, INIT_PAGES, MAX_REQUEST, MIN_PAYLOAD, NUM_BUCKETS, PAGE_SIZE};
use crate::error::AllocError;
use crate::freelist::{bucket_index, Buckets};
use crate::traits::SegmentProvider;

const HEADER: u32 = HEADER_SIZE as u32;
const MIN_LISTABLE: u32 = MIN_PAYLOAD as u32;

/// Round `size` up to the next multiple of `mult` (a power of two).
const fn round_up(size: usize, mult: usize) -> usize {
    (size + mult - 1) & !(mult - 1)
}

/// A heap over one growable page segment.
///
/// All state lives in the instance; the provider is owned and dropped with
/// the heap. The heap itself is single-threaded - callers wanting a shared
/// instance wrap it in a lock, as the global front in this crate does.
pub struct Heap<P: SegmentProvider> {
    segment: P,
    buckets: Buckets,
    /// Lowest-addressed payload in the heap.
    min_block: Block,
    /// Highest-addressed payload in the heap.
    max_block: Block,
}

// SAFETY: the heap exclusively owns every block pointer it holds; they all
// point into the provider's segment, which moves with the heap.
unsafe impl<P: SegmentProvider + Send> Send for Heap<P> {}

impl<P: SegmentProvider> Heap<P> {
    /// Initialise a heap over a fresh segment.
    ///
    /// Requests the initial page(s) from the provider and lays out a single
    /// free block spanning them.
    pub fn new(mut segment: P) -> Result<Self, AllocError> {
        debug_assert_eq!(segment.page_size(), PAGE_SIZE);
        let first = Self::first_block(&mut segment)?;
        let mut heap = Self {
            segment,
            buckets: Buckets::new(),
            min_block: first,
            max_block: first,
        };
        // SAFETY: `first` spans the whole fresh segment and is free.
        unsafe { heap.buckets.insert(first) };
        Ok(heap)
    }

    /// Wipe the heap and start over on the same provider.
    ///
    /// Every previously returned pointer is invalidated.
    pub fn reset(&mut self) -> Result<(), AllocError> {
        let first = Self::first_block(&mut self.segment)?;
        self.buckets.clear();
        self.min_block = first;
        self.max_block = first;
        // SAFETY: as in `new`.
        unsafe { self.buckets.insert(first) };
        Ok(())
    }

    /// Reset the segment and lay out the initial free block.
    fn first_block(segment: &mut P) -> Result<Block, AllocError> {
        let base = segment
            .init_segment(INIT_PAGES)
            .map_err(|_| AllocError::OutOfMemory)?;
        // SAFETY: the provider handed us INIT_PAGES whole pages at `base`.
        let first = unsafe { Block::from_header(base) };
        unsafe {
            first.set_raw(((INIT_PAGES * PAGE_SIZE - HEADER_SIZE) as u32) | FREE_MASK);
            first.set_prev_size(INIT_MASK);
        }
        Ok(first)
    }

    /// Allocate at least `size` bytes, 8-aligned.
    ///
    /// Returns NULL when `size` is zero, when it exceeds the representable
    /// maximum, or when the segment refuses to grow.
    pub fn alloc(&mut self, size: usize) -> *mut u8 {
        match self.try_alloc(size) {
            Ok(Some(block)) => block.payload(),
            _ => ptr::null_mut(),
        }
    }

    fn try_alloc(&mut self, size: usize) -> Result<Option<Block>, AllocError> {
        if size == 0 {
            return Ok(None);
        }
        if size > MAX_REQUEST {
            return Err(AllocError::RequestTooLarge);
        }

        let requested = round_up(size, ALIGNMENT).max(MIN_PAYLOAD) as u32;

        // SAFETY: every threaded block is live and free.
        if let Some(found) = unsafe { self.buckets.take_fit(requested) } {
            // SAFETY: `found` was just unlinked and is ours to carve up.
            unsafe { self.finish_fit(found, requested) };
            return Ok(Some(found));
        }

        self.extend(requested).map(Some)
    }

    /// Carve a block taken from the free list down to `requested` bytes
    /// and reconcile the adjacency flags of its neighbours.
    unsafe fn finish_fit(&mut self, curr: Block, requested: u32) {
        let found_size = unsafe { curr.size() };
        // Allocated: size only, every flag cleared.
        unsafe { curr.set_raw(requested) };
        let remaining = found_size - requested;

        if remaining >= HEADER + MIN_LISTABLE {
            // Enough room above for a self-standing free block.
            let tail = unsafe { curr.next_block() };
            unsafe {
                tail.set_raw(remaining - HEADER);
                tail.set_prev_size(requested);
                if tail < self.max_block {
                    let above = tail.next_block();
                    above.set_prev_size(tail.size());
                    above.set_prev_free();
                }
            }
            if tail > self.max_block {
                self.max_block = tail;
            }
            // SAFETY: `tail` is a fully formed unlisted block.
            unsafe { self.free_block(tail) };
        } else if remaining != 0 {
            // Tail too small to thread: leave it as a garbage block that a
            // later coalesce can absorb.
            let tail = unsafe { curr.next_block() };
            unsafe {
                tail.set_raw((remaining - HEADER) | FREE_MASK);
                tail.set_prev_size(requested);
            }
            if tail > self.max_block {
                self.max_block = tail;
            } else {
                unsafe {
                    let above = tail.next_block();
                    above.set_prev_size(tail.size());
                    above.set_prev_free();
                }
            }
        } else {
            // Perfect fit: the block above no longer borders a free block.
            if curr < self.max_block {
                unsafe { curr.next_block().clear_prev_free() };
            }
        }

        // The block below no longer borders a free block either, and the
        // allocated block inherits its neighbours' current states.
        unsafe {
            if curr > self.min_block {
                let prev = curr.prev_block();
                prev.clear_next_free();
                if prev.is_free() {
                    curr.set_prev_free();
                }
            }
            if curr < self.max_block && curr.next_block().is_free() {
                curr.set_next_free();
            }
        }
    }

    /// Grow the segment to satisfy `requested` when no listed block fits.
    fn extend(&mut self, requested: u32) -> Result<Block, AllocError> {
        let pages = (requested as usize + HEADER_SIZE).div_ceil(PAGE_SIZE);
        let base = self
            .segment
            .extend_segment(pages)
            .map_err(|_| AllocError::OutOfMemory)?;

        // The provider contract says extensions are contiguous; the implicit
        // list cannot span a gap.
        debug_assert_eq!(
            base.as_ptr() as usize,
            self.max_block.addr() + unsafe { self.max_block.size() } as usize,
        );

        // SAFETY: `base` starts a fresh region of `pages` whole pages.
        let page = unsafe { Block::from_header(base) };
        unsafe {
            page.set_raw(requested);
            page.set_prev_size(self.max_block.size());
            if self.max_block.is_free() {
                page.set_prev_free();
            }
        }

        let leftover = (pages * PAGE_SIZE - requested as usize - HEADER_SIZE) as u32;
        if leftover == 0 {
            self.max_block = page;
            return Ok(page);
        }

        if leftover < HEADER + MIN_LISTABLE {
            // Garbage tail at the new heap end.
            unsafe {
                let tail = page.next_block();
                tail.set_raw((leftover - HEADER) | FREE_MASK);
                tail.set_prev_size(requested);
                page.set_next_free();
                self.max_block = tail;
            }
            return Ok(page);
        }

        // Free tail; freeing it threads it and fixes the flags on `page`.
        unsafe {
            let tail = page.next_block();
            tail.set_raw(leftover - HEADER);
            tail.set_prev_size(requested);
            self.free_block(tail);
        }
        Ok(page)
    }

    /// Return a payload to the heap. NULL is a no-op.
    ///
    /// # Safety
    /// `ptr` must be NULL or a payload previously returned by this heap and
    /// not freed since.
    pub unsafe fn free(&mut self, ptr: *mut u8) {
        let Some(payload) = NonNull::new(ptr) else {
            return;
        };
        // SAFETY: caller guarantees `ptr` is a live allocated payload.
        unsafe { self.free_block(Block::from_payload(payload)) };
    }

    /// Coalesce, flag the neighbours, mark free, and thread onto a bucket.
    unsafe fn free_block(&mut self, block: Block) {
        let block = unsafe { self.coalesce(block) };
        unsafe {
            if block < self.max_block {
                block.next_block().set_prev_free();
            }
            if block != self.min_block {
                block.prev_block().set_next_free();
            }
            block.mark_free();
        }
        if block > self.max_block {
            self.max_block = block;
        }
        // SAFETY: coalescing only grows the payload, and every block freed
        // through this path starts at or above the listable minimum.
        unsafe { self.buckets.insert(block) };
    }

    /// Fuse `block` with whichever of its neighbours are free.
    ///
    /// Returns the payload of the merged block, which the caller still has
    /// to mark free and thread. Garbage neighbours are absorbed without a
    /// list removal since they were never threaded.
    unsafe fn coalesce(&mut self, block: Block) -> Block {
        let prev_is_free = unsafe { block.has_prev_free() };
        let next_is_free = unsafe { block.has_next_free() };
        let size = unsafe { block.size() };

        match (prev_is_free, next_is_free) {
            (false, false) => block,
            (false, true) => unsafe {
                // Absorb upward.
                let next = block.next_block();
                let next_size = next.size();
                if next_size >= MIN_LISTABLE {
                    self.buckets.remove(next);
                }
                let merged = size + next_size + HEADER;
                block.set_raw(merged | (next.raw() & NEXT_FREE));
                if next < self.max_block {
                    next.next_block().set_prev_size(merged);
                }
                if next == self.max_block {
                    self.max_block = block;
                }
                block
            },
            (true, false) => unsafe {
                // Absorb downward.
                let prev = block.prev_block();
                let prev_size = prev.size();
                if prev_size >= MIN_LISTABLE {
                    self.buckets.remove(prev);
                }
                let merged = prev_size + size + HEADER;
                prev.set_raw(merged | (prev.raw() & PREV_FREE));
                if block < self.max_block {
                    block.next_block().set_prev_size(merged);
                }
                if block == self.max_block {
                    self.max_block = prev;
                }
                prev
            },
            (true, true) => unsafe {
                // Absorb both sides.
                let prev = block.prev_block();
                let prev_size = prev.size();
                let next = block.next_block();
                let next_size = next.size();
                if next_size >= MIN_LISTABLE {
                    self.buckets.remove(next);
                }
                if prev_size >= MIN_LISTABLE {
                    self.buckets.remove(prev);
                }
                let merged = prev_size + HEADER + size + HEADER + next_size;
                prev.set_raw(merged | (prev.raw() & PREV_FREE));
                if next < self.max_block {
                    next.next_block().set_prev_size(merged);
                }
                if next == self.max_block {
                    self.max_block = prev;
                }
                prev
            },
        }
    }

    /// Resize an allocation, C-realloc style.
    ///
    /// Grows in place when the block above is free and large enough;
    /// otherwise allocates, copies, and frees the old block. The old
    /// pointer stays valid exactly when the returned pointer equals it.
    ///
    /// # Safety
    /// `old_ptr` must be NULL or a payload previously returned by this heap
    /// and not freed since.
    pub unsafe fn realloc(&mut self, old_ptr: *mut u8, new_size: usize) -> *mut u8 {
        let Some(payload) = NonNull::new(old_ptr) else {
            return self.alloc(new_size);
        };
        if new_size == 0 {
            // SAFETY: caller guarantees `old_ptr` is live.
            unsafe { self.free(old_ptr) };
            return ptr::null_mut();
        }
        if new_size > MAX_REQUEST {
            return ptr::null_mut();
        }

        let old = Block::from_payload(payload);
        let old_size = unsafe { old.size() };
        let requested = round_up(new_size, ALIGNMENT).max(MIN_PAYLOAD) as u32;
        if requested == old_size {
            return old_ptr;
        }

        // Grow in place by consuming the free block above.
        if requested > old_size && unsafe { old.has_next_free() } && old < self.max_block {
            let next = unsafe { old.next_block() };
            let next_size = unsafe { next.size() };
            let span = old_size + next_size;
            if span >= requested && span - requested >= MIN_LISTABLE {
                let leftover = span - requested;
                unsafe {
                    if next_size >= MIN_LISTABLE {
                        self.buckets.remove(next);
                    }
                    // New free remainder directly above the grown block.
                    let remainder_payload = old.payload().add(requested as usize + HEADER_SIZE);
                    let remainder =
                        Block::from_payload(NonNull::new_unchecked(remainder_payload));
                    remainder.set_raw(leftover | (next.raw() & NEXT_FREE));
                    remainder.set_prev_size(requested);
                    old.set_raw(requested | NEXT_FREE | (old.raw() & PREV_FREE));

                    if remainder < self.max_block {
                        remainder.next_block().set_prev_size(remainder.size());
                    } else if remainder > self.max_block {
                        self.max_block = remainder;
                    }
                    self.free_block(remainder);
                }
                return old_ptr;
            }
        }

        // Fall back to allocate-copy-free. On failure the old block is
        // left untouched.
        let new_ptr = self.alloc(requested as usize);
        if !new_ptr.is_null() {
            let keep = old_size.min(requested) as usize;
            unsafe {
                ptr::copy(old_ptr, new_ptr, keep);
                self.free(old_ptr);
            }
        }
        new_ptr
    }

    /// Walk the whole heap and report whether every structural invariant
    /// holds: boundary tags agree, adjacency flags mirror their neighbours'
    /// free bits, no two adjacent blocks are free, and every listable free
    /// block is threaded on exactly the bucket its size maps to.
    pub fn validate(&self) -> bool {
        // Pass 1: implicit list layout and adjacency.
        let mut count: usize = 0;
        let mut block = self.min_block;
        loop {
            count += 1;
            // SAFETY: blocks between min_block and max_block are live as
            // long as the headers are intact, which is what we are checking;
            // a corrupt size fails the monotonicity test below before the
            // walk can leave the segment.
            let size = unsafe { block.size() };
            if block.addr() % ALIGNMENT != 0 || size % ALIGNMENT as u32 != 0 {
                return false;
            }
            if block == self.max_block {
                break;
            }
            let next = unsafe { block.next_block() };
            if next <= block || next > self.max_block {
                return false;
            }
            unsafe {
                if next.prev_size() != size {
                    return false;
                }
                if block.is_free() != next.has_prev_free() {
                    return false;
                }
                if next.is_free() != block.has_next_free() {
                    return false;
                }
                if block.is_free() && next.is_free() {
                    return false;
                }
            }
            block = next;
        }

        // The base block carries the first-block sentinel.
        if unsafe { self.min_block.prev_raw() } & INIT_MASK != INIT_MASK {
            return false;
        }

        // Pass 2: each bucket list is acyclic, sorted, back-linked, and
        // holds only free listable blocks of its own class.
        for bucket in 0..NUM_BUCKETS {
            let mut prev: Option<Block> = None;
            let mut curr = self.buckets.head(bucket);
            let mut steps = 0usize;
            while let Some(b) = curr {
                steps += 1;
                if steps > count {
                    return false;
                }
                unsafe {
                    if !b.is_free() {
                        return false;
                    }
                    let size = b.size();
                    if (size as usize) < MIN_PAYLOAD || bucket_index(size) != bucket {
                        return false;
                    }
                    if b.list_prev() != prev {
                        return false;
                    }
                    if let Some(p) = prev {
                        if p.size() > size {
                            return false;
                        }
                    }
                    prev = curr;
                    curr = b.list_next();
                }
            }
        }

        // Pass 3: every listable free block is reachable from its bucket.
        let mut block = self.min_block;
        loop {
            unsafe {
                if block.is_free()
                    && block.size() as usize >= MIN_PAYLOAD
                    && !self.buckets.contains(block, count)
                {
                    return false;
                }
            }
            if block == self.max_block {
                break;
            }
            block = unsafe { block.next_block() };
        }

        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segment::FixedSegment;

    /// Heap over a leaked page-aligned region of `pages` pages.
    fn heap_with_pages(pages: usize) -> Heap<FixedSegment> {
        let layout = std::alloc::Layout::from_size_align(pages * PAGE_SIZE, PAGE_SIZE).unwrap();
        let base = unsafe { std::alloc::alloc_zeroed(layout) };
        let segment =
            unsafe { FixedSegment::new(NonNull::new(base).unwrap(), pages * PAGE_SIZE) }.unwrap();
        Heap::new(segment).unwrap()
    }

    fn block_of(ptr: *mut u8) -> Block {
        Block::from_payload(NonNull::new(ptr).unwrap())
    }

    #[test]
    fn test_fresh_init_single_alloc() {
        let mut heap = heap_with_pages(1);
        assert!(heap.validate());

        let p = heap.alloc(24);
        assert!(!p.is_null());
        assert_eq!(p as usize % ALIGNMENT, 0);

        let block = block_of(p);
        unsafe {
            assert_eq!(block.size(), 24);
            assert!(!block.is_free());

            // One free remainder above: page minus both headers and the
            // allocation.
            let tail = block.next_block();
            assert_eq!(tail.size() as usize, PAGE_SIZE - 2 * HEADER_SIZE - 24);
            assert!(tail.is_free());
            assert!(heap.buckets.contains(tail, 8));
        }
        assert!(heap.validate());
    }

    #[test]
    fn test_alloc_zero_returns_null() {
        let mut heap = heap_with_pages(1);
        assert!(heap.alloc(0).is_null());
        assert!(heap.validate());
    }

    #[test]
    fn test_small_requests_round_up_to_min_payload() {
        let mut heap = heap_with_pages(1);
        let p = heap.alloc(1);
        assert!(!p.is_null());
        assert_eq!(unsafe { block_of(p).size() }, MIN_PAYLOAD as u32);
        assert!(heap.validate());
    }

    #[test]
    fn test_free_null_is_noop() {
        let mut heap = heap_with_pages(1);
        unsafe { heap.free(ptr::null_mut()) };
        assert!(heap.validate());
    }

    #[test]
    fn test_alloc_free_realloc_same_class() {
        let mut heap = heap_with_pages(1);
        let p = heap.alloc(100);
        assert!(!p.is_null());
        unsafe { heap.free(p) };
        assert!(heap.validate());

        // The freed block coalesced back into one span, so the next
        // same-sized request lands at the same address.
        assert_eq!(heap.min_block, heap.max_block);
        let q = heap.alloc(100);
        assert_eq!(q, p);
        assert!(heap.validate());
    }

    #[test]
    fn test_coalesce_three_neighbours() {
        let mut heap = heap_with_pages(1);
        let a = heap.alloc(64);
        let b = heap.alloc(64);
        let c = heap.alloc(64);
        assert!(!a.is_null() && !b.is_null() && !c.is_null());
        assert!(heap.validate());

        unsafe {
            heap.free(a);
            assert!(heap.validate());
            heap.free(c);
            assert!(heap.validate());
            heap.free(b);
            assert!(heap.validate());
        }

        // Everything merged back into the single page-spanning block.
        assert_eq!(heap.min_block, heap.max_block);
        assert_eq!(
            unsafe { heap.min_block.size() } as usize,
            PAGE_SIZE - HEADER_SIZE
        );
        assert!(unsafe { heap.min_block.is_free() });
    }

    #[test]
    fn test_realloc_in_place_consumes_neighbour() {
        let mut heap = heap_with_pages(1);
        let a = heap.alloc(32);
        let b = heap.alloc(32);
        assert!(!a.is_null() && !b.is_null());

        unsafe {
            heap.free(b);
            assert!(block_of(a).has_next_free());

            let c = heap.realloc(a, 48);
            assert_eq!(c, a);
            assert_eq!(block_of(c).size(), 48);
        }
        assert!(heap.validate());
    }

    #[test]
    fn test_realloc_requiring_move_preserves_contents() {
        let mut heap = heap_with_pages(1);
        let a = heap.alloc(32);
        let b = heap.alloc(32);
        assert!(!a.is_null() && !b.is_null());

        for i in 0..32u8 {
            unsafe { a.add(i as usize).write(i ^ 0xA5) };
        }

        let c = unsafe { heap.realloc(a, 200) };
        assert!(!c.is_null());
        assert_ne!(c, a);
        for i in 0..32u8 {
            assert_eq!(unsafe { c.add(i as usize).read() }, i ^ 0xA5);
        }
        assert!(heap.validate());
    }

    #[test]
    fn test_realloc_same_size_is_identity() {
        let mut heap = heap_with_pages(1);
        let p = heap.alloc(100);
        unsafe {
            // 100 rounds to 104; anything mapping to the same rounded size
            // is a no-op.
            assert_eq!(heap.realloc(p, 100), p);
            assert_eq!(heap.realloc(p, 97), p);
            assert_eq!(heap.realloc(p, 104), p);
        }
        assert!(heap.validate());
    }

    #[test]
    fn test_realloc_null_and_zero() {
        let mut heap = heap_with_pages(1);
        let p = unsafe { heap.realloc(ptr::null_mut(), 64) };
        assert!(!p.is_null());
        assert!(heap.validate());

        let q = unsafe { heap.realloc(p, 0) };
        assert!(q.is_null());
        assert!(heap.validate());
        assert_eq!(heap.min_block, heap.max_block);
    }

    #[test]
    fn test_garbage_tail_is_unlisted_but_coalescible() {
        let mut heap = heap_with_pages(1);
        // Leaves 16 bytes: an 8-byte header plus an 8-byte garbage payload.
        let p = heap.alloc(PAGE_SIZE - 2 * HEADER_SIZE - 8);
        assert!(!p.is_null());

        let block = block_of(p);
        unsafe {
            assert!(block.has_next_free());
            let tail = block.next_block();
            assert!(tail.is_free());
            assert!((tail.size() as usize) < MIN_PAYLOAD);
            assert!(!heap.buckets.contains(tail, 8));
        }
        assert!(heap.validate());

        // Freeing the block absorbs the garbage tail.
        unsafe { heap.free(p) };
        assert!(heap.validate());
        assert_eq!(heap.min_block, heap.max_block);
        assert_eq!(
            unsafe { heap.min_block.size() } as usize,
            PAGE_SIZE - HEADER_SIZE
        );
    }

    #[test]
    fn test_whole_page_alloc_leaves_no_tail() {
        let mut heap = heap_with_pages(2);
        let p = heap.alloc(PAGE_SIZE - HEADER_SIZE);
        assert!(!p.is_null());
        assert_eq!(heap.min_block, heap.max_block);
        assert!(heap.validate());

        // The next request has to extend the segment.
        let q = heap.alloc(64);
        assert!(!q.is_null());
        assert!(q > p);
        assert!(heap.validate());
    }

    #[test]
    fn test_page_extension_advances_heap_end() {
        let mut heap = heap_with_pages(4);
        let p1 = heap.alloc(3000);
        assert!(!p1.is_null());
        let end_before = heap.max_block;

        let p2 = heap.alloc(3000);
        assert!(!p2.is_null());
        assert!(heap.max_block > end_before);
        assert!(heap.validate());

        // A multi-page request in one go.
        let p3 = heap.alloc(PAGE_SIZE + 500);
        assert!(!p3.is_null());
        assert!(heap.validate());
    }

    #[test]
    fn test_extension_failure_returns_null_and_keeps_heap_intact() {
        let mut heap = heap_with_pages(1);
        assert!(heap.alloc(2 * PAGE_SIZE).is_null());
        assert!(heap.validate());

        // The heap still serves what it has.
        let p = heap.alloc(100);
        assert!(!p.is_null());
        assert!(heap.validate());
    }

    #[test]
    fn test_oversized_request_is_rejected() {
        let mut heap = heap_with_pages(1);
        assert!(heap.alloc(MAX_REQUEST + 1).is_null());
        assert!(heap.validate());
    }

    #[test]
    fn test_free_reuses_block_of_same_class() {
        let mut heap = heap_with_pages(1);
        let a = heap.alloc(64);
        let _b = heap.alloc(64);
        unsafe { heap.free(a) };
        assert!(heap.validate());

        // The hole left by `a` is the best fit for an equal request.
        let c = heap.alloc(64);
        assert_eq!(c, a);
        assert!(heap.validate());
    }

    #[test]
    fn test_payloads_are_aligned_and_large_enough() {
        let mut heap = heap_with_pages(4);
        for size in [1, 7, 8, 15, 16, 24, 100, 1000, 4000] {
            let p = heap.alloc(size);
            assert!(!p.is_null());
            assert_eq!(p as usize % ALIGNMENT, 0);
            assert!(unsafe { block_of(p).size() } as usize >= size);
        }
        assert!(heap.validate());
    }

    #[test]
    fn test_reset_wipes_the_heap() {
        let mut heap = heap_with_pages(2);
        let a = heap.alloc(64);
        let _b = heap.alloc(4000);
        assert!(!a.is_null());

        heap.reset().unwrap();
        assert!(heap.validate());
        assert_eq!(heap.min_block, heap.max_block);
        assert_eq!(
            unsafe { heap.min_block.size() } as usize,
            INIT_PAGES * PAGE_SIZE - HEADER_SIZE
        );

        // A fresh allocation lands back at the base.
        let c = heap.alloc(64);
        assert_eq!(c, a);
    }

    #[test]
    fn test_mixed_workload_stays_consistent() {
        let mut heap = heap_with_pages(16);
        let mut live: Vec<(*mut u8, usize)> = Vec::new();

        // Deterministic churn: allocate a ladder of sizes, free every other
        // one, then realloc the survivors up and down.
        for i in 0..32 {
            let size = 16 + (i * 37) % 700;
            let p = heap.alloc(size);
            assert!(!p.is_null());
            unsafe { p.write_bytes(i as u8, size) };
            live.push((p, size));
        }
        assert!(heap.validate());

        for i in (0..32).step_by(2) {
            unsafe { heap.free(live[i].0) };
        }
        assert!(heap.validate());

        for i in (1..32).step_by(2) {
            let (p, size) = live[i];
            let new_size = if i % 4 == 1 { size * 2 } else { size / 2 + 1 };
            let q = unsafe { heap.realloc(p, new_size) };
            assert!(!q.is_null());
            assert_eq!(unsafe { q.read() }, i as u8);
            live[i] = (q, new_size);
            assert!(heap.validate());
        }

        for i in (1..32).step_by(2) {
            unsafe { heap.free(live[i].0) };
        }
        assert!(heap.validate());
        // Fully freed heap coalesces to a single block.
        assert_eq!(heap.min_block, heap.max_block);
    }
}
