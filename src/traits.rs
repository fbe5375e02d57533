//! Trait definitions for the runtime-provided page segment
//!
//! The allocator is agnostic to where its memory comes from. A segment
//! provider owns one contiguous virtual address range and hands out whole
//! pages from its low end; the heap lays blocks over whatever it receives.

use core::fmt::Debug;
use core::ptr::NonNull;

use crate::config::PAGE_SIZE;

/// Page segment provider trait
///
/// The provider models a single growable segment: `init_segment` resets it
/// and returns its base, and each `extend_segment` returns a region starting
/// exactly where the previous one ended. The heap relies on that contiguity
/// to keep its implicit block list gap-free.
pub trait SegmentProvider {
    /// Error type for provider operations
    type Error: Debug;

    /// Reset the segment to `pages` pages and return its base address.
    ///
    /// Any memory handed out earlier is forfeit. The base must be aligned
    /// to at least [`crate::config::ALIGNMENT`].
    fn init_segment(&mut self, pages: usize) -> Result<NonNull<u8>, Self::Error>;

    /// Grow the segment by `pages` pages, contiguously.
    ///
    /// Returns the starting address of the new region, which must equal the
    /// previous end of the segment.
    fn extend_segment(&mut self, pages: usize) -> Result<NonNull<u8>, Self::Error>;

    /// Get the page size (typically 4096)
    fn page_size(&self) -> usize {
        PAGE_SIZE
    }
}
