//! Concrete segment providers
//!
//! Both providers carve pages from a single contiguous reservation, so
//! every extension lands exactly at the previous end of the segment.
//! `FixedSegment` works over caller-supplied memory and stays no_std;
//! `MmapSegment` reserves an anonymous mapping from the host.

use core::ptr::NonNull;

use crate::config::{ALIGNMENT, PAGE_SIZE};
use crate::error::SegmentError;
use crate::traits::SegmentProvider;

/// Pages carved out of a caller-provided region.
pub struct FixedSegment {
    base: NonNull<u8>,
    total_pages: usize,
    committed_pages: usize,
}

// SAFETY: construction hands the region over exclusively.
unsafe impl Send for FixedSegment {}

impl FixedSegment {
    /// Wrap a region of `len` bytes starting at `base`.
    ///
    /// The usable size is `len` rounded down to whole pages.
    ///
    /// # Safety
    /// The region must be valid for reads and writes for `len` bytes, owned
    /// exclusively by this segment for its whole lifetime.
    pub unsafe fn new(base: NonNull<u8>, len: usize) -> Result<Self, SegmentError> {
        if !(base.as_ptr() as usize).is_multiple_of(ALIGNMENT) {
            return Err(SegmentError::Misaligned);
        }
        let total_pages = len / PAGE_SIZE;
        if total_pages == 0 {
            return Err(SegmentError::TooSmall);
        }
        Ok(Self {
            base,
            total_pages,
            committed_pages: 0,
        })
    }

    /// Pages handed out so far.
    pub fn committed_pages(&self) -> usize {
        self.committed_pages
    }

    /// Total pages the region can provide.
    pub fn total_pages(&self) -> usize {
        self.total_pages
    }
}

impl SegmentProvider for FixedSegment {
    type Error = SegmentError;

    fn init_segment(&mut self, pages: usize) -> Result<NonNull<u8>, SegmentError> {
        if pages > self.total_pages {
            return Err(SegmentError::Exhausted);
        }
        self.committed_pages = pages;
        Ok(self.base)
    }

    fn extend_segment(&mut self, pages: usize) -> Result<NonNull<u8>, SegmentError> {
        if self.committed_pages + pages > self.total_pages {
            return Err(SegmentError::Exhausted);
        }
        let offset = self.committed_pages * PAGE_SIZE;
        self.committed_pages += pages;
        // SAFETY: offset stays within the region the caller vouched for.
        Ok(unsafe { NonNull::new_unchecked(self.base.as_ptr().add(offset)) })
    }
}

/// Pages carved out of an up-front anonymous mmap reservation.
///
/// The whole reservation is mapped read-write with `MAP_NORESERVE`, so
/// untouched pages cost nothing until first write and extensions are
/// contiguous by construction.
#[cfg(feature = "mmap")]
pub struct MmapSegment {
    base: NonNull<u8>,
    total_pages: usize,
    committed_pages: usize,
}

// SAFETY: the mapping is private and owned by this segment alone.
#[cfg(feature = "mmap")]
unsafe impl Send for MmapSegment {}

#[cfg(feature = "mmap")]
impl MmapSegment {
    /// Reserve `max_pages` pages of address space.
    pub fn reserve(max_pages: usize) -> Result<Self, SegmentError> {
        if max_pages == 0 {
            return Err(SegmentError::TooSmall);
        }

        let len = max_pages * PAGE_SIZE;
        // SAFETY: plain anonymous mapping request; a failure comes back as
        // MAP_FAILED rather than UB.
        let raw = unsafe {
            libc::mmap(
                core::ptr::null_mut(),
                len,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_PRIVATE | libc::MAP_ANONYMOUS | libc::MAP_NORESERVE,
                -1,
                0,
            )
        };
        if raw == libc::MAP_FAILED {
            return Err(SegmentError::MapFailed);
        }

        Ok(Self {
            // SAFETY: MAP_FAILED was ruled out, so the address is non-null.
            base: unsafe { NonNull::new_unchecked(raw as *mut u8) },
            total_pages: max_pages,
            committed_pages: 0,
        })
    }

    /// Pages handed out so far.
    pub fn committed_pages(&self) -> usize {
        self.committed_pages
    }
}

#[cfg(feature = "mmap")]
impl SegmentProvider for MmapSegment {
    type Error = SegmentError;

    fn init_segment(&mut self, pages: usize) -> Result<NonNull<u8>, SegmentError> {
        if pages > self.total_pages {
            return Err(SegmentError::Exhausted);
        }
        self.committed_pages = pages;
        Ok(self.base)
    }

    fn extend_segment(&mut self, pages: usize) -> Result<NonNull<u8>, SegmentError> {
        if self.committed_pages + pages > self.total_pages {
            return Err(SegmentError::Exhausted);
        }
        let offset = self.committed_pages * PAGE_SIZE;
        self.committed_pages += pages;
        // SAFETY: offset stays within the reservation.
        Ok(unsafe { NonNull::new_unchecked(self.base.as_ptr().add(offset)) })
    }
}

#[cfg(feature = "mmap")]
impl Drop for MmapSegment {
    fn drop(&mut self) {
        // SAFETY: unmaps exactly the reservation made in `reserve`.
        unsafe {
            libc::munmap(self.base.as_ptr().cast(), self.total_pages * PAGE_SIZE);
        }
    }
}
