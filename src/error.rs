//! Error types for the allocator

use core::fmt;

/// Errors that can occur during allocation operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocError {
    /// Out of memory - the segment provider refused to grow
    OutOfMemory,
    /// Request exceeds the maximum representable payload size
    RequestTooLarge,
    /// Invalid configuration (e.g. global storage too small for the heap)
    InvalidConfig,
}

impl fmt::Display for AllocError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutOfMemory => write!(f, "out of memory"),
            Self::RequestTooLarge => write!(f, "request exceeds maximum payload size"),
            Self::InvalidConfig => write!(f, "invalid configuration"),
        }
    }
}

/// Errors that can occur in the in-tree segment providers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentError {
    /// The backing region has no room for the requested pages
    Exhausted,
    /// The backing region is not suitably aligned
    Misaligned,
    /// The backing region is smaller than one page
    TooSmall,
    /// The anonymous mapping could not be created
    #[cfg(feature = "mmap")]
    MapFailed,
}

impl fmt::Display for SegmentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exhausted => write!(f, "segment reservation exhausted"),
            Self::Misaligned => write!(f, "segment region misaligned"),
            Self::TooSmall => write!(f, "segment region smaller than one page"),
            #[cfg(feature = "mmap")]
            Self::MapFailed => write!(f, "failed to map segment reservation"),
        }
    }
}
