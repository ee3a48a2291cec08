//! Heap regions: the contiguous, append-only byte ranges a
//! [`Heap`](crate::Heap) carves blocks out of.
use core::ops::Range;

use crate::error::GrowError;

mod vec;
pub use self::vec::VecSource;

cfg_if::cfg_if! {
    if #[cfg(unix)] {
        mod mmap;
        pub use self::mmap::MmapSource;
    }
}

/// Every span returned by [`HeapSource::grow`] is a multiple of this many
/// bytes.
pub const GRANULARITY: usize = crate::block::MIN_BLOCK_SIZE;

/// The default limit of a heap region: 20 MiB.
pub const DEFAULT_LIMIT: usize = 20 << 20;

/// The provider of a heap region.
///
/// Addresses are represented by offsets from the region's start, so a
/// source is free to move its storage when it grows.
pub trait HeapSource {
    /// Extend the region by at least `min_len` bytes.
    ///
    /// Returns the newly added span. The span must start at the previous end
    /// of the region ([`Self::bounds`]`().end`), and its length must be a
    /// multiple of [`GRANULARITY`]. The new bytes may hold any value.
    fn grow(&mut self, min_len: usize) -> Result<Range<usize>, GrowError>;

    /// Get the current extent of the region.
    fn bounds(&self) -> Range<usize>;

    /// Get the region's contents. The returned slice covers `0..bounds().end`.
    fn bytes(&self) -> &[u8];

    /// Get the region's contents mutably. The returned slice covers
    /// `0..bounds().end`.
    fn bytes_mut(&mut self) -> &mut [u8];
}

impl<T: HeapSource + ?Sized> HeapSource for &mut T {
    #[inline]
    fn grow(&mut self, min_len: usize) -> Result<Range<usize>, GrowError> {
        (**self).grow(min_len)
    }

    #[inline]
    fn bounds(&self) -> Range<usize> {
        (**self).bounds()
    }

    #[inline]
    fn bytes(&self) -> &[u8] {
        (**self).bytes()
    }

    #[inline]
    fn bytes_mut(&mut self) -> &mut [u8] {
        (**self).bytes_mut()
    }
}
