use core::{ops::Range, ptr::NonNull, slice};

use super::{HeapSource, GRANULARITY};
use crate::{block::align_up, error::GrowError};

/// A heap region carved out of a virtual address range reserved up front
/// with `mmap`. Growing just moves a break pointer forward in page-size
/// steps, so the region never moves.
#[derive(Debug)]
pub struct MmapSource {
    base: NonNull<u8>,
    /// The reserved length.
    capacity: usize,
    /// The current end of the region.
    brk: usize,
    page_size: usize,
}

// Safety: `MmapSource` exclusively owns the mapping; the bytes are only
//         reachable through `&self`/`&mut self`.
unsafe impl Send for MmapSource {}
unsafe impl Sync for MmapSource {}

impl MmapSource {
    /// Reserve `capacity` bytes (rounded up to the page size) of address
    /// space.
    pub fn new(capacity: usize) -> Result<Self, GrowError> {
        let page_size = page_size();
        let capacity = align_up(capacity, page_size).ok_or(GrowError::Overflow)?;
        if capacity == 0 {
            return Err(GrowError::MapFailed { len: 0 });
        }

        // Safety: A fresh anonymous mapping doesn't alias anything.
        let ptr = unsafe {
            libc::mmap(
                core::ptr::null_mut(),
                capacity,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_ANONYMOUS | libc::MAP_PRIVATE,
                -1,
                0,
            )
        };
        if ptr == libc::MAP_FAILED {
            return Err(GrowError::MapFailed { len: capacity });
        }
        let base = NonNull::new(ptr as *mut u8).ok_or(GrowError::MapFailed { len: capacity })?;

        log::debug!(
            "reserved {} bytes at {:p} (page size {})",
            capacity,
            base,
            page_size
        );

        Ok(Self {
            base,
            capacity,
            brk: 0,
            page_size,
        })
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

fn page_size() -> usize {
    // Safety: `sysconf` has no preconditions.
    let page_size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    if page_size <= 0 {
        GRANULARITY
    } else {
        (page_size as usize).max(GRANULARITY)
    }
}

impl HeapSource for MmapSource {
    fn grow(&mut self, min_len: usize) -> Result<Range<usize>, GrowError> {
        let len = align_up(min_len, self.page_size).ok_or(GrowError::Overflow)?;
        let available = self.capacity - self.brk;
        if len > available {
            return Err(GrowError::Exhausted {
                requested: len,
                available,
            });
        }

        let start = self.brk;
        self.brk += len;
        Ok(start..self.brk)
    }

    #[inline]
    fn bounds(&self) -> Range<usize> {
        0..self.brk
    }

    #[inline]
    fn bytes(&self) -> &[u8] {
        // Safety: `base..base + brk` is mapped, readable, and owned by `self`
        unsafe { slice::from_raw_parts(self.base.as_ptr(), self.brk) }
    }

    #[inline]
    fn bytes_mut(&mut self) -> &mut [u8] {
        // Safety: `base..base + brk` is mapped, writable, and owned by `self`
        unsafe { slice::from_raw_parts_mut(self.base.as_ptr(), self.brk) }
    }
}

impl Drop for MmapSource {
    fn drop(&mut self) {
        // Safety: `base..base + capacity` was mapped by `new` and nothing
        //         borrows it anymore
        unsafe { libc::munmap(self.base.as_ptr() as *mut _, self.capacity) };
    }
}
