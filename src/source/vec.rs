use alloc::vec::Vec;
use core::ops::Range;

use super::{HeapSource, DEFAULT_LIMIT, GRANULARITY};
use crate::{block::align_up, error::GrowError};

/// A heap region backed by a `Vec<u8>`, capped at a fixed limit.
///
/// The buffer may be reallocated when it grows, which is fine because the
/// allocator only ever holds offsets into it.
#[derive(Debug, Clone)]
pub struct VecSource {
    buf: Vec<u8>,
    limit: usize,
    granularity: usize,
}

impl VecSource {
    /// Construct a `VecSource` that can grow up to `limit` bytes.
    pub fn new(limit: usize) -> Self {
        Self::with_granularity(limit, GRANULARITY)
    }

    /// Construct a `VecSource` that can grow up to `limit` bytes and rounds
    /// every growth to `granularity` bytes.
    ///
    /// # Panics
    ///
    /// `granularity` must be a power of two not smaller than
    /// [`GRANULARITY`].
    pub fn with_granularity(limit: usize, granularity: usize) -> Self {
        assert!(
            granularity.is_power_of_two() && granularity >= GRANULARITY,
            "granularity must be a power of two not smaller than {}",
            GRANULARITY
        );
        Self {
            buf: Vec::new(),
            limit,
            granularity,
        }
    }

    #[inline]
    pub fn limit(&self) -> usize {
        self.limit
    }
}

impl Default for VecSource {
    fn default() -> Self {
        Self::new(DEFAULT_LIMIT)
    }
}

impl HeapSource for VecSource {
    fn grow(&mut self, min_len: usize) -> Result<Range<usize>, GrowError> {
        let len = align_up(min_len, self.granularity).ok_or(GrowError::Overflow)?;
        let start = self.buf.len();
        let available = self.limit.saturating_sub(start);
        if len > available {
            return Err(GrowError::Exhausted {
                requested: len,
                available,
            });
        }

        self.buf.resize(start + len, 0);
        Ok(start..start + len)
    }

    #[inline]
    fn bounds(&self) -> Range<usize> {
        0..self.buf.len()
    }

    #[inline]
    fn bytes(&self) -> &[u8] {
        &self.buf
    }

    #[inline]
    fn bytes_mut(&mut self) -> &mut [u8] {
        &mut self.buf
    }
}
