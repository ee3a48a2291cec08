//! Allocator tuning knobs.
use crate::{block::DSIZE, error::ConfigError};

/// What to do when a caller frees or resizes something it doesn't own.
///
/// The call is a no-op under both policies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MisusePolicy {
    /// Log at `debug` level and move on.
    Ignore,
    /// Log at `warn` level and record a [`Misuse`](crate::Misuse), to be
    /// collected by [`Heap::take_misuse`](crate::Heap::take_misuse).
    Report,
}

impl MisusePolicy {
    /// `Report` in debug builds, `Ignore` otherwise.
    pub const DEFAULT: Self = if cfg!(debug_assertions) {
        Self::Report
    } else {
        Self::Ignore
    };
}

impl Default for MisusePolicy {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// The allocator configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    /// The minimum number of bytes requested from the heap region each time
    /// no free block fits.
    pub chunk_size: usize,
    /// A free block is split only if more than this many bytes would be left
    /// over.
    pub split_threshold: usize,
    /// [`Heap::resize`](crate::Heap::resize) keeps a block untouched while
    /// its usable size exceeds the request by more than this.
    pub resize_slack: usize,
    pub misuse: MisusePolicy,
}

impl Config {
    pub const DEFAULT: Self = Self {
        chunk_size: 1 << 7,
        split_threshold: 2 * DSIZE,
        resize_slack: 0,
        misuse: MisusePolicy::DEFAULT,
    };

    #[inline]
    pub const fn with_chunk_size(self, chunk_size: usize) -> Self {
        Self { chunk_size, ..self }
    }

    #[inline]
    pub const fn with_split_threshold(self, split_threshold: usize) -> Self {
        Self {
            split_threshold,
            ..self
        }
    }

    #[inline]
    pub const fn with_resize_slack(self, resize_slack: usize) -> Self {
        Self {
            resize_slack,
            ..self
        }
    }

    #[inline]
    pub const fn with_misuse(self, misuse: MisusePolicy) -> Self {
        Self { misuse, ..self }
    }

    /// Check that every field is in range.
    ///
    /// `split_threshold` must be at least one double word so that every
    /// split-off remainder can hold the free-list links.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chunk_size == 0 || self.chunk_size % DSIZE != 0 {
            return Err(ConfigError::ChunkSize(self.chunk_size));
        }
        if self.split_threshold < DSIZE || self.split_threshold % DSIZE != 0 {
            return Err(ConfigError::SplitThreshold(self.split_threshold));
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::DEFAULT
    }
}
