//! Error and diagnostic types.
use crate::Ptr;

/// The heap region could not be extended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum GrowError {
    /// The region's limit would be exceeded.
    #[error("heap region exhausted: {requested} bytes requested, {available} available")]
    Exhausted { requested: usize, available: usize },
    /// The operating system refused to back the region.
    #[error("failed to map {len} bytes")]
    MapFailed { len: usize },
    /// The requested length is not representable.
    #[error("requested growth overflows the address space")]
    Overflow,
}

/// A [`Config`](crate::Config) value is out of range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("chunk size {0} is not a non-zero multiple of the double-word size")]
    ChunkSize(usize),
    #[error("split threshold {0} is not a multiple of the double-word size of at least one double word")]
    SplitThreshold(usize),
}

/// [`Heap::with_config`](crate::Heap::with_config) failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum InitError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("failed to create the initial heap: {0}")]
    Grow(#[from] GrowError),
}

/// A caller misuse detected by [`Heap::free`](crate::Heap::free) or
/// [`Heap::resize`](crate::Heap::resize). Either way the call is a no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Misuse {
    /// The block is already free.
    #[error("block {0} is already free")]
    DoubleFree(Ptr),
    /// The pointer does not denote a block managed by this heap.
    #[error("{0} does not denote a managed block")]
    InvalidPointer(Ptr),
}

/// A structural invariant violation found by [`Heap::check`](crate::Heap::check).
///
/// Offsets are payload offsets unless stated otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Violation {
    #[error("prologue at {0:#x} is not an allocated double-word block")]
    BadPrologue(usize),
    #[error("epilogue header at {header:#x} is not flush with the heap end {heap_end:#x}")]
    EpilogueNotAtEnd { header: usize, heap_end: usize },
    #[error("block {0:#x} runs past the heap end")]
    OutOfBounds(usize),
    #[error("block {0:#x} is not double-word aligned")]
    Misaligned(usize),
    #[error("block {block:#x} has size {size}, smaller than the minimum block size")]
    TooSmall { block: usize, size: usize },
    #[error("block {block:#x} header {header:#x} differs from its footer {footer:#x}")]
    HeaderFooterMismatch {
        block: usize,
        header: usize,
        footer: usize,
    },
    #[error("free blocks {0:#x} and {1:#x} are adjacent")]
    Uncoalesced(usize, usize),
    #[error("free block {0:#x} is not in any list")]
    Unlisted(usize),
    #[error("class {class} lists {link:#x}, which is not a free block in the heap")]
    StrayLink { class: usize, link: usize },
    #[error("class {class} lists allocated block {block:#x}")]
    ListedAllocated { class: usize, block: usize },
    #[error("class {class} lists block {block:#x}, which belongs to class {expected}")]
    WrongClass {
        class: usize,
        block: usize,
        expected: usize,
    },
    #[error("block {0:#x} is listed more than once")]
    ListedTwice(usize),
    #[error("head {block:#x} of class {class} has a previous link")]
    HeadHasPrev { class: usize, block: usize },
    #[error("block {block:#x} has previous link {found:?}, expected {expected:?}")]
    BrokenBackLink {
        block: usize,
        found: Option<usize>,
        expected: Option<usize>,
    },
}
