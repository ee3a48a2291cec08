//! The allocator facade
use alloc::vec::Vec;
use core::{fmt, num::NonZeroUsize, ops::Range};

use crate::{
    block::{self, adjusted_size, block_size, is_allocated, DSIZE, MIN_BLOCK_SIZE, OVERHEAD, WSIZE},
    check,
    class::{class_of, FreeList, SizeClasses},
    coalesce::coalesce_and_insert,
    config::{Config, MisusePolicy},
    error::{InitError, Misuse, Violation},
    fit::{find_fit, split},
    source::{HeapSource, VecSource},
};

/// A handle to an allocation: the offset of its payload in the heap region.
///
/// Payloads are aligned to [`DSIZE`] bytes. Offset `0` holds the heap's
/// padding word and is never a payload, which leaves room for the niche.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Ptr(NonZeroUsize);

impl Ptr {
    /// Construct a `Ptr` from a raw offset. Returns `None` for `0`.
    ///
    /// Nothing guarantees the result denotes a live allocation; passing a
    /// made-up `Ptr` to [`Heap::free`] or [`Heap::resize`] is detected as
    /// [`Misuse`] as far as possible.
    #[inline]
    pub const fn from_offset(offset: usize) -> Option<Self> {
        match NonZeroUsize::new(offset) {
            Some(x) => Some(Self(x)),
            None => None,
        }
    }

    /// Get the payload offset.
    #[inline]
    pub const fn offset(self) -> usize {
        self.0.get()
    }

    /// Every block lives after the padding word, so this never returns
    /// `None` for a block offset.
    #[inline]
    fn from_bp(bp: usize) -> Option<Self> {
        debug_assert_ne!(bp, 0);
        NonZeroUsize::new(bp).map(Self)
    }
}

impl fmt::Display for Ptr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// A block as seen by [`Heap::blocks`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockInfo {
    /// The payload offset.
    pub ptr: Ptr,
    /// The block size, including the header and the footer.
    pub size: usize,
    pub allocated: bool,
}

#[doc = svgbobdoc::transform!(
/// A segregated-fit heap over a growable region.
///
/// # Heap Layout
///
/// <center>
/// ```svgbob
///              prologue                                               epilogue
///   padding  ,---------,  ,-------------------, ,-------------------, ,------,
///  ,-------, | hdr|ftr |  | hdr| payload  |ftr| | hdr| prev|next|ftr| | hdr  |
///  |   0   | | 16 | 16 |  | 48 |          | 48| | 64 |  o  |  o |64 | | 0|1 |
///  '-------' '---------'  '-------------------' '-------+----+------' '------'
///                               allocated              |    |   free
///                                                      v    v
///                                             size-class free list neighbors
/// ```
/// </center>
///
/// Free blocks are indexed by a table of power-of-two size classes. Freed
/// blocks are merged with their free physical neighbors right away, and a
/// miss on the table grows the region by at least
/// [`Config::chunk_size`] bytes.
///
/// # Examples
///
/// ```
/// use segalloc::{Heap, VecSource};
///
/// let mut heap = Heap::new(VecSource::default()).unwrap();
/// let ptr = heap.allocate(100).unwrap();
/// heap.payload_mut(ptr).unwrap()[..5].copy_from_slice(b"hello");
///
/// let ptr = heap.resize(Some(ptr), 1000).unwrap();
/// assert_eq!(&heap.payload(ptr).unwrap()[..5], b"hello");
///
/// heap.free(Some(ptr));
/// assert!(heap.check().is_ok());
/// ```
)]
#[derive(Debug)]
pub struct Heap<S = VecSource> {
    source: S,
    classes: SizeClasses,
    config: Config,
    /// The prologue's payload offset.
    prologue: usize,
    misuse: Vec<Misuse>,
}

impl<S: HeapSource> Heap<S> {
    /// Construct a `Heap` with the default configuration.
    pub fn new(source: S) -> Result<Self, InitError> {
        Self::with_config(source, Config::DEFAULT)
    }

    /// Construct a `Heap`, laying out the prologue and the epilogue in a
    /// freshly grown span of `source`.
    pub fn with_config(mut source: S, config: Config) -> Result<Self, InitError> {
        config.validate()?;

        let span = source.grow(4 * WSIZE)?;
        let mem = source.bytes_mut();

        // [0 | prologue hdr | prologue ftr | epilogue hdr]
        block::write_word(mem, span.start, 0);
        let prologue = span.start + DSIZE;
        block::set_block(mem, prologue, DSIZE, true);
        block::set_epilogue(mem, span.start + 3 * WSIZE);

        let mut this = Self {
            source,
            classes: SizeClasses::INIT,
            config,
            prologue,
            misuse: Vec::new(),
        };

        // The source may have handed out more than asked for
        if span.len() > 4 * WSIZE {
            this.install_span(span.start + 4 * WSIZE..span.end);
        }

        log::debug!(
            "heap initialized: {:?}, prologue at {:#x}",
            this.source.bounds(),
            prologue
        );
        Ok(this)
    }

    #[inline]
    pub fn config(&self) -> &Config {
        &self.config
    }

    #[inline]
    pub fn source(&self) -> &S {
        &self.source
    }

    /// Get the current extent of the heap region.
    #[inline]
    pub fn heap_bounds(&self) -> Range<usize> {
        self.source.bounds()
    }

    #[inline]
    pub fn heap_size(&self) -> usize {
        self.source.bounds().len()
    }

    /// Attempt to allocate a block with at least `n` bytes of payload.
    ///
    /// Returns `None` if `n == 0` or the heap region cannot grow enough.
    pub fn allocate(&mut self, n: usize) -> Option<Ptr> {
        if n == 0 {
            return None;
        }
        let asize = adjusted_size(n)?;

        let bp = match self.take_fit(asize) {
            Some(bp) => bp,
            None => {
                self.extend(asize.max(self.config.chunk_size))?;
                // The grown block fits by construction
                self.take_fit(asize)?
            }
        };

        let mem = self.source.bytes_mut();
        split(mem, &mut self.classes, bp, asize, self.config.split_threshold);
        log::trace!("allocate({}) = {:#x}", n, bp);
        Ptr::from_bp(bp)
    }

    /// Deallocate a block. `None` is ignored.
    ///
    /// Freeing a block that is already free, or something that isn't a block
    /// of this heap, is a no-op handled according to [`Config::misuse`].
    pub fn free(&mut self, ptr: Option<Ptr>) {
        let Some(ptr) = ptr else { return };
        let Some(bp) = self.live_block(ptr) else {
            return;
        };

        let mem = self.source.bytes_mut();
        block::set_allocated(mem, bp, false);
        let bp = coalesce_and_insert(mem, &mut self.classes, bp);
        log::trace!(
            "free({}) -> free block {:#x} ({} bytes)",
            ptr,
            bp,
            block_size(self.source.bytes(), bp)
        );
    }

    /// Resize an allocation so that it holds at least `n` bytes.
    ///
    /// A block that is already large enough is returned as it is. Otherwise
    /// the block grows in place into a free neighbor if possible, and moves
    /// to a new allocation as a last resort.
    ///
    ///  - `n == 0` frees `ptr` and returns `None`.
    ///  - `ptr == None` is the same as [`Self::allocate`].
    ///  - On failure, returns `None` and leaves the original allocation
    ///    intact.
    ///
    /// The payload's first `min(n, old usable size)` bytes are preserved.
    pub fn resize(&mut self, ptr: Option<Ptr>, n: usize) -> Option<Ptr> {
        if n == 0 {
            self.free(ptr);
            return None;
        }
        let Some(ptr) = ptr else {
            return self.allocate(n);
        };
        let bp = self.live_block(ptr)?;

        let usable = block_size(self.source.bytes(), bp) - OVERHEAD;
        if usable > n.saturating_add(self.config.resize_slack) {
            log::trace!("resize({}, {}): fits already", ptr, n);
            return Some(ptr);
        }
        let asize = adjusted_size(n)?;

        if let Some(bp) = self.resize_into_next(bp, asize) {
            log::trace!("resize({}, {}): absorbed the next block", ptr, n);
            return Ptr::from_bp(bp);
        }
        if let Some(bp) = self.resize_into_prev(bp, asize, usable.min(n)) {
            log::trace!(
                "resize({}, {}): absorbed the previous block, moved to {:#x}",
                ptr,
                n,
                bp
            );
            return Ptr::from_bp(bp);
        }

        let new_ptr = self.allocate(n)?;
        let len = usable.min(n);
        self.source
            .bytes_mut()
            .copy_within(bp..bp + len, new_ptr.offset());
        self.free(Some(ptr));
        log::trace!("resize({}, {}): moved to {}", ptr, n, new_ptr);
        Some(new_ptr)
    }

    /// Grow the allocated block `bp` in place by absorbing its free successor.
    fn resize_into_next(&mut self, bp: usize, asize: usize) -> Option<usize> {
        let mem = self.source.bytes_mut();
        let next = block::next_physical(mem, bp);
        if is_allocated(mem, next) {
            return None;
        }
        let size = block_size(mem, bp) + block_size(mem, next);
        if size < asize {
            return None;
        }

        self.classes.remove(mem, next);
        block::set_block(mem, bp, size, true);
        split(mem, &mut self.classes, bp, asize, self.config.split_threshold);
        Some(bp)
    }

    /// Grow the allocated block `bp` by absorbing its free predecessor,
    /// moving the first `keep` payload bytes to the new start.
    fn resize_into_prev(&mut self, bp: usize, asize: usize, keep: usize) -> Option<usize> {
        let mem = self.source.bytes_mut();
        if block::prev_allocated(mem, bp) {
            return None;
        }
        let prev = block::prev_physical(mem, bp);
        let size = block_size(mem, prev) + block_size(mem, bp);
        if size < asize {
            return None;
        }

        self.classes.remove(mem, prev);
        // The merged header precedes the destination and the merged footer
        // lies past it, so neither clobbers the moved bytes.
        mem.copy_within(bp..bp + keep, prev);
        block::set_block(mem, prev, size, true);
        split(mem, &mut self.classes, prev, asize, self.config.split_threshold);
        Some(prev)
    }

    /// Get the number of payload bytes of a live allocation.
    pub fn usable_size(&self, ptr: Ptr) -> Option<usize> {
        let bp = self.validate(ptr)?;
        let mem = self.source.bytes();
        is_allocated(mem, bp).then(|| block_size(mem, bp) - OVERHEAD)
    }

    /// Get the payload of a live allocation.
    pub fn payload(&self, ptr: Ptr) -> Option<&[u8]> {
        let len = self.usable_size(ptr)?;
        let bp = ptr.offset();
        Some(&self.source.bytes()[bp..bp + len])
    }

    /// Get the payload of a live allocation mutably.
    pub fn payload_mut(&mut self, ptr: Ptr) -> Option<&mut [u8]> {
        let len = self.usable_size(ptr)?;
        let bp = ptr.offset();
        Some(&mut self.source.bytes_mut()[bp..bp + len])
    }

    /// Iterate over every block between the prologue and the epilogue, in
    /// address order.
    pub fn blocks(&self) -> Blocks<'_> {
        let mem = self.source.bytes();
        Blocks {
            mem,
            bp: block::next_physical(mem, self.prologue),
        }
    }

    /// Iterate over the free blocks listed in a size class, most recently
    /// listed first.
    ///
    /// # Panics
    ///
    /// Panics if `class >= NUM_CLASSES`.
    pub fn free_blocks(&self, class: usize) -> FreeList<'_> {
        self.classes.iter(self.source.bytes(), class)
    }

    /// Verify the heap's structural invariants.
    ///
    /// This walks the whole heap and every free list, so it's meant for tests
    /// and debugging.
    pub fn check(&self) -> Result<(), Vec<Violation>> {
        check::check(self.source.bytes(), &self.classes, self.prologue)
    }

    /// Take the misuses recorded under [`MisusePolicy::Report`].
    pub fn take_misuse(&mut self) -> Vec<Misuse> {
        core::mem::take(&mut self.misuse)
    }

    /// Find and unlink a free block of at least `asize` bytes.
    #[inline]
    fn take_fit(&mut self, asize: usize) -> Option<usize> {
        find_fit(self.source.bytes_mut(), &mut self.classes, asize)
    }

    /// Grow the heap region by at least `min_len` bytes and list the new
    /// space as a free block, merged with any free block before it.
    fn extend(&mut self, min_len: usize) -> Option<usize> {
        match self.source.grow(min_len) {
            Ok(span) => {
                log::debug!("heap grown by {} bytes: {:?}", span.len(), span);
                Some(self.install_span(span))
            }
            Err(e) => {
                log::debug!("heap growth by {} bytes failed: {}", min_len, e);
                None
            }
        }
    }

    /// Turn a freshly grown span into a free block that begins at the old
    /// epilogue, and put a new epilogue at the end.
    fn install_span(&mut self, span: Range<usize>) -> usize {
        debug_assert_eq!(span.len() % MIN_BLOCK_SIZE, 0);
        let mem = self.source.bytes_mut();
        let bp = span.start;
        block::set_block(mem, bp, span.len(), false);
        block::set_epilogue(mem, span.end - WSIZE);
        coalesce_and_insert(mem, &mut self.classes, bp)
    }

    /// Check that `ptr` denotes a block of this heap whose physical neighbors
    /// look sound enough to be merged with.
    ///
    /// A free neighbor must be linked into its list and must itself be
    /// bordered by an allocated block, as every free block of an intact heap
    /// is. Together this keeps `free` and `resize` from reading or writing out
    /// of bounds when handed a forged pointer.
    fn validate(&self, ptr: Ptr) -> Option<usize> {
        let bp = ptr.offset();
        let header = self.block_tags(bp)?;
        let mem = self.source.bytes();

        // The predecessor, as seen through its footer
        let prev_ftr = block::read_word(mem, bp - DSIZE);
        if !block::word_allocated(prev_ftr) {
            let prev = bp.checked_sub(block::word_size(prev_ftr))?;
            if self.block_tags(prev)? != prev_ftr
                || !block::prev_allocated(mem, prev)
                || !self.is_linked(prev)
            {
                return None;
            }
        }

        // The successor, as seen through its header. `block_tags` guarantees
        // that the header is at or before the epilogue.
        let next = bp + block::word_size(header);
        let next_hdr = block::read_word(mem, block::header_of(next));
        if !block::word_allocated(next_hdr) {
            if self.block_tags(next)? != next_hdr
                || !is_allocated(mem, block::next_physical(mem, next))
                || !self.is_linked(next)
            {
                return None;
            }
        }

        Some(bp)
    }

    /// Get the header word of the block at `bp` if `bp` is a well-placed
    /// block lying between the prologue and the epilogue, and its header and
    /// footer agree.
    fn block_tags(&self, bp: usize) -> Option<usize> {
        let mem = self.source.bytes();
        let epilogue_hdr = mem.len().checked_sub(WSIZE)?;

        if bp % DSIZE != 0 || bp <= self.prologue || bp > epilogue_hdr {
            return None;
        }
        let header = block::read_word(mem, block::header_of(bp));
        let size = block::word_size(header);
        if size < MIN_BLOCK_SIZE || size > epilogue_hdr + WSIZE - bp {
            return None;
        }
        let footer = block::read_word(mem, bp + size - DSIZE);
        (header == footer).then_some(header)
    }

    /// Check that the free block `bp` can be unlinked: its neighbors in the
    /// list point back at it, or it is the head of its class.
    fn is_linked(&self, bp: usize) -> bool {
        let mem = self.source.bytes();
        let in_heap = |link: usize| {
            link % DSIZE == 0
                && link > self.prologue
                && link.checked_add(DSIZE).is_some_and(|end| end <= mem.len())
        };

        let prev_ok = match block::prev_free(mem, bp) {
            None => self.classes.head(class_of(block_size(mem, bp))) == Some(bp),
            Some(prev) => in_heap(prev) && block::next_free(mem, prev) == Some(bp),
        };
        let next_ok = match block::next_free(mem, bp) {
            None => true,
            Some(next) => in_heap(next) && block::prev_free(mem, next) == Some(bp),
        };
        prev_ok && next_ok
    }

    /// Like [`Self::validate`], but also requires the block to be allocated
    /// and records misuse.
    fn live_block(&mut self, ptr: Ptr) -> Option<usize> {
        match self.validate(ptr) {
            Some(bp) if is_allocated(self.source.bytes(), bp) => Some(bp),
            Some(_) => {
                self.report(Misuse::DoubleFree(ptr));
                None
            }
            None => {
                self.report(Misuse::InvalidPointer(ptr));
                None
            }
        }
    }

    fn report(&mut self, misuse: Misuse) {
        match self.config.misuse {
            MisusePolicy::Ignore => log::debug!("ignoring misuse: {}", misuse),
            MisusePolicy::Report => {
                log::warn!("{}", misuse);
                self.misuse.push(misuse);
            }
        }
    }
}

/// An iterator over the blocks of a heap. Created by [`Heap::blocks`].
#[derive(Debug, Clone)]
pub struct Blocks<'a> {
    mem: &'a [u8],
    bp: usize,
}

impl Iterator for Blocks<'_> {
    type Item = BlockInfo;

    fn next(&mut self) -> Option<BlockInfo> {
        let header = block::try_read_word(self.mem, self.bp.checked_sub(WSIZE)?)?;
        let size = block::word_size(header);
        if size == 0 {
            // The epilogue
            return None;
        }
        let info = BlockInfo {
            ptr: Ptr::from_bp(self.bp)?,
            size,
            allocated: block::word_allocated(header),
        };
        self.bp += size;
        Some(info)
    }
}
