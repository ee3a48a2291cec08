//! The on-heap block format.
//!
//! Every block is laid out as follows (`bp` is the block's payload offset,
//! which is also the block's identity):
//!
//! ```text
//!   bp - WSIZE     bp                                bp + size - DSIZE
//!   |              |                                 |
//!   v              v                                 v
//!   +--------------+------------+------------+ ... --+--------------+
//!   | size | alloc |  prev_free |  next_free |       | size | alloc |
//!   +--------------+------------+------------+ ... --+--------------+
//!      header       (free blocks only; payload          footer
//!                    bytes of used blocks)
//! ```
//!
//! `size` covers the header, the payload, and the footer. It is always a
//! multiple of [`DSIZE`], so the low bits of a header word are free to hold
//! the allocation bit.
use core::mem;

/// The word size.
pub const WSIZE: usize = mem::size_of::<usize>();

/// The double-word size. Every payload is aligned to this.
pub const DSIZE: usize = 2 * WSIZE;

/// The bytes consumed by a block's header and footer.
pub const OVERHEAD: usize = DSIZE;

/// The smallest block that can hold a header, a footer, and two free-list
/// links.
pub const MIN_BLOCK_SIZE: usize = 2 * DSIZE;

/// The bit of a header word indicating whether the block is allocated.
const ALLOC_BIT: usize = 1;

/// The bits of a header word representing the block size.
const SIZE_MASK: usize = !(DSIZE - 1);

/// Pack a size and an allocation flag into a header word.
#[inline]
pub(crate) fn pack(size: usize, allocated: bool) -> usize {
    debug_assert_eq!(size & !SIZE_MASK, 0);
    size | allocated as usize
}

#[inline]
pub(crate) fn read_word(mem: &[u8], off: usize) -> usize {
    let mut word = [0u8; WSIZE];
    word.copy_from_slice(&mem[off..off + WSIZE]);
    usize::from_ne_bytes(word)
}

#[inline]
pub(crate) fn write_word(mem: &mut [u8], off: usize, value: usize) {
    mem[off..off + WSIZE].copy_from_slice(&value.to_ne_bytes());
}

/// Like [`read_word`], but returns `None` instead of panicking when `off` is
/// out of bounds. Used by code paths that must survive a corrupted heap.
#[inline]
pub(crate) fn try_read_word(mem: &[u8], off: usize) -> Option<usize> {
    let bytes = mem.get(off..off.checked_add(WSIZE)?)?;
    let mut word = [0u8; WSIZE];
    word.copy_from_slice(bytes);
    Some(usize::from_ne_bytes(word))
}

#[inline]
pub(crate) fn word_size(word: usize) -> usize {
    word & SIZE_MASK
}

#[inline]
pub(crate) fn word_allocated(word: usize) -> bool {
    (word & ALLOC_BIT) != 0
}

#[inline]
pub(crate) fn header_of(bp: usize) -> usize {
    bp - WSIZE
}

#[inline]
pub(crate) fn footer_of(mem: &[u8], bp: usize) -> usize {
    bp + block_size(mem, bp) - DSIZE
}

/// The size of the block at `bp`, read from its header.
#[inline]
pub(crate) fn block_size(mem: &[u8], bp: usize) -> usize {
    word_size(read_word(mem, header_of(bp)))
}

#[inline]
pub(crate) fn is_allocated(mem: &[u8], bp: usize) -> bool {
    word_allocated(read_word(mem, header_of(bp)))
}

/// Get the block physically following `bp`.
#[inline]
pub(crate) fn next_physical(mem: &[u8], bp: usize) -> usize {
    bp + block_size(mem, bp)
}

/// Get the block physically preceding `bp`.
///
/// The predecessor's footer (the word right before `bp`'s header) must
/// already encode the predecessor's size.
#[inline]
pub(crate) fn prev_physical(mem: &[u8], bp: usize) -> usize {
    bp - word_size(read_word(mem, bp - DSIZE))
}

/// Read the allocation bit of the block physically preceding `bp` from its
/// footer.
#[inline]
pub(crate) fn prev_allocated(mem: &[u8], bp: usize) -> bool {
    word_allocated(read_word(mem, bp - DSIZE))
}

/// Rewrite the header and the footer of the block at `bp`.
///
/// This is the only way the block format is mutated, which keeps the two
/// words bit-identical.
#[inline]
pub(crate) fn set_block(mem: &mut [u8], bp: usize, size: usize, allocated: bool) {
    let word = pack(size, allocated);
    write_word(mem, header_of(bp), word);
    write_word(mem, bp + size - DSIZE, word);
}

/// Flip the allocation bit of the block at `bp`, keeping its size.
#[inline]
pub(crate) fn set_allocated(mem: &mut [u8], bp: usize, allocated: bool) {
    let size = block_size(mem, bp);
    set_block(mem, bp, size, allocated);
}

/// Write the zero-size epilogue header that begins at `hdr`.
#[inline]
pub(crate) fn set_epilogue(mem: &mut [u8], hdr: usize) {
    write_word(mem, hdr, pack(0, true));
}

#[inline]
fn decode_link(word: usize) -> Option<usize> {
    if word == 0 {
        None
    } else {
        Some(word)
    }
}

/// Read the `prev_free` link embedded in a free block's payload.
#[inline]
pub(crate) fn prev_free(mem: &[u8], bp: usize) -> Option<usize> {
    decode_link(read_word(mem, bp))
}

/// Read the `next_free` link embedded in a free block's payload.
#[inline]
pub(crate) fn next_free(mem: &[u8], bp: usize) -> Option<usize> {
    decode_link(read_word(mem, bp + WSIZE))
}

#[inline]
pub(crate) fn set_prev_free(mem: &mut [u8], bp: usize, link: Option<usize>) {
    write_word(mem, bp, link.unwrap_or(0));
}

#[inline]
pub(crate) fn set_next_free(mem: &mut [u8], bp: usize, link: Option<usize>) {
    write_word(mem, bp + WSIZE, link.unwrap_or(0));
}

/// Round a request of `n` payload bytes up to a block size that includes the
/// header and footer and honors the double-word alignment.
///
/// Returns `None` if the result is not representable.
#[inline]
pub fn adjusted_size(n: usize) -> Option<usize> {
    if n <= DSIZE {
        Some(MIN_BLOCK_SIZE)
    } else {
        Some(n.checked_add(OVERHEAD + DSIZE - 1)? & !(DSIZE - 1))
    }
}

/// Round `n` up to a multiple of `align`, which must be a power of two.
#[inline]
pub(crate) fn align_up(n: usize, align: usize) -> Option<usize> {
    debug_assert!(align.is_power_of_two());
    Some(n.checked_add(align - 1)? & !(align - 1))
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;
    use std::vec;

    #[test]
    fn pack_keeps_size_and_flag_apart() {
        let word = pack(48, true);
        assert_eq!(word_size(word), 48);
        assert!(word_allocated(word));

        let word = pack(48, false);
        assert_eq!(word_size(word), 48);
        assert!(!word_allocated(word));
    }

    #[test]
    fn adjusted_size_covers_overhead() {
        assert_eq!(adjusted_size(1), Some(MIN_BLOCK_SIZE));
        assert_eq!(adjusted_size(DSIZE), Some(MIN_BLOCK_SIZE));
        assert_eq!(adjusted_size(DSIZE + 1), Some(3 * DSIZE));
        assert_eq!(adjusted_size(100), Some(align_up(100 + OVERHEAD, DSIZE).unwrap()));
        assert_eq!(adjusted_size(usize::MAX - 4), None);

        for n in 1..1000 {
            let size = adjusted_size(n).unwrap();
            assert_eq!(size % DSIZE, 0);
            assert!(size >= n + OVERHEAD);
            assert!(size >= MIN_BLOCK_SIZE);
        }
    }

    #[test]
    fn header_and_footer_are_written_together() {
        let mut mem = vec![0u8; 8 * DSIZE];
        let bp = DSIZE;
        set_block(&mut mem, bp, 3 * DSIZE, false);

        assert_eq!(read_word(&mem, header_of(bp)), read_word(&mem, footer_of(&mem, bp)));
        assert_eq!(block_size(&mem, bp), 3 * DSIZE);
        assert!(!is_allocated(&mem, bp));

        set_allocated(&mut mem, bp, true);
        assert_eq!(read_word(&mem, header_of(bp)), read_word(&mem, footer_of(&mem, bp)));
        assert!(is_allocated(&mem, bp));
        assert_eq!(block_size(&mem, bp), 3 * DSIZE);
    }

    #[test]
    fn physical_neighbors() {
        let mut mem = vec![0u8; 8 * DSIZE];
        let a = DSIZE;
        set_block(&mut mem, a, 2 * DSIZE, true);
        let b = next_physical(&mem, a);
        assert_eq!(b, a + 2 * DSIZE);
        set_block(&mut mem, b, 3 * DSIZE, false);

        assert_eq!(prev_physical(&mem, b), a);
        assert_eq!(next_physical(&mem, b), b + 3 * DSIZE);
    }

    #[test]
    fn free_links_round_trip() {
        let mut mem = vec![0u8; 4 * DSIZE];
        let bp = DSIZE;
        assert_eq!(prev_free(&mem, bp), None);
        assert_eq!(next_free(&mem, bp), None);

        set_prev_free(&mut mem, bp, Some(160));
        set_next_free(&mut mem, bp, Some(320));
        assert_eq!(prev_free(&mem, bp), Some(160));
        assert_eq!(next_free(&mem, bp), Some(320));

        set_next_free(&mut mem, bp, None);
        assert_eq!(next_free(&mem, bp), None);
    }

    #[test]
    fn try_read_word_is_bounds_checked() {
        let mem = vec![0u8; 2 * WSIZE];
        assert_eq!(try_read_word(&mem, 0), Some(0));
        assert_eq!(try_read_word(&mem, WSIZE), Some(0));
        assert_eq!(try_read_word(&mem, WSIZE + 1), None);
        assert_eq!(try_read_word(&mem, usize::MAX), None);
    }
}
