//! Free block search and splitting.
use crate::{
    block::{self, block_size},
    class::{class_of, SizeClasses, NUM_CLASSES, OVERFLOW_CLASS},
    coalesce::coalesce_and_insert,
};

/// Search the size-class table for a free block of at least `asize` bytes.
///
/// Starting from `asize`'s own class, each class gets a look at its head
/// and, if the head fits, at the head's successor; the smaller one that fits
/// wins, the head winning ties. A class whose head is too small passes the
/// search on to the next larger class. The overflow class has no upper size bound, so it's scanned
/// first-fit instead.
///
/// The found block is removed from its list before being returned.
pub(crate) fn find_fit(mem: &mut [u8], classes: &mut SizeClasses, asize: usize) -> Option<usize> {
    let found = (class_of(asize)..NUM_CLASSES).find_map(|class| {
        if class == OVERFLOW_CLASS {
            classes
                .iter(mem, class)
                .find(|&bp| block_size(mem, bp) >= asize)
        } else {
            two_candidate_fit(mem, classes, class, asize)
        }
    })?;

    log::trace!(
        "fit for {} bytes: {:#x} ({} bytes)",
        asize,
        found,
        block_size(mem, found)
    );
    classes.remove(mem, found);
    Some(found)
}

/// Look at the head of `class`. If it fits, its successor is taken instead
/// when that also fits and is strictly smaller. A head that doesn't fit ends
/// the search in this class.
#[inline]
fn two_candidate_fit(
    mem: &[u8],
    classes: &SizeClasses,
    class: usize,
    asize: usize,
) -> Option<usize> {
    let mut list = classes.iter(mem, class);
    let head = list.next()?;
    let head_size = block_size(mem, head);
    if head_size < asize {
        return None;
    }

    match list.next() {
        Some(second) if (asize..head_size).contains(&block_size(mem, second)) => Some(second),
        _ => Some(head),
    }
}

/// Carve an allocated prefix of exactly `asize` bytes out of the unlisted
/// block `bp` if the leftover would be larger than `threshold`. The leftover
/// is marked free and goes through coalescing.
///
/// If the leftover is too small, `bp` is kept whole. Either way `bp` comes
/// back marked allocated.
pub(crate) fn split(
    mem: &mut [u8],
    classes: &mut SizeClasses,
    bp: usize,
    asize: usize,
    threshold: usize,
) {
    let size = block_size(mem, bp);
    debug_assert!(size >= asize);

    if size - asize <= threshold {
        block::set_block(mem, bp, size, true);
        return;
    }

    block::set_block(mem, bp, asize, true);
    let rest = bp + asize;
    block::set_block(mem, rest, size - asize, false);
    log::trace!(
        "split {:#x}: {} + {} bytes",
        bp,
        asize,
        size - asize
    );
    coalesce_and_insert(mem, classes, rest);
}
