//! Boundary-tag coalescing.
use crate::{
    block::{self, block_size, is_allocated, next_physical, prev_physical},
    class::SizeClasses,
};

/// Merge the free, unlisted block `bp` with its free physical neighbors.
///
/// The neighbors absorbed are removed from their free lists. Returns the
/// merged block, which is also left unlisted.
///
/// The prologue and the epilogue are always allocated, so `bp` never merges
/// across them.
pub(crate) fn coalesce(mem: &mut [u8], classes: &mut SizeClasses, bp: usize) -> usize {
    debug_assert!(!is_allocated(mem, bp));

    let next = next_physical(mem, bp);
    let prev_free = !block::prev_allocated(mem, bp);
    let next_free = !is_allocated(mem, next);
    let size = block_size(mem, bp);

    match (prev_free, next_free) {
        (false, false) => bp,
        (false, true) => {
            let size = size + block_size(mem, next);
            classes.remove(mem, next);
            block::set_block(mem, bp, size, false);
            bp
        }
        (true, false) => {
            let prev = prev_physical(mem, bp);
            let size = size + block_size(mem, prev);
            classes.remove(mem, prev);
            block::set_block(mem, prev, size, false);
            prev
        }
        (true, true) => {
            let prev = prev_physical(mem, bp);
            let size = size + block_size(mem, prev) + block_size(mem, next);
            classes.remove(mem, prev);
            classes.remove(mem, next);
            block::set_block(mem, prev, size, false);
            prev
        }
    }
}

/// Coalesce `bp` until the merged block stops growing, then list the result.
///
/// Returns the final block.
pub(crate) fn coalesce_and_insert(mem: &mut [u8], classes: &mut SizeClasses, bp: usize) -> usize {
    let mut bp = bp;
    let mut size = block_size(mem, bp);
    loop {
        let merged = coalesce(mem, classes, bp);
        let merged_size = block_size(mem, merged);
        bp = merged;
        if merged_size <= size {
            break;
        }
        log::trace!("coalesced into {:#x} ({} bytes)", bp, merged_size);
        size = merged_size;
    }
    classes.insert(mem, bp);
    bp
}
