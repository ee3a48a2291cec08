//! The size-class table: one doubly-linked free list per power-of-two range
//! of block sizes.
//!
//! Lists are threaded through the free blocks themselves (see
//! [`block::prev_free`] and [`block::next_free`]), so the table only stores
//! the list heads.
use crate::block;

/// The number of size classes.
pub const NUM_CLASSES: usize = 14;

/// The class holding every free block of `2^(MIN_CLASS_LOG2 + OVERFLOW_CLASS)`
/// bytes or more.
pub const OVERFLOW_CLASS: usize = NUM_CLASSES - 1;

/// `log2` of the smallest size covered by class `0`.
const MIN_CLASS_LOG2: u32 = 2;

/// Get the largest power of two not greater than `v`. Returns `0` for `0`.
#[inline]
pub fn prev_power_of_two(v: usize) -> usize {
    if v == 0 {
        0
    } else {
        1 << (usize::BITS - 1 - v.leading_zeros())
    }
}

/// Find the size class listing free blocks of the specified size.
///
/// Class `k` holds sizes in `[2^(k+2), 2^(k+3) - 1]`; [`OVERFLOW_CLASS`] holds
/// everything above.
#[inline]
pub fn class_of(size: usize) -> usize {
    let log2 = usize::BITS - 1 - prev_power_of_two(size.max(1)).leading_zeros();
    (log2.saturating_sub(MIN_CLASS_LOG2) as usize).min(OVERFLOW_CLASS)
}

/// The smallest block size listed in `class`.
#[inline]
pub fn class_min_size(class: usize) -> usize {
    1 << (class as u32 + MIN_CLASS_LOG2)
}

/// The free list heads, indexed by size class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SizeClasses {
    heads: [Option<usize>; NUM_CLASSES],
}

impl SizeClasses {
    pub(crate) const INIT: Self = Self {
        heads: [None; NUM_CLASSES],
    };

    #[inline]
    pub(crate) fn head(&self, class: usize) -> Option<usize> {
        self.heads[class]
    }

    /// Push the free block `bp` to the head of the list matching its size.
    ///
    /// `bp`'s header must already hold its final size, and `bp` must not be
    /// in any list.
    pub(crate) fn insert(&mut self, mem: &mut [u8], bp: usize) {
        let class = class_of(block::block_size(mem, bp));
        let head = self.heads[class].replace(bp);

        block::set_prev_free(mem, bp, None);
        block::set_next_free(mem, bp, head);
        if let Some(head) = head {
            block::set_prev_free(mem, head, Some(bp));
        }
    }

    /// Splice the free block `bp` out of the list matching its size.
    ///
    /// Calling this for a block that isn't listed is a bug in the caller. It's
    /// reported and otherwise ignored.
    pub(crate) fn remove(&mut self, mem: &mut [u8], bp: usize) {
        let class = class_of(block::block_size(mem, bp));
        let prev = block::prev_free(mem, bp);
        let next = block::next_free(mem, bp);

        match prev {
            Some(prev) => block::set_next_free(mem, prev, next),
            None => {
                if self.heads[class] != Some(bp) {
                    log::error!(
                        "removing {:#x} from class {}, whose head is {:?}",
                        bp,
                        class,
                        self.heads[class]
                    );
                    debug_assert!(false, "block {:#x} is not in class {}", bp, class);
                    return;
                }
                self.heads[class] = next;
            }
        }

        if let Some(next) = next {
            block::set_prev_free(mem, next, prev);
        }

        block::set_prev_free(mem, bp, None);
        block::set_next_free(mem, bp, None);
    }

    /// Iterate over the blocks listed in `class`, head first.
    pub(crate) fn iter<'a>(&self, mem: &'a [u8], class: usize) -> FreeList<'a> {
        FreeList {
            mem,
            cur: self.heads[class],
        }
    }
}

/// An iterator over one free list. Created by [`crate::Heap::free_blocks`].
#[derive(Debug, Clone)]
pub struct FreeList<'a> {
    mem: &'a [u8],
    cur: Option<usize>,
}

impl Iterator for FreeList<'_> {
    type Item = usize;

    #[inline]
    fn next(&mut self) -> Option<usize> {
        let bp = self.cur?;
        self.cur = block::next_free(self.mem, bp);
        Some(bp)
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;
    use crate::block::{set_block, DSIZE};
    use std::{vec, vec::Vec};

    #[test]
    fn powers_of_two() {
        assert_eq!(prev_power_of_two(0), 0);
        assert_eq!(prev_power_of_two(1), 1);
        assert_eq!(prev_power_of_two(48), 32);
        assert_eq!(prev_power_of_two(64), 64);
        assert_eq!(prev_power_of_two(usize::MAX), 1 << (usize::BITS - 1));
    }

    #[test]
    fn class_ranges() {
        assert_eq!(class_of(4), 0);
        assert_eq!(class_of(7), 0);
        assert_eq!(class_of(8), 1);
        assert_eq!(class_of(32), 3);
        assert_eq!(class_of(63), 3);
        assert_eq!(class_of(64), 4);
        assert_eq!(class_of(16384), 12);
        assert_eq!(class_of(32767), 12);
        assert_eq!(class_of(32768), OVERFLOW_CLASS);
        assert_eq!(class_of(usize::MAX), OVERFLOW_CLASS);

        for class in 0..OVERFLOW_CLASS {
            assert_eq!(class_of(class_min_size(class)), class);
            assert_eq!(class_of(class_min_size(class + 1) - 1), class);
        }
    }

    /// Lay out free blocks of the given sizes back to back.
    fn arena(sizes: &[usize]) -> (Vec<u8>, Vec<usize>) {
        let total: usize = sizes.iter().sum();
        let mut mem = vec![0u8; total + 2 * DSIZE];
        let mut bp = DSIZE;
        let mut bps = Vec::new();
        for &size in sizes {
            set_block(&mut mem, bp, size, false);
            bps.push(bp);
            bp += size;
        }
        (mem, bps)
    }

    #[test]
    fn insert_pushes_to_head() {
        let (mut mem, bps) = arena(&[48, 48, 48]);
        let mut classes = SizeClasses::INIT;
        for &bp in &bps {
            classes.insert(&mut mem, bp);
        }

        let listed: Vec<usize> = classes.iter(&mem, class_of(48)).collect();
        assert_eq!(listed, [bps[2], bps[1], bps[0]]);
        assert_eq!(block::prev_free(&mem, bps[2]), None);
        assert_eq!(block::prev_free(&mem, bps[1]), Some(bps[2]));
    }

    #[test]
    fn remove_head_middle_tail() {
        let (mut mem, bps) = arena(&[32, 32, 32, 32]);
        let mut classes = SizeClasses::INIT;
        for &bp in &bps {
            classes.insert(&mut mem, bp);
        }
        let class = class_of(32);

        // middle
        classes.remove(&mut mem, bps[1]);
        let listed: Vec<usize> = classes.iter(&mem, class).collect();
        assert_eq!(listed, [bps[3], bps[2], bps[0]]);

        // head
        classes.remove(&mut mem, bps[3]);
        assert_eq!(classes.head(class), Some(bps[2]));
        assert_eq!(block::prev_free(&mem, bps[2]), None);

        // tail
        classes.remove(&mut mem, bps[0]);
        let listed: Vec<usize> = classes.iter(&mem, class).collect();
        assert_eq!(listed, [bps[2]]);

        classes.remove(&mut mem, bps[2]);
        assert_eq!(classes.head(class), None);
    }

    #[test]
    fn classes_are_independent() {
        let (mut mem, bps) = arena(&[32, 64, 128]);
        let mut classes = SizeClasses::INIT;
        for &bp in &bps {
            classes.insert(&mut mem, bp);
        }
        assert_eq!(classes.head(class_of(32)), Some(bps[0]));
        assert_eq!(classes.head(class_of(64)), Some(bps[1]));
        assert_eq!(classes.head(class_of(128)), Some(bps[2]));

        classes.remove(&mut mem, bps[1]);
        assert_eq!(classes.head(class_of(64)), None);
        assert_eq!(classes.head(class_of(32)), Some(bps[0]));
    }
}
