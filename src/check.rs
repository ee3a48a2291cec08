//! The heap consistency checker.
use alloc::{collections::BTreeSet, vec::Vec};

use crate::{
    block::{self, pack, try_read_word, word_allocated, word_size, DSIZE, MIN_BLOCK_SIZE, WSIZE},
    class::{class_of, SizeClasses, NUM_CLASSES},
    error::Violation,
};

/// Walk the implicit block list and every free list, collecting everything
/// that is off. Never panics, however broken `mem` is.
pub(crate) fn check(
    mem: &[u8],
    classes: &SizeClasses,
    prologue: usize,
) -> Result<(), Vec<Violation>> {
    let mut violations = Vec::new();

    let prologue_hdr = try_read_word(mem, prologue - WSIZE);
    let prologue_ftr = try_read_word(mem, prologue);
    if prologue_hdr != Some(pack(DSIZE, true)) || prologue_ftr != prologue_hdr {
        violations.push(Violation::BadPrologue(prologue));
    }

    let walk = walk_blocks(mem, prologue + DSIZE, &mut violations);
    let listed = walk_lists(mem, classes, &walk, &mut violations);

    violations.extend(
        walk.free
            .difference(&listed)
            .map(|&bp| Violation::Unlisted(bp)),
    );

    if violations.is_empty() {
        Ok(())
    } else {
        Err(violations)
    }
}

struct Walk {
    free: BTreeSet<usize>,
    allocated: BTreeSet<usize>,
}

/// Walk the blocks in address order, starting from `bp`, up to the epilogue.
fn walk_blocks(mem: &[u8], mut bp: usize, violations: &mut Vec<Violation>) -> Walk {
    let mut walk = Walk {
        free: BTreeSet::new(),
        allocated: BTreeSet::new(),
    };
    let mut prev_free = None;

    loop {
        let Some(header) = try_read_word(mem, bp - WSIZE) else {
            violations.push(Violation::OutOfBounds(bp));
            break;
        };
        let size = word_size(header);

        if size == 0 {
            if !word_allocated(header) || bp != mem.len() {
                violations.push(Violation::EpilogueNotAtEnd {
                    header: bp - WSIZE,
                    heap_end: mem.len(),
                });
            }
            break;
        }

        if bp % DSIZE != 0 {
            violations.push(Violation::Misaligned(bp));
        }
        if size < MIN_BLOCK_SIZE {
            violations.push(Violation::TooSmall { block: bp, size });
        }

        // The next block's header must be in bounds too
        let Some(end) = bp.checked_add(size).filter(|&end| end <= mem.len()) else {
            violations.push(Violation::OutOfBounds(bp));
            break;
        };
        let footer = block::read_word(mem, end - DSIZE);
        if footer != header {
            violations.push(Violation::HeaderFooterMismatch {
                block: bp,
                header,
                footer,
            });
        }

        if word_allocated(header) {
            walk.allocated.insert(bp);
            prev_free = None;
        } else {
            if let Some(prev) = prev_free {
                violations.push(Violation::Uncoalesced(prev, bp));
            }
            walk.free.insert(bp);
            prev_free = Some(bp);
        }

        bp = end;
    }

    walk
}

/// Follow every free list. Returns the set of blocks reached.
fn walk_lists(
    mem: &[u8],
    classes: &SizeClasses,
    walk: &Walk,
    violations: &mut Vec<Violation>,
) -> BTreeSet<usize> {
    let mut listed = BTreeSet::new();

    for class in 0..NUM_CLASSES {
        let mut expected_prev = None;
        let mut cur = classes.head(class);

        while let Some(bp) = cur {
            if !walk.free.contains(&bp) {
                // The links can't be trusted beyond this point
                violations.push(if walk.allocated.contains(&bp) {
                    Violation::ListedAllocated { class, block: bp }
                } else {
                    Violation::StrayLink { class, link: bp }
                });
                break;
            }
            if !listed.insert(bp) {
                // Also catches cycles
                violations.push(Violation::ListedTwice(bp));
                break;
            }

            let prev = block::prev_free(mem, bp);
            match expected_prev {
                None if prev.is_some() => {
                    violations.push(Violation::HeadHasPrev { class, block: bp });
                }
                Some(_) if prev != expected_prev => {
                    violations.push(Violation::BrokenBackLink {
                        block: bp,
                        found: prev,
                        expected: expected_prev,
                    });
                }
                _ => {}
            }

            let expected = class_of(block::block_size(mem, bp));
            if expected != class {
                violations.push(Violation::WrongClass {
                    class,
                    block: bp,
                    expected,
                });
            }

            expected_prev = Some(bp);
            cur = block::next_free(mem, bp);
        }
    }

    listed
}
