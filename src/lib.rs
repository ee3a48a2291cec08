//! This crate implements a segregated-fit dynamic memory allocator with
//! boundary-tag coalescing.
//!
//!  - **The heap is a single growable region.** Blocks are carved out of a
//!    contiguous, append-only byte range provided by a [`HeapSource`]. When
//!    no free block fits a request, the region is extended.
//!
//!  - **Addresses are offsets.** A [`Ptr`] is the offset of a payload within
//!    the region, so a source may move its storage as it grows
//!    ([`VecSource`] does).
//!
//!  - **Free blocks are indexed by power-of-two size classes.** Each class
//!    is a doubly-linked list threaded through the free blocks themselves.
//!    A search looks at the first two blocks of the matching class and moves
//!    on to larger classes on a miss.
//!
//!  - **Freed blocks are merged eagerly.** Every block carries its size in a
//!    header and a footer, which lets a freed block find and absorb its free
//!    neighbors in constant time.
//!
//!  - **This crate supports `#![no_std]`.** It only needs `alloc`.
//!
//! The allocator is single-threaded. Wrap it in [`LockedHeap`] (requires the
//! `std` feature) to share it between threads.
//!
//! # Examples
//!
//! ```rust
//! use segalloc::{Heap, VecSource};
//!
//! let mut heap = Heap::new(VecSource::new(1 << 20)).unwrap();
//!
//! let ptr1 = heap.allocate(10).unwrap();
//! let ptr2 = heap.allocate(20).unwrap();
//! heap.payload_mut(ptr1).unwrap()[0] = 42;
//! heap.payload_mut(ptr2).unwrap()[0] = 56;
//! assert_eq!(heap.payload(ptr1).unwrap()[0], 42);
//! assert_eq!(heap.payload(ptr2).unwrap()[0], 56);
//!
//! heap.free(Some(ptr1));
//! heap.free(Some(ptr2));
//! assert_eq!(heap.check(), Ok(()));
//! ```
//!
//! # Details
//!
//! ## Sentinels
//!
//! The region starts with a permanently allocated prologue block and ends
//! with a permanently allocated zero-size epilogue header. Neither is ever
//! merged, so coalescing never has to check whether a neighbor exists.
//!
//! ## Splitting
//!
//! A free block larger than a request is split only if the leftover exceeds
//! [`Config::split_threshold`]; otherwise the whole block is handed out.
//!
#![no_std]
#![cfg_attr(feature = "doc_cfg", feature(doc_cfg))]

extern crate alloc;

#[cfg(any(test, feature = "std"))]
extern crate std;

pub mod block;
mod check;
pub mod class;
mod coalesce;
mod config;
mod error;
mod fit;
mod heap;
pub mod source;

pub use self::{
    config::{Config, MisusePolicy},
    error::{ConfigError, GrowError, InitError, Misuse, Violation},
    heap::{BlockInfo, Blocks, Heap, Ptr},
    source::{HeapSource, VecSource, GRANULARITY},
};

#[cfg(unix)]
pub use self::source::MmapSource;

#[cfg(feature = "std")]
#[cfg_attr(feature = "doc_cfg", doc(cfg(feature = "std")))]
mod sync;
#[cfg(feature = "std")]
pub use self::sync::LockedHeap;
