use alloc::vec::Vec;
use core::ops;

use parking_lot::Mutex;

use crate::{Config, Heap, HeapSource, InitError, Misuse, Ptr, Violation};

/// [`Heap`] guarded by a single mutex, so that it can be shared between
/// threads.
///
/// Every entry point takes the lock for the whole call.
#[derive(Debug)]
pub struct LockedHeap<S> {
    inner: Mutex<Heap<S>>,
}

impl<S: HeapSource> LockedHeap<S> {
    pub fn new(source: S) -> Result<Self, InitError> {
        Ok(Heap::new(source)?.into())
    }

    pub fn with_config(source: S, config: Config) -> Result<Self, InitError> {
        Ok(Heap::with_config(source, config)?.into())
    }

    /// Lock the heap for a series of operations.
    #[inline]
    pub fn lock(&self) -> impl ops::DerefMut<Target = Heap<S>> + '_ {
        self.inner.lock()
    }

    #[inline]
    pub fn allocate(&self, n: usize) -> Option<Ptr> {
        self.inner.lock().allocate(n)
    }

    #[inline]
    pub fn free(&self, ptr: Option<Ptr>) {
        self.inner.lock().free(ptr)
    }

    #[inline]
    pub fn resize(&self, ptr: Option<Ptr>, n: usize) -> Option<Ptr> {
        self.inner.lock().resize(ptr, n)
    }

    /// Run `f` on the payload of a live allocation.
    pub fn with_payload_mut<R>(&self, ptr: Ptr, f: impl FnOnce(&mut [u8]) -> R) -> Option<R> {
        self.inner.lock().payload_mut(ptr).map(f)
    }

    #[inline]
    pub fn check(&self) -> Result<(), Vec<Violation>> {
        self.inner.lock().check()
    }

    #[inline]
    pub fn take_misuse(&self) -> Vec<Misuse> {
        self.inner.lock().take_misuse()
    }

    pub fn into_inner(self) -> Heap<S> {
        self.inner.into_inner()
    }
}

impl<S> From<Heap<S>> for LockedHeap<S> {
    fn from(heap: Heap<S>) -> Self {
        Self {
            inner: Mutex::new(heap),
        }
    }
}
