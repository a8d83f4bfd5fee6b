use parking_lot::{Mutex, MutexGuard};
use std::ops::{Deref, DerefMut};

/// Two mutexes that are only ever taken in one order.
///
/// The outer lock is reached through [`OrderedLocks::outer`], and the inner
/// lock can then be taken from the returned guard. Code holding only the
/// inner lock goes through [`OrderedLocks::inner`] and must drop it before
/// taking the outer one.
pub(crate) struct OrderedLocks<O, I> {
    outer: Mutex<O>,
    inner: Mutex<I>,
}

impl<O, I> OrderedLocks<O, I> {
    pub fn new(outer: O, inner: I) -> Self {
        Self {
            outer: Mutex::new(outer),
            inner: Mutex::new(inner),
        }
    }

    pub fn outer(&self) -> OuterGuard<'_, O, I> {
        OuterGuard {
            guard: self.outer.lock(),
            inner: &self.inner,
        }
    }

    pub fn inner(&self) -> MutexGuard<'_, I> {
        self.inner.lock()
    }
}

/// Outer lock held; hands out the inner lock on demand
pub(crate) struct OuterGuard<'a, O, I> {
    guard: MutexGuard<'a, O>,
    inner: &'a Mutex<I>,
}

impl<'a, O, I> OuterGuard<'a, O, I> {
    /// The returned guard does not borrow `self`, so the outer state stays
    /// usable while both are held.
    pub fn inner(&self) -> MutexGuard<'a, I> {
        self.inner.lock()
    }
}

impl<O, I> Deref for OuterGuard<'_, O, I> {
    type Target = O;

    fn deref(&self) -> &O {
        &self.guard
    }
}

impl<O, I> DerefMut for OuterGuard<'_, O, I> {
    fn deref_mut(&mut self) -> &mut O {
        &mut self.guard
    }
}
