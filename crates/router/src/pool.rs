//! Keyed object pool for per-request buffers.
//!
//! Entries remember the key they were created for (the maximum parameter count of the router at
//! that time). When the key moves, entries created under the old one are dropped instead of being
//! handed out again, so a buffer never comes back too small.

use std::fmt;
use std::mem;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

const DEFAULT_MAX_IDLE: usize = 1024;

/// A value that can be reset and reused.
pub trait Recycle {
    /// Resets the value to its empty state, keeping allocations.
    fn recycle(&mut self);

    /// The key the value was created for.
    fn pool_key(&self) -> usize;
}

/// A free list of recyclable values.
pub struct Pool<T> {
    free: Mutex<Vec<T>>,
    key: AtomicUsize,
    max_idle: usize,
}

impl<T: Recycle> Pool<T> {
    pub fn new(key: usize) -> Self {
        Self::with_max_idle(key, DEFAULT_MAX_IDLE)
    }

    /// Creates a pool keeping at most `max_idle` free values around.
    pub fn with_max_idle(key: usize, max_idle: usize) -> Self {
        Self { free: Mutex::new(Vec::new()), key: AtomicUsize::new(key), max_idle }
    }

    #[inline]
    pub fn key(&self) -> usize {
        self.key.load(Ordering::Acquire)
    }

    /// Moves the pool to a new key. Values created for the previous one are discarded lazily.
    pub fn set_key(&self, key: usize) {
        if self.key.swap(key, Ordering::AcqRel) != key {
            self.lock().clear();
        }
    }

    /// Number of idle values.
    pub fn idle(&self) -> usize {
        self.lock().len()
    }

    /// Takes a free value, or builds one with `make(key)` when none is usable.
    pub fn take_with<F>(&self, make: F) -> T
    where
        F: FnOnce(usize) -> T,
    {
        let key = self.key();
        {
            let mut free = self.lock();
            while let Some(value) = free.pop() {
                if value.pool_key() == key {
                    return value;
                }
            }
        }
        make(key)
    }

    /// Returns a value to the pool. Stale values, and values beyond `max_idle`, are dropped.
    pub fn put(&self, mut value: T) {
        if value.pool_key() != self.key() {
            return;
        }

        value.recycle();
        let mut free = self.lock();
        if free.len() < self.max_idle {
            free.push(value);
        }
    }

    /// Takes a value wrapped in a guard that puts it back when dropped.
    pub fn acquire<F>(&self, make: F) -> Pooled<'_, T>
    where
        T: Default,
        F: FnOnce(usize) -> T,
    {
        Pooled { value: self.take_with(make), pool: self }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<T>> {
        // values are recycled before they are pushed, a poisoned list is still consistent
        self.free.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T> fmt::Debug for Pool<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pool")
            .field("key", &self.key.load(Ordering::Relaxed))
            .field("max_idle", &self.max_idle)
            .finish_non_exhaustive()
    }
}

/// A pooled value, released back to its pool exactly once when the guard is dropped.
///
/// The release runs on every exit path, including a short-circuited chain and an unwinding panic.
pub struct Pooled<'p, T: Recycle + Default> {
    value: T,
    pool: &'p Pool<T>,
}

impl<T: Recycle + Default> Pooled<'_, T> {
    /// Detaches the value from the pool; it will not be put back.
    pub fn into_inner(mut self) -> T {
        let value = mem::take(&mut self.value);
        // skip the release, the placeholder owns nothing worth dropping
        mem::forget(self);
        value
    }
}

impl<T: Recycle + Default> Deref for Pooled<'_, T> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &Self::Target {
        &self.value
    }
}

impl<T: Recycle + Default> DerefMut for Pooled<'_, T> {
    #[inline]
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.value
    }
}

impl<T: Recycle + Default> Drop for Pooled<'_, T> {
    fn drop(&mut self) {
        self.pool.put(mem::take(&mut self.value));
    }
}

impl<T: Recycle + Default + fmt::Debug> fmt::Debug for Pooled<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.value.fmt(f)
    }
}
