// SPDX-License-Identifier: MIT OR Apache-2.0
/*!
A tiny exclusive spinlock.

Used wherever the crate guards a small value that is read and written from arbitrary threads:
the logger's registration set, a managed file's quota cell and the diagnostic destination.
Critical sections must stay short (clone an `Arc`, copy a struct, push onto a vec, enqueue a
job) and must never block.
*/

use std::cell::UnsafeCell;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering::{Acquire, Relaxed, Release};

pub(crate) struct Spinlock<T> {
    data: UnsafeCell<T>,
    locked: AtomicBool,
}

unsafe impl<T: Send> Send for Spinlock<T> {}
unsafe impl<T: Send> Sync for Spinlock<T> {}

/// Releases the lock on drop, so a panicking closure does not wedge every other thread.
struct Unlock<'a>(&'a AtomicBool);

impl Drop for Unlock<'_> {
    fn drop(&mut self) {
        self.0.store(false, Release);
    }
}

impl<T> Spinlock<T> {
    pub(crate) const fn new(data: T) -> Self {
        Spinlock {
            data: UnsafeCell::new(data),
            locked: AtomicBool::new(false),
        }
    }

    fn lock(&self) -> Unlock<'_> {
        while self
            .locked
            .compare_exchange_weak(false, true, Acquire, Relaxed)
            .is_err()
        {
            // spin on a plain load to keep the cache line shared while contended
            while self.locked.load(Relaxed) {
                std::hint::spin_loop();
            }
        }
        Unlock(&self.locked)
    }

    pub(crate) fn with_mut<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&mut T) -> R,
    {
        let _unlock = self.lock();
        // SAFETY: the lock is held until `_unlock` drops, so access is exclusive.
        unsafe { f(&mut *self.data.get()) }
    }

    pub(crate) fn with<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&T) -> R,
    {
        let _unlock = self.lock();
        // SAFETY: as above.
        unsafe { f(&*self.data.get()) }
    }

    pub(crate) fn replace(&self, value: T) -> T {
        self.with_mut(|data| std::mem::replace(data, value))
    }
}

impl<T: Clone> Spinlock<T> {
    pub(crate) fn snapshot(&self) -> T {
        self.with(|data| data.clone())
    }
}

impl<T> std::fmt::Debug for Spinlock<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Spinlock")
            .field("locked", &self.locked.load(Relaxed))
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::Spinlock;
    use std::sync::Arc;

    #[test]
    fn concurrent_increments_are_not_lost() {
        let lock = Arc::new(Spinlock::new(0u64));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let lock = lock.clone();
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        lock.with_mut(|v| *v += 1);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(lock.snapshot(), 8000);
    }

    #[test]
    fn panic_releases_lock() {
        let lock = Arc::new(Spinlock::new(vec![1]));
        let cloned = lock.clone();
        let result = std::thread::spawn(move || {
            cloned.with_mut(|_| panic!("boom"));
        })
        .join();
        assert!(result.is_err());
        assert_eq!(lock.replace(vec![2]), vec![1]);
        assert_eq!(lock.snapshot(), vec![2]);
    }
}
