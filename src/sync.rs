//! A minimal spinlock, used to guard the address-space table and the
//! frame allocator's bitmap.

use core::cell::UnsafeCell;
use core::hint::spin_loop;
use core::ops::{Deref, DerefMut};
use core::ptr::NonNull;
use core::sync::atomic::{AtomicBool, Ordering};

/// A spinlock mutex.
pub struct SpinLock<T: ?Sized> {
    is_locked: AtomicBool,
    data: UnsafeCell<T>,
}

// SAFETY: the spinlock guarantees exclusive access to `data` while locked.
unsafe impl<T> Sync for SpinLock<T> {}

impl<T> SpinLock<T> {
    /// Creates a spinlock around the given data.
    #[inline]
    pub const fn new(data: T) -> Self {
        Self {
            data: UnsafeCell::new(data),
            is_locked: AtomicBool::new(false),
        }
    }

    /// Locks the mutex. The mutex is automatically unlocked when the
    /// returned `SpinLockGuard` is dropped.
    #[inline]
    pub fn lock(&self) -> SpinLockGuard<'_, T> {
        while self.is_locked.swap(true, Ordering::Acquire) {
            while self.is_locked.load(Ordering::Relaxed) {
                spin_loop();
            }
        }

        SpinLockGuard(self)
    }

    /// Unlocks the mutex.
    ///
    /// # Safety
    ///
    /// Must only be called by the destructor of the `SpinLockGuard` that
    /// locked this mutex.
    #[inline]
    unsafe fn unlock(&self) {
        self.is_locked.store(false, Ordering::Release);
    }
}

pub struct SpinLockGuard<'locked, T>(&'locked SpinLock<T>);

impl<T> SpinLockGuard<'_, T> {
    const fn get_pointer(&self) -> NonNull<T> {
        // SAFETY: pointers to `data` are never null.
        unsafe { NonNull::new_unchecked(self.0.data.get()) }
    }
}

impl<T> Deref for SpinLockGuard<'_, T> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &Self::Target {
        // SAFETY: holding the guard means we hold the lock.
        unsafe { self.get_pointer().as_ref() }
    }
}

impl<T> DerefMut for SpinLockGuard<'_, T> {
    #[inline]
    fn deref_mut(&mut self) -> &mut Self::Target {
        // SAFETY: holding the guard means we hold the lock exclusively.
        unsafe { self.get_pointer().as_mut() }
    }
}

impl<T> Drop for SpinLockGuard<'_, T> {
    #[inline]
    fn drop(&mut self) {
        // SAFETY: this guard is the one that locked the mutex.
        unsafe { self.0.unlock() };
    }
}
