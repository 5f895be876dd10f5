//! A cell that may only be initialized once, for the few pieces of global
//! state this crate needs (the frame allocator singleton, mainly).

use core::cell::OnceCell;
use core::ops::Deref;

/// A cell that must be initialized once, during kernel bring-up, before
/// any access.
///
/// If a value is available at construction time, prefer passing it
/// explicitly instead; this exists for statics that genuinely cannot be
/// built until the board/boot sequence runs.
pub struct InitCell<T> {
    cell: OnceCell<T>,
}

impl<T> InitCell<T> {
    /// Creates a new, empty cell.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            cell: OnceCell::new(),
        }
    }

    /// Sets the contents of the cell to `value`.
    ///
    /// # Panics
    ///
    /// Panics if the cell has already been set.
    pub fn set(&self, value: T) {
        assert!(
            self.cell.set(value).is_ok(),
            "should only write once to an InitCell"
        );
    }
}

impl<T> Default for InitCell<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Deref for InitCell<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        self.cell
            .get()
            .expect("InitCell should be initialized before access")
    }
}

// SAFETY: callers are required to finish `set` before any concurrent
// thread starts reading, same contract as the rest of this crate's
// single-core assumption (see Non-goals).
unsafe impl<T> Sync for InitCell<T> {}
