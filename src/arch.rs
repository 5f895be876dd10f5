//! Architecture constants and the interrupt-priority-level primitive.
//!
//! The constants below describe a 32-bit, software-TLB-managed MIPS-like
//! processor in the style of `os/161`: `KSEG0`/`KSEG1` live above
//! [`KSEG_BASE`], user space lives below it, and the TLB is entirely
//! software-programmed (there is no hardware page-table walker).

use core::sync::atomic::{AtomicBool, Ordering};

/// Size in bytes of a single page / frame.
pub const PAGE_SIZE: usize = 4096;

/// Mask selecting the frame-number bits of a page-aligned address.
pub const PAGE_FRAME_MASK: u32 = 0xFFFF_F000;

/// Number of entries in a level-1 or level-2 page table.
pub const TABLE_SIZE: usize = 1024;

/// Base of kernel-segment (`kseg0`) addresses; also the address the user
/// stack grows down from.
pub const KSEG_BASE: u32 = 0x8000_0000;

/// Top of the user stack, exclusive.
pub const USERSTACK: u32 = KSEG_BASE;

/// Number of pages reserved for the user stack.
pub const STACK_NPAGES: usize = 16;

/// Number of hardware TLB entries. `os/161` targets define 64.
pub const NUM_TLB: usize = 64;

/// Bit index of the DIRTY (writable) bit in the TLB-entry-low word.
pub const TLBLO_DIRTY_BIT: u32 = 10;

/// Bit index of the VALID bit in the TLB-entry-low word.
pub const TLBLO_VALID_BIT: u32 = 9;

/// Builds an invalid TLB-entry-high word for the given virtual page number,
/// per the `os/161` `TLBHI_INVALID` convention: an unused ASID slot paired
/// with a virtual address guaranteed not to be mapped by any process.
#[must_use]
pub const fn tlbhi_invalid(index: usize) -> u32 {
    // Spread unmapped sentinel addresses across kseg2 so they can never
    // collide with a real user mapping.
    0x8000_0000 | ((index as u32) << 12)
}

/// Builds an invalid TLB-entry-low word: VALID and DIRTY both clear.
#[must_use]
pub const fn tlblo_invalid() -> u32 {
    0
}

/// A hardware TLB, as seen by the VM subsystem.
///
/// Implementations of this trait wrap the actual `tlbwr`/`tlbp`-style
/// instructions of the target processor. The core fault-handling and
/// address-space logic in [`crate::vm`] depends only on this trait, which
/// keeps it testable on a host that has no MIPS TLB at all.
pub trait Tlb {
    /// Writes `(entry_hi, entry_lo)` into a TLB slot chosen by the
    /// hardware's random-replacement policy (`tlbwr`).
    fn write_random(&self, entry_hi: u32, entry_lo: u32);

    /// Writes `(entry_hi, entry_lo)` into TLB slot `index` directly
    /// (`tlbwi`). Used by [`crate::vm::address_space::AddressSpace::activate`]
    /// to invalidate every slot by index, per `os/161`'s `as_activate`.
    fn write_index(&self, index: usize, entry_hi: u32, entry_lo: u32);
}

/// A `Tlb` that records writes instead of touching hardware, for tests.
#[cfg(any(test, feature = "test-support"))]
pub struct RecordingTlb {
    writes: core::cell::RefCell<alloc::vec::Vec<(u32, u32)>>,
}

#[cfg(any(test, feature = "test-support"))]
impl RecordingTlb {
    #[must_use]
    pub fn new() -> Self {
        Self {
            writes: core::cell::RefCell::new(alloc::vec::Vec::new()),
        }
    }

    #[must_use]
    pub fn writes(&self) -> alloc::vec::Vec<(u32, u32)> {
        self.writes.borrow().clone()
    }
}

#[cfg(any(test, feature = "test-support"))]
impl Default for RecordingTlb {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(any(test, feature = "test-support"))]
impl Tlb for RecordingTlb {
    fn write_random(&self, entry_hi: u32, entry_lo: u32) {
        self.writes.borrow_mut().push((entry_hi, entry_lo));
    }

    fn write_index(&self, _index: usize, entry_hi: u32, entry_lo: u32) {
        self.writes.borrow_mut().push((entry_hi, entry_lo));
    }
}

/// Tracks whether interrupts are currently masked at or above splhigh.
///
/// Real `os/161` kernels keep this in the status register; since this
/// crate has no concrete interrupt controller to mask, it models the same
/// observable behavior (nesting, restore-on-drop) with a flag, which is
/// exactly what [`IplGuard`]'s callers need to reason about: the single
/// TLB-write instruction of [`crate::vm::tlb`] must execute with
/// interrupts raised to splhigh.
static INTERRUPTS_DISABLED: AtomicBool = AtomicBool::new(false);

/// Raises the interrupt priority level to `splhigh`, returning whether
/// interrupts were already disabled prior to this call (the old IPL).
///
/// # Safety
///
/// Must be paired with a later call to [`splx`] with the value this
/// function returned, in strict stack order. Prefer [`IplGuard`] over
/// calling this directly.
pub unsafe fn splhigh() -> bool {
    INTERRUPTS_DISABLED.swap(true, Ordering::Acquire)
}

/// Restores the interrupt priority level saved by a prior [`splhigh`] call.
///
/// # Safety
///
/// `was_disabled` must be a value previously returned by [`splhigh`], and
/// calls must nest correctly (LIFO) with their matching `splhigh`.
pub unsafe fn splx(was_disabled: bool) {
    INTERRUPTS_DISABLED.store(was_disabled, Ordering::Release);
}

/// Returns whether interrupts are currently masked.
#[must_use]
pub fn interrupts_disabled() -> bool {
    INTERRUPTS_DISABLED.load(Ordering::Relaxed)
}

/// An RAII guard that raises the IPL to splhigh for its lifetime.
///
/// Grounded in the same masked-critical-section shape as an exception-guard
/// RAII type: acquire on construction, always restore on drop, correct even
/// when guards are nested.
pub struct IplGuard {
    previously_disabled: bool,
}

impl IplGuard {
    /// Raises the IPL to splhigh until the guard is dropped.
    #[must_use]
    pub fn new() -> Self {
        // SAFETY: `previously_disabled` is restored in `Drop`, in the
        // correct nesting order since guards are stack values.
        let previously_disabled = unsafe { splhigh() };
        Self {
            previously_disabled,
        }
    }
}

impl Default for IplGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for IplGuard {
    fn drop(&mut self) {
        // SAFETY: restores exactly the IPL this guard raised from.
        unsafe { splx(self.previously_disabled) };
    }
}
