//! Software-managed virtual memory subsystem for a 32-bit, MIPS-like
//! teaching kernel in the style of `os/161`.
//!
//! This crate owns exactly three things: the per-process address space
//! (region list + two-level page table), the TLB-miss fault path that
//! refills the hardware TLB on demand, and the loader hooks that widen
//! permissions while a program image is being written into a fresh
//! address space. Everything else — the frame allocator, the heap, the
//! trap dispatcher, process/thread management, the physical TLB itself —
//! is a collaborator the embedding kernel supplies, modeled here as a
//! trait so the hard logic can be exercised on the host instead of only
//! under QEMU.
//!
//! `#![no_std]` except under `cargo test`: the crate's own test suite
//! runs on the host, since reproducing the teacher kernel's custom
//! `#[test_runner]` boot harness is out of scope for an isolated VM
//! subsystem (see `spec.md` §1's Out of scope list).

#![cfg_attr(not(test), no_std)]
#![warn(clippy::pedantic)]
#![deny(clippy::correctness)]
#![deny(clippy::suspicious)]
#![deny(unsafe_op_in_unsafe_fn)]

extern crate alloc;

pub mod arch;
pub mod cell;
pub mod error;
pub mod frame;
pub mod log;
pub mod sync;
pub mod vm;

/// Performs whatever early setup this subsystem needs before the first
/// fault can be serviced.
///
/// Retained for API symmetry with the rest of the kernel's bootstrap
/// sequence (board init, thread init, ...); this subsystem keeps no
/// global state of its own to initialize, since address spaces, the
/// frame allocator, and the TLB are all supplied explicitly by callers.
pub fn vm_bootstrap() {}

/// Entry point for SMP TLB shootdown requests.
///
/// This kernel never runs on more than one CPU (see `spec.md` §1's
/// Non-goals), so there is no broadcast-IPI protocol to implement here:
/// any call into this function is a kernel bug.
///
/// # Panics
///
/// Always panics.
pub fn vm_tlbshootdown(_request: &vm::ShootdownRequest) -> ! {
    panic!("vm_tlbshootdown: SMP TLB shootdown is not supported on this kernel");
}

/// Convenience re-export so callers mostly need `mipsvm::{vm_fault, ...}`
/// rather than reaching into the `vm` module tree directly.
pub use vm::fault::{vm_fault, FaultKind};
pub use vm::loader::{complete_load, prepare_load};
