//! The virtual memory subsystem: per-process address spaces (C3), their
//! two-level page table (C1) and region list (C2), the loader hooks that
//! widen permissions during program load (C4), the TLB-miss fault path
//! (C5), and the masked-interrupt TLB programmer it refills through
//! (C6).
//!
//! Everything in this module tree operates on explicitly passed-in
//! collaborators (a [`crate::frame::FrameAllocator`], a
//! [`crate::arch::Tlb`], the calling thread's current
//! [`address_space::AddressSpace`]) rather than reaching into kernel
//! globals, so the whole fault path can run and be asserted against on
//! the host.

pub mod address_space;
pub mod fault;
pub mod loader;
pub mod page_table;
pub mod pte;
pub mod region;
pub mod tlb;

/// A request to invalidate a translation on every other CPU in the
/// system.
///
/// Never constructed: this kernel never runs on more than one CPU (see
/// `lib.rs`'s [`crate::vm_tlbshootdown`]), so there is no sender that
/// could build one. The field mirrors what a real shootdown request
/// would need to carry — the virtual page whose translation is going
/// stale — so that porting to SMP means filling in a protocol, not
/// inventing a payload.
#[derive(Debug, Clone, Copy)]
pub struct ShootdownRequest {
    pub vaddr: u32,
}
