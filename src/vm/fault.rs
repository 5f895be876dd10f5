//! C5: the TLB-miss fault handler — the hot path every user memory
//! access that misses the hardware TLB takes.

use super::address_space::AddressSpace;
use super::pte::Pte;
use super::tlb;
use crate::arch::Tlb;
use crate::error::{VmError, VmResult};
use crate::frame::FrameAllocator;
use num_derive::FromPrimitive;
use num_traits::FromPrimitive as _;

/// The kind of fault the trap dispatcher decoded and is asking this
/// crate to service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive)]
pub enum FaultKind {
    /// A store landed on a mapped page whose DIRTY bit is clear: a
    /// genuine permission violation, never a refill opportunity.
    ReadOnly = 0,
    /// A load missed the TLB.
    Read = 1,
    /// A store missed the TLB.
    Write = 2,
}

impl FaultKind {
    /// Decodes a raw MIPS trap-cause code into a `FaultKind`, the same
    /// `num_derive::FromPrimitive` pattern the board's hardware-register
    /// bitfields use to decode other hardware-encoded enums.
    ///
    /// The hardware hands the trap dispatcher an unchecked cause code;
    /// by the time a `FaultKind` value exists, it is known good, so
    /// [`vm_fault`] itself never needs to reject one. An out-of-range
    /// `cause` is this crate's only `Einval` case for the fault path.
    ///
    /// # Errors
    ///
    /// Returns [`VmError::Einval`] if `cause` does not match a known
    /// fault kind.
    pub fn from_trap_cause(cause: i32) -> VmResult<Self> {
        Self::from_i32(cause).ok_or(VmError::Einval)
    }
}

/// Services a TLB miss (or a `ReadOnly` permission fault) for
/// `fault_vaddr`.
///
/// `address_space` stands in for the kernel's "current process" lookup:
/// process and thread management are out of this crate's scope (see
/// `spec.md` §1's Out of scope list), so the trap dispatcher passes the
/// faulting thread's currently loaded address space directly, or `None`
/// if no process is running yet — an early-boot trap, which is a kernel
/// bug rather than a user fault.
///
/// Returns `0` on success, or one of the kernel's standard errno values
/// (`EFAULT`/`EINVAL`/`ENOMEM`, see [`crate::error`]) on failure, to
/// match the C-style ABI this function is bound into as the trap
/// dispatcher's fault-handling entry point. Internally the work is done
/// in terms of [`VmResult`] and converted to an errno only here, at the
/// outermost boundary.
#[must_use]
pub fn vm_fault(
    kind: FaultKind,
    fault_vaddr: u32,
    address_space: Option<&mut AddressSpace>,
    allocator: &dyn FrameAllocator,
    hw_tlb: &dyn Tlb,
) -> i32 {
    match try_vm_fault(kind, fault_vaddr, address_space, allocator, hw_tlb) {
        Ok(()) => 0,
        Err(err) => err.errno(),
    }
}

/// The fallible core of [`vm_fault`], kept separate so the fault path's
/// logic can be asserted against with `Result`-returning test helpers
/// instead of raw errno integers.
///
/// # Errors
///
/// - [`VmError::Efault`] if `kind` is [`FaultKind::ReadOnly`], if there
///   is no current address space, or if `fault_vaddr` falls outside
///   every region the current address space has defined.
/// - [`VmError::Enomem`] if the frame allocator has no frames left.
fn try_vm_fault(
    kind: FaultKind,
    fault_vaddr: u32,
    address_space: Option<&mut AddressSpace>,
    allocator: &dyn FrameAllocator,
    hw_tlb: &dyn Tlb,
) -> VmResult<()> {
    if kind == FaultKind::ReadOnly {
        // A write reached a mapped, non-DIRTY page: the region's
        // permissions forbid writing here. Never a refill opportunity.
        crate::log!("vm_fault: readonly fault at {:#010x}", fault_vaddr);
        return Err(VmError::Efault);
    }

    let space = address_space.ok_or(VmError::Efault)?;

    if let Some(pte) = space.page_table().lookup(fault_vaddr) {
        crate::log!("vm_fault: tlb refill at {:#010x}", fault_vaddr);
        tlb::program(hw_tlb, fault_vaddr, pte);
        return Ok(());
    }

    let region = space.regions().find(fault_vaddr).ok_or_else(|| {
        crate::log!("vm_fault: {:#010x} is outside every defined region", fault_vaddr);
        VmError::Efault
    })?;
    let writable = region.permissions.writable;

    let frame = allocator.alloc_frame().ok_or(VmError::Enomem)?;
    // SAFETY: `frame` was just allocated and is not yet referenced by
    // any page table or TLB entry, so nothing else can observe its
    // stale contents before the zero-fill below completes.
    unsafe {
        allocator.zero_frame(frame);
    }

    let pte = Pte::mapped(frame.physical_address(), writable);
    space.page_table_mut().insert(fault_vaddr, pte);
    crate::log!(
        "vm_fault: mapped new frame {:#010x} at {:#010x} (writable={})",
        frame.physical_address(),
        fault_vaddr,
        writable
    );

    tlb::program(hw_tlb, fault_vaddr, pte);
    Ok(())
}
