//! C4: loader hooks.
//!
//! An ELF (or similar) loader writes into segments that are normally
//! read-only or read-execute. Rather than teach the page-table store
//! about a "loading" mode, [`prepare_load`] temporarily widens every
//! region in the address space to `{R, W}` before the loader writes any
//! segment contents (which fault pages in normally through
//! [`super::fault::vm_fault`]), and [`complete_load`] restores each
//! region's original permissions afterward, strips DIRTY from whatever
//! got mapped in along the way, and flushes the TLB so no stale writable
//! entry survives into normal execution.

use super::address_space::{invalidate_tlb, AddressSpace};
use super::region::Permissions;
use crate::arch::Tlb;
use crate::error::{VmError, VmResult};
use alloc::vec::Vec;

/// Widens every region of `space` to `{R, W}`, saving each region's
/// original permissions so [`complete_load`] can restore them.
///
/// Called once, before the loader writes any segment of a freshly
/// created address space.
///
/// # Errors
///
/// Fails with [`VmError::Einval`] if a load is already in progress (a
/// region's permissions are already saved) — calling this twice without
/// an intervening `complete_load` is a loader bug.
pub fn prepare_load(space: &mut AddressSpace) -> VmResult<()> {
    for region in space.regions_mut().iter_mut() {
        if region.saved_permissions.is_some() {
            return Err(VmError::Einval);
        }
        region.saved_permissions = Some(region.permissions);
        region.permissions = Permissions::READ_WRITE;
    }
    Ok(())
}

/// Restores every region of `space` to the permissions it had before
/// [`prepare_load`], clears DIRTY on any page-table entries already
/// mapped within regions that are not writable after restoration, and
/// invalidates the entire TLB so a stale writable entry can never be
/// reused once the loader is done.
///
/// # Errors
///
/// Fails with [`VmError::Einval`] if no load is in progress, or if
/// downgrading a region's mappings crosses into kernel space (would
/// indicate a corrupted region list).
pub fn complete_load(space: &mut AddressSpace, tlb: &dyn Tlb) -> VmResult<()> {
    let mut downgrades: Vec<(u32, u32)> = Vec::new();
    for region in space.regions_mut().iter_mut() {
        let original = region.saved_permissions.take().ok_or(VmError::Einval)?;
        region.permissions = original;
        if !original.writable {
            downgrades.push((region.vbase, region.npages));
        }
    }
    for (vbase, npages) in downgrades {
        space.page_table_mut().update(vbase, npages)?;
    }
    invalidate_tlb(tlb);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arch::{RecordingTlb, PAGE_SIZE};
    use crate::vm::pte::Pte;

    #[test]
    fn load_cycle_widens_then_restores_permissions() {
        let mut space = AddressSpace::create();
        space
            .define_region(0x1000, PAGE_SIZE as u32, Permissions::READ_EXEC)
            .unwrap();

        prepare_load(&mut space).unwrap();
        assert!(space.regions().find(0x1000).unwrap().permissions.writable);

        space
            .page_table_mut()
            .insert(0x1000, Pte::mapped(0x9000, true));

        let tlb = RecordingTlb::new();
        complete_load(&mut space, &tlb).unwrap();
        let region = space.regions().find(0x1000).unwrap();
        assert_eq!(region.permissions, Permissions::READ_EXEC);

        let pte = space.page_table().lookup(0x1000).unwrap();
        assert!(!pte.dirty(), "read-exec segment must end up non-writable");
        assert_eq!(
            tlb.writes().len(),
            crate::arch::NUM_TLB,
            "complete_load must flush the entire TLB"
        );
    }

    #[test]
    fn writable_region_keeps_dirty_bit_after_load() {
        let mut space = AddressSpace::create();
        space
            .define_region(0x1000, PAGE_SIZE as u32, Permissions::READ_WRITE)
            .unwrap();
        prepare_load(&mut space).unwrap();
        space
            .page_table_mut()
            .insert(0x1000, Pte::mapped(0x9000, true));

        let tlb = RecordingTlb::new();
        complete_load(&mut space, &tlb).unwrap();
        assert!(space.page_table().lookup(0x1000).unwrap().dirty());
    }

    #[test]
    fn prepare_load_widens_every_region() {
        let mut space = AddressSpace::create();
        space
            .define_region(0x1000, PAGE_SIZE as u32, Permissions::READ_EXEC)
            .unwrap();
        space
            .define_region(0x2000, PAGE_SIZE as u32, Permissions::READ_ONLY)
            .unwrap();

        prepare_load(&mut space).unwrap();
        assert!(space.regions().find(0x1000).unwrap().permissions.writable);
        assert!(space.regions().find(0x2000).unwrap().permissions.writable);
    }

    #[test]
    fn prepare_load_rejects_reentrant_call() {
        let mut space = AddressSpace::create();
        space
            .define_region(0x1000, PAGE_SIZE as u32, Permissions::READ_ONLY)
            .unwrap();
        prepare_load(&mut space).unwrap();
        assert_eq!(prepare_load(&mut space), Err(VmError::Einval));
    }

    #[test]
    fn complete_load_without_prepare_is_rejected() {
        let mut space = AddressSpace::create();
        space
            .define_region(0x1000, PAGE_SIZE as u32, Permissions::READ_ONLY)
            .unwrap();
        let tlb = RecordingTlb::new();
        assert_eq!(complete_load(&mut space, &tlb), Err(VmError::Einval));
    }
}
