//! C3: the per-process address space, owning a page table and a region
//! list.

use super::page_table::PageTable;
use super::pte::Pte;
use super::region::{Permissions, RegionList};
use crate::arch::{IplGuard, Tlb, NUM_TLB, PAGE_SIZE, STACK_NPAGES, USERSTACK};
use crate::error::{VmError, VmResult};
use crate::frame::{Frame, FrameAllocator};

/// A process's virtual address space: the page table backing its
/// mappings, plus the region list describing which ranges are legal to
/// fault on and with what permissions.
///
/// Two address spaces never share a frame (no Non-goal-violating COW or
/// shared memory), so `copy` always allocates fresh frames and `destroy`
/// always frees every frame this address space still maps.
pub struct AddressSpace {
    page_table: PageTable,
    regions: RegionList,
    active: bool,
}

impl AddressSpace {
    /// Creates an empty address space with no regions and no mappings.
    #[must_use]
    pub fn create() -> Self {
        Self {
            page_table: PageTable::new(),
            regions: RegionList::new(),
            active: false,
        }
    }

    #[must_use]
    pub fn regions(&self) -> &RegionList {
        &self.regions
    }

    pub fn regions_mut(&mut self) -> &mut RegionList {
        &mut self.regions
    }

    #[must_use]
    pub fn page_table(&self) -> &PageTable {
        &self.page_table
    }

    pub fn page_table_mut(&mut self) -> &mut PageTable {
        &mut self.page_table
    }

    /// Defines a region within this address space, page-aligning
    /// `vaddr` down and `vaddr + memsize` up. See
    /// [`RegionList::define_region`].
    pub fn define_region(
        &mut self,
        vaddr: u32,
        memsize: u32,
        permissions: Permissions,
    ) -> VmResult<()> {
        self.regions.define_region(vaddr, memsize, permissions)
    }

    /// Defines this address space's fixed-size user stack: `{R, W}`,
    /// [`STACK_NPAGES`] pages, ending exactly at [`USERSTACK`]. Returns
    /// the initial stack pointer (`USERSTACK`) for the caller to hand to
    /// the new process's initial register set.
    pub fn define_stack(&mut self) -> VmResult<u32> {
        let npages = STACK_NPAGES as u32;
        let vbase = USERSTACK - npages * PAGE_SIZE as u32;
        self.regions.define_stack(vbase, npages)?;
        Ok(USERSTACK)
    }

    /// Deep-copies this address space: every mapped frame is duplicated
    /// into a freshly allocated frame (never shared), and the region
    /// list and page-table structure are cloned alongside it. Used to
    /// implement process fork.
    ///
    /// On any allocation failure, the partially built copy is fully
    /// destroyed before the error is returned, so a failed fork never
    /// leaks frames.
    pub fn copy(&self, allocator: &dyn FrameAllocator) -> VmResult<Self> {
        let mut new_space = Self::create();
        for region in self.regions.iter() {
            new_space
                .regions
                .define_region_pages(region.vbase, region.npages, region.permissions)
                .expect("copying a valid region list should never overlap");
        }

        for region in self.regions.iter() {
            for page in 0..region.npages {
                let vaddr = region.vbase + page * PAGE_SIZE as u32;
                let Some(pte) = self.page_table.lookup(vaddr) else {
                    continue;
                };
                let Some(frame) = allocator.alloc_frame() else {
                    new_space.destroy(allocator);
                    return Err(VmError::Enomem);
                };
                let old_frame = Frame::from_physical_address(pte.frame_address());
                // SAFETY: `frame` was just allocated and is not yet
                // referenced by any page table or TLB entry; `old_frame`
                // is still owned by `self`, which outlives this call.
                unsafe {
                    allocator.copy_frame(old_frame, frame);
                }
                new_space
                    .page_table
                    .insert(vaddr, Pte::mapped(frame.physical_address(), pte.dirty()));
            }
        }

        Ok(new_space)
    }

    /// Releases every frame this address space still maps back to
    /// `allocator`. The address space itself (its `Box`ed page tables)
    /// is reclaimed when it is dropped.
    pub fn destroy(self, allocator: &dyn FrameAllocator) {
        for frame_address in self.page_table.mapped_frames() {
            let frame = crate::frame::Frame::from_index(frame_address >> 12);
            // SAFETY: this address space is being destroyed, so no TLB
            // entry or page table can still reference `frame` once this
            // loop finishes (the caller is responsible for having
            // deactivated and TLB-invalidated beforehand).
            unsafe { allocator.free_frame(frame) };
        }
    }

    /// Marks this address space as the one currently loaded, invalidating
    /// every hardware TLB entry so nothing from whatever ran before can
    /// be reused for a different address space.
    ///
    /// Writes `TLBHI_INVALID(i), TLBLO_INVALID()` into every TLB slot
    /// with interrupts raised to splhigh for the duration of the loop,
    /// matching `os/161`'s `as_activate`.
    pub fn activate(&mut self, tlb: &dyn Tlb) {
        invalidate_tlb(tlb);
        self.active = true;
    }

    /// Marks this address space as no longer active, invalidating the
    /// TLB so nothing of this address space's mappings survives for
    /// whatever runs next (matches `os/161`'s `as_deactivate`, which is
    /// just `as_activate` with no address space to install).
    pub fn deactivate(&mut self, tlb: &dyn Tlb) {
        invalidate_tlb(tlb);
        self.active = false;
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active
    }
}

impl Default for AddressSpace {
    fn default() -> Self {
        Self::create()
    }
}

/// Invalidates every hardware TLB entry, with interrupts raised to
/// splhigh for the duration of the loop. Shared by `activate` and
/// `deactivate` (spec.md §4.3) and by `complete_load` (spec.md §4.4),
/// which all need the same full-TLB flush.
pub(crate) fn invalidate_tlb(tlb: &dyn Tlb) {
    let _guard = IplGuard::new();
    for index in 0..NUM_TLB {
        tlb.write_index(
            index,
            crate::arch::tlbhi_invalid(index),
            crate::arch::tlblo_invalid(),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arch::RecordingTlb;
    use crate::frame::BitmapFrameAllocator;

    #[test]
    fn fresh_address_space_has_no_regions() {
        let space = AddressSpace::create();
        assert!(space.regions().iter().next().is_none());
    }

    #[test]
    fn define_region_rejects_no_permissions() {
        let mut space = AddressSpace::create();
        let no_perms = Permissions {
            readable: false,
            writable: false,
            executable: false,
        };
        assert_eq!(
            space.define_region(0x1000, PAGE_SIZE as u32, no_perms),
            Err(VmError::Einval)
        );
        assert!(space.regions().find(0x1000).is_none());
    }

    #[test]
    fn copy_duplicates_mappings_into_distinct_frames() {
        let allocator = BitmapFrameAllocator::new(crate::frame::Frame::from_index(0), 4);
        let mut space = AddressSpace::create();
        space
            .define_region(0x1000, PAGE_SIZE as u32, Permissions::READ_WRITE)
            .unwrap();
        let frame = allocator.alloc_frame().unwrap();
        space
            .page_table_mut()
            .insert(0x1000, Pte::mapped(frame.physical_address(), true));
        // SAFETY: `frame` is allocated and not aliased.
        unsafe {
            allocator.frame_contents_mut(frame)[0] = 0x42;
        }

        let copied = space.copy(&allocator).unwrap();
        let original_pte = space.page_table().lookup(0x1000).unwrap();
        let copied_pte = copied.page_table().lookup(0x1000).unwrap();
        assert_ne!(original_pte.frame_address(), copied_pte.frame_address());
        assert_eq!(copied.regions().find(0x1000).unwrap().npages, 1);

        let copied_frame = crate::frame::Frame::from_physical_address(copied_pte.frame_address());
        // SAFETY: both frames are allocated and not aliased.
        unsafe {
            assert_eq!(allocator.frame_contents_mut(copied_frame)[0], 0x42);
            allocator.frame_contents_mut(copied_frame)[0] = 0x99;
            assert_eq!(allocator.frame_contents_mut(frame)[0], 0x42, "parent frame unaffected by write through child's copy");
        }
    }

    #[test]
    fn copy_failure_destroys_partial_copy_without_leaking() {
        // Only one free frame beyond what the parent already holds, but
        // the parent maps two pages: the second allocation in `copy`
        // must fail, and the first frame it *did* allocate must be
        // returned to the allocator rather than leaked.
        let allocator = BitmapFrameAllocator::new(crate::frame::Frame::from_index(0), 2);
        let mut space = AddressSpace::create();
        space
            .define_region(0x1000, 2 * PAGE_SIZE as u32, Permissions::READ_WRITE)
            .unwrap();
        let parent_frame = allocator.alloc_frame().unwrap();
        space
            .page_table_mut()
            .insert(0x1000, Pte::mapped(parent_frame.physical_address(), true));
        space
            .page_table_mut()
            .insert(0x2000, Pte::mapped(parent_frame.physical_address(), true));

        assert!(matches!(space.copy(&allocator), Err(VmError::Enomem)));
        // The one remaining free frame should still be free: `copy`'s
        // partial allocation must have been released, not leaked.
        let reclaimed = allocator.alloc_frame();
        assert!(reclaimed.is_some());
    }

    #[test]
    fn destroy_frees_every_mapped_frame() {
        let allocator = BitmapFrameAllocator::new(crate::frame::Frame::from_index(0), 1);
        let mut space = AddressSpace::create();
        let frame = allocator.alloc_frame().unwrap();
        space
            .page_table_mut()
            .insert(0x1000, Pte::mapped(frame.physical_address(), true));
        assert!(allocator.alloc_frame().is_none());

        space.destroy(&allocator);
        assert!(allocator.alloc_frame().is_some());
    }

    #[test]
    fn define_stack_spans_stack_npages_below_userstack() {
        let mut space = AddressSpace::create();
        let stack_ptr = space.define_stack().unwrap();
        assert_eq!(stack_ptr, crate::arch::USERSTACK);

        let region = space
            .regions()
            .find(crate::arch::USERSTACK - 4)
            .expect("a fault just below USERSTACK should land in the stack region");
        assert_eq!(
            region.vbase,
            crate::arch::USERSTACK - crate::arch::STACK_NPAGES as u32 * PAGE_SIZE as u32
        );
        assert_eq!(region.npages, crate::arch::STACK_NPAGES as u32);
        assert_eq!(region.permissions, Permissions::READ_WRITE);
    }

    #[test]
    fn activate_and_deactivate_flush_every_tlb_slot() {
        let tlb = RecordingTlb::new();
        let mut space = AddressSpace::create();
        assert!(!space.is_active());
        space.activate(&tlb);
        assert!(space.is_active());
        assert_eq!(tlb.writes().len(), crate::arch::NUM_TLB);
        space.deactivate(&tlb);
        assert!(!space.is_active());
        assert_eq!(tlb.writes().len(), 2 * crate::arch::NUM_TLB);
    }
}
