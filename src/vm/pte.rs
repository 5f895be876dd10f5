//! The page-table-entry bit layout, shared between the software page
//! table (C1) and the TLB-entry-low word written by the TLB programmer
//! (C6): they use the same frame/DIRTY/VALID bit positions.

use crate::arch::{PAGE_FRAME_MASK, TLBLO_DIRTY_BIT, TLBLO_VALID_BIT};
use bitfield_struct::bitfield;

/// A single page-table entry, packed the same way as a TLB-entry-low
/// register: frame number in bits `[31:12]`, DIRTY (writable) at bit 10,
/// VALID at bit 9.
#[bitfield(u32)]
pub struct Pte {
    #[bits(9)]
    __reserved_low: u16,
    pub valid: bool,
    pub dirty: bool,
    #[bits(1)]
    __reserved_gap: u8,
    #[bits(20)]
    pub frame: u32,
}

impl Pte {
    /// An entry with no mapping installed.
    pub const EMPTY: Self = Self::new();

    /// Builds an entry mapping to `frame_address` (a page-aligned
    /// physical address), writable according to `writable`.
    #[must_use]
    pub fn mapped(frame_address: u32, writable: bool) -> Self {
        debug_assert_eq!(
            frame_address & !PAGE_FRAME_MASK,
            0,
            "frame address must be page-aligned"
        );
        Self::new()
            .with_valid(true)
            .with_dirty(writable)
            .with_frame(frame_address >> 12)
    }

    /// Whether this entry currently maps a frame.
    #[must_use]
    pub const fn is_present(self) -> bool {
        self.valid()
    }

    /// The mapped physical frame's base address.
    ///
    /// # Panics
    ///
    /// Panics (in debug builds) if this entry has no mapping.
    #[must_use]
    pub fn frame_address(self) -> u32 {
        debug_assert!(self.is_present());
        self.frame() << 12
    }

    /// Clears the DIRTY (writable) bit, leaving the mapping otherwise
    /// intact. Used to downgrade a page from writable to read-only after
    /// loading, and has no effect the other direction: `update` never
    /// raises DIRTY on its own, only the loader's explicit re-encode does.
    #[must_use]
    pub fn with_dirty_cleared(self) -> Self {
        self.with_dirty(false)
    }

    /// The low word of a TLB entry matching this PTE's mapping.
    #[must_use]
    pub const fn as_tlb_entry_lo(self) -> u32 {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mapped_entry_round_trips_frame_address() {
        let pte = Pte::mapped(0x1234_5000, true);
        assert!(pte.is_present());
        assert!(pte.dirty());
        assert_eq!(pte.frame_address(), 0x1234_5000);
    }

    #[test]
    fn empty_entry_is_not_present() {
        assert!(!Pte::EMPTY.is_present());
    }

    #[test]
    fn clearing_dirty_preserves_mapping() {
        let pte = Pte::mapped(0x1000, true).with_dirty_cleared();
        assert!(pte.is_present());
        assert!(!pte.dirty());
        assert_eq!(pte.frame_address(), 0x1000);
    }

    #[test]
    fn bit_positions_match_tlb_entry_low_layout() {
        let pte = Pte::mapped(0, true);
        assert_eq!(pte.0 & (1 << TLBLO_VALID_BIT), 1 << TLBLO_VALID_BIT);
        assert_eq!(pte.0 & (1 << TLBLO_DIRTY_BIT), 1 << TLBLO_DIRTY_BIT);
    }
}
