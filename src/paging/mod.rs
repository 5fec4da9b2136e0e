//! Translation machinery: the entry points that decompose a virtual address, the walker that
//! descends the page-table tree (faulting frames in as needed), and the allocator that finds a
//! frame for each fault. Translations are recomputed on every access - there is deliberately no
//! TLB in front of the walk.

mod allocator;
mod walker;

use crate::memory::{
    Frame,
    Geometry,
    InMemorySwap,
    Page,
    PhysicalMemory,
    Ram,
    SwapStore,
    VirtualAddress,
    Word,
};
use bit_field::BitField;
use core::marker::PhantomData;
use walker::WalkMode;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum TranslationError {
    /// The virtual address does not fit in `VIRTUAL_ADDRESS_WIDTH` bits. The access is rejected
    /// before any translation work happens, so failed accesses never disturb the tree.
    AddressOutOfRange,
}

/// A simulated virtual address space: the page-table tree lives in `memory` rooted at frame 0, and
/// non-resident pages live in `swap`. All accesses go through `read` and `write`; the rest of the
/// machinery (the walker and the frame allocator) hangs off this type in the sibling modules.
///
/// The layer is single-threaded and non-reentrant - it owns both devices outright and assumes the
/// caller serialises accesses.
pub struct AddressSpace<G, M = Ram, S = InMemorySwap>
where
    G: Geometry,
    M: PhysicalMemory,
    S: SwapStore,
{
    memory: M,
    swap: S,
    _geometry: PhantomData<G>,
}

impl<G> AddressSpace<G>
where
    G: Geometry,
{
    /// An address space over a fresh `Ram` and `InMemorySwap` sized for `G`.
    pub fn in_memory() -> AddressSpace<G> {
        AddressSpace::new(Ram::with_geometry::<G>(), InMemorySwap::new())
    }
}

impl<G, M, S> AddressSpace<G, M, S>
where
    G: Geometry,
    M: PhysicalMemory,
    S: SwapStore,
{
    /// Take ownership of the two devices and initialise the root table (frame 0 is cleared; the
    /// rest of physical memory is brought in as frames are first used, so its initial contents
    /// don't matter).
    pub fn new(memory: M, swap: S) -> AddressSpace<G, M, S> {
        assert!(
            G::VIRTUAL_ADDRESS_WIDTH < usize::BITS as usize,
            "virtual address width must leave room for the out-of-range check"
        );
        assert!(
            G::ROOT_SLICE_WIDTH > 0 && G::ROOT_SLICE_WIDTH <= G::OFFSET_WIDTH,
            "page-index bits don't divide into {} table levels",
            G::TABLES_DEPTH
        );
        assert!(
            G::NUM_FRAMES > G::TABLES_DEPTH,
            "{} frames can't hold a depth-{} translation path",
            G::NUM_FRAMES,
            G::TABLES_DEPTH
        );

        let mut space = AddressSpace { memory, swap, _geometry: PhantomData };
        space.clear_frame(Frame::ROOT);
        space
    }

    /// Read the word at `address`. Addresses that have never been written read as zero.
    pub fn read(&mut self, address: VirtualAddress) -> Result<Word, TranslationError> {
        let (page, offset) = Self::decompose(address)?;
        let frame = self.walk(page, WalkMode::Translate);
        Ok(self.memory.read_word(frame.base::<G>() + offset))
    }

    /// Write `value` to the word at `address`.
    pub fn write(&mut self, address: VirtualAddress, value: Word) -> Result<(), TranslationError> {
        let (page, offset) = Self::decompose(address)?;
        let frame = self.walk(page, WalkMode::Translate);
        self.memory.write_word(frame.base::<G>() + offset, value);
        Ok(())
    }

    pub fn memory(&self) -> &M {
        &self.memory
    }

    pub fn swap(&self) -> &S {
        &self.swap
    }

    /// Split a virtual address into its page index and in-page offset, rejecting addresses outside
    /// the virtual address space.
    fn decompose(address: VirtualAddress) -> Result<(Page, usize), TranslationError> {
        let raw = usize::from(address);
        if raw >= 1 << G::VIRTUAL_ADDRESS_WIDTH {
            return Err(TranslationError::AddressOutOfRange);
        }
        let page = Page::new(raw.get_bits(G::OFFSET_WIDTH..G::VIRTUAL_ADDRESS_WIDTH));
        let offset = raw.get_bits(0..G::OFFSET_WIDTH);
        Ok((page, offset))
    }

    /// Zero every entry of `frame`, making it a valid (empty) page table.
    fn clear_frame(&mut self, frame: Frame) {
        let base = frame.base::<G>();
        for offset in 0..G::PAGE_SIZE {
            self.memory.write_word(base + offset, 0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    crate::geometry!(Sv12: offset_width = 4, virtual_address_width = 12, physical_address_width = 6, tables_depth = 2);
    crate::geometry!(Sv12Roomy: offset_width = 4, virtual_address_width = 12, physical_address_width = 8, tables_depth = 2);
    crate::geometry!(NarrowRoot: offset_width = 4, virtual_address_width = 11, physical_address_width = 9, tables_depth = 2);

    /// Walk the whole tree, collecting every frame a table entry points at. Used to check that the
    /// tree never references frame 0 and never references the same frame twice.
    fn referenced_frames<G>(space: &AddressSpace<G>) -> Vec<Frame>
    where
        G: Geometry,
    {
        fn recurse<G>(space: &AddressSpace<G>, table: Frame, depth: usize, frames: &mut Vec<Frame>)
        where
            G: Geometry,
        {
            for index in 0..(1 << G::slice_width(depth)) {
                let entry = space.memory().read_word(table.base::<G>() + index);
                if entry == 0 {
                    continue;
                }
                let child = Frame::new(entry as usize);
                frames.push(child);
                if depth + 1 < G::TABLES_DEPTH {
                    recurse(space, child, depth + 1, frames);
                }
            }
        }

        let mut frames = Vec::new();
        recurse(space, Frame::ROOT, 0, &mut frames);
        frames
    }

    fn assert_tree_well_formed<G>(space: &AddressSpace<G>)
    where
        G: Geometry,
    {
        let frames = referenced_frames(space);
        assert!(!frames.contains(&Frame::ROOT), "a table entry points back at the root");
        assert!(frames.iter().all(|frame| frame.index() < G::NUM_FRAMES));

        let mut deduped = frames.clone();
        deduped.sort();
        deduped.dedup();
        assert_eq!(deduped.len(), frames.len(), "two table entries reference the same frame");
    }

    #[test]
    fn fresh_write_read() {
        let mut space = AddressSpace::<Sv12>::in_memory();
        space.write(VirtualAddress::new(0x0ab), 42).unwrap();
        assert_eq!(space.read(VirtualAddress::new(0x0ab)), Ok(42));

        // Three frames in use (root, one mid table, one data frame) - nothing was evicted.
        assert!(space.swap().is_empty());
        assert_tree_well_formed(&space);
    }

    #[test]
    fn unmapped_read_yields_zero() {
        let mut space = AddressSpace::<Sv12>::in_memory();
        assert_eq!(space.read(VirtualAddress::new(0x123)), Ok(0));
        assert_tree_well_formed(&space);
    }

    #[test]
    fn eviction_preserves_values() {
        // Four frames: the root, a mid table, and two left over. Three working pages can't all be
        // resident, so every access chases the others out, and each value has to survive a
        // page-out/page-in round trip.
        let mut space = AddressSpace::<Sv12>::in_memory();
        space.write(VirtualAddress::new(0x010), 7).unwrap();
        space.write(VirtualAddress::new(0x110), 8).unwrap();
        space.write(VirtualAddress::new(0x210), 9).unwrap();
        assert!(!space.swap().is_empty(), "expected at least one eviction");

        assert_eq!(space.read(VirtualAddress::new(0x010)), Ok(7));
        assert_eq!(space.read(VirtualAddress::new(0x110)), Ok(8));
        assert_eq!(space.read(VirtualAddress::new(0x210)), Ok(9));
        assert_tree_well_formed(&space);
    }

    #[test]
    fn empty_mid_table_is_reclaimed_over_eviction() {
        let mut space = AddressSpace::<Sv12>::in_memory();

        // Page 0x01 lands under root entry 0; evicting it to make room for page 0x11 (root entry
        // 1) leaves its mid table empty.
        space.write(VirtualAddress::new(0x010), 7).unwrap();
        space.write(VirtualAddress::new(0x110), 8).unwrap();
        let swapped_before = space.swap().len();

        // Page 0x21 needs a mid table under root entry 2. The allocator must reuse the empty mid
        // table (clearing root entry 0) rather than evict page 0x11 for it.
        space.write(VirtualAddress::new(0x210), 9).unwrap();
        let root = Frame::ROOT.base::<Sv12>();
        assert_eq!(space.memory().read_word(root), 0);
        assert_ne!(space.memory().read_word(root + 2), 0);

        // One further eviction happened (for 0x21's data frame), but none for its mid table.
        assert_eq!(space.swap().len(), swapped_before + 1);
        assert_tree_well_formed(&space);
    }

    #[test]
    fn out_of_range_addresses_are_rejected() {
        let mut space = AddressSpace::<Sv12>::in_memory();
        assert_eq!(
            space.write(VirtualAddress::new(1 << 12), 5),
            Err(TranslationError::AddressOutOfRange)
        );
        assert_eq!(space.read(VirtualAddress::new(1 << 12)), Err(TranslationError::AddressOutOfRange));

        // The failed accesses left no trace: the root is still empty and nothing was swapped.
        assert!(referenced_frames(&space).is_empty());
        assert!(space.swap().is_empty());
        assert_eq!(space.read(VirtualAddress::new(0x000)), Ok(0));
    }

    #[test]
    fn working_set_within_capacity_never_evicts() {
        // 16 frames; a root, one mid table, and eight data pages fit comfortably.
        let mut space = AddressSpace::<Sv12Roomy>::in_memory();
        for page in 0..8usize {
            let address = VirtualAddress::new((page << 4) | 0x3);
            space.write(address, page as Word + 50).unwrap();
        }
        for page in 0..8usize {
            let address = VirtualAddress::new((page << 4) | 0x3);
            assert_eq!(space.read(address), Ok(page as Word + 50));
        }
        assert!(space.swap().is_empty());
        assert_tree_well_formed(&space);
    }

    #[test]
    fn narrow_root_slice_round_trips() {
        // 7 page-index bits over two levels leaves a 3-bit root slice; addresses must still
        // translate consistently across all eight root entries.
        let mut space = AddressSpace::<NarrowRoot>::in_memory();
        for root_slice in 0..8usize {
            let page = root_slice << 4 | 0x9;
            let address = VirtualAddress::new((page << 4) | 0x5);
            space.write(address, page as Word).unwrap();
        }
        for root_slice in 0..8usize {
            let page = root_slice << 4 | 0x9;
            let address = VirtualAddress::new((page << 4) | 0x5);
            assert_eq!(space.read(address), Ok(page as Word));
        }
        assert_tree_well_formed(&space);
    }

    #[test]
    fn behaves_like_a_flat_memory_under_pressure() {
        // Drive the layer with a deterministic pseudo-random access pattern over far more pages
        // than there are frames, checking every read against a flat model and the structural
        // invariants after every operation.
        let mut space = AddressSpace::<Sv12>::in_memory();
        let mut model: HashMap<usize, Word> = HashMap::new();
        let mut state: u64 = 0x853c_49e6_748f_ea9b;

        for step in 0..2000u64 {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            let address = (state >> 24) as usize % (1 << 12);
            let value = (state >> 8) & 0xffff;

            if state % 3 == 0 {
                let expected = model.get(&address).copied().unwrap_or(0);
                assert_eq!(
                    space.read(VirtualAddress::new(address)),
                    Ok(expected),
                    "step {}: readback mismatch at {:#x}",
                    step,
                    address
                );
            } else {
                space.write(VirtualAddress::new(address), value).unwrap();
                model.insert(address, value);
            }
            assert_tree_well_formed(&space);
        }
    }
}
