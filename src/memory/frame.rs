use super::{Geometry, PhysicalAddress};

/// The index of a physical frame - a `PAGE_SIZE`-word chunk of the physical memory. Frame `f`
/// occupies the word addresses `[f * PAGE_SIZE, (f + 1) * PAGE_SIZE)`. Frame 0 permanently holds
/// the root page table and is never handed out by the allocator.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct Frame(usize);

impl Frame {
    /// The frame holding the root page table.
    pub const ROOT: Frame = Frame(0);

    pub const fn new(index: usize) -> Frame {
        Frame(index)
    }

    pub const fn index(self) -> usize {
        self.0
    }

    /// The physical address of this frame's first word.
    pub fn base<G>(self) -> PhysicalAddress
    where
        G: Geometry,
    {
        PhysicalAddress::new(self.0 << G::OFFSET_WIDTH)
    }
}
