//! The memory API models the two address spaces the translation layer bridges: the physical one,
//! split into frames, and the virtual one, split into pages. Each has an address type and an index
//! type, and the devices backing them (the word-addressed physical memory, and the page-addressed
//! swap store) are traits so the translation machinery never cares what actually holds the bits.

mod frame;
mod page;
mod physical;
mod physical_address;
mod swap;
mod virtual_address;

pub use frame::Frame;
pub use page::Page;
pub use physical::{PhysicalMemory, Ram};
pub use physical_address::PhysicalAddress;
pub use swap::{InMemorySwap, SwapStore};
pub use virtual_address::VirtualAddress;

use core::fmt::Debug;

/// The machine word of the simulated memory. Physical memory, the swap store, and page-table
/// entries all traffic in `Word`s; a table entry holds the index of its child frame, with `0`
/// meaning "no child".
pub type Word = u64;

/// This trait is implemented by marker types, one for each shape of simulated address space. All
/// of the layer's dimensions derive from the four primary constants; implementations only ever
/// provide those four (most conveniently through the `geometry!` macro).
///
/// A geometry is well-formed when the page-index bits divide into `TABLES_DEPTH` slices of
/// `OFFSET_WIDTH` bits with a non-empty top slice (`0 < ROOT_SLICE_WIDTH <= OFFSET_WIDTH`), and
/// when there are enough frames for a full translation path (`NUM_FRAMES > TABLES_DEPTH`).
/// `AddressSpace::new` asserts this.
pub trait Geometry: Clone + Copy + PartialEq + Eq + Debug {
    /// Bits of the in-page offset. A frame and a page are both `1 << OFFSET_WIDTH` words.
    const OFFSET_WIDTH: usize;
    /// Total bits in a virtual address.
    const VIRTUAL_ADDRESS_WIDTH: usize;
    /// Total bits in a physical address.
    const PHYSICAL_ADDRESS_WIDTH: usize;
    /// Number of page-table levels between the root table and the data frames.
    const TABLES_DEPTH: usize;

    /// Words per frame and per page. Also the number of entries in a full table frame.
    const PAGE_SIZE: usize = 1 << Self::OFFSET_WIDTH;
    const NUM_FRAMES: usize = 1 << (Self::PHYSICAL_ADDRESS_WIDTH - Self::OFFSET_WIDTH);
    const NUM_PAGES: usize = 1 << (Self::VIRTUAL_ADDRESS_WIDTH - Self::OFFSET_WIDTH);

    /// Bits of a virtual address that select the page - everything above the offset.
    const PAGE_INDEX_WIDTH: usize = Self::VIRTUAL_ADDRESS_WIDTH - Self::OFFSET_WIDTH;

    /// Bits consumed by the root table's slice of the page index. When the page-index bits are not
    /// a clean multiple of `OFFSET_WIDTH`, the root slice is the narrower remainder.
    const ROOT_SLICE_WIDTH: usize =
        Self::VIRTUAL_ADDRESS_WIDTH - Self::TABLES_DEPTH * Self::OFFSET_WIDTH;

    /// The width of the page-index slice consumed by a table at the given level of the tree (the
    /// root is level 0).
    fn slice_width(level: usize) -> usize {
        if level == 0 {
            Self::ROOT_SLICE_WIDTH
        } else {
            Self::OFFSET_WIDTH
        }
    }
}

/// Declare a marker type implementing `Geometry`.
///
/// ```
/// pagetree::geometry!(Sv12: offset_width = 4, virtual_address_width = 12, physical_address_width = 8, tables_depth = 2);
///
/// use pagetree::Geometry;
/// assert_eq!(Sv12::PAGE_SIZE, 16);
/// assert_eq!(Sv12::NUM_PAGES, 256);
/// ```
#[macro_export]
macro_rules! geometry {
    ($(#[$attr:meta])* $vis:vis $name:ident:
        offset_width = $offset:expr,
        virtual_address_width = $virt:expr,
        physical_address_width = $phys:expr,
        tables_depth = $depth:expr $(,)?
    ) => {
        $(#[$attr])*
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug)]
        $vis enum $name {}

        impl $crate::memory::Geometry for $name {
            const OFFSET_WIDTH: usize = $offset;
            const VIRTUAL_ADDRESS_WIDTH: usize = $virt;
            const PHYSICAL_ADDRESS_WIDTH: usize = $phys;
            const TABLES_DEPTH: usize = $depth;
        }
    };
}
