//! `pagetree` simulates a hierarchical virtual-memory translation layer: a small, fixed-size
//! physical memory backed by an unbounded swap store, presented to callers as a flat, word-granular
//! virtual address space. Every access is translated through a multi-level page-table tree rooted
//! in physical frame 0, with table frames and data frames allocated on demand and victim pages
//! evicted to swap when physical memory runs dry.
//!
//! The crate is a library with no I/O of its own. The two devices it drives - the physical memory
//! and the swap store - are traits (`PhysicalMemory`, `SwapStore`), with in-memory implementations
//! (`Ram`, `InMemorySwap`) provided for simulation and testing. The shape of the address space is
//! described by a marker type implementing `Geometry`, so differently-sized configurations can
//! coexist and are checked at compile time.
//!
//! The interesting machinery lives in the `paging` module: the table walker that descends the tree
//! slice by slice, and the frame allocator that picks a frame for a faulting page by a strict
//! three-way priority (reclaim an empty table, take a never-used frame, evict the resident page
//! furthest from the faulting one on the page-index ring).

pub mod memory;
pub mod paging;

pub use memory::{
    Frame,
    Geometry,
    InMemorySwap,
    Page,
    PhysicalAddress,
    PhysicalMemory,
    Ram,
    SwapStore,
    VirtualAddress,
    Word,
};
pub use paging::{AddressSpace, TranslationError};
