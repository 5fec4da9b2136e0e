//! The table walk. Starting from the root table in frame 0, each level consumes one slice of the
//! page index - `ROOT_SLICE_WIDTH` bits at the root, `OFFSET_WIDTH` bits below - and follows the
//! selected entry down to the next frame. A zero entry is a page fault: the allocator picks a
//! frame, the walker prepares it (zeroed for a new table, paged in from swap for a data frame),
//! links it into the parent, and carries on down.
//!
//! The walk has a second mode used during eviction: walking to a page in `Unlink` mode clears the
//! entry that points at its data frame, severing the page from the tree so the frame can be handed
//! to someone else. An unlink walk never faults - the victim was found in the tree moments before.

use super::{allocator::AcquiredFrame, AddressSpace};
use crate::memory::{Frame, Geometry, Page, PhysicalMemory, SwapStore, Word};
use log::trace;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub(super) enum WalkMode {
    /// Walk to the page's data frame, allocating any missing tables and the data frame itself.
    Translate,
    /// Walk to the page's data frame and clear the entry pointing at it. The page must be
    /// resident.
    Unlink,
}

impl<G, M, S> AddressSpace<G, M, S>
where
    G: Geometry,
    M: PhysicalMemory,
    S: SwapStore,
{
    /// Descend the tree to the data frame holding `page`, returning that frame. In `Translate`
    /// mode, missing tables and data frames are faulted in on the way down.
    pub(super) fn walk(&mut self, page: Page, mode: WalkMode) -> Frame {
        let mut table = Frame::ROOT;
        let mut remaining = page.index();
        // Bits of the page index below the slice consumed at the current level.
        let mut width_below = G::PAGE_INDEX_WIDTH - G::ROOT_SLICE_WIDTH;

        for level in 0..G::TABLES_DEPTH {
            let slice = remaining >> width_below;
            let entry_address = table.base::<G>() + slice;
            let entry = self.memory.read_word(entry_address);
            let child_is_data = level == G::TABLES_DEPTH - 1;

            let child = if entry != 0 {
                let child = Frame::new(entry as usize);
                assert!(
                    child != Frame::ROOT,
                    "table entry at {:#x} points back at the root",
                    entry_address
                );
                if child_is_data && mode == WalkMode::Unlink {
                    self.memory.write_word(entry_address, 0);
                }
                child
            } else {
                assert!(
                    mode == WalkMode::Translate,
                    "unlink walk found {:?} not resident at level {}",
                    page,
                    level
                );
                trace!("page fault for {:?} at level {} (table {:?})", page, level, table);

                let acquired = self.acquire_frame(page, table);
                let child = acquired.frame();
                if child_is_data {
                    self.swap.page_in::<G, M>(&mut self.memory, child, page);
                } else if !matches!(acquired, AcquiredFrame::EmptySubtable(_)) {
                    // An empty subtable is already all zeroes; anything else must be cleared
                    // before it can serve as a table.
                    self.clear_frame(child);
                }
                self.memory.write_word(entry_address, child.index() as Word);
                child
            };

            table = child;
            remaining &= (1 << width_below) - 1;
            if !child_is_data {
                width_below -= G::OFFSET_WIDTH;
            }
        }

        table
    }
}
