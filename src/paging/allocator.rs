//! Frame acquisition. When the walker faults it needs a physical frame, and with no free list to
//! consult (the tree itself is the only record of what is in use), the allocator finds one with a
//! single depth-first traversal of the table tree, applying a strict three-way priority:
//!
//! 1. **An empty table.** A table reachable from the root whose entries are all zero contributes
//!    nothing to any translation; it is unlinked from its parent and returned as-is. The one
//!    exception is the *ignore frame* - the table the walker is about to install a pointer into,
//!    which may well be empty at this instant but must stay where it is. Tables deeper on the
//!    faulting path can't be empty (each holds at least the entry the walk came through), so the
//!    immediate parent is the only frame needing explicit protection.
//!
//! 2. **A never-used frame.** The traversal tracks the highest frame index referenced anywhere in
//!    the tree, say `h`. Frames above `h` have never been linked in and hold no live data, so if
//!    `h + 1` exists it can be used without any rescue work.
//!
//! 3. **Eviction.** Otherwise every frame is doing something, and a resident page must make way:
//!    the one maximising the cyclic distance
//!    `min(|target - v|, NUM_PAGES - |target - v|)` to the faulting page. Leaves are visited in
//!    ascending page order and a candidate is adopted only on strictly greater distance, so ties
//!    fall to the lowest page index. The victim is walked to in `Unlink` mode (which severs it
//!    from the tree and yields its frame), paged out, and its frame returned.
//!
//! All three priorities are serviced by the same traversal: it returns as soon as an empty table
//! turns up, and otherwise accumulates the highest frame index and the best victim as it goes. The
//! partial page index of the current position is threaded through the descent - each level shifts
//! in its slice of bits - so that at leaf depth it names the page being looked at, with no back
//! reference needed.

use super::{walker::WalkMode, AddressSpace};
use crate::memory::{Frame, Geometry, Page, PhysicalMemory, SwapStore};
use log::{debug, trace};

/// A frame chosen by the allocator, tagged with how it was obtained. An `EmptySubtable` has
/// already been unlinked from its parent and is all zeroes; the other two arrive with arbitrary
/// contents and must be cleared or paged into by the caller.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub(super) enum AcquiredFrame {
    EmptySubtable(Frame),
    Fresh(Frame),
    Evicted(Frame),
}

impl AcquiredFrame {
    pub(super) fn frame(self) -> Frame {
        match self {
            AcquiredFrame::EmptySubtable(frame)
            | AcquiredFrame::Fresh(frame)
            | AcquiredFrame::Evicted(frame) => frame,
        }
    }
}

/// What a subtree scan found out about a table frame.
enum Survey {
    /// Every entry of the table is zero.
    Empty,
    /// An empty table was found somewhere below and unlinked from its parent; stop searching.
    Reclaimed(Frame),
    /// The table has at least one live entry.
    Occupied,
}

/// Running state for the traversal, threaded through the recursion by reference.
struct Traversal {
    /// The page the walker faulted on; victim distances are measured from here.
    target: Page,
    /// The table the walker is about to link a new frame into. Never reclaimed, even when empty.
    ignore: Frame,
    /// Highest frame index referenced by any table entry seen so far.
    highest_frame: usize,
    /// Best eviction candidate so far, and its distance to `target`. Starts at the target itself
    /// with distance zero, so the first real leaf always takes over.
    victim: Page,
    victim_distance: usize,
}

impl<G, M, S> AddressSpace<G, M, S>
where
    G: Geometry,
    M: PhysicalMemory,
    S: SwapStore,
{
    /// Choose a frame for the walker to install for `target`, leaving it unreferenced by the tree
    /// and ready for use. `ignore` is the table the walker faulted in, which must survive the
    /// search. Allocation cannot fail: priority 3 always finds a victim in any well-formed
    /// configuration.
    pub(super) fn acquire_frame(&mut self, target: Page, ignore: Frame) -> AcquiredFrame {
        let mut traversal = Traversal {
            target,
            ignore,
            highest_frame: 0,
            victim: target,
            victim_distance: 0,
        };

        if let Survey::Reclaimed(frame) = self.survey(Frame::ROOT, 0, 0, &mut traversal) {
            trace!("reusing empty table {:?} for {:?}", frame, target);
            return AcquiredFrame::EmptySubtable(frame);
        }

        if traversal.highest_frame + 1 < G::NUM_FRAMES {
            return AcquiredFrame::Fresh(Frame::new(traversal.highest_frame + 1));
        }

        assert!(traversal.victim_distance > 0, "no resident page to evict");
        let victim = traversal.victim;
        debug!(
            "evicting {:?} (distance {}) to make room for {:?}",
            victim, traversal.victim_distance, target
        );
        let frame = self.walk(victim, WalkMode::Unlink);
        self.swap.page_out::<G, M>(&mut self.memory, frame, victim);
        AcquiredFrame::Evicted(frame)
    }

    /// Scan the subtree rooted at `table` (a table frame at `depth`, translating pages whose
    /// indices start with `partial`), updating the traversal state with every entry seen. Each
    /// entry is read exactly once; emptiness falls out of the same pass that descends.
    fn survey(&mut self, table: Frame, depth: usize, partial: usize, traversal: &mut Traversal) -> Survey {
        let mut occupied = false;

        for index in 0..(1 << G::slice_width(depth)) {
            let entry_address = table.base::<G>() + index;
            let entry = self.memory.read_word(entry_address);
            if entry == 0 {
                continue;
            }
            occupied = true;

            let child = Frame::new(entry as usize);
            traversal.highest_frame = traversal.highest_frame.max(child.index());
            let child_partial = (partial << G::slice_width(depth)) | index;

            if depth + 1 == G::TABLES_DEPTH {
                // A data frame: `child_partial` has accumulated the full page index by now.
                let page = Page::new(child_partial);
                let distance = traversal.target.cyclic_distance::<G>(page);
                if distance > traversal.victim_distance {
                    traversal.victim = page;
                    traversal.victim_distance = distance;
                }
                continue;
            }

            match self.survey(child, depth + 1, child_partial, traversal) {
                Survey::Empty if child != traversal.ignore => {
                    self.memory.write_word(entry_address, 0);
                    return Survey::Reclaimed(child);
                }
                Survey::Empty => {}
                Survey::Reclaimed(frame) => return Survey::Reclaimed(frame),
                Survey::Occupied => {}
            }
        }

        if occupied {
            Survey::Occupied
        } else {
            Survey::Empty
        }
    }
}
