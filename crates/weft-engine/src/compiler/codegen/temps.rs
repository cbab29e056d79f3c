//! Frame slot allocation
//!
//! Parameters and locals get permanent slots. Scratch temporaries (used to
//! evaluate a sub-expression once and reuse it) come from a free list: a
//! statement registers the temporaries it used, and when the statement
//! completes they are released and become available again.

use crate::compiler::ir::{Op, Slot};

/// Slot allocator for one unit
#[derive(Debug, Default)]
pub struct Temporaries {
    next: Slot,
    free: Vec<Slot>,
    pending: Vec<Slot>,
}

impl Temporaries {
    /// Create an allocator with no slots in use
    pub fn new() -> Self {
        Self::default()
    }

    /// Mint a permanent slot for a parameter or local
    pub fn mint(&mut self) -> Slot {
        let slot = self.next;
        self.next += 1;
        slot
    }

    /// Take a scratch slot, reusing a released one when possible
    pub fn alloc(&mut self) -> Slot {
        self.free.pop().unwrap_or_else(|| self.mint())
    }

    /// Release `slot` once the enclosing statement completes
    pub fn defer_release(&mut self, slot: Slot) {
        self.pending.push(slot);
    }

    /// Release everything registered since the last flush.
    ///
    /// Returns the op that clears the released slots, if there were any.
    pub fn flush(&mut self) -> Option<Op> {
        if self.pending.is_empty() {
            return None;
        }
        let released = std::mem::take(&mut self.pending);
        self.free.extend(released.iter().rev().copied());
        Some(Op::Release(released))
    }

    /// Frame size needed so far
    pub fn slot_count(&self) -> usize {
        self.next
    }
}
