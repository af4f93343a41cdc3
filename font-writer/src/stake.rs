//! Opaque handles into a writer's eventual output.

use std::sync::atomic::{AtomicU64, Ordering};

static STAKE_COUNTER: AtomicU64 = AtomicU64::new(0);
static INDEX_TAG_COUNTER: AtomicU64 = AtomicU64::new(0);

/// A symbolic position in the output of a [`LinkedWriter`].
///
/// A stake is created unbound and bound exactly once, to the position of
/// whatever is written next. Offsets between stakes are resolved when the
/// writer is finalized.
///
/// Stakes are unique across writers, so a stake from one writer is never
/// mistaken for a stake of another.
///
/// [`LinkedWriter`]: crate::LinkedWriter
#[derive(Debug, Clone, Copy, PartialOrd, Ord, Hash, PartialEq, Eq)]
pub struct Stake(u64);

impl Stake {
    pub(crate) fn next() -> Self {
        Stake(STAKE_COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl std::fmt::Display for Stake {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "stake#{}", self.0)
    }
}

/// A handle to a fixed-width slot whose value is supplied later.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
pub struct Deferred {
    pub(crate) stake: Stake,
}

impl Deferred {
    /// The stake bound to the start of this slot.
    pub fn stake(&self) -> Stake {
        self.stake
    }
}

/// Identifies a family of unresolved indices, resolved by one index map.
#[derive(Debug, Clone, Copy, PartialOrd, Ord, Hash, PartialEq, Eq)]
pub struct IndexTag(u64);

impl IndexTag {
    pub(crate) fn next() -> Self {
        IndexTag(INDEX_TAG_COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl std::fmt::Display for IndexTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "index tag {}", self.0)
    }
}
