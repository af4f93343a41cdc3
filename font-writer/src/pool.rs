//! Deduplicating shared subtables

use std::hash::Hash;

use indexmap::IndexMap;

use crate::{LinkedWriter, Stake, WriteError};

/// Subtables that may be referenced many times but are written once.
///
/// Each distinct key gets one stake. Referencing an equal key again returns
/// the same stake, so every offset to it resolves to the same copy. Keys
/// are compared by value: callers choose a key that captures what makes two
/// subtables interchangeable (usually the subtable itself, or its decoded
/// contents).
///
/// Entries are emitted in the order they were first referenced, so output is
/// deterministic.
#[derive(Debug, Clone)]
pub struct Pool<K, V = K> {
    entries: IndexMap<K, (V, Stake)>,
    emitted: usize,
}

impl<K, V> Default for Pool<K, V> {
    fn default() -> Self {
        Pool {
            entries: IndexMap::new(),
            emitted: 0,
        }
    }
}

impl<K: Hash + Eq, V> Pool<K, V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// The stake for `key`, creating one (and remembering `value`) if this
    /// key has not been seen.
    ///
    /// If the key is already present, `value` is dropped.
    pub fn stake_for(&mut self, writer: &mut LinkedWriter, key: K, value: V) -> Stake {
        self.entries
            .entry(key)
            .or_insert_with(|| (value, writer.new_stake()))
            .1
    }

    pub fn get(&self, key: &K) -> Option<(&V, Stake)> {
        self.entries.get(key).map(|(value, stake)| (value, *stake))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The number of entries not yet written.
    pub fn pending(&self) -> usize {
        self.entries.len() - self.emitted
    }

    /// Write every entry that has not been written yet.
    ///
    /// For each entry, its stake is bound at the current position and then
    /// `write` is called to write it. Entries added after an `emit` are
    /// written by the next one.
    pub fn emit<F>(&mut self, writer: &mut LinkedWriter, mut write: F) -> Result<(), WriteError>
    where
        F: FnMut(&V, &mut LinkedWriter) -> Result<(), WriteError>,
    {
        let already = self.emitted;
        while let Some((_, (value, stake))) = self.entries.get_index(self.emitted) {
            writer.bind_stake(*stake)?;
            write(value, writer)?;
            self.emitted += 1;
        }
        log::trace!(
            "pool emitted {} new entries, {} in total",
            self.emitted - already,
            self.emitted
        );
        Ok(())
    }
}

impl<T: Hash + Eq + Clone> Pool<T, T> {
    /// The stake for `item`, which serves as its own key.
    pub fn stake_for_item(&mut self, writer: &mut LinkedWriter, item: &T) -> Stake {
        match self.entries.get(item) {
            Some((_, stake)) => *stake,
            None => self.stake_for(writer, item.clone(), item.clone()),
        }
    }
}
