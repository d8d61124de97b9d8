//! Fixed-size transposition table keyed by the position hash.
//!
//! This is a replacement cache, not a guaranteed-correct table: the slot is
//! chosen from the low bits of the key, every entry stores the full 64-bit
//! key, and a probe that does not match the stored key is a miss, never a
//! collision to resolve. Later writes overwrite earlier ones in the same
//! slot, except that a shallower result never displaces a deeper one for
//! the same position.

use crate::board::types::Move;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bound {
    Exact,
    Lower,
    Upper,
}

#[derive(Debug, Clone, Copy)]
pub struct TTEntry {
    pub key: u64,
    pub depth: u8,
    pub score: i32,
    pub bound: Bound,
    pub best_move: Option<Move>,
}

#[derive(Debug, Clone)]
pub struct TranspositionTable {
    entries: Vec<Option<TTEntry>>,
}

impl TranspositionTable {
    pub fn new_with_mb(size_mb: usize) -> Self {
        let bytes = size_mb.max(1) * 1024 * 1024;
        let entry_size = std::mem::size_of::<Option<TTEntry>>().max(1);
        let count = (bytes / entry_size).max(1);
        Self {
            entries: vec![None; count],
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every entry. Done at the end of each iterative-deepening call;
    /// the depth-versioned entries are only meaningful within one search.
    #[inline]
    pub fn clear(&mut self) {
        self.entries.fill(None);
    }

    #[inline]
    fn idx(&self, key: u64) -> usize {
        (key as usize) % self.entries.len()
    }

    /// Full-key match or nothing; a slot holding an unrelated position is a
    /// plain miss.
    pub fn probe(&self, key: u64) -> Option<TTEntry> {
        self.entries[self.idx(key)].filter(|e| e.key == key)
    }

    pub fn store(&mut self, entry: TTEntry) {
        let idx = self.idx(entry.key);
        match self.entries[idx] {
            Some(existing) if existing.key == entry.key && entry.depth < existing.depth => {}
            _ => self.entries[idx] = Some(entry),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Bound, TTEntry, TranspositionTable};

    fn entry(key: u64, depth: u8, score: i32) -> TTEntry {
        TTEntry {
            key,
            depth,
            score,
            bound: Bound::Exact,
            best_move: None,
        }
    }

    #[test]
    fn store_and_probe_round_trip() {
        let mut tt = TranspositionTable::new_with_mb(1);
        tt.store(entry(123, 5, 42));
        let got = tt.probe(123).expect("entry should exist");
        assert_eq!(got.depth, 5);
        assert_eq!(got.score, 42);
        assert!(tt.probe(456).is_none());
    }

    #[test]
    fn deeper_results_overwrite_shallower_ones() {
        let mut tt = TranspositionTable::new_with_mb(1);
        tt.store(entry(555, 2, 1));
        tt.store(entry(555, 1, 9));
        assert_eq!(tt.probe(555).expect("exists").score, 1);
        tt.store(entry(555, 6, 3));
        assert_eq!(tt.probe(555).expect("exists").depth, 6);
    }

    #[test]
    fn colliding_keys_are_misses_not_matches() {
        let mut tt = TranspositionTable::new_with_mb(1);
        let len = tt.len() as u64;
        tt.store(entry(7, 4, 10));
        // Same slot, different full key: probing must miss, and a write may
        // take the slot over.
        assert!(tt.probe(7 + len).is_none());
        tt.store(entry(7 + len, 1, 20));
        assert!(tt.probe(7).is_none());
        assert_eq!(tt.probe(7 + len).expect("exists").score, 20);
    }

    #[test]
    fn clear_empties_every_slot() {
        let mut tt = TranspositionTable::new_with_mb(1);
        tt.store(entry(99, 3, 7));
        tt.clear();
        assert!(tt.probe(99).is_none());
    }
}
