//! Result caches for the static evaluator.
//!
//! Both caches follow the same replacement discipline as the transposition
//! table: slots are picked from the low bits of the key, the full 64-bit key
//! is stored alongside the payload, and a mismatched key is a miss. Writes
//! always overwrite; a stale entry from an unrelated position can never be
//! returned because of the full-key comparison.

/// Full-position score entries.
const EVAL_CACHE_SLOTS: usize = 1 << 16;
/// Pawn-structure entries; pawn formations repeat far more often than full
/// positions, so a smaller table suffices.
const PAWN_CACHE_SLOTS: usize = 1 << 13;

#[derive(Debug, Clone, Copy)]
struct EvalEntry {
    key: u64,
    score: i32,
}

#[derive(Debug, Clone)]
pub struct EvalCache {
    entries: Vec<Option<EvalEntry>>,
}

impl Default for EvalCache {
    fn default() -> Self {
        Self::new()
    }
}

impl EvalCache {
    pub fn new() -> Self {
        Self {
            entries: vec![None; EVAL_CACHE_SLOTS],
        }
    }

    #[inline]
    pub fn probe(&self, key: u64) -> Option<i32> {
        self.entries[(key as usize) & (EVAL_CACHE_SLOTS - 1)]
            .filter(|e| e.key == key)
            .map(|e| e.score)
    }

    #[inline]
    pub fn store(&mut self, key: u64, score: i32) {
        self.entries[(key as usize) & (EVAL_CACHE_SLOTS - 1)] = Some(EvalEntry { key, score });
    }

    pub fn clear(&mut self) {
        self.entries.fill(None);
    }
}

/// Per-color pawn-structure subtotals, cached by the pawn-only hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PawnScores {
    pub white: i32,
    pub black: i32,
}

#[derive(Debug, Clone, Copy)]
struct PawnEntry {
    key: u64,
    scores: PawnScores,
}

#[derive(Debug, Clone)]
pub struct PawnCache {
    entries: Vec<Option<PawnEntry>>,
}

impl Default for PawnCache {
    fn default() -> Self {
        Self::new()
    }
}

impl PawnCache {
    pub fn new() -> Self {
        Self {
            entries: vec![None; PAWN_CACHE_SLOTS],
        }
    }

    #[inline]
    pub fn probe(&self, key: u64) -> Option<PawnScores> {
        self.entries[(key as usize) & (PAWN_CACHE_SLOTS - 1)]
            .filter(|e| e.key == key)
            .map(|e| e.scores)
    }

    #[inline]
    pub fn store(&mut self, key: u64, scores: PawnScores) {
        self.entries[(key as usize) & (PAWN_CACHE_SLOTS - 1)] = Some(PawnEntry { key, scores });
    }

    pub fn clear(&mut self) {
        self.entries.fill(None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eval_cache_requires_a_full_key_match() {
        let mut cache = EvalCache::new();
        cache.store(42, 17);
        assert_eq!(cache.probe(42), Some(17));
        // Same slot, different key.
        assert_eq!(cache.probe(42 + (1u64 << 16)), None);
    }

    #[test]
    fn pawn_cache_round_trips_both_colors() {
        let mut cache = PawnCache::new();
        let scores = PawnScores {
            white: 25,
            black: -10,
        };
        cache.store(7, scores);
        assert_eq!(cache.probe(7), Some(scores));
        cache.clear();
        assert_eq!(cache.probe(7), None);
    }
}
