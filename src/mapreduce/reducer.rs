//! Merging per-chunk counts into the document-wide count
//!
//! Merging is key-wise summation, so the result does not depend on the order
//! in which local counts arrive.

use super::map_phase::LocalCount;
use super::tokenizer::Token;
use std::collections::{BTreeSet, HashMap};

/// Token frequencies across every merged chunk
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GlobalCount {
    counts: HashMap<Token, u64>,
    total: u64,
}

impl GlobalCount {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, token: &str) -> Option<u64> {
        self.counts.get(token).copied()
    }

    /// Sum of all counts, i.e. the number of tokens merged
    pub fn total(&self) -> u64 {
        self.total
    }

    /// Number of distinct tokens
    pub fn distinct(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Token, u64)> {
        self.counts.iter().map(|(token, count)| (token, *count))
    }

    fn add(&mut self, token: Token, count: u64) {
        *self.counts.entry(token).or_insert(0) += count;
        self.total += count;
    }
}

/// Incremental reducer. Owns the global count until [`Reducer::finish`] hands it off.
#[derive(Debug, Default)]
pub struct Reducer {
    global: GlobalCount,
    merged_chunks: BTreeSet<usize>,
}

impl Reducer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge one chunk's counts
    pub fn absorb(&mut self, local: LocalCount) {
        self.merged_chunks.insert(local.chunk_index());
        for (token, count) in local.into_counts() {
            self.global.add(token, count);
        }
    }

    /// Indices of the chunks merged so far, ascending
    pub fn merged_chunks(&self) -> impl Iterator<Item = usize> + '_ {
        self.merged_chunks.iter().copied()
    }

    pub fn merged_len(&self) -> usize {
        self.merged_chunks.len()
    }

    pub fn finish(self) -> GlobalCount {
        self.global
    }
}

impl Extend<LocalCount> for Reducer {
    fn extend<I: IntoIterator<Item = LocalCount>>(&mut self, locals: I) {
        for local in locals {
            self.absorb(local);
        }
    }
}

/// Batch reduce: merge every local count at once
pub fn reduce(locals: impl IntoIterator<Item = LocalCount>) -> GlobalCount {
    let mut reducer = Reducer::new();
    reducer.extend(locals);
    reducer.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapreduce::tokenizer::Tokenizer;

    fn local(index: usize, text: &str) -> LocalCount {
        LocalCount::from_tokens(index, Tokenizer::default().tokenize(text))
    }

    #[test]
    fn test_sums_colliding_keys() {
        let global = reduce(vec![
            local(0, "the cat sat"),
            local(1, "on the mat"),
            local(2, "the cat ran"),
        ]);

        assert_eq!(global.get("the"), Some(3));
        assert_eq!(global.get("cat"), Some(2));
        assert_eq!(global.get("mat"), Some(1));
        assert_eq!(global.get("dog"), None);
        assert_eq!(global.total(), 9);
        assert_eq!(global.distinct(), 6);
    }

    #[test]
    fn test_arrival_order_does_not_matter() {
        let forward = reduce(vec![local(0, "a b b"), local(1, "b c"), local(2, "c c a")]);
        let backward = reduce(vec![local(2, "c c a"), local(1, "b c"), local(0, "a b b")]);
        assert_eq!(forward, backward);
    }

    #[test]
    fn test_streaming_matches_batch() {
        let parts = || vec![local(1, "x y"), local(0, "y z z")];

        let mut reducer = Reducer::new();
        for part in parts() {
            reducer.absorb(part);
        }
        assert_eq!(reducer.merged_chunks().collect::<Vec<_>>(), vec![0, 1]);
        assert_eq!(reducer.merged_len(), 2);
        assert_eq!(reducer.finish(), reduce(parts()));
    }

    #[test]
    fn test_extend_after_streaming_tracks_every_chunk() {
        let mut reducer = Reducer::new();
        reducer.absorb(local(2, "c c"));
        reducer.extend(vec![local(0, "a"), local(1, "b c")]);

        assert_eq!(reducer.merged_chunks().collect::<Vec<_>>(), vec![0, 1, 2]);
        let global = reducer.finish();
        assert_eq!(global.get("c"), Some(3));
        assert_eq!(global.total(), 4);
    }

    #[test]
    fn test_empty_reduce() {
        let global = reduce(Vec::new());
        assert!(global.is_empty());
        assert_eq!(global.total(), 0);
    }
}
