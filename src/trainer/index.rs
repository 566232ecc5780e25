use std::cmp::Ordering;
use std::collections::{hash_map::Entry, BinaryHeap};
use std::convert::TryFrom;

use rayon::prelude::*;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::model::{Pair, TokenId};
use crate::trainer::segments::SegmentTable;
use crate::vocab::Vocabulary;

/// Heap entry ranking a candidate pair.
///
/// Higher frequency wins; ties go to the lexicographically greater concatenation, then to the
/// longer left part when two pairs spell the same bytes.
#[derive(Clone, Debug, Eq, PartialEq)]
struct PairScore {
    frequency: usize,
    merged: Vec<u8>,
    split: usize,
    pair: Pair,
}

impl PairScore {
    fn new(pair: Pair, frequency: usize, vocab: &Vocabulary) -> Self {
        let split = vocab.get(pair.0).map_or(0, <[u8]>::len);
        Self {
            frequency,
            merged: vocab.concat(pair),
            split,
            pair,
        }
    }
}

impl Ord for PairScore {
    fn cmp(&self, other: &Self) -> Ordering {
        self.frequency
            .cmp(&other.frequency)
            .then_with(|| self.merged.cmp(&other.merged))
            .then_with(|| self.split.cmp(&other.split))
            .then_with(|| other.pair.cmp(&self.pair))
    }
}

impl PartialOrd for PairScore {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

type Locations = FxHashMap<Pair, FxHashSet<usize>>;

/// Incrementally maintained pair statistics over a [`SegmentTable`].
///
/// `counts` is exact at all times. `locations` may list words that no longer contain a pair,
/// never the reverse. `heap` holds stale scores that are discarded when popped.
pub(crate) struct PairIndex {
    counts: FxHashMap<Pair, usize>,
    locations: Locations,
    heap: BinaryHeap<PairScore>,
    excluded: FxHashSet<Pair>,
}

impl PairIndex {
    /// Counts every adjacent pair of every word, sharding words across the rayon pool.
    pub(crate) fn build(table: &SegmentTable, vocab: &Vocabulary) -> Self {
        let (counts, locations) = table
            .words()
            .par_iter()
            .enumerate()
            .fold(
                || (FxHashMap::default(), Locations::default()),
                |(mut counts, mut locations): (FxHashMap<Pair, usize>, Locations), (idx, word)| {
                    if word.has_pairs() {
                        let weight = table.count(idx);
                        word.for_each_pair(|pair| {
                            *counts.entry(pair).or_insert(0) += weight;
                            locations.entry(pair).or_default().insert(idx);
                        });
                    }
                    (counts, locations)
                },
            )
            .reduce(
                || (FxHashMap::default(), Locations::default()),
                |(mut counts, mut locations), (local_counts, local_locations)| {
                    for (pair, count) in local_counts {
                        *counts.entry(pair).or_insert(0) += count;
                    }
                    for (pair, words) in local_locations {
                        locations.entry(pair).or_default().extend(words);
                    }
                    (counts, locations)
                },
            );

        let mut heap = BinaryHeap::with_capacity(counts.len().max(1));
        for (&pair, &count) in &counts {
            heap.push(PairScore::new(pair, count, vocab));
        }
        Self {
            counts,
            locations,
            heap,
            excluded: FxHashSet::default(),
        }
    }

    /// Number of distinct pairs with a non-zero count.
    pub(crate) fn distinct_pairs(&self) -> usize {
        self.counts.len()
    }

    /// Current occurrence count of `pair`.
    pub(crate) fn count(&self, pair: Pair) -> usize {
        self.counts.get(&pair).copied().unwrap_or(0)
    }

    /// Number of pairs permanently excluded from selection.
    pub(crate) fn excluded_len(&self) -> usize {
        self.excluded.len()
    }

    /// Removes and returns the best selectable pair with its frequency.
    pub(crate) fn pop_best(&mut self) -> Option<(Pair, usize)> {
        while let Some(score) = self.heap.pop() {
            if self.excluded.contains(&score.pair) {
                continue;
            }
            let current = self.count(score.pair);
            if current == 0 || current != score.frequency {
                continue;
            }
            return Some((score.pair, current));
        }
        None
    }

    /// Permanently removes `pair` from consideration.
    pub(crate) fn exclude(&mut self, pair: Pair) {
        self.excluded.insert(pair);
    }

    /// Rewrites every word containing `pair` to use `new_token` and updates the statistics
    /// around the rewritten positions. Returns the number of occurrences replaced.
    ///
    /// `new_token` must already be allocated in `vocab`.
    pub(crate) fn apply_merge(
        &mut self,
        table: &mut SegmentTable,
        pair: Pair,
        new_token: TokenId,
        vocab: &Vocabulary,
    ) -> usize {
        let mut targets: Vec<usize> = self
            .locations
            .remove(&pair)
            .map(|words| words.into_iter().collect())
            .unwrap_or_default();
        targets.sort_unstable();

        let mut deltas: FxHashMap<Pair, i64> = FxHashMap::default();
        let mut total = 0usize;
        for word_idx in targets {
            let weight = table.count(word_idx);
            let outcome = table.word_mut(word_idx).merge(pair.0, pair.1, new_token);
            if outcome.merges == 0 {
                continue;
            }
            total += outcome.merges * weight;
            for (changed, delta) in outcome.deltas {
                *deltas.entry(changed).or_insert(0) += i64::from(delta) * weight as i64;
                if delta > 0 {
                    self.locations.entry(changed).or_default().insert(word_idx);
                }
            }
        }

        self.counts.remove(&pair);
        for (changed, delta) in deltas {
            if changed != pair {
                self.apply_delta(changed, delta, vocab);
            }
        }
        total
    }

    fn apply_delta(&mut self, pair: Pair, delta: i64, vocab: &Vocabulary) {
        let amount = usize::try_from(delta.unsigned_abs()).unwrap_or(usize::MAX);
        match delta.cmp(&0) {
            Ordering::Greater => {
                let count = self.counts.entry(pair).or_insert(0);
                *count += amount;
                let frequency = *count;
                if !self.excluded.contains(&pair) {
                    self.heap.push(PairScore::new(pair, frequency, vocab));
                }
            }
            Ordering::Less => {
                if let Entry::Occupied(mut occupied) = self.counts.entry(pair) {
                    let new_value = occupied.get().saturating_sub(amount);
                    if new_value == 0 {
                        occupied.remove();
                        self.locations.remove(&pair);
                    } else {
                        *occupied.get_mut() = new_value;
                        if !self.excluded.contains(&pair) {
                            self.heap.push(PairScore::new(pair, new_value, vocab));
                        }
                    }
                }
            }
            Ordering::Equal => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pretokenizer::PreTokenizer;

    fn setup(text: &str) -> (SegmentTable, Vocabulary) {
        let vocab = Vocabulary::with_special_tokens::<&str>(&[]).unwrap();
        let pre = PreTokenizer::new().unwrap();
        let table = SegmentTable::encode(&[text], &pre, &vocab).unwrap();
        (table, vocab)
    }

    fn id(byte: u8) -> TokenId {
        TokenId::from(byte)
    }

    #[test]
    fn counts_are_segment_scoped_and_weighted() {
        let (table, vocab) = setup("ab ab");
        let index = PairIndex::build(&table, &vocab);
        assert_eq!(index.count((id(b'a'), id(b'b'))), 2);
        assert_eq!(index.count((id(b' '), id(b'a'))), 1);
        // "b" of the first segment and " " of the second are never adjacent.
        assert_eq!(index.count((id(b'b'), id(b' '))), 0);
        assert_eq!(index.distinct_pairs(), 2);
    }

    #[test]
    fn ties_prefer_greater_concatenated_bytes() {
        let (table, vocab) = setup("ab cd");
        let mut index = PairIndex::build(&table, &vocab);
        // (a,b), ( ,c), (c,d) all occur once; "cd" is the greatest concatenation.
        assert_eq!(index.pop_best(), Some(((id(b'c'), id(b'd')), 1)));
        assert_eq!(index.pop_best(), Some(((id(b'a'), id(b'b')), 1)));
        assert_eq!(index.pop_best(), Some(((id(b' '), id(b'c')), 1)));
        assert_eq!(index.pop_best(), None);
    }

    #[test]
    fn excluded_pairs_are_never_selected() {
        let (table, vocab) = setup("xy xy z");
        let mut index = PairIndex::build(&table, &vocab);
        let best = index.pop_best().expect("pair available");
        assert_eq!(best, ((id(b'x'), id(b'y')), 2));
        index.exclude(best.0);
        let next = index.pop_best().expect("another pair");
        assert_ne!(next.0, best.0);
        assert_eq!(index.excluded_len(), 1);
    }

    #[test]
    fn apply_merge_updates_neighbouring_counts() {
        let (mut table, mut vocab) = setup("abab");
        let mut index = PairIndex::build(&table, &vocab);
        let pair = (id(b'a'), id(b'b'));
        assert_eq!(index.count(pair), 2);
        let new_id = vocab.push(vocab.concat(pair)).unwrap();
        let replaced = index.apply_merge(&mut table, pair, new_id, &vocab);
        assert_eq!(replaced, 2);
        assert_eq!(index.count(pair), 0);
        assert_eq!(index.count((id(b'b'), id(b'a'))), 0);
        assert_eq!(index.count((new_id, new_id)), 1);
        assert_eq!(index.pop_best(), Some(((new_id, new_id), 1)));
        assert_eq!(index.pop_best(), None);
    }
}
