use crate::model::{Pair, TokenId};

/// Outcome of merging a specific pair within a [`Word`].
#[derive(Default)]
pub(crate) struct MergeOutcome {
    /// Number of pair occurrences replaced inside the word.
    pub merges: usize,
    /// Pair count deltas emitted by the merge. Negative values represent removals,
    /// positive values represent newly formed adjacent pairs.
    pub deltas: Vec<(Pair, i32)>,
}

/// Id sequence of one distinct segment.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct Word {
    symbols: Vec<TokenId>,
}

impl Word {
    /// Builds a word from an owned token sequence.
    pub(crate) fn from_tokens(symbols: Vec<TokenId>) -> Self {
        Self { symbols }
    }

    /// Current ids of the word.
    pub(crate) fn symbols(&self) -> &[TokenId] {
        &self.symbols
    }

    /// Returns true when the word contains at least two symbols.
    pub(crate) fn has_pairs(&self) -> bool {
        self.symbols.len() >= 2
    }

    /// Invokes the provided closure for each adjacent token pair.
    pub(crate) fn for_each_pair<F>(&self, mut f: F)
    where
        F: FnMut(Pair),
    {
        for window in self.symbols.windows(2) {
            f((window[0], window[1]));
        }
    }

    /// Replaces every non-overlapping `(left, right)` occurrence with `replacement`, scanning
    /// left to right, and returns the resulting adjacency deltas.
    ///
    /// After a replacement the scan resumes behind the new symbol, so `a a a` merged on
    /// `(a, a)` yields `X a`, never `a X`.
    pub(crate) fn merge(
        &mut self,
        left: TokenId,
        right: TokenId,
        replacement: TokenId,
    ) -> MergeOutcome {
        let mut outcome = MergeOutcome::default();
        if self.symbols.len() < 2 {
            return outcome;
        }

        let mut i = 0usize;
        while i + 1 < self.symbols.len() {
            if self.symbols[i] == left && self.symbols[i + 1] == right {
                let prev = if i > 0 {
                    Some(self.symbols[i - 1])
                } else {
                    None
                };
                let next = self.symbols.get(i + 2).copied();

                // Remove affected adjacency counts.
                if let Some(prev) = prev {
                    outcome.deltas.push(((prev, left), -1));
                }
                outcome.deltas.push(((left, right), -1));
                if let Some(next) = next {
                    outcome.deltas.push(((right, next), -1));
                }

                self.symbols[i] = replacement;
                self.symbols.remove(i + 1);
                outcome.merges += 1;

                // Emit adjacencies formed with the merged token.
                if let Some(prev) = prev {
                    outcome.deltas.push(((prev, replacement), 1));
                }
                if let Some(next) = next {
                    outcome.deltas.push(((replacement, next), 1));
                }
            }
            i += 1;
        }

        outcome
    }
}
