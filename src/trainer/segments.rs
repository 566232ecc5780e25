use rustc_hash::FxHashMap;

use crate::error::{BpeError, Result};
use crate::model::TokenId;
use crate::pretokenizer::{PreTokenizer, SegmentKind};
use crate::trainer::word::Word;
use crate::vocab::Vocabulary;

/// Pre-tokenized corpus encoded as vocabulary ids.
///
/// Identical segments share one [`Word`] weighted by its occurrence count, while `order`
/// remembers which word every original segment maps to, so the corpus can be replayed exactly.
#[derive(Debug, Clone, Default)]
pub struct SegmentTable {
    words: Vec<Word>,
    counts: Vec<usize>,
    order: Vec<usize>,
}

impl SegmentTable {
    /// Pre-tokenizes and encodes `documents`, each split independently.
    ///
    /// Plain segments map every byte to its atom id. Special segments map to the special
    /// token's id and therefore never take part in a pair.
    pub fn encode<S: AsRef<str>>(
        documents: &[S],
        pretokenizer: &PreTokenizer,
        vocab: &Vocabulary,
    ) -> Result<Self> {
        let mut table = Self::default();
        let mut lookup: FxHashMap<(&str, bool), usize> = FxHashMap::default();
        for document in documents {
            for token in pretokenizer.split(document.as_ref())? {
                let special = token.kind == SegmentKind::Special;
                let key = (token.text, special);
                let word_idx = match lookup.get(&key) {
                    Some(&idx) => idx,
                    None => {
                        let symbols = if special {
                            let id = vocab.id_of(token.text.as_bytes()).ok_or_else(|| {
                                BpeError::Internal(format!(
                                    "special token {:?} missing from vocabulary",
                                    token.text
                                ))
                            })?;
                            vec![id]
                        } else {
                            token.text.bytes().map(TokenId::from).collect()
                        };
                        let idx = table.words.len();
                        table.words.push(Word::from_tokens(symbols));
                        table.counts.push(0);
                        lookup.insert(key, idx);
                        idx
                    }
                };
                table.counts[word_idx] += 1;
                table.order.push(word_idx);
            }
        }
        Ok(table)
    }

    /// Number of segments in corpus order.
    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Returns `true` when the corpus produced no segments.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Number of distinct segment contents.
    #[must_use]
    pub fn distinct_len(&self) -> usize {
        self.words.len()
    }

    /// Current ids of the `idx`-th segment in corpus order.
    #[must_use]
    pub fn segment(&self, idx: usize) -> Option<&[TokenId]> {
        self.order
            .get(idx)
            .map(|&word_idx| self.words[word_idx].symbols())
    }

    /// Iterates the current ids of every segment in corpus order.
    pub fn segments(&self) -> impl Iterator<Item = &[TokenId]> + '_ {
        self.order
            .iter()
            .map(move |&word_idx| self.words[word_idx].symbols())
    }

    /// Concatenates the decoded bytes of every segment in corpus order.
    pub fn decode(&self, vocab: &Vocabulary) -> Result<Vec<u8>> {
        let mut bytes = Vec::new();
        for segment in self.segments() {
            bytes.extend(vocab.decode(segment)?);
        }
        Ok(bytes)
    }

    /// Largest id referenced by any segment.
    pub(crate) fn max_id(&self) -> Option<TokenId> {
        self.words
            .iter()
            .flat_map(|word| word.symbols().iter().copied())
            .max()
    }

    pub(crate) fn words(&self) -> &[Word] {
        &self.words
    }

    pub(crate) fn count(&self, word_idx: usize) -> usize {
        self.counts[word_idx]
    }

    pub(crate) fn word_mut(&mut self, word_idx: usize) -> &mut Word {
        &mut self.words[word_idx]
    }
}
