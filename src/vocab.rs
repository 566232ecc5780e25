//! Dense id → bytes vocabulary grown by appending merged tokens.

use std::convert::TryFrom;

use rustc_hash::FxHashMap;

use crate::error::{BpeError, Result};
use crate::model::{Pair, TokenId};

/// Number of single-byte atoms occupying ids `0..256`.
pub const BASE_VOCAB_SIZE: usize = 256;

/// Append-only vocabulary mapping contiguous ids to unique byte sequences.
///
/// Ids `0..256` always hold the single byte with the same value, followed by the special
/// tokens in configuration order. Merged tokens are appended after that and never renumbered.
#[derive(Debug, Clone)]
pub struct Vocabulary {
    tokens: Vec<Vec<u8>>,
    lookup: FxHashMap<Vec<u8>, TokenId>,
    special_count: usize,
}

impl Vocabulary {
    /// Seeds the byte alphabet followed by `special_tokens` in the supplied order.
    pub fn with_special_tokens<S: AsRef<str>>(special_tokens: &[S]) -> Result<Self> {
        let capacity = BASE_VOCAB_SIZE + special_tokens.len();
        let mut vocab = Self {
            tokens: Vec::with_capacity(capacity),
            lookup: FxHashMap::with_capacity_and_hasher(capacity, Default::default()),
            special_count: 0,
        };
        for byte in 0u8..=u8::MAX {
            vocab.push(vec![byte])?;
        }
        for token in special_tokens {
            let token = token.as_ref();
            if token.is_empty() {
                return Err(BpeError::Config("special tokens must not be empty".into()));
            }
            if vocab.id_of(token.as_bytes()).is_some() {
                return Err(BpeError::Config(format!(
                    "special token {token:?} is duplicated or collides with a byte atom"
                )));
            }
            vocab.push(token.as_bytes().to_vec())?;
            vocab.special_count += 1;
        }
        Ok(vocab)
    }

    /// Total number of ids currently allocated.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// Never true: the byte alphabet is always present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Number of ids allocated before any merge.
    #[must_use]
    pub fn seed_len(&self) -> usize {
        BASE_VOCAB_SIZE + self.special_count
    }

    /// Ids assigned to special tokens, in configuration order.
    pub fn special_ids(&self) -> impl Iterator<Item = TokenId> + '_ {
        (BASE_VOCAB_SIZE..self.seed_len()).map(|id| id as TokenId)
    }

    /// Returns `true` when `id` belongs to a special token.
    #[must_use]
    pub fn is_special(&self, id: TokenId) -> bool {
        let idx = id as usize;
        idx >= BASE_VOCAB_SIZE && idx < self.seed_len()
    }

    /// Bytes backing `id`, if allocated.
    #[must_use]
    pub fn get(&self, id: TokenId) -> Option<&[u8]> {
        self.tokens.get(id as usize).map(Vec::as_slice)
    }

    /// Id owning exactly `bytes`, if any.
    #[must_use]
    pub fn id_of(&self, bytes: &[u8]) -> Option<TokenId> {
        self.lookup.get(bytes).copied()
    }

    /// All byte sequences indexed by id.
    #[must_use]
    pub fn tokens(&self) -> &[Vec<u8>] {
        &self.tokens
    }

    /// Concatenated bytes `left ++ right` for a candidate pair.
    ///
    /// Both ids must already be allocated.
    #[must_use]
    pub fn concat(&self, pair: Pair) -> Vec<u8> {
        let left = &self.tokens[pair.0 as usize];
        let right = &self.tokens[pair.1 as usize];
        let mut merged = Vec::with_capacity(left.len() + right.len());
        merged.extend_from_slice(left);
        merged.extend_from_slice(right);
        merged
    }

    /// Appends a new unique byte sequence and returns its id.
    pub fn push(&mut self, bytes: Vec<u8>) -> Result<TokenId> {
        let id = TokenId::try_from(self.tokens.len())
            .map_err(|_| BpeError::Internal("vocabulary size exceeded u32::MAX".into()))?;
        if self.lookup.contains_key(&bytes) {
            return Err(BpeError::Internal(format!(
                "byte sequence {:?} is already in the vocabulary",
                bstr::BStr::new(&bytes)
            )));
        }
        self.lookup.insert(bytes.clone(), id);
        self.tokens.push(bytes);
        Ok(id)
    }

    /// Decodes a sequence of ids back to the bytes they represent.
    pub fn decode(&self, ids: &[TokenId]) -> Result<Vec<u8>> {
        let mut bytes = Vec::with_capacity(ids.len());
        for &id in ids {
            let token = self.get(id).ok_or_else(|| {
                BpeError::Internal(format!(
                    "token id {id} exceeds vocab size {}",
                    self.tokens.len()
                ))
            })?;
            bytes.extend_from_slice(token);
        }
        Ok(bytes)
    }

    /// Consumes the vocabulary, returning the id-indexed byte sequences.
    #[must_use]
    pub fn into_tokens(self) -> Vec<Vec<u8>> {
        self.tokens
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeds_bytes_then_special_tokens_in_order() {
        let vocab = Vocabulary::with_special_tokens(&["<|endoftext|>", "<|pad|>"]).unwrap();
        assert_eq!(vocab.len(), 258);
        assert_eq!(vocab.seed_len(), 258);
        assert_eq!(vocab.get(0x41), Some(&b"A"[..]));
        assert_eq!(vocab.get(256), Some(&b"<|endoftext|>"[..]));
        assert_eq!(vocab.get(257), Some(&b"<|pad|>"[..]));
        assert_eq!(vocab.special_ids().collect::<Vec<_>>(), vec![256, 257]);
        assert!(vocab.is_special(257));
        assert!(!vocab.is_special(255));
    }

    #[test]
    fn rejects_duplicate_and_single_byte_special_tokens() {
        let err = Vocabulary::with_special_tokens(&["<|a|>", "<|a|>"]).unwrap_err();
        assert!(matches!(err, BpeError::Config(_)));
        let err = Vocabulary::with_special_tokens(&["x"]).unwrap_err();
        assert!(matches!(err, BpeError::Config(_)));
    }

    #[test]
    fn push_appends_and_refuses_duplicates() {
        let mut vocab = Vocabulary::with_special_tokens::<&str>(&[]).unwrap();
        let merged = vocab.concat((b'l' as TokenId, b'o' as TokenId));
        assert_eq!(merged, b"lo");
        let id = vocab.push(merged.clone()).unwrap();
        assert_eq!(id, 256);
        assert_eq!(vocab.id_of(b"lo"), Some(256));
        assert!(vocab.push(merged).is_err());
        assert_eq!(vocab.decode(&[256, b'w' as TokenId]).unwrap(), b"low");
        assert!(vocab.decode(&[999]).is_err());
    }
}
