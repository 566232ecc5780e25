//! Model types and helpers for working with trained BPE vocabularies.

use std::path::Path;

use ahash::AHashMap;
use tokenizers::decoders::DecoderWrapper;
use tokenizers::models::bpe::BPE;
use tokenizers::pre_tokenizers::byte_level::ByteLevel;
use tokenizers::pre_tokenizers::PreTokenizerWrapper;
use tokenizers::tokenizer::AddedToken;
use tokenizers::Tokenizer;

use crate::bytes::bytes_to_string;
use crate::config::TrainerConfig;
use crate::error::{BpeError, Result};
use crate::serialization::{gpt2, save_huggingface_tokenizer, tokenizer_json};
use crate::vocab::BASE_VOCAB_SIZE;

/// Token identifier used throughout the crate.
pub type TokenId = u32;
/// Merge pair encoded as `(left, right)` token identifiers.
pub type Pair = (TokenId, TokenId);

/// Trained BPE model containing the learned vocabulary and merge table.
#[must_use]
#[derive(Debug, Clone)]
pub struct BpeModel {
    token_bytes: Vec<Vec<u8>>,
    merges: Vec<Pair>,
    special_tokens: Vec<String>,
    config: TrainerConfig,
}

impl BpeModel {
    /// Constructs a new model from the supplied tokens, merges, and configuration.
    pub fn new(token_bytes: Vec<Vec<u8>>, merges: Vec<Pair>, config: TrainerConfig) -> Self {
        Self {
            token_bytes,
            merges,
            special_tokens: config.special_tokens.clone(),
            config,
        }
    }

    /// Returns the bytes backing every id, indexed by id.
    #[must_use]
    pub fn token_bytes(&self) -> &[Vec<u8>] {
        &self.token_bytes
    }

    /// Returns the bytes backing `id`, if it exists.
    #[must_use]
    pub fn token(&self, id: TokenId) -> Option<&[u8]> {
        self.token_bytes.get(id as usize).map(Vec::as_slice)
    }

    /// Returns the merge table encoded as `(left, right)` token identifiers.
    #[must_use]
    pub fn merges(&self) -> &[Pair] {
        &self.merges
    }

    /// Returns the merge table as `(left bytes, right bytes)` in application order.
    #[must_use]
    pub fn merge_bytes(&self) -> Vec<(Vec<u8>, Vec<u8>)> {
        self.merges
            .iter()
            .map(|&(left, right)| {
                (
                    self.token_bytes[left as usize].clone(),
                    self.token_bytes[right as usize].clone(),
                )
            })
            .collect()
    }

    /// Returns the configured special tokens, which occupy ids `256..256 + n`.
    #[must_use]
    pub fn special_tokens(&self) -> &[String] {
        &self.special_tokens
    }

    /// Returns the [`TrainerConfig`] used to produce the model.
    #[must_use]
    pub fn trainer_config(&self) -> &TrainerConfig {
        &self.config
    }

    /// Returns the total vocabulary size including special tokens.
    #[must_use]
    pub fn vocab_size(&self) -> usize {
        self.token_bytes.len()
    }

    /// Concatenates the bytes of `ids`.
    pub fn decode(&self, ids: &[TokenId]) -> Result<Vec<u8>> {
        let mut bytes = Vec::new();
        for &id in ids {
            let token = self.token(id).ok_or_else(|| {
                BpeError::Internal(format!(
                    "token id {id} exceeds vocab size {}",
                    self.token_bytes.len()
                ))
            })?;
            bytes.extend_from_slice(token);
        }
        Ok(bytes)
    }

    /// Serialized string for `idx`: special tokens verbatim, everything else through the
    /// byte-level alphabet.
    pub(crate) fn token_string(&self, idx: usize) -> String {
        if idx >= BASE_VOCAB_SIZE && idx < BASE_VOCAB_SIZE + self.special_tokens.len() {
            return self.special_tokens[idx - BASE_VOCAB_SIZE].clone();
        }
        bytes_to_string(&self.token_bytes[idx])
    }

    /// Builds a Hugging Face [`Tokenizer`] representing the trained model.
    ///
    /// The tokenizer uses the byte-level pre-tokenizer, whose splitting regex matches the one
    /// used during training.
    pub fn build_tokenizer(&self) -> Result<Tokenizer> {
        let vocab: AHashMap<String, TokenId> = (0..self.token_bytes.len())
            .map(|idx| (self.token_string(idx), idx as TokenId))
            .collect();
        if vocab.len() != self.token_bytes.len() {
            return Err(BpeError::Tokenizers(
                "a special token collides with the byte-level rendering of another token".into(),
            ));
        }

        let merges: Vec<(String, String)> = self
            .merges
            .iter()
            .map(|&(left, right)| {
                (
                    self.token_string(left as usize),
                    self.token_string(right as usize),
                )
            })
            .collect();

        let bpe = BPE::builder()
            .vocab_and_merges(vocab, merges)
            .build()
            .map_err(|err| BpeError::Tokenizers(err.to_string()))?;
        let mut tokenizer = Tokenizer::new(bpe);

        let byte_level = ByteLevel::default().add_prefix_space(false);
        tokenizer.with_pre_tokenizer(Some(PreTokenizerWrapper::ByteLevel(byte_level)));
        tokenizer.with_decoder(Some(DecoderWrapper::ByteLevel(byte_level)));

        if !self.special_tokens.is_empty() {
            let added = self
                .special_tokens
                .iter()
                .map(|token| AddedToken::from(token.clone(), true))
                .collect::<Vec<_>>();
            tokenizer.add_special_tokens(&added);
        }

        Ok(tokenizer)
    }

    /// Serialises the tokenizer to disk in Hugging Face JSON format.
    pub fn save_huggingface<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        save_huggingface_tokenizer(self, path, false)
    }

    /// Serialises the tokenizer to a JSON string in Hugging Face format.
    pub fn to_huggingface_json(&self, pretty: bool) -> Result<String> {
        tokenizer_json(self, pretty)
    }

    /// Writes `vocab.json` and `merges.txt` into `dir`.
    pub fn save_vocab_and_merges<P: AsRef<Path>>(&self, dir: P) -> Result<()> {
        gpt2::save_vocab_and_merges(self, dir)
    }

    /// Creates a derived model trimmed to the requested vocabulary size while preserving merge order.
    ///
    /// Because ids are only ever appended, the result equals what training with
    /// `target_vocab_size` would have produced.
    pub fn derive_with_vocab(&self, target_vocab_size: usize) -> Result<Self> {
        let min_vocab = BASE_VOCAB_SIZE + self.special_tokens.len();
        if target_vocab_size < min_vocab {
            return Err(BpeError::Config(format!(
                "requested family vocab {target_vocab_size} is smaller than required minimum {min_vocab}"
            )));
        }
        let current_total = self.vocab_size();
        if target_vocab_size > current_total {
            return Err(BpeError::Config(format!(
                "requested family vocab {target_vocab_size} exceeds trained size {current_total}"
            )));
        }

        let target_merges = target_vocab_size - min_vocab;
        let token_bytes = self.token_bytes[..target_vocab_size].to_vec();
        let merges = self.merges[..target_merges].to_vec();

        let mut config = self.config.clone();
        config.target_vocab_size = target_vocab_size;
        if let Some(limit) = config.max_merges {
            config.max_merges = Some(limit.min(target_merges));
        }

        Ok(BpeModel::new(token_bytes, merges, config))
    }
}
