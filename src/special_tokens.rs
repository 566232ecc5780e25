//! Special token inventory and the forbidden-marker merge rule.

use bstr::ByteSlice;
use rustc_hash::FxHashSet;

use crate::config::TrainerConfig;

/// Special tokens configured for a training run together with their delimiter marker.
#[derive(Debug, Clone)]
pub struct SpecialTokens {
    tokens: Vec<String>,
    encodings: FxHashSet<Vec<u8>>,
    marker: Vec<u8>,
}

impl SpecialTokens {
    /// Builds the inventory from ordered tokens and a marker.
    pub fn new<I, S>(tokens: I, marker: &str) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let tokens: Vec<String> = tokens.into_iter().map(Into::into).collect();
        let encodings = tokens.iter().map(|t| t.as_bytes().to_vec()).collect();
        Self {
            tokens,
            encodings,
            marker: marker.as_bytes().to_vec(),
        }
    }

    /// Builds the inventory described by a trainer configuration.
    #[must_use]
    pub fn from_config(cfg: &TrainerConfig) -> Self {
        Self::new(cfg.special_tokens.iter().cloned(), &cfg.special_token_marker)
    }

    /// Tokens in configuration order.
    #[must_use]
    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    /// Marker bytes guarded during merging.
    #[must_use]
    pub fn marker(&self) -> &[u8] {
        &self.marker
    }

    /// Returns `true` when `bytes` is exactly one of the configured special tokens.
    #[must_use]
    pub fn is_special(&self, bytes: &[u8]) -> bool {
        self.encodings.contains(bytes)
    }

    /// Returns `true` when a merge producing `merged` is allowed by the marker rule.
    ///
    /// Bytes containing the marker are only acceptable when they spell a configured special
    /// token exactly.
    #[must_use]
    pub fn permits(&self, merged: &[u8]) -> bool {
        merged.find(&self.marker).is_none() || self.is_special(merged)
    }
}

/// Deduplicates tokens in-place while preserving the first occurrence ordering.
pub fn dedup_in_place(tokens: &mut Vec<String>) {
    let mut seen = FxHashSet::default();
    tokens.retain(|token| seen.insert(token.clone()));
}
