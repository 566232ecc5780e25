//! Configuration builders controlling training and corpus ingestion.

use std::convert::TryFrom;

use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

use crate::error::{BpeError, Result};
use crate::vocab::BASE_VOCAB_SIZE;

/// Marker that opens every special token of the `<|name|>` family.
pub const DEFAULT_SPECIAL_TOKEN_MARKER: &str = "<|";

/// Configuration for byte-level BPE training.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrainerConfig {
    /// Target vocabulary size including the 256 base byte tokens and special tokens.
    pub target_vocab_size: usize,
    /// Special tokens inserted right after the byte alphabet, in this order.
    pub special_tokens: Vec<String>,
    /// Byte marker that merges may only synthesize when they rebuild an exact special token.
    pub special_token_marker: String,
    /// Cuts special tokens out of the corpus as atomic segments before pre-tokenization.
    pub isolate_special_tokens: bool,
    /// Enables per-iteration logging through the `log` facade.
    pub show_progress: bool,
    /// Hard cap on accepted merges; `None` trains until the target size or exhaustion.
    pub max_merges: Option<usize>,
}

impl TrainerConfig {
    /// Returns a builder initialised with [`TrainerConfig::default`].
    #[must_use]
    pub fn builder() -> TrainerBuilder {
        TrainerBuilder::default()
    }

    /// Number of ids allocated before the first merge: the byte alphabet plus special tokens.
    #[must_use]
    pub fn seed_vocab_size(&self) -> usize {
        BASE_VOCAB_SIZE + self.special_tokens.len()
    }

    /// Validates the invariants required for training.
    pub fn validate(&self) -> Result<()> {
        if self.target_vocab_size <= self.seed_vocab_size() {
            return Err(BpeError::Config(format!(
                "target_vocab_size ({}) must be greater than 256 + special tokens ({})",
                self.target_vocab_size,
                self.special_tokens.len()
            )));
        }
        let max_vocab = usize::try_from(u32::MAX).unwrap_or(usize::MAX);
        if self.target_vocab_size > max_vocab {
            return Err(BpeError::Config(format!(
                "target_vocab_size ({}) exceeds {max_vocab}, the maximum representable TokenId",
                self.target_vocab_size
            )));
        }
        let mut seen = FxHashSet::default();
        for token in &self.special_tokens {
            if token.is_empty() {
                return Err(BpeError::Config("special tokens must not be empty".into()));
            }
            if !seen.insert(token.as_str()) {
                return Err(BpeError::Config(format!(
                    "duplicate special token {token:?}"
                )));
            }
        }
        if self.special_token_marker.is_empty() {
            return Err(BpeError::Config(
                "special_token_marker must not be empty".into(),
            ));
        }
        Ok(())
    }
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            target_vocab_size: 10_000,
            special_tokens: vec!["<|endoftext|>".into()],
            special_token_marker: DEFAULT_SPECIAL_TOKEN_MARKER.into(),
            isolate_special_tokens: true,
            show_progress: true,
            max_merges: None,
        }
    }
}

/// Builder for [`TrainerConfig`].
#[derive(Debug, Default, Clone)]
pub struct TrainerBuilder {
    cfg: TrainerConfig,
}

impl TrainerBuilder {
    /// Creates a builder with [`TrainerConfig::default`] settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the desired vocabulary size (including base byte tokens).
    #[must_use]
    pub fn target_vocab_size(mut self, value: usize) -> Self {
        self.cfg.target_vocab_size = value;
        self
    }

    /// Overrides the ordered list of special tokens.
    #[must_use]
    pub fn special_tokens<I, S>(mut self, tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.cfg.special_tokens = tokens.into_iter().map(Into::into).collect();
        self
    }

    /// Overrides the special token marker guarded during merging.
    #[must_use]
    pub fn special_token_marker(mut self, marker: impl Into<String>) -> Self {
        self.cfg.special_token_marker = marker.into();
        self
    }

    /// Enables or disables cutting special tokens out of the corpus before pre-tokenization.
    #[must_use]
    pub fn isolate_special_tokens(mut self, enabled: bool) -> Self {
        self.cfg.isolate_special_tokens = enabled;
        self
    }

    /// Enables or disables per-iteration logging.
    #[must_use]
    pub fn show_progress(mut self, enabled: bool) -> Self {
        self.cfg.show_progress = enabled;
        self
    }

    /// Sets a hard limit on accepted merges.
    #[must_use]
    pub fn max_merges(mut self, value: Option<usize>) -> Self {
        self.cfg.max_merges = value;
        self
    }

    /// Finalises the builder, returning a validated [`TrainerConfig`].
    pub fn build(self) -> Result<TrainerConfig> {
        self.cfg.validate()?;
        Ok(self.cfg)
    }
}

/// Configuration controlling how text corpora are discovered on disk.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IngestConfig {
    /// Enables recursive directory traversal.
    pub recursive: bool,
    /// Follows symlinks encountered during traversal.
    pub follow_symlinks: bool,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            recursive: true,
            follow_symlinks: false,
        }
    }
}

impl IngestConfig {
    /// Returns a builder initialised with [`IngestConfig::default`].
    #[must_use]
    pub fn builder() -> IngestBuilder {
        IngestBuilder::default()
    }
}

/// Builder for [`IngestConfig`].
#[derive(Debug, Default, Clone)]
pub struct IngestBuilder {
    cfg: IngestConfig,
}

impl IngestBuilder {
    /// Creates a new builder with [`IngestConfig::default`] settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enables or disables recursive directory traversal.
    #[must_use]
    pub fn recursive(mut self, enabled: bool) -> Self {
        self.cfg.recursive = enabled;
        self
    }

    /// Enables or disables following of symlinks when traversing directories.
    #[must_use]
    pub fn follow_symlinks(mut self, enabled: bool) -> Self {
        self.cfg.follow_symlinks = enabled;
        self
    }

    /// Finalises the builder, returning the [`IngestConfig`].
    pub fn build(self) -> IngestConfig {
        self.cfg
    }
}
