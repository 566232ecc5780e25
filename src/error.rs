//! Error handling utilities shared across the crate.

use std::path::PathBuf;

use thiserror::Error;

/// Convenient result type used throughout the crate.
pub type Result<T, E = BpeError> = std::result::Result<T, E>;

/// Domain-specific error describing failures during configuration, ingestion, or persistence.
///
/// Every variant is raised before the merge loop starts or after it finishes; the loop itself
/// has no failure path.
#[derive(Debug, Error)]
pub enum BpeError {
    /// Training configuration or corpus shape failed validation.
    #[error("invalid configuration: {0}")]
    Config(String),
    /// Corpus bytes are not valid UTF-8 text.
    #[error("document {document} is not valid UTF-8 (first invalid byte at offset {offset})")]
    Encoding {
        /// Index of the offending document in the order it was supplied.
        document: usize,
        /// Byte offset of the first invalid sequence within that document.
        offset: usize,
    },
    /// The pre-tokenization pattern failed to compile or match.
    #[error("pre-tokenizer pattern error: {0}")]
    Pattern(String),
    /// Filesystem IO error with optional context path.
    #[error("io error while processing {path:?}: {source}")]
    Io {
        /// Underlying IO error returned by the standard library.
        source: std::io::Error,
        /// Target path associated with the IO failure if available.
        path: Option<PathBuf>,
    },
    /// Error bubbled up from the `tokenizers` crate.
    #[error("huggingface tokenizers error: {0}")]
    Tokenizers(String),
    /// Serialization or deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(String),
    /// Catch-all variant for invariants that should not occur.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<tokenizers::Error> for BpeError {
    fn from(err: tokenizers::Error) -> Self {
        Self::Tokenizers(err.to_string())
    }
}

impl From<serde_json::Error> for BpeError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<fancy_regex::Error> for BpeError {
    fn from(err: fancy_regex::Error) -> Self {
        Self::Pattern(err.to_string())
    }
}

impl BpeError {
    /// Helper constructor that attaches an optional path when wrapping IO errors.
    pub fn io(source: std::io::Error, path: Option<PathBuf>) -> Self {
        Self::Io { source, path }
    }

    /// Builds an [`BpeError::Encoding`] from a failed UTF-8 validation.
    pub fn encoding(document: usize, err: std::str::Utf8Error) -> Self {
        Self::Encoding {
            document,
            offset: err.valid_up_to(),
        }
    }
}
