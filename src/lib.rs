//! Byte-level byte pair encoding (BPE) training library and CLI.
//!
//! The crate learns a vocabulary and an ordered merge table from a text corpus. Text is split
//! with the GPT-2 pre-tokenization pattern, every segment starts as a run of byte ids, and the
//! most frequent adjacent pair is merged repeatedly until the target vocabulary size is reached.
//! Configured special tokens are reserved right after the 256 byte ids and their marker (by
//! default `<|`) can never be synthesized by a merge.
//!
//! ```no_run
//! use tbpe::{IngestConfig, Trainer, TrainerConfig};
//!
//! # fn main() -> tbpe::Result<()> {
//! let trainer_cfg = TrainerConfig::builder()
//!     .target_vocab_size(4096)
//!     .special_tokens(["<|endoftext|>"])
//!     .show_progress(false)
//!     .build()?;
//! let trainer = Trainer::new(trainer_cfg);
//! let ingest_cfg = IngestConfig::default();
//! let artifacts = trainer.train_from_paths(&["/path/to/corpus"], &ingest_cfg)?;
//! artifacts.model.save_vocab_and_merges("out")?;
//! artifacts.model.save_huggingface("out/tokenizer.json")?;
//! # Ok(())
//! # }
//! ```
//!
//! The CLI is enabled by default through the `cli` feature.  Users targeting the
//! library portion only can disable default features to avoid the CLI
//! dependencies: `tbpe = { version = "...", default-features = false }`.

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    clippy::all,
    rust_2018_idioms,
    future_incompatible,
    unused_lifetimes,
    unreachable_pub
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::missing_panics_doc,
    clippy::missing_errors_doc,
    clippy::doc_markdown,
    clippy::multiple_crate_versions
)]

pub mod bytes;
pub mod config;
pub mod corpus;
pub mod error;
pub mod metrics;
pub mod model;
pub mod pretokenizer;
pub mod serialization;
pub mod special_tokens;
pub mod trainer;
pub mod vocab;

pub use config::{IngestConfig, TrainerBuilder, TrainerConfig};
pub use error::{BpeError, Result};
pub use metrics::{IterationMetrics, RejectReason, StopReason, TrainingMetrics};
pub use model::{BpeModel, Pair, TokenId};
pub use pretokenizer::{PreTokenizer, SegmentKind};
pub use trainer::{SegmentTable, Trainer, TrainerArtifacts};
pub use vocab::Vocabulary;
