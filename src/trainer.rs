//! Core training loop producing the vocabulary and ordered merge table.

use std::time::Instant;
use std::{fmt, path::Path};

use bstr::ByteSlice;
use log::{debug, info, trace};

use crate::config::{IngestConfig, TrainerBuilder, TrainerConfig};
use crate::corpus::{decode_documents, load_documents};
use crate::error::{BpeError, Result};
use crate::metrics::{
    sample_rss_kb, IterationMetrics, RejectReason, RejectedMerge, StopReason, TrainingMetrics,
};
use crate::model::{BpeModel, Pair};
use crate::pretokenizer::PreTokenizer;
use crate::special_tokens::SpecialTokens;
use crate::vocab::Vocabulary;

mod index;
mod segments;
mod word;

use index::PairIndex;
pub use segments::SegmentTable;

/// High-level façade configuring and executing BPE training runs.
#[derive(Debug, Clone)]
pub struct Trainer {
    cfg: TrainerConfig,
}

/// Artifacts returned after a training session completes.
#[must_use]
#[derive(Debug, Clone)]
pub struct TrainerArtifacts {
    /// Trained BPE model.
    pub model: BpeModel,
    /// Detailed metrics captured during training.
    pub metrics: TrainingMetrics,
}

impl Trainer {
    /// Creates a new trainer for the supplied configuration.
    #[must_use]
    pub fn new(cfg: TrainerConfig) -> Self {
        Self { cfg }
    }

    /// Returns a [`TrainerBuilder`] with default settings.
    #[must_use]
    pub fn builder() -> TrainerBuilder {
        TrainerConfig::builder()
    }

    /// Returns an immutable reference to the underlying configuration.
    #[must_use]
    pub fn config(&self) -> &TrainerConfig {
        &self.cfg
    }

    /// Trains a model by loading files from disk according to [`IngestConfig`].
    pub fn train_from_paths<P: AsRef<Path>>(
        &self,
        inputs: &[P],
        ingest: &IngestConfig,
    ) -> Result<TrainerArtifacts> {
        let documents = load_documents(inputs, ingest)?;
        self.train_from_documents(&documents)
    }

    /// Trains a model from raw document bytes, which must be valid UTF-8.
    pub fn train_from_documents(&self, documents: &[Vec<u8>]) -> Result<TrainerArtifacts> {
        self.cfg.validate()?;
        let texts = decode_documents(documents)?;
        self.train_from_texts(&texts)
    }

    /// Trains a model from in-memory texts, each pre-tokenized as a separate document.
    pub fn train_from_texts<S: AsRef<str>>(&self, texts: &[S]) -> Result<TrainerArtifacts> {
        let mut segments = self.encode(texts)?;
        self.train_from_segments(&mut segments)
    }

    /// Pre-tokenizes `texts` and encodes them into the seed vocabulary of this configuration.
    ///
    /// The returned table can be handed to [`Trainer::train_from_segments`] and inspected
    /// afterwards, for example to decode the final segmentation.
    pub fn encode<S: AsRef<str>>(&self, texts: &[S]) -> Result<SegmentTable> {
        self.cfg.validate()?;
        let vocab = Vocabulary::with_special_tokens(&self.cfg.special_tokens)?;
        let pretokenizer = if self.cfg.isolate_special_tokens {
            PreTokenizer::with_special_tokens(&self.cfg.special_tokens)?
        } else {
            PreTokenizer::new()?
        };
        SegmentTable::encode(texts, &pretokenizer, &vocab)
    }

    /// Runs the merge loop over an encoded corpus, rewriting `segments` in place.
    ///
    /// `segments` must come fresh from [`Trainer::encode`] with the same special tokens; a table
    /// that already holds merged ids is refused with [`BpeError::Config`].
    pub fn train_from_segments(&self, segments: &mut SegmentTable) -> Result<TrainerArtifacts> {
        self.cfg.validate()?;
        let mut vocab = Vocabulary::with_special_tokens(&self.cfg.special_tokens)?;
        if segments.is_empty() {
            return Err(BpeError::Config(
                "corpus produced no segments but the target vocabulary requires merges".into(),
            ));
        }
        if let Some(id) = segments.max_id() {
            if id as usize >= vocab.len() {
                return Err(BpeError::Config(format!(
                    "segment table holds id {id} beyond the seed vocabulary of {}; \
                     it was already trained or encoded with other special tokens",
                    vocab.len()
                )));
            }
        }

        let specials = SpecialTokens::from_config(&self.cfg);
        let target = self.cfg.target_vocab_size;
        let max_new_tokens = target - vocab.len();
        let mut merges: Vec<Pair> = Vec::with_capacity(max_new_tokens.min(1 << 16));
        let mut metrics = TrainingMetrics::new(max_new_tokens.min(16_384));
        metrics.segments = segments.len();
        metrics.distinct_segments = segments.distinct_len();

        let training_start = Instant::now();
        let mut index = PairIndex::build(segments, &vocab);
        debug!(
            "indexed {} segments ({} distinct) with {} distinct pairs",
            segments.len(),
            segments.distinct_len(),
            index.distinct_pairs()
        );

        let stop_reason = loop {
            if vocab.len() >= target {
                break StopReason::Converged;
            }
            if let Some(limit) = self.cfg.max_merges {
                if merges.len() >= limit {
                    break StopReason::MaxMergesReached;
                }
            }

            let iteration_start = Instant::now();
            let Some((pair, frequency)) = index.pop_best() else {
                break StopReason::Exhausted;
            };

            let merged = vocab.concat(pair);
            if let Some(reason) = rejection(&merged, &specials, &vocab) {
                let left = vocab.get(pair.0).unwrap_or_default().to_vec();
                let right = vocab.get(pair.1).unwrap_or_default().to_vec();
                debug!(
                    "rejecting {:?} + {:?} (freq {frequency}): {reason:?}",
                    left.as_bstr(),
                    right.as_bstr()
                );
                index.exclude(pair);
                metrics.rejected.push(RejectedMerge {
                    left,
                    right,
                    frequency,
                    reason,
                });
                continue;
            }

            let new_token_id = vocab.push(merged)?;
            let total_merges = index.apply_merge(segments, pair, new_token_id, &vocab);
            merges.push(pair);
            let iteration = merges.len();

            if log::log_enabled!(log::Level::Trace) {
                trace!(
                    "merge {iteration}: {:?} + {:?} -> {new_token_id}",
                    vocab.get(pair.0).unwrap_or_default().as_bstr(),
                    vocab.get(pair.1).unwrap_or_default().as_bstr()
                );
            }
            if self.cfg.show_progress {
                info!(
                    "iter {:>6} freq {:>8} merges {:>8} distinct_pairs {:>8} vocab {:>8}",
                    iteration,
                    frequency,
                    total_merges,
                    index.distinct_pairs(),
                    vocab.len()
                );
            }

            metrics.iterations.push(IterationMetrics {
                iteration,
                best_frequency: frequency,
                merges_applied: total_merges,
                distinct_pairs: index.distinct_pairs(),
                elapsed_iteration: iteration_start.elapsed(),
                elapsed_total: training_start.elapsed(),
                rss_kb: sample_rss_kb(),
            });
        };

        metrics.stop_reason = stop_reason;
        let total_duration = training_start.elapsed();
        metrics.total_duration = total_duration;

        if self.cfg.show_progress {
            info!(
                "completed {} merges in {:.2?}; vocab size {}; stop reason {:?}",
                merges.len(),
                total_duration,
                vocab.len(),
                stop_reason
            );
        }
        if !metrics.rejected.is_empty() {
            debug!(
                "{} candidate pairs were excluded during training",
                index.excluded_len()
            );
        }

        let model = BpeModel::new(vocab.into_tokens(), merges, self.cfg.clone());
        Ok(TrainerArtifacts { model, metrics })
    }
}

/// Returns why merging into `merged` must be refused, if it must.
fn rejection(merged: &[u8], specials: &SpecialTokens, vocab: &Vocabulary) -> Option<RejectReason> {
    if !specials.permits(merged) {
        return Some(RejectReason::ForbiddenMarker);
    }
    if vocab.id_of(merged).is_some() {
        return Some(RejectReason::Duplicate);
    }
    None
}

impl fmt::Display for TrainerArtifacts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "BPE model with vocab size {}", self.model.vocab_size())?;
        writeln!(f, "Merges: {}", self.model.merges().len())?;
        writeln!(f, "Stop reason: {:?}", self.metrics.stop_reason)?;
        writeln!(f, "Total duration: {:?}", self.metrics.total_duration)?;
        Ok(())
    }
}
