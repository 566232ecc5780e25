//! Metrics describing the evolution of the training process.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Reason a training run terminated.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum StopReason {
    /// The configured target vocabulary size was reached.
    Converged,
    /// No selectable pair remained; the vocabulary may be smaller than requested.
    Exhausted,
    /// The configured merge budget was spent before either of the above.
    MaxMergesReached,
}

/// Why a candidate merge was refused.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum RejectReason {
    /// The merged bytes contain the special-token marker without spelling a special token.
    ForbiddenMarker,
    /// The merged bytes already exist in the vocabulary.
    Duplicate,
}

/// A candidate pair that was permanently excluded from selection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RejectedMerge {
    /// Bytes of the left token.
    pub left: Vec<u8>,
    /// Bytes of the right token.
    pub right: Vec<u8>,
    /// Pair frequency at the time it was selected.
    pub frequency: usize,
    /// Rule that refused the merge.
    pub reason: RejectReason,
}

/// Metrics captured for each accepted merge.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IterationMetrics {
    /// Sequential merge number (1-indexed).
    pub iteration: usize,
    /// Frequency of the merged pair.
    pub best_frequency: usize,
    /// Total number of occurrences replaced within the corpus.
    pub merges_applied: usize,
    /// Count of distinct pairs remaining after the iteration.
    pub distinct_pairs: usize,
    /// Execution time for the iteration.
    pub elapsed_iteration: Duration,
    /// Total time elapsed since training started.
    pub elapsed_total: Duration,
    /// Resident set size sample captured from `/proc/self/status` on Linux.
    pub rss_kb: Option<usize>,
}

/// Aggregate metrics produced by a training session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrainingMetrics {
    /// Per-iteration snapshots accrued during training.
    pub iterations: Vec<IterationMetrics>,
    /// Candidates refused during training, in the order they were considered.
    pub rejected: Vec<RejectedMerge>,
    /// Number of segments the corpus was split into.
    pub segments: usize,
    /// Number of distinct segment contents.
    pub distinct_segments: usize,
    /// Total duration of the training session.
    pub total_duration: Duration,
    /// Reason training terminated.
    pub stop_reason: StopReason,
}

impl TrainingMetrics {
    /// Creates an empty metrics container with pre-allocated capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            iterations: Vec::with_capacity(capacity),
            rejected: Vec::new(),
            segments: 0,
            distinct_segments: 0,
            total_duration: Duration::ZERO,
            stop_reason: StopReason::Exhausted,
        }
    }

    /// Serialises the metrics as a JSON report.
    pub fn to_json(&self, pretty: bool) -> crate::Result<String> {
        let json = if pretty {
            serde_json::to_string_pretty(self)?
        } else {
            serde_json::to_string(self)?
        };
        Ok(json)
    }
}

#[cfg(target_os = "linux")]
fn current_rss_kb() -> Option<usize> {
    use std::fs::File;
    use std::io::{BufRead, BufReader};

    let file = File::open("/proc/self/status").ok()?;
    for line in BufReader::new(file).lines().map_while(Result::ok) {
        if let Some(rest) = line.strip_prefix("VmRSS:") {
            let value = rest
                .split_whitespace()
                .find_map(|part| part.parse::<usize>().ok());
            return value;
        }
    }
    None
}

#[cfg(not(target_os = "linux"))]
fn current_rss_kb() -> Option<usize> {
    None
}

/// Samples the current resident set size (RSS) on supported platforms.
pub fn sample_rss_kb() -> Option<usize> {
    current_rss_kb()
}
