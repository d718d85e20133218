//! Sequential batch processing with per-item failure isolation.

use crate::error::{EnvcryptError, Result};
use serde::Serialize;
use std::fmt::Display;
use tracing::{debug, info};

/// Outcome for one item of a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchResult {
    pub name: String,
    pub success: bool,
    pub files_processed: usize,
    pub error: Option<String>,
}

impl BatchResult {
    fn from_outcome(name: String, outcome: Result<usize>) -> Self {
        match outcome {
            Ok(files_processed) => Self {
                name,
                success: true,
                files_processed,
                error: None,
            },
            Err(err) => Self {
                name,
                success: false,
                files_processed: 0,
                error: Some(err.to_string()),
            },
        }
    }
}

/// Aggregate counts over a list of [`BatchResult`]s.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct BatchSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub total_files_processed: usize,
    pub overall_success: bool,
}

impl BatchSummary {
    pub fn from_results(results: &[BatchResult]) -> Self {
        let summary = results.iter().fold(Self::default(), |mut acc, r| {
            acc.total += 1;
            if r.success {
                acc.succeeded += 1;
            } else {
                acc.failed += 1;
            }
            acc.total_files_processed += r.files_processed;
            acc
        });
        Self {
            overall_success: summary.failed == 0,
            ..summary
        }
    }
}

/// Results in input order plus their summary.
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub results: Vec<BatchResult>,
    pub summary: BatchSummary,
}

impl BatchReport {
    /// Convert a report with failures into an error for the exit status.
    pub fn into_result(self) -> Result<Self> {
        if self.summary.overall_success {
            Ok(self)
        } else {
            Err(EnvcryptError::BatchFailed {
                failed: self.summary.failed,
                total: self.summary.total,
            })
        }
    }
}

/// Run `op` over `items` one after another.
///
/// An `Err` from one item is recorded in that item's result and the loop
/// moves on. Nothing is retried. `op` returns the number of files it wrote.
pub fn run_batch<T, F>(items: &[T], mut op: F) -> BatchReport
where
    T: Display,
    F: FnMut(&T) -> Result<usize>,
{
    let mut results = Vec::with_capacity(items.len());

    for item in items {
        let name = item.to_string();
        debug!(item = %name, "processing");
        let outcome = op(item);
        if let Err(err) = &outcome {
            info!(item = %name, error = %err, "item failed");
        }
        results.push(BatchResult::from_outcome(name, outcome));
    }

    let summary = BatchSummary::from_results(&results);
    debug!(
        total = summary.total,
        failed = summary.failed,
        files = summary.total_files_processed,
        "batch finished"
    );
    BatchReport { results, summary }
}

/// Run `op` on a single item, propagating its error unchanged.
pub fn run_single<T, F>(item: &T, mut op: F) -> Result<BatchReport>
where
    T: Display,
    F: FnMut(&T) -> Result<usize>,
{
    let files_processed = op(item)?;
    let results = vec![BatchResult::from_outcome(item.to_string(), Ok(files_processed))];
    let summary = BatchSummary::from_results(&results);
    Ok(BatchReport { results, summary })
}

/// How the user chose which environments to process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    All,
    One(String),
    Interactive,
}

/// Check that `--all`, `--env` and `--select` are not combined.
///
/// Returns `None` when nothing was selected.
pub fn validate_selection(
    all: bool,
    environment: Option<&str>,
    select: bool,
) -> Result<Option<Selection>> {
    match (all, environment, select) {
        (true, Some(_), _) => Err(EnvcryptError::ConflictingFlags(
            "--all cannot be combined with --env".to_string(),
        )),
        (true, None, true) => Err(EnvcryptError::ConflictingFlags(
            "--all cannot be combined with --select".to_string(),
        )),
        (false, Some(_), true) => Err(EnvcryptError::ConflictingFlags(
            "--env cannot be combined with --select".to_string(),
        )),
        (true, None, false) => Ok(Some(Selection::All)),
        (false, Some(env), false) => Ok(Some(Selection::One(env.to_string()))),
        (false, None, true) => Ok(Some(Selection::Interactive)),
        (false, None, false) => Ok(None),
    }
}
