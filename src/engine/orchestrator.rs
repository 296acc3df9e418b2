//! Batch orchestration.
//!
//! Walks the scan's entity list in fixed-size batches. For every entity
//! in a batch: fetch the statement, extract metrics, wait the fixed
//! inter-call delay (the upstream's implicit rate limit). Records are
//! merged and the cursor advanced only once the whole batch has run, so
//! the batch boundary is the unit of safe interruption.
//!
//! Entities that yield nothing still count as processed and are not
//! retried within the scan; revisiting them takes a fresh scan.

use std::ops::ControlFlow;
use std::time::Duration;
use tracing::{debug, info};

use super::extractor::MetricExtractor;
use super::state::{ScanPhase, ScanState};
use crate::dart::StatementSource;
use crate::types::{EntityRef, FinancialRecord};

/// Default entities per batch.
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// Default pause between upstream calls (~5 req/s).
pub const DEFAULT_CALL_DELAY: Duration = Duration::from_millis(200);

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

/// Per-entity progress inside a single batch.
#[derive(Debug, Clone, Copy)]
pub struct BatchProgress<'a> {
    /// 1-based position within the batch.
    pub index: usize,
    pub batch_len: usize,
    pub entity: &'a EntityRef,
}

/// Summary of one batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    /// 1-based batch number at the current batch size.
    pub batch_number: usize,
    /// Cursor before the batch.
    pub start: usize,
    /// Cursor after the batch.
    pub end: usize,
    pub processed: usize,
    /// Entities that produced a record.
    pub yielded: usize,
    /// Entities whose statement could not be fetched.
    pub no_data: usize,
    pub inserted: usize,
    pub replaced: usize,
}

/// Summary of a burst of batches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BurstReport {
    pub batches: Vec<BatchReport>,
    pub phase: ScanPhase,
}

impl BurstReport {
    pub fn processed(&self) -> usize {
        self.batches.iter().map(|b| b.processed).sum()
    }

    pub fn yielded(&self) -> usize {
        self.batches.iter().map(|b| b.yielded).sum()
    }
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

/// Drives fetch → extract → merge over a `ScanState`.
///
/// Must not be run concurrently against the same state; callers hold the
/// state by `&mut`, which enforces that.
pub struct BatchOrchestrator {
    source: Box<dyn StatementSource>,
    extractor: MetricExtractor,
    batch_size: usize,
    call_delay: Duration,
}

impl BatchOrchestrator {
    pub fn new(source: Box<dyn StatementSource>, batch_size: usize, call_delay: Duration) -> Self {
        Self {
            source,
            extractor: MetricExtractor::default(),
            batch_size: batch_size.max(1),
            call_delay,
        }
    }

    pub fn with_extractor(mut self, extractor: MetricExtractor) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Run one batch without per-entity progress.
    pub async fn run_batch(&self, state: &mut ScanState) -> BatchReport {
        self.run_batch_with_progress(state, |_| {}).await
    }

    /// Run one batch, reporting each entity before it is fetched.
    pub async fn run_batch_with_progress<F>(
        &self,
        state: &mut ScanState,
        mut on_progress: F,
    ) -> BatchReport
    where
        F: FnMut(BatchProgress<'_>),
    {
        let start = state.cursor();
        let batch_number = start / self.batch_size + 1;

        if state.is_complete() {
            debug!(cursor = start, "Scan complete, nothing to run");
            return BatchReport {
                batch_number,
                start,
                end: start,
                ..Default::default()
            };
        }

        let slice: Vec<EntityRef> = state.next_slice(self.batch_size).to_vec();
        let params = state.params;
        state.set_draining(true);

        info!(
            batch = batch_number,
            from = start + 1,
            to = start + slice.len(),
            total = state.total(),
            "Batch starting"
        );

        let mut records: Vec<FinancialRecord> = Vec::new();
        let mut no_data = 0usize;

        for (i, entity) in slice.iter().enumerate() {
            on_progress(BatchProgress {
                index: i + 1,
                batch_len: slice.len(),
                entity,
            });

            match self
                .source
                .fetch(&entity.corp_code, params.fiscal_year, params.report_kind)
                .await
            {
                Ok(statement) => {
                    let metrics = self.extractor.extract(&statement);
                    match FinancialRecord::from_metrics(entity, metrics) {
                        Some(record) => records.push(record),
                        None => debug!(
                            corp_code = %entity.corp_code,
                            corp_name = %entity.corp_name,
                            "No retained earnings in statement"
                        ),
                    }
                }
                Err(reason) => {
                    no_data += 1;
                    debug!(
                        corp_code = %entity.corp_code,
                        corp_name = %entity.corp_name,
                        %reason,
                        "Statement unavailable"
                    );
                }
            }

            if !self.call_delay.is_zero() {
                tokio::time::sleep(self.call_delay).await;
            }
        }

        let yielded = records.len();
        let summary = state.commit_batch(slice.len(), records);
        state.set_draining(false);

        let report = BatchReport {
            batch_number,
            start,
            end: state.cursor(),
            processed: slice.len(),
            yielded,
            no_data,
            inserted: summary.inserted,
            replaced: summary.replaced,
        };

        info!(
            batch = batch_number,
            processed = report.processed,
            yielded = report.yielded,
            no_data = report.no_data,
            inserted = report.inserted,
            cursor = report.end,
            total = state.total(),
            candidates = state.working_set().len(),
            "Batch complete"
        );

        report
    }

    /// Burst mode: run up to `count` batches, stopping early once the scan
    /// is complete.
    pub async fn run_batches(&self, state: &mut ScanState, count: usize) -> BurstReport {
        self.run_batches_until(state, count, |_, _| ControlFlow::Continue(()))
            .await
    }

    /// Burst mode with a checkpoint after every batch. The checkpoint sees
    /// the committed state (e.g. to persist it) and may stop the burst.
    pub async fn run_batches_until<F>(
        &self,
        state: &mut ScanState,
        count: usize,
        mut checkpoint: F,
    ) -> BurstReport
    where
        F: FnMut(&ScanState, &BatchReport) -> ControlFlow<()>,
    {
        let mut batches = Vec::with_capacity(count);

        for _ in 0..count {
            if state.is_complete() {
                break;
            }
            let report = self.run_batch(state).await;
            let flow = checkpoint(state, &report);
            batches.push(report);
            if flow.is_break() {
                info!(cursor = state.cursor(), "Burst stopped at batch boundary");
                break;
            }
        }

        if state.is_complete() {
            info!(
                total = state.total(),
                candidates = state.working_set().len(),
                "All entities processed"
            );
        }

        BurstReport {
            batches,
            phase: state.phase(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
