//! Scan state.
//!
//! The only mutable state of a scan: the entity list, the cursor into it,
//! and the working set. It is passed by reference into the orchestrator
//! and persisted between operator sessions by `storage`, so a resumed
//! scan continues exactly where the previous session stopped.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::accumulator::{MergeSummary, WorkingSet};
use crate::types::{Consolidation, EntityRef, FinancialRecord, ReportKind};

/// What a scan is fetching. Fixed for the lifetime of a scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanParams {
    pub fiscal_year: u16,
    pub report_kind: ReportKind,
    pub consolidation: Consolidation,
}

impl fmt::Display for ScanParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FY{} {} {}", self.fiscal_year, self.report_kind, self.consolidation)
    }
}

/// Orchestration phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScanPhase {
    /// Entities remain and no batch is running.
    Idle,
    /// A batch request is being processed.
    Draining,
    /// Every entity has been processed.
    Complete,
}

impl fmt::Display for ScanPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanPhase::Idle => write!(f, "idle"),
            ScanPhase::Draining => write!(f, "draining"),
            ScanPhase::Complete => write!(f, "complete"),
        }
    }
}

/// Resumable state of one scan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanState {
    pub scan_id: Uuid,
    pub params: ScanParams,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    entities: Vec<EntityRef>,
    cursor: usize,
    working_set: WorkingSet,
    #[serde(skip)]
    draining: bool,
}

impl ScanState {
    /// Start a scan over `entities` with the cursor at 0.
    pub fn new(params: ScanParams, entities: Vec<EntityRef>) -> Self {
        let now = Utc::now();
        Self {
            scan_id: Uuid::new_v4(),
            params,
            started_at: now,
            updated_at: now,
            entities,
            cursor: 0,
            working_set: WorkingSet::new(),
            draining: false,
        }
    }

    pub fn entities(&self) -> &[EntityRef] {
        &self.entities
    }

    /// Number of entities already processed.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn total(&self) -> usize {
        self.entities.len()
    }

    pub fn remaining(&self) -> usize {
        self.total().saturating_sub(self.cursor)
    }

    pub fn is_complete(&self) -> bool {
        self.cursor >= self.total()
    }

    pub fn phase(&self) -> ScanPhase {
        if self.is_complete() {
            ScanPhase::Complete
        } else if self.draining {
            ScanPhase::Draining
        } else {
            ScanPhase::Idle
        }
    }

    pub fn working_set(&self) -> &WorkingSet {
        &self.working_set
    }

    /// Whether this scan was started with `params`.
    pub fn matches(&self, params: &ScanParams) -> bool {
        self.params == *params
    }

    /// The next unprocessed slice of at most `batch_size` entities.
    pub fn next_slice(&self, batch_size: usize) -> &[EntityRef] {
        let start = self.cursor.min(self.total());
        let end = start.saturating_add(batch_size).min(self.total());
        &self.entities[start..end]
    }

    /// Record a finished batch: merge its records and advance the cursor
    /// past the `processed` entities, whether or not they yielded data.
    pub fn commit_batch(
        &mut self,
        processed: usize,
        records: Vec<FinancialRecord>,
    ) -> MergeSummary {
        let summary = self.working_set.merge(records);
        self.cursor = self.cursor.saturating_add(processed).min(self.total());
        self.updated_at = Utc::now();
        summary
    }

    pub(crate) fn set_draining(&mut self, draining: bool) {
        self.draining = draining;
    }

    /// Snapshot of progress for the operator.
    pub fn status(&self) -> ScanStatus {
        ScanStatus {
            total: self.total(),
            completed: self.cursor,
            remaining: self.remaining(),
            candidates: self.working_set.len(),
            phase: self.phase(),
        }
    }
}

/// Progress snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanStatus {
    pub total: usize,
    pub completed: usize,
    pub remaining: usize,
    pub candidates: usize,
    pub phase: ScanPhase,
}

impl ScanStatus {
    /// Completed share in percent (0–100). An empty scan counts as done.
    pub fn progress_pct(&self) -> f64 {
        if self.total == 0 {
            100.0
        } else {
            self.completed as f64 / self.total as f64 * 100.0
        }
    }
}

impl fmt::Display for ScanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "총 상장기업 {}개 | 조회 완료 {}개 | 남은 기업 {}개 | LP 후보 {}개 | 진행률 {:.1}% ({})",
            self.total,
            self.completed,
            self.remaining,
            self.candidates,
            self.progress_pct(),
            self.phase,
        )
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
