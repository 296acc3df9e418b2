//! Result accumulation.
//!
//! The working set is the deduplicated collection of records gathered so
//! far in a scan. Records are keyed by corporation code; merging a record
//! whose code is already present replaces it in place, so replaying a
//! batch never duplicates anything. Insertion order is preserved, which
//! keeps ranking tie-breaks deterministic.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::types::FinancialRecord;

/// Outcome of a merge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeSummary {
    pub inserted: usize,
    pub replaced: usize,
}

/// Duplicate-free, insertion-ordered set of records.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<FinancialRecord>", into = "Vec<FinancialRecord>")]
pub struct WorkingSet {
    records: Vec<FinancialRecord>,
    index: HashMap<String, usize>,
}

impl WorkingSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge records, replacing any with the same corporation code.
    pub fn merge<I>(&mut self, records: I) -> MergeSummary
    where
        I: IntoIterator<Item = FinancialRecord>,
    {
        let mut summary = MergeSummary::default();
        for record in records {
            match self.index.get(&record.corp_code) {
                Some(&pos) => {
                    self.records[pos] = record;
                    summary.replaced += 1;
                }
                None => {
                    self.index.insert(record.corp_code.clone(), self.records.len());
                    self.records.push(record);
                    summary.inserted += 1;
                }
            }
        }
        summary
    }

    /// Records with retained earnings at or above `min_retained_earnings`
    /// (in 억원), in working-set order.
    pub fn filter(&self, min_retained_earnings: f64) -> Vec<FinancialRecord> {
        self.records
            .iter()
            .filter(|r| r.retained_earnings >= min_retained_earnings)
            .cloned()
            .collect()
    }

    pub fn get(&self, corp_code: &str) -> Option<&FinancialRecord> {
        self.index.get(corp_code).map(|&pos| &self.records[pos])
    }

    pub fn contains(&self, corp_code: &str) -> bool {
        self.index.contains_key(corp_code)
    }

    pub fn records(&self) -> &[FinancialRecord] {
        &self.records
    }

    pub fn iter(&self) -> impl Iterator<Item = &FinancialRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// All records sorted by retained earnings, largest first.
    pub fn by_retained_earnings(&self) -> Vec<FinancialRecord> {
        let mut sorted = self.records.clone();
        sorted.sort_by(|a, b| {
            b.retained_earnings
                .partial_cmp(&a.retained_earnings)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        sorted
    }
}

impl From<Vec<FinancialRecord>> for WorkingSet {
    fn from(records: Vec<FinancialRecord>) -> Self {
        let mut set = WorkingSet::new();
        set.merge(records);
        set
    }
}

impl From<WorkingSet> for Vec<FinancialRecord> {
    fn from(set: WorkingSet) -> Self {
        set.records
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
