//! Flat-file export of the working set.
//!
//! CSV, UTF-8 with a byte-order mark so spreadsheet tools pick the right
//! encoding for Korean names. Column order is fixed: identity fields,
//! metrics, then score fields when present. A header row is always
//! written, even for an empty export.

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::types::{FinancialRecord, ScanError, ScoredRecord};

/// UTF-8 byte-order mark.
pub const BOM: &[u8] = b"\xEF\xBB\xBF";

pub const RECORD_HEADER: &[&str] = &[
    "corp_code",
    "corp_name",
    "stock_code",
    "retained_earnings",
    "total_equity",
    "revenue",
];

pub const SCORED_HEADER: &[&str] = &[
    "corp_code",
    "corp_name",
    "stock_code",
    "retained_earnings",
    "total_equity",
    "revenue",
    "re_score",
    "equity_score",
    "quality_score",
    "lp_score",
];

/// One row of a scored export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredRow {
    pub corp_code: String,
    pub corp_name: String,
    pub stock_code: String,
    pub retained_earnings: f64,
    pub total_equity: Option<f64>,
    pub revenue: Option<f64>,
    pub re_score: f64,
    pub equity_score: f64,
    pub quality_score: Option<f64>,
    pub lp_score: f64,
}

impl From<&ScoredRecord> for ScoredRow {
    fn from(s: &ScoredRecord) -> Self {
        Self {
            corp_code: s.record.corp_code.clone(),
            corp_name: s.record.corp_name.clone(),
            stock_code: s.record.stock_code.clone(),
            retained_earnings: s.record.retained_earnings,
            total_equity: s.record.total_equity,
            revenue: s.record.revenue,
            re_score: s.re_score,
            equity_score: s.equity_score,
            quality_score: s.quality_score,
            lp_score: s.composite_score,
        }
    }
}

impl From<ScoredRow> for ScoredRecord {
    fn from(row: ScoredRow) -> Self {
        Self {
            record: FinancialRecord {
                corp_code: row.corp_code,
                corp_name: row.corp_name,
                stock_code: row.stock_code,
                retained_earnings: row.retained_earnings,
                total_equity: row.total_equity,
                revenue: row.revenue,
            },
            re_score: row.re_score,
            equity_score: row.equity_score,
            quality_score: row.quality_score,
            composite_score: row.lp_score,
        }
    }
}

// ---------------------------------------------------------------------------
// Serialisation
// ---------------------------------------------------------------------------

fn write_rows<T, I>(header: &[&str], rows: I) -> Result<Vec<u8>, ScanError>
where
    T: Serialize,
    I: IntoIterator<Item = T>,
{
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(BOM.to_vec());

    writer
        .write_record(header)
        .map_err(|e| ScanError::ExportFailure(format!("header: {e}")))?;
    for row in rows {
        writer
            .serialize(row)
            .map_err(|e| ScanError::ExportFailure(format!("row: {e}")))?;
    }

    writer
        .into_inner()
        .map_err(|e| ScanError::ExportFailure(format!("flush: {e}")))
}

/// Export unscored records.
pub fn export_records(records: &[FinancialRecord]) -> Result<Vec<u8>, ScanError> {
    write_rows(RECORD_HEADER, records)
}

/// Export scored records in their ranked order.
pub fn export_scored(scored: &[ScoredRecord]) -> Result<Vec<u8>, ScanError> {
    write_rows(SCORED_HEADER, scored.iter().map(ScoredRow::from))
}

fn strip_bom(bytes: &[u8]) -> &[u8] {
    bytes.strip_prefix(BOM).unwrap_or(bytes)
}

/// Read back an `export_records` file.
pub fn parse_records(bytes: &[u8]) -> Result<Vec<FinancialRecord>> {
    let mut reader = csv::Reader::from_reader(strip_bom(bytes));
    reader
        .deserialize::<FinancialRecord>()
        .map(|row| row.context("Failed to deserialize record row"))
        .collect()
}

/// Read back an `export_scored` file.
pub fn parse_scored(bytes: &[u8]) -> Result<Vec<ScoredRecord>> {
    let mut reader = csv::Reader::from_reader(strip_bom(bytes));
    reader
        .deserialize::<ScoredRow>()
        .map(|row| row.map(ScoredRecord::from).context("Failed to deserialize scored row"))
        .collect()
}

// ---------------------------------------------------------------------------
// Files
// ---------------------------------------------------------------------------

/// `potential_lp_{year}_{YYYYmmdd_HHMM}.csv`
pub fn candidates_file_name(fiscal_year: u16, at: NaiveDateTime) -> String {
    format!("potential_lp_{fiscal_year}_{}.csv", at.format("%Y%m%d_%H%M"))
}

/// `dart_all_data_{YYYYmmdd}.csv`
pub fn full_data_file_name(at: NaiveDateTime) -> String {
    format!("dart_all_data_{}.csv", at.format("%Y%m%d"))
}

/// Write an export into `dir`, creating it if needed.
pub fn write_export(dir: &Path, file_name: &str, bytes: &[u8]) -> Result<PathBuf, ScanError> {
    std::fs::create_dir_all(dir)
        .map_err(|e| ScanError::ExportFailure(format!("{}: {e}", dir.display())))?;
    let path = dir.join(file_name);
    std::fs::write(&path, bytes)
        .map_err(|e| ScanError::ExportFailure(format!("{}: {e}", path.display())))?;
    info!(path = %path.display(), bytes = bytes.len(), "Export written");
    Ok(path)
}

#[derive(Debug, Deserialize)]
struct RatingRow {
    corp_code: String,
    rating: f64,
}

/// Load external quality ratings (`corp_code,rating`). Non-finite ratings
/// are skipped.
pub fn read_quality_ratings(path: &Path) -> Result<HashMap<String, f64>> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("Failed to open quality ratings: {}", path.display()))?;

    let mut ratings = HashMap::new();
    for row in reader.deserialize() {
        let row: RatingRow = row.context("Failed to deserialize quality rating")?;
        if !row.rating.is_finite() {
            warn!(corp_code = %row.corp_code, "Skipping non-finite quality rating");
            continue;
        }
        ratings.insert(row.corp_code, row.rating);
    }

    info!(count = ratings.len(), path = %path.display(), "Quality ratings loaded");
    Ok(ratings)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
