//! Shared types for the LP-SCOUT scanner.
//!
//! These types form the data model used across all modules: registry
//! entities, raw statements, extracted records and their scores. They
//! carry no I/O so that the DART clients, the engine and the exporter
//! can depend on them without circular references.

use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Report selection
// ---------------------------------------------------------------------------

/// Which periodic report a statement is requested from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportKind {
    Annual,
    Semiannual,
    Q1,
    Q3,
}

impl ReportKind {
    /// DART `reprt_code` query value.
    pub fn code(&self) -> &'static str {
        match self {
            ReportKind::Annual => "11011",
            ReportKind::Semiannual => "11012",
            ReportKind::Q1 => "11013",
            ReportKind::Q3 => "11014",
        }
    }
}

impl fmt::Display for ReportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportKind::Annual => write!(f, "annual"),
            ReportKind::Semiannual => write!(f, "semiannual"),
            ReportKind::Q1 => write!(f, "q1"),
            ReportKind::Q3 => write!(f, "q3"),
        }
    }
}

/// Consolidated (group) or standalone (parent-only) statements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Consolidation {
    Consolidated,
    Standalone,
}

impl Consolidation {
    /// DART `fs_div` query value.
    pub fn fs_div(&self) -> &'static str {
        match self {
            Consolidation::Consolidated => "CFS",
            Consolidation::Standalone => "OFS",
        }
    }
}

impl fmt::Display for Consolidation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.fs_div())
    }
}

// ---------------------------------------------------------------------------
// Registry entity
// ---------------------------------------------------------------------------

/// A listed company addressable through the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityRef {
    /// 8-digit DART corporation code (opaque registry key).
    pub corp_code: String,
    pub corp_name: String,
    /// 6-digit exchange ticker. Always non-empty for loaded entities.
    pub stock_code: String,
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}) [{}]", self.corp_name, self.stock_code, self.corp_code)
    }
}

// ---------------------------------------------------------------------------
// Raw statement
// ---------------------------------------------------------------------------

/// A line-item value as it arrives from the statement endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LineValue {
    Number(f64),
    Text(String),
}

/// One labeled account line.
#[derive(Debug, Clone, PartialEq)]
pub struct LineItem {
    pub label: String,
    pub value: LineValue,
}

impl LineItem {
    pub fn text(label: &str, value: &str) -> Self {
        Self {
            label: label.to_string(),
            value: LineValue::Text(value.to_string()),
        }
    }

    pub fn number(label: &str, value: f64) -> Self {
        Self {
            label: label.to_string(),
            value: LineValue::Number(value),
        }
    }
}

/// One entity's statement for a fiscal year, in source order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawStatement {
    pub items: Vec<LineItem>,
}

impl RawStatement {
    pub fn new(items: Vec<LineItem>) -> Self {
        Self { items }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// The three metrics pulled out of a statement, each resolved independently.
/// Values are in 억원 (10^8 KRW).
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ExtractedMetrics {
    pub retained_earnings: Option<f64>,
    pub total_equity: Option<f64>,
    pub revenue: Option<f64>,
}

impl ExtractedMetrics {
    pub fn is_empty(&self) -> bool {
        self.retained_earnings.is_none() && self.total_equity.is_none() && self.revenue.is_none()
    }
}

/// A candidate in the working set.
///
/// Retained earnings is the primary signal and is required: entities
/// whose statement does not yield it never become records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinancialRecord {
    pub corp_code: String,
    pub corp_name: String,
    pub stock_code: String,
    pub retained_earnings: f64,
    pub total_equity: Option<f64>,
    pub revenue: Option<f64>,
}

impl FinancialRecord {
    /// Build a record from an entity and its extracted metrics.
    /// Returns `None` when retained earnings did not resolve.
    pub fn from_metrics(entity: &EntityRef, metrics: ExtractedMetrics) -> Option<Self> {
        let retained_earnings = metrics.retained_earnings?;
        Some(Self {
            corp_code: entity.corp_code.clone(),
            corp_name: entity.corp_name.clone(),
            stock_code: entity.stock_code.clone(),
            retained_earnings,
            total_equity: metrics.total_equity,
            revenue: metrics.revenue,
        })
    }
}

impl fmt::Display for FinancialRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}) 이익잉여금: {} | 자본총계: {} | 매출액: {}",
            self.corp_name,
            self.stock_code,
            format_eok(Some(self.retained_earnings)),
            format_eok(self.total_equity),
            format_eok(self.revenue),
        )
    }
}

/// A record with its ranking scores (all in [0, 100]).
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredRecord {
    pub record: FinancialRecord,
    pub re_score: f64,
    pub equity_score: f64,
    /// Only set when the three-factor weighting is configured.
    pub quality_score: Option<f64>,
    pub composite_score: f64,
}

impl fmt::Display for ScoredRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[LP {:.1}] {}", self.composite_score, self.record)
    }
}

// ---------------------------------------------------------------------------
// Formatting
// ---------------------------------------------------------------------------

/// Format an amount in 억원 for operator display.
///
/// Amounts of 1조 (10,000억) or more are shown in 조원 with one decimal.
pub fn format_eok(value: Option<f64>) -> String {
    match value {
        Some(v) if v.is_finite() => {
            if v.abs() >= 10_000.0 {
                format!("{}조원", group_thousands(v / 10_000.0, 1))
            } else {
                format!("{}억원", group_thousands(v, 0))
            }
        }
        _ => "N/A".to_string(),
    }
}

fn group_thousands(value: f64, decimals: usize) -> String {
    let formatted = format!("{:.*}", decimals, value.abs());
    let (int_part, frac_part) = match formatted.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (formatted.as_str(), None),
    };

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let sign = if value < 0.0 && formatted.chars().any(|c| c != '0' && c != '.') {
        "-"
    } else {
        ""
    };
    match frac_part {
        Some(frac) => format!("{sign}{grouped}.{frac}"),
        None => format!("{sign}{grouped}"),
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Operator-visible failures. Everything else degrades to fewer results.
#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error("Registry unavailable: {0}")]
    SourceUnavailable(String),

    #[error("Export failed: {0}")]
    ExportFailure(String),
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
