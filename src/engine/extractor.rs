//! Metric extraction from raw statements.
//!
//! Statements arrive as an unordered list of labeled account lines whose
//! naming varies across filers. Each target metric has an ordered list of
//! label synonyms; the first synonym found (substring match on the native
//! label) supplies the value. Metrics resolve independently: a failure on
//! one never affects the others.

use crate::types::{ExtractedMetrics, LineValue, RawStatement};

/// Statements report in KRW; the rest of the system works in 억원.
pub const KRW_PER_EOK: f64 = 100_000_000.0;

/// The metrics the scanner extracts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Metric {
    RetainedEarnings,
    TotalEquity,
    Revenue,
}

/// A metric and its label synonyms in priority order.
#[derive(Debug)]
pub struct MetricRule {
    pub metric: Metric,
    pub synonyms: &'static [&'static str],
}

/// Label rules, evaluated in order per metric.
pub const METRIC_RULES: &[MetricRule] = &[
    MetricRule {
        metric: Metric::RetainedEarnings,
        synonyms: &["이익잉여금", "이익(손실)잉여금"],
    },
    MetricRule {
        metric: Metric::TotalEquity,
        synonyms: &["자본총계", "자본 총계"],
    },
    MetricRule {
        metric: Metric::Revenue,
        synonyms: &["매출액", "수익(매출액)", "영업수익"],
    },
];

/// Resolves the target metrics from a statement.
#[derive(Debug, Clone)]
pub struct MetricExtractor {
    rules: &'static [MetricRule],
    unit_divisor: f64,
}

impl Default for MetricExtractor {
    fn default() -> Self {
        Self {
            rules: METRIC_RULES,
            unit_divisor: KRW_PER_EOK,
        }
    }
}

impl MetricExtractor {
    pub fn new(rules: &'static [MetricRule], unit_divisor: f64) -> Self {
        Self {
            rules,
            unit_divisor,
        }
    }

    /// Extract all metrics. Unresolved fields are `None`.
    pub fn extract(&self, statement: &RawStatement) -> ExtractedMetrics {
        ExtractedMetrics {
            retained_earnings: self.resolve(statement, Metric::RetainedEarnings),
            total_equity: self.resolve(statement, Metric::TotalEquity),
            revenue: self.resolve(statement, Metric::Revenue),
        }
    }

    /// Resolve one metric. For each synonym in priority order, the first
    /// line whose label contains it is parsed; a line that fails to parse
    /// falls through to the next synonym.
    pub fn resolve(&self, statement: &RawStatement, metric: Metric) -> Option<f64> {
        let rule = self.rules.iter().find(|r| r.metric == metric)?;

        rule.synonyms.iter().find_map(|synonym| {
            let item = statement
                .items
                .iter()
                .find(|item| item.label.contains(synonym))?;
            parse_amount(&item.value).map(|krw| krw / self.unit_divisor)
        })
    }
}

/// Parse a statement amount in its native unit.
///
/// Accepts thousands-separated text (`"1,234,500"`, `"-12,000"`) or a
/// number. Empty, non-numeric and non-finite values are `None`.
pub fn parse_amount(value: &LineValue) -> Option<f64> {
    let parsed = match value {
        LineValue::Number(n) => *n,
        LineValue::Text(s) => {
            let cleaned: String = s.trim().chars().filter(|c| *c != ',').collect();
            if cleaned.is_empty() {
                return None;
            }
            cleaned.parse::<f64>().ok()?
        }
    };
    parsed.is_finite().then_some(parsed)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
