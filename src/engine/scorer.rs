//! LP candidate scoring.
//!
//! Each scoring metric is min-max normalised across the scored set into
//! [0, 100]; the composite is a fixed weighted sum. Scores are derived
//! data, recomputed whenever the set or the filter threshold changes.

use std::collections::HashMap;
use tracing::debug;

use crate::types::{FinancialRecord, ScoredRecord};

/// Score assigned to every record when a metric is uniform across the set.
pub const NEUTRAL_SCORE: f64 = 50.0;

/// Composite weights. The default is the two-factor 0.7 / 0.3 split.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreWeights {
    pub retained_earnings: f64,
    pub equity: f64,
    /// Weight of the external quality rating; 0 disables the third factor.
    pub quality: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            retained_earnings: 0.7,
            equity: 0.3,
            quality: 0.0,
        }
    }
}

impl ScoreWeights {
    /// Weights must be non-negative and sum to 1 so composites stay in [0, 100].
    pub fn validate(&self) -> Result<(), String> {
        let parts = [self.retained_earnings, self.equity, self.quality];
        if parts.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(format!("score weights must be non-negative: {self:?}"));
        }
        let sum: f64 = parts.iter().sum();
        if (sum - 1.0).abs() > 1e-6 {
            return Err(format!("score weights must sum to 1.0, got {sum}"));
        }
        Ok(())
    }

    pub fn uses_quality(&self) -> bool {
        self.quality > 0.0
    }
}

/// Computes ranking scores over a set of records.
#[derive(Debug, Clone, Default)]
pub struct ScoreCalculator {
    weights: ScoreWeights,
    quality_ratings: HashMap<String, f64>,
}

impl ScoreCalculator {
    pub fn new(weights: ScoreWeights) -> Self {
        Self {
            weights,
            quality_ratings: HashMap::new(),
        }
    }

    /// Attach external quality ratings keyed by corporation code.
    /// Companies without a rating are scored as 0 before normalisation.
    pub fn with_quality_ratings(mut self, ratings: HashMap<String, f64>) -> Self {
        self.quality_ratings = ratings;
        self
    }

    pub fn weights(&self) -> &ScoreWeights {
        &self.weights
    }

    /// Score and rank records, highest composite first. Equal composites
    /// keep their input order.
    pub fn score(&self, records: &[FinancialRecord]) -> Vec<ScoredRecord> {
        if records.is_empty() {
            return Vec::new();
        }

        let re: Vec<f64> = records.iter().map(|r| r.retained_earnings).collect();
        let equity: Vec<f64> = records.iter().map(|r| r.total_equity.unwrap_or(0.0)).collect();

        let re_scores = min_max_scores(&re);
        let equity_scores = min_max_scores(&equity);
        let quality_scores = if self.weights.uses_quality() {
            let quality: Vec<f64> = records
                .iter()
                .map(|r| self.quality_ratings.get(&r.corp_code).copied().unwrap_or(0.0))
                .collect();
            Some(min_max_scores(&quality))
        } else {
            None
        };

        let mut scored: Vec<ScoredRecord> = records
            .iter()
            .enumerate()
            .map(|(i, record)| {
                let quality_score = quality_scores.as_ref().map(|q| q[i]);
                let composite = self.weights.retained_earnings * re_scores[i]
                    + self.weights.equity * equity_scores[i]
                    + self.weights.quality * quality_score.unwrap_or(0.0);
                ScoredRecord {
                    record: record.clone(),
                    re_score: re_scores[i],
                    equity_score: equity_scores[i],
                    quality_score,
                    composite_score: composite.clamp(0.0, 100.0),
                }
            })
            .collect();

        // Vec::sort_by is stable, so ties keep working-set order.
        scored.sort_by(|a, b| {
            b.composite_score
                .partial_cmp(&a.composite_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        debug!(
            count = scored.len(),
            top = scored.first().map(|s| s.composite_score),
            "Scoring complete"
        );

        scored
    }
}

/// Min-max normalise into [0, 100]. A uniform set scores `NEUTRAL_SCORE`.
pub fn min_max_scores(values: &[f64]) -> Vec<f64> {
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    if max <= min {
        return vec![NEUTRAL_SCORE; values.len()];
    }

    let range = max - min;
    values
        .iter()
        .map(|v| ((v - min) / range * 100.0).clamp(0.0, 100.0))
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
