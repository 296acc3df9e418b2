//! Configuration loading from TOML with environment variable resolution.
//!
//! Reads `config.toml` and deserializes into strongly-typed structs.
//! The DART API key is referenced by env-var name in the config and
//! resolved at runtime via `std::env::var`.

use anyhow::{bail, Context, Result};
use secrecy::SecretString;
use serde::Deserialize;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::engine::scorer::ScoreWeights;
use crate::engine::state::ScanParams;
use crate::types::{Consolidation, ReportKind};

/// Oldest fiscal year the statement endpoint serves.
pub const MIN_FISCAL_YEAR: u16 = 2015;

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub dart: DartConfig,
    pub scan: ScanConfig,
    pub cache: CacheConfig,
    pub scoring: ScoringConfig,
    pub export: ExportConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DartConfig {
    pub base_url: String,
    pub search_url: String,
    pub api_key_env: String,
    pub registry_timeout_secs: u64,
    pub statement_timeout_secs: u64,
    pub search_timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ScanConfig {
    pub fiscal_year: u16,
    pub report_kind: ReportKind,
    pub consolidation: Consolidation,
    pub batch_size: usize,
    pub burst_batches: usize,
    pub call_delay_ms: u64,
    /// Threshold in 억원.
    pub min_retained_earnings: f64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CacheConfig {
    pub registry_ttl_hours: i64,
    pub statement_ttl_mins: i64,
    pub search_ttl_mins: i64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ScoringConfig {
    pub retained_earnings_weight: f64,
    pub equity_weight: f64,
    #[serde(default)]
    pub quality_weight: f64,
    /// CSV of `corp_code,rating`; required when `quality_weight > 0`.
    #[serde(default)]
    pub quality_ratings_path: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ExportConfig {
    pub output_dir: PathBuf,
    pub state_file: String,
    pub top_n: usize,
}

impl DartConfig {
    pub fn registry_timeout(&self) -> Duration {
        Duration::from_secs(self.registry_timeout_secs)
    }

    pub fn statement_timeout(&self) -> Duration {
        Duration::from_secs(self.statement_timeout_secs)
    }

    pub fn search_timeout(&self) -> Duration {
        Duration::from_secs(self.search_timeout_secs)
    }
}

impl CacheConfig {
    pub fn registry_ttl(&self) -> chrono::Duration {
        chrono::Duration::hours(self.registry_ttl_hours)
    }

    pub fn statement_ttl(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.statement_ttl_mins)
    }

    pub fn search_ttl(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.search_ttl_mins)
    }
}

impl ScanConfig {
    pub fn call_delay(&self) -> Duration {
        Duration::from_millis(self.call_delay_ms)
    }
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        Self::from_toml(&contents).with_context(|| format!("Invalid config file: {path}"))
    }

    /// Parse and validate configuration from TOML text.
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(contents).context("Failed to parse config")?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations a scan cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.scan.batch_size == 0 {
            bail!("scan.batch_size must be at least 1");
        }
        if self.scan.burst_batches == 0 {
            bail!("scan.burst_batches must be at least 1");
        }
        if self.scan.fiscal_year < MIN_FISCAL_YEAR {
            bail!(
                "scan.fiscal_year {} is before {MIN_FISCAL_YEAR}, which DART does not serve",
                self.scan.fiscal_year
            );
        }
        if !self.scan.min_retained_earnings.is_finite() {
            bail!("scan.min_retained_earnings must be finite");
        }
        if self.cache.registry_ttl_hours < 0
            || self.cache.statement_ttl_mins < 0
            || self.cache.search_ttl_mins < 0
        {
            bail!("cache TTLs must not be negative");
        }
        self.score_weights()
            .validate()
            .map_err(|e| anyhow::anyhow!("scoring: {e}"))?;
        if self.scoring.quality_weight > 0.0 && self.scoring.quality_ratings_path.is_none() {
            bail!("scoring.quality_weight > 0 requires scoring.quality_ratings_path");
        }
        Ok(())
    }

    /// Parameters pinned for the lifetime of a scan.
    pub fn scan_params(&self) -> ScanParams {
        ScanParams {
            fiscal_year: self.scan.fiscal_year,
            report_kind: self.scan.report_kind,
            consolidation: self.scan.consolidation,
        }
    }

    pub fn score_weights(&self) -> ScoreWeights {
        ScoreWeights {
            retained_earnings: self.scoring.retained_earnings_weight,
            equity: self.scoring.equity_weight,
            quality: self.scoring.quality_weight,
        }
    }

    /// Resolve an environment variable name to its value.
    pub fn resolve_env(env_name: &str) -> Result<String> {
        std::env::var(env_name)
            .with_context(|| format!("Environment variable not set: {env_name}"))
    }

    /// The DART API key, resolved from `dart.api_key_env`.
    pub fn api_key(&self) -> Result<SecretString> {
        let key = Self::resolve_env(&self.dart.api_key_env)?;
        if key.trim().is_empty() {
            bail!("{} is set but empty", self.dart.api_key_env);
        }
        Ok(SecretString::new(key))
    }
}
