//! Full financial statement client.
//!
//! API docs: https://opendart.fss.or.kr/guide/detail.do?apiGrpCd=DS003&apiId=2019020
//! Endpoint: `GET {base}/fnlttSinglAcntAll.json`
//! Params: `crtfc_key`, `corp_code`, `bsns_year`, `reprt_code`, `fs_div`
//! Rate limit: undocumented; roughly 5 req/s sustained is tolerated.
//!
//! Every failure (transport, non-200, non-"000" status, bad JSON) collapses
//! to `NoData`: a missing statement is a normal per-company outcome.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Duration;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

use super::{NoData, StatementSource};
use crate::cache::{self, SharedCache};
use crate::types::{Consolidation, LineItem, LineValue, RawStatement, ReportKind};

/// Payload status for a successful query.
const STATUS_OK: &str = "000";

/// Payload status for "no data for this query". Stable, so it is cached.
const STATUS_NO_DATA: &str = "013";

// ---------------------------------------------------------------------------
// API response types (DART JSON → Rust)
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct StatementResponse {
    status: String,
    #[serde(default)]
    message: String,
    #[serde(default)]
    list: Vec<AccountLine>,
}

/// One row of `list`. Only the label and current-term amount are used.
#[derive(Debug, Deserialize)]
struct AccountLine {
    #[serde(default)]
    account_nm: String,
    /// 당기금액, thousands-separated string in KRW.
    #[serde(default)]
    thstrm_amount: Option<LineValue>,
}

type StatementKey = (String, u16, ReportKind);

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// DART statement client with an injected TTL cache.
pub struct StatementClient {
    http: Client,
    base_url: String,
    api_key: SecretString,
    consolidation: Consolidation,
    cache: SharedCache<StatementKey, Result<RawStatement, NoData>>,
    requests: AtomicU64,
}

impl StatementClient {
    pub fn new(
        base_url: &str,
        api_key: SecretString,
        consolidation: Consolidation,
        timeout: std::time::Duration,
        ttl: Duration,
    ) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent("LP-SCOUT/0.1.0")
            .build()
            .context("Failed to build HTTP client for DART statements")?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            consolidation,
            cache: cache::shared(ttl),
            requests: AtomicU64::new(0),
        })
    }

    /// Statement basis requested from the endpoint.
    pub fn consolidation(&self) -> Consolidation {
        self.consolidation
    }

    /// Network requests made so far (cache misses).
    pub fn request_count(&self) -> u64 {
        self.requests.load(Ordering::Relaxed)
    }

    async fn fetch_uncached(
        &self,
        corp_code: &str,
        fiscal_year: u16,
        report_kind: ReportKind,
    ) -> Result<RawStatement, NoData> {
        let url = format!(
            "{}/fnlttSinglAcntAll.json?crtfc_key={}&corp_code={}&bsns_year={}&reprt_code={}&fs_div={}",
            self.base_url,
            urlencoding::encode(self.api_key.expose_secret()),
            urlencoding::encode(corp_code),
            fiscal_year,
            report_kind.code(),
            self.consolidation.fs_div(),
        );

        self.requests.fetch_add(1, Ordering::Relaxed);

        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| NoData::Transport(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(NoData::HttpStatus(resp.status().as_u16()));
        }

        let body: StatementResponse = resp
            .json()
            .await
            .map_err(|e| NoData::Malformed(e.to_string()))?;

        into_statement(body)
    }
}

/// Convert a decoded response into a statement, checking the embedded status.
fn into_statement(body: StatementResponse) -> Result<RawStatement, NoData> {
    if body.status != STATUS_OK {
        return Err(NoData::Status {
            code: body.status,
            message: body.message,
        });
    }

    let items = body
        .list
        .into_iter()
        .map(|line| LineItem {
            label: line.account_nm,
            value: line.thstrm_amount.unwrap_or(LineValue::Text(String::new())),
        })
        .collect();

    Ok(RawStatement::new(items))
}

/// Whether an outcome is stable enough to reuse within the TTL.
fn is_cacheable(outcome: &Result<RawStatement, NoData>) -> bool {
    match outcome {
        Ok(_) => true,
        Err(NoData::Status { code, .. }) => code == STATUS_NO_DATA,
        Err(_) => false,
    }
}

#[async_trait]
impl StatementSource for StatementClient {
    async fn fetch(
        &self,
        corp_code: &str,
        fiscal_year: u16,
        report_kind: ReportKind,
    ) -> Result<RawStatement, NoData> {
        let key = (corp_code.to_string(), fiscal_year, report_kind);

        let cached = self.cache.lock().ok().and_then(|mut c| c.get(&key));
        if let Some(outcome) = cached {
            debug!(corp_code, fiscal_year, "Statement cache hit");
            return outcome;
        }

        let outcome = self.fetch_uncached(corp_code, fiscal_year, report_kind).await;

        if let Err(reason) = &outcome {
            debug!(corp_code, fiscal_year, %reason, "No statement");
        }

        if is_cacheable(&outcome) {
            if let Ok(mut cache) = self.cache.lock() {
                cache.insert(key, outcome.clone());
                debug!(
                    entries = cache.len(),
                    hits = cache.hits(),
                    misses = cache.misses(),
                    hit_rate = cache.hit_rate(),
                    "Statement cache updated"
                );
            }
        }

        outcome
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
