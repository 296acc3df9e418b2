//! Keyword disclosure search, used for ESG monitoring.
//!
//! Posts a keyword and date range to DART's public search page and
//! scrapes the result table. This is best-effort enrichment: the page is
//! HTML meant for browsers, so layout changes yield empty results rather
//! than errors the scan has to care about.
//!
//! Endpoint: `POST https://dart.fss.or.kr/dsab007/search.ax` (form-encoded)

use anyhow::{anyhow, Context, Result};
use chrono::{Duration, NaiveDate};
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use serde::Serialize;
use tracing::{debug, info};

use crate::cache::{self, SharedCache};

/// Rows requested from the search page per query.
const PAGE_SIZE: &str = "50";

/// Keywords offered for ESG monitoring.
pub const ESG_KEYWORDS: &[&str] = &[
    "탄소중립",
    "RE100",
    "ESG경영",
    "지속가능경영",
    "친환경",
    "녹색금융",
];

/// One disclosure matching a keyword.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DisclosureHit {
    pub company: String,
    pub report: String,
    pub date: String,
    pub keyword: String,
}

type SearchKey = (String, NaiveDate, NaiveDate);

/// Keyword search client with a short-lived result cache.
pub struct DisclosureSearch {
    http: Client,
    url: String,
    cache: SharedCache<SearchKey, Vec<DisclosureHit>>,
}

impl DisclosureSearch {
    pub fn new(url: &str, timeout: std::time::Duration, ttl: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent("LP-SCOUT/0.1.0")
            .build()
            .context("Failed to build HTTP client for DART search")?;

        Ok(Self {
            http,
            url: url.to_string(),
            cache: cache::shared(ttl),
        })
    }

    /// Search disclosures mentioning `keyword` between `start` and `end`
    /// (inclusive), returning at most `max_results` hits in page order.
    pub async fn search(
        &self,
        keyword: &str,
        start: NaiveDate,
        end: NaiveDate,
        max_results: usize,
    ) -> Result<Vec<DisclosureHit>> {
        let key = (keyword.to_string(), start, end);
        let cached = self.cache.lock().ok().and_then(|mut c| c.get(&key));
        if let Some(mut hits) = cached {
            debug!(keyword, "Search cache hit");
            hits.truncate(max_results);
            return Ok(hits);
        }

        let start_date = start.format("%Y%m%d").to_string();
        let end_date = end.format("%Y%m%d").to_string();
        let form = [
            ("currentPage", "1"),
            ("keyword", keyword),
            ("dspType", "A"),
            ("maxResults", PAGE_SIZE),
            ("startDate", start_date.as_str()),
            ("endDate", end_date.as_str()),
        ];

        let resp = self
            .http
            .post(&self.url)
            .form(&form)
            .send()
            .await
            .context("DART search request failed")?;

        if !resp.status().is_success() {
            anyhow::bail!("DART search error {}", resp.status());
        }

        let html = resp.text().await.context("Failed to read DART search page")?;
        let hits = parse_results(&html, keyword)?;

        info!(keyword, hits = hits.len(), "Disclosure search complete");

        if let Ok(mut cache) = self.cache.lock() {
            cache.insert(key, hits.clone());
        }

        let mut hits = hits;
        hits.truncate(max_results);
        Ok(hits)
    }
}

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| anyhow!("invalid selector {css}: {e}"))
}

fn cell_text(row: &ElementRef<'_>, sel: &Selector) -> Option<String> {
    row.select(sel)
        .next()
        .map(|el| el.text().collect::<Vec<_>>().join(" "))
        .map(|s| s.split_whitespace().collect::<Vec<_>>().join(" "))
}

/// Scrape result rows. Rows without a company link are skipped.
pub fn parse_results(html: &str, keyword: &str) -> Result<Vec<DisclosureHit>> {
    let doc = Html::parse_document(html);
    let row_sel = selector("tr")?;
    let company_sel = selector("a.company")?;
    let report_sel = selector("a.second")?;
    let date_sel = selector("td.date")?;

    let hits = doc
        .select(&row_sel)
        .filter_map(|row| {
            let company = cell_text(&row, &company_sel)?;
            Some(DisclosureHit {
                company,
                report: cell_text(&row, &report_sel).unwrap_or_default(),
                date: cell_text(&row, &date_sel).unwrap_or_default(),
                keyword: keyword.to_string(),
            })
        })
        .collect();

    Ok(hits)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
