//! Listed-company registry loader.
//!
//! Downloads DART's corporation code list, a ZIP archive holding a single
//! `CORPCODE.xml`, and keeps only entities with an exchange ticker.
//!
//! API docs: https://opendart.fss.or.kr/guide/detail.do?apiGrpCd=DS001&apiId=2019018
//! Endpoint: `GET {base}/corpCode.xml?crtfc_key={key}`
//!
//! The list changes rarely, so results are cached for about a day. Two
//! loads inside the cache window return the identical sequence, which
//! keeps saved cursor positions meaningful.

use anyhow::{Context, Result};
use chrono::Duration;
use quick_xml::events::Event;
use quick_xml::Reader;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use std::io::{Cursor, Read};
use tracing::{debug, info};

use crate::cache::{self, SharedCache};
use crate::types::{EntityRef, ScanError};

/// Archive member holding the registry listing.
const CORP_CODE_MEMBER: &str = "CORPCODE.xml";

#[derive(Clone, Copy)]
enum Field {
    CorpCode,
    CorpName,
    StockCode,
}

/// Loads and caches the addressable entity list.
pub struct RegistryLoader {
    http: Client,
    base_url: String,
    api_key: SecretString,
    cache: SharedCache<String, Vec<EntityRef>>,
}

impl RegistryLoader {
    pub fn new(
        base_url: &str,
        api_key: SecretString,
        timeout: std::time::Duration,
        ttl: Duration,
    ) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent("LP-SCOUT/0.1.0")
            .build()
            .context("Failed to build HTTP client for DART registry")?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            cache: cache::shared(ttl),
        })
    }

    /// Load the listed entities, from cache when fresh.
    pub async fn load(&self) -> Result<Vec<EntityRef>, ScanError> {
        if let Some(cached) = self.cached() {
            debug!(count = cached.len(), "Registry cache hit");
            return Ok(cached);
        }

        let archive = self.download().await?;
        let xml = unpack_corp_codes(&archive)?;
        let entities = parse_corp_codes(&xml)?;

        if entities.is_empty() {
            return Err(ScanError::SourceUnavailable(
                "registry contained no listed entities".to_string(),
            ));
        }

        info!(count = entities.len(), "Registry loaded");

        if let Ok(mut cache) = self.cache.lock() {
            cache.insert(self.base_url.clone(), entities.clone());
        }

        Ok(entities)
    }

    /// Drop the cached listing so the next `load` downloads again.
    pub fn invalidate(&self) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.clear();
        }
    }

    fn cached(&self) -> Option<Vec<EntityRef>> {
        self.cache.lock().ok()?.get(&self.base_url)
    }

    async fn download(&self) -> Result<Vec<u8>, ScanError> {
        let url = format!(
            "{}/corpCode.xml?crtfc_key={}",
            self.base_url,
            urlencoding::encode(self.api_key.expose_secret()),
        );

        debug!(base_url = %self.base_url, "Downloading registry");

        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| ScanError::SourceUnavailable(format!("registry request failed: {e}")))?;

        if !resp.status().is_success() {
            return Err(ScanError::SourceUnavailable(format!(
                "registry HTTP {}",
                resp.status()
            )));
        }

        let bytes = resp
            .bytes()
            .await
            .map_err(|e| ScanError::SourceUnavailable(format!("registry body read failed: {e}")))?;

        Ok(bytes.to_vec())
    }
}

/// Extract `CORPCODE.xml` from the downloaded archive.
pub fn unpack_corp_codes(archive: &[u8]) -> Result<Vec<u8>, ScanError> {
    let mut zip = zip::ZipArchive::new(Cursor::new(archive))
        .map_err(|e| ScanError::SourceUnavailable(format!("registry is not a ZIP archive: {e}")))?;

    let mut member = zip.by_name(CORP_CODE_MEMBER).map_err(|e| {
        ScanError::SourceUnavailable(format!("{CORP_CODE_MEMBER} missing from archive: {e}"))
    })?;

    let mut xml = Vec::new();
    member
        .read_to_end(&mut xml)
        .map_err(|e| ScanError::SourceUnavailable(format!("failed to read {CORP_CODE_MEMBER}: {e}")))?;

    Ok(xml)
}

/// Parse the registry XML, keeping entries with a non-empty stock code,
/// in document order.
pub fn parse_corp_codes(xml: &[u8]) -> Result<Vec<EntityRef>, ScanError> {
    let mut reader = Reader::from_reader(xml);
    reader.config_mut().trim_text(true);

    let mut entities = Vec::new();
    let mut field: Option<Field> = None;
    let mut corp_code = String::new();
    let mut corp_name = String::new();
    let mut stock_code = String::new();
    let mut skipped = 0usize;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.name().as_ref() {
                b"list" => {
                    corp_code.clear();
                    corp_name.clear();
                    stock_code.clear();
                    field = None;
                }
                b"corp_code" => field = Some(Field::CorpCode),
                b"corp_name" => field = Some(Field::CorpName),
                b"stock_code" => field = Some(Field::StockCode),
                _ => field = None,
            },
            Ok(Event::Text(t)) => {
                if let Some(f) = field {
                    let text = t.unescape().map_err(|e| {
                        ScanError::SourceUnavailable(format!("registry XML text error: {e}"))
                    })?;
                    let text = text.trim();
                    match f {
                        Field::CorpCode => corp_code.push_str(text),
                        Field::CorpName => corp_name.push_str(text),
                        Field::StockCode => stock_code.push_str(text),
                    }
                }
            }
            Ok(Event::End(e)) => {
                field = None;
                if e.name().as_ref() == b"list" {
                    if corp_code.is_empty() || stock_code.is_empty() {
                        skipped += 1;
                    } else {
                        entities.push(EntityRef {
                            corp_code: corp_code.clone(),
                            corp_name: corp_name.clone(),
                            stock_code: stock_code.clone(),
                        });
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(ScanError::SourceUnavailable(format!(
                    "registry XML parse error at byte {}: {e}",
                    reader.buffer_position()
                )));
            }
            _ => {}
        }
    }

    debug!(listed = entities.len(), skipped, "Registry parsed");
    Ok(entities)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
