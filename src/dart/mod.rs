//! DART (전자공시) integrations.
//!
//! - `registry`: the listed-company code list (ZIP of XML)
//! - `statement`: per-company full financial statements (JSON)
//! - `search`: keyword disclosure search (HTML), used for ESG monitoring
//!
//! Defines the `StatementSource` trait the batch engine consumes, so the
//! engine can run against the live client or an in-memory double.

pub mod registry;
pub mod statement;
pub mod search;

use async_trait::async_trait;

use crate::types::{RawStatement, ReportKind};

/// Why a statement fetch produced nothing usable.
///
/// Unavailability is an expected per-entity outcome (delisted,
/// non-reporting, wrong report kind), never a scan-level error.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum NoData {
    #[error("request failed: {0}")]
    Transport(String),

    #[error("HTTP {0}")]
    HttpStatus(u16),

    #[error("DART status {code}: {message}")]
    Status { code: String, message: String },

    #[error("malformed response: {0}")]
    Malformed(String),
}

/// Abstraction over the statement endpoint.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StatementSource: Send + Sync {
    /// Fetch one entity's statement for a fiscal year and report kind.
    async fn fetch(
        &self,
        corp_code: &str,
        fiscal_year: u16,
        report_kind: ReportKind,
    ) -> Result<RawStatement, NoData>;
}
