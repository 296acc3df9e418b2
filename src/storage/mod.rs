//! Persistence layer.
//!
//! Saves and loads the scan state to/from a JSON file so an operator can
//! resume a scan in a later session. The file is written after every
//! committed batch, never mid-batch.

use anyhow::{bail, Context, Result};
use std::path::Path;
use tracing::{debug, info};

use crate::engine::state::ScanState;

/// Default state file path.
pub const DEFAULT_STATE_FILE: &str = "lp_scout_state.json";

/// Save scan state to a JSON file.
///
/// Writes to a sibling temp file first and renames it over the target, so
/// an interrupted write never leaves a truncated state behind.
pub fn save_state(state: &ScanState, path: Option<&str>) -> Result<()> {
    let path = path.unwrap_or(DEFAULT_STATE_FILE);
    let json = serde_json::to_string_pretty(state).context("Failed to serialise scan state")?;

    let tmp = format!("{path}.tmp");
    std::fs::write(&tmp, &json).context(format!("Failed to write state to {tmp}"))?;
    std::fs::rename(&tmp, path).context(format!("Failed to move state into {path}"))?;

    debug!(
        path,
        cursor = state.cursor(),
        candidates = state.working_set().len(),
        "State saved"
    );
    Ok(())
}

/// Load scan state from a JSON file.
/// Returns None if the file doesn't exist (fresh start).
pub fn load_state(path: Option<&str>) -> Result<Option<ScanState>> {
    let path = path.unwrap_or(DEFAULT_STATE_FILE);

    if !Path::new(path).exists() {
        info!(path, "No saved scan found, starting fresh");
        return Ok(None);
    }

    let json = std::fs::read_to_string(path).context(format!("Failed to read state from {path}"))?;

    let state: ScanState =
        serde_json::from_str(&json).context(format!("Failed to parse state from {path}"))?;

    if state.cursor() > state.total() {
        bail!(
            "Corrupt state in {path}: cursor {} exceeds {} entities",
            state.cursor(),
            state.total()
        );
    }

    info!(
        path,
        scan_id = %state.scan_id,
        params = %state.params,
        cursor = state.cursor(),
        total = state.total(),
        candidates = state.working_set().len(),
        "Scan state loaded from disk"
    );

    Ok(Some(state))
}

/// Delete the state file (reset).
pub fn delete_state(path: Option<&str>) -> Result<()> {
    let path = path.unwrap_or(DEFAULT_STATE_FILE);
    if Path::new(path).exists() {
        std::fs::remove_file(path).context(format!("Failed to delete state file {path}"))?;
        info!(path, "Scan state deleted");
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
