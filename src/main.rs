//! LP-SCOUT: batched DART financial scan for potential LP candidates
//!
//! Entry point. Loads configuration, initialises structured logging,
//! restores the scan state from disk (or loads the registry and starts a
//! fresh scan), and runs batches with state saved at every boundary.

use anyhow::{bail, Result};
use chrono::Local;
use clap::{Parser, Subcommand};
use std::ops::ControlFlow;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{error, info, warn};

use lp_scout::config::AppConfig;
use lp_scout::dart::registry::RegistryLoader;
use lp_scout::dart::search::{DisclosureSearch, ESG_KEYWORDS};
use lp_scout::dart::statement::StatementClient;
use lp_scout::engine::orchestrator::BatchOrchestrator;
use lp_scout::engine::scorer::ScoreCalculator;
use lp_scout::engine::state::ScanState;
use lp_scout::export;
use lp_scout::storage;
use lp_scout::types::{format_eok, ScoredRecord};

const BANNER: &str = r#"
 _     ____        ____   ____ ___  _   _ _____
| |   |  _ \      / ___| / ___/ _ \| | | |_   _|
| |   | |_) |____ \___ \| |  | | | | | | | | |
| |___|  __/_____| ___) | |__| |_| | |_| | | |
|_____|_|         |____/ \____\___/ \___/  |_|

  Potential LP screening over DART financial statements
  v0.1.0
"#;

/// Max hits shown per search keyword.
const SEARCH_MAX_RESULTS: usize = 30;

#[derive(Debug, Parser)]
#[command(name = "lp-scout", version, about = "Batched DART scan for potential LP candidates")]
struct Cli {
    /// Path to the TOML configuration.
    #[arg(long, default_value = "config.toml")]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the next batch (with per-company progress), or a burst of batches.
    Scan {
        /// Run N batches back to back.
        #[arg(long, conflicts_with = "burst")]
        batches: Option<usize>,
        /// Run `scan.burst_batches` batches back to back.
        #[arg(long)]
        burst: bool,
    },
    /// Show scan progress.
    Status,
    /// Export candidates, or with --all the full working set.
    Export {
        #[arg(long)]
        all: bool,
    },
    /// Search recent disclosures by keyword (all ESG keywords if omitted).
    Search {
        keyword: Option<String>,
        /// Look back this many days.
        #[arg(long, default_value_t = 90)]
        days: i64,
    },
    /// Delete the saved scan so the next scan starts from the beginning.
    Reset,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    let cli = Cli::parse();
    init_logging();

    let cfg = AppConfig::load(&cli.config)?;

    match cli.command {
        Command::Scan { batches, burst } => {
            println!("{BANNER}");
            let burst = batches.or(burst.then_some(cfg.scan.burst_batches));
            run_scan(&cfg, burst).await
        }
        Command::Status => show_status(&cfg),
        Command::Export { all } => run_export(&cfg, all),
        Command::Search { keyword, days } => run_search(&cfg, keyword, days).await,
        Command::Reset => {
            storage::delete_state(Some(&cfg.export.state_file))?;
            println!("Scan state cleared. The next scan reloads the registry.");
            Ok(())
        }
    }
}

// ---------------------------------------------------------------------------
// scan
// ---------------------------------------------------------------------------

/// Resume or start a scan, run one batch (or a burst), then export.
async fn run_scan(cfg: &AppConfig, burst: Option<usize>) -> Result<()> {
    let api_key = cfg.api_key()?;
    let params = cfg.scan_params();
    let state_path = cfg.export.state_file.as_str();

    let mut state = match storage::load_state(Some(state_path))? {
        Some(s) if !s.matches(&params) => {
            bail!(
                "Saved scan is for {}, but config asks for {params}. Run `lp-scout reset` first.",
                s.params
            );
        }
        Some(s) => {
            info!(scan_id = %s.scan_id, cursor = s.cursor(), total = s.total(), "Resuming scan");
            s
        }
        None => {
            let registry = RegistryLoader::new(
                &cfg.dart.base_url,
                api_key.clone(),
                cfg.dart.registry_timeout(),
                cfg.cache.registry_ttl(),
            )?;
            let entities = registry.load().await?;
            let s = ScanState::new(params, entities);
            info!(scan_id = %s.scan_id, total = s.total(), %params, "Fresh scan");
            storage::save_state(&s, Some(state_path))?;
            s
        }
    };

    if state.is_complete() {
        info!("Scan already complete. Run `lp-scout reset` to start over.");
    } else {
        let client = StatementClient::new(
            &cfg.dart.base_url,
            api_key,
            params.consolidation,
            cfg.dart.statement_timeout(),
            cfg.cache.statement_ttl(),
        )?;
        let orchestrator =
            BatchOrchestrator::new(Box::new(client), cfg.scan.batch_size, cfg.scan.call_delay());

        match burst {
            None => {
                orchestrator
                    .run_batch_with_progress(&mut state, |p| {
                        println!("  [{:>3}/{}] {}", p.index, p.batch_len, p.entity.corp_name);
                    })
                    .await;
                storage::save_state(&state, Some(state_path))?;
            }
            Some(count) => run_burst(&orchestrator, &mut state, count, state_path).await?,
        }
    }

    println!("\n{}", state.status());

    let scored = score_candidates(cfg, &state)?;
    if scored.is_empty() {
        warn!(
            threshold = cfg.scan.min_retained_earnings,
            "No candidates at or above the retained earnings threshold yet"
        );
        return Ok(());
    }

    print_top(&scored, cfg.export.top_n);
    let bytes = export::export_scored(&scored)?;
    let name = export::candidates_file_name(params.fiscal_year, Local::now().naive_local());
    let path = export::write_export(&cfg.export.output_dir, &name, &bytes)?;
    println!("\nExported {} candidates to {}", scored.len(), path.display());

    Ok(())
}

/// Burst mode. Ctrl-C stops the burst at the next batch boundary; state
/// is saved after every batch.
async fn run_burst(
    orchestrator: &BatchOrchestrator,
    state: &mut ScanState,
    count: usize,
    state_path: &str,
) -> Result<()> {
    let stop = Arc::new(AtomicBool::new(false));
    let stop_flag = stop.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown signal received, stopping after the current batch");
            stop_flag.store(true, Ordering::SeqCst);
        }
    });

    info!(batches = count, "Entering burst mode. Press Ctrl+C to stop.");

    let mut save_error = None;
    let burst = orchestrator
        .run_batches_until(state, count, |s, _| {
            if let Err(e) = storage::save_state(s, Some(state_path)) {
                error!(error = %e, "Failed to save state, stopping burst");
                save_error = Some(e);
                return ControlFlow::Break(());
            }
            if stop.load(Ordering::SeqCst) {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        })
        .await;

    if let Some(e) = save_error {
        return Err(e);
    }

    info!(
        batches = burst.batches.len(),
        processed = burst.processed(),
        yielded = burst.yielded(),
        phase = %burst.phase,
        "Burst finished"
    );
    Ok(())
}

/// Filter the working set by threshold and rank it.
fn score_candidates(cfg: &AppConfig, state: &ScanState) -> Result<Vec<ScoredRecord>> {
    let candidates = state.working_set().filter(cfg.scan.min_retained_earnings);
    let weights = cfg.score_weights();

    let mut calculator = ScoreCalculator::new(weights);
    if weights.uses_quality() {
        if let Some(path) = &cfg.scoring.quality_ratings_path {
            calculator = calculator.with_quality_ratings(export::read_quality_ratings(path)?);
        }
    }

    Ok(calculator.score(&candidates))
}

fn print_top(scored: &[ScoredRecord], n: usize) {
    println!("\nTop {} LP candidates", n.min(scored.len()));
    println!("{:-<96}", "");
    for (rank, s) in scored.iter().take(n).enumerate() {
        println!(
            "{:>3}. {:<20} {:>6}  LP {:>5.1}  이익잉여금 {:>12}  자본총계 {:>12}  매출액 {:>12}",
            rank + 1,
            s.record.corp_name,
            s.record.stock_code,
            s.composite_score,
            format_eok(Some(s.record.retained_earnings)),
            format_eok(s.record.total_equity),
            format_eok(s.record.revenue),
        );
    }
}

// ---------------------------------------------------------------------------
// status / export / search
// ---------------------------------------------------------------------------

fn show_status(cfg: &AppConfig) -> Result<()> {
    match storage::load_state(Some(&cfg.export.state_file))? {
        Some(state) => {
            println!("Scan {} ({})", state.scan_id, state.params);
            println!("Started {} | updated {}", state.started_at, state.updated_at);
            println!("{}", state.status());
        }
        None => println!("No scan in progress. Run `lp-scout scan` to start one."),
    }
    Ok(())
}

fn run_export(cfg: &AppConfig, all: bool) -> Result<()> {
    let Some(state) = storage::load_state(Some(&cfg.export.state_file))? else {
        bail!("No scan state to export. Run `lp-scout scan` first.");
    };
    let now = Local::now().naive_local();

    let (bytes, name, rows) = if all {
        let records = state.working_set().by_retained_earnings();
        (export::export_records(&records)?, export::full_data_file_name(now), records.len())
    } else {
        let scored = score_candidates(cfg, &state)?;
        (
            export::export_scored(&scored)?,
            export::candidates_file_name(state.params.fiscal_year, now),
            scored.len(),
        )
    };

    let path = export::write_export(&cfg.export.output_dir, &name, &bytes)?;
    println!("Exported {rows} rows to {}", path.display());
    Ok(())
}

async fn run_search(cfg: &AppConfig, keyword: Option<String>, days: i64) -> Result<()> {
    let search = DisclosureSearch::new(
        &cfg.dart.search_url,
        cfg.dart.search_timeout(),
        cfg.cache.search_ttl(),
    )?;

    let end = Local::now().date_naive();
    let start = end - chrono::Duration::days(days.max(0));
    let keywords: Vec<String> = match keyword {
        Some(k) => vec![k],
        None => ESG_KEYWORDS.iter().map(|k| k.to_string()).collect(),
    };

    for keyword in &keywords {
        match search.search(keyword, start, end, SEARCH_MAX_RESULTS).await {
            Ok(hits) => {
                println!("\n[{keyword}] {} disclosures ({start} ~ {end})", hits.len());
                for hit in hits {
                    println!("  {}  {:<20} {}", hit.date, hit.company, hit.report);
                }
            }
            Err(e) => warn!(keyword = %keyword, error = %e, "Disclosure search failed"),
        }
    }
    Ok(())
}

/// Initialise the `tracing` subscriber.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("lp_scout=info"));

    let json_logging = std::env::var("LP_SCOUT_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        fmt().with_env_filter(env_filter).with_target(true).init();
    }
}
