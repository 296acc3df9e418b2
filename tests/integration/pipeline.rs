//! End-to-end pipeline tests over the mock statement source.

use std::collections::HashSet;
use std::time::Duration;

use lp_scout::engine::accumulator::WorkingSet;
use lp_scout::engine::orchestrator::BatchOrchestrator;
use lp_scout::engine::scorer::ScoreCalculator;
use lp_scout::engine::state::{ScanParams, ScanPhase, ScanState};
use lp_scout::export;
use lp_scout::storage;
use lp_scout::types::{Consolidation, ReportKind};

use crate::mock_source::{entities, MockSource};

fn params() -> ScanParams {
    ScanParams {
        fiscal_year: 2024,
        report_kind: ReportKind::Annual,
        consolidation: Consolidation::Consolidated,
    }
}

fn orchestrator(source: MockSource, batch_size: usize) -> BatchOrchestrator {
    BatchOrchestrator::new(Box::new(source), batch_size, Duration::ZERO)
}

/// Retained earnings in 억원 for entity `i`: a spread around the threshold.
fn spread(i: usize) -> i64 {
    (i as i64 * 37) % 900 - 100
}

#[tokio::test]
async fn test_chunking_does_not_change_result() {
    let list = entities(50);

    let mut small = ScanState::new(params(), list.clone());
    let burst = orchestrator(MockSource::for_entities(&list, spread), 10)
        .run_batches(&mut small, 5)
        .await;
    assert_eq!(burst.batches.len(), 5);

    let mut large = ScanState::new(params(), list.clone());
    orchestrator(MockSource::for_entities(&list, spread), 50)
        .run_batch(&mut large)
        .await;

    assert_eq!(small.cursor(), 50);
    assert_eq!(large.cursor(), 50);
    assert_eq!(small.working_set(), large.working_set());
    assert_eq!(small.working_set().len(), 50);
}

#[tokio::test]
async fn test_resume_from_saved_state() {
    let list = entities(30);
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.json");
    let path = path.to_str().unwrap();

    // First session: two batches of 7, then persist.
    let first = MockSource::for_entities(&list, spread);
    let first_log = first.call_log();
    let mut state = ScanState::new(params(), list.clone());
    orchestrator(first, 7).run_batches(&mut state, 2).await;
    assert_eq!(state.cursor(), 14);
    storage::save_state(&state, Some(path)).unwrap();

    // Second session: reload and finish.
    let second = MockSource::for_entities(&list, spread);
    let second_log = second.call_log();
    let mut resumed = storage::load_state(Some(path)).unwrap().unwrap();
    assert_eq!(resumed.cursor(), 14);
    let burst = orchestrator(second, 7).run_batches(&mut resumed, 100).await;
    assert_eq!(burst.phase, ScanPhase::Complete);
    assert_eq!(burst.batches.len(), 3);

    // Every entity fetched exactly once across both sessions.
    let mut fetched: Vec<String> = first_log
        .lock()
        .unwrap()
        .iter()
        .chain(second_log.lock().unwrap().iter())
        .map(|(code, _, _)| code.clone())
        .collect();
    assert_eq!(fetched.len(), 30);
    fetched.sort();
    fetched.dedup();
    assert_eq!(fetched.len(), 30);

    let mut one_shot = ScanState::new(params(), list.clone());
    orchestrator(MockSource::for_entities(&list, spread), 30)
        .run_batch(&mut one_shot)
        .await;
    assert_eq!(resumed.working_set(), one_shot.working_set());
}

#[tokio::test]
async fn test_unavailable_entities_are_absorbed() {
    let list = entities(6);
    let source = MockSource::new()
        .with_statement(&list[0].corp_code, &[("이익잉여금", "50,000,000,000")])
        .with_failure(&list[1].corp_code, 500)
        // list[2] unknown: status 013
        .with_statement(&list[3].corp_code, &[("자본총계", "10,000,000,000")])
        .with_statement(&list[4].corp_code, &[("이익(손실)잉여금", "-3,000,000,000")])
        .with_statement(&list[5].corp_code, &[("이익잉여금", "")]);
    let log = source.call_log();

    let orch = orchestrator(source, 4);
    let mut state = ScanState::new(params(), list.clone());
    let report = orch.run_batch(&mut state).await;
    assert_eq!(report.processed, 4);
    assert_eq!(report.no_data, 2);
    assert_eq!(report.yielded, 1);

    let report = orch.run_batch(&mut state).await;
    assert_eq!(report.processed, 2);
    assert_eq!(report.yielded, 1);
    assert!(state.is_complete());

    // No retries: every entity fetched exactly once.
    assert_eq!(log.lock().unwrap().len(), 6);

    let codes: HashSet<&str> = state
        .working_set()
        .iter()
        .map(|r| r.corp_code.as_str())
        .collect();
    assert_eq!(
        codes,
        HashSet::from([list[0].corp_code.as_str(), list[4].corp_code.as_str()])
    );
    let first = state.working_set().get(&list[0].corp_code).unwrap();
    assert_eq!(first.retained_earnings, 500.0);
    assert!(first.total_equity.is_none());
    assert_eq!(
        state.working_set().get(&list[4].corp_code).unwrap().retained_earnings,
        -30.0
    );
}

#[tokio::test]
async fn test_fetch_uses_scan_params() {
    let list = entities(3);
    let source = MockSource::for_entities(&list, spread);
    let log = source.call_log();
    let q3 = ScanParams {
        fiscal_year: 2023,
        report_kind: ReportKind::Q3,
        consolidation: Consolidation::Standalone,
    };

    let mut state = ScanState::new(q3, list);
    orchestrator(source, 10).run_batch(&mut state).await;

    let calls = log.lock().unwrap();
    assert_eq!(calls.len(), 3);
    assert!(calls.iter().all(|(_, year, kind)| *year == 2023 && *kind == ReportKind::Q3));
}

#[tokio::test]
async fn test_replayed_results_do_not_duplicate() {
    let list = entities(12);
    let mut a = ScanState::new(params(), list.clone());
    let mut b = ScanState::new(params(), list.clone());
    orchestrator(MockSource::for_entities(&list, spread), 5)
        .run_batches(&mut a, 10)
        .await;
    orchestrator(MockSource::for_entities(&list, spread), 12)
        .run_batch(&mut b)
        .await;

    let mut merged = WorkingSet::from(a.working_set().records().to_vec());
    let summary = merged.merge(b.working_set().records().to_vec());
    assert_eq!(summary.inserted, 0);
    assert_eq!(summary.replaced, 12);
    assert_eq!(merged.len(), 12);
}

#[tokio::test]
async fn test_filter_score_export() {
    let list = entities(40);
    let mut state = ScanState::new(params(), list.clone());
    orchestrator(MockSource::for_entities(&list, spread), 40)
        .run_batch(&mut state)
        .await;

    let candidates = state.working_set().filter(300.0);
    assert!(!candidates.is_empty());
    assert!(candidates.iter().all(|r| r.retained_earnings >= 300.0));
    let expected = state
        .working_set()
        .iter()
        .filter(|r| r.retained_earnings >= 300.0)
        .count();
    assert_eq!(candidates.len(), expected);

    let scored = ScoreCalculator::default().score(&candidates);
    assert_eq!(scored.len(), candidates.len());
    for pair in scored.windows(2) {
        assert!(pair[0].composite_score >= pair[1].composite_score);
    }
    for s in &scored {
        assert!((0.0..=100.0).contains(&s.composite_score));
        assert_eq!(s.record.revenue, Some(10.0));
    }

    let bytes = export::export_scored(&scored).unwrap();
    assert!(bytes.starts_with(export::BOM));
    assert_eq!(export::parse_scored(&bytes).unwrap(), scored);

    let dir = tempfile::tempdir().unwrap();
    let all = export::export_records(&state.working_set().by_retained_earnings()).unwrap();
    let path = export::write_export(dir.path(), "dart_all_data_test.csv", &all).unwrap();
    let reread = export::parse_records(&std::fs::read(path).unwrap()).unwrap();
    assert_eq!(reread.len(), 40);
    for pair in reread.windows(2) {
        assert!(pair[0].retained_earnings >= pair[1].retained_earnings);
    }
}
