//! End-to-end detection and analysis tests.

use std::sync::Arc;
use std::time::Duration;

use seam::config::Config;
use seam::core::task::TaskId;
use seam::detect::{detect_gaps, GapId};
use seam::session::SessionPhase;
use seam::GapService;

use crate::fixtures::{
    dense_linear_plan, raw, service, sparse_plan, two_gap_plan, Route, RoutingGenerator,
    ScriptedSimilarity,
};

/// Scenario A: the sparse walkthrough plan yields exactly one gap
/// between #2 and #5 with confidence at least 0.75.
#[tokio::test]
async fn test_sparse_plan_yields_exactly_one_gap() {
    let service = service(
        sparse_plan(),
        ScriptedSimilarity::flat(),
        RoutingGenerator::always(vec![raw("Run usability tests on the mockups", 16.0, 0.8)]),
    );

    let report = service.start_analysis("Ship the new site", "").await.unwrap();

    assert_eq!(report.phase, SessionPhase::AwaitingReview);
    assert_eq!(report.gaps.len(), 1);
    let gap = &report.gaps[0];
    assert_eq!(gap.predecessor_id, TaskId::ordinal(2));
    assert_eq!(gap.successor_id, TaskId::ordinal(5));
    assert!(gap.confidence >= 0.75);
    assert!(gap.indicators.count() >= 3);
    assert!(!report.candidates_by_gap[&gap.id()].is_empty());
    assert!(report.failed_gaps.is_empty());
}

/// Scenario C: a fully linear, densely-dependent plan with no jumps
/// yields zero gaps — a valid outcome, not an error.
#[tokio::test]
async fn test_dense_linear_plan_yields_zero_gaps() {
    let service = service(
        dense_linear_plan(),
        ScriptedSimilarity::flat(),
        RoutingGenerator::always(vec![raw("This should never be requested", 16.0, 0.8)]),
    );

    let report = service.start_analysis("Ship the backend", "").await.unwrap();

    assert_eq!(report.phase, SessionPhase::Aborted);
    assert!(report.gaps.is_empty());
    assert!(report.candidates_by_gap.is_empty());
}

/// Scenario E: a generation timeout on one gap of a two-gap session
/// still returns usable candidates for the other gap.
#[tokio::test(start_paused = true)]
async fn test_timeout_on_one_gap_leaves_other_usable() {
    let service = service(
        two_gap_plan(),
        ScriptedSimilarity::flat(),
        RoutingGenerator::new(vec![
            (
                "Design mockups",
                Route::Candidates(vec![raw("Run usability tests on the mockups", 16.0, 0.8)]),
            ),
            ("Launch", Route::Hang),
        ]),
    );

    let report = service.start_analysis("Ship everything", "").await.unwrap();

    assert_eq!(report.phase, SessionPhase::AwaitingReview);
    assert_eq!(report.gaps.len(), 2);

    let good = GapId {
        predecessor: TaskId::ordinal(2),
        successor: TaskId::ordinal(5),
    };
    let failed = GapId {
        predecessor: TaskId::ordinal(5),
        successor: TaskId::ordinal(7),
    };

    assert_eq!(report.candidates_by_gap[&good].len(), 1);
    assert!(report.failed_gaps[&failed].contains("timed out"));
    assert!(!report.candidates_by_gap.contains_key(&failed));
}

/// A hard generator failure on one gap is likewise isolated.
#[tokio::test]
async fn test_generator_error_is_isolated_per_gap() {
    let service = service(
        two_gap_plan(),
        ScriptedSimilarity::flat(),
        RoutingGenerator::new(vec![
            (
                "Design mockups",
                Route::Candidates(vec![raw("Run usability tests on the mockups", 16.0, 0.8)]),
            ),
            ("Launch", Route::Fail("model unavailable".to_string())),
        ]),
    );

    let report = service.start_analysis("Ship everything", "").await.unwrap();

    assert_eq!(report.candidates_by_gap.len(), 1);
    assert_eq!(report.failed_gaps.len(), 1);
    let reason = report.failed_gaps.values().next().unwrap();
    assert!(reason.contains("model unavailable"));
}

/// Detection is deterministic: identical graph snapshots yield
/// identical gap lists.
#[test]
fn test_detection_is_deterministic() {
    let graph = two_gap_plan();
    let config = Config::default();

    let ordered = graph.topological_order();
    let first = detect_gaps(&ordered, &config.detector);
    let second = detect_gaps(&ordered, &config.detector);

    assert_eq!(first.len(), second.len());
    for (a, b) in first.iter().zip(&second) {
        assert_eq!(a.predecessor_id, b.predecessor_id);
        assert_eq!(a.successor_id, b.successor_id);
        assert_eq!(a.indicators, b.indicators);
        assert_eq!(a.confidence, b.confidence);
    }
}

/// No gap is ever flagged with fewer than three of the four indicators.
#[test]
fn test_no_gap_below_indicator_threshold() {
    let config = Config::default();
    for graph in [sparse_plan(), dense_linear_plan(), two_gap_plan()] {
        let ordered = graph.topological_order();
        for gap in detect_gaps(&ordered, &config.detector) {
            assert!(gap.indicators.count() >= 3);
        }
    }
}

/// Gaps are surfaced highest-confidence first and truncated to the
/// configured cap.
#[tokio::test]
async fn test_gaps_truncated_to_configured_cap() {
    let mut config = Config::default();
    config.detector.max_gaps = 1;

    let service = GapService::new(
        two_gap_plan(),
        Arc::new(ScriptedSimilarity::flat()),
        Arc::new(RoutingGenerator::always(vec![raw(
            "Run usability tests on the mockups",
            16.0,
            0.8,
        )])),
        config,
    );

    let report = service.start_analysis("Ship everything", "").await.unwrap();

    assert_eq!(report.gaps.len(), 1);
    // The four-indicator gap outranks the three-indicator one.
    assert_eq!(report.gaps[0].predecessor_id, TaskId::ordinal(5));
    assert_eq!(report.gaps[0].successor_id, TaskId::ordinal(7));
    assert!((report.gaps[0].confidence - 1.0).abs() < 1e-9);
}

/// Abandoning a session mid-analysis cancels in-flight generation and
/// discards its results.
#[tokio::test(start_paused = true)]
async fn test_abandon_discards_inflight_generation() {
    let service = Arc::new(service(
        sparse_plan(),
        ScriptedSimilarity::flat(),
        RoutingGenerator::new(vec![("Design mockups", Route::Hang)]),
    ));

    let handle = {
        let service = Arc::clone(&service);
        tokio::spawn(async move { service.start_analysis("Ship the site", "").await })
    };

    // Let the analysis register and block on the hung generator.
    tokio::time::sleep(Duration::from_millis(10)).await;
    let session_id = service
        .active_session()
        .await
        .expect("analysis should be registered");
    service.abandon_session(session_id).await.unwrap();

    let report = handle.await.unwrap().unwrap();
    assert_eq!(report.phase, SessionPhase::Aborted);
    assert!(report.candidates_by_gap.is_empty());

    // The slot is free for a fresh invocation.
    assert!(service.active_session().await.is_none());
}
