//! End-to-end insertion, atomicity, and idempotence tests.

use std::collections::BTreeSet;

use seam::core::task::{TaskId, TaskSource};
use seam::detect::GapId;
use seam::error::Error;
use seam::insert::{insert_accepted, AcceptedCandidate, GapInsertion};
use seam::session::{Decision, DecisionAction, SessionPhase};
use seam::Cognition;

use crate::fixtures::{
    assert_acyclic, raw, service, sparse_plan, task, two_gap_plan, RoutingGenerator,
    ScriptedSimilarity,
};
use seam::core::PlanGraph;

fn accept(candidate_id: uuid::Uuid) -> Decision {
    Decision {
        candidate_id,
        action: DecisionAction::Accept,
        edited_text: None,
        edited_hours: None,
    }
}

fn reject(candidate_id: uuid::Uuid) -> Decision {
    Decision {
        candidate_id,
        action: DecisionAction::Reject,
        edited_text: None,
        edited_hours: None,
    }
}

/// Scenario B: accepting 2 of 3 candidates inserts exactly two tasks at
/// #3/#4, rewires #5, and leaves #1/#2 untouched.
#[tokio::test]
async fn test_accept_two_of_three_candidates() {
    let service = service(
        sparse_plan(),
        ScriptedSimilarity::flat(),
        RoutingGenerator::always(vec![
            raw("Run usability tests on the mockups", 16.0, 0.9),
            raw("Incorporate usability feedback", 24.0, 0.8),
            raw("Write the launch announcement", 8.0, 0.7),
        ]),
    );

    let report = service.start_analysis("Ship the new site", "").await.unwrap();
    let candidates = report.candidates_by_gap.values().next().unwrap();
    assert_eq!(candidates.len(), 3);

    let outcome = service
        .commit_session(
            report.session_id,
            &[
                accept(candidates[0].id),
                accept(candidates[1].id),
                reject(candidates[2].id),
            ],
        )
        .await
        .unwrap();

    assert_eq!(
        outcome.inserted_task_ids,
        vec![TaskId::ordinal(3), TaskId::ordinal(4)]
    );

    let graph = service.graph().await;
    assert_eq!(graph.len(), 5);
    assert_acyclic(&graph);

    let t3 = graph.get(&TaskId::ordinal(3)).unwrap();
    let t4 = graph.get(&TaskId::ordinal(4)).unwrap();
    let t5 = graph.get(&TaskId::ordinal(5)).unwrap();
    assert_eq!(t3.depends_on, BTreeSet::from([TaskId::ordinal(2)]));
    assert_eq!(t4.depends_on, BTreeSet::from([TaskId::ordinal(3)]));
    assert!(t5.depends_on.contains(&TaskId::ordinal(4)));
    assert_eq!(t3.source, TaskSource::AiGenerated);
    assert!(t3.requires_review);

    // #1 and #2 untouched.
    assert_eq!(graph.get(&TaskId::ordinal(1)).unwrap().text, "Define goals");
    assert_eq!(
        graph.get(&TaskId::ordinal(2)).unwrap().depends_on,
        BTreeSet::from([TaskId::ordinal(1)])
    );

    // The rejected candidate never became a task.
    let texts: Vec<&str> = graph.tasks().map(|t| t.text.as_str()).collect();
    assert!(!texts.contains(&"Write the launch announcement"));

    let session = service.session(report.session_id).await.unwrap();
    assert_eq!(session.phase(), SessionPhase::Committed);
    assert!(session.metrics.insertion_ms.is_some());
    assert!(session.metrics.generation_ms.len() >= 1);
}

/// Edited candidate values are exactly what is persisted; the original
/// generator confidence survives in provenance.
#[tokio::test]
async fn test_edited_values_are_persisted() {
    let service = service(
        sparse_plan(),
        ScriptedSimilarity::flat(),
        RoutingGenerator::always(vec![raw("Run usability tests on the mockups", 16.0, 0.9)]),
    );

    let report = service.start_analysis("Ship the new site", "").await.unwrap();
    let candidate = &report.candidates_by_gap.values().next().unwrap()[0];

    let outcome = service
        .commit_session(
            report.session_id,
            &[Decision {
                candidate_id: candidate.id,
                action: DecisionAction::Accept,
                edited_text: Some("Moderated usability sessions with five users".to_string()),
                edited_hours: Some(32.0),
            }],
        )
        .await
        .unwrap();

    let graph = service.graph().await;
    let inserted = graph.get(&outcome.inserted_task_ids[0]).unwrap();
    assert_eq!(inserted.text, "Moderated usability sessions with five users");
    assert_eq!(inserted.estimated_effort_hours, 32.0);

    let provenance = inserted.provenance.as_ref().unwrap();
    assert_eq!(provenance.generator_confidence, 0.9);
    assert_eq!(provenance.predecessor_id, TaskId::ordinal(2));
    assert_eq!(provenance.successor_id, TaskId::ordinal(5));
}

/// Rejecting everything commits cleanly and inserts nothing.
#[tokio::test]
async fn test_rejected_candidates_never_appear_as_tasks() {
    let service = service(
        sparse_plan(),
        ScriptedSimilarity::flat(),
        RoutingGenerator::always(vec![
            raw("Run usability tests on the mockups", 16.0, 0.9),
            raw("Incorporate usability feedback", 24.0, 0.8),
        ]),
    );

    let report = service.start_analysis("Ship the new site", "").await.unwrap();
    let before: BTreeSet<TaskId> = service.graph().await.tasks().map(|t| t.id).collect();
    let decisions: Vec<Decision> = report
        .candidates_by_gap
        .values()
        .flatten()
        .map(|c| reject(c.id))
        .collect();

    let outcome = service
        .commit_session(report.session_id, &decisions)
        .await
        .unwrap();

    assert!(outcome.inserted_task_ids.is_empty());
    let after: BTreeSet<TaskId> = service.graph().await.tasks().map(|t| t.id).collect();
    assert_eq!(before, after);
}

/// Committing a session twice (a simulated retry) must not duplicate
/// tasks.
#[tokio::test]
async fn test_second_commit_is_rejected() {
    let service = service(
        sparse_plan(),
        ScriptedSimilarity::flat(),
        RoutingGenerator::always(vec![raw("Run usability tests on the mockups", 16.0, 0.9)]),
    );

    let report = service.start_analysis("Ship the new site", "").await.unwrap();
    let candidate_id = report.candidates_by_gap.values().next().unwrap()[0].id;

    service
        .commit_session(report.session_id, &[accept(candidate_id)])
        .await
        .unwrap();
    let len_after_first = service.graph().await.len();

    let retry = service
        .commit_session(report.session_id, &[accept(candidate_id)])
        .await;
    assert!(matches!(retry, Err(Error::InvalidPhaseTransition { .. })));
    assert_eq!(service.graph().await.len(), len_after_first);
}

/// Candidates with no decision are not inserted and are reported back.
#[tokio::test]
async fn test_undecided_candidates_are_reported_not_inserted() {
    let service = service(
        sparse_plan(),
        ScriptedSimilarity::flat(),
        RoutingGenerator::always(vec![
            raw("Run usability tests on the mockups", 16.0, 0.9),
            raw("Incorporate usability feedback", 24.0, 0.8),
            raw("Write the launch announcement", 8.0, 0.7),
        ]),
    );

    let report = service.start_analysis("Ship the new site", "").await.unwrap();
    let candidates = report.candidates_by_gap.values().next().unwrap();

    let outcome = service
        .commit_session(report.session_id, &[accept(candidates[0].id)])
        .await
        .unwrap();

    assert_eq!(outcome.inserted_task_ids.len(), 1);
    assert_eq!(outcome.undecided_candidates.len(), 2);
    assert_eq!(service.graph().await.len(), 4);
}

/// Committing both gaps of a two-gap session applies one atomic
/// mutation and keeps the graph acyclic.
#[tokio::test]
async fn test_two_gap_commit_is_one_atomic_mutation() {
    let service = service(
        two_gap_plan(),
        ScriptedSimilarity::flat(),
        RoutingGenerator::always(vec![raw("Bridge the missing step here", 16.0, 0.8)]),
    );

    let report = service.start_analysis("Ship everything", "").await.unwrap();
    assert_eq!(report.candidates_by_gap.len(), 2);

    let decisions: Vec<Decision> = report
        .candidates_by_gap
        .values()
        .flatten()
        .map(|c| accept(c.id))
        .collect();

    let before_version = service.graph().await.version();
    let outcome = service
        .commit_session(report.session_id, &decisions)
        .await
        .unwrap();

    assert_eq!(outcome.inserted_task_ids.len(), 2);
    let graph = service.graph().await;
    assert_eq!(graph.version(), before_version + 1);
    assert_acyclic(&graph);
}

/// Adjacent ordinals force fractional ids; the chain still wires up and
/// stays acyclic.
#[tokio::test]
async fn test_fractional_ids_between_adjacent_ordinals() {
    let graph = PlanGraph::from_tasks(vec![
        task(2, "Design mockups", 40.0, &[]),
        task(3, "Launch", 16.0, &[]),
    ])
    .unwrap();
    let service = service(
        graph,
        ScriptedSimilarity::flat(),
        RoutingGenerator::always(vec![
            raw("Run usability tests on the mockups", 16.0, 0.9),
            raw("Incorporate usability feedback", 24.0, 0.8),
        ]),
    );

    let report = service.start_analysis("Ship the site", "").await.unwrap();
    let decisions: Vec<Decision> = report
        .candidates_by_gap
        .values()
        .flatten()
        .map(|c| accept(c.id))
        .collect();

    let outcome = service
        .commit_session(report.session_id, &decisions)
        .await
        .unwrap();

    assert_eq!(
        outcome.inserted_task_ids,
        vec![TaskId::fractional(2, 1), TaskId::fractional(2, 2)]
    );
    let graph = service.graph().await;
    let successor = graph.get(&TaskId::ordinal(3)).unwrap();
    assert!(successor.depends_on.contains(&TaskId::fractional(2, 2)));
    assert_acyclic(&graph);
}

/// Scenario D: a hand-crafted insertion that would make the successor
/// depend transitively on itself is rejected with a cycle error and the
/// graph is byte-for-byte unchanged.
#[test]
fn test_cycle_rejected_and_graph_byte_identical() {
    let graph = PlanGraph::from_tasks(vec![
        task(2, "Design mockups", 40.0, &[5]),
        task(5, "Launch", 16.0, &[]),
    ])
    .unwrap();
    let before = serde_json::to_string(&graph).unwrap();

    let result = insert_accepted(
        &graph,
        &[GapInsertion {
            gap: GapId {
                predecessor: TaskId::ordinal(2),
                successor: TaskId::ordinal(5),
            },
            accepted: vec![AcceptedCandidate {
                candidate_id: uuid::Uuid::new_v4(),
                text: "Run usability tests on the mockups".to_string(),
                estimated_effort_hours: 16.0,
                required_cognition: Cognition::Medium,
                generator_confidence: 0.8,
                reasoning: "crafted to close the loop".to_string(),
            }],
        }],
    );

    match result {
        Err(Error::Cycle { from, to }) => {
            // The offending edge is inside the would-be cycle.
            let ids = [from, to];
            for id in ids {
                assert!(
                    id.major == 2 || id.major == 5 || id.major == 3 || id.major == 4,
                    "unexpected edge endpoint {}",
                    id
                );
            }
        }
        other => panic!("expected cycle error, got {:?}", other),
    }

    let after = serde_json::to_string(&graph).unwrap();
    assert_eq!(before, after);
    assert_acyclic(&graph);
}
