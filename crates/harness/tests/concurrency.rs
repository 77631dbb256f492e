use tripweave_core::{ChangeOperation, ChangeSet, Node, NodePatch};
use tripweave_engine::EngineError;
use tripweave_harness::TestBench;

type TestResult = Result<(), Box<dyn std::error::Error>>;

fn day_one() -> &'static [(&'static str, &'static str, &'static str)] {
    &[
        ("n1", "activity", "Museum"),
        ("n2", "meal", "Lunch"),
        ("n3", "activity", "River Walk"),
    ]
}

fn retitle(id: &str, title: &str) -> ChangeOperation {
    ChangeOperation::Update {
        id: id.into(),
        patch: NodePatch {
            title: Some(title.into()),
            ..Default::default()
        },
    }
}

// ============================================================================
// Optimistic concurrency
// ============================================================================

#[test]
fn matching_base_version_applies_directly() -> TestResult {
    let mut bench = TestBench::new()?;
    let id = bench.seed_trip(&[day_one()])?;

    let outcome = bench.apply(
        id,
        &ChangeSet::new(vec![retitle("n1", "Gallery")]).with_base_version(1),
    )?;
    assert_eq!(outcome.version, 2);
    Ok(())
}

#[test]
fn stale_base_with_disjoint_edits_advances_silently() -> TestResult {
    let mut bench = TestBench::new()?;
    let id = bench.seed_trip(&[day_one()])?;

    // Someone else edits n3 while our caller still believes version 1.
    bench.apply(id, &ChangeSet::new(vec![retitle("n3", "Harbor Walk")]))?;

    let outcome = bench.apply(
        id,
        &ChangeSet::new(vec![retitle("n1", "Gallery")]).with_base_version(1),
    )?;
    assert_eq!(outcome.version, 3);

    let doc = bench.document(id)?;
    assert_eq!(doc.find_node(&"n1".into()).unwrap().1.title, "Gallery");
    assert_eq!(doc.find_node(&"n3".into()).unwrap().1.title, "Harbor Walk");
    Ok(())
}

#[test]
fn move_auto_resolves_over_concurrent_retitle() -> TestResult {
    let mut bench = TestBench::new()?;
    let id = bench.seed_trip(&[day_one()])?;

    bench.apply(id, &ChangeSet::new(vec![retitle("n2", "Late Lunch")]))?;

    let outcome = bench.apply(
        id,
        &ChangeSet::new(vec![ChangeOperation::Move {
            id: "n2".into(),
            start: TestBench::hour(14),
            end: TestBench::hour(15),
        }])
        .with_base_version(1),
    )?;
    assert_eq!(outcome.version, 3);

    // Both edits survive.
    let doc = bench.document(id)?;
    let (_, node) = doc.find_node(&"n2".into()).unwrap();
    assert_eq!(node.title, "Late Lunch");
    assert_eq!(node.timing.unwrap().start, TestBench::hour(14));
    Ok(())
}

#[test]
fn concurrent_delete_yields_version_conflict() -> TestResult {
    let mut bench = TestBench::new()?;
    let id = bench.seed_trip(&[day_one()])?;

    bench.apply(
        id,
        &ChangeSet::new(vec![ChangeOperation::Delete { id: "n2".into() }]),
    )?;

    let err = bench
        .apply(
            id,
            &ChangeSet::new(vec![retitle("n2", "Late Lunch")]).with_base_version(1),
        )
        .unwrap_err();

    match err {
        EngineError::VersionConflict {
            base_version,
            live_version,
            conflicts,
        } => {
            assert_eq!(base_version, 1);
            assert_eq!(live_version, 2);
            assert_eq!(conflicts.removed.len(), 1);
            assert_eq!(conflicts.removed[0].id, "n2");
        }
        other => panic!("expected version conflict, got {other:?}"),
    }

    // The failed apply committed nothing.
    assert_eq!(bench.document(id)?.version, 2);
    Ok(())
}

#[test]
fn reorder_conflicts_with_concurrent_insert() -> TestResult {
    let mut bench = TestBench::new()?;
    let id = bench.seed_trip(&[day_one()])?;

    bench.apply(
        id,
        &ChangeSet::new(vec![ChangeOperation::Insert {
            day: 1,
            node: Node::new("n4", "meal", "Dinner"),
            after: None,
        }]),
    )?;

    let err = bench
        .apply(
            id,
            &ChangeSet::new(vec![ChangeOperation::Reorder {
                day: 1,
                order: vec!["n3".into(), "n2".into(), "n1".into()],
            }])
            .with_base_version(1),
        )
        .unwrap_err();
    assert!(matches!(err, EngineError::VersionConflict { .. }));
    Ok(())
}

#[test]
fn timing_edits_on_same_node_do_not_auto_resolve() -> TestResult {
    let mut bench = TestBench::new()?;
    let id = bench.seed_trip(&[day_one()])?;

    bench.apply(
        id,
        &ChangeSet::new(vec![ChangeOperation::Move {
            id: "n2".into(),
            start: TestBench::hour(12),
            end: TestBench::hour(13),
        }]),
    )?;

    let err = bench
        .apply(
            id,
            &ChangeSet::new(vec![ChangeOperation::Move {
                id: "n2".into(),
                start: TestBench::hour(14),
                end: TestBench::hour(15),
            }])
            .with_base_version(1),
        )
        .unwrap_err();
    assert!(matches!(err, EngineError::VersionConflict { .. }));
    Ok(())
}

// ============================================================================
// Idempotent replay
// ============================================================================

#[test]
fn duplicate_key_replays_without_reapplying() -> TestResult {
    let mut bench = TestBench::new()?;
    let id = bench.seed_trip(&[day_one()])?;

    let changeset = ChangeSet::new(vec![ChangeOperation::Delete { id: "n2".into() }])
        .with_idempotency_key("req-42");

    let first = bench.apply(id, &changeset)?;
    assert_eq!(first.version, 2);

    let second = bench.apply(id, &changeset)?;
    assert_eq!(second, first);

    // One commit, one revision; the node was not deleted twice.
    assert_eq!(bench.document(id)?.version, 2);
    assert_eq!(bench.engine.history(id)?.len(), 1);
    Ok(())
}

#[test]
fn replay_survives_even_for_noop_results() -> TestResult {
    let mut bench = TestBench::new()?;
    let id = bench.seed_trip(&[day_one()])?;

    let changeset = ChangeSet::new(vec![ChangeOperation::Delete { id: "ghost".into() }])
        .with_idempotency_key("req-7");
    let first = bench.apply(id, &changeset)?;
    assert!(first.diff.is_empty());

    // A real edit moves the document forward in between.
    bench.apply(
        id,
        &ChangeSet::new(vec![ChangeOperation::Delete { id: "n3".into() }]),
    )?;

    // The replay still reports the original no-op result at version 1.
    let second = bench.apply(id, &changeset)?;
    assert_eq!(second, first);
    assert_eq!(bench.document(id)?.version, 2);
    Ok(())
}

#[test]
fn malformed_idempotency_key_is_rejected() -> TestResult {
    let mut bench = TestBench::new()?;
    let id = bench.seed_trip(&[day_one()])?;

    let changeset = ChangeSet::new(vec![retitle("n1", "Gallery")])
        .with_idempotency_key("has spaces in it");
    let err = bench.apply(id, &changeset).unwrap_err();
    assert!(matches!(err, EngineError::InvalidIdempotencyKey(_)));
    assert_eq!(bench.document(id)?.version, 1);
    Ok(())
}

#[test]
fn failed_apply_releases_its_key() -> TestResult {
    let mut bench = TestBench::new()?;
    let id = bench.seed_trip(&[day_one()])?;

    bench.apply(
        id,
        &ChangeSet::new(vec![ChangeOperation::Delete { id: "n2".into() }]),
    )?;

    // First attempt conflicts; the key must not be burned by the failure.
    let changeset = ChangeSet::new(vec![retitle("n2", "Late Lunch")])
        .with_base_version(1)
        .with_idempotency_key("req-9");
    assert!(bench.apply(id, &changeset).is_err());

    // Retry against the live version with the same key succeeds.
    let retried = ChangeSet::new(vec![retitle("n1", "Gallery")])
        .with_base_version(2)
        .with_idempotency_key("req-9");
    let outcome = bench.apply(id, &retried)?;
    assert_eq!(outcome.version, 3);
    Ok(())
}
