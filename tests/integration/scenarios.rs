use orgtree::error::PathError;
use orgtree::merge::{Batch, MergeEngine, RejectReason, RowChange};
use orgtree::store::Node;

#[test]
fn late_intermediate_parent_completes_path() {
    let mut engine = MergeEngine::new();
    engine.apply_batch(Batch::new().upsert(Node::root("root")));
    engine.apply_batch(Batch::new().upsert(Node::child("child", "root")));

    let third = engine.apply_batch(Batch::new().upsert(Node::child("grandchild", "missing")));
    assert!(third.attached.is_empty());
    assert!(third.orphaned.contains("grandchild"));
    assert_eq!(
        engine.path_of("grandchild"),
        Err(PathError::Orphan {
            key: "grandchild".to_string(),
            missing_parent: "missing".to_string(),
        })
    );

    let fourth = engine.apply_batch(Batch::new().upsert(Node::child("missing", "root")));
    assert_eq!(fourth.attached, vec!["missing", "grandchild"]);
    assert_eq!(fourth.change("missing"), Some(RowChange::Inserted));
    assert_eq!(fourth.change("grandchild"), Some(RowChange::Attached));
    assert_eq!(
        engine.path_of("grandchild").unwrap(),
        vec!["root", "missing", "grandchild"]
    );
    assert_eq!(engine.path_of("child").unwrap(), vec!["root", "child"]);
    assert!(engine.orphans().is_empty());
}

#[test]
fn mutual_parents_in_one_batch_reject_second() {
    let mut engine = MergeEngine::new();
    let report = engine.apply_batch(
        Batch::new()
            .upsert(Node::child("A", "B"))
            .upsert(Node::child("B", "A")),
    );

    assert_eq!(report.rejected.len(), 1);
    let rejection = &report.rejected[0];
    assert_eq!(rejection.index, 1);
    assert_eq!(rejection.key.as_deref(), Some("B"));
    assert_eq!(
        rejection.reason,
        RejectReason::CycleDetected {
            parent: "A".to_string()
        }
    );

    assert!(!engine.contains("B"));
    assert!(matches!(
        engine.path_of("A"),
        Err(PathError::Orphan { missing_parent, .. }) if missing_parent == "B"
    ));
    assert_eq!(engine.orphans(), vec![("A".to_string(), "B".to_string())]);
}

#[test]
fn child_before_parent_in_same_batch() {
    let mut engine = MergeEngine::new();
    let report = engine.apply_batch(
        Batch::new()
            .upsert(Node::child("site", "sub"))
            .upsert(Node::child("sub", "org"))
            .upsert(Node::root("org")),
    );

    assert_eq!(report.attached, vec!["org", "sub", "site"]);
    assert!(report.orphaned.is_empty());
    assert_eq!(report.path("site").unwrap(), &vec!["org", "sub", "site"]);
}

#[test]
fn delete_orphans_children_without_removing_them() {
    let mut engine = MergeEngine::new();
    engine.apply_batch(
        Batch::new()
            .upsert(Node::root("org"))
            .upsert(Node::child("sub", "org"))
            .upsert(Node::child("site-1", "sub"))
            .upsert(Node::child("site-2", "sub")),
    );

    let report = engine.apply_batch(Batch::new().delete("sub"));
    assert_eq!(report.removed, vec!["sub"]);
    assert!(report.orphaned.contains("site-1"));
    assert!(report.orphaned.contains("site-2"));
    assert!(engine.contains("site-1"));
    assert!(engine.contains("site-2"));
    assert!(engine.children_of("org").is_empty());
    assert!(matches!(
        engine.path_of("site-1"),
        Err(PathError::Orphan { missing_parent, .. }) if missing_parent == "sub"
    ));

    // Re-creating the parent re-attaches the waiting children.
    let report = engine.apply_batch(Batch::new().upsert(Node::child("sub", "org")));
    assert_eq!(report.attached, vec!["sub", "site-1", "site-2"]);
    assert_eq!(
        engine.path_of("site-2").unwrap(),
        vec!["org", "sub", "site-2"]
    );
}

#[test]
fn unknown_delete_is_reported_not_fatal() {
    let mut engine = MergeEngine::new();
    let report = engine.apply_batch(
        Batch::new()
            .delete("ghost")
            .upsert(Node::root("real")),
    );
    assert_eq!(report.rejected.len(), 1);
    assert_eq!(report.rejected[0].reason, RejectReason::UnknownDeleteTarget);
    assert_eq!(report.attached, vec!["real"]);
}

#[test]
fn placeholder_superseded_in_place() {
    let mut engine = MergeEngine::new();
    engine.apply_batch(
        Batch::new()
            .upsert(Node::root("org"))
            .upsert(Node::placeholder("a", "org"))
            .upsert(Node::placeholder("b", "org"))
            .upsert(Node::placeholder("c", "org")),
    );
    let before = engine.path_of("b").unwrap();

    let report = engine.apply_batch(
        Batch::new().upsert(Node::child("b", "org").with_attribute("displayName", "Site B")),
    );

    assert_eq!(report.change("b"), Some(RowChange::Superseded));
    assert!(report.removed.is_empty());
    assert_eq!(engine.children_of("org"), ["a", "b", "c"]);
    assert_eq!(engine.path_of("b").unwrap(), before);
    let node = engine.get("b").unwrap();
    assert!(!node.is_placeholder);
    assert_eq!(node.label(), "Site B");
}

#[test]
fn reapplying_a_batch_is_a_noop() {
    let batch = || {
        Batch::new()
            .upsert(Node::root("org"))
            .upsert(Node::child("site", "org"))
            .upsert(Node::child("lost", "nowhere"))
    };
    let mut engine = MergeEngine::new();
    let first = engine.apply_batch(batch());
    assert_eq!(first.attached.len(), 2);

    let second = engine.apply_batch(batch());
    assert!(second.is_noop());
    assert!(second.paths.is_empty());
    assert!(second.rejected.is_empty());
}

#[test]
fn moving_a_subtree_reports_path_changes() {
    let mut engine = MergeEngine::new();
    engine.apply_batch(
        Batch::new()
            .upsert(Node::root("east"))
            .upsert(Node::root("west"))
            .upsert(Node::child("sub", "east"))
            .upsert(Node::child("site", "sub")),
    );

    let report = engine.apply_batch(Batch::new().upsert(Node::child("sub", "west")));
    assert_eq!(report.attached, vec!["sub", "site"]);
    assert_eq!(report.change("sub"), Some(RowChange::Moved));
    assert_eq!(report.change("site"), Some(RowChange::PathChanged));
    assert_eq!(engine.path_of("site").unwrap(), vec!["west", "sub", "site"]);
    assert!(engine.children_of("east").is_empty());
}
