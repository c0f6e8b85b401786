use orgtree::merge::{Batch, MergeEngine};
use orgtree::store::Node;
use proptest::prelude::*;
use proptest::sample::Index;
use std::collections::HashMap;

/// Random forest: node `i` either is a root or hangs under some `j < i`
fn forest() -> impl Strategy<Value = Vec<Node>> {
    (1usize..40)
        .prop_flat_map(|n| proptest::collection::vec(proptest::option::of(any::<Index>()), n))
        .prop_map(|parents| {
            parents
                .iter()
                .enumerate()
                .map(|(i, parent)| {
                    let key = format!("n{}", i);
                    match parent {
                        Some(index) if i > 0 => Node::child(key, format!("n{}", index.index(i))),
                        _ => Node::root(key),
                    }
                })
                .collect()
        })
}

/// The same forest in a random arrival order
fn shuffled_forest() -> impl Strategy<Value = Vec<Node>> {
    forest().prop_flat_map(|nodes| Just(nodes).prop_shuffle())
}

fn assert_path_invariant(engine: &MergeEngine, nodes: &[Node]) {
    for node in nodes {
        let path = engine.path_of(&node.key).unwrap();
        assert_eq!(path.last(), Some(&node.key));
        match &node.parent {
            Some(parent) => {
                let mut expected = engine.path_of(parent).unwrap();
                expected.push(node.key.clone());
                assert_eq!(path, expected);
            }
            None => assert_eq!(path, vec![node.key.clone()]),
        }
    }
}

proptest! {
    #[test]
    fn single_batch_attaches_everything_in_parent_order(nodes in shuffled_forest()) {
        let mut engine = MergeEngine::new();
        let report = engine.apply_batch(nodes.iter().cloned().collect());

        prop_assert_eq!(report.attached.len(), nodes.len());
        prop_assert!(report.orphaned.is_empty());
        prop_assert!(report.rejected.is_empty());

        let position: HashMap<&str, usize> = report
            .attached
            .iter()
            .enumerate()
            .map(|(i, key)| (key.as_str(), i))
            .collect();
        for node in &nodes {
            if let Some(parent) = &node.parent {
                prop_assert!(position[parent.as_str()] < position[node.key.as_str()]);
            }
        }
        assert_path_invariant(&engine, &nodes);
    }

    #[test]
    fn split_batches_converge(nodes in shuffled_forest(), split in any::<Index>()) {
        let at = split.index(nodes.len() + 1);
        let (first, second) = nodes.split_at(at);

        let mut engine = MergeEngine::new();
        engine.apply_batch(first.iter().cloned().collect());
        let report = engine.apply_batch(second.iter().cloned().collect());

        prop_assert!(engine.orphans().is_empty());
        prop_assert_eq!(engine.len(), nodes.len());
        assert_path_invariant(&engine, &nodes);

        // Everything the second batch revealed is listed parents first.
        let position: HashMap<&str, usize> = report
            .attached
            .iter()
            .enumerate()
            .map(|(i, key)| (key.as_str(), i))
            .collect();
        for key in &report.attached {
            if let Some(parent) = engine.store().parent_of(key) {
                if let Some(parent_pos) = position.get(parent.as_str()) {
                    prop_assert!(*parent_pos < position[key.as_str()]);
                }
            }
        }
    }

    #[test]
    fn reapplying_is_idempotent(nodes in shuffled_forest()) {
        let batch: Batch = nodes.iter().cloned().collect();
        let mut engine = MergeEngine::new();
        engine.apply_batch(batch.clone());
        let paths_before: Vec<_> = nodes.iter().map(|n| engine.path_of(&n.key).unwrap()).collect();

        let report = engine.apply_batch(batch);
        prop_assert!(report.is_noop());
        prop_assert!(report.rejected.is_empty());
        let paths_after: Vec<_> = nodes.iter().map(|n| engine.path_of(&n.key).unwrap()).collect();
        prop_assert_eq!(paths_before, paths_after);
    }
}
