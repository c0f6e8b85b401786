use orgtree::config::QueueConfig;
use orgtree::error::ApiError;
use orgtree::expansion::{Expander, SubtreeLoader};
use orgtree::merge::{Batch, MergeEngine, RowChange};
use orgtree::queue::{BatchSource, MergeQueue};
use orgtree::store::Node;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

const PRODUCERS: usize = 8;
const CHAIN: usize = 10;

fn chain_key(producer: usize, depth: usize) -> String {
    format!("p{}-{}", producer, depth)
}

/// A chain `p{i}-0 <- p{i}-1 <- ...`, deepest first
fn chain_batch(producer: usize) -> Batch {
    (0..CHAIN)
        .rev()
        .map(|depth| {
            let key = chain_key(producer, depth);
            if depth == 0 {
                Node::root(key)
            } else {
                Node::child(key, chain_key(producer, depth - 1))
            }
        })
        .collect()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_producers_never_expose_partial_batches() {
    let queue = Arc::new(MergeQueue::start(
        MergeEngine::new(),
        &QueueConfig { capacity: 2 },
    ));
    let done = Arc::new(AtomicBool::new(false));

    let reader = {
        let queue = Arc::clone(&queue);
        let done = Arc::clone(&done);
        tokio::spawn(async move {
            while !done.load(Ordering::SeqCst) {
                queue.with_engine(|engine| {
                    for producer in 0..PRODUCERS {
                        let present = (0..CHAIN)
                            .filter(|depth| engine.contains(&chain_key(producer, *depth)))
                            .count();
                        assert!(present == 0 || present == CHAIN);
                    }
                });
                tokio::task::yield_now().await;
            }
        })
    };

    let producers: Vec<_> = (0..PRODUCERS)
        .map(|producer| {
            let queue = Arc::clone(&queue);
            tokio::spawn(async move {
                queue
                    .submit(BatchSource::UserEdit, chain_batch(producer))
                    .await
            })
        })
        .collect();

    for (producer, handle) in producers.into_iter().enumerate() {
        let report = handle.await.unwrap().unwrap();
        assert_eq!(report.attached.len(), CHAIN);
        assert_eq!(report.attached[0], chain_key(producer, 0));
        assert!(report.orphaned.is_empty());
    }
    done.store(true, Ordering::SeqCst);
    reader.await.unwrap();

    let rows = queue.rows();
    assert_eq!(rows.len(), PRODUCERS * CHAIN);
    assert_eq!(queue.stats().applied, PRODUCERS as u64);
    assert_eq!(
        queue.path_of(&chain_key(3, 2)).unwrap(),
        vec![chain_key(3, 0), chain_key(3, 1), chain_key(3, 2)]
    );
    queue.shutdown().await.unwrap();
}

struct RegionLoader;

#[async_trait::async_trait]
impl SubtreeLoader for RegionLoader {
    async fn load_children(&self, key: &str) -> Result<Batch, ApiError> {
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        Ok(Batch::new()
            .upsert(Node::child(format!("{}/north", key), key).with_attribute("name", "North"))
            .upsert(Node::child(format!("{}/south", key), key).with_attribute("name", "South")))
    }

    fn placeholders(&self, key: &str) -> Vec<Node> {
        vec![
            Node::placeholder(format!("{}/north", key), key),
            Node::placeholder(format!("{}/south", key), key),
        ]
    }
}

#[tokio::test]
async fn expansion_and_bulk_load_share_one_writer() {
    let queue = Arc::new(MergeQueue::start(MergeEngine::new(), &QueueConfig::default()));
    queue
        .submit(
            BatchSource::BulkLoad,
            Batch::new().upsert(Node::root("emea")).upsert(Node::root("apac")),
        )
        .await
        .unwrap();

    let expander = Expander::new(Arc::clone(&queue), Arc::new(RegionLoader));
    let (emea, apac) = tokio::join!(expander.expand("emea"), expander.expand("apac"));
    let emea = emea.unwrap();
    let apac = apac.unwrap();

    assert!(!emea.stale && !apac.stale);
    assert_eq!(emea.report.change("emea/north"), Some(RowChange::Superseded));
    assert_eq!(apac.report.change("apac/south"), Some(RowChange::Superseded));

    let rows = queue.rows();
    let keys: Vec<&str> = rows.iter().map(|row| row.key.as_str()).collect();
    assert_eq!(
        keys,
        vec!["emea", "emea/north", "emea/south", "apac", "apac/north", "apac/south"]
    );
    assert!(rows.iter().all(|row| !row.is_placeholder));
    assert_eq!(queue.stats().applied, 5);
}
