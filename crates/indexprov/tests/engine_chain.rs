//! Chain linking under concurrency, failure and restart.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use indexprov::store::{Datastore, MemoryDatastore, SqliteDatastore, StoreError};
use indexprov::{
    DatastorePublisher, Engine, EngineConfig, EngineError, Link, MemoryPublisher, Publisher,
};
use indexprov_testkit::{random_link, TestFixture};

/// Publisher that fails while `fail` is set.
struct FlakyPublisher {
    inner: MemoryPublisher,
    fail: AtomicBool,
}

#[async_trait]
impl Publisher for FlakyPublisher {
    async fn head(&self) -> indexprov::Result<Option<Link>> {
        self.inner.head().await
    }

    async fn publish(&self, link: &Link, canonical: Bytes) -> indexprov::Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(EngineError::Store(StoreError::Closed));
        }
        self.inner.publish(link, canonical).await
    }

    async fn get(&self, link: &Link) -> indexprov::Result<Option<Bytes>> {
        self.inner.get(link).await
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_publishes_never_share_previous() {
    let fixture = Arc::new(TestFixture::new());
    let engine = Arc::new(
        Engine::start(
            fixture.keypair.clone(),
            MemoryPublisher::new(),
            EngineConfig::default(),
        )
        .await
        .unwrap(),
    );

    let tasks: Vec<_> = (0..32)
        .map(|i| {
            let engine = engine.clone();
            let fixture = fixture.clone();
            tokio::spawn(async move {
                let ctx = format!("ctx-{}", i);
                engine
                    .publish(fixture.make_ad(ctx.as_bytes(), random_link()))
                    .await
                    .unwrap()
            })
        })
        .collect();
    let links: Vec<Link> = futures::future::join_all(tasks)
        .await
        .into_iter()
        .map(|r| r.unwrap())
        .collect();

    let chain = engine.chain(usize::MAX).await.unwrap();
    assert_eq!(chain.len(), 32);

    let mut previous = HashSet::new();
    let mut roots = 0;
    for (_, ad) in &chain {
        match &ad.previous_id {
            Some(prev) => assert!(previous.insert(prev.clone()), "two ads link to {}", prev),
            None => roots += 1,
        }
    }
    assert_eq!(roots, 1);

    let published: HashSet<_> = links.into_iter().collect();
    let chained: HashSet<_> = chain.into_iter().map(|(l, _)| l).collect();
    assert_eq!(published, chained);
    assert_eq!(engine.publisher().published().len(), 32);
}

#[tokio::test]
async fn test_publisher_failure_keeps_head() {
    let fixture = TestFixture::new();
    let publisher = FlakyPublisher {
        inner: MemoryPublisher::new(),
        fail: AtomicBool::new(false),
    };
    let engine = Engine::start(fixture.keypair.clone(), publisher, EngineConfig::default())
        .await
        .unwrap();

    let first = engine.publish(fixture.make_ad(b"a", random_link())).await.unwrap();

    engine.publisher().fail.store(true, Ordering::SeqCst);
    assert!(engine.publish(fixture.make_ad(b"b", random_link())).await.is_err());
    assert_eq!(engine.latest().await, Some(first.clone()));

    engine.publisher().fail.store(false, Ordering::SeqCst);
    let second = engine.publish(fixture.make_ad(b"c", random_link())).await.unwrap();
    let ad = engine.get_advertisement(&second).await.unwrap().unwrap();
    assert_eq!(ad.previous_id, Some(first));
}

#[tokio::test]
async fn test_engine_resumes_from_sqlite() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("ads.db");
    let fixture = TestFixture::new();

    let head = {
        let publisher = DatastorePublisher::new(SqliteDatastore::open(&db).unwrap());
        let engine = Engine::start(fixture.keypair.clone(), publisher, EngineConfig::default())
            .await
            .unwrap();
        engine.publish(fixture.make_ad(b"a", random_link())).await.unwrap();
        let head = engine.publish(fixture.make_ad(b"b", random_link())).await.unwrap();
        engine.shutdown().await.unwrap();
        head
    };

    let publisher = DatastorePublisher::new(SqliteDatastore::open(&db).unwrap());
    let engine = Engine::start(fixture.keypair.clone(), publisher, EngineConfig::default())
        .await
        .unwrap();
    assert_eq!(engine.latest().await, Some(head.clone()));

    let next = engine.publish_removal(&b"a"[..]).await.unwrap();
    let chain = engine.chain(10).await.unwrap();
    assert_eq!(chain.len(), 3);
    assert_eq!(chain[0].0, next);
    assert_eq!(chain[0].1.previous_id, Some(head));
}

#[tokio::test]
async fn test_stored_ads_decode_and_verify() {
    let fixture = TestFixture::new();
    let engine = Engine::start(
        fixture.keypair.clone(),
        DatastorePublisher::new(MemoryDatastore::new()),
        EngineConfig::default(),
    )
    .await
    .unwrap();

    let link = engine.publish(fixture.make_ad(b"ctx", random_link())).await.unwrap();
    let ad = engine.get_advertisement(&link).await.unwrap().unwrap();
    assert_eq!(ad.link(), link);
    assert_eq!(ad.verify_signature().unwrap(), fixture.peer_id());
    indexprov::core::validate_advertisement(&ad).unwrap();

    assert!(engine.get_advertisement(&random_link()).await.unwrap().is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_dropped_publish_does_not_fork_chain() {
    let dir = tempfile::tempdir().unwrap();
    let fixture = TestFixture::new();
    let publisher = DatastorePublisher::new(SqliteDatastore::open(dir.path().join("ads.db")).unwrap());
    let engine = Engine::start(fixture.keypair.clone(), publisher, EngineConfig::default())
        .await
        .unwrap();

    // Abandon each publish almost immediately, mid-write.
    for i in 0..8 {
        let ctx = format!("dropped-{}", i);
        let _ = tokio::time::timeout(
            Duration::from_micros(1),
            engine.publish(fixture.make_ad(ctx.as_bytes(), random_link())),
        )
        .await;
    }
    let last = engine.publish(fixture.make_ad(b"kept", random_link())).await.unwrap();

    let ds = engine.publisher().datastore();
    let mut stored = 0;
    for _ in 0..200 {
        stored = ds.query_prefix("/ad/").await.unwrap().len();
        if stored == 9 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(stored, 9);

    let head = engine.latest().await;
    assert_eq!(head, engine.publisher().head().await.unwrap());

    // Every stored ad is reachable from the head, through one chain.
    let chain = engine.chain(usize::MAX).await.unwrap();
    assert_eq!(chain.len(), 9);
    assert!(chain.iter().any(|(link, _)| *link == last));
    assert_eq!(chain.iter().filter(|(_, ad)| ad.previous_id.is_none()).count(), 1);

    let next = engine.publish_removal(&b"kept"[..]).await.unwrap();
    let ad = engine.get_advertisement(&next).await.unwrap().unwrap();
    assert_eq!(ad.previous_id, head);
}
