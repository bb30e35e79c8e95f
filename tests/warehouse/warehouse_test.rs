#[path = "../support/mod.rs"]
mod support;

use async_trait::async_trait;
use ledgerview::model::Record;
use ledgerview::warehouse::{
    EntityLoader, JsonDirLoader, LoadError, LoadResult, LoadStatus, Warehouse,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

/// Counts fetches and holds each one briefly so concurrent callers overlap.
#[derive(Default)]
struct CountingLoader {
    fetches: Arc<AtomicUsize>,
}

#[async_trait]
impl EntityLoader for CountingLoader {
    async fn fetch(&self, _entity: &str) -> LoadResult<Vec<Record>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(20)).await;
        Ok(support::charges())
    }
}

/// The first fetch waits for `release`; later fetches return at once with a
/// single marker row.
struct GateLoader {
    calls: AtomicUsize,
    started: Arc<Notify>,
    release: Arc<Notify>,
}

#[async_trait]
impl EntityLoader for GateLoader {
    async fn fetch(&self, _entity: &str) -> LoadResult<Vec<Record>> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call == 0 {
            self.started.notify_one();
            self.release.notified().await;
            Ok(vec![Record::new().with("id", "stale")])
        } else {
            Ok(vec![Record::new().with("id", "fresh")])
        }
    }
}

/// Returns at once with one row recording which fetch produced it.
#[derive(Default)]
struct SequenceLoader {
    fetches: AtomicUsize,
}

#[async_trait]
impl EntityLoader for SequenceLoader {
    async fn fetch(&self, _entity: &str) -> LoadResult<Vec<Record>> {
        let fetch = self.fetches.fetch_add(1, Ordering::SeqCst) + 1;
        tokio::task::yield_now().await;
        Ok(vec![Record::new().with("fetch", fetch as f64)])
    }
}

struct FailingLoader;

#[async_trait]
impl EntityLoader for FailingLoader {
    async fn fetch(&self, entity: &str) -> LoadResult<Vec<Record>> {
        if entity == "charges" {
            Ok(support::charges())
        } else {
            Err(LoadError::malformed(entity, "expected an array"))
        }
    }
}

#[tokio::test]
async fn test_load_installs_and_bumps_version() {
    let warehouse = Warehouse::new(support::ledger_loader());
    assert_eq!(warehouse.version(), 0);

    let status = warehouse.load_entity("charges").await.unwrap();
    assert_eq!(status, LoadStatus::Loaded { version: 1, rows: 5 });
    assert_eq!(warehouse.version(), 1);

    let again = warehouse.load_entity("charges").await.unwrap();
    assert_eq!(again, LoadStatus::AlreadyLoaded);
    assert_eq!(warehouse.version(), 1);

    let snapshot = warehouse.snapshot();
    assert_eq!(snapshot.version(), 1);
    assert_eq!(snapshot.get_entity("charges").len(), 5);
    assert!(snapshot.get_entity("customers").is_empty());
}

#[tokio::test]
async fn test_concurrent_loads_share_one_fetch() {
    let loader = CountingLoader::default();
    let fetches = Arc::clone(&loader.fetches);
    let warehouse = Warehouse::new(loader);

    let (a, b, c) = tokio::join!(
        warehouse.load_entity("charges"),
        warehouse.load_entity("charges"),
        warehouse.load_entity("charges"),
    );

    assert_eq!(fetches.load(Ordering::SeqCst), 1);
    assert_eq!(a.unwrap(), LoadStatus::Loaded { version: 1, rows: 5 });
    assert_eq!(b.unwrap(), LoadStatus::Loaded { version: 1, rows: 5 });
    assert_eq!(c.unwrap(), LoadStatus::Loaded { version: 1, rows: 5 });
    assert_eq!(warehouse.version(), 1);
}

#[tokio::test]
async fn test_reload_supersedes_inflight_load() {
    let started = Arc::new(Notify::new());
    let release = Arc::new(Notify::new());
    let warehouse = Warehouse::new(GateLoader {
        calls: AtomicUsize::new(0),
        started: Arc::clone(&started),
        release: Arc::clone(&release),
    });

    let first = {
        let warehouse = warehouse.clone();
        tokio::spawn(async move { warehouse.load_entity("charges").await })
    };
    started.notified().await;

    let reload = warehouse.reload_entity("charges").await.unwrap();
    assert_eq!(reload, LoadStatus::Loaded { version: 1, rows: 1 });

    release.notify_one();
    let stale = first.await.unwrap().unwrap();
    assert_eq!(stale, LoadStatus::Superseded);

    let snapshot = warehouse.snapshot();
    assert_eq!(snapshot.version(), 1);
    assert_eq!(
        snapshot.get_entity("charges")[0].get("id").as_str(),
        Some("fresh")
    );
}

#[tokio::test]
async fn test_failed_load_leaves_state_untouched() {
    let warehouse = Warehouse::new(FailingLoader);
    warehouse.load_entity("charges").await.unwrap();

    let err = warehouse.load_entity("customers").await.unwrap_err();
    assert_eq!(err.entity(), "customers");
    assert!(!err.is_retriable());

    assert_eq!(warehouse.version(), 1);
    assert!(!warehouse.has_entity("customers"));
    assert_eq!(warehouse.snapshot().get_entity("charges").len(), 5);
}

#[tokio::test]
async fn test_snapshot_is_frozen() {
    let warehouse = Warehouse::new(support::ledger_loader());
    warehouse.load_entity("charges").await.unwrap();
    let before = warehouse.snapshot();

    warehouse.load_entity("customers").await.unwrap();

    assert_eq!(before.version(), 1);
    assert!(!before.has_entity("customers"));
    assert_eq!(warehouse.snapshot().entity_names(), vec!["charges", "customers"]);
}

#[tokio::test]
async fn test_preload_reports_each_entity() {
    let warehouse = Warehouse::new(support::ledger_loader());
    let names = vec!["charges".to_string(), "payouts".to_string()];

    let results = warehouse.preload(&names).await;
    assert_eq!(results.len(), 2);
    assert!(results[0].1.is_ok());
    assert_eq!(
        results[1].1,
        Err(LoadError::NotFound("payouts".to_string()))
    );
    assert_eq!(warehouse.version(), 1);
}

#[tokio::test]
async fn test_json_dir_loader_through_warehouse() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("payouts.json"),
        r#"{"object": "list", "data": [{"id": "po_1", "amount": 5000, "arrival_date": "2025-01-04"}]}"#,
    )
    .unwrap();

    let warehouse = Warehouse::new(JsonDirLoader::new(dir.path()));
    assert_eq!(
        warehouse.loader().list_entities().await.unwrap(),
        vec!["payouts".to_string()]
    );

    warehouse.load_entity("payouts").await.unwrap();
    let snapshot = warehouse.snapshot();
    let payout = &snapshot.get_entity("payouts")[0];
    assert_eq!(payout.get("amount").as_f64(), Some(5000.0));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_loads_racing_a_finished_load_do_not_fetch_again() {
    for _ in 0..50 {
        let warehouse = Warehouse::new(SequenceLoader::default());
        let tasks: Vec<_> = (0..16)
            .map(|_| {
                let warehouse = warehouse.clone();
                tokio::spawn(async move { warehouse.load_entity("charges").await })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        assert_eq!(warehouse.loader().fetches.load(Ordering::SeqCst), 1);
        assert_eq!(warehouse.version(), 1);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_snapshot_version_matches_its_collections() {
    let warehouse = Warehouse::new(SequenceLoader::default());
    warehouse.load_entity("charges").await.unwrap();

    let reloader = {
        let warehouse = warehouse.clone();
        tokio::spawn(async move {
            for _ in 0..200 {
                warehouse.reload_entity("charges").await.unwrap();
            }
        })
    };

    // each fetch installs exactly one version, so fetch n is version n
    for _ in 0..200 {
        let snapshot = warehouse.snapshot();
        let fetch = snapshot.get_entity("charges")[0].get("fetch").as_f64();
        assert_eq!(fetch, Some(snapshot.version() as f64));
        tokio::task::yield_now().await;
    }
    reloader.await.unwrap();
}
