//! Warehouse store: named entity collections with a version stamp.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        Warehouse (async)                        │
//! │  - load_entity / reload_entity      - version counter           │
//! │  - one in-flight load per entity    - stale results discarded   │
//! └─────────────────────────────────────────────────────────────────┘
//!            │ fetch(name)                      │ snapshot()
//!            ▼                                  ▼
//! ┌──────────────────────────┐   ┌──────────────────────────────────┐
//! │ EntityLoader             │   │ WarehouseSnapshot (sync, frozen) │
//! │ (JsonDirLoader, Static)  │   │ read by views and metric blocks  │
//! └──────────────────────────┘   └──────────────────────────────────┘
//! ```
//!
//! The only writer is the load path, which replaces a collection wholesale
//! and bumps the version. Everything downstream reads a snapshot and keys its
//! memoized results on the snapshot's version.

mod error;
mod loader;

pub use error::{LoadError, LoadResult};
pub use loader::{EntityLoader, JsonDirLoader, StaticLoader};

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use dashmap::DashMap;
use futures::future::{BoxFuture, FutureExt, Shared};
use tracing::{debug, info, warn};

use crate::model::Record;

/// A loaded collection and the warehouse version that installed it.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityCollection {
    pub name: String,
    pub records: Vec<Record>,
    pub version: u64,
}

/// Outcome of a successful load call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadStatus {
    /// The collection was fetched and installed at `version`.
    Loaded { version: u64, rows: usize },
    /// The collection was already present; nothing was fetched.
    AlreadyLoaded,
    /// A newer load of the same entity started meanwhile; this result was
    /// dropped.
    Superseded,
}

type SharedLoad = Shared<BoxFuture<'static, LoadResult<LoadStatus>>>;

struct InflightLoad {
    generation: u64,
    future: SharedLoad,
}

struct Inner<L: EntityLoader> {
    loader: L,
    entities: DashMap<String, Arc<EntityCollection>>,
    version: AtomicU64,
    next_generation: AtomicU64,
    inflight: Mutex<HashMap<String, InflightLoad>>,
}

/// Versioned store of entity collections.
///
/// Cheap to clone; clones share the same collections.
///
/// # Example
///
/// ```ignore
/// use ledgerview::warehouse::{JsonDirLoader, Warehouse};
///
/// let warehouse = Warehouse::new(JsonDirLoader::new("./data"));
/// warehouse.load_entity("charges").await?;
/// let snapshot = warehouse.snapshot();
/// assert!(snapshot.has_entity("charges"));
/// ```
pub struct Warehouse<L: EntityLoader> {
    inner: Arc<Inner<L>>,
}

impl<L: EntityLoader> Clone for Warehouse<L> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<L: EntityLoader> Warehouse<L> {
    pub fn new(loader: L) -> Self {
        Self {
            inner: Arc::new(Inner {
                loader,
                entities: DashMap::new(),
                version: AtomicU64::new(0),
                next_generation: AtomicU64::new(0),
                inflight: Mutex::new(HashMap::new()),
            }),
        }
    }

    pub fn loader(&self) -> &L {
        &self.inner.loader
    }

    /// Current version. Increases by one on every successful load.
    pub fn version(&self) -> u64 {
        self.inner.version.load(Ordering::SeqCst)
    }

    pub fn has_entity(&self, name: &str) -> bool {
        self.inner.entities.contains_key(name)
    }

    pub fn get_entity(&self, name: &str) -> Option<Arc<EntityCollection>> {
        self.inner.entities.get(name).map(|e| Arc::clone(e.value()))
    }

    /// Load an entity unless it is already present.
    ///
    /// Concurrent calls for the same name share one fetch. A failure leaves
    /// the version and every other collection untouched.
    pub async fn load_entity(&self, name: &str) -> LoadResult<LoadStatus> {
        if self.has_entity(name) {
            return Ok(LoadStatus::AlreadyLoaded);
        }

        let future = {
            let mut inflight = self.inner.lock_inflight();
            // loads install under this lock, so check again now that we hold it
            if self.has_entity(name) {
                return Ok(LoadStatus::AlreadyLoaded);
            }
            match inflight.get(name) {
                Some(load) => load.future.clone(),
                None => self.start_load(&mut inflight, name),
            }
        };
        future.await
    }

    /// Fetch an entity again, replacing the current collection.
    ///
    /// Any load of the same entity already in flight is superseded: its
    /// result is discarded when it completes.
    pub async fn reload_entity(&self, name: &str) -> LoadResult<LoadStatus> {
        let future = {
            let mut inflight = self.inner.lock_inflight();
            self.start_load(&mut inflight, name)
        };
        future.await
    }

    /// Load several entities concurrently.
    pub async fn preload(&self, names: &[String]) -> Vec<(String, LoadResult<LoadStatus>)> {
        let loads: Vec<_> = names
            .iter()
            .map(|name| async move { (name.clone(), self.load_entity(name).await) })
            .collect();
        futures::future::join_all(loads).await
    }

    /// Freeze the current collections for a recomputation pass.
    pub fn snapshot(&self) -> WarehouseSnapshot {
        // Held so no load installs between reading the collections and the
        // version that tags them.
        let _inflight = self.inner.lock_inflight();
        let entities = self
            .inner
            .entities
            .iter()
            .map(|e| (e.key().clone(), Arc::clone(e.value())))
            .collect();
        let version = self.version();
        WarehouseSnapshot { version, entities }
    }

    fn start_load(
        &self,
        inflight: &mut HashMap<String, InflightLoad>,
        name: &str,
    ) -> SharedLoad {
        let generation = self.inner.next_generation.fetch_add(1, Ordering::SeqCst) + 1;
        let inner = Arc::clone(&self.inner);
        let entity = name.to_string();

        let future = async move { inner.run_load(entity, generation).await }
            .boxed()
            .shared();

        inflight.insert(
            name.to_string(),
            InflightLoad {
                generation,
                future: future.clone(),
            },
        );
        future
    }
}

impl<L: EntityLoader> Inner<L> {
    fn lock_inflight(&self) -> MutexGuard<'_, HashMap<String, InflightLoad>> {
        self.inflight.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn run_load(self: Arc<Self>, entity: String, generation: u64) -> LoadResult<LoadStatus> {
        let result = self.loader.fetch(&entity).await;

        // Install under the in-flight lock so a reload cannot slip in between
        // the generation check and the write.
        let mut inflight = self.lock_inflight();
        if inflight.get(&entity).map(|l| l.generation) != Some(generation) {
            debug!(entity = %entity, generation, "discarding superseded load");
            return Ok(LoadStatus::Superseded);
        }
        inflight.remove(&entity);

        match result {
            Ok(records) => {
                let rows = records.len();
                let version = self.version.load(Ordering::SeqCst) + 1;
                self.entities.insert(
                    entity.clone(),
                    Arc::new(EntityCollection {
                        name: entity.clone(),
                        records,
                        version,
                    }),
                );
                self.version.store(version, Ordering::SeqCst);
                info!(entity = %entity, rows, version, "entity loaded");
                Ok(LoadStatus::Loaded { version, rows })
            }
            Err(e) => {
                warn!(entity = %entity, error = %e, "entity load failed");
                Err(e)
            }
        }
    }
}

/// A frozen, read-only view of the warehouse at one version.
///
/// All engine functions take one of these explicitly. An entity that is not
/// loaded reads as an empty collection.
#[derive(Debug, Clone, Default)]
pub struct WarehouseSnapshot {
    version: u64,
    entities: HashMap<String, Arc<EntityCollection>>,
}

impl WarehouseSnapshot {
    /// Build a snapshot directly from collections, for hosts that manage
    /// loading themselves.
    pub fn from_entities<I>(version: u64, entities: I) -> Self
    where
        I: IntoIterator<Item = (String, Vec<Record>)>,
    {
        let entities = entities
            .into_iter()
            .map(|(name, records)| {
                let collection = EntityCollection {
                    name: name.clone(),
                    records,
                    version,
                };
                (name, Arc::new(collection))
            })
            .collect();
        Self { version, entities }
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn has_entity(&self, name: &str) -> bool {
        self.entities.contains_key(name)
    }

    pub fn get_entity(&self, name: &str) -> &[Record] {
        self.entities
            .get(name)
            .map(|e| e.records.as_slice())
            .unwrap_or(&[])
    }

    pub fn entity_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.entities.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}
