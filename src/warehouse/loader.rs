//! EntityLoader trait definition and the bundled loaders.
//!
//! Where collections come from (static files, a remote endpoint, a generator)
//! is outside the engine's concern. The contract is only
//! `name -> Vec<Record>`.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use super::error::{LoadError, LoadResult};
use crate::model::Record;

/// Trait for fetching entity collections by name.
///
/// # Example
///
/// ```ignore
/// use ledgerview::warehouse::{EntityLoader, JsonDirLoader};
///
/// let loader = JsonDirLoader::new("./data");
/// let charges = loader.fetch("charges").await?;
/// ```
#[async_trait]
pub trait EntityLoader: Send + Sync + 'static {
    /// Fetch every record of one entity.
    async fn fetch(&self, entity: &str) -> LoadResult<Vec<Record>>;

    /// Names this loader can serve, if it can enumerate them.
    async fn list_entities(&self) -> LoadResult<Vec<String>> {
        Ok(Vec::new())
    }
}

/// Loads `<dir>/<entity>.json`.
///
/// Each file holds either a JSON array of records or an object with a
/// `data` array (the list envelope used by payment APIs).
#[derive(Debug, Clone)]
pub struct JsonDirLoader {
    dir: PathBuf,
}

impl JsonDirLoader {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, entity: &str) -> Option<PathBuf> {
        let valid = !entity.is_empty()
            && entity
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        valid.then(|| self.dir.join(format!("{}.json", entity)))
    }
}

#[derive(serde::Deserialize)]
#[serde(untagged)]
enum Payload {
    Rows(Vec<Record>),
    Envelope { data: Vec<Record> },
}

#[async_trait]
impl EntityLoader for JsonDirLoader {
    async fn fetch(&self, entity: &str) -> LoadResult<Vec<Record>> {
        let path = self
            .path_for(entity)
            .ok_or_else(|| LoadError::NotFound(entity.to_string()))?;

        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(LoadError::NotFound(entity.to_string()))
            }
            Err(e) => return Err(LoadError::io(entity, &e)),
        };

        match serde_json::from_slice::<Payload>(&bytes) {
            Ok(Payload::Rows(rows)) | Ok(Payload::Envelope { data: rows }) => Ok(rows),
            Err(e) => Err(LoadError::malformed(entity, e.to_string())),
        }
    }

    async fn list_entities(&self) -> LoadResult<Vec<String>> {
        let mut dir = tokio::fs::read_dir(&self.dir)
            .await
            .map_err(|e| LoadError::io(&self.dir.display().to_string(), &e))?;

        let mut names = Vec::new();
        while let Some(entry) = dir
            .next_entry()
            .await
            .map_err(|e| LoadError::io(&self.dir.display().to_string(), &e))?
        {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some("json") {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    names.push(stem.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }
}

/// Serves collections held in memory.
#[derive(Debug, Clone, Default)]
pub struct StaticLoader {
    entities: HashMap<String, Vec<Record>>,
}

impl StaticLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entity(mut self, name: &str, records: Vec<Record>) -> Self {
        self.entities.insert(name.to_string(), records);
        self
    }
}

#[async_trait]
impl EntityLoader for StaticLoader {
    async fn fetch(&self, entity: &str) -> LoadResult<Vec<Record>> {
        self.entities
            .get(entity)
            .cloned()
            .ok_or_else(|| LoadError::NotFound(entity.to_string()))
    }

    async fn list_entities(&self) -> LoadResult<Vec<String>> {
        let mut names: Vec<String> = self.entities.keys().cloned().collect();
        names.sort();
        Ok(names)
    }
}
