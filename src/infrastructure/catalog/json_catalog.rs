//! JSON file catalog
//!
//! Committed recordings are listed in `catalog.json` next to the
//! recordings. Each insert rewrites the index through a temporary file.

use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use log::debug;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::sync::Mutex;

use crate::application::ports::{CatalogEntry, CatalogError, CatalogId, CatalogSink};

/// Index file name inside the recordings directory
pub const CATALOG_FILE_NAME: &str = "catalog.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogRecord {
    pub id: CatalogId,
    #[serde(flatten)]
    pub entry: CatalogEntry,
}

pub struct JsonCatalog {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonCatalog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Catalog stored in `dir`
    pub fn in_dir(dir: &Path) -> Self {
        Self::new(dir.join(CATALOG_FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Every catalogued recording, oldest first
    pub async fn records(&self) -> Result<Vec<CatalogRecord>, CatalogError> {
        match fs::read_to_string(&self.path).await {
            Ok(content) => serde_json::from_str(&content)
                .map_err(|e| CatalogError::ReadFailed(format!("{}: {}", self.path.display(), e))),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(CatalogError::ReadFailed(e.to_string())),
        }
    }

    async fn write(&self, records: &[CatalogRecord]) -> Result<(), CatalogError> {
        let content = serde_json::to_string_pretty(records)
            .map_err(|e| CatalogError::WriteFailed(e.to_string()))?;
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| CatalogError::WriteFailed(e.to_string()))?;
        }

        let staging = self.path.with_extension("json.tmp");
        fs::write(&staging, content)
            .await
            .map_err(|e| CatalogError::WriteFailed(e.to_string()))?;
        fs::rename(&staging, &self.path)
            .await
            .map_err(|e| CatalogError::WriteFailed(e.to_string()))
    }
}

fn next_id(records: &[CatalogRecord]) -> CatalogId {
    let highest = records
        .iter()
        .filter_map(|r| r.id.0.parse::<u64>().ok())
        .max()
        .unwrap_or(0);
    CatalogId((highest + 1).to_string())
}

#[async_trait]
impl CatalogSink for JsonCatalog {
    async fn insert(&self, entry: CatalogEntry) -> Result<CatalogId, CatalogError> {
        let _guard = self.write_lock.lock().await;

        let mut records = self.records().await?;
        // Re-committing a path replaces its previous record.
        records.retain(|r| r.entry.path != entry.path);
        let id = next_id(&records);
        debug!("catalog {} <- {}", id, entry.path.display());
        records.push(CatalogRecord {
            id: id.clone(),
            entry,
        });

        self.write(&records).await?;
        Ok(id)
    }
}
