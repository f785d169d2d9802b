//! Recording catalog port interface

use std::fmt;
use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Catalog errors
#[derive(Debug, Clone, Error)]
pub enum CatalogError {
    #[error("Failed to read catalog: {0}")]
    ReadFailed(String),

    #[error("Failed to update catalog: {0}")]
    WriteFailed(String),
}

/// Identifier assigned to a catalogued recording
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CatalogId(pub String);

impl fmt::Display for CatalogId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What is handed to the catalog for a finished recording
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub title: String,
    pub path: PathBuf,
    pub mime_type: String,
    pub duration_secs: u64,
    pub date_added: DateTime<Utc>,
    pub date_modified: Option<DateTime<Utc>>,
}

/// Port for the media library recordings are committed to
#[async_trait]
pub trait CatalogSink: Send + Sync {
    /// Insert a finished recording.
    async fn insert(&self, entry: CatalogEntry) -> Result<CatalogId, CatalogError>;
}
