//! Recording catalog adapters

mod json_catalog;

pub use json_catalog::{CatalogRecord, JsonCatalog, CATALOG_FILE_NAME};
