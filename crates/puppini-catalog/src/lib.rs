//! Catalog providers for bridge building
//!
//! This crate reads the structure and rows of the source schema and executes
//! generated statements against it.
//!
//! ## Features
//!
//! - `postgres` - PostgreSQL support via information_schema
//!
//! The in-memory [`MockCatalog`] is always available and can be loaded from a
//! JSON fixture, which is how offline runs and tests work.
//!
//! ## Example
//!
//! ```rust,ignore
//! use puppini_catalog::{load_catalog, LoadOptions, MockCatalog};
//!
//! let provider = MockCatalog::from_json_file(Path::new("catalog.json"))?;
//! let catalog = load_catalog(&provider, &LoadOptions::default()).await?;
//! ```

pub mod adapter;
pub mod loader;
pub mod mock;
pub mod postgres;

pub use adapter::{CatalogError, CatalogProvider, Database, StatementExecutor};
pub use loader::{load_catalog, source_table_names, LoadOptions};
pub use mock::{MockCatalog, MockCatalogBuilder, MockTable};
pub use postgres::PostgresCatalog;
