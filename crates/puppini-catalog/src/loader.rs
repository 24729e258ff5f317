//! Catalog snapshot loading

use crate::adapter::{CatalogError, CatalogProvider};
use puppini_core::{config::glob_match, Catalog, Config, TableSchema, DEFAULT_BRIDGE_TABLE};

/// Which tables form the source set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadOptions {
    /// Bridge table name; never treated as a source
    pub bridge_table: String,

    /// Exclusion globs (simple `*` patterns)
    pub exclude: Vec<String>,
}

impl LoadOptions {
    pub fn new(bridge_table: impl Into<String>) -> Self {
        Self {
            bridge_table: bridge_table.into(),
            exclude: Vec::new(),
        }
    }

    /// Add an exclusion pattern
    pub fn exclude(mut self, pattern: impl Into<String>) -> Self {
        self.exclude.push(pattern.into());
        self
    }

    /// Whether `table` belongs to the source set
    pub fn is_source(&self, table: &str) -> bool {
        !table.eq_ignore_ascii_case(&self.bridge_table)
            && !self.exclude.iter().any(|pattern| glob_match(pattern, table))
    }
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self::new(DEFAULT_BRIDGE_TABLE)
    }
}

impl From<&Config> for LoadOptions {
    fn from(config: &Config) -> Self {
        Self {
            bridge_table: config.bridge_table.clone(),
            exclude: config.exclude_tables.clone(),
        }
    }
}

/// Names of the source tables, in provider listing order
pub async fn source_table_names(
    provider: &dyn CatalogProvider,
    options: &LoadOptions,
) -> Result<Vec<String>, CatalogError> {
    let tables = provider.list_tables().await?;
    Ok(tables.into_iter().filter(|t| options.is_source(t)).collect())
}

/// Read a snapshot of every source table
///
/// Any provider failure aborts the load.
pub async fn load_catalog(
    provider: &dyn CatalogProvider,
    options: &LoadOptions,
) -> Result<Catalog, CatalogError> {
    let names = source_table_names(provider, options).await?;
    let mut tables = Vec::with_capacity(names.len());

    for name in names {
        let columns = provider.get_columns(&name).await?;
        let primary_key = provider.get_primary_key(&name).await?;
        let foreign_keys = provider.get_foreign_keys(&name).await?;

        tracing::debug!(
            table = %name,
            columns = columns.len(),
            foreign_keys = foreign_keys.len(),
            "loaded table"
        );

        tables.push(TableSchema::new(name, columns, primary_key, &foreign_keys));
    }

    tracing::info!(tables = tables.len(), provider = provider.name(), "catalog loaded");
    Ok(Catalog::new(tables))
}
