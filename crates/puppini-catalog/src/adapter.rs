//! Catalog provider and statement executor traits

use puppini_core::{Column, ForeignKeyInfo, Row, Value};

/// Errors that can occur when talking to a source database
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CatalogError {
    #[error("Authentication failed: {0}")]
    AuthenticationError(String),

    #[error("Table not found: {0}")]
    TableNotFound(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Query failed: {0}")]
    QueryError(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Read access to the structure and data of the source schema
///
/// Introspection methods (`list_tables`, `get_columns`, `get_primary_key`,
/// `get_foreign_keys`) feed the catalog snapshot; `scan_rows` and
/// `fetch_row` feed the row builder and closure walk.
#[async_trait::async_trait]
pub trait CatalogProvider: Send + Sync {
    /// Get the provider name (e.g., "PostgreSQL", "Mock")
    fn name(&self) -> &'static str;

    /// Names of every table visible to the provider
    async fn list_tables(&self) -> Result<Vec<String>, CatalogError>;

    /// Columns of `table` in definition order
    async fn get_columns(&self, table: &str) -> Result<Vec<Column>, CatalogError>;

    /// Primary-key columns of `table`; empty when there is none
    async fn get_primary_key(&self, table: &str) -> Result<Vec<String>, CatalogError>;

    /// Foreign-key constraints declared on `table`
    async fn get_foreign_keys(&self, table: &str) -> Result<Vec<ForeignKeyInfo>, CatalogError>;

    /// Every row of `table`
    async fn scan_rows(&self, table: &str) -> Result<Vec<Row>, CatalogError>;

    /// The first row of `table` whose `column` equals `value`
    ///
    /// `Ok(None)` means the row does not exist; errors are reserved for
    /// failures of the lookup itself.
    async fn fetch_row(
        &self,
        table: &str,
        column: &str,
        value: &Value,
    ) -> Result<Option<Row>, CatalogError>;

    /// Test the connection to the database
    async fn test_connection(&self) -> Result<(), CatalogError>;
}

/// Write access used when statements are executed instead of printed
#[async_trait::async_trait]
pub trait StatementExecutor: Send + Sync {
    /// Execute one statement, returning the number of affected rows
    async fn execute(&self, sql: &str) -> Result<u64, CatalogError>;

    /// Execute statements as one unit
    ///
    /// The default runs them one by one and stops at the first failure.
    async fn execute_batch(&self, statements: &[String]) -> Result<(), CatalogError> {
        for statement in statements {
            self.execute(statement).await?;
        }
        Ok(())
    }
}

/// A backend that can both describe and modify the source schema
pub trait Database: CatalogProvider + StatementExecutor {}

impl<T: CatalogProvider + StatementExecutor + ?Sized> Database for T {}
