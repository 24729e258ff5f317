//! In-memory catalog for tests, demos and offline runs
//!
//! `MockCatalog` holds table definitions and rows without connecting to any
//! database. It can be built in code with [`MockCatalogBuilder`] or loaded
//! from a JSON fixture:
//!
//! ```json
//! {
//!   "tables": [
//!     {
//!       "name": "DimStore",
//!       "columns": [
//!         { "name": "StoreKey", "logical_type": { "type": "int" } },
//!         { "name": "GeographyKey", "logical_type": { "type": "int" } }
//!       ],
//!       "primary_key": ["StoreKey"],
//!       "foreign_keys": [
//!         {
//!           "name": "fk_store_geography",
//!           "columns": ["GeographyKey"],
//!           "referenced_table": "DimGeography",
//!           "referenced_columns": ["GeographyKey"]
//!         }
//!       ],
//!       "rows": [ { "StoreKey": 101, "GeographyKey": 1 } ]
//!     }
//!   ]
//! }
//! ```
//!
//! Failures can be simulated per table, for the whole listing, for single
//! lookups and for executed statements. Executed statements are recorded so
//! tests can assert on them.

use crate::adapter::{CatalogError, CatalogProvider, StatementExecutor};
use puppini_core::{Column, ForeignKeyInfo, LogicalType, Row, Value};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;

/// One table held by the mock catalog
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MockTable {
    pub name: String,
    pub columns: Vec<Column>,
    pub primary_key: Vec<String>,
    pub foreign_keys: Vec<ForeignKeyInfo>,
    pub rows: Vec<Row>,
}

impl MockTable {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Add a column
    pub fn column(mut self, name: &str, logical_type: LogicalType) -> Self {
        self.columns.push(Column::new(name, logical_type));
        self
    }

    /// Set the primary-key columns
    pub fn primary_key(mut self, columns: &[&str]) -> Self {
        self.primary_key = columns.iter().map(|c| c.to_string()).collect();
        self
    }

    /// Add a single-column foreign key
    pub fn foreign_key(
        mut self,
        constraint: &str,
        column: &str,
        referenced_table: &str,
        referenced_column: &str,
    ) -> Self {
        self.foreign_keys.push(ForeignKeyInfo::new(
            constraint,
            column,
            referenced_table,
            referenced_column,
        ));
        self
    }

    /// Add a row
    pub fn row(mut self, row: Row) -> Self {
        self.rows.push(row);
        self
    }

    fn column_type(&self, column: &str) -> LogicalType {
        self.columns
            .iter()
            .find(|c| c.name == column)
            .map(|c| c.logical_type.clone())
            .unwrap_or(LogicalType::Unknown)
    }
}

#[derive(Debug, Deserialize)]
struct FixtureFile {
    tables: Vec<FixtureTable>,
}

#[derive(Debug, Deserialize)]
struct FixtureTable {
    name: String,
    columns: Vec<Column>,
    #[serde(default)]
    primary_key: Vec<String>,
    #[serde(default)]
    foreign_keys: Vec<ForeignKeyInfo>,
    #[serde(default)]
    rows: Vec<serde_json::Map<String, serde_json::Value>>,
}

impl FixtureTable {
    fn into_table(self) -> Result<MockTable, CatalogError> {
        let mut table = MockTable {
            name: self.name,
            columns: self.columns,
            primary_key: self.primary_key,
            foreign_keys: self.foreign_keys,
            rows: Vec::with_capacity(self.rows.len()),
        };

        for (index, raw) in self.rows.into_iter().enumerate() {
            let mut row = Row::new();
            for (column, json) in raw {
                let value = Value::from_json(&json, &table.column_type(&column)).map_err(|e| {
                    CatalogError::InvalidResponse(format!(
                        "{} row {} column {}: {}",
                        table.name,
                        index + 1,
                        column,
                        e
                    ))
                })?;
                row.set(column, value);
            }
            table.rows.push(row);
        }

        Ok(table)
    }
}

/// Mock catalog for testing
///
/// State is shared between clones, so a test can keep a handle and inspect
/// executed statements after handing a clone to the code under test.
pub struct MockCatalog {
    /// Tables in listing order
    tables: Arc<RwLock<Vec<MockTable>>>,

    /// Errors to return for introspection and scans of specific tables
    errors: Arc<RwLock<HashMap<String, CatalogError>>>,

    /// Errors to return for point lookups into specific tables
    lookup_errors: Arc<RwLock<HashMap<String, CatalogError>>>,

    /// Statements accepted by `execute`
    executed: Arc<RwLock<Vec<String>>>,

    /// Statements containing any of these fragments fail to execute
    failing_statements: Arc<RwLock<Vec<String>>>,

    /// Simulate failure listing tables
    fail_listing: bool,

    /// Simulate connection failure
    fail_connection: bool,

    /// Name to return from name() method
    adapter_name: &'static str,
}

impl MockCatalog {
    /// Create a new mock catalog with no tables
    pub fn new() -> Self {
        Self::from_tables(Vec::new())
    }

    /// Create a mock catalog from pre-built tables
    pub fn from_tables(tables: Vec<MockTable>) -> Self {
        Self {
            tables: Arc::new(RwLock::new(tables)),
            errors: Arc::new(RwLock::new(HashMap::new())),
            lookup_errors: Arc::new(RwLock::new(HashMap::new())),
            executed: Arc::new(RwLock::new(Vec::new())),
            failing_statements: Arc::new(RwLock::new(Vec::new())),
            fail_listing: false,
            fail_connection: false,
            adapter_name: "Mock",
        }
    }

    /// Load tables and rows from a JSON fixture string
    pub fn from_json_str(json: &str) -> Result<Self, CatalogError> {
        let fixture: FixtureFile = serde_json::from_str(json)
            .map_err(|e| CatalogError::InvalidResponse(format!("invalid catalog fixture: {}", e)))?;

        let tables = fixture
            .tables
            .into_iter()
            .map(FixtureTable::into_table)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self::from_tables(tables))
    }

    /// Load tables and rows from a JSON fixture file
    pub fn from_json_file(path: &Path) -> Result<Self, CatalogError> {
        let json = std::fs::read_to_string(path).map_err(|e| {
            CatalogError::ConfigError(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_json_str(&json)
    }

    /// Add a table, replacing one with the same name
    pub async fn add_table(&self, table: MockTable) {
        let mut tables = self.tables.write().await;
        match tables.iter_mut().find(|t| t.name == table.name) {
            Some(existing) => *existing = table,
            None => tables.push(table),
        }
    }

    /// Append a row to an existing table
    pub async fn add_row(&self, table: &str, row: Row) -> Result<(), CatalogError> {
        let mut tables = self.tables.write().await;
        let target = tables
            .iter_mut()
            .find(|t| t.name == table)
            .ok_or_else(|| CatalogError::TableNotFound(table.to_string()))?;
        target.rows.push(row);
        Ok(())
    }

    /// Configure an error for introspection and scans of `table`
    pub async fn add_error_for_table(&self, table: &str, error: CatalogError) {
        self.errors.write().await.insert(table.to_string(), error);
    }

    /// Configure an error for point lookups into `table`
    pub async fn add_lookup_error(&self, table: &str, error: CatalogError) {
        self.lookup_errors.write().await.insert(table.to_string(), error);
    }

    /// Make statements containing `fragment` fail to execute
    pub async fn fail_statements_containing(&self, fragment: &str) {
        self.failing_statements.write().await.push(fragment.to_string());
    }

    /// Configure `list_tables` to fail
    pub fn with_listing_failure(mut self) -> Self {
        self.fail_listing = true;
        self
    }

    /// Configure to fail all connection tests
    pub fn with_connection_failure(mut self) -> Self {
        self.fail_connection = true;
        self
    }

    /// Set a custom provider name
    pub fn with_name(mut self, name: &'static str) -> Self {
        self.adapter_name = name;
        self
    }

    /// Number of tables
    pub async fn table_count(&self) -> usize {
        self.tables.read().await.len()
    }

    /// Statements executed so far, in order
    pub async fn executed_statements(&self) -> Vec<String> {
        self.executed.read().await.clone()
    }

    /// Clear the executed-statement log
    pub async fn clear_executed(&self) {
        self.executed.write().await.clear();
    }

    async fn check_table_error(&self, table: &str) -> Result<(), CatalogError> {
        match self.errors.read().await.get(table) {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }

    async fn with_table<T>(
        &self,
        table: &str,
        f: impl FnOnce(&MockTable) -> T,
    ) -> Result<T, CatalogError> {
        self.check_table_error(table).await?;
        let tables = self.tables.read().await;
        tables
            .iter()
            .find(|t| t.name == table)
            .map(f)
            .ok_or_else(|| CatalogError::TableNotFound(table.to_string()))
    }

    async fn check_statement(&self, sql: &str) -> Result<(), CatalogError> {
        let failing = self.failing_statements.read().await;
        match failing.iter().find(|fragment| sql.contains(fragment.as_str())) {
            Some(fragment) => Err(CatalogError::QueryError(format!(
                "simulated failure for statement containing '{}'",
                fragment
            ))),
            None => Ok(()),
        }
    }
}

impl Default for MockCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for MockCatalog {
    fn clone(&self) -> Self {
        Self {
            tables: Arc::clone(&self.tables),
            errors: Arc::clone(&self.errors),
            lookup_errors: Arc::clone(&self.lookup_errors),
            executed: Arc::clone(&self.executed),
            failing_statements: Arc::clone(&self.failing_statements),
            fail_listing: self.fail_listing,
            fail_connection: self.fail_connection,
            adapter_name: self.adapter_name,
        }
    }
}

/// Lookup equality the way a database compares a bound parameter
fn lookup_matches(candidate: &Value, wanted: &Value) -> bool {
    if candidate.is_null() || wanted.is_null() {
        return false;
    }
    candidate == wanted || candidate.to_text() == wanted.to_text()
}

#[async_trait::async_trait]
impl CatalogProvider for MockCatalog {
    fn name(&self) -> &'static str {
        self.adapter_name
    }

    async fn list_tables(&self) -> Result<Vec<String>, CatalogError> {
        if self.fail_listing {
            return Err(CatalogError::PermissionDenied(
                "Simulated failure listing tables".to_string(),
            ));
        }
        Ok(self.tables.read().await.iter().map(|t| t.name.clone()).collect())
    }

    async fn get_columns(&self, table: &str) -> Result<Vec<Column>, CatalogError> {
        self.with_table(table, |t| t.columns.clone()).await
    }

    async fn get_primary_key(&self, table: &str) -> Result<Vec<String>, CatalogError> {
        self.with_table(table, |t| t.primary_key.clone()).await
    }

    async fn get_foreign_keys(&self, table: &str) -> Result<Vec<ForeignKeyInfo>, CatalogError> {
        self.with_table(table, |t| t.foreign_keys.clone()).await
    }

    async fn scan_rows(&self, table: &str) -> Result<Vec<Row>, CatalogError> {
        self.with_table(table, |t| t.rows.clone()).await
    }

    async fn fetch_row(
        &self,
        table: &str,
        column: &str,
        value: &Value,
    ) -> Result<Option<Row>, CatalogError> {
        if let Some(error) = self.lookup_errors.read().await.get(table) {
            return Err(error.clone());
        }

        self.with_table(table, |t| {
            t.rows
                .iter()
                .find(|row| lookup_matches(row.get(column), value))
                .cloned()
        })
        .await
    }

    async fn test_connection(&self) -> Result<(), CatalogError> {
        if self.fail_connection {
            Err(CatalogError::NetworkError(
                "Simulated connection failure".to_string(),
            ))
        } else {
            Ok(())
        }
    }
}

#[async_trait::async_trait]
impl StatementExecutor for MockCatalog {
    async fn execute(&self, sql: &str) -> Result<u64, CatalogError> {
        self.check_statement(sql).await?;
        self.executed.write().await.push(sql.to_string());
        Ok(1)
    }

    async fn execute_batch(&self, statements: &[String]) -> Result<(), CatalogError> {
        // All or nothing: validate every statement before recording any
        for statement in statements {
            self.check_statement(statement).await?;
        }
        self.executed.write().await.extend(statements.iter().cloned());
        Ok(())
    }
}

/// Builder for creating a MockCatalog with several tables
///
/// # Example
///
/// ```rust,ignore
/// let catalog = MockCatalogBuilder::new()
///     .with_table(MockTable::new("DimTime").column("TimeKey", LogicalType::Date).primary_key(&["TimeKey"]))
///     .with_listing_failure()
///     .build();
/// ```
pub struct MockCatalogBuilder {
    tables: Vec<MockTable>,
    errors: HashMap<String, CatalogError>,
    lookup_errors: HashMap<String, CatalogError>,
    fail_listing: bool,
    fail_connection: bool,
    adapter_name: &'static str,
}

impl MockCatalogBuilder {
    /// Create a new builder
    pub fn new() -> Self {
        Self {
            tables: Vec::new(),
            errors: HashMap::new(),
            lookup_errors: HashMap::new(),
            fail_listing: false,
            fail_connection: false,
            adapter_name: "Mock",
        }
    }

    /// Add a table
    pub fn with_table(mut self, table: MockTable) -> Self {
        self.tables.push(table);
        self
    }

    /// Add several tables
    pub fn with_tables(mut self, tables: impl IntoIterator<Item = MockTable>) -> Self {
        self.tables.extend(tables);
        self
    }

    /// Add an error for introspection and scans of a table
    pub fn with_error(mut self, table: &str, error: CatalogError) -> Self {
        self.errors.insert(table.to_string(), error);
        self
    }

    /// Add an error for point lookups into a table
    pub fn with_lookup_error(mut self, table: &str, error: CatalogError) -> Self {
        self.lookup_errors.insert(table.to_string(), error);
        self
    }

    /// Configure listing failure
    pub fn with_listing_failure(mut self) -> Self {
        self.fail_listing = true;
        self
    }

    /// Configure connection failure
    pub fn with_connection_failure(mut self) -> Self {
        self.fail_connection = true;
        self
    }

    /// Set provider name
    pub fn with_name(mut self, name: &'static str) -> Self {
        self.adapter_name = name;
        self
    }

    /// Build the MockCatalog
    pub fn build(self) -> MockCatalog {
        MockCatalog {
            tables: Arc::new(RwLock::new(self.tables)),
            errors: Arc::new(RwLock::new(self.errors)),
            lookup_errors: Arc::new(RwLock::new(self.lookup_errors)),
            executed: Arc::new(RwLock::new(Vec::new())),
            failing_statements: Arc::new(RwLock::new(Vec::new())),
            fail_listing: self.fail_listing,
            fail_connection: self.fail_connection,
            adapter_name: self.adapter_name,
        }
    }
}

impl Default for MockCatalogBuilder {
    fn default() -> Self {
        Self::new()
    }
}
