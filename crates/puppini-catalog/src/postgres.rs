//! PostgreSQL catalog provider using information_schema
//!
//! Table structure comes from `information_schema` (tables, columns, key
//! constraints). Row data is read as `row_to_json(t)::text` and decoded
//! against the column types, so every PostgreSQL type arrives through the
//! same JSON path.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let catalog = PostgresCatalog::connect(
//!     "host=localhost port=5432 dbname=warehouse user=etl password=secret",
//!     "public",
//!     false,
//! ).await?;
//! ```
//!
//! Support is compiled only with the `postgres` feature. Without it every
//! constructor returns `CatalogError::ConfigError`.

use crate::adapter::{CatalogError, CatalogProvider, StatementExecutor};
use puppini_core::{Column, ConnectionConfig, ForeignKeyInfo, LogicalType, Row, Value};

#[cfg(feature = "postgres")]
use puppini_core::Nullability;

#[cfg(feature = "postgres")]
use std::collections::HashMap;

#[cfg(feature = "postgres")]
use tokio::sync::RwLock;

#[cfg(feature = "postgres")]
use tokio_postgres::{Client, NoTls};

#[cfg(feature = "postgres")]
use postgres_native_tls::MakeTlsConnector;

#[cfg(feature = "postgres")]
use native_tls::TlsConnector;

#[cfg(not(feature = "postgres"))]
const NOT_COMPILED: &str =
    "PostgreSQL support not compiled. Rebuild with: cargo build --features postgres";

/// PostgreSQL catalog provider and statement executor
pub struct PostgresCatalog {
    #[cfg(feature = "postgres")]
    client: Client,

    /// Column definitions already read, used to type row data
    #[cfg(feature = "postgres")]
    columns_cache: RwLock<HashMap<String, Vec<Column>>>,

    /// Schema (namespace) holding the source tables
    schema: String,

    /// Database name, for logging
    database: String,
}

impl PostgresCatalog {
    /// Connect with a libpq-style connection string
    ///
    /// `schema` names the namespace whose tables form the catalog.
    #[cfg(feature = "postgres")]
    pub async fn connect(
        conn_str: &str,
        schema: impl Into<String>,
        use_tls: bool,
    ) -> Result<Self, CatalogError> {
        let config: tokio_postgres::Config = conn_str
            .parse()
            .map_err(|e| CatalogError::ConfigError(format!("Invalid connection string: {}", e)))?;
        let database = config.get_dbname().unwrap_or("postgres").to_string();

        let client = if use_tls {
            let connector = TlsConnector::builder().build().map_err(|e| {
                CatalogError::ConfigError(format!("Failed to create TLS connector: {}", e))
            })?;
            let (client, connection) = config
                .connect(MakeTlsConnector::new(connector))
                .await
                .map_err(|e| {
                    CatalogError::AuthenticationError(format!("Failed to connect with TLS: {}", e))
                })?;
            tokio::spawn(async move {
                if let Err(e) = connection.await {
                    tracing::error!(error = %e, "PostgreSQL TLS connection error");
                }
            });
            client
        } else {
            let (client, connection) = config.connect(NoTls).await.map_err(|e| {
                CatalogError::AuthenticationError(format!("Failed to connect: {}", e))
            })?;
            tokio::spawn(async move {
                if let Err(e) = connection.await {
                    tracing::error!(error = %e, "PostgreSQL connection error");
                }
            });
            client
        };

        tracing::debug!(database = %database, "connected to PostgreSQL");

        Ok(Self {
            client,
            columns_cache: RwLock::new(HashMap::new()),
            schema: schema.into(),
            database,
        })
    }

    /// Connect without postgres feature (returns error)
    #[cfg(not(feature = "postgres"))]
    pub async fn connect(
        _conn_str: &str,
        _schema: impl Into<String>,
        _use_tls: bool,
    ) -> Result<Self, CatalogError> {
        Err(CatalogError::ConfigError(NOT_COMPILED.to_string()))
    }

    /// Connect using a `[connection]` table from puppini.toml
    ///
    /// Accepts either `url` or the discrete `host`, `port`, `dbname`,
    /// `user` and `password` settings. `schema` defaults to `public`;
    /// `sslmode = "require"` turns on TLS.
    pub async fn from_config(config: &ConnectionConfig) -> Result<Self, CatalogError> {
        let conn_str = connection_string(config)?;
        let schema = config.get("schema").unwrap_or("public").to_string();
        let use_tls = matches!(config.get("sslmode"), Some("require") | Some("verify-full"));
        Self::connect(&conn_str, schema, use_tls).await
    }

    /// Get the schema name
    pub fn schema(&self) -> &str {
        &self.schema
    }

    /// Get the database name
    pub fn database(&self) -> &str {
        &self.database
    }

    /// Convert a PostgreSQL type name to a LogicalType
    pub fn map_postgres_type(pg_type: &str) -> LogicalType {
        let base_type = pg_type
            .split('(')
            .next()
            .unwrap_or(pg_type)
            .trim()
            .to_lowercase();

        match base_type.as_str() {
            "boolean" | "bool" => LogicalType::Bool,

            "smallint" | "int2" | "integer" | "int" | "int4" | "bigint" | "int8" => LogicalType::Int,
            "serial" | "serial4" | "bigserial" | "serial8" | "smallserial" | "serial2" => {
                LogicalType::Int
            }

            "real" | "float4" | "double precision" | "float8" | "float" => LogicalType::Float,

            "numeric" | "decimal" => parse_numeric_type(pg_type),
            "money" => LogicalType::Decimal {
                precision: Some(19),
                scale: Some(2),
            },

            "character varying" | "varchar" | "character" | "char" | "bpchar" | "text" | "name"
            | "citext" | "uuid" | "bytea" | "interval" | "xml" | "inet" | "cidr" | "macaddr" => {
                LogicalType::String
            }

            "date" => LogicalType::Date,
            "timestamp without time zone" | "timestamp" | "timestamp with time zone"
            | "timestamptz" => LogicalType::Timestamp,
            // Times of day have no date part; they travel as text
            "time without time zone" | "time" | "time with time zone" | "timetz" => {
                LogicalType::String
            }

            "json" | "jsonb" => LogicalType::Json,

            _ => {
                if let Some(element) = pg_type.strip_suffix("[]") {
                    LogicalType::Array {
                        element_type: Box::new(Self::map_postgres_type(element)),
                    }
                } else if let Some(element) = pg_type.strip_prefix('_') {
                    LogicalType::Array {
                        element_type: Box::new(Self::map_postgres_type(element)),
                    }
                } else {
                    LogicalType::Unknown
                }
            }
        }
    }

    #[cfg(feature = "postgres")]
    fn qualified(&self, table: &str) -> String {
        format!("{}.{}", quote_ident(&self.schema), quote_ident(table))
    }

    #[cfg(feature = "postgres")]
    async fn cached_columns(&self, table: &str) -> Result<Vec<Column>, CatalogError> {
        if let Some(columns) = self.columns_cache.read().await.get(table) {
            return Ok(columns.clone());
        }
        let columns = self.get_columns(table).await?;
        self.columns_cache
            .write()
            .await
            .insert(table.to_string(), columns.clone());
        Ok(columns)
    }
}

/// Build a libpq connection string from configuration settings
pub fn connection_string(config: &ConnectionConfig) -> Result<String, CatalogError> {
    if !config.connection_type.eq_ignore_ascii_case("postgres")
        && !config.connection_type.eq_ignore_ascii_case("postgresql")
    {
        return Err(CatalogError::ConfigError(format!(
            "unsupported connection type '{}'",
            config.connection_type
        )));
    }

    if let Some(url) = config.get("url") {
        return Ok(url.to_string());
    }

    let dbname = config
        .get("dbname")
        .ok_or_else(|| CatalogError::ConfigError("connection.dbname is required".to_string()))?;

    let mut parts = vec![
        format!("host={}", config.get("host").unwrap_or("localhost")),
        format!("port={}", config.get("port").unwrap_or("5432")),
        format!("dbname={}", dbname),
    ];
    if let Some(user) = config.get("user") {
        parts.push(format!("user={}", user));
    }
    if let Some(password) = config.get("password") {
        parts.push(format!("password={}", password));
    }
    Ok(parts.join(" "))
}

/// Parse numeric type with precision and scale
fn parse_numeric_type(type_str: &str) -> LogicalType {
    if let Some(params) = type_str.split('(').nth(1).and_then(|p| p.strip_suffix(')')) {
        let parts: Vec<&str> = params.split(',').collect();
        match parts.as_slice() {
            [p, s] => {
                return LogicalType::Decimal {
                    precision: p.trim().parse().ok(),
                    scale: s.trim().parse().ok(),
                }
            }
            [p] => {
                return LogicalType::Decimal {
                    precision: p.trim().parse().ok(),
                    scale: Some(0),
                }
            }
            _ => {}
        }
    }

    LogicalType::Decimal {
        precision: None,
        scale: None,
    }
}

/// Quote an identifier for PostgreSQL
#[cfg_attr(not(feature = "postgres"), allow(dead_code))]
fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Decode one `row_to_json` document against the table's columns
#[cfg_attr(not(feature = "postgres"), allow(dead_code))]
fn decode_row(json: &str, columns: &[Column]) -> Result<Row, CatalogError> {
    let object: serde_json::Map<String, serde_json::Value> = serde_json::from_str(json)
        .map_err(|e| CatalogError::InvalidResponse(format!("row is not a JSON object: {}", e)))?;

    object
        .into_iter()
        .map(|(name, raw)| {
            let ty = columns
                .iter()
                .find(|c| c.name == name)
                .map(|c| &c.logical_type)
                .unwrap_or(&LogicalType::Unknown);
            Value::from_json(&raw, ty)
                .map(|value| (name.clone(), value))
                .map_err(|e| CatalogError::InvalidResponse(format!("column {}: {}", name, e)))
        })
        .collect()
}

#[cfg(feature = "postgres")]
fn map_query_error(table: &str, e: tokio_postgres::Error) -> CatalogError {
    let err_str = e.to_string();
    if err_str.contains("does not exist") {
        CatalogError::TableNotFound(table.to_string())
    } else if err_str.contains("permission denied") {
        CatalogError::PermissionDenied(format!("Cannot access {}: {}", table, err_str))
    } else {
        CatalogError::QueryError(err_str)
    }
}

#[async_trait::async_trait]
impl CatalogProvider for PostgresCatalog {
    fn name(&self) -> &'static str {
        "PostgreSQL"
    }

    #[cfg(feature = "postgres")]
    async fn list_tables(&self) -> Result<Vec<String>, CatalogError> {
        let rows = self
            .client
            .query(
                "SELECT table_name::text FROM information_schema.tables \
                 WHERE table_schema = $1 AND table_type = 'BASE TABLE' \
                 ORDER BY table_name",
                &[&self.schema],
            )
            .await
            .map_err(|e| map_query_error(&self.schema, e))?;
        Ok(rows.iter().map(|row| row.get(0)).collect())
    }

    #[cfg(not(feature = "postgres"))]
    async fn list_tables(&self) -> Result<Vec<String>, CatalogError> {
        Err(CatalogError::ConfigError(NOT_COMPILED.to_string()))
    }

    #[cfg(feature = "postgres")]
    async fn get_columns(&self, table: &str) -> Result<Vec<Column>, CatalogError> {
        let query = r#"
            SELECT
                column_name::text,
                data_type::text,
                is_nullable::text,
                numeric_precision,
                numeric_scale,
                udt_name::text
            FROM information_schema.columns
            WHERE table_schema = $1
              AND table_name = $2
            ORDER BY ordinal_position
        "#;

        let rows = self
            .client
            .query(query, &[&self.schema, &table])
            .await
            .map_err(|e| map_query_error(table, e))?;

        let columns: Vec<Column> = rows
            .iter()
            .map(|row| {
                let name: String = row.get(0);
                let data_type: String = row.get(1);
                let is_nullable: String = row.get(2);
                let precision: Option<i32> = row.get(3);
                let scale: Option<i32> = row.get(4);
                let udt_name: String = row.get(5);

                let full_type = if data_type == "numeric" {
                    match (precision, scale) {
                        (Some(p), Some(s)) => format!("numeric({},{})", p, s),
                        (Some(p), None) => format!("numeric({})", p),
                        _ => data_type,
                    }
                } else if let Some(element) = udt_name.strip_prefix('_') {
                    format!("{}[]", element)
                } else {
                    data_type
                };

                let nullable = match is_nullable.to_uppercase().as_str() {
                    "YES" => Nullability::Yes,
                    "NO" => Nullability::No,
                    _ => Nullability::Unknown,
                };

                Column::new(name, Self::map_postgres_type(&full_type)).with_nullability(nullable)
            })
            .collect();

        if columns.is_empty() {
            return Err(CatalogError::TableNotFound(format!(
                "{}.{}",
                self.schema, table
            )));
        }
        Ok(columns)
    }

    #[cfg(not(feature = "postgres"))]
    async fn get_columns(&self, _table: &str) -> Result<Vec<Column>, CatalogError> {
        Err(CatalogError::ConfigError(NOT_COMPILED.to_string()))
    }

    #[cfg(feature = "postgres")]
    async fn get_primary_key(&self, table: &str) -> Result<Vec<String>, CatalogError> {
        let query = r#"
            SELECT kcu.column_name::text
            FROM information_schema.table_constraints tc
            JOIN information_schema.key_column_usage kcu
              ON kcu.constraint_schema = tc.constraint_schema
             AND kcu.constraint_name = tc.constraint_name
            WHERE tc.constraint_type = 'PRIMARY KEY'
              AND tc.table_schema = $1
              AND tc.table_name = $2
            ORDER BY kcu.ordinal_position
        "#;

        let rows = self
            .client
            .query(query, &[&self.schema, &table])
            .await
            .map_err(|e| map_query_error(table, e))?;
        Ok(rows.iter().map(|row| row.get(0)).collect())
    }

    #[cfg(not(feature = "postgres"))]
    async fn get_primary_key(&self, _table: &str) -> Result<Vec<String>, CatalogError> {
        Err(CatalogError::ConfigError(NOT_COMPILED.to_string()))
    }

    #[cfg(feature = "postgres")]
    async fn get_foreign_keys(&self, table: &str) -> Result<Vec<ForeignKeyInfo>, CatalogError> {
        // Pair each constrained column with the referenced column at the same position
        let query = r#"
            SELECT
                rc.constraint_name::text,
                kcu.column_name::text,
                ref.table_name::text,
                ref.column_name::text
            FROM information_schema.referential_constraints rc
            JOIN information_schema.key_column_usage kcu
              ON kcu.constraint_schema = rc.constraint_schema
             AND kcu.constraint_name = rc.constraint_name
            JOIN information_schema.key_column_usage ref
              ON ref.constraint_schema = rc.unique_constraint_schema
             AND ref.constraint_name = rc.unique_constraint_name
             AND ref.ordinal_position = kcu.position_in_unique_constraint
            WHERE kcu.table_schema = $1
              AND kcu.table_name = $2
            ORDER BY rc.constraint_name, kcu.ordinal_position
        "#;

        let rows = self
            .client
            .query(query, &[&self.schema, &table])
            .await
            .map_err(|e| map_query_error(table, e))?;

        let mut foreign_keys: Vec<ForeignKeyInfo> = Vec::new();
        for row in rows {
            let name: String = row.get(0);
            let column: String = row.get(1);
            let referenced_table: String = row.get(2);
            let referenced_column: String = row.get(3);

            match foreign_keys.last_mut() {
                Some(fk) if fk.name.as_deref() == Some(name.as_str()) => {
                    fk.columns.push(column);
                    fk.referenced_columns.push(referenced_column);
                }
                _ => foreign_keys.push(ForeignKeyInfo::new(
                    name,
                    column,
                    referenced_table,
                    referenced_column,
                )),
            }
        }
        Ok(foreign_keys)
    }

    #[cfg(not(feature = "postgres"))]
    async fn get_foreign_keys(&self, _table: &str) -> Result<Vec<ForeignKeyInfo>, CatalogError> {
        Err(CatalogError::ConfigError(NOT_COMPILED.to_string()))
    }

    #[cfg(feature = "postgres")]
    async fn scan_rows(&self, table: &str) -> Result<Vec<Row>, CatalogError> {
        let columns = self.cached_columns(table).await?;
        let query = format!("SELECT row_to_json(t)::text FROM {} t", self.qualified(table));

        let rows = self
            .client
            .query(query.as_str(), &[])
            .await
            .map_err(|e| map_query_error(table, e))?;

        rows.iter()
            .map(|row| decode_row(row.get(0), &columns))
            .collect()
    }

    #[cfg(not(feature = "postgres"))]
    async fn scan_rows(&self, _table: &str) -> Result<Vec<Row>, CatalogError> {
        Err(CatalogError::ConfigError(NOT_COMPILED.to_string()))
    }

    #[cfg(feature = "postgres")]
    async fn fetch_row(
        &self,
        table: &str,
        column: &str,
        value: &Value,
    ) -> Result<Option<Row>, CatalogError> {
        let Some(text) = value.to_text() else {
            return Ok(None);
        };

        let columns = self.cached_columns(table).await?;
        let query = format!(
            "SELECT row_to_json(t)::text FROM {} t WHERE t.{}::text = $1 LIMIT 1",
            self.qualified(table),
            quote_ident(column)
        );

        let row = self
            .client
            .query_opt(query.as_str(), &[&text])
            .await
            .map_err(|e| map_query_error(table, e))?;

        row.map(|row| decode_row(row.get(0), &columns)).transpose()
    }

    #[cfg(not(feature = "postgres"))]
    async fn fetch_row(
        &self,
        _table: &str,
        _column: &str,
        _value: &Value,
    ) -> Result<Option<Row>, CatalogError> {
        Err(CatalogError::ConfigError(NOT_COMPILED.to_string()))
    }

    #[cfg(feature = "postgres")]
    async fn test_connection(&self) -> Result<(), CatalogError> {
        self.client
            .query("SELECT 1", &[])
            .await
            .map_err(|e| CatalogError::QueryError(format!("Connection test failed: {}", e)))?;
        Ok(())
    }

    #[cfg(not(feature = "postgres"))]
    async fn test_connection(&self) -> Result<(), CatalogError> {
        Err(CatalogError::ConfigError(NOT_COMPILED.to_string()))
    }
}

#[async_trait::async_trait]
impl StatementExecutor for PostgresCatalog {
    #[cfg(feature = "postgres")]
    async fn execute(&self, sql: &str) -> Result<u64, CatalogError> {
        self.client
            .execute(sql, &[])
            .await
            .map_err(|e| CatalogError::QueryError(format!("{}: {}", sql, e)))
    }

    #[cfg(not(feature = "postgres"))]
    async fn execute(&self, _sql: &str) -> Result<u64, CatalogError> {
        Err(CatalogError::ConfigError(NOT_COMPILED.to_string()))
    }

    #[cfg(feature = "postgres")]
    async fn execute_batch(&self, statements: &[String]) -> Result<(), CatalogError> {
        self.client
            .batch_execute("BEGIN")
            .await
            .map_err(|e| CatalogError::QueryError(e.to_string()))?;

        for statement in statements {
            if let Err(e) = self.client.batch_execute(statement).await {
                if let Err(rollback) = self.client.batch_execute("ROLLBACK").await {
                    tracing::error!(error = %rollback, "rollback failed");
                }
                return Err(CatalogError::QueryError(format!("{}: {}", statement, e)));
            }
        }

        self.client
            .batch_execute("COMMIT")
            .await
            .map_err(|e| CatalogError::QueryError(e.to_string()))
    }

    #[cfg(not(feature = "postgres"))]
    async fn execute_batch(&self, _statements: &[String]) -> Result<(), CatalogError> {
        Err(CatalogError::ConfigError(NOT_COMPILED.to_string()))
    }
}
