//! Puppini Core
//!
//! Core domain model shared by the catalog adapters, the bridge builder and
//! the SQL renderer. Diagnostic codes and the report layout are stable.

pub mod catalog;
pub mod config;
pub mod diagnostic;
pub mod report;
pub mod schema;
pub mod value;

pub use catalog::Catalog;
pub use config::{Config, ConfigError, ConnectionConfig, DialectConfig, SeverityThreshold, DEFAULT_BRIDGE_TABLE};
pub use diagnostic::{Diagnostic, DiagnosticCode, Location, Severity};
pub use report::{BuildReport, ReportSummary, ReportVersion};
pub use schema::{
    key_column_name, Column, ColumnRef, ForeignKey, ForeignKeyInfo, LogicalType, Nullability,
    TableSchema, KEY_COLUMN_PREFIX,
};
pub use value::{Row, Value, ValueError};
