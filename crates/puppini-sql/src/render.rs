//! Rendering bridge operations as SQL statements
//!
//! Statements are returned without a trailing semicolon; callers add the
//! terminator when writing scripts.

use crate::dialect::Dialect;
use crate::error::RenderError;
use puppini_bridge::{BridgeRow, BridgeSchema, ForeignKeyAnalysis};
use puppini_core::Catalog;
use std::collections::BTreeMap;

/// `CREATE TABLE` for the bridge
///
/// A schema with nothing beyond `Stage` is rejected.
pub fn create_bridge_table(
    dialect: Dialect,
    table: &str,
    schema: &BridgeSchema,
) -> Result<String, RenderError> {
    if schema.len() <= 1 {
        return Err(RenderError::EmptySchema {
            table: table.to_string(),
        });
    }

    let columns: Vec<String> = schema
        .columns()
        .iter()
        .map(|spec| {
            let mut column = format!(
                "    {} {}",
                dialect.quote_identifier(&spec.name),
                dialect.type_name(&spec.logical_type)
            );
            if !spec.nullable {
                column.push_str(" NOT NULL");
            }
            column
        })
        .collect();

    Ok(format!(
        "CREATE TABLE {} (\n{}\n)",
        dialect.quote_identifier(table),
        columns.join(",\n")
    ))
}

pub fn drop_bridge_table(dialect: Dialect, table: &str) -> String {
    format!("DROP TABLE IF EXISTS {}", dialect.quote_identifier(table))
}

/// `INSERT` of one bridge row, listing only the columns the row sets
pub fn insert_bridge_row(
    dialect: Dialect,
    table: &str,
    schema: &BridgeSchema,
    row: &BridgeRow,
) -> Result<String, RenderError> {
    let mut columns = Vec::with_capacity(row.len());
    let mut values = Vec::with_capacity(row.len());

    for (column, value) in row.ordered(schema) {
        columns.push(dialect.quote_identifier(column));
        values.push(dialect.literal(column, value)?);
    }

    Ok(format!(
        "INSERT INTO {} ({}) VALUES ({})",
        dialect.quote_identifier(table),
        columns.join(", "),
        values.join(", ")
    ))
}

/// Key column added to one source table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceKeyChange {
    pub table: String,

    /// `ALTER TABLE .. ADD COLUMN PBK_<table>`
    pub add_column: String,

    /// `UPDATE .. SET PBK_<table> = <primary key>`
    pub backfill: String,
}

impl SourceKeyChange {
    pub fn statements(&self) -> [&str; 2] {
        [&self.add_column, &self.backfill]
    }
}

/// Add and fill a `PBK_<table>` column on every source table with a
/// single-column primary key, in catalog order
pub fn source_key_changes(dialect: Dialect, catalog: &Catalog) -> Vec<SourceKeyChange> {
    catalog
        .tables()
        .iter()
        .filter_map(|table| {
            let Some(pk) = table.primary_key.as_ref() else {
                tracing::debug!(table = %table.name, "no single-column primary key; key column not added");
                return None;
            };
            let quoted_table = dialect.quote_identifier(&table.name);
            let key_column = dialect.quote_identifier(&table.key_column_name());

            Some(SourceKeyChange {
                table: table.name.clone(),
                add_column: format!(
                    "ALTER TABLE {} ADD COLUMN {} {}",
                    quoted_table,
                    key_column,
                    dialect.type_name(&pk.logical_type)
                ),
                backfill: format!(
                    "UPDATE {} SET {} = {}",
                    quoted_table,
                    key_column,
                    dialect.quote_identifier(&pk.name)
                ),
            })
        })
        .collect()
}

/// `ALTER TABLE` statements dropping every analyzed constraint, grouped by
/// table
pub fn drop_foreign_keys(
    dialect: Dialect,
    analysis: &BTreeMap<String, ForeignKeyAnalysis>,
) -> Vec<String> {
    let mut constraints: Vec<(&str, &str)> = analysis
        .iter()
        .map(|(name, fk)| (fk.table.as_str(), name.as_str()))
        .collect();
    constraints.sort();

    let keyword = match dialect {
        Dialect::MySql => "DROP FOREIGN KEY",
        Dialect::Postgres | Dialect::Ansi => "DROP CONSTRAINT",
    };

    constraints
        .into_iter()
        .map(|(table, name)| {
            format!(
                "ALTER TABLE {} {} {}",
                dialect.quote_identifier(table),
                keyword,
                dialect.quote_identifier(name)
            )
        })
        .collect()
}
