//! In-memory schema catalog

use crate::schema::TableSchema;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Ordered snapshot of every source table taking part in a build
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<TableSchema>", into = "Vec<TableSchema>")]
pub struct Catalog {
    tables: Vec<TableSchema>,
    index: HashMap<String, usize>,
}

impl Catalog {
    /// Create a catalog from tables in enumeration order
    ///
    /// A later table with an already-seen name replaces the earlier one.
    pub fn new(tables: Vec<TableSchema>) -> Self {
        let mut catalog = Self::default();
        for table in tables {
            catalog.insert(table);
        }
        catalog
    }

    fn insert(&mut self, table: TableSchema) {
        match self.index.get(&table.name) {
            Some(&pos) => self.tables[pos] = table,
            None => {
                self.index.insert(table.name.clone(), self.tables.len());
                self.tables.push(table);
            }
        }
    }

    /// Look up a table by name
    pub fn get(&self, name: &str) -> Option<&TableSchema> {
        self.index.get(name).map(|&pos| &self.tables[pos])
    }

    /// Whether the catalog knows `name`
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Tables in enumeration order
    pub fn tables(&self) -> &[TableSchema] {
        &self.tables
    }

    /// Tables sorted by name
    pub fn tables_by_name(&self) -> Vec<&TableSchema> {
        let mut tables: Vec<&TableSchema> = self.tables.iter().collect();
        tables.sort_by(|a, b| a.name.cmp(&b.name));
        tables
    }

    /// Table names in enumeration order
    pub fn table_names(&self) -> Vec<&str> {
        self.tables.iter().map(|t| t.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

impl From<Vec<TableSchema>> for Catalog {
    fn from(tables: Vec<TableSchema>) -> Self {
        Self::new(tables)
    }
}

impl From<Catalog> for Vec<TableSchema> {
    fn from(catalog: Catalog) -> Self {
        catalog.tables
    }
}
