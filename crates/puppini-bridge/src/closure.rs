//! Transitive closure over foreign keys for one source row
//!
//! Breadth-first with an explicit worklist: every referenced row is fetched
//! once per `(table, lookup column, value)` and its own foreign keys are
//! expanded in turn. The first discovery of a key column wins.

use crate::error::RowAssemblyError;
use crate::graph::{FkEdge, ForeignKeyGraph};
use crate::synth::BridgeSchema;
use puppini_catalog::CatalogProvider;
use puppini_core::{key_column_name, Catalog, Diagnostic, DiagnosticCode, Location, Row, Value};
use std::collections::{HashSet, VecDeque};

/// One pending point lookup
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct Lookup {
    table: String,
    column: String,
    value: Value,
}

/// Key columns discovered for one source row
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Closure {
    /// Key column and value, in discovery order
    pub keys: Vec<(String, Value)>,

    /// Branches cut short by missing rows
    pub diagnostics: Vec<Diagnostic>,

    /// Point lookups performed
    pub lookups: usize,
}

/// Walks foreign keys from a source row to every reachable dimension
pub struct ClosureResolver<'a> {
    catalog: &'a Catalog,
    graph: &'a ForeignKeyGraph,
    schema: &'a BridgeSchema,
}

/// Per-row walk state
struct Walk {
    populated: HashSet<String>,
    visited: HashSet<Lookup>,
    queue: VecDeque<Lookup>,
    closure: Closure,
}

impl<'a> ClosureResolver<'a> {
    pub fn new(catalog: &'a Catalog, graph: &'a ForeignKeyGraph, schema: &'a BridgeSchema) -> Self {
        Self {
            catalog,
            graph,
            schema,
        }
    }

    /// Collect every key column reachable from `row` of `table`
    ///
    /// `row_index` only locates diagnostics. A missing referenced row is a
    /// warning; a failing lookup is an error for the whole row.
    pub async fn resolve(
        &self,
        provider: &dyn CatalogProvider,
        table: &str,
        row: &Row,
        row_index: usize,
    ) -> Result<Closure, RowAssemblyError> {
        let mut walk = Walk {
            populated: HashSet::from([key_column_name(table)]),
            visited: HashSet::new(),
            queue: VecDeque::new(),
            closure: Closure::default(),
        };

        self.expand(&mut walk, table, row);

        while let Some(lookup) = walk.queue.pop_front() {
            if walk.visited.contains(&lookup) {
                continue;
            }
            walk.visited.insert(lookup.clone());
            walk.closure.lookups += 1;

            let found = provider
                .fetch_row(&lookup.table, &lookup.column, &lookup.value)
                .await
                .map_err(|source| RowAssemblyError::Lookup {
                    table: lookup.table.clone(),
                    source,
                })?;

            match found {
                Some(referenced) => self.expand(&mut walk, &lookup.table, &referenced),
                None => {
                    tracing::warn!(
                        table = %lookup.table,
                        column = %lookup.column,
                        value = %lookup.value,
                        "referenced row not found"
                    );
                    walk.closure.diagnostics.push(
                        Diagnostic::of(
                            DiagnosticCode::DanglingReference,
                            format!(
                                "no {} row with {} = {}",
                                lookup.table, lookup.column, lookup.value
                            ),
                        )
                        .with_location(Location::row(table, row_index)),
                    );
                }
            }
        }

        Ok(walk.closure)
    }

    /// Record the key columns `row` points at and queue the rows behind them
    fn expand(&self, walk: &mut Walk, table: &str, row: &Row) {
        for edge in self.graph.edges_from(table) {
            let value = row.get(&edge.column);
            let key_column = key_column_name(&edge.to_table);

            if self.schema.contains(&key_column) && walk.populated.insert(key_column.clone()) {
                walk.closure.keys.push((key_column, value.clone()));
            }

            if value.is_null() {
                continue;
            }

            if let Some(column) = self.lookup_column(edge) {
                let lookup = Lookup {
                    table: edge.to_table.clone(),
                    column,
                    value: value.clone(),
                };
                if !walk.visited.contains(&lookup) {
                    walk.queue.push_back(lookup);
                }
            }
        }
    }

    /// Column identifying the referenced row, if the target can be looked up
    fn lookup_column(&self, edge: &FkEdge) -> Option<String> {
        let target = self.catalog.get(&edge.to_table)?;
        edge.referenced_column
            .clone()
            .or_else(|| target.primary_key.as_ref().map(|pk| pk.name.clone()))
    }
}
