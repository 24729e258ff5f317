//! Foreign-key graph construction and traversal
//!
//! One node per catalog table, one edge per foreign key. Edges whose target
//! is outside the catalog are kept so they can be reported, but they never
//! take part in traversal.

use puppini_core::{Catalog, ForeignKey};
use std::collections::{BTreeMap, BTreeSet, VecDeque};

/// A foreign key seen as a directed edge
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FkEdge {
    /// Referencing table
    pub from_table: String,

    /// Referencing column
    pub column: String,

    /// Referenced table
    pub to_table: String,

    /// Referenced column, when the catalog reported it
    pub referenced_column: Option<String>,

    /// Constraint name, when the catalog reported it
    pub constraint_name: Option<String>,
}

impl FkEdge {
    fn new(from_table: &str, fk: &ForeignKey) -> Self {
        Self {
            from_table: from_table.to_string(),
            column: fk.column.clone(),
            to_table: fk.referenced_table.clone(),
            referenced_column: fk.referenced_column.clone(),
            constraint_name: fk.constraint_name.clone(),
        }
    }
}

/// Directed foreign-key graph
#[derive(Debug, Clone, Default)]
pub struct ForeignKeyGraph {
    /// Forward edges: table -> foreign keys it declares
    outgoing: BTreeMap<String, Vec<FkEdge>>,

    /// All catalog tables
    nodes: BTreeSet<String>,
}

impl ForeignKeyGraph {
    /// Build the graph for every table of the catalog
    pub fn from_catalog(catalog: &Catalog) -> Self {
        let mut graph = Self::default();

        for table in catalog.tables() {
            graph.nodes.insert(table.name.clone());
            let edges = table
                .foreign_keys
                .iter()
                .map(|fk| FkEdge::new(&table.name, fk))
                .collect();
            graph.outgoing.insert(table.name.clone(), edges);
        }

        graph
    }

    /// Foreign keys declared on `table`, in catalog order
    pub fn edges_from(&self, table: &str) -> &[FkEdge] {
        self.outgoing.get(table).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Edges whose referenced table is not part of the catalog
    pub fn dangling_edges(&self) -> impl Iterator<Item = &FkEdge> {
        self.outgoing
            .values()
            .flatten()
            .filter(|edge| !self.nodes.contains(&edge.to_table))
    }

    /// Whether foreign keys form a cycle (self references included)
    pub fn has_cycle(&self) -> bool {
        let mut in_degree: BTreeMap<&str, usize> =
            self.nodes.iter().map(|n| (n.as_str(), 0)).collect();

        for edge in self.outgoing.values().flatten() {
            if let Some(degree) = in_degree.get_mut(edge.to_table.as_str()) {
                *degree += 1;
            }
        }

        // Kahn's algorithm
        let mut queue: VecDeque<&str> = in_degree
            .iter()
            .filter(|(_, degree)| **degree == 0)
            .map(|(node, _)| *node)
            .collect();
        let mut removed = 0;

        while let Some(node) = queue.pop_front() {
            removed += 1;
            for edge in self.edges_from(node) {
                if let Some(degree) = in_degree.get_mut(edge.to_table.as_str()) {
                    *degree -= 1;
                    if *degree == 0 {
                        queue.push_back(edge.to_table.as_str());
                    }
                }
            }
        }

        removed < self.nodes.len()
    }
}
