//! Bridge schema synthesis
//!
//! The bridge column set is computed once per build from the catalog:
//! `Stage` first, then one key column per table with a single-column primary
//! key, then one prefixed column per measure. Keys and measures are each
//! sorted by name, so the result does not depend on catalog order.

use crate::abbrev::abbreviate;
use crate::graph::ForeignKeyGraph;
use puppini_core::{
    key_column_name, Catalog, ColumnRef, Diagnostic, DiagnosticCode, Location, LogicalType,
    TableSchema,
};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashSet;

/// Name of the discriminator column recording a row's origin table
pub const STAGE_COLUMN: &str = "Stage";

/// What a bridge column carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnRole {
    /// The `Stage` column
    Discriminator,

    /// A `PBK_<table>` key column
    Key,

    /// A copied measure
    Measure,
}

/// One column of the bridge table
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BridgeColumnSpec {
    pub name: String,
    pub role: ColumnRole,
    pub logical_type: LogicalType,
    pub nullable: bool,

    /// Source column the values come from; none for `Stage`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<ColumnRef>,
}

impl BridgeColumnSpec {
    fn stage() -> Self {
        Self {
            name: STAGE_COLUMN.to_string(),
            role: ColumnRole::Discriminator,
            logical_type: LogicalType::String,
            nullable: false,
            source: None,
        }
    }

    fn derived(name: String, role: ColumnRole, logical_type: LogicalType, source: ColumnRef) -> Self {
        Self {
            name,
            role,
            logical_type,
            nullable: true,
            source: Some(source),
        }
    }
}

/// The ordered, immutable column set of the bridge table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeSchema {
    columns: Vec<BridgeColumnSpec>,
}

impl BridgeSchema {
    /// All columns in table order
    pub fn columns(&self) -> &[BridgeColumnSpec] {
        &self.columns
    }

    pub fn find(&self, name: &str) -> Option<&BridgeColumnSpec> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.find(name).is_some()
    }

    pub fn key_columns(&self) -> impl Iterator<Item = &BridgeColumnSpec> {
        self.columns.iter().filter(|c| c.role == ColumnRole::Key)
    }

    pub fn measure_columns(&self) -> impl Iterator<Item = &BridgeColumnSpec> {
        self.columns.iter().filter(|c| c.role == ColumnRole::Measure)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Serialize to JSON string
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// SHA-256 of the compact JSON form, hex encoded
    pub fn fingerprint(&self) -> String {
        // Serializing plain strings and enums cannot fail
        let bytes = serde_json::to_vec(&self.columns).unwrap_or_default();
        hex::encode(Sha256::digest(&bytes))
    }
}

/// Measure column name for `column` of `table`
pub fn measure_column_name(table: &str, column: &str) -> String {
    format!("{}_{}", abbreviate(table), column)
}

/// Compute the bridge column set for `catalog`
pub fn synthesize_bridge_schema(catalog: &Catalog) -> BridgeSchema {
    let graph = ForeignKeyGraph::from_catalog(catalog);

    let mut names: HashSet<String> = HashSet::from([STAGE_COLUMN.to_string()]);
    let mut keys = Vec::new();
    let mut measures = Vec::new();

    let mut push = |target: &mut Vec<BridgeColumnSpec>, spec: BridgeColumnSpec| {
        if names.insert(spec.name.clone()) {
            target.push(spec);
        }
    };

    for table in catalog.tables_by_name() {
        match key_column_spec(table) {
            Some(spec) => push(&mut keys, spec),
            None => tracing::warn!(
                table = %table.name,
                "no single-column primary key; table gets no key column"
            ),
        }

        for edge in graph.edges_from(&table.name) {
            if let Some(spec) = catalog.get(&edge.to_table).and_then(key_column_spec) {
                push(&mut keys, spec);
            }
        }

        for measure in &table.measures {
            push(
                &mut measures,
                BridgeColumnSpec::derived(
                    measure_column_name(&table.name, &measure.name),
                    ColumnRole::Measure,
                    measure.logical_type.clone(),
                    ColumnRef::new(&table.name, &measure.name),
                ),
            );
        }
    }

    keys.sort_by(|a, b| a.name.cmp(&b.name));
    measures.sort_by(|a, b| a.name.cmp(&b.name));

    let mut columns = Vec::with_capacity(1 + keys.len() + measures.len());
    columns.push(BridgeColumnSpec::stage());
    columns.extend(keys);
    columns.extend(measures);

    tracing::debug!(columns = columns.len(), "bridge schema synthesized");
    BridgeSchema { columns }
}

fn key_column_spec(table: &TableSchema) -> Option<BridgeColumnSpec> {
    table.primary_key.as_ref().map(|pk| {
        BridgeColumnSpec::derived(
            key_column_name(&table.name),
            ColumnRole::Key,
            pk.logical_type.clone(),
            ColumnRef::new(&table.name, &pk.name),
        )
    })
}

/// Warnings about the catalog that limit what the bridge can carry
///
/// `UNRESOLVED_KEY` for each table without a usable key,
/// `UNKNOWN_REFERENCED_TABLE` for each foreign key leaving the catalog, and
/// one `FOREIGN_KEY_CYCLE` note when the keys loop.
pub fn schema_diagnostics(catalog: &Catalog) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();

    for table in catalog.tables_by_name() {
        if table.has_single_key() {
            continue;
        }
        let detail = if table.primary_key_columns.is_empty() {
            "no primary key".to_string()
        } else {
            format!("primary key ({})", table.primary_key_columns.join(", "))
        };
        diagnostics.push(
            Diagnostic::of(
                DiagnosticCode::UnresolvedKey,
                format!("{} has no single-column primary key", table.name),
            )
            .with_location(Location::table(&table.name))
            .with_detail(detail),
        );
    }

    let graph = ForeignKeyGraph::from_catalog(catalog);
    for edge in graph.dangling_edges() {
        diagnostics.push(
            Diagnostic::of(
                DiagnosticCode::UnknownReferencedTable,
                format!(
                    "{}.{} references {}, which is not a source table",
                    edge.from_table, edge.column, edge.to_table
                ),
            )
            .with_location(Location::table(&edge.from_table).with_column(&edge.column)),
        );
    }

    if graph.has_cycle() {
        diagnostics.push(Diagnostic::of(
            DiagnosticCode::ForeignKeyCycle,
            "foreign keys form a cycle; each row walk visits a referenced row at most once",
        ));
    }

    diagnostics
}
