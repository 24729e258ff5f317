//! Bridge row assembly
//!
//! One bridge row per source row: `Stage`, the row's own key, its measures,
//! then every key found by the closure walk. [`BridgeRows`] drives this over
//! the whole catalog, scanning each table when it gets there.

use crate::closure::ClosureResolver;
use crate::error::{BridgeError, RowAssemblyError};
use crate::graph::ForeignKeyGraph;
use crate::synth::{measure_column_name, schema_diagnostics, BridgeSchema, STAGE_COLUMN};
use puppini_catalog::CatalogProvider;
use puppini_core::{
    BuildReport, Catalog, Diagnostic, DiagnosticCode, Location, Row, SeverityThreshold,
    TableSchema, Value,
};
use serde::Serialize;
use std::collections::BTreeMap;

/// One row of the bridge table
///
/// Values can only be added through [`BridgeRow::insert`], which checks
/// them against the bridge schema. Columns outside the row's lineage stay
/// unset.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BridgeRow {
    values: BTreeMap<String, Value>,
}

impl BridgeRow {
    /// Start a row originating from `stage`
    pub fn new(schema: &BridgeSchema, stage: &str) -> Result<Self, RowAssemblyError> {
        let mut row = Self {
            values: BTreeMap::new(),
        };
        row.insert(schema, STAGE_COLUMN, Value::Text(stage.to_string()))?;
        Ok(row)
    }

    /// Set `column` unless it already holds a value
    ///
    /// Returns whether the value was stored. The column must exist in the
    /// schema and accept the value's type.
    pub fn insert(
        &mut self,
        schema: &BridgeSchema,
        column: &str,
        value: Value,
    ) -> Result<bool, RowAssemblyError> {
        let spec = schema
            .find(column)
            .ok_or_else(|| RowAssemblyError::UnknownColumn {
                column: column.to_string(),
            })?;

        if (value.is_null() && !spec.nullable) || !value.fits(&spec.logical_type) {
            return Err(RowAssemblyError::TypeMismatch {
                column: column.to_string(),
                expected: spec.logical_type.to_string(),
                found: value.kind(),
            });
        }

        if self.values.contains_key(column) {
            return Ok(false);
        }
        self.values.insert(column.to_string(), value);
        Ok(true)
    }

    /// Origin table
    pub fn stage(&self) -> &str {
        match self.values.get(STAGE_COLUMN) {
            Some(Value::Text(stage)) => stage,
            _ => "",
        }
    }

    /// Value of `column`, if set
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.values.get(column)
    }

    pub fn is_set(&self, column: &str) -> bool {
        self.values.contains_key(column)
    }

    /// Number of columns set, `Stage` included
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Set columns in name order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Set columns in bridge-schema order
    pub fn ordered<'s>(&'s self, schema: &'s BridgeSchema) -> impl Iterator<Item = (&'s str, &'s Value)> {
        schema
            .columns()
            .iter()
            .filter_map(move |spec| self.values.get(&spec.name).map(|v| (spec.name.as_str(), v)))
    }
}

/// Builds bridge rows for source rows
pub struct RowAssembler<'a> {
    schema: &'a BridgeSchema,
    resolver: ClosureResolver<'a>,
}

/// An assembled row with the warnings raised on the way
#[derive(Debug, Clone, PartialEq)]
pub struct AssembledRow {
    pub row: BridgeRow,
    pub diagnostics: Vec<Diagnostic>,
}

impl<'a> RowAssembler<'a> {
    pub fn new(catalog: &'a Catalog, graph: &'a ForeignKeyGraph, schema: &'a BridgeSchema) -> Self {
        Self {
            schema,
            resolver: ClosureResolver::new(catalog, graph, schema),
        }
    }

    /// Assemble the bridge row for `row` of `table`
    pub async fn assemble(
        &self,
        provider: &dyn CatalogProvider,
        table: &TableSchema,
        row: &Row,
        row_index: usize,
    ) -> Result<AssembledRow, RowAssemblyError> {
        let mut bridge_row = BridgeRow::new(self.schema, &table.name)?;

        if let Some(pk) = &table.primary_key {
            let key_column = table.key_column_name();
            if self.schema.contains(&key_column) {
                bridge_row.insert(self.schema, &key_column, row.get(&pk.name).clone())?;
            }
        }

        let mut diagnostics = Vec::new();
        for measure in &table.measures {
            let column = measure_column_name(&table.name, &measure.name);
            let Some(spec) = self.schema.find(&column) else {
                continue;
            };
            let value = row.get(&measure.name).clone();

            // Another table's measure abbreviates to the same column and fixed its type
            let borrowed = spec
                .source
                .as_ref()
                .is_some_and(|source| source.source != table.name);
            if borrowed && !value.fits(&spec.logical_type) {
                tracing::warn!(
                    table = %table.name,
                    column = %column,
                    "measure does not fit a shared bridge column; cell left empty"
                );
                diagnostics.push(
                    Diagnostic::of(
                        DiagnosticCode::MeasureCellDropped,
                        format!(
                            "{} is typed {} by another table; {} value left empty",
                            column,
                            spec.logical_type,
                            value.kind()
                        ),
                    )
                    .with_location(Location::row(&table.name, row_index).with_column(&measure.name)),
                );
                continue;
            }

            bridge_row.insert(self.schema, &column, value)?;
        }

        let closure = self
            .resolver
            .resolve(provider, &table.name, row, row_index)
            .await?;
        for (column, value) in closure.keys {
            bridge_row.insert(self.schema, &column, value)?;
        }
        diagnostics.extend(closure.diagnostics);

        Ok(AssembledRow {
            row: bridge_row,
            diagnostics,
        })
    }
}

/// Lazy cursor over every bridge row of a build
///
/// Tables are taken in catalog order and rows in scan order. Rows that fail
/// to assemble are skipped and recorded in the report; a failing table scan
/// ends the build with an error.
pub struct BridgeRows<'a> {
    provider: &'a dyn CatalogProvider,
    catalog: &'a Catalog,
    schema: &'a BridgeSchema,
    graph: ForeignKeyGraph,
    severity: SeverityThreshold,
    report: BuildReport,
    started: bool,
    next_table: usize,
    current: Option<TableScan>,
}

/// Rows of the table being walked
struct TableScan {
    table: usize,
    rows: std::vec::IntoIter<Row>,
    next_index: usize,
}

impl<'a> BridgeRows<'a> {
    /// Apply severity overrides to every recorded diagnostic
    pub fn with_severity(mut self, severity: SeverityThreshold) -> Self {
        self.severity = severity;
        self
    }

    /// Next bridge row, or `None` once every table is drained
    pub async fn next_row(&mut self) -> Result<Option<BridgeRow>, BridgeError> {
        if !self.started {
            self.started = true;
            for diagnostic in schema_diagnostics(self.catalog) {
                self.record(diagnostic);
            }
        }

        loop {
            let (table_pos, row, row_index) = match self.current.as_mut() {
                Some(scan) => match scan.rows.next() {
                    Some(row) => {
                        let index = scan.next_index;
                        scan.next_index += 1;
                        (scan.table, row, index)
                    }
                    None => {
                        self.current = None;
                        continue;
                    }
                },
                None => {
                    if !self.open_next_table().await? {
                        return Ok(None);
                    }
                    continue;
                }
            };

            let catalog = self.catalog;
            let table = &catalog.tables()[table_pos];
            let outcome = RowAssembler::new(catalog, &self.graph, self.schema)
                .assemble(self.provider, table, &row, row_index)
                .await;

            match outcome {
                Ok(assembled) => {
                    for diagnostic in assembled.diagnostics {
                        self.record(diagnostic);
                    }
                    self.report.record_emitted();
                    return Ok(Some(assembled.row));
                }
                Err(error) => {
                    tracing::warn!(
                        table = %table.name,
                        row = row_index + 1,
                        error = %error,
                        "skipping source row"
                    );
                    let diagnostic = self.severity.apply(
                        Diagnostic::of(DiagnosticCode::RowSkipped, error.to_string())
                            .with_location(Location::row(&table.name, row_index)),
                    );
                    self.report.record_skipped(diagnostic);
                }
            }
        }
    }

    /// Report so far
    pub fn report(&self) -> &BuildReport {
        &self.report
    }

    /// Mutable report, e.g. to record failures while writing rows
    pub fn report_mut(&mut self) -> &mut BuildReport {
        &mut self.report
    }

    /// Finish and return the report
    pub fn into_report(self) -> BuildReport {
        tracing::info!(
            tables = self.report.summary.tables_scanned,
            emitted = self.report.summary.rows_emitted,
            skipped = self.report.summary.rows_skipped,
            warnings = self.report.summary.warnings,
            "bridge rows built"
        );
        self.report
    }

    fn record(&mut self, diagnostic: Diagnostic) {
        let diagnostic = self.severity.apply(diagnostic);
        self.report.add_diagnostic(diagnostic);
    }

    async fn open_next_table(&mut self) -> Result<bool, BridgeError> {
        let catalog = self.catalog;
        let Some(table) = catalog.tables().get(self.next_table) else {
            return Ok(false);
        };

        let rows = self.provider.scan_rows(&table.name).await?;
        tracing::debug!(table = %table.name, rows = rows.len(), "scanned source table");

        self.report.record_table();
        self.current = Some(TableScan {
            table: self.next_table,
            rows: rows.into_iter(),
            next_index: 0,
        });
        self.next_table += 1;
        Ok(true)
    }
}

/// Start a build over every row of every catalog table
pub fn build_bridge_rows<'a>(
    provider: &'a dyn CatalogProvider,
    catalog: &'a Catalog,
    schema: &'a BridgeSchema,
) -> BridgeRows<'a> {
    BridgeRows {
        provider,
        catalog,
        schema,
        graph: ForeignKeyGraph::from_catalog(catalog),
        severity: SeverityThreshold::default(),
        report: BuildReport::new().with_fingerprint(schema.fingerprint()),
        started: false,
        next_table: 0,
        current: None,
    }
}

/// Drain a build into memory
pub async fn collect_bridge_rows(
    provider: &dyn CatalogProvider,
    catalog: &Catalog,
    schema: &BridgeSchema,
) -> Result<(Vec<BridgeRow>, BuildReport), BridgeError> {
    let mut cursor = build_bridge_rows(provider, catalog, schema);
    let mut rows = Vec::new();
    while let Some(row) = cursor.next_row().await? {
        rows.push(row);
    }
    Ok((rows, cursor.into_report()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synth::synthesize_bridge_schema;
    use puppini_core::{Column, ForeignKeyInfo, LogicalType};

    fn schema() -> BridgeSchema {
        synthesize_bridge_schema(&Catalog::new(vec![TableSchema::new(
            "DimTime",
            vec![
                Column::new("TimeKey", LogicalType::Date),
                Column::new("Temperature", LogicalType::Float),
            ],
            vec!["TimeKey".to_string()],
            &[] as &[ForeignKeyInfo],
        )]))
    }

    #[test]
    fn insert_validates_against_schema() {
        let schema = schema();
        let mut row = BridgeRow::new(&schema, "DimTime").unwrap();
        assert_eq!(row.stage(), "DimTime");

        assert!(matches!(
            row.insert(&schema, "PBK_Nope", Value::Int(1)),
            Err(RowAssemblyError::UnknownColumn { .. })
        ));
        assert!(matches!(
            row.insert(&schema, "PBK_DimTime", Value::Int(1)),
            Err(RowAssemblyError::TypeMismatch { found: "int", .. })
        ));
        assert!(matches!(
            row.insert(&schema, "DTim_Temperature", Value::Text("warm".to_string())),
            Err(RowAssemblyError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn insert_keeps_first_value() {
        let schema = schema();
        let mut row = BridgeRow::new(&schema, "DimTime").unwrap();

        assert!(row.insert(&schema, "DTim_Temperature", Value::Float(3.5)).unwrap());
        assert!(!row.insert(&schema, "DTim_Temperature", Value::Float(9.0)).unwrap());
        assert_eq!(row.get("DTim_Temperature"), Some(&Value::Float(3.5)));

        // Null is fine for derived columns but never for Stage
        assert!(row.insert(&schema, "PBK_DimTime", Value::Null).unwrap());
        assert!(BridgeRow::new(&schema, "").is_ok());
        assert!(matches!(
            row.insert(&schema, STAGE_COLUMN, Value::Null),
            Err(RowAssemblyError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn ordered_follows_schema() {
        let schema = schema();
        let mut row = BridgeRow::new(&schema, "DimTime").unwrap();
        row.insert(&schema, "DTim_Temperature", Value::Float(1.0)).unwrap();
        row.insert(&schema, "PBK_DimTime", Value::Null).unwrap();

        let names: Vec<&str> = row.ordered(&schema).map(|(name, _)| name).collect();
        assert_eq!(names, vec!["Stage", "PBK_DimTime", "DTim_Temperature"]);
        assert_eq!(row.len(), 3);
    }

    #[tokio::test]
    async fn shared_measure_column_drops_only_the_cell() {
        use puppini_catalog::{load_catalog, LoadOptions, MockCatalog, MockTable};

        // FactSales and FooSales both abbreviate to FSal
        let provider = MockCatalog::from_tables(vec![
            MockTable::new("FactSales")
                .column("SalesID", LogicalType::Int)
                .column("Quantity", LogicalType::Int)
                .primary_key(&["SalesID"])
                .row(Row::new().with("SalesID", 1i64).with("Quantity", 2i64)),
            MockTable::new("FooSales")
                .column("FooID", LogicalType::Int)
                .column("Quantity", LogicalType::Float)
                .primary_key(&["FooID"])
                .row(Row::new().with("FooID", 9i64).with("Quantity", 1.5)),
        ]);
        let catalog = load_catalog(&provider, &LoadOptions::default()).await.unwrap();
        let schema = synthesize_bridge_schema(&catalog);
        assert_eq!(schema.find("FSal_Quantity").unwrap().logical_type, LogicalType::Int);

        let (rows, report) = collect_bridge_rows(&provider, &catalog, &schema).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get("FSal_Quantity"), Some(&Value::Int(2)));

        let foo = &rows[1];
        assert_eq!(foo.stage(), "FooSales");
        assert_eq!(foo.get("PBK_FooSales"), Some(&Value::Int(9)));
        assert!(!foo.is_set("FSal_Quantity"));

        assert_eq!(report.summary.rows_skipped, 0);
        assert_eq!(report.summary.warnings, 1);
        assert_eq!(report.diagnostics[0].code, DiagnosticCode::MeasureCellDropped);
        assert_eq!(
            report.diagnostics[0].location,
            Some(Location::row("FooSales", 0).with_column("Quantity"))
        );
    }
}
