//! Foreign-key analysis of the source tables

use crate::error::BridgeError;
use puppini_catalog::{source_table_names, CatalogProvider, LoadOptions};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One named foreign-key constraint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKeyAnalysis {
    pub table: String,
    pub columns: Vec<String>,
    pub referenced_table: String,
    pub referenced_columns: Vec<String>,
}

/// Every named foreign key of the source tables, keyed by constraint name
///
/// Listing the tables must succeed. A table whose foreign keys cannot be
/// read is logged and left out. Unnamed constraints are not reported.
pub async fn analyze_foreign_keys(
    provider: &dyn CatalogProvider,
    options: &LoadOptions,
) -> Result<BTreeMap<String, ForeignKeyAnalysis>, BridgeError> {
    let mut analysis = BTreeMap::new();

    for table in source_table_names(provider, options).await? {
        let foreign_keys = match provider.get_foreign_keys(&table).await {
            Ok(fks) => fks,
            Err(e) => {
                tracing::warn!(table = %table, error = %e, "cannot read foreign keys; table skipped");
                continue;
            }
        };

        for fk in foreign_keys {
            let Some(name) = fk.name else { continue };
            if fk.columns.is_empty() {
                continue;
            }
            analysis.insert(
                name,
                ForeignKeyAnalysis {
                    table: table.clone(),
                    columns: fk.columns,
                    referenced_table: fk.referenced_table,
                    referenced_columns: fk.referenced_columns,
                },
            );
        }
    }

    tracing::info!(constraints = analysis.len(), "foreign-key analysis complete");
    Ok(analysis)
}

#[cfg(test)]
mod tests {
    use super::*;
    use puppini_catalog::{CatalogError, MockCatalogBuilder, MockTable};
    use puppini_core::{ForeignKeyInfo, LogicalType};

    fn provider() -> MockCatalogBuilder {
        MockCatalogBuilder::new()
            .with_table(
                MockTable::new("FactSales")
                    .column("StoreKey", LogicalType::Int)
                    .column("ProductKey", LogicalType::Int)
                    .foreign_key("fk_sales_store", "StoreKey", "DimStore", "StoreKey")
                    .foreign_key("fk_sales_product", "ProductKey", "DimProduct", "ProductKey"),
            )
            .with_table(
                MockTable {
                    foreign_keys: vec![ForeignKeyInfo {
                        name: None,
                        columns: vec!["GeographyKey".to_string()],
                        referenced_table: "DimGeography".to_string(),
                        referenced_columns: vec!["GeographyKey".to_string()],
                    }],
                    ..MockTable::new("DimStore")
                },
            )
            .with_table(
                MockTable::new("Puppini_Bridge")
                    .foreign_key("fk_bridge_sales", "PBK_FactSales", "FactSales", "SalesID"),
            )
    }

    #[tokio::test]
    async fn named_constraints_in_name_order() {
        let analysis = analyze_foreign_keys(&provider().build(), &LoadOptions::default())
            .await
            .unwrap();

        let names: Vec<&str> = analysis.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["fk_sales_product", "fk_sales_store"]);
        assert_eq!(analysis["fk_sales_store"].table, "FactSales");
        assert_eq!(analysis["fk_sales_store"].referenced_columns, vec!["StoreKey"]);
    }

    #[tokio::test]
    async fn unreadable_table_is_skipped() {
        let provider = provider()
            .with_error("FactSales", CatalogError::PermissionDenied("no".to_string()))
            .build();
        let analysis = analyze_foreign_keys(&provider, &LoadOptions::default()).await.unwrap();
        assert!(analysis.is_empty());
    }

    #[tokio::test]
    async fn listing_failure_is_fatal() {
        let provider = provider().with_listing_failure().build();
        assert!(analyze_foreign_keys(&provider, &LoadOptions::default()).await.is_err());
    }
}
