//! Bridge building errors

use puppini_catalog::CatalogError;

/// Fatal errors that abort a build
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BridgeError {
    #[error("Catalog access failed: {0}")]
    CatalogAccess(#[from] CatalogError),
}

/// Errors that cost a single source row its bridge row
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RowAssemblyError {
    #[error("Column {column} is not part of the bridge schema")]
    UnknownColumn { column: String },

    #[error("Column {column} expects {expected}, got {found}")]
    TypeMismatch {
        column: String,
        expected: String,
        found: &'static str,
    },

    #[error("Lookup in {table} failed: {source}")]
    Lookup { table: String, source: CatalogError },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_messages() {
        let err = RowAssemblyError::TypeMismatch {
            column: "PBK_DimTime".to_string(),
            expected: "DATE".to_string(),
            found: "text",
        };
        assert_eq!(err.to_string(), "Column PBK_DimTime expects DATE, got text");

        let fatal: BridgeError = CatalogError::TableNotFound("DimStore".to_string()).into();
        assert_eq!(fatal.to_string(), "Catalog access failed: Table not found: DimStore");
    }
}
