//! Source table structure and the canonical type system

use serde::{Deserialize, Serialize};

/// Marker prepended to a table name to form its bridge key column
pub const KEY_COLUMN_PREFIX: &str = "PBK_";

/// Name of the bridge key column carrying `table`'s primary key
pub fn key_column_name(table: &str) -> String {
    format!("{}{}", KEY_COLUMN_PREFIX, table)
}

/// Portable logical type system
///
/// Maps database-specific types to a common representation
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum LogicalType {
    /// Boolean type
    Bool,

    /// Integer type (any precision)
    Int,

    /// Floating point (any precision)
    Float,

    /// Decimal with precision and scale
    Decimal {
        #[serde(default)]
        precision: Option<u16>,
        #[serde(default)]
        scale: Option<u16>,
    },

    /// String/text type
    String,

    /// Date (no time component)
    Date,

    /// Timestamp (with time component)
    Timestamp,

    /// JSON/Variant type
    Json,

    /// Structured type with named fields
    Struct {
        fields: Vec<Column>,
    },

    /// Array type
    Array {
        element_type: Box<LogicalType>,
    },

    /// Unknown type (cannot infer)
    Unknown,
}

impl LogicalType {
    /// Whether values of this type can be copied into the bridge as measures
    pub fn is_numeric(&self) -> bool {
        matches!(self, Self::Int | Self::Float | Self::Decimal { .. })
    }
}

impl std::fmt::Display for LogicalType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bool => write!(f, "BOOL"),
            Self::Int => write!(f, "INT"),
            Self::Float => write!(f, "FLOAT"),
            Self::Decimal { precision, scale } => {
                match (precision, scale) {
                    (Some(p), Some(s)) => write!(f, "DECIMAL({}, {})", p, s),
                    (Some(p), None) => write!(f, "DECIMAL({})", p),
                    _ => write!(f, "DECIMAL"),
                }
            }
            Self::String => write!(f, "STRING"),
            Self::Date => write!(f, "DATE"),
            Self::Timestamp => write!(f, "TIMESTAMP"),
            Self::Json => write!(f, "JSON"),
            Self::Struct { .. } => write!(f, "STRUCT"),
            Self::Array { .. } => write!(f, "ARRAY"),
            Self::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

/// Nullability state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Nullability {
    /// Definitely nullable
    Yes,

    /// Definitely not nullable
    No,

    /// Cannot determine nullability
    #[default]
    Unknown,
}

/// Reference to where a column comes from
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ColumnRef {
    /// Source table name
    pub source: String,

    /// Original column name
    pub column: String,
}

impl ColumnRef {
    pub fn new(source: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            column: column.into(),
        }
    }
}

/// A column of a source table
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Column {
    /// Column name
    pub name: String,

    /// Logical type
    pub logical_type: LogicalType,

    /// Nullability
    #[serde(default)]
    pub nullable: Nullability,

    /// Provenance - where this column comes from
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub provenance: Vec<ColumnRef>,
}

impl Column {
    /// Create a new column with unknown provenance
    pub fn new(name: impl Into<String>, logical_type: LogicalType) -> Self {
        Self {
            name: name.into(),
            logical_type,
            nullable: Nullability::Unknown,
            provenance: Vec::new(),
        }
    }

    /// Set nullability
    pub fn with_nullability(mut self, nullable: Nullability) -> Self {
        self.nullable = nullable;
        self
    }

    /// Set provenance
    pub fn with_provenance(mut self, provenance: Vec<ColumnRef>) -> Self {
        self.provenance = provenance;
        self
    }
}

/// A foreign-key constraint as reported by a catalog
///
/// Columns are kept in constraint order so multi-column constraints survive
/// analysis even though the bridge only follows the first pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKeyInfo {
    /// Constraint name, when the catalog exposes one
    #[serde(default)]
    pub name: Option<String>,

    /// Constrained columns on the referencing table
    pub columns: Vec<String>,

    /// Referenced table
    pub referenced_table: String,

    /// Referenced columns, positionally matching `columns`
    #[serde(default)]
    pub referenced_columns: Vec<String>,
}

impl ForeignKeyInfo {
    pub fn new(
        name: impl Into<String>,
        column: impl Into<String>,
        referenced_table: impl Into<String>,
        referenced_column: impl Into<String>,
    ) -> Self {
        Self {
            name: Some(name.into()),
            columns: vec![column.into()],
            referenced_table: referenced_table.into(),
            referenced_columns: vec![referenced_column.into()],
        }
    }
}

/// A single-column foreign-key edge used by the bridge
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKey {
    /// Referencing column
    pub column: String,

    /// Referenced table
    pub referenced_table: String,

    /// Referenced column, if the catalog reported it
    pub referenced_column: Option<String>,

    /// Constraint name, if the catalog reported it
    pub constraint_name: Option<String>,
}

impl ForeignKey {
    /// Reduce a catalog constraint to its first column pair
    ///
    /// Returns `None` for constraints without any constrained column.
    pub fn from_info(info: &ForeignKeyInfo) -> Option<Self> {
        let column = info.columns.first()?;
        Some(Self {
            column: column.clone(),
            referenced_table: info.referenced_table.clone(),
            referenced_column: info.referenced_columns.first().cloned(),
            constraint_name: info.name.clone(),
        })
    }
}

/// Read-only snapshot of one source table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableSchema {
    /// Table name, unique within the catalog
    pub name: String,

    /// All columns in catalog order
    pub columns: Vec<Column>,

    /// Primary-key columns exactly as the catalog reported them
    pub primary_key_columns: Vec<String>,

    /// The primary key when it is a single column present in `columns`
    pub primary_key: Option<Column>,

    /// Foreign keys in catalog order
    pub foreign_keys: Vec<ForeignKey>,

    /// Numeric, non-key, non-FK columns copied into the bridge
    pub measures: Vec<Column>,
}

impl TableSchema {
    /// Build a table snapshot from raw catalog facts
    pub fn new(
        name: impl Into<String>,
        columns: Vec<Column>,
        primary_key_columns: Vec<String>,
        foreign_keys: &[ForeignKeyInfo],
    ) -> Self {
        let name = name.into();

        let primary_key = match primary_key_columns.as_slice() {
            [single] => columns.iter().find(|c| &c.name == single).cloned(),
            _ => None,
        };

        let foreign_keys: Vec<ForeignKey> =
            foreign_keys.iter().filter_map(ForeignKey::from_info).collect();

        let measures = columns
            .iter()
            .filter(|c| c.logical_type.is_numeric())
            .filter(|c| !primary_key_columns.contains(&c.name))
            .filter(|c| !foreign_keys.iter().any(|fk| fk.column == c.name))
            .filter(|c| !c.name.starts_with(KEY_COLUMN_PREFIX))
            .cloned()
            .collect();

        Self {
            name,
            columns,
            primary_key_columns,
            primary_key,
            foreign_keys,
            measures,
        }
    }

    /// Find a column by name
    pub fn find_column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Whether the table has a usable single-column primary key
    pub fn has_single_key(&self) -> bool {
        self.primary_key.is_some()
    }

    /// Bridge key column for this table
    pub fn key_column_name(&self) -> String {
        key_column_name(&self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sales_columns() -> Vec<Column> {
        vec![
            Column::new("SalesID", LogicalType::Int),
            Column::new("ProductKey", LogicalType::Int),
            Column::new("Quantity", LogicalType::Int),
            Column::new("TotalAmount", LogicalType::Decimal { precision: Some(10), scale: Some(2) }),
            Column::new("Note", LogicalType::String),
            Column::new("PBK_FactSales", LogicalType::Int),
        ]
    }

    #[test]
    fn logical_type_display() {
        assert_eq!(LogicalType::Bool.to_string(), "BOOL");
        assert_eq!(
            LogicalType::Decimal { precision: Some(10), scale: Some(2) }.to_string(),
            "DECIMAL(10, 2)"
        );
    }

    #[test]
    fn numeric_types() {
        assert!(LogicalType::Int.is_numeric());
        assert!(LogicalType::Float.is_numeric());
        assert!(LogicalType::Decimal { precision: None, scale: None }.is_numeric());
        assert!(!LogicalType::Bool.is_numeric());
        assert!(!LogicalType::String.is_numeric());
        assert!(!LogicalType::Date.is_numeric());
    }

    #[test]
    fn measures_exclude_keys_and_marked_columns() {
        let table = TableSchema::new(
            "FactSales",
            sales_columns(),
            vec!["SalesID".to_string()],
            &[ForeignKeyInfo::new("fk_sales_product", "ProductKey", "DimProduct", "ProductKey")],
        );

        let measures: Vec<&str> = table.measures.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(measures, vec!["Quantity", "TotalAmount"]);
        assert_eq!(table.primary_key.as_ref().map(|c| c.name.as_str()), Some("SalesID"));
        assert_eq!(table.key_column_name(), "PBK_FactSales");
    }

    #[test]
    fn composite_key_is_not_usable() {
        let table = TableSchema::new(
            "OrderLine",
            vec![
                Column::new("OrderID", LogicalType::Int),
                Column::new("LineNo", LogicalType::Int),
                Column::new("Amount", LogicalType::Float),
            ],
            vec!["OrderID".to_string(), "LineNo".to_string()],
            &[],
        );

        assert!(!table.has_single_key());
        let measures: Vec<&str> = table.measures.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(measures, vec!["Amount"]);
    }

    #[test]
    fn primary_key_missing_from_columns() {
        let table = TableSchema::new(
            "Ghost",
            vec![Column::new("Value", LogicalType::Int)],
            vec!["Id".to_string()],
            &[],
        );
        assert!(table.primary_key.is_none());
    }

    #[test]
    fn foreign_key_uses_first_column_pair() {
        let info = ForeignKeyInfo {
            name: Some("fk_multi".to_string()),
            columns: vec!["A".to_string(), "B".to_string()],
            referenced_table: "Other".to_string(),
            referenced_columns: vec!["X".to_string(), "Y".to_string()],
        };
        let fk = ForeignKey::from_info(&info).unwrap();
        assert_eq!(fk.column, "A");
        assert_eq!(fk.referenced_column.as_deref(), Some("X"));

        let empty = ForeignKeyInfo {
            name: None,
            columns: vec![],
            referenced_table: "Other".to_string(),
            referenced_columns: vec![],
        };
        assert!(ForeignKey::from_info(&empty).is_none());
    }
}
