//! SQL rendering errors

/// A value or schema that cannot be written as SQL text
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RenderError {
    #[error("Column {column} holds {value}, which has no SQL literal")]
    NonFiniteFloat { column: String, value: f64 },

    #[error("Column {column} holds malformed decimal '{text}'")]
    InvalidDecimal { column: String, text: String },

    #[error("Bridge table {table} would only have the Stage column")]
    EmptySchema { table: String },
}
