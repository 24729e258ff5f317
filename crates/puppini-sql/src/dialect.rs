//! SQL dialects
//!
//! Dialects differ in identifier quoting, type names and a few literals:
//!
//! - MySQL: `` `name` ``, `1`/`0` booleans, backslash escapes in strings
//! - PostgreSQL and ANSI: `"name"`, `TRUE`/`FALSE`

use crate::error::RenderError;
use puppini_core::{DialectConfig, LogicalType, Value};

/// Width used for text columns; key columns need a bounded type in MySQL
pub const TEXT_COLUMN_WIDTH: u32 = 255;

/// Target SQL dialect
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Dialect {
    #[default]
    MySql,
    Postgres,
    Ansi,
}

impl Dialect {
    /// Dialect name for display/logging
    pub fn name(&self) -> &'static str {
        match self {
            Self::MySql => "mysql",
            Self::Postgres => "postgres",
            Self::Ansi => "ansi",
        }
    }

    /// Quote a table or column name, doubling embedded quote characters
    pub fn quote_identifier(&self, ident: &str) -> String {
        match self {
            Self::MySql => format!("`{}`", ident.replace('`', "``")),
            Self::Postgres | Self::Ansi => format!("\"{}\"", ident.replace('"', "\"\"")),
        }
    }

    /// Quote a string literal
    pub fn quote_string(&self, s: &str) -> String {
        let escaped = match self {
            Self::MySql => s.replace('\\', "\\\\").replace('\'', "''"),
            Self::Postgres | Self::Ansi => s.replace('\'', "''"),
        };
        format!("'{}'", escaped)
    }

    pub fn format_bool(&self, b: bool) -> &'static str {
        match (self, b) {
            (Self::MySql, true) => "1",
            (Self::MySql, false) => "0",
            (_, true) => "TRUE",
            (_, false) => "FALSE",
        }
    }

    /// Column type for a logical type
    pub fn type_name(&self, ty: &LogicalType) -> String {
        match ty {
            LogicalType::Bool => "BOOLEAN".to_string(),
            LogicalType::Int => match self {
                Self::MySql => "INT".to_string(),
                _ => "INTEGER".to_string(),
            },
            LogicalType::Float => match self {
                Self::MySql => "DOUBLE".to_string(),
                _ => "DOUBLE PRECISION".to_string(),
            },
            LogicalType::Decimal { precision, scale } => match (precision, scale) {
                (Some(p), Some(s)) => format!("DECIMAL({}, {})", p, s),
                (Some(p), None) => format!("DECIMAL({})", p),
                _ => "DECIMAL".to_string(),
            },
            LogicalType::String => format!("VARCHAR({})", TEXT_COLUMN_WIDTH),
            LogicalType::Date => "DATE".to_string(),
            LogicalType::Timestamp => match self {
                Self::MySql => "DATETIME".to_string(),
                _ => "TIMESTAMP".to_string(),
            },
            LogicalType::Json | LogicalType::Struct { .. } | LogicalType::Array { .. } => {
                match self {
                    Self::MySql => "JSON".to_string(),
                    Self::Postgres => "JSONB".to_string(),
                    Self::Ansi => "TEXT".to_string(),
                }
            }
            LogicalType::Unknown => "TEXT".to_string(),
        }
    }

    /// SQL literal for a value stored in `column`
    pub fn literal(&self, column: &str, value: &Value) -> Result<String, RenderError> {
        match value {
            Value::Null => Ok("NULL".to_string()),
            Value::Bool(b) => Ok(self.format_bool(*b).to_string()),
            Value::Int(i) => Ok(i.to_string()),
            Value::Float(f) if f.is_finite() => Ok(f.to_string()),
            Value::Float(f) => Err(RenderError::NonFiniteFloat {
                column: column.to_string(),
                value: *f,
            }),
            Value::Decimal(text) if is_decimal_literal(text) => Ok(text.trim().to_string()),
            Value::Decimal(text) => Err(RenderError::InvalidDecimal {
                column: column.to_string(),
                text: text.clone(),
            }),
            Value::Text(s) => Ok(self.quote_string(s)),
            Value::Date(_) | Value::Timestamp(_) => {
                let text = value.to_text().unwrap_or_default();
                Ok(self.quote_string(&text))
            }
        }
    }
}

impl From<DialectConfig> for Dialect {
    fn from(config: DialectConfig) -> Self {
        match config {
            DialectConfig::MySql => Self::MySql,
            DialectConfig::Postgres => Self::Postgres,
            DialectConfig::Ansi => Self::Ansi,
        }
    }
}

impl std::fmt::Display for Dialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Optional sign, digits with at most one point, optional exponent
fn is_decimal_literal(text: &str) -> bool {
    let text = text.trim();
    let unsigned = text.strip_prefix(['-', '+']).unwrap_or(text);
    let (mantissa, exponent) = match unsigned.split_once(['e', 'E']) {
        Some((m, e)) => (m, Some(e)),
        None => (unsigned, None),
    };

    let mut parts = mantissa.splitn(2, '.');
    let whole = parts.next().unwrap_or("");
    let fraction = parts.next().unwrap_or("");
    let digits_ok = |s: &str| s.chars().all(|c| c.is_ascii_digit());

    let mantissa_ok = !(whole.is_empty() && fraction.is_empty())
        && digits_ok(whole)
        && digits_ok(fraction);
    let exponent_ok = match exponent {
        None => true,
        Some(e) => {
            let e = e.strip_prefix(['-', '+']).unwrap_or(e);
            !e.is_empty() && digits_ok(e)
        }
    };

    mantissa_ok && exponent_ok
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn identifier_quoting() {
        assert_eq!(Dialect::MySql.quote_identifier("FactSales"), "`FactSales`");
        assert_eq!(Dialect::MySql.quote_identifier("odd`name"), "`odd``name`");
        assert_eq!(Dialect::Postgres.quote_identifier("FactSales"), "\"FactSales\"");
        assert_eq!(Dialect::Ansi.quote_identifier("a\"b"), "\"a\"\"b\"");
    }

    #[test]
    fn string_literals() {
        assert_eq!(Dialect::Postgres.quote_string("O'Brien"), "'O''Brien'");
        assert_eq!(Dialect::MySql.quote_string("C:\\tmp"), "'C:\\\\tmp'");
        assert_eq!(Dialect::Postgres.quote_string("C:\\tmp"), "'C:\\tmp'");
    }

    #[test]
    fn value_literals() {
        let d = Dialect::MySql;
        assert_eq!(d.literal("c", &Value::Null).unwrap(), "NULL");
        assert_eq!(d.literal("c", &Value::Bool(true)).unwrap(), "1");
        assert_eq!(Dialect::Postgres.literal("c", &Value::Bool(false)).unwrap(), "FALSE");
        assert_eq!(d.literal("c", &Value::Int(-4)).unwrap(), "-4");
        assert_eq!(d.literal("c", &Value::Float(1.5)).unwrap(), "1.5");
        assert_eq!(d.literal("c", &Value::Decimal("1200.00".into())).unwrap(), "1200.00");
        assert_eq!(d.literal("c", &Value::Text("x".into())).unwrap(), "'x'");

        let date = Value::from(NaiveDate::from_ymd_opt(2023, 1, 15).unwrap());
        assert_eq!(d.literal("c", &date).unwrap(), "'2023-01-15'");
    }

    #[test]
    fn unrenderable_values() {
        assert!(matches!(
            Dialect::MySql.literal("FSal_Ratio", &Value::Float(f64::NAN)),
            Err(RenderError::NonFiniteFloat { ref column, .. }) if column == "FSal_Ratio"
        ));
        assert!(matches!(
            Dialect::MySql.literal("c", &Value::Decimal("1; DROP TABLE x".into())),
            Err(RenderError::InvalidDecimal { .. })
        ));
    }

    #[test]
    fn decimal_text() {
        for ok in ["1", "-1.50", "+.5", "3.", "1e5", "2.5E-3"] {
            assert!(is_decimal_literal(ok), "{}", ok);
        }
        for bad in ["", ".", "-", "1.2.3", "1e", "abc", "0x10"] {
            assert!(!is_decimal_literal(bad), "{}", bad);
        }
    }

    #[test]
    fn type_names() {
        assert_eq!(Dialect::MySql.type_name(&LogicalType::Int), "INT");
        assert_eq!(Dialect::Postgres.type_name(&LogicalType::Float), "DOUBLE PRECISION");
        assert_eq!(Dialect::MySql.type_name(&LogicalType::String), "VARCHAR(255)");
        assert_eq!(
            Dialect::Ansi.type_name(&LogicalType::Decimal { precision: Some(10), scale: Some(2) }),
            "DECIMAL(10, 2)"
        );
        assert_eq!(Dialect::MySql.type_name(&LogicalType::Timestamp), "DATETIME");
    }

    #[test]
    fn from_config() {
        assert_eq!(Dialect::from(DialectConfig::default()), Dialect::MySql);
        assert_eq!(Dialect::from(DialectConfig::Postgres).to_string(), "postgres");
    }
}
