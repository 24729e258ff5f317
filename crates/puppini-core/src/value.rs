//! Cell values and source rows

use crate::schema::LogicalType;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};

/// A single cell value read from a source table
#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    /// Exact decimal, kept in its textual form
    Decimal(String),
    Text(String),
    Date(NaiveDate),
    Timestamp(NaiveDateTime),
}

/// Errors converting external data into values
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValueError {
    #[error("Cannot read {found} as {expected}")]
    Incompatible { expected: String, found: String },

    #[error("Invalid {kind} literal '{text}'")]
    InvalidLiteral { kind: &'static str, text: String },
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Short type label used in messages
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Decimal(_) => "decimal",
            Self::Text(_) => "text",
            Self::Date(_) => "date",
            Self::Timestamp(_) => "timestamp",
        }
    }

    /// Whether this value can be stored in a column of `ty`
    ///
    /// Null is accepted everywhere; nullability is checked by the caller.
    pub fn fits(&self, ty: &LogicalType) -> bool {
        match (self, ty) {
            (Self::Null, _) | (_, LogicalType::Unknown) => true,
            (Self::Bool(_), LogicalType::Bool | LogicalType::Int) => true,
            (Self::Int(_), LogicalType::Int | LogicalType::Float | LogicalType::Decimal { .. }) => true,
            (Self::Float(_), LogicalType::Float | LogicalType::Decimal { .. }) => true,
            (Self::Decimal(_), LogicalType::Float | LogicalType::Decimal { .. }) => true,
            (Self::Text(_), LogicalType::String | LogicalType::Json) => true,
            (Self::Date(_), LogicalType::Date | LogicalType::Timestamp) => true,
            (Self::Timestamp(_), LogicalType::Timestamp) => true,
            _ => false,
        }
    }

    /// Plain text rendering, as used for keyed lookups
    pub fn to_text(&self) -> Option<String> {
        match self {
            Self::Null => None,
            Self::Bool(b) => Some(b.to_string()),
            Self::Int(i) => Some(i.to_string()),
            Self::Float(f) => Some(f.to_string()),
            Self::Decimal(d) => Some(d.clone()),
            Self::Text(s) => Some(s.clone()),
            Self::Date(d) => Some(d.format("%Y-%m-%d").to_string()),
            Self::Timestamp(ts) => Some(ts.format("%Y-%m-%d %H:%M:%S%.f").to_string()),
        }
    }

    /// Read a JSON value as a column of type `ty`
    pub fn from_json(json: &serde_json::Value, ty: &LogicalType) -> Result<Self, ValueError> {
        use serde_json::Value as Json;

        let incompatible = || ValueError::Incompatible {
            expected: ty.to_string(),
            found: json.to_string(),
        };

        match (ty, json) {
            (_, Json::Null) => Ok(Self::Null),

            (LogicalType::Bool, Json::Bool(b)) => Ok(Self::Bool(*b)),
            (LogicalType::Bool, Json::Number(n)) => Ok(Self::Bool(n.as_i64() != Some(0))),

            (LogicalType::Int, Json::Number(n)) => n.as_i64().map(Self::Int).ok_or_else(incompatible),
            (LogicalType::Int, Json::String(s)) => s
                .trim()
                .parse()
                .map(Self::Int)
                .map_err(|_| ValueError::InvalidLiteral { kind: "int", text: s.clone() }),

            (LogicalType::Float, Json::Number(n)) => n.as_f64().map(Self::Float).ok_or_else(incompatible),
            (LogicalType::Float, Json::String(s)) => s
                .trim()
                .parse()
                .map(Self::Float)
                .map_err(|_| ValueError::InvalidLiteral { kind: "float", text: s.clone() }),

            (LogicalType::Decimal { .. }, Json::Number(n)) => Ok(Self::Decimal(n.to_string())),
            (LogicalType::Decimal { .. }, Json::String(s)) => {
                let text = s.trim();
                if text.parse::<f64>().is_ok() {
                    Ok(Self::Decimal(text.to_string()))
                } else {
                    Err(ValueError::InvalidLiteral { kind: "decimal", text: s.clone() })
                }
            }

            (LogicalType::Date, Json::String(s)) => parse_date(s).map(Self::Date),
            (LogicalType::Timestamp, Json::String(s)) => parse_timestamp(s).map(Self::Timestamp),

            (LogicalType::String, Json::String(s)) => Ok(Self::Text(s.clone())),
            (LogicalType::String, other) => Ok(Self::Text(other.to_string())),

            (LogicalType::Json | LogicalType::Struct { .. } | LogicalType::Array { .. }, other) => {
                Ok(Self::Text(other.to_string()))
            }

            (LogicalType::Unknown, Json::Bool(b)) => Ok(Self::Bool(*b)),
            (LogicalType::Unknown, Json::Number(n)) => Ok(match n.as_i64() {
                Some(i) => Self::Int(i),
                None => Self::Decimal(n.to_string()),
            }),
            (LogicalType::Unknown, Json::String(s)) => Ok(Self::Text(s.clone())),
            (LogicalType::Unknown, other) => Ok(Self::Text(other.to_string())),

            _ => Err(incompatible()),
        }
    }
}

fn parse_date(text: &str) -> Result<NaiveDate, ValueError> {
    let text = text.trim();
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .or_else(|_| parse_timestamp(text).map(|ts| ts.date()))
        .map_err(|_| ValueError::InvalidLiteral { kind: "date", text: text.to_string() })
}

fn parse_timestamp(text: &str) -> Result<NaiveDateTime, ValueError> {
    let text = text.trim();
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
        .or_else(|| {
            chrono::DateTime::parse_from_rfc3339(text)
                .ok()
                .map(|dt| dt.naive_utc())
        })
        .ok_or_else(|| ValueError::InvalidLiteral { kind: "timestamp", text: text.to_string() })
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a.to_bits() == b.to_bits(),
            (Self::Decimal(a), Self::Decimal(b)) => a == b,
            (Self::Text(a), Self::Text(b)) => a == b,
            (Self::Date(a), Self::Date(b)) => a == b,
            (Self::Timestamp(a), Self::Timestamp(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Self::Null => {}
            Self::Bool(b) => b.hash(state),
            Self::Int(i) => i.hash(state),
            Self::Float(f) => f.to_bits().hash(state),
            Self::Decimal(d) => d.hash(state),
            Self::Text(s) => s.hash(state),
            Self::Date(d) => d.hash(state),
            Self::Timestamp(ts) => ts.hash(state),
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.to_text() {
            Some(text) => write!(f, "{}", text),
            None => write!(f, "NULL"),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Null => serializer.serialize_none(),
            Self::Bool(b) => serializer.serialize_bool(*b),
            Self::Int(i) => serializer.serialize_i64(*i),
            Self::Float(f) => serializer.serialize_f64(*f),
            other => match other.to_text() {
                Some(text) => serializer.serialize_str(&text),
                None => serializer.serialize_none(),
            },
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<NaiveDate> for Value {
    fn from(v: NaiveDate) -> Self {
        Self::Date(v)
    }
}

/// One source row, keyed by column name
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Row {
    values: BTreeMap<String, Value>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(column, value);
        self
    }

    pub fn set(&mut self, column: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(column.into(), value.into());
    }

    /// Value of `column`; absent columns read as null
    pub fn get(&self, column: &str) -> &Value {
        static NULL: Value = Value::Null;
        self.values.get(column).unwrap_or(&NULL)
    }

    pub fn contains(&self, column: &str) -> bool {
        self.values.contains_key(column)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl FromIterator<(String, Value)> for Row {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashSet;

    #[test]
    fn json_conversion_by_type() {
        assert_eq!(Value::from_json(&json!(7), &LogicalType::Int).unwrap(), Value::Int(7));
        assert_eq!(Value::from_json(&json!("12"), &LogicalType::Int).unwrap(), Value::Int(12));
        assert_eq!(
            Value::from_json(&json!("1200.00"), &LogicalType::Decimal { precision: None, scale: None }).unwrap(),
            Value::Decimal("1200.00".to_string())
        );
        assert_eq!(
            Value::from_json(&json!("2023-01-15"), &LogicalType::Date).unwrap(),
            Value::Date(NaiveDate::from_ymd_opt(2023, 1, 15).unwrap())
        );
        assert_eq!(Value::from_json(&json!(null), &LogicalType::Int).unwrap(), Value::Null);
        assert!(Value::from_json(&json!("abc"), &LogicalType::Int).is_err());
        assert!(Value::from_json(&json!(true), &LogicalType::Date).is_err());
    }

    #[test]
    fn decimal_number_keeps_its_scale() {
        let decimal = LogicalType::Decimal { precision: Some(10), scale: Some(2) };
        let number: serde_json::Value = serde_json::from_str("1200.00").unwrap();
        assert_eq!(
            Value::from_json(&number, &decimal).unwrap(),
            Value::Decimal("1200.00".to_string())
        );

        let row: serde_json::Value = serde_json::from_str(r#"{"Amount": 0.10}"#).unwrap();
        assert_eq!(
            Value::from_json(&row["Amount"], &decimal).unwrap(),
            Value::Decimal("0.10".to_string())
        );
    }

    #[test]
    fn timestamps_parse_in_common_forms() {
        let a = Value::from_json(&json!("2023-01-15T10:30:00"), &LogicalType::Timestamp).unwrap();
        let b = Value::from_json(&json!("2023-01-15 10:30:00"), &LogicalType::Timestamp).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn fits_column_types() {
        assert!(Value::Int(1).fits(&LogicalType::Decimal { precision: None, scale: None }));
        assert!(Value::Null.fits(&LogicalType::Date));
        assert!(Value::Text("x".into()).fits(&LogicalType::Unknown));
        assert!(!Value::Text("x".into()).fits(&LogicalType::Int));
        assert!(!Value::Float(1.5).fits(&LogicalType::Int));
    }

    #[test]
    fn values_are_hashable() {
        let mut seen = HashSet::new();
        assert!(seen.insert(("DimProduct".to_string(), Value::Int(1001))));
        assert!(!seen.insert(("DimProduct".to_string(), Value::Int(1001))));
        assert!(seen.insert(("DimProduct".to_string(), Value::Text("1001".into()))));
        assert!(seen.insert(("X".to_string(), Value::Float(0.5))));
        assert!(!seen.insert(("X".to_string(), Value::Float(0.5))));
    }

    #[test]
    fn missing_row_columns_read_as_null() {
        let row = Row::new().with("A", 1i64);
        assert_eq!(row.get("A"), &Value::Int(1));
        assert!(row.get("B").is_null());
        assert!(!row.contains("B"));
    }

    #[test]
    fn serializes_to_plain_json() {
        let row = Row::new()
            .with("Amount", Value::Decimal("1200.00".into()))
            .with("Day", NaiveDate::from_ymd_opt(2023, 1, 15).unwrap())
            .with("Qty", 1i64)
            .with("Gone", Value::Null);
        let json = serde_json::to_value(&row).unwrap();
        assert_eq!(
            json,
            json!({"Amount": "1200.00", "Day": "2023-01-15", "Gone": null, "Qty": 1})
        );
    }
}
