//! Diagnostic codes and build issue reporting
//!
//! IMPORTANT: Diagnostic codes are versioned and stable.
//! NEVER rename or remove codes - they appear in saved build reports.
//! Add new codes with new names only.

use serde::{Deserialize, Serialize};

/// Diagnostic code registry (v1)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiagnosticCode {
    // Schema analysis (1xxx)
    /// Table has no usable single-column primary key
    UnresolvedKey,

    /// Foreign key points at a table outside the catalog
    UnknownReferencedTable,

    /// Foreign keys form a cycle; closure walks stop at rows already visited
    ForeignKeyCycle,

    // Closure walk (2xxx)
    /// A referenced row could not be found; that branch of the walk stops
    DanglingReference,

    // Row production (3xxx)
    /// A source row could not be assembled and was skipped
    RowSkipped,

    /// A bridge row could not be rendered or written and was skipped
    EmissionFailed,

    /// A measure cell shared with another table did not fit the column and was left empty
    MeasureCellDropped,

    // General (9xxx)
    /// General informational message
    Info,

    /// General warning message
    Warning,
}

impl DiagnosticCode {
    /// Get the diagnostic code as a stable string identifier
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UnresolvedKey => "UNRESOLVED_KEY",
            Self::UnknownReferencedTable => "UNKNOWN_REFERENCED_TABLE",
            Self::ForeignKeyCycle => "FOREIGN_KEY_CYCLE",
            Self::DanglingReference => "DANGLING_REFERENCE",
            Self::RowSkipped => "ROW_SKIPPED",
            Self::EmissionFailed => "EMISSION_FAILED",
            Self::MeasureCellDropped => "MEASURE_CELL_DROPPED",
            Self::Info => "INFO",
            Self::Warning => "WARNING",
        }
    }

    /// Severity used when no override is configured
    pub fn default_severity(&self) -> Severity {
        match self {
            Self::RowSkipped | Self::EmissionFailed => Severity::Error,
            Self::Info | Self::ForeignKeyCycle => Severity::Info,
            _ => Severity::Warn,
        }
    }
}

impl std::fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Diagnostic severity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Informational message
    Info,

    /// Warning - recovered locally, output still produced
    Warn,

    /// Error - something was dropped from the output
    Error,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Info => write!(f, "info"),
            Self::Warn => write!(f, "warn"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Where in the source data a diagnostic was raised
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    /// Source table
    pub table: String,

    /// Zero-based row position within the table scan
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub row: Option<usize>,

    /// Column involved, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<String>,
}

impl Location {
    /// Create a table-level location
    pub fn table(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            row: None,
            column: None,
        }
    }

    /// Create a row-level location
    pub fn row(table: impl Into<String>, row: usize) -> Self {
        Self {
            table: table.into(),
            row: Some(row),
            column: None,
        }
    }

    /// Attach a column
    pub fn with_column(mut self, column: impl Into<String>) -> Self {
        self.column = Some(column.into());
        self
    }
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.table)?;
        if let Some(row) = self.row {
            write!(f, "[row {}]", row + 1)?;
        }
        if let Some(column) = &self.column {
            write!(f, ".{}", column)?;
        }
        Ok(())
    }
}

/// A diagnostic message with structured metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Stable diagnostic code
    pub code: DiagnosticCode,

    /// Severity level
    pub severity: Severity,

    /// Human-readable message
    pub message: String,

    /// Source location (best-effort)
    pub location: Option<Location>,

    /// Extra detail, e.g. the values involved
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl Diagnostic {
    /// Create a new diagnostic with minimal fields
    pub fn new(code: DiagnosticCode, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            code,
            severity,
            message: message.into(),
            location: None,
            detail: None,
        }
    }

    /// Create a diagnostic at the code's default severity
    pub fn of(code: DiagnosticCode, message: impl Into<String>) -> Self {
        Self::new(code, code.default_severity(), message)
    }

    /// Set the location
    pub fn with_location(mut self, location: Location) -> Self {
        self.location = Some(location);
        self
    }

    /// Set extra detail
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}: {}", self.severity, self.code, self.message)?;
        if let Some(location) = &self.location {
            write!(f, " ({})", location)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diagnostic_code_stability() {
        assert_eq!(DiagnosticCode::UnresolvedKey.as_str(), "UNRESOLVED_KEY");
        assert_eq!(DiagnosticCode::DanglingReference.as_str(), "DANGLING_REFERENCE");
        assert_eq!(DiagnosticCode::RowSkipped.as_str(), "ROW_SKIPPED");
        assert_eq!(DiagnosticCode::ForeignKeyCycle.as_str(), "FOREIGN_KEY_CYCLE");
        assert_eq!(DiagnosticCode::MeasureCellDropped.as_str(), "MEASURE_CELL_DROPPED");
    }

    #[test]
    fn default_severities() {
        assert_eq!(DiagnosticCode::UnresolvedKey.default_severity(), Severity::Warn);
        assert_eq!(DiagnosticCode::DanglingReference.default_severity(), Severity::Warn);
        assert_eq!(DiagnosticCode::RowSkipped.default_severity(), Severity::Error);
        assert_eq!(DiagnosticCode::ForeignKeyCycle.default_severity(), Severity::Info);
        assert_eq!(DiagnosticCode::MeasureCellDropped.default_severity(), Severity::Warn);
    }

    #[test]
    fn diagnostic_serialization() {
        let diag = Diagnostic::of(DiagnosticCode::DanglingReference, "DimStore row 999 not found")
            .with_location(Location::row("FactSales", 3).with_column("StoreKey"));

        let json = serde_json::to_string(&diag).unwrap();
        assert!(json.contains("DANGLING_REFERENCE"));
        assert!(json.contains("\"warn\""));
        assert!(json.contains("StoreKey"));
    }

    #[test]
    fn display_includes_location() {
        let diag = Diagnostic::of(DiagnosticCode::RowSkipped, "bad value")
            .with_location(Location::row("FactSales", 0));
        assert_eq!(diag.to_string(), "[error] ROW_SKIPPED: bad value (FactSales[row 1])");
    }
}
