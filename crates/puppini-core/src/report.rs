//! Build report schema (stable v1)
//!
//! This schema is STABLE and VERSIONED.
//! Breaking changes require a new version.

use crate::diagnostic::{Diagnostic, Severity};
use serde::{Deserialize, Serialize};

/// Report schema version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportVersion {
    /// Major version (breaking changes)
    pub major: u32,

    /// Minor version (backward-compatible additions)
    pub minor: u32,
}

impl ReportVersion {
    /// Current report schema version
    pub const CURRENT: ReportVersion = ReportVersion { major: 1, minor: 0 };
}

impl std::fmt::Display for ReportVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// Summary statistics for a build
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportSummary {
    /// Total number of diagnostics
    pub total: usize,

    /// Number of errors
    pub errors: usize,

    /// Number of warnings
    pub warnings: usize,

    /// Number of info messages
    pub info: usize,

    /// Source tables whose rows were scanned
    pub tables_scanned: usize,

    /// Bridge rows produced
    pub rows_emitted: usize,

    /// Source rows dropped from the output
    pub rows_skipped: usize,
}

/// Outcome of one bridge build (report.json v1)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildReport {
    /// Schema version
    pub version: ReportVersion,

    /// Timestamp (ISO 8601)
    pub timestamp: String,

    /// Bridge table name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bridge_table: Option<String>,

    /// Fingerprint of the bridge schema the rows were built against
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_fingerprint: Option<String>,

    /// Summary statistics
    pub summary: ReportSummary,

    /// All diagnostics
    pub diagnostics: Vec<Diagnostic>,
}

impl BuildReport {
    /// Create a new empty report
    pub fn new() -> Self {
        Self {
            version: ReportVersion::CURRENT,
            timestamp: chrono::Utc::now().to_rfc3339(),
            bridge_table: None,
            schema_fingerprint: None,
            summary: ReportSummary::default(),
            diagnostics: Vec::new(),
        }
    }

    /// Create a report from diagnostics
    pub fn from_diagnostics(diagnostics: Vec<Diagnostic>) -> Self {
        let mut report = Self::new();
        report.extend(diagnostics);
        report
    }

    /// Set the bridge table the report describes
    pub fn with_bridge(mut self, table: impl Into<String>, fingerprint: impl Into<String>) -> Self {
        self.bridge_table = Some(table.into());
        self.schema_fingerprint = Some(fingerprint.into());
        self
    }

    /// Set the schema fingerprint the rows were built against
    pub fn with_fingerprint(mut self, fingerprint: impl Into<String>) -> Self {
        self.schema_fingerprint = Some(fingerprint.into());
        self
    }

    /// Add a diagnostic to the report
    pub fn add_diagnostic(&mut self, diagnostic: Diagnostic) {
        match diagnostic.severity {
            Severity::Error => self.summary.errors += 1,
            Severity::Warn => self.summary.warnings += 1,
            Severity::Info => self.summary.info += 1,
        }

        self.summary.total += 1;
        self.diagnostics.push(diagnostic);
    }

    /// Add several diagnostics
    pub fn extend(&mut self, diagnostics: impl IntoIterator<Item = Diagnostic>) {
        for diagnostic in diagnostics {
            self.add_diagnostic(diagnostic);
        }
    }

    /// Count one scanned source table
    pub fn record_table(&mut self) {
        self.summary.tables_scanned += 1;
    }

    /// Count one produced bridge row
    pub fn record_emitted(&mut self) {
        self.summary.rows_emitted += 1;
    }

    /// Count one dropped source row together with its reason
    pub fn record_skipped(&mut self, diagnostic: Diagnostic) {
        self.summary.rows_skipped += 1;
        self.add_diagnostic(diagnostic);
    }

    /// Move a row from emitted to skipped, e.g. when writing it failed
    pub fn demote_emitted(&mut self, diagnostic: Diagnostic) {
        self.summary.rows_emitted = self.summary.rows_emitted.saturating_sub(1);
        self.record_skipped(diagnostic);
    }

    /// Check if the report has any errors
    pub fn has_errors(&self) -> bool {
        self.summary.errors > 0
    }

    /// Serialize to JSON string
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Save to file
    pub fn save_to_file(&self, path: &std::path::Path) -> Result<(), std::io::Error> {
        let json = self.to_json()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
        std::fs::write(path, json)
    }
}

impl Default for BuildReport {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostic::{Diagnostic, DiagnosticCode};

    #[test]
    fn empty_report() {
        let report = BuildReport::new();
        assert_eq!(report.version, ReportVersion::CURRENT);
        assert_eq!(report.summary.total, 0);
        assert!(!report.has_errors());
    }

    #[test]
    fn report_with_diagnostics() {
        let diagnostics = vec![
            Diagnostic::of(DiagnosticCode::UnresolvedKey, "no key"),
            Diagnostic::of(DiagnosticCode::Info, "All good"),
        ];

        let report = BuildReport::from_diagnostics(diagnostics);
        assert_eq!(report.summary.total, 2);
        assert_eq!(report.summary.warnings, 1);
        assert_eq!(report.summary.info, 1);
        assert!(!report.has_errors());
    }

    #[test]
    fn row_counters() {
        let mut report = BuildReport::new();
        report.record_table();
        report.record_emitted();
        report.record_emitted();
        report.record_skipped(Diagnostic::of(DiagnosticCode::RowSkipped, "bad row"));
        report.demote_emitted(Diagnostic::of(DiagnosticCode::EmissionFailed, "insert failed"));

        assert_eq!(report.summary.tables_scanned, 1);
        assert_eq!(report.summary.rows_emitted, 1);
        assert_eq!(report.summary.rows_skipped, 2);
        assert_eq!(report.summary.errors, 2);
        assert!(report.has_errors());
    }

    #[test]
    fn report_serialization() {
        let report = BuildReport::new().with_bridge("Puppini_Bridge", "abc123");
        let json = report.to_json().unwrap();
        assert!(json.contains("\"version\""));
        assert!(json.contains("\"diagnostics\""));
        assert!(json.contains("Puppini_Bridge"));
    }
}
