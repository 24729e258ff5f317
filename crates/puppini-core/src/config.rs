//! Configuration schema (puppini.toml)

use crate::diagnostic::{Diagnostic, DiagnosticCode, Severity};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Default name of the bridge table
pub const DEFAULT_BRIDGE_TABLE: &str = "Puppini_Bridge";

/// SQL dialect configuration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DialectConfig {
    /// MySQL / MariaDB
    #[default]
    MySql,

    /// PostgreSQL SQL dialect
    Postgres,

    /// Generic ANSI SQL
    Ansi,
}

impl std::str::FromStr for DialectConfig {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mysql" | "mariadb" => Ok(Self::MySql),
            "postgres" | "postgresql" => Ok(Self::Postgres),
            "ansi" => Ok(Self::Ansi),
            other => Err(ConfigError::ParseError(format!("unknown dialect '{}'", other))),
        }
    }
}

/// Severity threshold overrides for specific diagnostic codes
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SeverityThreshold {
    /// Map of diagnostic code to severity override
    #[serde(default)]
    pub overrides: HashMap<String, Severity>,
}

impl SeverityThreshold {
    /// Get severity for a diagnostic code, or default
    pub fn get_severity(&self, code: DiagnosticCode, default: Severity) -> Severity {
        self.overrides
            .get(code.as_str())
            .copied()
            .unwrap_or(default)
    }

    /// Set severity override for a code
    pub fn set_override(&mut self, code: DiagnosticCode, severity: Severity) {
        self.overrides.insert(code.as_str().to_string(), severity);
    }

    /// Rewrite a diagnostic's severity according to the overrides
    pub fn apply(&self, mut diagnostic: Diagnostic) -> Diagnostic {
        diagnostic.severity = self.get_severity(diagnostic.code, diagnostic.severity);
        diagnostic
    }
}

/// Database connection configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Backend type (postgres)
    #[serde(rename = "type")]
    pub connection_type: String,

    /// Connection settings (backend-specific)
    #[serde(flatten)]
    pub settings: HashMap<String, String>,
}

impl ConnectionConfig {
    /// Setting value, if present
    pub fn get(&self, key: &str) -> Option<&str> {
        self.settings.get(key).map(String::as_str)
    }
}

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Name of the bridge table to create and populate
    #[serde(default = "default_bridge_table")]
    pub bridge_table: String,

    /// SQL dialect; follows the connection backend when unset
    #[serde(default)]
    pub dialect: Option<DialectConfig>,

    /// JSON catalog fixture to read instead of a live database
    #[serde(default)]
    pub catalog_file: Option<PathBuf>,

    /// Tables never treated as sources (simple `*` globs)
    #[serde(default)]
    pub exclude_tables: Vec<String>,

    /// Live database connection
    #[serde(default)]
    pub connection: Option<ConnectionConfig>,

    /// Severity thresholds
    #[serde(default)]
    pub severity: SeverityThreshold,

    /// Project root path (for resolving relative paths)
    #[serde(skip)]
    pub project_root: PathBuf,
}

fn default_bridge_table() -> String {
    DEFAULT_BRIDGE_TABLE.to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bridge_table: default_bridge_table(),
            dialect: None,
            catalog_file: None,
            exclude_tables: Vec::new(),
            connection: None,
            severity: SeverityThreshold::default(),
            project_root: std::env::current_dir().unwrap_or_default(),
        }
    }
}

impl Config {
    /// Load config from TOML file
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::IoError(e.to_string()))?;

        let mut config: Config = toml::from_str(&contents)
            .map_err(|e| ConfigError::ParseError(e.to_string()))?;

        // Set project root to parent of config file
        if let Some(parent) = path.parent() {
            config.project_root = parent.to_path_buf();
        }

        Ok(config)
    }

    /// Load config from TOML string
    pub fn from_toml(toml: &str) -> Result<Self, ConfigError> {
        toml::from_str(toml)
            .map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Save config to TOML file
    pub fn save_to_file(&self, path: &std::path::Path) -> Result<(), ConfigError> {
        let toml = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        std::fs::write(path, toml)
            .map_err(|e| ConfigError::IoError(e.to_string()))?;

        Ok(())
    }

    /// Dialect to render with: the explicit one, else the connection backend's, else MySQL
    pub fn effective_dialect(&self) -> DialectConfig {
        self.dialect.unwrap_or_else(|| {
            self.connection
                .as_ref()
                .and_then(|connection| connection.connection_type.parse().ok())
                .unwrap_or_default()
        })
    }

    /// Catalog fixture path resolved against the project root
    pub fn resolved_catalog_file(&self) -> Option<PathBuf> {
        self.catalog_file.as_ref().map(|p| {
            if p.is_relative() {
                self.project_root.join(p)
            } else {
                p.clone()
            }
        })
    }

    /// Whether `table` is excluded from the source set
    pub fn is_table_excluded(&self, table: &str) -> bool {
        self.exclude_tables.iter().any(|pattern| glob_match(pattern, table))
    }
}

/// Simple glob matching (supports a single `*`)
pub fn glob_match(pattern: &str, text: &str) -> bool {
    if pattern == "*" || pattern == "**" {
        return true;
    }

    if let Some(star_pos) = pattern.find('*') {
        let prefix = &pattern[..star_pos];
        let suffix = &pattern[star_pos + 1..];

        text.len() >= prefix.len() + suffix.len()
            && text.starts_with(prefix)
            && text.ends_with(suffix)
    } else {
        pattern == text
    }
}

/// Config error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Serialize error: {0}")]
    SerializeError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = Config::default();
        assert_eq!(config.effective_dialect(), DialectConfig::MySql);
        assert_eq!(config.bridge_table, "Puppini_Bridge");
        assert!(config.connection.is_none());
    }

    #[test]
    fn parse_full_config() {
        let config = Config::from_toml(
            r#"
            bridge_table = "Bridge"
            dialect = "postgres"
            exclude_tables = ["tmp_*", "audit_log"]

            [connection]
            type = "postgres"
            host = "localhost"
            dbname = "warehouse"

            [severity.overrides]
            DANGLING_REFERENCE = "error"
            "#,
        )
        .unwrap();

        assert_eq!(config.bridge_table, "Bridge");
        assert_eq!(config.dialect, Some(DialectConfig::Postgres));
        let connection = config.connection.as_ref().unwrap();
        assert_eq!(connection.connection_type, "postgres");
        assert_eq!(connection.get("dbname"), Some("warehouse"));
        assert!(config.is_table_excluded("tmp_orders"));
        assert!(config.is_table_excluded("audit_log"));
        assert!(!config.is_table_excluded("FactSales"));
        assert_eq!(
            config.severity.get_severity(DiagnosticCode::DanglingReference, Severity::Warn),
            Severity::Error
        );
    }

    #[test]
    fn severity_override_applies() {
        let mut threshold = SeverityThreshold::default();
        threshold.set_override(DiagnosticCode::UnresolvedKey, Severity::Info);

        let diag = threshold.apply(Diagnostic::of(DiagnosticCode::UnresolvedKey, "no key"));
        assert_eq!(diag.severity, Severity::Info);

        let untouched = threshold.apply(Diagnostic::of(DiagnosticCode::RowSkipped, "bad"));
        assert_eq!(untouched.severity, Severity::Error);
    }

    #[test]
    fn dialect_from_str() {
        assert_eq!("MySQL".parse::<DialectConfig>().unwrap(), DialectConfig::MySql);
        assert_eq!("postgresql".parse::<DialectConfig>().unwrap(), DialectConfig::Postgres);
        assert!("oracle".parse::<DialectConfig>().is_err());
    }

    #[test]
    fn dialect_follows_connection_unless_set() {
        let inferred = Config::from_toml(
            r#"
            [connection]
            type = "postgresql"
            host = "localhost"
            "#,
        )
        .unwrap();
        assert_eq!(inferred.dialect, None);
        assert_eq!(inferred.effective_dialect(), DialectConfig::Postgres);

        let explicit = Config::from_toml(
            r#"
            dialect = "ansi"

            [connection]
            type = "postgres"
            "#,
        )
        .unwrap();
        assert_eq!(explicit.effective_dialect(), DialectConfig::Ansi);

        let unknown_backend = Config::from_toml(
            r#"
            [connection]
            type = "sqlite"
            "#,
        )
        .unwrap();
        assert_eq!(unknown_backend.effective_dialect(), DialectConfig::MySql);
    }

    #[test]
    fn config_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("puppini.toml");

        let mut config = Config::default();
        config.catalog_file = Some(PathBuf::from("catalog.json"));
        config.save_to_file(&path).unwrap();

        let loaded = Config::from_file(&path).unwrap();
        assert_eq!(loaded.bridge_table, config.bridge_table);
        assert_eq!(loaded.resolved_catalog_file(), Some(dir.path().join("catalog.json")));
    }

    #[test]
    fn glob_matching() {
        assert!(glob_match("*", "anything"));
        assert!(glob_match("stg_*", "stg_users"));
        assert!(glob_match("*_bak", "orders_bak"));
        assert!(!glob_match("stg_*", "prod_users"));
        assert!(!glob_match("ab*ba", "aba"));
    }
}
