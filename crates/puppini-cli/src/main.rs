use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::{Path, PathBuf};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use puppini_bridge::{
    analyze_foreign_keys, build_bridge_rows, schema_diagnostics, synthesize_bridge_schema,
    BridgeSchema,
};
use puppini_catalog::{
    load_catalog, CatalogProvider, LoadOptions, MockCatalog, PostgresCatalog, StatementExecutor,
};
use puppini_core::{
    BuildReport, Catalog, Config, ConnectionConfig, Diagnostic, DiagnosticCode, DialectConfig,
    Location, Severity,
};
use puppini_sql::{
    create_bridge_table, drop_bridge_table, drop_foreign_keys, insert_bridge_row,
    source_key_changes, Dialect, RenderError,
};

/// Default config file looked up in the working directory
const CONFIG_FILE: &str = "puppini.toml";

/// Puppini - factless bridge tables for star and snowflake schemas
#[derive(Parser)]
#[command(name = "puppini")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to config file (default: puppini.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// JSON catalog fixture to use instead of a database connection
    #[arg(long, global = true)]
    catalog: Option<PathBuf>,

    /// Name of the bridge table
    #[arg(short, long, global = true)]
    bridge_name: Option<String>,

    /// SQL dialect (mysql, postgres, ansi)
    #[arg(short, long, global = true)]
    dialect: Option<String>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the bridge table and add PBK_ key columns to the source tables
    Create {
        /// Print the statements instead of executing them
        #[arg(long)]
        to_sql: bool,
    },

    /// Fill the bridge table, one row per source row
    Populate {
        /// Print INSERT statements instead of executing them
        #[arg(long)]
        to_sql: bool,

        /// Write the build report (JSON) to this file
        #[arg(short, long)]
        report: Option<PathBuf>,
    },

    /// Drop every foreign-key constraint of the source tables
    RemoveFks {
        /// Print the statements instead of executing them
        #[arg(long)]
        to_sql: bool,
    },

    /// Print the named foreign keys of the source tables as JSON
    AnalyzeFks,

    /// Print the bridge schema and its fingerprint as JSON
    Describe,
}

/// Where source structure and rows come from
enum Source {
    Fixture(MockCatalog),
    Postgres(PostgresCatalog),
}

impl Source {
    fn provider(&self) -> &dyn CatalogProvider {
        match self {
            Self::Fixture(catalog) => catalog,
            Self::Postgres(catalog) => catalog,
        }
    }

    fn executor(&self) -> &dyn StatementExecutor {
        match self {
            Self::Fixture(catalog) => catalog,
            Self::Postgres(catalog) => catalog,
        }
    }

    fn is_fixture(&self) -> bool {
        matches!(self, Self::Fixture(_))
    }

    /// Dialect the live database speaks; fixtures accept any
    fn native_dialect(&self) -> Option<Dialect> {
        match self {
            Self::Fixture(_) => None,
            Self::Postgres(_) => Some(Dialect::Postgres),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    dotenvy::dotenv().ok();
    init_tracing(cli.verbose);

    let config = resolve_config(&cli)?;

    if cli.verbose {
        eprintln!(
            "{} bridge table {} ({:?} dialect)",
            "Using".cyan(),
            config.bridge_table,
            config.effective_dialect()
        );
    }

    match cli.command {
        Commands::Create { to_sql } => create_command(&config, to_sql, cli.verbose).await,
        Commands::Populate { to_sql, report } => {
            populate_command(&config, to_sql, report.as_deref(), cli.verbose).await
        }
        Commands::RemoveFks { to_sql } => remove_fks_command(&config, to_sql, cli.verbose).await,
        Commands::AnalyzeFks => analyze_fks_command(&config, cli.verbose).await,
        Commands::Describe => describe_command(&config, cli.verbose).await,
    }
}

/// Log to stderr; `RUST_LOG` wins over `--verbose`
fn init_tracing(verbose: bool) {
    let default_level = if verbose { "info" } else { "warn" };
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .init();
}

/// Config file, then command-line overrides
fn resolve_config(cli: &Cli) -> Result<Config> {
    let mut config = if let Some(config_path) = &cli.config {
        Config::from_file(config_path)?
    } else if Path::new(CONFIG_FILE).exists() {
        Config::from_file(Path::new(CONFIG_FILE))?
    } else {
        if cli.verbose {
            eprintln!("{}", "No config file found, using defaults".yellow());
        }
        Config::default()
    };

    if let Some(catalog) = &cli.catalog {
        config.catalog_file = Some(std::env::current_dir()?.join(catalog));
    }
    if let Some(bridge_name) = &cli.bridge_name {
        config.bridge_table = bridge_name.clone();
    }
    if let Some(dialect) = &cli.dialect {
        config.dialect = Some(dialect.parse::<DialectConfig>()?);
    }

    if let Some(connection) = config.connection.as_mut() {
        apply_env_password(connection, std::env::var("PGPASSWORD").ok());
    }

    Ok(config)
}

/// Fill in a missing password, e.g. from `PGPASSWORD` in `.env`
fn apply_env_password(connection: &mut ConnectionConfig, password: Option<String>) {
    if connection.get("password").is_some() || connection.get("url").is_some() {
        return;
    }
    if let Some(password) = password {
        connection.settings.insert("password".to_string(), password);
    }
}

async fn open_source(config: &Config, verbose: bool) -> Result<Source> {
    if let Some(path) = config.resolved_catalog_file() {
        if verbose {
            eprintln!("{} {}", "Loading catalog fixture from:".cyan(), path.display());
        }
        return Ok(Source::Fixture(MockCatalog::from_json_file(&path)?));
    }

    let connection = config.connection.as_ref().ok_or_else(|| {
        anyhow::anyhow!(
            "No catalog source configured. Pass --catalog <fixture.json> or add a \
             [connection] section to {}.",
            CONFIG_FILE
        )
    })?;

    if verbose {
        eprintln!("{} {}...", "Connecting to".cyan(), connection.connection_type);
    }

    let catalog = PostgresCatalog::from_config(connection).await?;
    catalog.test_connection().await?;
    Ok(Source::Postgres(catalog))
}

/// Refuse to run statements rendered for another database
fn ensure_dialect(native: Option<Dialect>, dialect: Dialect) -> Result<()> {
    match native {
        Some(native) if native != dialect => anyhow::bail!(
            "The connection is {} but statements are rendered as {}. \
             Pass --dialect {} or drop the dialect setting.",
            native.name(),
            dialect.name(),
            native.name()
        ),
        _ => Ok(()),
    }
}

/// Open the source and snapshot its structure
async fn load(config: &Config, verbose: bool) -> Result<(Source, Catalog)> {
    let source = open_source(config, verbose).await?;
    let catalog = load_catalog(source.provider(), &LoadOptions::from(config)).await?;

    if verbose {
        eprintln!("{} {} source tables", "Loaded".cyan(), catalog.len());
    }
    Ok((source, catalog))
}

/// Create command - bridge DDL plus source key columns
async fn create_command(config: &Config, to_sql: bool, verbose: bool) -> Result<()> {
    let (source, catalog) = load(config, verbose).await?;
    let schema = synthesize_bridge_schema(&catalog);
    let dialect = Dialect::from(config.effective_dialect());
    print_schema_diagnostics(&catalog, config);

    let create = match create_bridge_table(dialect, &config.bridge_table, &schema) {
        Ok(sql) => Some(sql),
        Err(e) => {
            eprintln!("{} {}", "Skipping CREATE TABLE:".yellow(), e);
            None
        }
    };
    let changes = source_key_changes(dialect, &catalog);

    if to_sql {
        if let Some(create) = &create {
            println!("{};", create);
        }
        for change in &changes {
            println!();
            println!("-- {}", change.table);
            for statement in change.statements() {
                println!("{};", statement);
            }
        }
        return Ok(());
    }

    ensure_dialect(source.native_dialect(), dialect)?;
    let mut statements = Vec::new();
    if let Some(create) = create {
        statements.push(drop_bridge_table(dialect, &config.bridge_table));
        statements.push(create);
    }
    for change in &changes {
        statements.extend(change.statements().iter().map(|s| s.to_string()));
    }

    source.executor().execute_batch(&statements).await?;

    eprintln!(
        "{} {} with {} key and {} measure columns; key columns added to {} source tables",
        "Created".green().bold(),
        config.bridge_table,
        schema.key_columns().count(),
        schema.measure_columns().count(),
        changes.len()
    );
    note_fixture_execution(&source);
    Ok(())
}

/// Populate command - one INSERT per bridge row
async fn populate_command(
    config: &Config,
    to_sql: bool,
    report_path: Option<&Path>,
    verbose: bool,
) -> Result<()> {
    let (source, catalog) = load(config, verbose).await?;
    let (statements, report) = populate(&source, &catalog, config, to_sql).await?;

    if to_sql {
        for statement in &statements {
            println!("{};", statement);
        }
    }

    if let Some(path) = report_path {
        report.save_to_file(path)?;
        if verbose {
            eprintln!("{} {}", "Report saved to:".green(), path.display());
        }
    }

    print_report_summary(&report);
    if !to_sql {
        note_fixture_execution(&source);
    }

    if report.has_errors() {
        std::process::exit(1);
    }

    Ok(())
}

/// Render every bridge row, then run the INSERTs as one batch unless `to_sql`
///
/// A build that fails part way leaves the bridge table untouched.
async fn populate(
    source: &Source,
    catalog: &Catalog,
    config: &Config,
    to_sql: bool,
) -> Result<(Vec<String>, BuildReport)> {
    let schema = synthesize_bridge_schema(catalog);
    if schema.len() <= 1 {
        return Err(RenderError::EmptySchema {
            table: config.bridge_table.clone(),
        }
        .into());
    }

    let dialect = Dialect::from(config.effective_dialect());
    if !to_sql {
        ensure_dialect(source.native_dialect(), dialect)?;
    }

    let mut rows =
        build_bridge_rows(source.provider(), catalog, &schema).with_severity(config.severity.clone());
    let mut statements = Vec::new();

    while let Some(row) = rows.next_row().await? {
        match insert_bridge_row(dialect, &config.bridge_table, &schema, &row) {
            Ok(sql) => statements.push(sql),
            Err(e) => {
                tracing::warn!(stage = %row.stage(), error = %e, "bridge row not written");
                let diagnostic = config.severity.apply(
                    Diagnostic::of(DiagnosticCode::EmissionFailed, e.to_string())
                        .with_location(Location::table(row.stage())),
                );
                rows.report_mut().demote_emitted(diagnostic);
            }
        }
    }

    if !to_sql && !statements.is_empty() {
        source.executor().execute_batch(&statements).await?;
    }

    let report = rows
        .into_report()
        .with_bridge(config.bridge_table.clone(), schema.fingerprint());
    Ok((statements, report))
}

/// Remove-fks command - drop every named foreign key
async fn remove_fks_command(config: &Config, to_sql: bool, verbose: bool) -> Result<()> {
    let source = open_source(config, verbose).await?;
    let analysis = analyze_foreign_keys(source.provider(), &LoadOptions::from(config)).await?;
    let dialect = Dialect::from(config.effective_dialect());
    let statements = drop_foreign_keys(dialect, &analysis);

    if to_sql {
        for statement in &statements {
            println!("{};", statement);
        }
        return Ok(());
    }

    ensure_dialect(source.native_dialect(), dialect)?;
    source.executor().execute_batch(&statements).await?;
    eprintln!(
        "{} {} foreign-key constraints",
        "Dropped".green().bold(),
        statements.len()
    );
    note_fixture_execution(&source);
    Ok(())
}

/// Analyze-fks command
async fn analyze_fks_command(config: &Config, verbose: bool) -> Result<()> {
    let source = open_source(config, verbose).await?;
    let analysis = analyze_foreign_keys(source.provider(), &LoadOptions::from(config)).await?;
    println!("{}", serde_json::to_string_pretty(&analysis)?);
    Ok(())
}

/// Describe command
async fn describe_command(config: &Config, verbose: bool) -> Result<()> {
    let (_source, catalog) = load(config, verbose).await?;
    let schema = synthesize_bridge_schema(&catalog);
    print_schema_diagnostics(&catalog, config);
    println!("{}", serde_json::to_string_pretty(&describe_json(config, &schema))?);
    Ok(())
}

fn describe_json(config: &Config, schema: &BridgeSchema) -> serde_json::Value {
    let key_columns: Vec<&str> = schema.key_columns().map(|c| c.name.as_str()).collect();
    let measure_columns: Vec<&str> = schema.measure_columns().map(|c| c.name.as_str()).collect();
    serde_json::json!({
        "bridge_table": config.bridge_table,
        "dialect": Dialect::from(config.effective_dialect()).name(),
        "fingerprint": schema.fingerprint(),
        "key_columns": key_columns,
        "measure_columns": measure_columns,
        "columns": schema.columns(),
    })
}

fn print_schema_diagnostics(catalog: &Catalog, config: &Config) {
    for diagnostic in schema_diagnostics(catalog) {
        print_diagnostic(&config.severity.apply(diagnostic));
    }
}

fn print_diagnostic(diag: &Diagnostic) {
    let severity_str = match diag.severity {
        Severity::Error => "ERROR".red().bold(),
        Severity::Warn => "WARN".yellow().bold(),
        Severity::Info => "INFO".cyan(),
    };

    eprintln!("  [{}] {}: {}", severity_str, diag.code, diag.message);
    if let Some(loc) = &diag.location {
        eprintln!("    at {}", loc);
    }
    if let Some(detail) = &diag.detail {
        eprintln!("    {}", detail.dimmed());
    }
}

/// Summary goes to stderr so `--to-sql` output stays clean
fn print_report_summary(report: &BuildReport) {
    eprintln!("\n{}", "=".repeat(60).bright_blue());
    eprintln!("{}", "Puppini Bridge Build Report".bold().bright_blue());
    eprintln!("{}", "=".repeat(60).bright_blue());

    if let Some(fingerprint) = &report.schema_fingerprint {
        eprintln!("Schema fingerprint: {}", fingerprint);
    }
    eprintln!();

    eprintln!("{}", "Summary:".bold());
    eprintln!("  Tables scanned: {}", report.summary.tables_scanned);
    eprintln!("  Rows emitted:   {}", report.summary.rows_emitted.to_string().green());

    if report.summary.rows_skipped > 0 {
        eprintln!("  Rows skipped:   {}", report.summary.rows_skipped.to_string().red().bold());
    } else {
        eprintln!("  Rows skipped:   {}", report.summary.rows_skipped.to_string().green());
    }

    if report.summary.warnings > 0 {
        eprintln!("  Warnings:       {}", report.summary.warnings.to_string().yellow());
    } else {
        eprintln!("  Warnings:       {}", report.summary.warnings.to_string().green());
    }
    eprintln!();

    if report.diagnostics.is_empty() {
        eprintln!("{}", "✓ No issues found!".green().bold());
    } else {
        eprintln!("{}", "Diagnostics:".bold());
        for diag in &report.diagnostics {
            print_diagnostic(diag);
        }
    }
}

fn note_fixture_execution(source: &Source) {
    if source.is_fixture() {
        eprintln!(
            "{}",
            "Catalog fixture in use: statements were applied in memory only.".dimmed()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use puppini_catalog::{CatalogError, MockTable};
    use puppini_core::LogicalType;
    use std::collections::HashMap;

    fn retail_config() -> Config {
        let fixture = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../demos/retail_catalog.json");
        Config {
            catalog_file: Some(fixture),
            ..Config::default()
        }
    }

    fn cli(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("puppini").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn flags_override_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("puppini.toml");
        std::fs::write(
            &path,
            "bridge_table = \"Bridge_From_File\"\ndialect = \"mysql\"\ncatalog_file = \"retail.json\"\n",
        )
        .unwrap();
        let config_arg = path.to_str().unwrap();

        let from_file = resolve_config(&cli(&["--config", config_arg, "describe"])).unwrap();
        assert_eq!(from_file.bridge_table, "Bridge_From_File");
        assert_eq!(from_file.resolved_catalog_file(), Some(dir.path().join("retail.json")));

        let overridden = resolve_config(&cli(&[
            "--config",
            config_arg,
            "--bridge-name",
            "Other_Bridge",
            "--dialect",
            "postgres",
            "populate",
            "--to-sql",
        ]))
        .unwrap();
        assert_eq!(overridden.bridge_table, "Other_Bridge");
        assert_eq!(overridden.dialect, Some(DialectConfig::Postgres));
    }

    #[test]
    fn dialect_follows_postgres_connection() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("puppini.toml");
        std::fs::write(&path, "[connection]\ntype = \"postgres\"\nhost = \"localhost\"\n").unwrap();

        let config = resolve_config(&cli(&["--config", path.to_str().unwrap(), "describe"])).unwrap();
        assert_eq!(config.dialect, None);
        assert_eq!(Dialect::from(config.effective_dialect()), Dialect::Postgres);
    }

    #[test]
    fn live_connection_rejects_foreign_dialect() {
        assert!(ensure_dialect(Some(Dialect::Postgres), Dialect::MySql).is_err());
        assert!(ensure_dialect(Some(Dialect::Postgres), Dialect::Postgres).is_ok());
        assert!(ensure_dialect(None, Dialect::MySql).is_ok());
    }

    #[test]
    fn unknown_dialect_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("puppini.toml");
        std::fs::write(&path, "").unwrap();

        let result = resolve_config(&cli(&[
            "--config",
            path.to_str().unwrap(),
            "--dialect",
            "oracle",
            "describe",
        ]));
        assert!(result.is_err());
    }

    #[test]
    fn env_password_only_fills_gaps() {
        let mut connection = ConnectionConfig {
            connection_type: "postgres".to_string(),
            settings: HashMap::from([("dbname".to_string(), "retail".to_string())]),
        };
        apply_env_password(&mut connection, Some("from-env".to_string()));
        assert_eq!(connection.get("password"), Some("from-env"));

        apply_env_password(&mut connection, Some("other".to_string()));
        assert_eq!(connection.get("password"), Some("from-env"));

        let mut with_url = ConnectionConfig {
            connection_type: "postgres".to_string(),
            settings: HashMap::from([("url".to_string(), "postgres://x".to_string())]),
        };
        apply_env_password(&mut with_url, Some("from-env".to_string()));
        assert_eq!(with_url.get("password"), None);
    }

    #[tokio::test]
    async fn describe_reports_fingerprint() {
        let config = retail_config();

        let (_source, catalog) = load(&config, false).await.unwrap();
        let schema = synthesize_bridge_schema(&catalog);
        let json = describe_json(&config, &schema);

        assert_eq!(json["bridge_table"], "Puppini_Bridge");
        assert_eq!(json["dialect"], "mysql");
        assert_eq!(json["fingerprint"], schema.fingerprint());
        assert_eq!(json["key_columns"][0], "PBK_DimGeography");
        assert_eq!(json["measure_columns"].as_array().unwrap().len(), schema.measure_columns().count());
        assert_eq!(json["columns"][0]["name"], "Stage");
    }

    #[tokio::test]
    async fn direct_create_runs_drop_create_and_backfill() {
        let config = retail_config();

        let (source, catalog) = load(&config, false).await.unwrap();
        let Source::Fixture(mock) = &source else {
            panic!("fixture source expected");
        };

        let schema = synthesize_bridge_schema(&catalog);
        let dialect = Dialect::from(config.effective_dialect());
        let mut statements = vec![
            drop_bridge_table(dialect, &config.bridge_table),
            create_bridge_table(dialect, &config.bridge_table, &schema).unwrap(),
        ];
        for change in source_key_changes(dialect, &catalog) {
            statements.extend(change.statements().iter().map(|s| s.to_string()));
        }
        source.executor().execute_batch(&statements).await.unwrap();

        let executed = mock.executed_statements().await;
        assert_eq!(executed.len(), 2 + 2 * catalog.len());
        assert!(executed[0].starts_with("DROP TABLE IF EXISTS `Puppini_Bridge`"));
        assert!(executed[2].starts_with("ALTER TABLE `FactSales` ADD COLUMN `PBK_FactSales`"));
    }

    #[tokio::test]
    async fn direct_populate_runs_inserts_as_one_batch() {
        let config = retail_config();
        let (source, catalog) = load(&config, false).await.unwrap();
        let Source::Fixture(mock) = &source else {
            panic!("fixture source expected");
        };

        let (statements, report) = populate(&source, &catalog, &config, false).await.unwrap();

        let executed = mock.executed_statements().await;
        assert_eq!(executed, statements);
        assert_eq!(executed.len(), report.summary.rows_emitted);
        assert!(executed.iter().all(|sql| sql.starts_with("INSERT INTO `Puppini_Bridge`")));
    }

    #[tokio::test]
    async fn failed_scan_leaves_bridge_untouched() {
        let config = retail_config();
        let (source, catalog) = load(&config, false).await.unwrap();
        let Source::Fixture(mock) = &source else {
            panic!("fixture source expected");
        };
        mock.add_error_for_table("DimStore", CatalogError::PermissionDenied("no".to_string()))
            .await;

        assert!(populate(&source, &catalog, &config, false).await.is_err());
        assert!(mock.executed_statements().await.is_empty());
    }

    #[tokio::test]
    async fn rejected_insert_fails_the_whole_batch() {
        let config = retail_config();
        let (source, catalog) = load(&config, false).await.unwrap();
        let Source::Fixture(mock) = &source else {
            panic!("fixture source expected");
        };
        mock.fail_statements_containing("'DimTime'").await;

        assert!(populate(&source, &catalog, &config, false).await.is_err());
        assert!(mock.executed_statements().await.is_empty());
    }

    #[tokio::test]
    async fn stage_only_schema_is_not_populated() {
        let mock = MockCatalog::from_tables(vec![
            MockTable::new("Notes").column("Body", LogicalType::String),
        ]);
        let catalog = load_catalog(&mock, &LoadOptions::default()).await.unwrap();
        let source = Source::Fixture(mock);

        let err = populate(&source, &catalog, &Config::default(), false).await.unwrap_err();
        assert!(err.to_string().contains("only have the Stage column"));

        let Source::Fixture(mock) = &source else {
            panic!("fixture source expected");
        };
        assert!(mock.executed_statements().await.is_empty());
    }
}
