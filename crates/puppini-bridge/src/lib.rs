//! Puppini bridge construction
//!
//! Derives a factless bridge table from a snowflake schema: one row per
//! source row, carrying `Stage`, the keys of every dimension reachable
//! through foreign keys, and the row's own measures.
//!
//! ## Example
//!
//! ```rust,ignore
//! use puppini_bridge::{build_bridge_rows, synthesize_bridge_schema};
//!
//! let catalog = load_catalog(&provider, &LoadOptions::default()).await?;
//! let schema = synthesize_bridge_schema(&catalog);
//! let mut rows = build_bridge_rows(&provider, &catalog, &schema);
//! while let Some(row) = rows.next_row().await? {
//!     println!("{}", row.stage());
//! }
//! let report = rows.into_report();
//! ```

pub mod abbrev;
pub mod analysis;
pub mod assemble;
pub mod closure;
pub mod error;
pub mod graph;
pub mod synth;

pub use abbrev::abbreviate;
pub use analysis::{analyze_foreign_keys, ForeignKeyAnalysis};
pub use assemble::{
    build_bridge_rows, collect_bridge_rows, AssembledRow, BridgeRow, BridgeRows, RowAssembler,
};
pub use closure::{Closure, ClosureResolver};
pub use error::{BridgeError, RowAssemblyError};
pub use graph::{FkEdge, ForeignKeyGraph};
pub use synth::{
    measure_column_name, schema_diagnostics, synthesize_bridge_schema, BridgeColumnSpec,
    BridgeSchema, ColumnRole, STAGE_COLUMN,
};
