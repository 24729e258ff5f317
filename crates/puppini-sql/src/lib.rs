//! SQL text for Puppini bridge tables
//!
//! Renders the bridge DDL, one `INSERT` per bridge row, the `PBK_` key
//! columns added to source tables and the foreign-key drops, for MySQL,
//! PostgreSQL or plain ANSI SQL.

pub mod dialect;
pub mod error;
pub mod render;

pub use dialect::{Dialect, TEXT_COLUMN_WIDTH};
pub use error::RenderError;
pub use render::{
    create_bridge_table, drop_bridge_table, drop_foreign_keys, insert_bridge_row,
    source_key_changes, SourceKeyChange,
};
