pub mod cell;
pub mod mounts;
pub mod query;

pub use cell::{ForeignKeyCell, ForeignKeyResolver, LoadOutcome, DEFAULT_RELATED_ROW_LIMIT, MAX_RELATED_ROW_LIMIT};
pub use mounts::CellMounts;
pub use query::{build_lookup_query, find_foreign_key, sql_literal};
