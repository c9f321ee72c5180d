//! Catalog sinks
//!
//! The sink is where snapshots end up: `SqliteCatalogSink` for real runs and
//! `MemorySink` for dry runs and tests.

mod memory;
mod schema;
mod sqlite;
mod traits;

pub use memory::MemorySink;
pub use schema::{get_schema_version, initialize_schema, SCHEMA_SQL};
pub use sqlite::{RunRow, SqliteCatalogSink};
pub use traits::{CatalogSink, SinkError, SinkResult};
