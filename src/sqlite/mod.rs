// SQLite module - the connection handle and everything that runs on it
//
// - config: open options and the database source
// - connection: handle, lifecycle (open/close/serialize), statement and script execution
// - coordinator: coalescing async batch transactions
// - sync_unit: native transactions/savepoints for synchronous units
// - executor: engine-side execution shared by the async and sync paths
// - functions: custom scalar functions registered on open
// - params: parameter validation and conversion
// - query: result extraction and building

pub mod config;
pub mod connection;
pub mod coordinator;
pub(crate) mod executor;
pub(crate) mod functions;
pub mod params;
pub mod prepared;
pub mod query;
pub mod sync_unit;

// Re-export the public API
pub use config::{DbSource, ScriptObserver, SqliteOptions, SqliteOptionsBuilder};
pub use connection::SqliteConnection;
pub use params::{Params, verify_param_types};
pub use prepared::SqlitePreparedStatement;
pub use query::build_result_set;
pub use sync_unit::SyncUnit;
