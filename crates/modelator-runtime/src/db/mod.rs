//! Database access for the health probe and the migration engines.

mod driver;

pub use driver::{connect_options, ConnectOptions, DatabaseConnection, DatabaseDriver, SqlxDriver};
