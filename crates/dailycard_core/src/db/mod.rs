//! Connection bootstrap and `card` schema migrations.
//!
//! Repositories only accept connections returned from here (or ones
//! migrated to the same `PRAGMA user_version`).

pub mod migrations;
mod open;

pub use open::{open_db, open_db_in_memory};
