//! Card note storage: CRUD and search over a SQLite `card` table, plus the
//! markdown renderer that derives each card's HTML.

pub mod db;
pub mod error;
pub mod logging;
pub mod model;
pub mod render;
pub mod repo;

pub use db::{open_db, open_db_in_memory};
pub use error::{RepoError, RepoResult};
pub use logging::{default_log_level, init_logging, logging_status, LogLevel, LoggingError};
pub use model::card::{Card, CardId, CardWarning, UpdateCardRequest};
pub use render::markdown_to_html;
pub use repo::card_repo::{CardListQuery, CardPage, CardRepository, SqliteCardRepository};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
