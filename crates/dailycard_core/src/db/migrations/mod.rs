//! Card schema steps, keyed by `PRAGMA user_version`.
//!
//! Steps are listed oldest first. A database stamped with a version newer
//! than the last step is refused rather than written to.

use crate::error::{RepoError, RepoResult};
use log::{debug, info};
use rusqlite::Connection;

struct SchemaStep {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

const CARD_SCHEMA: &[SchemaStep] = &[SchemaStep {
    version: 1,
    name: "card_table",
    sql: include_str!("0001_card.sql"),
}];

/// Schema version a fully migrated card database reports.
pub fn latest_version() -> u32 {
    CARD_SCHEMA.last().map_or(0, |step| step.version)
}

/// Brings the card schema up to [`latest_version`] and returns how many
/// steps ran. An up-to-date database runs nothing and returns `0`.
pub fn apply_migrations(conn: &mut Connection) -> RepoResult<usize> {
    let from_version = current_user_version(conn)?;
    let latest_supported = latest_version();
    if from_version > latest_supported {
        return Err(RepoError::UnsupportedSchemaVersion {
            db_version: from_version,
            latest_supported,
        });
    }

    let pending: Vec<&SchemaStep> = CARD_SCHEMA
        .iter()
        .filter(|step| step.version > from_version)
        .collect();
    if pending.is_empty() {
        return Ok(0);
    }

    let tx = conn.transaction()?;
    for step in &pending {
        debug!(
            "event=db_migrate module=db status=step version={} name={}",
            step.version, step.name
        );
        tx.execute_batch(step.sql)?;
        tx.pragma_update(None, "user_version", step.version)?;
    }
    tx.commit()?;

    info!(
        "event=db_migrate module=db status=ok from_version={from_version} to_version={latest_supported} steps={}",
        pending.len()
    );
    Ok(pending.len())
}

/// Reads the schema version recorded on the connection.
pub fn current_user_version(conn: &Connection) -> rusqlite::Result<u32> {
    conn.query_row("PRAGMA user_version;", [], |row| row.get::<_, u32>(0))
}
