//! Domain model for card notes.
//!
//! # Invariants
//! - Every card is identified by a storage-assigned `CardId`.
//! - Deletion is a soft-delete tombstone (`deleted_at`), not a row removal.

pub mod card;
