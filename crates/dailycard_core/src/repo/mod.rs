//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define the card data-access contract consumed by request handlers.
//! - Isolate SQLite query details from callers.
//!
//! # Invariants
//! - Operations surface exactly one failure kind (`RepoError::Storage`);
//!   absence is reported as `None`/empty, never as an error.
//! - Soft-deleted cards are invisible to every read and write path.

pub mod card_repo;
