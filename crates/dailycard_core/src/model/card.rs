//! Card domain model.
//!
//! # Invariants
//! - `id` is assigned by storage on insert and never changes.
//! - `parsed_text` is always the rendering of `original_text` at last write.
//! - `pv` only ever grows.

use chrono::{Local, NaiveDate, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Calendar date format accepted by list filters and update overrides.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Storage-assigned card identifier.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct CardId(pub i64);

impl Display for CardId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for CardId {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

/// One markdown note plus its rendered HTML and view counter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Card {
    pub id: CardId,
    /// Local wall-clock time, whole seconds.
    pub created_at: NaiveDateTime,
    /// Markdown source as supplied by the caller.
    pub original_text: String,
    /// HTML rendered from `original_text`.
    pub parsed_text: String,
    /// Page-view counter.
    pub pv: i64,
    pub deleted_at: Option<NaiveDateTime>,
}

/// Update payload handed down by request handlers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCardRequest {
    pub id: CardId,
    pub content: String,
    /// Optional `YYYY-MM-DD` override for `created_at`. Empty means unset.
    #[serde(default)]
    pub created_at: Option<String>,
}

/// Non-fatal problems that an operation logged and skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CardWarning {
    /// A date string did not parse as `YYYY-MM-DD`; it was ignored.
    InvalidDate { input: String, reason: String },
}

impl Display for CardWarning {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidDate { input, reason } => {
                write!(f, "ignored invalid date `{input}`: {reason}")
            }
        }
    }
}

impl Error for CardWarning {}

/// Parses a `YYYY-MM-DD` calendar date.
pub fn parse_date(value: &str) -> Result<NaiveDate, CardWarning> {
    NaiveDate::parse_from_str(value, DATE_FORMAT).map_err(|err| CardWarning::InvalidDate {
        input: value.to_string(),
        reason: err.to_string(),
    })
}

/// Returns the inclusive `[00:00:00, 23:59:59]` span of a calendar day.
pub fn day_bounds(date: NaiveDate) -> (NaiveDateTime, NaiveDateTime) {
    let start = date.and_time(chrono::NaiveTime::MIN);
    let end = start + chrono::Duration::seconds(86_399);
    (start, end)
}

/// Current local time truncated to whole seconds, as stored in `created_at`.
pub fn now_timestamp() -> NaiveDateTime {
    truncate_to_seconds(Local::now().naive_local())
}

pub(crate) fn truncate_to_seconds(value: NaiveDateTime) -> NaiveDateTime {
    value.with_nanosecond(0).unwrap_or(value)
}
