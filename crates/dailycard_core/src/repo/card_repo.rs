//! Card repository contract and SQLite implementation.
//!
//! # Responsibility
//! - Provide create/update/view-count/delete and navigation/list queries
//!   over the `card` table.
//! - Keep `parsed_text` in lockstep with `original_text` on every write.
//!
//! # Invariants
//! - Each operation is an independent statement; nothing spans calls.
//! - `add_card_pv` is a single `pv = pv + ?` update, never read-then-write.
//! - All queries filter `deleted_at IS NULL`.
//! - Optional date inputs that fail to parse are logged, reported as a
//!   `CardWarning`, and skipped; they never fail the operation.

use crate::db::migrations::latest_version;
use crate::error::{RepoError, RepoResult};
use crate::model::card::{
    day_bounds, now_timestamp, parse_date, truncate_to_seconds, Card, CardId, CardWarning,
    UpdateCardRequest,
};
use crate::render::markdown_to_html;
use chrono::NaiveDateTime;
use log::warn;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};

const CARD_SELECT_SQL: &str = "SELECT
    id,
    created_at,
    original_text,
    parsed_text,
    pv,
    deleted_at
FROM card";

const CARD_REQUIRED_COLUMNS: [&str; 6] = [
    "id",
    "created_at",
    "original_text",
    "parsed_text",
    "pv",
    "deleted_at",
];

/// Text layout of `created_at`/`deleted_at`. Sorts the same way as the
/// timestamps it encodes, so range filters compare strings.
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub const CARDS_DEFAULT_PAGE_SIZE: u32 = 10;

/// Search and pagination options for [`CardRepository::list_cards`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CardListQuery {
    /// 1-based page number. `0` is treated as the first page.
    pub page: u32,
    /// Rows per page. `0` falls back to 10.
    pub page_size: u32,
    /// Substring that `original_text` must contain. Empty disables the filter.
    pub keyword: String,
    /// `YYYY-MM-DD` day that `created_at` must fall on. Empty disables the
    /// filter; an unparseable value is ignored with a warning.
    pub date: String,
}

impl CardListQuery {
    pub fn new(
        page: u32,
        page_size: u32,
        keyword: impl Into<String>,
        date: impl Into<String>,
    ) -> Self {
        Self {
            page,
            page_size,
            keyword: keyword.into(),
            date: date.into(),
        }
    }
}

/// One page of cards plus the match count across all pages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardPage {
    /// Cards sorted by `created_at DESC, id DESC`.
    pub items: Vec<Card>,
    pub total: i64,
    pub warning: Option<CardWarning>,
}

/// Repository interface for card operations.
pub trait CardRepository {
    /// Inserts a card stamped with the current local time.
    fn create_card(&self, content: &str) -> RepoResult<CardId>;
    /// Replaces card text and optionally overrides `created_at`.
    ///
    /// Returns a warning when the date override was present but ignored.
    fn update_card(&self, request: &UpdateCardRequest) -> RepoResult<Option<CardWarning>>;
    /// Atomically adds `delta` to the page-view counter.
    fn add_card_pv(&self, id: CardId, delta: u32) -> RepoResult<()>;
    /// Soft-deletes a card. Missing ids are not an error.
    fn delete_card(&self, id: CardId) -> RepoResult<()>;
    /// Gets one card, or the newest card when `id <= 0`.
    fn get_card_detail(&self, id: CardId) -> RepoResult<Option<Card>>;
    /// Gets the oldest card.
    fn get_first_card(&self) -> RepoResult<Option<Card>>;
    /// Gets the neighbouring card: next when `direction > 0`, else previous.
    fn get_card_by_offset(&self, id: CardId, direction: i32) -> RepoResult<Option<Card>>;
    /// Lists one page of cards matching keyword/date filters.
    fn list_cards(&self, query: &CardListQuery) -> RepoResult<CardPage>;
    /// Lists cards created within `[start, end]`.
    fn list_cards_by_time(&self, start: NaiveDateTime, end: NaiveDateTime)
        -> RepoResult<Vec<Card>>;
    /// Lists only the creation timestamps within `[start, end]`.
    fn list_card_timestamps(
        &self,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> RepoResult<Vec<NaiveDateTime>>;
    /// Counts live cards.
    fn count_cards(&self) -> RepoResult<i64>;
}

/// SQLite-backed card repository borrowing a migrated connection.
pub struct SqliteCardRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteCardRepository<'conn> {
    /// Constructs a repository after checking the connection is migrated.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_card_connection_ready(conn)?;
        Ok(Self { conn })
    }

    fn query_cards(&self, sql: &str, bind_values: Vec<Value>) -> RepoResult<Vec<Card>> {
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut cards = Vec::new();
        while let Some(row) = rows.next()? {
            cards.push(parse_card_row(row)?);
        }
        Ok(cards)
    }

    fn query_one_card(&self, sql: &str, bind_values: Vec<Value>) -> RepoResult<Option<Card>> {
        let card = self
            .conn
            .query_row(sql, params_from_iter(bind_values), parse_card_row)
            .optional()?;
        Ok(card)
    }
}

impl CardRepository for SqliteCardRepository<'_> {
    fn create_card(&self, content: &str) -> RepoResult<CardId> {
        self.conn.execute(
            "INSERT INTO card (created_at, original_text, parsed_text, pv)
             VALUES (?1, ?2, ?3, 0);",
            params![
                format_timestamp(now_timestamp()),
                content,
                markdown_to_html(content),
            ],
        )?;
        Ok(CardId(self.conn.last_insert_rowid()))
    }

    fn update_card(&self, request: &UpdateCardRequest) -> RepoResult<Option<CardWarning>> {
        let mut warning = None;
        let created_at = match request.created_at.as_deref() {
            Some(value) if !value.is_empty() => match parse_date(value) {
                Ok(date) => Some(format_timestamp(day_bounds(date).0)),
                Err(skipped) => {
                    warn!(
                        "event=card_update module=repo status=warn card_id={} error_code=invalid_date error={skipped}",
                        request.id
                    );
                    warning = Some(skipped);
                    None
                }
            },
            _ => None,
        };

        self.conn.execute(
            "UPDATE card
             SET
                original_text = ?2,
                parsed_text = ?3,
                created_at = COALESCE(?4, created_at)
             WHERE id = ?1
               AND deleted_at IS NULL;",
            params![
                request.id.0,
                request.content.as_str(),
                markdown_to_html(&request.content),
                created_at,
            ],
        )?;

        Ok(warning)
    }

    fn add_card_pv(&self, id: CardId, delta: u32) -> RepoResult<()> {
        self.conn.execute(
            "UPDATE card
             SET pv = pv + ?2
             WHERE id = ?1
               AND deleted_at IS NULL;",
            params![id.0, i64::from(delta)],
        )?;
        Ok(())
    }

    fn delete_card(&self, id: CardId) -> RepoResult<()> {
        self.conn.execute(
            "UPDATE card
             SET deleted_at = ?2
             WHERE id = ?1
               AND deleted_at IS NULL;",
            params![id.0, format_timestamp(now_timestamp())],
        )?;
        Ok(())
    }

    fn get_card_detail(&self, id: CardId) -> RepoResult<Option<Card>> {
        if id.0 > 0 {
            return self.query_one_card(
                &format!("{CARD_SELECT_SQL} WHERE id = ?1 AND deleted_at IS NULL;"),
                vec![Value::Integer(id.0)],
            );
        }

        self.query_one_card(
            &format!("{CARD_SELECT_SQL} WHERE deleted_at IS NULL ORDER BY id DESC LIMIT 1;"),
            Vec::new(),
        )
    }

    fn get_first_card(&self) -> RepoResult<Option<Card>> {
        self.query_one_card(
            &format!("{CARD_SELECT_SQL} WHERE deleted_at IS NULL ORDER BY id ASC LIMIT 1;"),
            Vec::new(),
        )
    }

    fn get_card_by_offset(&self, id: CardId, direction: i32) -> RepoResult<Option<Card>> {
        let sql = if direction > 0 {
            format!("{CARD_SELECT_SQL} WHERE id > ?1 AND deleted_at IS NULL ORDER BY id ASC LIMIT 1;")
        } else {
            format!(
                "{CARD_SELECT_SQL} WHERE id < ?1 AND deleted_at IS NULL ORDER BY id DESC LIMIT 1;"
            )
        };
        self.query_one_card(&sql, vec![Value::Integer(id.0)])
    }

    fn list_cards(&self, query: &CardListQuery) -> RepoResult<CardPage> {
        let mut filter = String::from(" WHERE deleted_at IS NULL");
        let mut bind_values: Vec<Value> = Vec::new();
        let mut warning = None;

        if !query.keyword.is_empty() {
            filter.push_str(" AND original_text LIKE ? ESCAPE '\\'");
            bind_values.push(Value::Text(format!(
                "%{}%",
                escape_like_pattern(&query.keyword)
            )));
        }

        if !query.date.is_empty() {
            match parse_date(&query.date) {
                Ok(date) => {
                    let (start, end) = day_bounds(date);
                    filter.push_str(" AND created_at >= ? AND created_at <= ?");
                    bind_values.push(Value::Text(format_timestamp(start)));
                    bind_values.push(Value::Text(format_timestamp(end)));
                }
                Err(skipped) => {
                    warn!(
                        "event=card_list module=repo status=warn error_code=invalid_date error={skipped}"
                    );
                    warning = Some(skipped);
                }
            }
        }

        let total: i64 = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM card{filter};"),
            params_from_iter(bind_values.iter()),
            |row| row.get(0),
        )?;

        let (limit, offset) = page_window(query.page, query.page_size);
        bind_values.push(Value::Integer(limit));
        bind_values.push(Value::Integer(offset));
        let items = self.query_cards(
            &format!("{CARD_SELECT_SQL}{filter} ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?;"),
            bind_values,
        )?;

        Ok(CardPage {
            items,
            total,
            warning,
        })
    }

    fn list_cards_by_time(
        &self,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> RepoResult<Vec<Card>> {
        self.query_cards(
            &format!(
                "{CARD_SELECT_SQL}
                 WHERE deleted_at IS NULL
                   AND created_at >= ?1
                   AND created_at <= ?2
                 ORDER BY id ASC;"
            ),
            vec![
                Value::Text(format_range_bound(start)),
                Value::Text(format_range_bound(end)),
            ],
        )
    }

    fn list_card_timestamps(
        &self,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> RepoResult<Vec<NaiveDateTime>> {
        let mut stmt = self.conn.prepare(
            "SELECT created_at
             FROM card
             WHERE deleted_at IS NULL
               AND created_at >= ?1
               AND created_at <= ?2
             ORDER BY created_at ASC;",
        )?;
        let timestamps = stmt
            .query_map(
                params![format_range_bound(start), format_range_bound(end)],
                |row| row.get::<_, NaiveDateTime>(0),
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(timestamps)
    }

    fn count_cards(&self) -> RepoResult<i64> {
        let count = self.conn.query_row(
            "SELECT COUNT(*) FROM card WHERE deleted_at IS NULL;",
            [],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}

/// Returns `(limit, offset)` for a 1-based page request.
pub fn page_window(page: u32, page_size: u32) -> (i64, i64) {
    let page_size = match page_size {
        0 => CARDS_DEFAULT_PAGE_SIZE,
        value => value,
    };
    let page = page.max(1);
    let limit = i64::from(page_size);
    (limit, (i64::from(page) - 1) * limit)
}

/// Escapes `LIKE` wildcards so `keyword` matches literally under `ESCAPE '\'`.
fn escape_like_pattern(keyword: &str) -> String {
    let mut escaped = String::with_capacity(keyword.len());
    for c in keyword.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn format_timestamp(value: NaiveDateTime) -> String {
    value.format(TIMESTAMP_FORMAT).to_string()
}

/// Caller-supplied bounds may carry sub-second precision; keep it so the
/// string comparison stays faithful to the time comparison.
fn format_range_bound(value: NaiveDateTime) -> String {
    if truncate_to_seconds(value) == value {
        format_timestamp(value)
    } else {
        value.format("%Y-%m-%d %H:%M:%S%.f").to_string()
    }
}

fn parse_card_row(row: &Row<'_>) -> rusqlite::Result<Card> {
    Ok(Card {
        id: CardId(row.get("id")?),
        created_at: row.get("created_at")?,
        original_text: row.get("original_text")?,
        parsed_text: row.get("parsed_text")?,
        pv: row.get("pv")?,
        deleted_at: row.get("deleted_at")?,
    })
}

fn ensure_card_connection_ready(conn: &Connection) -> RepoResult<()> {
    let expected_version = latest_version();
    let actual_version: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    if actual_version != expected_version {
        return Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    if !table_exists(conn, "card")? {
        return Err(RepoError::MissingRequiredTable("card"));
    }

    for column in CARD_REQUIRED_COLUMNS {
        if !table_has_column(conn, "card", column)? {
            return Err(RepoError::MissingRequiredColumn {
                table: "card",
                column,
            });
        }
    }

    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> RepoResult<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table});"))?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let current: String = row.get(1)?;
        if current == column {
            return Ok(true);
        }
    }
    Ok(false)
}
