//! Command-line front end over the card repository.
//!
//! # Responsibility
//! - Map one subcommand to one `CardRepository` call.
//! - Print results as JSON so output can be piped into other tools.

use anyhow::{bail, Context, Result};
use chrono::NaiveDateTime;
use clap::{Parser, Subcommand};
use dailycard_core::model::card::{day_bounds, parse_date};
use dailycard_core::{
    default_log_level, init_logging, open_db, CardId, CardListQuery, CardRepository,
    SqliteCardRepository, UpdateCardRequest,
};
use log::info;
use serde_json::json;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "dailycard", version, about = "Markdown card notes in SQLite", long_about = None)]
struct Cli {
    /// Path to the SQLite database. Created and migrated on first use.
    #[arg(long, env = "DAILYCARD_DB", default_value = "dailycard.db")]
    db: PathBuf,
    /// Absolute directory for rolling log files. Logging is off when unset.
    #[arg(long, env = "DAILYCARD_LOG_DIR")]
    log_dir: Option<PathBuf>,
    /// trace|debug|info|warn|error. Defaults to debug in debug builds, info otherwise.
    #[arg(long, env = "DAILYCARD_LOG_LEVEL")]
    log_level: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create a card from markdown.
    Add { content: String },
    /// Replace a card's markdown, optionally moving it to another day.
    Update {
        id: i64,
        content: String,
        /// New creation date, YYYY-MM-DD.
        #[arg(long)]
        date: Option<String>,
    },
    /// Record page views for a card.
    View {
        id: i64,
        #[arg(long, default_value_t = 1)]
        delta: u32,
    },
    /// Delete a card.
    Delete { id: i64 },
    /// Show one card. Without an id, shows the newest card.
    Show { id: Option<i64> },
    /// Show the oldest card.
    First,
    /// Show the card after `id`.
    Next { id: i64 },
    /// Show the card before `id`.
    Prev { id: i64 },
    /// List cards, newest first.
    List {
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long, default_value_t = 10)]
        page_size: u32,
        /// Only cards whose markdown contains this text.
        #[arg(long, default_value = "")]
        keyword: String,
        /// Only cards created on this day, YYYY-MM-DD.
        #[arg(long, default_value = "")]
        date: String,
    },
    /// List full cards created between two days (inclusive).
    Range { start: String, end: String },
    /// List creation timestamps between two days (inclusive).
    Calendar { start: String, end: String },
    /// Count cards.
    Count,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Some(log_dir) = cli.log_dir.as_ref() {
        let level = cli
            .log_level
            .clone()
            .unwrap_or_else(|| default_log_level().as_str().to_string());
        init_logging(&level, log_dir).context("failed to initialize logging")?;
    }

    let conn = open_db(&cli.db)
        .with_context(|| format!("failed to open database `{}`", cli.db.display()))?;
    let repo = SqliteCardRepository::try_new(&conn)?;
    info!(
        "event=cli_command module=cli status=start db={}",
        cli.db.display()
    );
    run(&repo, cli.command)
}

fn run(repo: &impl CardRepository, command: Command) -> Result<()> {
    let output = match command {
        Command::Add { content } => json!({ "id": repo.create_card(&content)? }),
        Command::Update { id, content, date } => {
            let warning = repo.update_card(&UpdateCardRequest {
                id: CardId(id),
                content,
                created_at: date,
            })?;
            json!({ "id": id, "warning": warning.map(|w| w.to_string()) })
        }
        Command::View { id, delta } => {
            repo.add_card_pv(CardId(id), delta)?;
            json!({ "id": id })
        }
        Command::Delete { id } => {
            repo.delete_card(CardId(id))?;
            json!({ "id": id })
        }
        Command::Show { id } => json!(repo.get_card_detail(CardId(id.unwrap_or(0)))?),
        Command::First => json!(repo.get_first_card()?),
        Command::Next { id } => json!(repo.get_card_by_offset(CardId(id), 1)?),
        Command::Prev { id } => json!(repo.get_card_by_offset(CardId(id), -1)?),
        Command::List {
            page,
            page_size,
            keyword,
            date,
        } => {
            let page = repo.list_cards(&CardListQuery::new(page, page_size, keyword, date))?;
            json!({
                "items": page.items,
                "total": page.total,
                "warning": page.warning.map(|w| w.to_string()),
            })
        }
        Command::Range { start, end } => {
            let (start, end) = day_range(&start, &end)?;
            json!(repo.list_cards_by_time(start, end)?)
        }
        Command::Calendar { start, end } => {
            let (start, end) = day_range(&start, &end)?;
            json!(repo.list_card_timestamps(start, end)?)
        }
        Command::Count => json!({ "count": repo.count_cards()? }),
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

/// Expands `YYYY-MM-DD` day arguments into an inclusive timestamp range.
fn day_range(start: &str, end: &str) -> Result<(NaiveDateTime, NaiveDateTime)> {
    let start = parse_date(start)?;
    let end = parse_date(end)?;
    if end < start {
        bail!("range end {end} is before start {start}");
    }
    Ok((day_bounds(start).0, day_bounds(end).1))
}
