use dailycard_core::db::migrations::latest_version;
use dailycard_core::db::open_db_in_memory;
use dailycard_core::{
    markdown_to_html, CardId, CardRepository, CardWarning, RepoError, SqliteCardRepository,
    UpdateCardRequest,
};
use rusqlite::{params, Connection};

#[test]
fn create_and_get_roundtrip_renders_markdown() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteCardRepository::try_new(&conn).unwrap();

    let source = "# Today\n\nSome **bold** words and ~~noise~~.";
    let id = repo.create_card(source).unwrap();

    let card = repo.get_card_detail(id).unwrap().unwrap();
    assert_eq!(card.id, id);
    assert_eq!(card.original_text, source);
    assert_eq!(card.parsed_text, markdown_to_html(source));
    assert!(card.parsed_text.contains("<h1>Today</h1>"));
    assert_eq!(card.pv, 0);
    assert!(card.deleted_at.is_none());
}

#[test]
fn create_assigns_increasing_ids() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteCardRepository::try_new(&conn).unwrap();

    let first = repo.create_card("one").unwrap();
    let second = repo.create_card("two").unwrap();
    assert!(second > first);
}

#[test]
fn update_rewrites_text_and_overrides_created_at() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteCardRepository::try_new(&conn).unwrap();
    let id = repo.create_card("draft").unwrap();

    let warning = repo
        .update_card(&UpdateCardRequest {
            id,
            content: "final *text*".to_string(),
            created_at: Some("2023-05-04".to_string()),
        })
        .unwrap();
    assert!(warning.is_none());

    let card = repo.get_card_detail(id).unwrap().unwrap();
    assert_eq!(card.original_text, "final *text*");
    assert_eq!(card.parsed_text, "<p>final <em>text</em></p>\n");
    assert_eq!(card.created_at.to_string(), "2023-05-04 00:00:00");
}

#[test]
fn update_with_bad_date_keeps_created_at_and_still_updates_text() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteCardRepository::try_new(&conn).unwrap();
    let id = repo.create_card("draft").unwrap();
    let before = repo.get_card_detail(id).unwrap().unwrap();

    let warning = repo
        .update_card(&UpdateCardRequest {
            id,
            content: "revised".to_string(),
            created_at: Some("bad-date".to_string()),
        })
        .unwrap();
    assert!(matches!(
        warning,
        Some(CardWarning::InvalidDate { ref input, .. }) if input == "bad-date"
    ));

    let after = repo.get_card_detail(id).unwrap().unwrap();
    assert_eq!(after.original_text, "revised");
    assert_eq!(after.parsed_text, markdown_to_html("revised"));
    assert_eq!(after.created_at, before.created_at);
}

#[test]
fn update_with_empty_date_is_not_a_warning() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteCardRepository::try_new(&conn).unwrap();
    let id = repo.create_card("draft").unwrap();

    let warning = repo
        .update_card(&UpdateCardRequest {
            id,
            content: "revised".to_string(),
            created_at: Some(String::new()),
        })
        .unwrap();
    assert!(warning.is_none());
}

#[test]
fn update_missing_card_is_not_an_error() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteCardRepository::try_new(&conn).unwrap();

    repo.update_card(&UpdateCardRequest {
        id: CardId(404),
        content: "ghost".to_string(),
        created_at: None,
    })
    .unwrap();
    assert_eq!(repo.count_cards().unwrap(), 0);
}

#[test]
fn delete_is_idempotent_and_hides_card_from_reads() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteCardRepository::try_new(&conn).unwrap();
    let kept = repo.create_card("kept").unwrap();
    let removed = repo.create_card("removed").unwrap();

    repo.delete_card(removed).unwrap();
    repo.delete_card(removed).unwrap();
    repo.delete_card(CardId(9_999)).unwrap();

    assert!(repo.get_card_detail(removed).unwrap().is_none());
    assert_eq!(repo.get_card_detail(CardId(0)).unwrap().unwrap().id, kept);
    assert_eq!(repo.count_cards().unwrap(), 1);

    let deleted_at: Option<String> = conn
        .query_row(
            "SELECT deleted_at FROM card WHERE id = ?1;",
            params![removed.0],
            |row| row.get(0),
        )
        .unwrap();
    assert!(deleted_at.is_some());
}

#[test]
fn get_detail_without_positive_id_returns_newest_card() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteCardRepository::try_new(&conn).unwrap();

    assert!(repo.get_card_detail(CardId(0)).unwrap().is_none());

    repo.create_card("old").unwrap();
    let newest = repo.create_card("new").unwrap();

    assert_eq!(repo.get_card_detail(CardId(0)).unwrap().unwrap().id, newest);
    assert_eq!(repo.get_card_detail(CardId(-3)).unwrap().unwrap().id, newest);
    assert!(repo.get_card_detail(CardId(newest.0 + 1)).unwrap().is_none());
}

#[test]
fn get_first_card_reports_existence() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteCardRepository::try_new(&conn).unwrap();

    assert!(repo.get_first_card().unwrap().is_none());

    let first = repo.create_card("first").unwrap();
    repo.create_card("second").unwrap();
    assert_eq!(repo.get_first_card().unwrap().unwrap().id, first);
}

#[test]
fn get_by_offset_navigates_to_nearest_neighbour() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteCardRepository::try_new(&conn).unwrap();
    let a = repo.create_card("a").unwrap();
    let b = repo.create_card("b").unwrap();
    let c = repo.create_card("c").unwrap();
    let d = repo.create_card("d").unwrap();
    repo.delete_card(c).unwrap();

    assert_eq!(repo.get_card_by_offset(a, 1).unwrap().unwrap().id, b);
    assert_eq!(repo.get_card_by_offset(b, 1).unwrap().unwrap().id, d);
    assert_eq!(repo.get_card_by_offset(d, -1).unwrap().unwrap().id, b);
    assert_eq!(repo.get_card_by_offset(b, 0).unwrap().unwrap().id, a);

    assert!(repo.get_card_by_offset(d, 1).unwrap().is_none());
    assert!(repo.get_card_by_offset(a, -1).unwrap().is_none());
}

#[test]
fn card_serializes_with_camel_case_fields() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteCardRepository::try_new(&conn).unwrap();
    let id = repo.create_card("json").unwrap();
    let card = repo.get_card_detail(id).unwrap().unwrap();

    let value = serde_json::to_value(&card).unwrap();
    assert_eq!(value["id"], serde_json::json!(id.0));
    assert_eq!(value["originalText"], "json");
    assert_eq!(value["parsedText"], "<p>json</p>\n");
    assert_eq!(value["pv"], 0);
    assert!(value["deletedAt"].is_null());
    assert!(value["createdAt"].is_string());
}

#[test]
fn update_request_deserializes_from_handler_payload() {
    let request: UpdateCardRequest =
        serde_json::from_str(r#"{"id": 7, "content": "body", "createdAt": "2024-01-15"}"#)
            .unwrap();
    assert_eq!(request.id, CardId(7));
    assert_eq!(request.created_at.as_deref(), Some("2024-01-15"));

    let without_date: UpdateCardRequest =
        serde_json::from_str(r#"{"id": 7, "content": "body"}"#).unwrap();
    assert!(without_date.created_at.is_none());
}

#[test]
fn storage_failures_surface_as_storage_error() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteCardRepository::try_new(&conn).unwrap();
    conn.execute_batch("DROP TABLE card;").unwrap();

    let err = repo.create_card("orphan").unwrap_err();
    assert!(matches!(err, RepoError::Storage(_)));
    assert!(err.to_string().starts_with("card storage error"));
    assert!(matches!(repo.count_cards(), Err(RepoError::Storage(_))));
}

#[test]
fn repository_rejects_uninitialized_connection() {
    let conn = Connection::open_in_memory().unwrap();

    match SqliteCardRepository::try_new(&conn) {
        Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version: 0,
        }) => assert_eq!(expected_version, latest_version()),
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("expected uninitialized connection error"),
    }
}

#[test]
fn repository_rejects_connection_without_card_table() {
    let conn = Connection::open_in_memory().unwrap();
    conn.execute_batch(&format!("PRAGMA user_version = {};", latest_version()))
        .unwrap();

    assert!(matches!(
        SqliteCardRepository::try_new(&conn),
        Err(RepoError::MissingRequiredTable("card"))
    ));
}

#[test]
fn repository_rejects_card_table_missing_columns() {
    let conn = Connection::open_in_memory().unwrap();
    conn.execute_batch(
        "CREATE TABLE card (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            created_at TEXT NOT NULL,
            original_text TEXT NOT NULL,
            parsed_text TEXT NOT NULL
        );",
    )
    .unwrap();
    conn.execute_batch(&format!("PRAGMA user_version = {};", latest_version()))
        .unwrap();

    assert!(matches!(
        SqliteCardRepository::try_new(&conn),
        Err(RepoError::MissingRequiredColumn {
            table: "card",
            column: "pv"
        })
    ));
}
