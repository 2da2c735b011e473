mod helpers;

use helpers::{insert_chunk, spike, test_db};
use mneme::alias::AliasTable;
use mneme::history::history;

#[test]
fn alias_group_matches_every_member() {
    let conn = test_db();
    let aliases = AliasTable::parse("alice=alice,bob,roberto");

    insert_chunk(&conn, "Alice wrote the parser", "a.md", "A", None, 2, 1, None, &spike(0));
    insert_chunk(&conn, "Bob reviewed it", "b.md", "B", None, 2, 1, None, &spike(1));
    insert_chunk(&conn, "Roberto deployed it", "c.md", "C", None, 2, 1, None, &spike(2));
    insert_chunk(&conn, "Charlie watched", "d.md", "D", None, 2, 1, None, &spike(3));

    let results = history(&conn, &aliases, "Alice", 10).unwrap();
    assert_eq!(results.len(), 3);

    let results = history(&conn, &aliases, "Charlie", 10).unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].text, "Charlie watched");
}

#[test]
fn matching_is_case_insensitive_substring() {
    let conn = test_db();
    let aliases = AliasTable::default();

    insert_chunk(&conn, "We met ALICE at the summit", "a.md", "A", None, 2, 1, None, &spike(0));

    let results = history(&conn, &aliases, "alice", 10).unwrap();
    assert_eq!(results.len(), 1);
}

#[test]
fn ordering_is_timeless_then_date_then_document_position() {
    let conn = test_db();
    let aliases = AliasTable::default();

    insert_chunk(&conn, "alice later", "x.md", "S4", None, 2, 4, Some("2025-03-01"), &spike(0));
    insert_chunk(&conn, "alice timeless", "x.md", "S9", None, 2, 9, None, &spike(1));
    insert_chunk(&conn, "alice early second", "x.md", "S3", None, 2, 3, Some("2024-01-01"), &spike(2));
    insert_chunk(&conn, "alice early first", "x.md", "S1", None, 2, 1, Some("2024-01-01"), &spike(3));

    let results = history(&conn, &aliases, "alice", 10).unwrap();
    let texts: Vec<&str> = results.iter().map(|r| r.text.as_str()).collect();
    assert_eq!(
        texts,
        vec![
            "alice timeless",
            "alice early first",
            "alice early second",
            "alice later",
        ]
    );
}

#[test]
fn like_wildcards_in_entity_are_literal() {
    let conn = test_db();
    let aliases = AliasTable::default();

    insert_chunk(&conn, "progress: 50%_done overall", "a.md", "A", None, 2, 1, None, &spike(0));
    insert_chunk(&conn, "progress: 50 done overall", "b.md", "B", None, 2, 1, None, &spike(1));

    // Without escaping, `%` and `_` would match both rows
    let results = history(&conn, &aliases, "50%_done", 10).unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].text, "progress: 50%_done overall");
}

#[test]
fn non_positive_limit_defaults_to_twenty() {
    let conn = test_db();
    let aliases = AliasTable::default();

    for i in 0..25 {
        insert_chunk(
            &conn,
            "alice again",
            &format!("f{i}.md"),
            "S",
            None,
            2,
            1,
            None,
            &spike(i),
        );
    }

    let results = history(&conn, &aliases, "alice", 0).unwrap();
    assert_eq!(results.len(), 20);

    let results = history(&conn, &aliases, "alice", 5).unwrap();
    assert_eq!(results.len(), 5);
}

#[test]
fn empty_entity_is_a_validation_error() {
    let conn = test_db();
    let aliases = AliasTable::default();
    let err = history(&conn, &aliases, "  ", 10).unwrap_err();
    assert!(err.to_string().contains("empty"));
}
