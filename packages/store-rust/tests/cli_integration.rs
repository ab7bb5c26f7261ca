// CLI integration tests for the document store flows.
#![cfg(feature = "redb")]

use std::path::Path;
use std::process::{Command, Output};

use serde_json::Value;

fn run(db: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_tristore"))
        .arg("--path")
        .arg(db)
        .args(args)
        .env_remove("TRISTORE_TABLE")
        .output()
        .expect("spawn tristore")
}

fn stdout(output: &Output) -> String {
    assert!(
        output.status.success(),
        "command failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8(output.stdout.clone()).expect("utf8")
}

fn json_lines(output: &Output) -> Vec<Value> {
    stdout(output)
        .lines()
        .map(|line| serde_json::from_str(line).expect("valid json"))
        .collect()
}

#[test]
fn put_get_count_delete_flow() {
    let temp = tempfile::tempdir().expect("tempdir");
    let db = temp.path().join("docs.redb");

    let put = run(
        &db,
        &["put", "n1", r#"{"text":"hello"}"#, "--type", "memo", "--created", "42"],
    );
    assert_eq!(stdout(&put).trim(), "Inserted");

    let get = json_lines(&run(&db, &["get", "n1"]));
    assert_eq!(get.len(), 1);
    assert_eq!(get[0]["id"], "n1");
    assert_eq!(get[0]["type"], "memo");
    assert_eq!(get[0]["createdAt"], 42);
    assert_eq!(get[0]["body"]["text"], "hello");

    assert_eq!(stdout(&run(&db, &["count"])).trim(), "1");
    assert_eq!(stdout(&run(&db, &["delete", "n1"])).trim(), "1");
    assert_eq!(stdout(&run(&db, &["delete", "n1"])).trim(), "0");
    assert!(!run(&db, &["get", "n1"]).status.success());
}

#[test]
fn rejected_put_fails_and_keeps_document() {
    let temp = tempfile::tempdir().expect("tempdir");
    let db = temp.path().join("docs.redb");

    stdout(&run(&db, &["put", "n1", "1", "--type", "a"]));
    let rejected = run(&db, &["put", "n1", "2", "--type", "b", "--policy", "abort"]);
    assert!(!rejected.status.success());

    let get = json_lines(&run(&db, &["get", "n1"]));
    assert_eq!(get[0]["body"], 1);
}

#[test]
fn query_orders_and_limits() {
    let temp = tempfile::tempdir().expect("tempdir");
    let db = temp.path().join("docs.redb");

    for (id, created) in [("a", "1"), ("b", "2"), ("c", "3")] {
        stdout(&run(
            &db,
            &["put", id, "null", "--type", "t", "--created", created],
        ));
    }
    stdout(&run(&db, &["put", "x", "null", "--type", "other", "--created", "4"]));

    let found = json_lines(&run(
        &db,
        &[
            "query",
            "--type",
            "t",
            "--order-by",
            "created",
            "--direction",
            "desc",
            "--limit",
            "2",
        ],
    ));
    let ids: Vec<&str> = found.iter().filter_map(|doc| doc["id"].as_str()).collect();
    assert_eq!(ids, vec!["c", "b"]);

    assert_eq!(stdout(&run(&db, &["clear"])).trim(), "4");
    assert!(json_lines(&run(&db, &["query"])).is_empty());
}

#[test]
fn tables_are_selected_by_flag() {
    let temp = tempfile::tempdir().expect("tempdir");
    let db = temp.path().join("docs.redb");

    stdout(&run(&db, &["--table", "left", "put", "k", "1"]));
    assert_eq!(stdout(&run(&db, &["--table", "left", "count"])).trim(), "1");
    assert_eq!(stdout(&run(&db, &["--table", "right", "count"])).trim(), "0");
}

#[test]
fn database_settings_reach_the_table() {
    let temp = tempfile::tempdir().expect("tempdir");
    let db = temp.path().join("docs.redb");

    stdout(&run(&db, &["--database", "journal", "put", "k", "1"]));
    assert_eq!(stdout(&run(&db, &["--schema-version", "1", "count"])).trim(), "1");

    assert_eq!(stdout(&run(&db, &["--schema-version", "2", "count"])).trim(), "0");
    assert!(!run(&db, &["--schema-version", "1", "count"]).status.success());
}
