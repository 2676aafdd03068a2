//! Integration tests for the connection commands.
//!
//! Every test builds its own config, file-backed data directory and entity
//! snapshot in a temp dir, so runs are independent.

mod common;

use predicates::prelude::*;
use tempfile::TempDir;

use common::{fixture_cmd, tether_cmd, write_fixture};

// ============================================================================
// Tests
// ============================================================================

#[test]
fn test_version_includes_package_version() {
    tether_cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_types_lists_configured_connections() {
    let temp = TempDir::new().expect("create temp dir");
    let config = write_fixture(temp.path());

    fixture_cmd(&config)
        .arg("types")
        .assert()
        .success()
        .stdout(predicate::str::contains("see_also"))
        .stdout(predicate::str::contains("related_people"));

    fixture_cmd(&config)
        .args(["types", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"name\": \"see_also\""));
}

#[test]
fn test_add_then_list_persists_between_runs() {
    let temp = TempDir::new().expect("create temp dir");
    let config = write_fixture(temp.path());

    fixture_cmd(&config)
        .args(["add", "see_also", "item", "1", "article:2"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[ok] Connected item#1"))
        .stdout(predicate::str::contains("Borrowing explained"));

    assert!(temp.path().join("data").join("item.jsonl").exists());

    fixture_cmd(&config)
        .args(["list", "see_also", "item", "1", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"title\": \"Borrowing explained\""))
        .stdout(predicate::str::contains("\"count\": 1"));

    fixture_cmd(&config)
        .args(["list", "see_also", "item", "2", "--reverse", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"title\": \"Rust ownership\""));
}

#[test]
fn test_count_and_remove() {
    let temp = TempDir::new().expect("create temp dir");
    let config = write_fixture(temp.path());

    fixture_cmd(&config)
        .args(["set", "see_also", "item", "1", "article:2", "article:3"])
        .assert()
        .success()
        .stdout(predicate::str::contains("now has 2 connections"));

    fixture_cmd(&config)
        .args(["count", "see_also", "item", "1"])
        .assert()
        .success()
        .stdout(predicate::str::diff("2\n"));

    fixture_cmd(&config)
        .args(["rm", "see_also", "item", "1", "article:2"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[ok] Disconnected"));

    fixture_cmd(&config)
        .args(["count", "see_also", "item", "1"])
        .assert()
        .success()
        .stdout(predicate::str::diff("1\n"));
}

#[test]
fn test_search_excludes_source() {
    let temp = TempDir::new().expect("create temp dir");
    let config = write_fixture(temp.path());

    fixture_cmd(&config)
        .args(["search", "see_also", "rust", "--exclude", "1", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Rust lifetimes"))
        .stdout(predicate::str::contains("Rust ownership").not());

    fixture_cmd(&config)
        .args(["search", "related_people", "ann", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Ann Berg"));
}

#[test]
fn test_delete_cleans_up_both_directions() {
    let temp = TempDir::new().expect("create temp dir");
    let config = write_fixture(temp.path());

    fixture_cmd(&config)
        .args(["add", "see_also", "item", "1", "article:2"])
        .assert()
        .success();

    fixture_cmd(&config)
        .args(["delete", "item", "2"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[ok] Cleaned up item#2"));

    fixture_cmd(&config)
        .args(["count", "see_also", "item", "1"])
        .assert()
        .success()
        .stdout(predicate::str::diff("0\n"));

    fixture_cmd(&config)
        .args(["delete", "item", "2"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[skip]"));
}

#[test]
fn test_invalid_connection_name_fails() {
    let temp = TempDir::new().expect("create temp dir");
    let config = write_fixture(temp.path());

    fixture_cmd(&config)
        .args(["list", "Not Valid!", "item", "1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("[err]"));

    fixture_cmd(&config)
        .args(["count", "unregistered", "item", "1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not registered"));
}

#[test]
fn test_bad_target_is_a_usage_error() {
    let temp = TempDir::new().expect("create temp dir");
    let config = write_fixture(temp.path());

    fixture_cmd(&config)
        .args(["add", "see_also", "item", "1", "article"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("type:id"));
}

#[test]
fn test_check_reports_valid_config() {
    let temp = TempDir::new().expect("create temp dir");
    let config = write_fixture(temp.path());

    fixture_cmd(&config)
        .args(["check", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"valid\": true"))
        .stdout(predicate::str::contains("\"connectionTypes\": 2"));
}

#[test]
fn test_malformed_config_fails_with_context() {
    let temp = TempDir::new().expect("create temp dir");
    let config = temp.path().join("config.yaml");
    std::fs::write(&config, "connections: [not, a, map]").expect("write config");

    fixture_cmd(&config)
        .arg("types")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to load configuration"));
}
