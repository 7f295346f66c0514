//! E2E CLI tests for board layout and position maintenance:
//! - `tk init`, board/list/card creation
//! - `tk card move` within and across lists, `tk list move`
//! - `tk list reorder` / `tk board reorder`
//! - the JSON error contract (`error_code`, `suggestion`)
//!
//! Each test runs `tk` as a subprocess in an isolated temp directory.

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use std::path::Path;
use tempfile::TempDir;

// ---------------------------------------------------------------------------
// Test Harness
// ---------------------------------------------------------------------------

fn tk_cmd(dir: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("tk"));
    cmd.current_dir(dir);
    cmd.env("TACK_USER", "alice");
    cmd.env("TACK_LOG", "error");
    cmd.env_remove("FORMAT");
    cmd
}

fn init_project() -> TempDir {
    let dir = TempDir::new().expect("temp dir");
    tk_cmd(dir.path()).arg("init").assert().success();
    dir
}

/// Run a command with `--json` and parse stdout.
fn tk_json(dir: &Path, args: &[&str]) -> Value {
    let output = tk_cmd(dir)
        .args(args)
        .arg("--json")
        .output()
        .expect("tk should not crash");
    assert!(
        output.status.success(),
        "{args:?} failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("valid JSON on stdout")
}

/// Run a command expected to fail and parse the JSON error on stderr.
fn tk_json_err(dir: &Path, args: &[&str]) -> Value {
    let output = tk_cmd(dir)
        .args(args)
        .arg("--json")
        .output()
        .expect("tk should not crash");
    assert!(!output.status.success(), "{args:?} unexpectedly succeeded");
    let json: Value = serde_json::from_slice(&output.stderr).expect("valid JSON on stderr");
    json["error"].clone()
}

fn id_of(value: &Value) -> String {
    value["id"].as_str().expect("id field").to_string()
}

/// Board with lists "Todo" (cards A, B, C) and "Done" (empty).
struct Layout {
    dir: TempDir,
    board: String,
    todo: String,
    done: String,
    cards: Vec<String>,
}

fn layout() -> Layout {
    let dir = init_project();
    let board = id_of(&tk_json(dir.path(), &["board", "create", "Roadmap"]));
    let todo = id_of(&tk_json(dir.path(), &["list", "create", &board, "Todo"]));
    let done = id_of(&tk_json(dir.path(), &["list", "create", &board, "Done"]));
    let cards = ["A", "B", "C"]
        .iter()
        .map(|title| id_of(&tk_json(dir.path(), &["card", "create", &todo, title])))
        .collect();
    Layout {
        dir,
        board,
        todo,
        done,
        cards,
    }
}

/// Card titles per list, in position order, from `tk board show`.
fn snapshot(l: &Layout) -> Vec<(String, Vec<String>)> {
    let view = tk_json(l.dir.path(), &["board", "show", &l.board]);
    view["lists"]
        .as_array()
        .expect("lists array")
        .iter()
        .map(|lv| {
            let cards = lv["cards"].as_array().expect("cards array");
            for (i, card) in cards.iter().enumerate() {
                assert_eq!(card["position"].as_u64(), Some(i as u64), "dense positions");
            }
            let titles = cards
                .iter()
                .map(|c| c["title"].as_str().expect("title").to_string())
                .collect();
            (lv["title"].as_str().expect("title").to_string(), titles)
        })
        .collect()
}

fn titles(names: &[&str]) -> Vec<String> {
    names.iter().map(ToString::to_string).collect()
}

// ---------------------------------------------------------------------------
// Setup
// ---------------------------------------------------------------------------

#[test]
fn init_twice_fails_without_force() {
    let dir = init_project();
    tk_cmd(dir.path())
        .arg("init")
        .assert()
        .failure()
        .stderr(predicate::str::contains("already initialized"));
    tk_cmd(dir.path()).args(["init", "--force"]).assert().success();
}

#[test]
fn commands_before_init_report_not_initialized() {
    let dir = TempDir::new().expect("temp dir");
    let err = tk_json_err(dir.path(), &["board", "list"]);
    assert_eq!(err["error_code"], "E1001");
    assert!(err["suggestion"].as_str().is_some_and(|s| s.contains("tk init")));
}

#[test]
fn missing_user_is_reported() {
    let dir = init_project();
    let output = tk_cmd(dir.path())
        .env_remove("TACK_USER")
        .env_remove("USER")
        .args(["board", "create", "X", "--json"])
        .output()
        .expect("tk should not crash");
    assert!(!output.status.success());
    let json: Value = serde_json::from_slice(&output.stderr).expect("valid JSON");
    assert_eq!(json["error"]["error_code"], "missing_user");
}

// ---------------------------------------------------------------------------
// Moves
// ---------------------------------------------------------------------------

#[test]
fn card_move_within_list() {
    let l = layout();
    let moved = tk_json(l.dir.path(), &["card", "move", &l.cards[2], "0"]);
    assert_eq!(moved["from"], 2);
    assert_eq!(moved["to"], 0);
    assert_eq!(moved["noop"], false);
    assert_eq!(
        snapshot(&l),
        vec![
            ("Todo".to_string(), titles(&["C", "A", "B"])),
            ("Done".to_string(), Vec::new()),
        ]
    );
}

#[test]
fn card_move_to_another_list() {
    let l = layout();
    tk_json(l.dir.path(), &["card", "move", &l.cards[1], "0", "--to", &l.done]);
    tk_json(l.dir.path(), &["card", "move", &l.cards[0], "1", "--to", &l.done]);
    assert_eq!(
        snapshot(&l),
        vec![
            ("Todo".to_string(), titles(&["C"])),
            ("Done".to_string(), titles(&["B", "A"])),
        ]
    );
}

#[test]
fn move_to_current_slot_is_a_noop() {
    let l = layout();
    let moved = tk_json(l.dir.path(), &["card", "move", &l.cards[1], "1"]);
    assert_eq!(moved["noop"], true);
    assert_eq!(moved["changed"], 0);
}

#[test]
fn out_of_range_move_is_rejected_with_code() {
    let l = layout();
    let err = tk_json_err(l.dir.path(), &["card", "move", &l.cards[0], "3"]);
    assert_eq!(err["error_code"], "E2003");

    let err = tk_json_err(l.dir.path(), &["card", "move", &l.cards[0], "-1"]);
    assert_eq!(err["error_code"], "E2003");

    // Appending to another list is allowed, one past is not.
    let err = tk_json_err(l.dir.path(), &["card", "move", &l.cards[0], "1", "--to", &l.done]);
    assert_eq!(err["error_code"], "E2003");
    assert_eq!(snapshot(&l)[0].1, titles(&["A", "B", "C"]));
}

#[test]
fn other_users_cannot_move_cards() {
    let l = layout();
    let output = tk_cmd(l.dir.path())
        .args(["--user", "mallory", "card", "move", &l.cards[0], "2", "--json"])
        .output()
        .expect("tk should not crash");
    assert!(!output.status.success());
    let json: Value = serde_json::from_slice(&output.stderr).expect("valid JSON");
    assert_eq!(json["error"]["error_code"], "E2002");
    assert_eq!(snapshot(&l)[0].1, titles(&["A", "B", "C"]));
}

#[test]
fn unknown_card_is_not_found() {
    let l = layout();
    let err = tk_json_err(l.dir.path(), &["card", "move", "c-0000000000", "0"]);
    assert_eq!(err["error_code"], "E2001");
}

#[test]
fn list_move_reorders_board() {
    let l = layout();
    let moved = tk_json(l.dir.path(), &["list", "move", &l.done, "0"]);
    assert_eq!(moved["from"], 1);
    assert_eq!(moved["to"], 0);
    let order: Vec<String> = snapshot(&l).into_iter().map(|(title, _)| title).collect();
    assert_eq!(order, titles(&["Done", "Todo"]));
}

// ---------------------------------------------------------------------------
// Reorder
// ---------------------------------------------------------------------------

#[test]
fn list_reorder_applies_mapping() {
    let l = layout();
    let a = format!("{}=2", l.cards[0]);
    let c = format!("{}=0", l.cards[2]);
    let outcome = tk_json(l.dir.path(), &["list", "reorder", &l.todo, &a, &c]);
    assert_eq!(outcome["container"], l.todo.as_str());
    assert_eq!(snapshot(&l)[0].1, titles(&["C", "B", "A"]));
}

#[test]
fn reorder_with_stale_version_conflicts() {
    let l = layout();
    let a = format!("{}=2", l.cards[0]);
    let err = tk_json_err(
        l.dir.path(),
        &["list", "reorder", &l.todo, &a, "--expected-version", "999"],
    );
    assert_eq!(err["error_code"], "E5001");
    assert_eq!(snapshot(&l)[0].1, titles(&["A", "B", "C"]));
}

#[test]
fn board_reorder_moves_lists() {
    let l = layout();
    let done = format!("{}=0", l.done);
    tk_json(l.dir.path(), &["board", "reorder", &l.board, &done]);
    let order: Vec<String> = snapshot(&l).into_iter().map(|(title, _)| title).collect();
    assert_eq!(order, titles(&["Done", "Todo"]));
}

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

#[test]
fn deleting_a_card_closes_the_gap() {
    let l = layout();
    let removed = tk_json(l.dir.path(), &["card", "delete", &l.cards[0]]);
    assert_eq!(removed["position"], 0);
    assert_eq!(removed["shifted"], 2);
    assert_eq!(snapshot(&l)[0].1, titles(&["B", "C"]));
}

#[test]
fn create_at_position_inserts() {
    let l = layout();
    let card = tk_json(
        l.dir.path(),
        &["card", "create", &l.todo, "Z", "--position", "1"],
    );
    assert_eq!(card["position"], 1);
    assert_eq!(snapshot(&l)[0].1, titles(&["A", "Z", "B", "C"]));
}

#[test]
fn assigned_cards_follow_the_assignee() {
    let l = layout();
    tk_json(l.dir.path(), &["card", "assign", &l.cards[1], "bob"]);
    let mine = tk_json(l.dir.path(), &["card", "assigned", "--assignee", "bob"]);
    let ids: Vec<&str> = mine
        .as_array()
        .expect("array")
        .iter()
        .map(|c| c["id"].as_str().expect("id"))
        .collect();
    assert_eq!(ids, vec![l.cards[1].as_str()]);

    tk_json(l.dir.path(), &["card", "assign", &l.cards[1], "--none"]);
    let mine = tk_json(l.dir.path(), &["card", "assigned", "--assignee", "bob"]);
    assert_eq!(mine.as_array().map(Vec::len), Some(0));
}

#[test]
fn labels_round_trip_through_the_cli() {
    let dir = init_project();
    let label = id_of(&tk_json(dir.path(), &["label", "create", "bug", "--color", "red"]));
    tk_json(dir.path(), &["label", "update", &label, "--name", "defect"]);
    let labels = tk_json(dir.path(), &["label", "list"]);
    assert_eq!(labels[0]["name"], "defect");
    assert_eq!(labels[0]["color"], "red");
    tk_json(dir.path(), &["label", "delete", &label]);
    assert_eq!(tk_json(dir.path(), &["label", "list"]).as_array().map(Vec::len), Some(0));
}

#[test]
fn check_reports_clean_store() {
    let l = layout();
    let report = tk_json(l.dir.path(), &["check"]);
    assert_eq!(report["violations"].as_array().map(Vec::len), Some(0));
    assert_eq!(report["containers_checked"], 3);
}

#[test]
fn text_mode_prints_tab_separated_rows() {
    let l = layout();
    tk_cmd(l.dir.path())
        .args(["--format", "text", "board", "show", &l.board])
        .assert()
        .success()
        .stdout(predicate::str::contains(format!("0.0\t{}\tA", l.cards[0])));
}
