//! CLI integration tests for the lock commands
//!
//! Each test runs the binary in a fresh temp directory with its own database
//! file, so no global or project config leaks in.

#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::missing_panics_doc
)]

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

struct Harness {
    dir: TempDir,
}

impl Harness {
    fn new() -> Self {
        Self {
            dir: TempDir::new().unwrap(),
        }
    }

    fn locker(&self) -> Command {
        let mut cmd = Command::cargo_bin("locker").unwrap();
        cmd.current_dir(self.dir.path())
            .env("HOME", self.dir.path())
            .env("XDG_CONFIG_HOME", self.dir.path().join("config"))
            .env_remove("LOCKER_USER")
            .env_remove("LOCKER_NAMESPACE")
            .env_remove("LOCKER_STORE_BACKEND")
            .env_remove("LOCKER_STORE_PATH")
            .env_remove("LOCKER_BUSY_TIMEOUT_MS")
            .env_remove("LOCKER_LOG_LEVEL")
            .env_remove("RUST_LOG")
            .arg("--db")
            .arg(self.dir.path().join("locker.db"));
        cmd
    }

    fn run(&self, args: &[&str]) -> assert_cmd::assert::Assert {
        self.locker().args(args).assert()
    }

    /// Resource `foobar` in label `bazbat`.
    fn seeded() -> Self {
        let h = Self::new();
        h.run(&["resource", "create", "foobar"]).success();
        h.run(&["label", "create", "bazbat"]).success();
        h.run(&["label", "add", "foobar", "--to", "bazbat"]).success();
        h
    }
}

#[test]
fn test_lock_and_status() {
    let h = Harness::seeded();

    h.run(&["lock", "bazbat", "--user", "alice"])
        .success()
        .stdout(predicate::str::contains("bazbat locked by alice"));

    h.run(&["status", "foobar"])
        .success()
        .stdout(predicate::str::contains("resource foobar is locked by alice"));
}

#[test]
fn test_conflicting_lock_exits_refused() {
    let h = Harness::seeded();
    h.run(&["lock", "bazbat", "--user", "alice"]).success();

    h.run(&["lock", "bazbat", "--user", "bob"])
        .code(3)
        .stdout(predicate::str::contains("already locked by alice"));
}

#[test]
fn test_unlock_requires_owner() {
    let h = Harness::seeded();
    h.run(&["lock", "bazbat", "--user", "alice"]).success();

    h.run(&["unlock", "bazbat", "--user", "bob"])
        .code(3)
        .stdout(predicate::str::contains("locked by alice"));

    h.locker()
        .env("LOCKER_USER", "alice")
        .args(["unlock", "bazbat"])
        .assert()
        .success()
        .stdout(predicate::str::contains("bazbat unlocked"));
}

#[test]
fn test_steal_and_list() {
    let h = Harness::seeded();
    h.run(&["lock", "bazbat", "--user", "alice"]).success();

    h.run(&["steal", "bazbat", "--user", "bob"])
        .success()
        .stdout(predicate::str::contains("stolen from alice by bob"));

    h.run(&["list", "bob"])
        .success()
        .stdout(predicate::str::contains("bazbat"));
    h.run(&["list", "alice"])
        .success()
        .stdout(predicate::str::contains("alice holds no locks"));
}

#[test]
fn test_label_show_json_document() {
    let h = Harness::seeded();
    h.run(&["lock", "bazbat", "--user", "alice", "--until", "5pm"])
        .success();

    let output = h
        .locker()
        .args(["label", "show", "bazbat", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let doc: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(
        doc,
        serde_json::json!({"state": "locked", "owner_id": "alice", "until": "5pm"})
    );
}

#[test]
fn test_batch_create_reports_each_name() {
    let h = Harness::new();
    h.run(&["resource", "create", "a", "b"]).success();

    h.run(&["resource", "create", "b", "c"])
        .code(3)
        .stdout(predicate::str::contains("b already exists"))
        .stdout(predicate::str::contains("resource c created"));

    h.run(&["resource", "list"])
        .success()
        .stdout(predicate::str::contains("a\nb\nc"));
}

#[test]
fn test_cross_kind_name_collision() {
    let h = Harness::seeded();
    h.run(&["label", "create", "foobar"])
        .code(3)
        .stdout(predicate::str::contains("foobar already exists"));
}

#[test]
fn test_invalid_name_is_user_error() {
    let h = Harness::new();
    h.run(&["resource", "create", "bad name"])
        .code(1)
        .stderr(predicate::str::contains("Invalid resource name"));
}

#[test]
fn test_missing_user_is_user_error() {
    let h = Harness::seeded();
    h.run(&["lock", "bazbat"])
        .code(1)
        .stderr(predicate::str::contains("LOCKER_USER"));
}

#[test]
fn test_empty_label_cannot_be_locked() {
    let h = Harness::new();
    h.run(&["label", "create", "empty"]).success();
    h.run(&["lock", "empty", "--user", "alice"])
        .code(3)
        .stdout(predicate::str::contains("no members"));
}

#[test]
fn test_events_relay() {
    let h = Harness::seeded();
    let input = concat!(
        r#"{"type":"lock_attempt","label":"bazbat","user_id":"alice","request_id":"r1"}"#,
        "\n",
        "not json\n",
        r#"{"type":"unlock_attempt","label":"bazbat","user_id":"bob","request_id":"r2"}"#,
        "\n",
        r#"{"type":"lock_attempt","label":"missing","user_id":"alice","request_id":"r3"}"#,
        "\n",
    );

    let output = h.locker().arg("events").write_stdin(input).output().unwrap();
    assert!(output.status.success());

    let replies: Vec<serde_json::Value> = String::from_utf8(output.stdout)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(replies.len(), 3);
    assert_eq!(replies[0]["type"], "lock_success");
    assert_eq!(replies[0]["request_id"], "r1");
    assert_eq!(replies[1]["type"], "unlock_failure");
    assert_eq!(replies[2]["type"], "lock_failure");
    assert_eq!(replies[2]["reason"], "not_found");
}

#[test]
fn test_steal_refused_by_foreign_member() {
    let h = Harness::seeded();
    h.run(&["resource", "create", "extra"]).success();
    h.run(&["label", "create", "other"]).success();
    h.run(&["label", "add", "extra", "--to", "other"]).success();
    h.run(&["lock", "bazbat", "--user", "alice"]).success();
    h.run(&["lock", "other", "--user", "carol"]).success();
    h.run(&["label", "add", "extra", "--to", "bazbat"]).success();

    h.run(&["steal", "bazbat", "--user", "bob"])
        .code(3)
        .stdout(predicate::str::contains("extra is locked by carol"));
    h.run(&["status", "bazbat"])
        .success()
        .stdout(predicate::str::contains("locked by alice"));
}
