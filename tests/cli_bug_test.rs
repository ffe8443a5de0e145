//! Integration tests for bug CLI operations.
//!
//! Exercises the project-local sequence protocol, the role floor on
//! reporting, the reporter/assignee edit override, and the administrator
//! floor on deletion.

mod common;

use common::TestEnv;
use predicates::prelude::*;

#[test]
fn test_full_project_lifecycle() {
    let env = TestEnv::init();

    // Alice creates "Alpha": she is Administrator, no bugs yet.
    let project = env.create_project("auth0|alice", "Alpha");
    let detail = env.json("auth0|alice", &["project", "show", &project]);
    assert_eq!(detail["role"], "administrator");
    assert_eq!(detail["bug_index"], 0);
    assert_eq!(detail["bug_count"], 0);

    // Alice reports "Crash on load": it becomes bug #1.
    let bug = env.json("auth0|alice", &["bug", "report", &project, "Crash on load"]);
    assert_eq!(bug["index"], 1);
    let detail = env.json("auth0|alice", &["project", "show", &project]);
    assert_eq!(detail["bug_index"], 1);

    // Alice adds Bob; as Spectator he cannot report bugs.
    let bob = env.short_id("auth0|bob");
    env.json("auth0|alice", &["member", "add", &project, &bob]);
    env.bp("auth0|bob")
        .args(["bug", "report", &project, "Nope"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not authorized"));

    // Promoted to Contributor, Bob's report receives index 2.
    env.json("auth0|alice", &["member", "role", &project, &bob, "contributor"]);
    let bug = env.json("auth0|bob", &["bug", "report", &project, "Wrong totals"]);
    assert_eq!(bug["index"], 2);
}

#[test]
fn test_bug_report_human() {
    let env = TestEnv::init();
    let project = env.create_project("auth0|alice", "Alpha");

    env.bp("auth0|alice")
        .args(["-H", "bug", "report", &project, "Crash on load"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Reported bug #1 \"Crash on load\""));
}

#[test]
fn test_bug_indexes_have_no_gaps() {
    let env = TestEnv::init();
    let project = env.create_project("auth0|alice", "Alpha");

    for i in 1..=5 {
        let bug = env.json(
            "auth0|alice",
            &["bug", "report", &project, &format!("Bug {}", i)],
        );
        assert_eq!(bug["index"], i);
    }

    let list = env.json("auth0|alice", &["bug", "list", &project]);
    let indexes: Vec<i64> = list
        .as_array()
        .unwrap()
        .iter()
        .map(|b| b["index"].as_i64().unwrap())
        .collect();
    assert_eq!(indexes, vec![1, 2, 3, 4, 5]);
}

#[test]
fn test_sequences_are_per_project() {
    let env = TestEnv::init();
    let alpha = env.create_project("auth0|alice", "Alpha");
    let beta = env.create_project("auth0|alice", "Beta");

    env.json("auth0|alice", &["bug", "report", &alpha, "First in Alpha"]);
    let bug = env.json("auth0|alice", &["bug", "report", &beta, "First in Beta"]);
    assert_eq!(bug["index"], 1);
}

#[test]
fn test_bug_report_validates_scales() {
    let env = TestEnv::init();
    let project = env.create_project("auth0|alice", "Alpha");

    env.bp("auth0|alice")
        .args(["bug", "report", &project, "Crash", "--impact", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("impact must be between 1 and 5"));

    env.bp("auth0|alice")
        .args(["bug", "report", &project, "Crash", "--urgency", "9"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("urgency must be between 1 and 5"));
}

#[test]
fn test_bug_show_detail() {
    let env = TestEnv::init();
    let project = env.create_project("auth0|alice", "Alpha");
    let alice = env.short_id("auth0|alice");

    env.json(
        "auth0|alice",
        &[
            "bug",
            "report",
            &project,
            "Crash on load",
            "-d",
            "Segfault during startup",
            "--reproducible",
            "--impact",
            "5",
            "--urgency",
            "4",
        ],
    );

    let detail = env.json("auth0|alice", &["bug", "show", &project, "1"]);
    assert_eq!(detail["title"], "Crash on load");
    assert_eq!(detail["reporter"], alice.as_str());
    assert_eq!(detail["reproducible"], true);
    assert_eq!(detail["impact"], 5);
    assert_eq!(detail["urgency"], 4);
}

#[test]
fn test_bug_show_unknown_index() {
    let env = TestEnv::init();
    let project = env.create_project("auth0|alice", "Alpha");

    env.bp("auth0|alice")
        .args(["bug", "show", &project, "7"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Bug #7 not found"));
}

#[test]
fn test_reporter_keeps_edit_rights_after_demotion() {
    let env = TestEnv::init();
    let project = env.create_project("auth0|alice", "Alpha");
    let bob = env.short_id("auth0|bob");
    env.json("auth0|alice", &["member", "add", &project, &bob]);
    env.json("auth0|alice", &["member", "role", &project, &bob, "contributor"]);

    env.json("auth0|bob", &["bug", "report", &project, "Mine"]);
    env.json("auth0|alice", &["bug", "report", &project, "Not his"]);
    env.json("auth0|alice", &["member", "role", &project, &bob, "spectator"]);

    // Bob may still edit the bug he reported.
    env.bp("auth0|bob")
        .args(["bug", "update", &project, "1", "--reproducible", "true"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"reproducible\":true"));

    // But not anyone else's.
    env.bp("auth0|bob")
        .args(["bug", "update", &project, "2", "--reproducible", "true"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not authorized"));
}

#[test]
fn test_bug_delete_is_administrator_only() {
    let env = TestEnv::init();
    let project = env.create_project("auth0|alice", "Alpha");
    let bob = env.short_id("auth0|bob");
    env.json("auth0|alice", &["member", "add", &project, &bob]);
    env.json("auth0|alice", &["member", "role", &project, &bob, "director"]);
    env.json("auth0|alice", &["bug", "report", &project, "Crash"]);

    env.bp("auth0|bob")
        .args(["bug", "delete", &project, "1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not authorized"));

    env.bp("auth0|alice")
        .args(["bug", "delete", &project, "1"])
        .assert()
        .success();

    env.bp("auth0|alice")
        .args(["bug", "show", &project, "1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not found"));
}

#[test]
fn test_spectator_is_read_only() {
    let env = TestEnv::init();
    let project = env.create_project("auth0|alice", "Alpha");
    let bob = env.short_id("auth0|bob");
    env.json("auth0|alice", &["member", "add", &project, &bob]);
    env.json("auth0|alice", &["bug", "report", &project, "Crash"]);
    let tag = env.json("auth0|alice", &["tag", "create", &project, "ui"]);
    let tag_id = tag["id"].as_str().unwrap();

    // Reads succeed.
    env.bp("auth0|bob")
        .args(["project", "show", &project])
        .assert()
        .success();
    env.bp("auth0|bob")
        .args(["bug", "show", &project, "1"])
        .assert()
        .success();

    // Every mutation is rejected.
    let mutations: Vec<Vec<&str>> = vec![
        vec!["bug", "report", project.as_str(), "New"],
        vec!["bug", "update", project.as_str(), "1", "--title", "Hijack"],
        vec!["bug", "delete", project.as_str(), "1"],
        vec!["tag", "create", project.as_str(), "backend"],
        vec!["tag", "delete", project.as_str(), tag_id],
        vec!["mark", "add", project.as_str(), "1", tag_id],
        vec!["project", "update", project.as_str(), "--title", "Hijack"],
        vec!["project", "delete", project.as_str()],
    ];
    for args in mutations {
        env.bp("auth0|bob")
            .args(&args)
            .assert()
            .failure()
            .stderr(predicate::str::contains("not authorized"));
    }
}
