//! Integration tests for membership CLI operations.
//!
//! Covers the role-transition table as exercised through the CLI, the
//! Director restrictions, the last-administrator guard, and the
//! removed-member behavior.

mod common;

use common::TestEnv;
use predicates::prelude::*;

/// Alice creates a project and adds Bob; returns (project, bob short id).
fn project_with_bob(env: &TestEnv) -> (String, String) {
    let project = env.create_project("auth0|alice", "Alpha");
    let bob = env.short_id("auth0|bob");
    env.json("auth0|alice", &["member", "add", &project, &bob]);
    (project, bob)
}

#[test]
fn test_member_add_defaults_to_spectator() {
    let env = TestEnv::init();
    let (project, bob) = project_with_bob(&env);

    let members = env.json("auth0|alice", &["member", "list", &project]);
    let bob_row = members
        .as_array()
        .unwrap()
        .iter()
        .find(|m| m["user"] == bob.as_str())
        .unwrap();
    assert_eq!(bob_row["role"], "spectator");
}

#[test]
fn test_member_add_duplicate_conflict() {
    let env = TestEnv::init();
    let (project, bob) = project_with_bob(&env);

    env.bp("auth0|alice")
        .args(["member", "add", &project, &bob])
        .assert()
        .failure()
        .stderr(predicate::str::contains("already a member"));
}

#[test]
fn test_member_add_unknown_user() {
    let env = TestEnv::init();
    let project = env.create_project("auth0|alice", "Alpha");

    env.bp("auth0|alice")
        .args(["member", "add", &project, "us-00000000"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("User not found"));
}

#[test]
fn test_spectator_cannot_add_members() {
    let env = TestEnv::init();
    let (project, _bob) = project_with_bob(&env);
    let carol = env.short_id("auth0|carol");

    env.bp("auth0|bob")
        .args(["member", "add", &project, &carol])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not authorized"));
}

#[test]
fn test_admin_promotes_through_all_roles() {
    let env = TestEnv::init();
    let (project, bob) = project_with_bob(&env);

    for role in ["contributor", "director", "administrator", "spectator"] {
        env.bp("auth0|alice")
            .args(["member", "role", &project, &bob, role])
            .assert()
            .success()
            .stdout(predicate::str::contains(&format!("\"role\":\"{}\"", role)));
    }
}

#[test]
fn test_role_change_to_current_role_forbidden() {
    let env = TestEnv::init();
    let (project, bob) = project_with_bob(&env);

    env.bp("auth0|alice")
        .args(["member", "role", &project, &bob, "spectator"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not authorized"));
}

#[test]
fn test_director_transition_limits() {
    let env = TestEnv::init();
    let (project, bob) = project_with_bob(&env);
    let alice = env.short_id("auth0|alice");
    let carol = env.short_id("auth0|carol");
    env.json("auth0|alice", &["member", "add", &project, &carol]);
    env.json("auth0|alice", &["member", "role", &project, &bob, "director"]);

    // Director flips Spectator -> Contributor.
    env.bp("auth0|bob")
        .args(["member", "role", &project, &carol, "contributor"])
        .assert()
        .success();

    // Director may not promote to Director.
    env.bp("auth0|bob")
        .args(["member", "role", &project, &carol, "director"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not authorized"));

    // Director may not touch an Administrator, including themselves.
    env.bp("auth0|bob")
        .args(["member", "role", &project, &alice, "spectator"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not authorized"));
    env.bp("auth0|bob")
        .args(["member", "role", &project, &bob, "spectator"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not authorized"));
}

#[test]
fn test_invalid_role_name_rejected() {
    let env = TestEnv::init();
    let (project, bob) = project_with_bob(&env);

    env.bp("auth0|alice")
        .args(["member", "role", &project, &bob, "owner"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown role"));
}

#[test]
fn test_director_cannot_remove_peer() {
    let env = TestEnv::init();
    let (project, bob) = project_with_bob(&env);
    let carol = env.short_id("auth0|carol");
    env.json("auth0|alice", &["member", "add", &project, &carol]);
    env.json("auth0|alice", &["member", "role", &project, &bob, "director"]);
    env.json("auth0|alice", &["member", "role", &project, &carol, "director"]);

    env.bp("auth0|bob")
        .args(["member", "remove", &project, &carol])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not authorized"));

    // An Administrator may.
    env.bp("auth0|alice")
        .args(["member", "remove", &project, &carol])
        .assert()
        .success();
}

#[test]
fn test_removed_director_gets_not_found() {
    let env = TestEnv::init();
    let (project, bob) = project_with_bob(&env);
    let carol = env.short_id("auth0|carol");
    env.json("auth0|alice", &["member", "add", &project, &carol]);
    env.json("auth0|alice", &["member", "role", &project, &bob, "director"]);

    env.bp("auth0|alice")
        .args(["member", "remove", &project, &bob])
        .assert()
        .success();

    // Bob no longer holds a membership; his role-change attempt reports
    // "not a member", not "forbidden".
    env.bp("auth0|bob")
        .args(["member", "role", &project, &carol, "contributor"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Not a member"));
}

#[test]
fn test_last_administrator_guard() {
    let env = TestEnv::init();
    let (project, bob) = project_with_bob(&env);
    let alice = env.short_id("auth0|alice");

    // Alice is the sole Administrator of a two-member project.
    env.bp("auth0|alice")
        .args(["member", "role", &project, &alice, "director"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("at least one administrator"));
    env.bp("auth0|alice")
        .args(["member", "remove", &project, &alice])
        .assert()
        .failure()
        .stderr(predicate::str::contains("at least one administrator"));

    // Once Bob is an Administrator too, Alice may step down.
    env.json("auth0|alice", &["member", "role", &project, &bob, "administrator"]);
    env.bp("auth0|alice")
        .args(["member", "role", &project, &alice, "director"])
        .assert()
        .success();
}

#[test]
fn test_sole_member_may_leave() {
    let env = TestEnv::init();
    let project = env.create_project("auth0|alice", "Solo");
    let alice = env.short_id("auth0|alice");

    env.bp("auth0|alice")
        .args(["member", "remove", &project, &alice])
        .assert()
        .success();

    env.bp("auth0|alice")
        .args(["project", "show", &project])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Not a member"));
}
