//! Membership operations: the mutating half of the authorization engine.
//!
//! Role checks live in [`crate::auth`]; this module resolves the parties,
//! applies the transition table, and guards the last-administrator
//! invariant before touching storage.

use serde::Serialize;

use crate::auth::{self, Action};
use crate::models::{Membership, Role};
use crate::storage::Storage;
use crate::{Error, Result};

use super::{require_membership, require_project, require_user};

/// A membership as returned to the presentation layer.
#[derive(Debug, Serialize)]
pub struct MembershipView {
    pub project: String,
    pub user: String,
    pub role: Role,
}

fn view(storage: &Storage, membership: &Membership) -> Result<MembershipView> {
    let project = storage.get_project(&membership.project_id)?;
    let user = storage.get_user(&membership.user_id)?;
    Ok(MembershipView {
        project: project.public_id,
        user: user.short_id,
        role: membership.role,
    })
}

/// Add a user to a project as Spectator.
///
/// Requires Administrator or Director. Elevation past Spectator is a
/// separate, explicit `change_role` step.
pub fn add(
    storage: &mut Storage,
    principal: &str,
    project_public_id: &str,
    target_short_id: &str,
) -> Result<MembershipView> {
    let requester = require_user(storage, principal)?;
    let project = require_project(storage, project_public_id)?;
    let requester_membership = require_membership(storage, &requester, &project)?;

    if !auth::authorize(&requester_membership, Action::AddMember) {
        return Err(Error::Forbidden("not authorized to add members".to_string()));
    }

    let target = storage
        .get_user_by_short_id(target_short_id)?
        .ok_or_else(|| Error::NotFound(format!("User not found: {}", target_short_id)))?;

    if storage.get_membership(&target.id, &project.id)?.is_some() {
        return Err(Error::Conflict(format!(
            "{} is already a member of {}",
            target_short_id, project_public_id
        )));
    }

    let membership = Membership::new(target.id, project.id.clone(), Role::Spectator);
    storage.create_membership(&membership)?;
    view(storage, &membership)
}

/// Remove a member from a project, cascading their assignments.
///
/// Administrators may remove anyone; Directors only Contributors and
/// Spectators. The project must not be left with members but no
/// Administrator.
pub fn remove(
    storage: &mut Storage,
    principal: &str,
    project_public_id: &str,
    target_short_id: &str,
) -> Result<()> {
    let requester = require_user(storage, principal)?;
    let project = require_project(storage, project_public_id)?;
    let requester_membership = require_membership(storage, &requester, &project)?;

    let target = storage
        .get_user_by_short_id(target_short_id)?
        .ok_or_else(|| Error::NotFound(format!("User not found: {}", target_short_id)))?;
    let target_membership = storage
        .get_membership(&target.id, &project.id)?
        .ok_or_else(|| {
            Error::NotFound(format!(
                "{} is not a member of {}",
                target_short_id, project_public_id
            ))
        })?;

    if !auth::removal_allowed(requester_membership.role, target_membership.role) {
        return Err(Error::Forbidden("not authorized to remove this member".to_string()));
    }

    ensure_admin_remains(storage, &project.id, &target_membership, None)?;

    storage.delete_membership_cascade(&target_membership.id)
}

/// Change a member's role per the transition table.
pub fn change_role(
    storage: &mut Storage,
    principal: &str,
    project_public_id: &str,
    target_short_id: &str,
    new_role: Role,
) -> Result<MembershipView> {
    let requester = require_user(storage, principal)?;
    let project = require_project(storage, project_public_id)?;
    let requester_membership = require_membership(storage, &requester, &project)?;

    let target = storage
        .get_user_by_short_id(target_short_id)?
        .ok_or_else(|| Error::NotFound(format!("User not found: {}", target_short_id)))?;
    let target_membership = storage
        .get_membership(&target.id, &project.id)?
        .ok_or_else(|| {
            Error::NotFound(format!(
                "{} is not a member of {}",
                target_short_id, project_public_id
            ))
        })?;

    if !auth::change_role_allowed(requester_membership.role, target_membership.role, new_role) {
        return Err(Error::Forbidden("role change not authorized".to_string()));
    }

    ensure_admin_remains(storage, &project.id, &target_membership, Some(new_role))?;

    storage.update_membership_role(&target_membership.id, new_role)?;
    let updated = storage.get_membership_by_id(&target_membership.id)?;
    view(storage, &updated)
}

/// List a project's members; requires membership.
pub fn list(
    storage: &Storage,
    principal: &str,
    project_public_id: &str,
) -> Result<Vec<MembershipView>> {
    let requester = require_user(storage, principal)?;
    let project = require_project(storage, project_public_id)?;
    require_membership(storage, &requester, &project)?;

    storage
        .list_memberships_by_project(&project.id)?
        .iter()
        .map(|m| view(storage, m))
        .collect()
}

/// Reject a removal or demotion that would leave the project with
/// members but no Administrator.
///
/// `new_role` is `None` for removals. Removing the sole remaining member
/// is allowed; an empty project has no memberships to anchor.
fn ensure_admin_remains(
    storage: &Storage,
    project_id: &str,
    target: &Membership,
    new_role: Option<Role>,
) -> Result<()> {
    if target.role != Role::Administrator {
        return Ok(());
    }
    if new_role == Some(Role::Administrator) {
        return Ok(());
    }
    if storage.count_project_admins(project_id)? > 1 {
        return Ok(());
    }
    if new_role.is_none() && storage.list_memberships_by_project(project_id)?.len() == 1 {
        return Ok(());
    }
    Err(Error::Conflict(
        "project must retain at least one administrator".to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::{projects, users};
    use crate::test_utils::TestEnv;

    struct Fixture {
        storage: Storage,
        project: String,
        alice: String, // administrator
        bob: String,   // added member
    }

    /// Alice creates a project and adds Bob as Spectator.
    fn fixture() -> (TestEnv, Fixture) {
        let env = TestEnv::new();
        let mut storage = env.init_storage();
        users::find_or_create(&mut storage, "auth0|alice").unwrap();
        let bob = users::find_or_create(&mut storage, "auth0|bob").unwrap();

        let project = projects::create(&mut storage, "auth0|alice", "Alpha", None).unwrap();
        add(&mut storage, "auth0|alice", &project.public_id, &bob.short_id).unwrap();

        let alice = users::whoami(&storage, "auth0|alice").unwrap();
        let fixture = Fixture {
            storage,
            project: project.public_id,
            alice: alice.short_id,
            bob: bob.short_id,
        };
        (env, fixture)
    }

    #[test]
    fn test_new_member_is_spectator() {
        let (_env, f) = fixture();
        let members = list(&f.storage, "auth0|bob", &f.project).unwrap();
        let bob = members.iter().find(|m| m.user == f.bob).unwrap();
        assert_eq!(bob.role, Role::Spectator);
    }

    #[test]
    fn test_add_requires_director_or_above() {
        let (_env, mut f) = fixture();
        users::find_or_create(&mut f.storage, "auth0|carol").unwrap();
        let carol = users::whoami(&f.storage, "auth0|carol").unwrap();

        // Bob is a Spectator and may not add members.
        let result = add(&mut f.storage, "auth0|bob", &f.project, &carol.short_id);
        assert!(matches!(result, Err(Error::Forbidden(_))));

        // Promote Bob to Director; now he may.
        change_role(&mut f.storage, "auth0|alice", &f.project, &f.bob, Role::Director).unwrap();
        add(&mut f.storage, "auth0|bob", &f.project, &carol.short_id).unwrap();
    }

    #[test]
    fn test_add_duplicate_member_conflict() {
        let (_env, mut f) = fixture();
        let bob = f.bob.clone();
        let result = add(&mut f.storage, "auth0|alice", &f.project, &bob);
        assert!(matches!(result, Err(Error::Conflict(_))));
    }

    #[test]
    fn test_add_by_non_member_is_not_found() {
        let (_env, mut f) = fixture();
        users::find_or_create(&mut f.storage, "auth0|carol").unwrap();
        let bob = f.bob.clone();

        let result = add(&mut f.storage, "auth0|carol", &f.project, &bob);
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[test]
    fn test_change_role_per_table() {
        let (_env, mut f) = fixture();

        // Administrator promotes Spectator to Contributor.
        let v = change_role(
            &mut f.storage,
            "auth0|alice",
            &f.project,
            &f.bob,
            Role::Contributor,
        )
        .unwrap();
        assert_eq!(v.role, Role::Contributor);

        // Contributor may not change roles at all.
        let alice = f.alice.clone();
        let result = change_role(
            &mut f.storage,
            "auth0|bob",
            &f.project,
            &alice,
            Role::Spectator,
        );
        assert!(matches!(result, Err(Error::Forbidden(_))));
    }

    #[test]
    fn test_director_flips_contributor_spectator_only() {
        let (_env, mut f) = fixture();
        users::find_or_create(&mut f.storage, "auth0|carol").unwrap();
        let carol = users::whoami(&f.storage, "auth0|carol").unwrap();
        add(&mut f.storage, "auth0|alice", &f.project, &carol.short_id).unwrap();

        change_role(&mut f.storage, "auth0|alice", &f.project, &f.bob, Role::Director).unwrap();

        // Director flips Spectator -> Contributor.
        change_role(
            &mut f.storage,
            "auth0|bob",
            &f.project,
            &carol.short_id,
            Role::Contributor,
        )
        .unwrap();

        // Director may not promote to Director.
        let result = change_role(
            &mut f.storage,
            "auth0|bob",
            &f.project,
            &carol.short_id,
            Role::Director,
        );
        assert!(matches!(result, Err(Error::Forbidden(_))));

        // Director may not touch the Administrator.
        let alice = f.alice.clone();
        let result = change_role(
            &mut f.storage,
            "auth0|bob",
            &f.project,
            &alice,
            Role::Spectator,
        );
        assert!(matches!(result, Err(Error::Forbidden(_))));
    }

    #[test]
    fn test_change_role_to_same_role_forbidden() {
        let (_env, mut f) = fixture();
        let result = change_role(
            &mut f.storage,
            "auth0|alice",
            &f.project,
            &f.bob,
            Role::Spectator,
        );
        assert!(matches!(result, Err(Error::Forbidden(_))));
    }

    #[test]
    fn test_sole_admin_cannot_demote_self() {
        let (_env, mut f) = fixture();
        let alice = f.alice.clone();
        let result = change_role(
            &mut f.storage,
            "auth0|alice",
            &f.project,
            &alice,
            Role::Spectator,
        );
        assert!(matches!(result, Err(Error::Conflict(_))));
    }

    #[test]
    fn test_admin_demotes_self_once_replaced() {
        let (_env, mut f) = fixture();
        change_role(
            &mut f.storage,
            "auth0|alice",
            &f.project,
            &f.bob,
            Role::Administrator,
        )
        .unwrap();

        let alice = f.alice.clone();
        let v = change_role(
            &mut f.storage,
            "auth0|alice",
            &f.project,
            &alice,
            Role::Director,
        )
        .unwrap();
        assert_eq!(v.role, Role::Director);
    }

    #[test]
    fn test_remove_member_and_not_found_afterward() {
        let (_env, mut f) = fixture();
        let bob = f.bob.clone();
        remove(&mut f.storage, "auth0|alice", &f.project, &bob).unwrap();

        // Bob no longer has a membership; his own requests report it.
        let result = list(&f.storage, "auth0|bob", &f.project);
        assert!(matches!(result, Err(Error::NotFound(_))));

        // Removing him again is NotFound, not Forbidden.
        let result = remove(&mut f.storage, "auth0|alice", &f.project, &bob);
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[test]
    fn test_director_cannot_remove_peer_or_admin() {
        let (_env, mut f) = fixture();
        change_role(&mut f.storage, "auth0|alice", &f.project, &f.bob, Role::Director).unwrap();

        let alice = f.alice.clone();
        let result = remove(&mut f.storage, "auth0|bob", &f.project, &alice);
        assert!(matches!(result, Err(Error::Forbidden(_))));
    }

    #[test]
    fn test_sole_admin_cannot_leave_members_behind() {
        let (_env, mut f) = fixture();
        let alice = f.alice.clone();
        let result = remove(&mut f.storage, "auth0|alice", &f.project, &alice);
        assert!(matches!(result, Err(Error::Conflict(_))));
    }

    #[test]
    fn test_sole_member_admin_may_leave() {
        let env = TestEnv::new();
        let mut storage = env.init_storage();
        let alice = users::find_or_create(&mut storage, "auth0|alice").unwrap();
        let project = projects::create(&mut storage, "auth0|alice", "Solo", None).unwrap();

        remove(&mut storage, "auth0|alice", &project.public_id, &alice.short_id).unwrap();
        assert!(
            storage
                .list_memberships_by_project(&project.id)
                .unwrap()
                .is_empty()
        );
    }
}
