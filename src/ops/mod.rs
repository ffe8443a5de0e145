//! Resource managers for Bugpen entities.
//!
//! Each submodule manages one resource type scoped to a project. Every
//! mutating operation follows the same sequence:
//!
//! 1. Resolve the requester's membership in the project ("not a member"
//!    if absent, never a silent Spectator default).
//! 2. Resolve the target resource scoped to that project (a reference
//!    into a different project is "not found", never honored).
//! 3. Ask the authorization engine ([`crate::auth`]) for a decision.
//! 4. Apply the mutation through the storage layer, transactionally.

pub mod assignments;
pub mod attachments;
pub mod bugs;
pub mod marks;
pub mod members;
pub mod projects;
pub mod tags;
pub mod users;

use crate::models::{Bug, Membership, Project, User};
use crate::storage::Storage;
use crate::{Error, Result};

/// Resolve the internal user for an authenticated principal.
pub(crate) fn require_user(storage: &Storage, principal: &str) -> Result<User> {
    storage
        .get_user_by_principal(principal)?
        .ok_or(Error::NotAuthenticated)
}

/// Resolve a project by its public identifier.
pub(crate) fn require_project(storage: &Storage, public_id: &str) -> Result<Project> {
    storage
        .get_project_by_public_id(public_id)?
        .ok_or_else(|| Error::NotFound(format!("Project not found: {}", public_id)))
}

/// The universal gate: the requester's membership in the project.
pub(crate) fn require_membership(
    storage: &Storage,
    user: &User,
    project: &Project,
) -> Result<Membership> {
    storage
        .get_membership(&user.id, &project.id)?
        .ok_or_else(|| {
            Error::NotFound(format!("Not a member of project {}", project.public_id))
        })
}

/// Resolve a bug by its project-local sequence number.
pub(crate) fn require_bug(storage: &Storage, project: &Project, index: i64) -> Result<Bug> {
    storage.get_bug_by_index(&project.id, index)?.ok_or_else(|| {
        Error::NotFound(format!(
            "Bug #{} not found in project {}",
            index, project.public_id
        ))
    })
}
