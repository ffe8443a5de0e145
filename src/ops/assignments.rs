//! Assignment resource manager: binding members to bugs.

use crate::auth::{self, Action};
use crate::models::Assignment;
use crate::storage::Storage;
use crate::{Error, Result};

use super::{require_bug, require_membership, require_project, require_user};

/// Assign a member to a bug. Director and above.
///
/// The assignee is referenced by user short id and must hold a
/// membership in the bug's project; a member cannot be assigned twice to
/// the same bug.
pub fn add(
    storage: &mut Storage,
    principal: &str,
    project_public_id: &str,
    bug_index: i64,
    assignee_short_id: &str,
) -> Result<Assignment> {
    let user = require_user(storage, principal)?;
    let project = require_project(storage, project_public_id)?;
    let membership = require_membership(storage, &user, &project)?;

    if !auth::authorize(&membership, Action::AssignBug) {
        return Err(Error::Forbidden("not authorized to assign bugs".to_string()));
    }

    let bug = require_bug(storage, &project, bug_index)?;

    let assignee = storage
        .get_user_by_short_id(assignee_short_id)?
        .ok_or_else(|| Error::NotFound(format!("User not found: {}", assignee_short_id)))?;
    let assignee_membership = storage
        .get_membership(&assignee.id, &project.id)?
        .ok_or_else(|| {
            Error::NotFound(format!(
                "{} is not a member of {}",
                assignee_short_id, project_public_id
            ))
        })?;

    if storage.get_assignment(&bug.id, &assignee_membership.id)?.is_some() {
        return Err(Error::Conflict(format!(
            "{} is already assigned to bug #{}",
            assignee_short_id, bug_index
        )));
    }

    let assignment = Assignment::new(bug.id, assignee_membership.id);
    storage.create_assignment(&assignment)?;
    Ok(assignment)
}

/// Remove a member's assignment from a bug. Director and above.
pub fn remove(
    storage: &mut Storage,
    principal: &str,
    project_public_id: &str,
    bug_index: i64,
    assignee_short_id: &str,
) -> Result<()> {
    let user = require_user(storage, principal)?;
    let project = require_project(storage, project_public_id)?;
    let membership = require_membership(storage, &user, &project)?;

    if !auth::authorize(&membership, Action::UnassignBug) {
        return Err(Error::Forbidden("not authorized to unassign bugs".to_string()));
    }

    let bug = require_bug(storage, &project, bug_index)?;

    let assignee = storage
        .get_user_by_short_id(assignee_short_id)?
        .ok_or_else(|| Error::NotFound(format!("User not found: {}", assignee_short_id)))?;
    let assignee_membership = storage
        .get_membership(&assignee.id, &project.id)?
        .ok_or_else(|| {
            Error::NotFound(format!(
                "{} is not a member of {}",
                assignee_short_id, project_public_id
            ))
        })?;

    let assignment = storage
        .get_assignment(&bug.id, &assignee_membership.id)?
        .ok_or_else(|| {
            Error::NotFound(format!(
                "{} is not assigned to bug #{}",
                assignee_short_id, bug_index
            ))
        })?;

    storage.delete_assignment(&assignment.id)
}
