//! Membership and authorization engine.
//!
//! This module holds the pure decision logic gating every project-scoped
//! operation: the per-action role floors, the ownership override for bug
//! edits, and the role-transition table governing who may change whose
//! role. All functions are deterministic and side-effect free; the ops
//! layer resolves memberships and resources, asks here for a decision, and
//! only then mutates state.

use crate::models::{Bug, Membership, Role};
use serde::{Deserialize, Serialize};
use std::fmt;

/// An action kind gated by project membership.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    ViewProject,
    EditProject,
    DeleteProject,
    AddMember,
    RemoveMember,
    CreateBug,
    EditBug,
    DeleteBug,
    CreateTag,
    DeleteTag,
    MarkBug,
    UnmarkBug,
    AssignBug,
    UnassignBug,
    AttachFile,
    DeleteAttachment,
}

impl Action {
    /// Minimum role required for this action.
    ///
    /// Capabilities are cumulative: any role with at least this authority
    /// is allowed. `EditBug` additionally has an ownership override, see
    /// [`authorize_bug_edit`].
    pub fn required_role(&self) -> Role {
        match self {
            Action::ViewProject => Role::Spectator,

            Action::CreateBug
            | Action::EditBug
            | Action::CreateTag
            | Action::DeleteTag
            | Action::MarkBug
            | Action::UnmarkBug
            | Action::AttachFile
            | Action::DeleteAttachment => Role::Contributor,

            Action::AddMember
            | Action::RemoveMember
            | Action::AssignBug
            | Action::UnassignBug => Role::Director,

            Action::EditProject | Action::DeleteProject | Action::DeleteBug => {
                Role::Administrator
            }
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Action::ViewProject => "view_project",
            Action::EditProject => "edit_project",
            Action::DeleteProject => "delete_project",
            Action::AddMember => "add_member",
            Action::RemoveMember => "remove_member",
            Action::CreateBug => "create_bug",
            Action::EditBug => "edit_bug",
            Action::DeleteBug => "delete_bug",
            Action::CreateTag => "create_tag",
            Action::DeleteTag => "delete_tag",
            Action::MarkBug => "mark_bug",
            Action::UnmarkBug => "unmark_bug",
            Action::AssignBug => "assign_bug",
            Action::UnassignBug => "unassign_bug",
            Action::AttachFile => "attach_file",
            Action::DeleteAttachment => "delete_attachment",
        };
        write!(f, "{}", s)
    }
}

/// Decide whether a membership's role authorizes an action.
pub fn authorize(membership: &Membership, action: Action) -> bool {
    membership.role.at_least(action.required_role())
}

/// Decide whether a membership may edit a specific bug.
///
/// The role floor is Contributor, with a local override below it: the
/// bug's reporter and any currently assigned member may edit regardless of
/// role. `is_assignee` is resolved by the caller against the assignment
/// records.
pub fn authorize_bug_edit(membership: &Membership, bug: &Bug, is_assignee: bool) -> bool {
    membership.role.at_least(Role::Contributor)
        || bug.reporter_id == membership.user_id
        || is_assignee
}

/// The role-transition table.
///
/// Returns true iff a requester with role `requester` may change a target
/// membership currently holding `current` to `new`. Combinations absent
/// from the table are denied, including re-asserting the current role and
/// any transition attempted by a Contributor or Spectator.
pub fn change_role_allowed(requester: Role, current: Role, new: Role) -> bool {
    match requester {
        // May retarget any role to any of the other three.
        Role::Administrator => current != new,
        // May flip Contributor <-> Spectator only.
        Role::Director => matches!(
            (current, new),
            (Role::Contributor, Role::Spectator) | (Role::Spectator, Role::Contributor)
        ),
        Role::Contributor | Role::Spectator => false,
    }
}

/// Decide whether a requester may remove a target member.
///
/// Administrators may remove anyone; Directors may remove only
/// Contributors and Spectators.
pub fn removal_allowed(requester: Role, target: Role) -> bool {
    match requester {
        Role::Administrator => true,
        Role::Director => !matches!(target, Role::Administrator | Role::Director),
        Role::Contributor | Role::Spectator => false,
    }
}
