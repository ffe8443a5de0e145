//! Bug resource manager.

use serde::Serialize;

use crate::auth::{self, Action};
use crate::models::Bug;
use crate::storage::{BlobStore, Storage};
use crate::{Error, Result};

use super::{require_bug, require_membership, require_project, require_user};

/// Fields accepted when reporting a bug.
#[derive(Debug)]
pub struct BugDraft {
    pub title: String,
    pub description: Option<String>,
    pub reproducible: bool,
    pub impact: u8,
    pub urgency: u8,
}

/// Partial update to a bug; `None` leaves a field untouched.
#[derive(Debug, Default)]
pub struct BugPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub reproducible: Option<bool>,
    pub impact: Option<u8>,
    pub urgency: Option<u8>,
}

/// Bug detail with its associations resolved.
#[derive(Debug, Serialize)]
pub struct BugDetail {
    pub index: i64,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub reporter: String,
    pub reproducible: bool,
    pub impact: u8,
    pub urgency: u8,
    pub tags: Vec<String>,
    pub assignees: Vec<String>,
    pub attachments: Vec<String>,
}

fn validate_scale(name: &str, value: u8) -> Result<()> {
    if !(1..=5).contains(&value) {
        return Err(Error::InvalidInput(format!(
            "{} must be between 1 and 5, got {}",
            name, value
        )));
    }
    Ok(())
}

/// Report a bug; assigns the next project-local sequence number.
pub fn report(
    storage: &mut Storage,
    principal: &str,
    project_public_id: &str,
    draft: BugDraft,
) -> Result<Bug> {
    let user = require_user(storage, principal)?;
    let project = require_project(storage, project_public_id)?;
    let membership = require_membership(storage, &user, &project)?;

    if !auth::authorize(&membership, Action::CreateBug) {
        return Err(Error::Forbidden("not authorized to report bugs".to_string()));
    }

    if draft.title.trim().is_empty() {
        return Err(Error::InvalidInput("bug title must not be empty".to_string()));
    }
    validate_scale("impact", draft.impact)?;
    validate_scale("urgency", draft.urgency)?;

    let mut bug = Bug::new(project.id.clone(), 0, draft.title, user.id.clone());
    bug.description = draft.description;
    bug.reproducible = draft.reproducible;
    bug.impact = draft.impact;
    bug.urgency = draft.urgency;

    storage.create_bug_with_index(&mut bug)?;
    Ok(bug)
}

/// Get a bug's detail by project-local index; requires membership.
pub fn get(
    storage: &Storage,
    principal: &str,
    project_public_id: &str,
    index: i64,
) -> Result<BugDetail> {
    let user = require_user(storage, principal)?;
    let project = require_project(storage, project_public_id)?;
    require_membership(storage, &user, &project)?;

    let bug = require_bug(storage, &project, index)?;

    let mut tags = Vec::new();
    for mark in storage.list_marks_by_bug(&bug.id)? {
        tags.push(storage.get_tag(&mark.tag_id)?.title);
    }

    let mut assignees = Vec::new();
    for assignment in storage.list_assignments_by_bug(&bug.id)? {
        let membership = storage.get_membership_by_id(&assignment.membership_id)?;
        assignees.push(storage.get_user(&membership.user_id)?.short_id);
    }

    let attachments = storage
        .list_attachments_by_bug(&bug.id)?
        .into_iter()
        .map(|a| a.title)
        .collect();

    let reporter = storage.get_user(&bug.reporter_id)?.short_id;

    Ok(BugDetail {
        index: bug.index,
        title: bug.title,
        description: bug.description,
        reporter,
        reproducible: bug.reproducible,
        impact: bug.impact,
        urgency: bug.urgency,
        tags,
        assignees,
        attachments,
    })
}

/// List a project's bugs in sequence order; requires membership.
pub fn list(
    storage: &Storage,
    principal: &str,
    project_public_id: &str,
) -> Result<Vec<Bug>> {
    let user = require_user(storage, principal)?;
    let project = require_project(storage, project_public_id)?;
    require_membership(storage, &user, &project)?;

    storage.list_bugs_by_project(&project.id)
}

/// Edit a bug.
///
/// Allowed for Contributor and above, and for the bug's reporter or a
/// currently assigned member regardless of role.
pub fn update(
    storage: &mut Storage,
    principal: &str,
    project_public_id: &str,
    index: i64,
    patch: BugPatch,
) -> Result<Bug> {
    let user = require_user(storage, principal)?;
    let project = require_project(storage, project_public_id)?;
    let membership = require_membership(storage, &user, &project)?;
    let mut bug = require_bug(storage, &project, index)?;

    let is_assignee = storage.is_user_assigned(&bug.id, &user.id)?;
    if !auth::authorize_bug_edit(&membership, &bug, is_assignee) {
        return Err(Error::Forbidden("not authorized to edit this bug".to_string()));
    }

    if let Some(title) = patch.title {
        if title.trim().is_empty() {
            return Err(Error::InvalidInput("bug title must not be empty".to_string()));
        }
        bug.title = title;
    }
    if let Some(description) = patch.description {
        bug.description = Some(description);
    }
    if let Some(reproducible) = patch.reproducible {
        bug.reproducible = reproducible;
    }
    if let Some(impact) = patch.impact {
        validate_scale("impact", impact)?;
        bug.impact = impact;
    }
    if let Some(urgency) = patch.urgency {
        validate_scale("urgency", urgency)?;
        bug.urgency = urgency;
    }

    storage.update_bug(&bug)?;
    storage.get_bug(&bug.id)
}

/// Delete a bug, cascading its marks, assignments, and attachments.
/// Administrator only.
pub fn delete(
    storage: &mut Storage,
    blobs: &mut dyn BlobStore,
    principal: &str,
    project_public_id: &str,
    index: i64,
) -> Result<()> {
    let user = require_user(storage, principal)?;
    let project = require_project(storage, project_public_id)?;
    let membership = require_membership(storage, &user, &project)?;
    let bug = require_bug(storage, &project, index)?;

    if !auth::authorize(&membership, Action::DeleteBug) {
        return Err(Error::Forbidden("not authorized to delete bugs".to_string()));
    }

    let attachment_ids = storage.delete_bug_cascade(&bug.id)?;
    for id in attachment_ids {
        blobs.delete(&id)?;
    }
    Ok(())
}
