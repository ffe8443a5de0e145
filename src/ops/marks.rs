//! Mark resource manager: applying tags to bugs.

use crate::auth::{self, Action};
use crate::models::Mark;
use crate::storage::Storage;
use crate::{Error, Result};

use super::{require_bug, require_membership, require_project, require_user};

/// Mark a bug with a tag.
///
/// Both the bug and the tag must belong to the project; a bug cannot
/// carry the same tag twice.
pub fn add(
    storage: &mut Storage,
    principal: &str,
    project_public_id: &str,
    bug_index: i64,
    tag_id: &str,
) -> Result<Mark> {
    let user = require_user(storage, principal)?;
    let project = require_project(storage, project_public_id)?;
    let membership = require_membership(storage, &user, &project)?;

    if !auth::authorize(&membership, Action::MarkBug) {
        return Err(Error::Forbidden("not authorized to mark bugs".to_string()));
    }

    let bug = require_bug(storage, &project, bug_index)?;
    let tag = storage.get_tag(tag_id)?;
    if tag.project_id != project.id {
        return Err(Error::NotFound(format!("Tag not found: {}", tag_id)));
    }

    if storage.get_mark(&bug.id, &tag.id)?.is_some() {
        return Err(Error::Conflict(format!(
            "bug #{} already carries tag '{}'",
            bug_index, tag.title
        )));
    }

    let mark = Mark::new(bug.id, tag.id, user.id);
    storage.create_mark(&mark)?;
    Ok(mark)
}

/// Remove a tag from a bug.
pub fn remove(
    storage: &mut Storage,
    principal: &str,
    project_public_id: &str,
    bug_index: i64,
    tag_id: &str,
) -> Result<()> {
    let user = require_user(storage, principal)?;
    let project = require_project(storage, project_public_id)?;
    let membership = require_membership(storage, &user, &project)?;

    if !auth::authorize(&membership, Action::UnmarkBug) {
        return Err(Error::Forbidden("not authorized to unmark bugs".to_string()));
    }

    let bug = require_bug(storage, &project, bug_index)?;
    let tag = storage.get_tag(tag_id)?;
    if tag.project_id != project.id {
        return Err(Error::NotFound(format!("Tag not found: {}", tag_id)));
    }

    let mark = storage.get_mark(&bug.id, &tag.id)?.ok_or_else(|| {
        Error::NotFound(format!("bug #{} does not carry tag '{}'", bug_index, tag.title))
    })?;

    storage.delete_mark(&mark.id)
}
