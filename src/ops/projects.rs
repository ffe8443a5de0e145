//! Project registry operations.

use serde::Serialize;

use crate::auth::{self, Action};
use crate::models::{Membership, Project, Role};
use crate::storage::{BlobStore, Storage};
use crate::{Error, Result};

use super::{require_membership, require_project, require_user};

/// One row of the requester's project listing.
#[derive(Debug, Serialize)]
pub struct ProjectSummary {
    pub public_id: String,
    pub title: String,
    pub role: Role,
    pub member_count: usize,
}

/// A project member as seen in the project detail.
#[derive(Debug, Serialize)]
pub struct MemberView {
    pub short_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub role: Role,
}

/// Full project detail for a member.
#[derive(Debug, Serialize)]
pub struct ProjectDetail {
    pub public_id: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// The requester's own role
    pub role: Role,
    pub bug_index: i64,
    pub members: Vec<MemberView>,
    pub bug_count: usize,
}

/// Create a project; the creator becomes its first member as
/// Administrator.
pub fn create(
    storage: &mut Storage,
    principal: &str,
    title: &str,
    description: Option<String>,
) -> Result<Project> {
    let user = require_user(storage, principal)?;

    if title.trim().is_empty() {
        return Err(Error::InvalidInput("project title must not be empty".to_string()));
    }

    let public_id = storage.next_project_public_id(title)?;
    let mut project = Project::new(public_id, title.to_string(), user.id.clone());
    project.description = description;

    let membership = Membership::new(user.id.clone(), project.id.clone(), Role::Administrator);
    storage.create_project_with_creator(&project, &membership)?;

    Ok(project)
}

/// List the requester's projects with their role and member count.
pub fn list_my(storage: &Storage, principal: &str) -> Result<Vec<ProjectSummary>> {
    let user = require_user(storage, principal)?;

    let mut summaries = Vec::new();
    for membership in storage.list_memberships_by_user(&user.id)? {
        let project = storage.get_project(&membership.project_id)?;
        let member_count = storage.list_memberships_by_project(&project.id)?.len();
        summaries.push(ProjectSummary {
            public_id: project.public_id,
            title: project.title,
            role: membership.role,
            member_count,
        });
    }
    Ok(summaries)
}

/// Get a project's detail; requires membership.
pub fn get(storage: &Storage, principal: &str, public_id: &str) -> Result<ProjectDetail> {
    let user = require_user(storage, principal)?;
    let project = require_project(storage, public_id)?;
    let membership = require_membership(storage, &user, &project)?;

    let mut members = Vec::new();
    for m in storage.list_memberships_by_project(&project.id)? {
        let member = storage.get_user(&m.user_id)?;
        members.push(MemberView {
            short_id: member.short_id,
            name: member.name,
            role: m.role,
        });
    }

    let bug_count = storage.list_bugs_by_project(&project.id)?.len();

    Ok(ProjectDetail {
        public_id: project.public_id,
        title: project.title,
        description: project.description,
        role: membership.role,
        bug_index: project.bug_index,
        members,
        bug_count,
    })
}

/// Update a project's title and/or description. Administrator only.
pub fn update(
    storage: &mut Storage,
    principal: &str,
    public_id: &str,
    title: Option<String>,
    description: Option<String>,
) -> Result<Project> {
    let user = require_user(storage, principal)?;
    let mut project = require_project(storage, public_id)?;
    let membership = require_membership(storage, &user, &project)?;

    if !auth::authorize(&membership, Action::EditProject) {
        return Err(Error::Forbidden("not authorized to edit project".to_string()));
    }

    if let Some(title) = title {
        if title.trim().is_empty() {
            return Err(Error::InvalidInput("project title must not be empty".to_string()));
        }
        project.title = title;
    }
    if let Some(description) = description {
        project.description = Some(description);
    }

    storage.update_project(&project)?;
    storage.get_project(&project.id)
}

/// Delete a project and everything scoped to it. Administrator only.
pub fn delete(
    storage: &mut Storage,
    blobs: &mut dyn BlobStore,
    principal: &str,
    public_id: &str,
) -> Result<()> {
    let user = require_user(storage, principal)?;
    let project = require_project(storage, public_id)?;
    let membership = require_membership(storage, &user, &project)?;

    if !auth::authorize(&membership, Action::DeleteProject) {
        return Err(Error::Forbidden("not authorized to delete project".to_string()));
    }

    let attachment_ids = storage.delete_project_cascade(&project.id)?;
    for id in attachment_ids {
        blobs.delete(&id)?;
    }
    Ok(())
}
