//! Tag resource manager.

use crate::auth::{self, Action};
use crate::models::Tag;
use crate::storage::Storage;
use crate::{Error, Result};

use super::{require_membership, require_project, require_user};

/// Create a tag definition in a project.
///
/// The (title, text, background, border) tuple must be unique within the
/// project; an identical definition is a Conflict.
pub fn create(
    storage: &mut Storage,
    principal: &str,
    project_public_id: &str,
    title: &str,
    text_color: &str,
    background_color: &str,
    border_color: &str,
) -> Result<Tag> {
    let user = require_user(storage, principal)?;
    let project = require_project(storage, project_public_id)?;
    let membership = require_membership(storage, &user, &project)?;

    if !auth::authorize(&membership, Action::CreateTag) {
        return Err(Error::Forbidden("not authorized to create tags".to_string()));
    }

    if title.trim().is_empty() {
        return Err(Error::InvalidInput("tag title must not be empty".to_string()));
    }
    for (name, value) in [
        ("text color", text_color),
        ("background color", background_color),
        ("border color", border_color),
    ] {
        if value.trim().is_empty() {
            return Err(Error::InvalidInput(format!("tag {} must not be empty", name)));
        }
    }

    if storage
        .get_tag_by_definition(&project.id, title, text_color, background_color, border_color)?
        .is_some()
    {
        return Err(Error::Conflict(format!(
            "tag '{}' with these colors already exists in {}",
            title, project_public_id
        )));
    }

    let tag = Tag::new(
        project.id.clone(),
        title.to_string(),
        text_color.to_string(),
        background_color.to_string(),
        border_color.to_string(),
        user.id.clone(),
    );
    storage.create_tag(&tag)?;
    Ok(tag)
}

/// List a project's tags; requires membership.
pub fn list(
    storage: &Storage,
    principal: &str,
    project_public_id: &str,
) -> Result<Vec<Tag>> {
    let user = require_user(storage, principal)?;
    let project = require_project(storage, project_public_id)?;
    require_membership(storage, &user, &project)?;

    storage.list_tags_by_project(&project.id)
}

/// Delete a tag, cascading its marks.
pub fn delete(
    storage: &mut Storage,
    principal: &str,
    project_public_id: &str,
    tag_id: &str,
) -> Result<()> {
    let user = require_user(storage, principal)?;
    let project = require_project(storage, project_public_id)?;
    let membership = require_membership(storage, &user, &project)?;

    if !auth::authorize(&membership, Action::DeleteTag) {
        return Err(Error::Forbidden("not authorized to delete tags".to_string()));
    }

    let tag = storage.get_tag(tag_id)?;
    if tag.project_id != project.id {
        return Err(Error::NotFound(format!("Tag not found: {}", tag_id)));
    }

    storage.delete_tag_cascade(&tag.id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::{members, projects, users};
    use crate::test_utils::TestEnv;

    #[test]
    fn test_duplicate_definition_conflict() {
        let env = TestEnv::new();
        let mut storage = env.init_storage();
        users::find_or_create(&mut storage, "auth0|alice").unwrap();
        let project = projects::create(&mut storage, "auth0|alice", "Alpha", None).unwrap();

        create(&mut storage, "auth0|alice", &project.public_id, "ui", "#000", "#fff", "#ccc")
            .unwrap();
        let result =
            create(&mut storage, "auth0|alice", &project.public_id, "ui", "#000", "#fff", "#ccc");
        assert!(matches!(result, Err(Error::Conflict(_))));

        // Same title, different border: a distinct definition.
        create(&mut storage, "auth0|alice", &project.public_id, "ui", "#000", "#fff", "#eee")
            .unwrap();
    }

    #[test]
    fn test_spectator_cannot_create_tags() {
        let env = TestEnv::new();
        let mut storage = env.init_storage();
        users::find_or_create(&mut storage, "auth0|alice").unwrap();
        let bob = users::find_or_create(&mut storage, "auth0|bob").unwrap();
        let project = projects::create(&mut storage, "auth0|alice", "Alpha", None).unwrap();
        members::add(&mut storage, "auth0|alice", &project.public_id, &bob.short_id).unwrap();

        let result =
            create(&mut storage, "auth0|bob", &project.public_id, "ui", "#000", "#fff", "#ccc");
        assert!(matches!(result, Err(Error::Forbidden(_))));
    }

    #[test]
    fn test_delete_cross_project_tag_not_found() {
        let env = TestEnv::new();
        let mut storage = env.init_storage();
        users::find_or_create(&mut storage, "auth0|alice").unwrap();
        let alpha = projects::create(&mut storage, "auth0|alice", "Alpha", None).unwrap();
        let beta = projects::create(&mut storage, "auth0|alice", "Beta", None).unwrap();

        let tag =
            create(&mut storage, "auth0|alice", &alpha.public_id, "ui", "#000", "#fff", "#ccc")
                .unwrap();

        // The tag belongs to Alpha; deleting it through Beta is NotFound.
        let result = delete(&mut storage, "auth0|alice", &beta.public_id, &tag.id);
        assert!(matches!(result, Err(Error::NotFound(_))));
        storage.get_tag(&tag.id).unwrap();
    }
}
