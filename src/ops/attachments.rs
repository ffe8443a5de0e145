//! Attachment resource manager.
//!
//! Metadata lives in the relational store; bytes go through the
//! [`BlobStore`] collaborator keyed by attachment id. Attaching to and
//! detaching from a bug follow the bug-edit authorization, including the
//! reporter/assignee override.

use crate::auth;
use crate::models::Attachment;
use crate::storage::{BlobStore, Storage};
use crate::{Error, Result};

use super::{require_bug, require_membership, require_project, require_user};

/// Attach a file to a bug.
pub fn add(
    storage: &mut Storage,
    blobs: &mut dyn BlobStore,
    principal: &str,
    project_public_id: &str,
    bug_index: i64,
    title: &str,
    content_type: &str,
    bytes: &[u8],
) -> Result<Attachment> {
    let user = require_user(storage, principal)?;
    let project = require_project(storage, project_public_id)?;
    let membership = require_membership(storage, &user, &project)?;
    let bug = require_bug(storage, &project, bug_index)?;

    let is_assignee = storage.is_user_assigned(&bug.id, &user.id)?;
    if !auth::authorize_bug_edit(&membership, &bug, is_assignee) {
        return Err(Error::Forbidden("not authorized to attach files to this bug".to_string()));
    }

    if title.trim().is_empty() {
        return Err(Error::InvalidInput("attachment title must not be empty".to_string()));
    }

    let attachment = Attachment::new(
        bug.id,
        user.id,
        title.to_string(),
        bytes.len() as u64,
        content_type.to_string(),
    );

    // Bytes first, then metadata; a failed insert leaves an orphaned blob
    // to clean up rather than metadata pointing at nothing.
    blobs.put(&attachment.id, bytes)?;
    if let Err(e) = storage.create_attachment(&attachment) {
        let _ = blobs.delete(&attachment.id);
        return Err(e);
    }

    Ok(attachment)
}

/// Read an attachment's metadata and bytes; requires membership.
pub fn get(
    storage: &Storage,
    blobs: &dyn BlobStore,
    principal: &str,
    project_public_id: &str,
    bug_index: i64,
    attachment_id: &str,
) -> Result<(Attachment, Vec<u8>)> {
    let user = require_user(storage, principal)?;
    let project = require_project(storage, project_public_id)?;
    require_membership(storage, &user, &project)?;
    let bug = require_bug(storage, &project, bug_index)?;

    let attachment = storage.get_attachment(attachment_id)?;
    if attachment.bug_id != bug.id {
        return Err(Error::NotFound(format!("Attachment not found: {}", attachment_id)));
    }

    let bytes = blobs.get(&attachment.id)?;
    Ok((attachment, bytes))
}

/// List a bug's attachments; requires membership.
pub fn list(
    storage: &Storage,
    principal: &str,
    project_public_id: &str,
    bug_index: i64,
) -> Result<Vec<Attachment>> {
    let user = require_user(storage, principal)?;
    let project = require_project(storage, project_public_id)?;
    require_membership(storage, &user, &project)?;
    let bug = require_bug(storage, &project, bug_index)?;

    storage.list_attachments_by_bug(&bug.id)
}

/// Delete an attachment, metadata and bytes.
pub fn remove(
    storage: &mut Storage,
    blobs: &mut dyn BlobStore,
    principal: &str,
    project_public_id: &str,
    bug_index: i64,
    attachment_id: &str,
) -> Result<()> {
    let user = require_user(storage, principal)?;
    let project = require_project(storage, project_public_id)?;
    let membership = require_membership(storage, &user, &project)?;
    let bug = require_bug(storage, &project, bug_index)?;

    let is_assignee = storage.is_user_assigned(&bug.id, &user.id)?;
    if !auth::authorize_bug_edit(&membership, &bug, is_assignee) {
        return Err(Error::Forbidden("not authorized to delete attachments on this bug".to_string()));
    }

    let attachment = storage.get_attachment(attachment_id)?;
    if attachment.bug_id != bug.id {
        return Err(Error::NotFound(format!("Attachment not found: {}", attachment_id)));
    }

    storage.delete_attachment(&attachment.id)?;
    blobs.delete(&attachment.id)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::bugs::{self, BugDraft};
    use crate::ops::{members, projects, users};
    use crate::test_utils::TestEnv;

    fn draft(title: &str) -> BugDraft {
        BugDraft {
            title: title.to_string(),
            description: None,
            reproducible: false,
            impact: 3,
            urgency: 3,
        }
    }

    #[test]
    fn test_attach_and_read_back() {
        let env = TestEnv::new();
        let mut storage = env.init_storage();
        let mut blobs = storage.blob_store().unwrap();
        users::find_or_create(&mut storage, "auth0|alice").unwrap();
        let project = projects::create(&mut storage, "auth0|alice", "Alpha", None).unwrap();
        let bug = bugs::report(&mut storage, "auth0|alice", &project.public_id, draft("Crash"))
            .unwrap();

        let attachment = add(
            &mut storage,
            &mut blobs,
            "auth0|alice",
            &project.public_id,
            bug.index,
            "trace.log",
            "text/plain",
            b"panic at main.rs:1",
        )
        .unwrap();
        assert_eq!(attachment.size, 18);

        let (meta, bytes) = get(
            &storage,
            &blobs,
            "auth0|alice",
            &project.public_id,
            bug.index,
            &attachment.id,
        )
        .unwrap();
        assert_eq!(meta.title, "trace.log");
        assert_eq!(bytes, b"panic at main.rs:1");
    }

    #[test]
    fn test_spectator_cannot_attach_to_foreign_bug() {
        let env = TestEnv::new();
        let mut storage = env.init_storage();
        let mut blobs = storage.blob_store().unwrap();
        users::find_or_create(&mut storage, "auth0|alice").unwrap();
        let bob = users::find_or_create(&mut storage, "auth0|bob").unwrap();
        let project = projects::create(&mut storage, "auth0|alice", "Alpha", None).unwrap();
        members::add(&mut storage, "auth0|alice", &project.public_id, &bob.short_id).unwrap();
        let bug = bugs::report(&mut storage, "auth0|alice", &project.public_id, draft("Crash"))
            .unwrap();

        let result = add(
            &mut storage,
            &mut blobs,
            "auth0|bob",
            &project.public_id,
            bug.index,
            "notes.txt",
            "text/plain",
            b"hello",
        );
        assert!(matches!(result, Err(Error::Forbidden(_))));
    }

    #[test]
    fn test_assignee_override_allows_attaching() {
        let env = TestEnv::new();
        let mut storage = env.init_storage();
        let mut blobs = storage.blob_store().unwrap();
        users::find_or_create(&mut storage, "auth0|alice").unwrap();
        let bob = users::find_or_create(&mut storage, "auth0|bob").unwrap();
        let project = projects::create(&mut storage, "auth0|alice", "Alpha", None).unwrap();
        members::add(&mut storage, "auth0|alice", &project.public_id, &bob.short_id).unwrap();
        let bug = bugs::report(&mut storage, "auth0|alice", &project.public_id, draft("Crash"))
            .unwrap();
        crate::ops::assignments::add(
            &mut storage,
            "auth0|alice",
            &project.public_id,
            bug.index,
            &bob.short_id,
        )
        .unwrap();

        // Bob is still a Spectator, but assigned.
        add(
            &mut storage,
            &mut blobs,
            "auth0|bob",
            &project.public_id,
            bug.index,
            "repro.txt",
            "text/plain",
            b"steps",
        )
        .unwrap();
    }

    #[test]
    fn test_remove_deletes_bytes() {
        let env = TestEnv::new();
        let mut storage = env.init_storage();
        let mut blobs = storage.blob_store().unwrap();
        users::find_or_create(&mut storage, "auth0|alice").unwrap();
        let project = projects::create(&mut storage, "auth0|alice", "Alpha", None).unwrap();
        let bug = bugs::report(&mut storage, "auth0|alice", &project.public_id, draft("Crash"))
            .unwrap();

        let attachment = add(
            &mut storage,
            &mut blobs,
            "auth0|alice",
            &project.public_id,
            bug.index,
            "trace.log",
            "text/plain",
            b"bytes",
        )
        .unwrap();

        remove(
            &mut storage,
            &mut blobs,
            "auth0|alice",
            &project.public_id,
            bug.index,
            &attachment.id,
        )
        .unwrap();

        assert!(storage.get_attachment(&attachment.id).is_err());
        assert!(blobs.get(&attachment.id).is_err());
    }

    #[test]
    fn test_cross_bug_attachment_not_found() {
        let env = TestEnv::new();
        let mut storage = env.init_storage();
        let mut blobs = storage.blob_store().unwrap();
        users::find_or_create(&mut storage, "auth0|alice").unwrap();
        let project = projects::create(&mut storage, "auth0|alice", "Alpha", None).unwrap();
        let first = bugs::report(&mut storage, "auth0|alice", &project.public_id, draft("One"))
            .unwrap();
        let second = bugs::report(&mut storage, "auth0|alice", &project.public_id, draft("Two"))
            .unwrap();

        let attachment = add(
            &mut storage,
            &mut blobs,
            "auth0|alice",
            &project.public_id,
            first.index,
            "trace.log",
            "text/plain",
            b"bytes",
        )
        .unwrap();

        // The attachment belongs to bug #1; reading it through bug #2 is
        // NotFound.
        let result = get(
            &storage,
            &blobs,
            "auth0|alice",
            &project.public_id,
            second.index,
            &attachment.id,
        );
        assert!(matches!(result, Err(Error::NotFound(_))));
    }
}
