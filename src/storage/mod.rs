//! Storage layer for Bugpen data.
//!
//! This module handles persistence of users, projects, memberships, bugs,
//! tags, marks, assignments, and attachment metadata in a single SQLite
//! database at `<data>/bugpen.db`. Attachment bytes are delegated to the
//! [`blobs::BlobStore`] collaborator.
//!
//! Uniqueness invariants (one membership per user/project pair, unique bug
//! index per project, unique tag definitions, unique marks and
//! assignments, unique public identifiers) are backed by UNIQUE
//! constraints, and every multi-row mutation (sequence assignment, cascade
//! deletes) runs inside one transaction.

pub mod blobs;

pub use blobs::{BlobStore, FsBlobStore};

use crate::models::{
    Assignment, Attachment, Bug, Mark, Membership, Project, Role, Tag, User,
};
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};

/// Maximum attempts when generating a public identifier before the
/// collision retry loop gives up with a Conflict.
pub const MAX_TOKEN_ATTEMPTS: usize = 8;

/// Storage manager for a Bugpen deployment.
pub struct Storage {
    /// Root data directory
    pub root: PathBuf,
    /// SQLite connection
    conn: Connection,
}

impl Storage {
    /// Open storage in the default data directory.
    pub fn open() -> Result<Self> {
        Self::open_with_data_dir(&get_data_dir()?)
    }

    /// Initialize storage in the default data directory.
    pub fn init() -> Result<Self> {
        Self::init_with_data_dir(&get_data_dir()?)
    }

    /// Check whether storage exists in the default data directory.
    pub fn exists() -> Result<bool> {
        Self::exists_with_data_dir(&get_data_dir()?)
    }

    /// Open previously initialized storage under the given data directory.
    pub fn open_with_data_dir(data_dir: &Path) -> Result<Self> {
        let root = data_dir.to_path_buf();
        let db_path = root.join("bugpen.db");

        if !db_path.exists() {
            return Err(Error::NotInitialized);
        }

        let conn = Connection::open(&db_path)?;
        Self::init_schema(&conn)?;

        Ok(Self { root, conn })
    }

    /// Initialize storage under the given data directory.
    pub fn init_with_data_dir(data_dir: &Path) -> Result<Self> {
        let root = data_dir.to_path_buf();
        fs::create_dir_all(&root)?;

        let db_path = root.join("bugpen.db");
        let conn = Connection::open(&db_path)?;
        Self::init_schema(&conn)?;

        Ok(Self { root, conn })
    }

    /// Check whether storage exists under the given data directory.
    pub fn exists_with_data_dir(data_dir: &Path) -> Result<bool> {
        Ok(data_dir.join("bugpen.db").exists())
    }

    /// Open the blob store next to the database.
    pub fn blob_store(&self) -> Result<FsBlobStore> {
        FsBlobStore::open(&self.root.join("blobs"))
    }

    /// Initialize the SQLite schema.
    fn init_schema(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                principal TEXT NOT NULL UNIQUE,
                short_id TEXT NOT NULL UNIQUE,
                name TEXT,
                email TEXT,
                locale TEXT,
                picture TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS projects (
                id TEXT PRIMARY KEY,
                public_id TEXT NOT NULL UNIQUE,
                title TEXT NOT NULL,
                description TEXT,
                creator_id TEXT NOT NULL REFERENCES users(id),
                bug_index INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS memberships (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL REFERENCES users(id),
                project_id TEXT NOT NULL REFERENCES projects(id),
                role TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                UNIQUE (user_id, project_id)
            );

            CREATE TABLE IF NOT EXISTS bugs (
                id TEXT PRIMARY KEY,
                project_id TEXT NOT NULL REFERENCES projects(id),
                idx INTEGER NOT NULL,
                title TEXT NOT NULL,
                description TEXT,
                reporter_id TEXT NOT NULL REFERENCES users(id),
                reproducible INTEGER NOT NULL DEFAULT 0,
                impact INTEGER NOT NULL,
                urgency INTEGER NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                UNIQUE (project_id, idx)
            );

            CREATE TABLE IF NOT EXISTS tags (
                id TEXT PRIMARY KEY,
                project_id TEXT NOT NULL REFERENCES projects(id),
                title TEXT NOT NULL,
                text_color TEXT NOT NULL,
                background_color TEXT NOT NULL,
                border_color TEXT NOT NULL,
                creator_id TEXT NOT NULL REFERENCES users(id),
                created_at TEXT NOT NULL,
                UNIQUE (project_id, title, text_color, background_color, border_color)
            );

            CREATE TABLE IF NOT EXISTS marks (
                id TEXT PRIMARY KEY,
                bug_id TEXT NOT NULL REFERENCES bugs(id),
                tag_id TEXT NOT NULL REFERENCES tags(id),
                creator_id TEXT NOT NULL REFERENCES users(id),
                created_at TEXT NOT NULL,
                UNIQUE (bug_id, tag_id)
            );

            CREATE TABLE IF NOT EXISTS assignments (
                id TEXT PRIMARY KEY,
                bug_id TEXT NOT NULL REFERENCES bugs(id),
                membership_id TEXT NOT NULL REFERENCES memberships(id),
                created_at TEXT NOT NULL,
                UNIQUE (bug_id, membership_id)
            );

            CREATE TABLE IF NOT EXISTS attachments (
                id TEXT PRIMARY KEY,
                bug_id TEXT NOT NULL REFERENCES bugs(id),
                creator_id TEXT NOT NULL REFERENCES users(id),
                title TEXT NOT NULL,
                size INTEGER NOT NULL,
                content_type TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_memberships_project ON memberships(project_id);
            CREATE INDEX IF NOT EXISTS idx_memberships_user ON memberships(user_id);
            CREATE INDEX IF NOT EXISTS idx_bugs_project ON bugs(project_id);
            CREATE INDEX IF NOT EXISTS idx_tags_project ON tags(project_id);
            CREATE INDEX IF NOT EXISTS idx_marks_bug ON marks(bug_id);
            CREATE INDEX IF NOT EXISTS idx_assignments_bug ON assignments(bug_id);
            CREATE INDEX IF NOT EXISTS idx_assignments_membership ON assignments(membership_id);
            CREATE INDEX IF NOT EXISTS idx_attachments_bug ON attachments(bug_id);
            "#,
        )?;

        Ok(())
    }

    // === User Operations ===

    /// Insert a new user.
    pub fn create_user(&mut self, user: &User) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO users
            (id, principal, short_id, name, email, locale, picture, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
            params![
                user.id,
                user.principal,
                user.short_id,
                user.name,
                user.email,
                user.locale,
                user.picture,
                user.created_at.to_rfc3339(),
                user.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Get a user by internal id.
    pub fn get_user(&self, id: &str) -> Result<User> {
        self.conn
            .query_row(
                &format!("{} WHERE id = ?1", SELECT_USER),
                [id],
                row_to_user,
            )
            .optional()?
            .ok_or_else(|| Error::NotFound(format!("User not found: {}", id)))
    }

    /// Look up a user by external principal reference.
    pub fn get_user_by_principal(&self, principal: &str) -> Result<Option<User>> {
        Ok(self
            .conn
            .query_row(
                &format!("{} WHERE principal = ?1", SELECT_USER),
                [principal],
                row_to_user,
            )
            .optional()?)
    }

    /// Look up a user by public short id.
    pub fn get_user_by_short_id(&self, short_id: &str) -> Result<Option<User>> {
        Ok(self
            .conn
            .query_row(
                &format!("{} WHERE short_id = ?1", SELECT_USER),
                [short_id],
                row_to_user,
            )
            .optional()?)
    }

    /// Update a user's profile fields.
    pub fn update_user(&mut self, user: &User) -> Result<()> {
        let changed = self.conn.execute(
            r#"
            UPDATE users
            SET name = ?2, email = ?3, locale = ?4, picture = ?5, updated_at = ?6
            WHERE id = ?1
            "#,
            params![
                user.id,
                user.name,
                user.email,
                user.locale,
                user.picture,
                Utc::now().to_rfc3339(),
            ],
        )?;
        if changed == 0 {
            return Err(Error::NotFound(format!("User not found: {}", user.id)));
        }
        Ok(())
    }

    /// Search users by profile name, word-wise: every word must appear as
    /// a substring. Capped at 10 results.
    pub fn search_users(&self, text: &str) -> Result<Vec<User>> {
        let words: Vec<&str> = text.split_whitespace().collect();
        if words.is_empty() {
            return Ok(Vec::new());
        }

        let mut sql = SELECT_USER.to_string();
        sql.push_str(" WHERE 1=1");
        let mut params_vec: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();
        for word in &words {
            sql.push_str(" AND name LIKE ?");
            params_vec.push(Box::new(format!("%{}%", word)));
        }
        sql.push_str(" ORDER BY name ASC LIMIT 10");

        let params_refs: Vec<&dyn rusqlite::ToSql> =
            params_vec.iter().map(|p| p.as_ref()).collect();

        let mut stmt = self.conn.prepare(&sql)?;
        let users: Vec<User> = stmt
            .query_map(params_refs.as_slice(), row_to_user)?
            .filter_map(|r| r.ok())
            .collect();

        Ok(users)
    }

    /// Generate a unique public short id for a user.
    pub fn next_user_short_id(&self, seed: &str) -> Result<String> {
        self.unique_token("us", seed, |token| {
            self.count_where("users", "short_id", token)
        })
    }

    // === Project Operations ===

    /// Insert a new project.
    pub fn create_project(&mut self, project: &Project) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO projects
            (id, public_id, title, description, creator_id, bug_index, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
            params![
                project.id,
                project.public_id,
                project.title,
                project.description,
                project.creator_id,
                project.bug_index,
                project.created_at.to_rfc3339(),
                project.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Insert a new project together with its creator's Administrator
    /// membership, in one transaction.
    ///
    /// A project must never be observable without its first member.
    pub fn create_project_with_creator(
        &mut self,
        project: &Project,
        membership: &Membership,
    ) -> Result<()> {
        let tx = self.conn.transaction()?;
        tx.execute(
            r#"
            INSERT INTO projects
            (id, public_id, title, description, creator_id, bug_index, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
            params![
                project.id,
                project.public_id,
                project.title,
                project.description,
                project.creator_id,
                project.bug_index,
                project.created_at.to_rfc3339(),
                project.updated_at.to_rfc3339(),
            ],
        )?;
        tx.execute(
            r#"
            INSERT INTO memberships
            (id, user_id, project_id, role, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                membership.id,
                membership.user_id,
                membership.project_id,
                membership.role.to_string(),
                membership.created_at.to_rfc3339(),
                membership.updated_at.to_rfc3339(),
            ],
        )?;
        tx.commit()?;
        Ok(())
    }

    /// Get a project by internal id.
    pub fn get_project(&self, id: &str) -> Result<Project> {
        self.conn
            .query_row(
                &format!("{} WHERE id = ?1", SELECT_PROJECT),
                [id],
                row_to_project,
            )
            .optional()?
            .ok_or_else(|| Error::NotFound(format!("Project not found: {}", id)))
    }

    /// Look up a project by public identifier.
    pub fn get_project_by_public_id(&self, public_id: &str) -> Result<Option<Project>> {
        Ok(self
            .conn
            .query_row(
                &format!("{} WHERE public_id = ?1", SELECT_PROJECT),
                [public_id],
                row_to_project,
            )
            .optional()?)
    }

    /// Update a project's title and description.
    pub fn update_project(&mut self, project: &Project) -> Result<()> {
        let changed = self.conn.execute(
            r#"
            UPDATE projects
            SET title = ?2, description = ?3, updated_at = ?4
            WHERE id = ?1
            "#,
            params![
                project.id,
                project.title,
                project.description,
                Utc::now().to_rfc3339(),
            ],
        )?;
        if changed == 0 {
            return Err(Error::NotFound(format!(
                "Project not found: {}",
                project.id
            )));
        }
        Ok(())
    }

    /// Delete a project and everything scoped to it, in one transaction.
    ///
    /// Returns the ids of the deleted attachments so the caller can clean
    /// up their blobs.
    pub fn delete_project_cascade(&mut self, project_id: &str) -> Result<Vec<String>> {
        let tx = self.conn.transaction()?;

        let attachment_ids: Vec<String> = {
            let mut stmt = tx.prepare(
                "SELECT a.id FROM attachments a
                 JOIN bugs b ON a.bug_id = b.id
                 WHERE b.project_id = ?1",
            )?;
            stmt.query_map([project_id], |row| row.get(0))?
                .filter_map(|r| r.ok())
                .collect()
        };

        tx.execute(
            "DELETE FROM marks WHERE bug_id IN (SELECT id FROM bugs WHERE project_id = ?1)",
            [project_id],
        )?;
        tx.execute(
            "DELETE FROM assignments WHERE bug_id IN (SELECT id FROM bugs WHERE project_id = ?1)",
            [project_id],
        )?;
        tx.execute(
            "DELETE FROM attachments WHERE bug_id IN (SELECT id FROM bugs WHERE project_id = ?1)",
            [project_id],
        )?;
        tx.execute("DELETE FROM bugs WHERE project_id = ?1", [project_id])?;
        tx.execute("DELETE FROM tags WHERE project_id = ?1", [project_id])?;
        tx.execute("DELETE FROM memberships WHERE project_id = ?1", [project_id])?;
        let changed = tx.execute("DELETE FROM projects WHERE id = ?1", [project_id])?;

        tx.commit()?;

        if changed == 0 {
            return Err(Error::NotFound(format!("Project not found: {}", project_id)));
        }
        Ok(attachment_ids)
    }

    /// Generate a unique public identifier for a project.
    pub fn next_project_public_id(&self, seed: &str) -> Result<String> {
        self.unique_token("pr", seed, |token| {
            self.count_where("projects", "public_id", token)
        })
    }

    // === Membership Operations ===

    /// Insert a new membership.
    pub fn create_membership(&mut self, membership: &Membership) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO memberships
            (id, user_id, project_id, role, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                membership.id,
                membership.user_id,
                membership.project_id,
                membership.role.to_string(),
                membership.created_at.to_rfc3339(),
                membership.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Look up the membership binding a user to a project.
    pub fn get_membership(&self, user_id: &str, project_id: &str) -> Result<Option<Membership>> {
        Ok(self
            .conn
            .query_row(
                &format!(
                    "{} WHERE user_id = ?1 AND project_id = ?2",
                    SELECT_MEMBERSHIP
                ),
                [user_id, project_id],
                row_to_membership,
            )
            .optional()?)
    }

    /// Get a membership by internal id.
    pub fn get_membership_by_id(&self, id: &str) -> Result<Membership> {
        self.conn
            .query_row(
                &format!("{} WHERE id = ?1", SELECT_MEMBERSHIP),
                [id],
                row_to_membership,
            )
            .optional()?
            .ok_or_else(|| Error::NotFound(format!("Membership not found: {}", id)))
    }

    /// List all memberships of a project.
    pub fn list_memberships_by_project(&self, project_id: &str) -> Result<Vec<Membership>> {
        let mut stmt = self.conn.prepare(&format!(
            "{} WHERE project_id = ?1 ORDER BY created_at ASC",
            SELECT_MEMBERSHIP
        ))?;
        let memberships = stmt
            .query_map([project_id], row_to_membership)?
            .filter_map(|r| r.ok())
            .collect();
        Ok(memberships)
    }

    /// List all memberships of a user.
    pub fn list_memberships_by_user(&self, user_id: &str) -> Result<Vec<Membership>> {
        let mut stmt = self.conn.prepare(&format!(
            "{} WHERE user_id = ?1 ORDER BY created_at ASC",
            SELECT_MEMBERSHIP
        ))?;
        let memberships = stmt
            .query_map([user_id], row_to_membership)?
            .filter_map(|r| r.ok())
            .collect();
        Ok(memberships)
    }

    /// Set a membership's role.
    pub fn update_membership_role(&mut self, id: &str, role: Role) -> Result<()> {
        let changed = self.conn.execute(
            "UPDATE memberships SET role = ?2, updated_at = ?3 WHERE id = ?1",
            params![id, role.to_string(), Utc::now().to_rfc3339()],
        )?;
        if changed == 0 {
            return Err(Error::NotFound(format!("Membership not found: {}", id)));
        }
        Ok(())
    }

    /// Delete a membership and its assignments, in one transaction.
    ///
    /// Bugs the member was assigned to persist.
    pub fn delete_membership_cascade(&mut self, id: &str) -> Result<()> {
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM assignments WHERE membership_id = ?1", [id])?;
        let changed = tx.execute("DELETE FROM memberships WHERE id = ?1", [id])?;
        tx.commit()?;

        if changed == 0 {
            return Err(Error::NotFound(format!("Membership not found: {}", id)));
        }
        Ok(())
    }

    /// Count Administrator memberships of a project.
    pub fn count_project_admins(&self, project_id: &str) -> Result<i64> {
        let count = self.conn.query_row(
            "SELECT COUNT(*) FROM memberships WHERE project_id = ?1 AND role = ?2",
            params![project_id, Role::Administrator.to_string()],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Count all memberships across all projects.
    pub fn count_memberships(&self) -> Result<i64> {
        let count = self
            .conn
            .query_row("SELECT COUNT(*) FROM memberships", [], |row| row.get(0))?;
        Ok(count)
    }

    // === Bug Operations ===

    /// Create a bug, assigning the next project-local sequence number.
    ///
    /// The counter read, the bug insert, and the counter write happen in
    /// one transaction so two concurrent reports can never share an index
    /// and the counter can never drift from the stored bugs.
    pub fn create_bug_with_index(&mut self, bug: &mut Bug) -> Result<()> {
        let tx = self.conn.transaction()?;

        let bug_index: i64 = tx
            .query_row(
                "SELECT bug_index FROM projects WHERE id = ?1",
                [&bug.project_id],
                |row| row.get(0),
            )
            .optional()?
            .ok_or_else(|| Error::NotFound(format!("Project not found: {}", bug.project_id)))?;

        bug.index = bug_index + 1;

        tx.execute(
            r#"
            INSERT INTO bugs
            (id, project_id, idx, title, description, reporter_id, reproducible,
             impact, urgency, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
            params![
                bug.id,
                bug.project_id,
                bug.index,
                bug.title,
                bug.description,
                bug.reporter_id,
                bug.reproducible as i64,
                bug.impact,
                bug.urgency,
                bug.created_at.to_rfc3339(),
                bug.updated_at.to_rfc3339(),
            ],
        )?;

        tx.execute(
            "UPDATE projects SET bug_index = ?2, updated_at = ?3 WHERE id = ?1",
            params![bug.project_id, bug.index, Utc::now().to_rfc3339()],
        )?;

        tx.commit()?;
        Ok(())
    }

    /// Get a bug by internal id.
    pub fn get_bug(&self, id: &str) -> Result<Bug> {
        self.conn
            .query_row(&format!("{} WHERE id = ?1", SELECT_BUG), [id], row_to_bug)
            .optional()?
            .ok_or_else(|| Error::NotFound(format!("Bug not found: {}", id)))
    }

    /// Look up a bug by its project-local sequence number.
    pub fn get_bug_by_index(&self, project_id: &str, index: i64) -> Result<Option<Bug>> {
        Ok(self
            .conn
            .query_row(
                &format!("{} WHERE project_id = ?1 AND idx = ?2", SELECT_BUG),
                params![project_id, index],
                row_to_bug,
            )
            .optional()?)
    }

    /// List all bugs of a project, ordered by sequence number.
    pub fn list_bugs_by_project(&self, project_id: &str) -> Result<Vec<Bug>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{} WHERE project_id = ?1 ORDER BY idx ASC", SELECT_BUG))?;
        let bugs = stmt
            .query_map([project_id], row_to_bug)?
            .filter_map(|r| r.ok())
            .collect();
        Ok(bugs)
    }

    /// Update a bug's editable fields.
    pub fn update_bug(&mut self, bug: &Bug) -> Result<()> {
        let changed = self.conn.execute(
            r#"
            UPDATE bugs
            SET title = ?2, description = ?3, reproducible = ?4, impact = ?5,
                urgency = ?6, updated_at = ?7
            WHERE id = ?1
            "#,
            params![
                bug.id,
                bug.title,
                bug.description,
                bug.reproducible as i64,
                bug.impact,
                bug.urgency,
                Utc::now().to_rfc3339(),
            ],
        )?;
        if changed == 0 {
            return Err(Error::NotFound(format!("Bug not found: {}", bug.id)));
        }
        Ok(())
    }

    /// Delete a bug and its marks, assignments, and attachment metadata,
    /// in one transaction.
    ///
    /// Returns the ids of the deleted attachments so the caller can clean
    /// up their blobs.
    pub fn delete_bug_cascade(&mut self, bug_id: &str) -> Result<Vec<String>> {
        let tx = self.conn.transaction()?;

        let attachment_ids: Vec<String> = {
            let mut stmt = tx.prepare("SELECT id FROM attachments WHERE bug_id = ?1")?;
            stmt.query_map([bug_id], |row| row.get(0))?
                .filter_map(|r| r.ok())
                .collect()
        };

        tx.execute("DELETE FROM marks WHERE bug_id = ?1", [bug_id])?;
        tx.execute("DELETE FROM assignments WHERE bug_id = ?1", [bug_id])?;
        tx.execute("DELETE FROM attachments WHERE bug_id = ?1", [bug_id])?;
        let changed = tx.execute("DELETE FROM bugs WHERE id = ?1", [bug_id])?;

        tx.commit()?;

        if changed == 0 {
            return Err(Error::NotFound(format!("Bug not found: {}", bug_id)));
        }
        Ok(attachment_ids)
    }

    // === Tag Operations ===

    /// Insert a new tag definition.
    pub fn create_tag(&mut self, tag: &Tag) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO tags
            (id, project_id, title, text_color, background_color, border_color,
             creator_id, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
            params![
                tag.id,
                tag.project_id,
                tag.title,
                tag.text_color,
                tag.background_color,
                tag.border_color,
                tag.creator_id,
                tag.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Get a tag by internal id.
    pub fn get_tag(&self, id: &str) -> Result<Tag> {
        self.conn
            .query_row(&format!("{} WHERE id = ?1", SELECT_TAG), [id], row_to_tag)
            .optional()?
            .ok_or_else(|| Error::NotFound(format!("Tag not found: {}", id)))
    }

    /// Look up a tag by its full definition tuple within a project.
    pub fn get_tag_by_definition(
        &self,
        project_id: &str,
        title: &str,
        text_color: &str,
        background_color: &str,
        border_color: &str,
    ) -> Result<Option<Tag>> {
        Ok(self
            .conn
            .query_row(
                &format!(
                    "{} WHERE project_id = ?1 AND title = ?2 AND text_color = ?3
                     AND background_color = ?4 AND border_color = ?5",
                    SELECT_TAG
                ),
                params![project_id, title, text_color, background_color, border_color],
                row_to_tag,
            )
            .optional()?)
    }

    /// List all tags of a project.
    pub fn list_tags_by_project(&self, project_id: &str) -> Result<Vec<Tag>> {
        let mut stmt = self.conn.prepare(&format!(
            "{} WHERE project_id = ?1 ORDER BY title ASC",
            SELECT_TAG
        ))?;
        let tags = stmt
            .query_map([project_id], row_to_tag)?
            .filter_map(|r| r.ok())
            .collect();
        Ok(tags)
    }

    /// Delete a tag and its marks, in one transaction.
    pub fn delete_tag_cascade(&mut self, tag_id: &str) -> Result<()> {
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM marks WHERE tag_id = ?1", [tag_id])?;
        let changed = tx.execute("DELETE FROM tags WHERE id = ?1", [tag_id])?;
        tx.commit()?;

        if changed == 0 {
            return Err(Error::NotFound(format!("Tag not found: {}", tag_id)));
        }
        Ok(())
    }

    // === Mark Operations ===

    /// Insert a new mark.
    pub fn create_mark(&mut self, mark: &Mark) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO marks (id, bug_id, tag_id, creator_id, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                mark.id,
                mark.bug_id,
                mark.tag_id,
                mark.creator_id,
                mark.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Look up the mark associating a tag with a bug.
    pub fn get_mark(&self, bug_id: &str, tag_id: &str) -> Result<Option<Mark>> {
        Ok(self
            .conn
            .query_row(
                &format!("{} WHERE bug_id = ?1 AND tag_id = ?2", SELECT_MARK),
                [bug_id, tag_id],
                row_to_mark,
            )
            .optional()?)
    }

    /// List all marks on a bug.
    pub fn list_marks_by_bug(&self, bug_id: &str) -> Result<Vec<Mark>> {
        let mut stmt = self.conn.prepare(&format!(
            "{} WHERE bug_id = ?1 ORDER BY created_at ASC",
            SELECT_MARK
        ))?;
        let marks = stmt
            .query_map([bug_id], row_to_mark)?
            .filter_map(|r| r.ok())
            .collect();
        Ok(marks)
    }

    /// Delete a mark by id.
    pub fn delete_mark(&mut self, id: &str) -> Result<()> {
        let changed = self
            .conn
            .execute("DELETE FROM marks WHERE id = ?1", [id])?;
        if changed == 0 {
            return Err(Error::NotFound(format!("Mark not found: {}", id)));
        }
        Ok(())
    }

    // === Assignment Operations ===

    /// Insert a new assignment.
    pub fn create_assignment(&mut self, assignment: &Assignment) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO assignments (id, bug_id, membership_id, created_at)
            VALUES (?1, ?2, ?3, ?4)
            "#,
            params![
                assignment.id,
                assignment.bug_id,
                assignment.membership_id,
                assignment.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Look up the assignment binding a membership to a bug.
    pub fn get_assignment(
        &self,
        bug_id: &str,
        membership_id: &str,
    ) -> Result<Option<Assignment>> {
        Ok(self
            .conn
            .query_row(
                &format!(
                    "{} WHERE bug_id = ?1 AND membership_id = ?2",
                    SELECT_ASSIGNMENT
                ),
                [bug_id, membership_id],
                row_to_assignment,
            )
            .optional()?)
    }

    /// List all assignments on a bug.
    pub fn list_assignments_by_bug(&self, bug_id: &str) -> Result<Vec<Assignment>> {
        let mut stmt = self.conn.prepare(&format!(
            "{} WHERE bug_id = ?1 ORDER BY created_at ASC",
            SELECT_ASSIGNMENT
        ))?;
        let assignments = stmt
            .query_map([bug_id], row_to_assignment)?
            .filter_map(|r| r.ok())
            .collect();
        Ok(assignments)
    }

    /// List all assignments held by a membership.
    pub fn list_assignments_by_membership(
        &self,
        membership_id: &str,
    ) -> Result<Vec<Assignment>> {
        let mut stmt = self.conn.prepare(&format!(
            "{} WHERE membership_id = ?1 ORDER BY created_at ASC",
            SELECT_ASSIGNMENT
        ))?;
        let assignments = stmt
            .query_map([membership_id], row_to_assignment)?
            .filter_map(|r| r.ok())
            .collect();
        Ok(assignments)
    }

    /// Check whether a user is currently assigned to a bug, through any of
    /// their memberships.
    pub fn is_user_assigned(&self, bug_id: &str, user_id: &str) -> Result<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM assignments a
             JOIN memberships m ON a.membership_id = m.id
             WHERE a.bug_id = ?1 AND m.user_id = ?2",
            [bug_id, user_id],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Delete an assignment by id.
    pub fn delete_assignment(&mut self, id: &str) -> Result<()> {
        let changed = self
            .conn
            .execute("DELETE FROM assignments WHERE id = ?1", [id])?;
        if changed == 0 {
            return Err(Error::NotFound(format!("Assignment not found: {}", id)));
        }
        Ok(())
    }

    // === Attachment Operations ===

    /// Insert attachment metadata.
    pub fn create_attachment(&mut self, attachment: &Attachment) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO attachments
            (id, bug_id, creator_id, title, size, content_type, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                attachment.id,
                attachment.bug_id,
                attachment.creator_id,
                attachment.title,
                attachment.size as i64,
                attachment.content_type,
                attachment.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Get attachment metadata by id.
    pub fn get_attachment(&self, id: &str) -> Result<Attachment> {
        self.conn
            .query_row(
                &format!("{} WHERE id = ?1", SELECT_ATTACHMENT),
                [id],
                row_to_attachment,
            )
            .optional()?
            .ok_or_else(|| Error::NotFound(format!("Attachment not found: {}", id)))
    }

    /// List all attachments of a bug.
    pub fn list_attachments_by_bug(&self, bug_id: &str) -> Result<Vec<Attachment>> {
        let mut stmt = self.conn.prepare(&format!(
            "{} WHERE bug_id = ?1 ORDER BY created_at ASC",
            SELECT_ATTACHMENT
        ))?;
        let attachments = stmt
            .query_map([bug_id], row_to_attachment)?
            .filter_map(|r| r.ok())
            .collect();
        Ok(attachments)
    }

    /// Delete attachment metadata by id.
    pub fn delete_attachment(&mut self, id: &str) -> Result<()> {
        let changed = self
            .conn
            .execute("DELETE FROM attachments WHERE id = ?1", [id])?;
        if changed == 0 {
            return Err(Error::NotFound(format!("Attachment not found: {}", id)));
        }
        Ok(())
    }

    // === Token helpers ===

    fn count_where(&self, table: &str, column: &str, value: &str) -> Result<i64> {
        let sql = format!("SELECT COUNT(*) FROM {} WHERE {} = ?1", table, column);
        let count = self.conn.query_row(&sql, [value], |row| row.get(0))?;
        Ok(count)
    }

    /// Bounded generate-check-retry loop for public identifiers.
    ///
    /// The UNIQUE constraint on the target column remains the final guard;
    /// this loop only avoids burning an insert on a known collision.
    fn unique_token<F>(&self, prefix: &str, seed: &str, taken: F) -> Result<String>
    where
        F: Fn(&str) -> Result<i64>,
    {
        for attempt in 0..MAX_TOKEN_ATTEMPTS {
            let token = generate_token(prefix, &format!("{}:{}", seed, attempt));
            if taken(&token)? == 0 {
                return Ok(token);
            }
        }
        Err(Error::Conflict(format!(
            "could not generate a unique '{}' identifier after {} attempts",
            prefix, MAX_TOKEN_ATTEMPTS
        )))
    }
}

const SELECT_USER: &str = "SELECT id, principal, short_id, name, email, locale, picture, \
                           created_at, updated_at FROM users";
const SELECT_PROJECT: &str = "SELECT id, public_id, title, description, creator_id, bug_index, \
                              created_at, updated_at FROM projects";
const SELECT_MEMBERSHIP: &str =
    "SELECT id, user_id, project_id, role, created_at, updated_at FROM memberships";
const SELECT_BUG: &str = "SELECT id, project_id, idx, title, description, reporter_id, \
                          reproducible, impact, urgency, created_at, updated_at FROM bugs";
const SELECT_TAG: &str = "SELECT id, project_id, title, text_color, background_color, \
                          border_color, creator_id, created_at FROM tags";
const SELECT_MARK: &str = "SELECT id, bug_id, tag_id, creator_id, created_at FROM marks";
const SELECT_ASSIGNMENT: &str = "SELECT id, bug_id, membership_id, created_at FROM assignments";
const SELECT_ATTACHMENT: &str =
    "SELECT id, bug_id, creator_id, title, size, content_type, created_at FROM attachments";

fn datetime_from_sql(s: String) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(&s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn role_from_sql(idx: usize, s: String) -> rusqlite::Result<Role> {
    s.parse().map_err(|e: String| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            rusqlite::types::Type::Text,
            Box::new(std::io::Error::new(std::io::ErrorKind::InvalidData, e)),
        )
    })
}

fn row_to_user(row: &Row) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        principal: row.get(1)?,
        short_id: row.get(2)?,
        name: row.get(3)?,
        email: row.get(4)?,
        locale: row.get(5)?,
        picture: row.get(6)?,
        created_at: datetime_from_sql(row.get(7)?),
        updated_at: datetime_from_sql(row.get(8)?),
    })
}

fn row_to_project(row: &Row) -> rusqlite::Result<Project> {
    Ok(Project {
        id: row.get(0)?,
        public_id: row.get(1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        creator_id: row.get(4)?,
        bug_index: row.get(5)?,
        created_at: datetime_from_sql(row.get(6)?),
        updated_at: datetime_from_sql(row.get(7)?),
    })
}

fn row_to_membership(row: &Row) -> rusqlite::Result<Membership> {
    Ok(Membership {
        id: row.get(0)?,
        user_id: row.get(1)?,
        project_id: row.get(2)?,
        role: role_from_sql(3, row.get(3)?)?,
        created_at: datetime_from_sql(row.get(4)?),
        updated_at: datetime_from_sql(row.get(5)?),
    })
}

fn row_to_bug(row: &Row) -> rusqlite::Result<Bug> {
    Ok(Bug {
        id: row.get(0)?,
        project_id: row.get(1)?,
        index: row.get(2)?,
        title: row.get(3)?,
        description: row.get(4)?,
        reporter_id: row.get(5)?,
        reproducible: row.get::<_, i64>(6)? != 0,
        impact: row.get::<_, i64>(7)? as u8,
        urgency: row.get::<_, i64>(8)? as u8,
        created_at: datetime_from_sql(row.get(9)?),
        updated_at: datetime_from_sql(row.get(10)?),
    })
}

fn row_to_tag(row: &Row) -> rusqlite::Result<Tag> {
    Ok(Tag {
        id: row.get(0)?,
        project_id: row.get(1)?,
        title: row.get(2)?,
        text_color: row.get(3)?,
        background_color: row.get(4)?,
        border_color: row.get(5)?,
        creator_id: row.get(6)?,
        created_at: datetime_from_sql(row.get(7)?),
    })
}

fn row_to_mark(row: &Row) -> rusqlite::Result<Mark> {
    Ok(Mark {
        id: row.get(0)?,
        bug_id: row.get(1)?,
        tag_id: row.get(2)?,
        creator_id: row.get(3)?,
        created_at: datetime_from_sql(row.get(4)?),
    })
}

fn row_to_assignment(row: &Row) -> rusqlite::Result<Assignment> {
    Ok(Assignment {
        id: row.get(0)?,
        bug_id: row.get(1)?,
        membership_id: row.get(2)?,
        created_at: datetime_from_sql(row.get(3)?),
    })
}

fn row_to_attachment(row: &Row) -> rusqlite::Result<Attachment> {
    Ok(Attachment {
        id: row.get(0)?,
        bug_id: row.get(1)?,
        creator_id: row.get(2)?,
        title: row.get(3)?,
        size: row.get::<_, i64>(4)? as u64,
        content_type: row.get(5)?,
        created_at: datetime_from_sql(row.get(6)?),
    })
}

/// Get the data directory.
///
/// Uses `BP_DATA_DIR` when set (tests and per-invocation overrides),
/// otherwise `~/.local/share/bugpen/`.
pub fn get_data_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var("BP_DATA_DIR") {
        return Ok(PathBuf::from(dir));
    }

    let data_dir = dirs::data_dir()
        .ok_or_else(|| Error::Other("Could not determine data directory".to_string()))?;
    Ok(data_dir.join("bugpen"))
}

/// Generate a public identifier token.
///
/// Format: `<prefix>-<8 hex chars>`
/// - Project prefix: "pr"
/// - User prefix: "us"
pub fn generate_token(prefix: &str, seed: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(seed.as_bytes());
    hasher.update(
        chrono::Utc::now()
            .timestamp_nanos_opt()
            .unwrap_or(0)
            .to_le_bytes(),
    );
    let hash = hasher.finalize();
    let hash_hex = format!("{:x}", hash);
    format!("{}-{}", prefix, &hash_hex[..8])
}

/// Validate that a public identifier matches the expected format.
pub fn validate_token(token: &str, prefix: &str) -> Result<()> {
    if !token.starts_with(&format!("{}-", prefix)) {
        return Err(Error::InvalidInput(format!(
            "identifier must start with '{}-', got: {}",
            prefix, token
        )));
    }

    let suffix = &token[prefix.len() + 1..];
    if suffix.len() != 8 || !suffix.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(Error::InvalidInput(format!(
            "identifier suffix must be 8 hex characters, got: {}",
            suffix
        )));
    }

    Ok(())
}
