//! Data models for Bugpen entities.
//!
//! This module defines the core data structures:
//! - `User` - Internal identity bound 1:1 to an external principal
//! - `Project` - Container for bugs, tags, and memberships
//! - `Membership` - The (user, project, role) binding used for access control
//! - `Bug` - Defects with a project-local sequence number
//! - `Tag` / `Mark` - Labels and their attachment to bugs
//! - `Assignment` - Binding of a membership to a bug
//! - `Attachment` - File metadata linked to a bug

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Membership role within a project.
///
/// Roles form a strict hierarchy; capabilities are cumulative downward.
/// `rank()` gives the explicit ordering used by the authorization engine,
/// higher meaning more authority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Administrator,
    Director,
    Contributor,
    Spectator,
}

impl Role {
    /// Numeric authority of the role, higher is more privileged.
    pub fn rank(&self) -> u8 {
        match self {
            Role::Administrator => 3,
            Role::Director => 2,
            Role::Contributor => 1,
            Role::Spectator => 0,
        }
    }

    /// Returns true if this role has at least the authority of `other`.
    pub fn at_least(&self, other: Role) -> bool {
        self.rank() >= other.rank()
    }

    /// Get all roles, highest authority first.
    pub fn all() -> &'static [Role] {
        &[
            Role::Administrator,
            Role::Director,
            Role::Contributor,
            Role::Spectator,
        ]
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Role::Administrator => "administrator",
            Role::Director => "director",
            Role::Contributor => "contributor",
            Role::Spectator => "spectator",
        };
        write!(f, "{}", s)
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "administrator" | "admin" => Ok(Role::Administrator),
            "director" => Ok(Role::Director),
            "contributor" => Ok(Role::Contributor),
            "spectator" => Ok(Role::Spectator),
            _ => Err(format!("Unknown role: {}", s)),
        }
    }
}

/// An internal user record, created on first successful authentication.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Internal identifier (UUID)
    pub id: String,

    /// External principal reference, unique, 1:1 with the identity provider
    pub principal: String,

    /// Public short identifier (e.g., "us-3fa1b2c4")
    pub short_id: String,

    /// Display name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Email address
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    /// Preferred locale
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,

    /// Avatar URL
    #[serde(skip_serializing_if = "Option::is_none")]
    pub picture: Option<String>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Create a new user bound to the given principal.
    pub fn new(short_id: String, principal: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            principal,
            short_id,
            name: None,
            email: None,
            locale: None,
            picture: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// A project owning bugs, tags, and memberships.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    /// Internal identifier (UUID)
    pub id: String,

    /// Public project identifier (e.g., "pr-9e2f44ab"), distinct from `id`
    pub public_id: String,

    /// Project title
    pub title: String,

    /// Detailed description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// User id of the creator
    pub creator_id: String,

    /// Next bug sequence counter; the latest assigned bug index
    #[serde(default)]
    pub bug_index: i64,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl Project {
    /// Create a new project with the given public id, title, and creator.
    pub fn new(public_id: String, title: String, creator_id: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            public_id,
            title,
            description: None,
            creator_id,
            bug_index: 0,
            created_at: now,
            updated_at: now,
        }
    }
}

/// The binding of a user to a project with a role.
///
/// Exactly one membership exists per (user, project) pair; every permission
/// check resolves through it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Membership {
    /// Internal identifier (UUID)
    pub id: String,

    /// User id
    pub user_id: String,

    /// Project id
    pub project_id: String,

    /// Role within the project
    pub role: Role,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl Membership {
    /// Create a new membership with the given role.
    pub fn new(user_id: String, project_id: String, role: Role) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            user_id,
            project_id,
            role,
            created_at: now,
            updated_at: now,
        }
    }
}

/// A defect tracked within a project.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bug {
    /// Internal identifier (UUID)
    pub id: String,

    /// Project id
    pub project_id: String,

    /// Project-local sequence number, stable and human-facing
    pub index: i64,

    /// Bug title
    pub title: String,

    /// Detailed description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// User id of the reporter
    pub reporter_id: String,

    /// Whether the bug is reliably reproducible
    #[serde(default)]
    pub reproducible: bool,

    /// Impact severity, 1 (lowest) to 5 (highest)
    pub impact: u8,

    /// Urgency, 1 (lowest) to 5 (highest)
    pub urgency: u8,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl Bug {
    /// Create a new bug with the given project, sequence index, and reporter.
    pub fn new(project_id: String, index: i64, title: String, reporter_id: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            project_id,
            index,
            title,
            description: None,
            reporter_id,
            reproducible: false,
            impact: 3,
            urgency: 3,
            created_at: now,
            updated_at: now,
        }
    }
}

/// A label definition scoped to a project.
///
/// The (project, title, colors) tuple is unique; duplicate definitions are
/// rejected.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tag {
    /// Internal identifier (UUID)
    pub id: String,

    /// Project id
    pub project_id: String,

    /// Tag title
    pub title: String,

    /// Text color (CSS color value)
    pub text_color: String,

    /// Background color (CSS color value)
    pub background_color: String,

    /// Border color (CSS color value)
    pub border_color: String,

    /// User id of the creator
    pub creator_id: String,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl Tag {
    /// Create a new tag definition.
    pub fn new(
        project_id: String,
        title: String,
        text_color: String,
        background_color: String,
        border_color: String,
        creator_id: String,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            project_id,
            title,
            text_color,
            background_color,
            border_color,
            creator_id,
            created_at: Utc::now(),
        }
    }
}

/// The association of a tag with a bug, unique per (bug, tag) pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Mark {
    /// Internal identifier (UUID)
    pub id: String,

    /// Bug id
    pub bug_id: String,

    /// Tag id
    pub tag_id: String,

    /// User id of the creator
    pub creator_id: String,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl Mark {
    /// Create a new mark associating a tag with a bug.
    pub fn new(bug_id: String, tag_id: String, creator_id: String) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            bug_id,
            tag_id,
            creator_id,
            created_at: Utc::now(),
        }
    }
}

/// The association of a membership with a bug, unique per (bug, membership).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Assignment {
    /// Internal identifier (UUID)
    pub id: String,

    /// Bug id
    pub bug_id: String,

    /// Membership id of the assignee
    pub membership_id: String,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl Assignment {
    /// Create a new assignment of a membership to a bug.
    pub fn new(bug_id: String, membership_id: String) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            bug_id,
            membership_id,
            created_at: Utc::now(),
        }
    }
}

/// File metadata attached to a bug; the bytes live in the blob store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attachment {
    /// Internal identifier (UUID), also the blob store key
    pub id: String,

    /// Bug id
    pub bug_id: String,

    /// User id of the uploader
    pub creator_id: String,

    /// File title
    pub title: String,

    /// Size in bytes
    pub size: u64,

    /// MIME content type
    pub content_type: String,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl Attachment {
    /// Create attachment metadata for a bug.
    pub fn new(
        bug_id: String,
        creator_id: String,
        title: String,
        size: u64,
        content_type: String,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            bug_id,
            creator_id,
            title,
            size,
            content_type,
            created_at: Utc::now(),
        }
    }
}
