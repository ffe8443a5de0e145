//! CLI argument definitions for Bugpen.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Version string with build metadata injected by build.rs.
const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("BP_GIT_COMMIT"),
    ", built ",
    env!("BP_BUILD_TIMESTAMP"),
    ")"
);

/// Bugpen - a multi-tenant project and bug tracking tool.
///
/// Every command runs as an authenticated principal, supplied with
/// `--as`, the `BP_PRINCIPAL` environment variable, or the config file.
#[derive(Parser, Debug)]
#[command(name = "bp")]
#[command(author, version, long_version = LONG_VERSION, about = "A project and bug tracking tool with role-based access", long_about = None)]
pub struct Cli {
    /// Output in human-readable format instead of JSON
    #[arg(short = 'H', long = "human", global = true)]
    pub human_readable: bool,

    /// Act as this authenticated principal.
    /// Can also be set via the BP_PRINCIPAL environment variable.
    #[arg(long = "as", value_name = "PRINCIPAL", global = true, env = "BP_PRINCIPAL")]
    pub principal: Option<String>,

    /// Data directory instead of ~/.local/share/bugpen.
    /// Can also be set via the BP_DATA_DIR environment variable.
    #[arg(long = "data-dir", global = true, env = "BP_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show the user record behind the current principal
    Whoami,

    /// Identity-provider commands
    Auth {
        #[command(subcommand)]
        command: AuthCommands,
    },

    /// Profile commands
    Profile {
        #[command(subcommand)]
        command: ProfileCommands,
    },

    /// Project management commands
    Project {
        #[command(subcommand)]
        command: ProjectCommands,
    },

    /// Membership management commands
    Member {
        #[command(subcommand)]
        command: MemberCommands,
    },

    /// Bug tracking commands
    Bug {
        #[command(subcommand)]
        command: BugCommands,
    },

    /// Tag management commands
    Tag {
        #[command(subcommand)]
        command: TagCommands,
    },

    /// Mark commands (applying tags to bugs)
    Mark {
        #[command(subcommand)]
        command: MarkCommands,
    },

    /// Assignment commands
    Assign {
        #[command(subcommand)]
        command: AssignCommands,
    },

    /// Attachment commands
    Attach {
        #[command(subcommand)]
        command: AttachCommands,
    },

    /// System administration commands
    System {
        #[command(subcommand)]
        command: SystemCommands,
    },
}

#[derive(Subcommand, Debug)]
pub enum AuthCommands {
    /// Verify a bearer token against the identity provider and sync the
    /// resulting profile
    Verify {
        /// Bearer token issued by the identity provider
        token: String,

        /// Identity-provider base URL (overrides the config file).
        /// Can also be set via the BP_ISSUER environment variable.
        #[arg(long, env = "BP_ISSUER")]
        issuer: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
pub enum ProfileCommands {
    /// Show a user's public profile
    Show {
        /// User short id (e.g., us-1a2b3c4d)
        user: String,
    },

    /// Update your own profile fields
    Update {
        /// Display name
        #[arg(long)]
        name: Option<String>,

        /// Email address
        #[arg(long)]
        email: Option<String>,

        /// Preferred locale
        #[arg(long)]
        locale: Option<String>,

        /// Avatar URL
        #[arg(long)]
        picture: Option<String>,
    },

    /// Search profiles by name
    Search {
        /// Search text; every word must match
        text: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum ProjectCommands {
    /// Create a project; you become its Administrator
    Create {
        /// Project title
        title: String,

        /// Detailed description
        #[arg(short = 'd', long)]
        description: Option<String>,
    },

    /// List your projects
    List,

    /// Show a project's detail
    Show {
        /// Project public id (e.g., pr-9e2f44ab)
        project: String,
    },

    /// Update a project's title or description (Administrator)
    Update {
        /// Project public id
        project: String,

        /// New title
        #[arg(long)]
        title: Option<String>,

        /// New description
        #[arg(short = 'd', long)]
        description: Option<String>,
    },

    /// Delete a project and everything in it (Administrator)
    Delete {
        /// Project public id
        project: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum MemberCommands {
    /// Add a user to a project as Spectator (Director and above)
    Add {
        /// Project public id
        project: String,

        /// User short id
        user: String,
    },

    /// Remove a member from a project
    Remove {
        /// Project public id
        project: String,

        /// User short id
        user: String,
    },

    /// Change a member's role
    Role {
        /// Project public id
        project: String,

        /// User short id
        user: String,

        /// New role: administrator, director, contributor, or spectator
        role: String,
    },

    /// List a project's members
    List {
        /// Project public id
        project: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum BugCommands {
    /// Report a bug (Contributor and above)
    Report {
        /// Project public id
        project: String,

        /// Bug title
        title: String,

        /// Detailed description
        #[arg(short = 'd', long)]
        description: Option<String>,

        /// Mark the bug as reliably reproducible
        #[arg(long)]
        reproducible: bool,

        /// Impact severity, 1-5
        #[arg(long, default_value_t = 3)]
        impact: u8,

        /// Urgency, 1-5
        #[arg(long, default_value_t = 3)]
        urgency: u8,
    },

    /// Show a bug by its project-local number
    Show {
        /// Project public id
        project: String,

        /// Bug number within the project
        index: i64,
    },

    /// List a project's bugs
    List {
        /// Project public id
        project: String,
    },

    /// Edit a bug (Contributor, or its reporter/assignee)
    Update {
        /// Project public id
        project: String,

        /// Bug number within the project
        index: i64,

        /// New title
        #[arg(long)]
        title: Option<String>,

        /// New description
        #[arg(short = 'd', long)]
        description: Option<String>,

        /// Set the reproducible flag
        #[arg(long)]
        reproducible: Option<bool>,

        /// New impact severity, 1-5
        #[arg(long)]
        impact: Option<u8>,

        /// New urgency, 1-5
        #[arg(long)]
        urgency: Option<u8>,
    },

    /// Delete a bug (Administrator)
    Delete {
        /// Project public id
        project: String,

        /// Bug number within the project
        index: i64,
    },
}

#[derive(Subcommand, Debug)]
pub enum TagCommands {
    /// Create a tag definition (Contributor and above)
    Create {
        /// Project public id
        project: String,

        /// Tag title
        title: String,

        /// Text color
        #[arg(long, default_value = "#000000")]
        text_color: String,

        /// Background color
        #[arg(long, default_value = "#ffffff")]
        background_color: String,

        /// Border color
        #[arg(long, default_value = "#000000")]
        border_color: String,
    },

    /// List a project's tags
    List {
        /// Project public id
        project: String,
    },

    /// Delete a tag and its marks (Contributor and above)
    Delete {
        /// Project public id
        project: String,

        /// Tag id
        tag: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum MarkCommands {
    /// Mark a bug with a tag
    Add {
        /// Project public id
        project: String,

        /// Bug number within the project
        index: i64,

        /// Tag id
        tag: String,
    },

    /// Remove a tag from a bug
    Remove {
        /// Project public id
        project: String,

        /// Bug number within the project
        index: i64,

        /// Tag id
        tag: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum AssignCommands {
    /// Assign a member to a bug (Director and above)
    Add {
        /// Project public id
        project: String,

        /// Bug number within the project
        index: i64,

        /// User short id of the assignee
        user: String,
    },

    /// Remove a member's assignment from a bug (Director and above)
    Remove {
        /// Project public id
        project: String,

        /// Bug number within the project
        index: i64,

        /// User short id of the assignee
        user: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum AttachCommands {
    /// Attach a file to a bug
    Add {
        /// Project public id
        project: String,

        /// Bug number within the project
        index: i64,

        /// Path of the file to attach
        file: PathBuf,

        /// Attachment title (defaults to the file name)
        #[arg(long)]
        title: Option<String>,

        /// MIME content type
        #[arg(long, default_value = "application/octet-stream")]
        content_type: String,
    },

    /// Download an attachment
    Get {
        /// Project public id
        project: String,

        /// Bug number within the project
        index: i64,

        /// Attachment id
        attachment: String,

        /// Write the bytes to this path instead of stdout
        #[arg(short = 'o', long)]
        output: Option<PathBuf>,
    },

    /// List a bug's attachments
    List {
        /// Project public id
        project: String,

        /// Bug number within the project
        index: i64,
    },

    /// Delete an attachment
    Remove {
        /// Project public id
        project: String,

        /// Bug number within the project
        index: i64,

        /// Attachment id
        attachment: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum SystemCommands {
    /// Initialize the data directory and database
    Init,

    /// Show deployment-wide statistics
    Stats,
}
