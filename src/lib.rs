//! Bugpen - a multi-tenant project and bug tracking backend.
//!
//! This library provides the core functionality for the `bp` CLI tool:
//! projects with role-based memberships, bug reporting with project-local
//! sequence numbers, tagging, assignments, and file attachments. Every
//! resource operation is gated by the membership and authorization engine
//! in [`auth`].

pub mod audit;
pub mod auth;
pub mod cli;
pub mod config;
pub mod identity;
pub mod models;
pub mod ops;
pub mod storage;


/// Library-level error type for Bugpen operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Not initialized: run `bp system init` first")]
    NotInitialized,

    #[error("Not authenticated: no user for principal")]
    NotAuthenticated,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Already exists: {0}")]
    Conflict(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("{0}")]
    Other(String),
}

/// Result type alias for Bugpen operations.
pub type Result<T> = std::result::Result<T, Error>;
