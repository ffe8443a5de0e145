//! User directory operations: principal resolution and profiles.

use serde::Serialize;

use crate::models::User;
use crate::storage::Storage;
use crate::{Error, Result};

use super::require_user;

/// Public profile view of a user.
#[derive(Debug, Serialize)]
pub struct Profile {
    pub short_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub picture: Option<String>,
    pub memberships_count: usize,
}

impl Profile {
    fn from_user(storage: &Storage, user: &User) -> Result<Self> {
        let memberships = storage.list_memberships_by_user(&user.id)?;
        Ok(Self {
            short_id: user.short_id.clone(),
            name: user.name.clone(),
            picture: user.picture.clone(),
            memberships_count: memberships.len(),
        })
    }
}

/// Profile fields settable by the user themselves (or synced from
/// identity-provider claims).
#[derive(Debug, Default)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub email: Option<String>,
    pub locale: Option<String>,
    pub picture: Option<String>,
}

/// Resolve a principal to its User record, creating it on first sight.
///
/// This is the identity-resolver boundary: callers must only pass a
/// principal that has already been verified externally.
pub fn find_or_create(storage: &mut Storage, principal: &str) -> Result<User> {
    if principal.is_empty() {
        return Err(Error::NotAuthenticated);
    }
    if let Some(user) = storage.get_user_by_principal(principal)? {
        return Ok(user);
    }

    let short_id = storage.next_user_short_id(principal)?;
    let user = User::new(short_id, principal.to_string());
    storage.create_user(&user)?;
    Ok(user)
}

/// Return the user record behind the authenticated principal.
pub fn whoami(storage: &Storage, principal: &str) -> Result<User> {
    require_user(storage, principal)
}

/// Update the authenticated user's own profile fields.
///
/// Only the provided fields change; `None` leaves a field untouched.
pub fn update_profile(
    storage: &mut Storage,
    principal: &str,
    update: ProfileUpdate,
) -> Result<User> {
    let mut user = require_user(storage, principal)?;

    if let Some(name) = update.name {
        user.name = Some(name);
    }
    if let Some(email) = update.email {
        user.email = Some(email);
    }
    if let Some(locale) = update.locale {
        user.locale = Some(locale);
    }
    if let Some(picture) = update.picture {
        user.picture = Some(picture);
    }

    storage.update_user(&user)?;
    storage.get_user(&user.id)
}

/// Look up a user's public profile by short id.
pub fn get_profile(storage: &Storage, principal: &str, short_id: &str) -> Result<Profile> {
    require_user(storage, principal)?;
    let user = storage
        .get_user_by_short_id(short_id)?
        .ok_or_else(|| Error::NotFound(format!("User not found: {}", short_id)))?;
    Profile::from_user(storage, &user)
}

/// Search public profiles by name, word-wise, capped at 10 results.
pub fn search_profiles(storage: &Storage, principal: &str, text: &str) -> Result<Vec<Profile>> {
    require_user(storage, principal)?;
    if text.trim().is_empty() {
        return Err(Error::InvalidInput("search text not specified".to_string()));
    }

    let users = storage.search_users(text)?;
    users
        .iter()
        .map(|user| Profile::from_user(storage, user))
        .collect()
}

/// Count memberships across all projects.
pub fn memberships_count(storage: &Storage, principal: &str) -> Result<i64> {
    require_user(storage, principal)?;
    storage.count_memberships()
}
