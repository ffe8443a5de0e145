//! Identity-provider interactions for token verification.
//!
//! Bugpen never verifies credentials itself: an externally-issued bearer
//! token is exchanged for profile claims at the provider's OIDC
//! `/userinfo` endpoint, and only the resulting principal (`sub`) enters
//! the core. `bp auth verify` uses this to resolve and sync a profile.

use serde::Deserialize;
use thiserror::Error;

/// Errors that can occur while resolving a token against the provider.
#[derive(Debug, Error)]
pub enum IdentityError {
    /// Token is invalid or expired (401 Unauthorized)
    #[error("Invalid or expired token: provider returned 401 Unauthorized")]
    Unauthorized,

    /// Token lacks required scopes (403 Forbidden)
    #[error("Token lacks required scopes: provider returned 403 Forbidden")]
    Forbidden,

    /// Network or other HTTP error
    #[error("HTTP request failed: {0}")]
    HttpError(String),

    /// Failed to parse response
    #[error("Failed to parse provider response: {0}")]
    ParseError(String),
}

/// Profile claims returned by the provider's userinfo endpoint (only the
/// fields we care about).
#[derive(Debug, Deserialize)]
pub struct ProfileClaims {
    /// Subject: the stable principal identifier
    pub sub: String,
    /// Display name (optional)
    pub name: Option<String>,
    /// Email address (optional)
    pub email: Option<String>,
    /// Preferred locale (optional)
    pub locale: Option<String>,
    /// Avatar URL (optional)
    pub picture: Option<String>,
}

/// Fetch profile claims for a bearer token from the issuer's userinfo
/// endpoint.
///
/// The issuer is the provider base URL, e.g.
/// `https://example.us.auth0.com`; trailing slashes are tolerated.
pub fn fetch_claims(issuer: &str, token: &str) -> Result<ProfileClaims, IdentityError> {
    let url = format!("{}/userinfo", issuer.trim_end_matches('/'));

    let response = ureq::get(&url)
        .set("Authorization", &format!("Bearer {}", token))
        .set("Accept", "application/json")
        .call();

    match response {
        Ok(resp) => {
            let claims: ProfileClaims = resp
                .into_json()
                .map_err(|e| IdentityError::ParseError(e.to_string()))?;
            Ok(claims)
        }
        Err(ureq::Error::Status(401, _)) => Err(IdentityError::Unauthorized),
        Err(ureq::Error::Status(403, _)) => Err(IdentityError::Forbidden),
        Err(ureq::Error::Status(code, resp)) => {
            let body = resp.into_string().unwrap_or_default();
            Err(IdentityError::HttpError(format!("HTTP {}: {}", code, body)))
        }
        Err(e) => Err(IdentityError::HttpError(e.to_string())),
    }
}
