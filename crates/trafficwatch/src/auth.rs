//! Authentication and authorization.
//!
//! Two policies guard the API:
//!
//! - Staff: mutating requests carry HTTP Basic credentials of a staff user.
//!   Requests without credentials, or from a non-staff user, are refused;
//!   credentials that do not verify are rejected as unauthenticated.
//! - Sensor: observation ingestion carries the shared `X-API-KEY` secret.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHasher, PasswordVerifier, SaltString},
    Argon2, PasswordHash,
};
use base64::Engine;
use tracing::debug;

use crate::error::{Error, Result};
use crate::model::User;
use crate::storage::UserCredentials;

/// Name of the header carrying the sensor secret.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Hash a password with Argon2 and a fresh salt.
///
/// # Errors
///
/// Returns [`Error::PasswordHash`] if hashing fails.
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| Error::PasswordHash(e.to_string()))
}

/// Check a password against a stored PHC hash.
///
/// # Errors
///
/// Returns [`Error::PasswordHash`] if the stored hash cannot be parsed.
pub fn verify_password(password: &str, hash: &str) -> Result<bool> {
    let parsed = PasswordHash::new(hash).map_err(|e| Error::PasswordHash(e.to_string()))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

/// Username and password from an `Authorization: Basic` header.
#[derive(Clone, PartialEq, Eq)]
pub struct BasicCredentials {
    /// Login name.
    pub username: String,
    /// Plain-text password.
    pub password: String,
}

impl std::fmt::Debug for BasicCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BasicCredentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl BasicCredentials {
    /// Parse an `Authorization` header value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Unauthenticated`] if the value is not well-formed
    /// Basic credentials.
    pub fn parse(header: &str) -> Result<Self> {
        let (scheme, encoded) = header
            .trim()
            .split_once(' ')
            .ok_or(Error::Unauthenticated)?;
        if !scheme.eq_ignore_ascii_case("basic") {
            return Err(Error::Unauthenticated);
        }

        let decoded = base64::engine::general_purpose::STANDARD
            .decode(encoded.trim())
            .map_err(|_| Error::Unauthenticated)?;
        let text = String::from_utf8(decoded).map_err(|_| Error::Unauthenticated)?;
        let (username, password) = text.split_once(':').ok_or(Error::Unauthenticated)?;

        Ok(Self {
            username: username.to_string(),
            password: password.to_string(),
        })
    }

    /// Encode as an `Authorization` header value.
    #[must_use]
    pub fn to_header(&self) -> String {
        let raw = format!("{}:{}", self.username, self.password);
        format!(
            "Basic {}",
            base64::engine::general_purpose::STANDARD.encode(raw)
        )
    }
}

/// Parse an optional `Authorization` header.
///
/// Returns `None` for anonymous callers.
///
/// # Errors
///
/// Returns [`Error::Unauthenticated`] if a header is present but is not
/// well-formed Basic credentials.
pub fn parse_authorization(header: Option<&str>) -> Result<Option<BasicCredentials>> {
    header.map(BasicCredentials::parse).transpose()
}

/// Check presented credentials against the stored account, if any.
///
/// This runs the password hash and touches no storage, so callers can look
/// the account up first and verify after releasing the database.
///
/// # Errors
///
/// Returns [`Error::Unauthenticated`] if there is no such user or the
/// password does not match, or [`Error::PasswordHash`] if the stored hash is
/// unreadable.
pub fn verify_credentials(
    credentials: &BasicCredentials,
    stored: Option<UserCredentials>,
) -> Result<User> {
    let Some(stored) = stored else {
        debug!("Rejected credentials for unknown user {}", credentials.username);
        return Err(Error::Unauthenticated);
    };
    if !verify_password(&credentials.password, &stored.password_hash)? {
        debug!("Rejected password for user {}", credentials.username);
        return Err(Error::Unauthenticated);
    }
    Ok(stored.user)
}

/// Require the caller to be a staff user.
///
/// # Errors
///
/// Returns [`Error::PermissionDenied`] for anonymous or non-staff callers.
pub fn require_staff(user: Option<User>) -> Result<User> {
    match user {
        Some(user) if user.is_staff => Ok(user),
        _ => Err(Error::PermissionDenied),
    }
}

/// The shared secret sensors present when reporting sightings.
///
/// Only a BLAKE3 digest of the key is kept; presented keys are compared by
/// digest.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey {
    digest: blake3::Hash,
}

impl std::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiKey").finish_non_exhaustive()
    }
}

impl ApiKey {
    /// Build from the configured key.
    #[must_use]
    pub fn new(key: &str) -> Self {
        Self {
            digest: blake3::hash(key.as_bytes()),
        }
    }

    /// Check a presented key.
    #[must_use]
    pub fn matches(&self, presented: &str) -> bool {
        // blake3::Hash equality is constant-time
        blake3::hash(presented.as_bytes()) == self.digest
    }
}

/// Require a valid sensor key.
///
/// # Errors
///
/// Returns [`Error::PermissionDenied`] when no key is configured, no key is
/// presented, or the presented key is wrong.
pub fn require_api_key(configured: Option<&ApiKey>, presented: Option<&str>) -> Result<()> {
    match (configured, presented) {
        (Some(key), Some(presented)) if key.matches(presented) => Ok(()),
        _ => Err(Error::PermissionDenied),
    }
}
