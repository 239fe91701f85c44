//! Password hashing, login tokens and the per-request `Viewer`.

use crate::model::User;
use crate::Result;
use anyhow::anyhow;
use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

/// Hashes `password` with Argon2id into a PHC string.
pub(crate) fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow!("Unable to hash password: {e}"))?;
    Ok(hash.to_string())
}

/// Returns `true` if `password` matches the PHC string `hash`. A malformed hash is an error.
pub(crate) fn verify_password(password: &str, hash: &str) -> Result<bool> {
    let parsed =
        PasswordHash::new(hash).map_err(|e| anyhow!("Stored password hash is invalid: {e}"))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

/// A new opaque session token.
pub(crate) fn new_token() -> String {
    Uuid::new_v4().simple().to_string()
}

/// The longest session lifetime `config.json` may ask for, one hundred years.
pub(crate) const MAX_SESSION_TTL_HOURS: u32 = 24 * 365 * 100;

/// How long a session issued by `login` remains valid.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct SessionPolicy {
    ttl: Duration,
}

impl SessionPolicy {
    pub fn new(ttl_hours: u32) -> Self {
        Self {
            ttl: Duration::hours(i64::from(ttl_hours)),
        }
    }

    /// # Errors
    /// Returns an error if the expiry is past the latest representable time.
    pub fn expires_at(&self, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
        now.checked_add_signed(self.ttl).ok_or_else(|| {
            anyhow!(
                "A session lifetime of {} hours is out of range",
                self.ttl.num_hours()
            )
        })
    }
}

/// The user on whose behalf a GraphQL request runs, along with the token that authenticated them.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct Viewer {
    user: Option<User>,
    token: Option<String>,
}

impl Viewer {
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// A viewer authenticated by the session `token`.
    pub fn session(user: User, token: impl Into<String>) -> Self {
        Self {
            user: Some(user),
            token: Some(token.into()),
        }
    }

    /// A viewer acting as `user` without a session, as the `execute` command does.
    pub fn trusted(user: User) -> Self {
        Self {
            user: Some(user),
            token: None,
        }
    }

    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }
}
