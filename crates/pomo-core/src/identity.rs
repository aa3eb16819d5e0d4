//! Identity context: resolves a presented credential to an owner id.
//!
//! The stores only ever see the resolved [`OwnerId`]. The registry keeps the
//! SHA-256 digest of each bearer token, never the token itself.

use crate::error::{PomoError, Result};
use crate::{io, paths};
use crate::types::OwnerId;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use rand::RngCore;
use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::Path;
use std::sync::OnceLock;

/// Resolves an opaque credential to the owner it was issued to.
pub trait IdentityContext: Send + Sync {
    /// `Unauthenticated` for a missing, malformed or unknown credential.
    fn resolve(&self, credential: &str) -> Result<OwnerId>;
}

// ---------------------------------------------------------------------------
// User
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: OwnerId,
    pub email: String,
    pub token_sha256: String,
    pub created_at: DateTime<Utc>,
}

static EMAIL_RE: OnceLock<Regex> = OnceLock::new();

fn email_re() -> &'static Regex {
    EMAIL_RE.get_or_init(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap())
}

pub fn validate_email(email: &str) -> Result<String> {
    let email = email.trim().to_lowercase();
    if !email_re().is_match(&email) {
        return Err(PomoError::Validation(format!(
            "'{email}' is not a valid email address"
        )));
    }
    Ok(email)
}

fn digest(token: &str) -> String {
    format!("{:x}", Sha256::digest(token.as_bytes()))
}

fn issue_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

// ---------------------------------------------------------------------------
// UserRegistry
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserRegistry {
    #[serde(default)]
    pub users: Vec<User>,
}

impl UserRegistry {
    /// Load `users.yaml`; a missing file is an empty registry.
    pub fn load(root: &Path) -> Result<Self> {
        Ok(io::read_yaml(&paths::users_path(root))?.unwrap_or_default())
    }

    pub fn save(&self, root: &Path) -> Result<()> {
        io::write_yaml(&paths::users_path(root), self)
    }

    /// Register a user and return it with its bearer token. The token is not
    /// stored and cannot be recovered later.
    pub fn register(&mut self, email: &str) -> Result<(User, String)> {
        let email = validate_email(email)?;
        if self.find_by_email(&email).is_some() {
            return Err(PomoError::EmailTaken(email));
        }
        let token = issue_token();
        let user = User {
            id: OwnerId::new(uuid::Uuid::new_v4().to_string())?,
            email,
            token_sha256: digest(&token),
            created_at: Utc::now(),
        };
        self.users.push(user.clone());
        Ok((user, token))
    }

    /// Replace the token of an existing user, invalidating the old one.
    pub fn rotate_token(&mut self, email: &str) -> Result<String> {
        let email = validate_email(email)?;
        let user = self
            .users
            .iter_mut()
            .find(|u| u.email == email)
            .ok_or_else(|| PomoError::Validation(format!("no user registered as '{email}'")))?;
        let token = issue_token();
        user.token_sha256 = digest(&token);
        Ok(token)
    }

    pub fn find_by_email(&self, email: &str) -> Option<&User> {
        let email = email.trim().to_lowercase();
        self.users.iter().find(|u| u.email == email)
    }
}

impl IdentityContext for UserRegistry {
    fn resolve(&self, credential: &str) -> Result<OwnerId> {
        let credential = credential.trim();
        if credential.is_empty() {
            return Err(PomoError::Unauthenticated);
        }
        let hashed = digest(credential);
        self.users
            .iter()
            .find(|u| u.token_sha256 == hashed)
            .map(|u| u.id.clone())
            .ok_or(PomoError::Unauthenticated)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
