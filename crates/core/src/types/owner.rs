//! Cart ownership.
//!
//! A cart belongs to exactly one owner: the anonymous browser session that
//! created it, or the authenticated user it was merged into. The tagged
//! union makes the "never both" invariant structural instead of leaving it
//! to a pair of nullable foreign keys.

use core::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::id::UserId;

/// Opaque key identifying an anonymous cart session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionKey(String);

impl SessionKey {
    /// Generate a fresh session key.
    #[must_use]
    pub fn generate() -> Self {
        Self(format!("sess_{}", Uuid::new_v4().simple()))
    }

    /// Wrap an existing key (e.g., one restored from a session cookie).
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// The key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The owner of a cart or cart line: an anonymous session XOR a user.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "key", rename_all = "snake_case")]
pub enum Owner {
    /// Anonymous cart, keyed by session.
    Session(SessionKey),
    /// Authenticated cart, keyed by user.
    User(UserId),
}

impl Owner {
    /// The storage discriminant for this owner.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Session(_) => "session",
            Self::User(_) => "user",
        }
    }

    /// The storage key for this owner.
    #[must_use]
    pub fn key(&self) -> String {
        match self {
            Self::Session(key) => key.as_str().to_owned(),
            Self::User(id) => id.to_string(),
        }
    }

    /// The user id, if this owner is an authenticated user.
    #[must_use]
    pub const fn user_id(&self) -> Option<UserId> {
        match self {
            Self::Session(_) => None,
            Self::User(id) => Some(*id),
        }
    }
}

impl fmt::Display for Owner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind(), self.key())
    }
}
