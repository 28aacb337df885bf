//! Key ownership scope

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::constants::{CACHE_KEY_PREFIX, GLOBAL_CACHE_TOKEN};

/// Which data key a caller is asking for.
///
/// `Global` is the shared key; `Principal` is a per-identity key. The nil
/// UUID is reserved for the global row, so [`Scope::principal`] folds it into
/// `Global` and every accessor treats `Principal(Uuid::nil())` as global.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Scope {
    /// The shared, process-wide key
    #[default]
    Global,
    /// A key owned by one principal
    Principal(Uuid),
}

impl Scope {
    /// Scope for a principal id, normalizing nil to `Global`.
    pub fn principal(id: Uuid) -> Self {
        if id.is_nil() {
            Self::Global
        } else {
            Self::Principal(id)
        }
    }

    /// Owning principal, `None` for the global scope.
    pub fn id(self) -> Option<Uuid> {
        match self {
            Self::Principal(id) if !id.is_nil() => Some(id),
            _ => None,
        }
    }

    /// Whether this is the shared global scope
    pub fn is_global(self) -> bool {
        self.id().is_none()
    }

    /// Store row key: 32 lowercase hex digits, all zeros for global.
    pub fn row_key(self) -> String {
        self.id().unwrap_or_else(Uuid::nil).simple().to_string()
    }

    /// Cache token: the row key for principals, `none` for global.
    pub fn cache_token(self) -> String {
        self.id().map_or_else(|| GLOBAL_CACHE_TOKEN.to_owned(), |id| id.simple().to_string())
    }

    /// Full cache key for this scope's key record.
    pub fn cache_key(self) -> String {
        format!("{CACHE_KEY_PREFIX}{}", self.cache_token())
    }
}

impl From<Option<Uuid>> for Scope {
    fn from(id: Option<Uuid>) -> Self {
        id.map_or(Self::Global, Self::principal)
    }
}

impl From<Uuid> for Scope {
    fn from(id: Uuid) -> Self {
        Self::principal(id)
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.id() {
            Some(id) => write!(f, "principal:{}", id.hyphenated()),
            None => f.write_str("global"),
        }
    }
}
