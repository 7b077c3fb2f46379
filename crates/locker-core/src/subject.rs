//! Subject types: the two lockable kinds and their lock state.
//!
//! A subject's kind and lock state are persisted together as one
//! [`SubjectRecord`], so every state transition is a single compare-and-set
//! on one store field.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Maximum length of a subject name.
pub const MAX_NAME_LEN: usize = 255;

/// Opaque identity of an already-authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    /// Create a new user ID
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the ID as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for UserId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// The two kinds of subject sharing one namespace.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SubjectKind {
    /// Smallest lockable unit.
    Resource,
    /// Named group of resources; locking it locks every member.
    Label,
}

/// Lock status without the owner payload.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum LockStatus {
    Unlocked,
    Locked,
}

/// Lock state of a subject. An owner exists iff the subject is locked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum LockState {
    Unlocked,
    Locked {
        owner_id: UserId,
        /// Requested expiry. Recorded but never enforced.
        #[serde(default)]
        until: Option<String>,
    },
}

impl LockState {
    /// Build a locked state for `owner`.
    #[must_use]
    pub fn locked(owner: &UserId, until: Option<&str>) -> Self {
        Self::Locked {
            owner_id: owner.clone(),
            until: until.map(String::from),
        }
    }

    #[must_use]
    pub const fn status(&self) -> LockStatus {
        match self {
            Self::Unlocked => LockStatus::Unlocked,
            Self::Locked { .. } => LockStatus::Locked,
        }
    }

    #[must_use]
    pub const fn is_locked(&self) -> bool {
        matches!(self, Self::Locked { .. })
    }

    /// Current owner, if locked.
    #[must_use]
    pub const fn owner(&self) -> Option<&UserId> {
        match self {
            Self::Unlocked => None,
            Self::Locked { owner_id, .. } => Some(owner_id),
        }
    }

    #[must_use]
    pub fn until(&self) -> Option<&str> {
        match self {
            Self::Unlocked => None,
            Self::Locked { until, .. } => until.as_deref(),
        }
    }

    /// True when locked by exactly `user`.
    #[must_use]
    pub fn is_held_by(&self, user: &UserId) -> bool {
        self.owner() == Some(user)
    }
}

/// The persisted form of a subject: `{"kind":..,"state":..,"owner_id":..,"until":..}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectRecord {
    pub kind: SubjectKind,
    #[serde(flatten)]
    pub lock: LockState,
}

impl SubjectRecord {
    /// A freshly created, unlocked record.
    #[must_use]
    pub const fn new(kind: SubjectKind) -> Self {
        Self {
            kind,
            lock: LockState::Unlocked,
        }
    }

    /// Same kind, different lock state.
    #[must_use]
    pub fn with_lock(&self, lock: LockState) -> Self {
        Self {
            kind: self.kind,
            lock,
        }
    }

    pub fn encode(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| Error::CorruptRecord {
            key: self.kind.to_string(),
            reason: format!("failed to encode record: {e}"),
        })
    }

    pub fn decode(key: &str, raw: &str) -> Result<Self> {
        serde_json::from_str(raw).map_err(|e| Error::CorruptRecord {
            key: key.to_string(),
            reason: e.to_string(),
        })
    }
}

/// A subject as read from the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subject {
    pub name: String,
    pub kind: SubjectKind,
    pub lock: LockState,
}

/// Check a name against the naming rules for `kind`.
///
/// Resources: `[A-Za-z0-9_.-]+`. Labels additionally allow inner spaces.
pub fn validate_name(kind: SubjectKind, name: &str) -> Result<()> {
    static RESOURCE_RE: OnceLock<Option<Regex>> = OnceLock::new();
    static LABEL_RE: OnceLock<Option<Regex>> = OnceLock::new();

    let invalid = |reason: &str| Error::InvalidName {
        kind,
        name: name.to_string(),
        reason: reason.to_string(),
    };

    if name.is_empty() {
        return Err(invalid("name cannot be empty"));
    }
    if name.len() > MAX_NAME_LEN {
        return Err(invalid("name cannot exceed 255 characters"));
    }

    let pattern = match kind {
        SubjectKind::Resource => {
            RESOURCE_RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9_.\-]+$").ok())
        }
        SubjectKind::Label => LABEL_RE.get_or_init(|| {
            Regex::new(r"^[A-Za-z0-9_.\-](?:[A-Za-z0-9_. \-]*[A-Za-z0-9_.\-])?$").ok()
        }),
    };

    match pattern {
        Some(re) if re.is_match(name) => Ok(()),
        Some(_) => Err(invalid(match kind {
            SubjectKind::Resource => {
                "only letters, digits, '_', '.' and '-' are allowed"
            }
            SubjectKind::Label => {
                "only letters, digits, '_', '.', '-' and inner spaces are allowed"
            }
        })),
        None => Err(invalid("name pattern failed to compile")),
    }
}
