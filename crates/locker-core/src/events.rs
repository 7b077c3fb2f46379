//! Event relay: inbound lock/unlock attempts become outbound notifications.
//!
//! Both directions are tagged JSON objects, e.g.
//! `{"type":"lock_attempt","label":"web","user_id":"A","request_id":"r-1"}`
//! answered by `{"type":"lock_success","request_id":"r-1"}`.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    coordinator::{LockLabelOutcome, UnlockLabelOutcome},
    locker::Locker,
    subject::UserId,
    Result,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Attempt {
    LockAttempt {
        label: String,
        user_id: UserId,
        request_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        until: Option<String>,
    },
    UnlockAttempt {
        label: String,
        user_id: UserId,
        request_id: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Notification {
    LockSuccess {
        request_id: String,
    },
    LockFailure {
        request_id: String,
        reason: String,
    },
    UnlockSuccess {
        request_id: String,
    },
    UnlockFailure {
        request_id: String,
        reason: String,
    },
}

impl Notification {
    #[must_use]
    pub fn request_id(&self) -> &str {
        match self {
            Self::LockSuccess { request_id }
            | Self::LockFailure { request_id, .. }
            | Self::UnlockSuccess { request_id }
            | Self::UnlockFailure { request_id, .. } => request_id,
        }
    }

    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::LockSuccess { .. } | Self::UnlockSuccess { .. })
    }
}

impl Attempt {
    /// Parse one JSON attempt.
    pub fn parse(line: &str) -> Result<Self> {
        Ok(serde_json::from_str(line)?)
    }
}

/// Run `attempt` against `locker` and build the reply.
pub async fn dispatch(locker: &Locker, attempt: Attempt) -> Result<Notification> {
    let notification = match attempt {
        Attempt::LockAttempt {
            label,
            user_id,
            request_id,
            until,
        } => match locker
            .lock_label(&label, &user_id, until.as_deref())
            .await?
        {
            LockLabelOutcome::Locked => Notification::LockSuccess { request_id },
            LockLabelOutcome::NoMembers => Notification::LockFailure {
                request_id,
                reason: "no_members".into(),
            },
            LockLabelOutcome::Conflict { .. } => Notification::LockFailure {
                request_id,
                reason: "conflict".into(),
            },
            LockLabelOutcome::Held { .. } => Notification::LockFailure {
                request_id,
                reason: "held".into(),
            },
            LockLabelOutcome::NotFound => Notification::LockFailure {
                request_id,
                reason: "not_found".into(),
            },
        },
        Attempt::UnlockAttempt {
            label,
            user_id,
            request_id,
        } => match locker.unlock_label(&label, &user_id).await? {
            UnlockLabelOutcome::Unlocked | UnlockLabelOutcome::AlreadyUnlocked => {
                Notification::UnlockSuccess { request_id }
            }
            UnlockLabelOutcome::OwnershipConflict { .. } => Notification::UnlockFailure {
                request_id,
                reason: "ownership_conflict".into(),
            },
            UnlockLabelOutcome::NotFound => Notification::UnlockFailure {
                request_id,
                reason: "not_found".into(),
            },
        },
    };

    debug!(
        request_id = notification.request_id(),
        success = notification.is_success(),
        "Relayed attempt"
    );
    Ok(notification)
}
