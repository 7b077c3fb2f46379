//! Query Service - status, listings and per-user lock aggregation.

use futures::future::try_join_all;
use serde::Serialize;

use crate::{
    registry::Registry,
    subject::{LockStatus, Subject, SubjectKind, UserId},
    Result,
};

/// Read-only view of one subject.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubjectView {
    pub name: String,
    pub kind: SubjectKind,
    pub state: LockStatus,
    pub owner_id: Option<UserId>,
    pub until: Option<String>,
}

/// The `{state, owner_id, until}` document served for a subject.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StateDocument {
    pub state: LockStatus,
    pub owner_id: Option<UserId>,
    pub until: Option<String>,
}

impl SubjectView {
    #[must_use]
    pub fn document(&self) -> StateDocument {
        StateDocument {
            state: self.state,
            owner_id: self.owner_id.clone(),
            until: self.until.clone(),
        }
    }
}

impl From<Subject> for SubjectView {
    fn from(subject: Subject) -> Self {
        Self {
            state: subject.lock.status(),
            owner_id: subject.lock.owner().cloned(),
            until: subject.lock.until().map(String::from),
            name: subject.name,
            kind: subject.kind,
        }
    }
}

#[derive(Debug, Clone)]
pub struct QueryService {
    registry: Registry,
}

impl QueryService {
    #[must_use]
    pub const fn new(registry: Registry) -> Self {
        Self { registry }
    }

    /// Status of the label or resource called `name`.
    pub async fn status(&self, name: &str) -> Result<Option<SubjectView>> {
        Ok(self.registry.lookup(name).await?.map(SubjectView::from))
    }

    pub async fn list_resources(&self) -> Result<Vec<String>> {
        self.registry.list(SubjectKind::Resource).await
    }

    pub async fn list_labels(&self) -> Result<Vec<String>> {
        self.registry.list(SubjectKind::Label).await
    }

    /// Sorted names of the labels currently locked by `user`.
    ///
    /// Scans every label: O(labels) per call.
    pub async fn locks_held_by(&self, user: &UserId) -> Result<Vec<String>> {
        let labels = self.list_labels().await?;
        let subjects = try_join_all(
            labels
                .iter()
                .map(|name| self.registry.get(SubjectKind::Label, name)),
        )
        .await?;

        Ok(subjects
            .into_iter()
            .flatten()
            .filter(|subject| subject.lock.is_held_by(user))
            .map(|subject| subject.name)
            .collect())
    }
}
