//! Membership Index - the label → resource relation.

use std::collections::BTreeSet;

use futures::future::try_join_all;
use tracing::debug;

use crate::{registry::Registry, subject::SubjectKind, Result};

/// Result of [`Membership::add`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddMemberOutcome {
    /// The resource is a member (possibly already was).
    Added,
    /// The named label or resource does not exist.
    NotFound { kind: SubjectKind, name: String },
}

/// Result of [`Membership::remove`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoveMemberOutcome {
    Removed,
    /// The resource exists but is not a member of the label.
    NotRelated,
    NotFound { kind: SubjectKind, name: String },
}

#[derive(Debug, Clone)]
pub struct Membership {
    registry: Registry,
}

impl Membership {
    #[must_use]
    pub const fn new(registry: Registry) -> Self {
        Self { registry }
    }

    /// Add `resource` to `label`. Idempotent.
    pub async fn add(&self, label: &str, resource: &str) -> Result<AddMemberOutcome> {
        if !self.registry.exists(SubjectKind::Label, label).await? {
            return Ok(AddMemberOutcome::NotFound {
                kind: SubjectKind::Label,
                name: label.to_string(),
            });
        }
        if !self.registry.exists(SubjectKind::Resource, resource).await? {
            return Ok(AddMemberOutcome::NotFound {
                kind: SubjectKind::Resource,
                name: resource.to_string(),
            });
        }

        let added = self
            .registry
            .store()
            .add_to_set(&self.registry.keys().membership(label), resource)
            .await?;
        debug!(label, resource, added, "Added label member");
        Ok(AddMemberOutcome::Added)
    }

    /// Remove `resource` from `label`.
    ///
    /// A dangling entry for a deleted resource is still removed.
    pub async fn remove(&self, label: &str, resource: &str) -> Result<RemoveMemberOutcome> {
        if !self.registry.exists(SubjectKind::Label, label).await? {
            return Ok(RemoveMemberOutcome::NotFound {
                kind: SubjectKind::Label,
                name: label.to_string(),
            });
        }

        let removed = self
            .registry
            .store()
            .remove_from_set(&self.registry.keys().membership(label), resource)
            .await?;
        if removed {
            debug!(label, resource, "Removed label member");
            return Ok(RemoveMemberOutcome::Removed);
        }

        if self.registry.exists(SubjectKind::Resource, resource).await? {
            Ok(RemoveMemberOutcome::NotRelated)
        } else {
            Ok(RemoveMemberOutcome::NotFound {
                kind: SubjectKind::Resource,
                name: resource.to_string(),
            })
        }
    }

    /// Every recorded member of `label`, including dangling entries.
    ///
    /// `None` if the label does not exist.
    pub async fn members(&self, label: &str) -> Result<Option<BTreeSet<String>>> {
        if !self.registry.exists(SubjectKind::Label, label).await? {
            return Ok(None);
        }
        let members = self
            .registry
            .store()
            .set_members(&self.registry.keys().membership(label))
            .await?;
        Ok(Some(members))
    }

    /// Point-in-time snapshot of members that still exist as resources, sorted.
    pub(crate) async fn live_members(&self, label: &str) -> Result<Vec<String>> {
        let members = self
            .registry
            .store()
            .set_members(&self.registry.keys().membership(label))
            .await?;

        let alive = try_join_all(
            members
                .iter()
                .map(|name| self.registry.exists(SubjectKind::Resource, name)),
        )
        .await?;

        Ok(members
            .into_iter()
            .zip(alive)
            .filter_map(|(name, alive)| alive.then_some(name))
            .collect())
    }
}
