//! The facade consumed by the command and event layers.

use std::{collections::BTreeSet, sync::Arc};

use crate::{
    coordinator::{Coordinator, LockLabelOutcome, StealOutcome, UnlockLabelOutcome},
    config::{open_store, Config},
    membership::{AddMemberOutcome, Membership, RemoveMemberOutcome},
    query::{QueryService, SubjectView},
    registry::{CreateOutcome, DeleteOutcome, GuardedDelete, Registry},
    store::{Keyspace, Store},
    subject::{Subject, SubjectKind, UserId},
    Result,
};

/// Lock coordination over one namespace of a shared store.
#[derive(Debug, Clone)]
pub struct Locker {
    registry: Registry,
    membership: Membership,
    coordinator: Coordinator,
    query: QueryService,
}

impl Locker {
    #[must_use]
    pub fn new(store: Arc<dyn Store>, namespace: &str) -> Self {
        let registry = Registry::new(store, Keyspace::new(namespace));
        let membership = Membership::new(registry.clone());
        Self {
            coordinator: Coordinator::new(registry.clone(), membership.clone()),
            query: QueryService::new(registry.clone()),
            membership,
            registry,
        }
    }

    /// Open the configured store and build a locker over it.
    pub async fn from_config(config: &Config) -> Result<Self> {
        let store = open_store(config).await?;
        Ok(Self::new(store, &config.namespace))
    }

    #[must_use]
    pub const fn coordinator(&self) -> &Coordinator {
        &self.coordinator
    }

    pub async fn create_subject(&self, kind: SubjectKind, name: &str) -> Result<CreateOutcome> {
        self.registry.create(kind, name).await
    }

    /// Delete a subject. A locked label is unlocked as its owner first, so
    /// member locks are not stranded; only an unlocked label is deleted.
    pub async fn delete_subject(&self, kind: SubjectKind, name: &str) -> Result<DeleteOutcome> {
        if kind == SubjectKind::Resource {
            return self.registry.delete(kind, name).await;
        }
        loop {
            match self.registry.delete_unlocked(kind, name).await? {
                GuardedDelete::Done(outcome) => return Ok(outcome),
                GuardedDelete::Locked(owner) => {
                    self.coordinator.unlock_label_as(name, &owner).await?;
                }
            }
        }
    }

    pub async fn get(&self, kind: SubjectKind, name: &str) -> Result<Option<Subject>> {
        self.registry.get(kind, name).await
    }

    pub async fn add_member(&self, label: &str, resource: &str) -> Result<AddMemberOutcome> {
        self.membership.add(label, resource).await
    }

    pub async fn remove_member(&self, label: &str, resource: &str) -> Result<RemoveMemberOutcome> {
        self.membership.remove(label, resource).await
    }

    pub async fn members(&self, label: &str) -> Result<Option<BTreeSet<String>>> {
        self.membership.members(label).await
    }

    pub async fn lock_label(
        &self,
        label: &str,
        owner: &UserId,
        until: Option<&str>,
    ) -> Result<LockLabelOutcome> {
        self.coordinator.lock_label(label, owner, until).await
    }

    /// Unlock `label`; only its owner may.
    pub async fn unlock_label(
        &self,
        label: &str,
        requester: &UserId,
    ) -> Result<UnlockLabelOutcome> {
        self.coordinator.unlock_label_as(label, requester).await
    }

    pub async fn steal_label(&self, label: &str, requester: &UserId) -> Result<StealOutcome> {
        self.coordinator.steal_label(label, requester).await
    }

    pub async fn status(&self, name: &str) -> Result<Option<SubjectView>> {
        self.query.status(name).await
    }

    pub async fn list(&self, kind: SubjectKind) -> Result<Vec<String>> {
        match kind {
            SubjectKind::Resource => self.query.list_resources().await,
            SubjectKind::Label => self.query.list_labels().await,
        }
    }

    pub async fn locks_held_by(&self, user: &UserId) -> Result<Vec<String>> {
        self.query.locks_held_by(user).await
    }
}
