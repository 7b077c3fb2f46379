//! Subject Registry - create, delete and look up resources and labels.
//!
//! Resources and labels share one record key per name, so a name denotes at
//! most one subject: `create` is a compare-and-set against an absent record,
//! which checks both kinds and writes in a single atomic step.

use std::sync::Arc;

use futures::future::try_join_all;
use tracing::{debug, info};

use crate::{
    store::{Keyspace, Store, RECORD_FIELD},
    subject::{validate_name, Subject, SubjectKind, SubjectRecord, UserId},
    Result,
};

/// Result of [`Registry::create`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateOutcome {
    Created,
    /// The name is taken, by a subject of either kind.
    AlreadyExists,
}

/// Result of [`Registry::delete`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    NotFound,
}

/// Result of [`Registry::delete_unlocked`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum GuardedDelete {
    Done(DeleteOutcome),
    /// The subject is locked by this owner; nothing was deleted.
    Locked(UserId),
}

/// A record together with the exact encoded value it was decoded from.
///
/// Lock transitions compare-and-set against `raw`.
#[derive(Debug, Clone)]
pub(crate) struct StoredRecord {
    pub raw: String,
    pub record: SubjectRecord,
}

impl StoredRecord {
    pub fn into_subject(self, name: &str) -> Subject {
        Subject {
            name: name.to_string(),
            kind: self.record.kind,
            lock: self.record.lock,
        }
    }
}

#[derive(Clone)]
pub struct Registry {
    store: Arc<dyn Store>,
    keys: Keyspace,
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("namespace", &self.keys.namespace())
            .finish_non_exhaustive()
    }
}

impl Registry {
    #[must_use]
    pub fn new(store: Arc<dyn Store>, keys: Keyspace) -> Self {
        Self { store, keys }
    }

    pub(crate) fn store(&self) -> &dyn Store {
        self.store.as_ref()
    }

    pub(crate) const fn keys(&self) -> &Keyspace {
        &self.keys
    }

    /// Register a new, unlocked subject.
    ///
    /// Fails with [`crate::Error::InvalidName`] before touching the store if
    /// `name` breaks the naming rules for `kind`.
    pub async fn create(&self, kind: SubjectKind, name: &str) -> Result<CreateOutcome> {
        validate_name(kind, name)?;

        let record = SubjectRecord::new(kind).encode()?;
        let created = self
            .store
            .compare_and_set(&self.keys.subject(name), RECORD_FIELD, None, &record)
            .await?;

        if !created {
            debug!(%kind, name, "Subject already exists");
            return Ok(CreateOutcome::AlreadyExists);
        }

        self.store.add_to_set(&self.keys.index(kind), name).await?;
        info!(%kind, name, "Created subject");
        Ok(CreateOutcome::Created)
    }

    /// Remove a subject. Deleting a label drops its membership set; member
    /// resources are untouched. Deleting a resource leaves label memberships
    /// dangling.
    pub async fn delete(&self, kind: SubjectKind, name: &str) -> Result<DeleteOutcome> {
        let key = self.keys.subject(name);
        loop {
            let Some(stored) = self.load(name).await? else {
                return Ok(DeleteOutcome::NotFound);
            };
            if stored.record.kind != kind {
                return Ok(DeleteOutcome::NotFound);
            }

            // Retry if the record changed (locked/unlocked) under us.
            if self
                .store
                .compare_and_delete(&key, RECORD_FIELD, &stored.raw)
                .await?
            {
                break;
            }
        }

        self.drop_indexes(kind, name).await?;
        Ok(DeleteOutcome::Deleted)
    }

    /// Remove a subject only while it is unlocked. The delete compares
    /// against the unlocked record, so a lock taken after the check wins.
    pub(crate) async fn delete_unlocked(
        &self,
        kind: SubjectKind,
        name: &str,
    ) -> Result<GuardedDelete> {
        let key = self.keys.subject(name);
        loop {
            let Some(stored) = self.load_kind(kind, name).await? else {
                return Ok(GuardedDelete::Done(DeleteOutcome::NotFound));
            };
            if let Some(owner) = stored.record.lock.owner() {
                return Ok(GuardedDelete::Locked(owner.clone()));
            }
            if self
                .store
                .compare_and_delete(&key, RECORD_FIELD, &stored.raw)
                .await?
            {
                break;
            }
        }

        self.drop_indexes(kind, name).await?;
        Ok(GuardedDelete::Done(DeleteOutcome::Deleted))
    }

    async fn drop_indexes(&self, kind: SubjectKind, name: &str) -> Result<()> {
        self.store.remove_from_set(&self.keys.index(kind), name).await?;
        if kind == SubjectKind::Label {
            self.store.delete(&self.keys.membership(name)).await?;
        }

        info!(%kind, name, "Deleted subject");
        Ok(())
    }

    pub async fn exists(&self, kind: SubjectKind, name: &str) -> Result<bool> {
        Ok(self.get(kind, name).await?.is_some())
    }

    /// Look up a subject of a specific kind.
    pub async fn get(&self, kind: SubjectKind, name: &str) -> Result<Option<Subject>> {
        Ok(self
            .load_kind(kind, name)
            .await?
            .map(|stored| stored.into_subject(name)))
    }

    /// Look up a subject of either kind.
    pub async fn lookup(&self, name: &str) -> Result<Option<Subject>> {
        Ok(self.load(name).await?.map(|stored| stored.into_subject(name)))
    }

    /// Sorted names of every subject of `kind`.
    pub async fn list(&self, kind: SubjectKind) -> Result<Vec<String>> {
        let names = self.store.set_members(&self.keys.index(kind)).await?;

        // The index is written after the record; skip entries whose record is gone.
        let present = try_join_all(names.iter().map(|name| self.exists(kind, name))).await?;

        Ok(names
            .into_iter()
            .zip(present)
            .filter_map(|(name, present)| present.then_some(name))
            .collect())
    }

    pub(crate) async fn load(&self, name: &str) -> Result<Option<StoredRecord>> {
        let key = self.keys.subject(name);
        match self.store.get(&key, RECORD_FIELD).await? {
            None => Ok(None),
            Some(raw) => {
                let record = SubjectRecord::decode(&key, &raw)?;
                Ok(Some(StoredRecord { raw, record }))
            }
        }
    }

    pub(crate) async fn load_kind(
        &self,
        kind: SubjectKind,
        name: &str,
    ) -> Result<Option<StoredRecord>> {
        Ok(self
            .load(name)
            .await?
            .filter(|stored| stored.record.kind == kind))
    }
}
