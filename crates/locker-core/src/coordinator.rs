//! Lock Coordinator - single-resource primitives and composite label locking.
//!
//! Every subject transition is one compare-and-set against the exact record
//! previously read, so a transition never applies to state it did not see.
//!
//! A label spans several keys and the store offers no multi-key transaction,
//! so composite operations are sagas that commit on the label record:
//!
//! 1. snapshot the label's members, sorted by name
//! 2. take each member in that order, remembering the record it replaced
//! 3. on the first refusal or store failure, put back what this attempt took
//!    in reverse order and report every blocking member
//! 4. once every member is held, compare-and-set the label itself
//!
//! Lock and steal both follow these steps. Because members are taken in the
//! same order, two sagas over the same label meet on its first member and
//! one of them backs off before touching the label.
//!
//! Residual race: while a saga holds members it has not yet committed or put
//! back, other callers see them locked and may be refused.

use tracing::{debug, info, warn};

use crate::{
    membership::Membership,
    registry::{Registry, StoredRecord},
    store::RECORD_FIELD,
    subject::{LockState, SubjectKind, SubjectRecord, UserId},
    Error, Result,
};

/// A member that prevented a composite lock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blocker {
    pub name: String,
    pub owner: UserId,
}

/// Result of [`Coordinator::lock_label`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockLabelOutcome {
    Locked,
    /// The label has no (live) members. Nothing was mutated.
    NoMembers,
    /// Some members are locked by others. Nothing was left mutated.
    Conflict { blockers: Vec<Blocker> },
    /// The label itself is already locked.
    Held { owner: UserId },
    NotFound,
}

/// Result of [`Coordinator::unlock_label_as`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnlockLabelOutcome {
    Unlocked,
    AlreadyUnlocked,
    /// The label is locked by someone else. Nothing was mutated.
    OwnershipConflict { owner: UserId },
    NotFound,
}

/// Result of [`Coordinator::steal_label`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StealOutcome {
    Stolen { old_owner: UserId },
    /// The requester already owns the label.
    SelfConflict,
    AlreadyUnlocked,
    /// Some members are held by someone other than the label's owner.
    /// Nothing was left mutated.
    Conflict { blockers: Vec<Blocker> },
    NotFound,
}

/// A member record this attempt replaced.
struct Taken {
    name: String,
    prior: String,
    written: String,
}

/// Outcome of one member acquisition.
enum Acquire {
    Acquired(Taken),
    Blocked(UserId),
    Missing,
}

/// The holder of `lock` that stands in the way, if any. Members held by
/// `from` may be taken over.
fn blocking_holder<'a>(lock: &'a LockState, from: Option<&UserId>) -> Option<&'a UserId> {
    lock.owner().filter(|holder| Some(*holder) != from)
}

#[derive(Debug, Clone)]
pub struct Coordinator {
    registry: Registry,
    membership: Membership,
}

impl Coordinator {
    #[must_use]
    pub const fn new(registry: Registry, membership: Membership) -> Self {
        Self {
            registry,
            membership,
        }
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // SINGLE-RESOURCE PRIMITIVES
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    /// Lock an unlocked resource. Returns false, without mutation, if it is
    /// missing or already locked.
    pub async fn lock_resource(
        &self,
        name: &str,
        owner: &UserId,
        until: Option<&str>,
    ) -> Result<bool> {
        let lock = LockState::locked(owner, until);
        Ok(matches!(
            self.acquire(name, &lock, None).await?,
            Acquire::Acquired(_)
        ))
    }

    /// Unlock a resource whoever holds it. Idempotent; false only if the
    /// resource does not exist.
    pub async fn unlock_resource(&self, name: &str) -> Result<bool> {
        loop {
            let Some(stored) = self.registry.load_kind(SubjectKind::Resource, name).await? else {
                return Ok(false);
            };
            if !stored.record.lock.is_locked() {
                return Ok(true);
            }
            if self.set_lock(name, &stored, LockState::Unlocked).await?.is_some() {
                debug!(resource = name, "Unlocked resource");
                return Ok(true);
            }
        }
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // COMPOSITE LABEL OPERATIONS
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    /// Lock every member of `label`, then the label, all or nothing.
    pub async fn lock_label(
        &self,
        label: &str,
        owner: &UserId,
        until: Option<&str>,
    ) -> Result<LockLabelOutcome> {
        let lock = LockState::locked(owner, until);

        loop {
            let Some(stored) = self.registry.load_kind(SubjectKind::Label, label).await? else {
                return Ok(LockLabelOutcome::NotFound);
            };
            if let Some(holder) = stored.record.lock.owner() {
                return Ok(LockLabelOutcome::Held {
                    owner: holder.clone(),
                });
            }

            let members = self.membership.live_members(label).await?;
            let taken = match self.acquire_all(label, &members, &lock, None).await? {
                Ok(taken) => taken,
                Err(blockers) => {
                    warn!(label, %owner, blockers = blockers.len(), "Label lock conflicted");
                    return Ok(LockLabelOutcome::Conflict { blockers });
                }
            };
            if taken.is_empty() {
                return Ok(LockLabelOutcome::NoMembers);
            }

            if self.commit_label(label, &stored, &lock, &taken, None).await? {
                info!(label, %owner, members = taken.len(), "Locked label");
                return Ok(LockLabelOutcome::Locked);
            }

            // The label changed between snapshot and commit.
            match self.registry.load_kind(SubjectKind::Label, label).await? {
                None => return Ok(LockLabelOutcome::NotFound),
                Some(fresh) => {
                    if let Some(holder) = fresh.record.lock.owner() {
                        return Ok(LockLabelOutcome::Held {
                            owner: holder.clone(),
                        });
                    }
                }
            }
        }
    }

    /// Unlock every live member of `label`, then the label, whoever holds
    /// them. False only if the label does not exist.
    pub async fn unlock_label(&self, label: &str) -> Result<bool> {
        if !self.registry.exists(SubjectKind::Label, label).await? {
            return Ok(false);
        }

        for member in self.membership.live_members(label).await? {
            self.unlock_resource(&member).await?;
        }

        loop {
            let Some(stored) = self.registry.load_kind(SubjectKind::Label, label).await? else {
                return Ok(false);
            };
            if !stored.record.lock.is_locked()
                || self.set_lock(label, &stored, LockState::Unlocked).await?.is_some()
            {
                info!(label, "Unlocked label");
                return Ok(true);
            }
        }
    }

    /// Unlock `label` on behalf of `requester`, who must be its owner.
    ///
    /// Members the owner holds are released before the label, so a failure
    /// part way leaves the label locked and the call can be repeated. After
    /// the label commits, members are swept once more for any a losing steal
    /// put back in the meantime.
    pub async fn unlock_label_as(
        &self,
        label: &str,
        requester: &UserId,
    ) -> Result<UnlockLabelOutcome> {
        loop {
            let Some(stored) = self.registry.load_kind(SubjectKind::Label, label).await? else {
                return Ok(UnlockLabelOutcome::NotFound);
            };
            let owner = match stored.record.lock.owner() {
                None => return Ok(UnlockLabelOutcome::AlreadyUnlocked),
                Some(owner) if owner != requester => {
                    return Ok(UnlockLabelOutcome::OwnershipConflict {
                        owner: owner.clone(),
                    })
                }
                Some(owner) => owner.clone(),
            };

            let members = self.membership.live_members(label).await?;
            for member in &members {
                self.release_member(member, &owner).await?;
            }

            if self.set_lock(label, &stored, LockState::Unlocked).await?.is_none() {
                continue;
            }

            for member in &members {
                self.release_member(member, &owner).await?;
            }
            info!(label, %owner, "Unlocked label");
            return Ok(UnlockLabelOutcome::Unlocked);
        }
    }

    /// Transfer a locked label, and every member, to `requester`.
    ///
    /// Members held by the old owner, or unlocked, are taken with one
    /// compare-and-set each, so no third party can slip in between unlock
    /// and relock. A member held by anyone else refuses the steal. The label
    /// moves last.
    pub async fn steal_label(&self, label: &str, requester: &UserId) -> Result<StealOutcome> {
        let lock = LockState::locked(requester, None);

        loop {
            let Some(stored) = self.registry.load_kind(SubjectKind::Label, label).await? else {
                return Ok(StealOutcome::NotFound);
            };
            let old_owner = match stored.record.lock.owner() {
                None => return Ok(StealOutcome::AlreadyUnlocked),
                Some(owner) if owner == requester => return Ok(StealOutcome::SelfConflict),
                Some(owner) => owner.clone(),
            };

            let members = self.membership.live_members(label).await?;
            let taken = match self
                .acquire_all(label, &members, &lock, Some(&old_owner))
                .await?
            {
                Ok(taken) => taken,
                Err(blockers) => {
                    if self.label_changed(label, &stored).await? {
                        continue;
                    }
                    warn!(label, %requester, blockers = blockers.len(), "Label steal conflicted");
                    return Ok(StealOutcome::Conflict { blockers });
                }
            };

            if self
                .commit_label(label, &stored, &lock, &taken, Some(&old_owner))
                .await?
            {
                info!(label, %old_owner, new_owner = %requester, "Stole label");
                return Ok(StealOutcome::Stolen { old_owner });
            }
        }
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // INTERNALS
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    /// Compare-and-set `stored` to `lock`. Returns the written record on success.
    async fn set_lock(
        &self,
        name: &str,
        stored: &StoredRecord,
        lock: LockState,
    ) -> Result<Option<String>> {
        let next = stored.record.with_lock(lock).encode()?;
        let swapped = self
            .registry
            .store()
            .compare_and_set(
                &self.registry.keys().subject(name),
                RECORD_FIELD,
                Some(&stored.raw),
                &next,
            )
            .await?;
        Ok(swapped.then_some(next))
    }

    async fn label_changed(&self, label: &str, stored: &StoredRecord) -> Result<bool> {
        Ok(self
            .registry
            .load_kind(SubjectKind::Label, label)
            .await?
            .map_or(true, |fresh| fresh.raw != stored.raw))
    }

    /// Commit the label after its members are held. If the label moved, or
    /// the store failed, the members are put back before returning.
    async fn commit_label(
        &self,
        label: &str,
        stored: &StoredRecord,
        lock: &LockState,
        taken: &[Taken],
        from: Option<&UserId>,
    ) -> Result<bool> {
        match self.set_lock(label, stored, lock.clone()).await {
            Ok(Some(_)) => Ok(true),
            Ok(None) => {
                debug!(label, "Label changed before commit, putting members back");
                self.put_back(label, taken, from).await?;
                Ok(false)
            }
            Err(err) => {
                if let Err(undo_err) = self.put_back(label, taken, from).await {
                    warn!(label, error = %undo_err, "Rollback after store failure failed");
                }
                Err(err)
            }
        }
    }

    /// Take `name` for `lock` if it is unlocked or held by `from`.
    async fn acquire(
        &self,
        name: &str,
        lock: &LockState,
        from: Option<&UserId>,
    ) -> Result<Acquire> {
        loop {
            let Some(stored) = self.registry.load_kind(SubjectKind::Resource, name).await? else {
                return Ok(Acquire::Missing);
            };
            if let Some(holder) = blocking_holder(&stored.record.lock, from) {
                return Ok(Acquire::Blocked(holder.clone()));
            }
            if let Some(written) = self.set_lock(name, &stored, lock.clone()).await? {
                debug!(resource = name, owner = ?lock.owner(), "Locked resource");
                return Ok(Acquire::Acquired(Taken {
                    name: name.to_string(),
                    prior: stored.raw,
                    written,
                }));
            }
        }
    }

    /// Acquire `members` in order. On refusal, put back what was taken and
    /// return the blockers.
    async fn acquire_all(
        &self,
        label: &str,
        members: &[String],
        lock: &LockState,
        from: Option<&UserId>,
    ) -> Result<std::result::Result<Vec<Taken>, Vec<Blocker>>> {
        let mut taken = Vec::with_capacity(members.len());

        for (idx, name) in members.iter().enumerate() {
            match self.acquire(name, lock, from).await {
                Ok(Acquire::Acquired(entry)) => taken.push(entry),
                Ok(Acquire::Missing) => {}
                Ok(Acquire::Blocked(owner)) => {
                    self.put_back(label, &taken, from).await?;

                    let mut blockers = vec![Blocker {
                        name: name.clone(),
                        owner,
                    }];
                    for later in &members[idx + 1..] {
                        if let Some(stored) =
                            self.registry.load_kind(SubjectKind::Resource, later).await?
                        {
                            if let Some(holder) = blocking_holder(&stored.record.lock, from) {
                                blockers.push(Blocker {
                                    name: later.clone(),
                                    owner: holder.clone(),
                                });
                            }
                        }
                    }
                    return Ok(Err(blockers));
                }
                Err(err) => {
                    if let Err(undo_err) = self.put_back(label, &taken, from).await {
                        warn!(label, error = %undo_err, "Rollback after store failure failed");
                    }
                    return Err(err);
                }
            }
        }

        Ok(Ok(taken))
    }

    /// Restore taken members in reverse order, only where our record is
    /// still in place.
    ///
    /// Members taken over from `from` go back to `from`. If `from` no longer
    /// holds the label afterwards, its unlock may already have passed them,
    /// so they are released instead.
    async fn put_back(&self, label: &str, taken: &[Taken], from: Option<&UserId>) -> Result<()> {
        let mut first_error: Option<Error> = None;

        for entry in taken.iter().rev() {
            match self.swap(&entry.name, &entry.written, &entry.prior).await {
                Ok(true) => debug!(resource = %entry.name, "Rolled back resource"),
                Ok(false) => warn!(resource = %entry.name, "Rollback skipped, resource changed"),
                Err(err) => {
                    warn!(resource = %entry.name, error = %err, "Rollback failed");
                    first_error.get_or_insert(err);
                }
            }
        }
        if let Some(err) = first_error {
            return Err(err);
        }

        let Some(old_owner) = from else {
            return Ok(());
        };
        let still_held = self
            .registry
            .load_kind(SubjectKind::Label, label)
            .await?
            .is_some_and(|stored| stored.record.lock.is_held_by(old_owner));
        if still_held {
            return Ok(());
        }

        let unlocked = SubjectRecord::new(SubjectKind::Resource).encode()?;
        for entry in taken.iter().rev().filter(|entry| entry.prior != unlocked) {
            if self.swap(&entry.name, &entry.prior, &unlocked).await? {
                debug!(resource = %entry.name, %old_owner, "Released member of unlocked label");
            }
        }
        Ok(())
    }

    async fn swap(&self, name: &str, expected: &str, new: &str) -> Result<bool> {
        self.registry
            .store()
            .compare_and_set(
                &self.registry.keys().subject(name),
                RECORD_FIELD,
                Some(expected),
                new,
            )
            .await
    }

    /// Unlock `name` if `owner` holds it.
    async fn release_member(&self, name: &str, owner: &UserId) -> Result<()> {
        loop {
            let Some(stored) = self.registry.load_kind(SubjectKind::Resource, name).await? else {
                return Ok(());
            };
            if !stored.record.lock.is_held_by(owner) {
                debug!(resource = name, "Member not held by label owner, left alone");
                return Ok(());
            }
            if self.set_lock(name, &stored, LockState::Unlocked).await?.is_some() {
                debug!(resource = name, "Unlocked resource");
                return Ok(());
            }
        }
    }
}
