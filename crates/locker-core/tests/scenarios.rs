//! End-to-end lock scenarios, each run against every store backend.

#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::too_many_lines,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

use std::sync::Arc;

use locker_core::{
    AddMemberOutcome, Blocker, CreateOutcome, DeleteOutcome, LockLabelOutcome, LockStatus,
    Locker, MemoryStore, RemoveMemberOutcome, Result, SqliteStore, StealOutcome, SubjectKind,
    UnlockLabelOutcome, UserId,
};

/// One locker per backend, each over a fresh store.
async fn lockers() -> Result<Vec<(&'static str, Locker)>> {
    Ok(vec![
        ("memory", Locker::new(Arc::new(MemoryStore::new()), "locker")),
        (
            "sqlite",
            Locker::new(Arc::new(SqliteStore::in_memory().await?), "locker"),
        ),
    ])
}

fn user(id: &str) -> UserId {
    UserId::new(id)
}

async fn seed(locker: &Locker, resources: &[&str], labels: &[(&str, &[&str])]) -> Result<()> {
    for name in resources {
        assert_eq!(
            locker.create_subject(SubjectKind::Resource, name).await?,
            CreateOutcome::Created
        );
    }
    for (label, members) in labels {
        assert_eq!(
            locker.create_subject(SubjectKind::Label, label).await?,
            CreateOutcome::Created
        );
        for member in *members {
            assert_eq!(
                locker.add_member(label, member).await?,
                AddMemberOutcome::Added
            );
        }
    }
    Ok(())
}

async fn state_of(locker: &Locker, name: &str) -> Result<(LockStatus, Option<UserId>)> {
    let view = locker.status(name).await?.expect("subject exists");
    Ok((view.state, view.owner_id))
}

#[tokio::test]
async fn test_lock_label_locks_label_and_member() -> Result<()> {
    for (backend, locker) in lockers().await? {
        seed(&locker, &["foobar"], &[("bazbat", &["foobar"])]).await?;

        assert_eq!(
            locker.lock_label("bazbat", &user("A"), None).await?,
            LockLabelOutcome::Locked,
            "{backend}"
        );
        assert_eq!(
            state_of(&locker, "bazbat").await?,
            (LockStatus::Locked, Some(user("A"))),
            "{backend}"
        );
        assert_eq!(state_of(&locker, "foobar").await?.0, LockStatus::Locked, "{backend}");
    }
    Ok(())
}

#[tokio::test]
async fn test_empty_label_reports_no_members() -> Result<()> {
    for (backend, locker) in lockers().await? {
        seed(&locker, &[], &[("l1", &[])]).await?;

        assert_eq!(
            locker.lock_label("l1", &user("A"), None).await?,
            LockLabelOutcome::NoMembers,
            "{backend}"
        );
        assert_eq!(state_of(&locker, "l1").await?, (LockStatus::Unlocked, None), "{backend}");
    }
    Ok(())
}

#[tokio::test]
async fn test_shared_resource_conflicts_across_labels() -> Result<()> {
    for (backend, locker) in lockers().await? {
        seed(&locker, &["r1"], &[("l1", &["r1"]), ("l2", &["r1"])]).await?;

        assert_eq!(
            locker.lock_label("l1", &user("A"), None).await?,
            LockLabelOutcome::Locked,
            "{backend}"
        );
        assert_eq!(
            locker.lock_label("l2", &user("B"), None).await?,
            LockLabelOutcome::Conflict {
                blockers: vec![Blocker {
                    name: "r1".to_string(),
                    owner: user("A"),
                }]
            },
            "{backend}"
        );
        assert_eq!(state_of(&locker, "l2").await?, (LockStatus::Unlocked, None), "{backend}");
    }
    Ok(())
}

#[tokio::test]
async fn test_only_owner_may_unlock() -> Result<()> {
    for (backend, locker) in lockers().await? {
        seed(&locker, &["foobar"], &[("bazbat", &["foobar"])]).await?;
        locker.lock_label("bazbat", &user("A"), None).await?;

        assert_eq!(
            locker.unlock_label("bazbat", &user("B")).await?,
            UnlockLabelOutcome::OwnershipConflict { owner: user("A") },
            "{backend}"
        );
        assert_eq!(
            state_of(&locker, "foobar").await?,
            (LockStatus::Locked, Some(user("A"))),
            "{backend}"
        );
        assert_eq!(
            locker.unlock_label("bazbat", &user("A")).await?,
            UnlockLabelOutcome::Unlocked,
            "{backend}"
        );
        assert_eq!(state_of(&locker, "foobar").await?, (LockStatus::Unlocked, None), "{backend}");
    }
    Ok(())
}

#[tokio::test]
async fn test_steal_transfers_ownership() -> Result<()> {
    for (backend, locker) in lockers().await? {
        seed(&locker, &["foobar"], &[("bazbat", &["foobar"])]).await?;
        locker.lock_label("bazbat", &user("A"), None).await?;

        assert_eq!(
            locker.steal_label("bazbat", &user("B")).await?,
            StealOutcome::Stolen {
                old_owner: user("A")
            },
            "{backend}"
        );
        assert_eq!(state_of(&locker, "bazbat").await?.1, Some(user("B")), "{backend}");
        assert_eq!(state_of(&locker, "foobar").await?.1, Some(user("B")), "{backend}");
        assert_eq!(
            locker.locks_held_by(&user("B")).await?,
            vec!["bazbat".to_string()],
            "{backend}"
        );
        assert!(locker.locks_held_by(&user("A")).await?.is_empty(), "{backend}");
    }
    Ok(())
}

#[tokio::test]
async fn test_failed_composite_lock_restores_every_member() -> Result<()> {
    for (backend, locker) in lockers().await? {
        seed(
            &locker,
            &["a", "b", "c"],
            &[("big", &["a", "b", "c"]), ("small", &["c"])],
        )
        .await?;
        locker.lock_label("small", &user("X"), Some("later")).await?;

        let outcome = locker.lock_label("big", &user("A"), None).await?;
        assert!(matches!(outcome, LockLabelOutcome::Conflict { .. }), "{backend}");

        assert_eq!(state_of(&locker, "a").await?, (LockStatus::Unlocked, None), "{backend}");
        assert_eq!(state_of(&locker, "b").await?, (LockStatus::Unlocked, None), "{backend}");
        assert_eq!(state_of(&locker, "c").await?.1, Some(user("X")), "{backend}");
        assert_eq!(state_of(&locker, "big").await?, (LockStatus::Unlocked, None), "{backend}");

        let until = locker.status("c").await?.and_then(|v| v.until);
        assert_eq!(until.as_deref(), Some("later"), "{backend}");
    }
    Ok(())
}

#[tokio::test]
async fn test_names_are_unique_across_kinds() -> Result<()> {
    for (backend, locker) in lockers().await? {
        seed(&locker, &["web"], &[]).await?;

        assert_eq!(
            locker.create_subject(SubjectKind::Label, "web").await?,
            CreateOutcome::AlreadyExists,
            "{backend}"
        );
        assert_eq!(
            locker.delete_subject(SubjectKind::Label, "web").await?,
            DeleteOutcome::NotFound,
            "{backend}"
        );
        assert_eq!(locker.list(SubjectKind::Label).await?, Vec::<String>::new(), "{backend}");
    }
    Ok(())
}

#[tokio::test]
async fn test_deleting_resource_leaves_dangling_membership() -> Result<()> {
    for (backend, locker) in lockers().await? {
        seed(&locker, &["r1", "r2"], &[("l1", &["r1", "r2"])]).await?;
        locker.delete_subject(SubjectKind::Resource, "r1").await?;

        let members = locker.members("l1").await?.unwrap_or_default();
        assert!(members.contains("r1"), "{backend}");

        assert_eq!(
            locker.lock_label("l1", &user("A"), None).await?,
            LockLabelOutcome::Locked,
            "{backend}"
        );
        assert!(locker.status("r1").await?.is_none(), "{backend}");
        assert_eq!(
            locker.remove_member("l1", "r1").await?,
            RemoveMemberOutcome::Removed,
            "{backend}"
        );
    }
    Ok(())
}

#[tokio::test]
async fn test_deleting_label_keeps_resources() -> Result<()> {
    for (backend, locker) in lockers().await? {
        seed(&locker, &["r1"], &[("l1", &["r1"])]).await?;

        assert_eq!(
            locker.delete_subject(SubjectKind::Label, "l1").await?,
            DeleteOutcome::Deleted,
            "{backend}"
        );
        assert!(locker.get(SubjectKind::Resource, "r1").await?.is_some(), "{backend}");

        // A recreated label starts without the old members.
        locker.create_subject(SubjectKind::Label, "l1").await?;
        assert_eq!(
            locker.members("l1").await?.map(|m| m.len()),
            Some(0),
            "{backend}"
        );
    }
    Ok(())
}

#[tokio::test]
async fn test_unlock_is_idempotent() -> Result<()> {
    for (backend, locker) in lockers().await? {
        seed(&locker, &["r1"], &[("l1", &["r1"])]).await?;
        locker.lock_label("l1", &user("A"), None).await?;

        assert_eq!(
            locker.unlock_label("l1", &user("A")).await?,
            UnlockLabelOutcome::Unlocked,
            "{backend}"
        );
        assert_eq!(
            locker.unlock_label("l1", &user("A")).await?,
            UnlockLabelOutcome::AlreadyUnlocked,
            "{backend}"
        );
        assert!(locker.coordinator().unlock_resource("r1").await?, "{backend}");
        assert!(locker.coordinator().unlock_label("l1").await?, "{backend}");
        assert_eq!(state_of(&locker, "l1").await?, (LockStatus::Unlocked, None), "{backend}");
    }
    Ok(())
}

#[tokio::test]
async fn test_steal_refusals_leave_state_alone() -> Result<()> {
    for (backend, locker) in lockers().await? {
        seed(&locker, &["r1"], &[("l1", &["r1"])]).await?;

        assert_eq!(
            locker.steal_label("l1", &user("A")).await?,
            StealOutcome::AlreadyUnlocked,
            "{backend}"
        );
        locker.lock_label("l1", &user("A"), None).await?;
        assert_eq!(
            locker.steal_label("l1", &user("A")).await?,
            StealOutcome::SelfConflict,
            "{backend}"
        );
        assert_eq!(
            state_of(&locker, "r1").await?,
            (LockStatus::Locked, Some(user("A"))),
            "{backend}"
        );
    }
    Ok(())
}

#[tokio::test]
async fn test_steal_refused_while_member_held_through_other_label() -> Result<()> {
    for (backend, locker) in lockers().await? {
        seed(&locker, &["r1", "r2"], &[("l1", &["r1"]), ("l2", &["r2"])]).await?;
        locker.lock_label("l1", &user("A"), None).await?;
        locker.lock_label("l2", &user("C"), None).await?;
        locker.add_member("l1", "r2").await?;

        assert_eq!(
            locker.steal_label("l1", &user("B")).await?,
            StealOutcome::Conflict {
                blockers: vec![Blocker {
                    name: "r2".to_string(),
                    owner: user("C"),
                }]
            },
            "{backend}"
        );
        assert_eq!(state_of(&locker, "l1").await?.1, Some(user("A")), "{backend}");
        assert_eq!(state_of(&locker, "r1").await?.1, Some(user("A")), "{backend}");
        assert_eq!(state_of(&locker, "r2").await?.1, Some(user("C")), "{backend}");
    }
    Ok(())
}
