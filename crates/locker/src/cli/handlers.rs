//! Command handlers: resolve arguments, call the core, report outcomes.

use anyhow::{Context as _, Result};
use clap::ArgMatches;
use itertools::Itertools;
use locker_core::{
    events, load_config, AddMemberOutcome, Attempt, Config, CreateOutcome, DeleteOutcome,
    LockLabelOutcome, Locker, RemoveMemberOutcome, StealOutcome, SubjectKind,
    UnlockLabelOutcome, UserId,
};
use serde_json::json;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::warn;

use super::commands::build_cli;
use crate::output::{OutputFormat, Refused};

struct Context {
    locker: Locker,
    format: OutputFormat,
}

/// Load configuration with CLI overrides applied.
pub fn resolve_config(matches: &ArgMatches) -> Result<Config> {
    let mut config = load_config()?;
    if let Some(path) = matches.get_one::<String>("db") {
        config.store.path.clone_from(path);
    }
    if let Some(namespace) = matches.get_one::<String>("namespace") {
        config.namespace.clone_from(namespace);
    }
    config.validate()?;
    Ok(config)
}

fn acting_user(matches: &ArgMatches) -> Result<UserId> {
    matches
        .get_one::<String>("user")
        .cloned()
        .or_else(|| std::env::var("LOCKER_USER").ok())
        .filter(|user| !user.trim().is_empty())
        .map(UserId::new)
        .ok_or_else(|| anyhow::anyhow!("No user provided. Set LOCKER_USER or use --user"))
}

fn names(matches: &ArgMatches) -> Vec<String> {
    matches
        .get_many::<String>("names")
        .map(|values| values.cloned().collect())
        .unwrap_or_default()
}

fn required<'a>(matches: &'a ArgMatches, id: &str) -> Result<&'a str> {
    matches
        .get_one::<String>(id)
        .map(String::as_str)
        .ok_or_else(|| anyhow::anyhow!("{id} is required"))
}

/// Finish a batch: refused if any item was refused.
fn batch_result(refused: usize, total: usize) -> Result<()> {
    if refused == 0 {
        Ok(())
    } else {
        Err(Refused(format!("{refused} of {total} refused")).into())
    }
}

/// Open the configured store and run the matched command.
pub async fn run_cli(matches: &ArgMatches, config: &Config) -> Result<()> {
    let ctx = Context {
        locker: Locker::from_config(config).await?,
        format: OutputFormat::from_json_flag(matches.get_flag("json")),
    };

    match matches.subcommand() {
        Some(("resource", sub_m)) => handle_subjects(&ctx, SubjectKind::Resource, sub_m).await,
        Some(("label", sub_m)) => handle_subjects(&ctx, SubjectKind::Label, sub_m).await,
        Some(("lock", sub_m)) => handle_lock(&ctx, sub_m).await,
        Some(("unlock", sub_m)) => handle_unlock(&ctx, sub_m).await,
        Some(("steal", sub_m)) => handle_steal(&ctx, sub_m).await,
        Some(("status", sub_m)) => handle_status(&ctx, required(sub_m, "name")?).await,
        Some(("list", sub_m)) => handle_list(&ctx, sub_m).await,
        Some(("events", _)) => handle_events(&ctx).await,
        _ => {
            build_cli().print_help()?;
            Ok(())
        }
    }
}

async fn handle_subjects(ctx: &Context, kind: SubjectKind, sub_m: &ArgMatches) -> Result<()> {
    match sub_m.subcommand() {
        Some(("create", m)) => handle_create(ctx, kind, &names(m)).await,
        Some(("delete", m)) => handle_delete(ctx, kind, &names(m)).await,
        Some(("show", m)) => handle_show(ctx, kind, required(m, "name")?).await,
        Some(("list", _)) => handle_list_subjects(ctx, kind).await,
        Some(("add", m)) => handle_add(ctx, required(m, "label")?, &names(m)).await,
        Some(("remove", m)) => handle_remove(ctx, required(m, "label")?, &names(m)).await,
        _ => Err(anyhow::anyhow!("Unknown {kind} subcommand")),
    }
}

async fn handle_create(ctx: &Context, kind: SubjectKind, names: &[String]) -> Result<()> {
    let mut refused = 0;
    for name in names {
        let outcome = ctx.locker.create_subject(kind, name).await?;
        let (human, result) = match outcome {
            CreateOutcome::Created => (format!("{kind} {name} created"), "created"),
            CreateOutcome::AlreadyExists => {
                refused += 1;
                (format!("{name} already exists"), "already_exists")
            }
        };
        ctx.format
            .emit(&human, &json!({"kind": kind, "name": name, "result": result}))?;
    }
    batch_result(refused, names.len())
}

async fn handle_delete(ctx: &Context, kind: SubjectKind, names: &[String]) -> Result<()> {
    let mut refused = 0;
    for name in names {
        let outcome = ctx.locker.delete_subject(kind, name).await?;
        let (human, result) = match outcome {
            DeleteOutcome::Deleted => (format!("{kind} {name} deleted"), "deleted"),
            DeleteOutcome::NotFound => {
                refused += 1;
                (format!("{kind} {name} does not exist"), "not_found")
            }
        };
        ctx.format
            .emit(&human, &json!({"kind": kind, "name": name, "result": result}))?;
    }
    batch_result(refused, names.len())
}

async fn handle_show(ctx: &Context, kind: SubjectKind, name: &str) -> Result<()> {
    let Some(subject) = ctx.locker.get(kind, name).await? else {
        let message = format!("{kind} {name} does not exist");
        ctx.format
            .emit(&message, &json!({"name": name, "result": "not_found"}))?;
        return Err(Refused(message).into());
    };

    let view = locker_core::SubjectView::from(subject);
    let mut human = match &view.owner_id {
        Some(owner) => format!("{kind} {name} is locked by {owner}"),
        None => format!("{kind} {name} is unlocked"),
    };
    if let Some(until) = &view.until {
        human.push_str(&format!(" until {until}"));
    }
    if kind == SubjectKind::Label {
        let members = ctx.locker.members(name).await?.unwrap_or_default();
        if members.is_empty() {
            human.push_str("\nno members");
        } else {
            human.push_str(&format!("\nmembers: {}", members.iter().join(", ")));
        }
    }

    ctx.format.emit(&human, &view.document())
}

async fn handle_list_subjects(ctx: &Context, kind: SubjectKind) -> Result<()> {
    let names = ctx.locker.list(kind).await?;
    let human = if names.is_empty() {
        format!("no {kind}s")
    } else {
        names.iter().join("\n")
    };
    ctx.format.emit(&human, &names)
}

async fn handle_add(ctx: &Context, label: &str, resources: &[String]) -> Result<()> {
    let mut refused = 0;
    for resource in resources {
        let (human, result) = match ctx.locker.add_member(label, resource).await? {
            AddMemberOutcome::Added => (format!("{resource} added to {label}"), "added"),
            AddMemberOutcome::NotFound { kind, name } => {
                refused += 1;
                (format!("{kind} {name} does not exist"), "not_found")
            }
        };
        ctx.format.emit(
            &human,
            &json!({"label": label, "resource": resource, "result": result}),
        )?;
    }
    batch_result(refused, resources.len())
}

async fn handle_remove(ctx: &Context, label: &str, resources: &[String]) -> Result<()> {
    let mut refused = 0;
    for resource in resources {
        let (human, result) = match ctx.locker.remove_member(label, resource).await? {
            RemoveMemberOutcome::Removed => {
                (format!("{resource} removed from {label}"), "removed")
            }
            RemoveMemberOutcome::NotRelated => {
                refused += 1;
                (format!("{resource} is not in {label}"), "not_related")
            }
            RemoveMemberOutcome::NotFound { kind, name } => {
                refused += 1;
                (format!("{kind} {name} does not exist"), "not_found")
            }
        };
        ctx.format.emit(
            &human,
            &json!({"label": label, "resource": resource, "result": result}),
        )?;
    }
    batch_result(refused, resources.len())
}

async fn handle_lock(ctx: &Context, sub_m: &ArgMatches) -> Result<()> {
    let label = required(sub_m, "name")?;
    let user = acting_user(sub_m)?;
    let until = sub_m.get_one::<String>("until").map(String::as_str);

    let outcome = ctx.locker.lock_label(label, &user, until).await?;
    let (human, value) = match &outcome {
        LockLabelOutcome::Locked => (
            format!("{label} locked by {user}"),
            json!({"label": label, "result": "locked", "owner_id": user}),
        ),
        LockLabelOutcome::NoMembers => (
            format!("{label} has no members to lock"),
            json!({"label": label, "result": "no_members"}),
        ),
        LockLabelOutcome::Conflict { blockers } => (
            format!(
                "{label} cannot be locked: {}",
                blockers
                    .iter()
                    .map(|b| format!("{} is locked by {}", b.name, b.owner))
                    .join(", ")
            ),
            json!({
                "label": label,
                "result": "conflict",
                "blockers": blockers
                    .iter()
                    .map(|b| json!({"name": b.name, "owner_id": b.owner}))
                    .collect::<Vec<_>>(),
            }),
        ),
        LockLabelOutcome::Held { owner } => (
            format!("{label} is already locked by {owner}"),
            json!({"label": label, "result": "held", "owner_id": owner}),
        ),
        LockLabelOutcome::NotFound => (
            format!("label {label} does not exist"),
            json!({"label": label, "result": "not_found"}),
        ),
    };

    ctx.format.emit(&human, &value)?;
    match outcome {
        LockLabelOutcome::Locked => Ok(()),
        _ => Err(Refused(human).into()),
    }
}

async fn handle_unlock(ctx: &Context, sub_m: &ArgMatches) -> Result<()> {
    let label = required(sub_m, "name")?;
    let user = acting_user(sub_m)?;

    let outcome = ctx.locker.unlock_label(label, &user).await?;
    let (human, value) = match &outcome {
        UnlockLabelOutcome::Unlocked => (
            format!("{label} unlocked"),
            json!({"label": label, "result": "unlocked"}),
        ),
        UnlockLabelOutcome::AlreadyUnlocked => (
            format!("{label} is already unlocked"),
            json!({"label": label, "result": "already_unlocked"}),
        ),
        UnlockLabelOutcome::OwnershipConflict { owner } => (
            format!("{label} is locked by {owner}, not you"),
            json!({"label": label, "result": "ownership_conflict", "owner_id": owner}),
        ),
        UnlockLabelOutcome::NotFound => (
            format!("label {label} does not exist"),
            json!({"label": label, "result": "not_found"}),
        ),
    };

    ctx.format.emit(&human, &value)?;
    match outcome {
        UnlockLabelOutcome::Unlocked | UnlockLabelOutcome::AlreadyUnlocked => Ok(()),
        _ => Err(Refused(human).into()),
    }
}

async fn handle_steal(ctx: &Context, sub_m: &ArgMatches) -> Result<()> {
    let label = required(sub_m, "name")?;
    let user = acting_user(sub_m)?;

    let outcome = ctx.locker.steal_label(label, &user).await?;
    let (human, value) = match &outcome {
        StealOutcome::Stolen { old_owner } => (
            format!("{label} stolen from {old_owner} by {user}"),
            json!({
                "label": label,
                "result": "stolen",
                "old_owner_id": old_owner,
                "owner_id": user,
            }),
        ),
        StealOutcome::Conflict { blockers } => (
            format!(
                "{label} cannot be stolen: {}",
                blockers
                    .iter()
                    .map(|b| format!("{} is locked by {}", b.name, b.owner))
                    .join(", ")
            ),
            json!({
                "label": label,
                "result": "conflict",
                "blockers": blockers
                    .iter()
                    .map(|b| json!({"name": b.name, "owner_id": b.owner}))
                    .collect::<Vec<_>>(),
            }),
        ),
        StealOutcome::SelfConflict => (
            format!("{label} is already locked by you"),
            json!({"label": label, "result": "self_conflict"}),
        ),
        StealOutcome::AlreadyUnlocked => (
            format!("{label} is unlocked, nothing to steal"),
            json!({"label": label, "result": "already_unlocked"}),
        ),
        StealOutcome::NotFound => (
            format!("label {label} does not exist"),
            json!({"label": label, "result": "not_found"}),
        ),
    };

    ctx.format.emit(&human, &value)?;
    match outcome {
        StealOutcome::Stolen { .. } => Ok(()),
        _ => Err(Refused(human).into()),
    }
}

async fn handle_status(ctx: &Context, name: &str) -> Result<()> {
    let Some(view) = ctx.locker.status(name).await? else {
        let message = format!("{name} does not exist");
        ctx.format
            .emit(&message, &json!({"name": name, "result": "not_found"}))?;
        return Err(Refused(message).into());
    };

    let human = match &view.owner_id {
        Some(owner) => format!("{} {name} is locked by {owner}", view.kind),
        None => format!("{} {name} is unlocked", view.kind),
    };
    ctx.format.emit(&human, &view)
}

async fn handle_list(ctx: &Context, sub_m: &ArgMatches) -> Result<()> {
    let user = match sub_m.get_one::<String>("owner") {
        Some(owner) => UserId::new(owner.as_str()),
        None => acting_user(sub_m)?,
    };

    let labels = ctx.locker.locks_held_by(&user).await?;
    let human = if labels.is_empty() {
        format!("{user} holds no locks")
    } else {
        labels.iter().join("\n")
    };
    ctx.format.emit(&human, &labels)
}

async fn handle_events(ctx: &Context) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    while let Some(line) = lines.next_line().await.context("Failed to read stdin")? {
        if line.trim().is_empty() {
            continue;
        }
        let attempt = match Attempt::parse(&line) {
            Ok(attempt) => attempt,
            Err(e) => {
                warn!(error = %e, "Skipping unparsable event");
                continue;
            }
        };

        let notification = events::dispatch(&ctx.locker, attempt).await?;
        let mut encoded = serde_json::to_vec(&notification)?;
        encoded.push(b'\n');
        stdout.write_all(&encoded).await?;
        stdout.flush().await?;
    }
    Ok(())
}
