//! Clap command definitions

use clap::{Arg, ArgAction, Command as ClapCommand};

fn user_arg() -> Arg {
    Arg::new("user")
        .long("user")
        .short('u')
        .value_name("ID")
        .help("Acting user (uses LOCKER_USER if not provided)")
}

fn names_arg(help: &'static str) -> Arg {
    Arg::new("names")
        .required(true)
        .num_args(1..)
        .value_name("NAME")
        .help(help)
}

fn name_arg(help: &'static str) -> Arg {
    Arg::new("name").required(true).value_name("NAME").help(help)
}

pub fn cmd_resource() -> ClapCommand {
    ClapCommand::new("resource")
        .about("Manage resources, the smallest lockable unit")
        .subcommand_required(true)
        .subcommand(
            ClapCommand::new("create")
                .about("Create one or more resources")
                .arg(names_arg("Resource names")),
        )
        .subcommand(
            ClapCommand::new("delete")
                .about("Delete one or more resources")
                .arg(names_arg("Resource names")),
        )
        .subcommand(
            ClapCommand::new("show")
                .about("Show a resource's lock state")
                .arg(name_arg("Resource name")),
        )
        .subcommand(ClapCommand::new("list").about("List all resources"))
}

pub fn cmd_label() -> ClapCommand {
    ClapCommand::new("label")
        .about("Manage labels, named groups of resources")
        .subcommand_required(true)
        .subcommand(
            ClapCommand::new("create")
                .about("Create one or more labels")
                .arg(names_arg("Label names")),
        )
        .subcommand(
            ClapCommand::new("delete")
                .about("Delete one or more labels (member resources are kept)")
                .arg(names_arg("Label names")),
        )
        .subcommand(
            ClapCommand::new("show")
                .about("Show a label's lock state and members")
                .arg(name_arg("Label name")),
        )
        .subcommand(ClapCommand::new("list").about("List all labels"))
        .subcommand(
            ClapCommand::new("add")
                .about("Add resources to a label")
                .arg(names_arg("Resource names"))
                .arg(
                    Arg::new("label")
                        .long("to")
                        .required(true)
                        .value_name("LABEL")
                        .help("Label to add to"),
                ),
        )
        .subcommand(
            ClapCommand::new("remove")
                .about("Remove resources from a label")
                .arg(names_arg("Resource names"))
                .arg(
                    Arg::new("label")
                        .long("from")
                        .required(true)
                        .value_name("LABEL")
                        .help("Label to remove from"),
                ),
        )
}

pub fn cmd_lock() -> ClapCommand {
    ClapCommand::new("lock")
        .about("Lock a label and every resource in it")
        .arg(name_arg("Label to lock"))
        .arg(user_arg())
        .arg(
            Arg::new("until")
                .long("until")
                .value_name("WHEN")
                .help("Requested expiry, recorded but not enforced"),
        )
}

pub fn cmd_unlock() -> ClapCommand {
    ClapCommand::new("unlock")
        .about("Unlock a label you hold")
        .arg(name_arg("Label to unlock"))
        .arg(user_arg())
}

pub fn cmd_steal() -> ClapCommand {
    ClapCommand::new("steal")
        .about("Take over a label someone else holds")
        .arg(name_arg("Label to steal"))
        .arg(user_arg())
}

pub fn cmd_status() -> ClapCommand {
    ClapCommand::new("status")
        .about("Show the lock state of a label or resource")
        .arg(name_arg("Label or resource name"))
}

pub fn cmd_list() -> ClapCommand {
    ClapCommand::new("list")
        .about("List the labels a user holds")
        .arg(
            Arg::new("owner")
                .value_name("USER")
                .help("User to list (defaults to the acting user)"),
        )
        .arg(user_arg())
}

pub fn cmd_events() -> ClapCommand {
    ClapCommand::new("events")
        .about("Relay lock/unlock attempts: JSON lines on stdin, notifications on stdout")
}

/// Build the full command tree
pub fn build_cli() -> ClapCommand {
    ClapCommand::new("locker")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Exclusive locks on shared resources and the labels that group them")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("json")
                .long("json")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Output as JSON"),
        )
        .arg(
            Arg::new("db")
                .long("db")
                .global(true)
                .value_name("PATH")
                .help("SQLite database file (overrides store.path)"),
        )
        .arg(
            Arg::new("namespace")
                .long("namespace")
                .global(true)
                .value_name("NAME")
                .help("Key namespace (overrides namespace)"),
        )
        .subcommand(cmd_resource())
        .subcommand(cmd_label())
        .subcommand(cmd_lock())
        .subcommand(cmd_unlock())
        .subcommand(cmd_steal())
        .subcommand(cmd_status())
        .subcommand(cmd_list())
        .subcommand(cmd_events())
}
