//! Command-line interface: argument definitions and handlers.

pub mod commands;
pub mod handlers;

pub use commands::build_cli;
pub use handlers::run_cli;
