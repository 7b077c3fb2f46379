//! Locker CLI - exclusive locks on shared resources and labels
//!
//! Binary name: `locker`

use std::process;

use locker::{
    cli::{build_cli, handlers::resolve_config, run_cli},
    output::REFUSED_EXIT_CODE,
    Refused,
};
use tracing_subscriber::EnvFilter;

/// Map an error to the process exit code.
fn exit_code(err: &anyhow::Error) -> i32 {
    if err.downcast_ref::<Refused>().is_some() {
        return REFUSED_EXIT_CODE;
    }
    err.downcast_ref::<locker_core::Error>()
        .map_or(1, locker_core::Error::exit_code)
}

fn init_tracing(level: &str) {
    // RUST_LOG wins over the configured level.
    let filter = EnvFilter::try_from_default_env()
        .ok()
        .or_else(|| EnvFilter::try_new(level).ok())
        .unwrap_or_else(|| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() {
    let matches = build_cli().get_matches();

    let result = match resolve_config(&matches) {
        Ok(config) => {
            init_tracing(&config.log.level);
            run_cli(&matches, &config).await
        }
        Err(err) => Err(err),
    };

    if let Err(err) = result {
        // Refusals were already reported on stdout.
        if err.downcast_ref::<Refused>().is_none() {
            #[allow(clippy::print_stderr)]
            {
                eprintln!("Error: {err:#}");
            }
        }

        #[allow(clippy::exit)]
        process::exit(exit_code(&err));
    }
}
