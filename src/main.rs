//! `shelf`: command-line front end of the circulation store.

mod cli;
mod commands;
mod error;
mod export;

use crate::cli::Cli;
use crate::commands::Context;
use crate::error::{Error, ErrorKind, Result};
use clap::Parser;
use exn::ResultExt;
use shelf_config::Config;
use shelf_store::{Database, Library};
use time::OffsetDateTime;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// `RUST_LOG` wins over the configured level; an unparsable level falls
/// back to `warn`.
fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = Config::load(cli.config.as_deref()).or_raise(|| ErrorKind::Config)?;
    if let Some(database) = cli.database {
        config.database = database;
    }
    init_tracing(&config.log_level);

    if let Some(parent) = config.database.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).or_raise(|| ErrorKind::Store)?;
    }
    let db = Database::connect(&config.database).await.or_raise(|| ErrorKind::Store)?;
    let ctx = Context { library: Library::from(&db), config, today: OffsetDateTime::now_utc().date() };
    let stdout = std::io::stdout();
    let outcome = commands::run(cli.command, &ctx, &mut stdout.lock()).await;
    db.close().await;
    outcome
}

/// Requests the user can correct get a retry hint, anything else is reported as aborted.
fn report(err: &Error) -> miette::Report {
    match err.is_retryable() {
        true => miette::miette!(help = "correct the request and try again", "{err:?}"),
        false => miette::miette!(help = "the operation was aborted; nothing was changed", "{err:?}"),
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> miette::Result<()> {
    let cli = Cli::parse();
    run(cli).await.map_err(|err| report(&err))
}
