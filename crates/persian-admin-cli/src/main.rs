//! Persian Admin CLI - sign in to the admin dashboard from a terminal.
//!
//! The signed-in profile is cached on disk for 24 hours, so later
//! invocations (`status`, `extend`, `watch`) see the same session until it
//! expires or `logout` is run.

mod commands;

use std::io;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use persian_admin_core::remote::{seed_demo_users, MemoryIdentityProvider, MemoryProfileStore};
use persian_admin_core::{AuthService, Config, FileStorage, SessionManager, SystemClock, UserProfile};

use commands::Command;

/// Log file name written with `--log-file`
const LOG_FILE_NAME: &str = "persian-admin.log";

const USAGE: &str = "\
Usage: persian-admin [--log-file] <command>

Commands:
  login [email]         Sign in (demo account: admin@example.com / 123456)
  signup <email> <name> Create an account and sign in. The account directory
                        lives in memory for this run only; later runs keep the
                        cached session until it expires or you log out, but
                        the new account cannot `login` again.
  logout                End the cached session
  status [--json]       Show the cached session
  extend                Restart the 24 hour session window
  watch                 Wait for the session to expire (Ctrl-C to stop)";

/// Initialize the tracing subscriber for logging.
///
/// Logs go to stderr, and additionally to a file in `log_dir` when given.
fn init_tracing(log_dir: Option<&Path>) -> Option<WorkerGuard> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::never(dir, LOG_FILE_NAME);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (
                Some(fmt::layer().with_ansi(false).with_writer(writer)),
                Some(guard),
            )
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .with(filter)
        .init();

    guard
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let mut args: Vec<String> = std::env::args().skip(1).collect();
    let log_to_file = match args.iter().position(|a| a == "--log-file") {
        Some(i) => {
            args.remove(i);
            true
        }
        None => false,
    };

    let command = match Command::parse(&args) {
        Ok(command) => command,
        Err(e) => {
            eprintln!("{}\n\n{}", e, USAGE);
            std::process::exit(2);
        }
    };

    let mut config = Config::load()?;
    let storage_dir = config.storage_dir()?;

    let _guard = if log_to_file {
        std::fs::create_dir_all(&storage_dir)
            .with_context(|| format!("Failed to create {}", storage_dir.display()))?;
        init_tracing(Some(&storage_dir))
    } else {
        init_tracing(None)
    };
    info!(dir = %storage_dir.display(), "Persian Admin starting");

    // Composition root: one session manager for the whole process
    let sessions: Arc<SessionManager<UserProfile>> = Arc::new(SessionManager::new(
        Arc::new(FileStorage::new(storage_dir)),
        Arc::new(SystemClock),
        config.session_settings(),
    ));
    // Accounts do not outlive the process; only the cached session does
    let identity = Arc::new(MemoryIdentityProvider::new());
    let profiles = Arc::new(MemoryProfileStore::new());
    seed_demo_users(identity.as_ref(), profiles.as_ref()).await;

    let auth = AuthService::new(identity, profiles, sessions);

    commands::run(command, &auth, &mut config).await
}
