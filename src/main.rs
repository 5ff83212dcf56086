//! Coze bridge entry point.
//!
//! Startup sequence:
//!   1. Load .env (if present)
//!   2. Build the CLI from host and service flags
//!   3. Load config
//!   4. Resolve effective log level (CLI `-v` flags > env > config)
//!   5. Init logger once
//!   6. Layer service settings: defaults < config < env < CLI
//!   7. Spawn Ctrl-C → shutdown signal watcher
//!   8. Serve until the token is cancelled

use std::sync::Arc;

use clap::{Arg, ArgAction, Command};
use tokio_util::sync::CancellationToken;
use tracing::info;

use coze_bridge::error::AppError;
use coze_bridge::settings::{self, Settings};
use coze_bridge::{config, logger, server, services};

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

fn cli(flags: &[settings::FlagSpec]) -> Command {
    let cmd = Command::new("coze-bridge")
        .version(env!("CARGO_PKG_VERSION"))
        .about("HTTP bridge for sharing Coze bots")
        .arg(
            Arg::new("config")
                .short('f')
                .long("config")
                .value_name("PATH")
                .help("config file (default: config/default.toml)"),
        )
        .arg(
            Arg::new("bind")
                .long("bind")
                .value_name("ADDR")
                .help("listen address, overrides config and BRIDGE_BIND"),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .action(ArgAction::Count)
                .help("-v warn, -vv info, -vvv debug, -vvvv trace"),
        );
    settings::register_flags(cmd, flags)
}

async fn run() -> Result<(), AppError> {
    // Load .env if present; the file is optional.
    let _ = dotenvy::dotenv();

    let svcs = services::builtin()?;
    let flags = services::all_flags(&svcs);
    let matches = cli(&flags).get_matches();

    let mut config = config::load(matches.get_one::<String>("config").map(String::as_str))?;
    if let Some(bind) = matches.get_one::<String>("bind") {
        config.server.bind = bind.clone();
    }

    let cli_level = logger::verbosity_level(matches.get_count("verbose"));
    let effective_log_level = cli_level.unwrap_or(config.server.log_level.as_str());
    logger::init(effective_log_level, cli_level.is_some())?;

    info!(
        bind = %config.server.bind,
        configured_log_level = %config.server.log_level,
        effective_log_level = %effective_log_level,
        "config loaded"
    );

    let mut settings = Settings::from_flags(&flags);
    settings.merge_table(&flags, &config.services)?;
    settings.merge_env(&flags, |key| std::env::var(key).ok())?;
    settings.merge_cli(&flags, &matches);

    let router = server::build_router(&svcs, Arc::new(settings));

    let shutdown = CancellationToken::new();
    let ctrlc_token = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("ctrl-c received, shutting down");
            ctrlc_token.cancel();
        }
    });

    server::serve(&config.server.bind, router, shutdown).await
}
