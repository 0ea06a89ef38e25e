//! `studio-server` binary: load configuration, install logging, serve until signalled

use anyhow::Context;
use clap::{value_parser, Arg, ArgAction, Command};
use std::path::PathBuf;
use std::time::Duration;
use studio_core::StudioConfig;
use studio_server::{bind, parse_address, shutdown_signal, spawn_limiter_sweeper, AppState};
use tracing::info;
use tracing_subscriber::EnvFilter;

fn cli() -> Command {
    Command::new("studio-server")
        .version(studio_server::VERSION)
        .about("Studio profile API")
        .arg(
            Arg::new("config")
                .long("config")
                .short('c')
                .value_parser(value_parser!(PathBuf))
                .help("TOML configuration file"),
        )
        .arg(
            Arg::new("port")
                .long("port")
                .short('p')
                .value_parser(value_parser!(u16))
                .help("Listen port (overrides config and STUDIO_PORT)"),
        )
        .arg(
            Arg::new("json-logs")
                .long("json-logs")
                .action(ArgAction::SetTrue)
                .help("Emit logs as JSON lines"),
        )
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let matches = cli().get_matches();
    init_tracing(matches.get_flag("json-logs"));

    let config = match matches.get_one::<PathBuf>("config") {
        Some(path) => StudioConfig::load(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => StudioConfig::default(),
    };
    let mut config = config
        .with_env_overrides()
        .context("applying STUDIO_* overrides")?;
    if let Some(port) = matches.get_one::<u16>("port") {
        config.server.port = *port;
    }

    let address = parse_address(&config.bind_address())?;
    let state = AppState::new(&config);
    info!(
        sync = ?config.sync,
        rate_limit = ?config.rate_limit,
        tokens = config.auth.tokens.len(),
        "starting studio-server"
    );

    let sweeper = spawn_limiter_sweeper(&state, config.rate_limit.window().max(Duration::from_secs(1)));
    let (bound, server) = bind(state, address, shutdown_signal())?;
    info!(address = %bound, "studio-server ready");

    server.await;
    sweeper.abort();
    info!("studio-server stopped");
    Ok(())
}
