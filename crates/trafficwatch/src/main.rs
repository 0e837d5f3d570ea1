//! `trafficwatch` - CLI for the traffic backend
//!
//! This binary serves the HTTP API and provides maintenance commands for the
//! database behind it.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use std::fs::File;
use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use trafficwatch::api::{self, AppState};
use trafficwatch::cli::{
    Cli, Command, ConfigCommand, ImportCommand, ServeCommand, ThresholdsCommand, UserCommand,
};
use trafficwatch::import::{self, ImportSummary};
use trafficwatch::{auth, init_logging, Config, Storage};

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    init_logging(cli.verbosity());

    // Validation of another file must not depend on the active configuration
    if let Command::Config(ConfigCommand::Validate { file }) = &cli.command {
        handle_validate(file.as_deref().or(cli.config.as_deref()));
        return Ok(());
    }

    // Load configuration
    let config = Config::load_from(cli.config.clone()).context("loading configuration")?;

    // Execute the command
    match cli.command {
        Command::Serve(cmd) => handle_serve(config, cmd),
        Command::Import(cmd) => handle_import(&config, &cmd),
        Command::User(cmd) => handle_user(&config, cmd),
        Command::Thresholds(cmd) => handle_thresholds(&config, &cmd),
        Command::Config(cmd) => handle_config(&config, &cmd),
    }
}

fn open_storage(config: &Config) -> Result<Storage> {
    let path = config.database_path();
    Storage::open(&path).with_context(|| format!("opening database {}", path.display()))
}

fn handle_serve(mut config: Config, cmd: ServeCommand) -> Result<()> {
    if let Some(bind) = cmd.bind {
        config.server.bind = bind;
    }
    let addr = config.bind_addr()?;
    let storage = open_storage(&config)?;

    let api_key = config.api_key();
    if api_key.is_none() {
        tracing::warn!("sensors.api_key is not set; observation ingestion is disabled");
    }
    let state = AppState::new(storage)
        .with_api_key(api_key)
        .with_window(config.window());

    let runtime = tokio::runtime::Runtime::new().context("starting async runtime")?;
    runtime.block_on(async move {
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .with_context(|| format!("binding {addr}"))?;
        api::serve(listener, state, shutdown_signal()).await?;
        Ok(())
    })
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown requested");
}

fn handle_import(config: &Config, cmd: &ImportCommand) -> Result<()> {
    let storage = open_storage(config)?;
    let (kind, summary) = match cmd {
        ImportCommand::Segments { file } => (
            "road segments",
            import::import_segments(&storage, open_csv(file)?)?,
        ),
        ImportCommand::Sensors { file } => {
            ("sensors", import::import_sensors(&storage, open_csv(file)?)?)
        }
    };
    print_summary(kind, summary);
    Ok(())
}

fn open_csv(path: &Path) -> Result<File> {
    File::open(path).with_context(|| format!("opening {}", path.display()))
}

fn print_summary(kind: &str, summary: ImportSummary) {
    println!("Imported {} {kind}", summary.imported);
    if summary.skipped > 0 {
        println!("Skipped {} rows (see log for details)", summary.skipped);
    }
}

fn handle_user(config: &Config, cmd: UserCommand) -> Result<()> {
    match cmd {
        UserCommand::Create {
            username,
            password,
            staff,
        } => {
            let storage = open_storage(config)?;
            let hash = auth::hash_password(&password)?;
            let user = storage.create_user(&username, &hash, staff)?;
            println!(
                "Created {} user {:?} (id {})",
                if user.is_staff { "staff" } else { "regular" },
                user.username,
                user.id
            );
        }
    }
    Ok(())
}

fn handle_thresholds(config: &Config, cmd: &ThresholdsCommand) -> Result<()> {
    let storage = open_storage(config)?;
    match cmd {
        ThresholdsCommand::Show { json } => {
            let current = storage.current_thresholds()?;
            if *json {
                println!("{}", serde_json::to_string_pretty(&current)?);
            } else {
                println!("Traffic intensity thresholds");
                println!("============================");
                println!("  high:   speed < {}", current.medium_min());
                println!(
                    "  medium: {} <= speed <= {}",
                    current.medium_min(),
                    current.medium_max()
                );
                println!("  low:    speed > {}", current.medium_max());
                if storage.current_threshold_record()?.is_none() {
                    println!();
                    println!("(defaults; no thresholds recorded)");
                }
            }
        }
        ThresholdsCommand::Set { min, max } => {
            let record = storage.set_thresholds(*min, *max)?;
            println!(
                "Thresholds set: medium between {} and {} (record {})",
                record.medium_min, record.medium_max, record.id
            );
        }
    }
    Ok(())
}

fn handle_config(config: &Config, cmd: &ConfigCommand) -> Result<()> {
    match cmd {
        ConfigCommand::Show { json } => {
            let shown = config.redacted();
            if *json {
                println!("{}", serde_json::to_string_pretty(&shown)?);
            } else {
                println!("Current Configuration");
                println!("=====================");
                println!();
                println!("[Storage]");
                println!("  Database path:      {}", shown.database_path().display());
                println!();
                println!("[Server]");
                println!("  Bind:               {}", shown.server.bind);
                println!();
                println!("[Sensors]");
                println!(
                    "  API key:            {}",
                    shown.sensors.api_key.as_deref().unwrap_or("(not set)")
                );
                println!();
                println!("[Observations]");
                println!("  Window (hours):     {}", shown.observations.window_hours);
            }
        }
        ConfigCommand::Path => {
            println!("{}", Config::default_config_path().display());
        }
        ConfigCommand::Validate { file } => handle_validate(file.as_deref()),
    }
    Ok(())
}

fn handle_validate(file: Option<&Path>) {
    let path = file.map_or_else(Config::default_config_path, Path::to_path_buf);
    println!("Validating configuration: {}", path.display());
    match Config::load_from(Some(path)) {
        Ok(_) => println!("Configuration is valid."),
        Err(e) => println!("Configuration error: {e}"),
    }
}
