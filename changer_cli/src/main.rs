mod cli;
mod commands;
mod error_fmt;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::Parser;
use eyre::{Result, WrapErr};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt};

use crate::cli::{Cli, Commands, DEFAULT_CONFIG, FILE_GUARD, JSON_MODE};
use crate::error_fmt::{exit_code_for_error, format_error_json, humanize};

fn main() {
    let cli = Cli::parse();
    let _ = JSON_MODE.set(cli.json);
    let _ = color_eyre::install();

    if let Err(err) = real_main(&cli) {
        tracing::error!(error = %err, "command failed");
        if JSON_MODE.get().copied().unwrap_or(false) {
            eprintln!("{}", format_error_json(&err));
        } else {
            eprintln!("{}", humanize(&err));
        }
        std::process::exit(exit_code_for_error(&err));
    }
}

fn real_main(cli: &Cli) -> Result<()> {
    let cfg = load_config(&cli.config)?;
    init_logging(cli, &cfg.logging)?;

    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let flag = shutdown.clone();
        ctrlc::set_handler(move || flag.store(true, Ordering::Relaxed))
            .wrap_err("install Ctrl-C handler")?;
    }

    let base_dir = cli
        .config
        .parent()
        .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
    let session = commands::open_session(&cfg, &base_dir)?;

    match &cli.cmd {
        Commands::Run {
            amount,
            idle_timeout_ms,
        } => commands::run(&session, *amount, *idle_timeout_ms, cli.json, &shutdown),
        Commands::Tubes => commands::tubes(&session, cli.json),
        Commands::Dispense {
            coin_type,
            quantity,
        } => commands::dispense(&session, *coin_type, *quantity, cli.json),
        Commands::Refund { amount } => commands::refund(&session, *amount, cli.json),
        Commands::Plan { amount } => commands::plan(&session, *amount, cli.json),
        Commands::SelfCheck => commands::self_check(&session, cli.json),
    }
}

/// Read and validate the TOML config. A missing file at the default path means
/// built-in defaults; an explicitly named file must exist.
fn load_config(path: &Path) -> Result<changer_config::Config> {
    if !path.exists() && path == Path::new(DEFAULT_CONFIG) {
        return Ok(changer_config::Config::default());
    }
    let text = std::fs::read_to_string(path)
        .wrap_err_with(|| format!("read config file {}", path.display()))?;
    let cfg: changer_config::Config = toml::from_str(&text)
        .wrap_err_with(|| format!("parse config {}", path.display()))?;
    cfg.validate().wrap_err("invalid configuration")?;
    Ok(cfg)
}

fn init_logging(cli: &Cli, logging: &changer_config::Logging) -> Result<()> {
    // RUST_LOG wins over --log-level for the console
    let console_filter = match EnvFilter::try_from_default_env() {
        Ok(f) => f,
        Err(_) => EnvFilter::try_new(&cli.log_level)
            .wrap_err_with(|| format!("invalid --log-level '{}'", cli.log_level))?,
    };

    let mut layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> = Vec::new();
    if cli.json {
        layers.push(
            fmt::layer()
                .json()
                .with_writer(std::io::stderr)
                .with_filter(console_filter)
                .boxed(),
        );
    } else {
        layers.push(
            fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr)
                .with_filter(console_filter)
                .boxed(),
        );
    }

    if let Some(file) = &logging.file {
        let path = Path::new(file);
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let name = path
            .file_name()
            .ok_or_else(|| eyre::eyre!("logging.file '{file}' has no file name"))?;
        let appender = match logging.rotation.as_deref().unwrap_or("never") {
            "daily" => tracing_appender::rolling::daily(dir, name),
            "hourly" => tracing_appender::rolling::hourly(dir, name),
            _ => tracing_appender::rolling::never(dir, name),
        };
        let (writer, guard) = tracing_appender::non_blocking(appender);
        let _ = FILE_GUARD.set(guard);
        let level = logging.level.as_deref().unwrap_or("info");
        let file_filter =
            EnvFilter::try_new(level).wrap_err_with(|| format!("invalid logging.level '{level}'"))?;
        layers.push(
            fmt::layer()
                .json()
                .with_ansi(false)
                .with_writer(writer)
                .with_filter(file_filter)
                .boxed(),
        );
    }

    tracing_subscriber::registry()
        .with(layers)
        .try_init()
        .wrap_err("install tracing subscriber")?;
    Ok(())
}
