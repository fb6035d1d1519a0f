// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! TPV FIT uploader
//!
//! Re-badges TrainingPeaks Virtual rides as Garmin Edge 830 recordings and
//! uploads them to Garmin Connect, once or as a directory watching daemon.

use clap::{CommandFactory, Parser};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tpv_fit_uploader::{
    cli::{Cli, Mode},
    config::{Config, ConfigFile, CONFIG_FILE},
    fit::FitCodec,
    services::{watcher, GarminConnectClient, IntervalsClient, Uploader},
    setup, Result,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

type TpvUploader = Uploader<FitCodec, GarminConnectClient, IntervalsClient>;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let Some(mode) = cli.mode() else {
        Cli::command()
            .error(
                clap::error::ErrorKind::MissingRequiredArgument,
                "Specify either \"--upload-all\" or one input file/directory to use",
            )
            .exit()
    };

    // Loads .env, which may also set LOG_FORMAT
    let mut config = Config::from_env();
    config.dry_run = cli.dryrun;
    init_logging(cli.verbose);

    match run(mode, config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(mode: Mode, config: Config) -> Result<()> {
    match mode {
        Mode::SingleFile { path, upload } => {
            let uploader = build_uploader(config)?;
            let outcome = uploader.process_file(&path, upload).await?;
            tracing::info!(output = %outcome.output.display(), "Done");
        }
        Mode::Batch { dir, preinitialise } => {
            let (dir, config) = resolve_dir(dir, config)?;
            let uploader = build_uploader(config)?;
            uploader.upload_all(&dir, preinitialise).await?;
        }
        Mode::Daemon { dir } => {
            // Nobody is around to fix a login problem later
            config.require_credentials()?;
            let (dir, config) = resolve_dir(dir, config)?;
            let uploader = build_uploader(config)?;
            watcher::watch(&uploader, &dir, shutdown_signal()).await?;
        }
    }
    Ok(())
}

fn build_uploader(config: Config) -> Result<TpvUploader> {
    let garmin = GarminConnectClient::new(&config)?;
    let intervals = IntervalsClient::new(config.intervals.clone())?;
    if !intervals.is_enabled() {
        tracing::debug!("Intervals.icu credentials not set, workout names disabled");
    }
    Ok(Uploader::new(FitCodec, garmin, intervals, config))
}

/// Use the given directory, or fall back to the configured TPV folder.
fn resolve_dir(dir: Option<PathBuf>, config: Config) -> Result<(PathBuf, Config)> {
    if let Some(dir) = dir {
        return Ok((dir, config));
    }

    let config_path = Path::new(CONFIG_FILE);
    let file = if config_path.is_file() {
        ConfigFile::load(config_path)?
    } else {
        setup::first_run(config_path, &config)?
    };
    let config = config.with_file(file);
    let dir = setup::default_watch_dir(&setup::tpv_folder()?, &config)?;
    Ok((dir, config))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
}

/// Human readable logs on stderr, or JSON lines with `LOG_FORMAT=json`.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    let extra = std::env::var("RUST_LOG").unwrap_or_default();
    let filter = EnvFilter::new(format!("warn,tpv_fit_uploader={},{}", level, extra));

    let registry = tracing_subscriber::registry().with(filter);
    if std::env::var("LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json")) {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(false)
                    .with_current_span(true)
                    .flatten_event(true)
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}
