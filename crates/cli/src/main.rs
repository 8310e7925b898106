mod cli;
mod render;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{debug, error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};

use converto_core::{
    load_config, load_config_from_env, validate_config, BatchOrchestrator, Config, InputFile,
    LocalFile, SanitizedConfig,
};

use cli::Cli;
use render::{exit_code, plan_table, result_table, ProgressPrinter, EXIT_SUCCESS};

/// Config file looked up in the working directory when `--config` is absent.
const DEFAULT_CONFIG_FILE: &str = "converto.toml";

/// Exit code for setup errors (bad config, unreadable paths).
const EXIT_FATAL: i32 = 1;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.log_json);

    match run(cli).await {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            error!("Fatal error: {:#}", e);
            std::process::exit(EXIT_FATAL);
        }
    }
}

fn init_tracing(verbose: bool, json: bool) {
    let default_filter = if verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter.into());

    // Logs go to stderr so stdout only carries results.
    let fmt_layer = if json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .boxed()
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .init();
}

async fn run(cli: Cli) -> Result<i32> {
    let config = load_settings(cli.config.as_deref())?;
    validate_config(&config).context("Configuration validation failed")?;
    info!(backend = config.client.backend.as_str(), "Configuration loaded");
    debug!(
        "Effective configuration: {}",
        serde_json::to_string(&SanitizedConfig::from(&config)).unwrap_or_default()
    );

    let files = open_files(&cli.files).await?;

    if cli.dry_run {
        let plan = BatchOrchestrator::plan(&files, cli.format.as_deref());
        if cli.json {
            println!("{}", serde_json::to_string_pretty(&plan)?);
        } else {
            print!("{}", plan_table(&plan));
        }
        return Ok(EXIT_SUCCESS);
    }

    let orchestrator =
        BatchOrchestrator::from_config(&config).context("Failed to create conversion client")?;
    info!(
        client = orchestrator.client_name(),
        files = files.len(),
        "Starting conversion"
    );

    let printer = ProgressPrinter::new(&files);
    let result = orchestrator
        .start(files, cli.format.as_deref(), &printer)
        .await
        .context("Cannot start conversion")?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print!("{}", result_table(&result));
    }

    Ok(exit_code(&result))
}

/// Loads the explicit config file, else `converto.toml` if present, else
/// defaults. Environment overrides apply in every case.
fn load_settings(explicit: Option<&Path>) -> Result<Config> {
    if let Some(path) = explicit {
        info!("Loading configuration from {:?}", path);
        return load_config(path)
            .with_context(|| format!("Failed to load config from {:?}", path));
    }

    let default_path = PathBuf::from(DEFAULT_CONFIG_FILE);
    if default_path.exists() {
        info!("Loading configuration from {:?}", default_path);
        return load_config(&default_path)
            .with_context(|| format!("Failed to load config from {:?}", default_path));
    }

    debug!("No config file found, using defaults");
    load_config_from_env().context("Failed to load config from environment")
}

async fn open_files(paths: &[PathBuf]) -> Result<Vec<Arc<dyn InputFile>>> {
    let mut files: Vec<Arc<dyn InputFile>> = Vec::with_capacity(paths.len());
    for path in paths {
        let file = LocalFile::open(path)
            .await
            .with_context(|| format!("Cannot open {:?}", path))?;
        debug!(
            path = ?file.path(),
            kind = file.media_kind(),
            bytes = file.byte_len(),
            "Selected file"
        );
        files.push(Arc::new(file));
    }
    Ok(files)
}
