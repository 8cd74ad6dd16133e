//! # capi-host
//!
//! Command-line host for script runtime modules.
//!
//! ## Running
//!
//! ```bash
//! # Report the version markers of a module
//! cargo run --bin capi-host -- inspect target/debug/libmodule_dummy.so
//!
//! # Drive a resource through start, 20 ticks and stop
//! cargo run --bin capi-host -- run target/debug/libmodule_dummy.so --ticks 20
//!
//! # With debug logging
//! RUST_LOG=debug cargo run --bin capi-host -- run --ticks 0
//! ```

use anyhow::{Context, Result};
use capi_host::{HostConfig, HostDriver, ModuleLoader, ModuleReport, ResourceState};
use resource_runtime::LogLevel;
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// capi-host - load script runtime modules and drive their resources
#[derive(Parser, Debug)]
#[command(name = "capi-host")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file (default: $XDG_CONFIG_HOME/capi-host/config.toml)
    #[arg(short, long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Report SDK version markers of modules (configured modules if no path is given)
    Inspect {
        #[arg(value_name = "PATH")]
        paths: Vec<PathBuf>,
    },
    /// Load a module and drive one resource through start, ticks and stop
    Run {
        /// Module to load (first configured module if omitted)
        #[arg(value_name = "PATH")]
        path: Option<PathBuf>,

        /// Number of ticks to run; 0 runs until Ctrl+C
        #[arg(short, long, default_value_t = 10)]
        ticks: u64,

        /// Name of the resource to create
        #[arg(short, long, default_value = "main")]
        resource: String,
    },
}

/// Outcome of `capi-host run`.
#[derive(Debug, Serialize)]
struct RunSummary {
    module: PathBuf,
    resource: String,
    ticks: u64,
    state: Option<ResourceState>,
    started_at: DateTime<Utc>,
    finished_at: DateTime<Utc>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let (config, config_error) = match load_config(cli.config.as_deref()) {
        Ok(config) => (config, None),
        Err(e) => (HostConfig::default(), Some(e)),
    };

    init_logging(&config.host.log_level);
    info!("Starting capi-host v{}", env!("CARGO_PKG_VERSION"));
    if let Some(e) = config_error {
        warn!("Failed to load config, using defaults: {:#}", e);
    }

    match cli.command {
        Command::Inspect { paths } => inspect(&config, paths, cli.json),
        Command::Run {
            path,
            ticks,
            resource,
        } => run(&config, path, ticks, &resource, cli.json).await,
    }
}

fn load_config(path: Option<&Path>) -> Result<HostConfig> {
    match path {
        Some(path) => HostConfig::load(path),
        None => HostConfig::load_default(),
    }
}

fn init_logging(level: &str) {
    let level = LogLevel::parse(level).unwrap_or(LogLevel::Info);
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()));

    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .init();
}

fn inspect(config: &HostConfig, paths: Vec<PathBuf>, json: bool) -> Result<()> {
    let paths = if paths.is_empty() {
        config.modules.iter().map(|m| m.path.clone()).collect()
    } else {
        paths
    };
    if paths.is_empty() {
        anyhow::bail!("No module paths given and none configured");
    }

    let loader = ModuleLoader::from_config(&config.host);
    let reports: Vec<ModuleReport> = paths.iter().map(|path| loader.inspect(path)).collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
    } else {
        for report in &reports {
            print_report(report);
        }
    }

    let rejected = reports.iter().filter(|r| !r.accepted).count();
    if rejected > 0 {
        anyhow::bail!("{} of {} module(s) rejected", rejected, reports.len());
    }
    Ok(())
}

fn print_report(report: &ModuleReport) {
    let version = report
        .module_sdk_version
        .map(|v| v.to_string())
        .unwrap_or_else(|| "-".to_string());
    let verdict = match (&report.compatibility, &report.error) {
        (Some(compatibility), _) => format!("accepted ({:?})", compatibility),
        (None, Some(error)) => format!("rejected: {}", error),
        (None, None) => "rejected".to_string(),
    };

    println!("{}", report.path.display());
    println!("  skip marker:  {}", report.skip_version_check);
    println!("  sdk version:  {} (host {})", version, report.host_sdk_version);
    println!("  entry:        {}", report.has_entry);
    println!("  verdict:      {}", verdict);
}

async fn run(
    config: &HostConfig,
    path: Option<PathBuf>,
    ticks: u64,
    resource: &str,
    json: bool,
) -> Result<()> {
    let (path, module_config) = match path {
        Some(path) => {
            let module_config = config
                .modules
                .iter()
                .find(|m| m.path == path)
                .and_then(|m| m.config.clone());
            (path, module_config)
        }
        None => {
            let entry = config
                .modules
                .first()
                .context("No module path given and none configured")?;
            (entry.path.clone(), entry.config.clone())
        }
    };

    let loader = ModuleLoader::from_config(&config.host);
    let module = loader
        .load_with_config(&path, module_config.as_deref())
        .with_context(|| format!("Failed to load module {}", path.display()))?;

    // SAFETY: the driver is dropped before `module`, which keeps the library loaded.
    let runtime = unsafe { module.create_runtime() }?;
    let mut driver = unsafe { HostDriver::new(runtime) }?;

    let started_at = Utc::now();
    let id = driver.create_resource(resource)?;
    driver.start(id)?;

    let period = config.host.tick_interval();
    if ticks == 0 {
        info!("Ticking every {:?}; press Ctrl+C to stop", period);
        let mut ticker = tokio::time::interval(period);
        let shutdown = tokio::signal::ctrl_c();
        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                _ = ticker.tick() => driver.tick(),
                _ = &mut shutdown => break,
            }
        }
    } else {
        driver.run_ticks(ticks, period).await;
    }

    driver.stop(id)?;
    let summary = RunSummary {
        module: module.path().to_path_buf(),
        resource: resource.to_string(),
        ticks: driver.ticks(),
        state: driver.resource_state(id),
        started_at,
        finished_at: Utc::now(),
    };

    drop(driver);
    drop(module);

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!(
            "Ran resource '{}' from {} for {} tick(s)",
            summary.resource,
            summary.module.display(),
            summary.ticks
        );
    }
    Ok(())
}
