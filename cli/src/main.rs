// SPDX-License-Identifier: PMPL-1.0-or-later
//! pgsync: schema-aware, dependency-ordered PostgreSQL table synchronizer.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;

use config::RunConfig;

#[derive(Parser)]
#[command(name = "pgsync")]
#[command(about = "Schema-aware, dependency-ordered PostgreSQL table synchronizer", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Synchronize the configured tables from source to destination.
    Run {
        #[arg(short, long, default_value = "pgsync.toml")]
        config: PathBuf,

        /// Override the source connection's DSN.
        #[arg(long)]
        source_url: Option<String>,

        /// Override the destination connection's DSN.
        #[arg(long)]
        dest_url: Option<String>,

        /// Override the configured batch size.
        #[arg(long)]
        batch_size: Option<usize>,

        /// Restrict the run to this table; repeatable. Overrides the config file's list.
        #[arg(long = "table")]
        tables: Vec<String>,
    },
    /// Write an example configuration file and exit.
    Init {
        #[arg(short, long, default_value = "pgsync.toml")]
        config: PathBuf,
    },
    /// Introspect and plan only; print the resulting table order without copying rows.
    Plan {
        #[arg(short, long, default_value = "pgsync.toml")]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pgsync=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Init { config } => init(&config),
        Commands::Plan { config } => plan_only(&config).await,
        Commands::Run {
            config,
            source_url,
            dest_url,
            batch_size,
            tables,
        } => run(&config, source_url, dest_url, batch_size, tables).await,
    }
}

fn init(config_path: &PathBuf) -> Result<()> {
    if config_path.exists() {
        anyhow::bail!(
            "{} already exists; remove it first if you want a fresh example",
            config_path.display()
        );
    }
    RunConfig::example().save(config_path)?;
    info!(path = %config_path.display(), "wrote example configuration");
    Ok(())
}

/// Resolved DSNs and run parameters after CLI overrides have been applied.
struct ResolvedRun {
    source_dsn: String,
    dest_dsn: String,
    tables: Vec<String>,
    batch_size: usize,
}

/// Load `config_path`, applying CLI overrides. Writes an example config and
/// aborts if the file does not exist yet, matching the original bootstrap
/// behavior of writing a starting point for the operator to edit.
fn load_and_override(
    config_path: &PathBuf,
    source_url: Option<String>,
    dest_url: Option<String>,
    batch_size: Option<usize>,
    tables: Vec<String>,
) -> Result<ResolvedRun> {
    if !config_path.exists() {
        RunConfig::example().save(config_path)?;
        anyhow::bail!(
            "no config found at {}; wrote an example there. Edit it and re-run.",
            config_path.display()
        );
    }

    let mut cfg = RunConfig::load(config_path)?;

    if let Some(batch_size) = batch_size {
        cfg.batch_size = batch_size;
    }
    if !tables.is_empty() {
        cfg.tables = tables;
    }
    cfg.validate()?;

    Ok(ResolvedRun {
        source_dsn: source_url.unwrap_or_else(|| cfg.source.dsn()),
        dest_dsn: dest_url.unwrap_or_else(|| cfg.destination.dsn()),
        tables: cfg.tables,
        batch_size: cfg.batch_size,
    })
}

async fn plan_only(config_path: &PathBuf) -> Result<()> {
    let resolved = load_and_override(config_path, None, None, None, Vec::new())?;

    let source = pgsync_core::PgHandle::connect(&resolved.source_dsn)
        .await
        .context("connecting to source")?;
    let model = pgsync_core::introspect(&source)
        .await
        .context("introspecting source catalog")?;
    let execution_plan = pgsync_core::plan(&model, &resolved.tables).context("planning")?;

    println!("execution order ({} tables):", execution_plan.len());
    for table in execution_plan.tables() {
        println!("  {}", table.qualified_name());
    }

    Ok(())
}

async fn run(
    config_path: &PathBuf,
    source_url: Option<String>,
    dest_url: Option<String>,
    batch_size: Option<usize>,
    tables: Vec<String>,
) -> Result<()> {
    let resolved = load_and_override(config_path, source_url, dest_url, batch_size, tables)?;

    let run_future = pgsync_core::run(
        &resolved.source_dsn,
        &resolved.dest_dsn,
        &resolved.tables,
        resolved.batch_size as i64,
    );
    tokio::pin!(run_future);

    let summary = tokio::select! {
        result = &mut run_future => result.context("synchronization failed")?,
        _ = tokio::signal::ctrl_c() => {
            warn!("Ctrl-C received, finishing the in-flight batch before stopping; press again to force-stop");
            tokio::select! {
                result = &mut run_future => result.context("synchronization failed")?,
                _ = tokio::signal::ctrl_c() => {
                    error!("second Ctrl-C received, aborting immediately");
                    anyhow::bail!("aborted by operator");
                }
            }
        }
    };

    info!(
        tables = summary.reports.len(),
        total_rows = summary.total_rows(),
        "synchronization complete"
    );
    for report in &summary.reports {
        info!(table = %report.table, rows = report.rows_processed, "table synced");
    }

    Ok(())
}
