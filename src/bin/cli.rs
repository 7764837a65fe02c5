//! Pitwall CLI
//!
//! Local execution entry point for standings, roster and telemetry runs.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use pitwall::{
    config::{self, CREDENTIALS_ENV, CredentialSource},
    error::Result,
    models::{Config, RaceRef, ReferenceTables, SessionType},
    pipeline::{ArtifactSink, ExportSink, Orchestrator, PublishGuard, RunReport, StoreSink},
    services::HttpSource,
    storage::{BlobStore, DocumentStore, LocalStore, StandingsArtifact},
};
use tokio::sync::watch;

/// Pitwall - F1 data publisher
#[derive(Parser, Debug)]
#[command(
    name = "pitwall",
    version,
    about = "Fetches F1 standings, rosters and telemetry and publishes them"
)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "pitwall.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Publish the drivers' and constructors' championships
    Standings {
        /// Season to publish (default: run.season)
        #[arg(long)]
        season: Option<u16>,

        /// Also merge the standings document into the store
        #[arg(long)]
        store: bool,

        /// Publish even when the collections shrank sharply
        #[arg(long)]
        force: bool,
    },

    /// Publish driver, team and car documents
    Roster {
        /// Season stamped on the documents (default: run.season)
        #[arg(long)]
        season: Option<u16>,

        /// Live-timing session to read the roster from
        #[arg(long, default_value = "latest")]
        session_key: String,
    },

    /// Publish one telemetry export
    Telemetry {
        #[arg(long)]
        year: u16,

        #[arg(long)]
        round: u32,

        /// One of R, S, Q, SQ
        #[arg(long, default_value = "R")]
        session_type: SessionType,

        /// Read the raw telemetry document from a local file
        #[arg(long)]
        input: Option<PathBuf>,

        /// Write the export to a local directory instead of the store
        #[arg(long)]
        local_only: bool,

        /// Export directory for --local-only (default: paths.export_dir)
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Validate configuration and reference tables
    Validate,

    /// Show resolved configuration and published state
    Info,
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

/// Cancellation channel flipped by Ctrl-C.
fn cancel_on_ctrl_c() -> watch::Receiver<bool> {
    let (tx, rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("Interrupted, cancelling run...");
            let _ = tx.send(true);
        }
    });
    rx
}

/// Resolve a configured path against the config file's directory.
fn resolve(cli: &Cli, path: &Path) -> PathBuf {
    config::resolve_relative(&cli.config, path)
}

fn credential_source(cli: &Cli, config: &Config) -> CredentialSource {
    let explicit = config.store.credentials.as_deref().map(|p| resolve(cli, p));
    let env_value = std::env::var(CREDENTIALS_ENV).ok();
    let search_dir = cli
        .config
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    config::resolve_credentials(explicit.as_deref(), env_value.as_deref(), search_dir)
}

/// Document and blob store, built once per process.
async fn open_store(
    cli: &Cli,
    config: &Config,
) -> Result<(Arc<dyn DocumentStore>, Arc<dyn BlobStore>)> {
    if let Some(bucket) = &config.store.bucket {
        #[cfg(feature = "s3")]
        {
            let source = credential_source(cli, config);
            let store = Arc::new(
                pitwall::storage::S3Store::connect(&source, bucket, &config.store.prefix).await?,
            );
            log::info!("Using object store bucket {}", bucket);
            let documents: Arc<dyn DocumentStore> = store.clone();
            let blobs: Arc<dyn BlobStore> = store;
            return Ok((documents, blobs));
        }
        #[cfg(not(feature = "s3"))]
        return Err(pitwall::error::AppError::config(format!(
            "store.bucket = {bucket} requires the s3 feature"
        )));
    }

    let root = resolve(cli, &config.paths.store_root);
    log::info!("Using local store at {}", root.display());
    let store = Arc::new(LocalStore::new(root));
    let documents: Arc<dyn DocumentStore> = store.clone();
    let blobs: Arc<dyn BlobStore> = store;
    Ok((documents, blobs))
}

fn finish(report: RunReport) -> Result<()> {
    let failed: usize = report.receipts.iter().map(|r| r.failed).sum();
    if failed > 0 {
        log::warn!("{} documents failed to publish", failed);
    }
    log::info!("Run finished in state {}", report.state());
    Ok(())
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    log::info!("Pitwall starting...");

    let (config, tables) = config::load_all(&cli.config)?;
    log::info!("Loaded configuration from {}", cli.config.display());

    let source = HttpSource::new(&config.source)?;

    match &cli.command {
        Command::Standings {
            season,
            store,
            force,
        } => {
            let season = season.unwrap_or(config.run.season);
            let artifact = ArtifactSink::new(
                StandingsArtifact::new(resolve(&cli, &config.paths.artifact)),
                tables.points_history.clone(),
            );
            let store_sink = if *store {
                let (documents, _) = open_store(&cli, &config).await?;
                Some(StoreSink::new(documents))
            } else {
                None
            };

            let mut orchestrator = Orchestrator::new(&source, &tables, &config)
                .with_sink(&artifact)
                .with_guard(PublishGuard::new(config.guard.clone()).forced(*force))
                .with_cancel(cancel_on_ctrl_c());
            if let Some(sink) = &store_sink {
                orchestrator = orchestrator.with_sink(sink);
            }

            finish(orchestrator.run_standings(season).await?)?;
        }

        Command::Roster {
            season,
            session_key,
        } => {
            let season = season.unwrap_or(config.run.season);
            let (documents, _) = open_store(&cli, &config).await?;
            let sink =
                StoreSink::new(documents).with_concurrency(config.source.max_concurrent);

            let report = Orchestrator::new(&source, &tables, &config)
                .with_sink(&sink)
                .with_cancel(cancel_on_ctrl_c())
                .run_roster(season, session_key)
                .await?;
            finish(report)?;
        }

        Command::Telemetry {
            year,
            round,
            session_type,
            input,
            local_only,
            output,
        } => {
            let race = RaceRef {
                year: *year,
                round: *round,
                session_type: *session_type,
            };

            let report = if *local_only {
                let dir = output
                    .clone()
                    .unwrap_or_else(|| resolve(&cli, &config.paths.export_dir));
                let sink = ExportSink::new(dir);
                Orchestrator::new(&source, &tables, &config)
                    .with_sink(&sink)
                    .with_cancel(cancel_on_ctrl_c())
                    .run_telemetry(race, input.as_deref())
                    .await?
            } else {
                let (documents, blobs) = open_store(&cli, &config).await?;
                let sink = StoreSink::new(documents).with_blobs(blobs);
                Orchestrator::new(&source, &tables, &config)
                    .with_sink(&sink)
                    .with_cancel(cancel_on_ctrl_c())
                    .run_telemetry(race, input.as_deref())
                    .await?
            };
            finish(report)?;
        }

        Command::Validate => {
            log::info!("Validating configuration...");
            // load_all already validated both; report what was checked.
            log::info!("✓ Config OK");
            log::info!(
                "✓ Reference tables OK ({} teams, {} aliases, {} portraits)",
                tables.teams.len(),
                tables.team_aliases.len(),
                tables.portraits.len()
            );
            log::info!("All validations passed!");
        }

        Command::Info => info(&cli, &config, &tables).await?,
    }

    log::info!("Done!");

    Ok(())
}

async fn info(cli: &Cli, config: &Config, tables: &ReferenceTables) -> Result<()> {
    log::info!("Config file: {}", cli.config.display());
    log::info!("Season: {}", config.run.season);
    log::info!("Standings source: {}", config.source.base_url);
    log::info!("Roster source: {}", config.source.roster_url);
    log::info!(
        "Telemetry source: {}",
        config.source.telemetry_url.as_deref().unwrap_or("(--input only)")
    );
    log::info!("Reference teams: {}", tables.teams.len());

    match &config.store.bucket {
        Some(bucket) => log::info!("Store: bucket {} ({})", bucket, credential_source(cli, config)),
        None => log::info!(
            "Store: local {}",
            resolve(cli, &config.paths.store_root).display()
        ),
    }

    let artifact = StandingsArtifact::new(resolve(cli, &config.paths.artifact));
    match artifact.previous_sizes(config.run.season).await? {
        Some((drivers, constructors)) => log::info!(
            "Artifact {}: {} drivers, {} constructors",
            artifact.path().display(),
            drivers,
            constructors
        ),
        None => log::info!("Artifact {}: not published yet", artifact.path().display()),
    }
    Ok(())
}
