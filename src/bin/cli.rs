//! Transit sync CLI
//!
//! Drives the download, diff, and publish stages against a local storage
//! directory containing `config.toml` and the table files.

use std::path::PathBuf;
use std::sync::atomic::AtomicBool;

use clap::{Parser, Subcommand};
use transit_sync::{
    error::Result,
    models::{Config, RecordKind, Route, Stop},
    pipeline,
    services::{TopicClient, TransitClient},
    storage::{DIFF_METADATA_TABLE, LocalTableStore, TableStore, publish_table},
    utils::generate_run_id,
};

/// Mirrors transit schedule data into discussion-platform topics
#[derive(Parser, Debug)]
#[command(name = "transit-sync", version, about = "Transit schedule sync service")]
struct Cli {
    /// Path to storage directory containing config and table files
    #[arg(short, long, default_value = "storage")]
    storage_dir: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Download the upstream catalog into a new run's download tables
    Download,

    /// Diff a run's download tables against the publish tables
    Diff {
        /// Run id produced by a previous download
        run_id: String,
    },

    /// Publish a run's diff output to the discussion platform
    Publish {
        /// Run id produced by a previous diff
        run_id: String,
    },

    /// Run the full pipeline: download, diff, publish
    Run,

    /// Delete a run's download and diff data
    Purge {
        /// Run id to purge
        run_id: String,
    },

    /// Validate the configuration file
    Validate,

    /// Show stored runs and publish table sizes
    Info,
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config_path = cli.storage_dir.join("config.toml");
    let config = Config::load_or_default(&config_path);
    let store = LocalTableStore::new(&cli.storage_dir);

    match cli.command {
        Command::Download => {
            config.validate()?;
            let run_id = generate_run_id();
            let client = TransitClient::new(&config.transit)?;
            pipeline::run_download(&client, &store, &config.transit, &run_id).await?;
            log::info!("Download complete; run id {run_id}");
        }

        Command::Diff { run_id } => {
            let cancel = AtomicBool::new(false);
            let report = pipeline::run_diff(&store, &config.sync, &run_id, &cancel).await?;
            log::info!("{}", report.render());
        }

        Command::Publish { run_id } => {
            config.validate()?;
            let topics = TopicClient::new(&config.platform)?;
            let entries = pipeline::run_publish(&store, &topics, &config.sync, &run_id).await?;
            log::info!("Published {} partition(s) for run {run_id}", entries.len());
        }

        Command::Run => {
            config.validate()?;
            let run_id = generate_run_id();
            log::info!("Starting run {run_id}");

            let client = TransitClient::new(&config.transit)?;
            pipeline::run_download(&client, &store, &config.transit, &run_id).await?;

            let cancel = AtomicBool::new(false);
            let report = pipeline::run_diff(&store, &config.sync, &run_id, &cancel).await?;
            log::info!("{}", report.render());

            if report.has_changes() {
                let topics = TopicClient::new(&config.platform)?;
                let entries =
                    pipeline::run_publish(&store, &topics, &config.sync, &run_id).await?;
                log::info!("Published {} partition(s)", entries.len());
            } else {
                log::info!("No changes to publish");
            }

            log::info!("Run {run_id} complete");
        }

        Command::Purge { run_id } => {
            pipeline::run_purge(&store, &run_id).await?;
        }

        Command::Validate => {
            log::info!("Validating configuration...");
            if let Err(e) = config.validate() {
                log::error!("Config validation failed: {e}");
                return Err(e);
            }
            log::info!("Config OK");
        }

        Command::Info => {
            log::info!("Storage directory: {}", cli.storage_dir.display());

            let runs = store.partitions(DIFF_METADATA_TABLE).await?;
            if runs.is_empty() {
                log::info!("No diffed runs found");
            } else {
                log::info!("Diffed runs: {}", runs.join(", "));
            }

            let mut route_count = 0;
            for partition in store.partitions(&publish_table(RecordKind::Route)).await? {
                let rows: Vec<Route> = store
                    .query_partition(&publish_table(RecordKind::Route), &partition)
                    .await?;
                route_count += rows.len();
            }
            let mut stop_count = 0;
            for partition in store.partitions(&publish_table(RecordKind::Stop)).await? {
                let rows: Vec<Stop> = store
                    .query_partition(&publish_table(RecordKind::Stop), &partition)
                    .await?;
                stop_count += rows.len();
            }
            log::info!("Published: {route_count} route(s), {stop_count} stop(s)");
        }
    }

    Ok(())
}
