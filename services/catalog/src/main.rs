use anyhow::{Context, Result};
use catalog_service::{
    BatchImporter, BatchSettings, CatalogStore, Collection, Config, GoogleSheetsSource,
    IngestOrchestrator, MetadataSynchronizer, ObjectStore, OrchestratorSettings, PgCatalogStore,
    Reconciler, S3ObjectStore, SheetLinkValidator,
};
use catalog_service::synchronizer::staged_summaries;
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "catalog-service", version, about = "Content catalog ingestion")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Ingest a single image file
    Upload { path: PathBuf },
    /// Ingest every image in a directory
    ImportDir {
        /// Defaults to ingest.import_dir
        dir: Option<PathBuf>,
    },
    /// Import quotes from a spreadsheet link
    ImportSheet { link: String },
    /// Submit one quote from a JSON file
    SubmitQuote { path: PathBuf },
    /// Republish a collection snapshot
    Publish {
        #[arg(value_parser = parse_collection)]
        collection: Collection,
    },
    /// Repair or report records left pending, republishing the media
    /// snapshot when any record changed
    Reconcile,
    /// Print the summary blocks of the staged snapshots
    Summary,
}

fn parse_collection(raw: &str) -> std::result::Result<Collection, String> {
    raw.parse()
}

/// Wired pipeline components
struct App {
    importer: BatchImporter,
    synchronizer: Arc<MetadataSynchronizer>,
    reconciler: Reconciler,
}

impl App {
    async fn connect(config: &Config) -> Result<Self> {
        let pg = PgCatalogStore::new(&config.database)
            .await
            .context("Failed to initialize catalog store")?;

        if config.database.run_migrations {
            pg.run_migrations()
                .await
                .context("Failed to run database migrations")?;
        }

        let catalog: Arc<dyn CatalogStore> = Arc::new(pg);
        let objects: Arc<dyn ObjectStore> = Arc::new(
            S3ObjectStore::new(&config.s3)
                .await
                .context("Failed to initialize object store")?,
        );

        let orchestrator = Arc::new(IngestOrchestrator::new(
            catalog.clone(),
            objects.clone(),
            OrchestratorSettings {
                bucket: config.s3.bucket.clone(),
                images_prefix: config.s3.images_prefix.clone(),
                default_lang: config.ingest.default_lang.clone(),
            },
        ));
        let synchronizer = Arc::new(MetadataSynchronizer::new(
            catalog.clone(),
            objects.clone(),
            config.metadata.clone(),
        ));
        let sheets = Arc::new(
            GoogleSheetsSource::new(&config.sheets)
                .context("Failed to initialize spreadsheet client")?,
        );
        let links = SheetLinkValidator::new(&config.sheets.link_pattern)
            .context("Invalid spreadsheet link pattern")?;

        let importer = BatchImporter::new(
            orchestrator,
            synchronizer.clone(),
            sheets,
            links,
            BatchSettings {
                chunk_size: config.sheets.chunk_size,
                sheet_range: config.sheets.range.clone(),
                max_upload_bytes: config.max_upload_bytes(),
            },
        );
        let reconciler = Reconciler::new(
            catalog,
            objects,
            synchronizer.clone(),
            config.s3.bucket.clone(),
            config.s3.images_prefix.clone(),
            config.s3.reconcile_concurrency,
        );

        Ok(Self {
            importer,
            synchronizer,
            reconciler,
        })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = Config::load().context("Failed to load configuration")?;

    // Initialize logging
    init_tracing(&config.service.log_level, &config.service.log_format);

    info!(
        service = %config.service.name,
        command = ?cli.command,
        "Starting catalog service"
    );

    if let Some(port) = config.service.metrics_port {
        init_metrics(port)?;
    }

    tokio::select! {
        result = run(cli.command, &config) => result,
        _ = shutdown_signal() => {
            warn!("Interrupted, in-flight records may be left pending");
            anyhow::bail!("interrupted")
        }
    }
}

async fn run(command: Command, config: &Config) -> Result<()> {
    // Summaries only read staged files
    if let Command::Summary = command {
        return print_summaries(config).await;
    }

    let app = App::connect(config).await?;

    match command {
        Command::Upload { path } => emit(&app.importer.upload_file(&path).await?),
        Command::ImportDir { dir } => {
            let dir = dir
                .or_else(|| config.ingest.import_dir.clone())
                .context("No import directory given and ingest.import_dir is unset")?;
            emit(&app.importer.import_directory(&dir).await?.report())
        }
        Command::ImportSheet { link } => emit(&app.importer.import_sheet(&link).await?),
        Command::SubmitQuote { path } => {
            let raw = tokio::fs::read(&path)
                .await
                .with_context(|| format!("Failed to read {}", path.display()))?;
            emit(&app.importer.submit_quote(&raw).await?)
        }
        Command::Publish { collection } => emit(&app.synchronizer.publish(collection).await?),
        Command::Reconcile => emit(&app.reconciler.reconcile().await?),
        Command::Summary => print_summaries(config).await,
    }
}

async fn print_summaries(config: &Config) -> Result<()> {
    let summaries = staged_summaries(&config.metadata)
        .await
        .context("Failed to read staged snapshots")?;
    emit(&summaries)
}

fn emit<T: Serialize>(payload: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(payload)?);
    Ok(())
}

/// Initialize tracing/logging
fn init_tracing(log_level: &str, log_format: &str) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    // Logs go to stderr, stdout carries the command payload
    let registry = tracing_subscriber::registry().with(env_filter);
    if log_format == "pretty" {
        registry
            .with(fmt::layer().pretty().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    }
}

/// Initialize Prometheus metrics exporter
fn init_metrics(port: u16) -> Result<()> {
    let builder = metrics_exporter_prometheus::PrometheusBuilder::new();

    builder
        .with_http_listener(([0, 0, 0, 0], port))
        .install()
        .context("Failed to install Prometheus metrics exporter")?;

    info!(port = port, "Prometheus metrics exporter started");

    Ok(())
}

/// Wait for shutdown signal (SIGINT or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        }
        _ = terminate => {
            info!("Received SIGTERM signal");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_subcommands() {
        let cli = Cli::try_parse_from(["catalog-service", "publish", "quotes"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Publish {
                collection: Collection::Quotes
            }
        ));

        let cli = Cli::try_parse_from(["catalog-service", "import-dir"]).unwrap();
        assert!(matches!(cli.command, Command::ImportDir { dir: None }));

        assert!(Cli::try_parse_from(["catalog-service", "publish", "videos"]).is_err());
    }
}
