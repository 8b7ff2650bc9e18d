//! The bargedoc binary: serves the HTTP API or runs one-off extractions.

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use bargedoc_extract::extraction::ImageAttachment;
use bargedoc_extract::store::ResultRecord;
use bargedoc_server::config::{LogFormat, Settings};
use bargedoc_server::storage::sniff_media_type;
use bargedoc_server::{build_gateway, build_orchestrator, http};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(flatten)]
    settings: Settings,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Starts the HTTP server (default)
    Serve,
    /// Extracts one local image and prints the outcome as JSON
    Extract {
        /// Path to the document image
        image: PathBuf,
    },
    /// Prints the closed document schema sent to the model
    Schema,
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.settings.log_format);

    match cli.command {
        Some(Commands::Extract { image }) => run_extract(&cli.settings, image).await,
        Some(Commands::Schema) => {
            let registry = cli.settings.schema_registry()?;
            println!("{}", serde_json::to_string_pretty(registry.schema())?);
            Ok(())
        }
        Some(Commands::Serve) | None => {
            let gateway = Arc::new(build_gateway(&cli.settings)?);
            tracing::info!(
                event = "server_starting",
                model = %cli.settings.model,
                upload_dir = %cli.settings.upload_dir.display(),
                max_concurrent = cli.settings.max_concurrent,
                "server_starting"
            );
            http::serve(cli.settings.bind, gateway, cli.settings.max_upload_bytes()).await?;
            Ok(())
        }
    }
}

async fn run_extract(settings: &Settings, path: PathBuf) -> anyhow::Result<()> {
    let bytes = tokio::fs::read(&path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    let media_type = sniff_media_type(&bytes)
        .with_context(|| format!("{} is not a recognised image", path.display()))?;
    let orchestrator = build_orchestrator(settings)?;

    let id = uuid::Uuid::new_v4().to_string();
    let filename = path
        .file_name()
        .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned());
    let image = ImageAttachment::new(media_type, bytes);

    let outcome = orchestrator.extract(&id, &image).await;
    let record = match &outcome {
        Ok(extraction) => ResultRecord::completed(&id, &filename, extraction),
        Err(error) => ResultRecord::failed(&id, &filename, error.to_string(), error.attempts()),
    };
    println!("{}", serde_json::to_string_pretty(&record)?);

    outcome.map(|_| ()).context("extraction failed")
}
