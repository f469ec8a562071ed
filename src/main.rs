//! Omnistore command line client

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use omnistore::config::{AppConfig, LogFormat};
use omnistore::{AppContext, Storage, StorageTarget, UploadRequest};

#[derive(Parser, Debug)]
#[command(name = "omnistore", about = "Upload, download and delete files on the configured storage provider")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Upload a local file under a storage key
    Upload(UploadArgs),
    /// Download a stored file
    Download(DownloadArgs),
    /// Delete a stored file
    Delete(DeleteArgs),
}

#[derive(clap::Args, Debug)]
struct UploadArgs {
    /// Destination key, e.g. `avatars/42.png`
    key: String,
    /// Local file to read
    file: PathBuf,
    /// Content type; guessed from the file extension when omitted
    #[arg(long)]
    mimetype: Option<String>,
    /// Bucket or container overriding the configured default
    #[arg(long)]
    target: Option<String>,
}

#[derive(clap::Args, Debug)]
struct DownloadArgs {
    key: String,
    /// Where to write the payload; defaults to the key's file name
    #[arg(long, short)]
    output: Option<PathBuf>,
    #[arg(long)]
    target: Option<String>,
}

#[derive(clap::Args, Debug)]
struct DeleteArgs {
    key: String,
    #[arg(long)]
    target: Option<String>,
    /// Succeed when the key does not exist
    #[arg(long)]
    ignore_missing: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::load().context("failed to load configuration")?;

    init_tracing(&config)?;

    let context = AppContext::from_config(config)
        .await
        .context("invalid storage configuration")?;
    tracing::info!(provider = %context.storage().provider(), "Storage ready");

    match cli.command {
        Commands::Upload(args) => upload(&context, args).await,
        Commands::Download(args) => download(&context, args).await,
        Commands::Delete(args) => delete(&context, args).await,
    }
}

async fn upload(context: &AppContext, args: UploadArgs) -> anyhow::Result<()> {
    let data = tokio::fs::read(&args.file)
        .await
        .with_context(|| format!("failed to read {}", args.file.display()))?;
    let mimetype = args.mimetype.unwrap_or_else(|| {
        mime_guess::from_path(&args.file)
            .first_or_octet_stream()
            .essence_str()
            .to_string()
    });

    let target = args.target.map(StorageTarget::from);
    let locator = context
        .storage()
        .upload(UploadRequest::new(args.key, mimetype, data), target.as_ref())
        .await?;

    println!("{}", locator);
    Ok(())
}

async fn download(context: &AppContext, args: DownloadArgs) -> anyhow::Result<()> {
    let target = args.target.map(StorageTarget::from);
    let file = context
        .storage()
        .download(&args.key, target.as_ref())
        .await
        .with_context(|| format!("failed to download {}", args.key))?;

    let output = args.output.unwrap_or_else(|| PathBuf::from(&file.name));
    tokio::fs::write(&output, &file.data)
        .await
        .with_context(|| format!("failed to write {}", output.display()))?;

    tracing::info!(
        name = %file.name,
        mimetype = %file.mimetype,
        bytes = file.data.len(),
        output = %output.display(),
        "Downloaded file",
    );
    Ok(())
}

async fn delete(context: &AppContext, args: DeleteArgs) -> anyhow::Result<()> {
    let target = args.target.map(StorageTarget::from);
    match context.storage().delete(&args.key, target.as_ref()).await {
        Ok(()) => Ok(()),
        Err(err) if args.ignore_missing && err.is_not_found() => {
            tracing::info!(key = %args.key, "Nothing to delete");
            Ok(())
        }
        Err(err) => Err(err).with_context(|| format!("failed to delete {}", args.key)),
    }
}

fn init_tracing(config: &AppConfig) -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.logging.level.clone()))
        .unwrap_or_else(|_| EnvFilter::new("omnistore=info"));

    let registry = tracing_subscriber::registry().with(env_filter);

    // Logs go to stderr so stdout carries only command output.
    match config.logging.format {
        LogFormat::Json => {
            registry
                .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        LogFormat::Text => {
            registry
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }

    Ok(())
}
