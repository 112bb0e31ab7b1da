//! Chunked Uploadr - Resumable chunked file upload client
//!
//! Uploads a file in fixed-size chunks, skipping whatever the server
//! already holds, then asks the server to assemble it.

use anyhow::Context;
use chunked_uploadr::config::Config;
use chunked_uploadr::identity::IdentityKind;
use chunked_uploadr::upload::{select_file, UploadProgress, UploadSession};
use chunked_uploadr::{logging, metrics, ChunkedUploader, HttpTransport, UploadError};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Chunked Uploadr - Resumable chunked file upload client
#[derive(Parser, Debug)]
#[command(name = "chunked-uploadr")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file (defaults apply when omitted)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long)]
    log_level: Option<String>,

    /// Upload server base URL, overrides server.base_url
    #[arg(long)]
    base_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Upload a file, resuming any earlier partial upload
    Upload {
        /// File to upload
        file: Option<PathBuf>,

        /// Chunk size in bytes
        #[arg(long)]
        chunk_size: Option<u64>,

        /// Maximum concurrent chunk transfers
        #[arg(long)]
        batch_size: Option<usize>,

        /// Identity strategy (name, name_and_size, content, md5_name)
        #[arg(long)]
        identity: Option<IdentityKind>,
    },

    /// Re-issue only the completion request for an uploaded file
    Complete {
        #[arg(long)]
        file_id: String,

        #[arg(long)]
        file_name: String,

        #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
        total_chunks: u32,
    },
}

fn load_config(args: &Args) -> anyhow::Result<Config> {
    let mut config = match &args.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("Failed to load configuration from {:?}", path))?,
        None => Config::default(),
    };

    if let Some(level) = &args.log_level {
        config.logging.level = level.clone();
    }
    if let Some(base_url) = &args.base_url {
        config.server.base_url = base_url.clone();
    }
    if let Command::Upload {
        chunk_size,
        batch_size,
        identity,
        ..
    } = &args.command
    {
        if let Some(chunk_size) = chunk_size {
            config.upload.chunk_size = *chunk_size;
        }
        if let Some(batch_size) = batch_size {
            config.upload.batch_size = *batch_size;
        }
        if let Some(identity) = identity {
            config.upload.identity = *identity;
        }
    }

    config.validate()?;
    Ok(config)
}

fn log_progress(progress: UploadProgress) {
    info!(
        confirmed = progress.confirmed,
        total = progress.total,
        percent = progress.percent(),
        "Upload progress"
    );
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = load_config(&args)?;

    logging::init_subscriber(&config.logging)?;
    info!("Starting Chunked Uploadr v{}", chunked_uploadr::VERSION);

    let transport = Arc::new(HttpTransport::new(config.server.transport_config())?);

    let cancel = CancellationToken::new();
    let signal_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, cancelling upload");
            signal_token.cancel();
        }
    });

    let uploader = ChunkedUploader::new(transport, config.upload.options())
        .with_identity(config.upload.identity.strategy())
        .with_cancellation(cancel)
        .on_progress(Arc::new(log_progress));

    let result = match &args.command {
        Command::Upload { file, .. } => run_upload(&uploader, file.as_deref()).await,
        Command::Complete {
            file_id,
            file_name,
            total_chunks,
        } => {
            let session =
                UploadSession::for_completion(file_id.as_str(), file_name.as_str(), *total_chunks);
            uploader.complete(&session).await.map(|receipt| {
                info!(path = ?receipt.path, message = ?receipt.message, "File assembled");
            })
        }
    };

    if config.metrics.enabled {
        eprintln!("{}", metrics::gather_text());
    }

    if let Err(e) = &result {
        error!(category = e.category(), retry = ?e.retry_hint(), "Upload did not finish");
    }
    result.map_err(anyhow::Error::from)
}

async fn run_upload(
    uploader: &ChunkedUploader<HttpTransport>,
    file: Option<&std::path::Path>,
) -> Result<(), UploadError> {
    let file = select_file(file).await?;
    let report = uploader.upload(&file).await?;

    info!(
        file_id = report.session.file_id(),
        total_chunks = report.session.total_chunks(),
        transferred = report.transferred,
        skipped = report.skipped,
        path = ?report.receipt.path,
        "File assembled"
    );
    Ok(())
}
