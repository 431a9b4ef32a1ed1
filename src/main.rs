use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use pdfrag::ingestion::IngestionSummary;
use pdfrag::reply::ReplyRequest;
use pdfrag::service::{RagApi, RagService, build_coordinator, build_vector_index};
use pdfrag::{api, config, logging};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;

#[derive(Parser)]
#[command(
    name = "pdfrag",
    about = "Ingest PDF documents into a vector index and answer questions over them"
)]
struct Cli {
    /// Default log filter when `RUST_LOG` is unset.
    #[arg(long, global = true, default_value = "info")]
    log_level: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Ingest every PDF in the documents directory.
    Ingest {
        /// Directory to scan instead of `DOCUMENTS_DIR`.
        #[arg(long)]
        dir: Option<PathBuf>,
        /// Drop the index before ingesting.
        #[arg(long)]
        delete_index: bool,
    },
    /// Ask a single question.
    Ask {
        #[arg(long, env = "PDFRAG_USER_ID", default_value = "cli")]
        user_id: String,
        #[arg(long, env = "PDFRAG_SESSION_ID", default_value = "cli")]
        session_id: String,
        /// The question.
        query: String,
    },
    /// Serve the HTTP API.
    Serve,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init_tracing(&cli.log_level);
    let config = config::init_config().context("Failed to load configuration")?;

    match cli.command {
        Command::Ingest { dir, delete_index } => {
            let index = build_vector_index(config).context("Failed to initialize vector index")?;
            let coordinator = build_coordinator(config, index);
            let dir = dir.unwrap_or_else(|| PathBuf::from(&config.documents_dir));
            let summary = coordinator
                .run(&dir, delete_index)
                .await
                .with_context(|| format!("Ingestion of {} failed", dir.display()))?;
            print_summary(&summary);
        }
        Command::Ask {
            user_id,
            session_id,
            query,
        } => {
            let service = RagService::from_config(config).context("Failed to initialize service")?;
            let response = service
                .reply(ReplyRequest {
                    consent_accepted: Some(true),
                    consent_timestamp: None,
                    user_id: Some(user_id),
                    session_id: Some(session_id),
                    query: Some(query),
                })
                .await?;
            println!("{}", response.answer);
            for source in &response.sources {
                match source.page_number {
                    Some(page) => println!("  - {} (page {page})", source.title),
                    None => println!("  - {}", source.title),
                }
            }
        }
        Command::Serve => {
            let service = RagService::from_config(config).context("Failed to initialize service")?;
            let app = api::create_router(Arc::new(service));
            let (listener, port) = bind_listener(config.server_port)
                .await
                .context("Failed to bind listener")?;
            tracing::info!("Listening on http://0.0.0.0:{}", port);
            axum::serve(listener, app).await.context("Server error")?;
        }
    }
    Ok(())
}

fn print_summary(summary: &IngestionSummary) {
    for file in &summary.files {
        println!(
            "{}: {} chunks indexed ({} processed, {} invalid, {} duplicates, {} batches abandoned)",
            file.filename,
            file.indexing.chunks_indexed,
            file.processed_chunks,
            file.skipped_invalid,
            file.duplicates_removed,
            file.indexing.batches_abandoned
        );
    }
    for failure in &summary.failures {
        println!("{}: failed: {}", failure.filename, failure.error);
    }
    println!(
        "{} files, {} failures, {} chunks indexed",
        summary.files.len(),
        summary.failures.len(),
        summary.chunks_indexed()
    );
}

async fn bind_listener(configured: Option<u16>) -> Result<(TcpListener, u16), std::io::Error> {
    use std::net::Ipv4Addr;

    if let Some(port) = configured {
        return TcpListener::bind((Ipv4Addr::UNSPECIFIED, port))
            .await
            .map(|listener| (listener, port));
    }

    const PORT_RANGE: std::ops::RangeInclusive<u16> = 4100..=4199;
    for port in PORT_RANGE {
        match TcpListener::bind((Ipv4Addr::UNSPECIFIED, port)).await {
            Ok(listener) => {
                tracing::debug!(port, "Bound server port");
                return Ok((listener, port));
            }
            Err(err) if err.kind() == std::io::ErrorKind::AddrInUse => {
                tracing::debug!(port, "Port already in use; trying next");
                continue;
            }
            Err(err) => return Err(err),
        }
    }

    Err(std::io::Error::new(
        std::io::ErrorKind::AddrNotAvailable,
        "No available port found in range 4100-4199",
    ))
}
