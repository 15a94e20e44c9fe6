use clap::Parser;
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};

use librarian::author::{AuthClient, AuthorConfig, BulkPublisher, LibrarianClient, RendererClient};
use librarian::server::logging::init_logging;
use librarian::version::VERSION;

#[derive(Parser, Debug)]
#[command(author, version = VERSION, about = "Render and publish markdown posts in bulk", long_about = None)]
struct Args {
    /// Markdown files to publish
    #[arg(required = true)]
    paths: Vec<PathBuf>,

    /// Number of files processed concurrently; overrides AUTHOR_WORKERS
    #[arg(short, long)]
    workers: Option<NonZeroUsize>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let config = match AuthorConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load author configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    init_logging(&config.log_dir, "author.log");
    info!("Starting author, version: {}", VERSION);

    let workers = match args.workers.map(Ok).unwrap_or_else(|| config.worker_count()) {
        Ok(workers) => workers,
        Err(e) => {
            error!("{e}");
            return ExitCode::FAILURE;
        }
    };

    let driver = BulkPublisher::new(
        Arc::new(AuthClient::new(config.auth_url.clone())),
        Arc::new(RendererClient::new(config.publisher_url.clone())),
        Arc::new(LibrarianClient::new(config.librarian_url.clone())),
        workers,
    );

    let report = match driver.publish_all(args.paths, &config.credentials()).await {
        Ok(report) => report,
        Err(e) => {
            error!(error = %e, "Batch aborted.");
            return ExitCode::FAILURE;
        }
    };

    println!(
        "Published {} of {} files.",
        report.succeeded(),
        report.outcomes.len()
    );
    for failure in report.failures() {
        if let Err(e) = &failure.result {
            println!("  failed: {}: {e}", failure.path.display());
        }
    }

    if report.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
