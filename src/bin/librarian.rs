use clap::Parser;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};

use librarian::author::AuthClient;
use librarian::db::{self, schema};
use librarian::publish::PublishCoordinator;
use librarian::server::LibrarianConfig;
use librarian::server::logging::init_logging;
use librarian::storage::{BlobPublisher, build_store};
use librarian::version::VERSION;
use librarian::web::create_axum_router;

#[derive(Parser, Debug)]
#[command(author, version = VERSION, about, long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long)]
    config: Option<String>,
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal.");
        return;
    }
    info!("Shutdown signal received.");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let args = Args::parse();

    let config = LibrarianConfig::load(args.config.as_deref()).map_err(|e| {
        eprintln!("Failed to load librarian configuration: {e}");
        e
    })?;

    init_logging(&config.log_dir, "librarian.log");
    info!("Starting librarian, version: {}", VERSION);

    let db_pool = db::connect(&config.database_url, config.max_connections).await?;
    schema::create_tables(&db_pool).await?;
    info!("Catalog tables are ready.");

    let store = build_store(&config.blob_store).await?;
    info!(blob_store = ?config.blob_store, "Blob store ready.");

    let coordinator = Arc::new(PublishCoordinator::new(
        db_pool.clone(),
        BlobPublisher::new(store),
        &config.public_base_url,
    ));
    let verifier = Arc::new(AuthClient::new(config.auth_url.clone()));
    let app = create_axum_router(db_pool, coordinator, verifier);

    let listener = TcpListener::bind(&config.listen_address).await?;
    info!(address = %config.listen_address, "Librarian listening.");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Librarian stopped.");
    Ok(())
}
