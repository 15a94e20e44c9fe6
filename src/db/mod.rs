//! Relational catalog: entities, domain models, schema bootstrap and services.

pub mod entities;
pub mod models;
pub mod schema;
pub mod services;

use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr};

/// Opens a SeaORM connection pool.
///
/// In-memory SQLite must be opened with a single connection, otherwise every pooled
/// connection sees its own empty database.
pub async fn connect(database_url: &str, max_connections: u32) -> Result<DatabaseConnection, DbErr> {
    let mut opt = ConnectOptions::new(database_url.to_owned());
    opt.max_connections(max_connections)
        .sqlx_logging(false);
    Database::connect(opt).await
}
