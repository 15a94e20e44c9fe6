//! Creates the catalog tables from the entity definitions.

use sea_orm::{ConnectionTrait, DbErr, EntityTrait, Schema};
use tracing::debug;

use crate::db::entities::prelude::*;

/// Idempotently creates `links`, `tags` and `link_tags`.
pub async fn create_tables<C: ConnectionTrait>(db: &C) -> Result<(), DbErr> {
    let backend = db.get_database_backend();
    let schema = Schema::new(backend);

    create_table(db, &schema, Link).await?;
    create_table(db, &schema, Tag).await?;
    create_table(db, &schema, LinkTag).await?;
    Ok(())
}

async fn create_table<C, E>(db: &C, schema: &Schema, entity: E) -> Result<(), DbErr>
where
    C: ConnectionTrait,
    E: EntityTrait,
{
    let mut statement = schema.create_table_from_entity(entity);
    statement.if_not_exists();
    debug!(table = entity.table_name(), "Ensuring table exists.");
    db.execute(db.get_database_backend().build(&statement)).await?;
    Ok(())
}
