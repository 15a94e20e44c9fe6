//! Tag registry: find-or-create over string-identified tags.
//!
//! Tags are created lazily by the first link that references them and are never
//! deleted or renamed here. Concurrent publishes may race to create the same tag; the
//! primary key on `tags.id` decides the winner and the loser re-reads the row.

use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder, Set};
use std::collections::{BTreeSet, HashMap};
use tracing::debug;

use crate::db::entities::{prelude::*, tag};
use crate::web::error::AppError;

/// Outcome of a single tag insert attempt.
enum TagInsert {
    Created(tag::Model),
    /// Another writer created the tag first; the existing row is returned.
    ConflictResolved(tag::Model),
}

/// Resolves every requested tag id to a stored tag, creating the missing ones.
///
/// Must not run inside a transaction on PostgreSQL: a lost creation race aborts the
/// surrounding transaction.
pub async fn resolve_tags<C: ConnectionTrait>(
    db: &C,
    tag_ids: &BTreeSet<String>,
) -> Result<Vec<tag::Model>, AppError> {
    if tag_ids.is_empty() {
        return Ok(Vec::new());
    }
    if tag_ids.iter().any(|id| id.trim().is_empty()) {
        return Err(AppError::InvalidInput("Tag ids must not be empty".to_string()));
    }

    let known: HashMap<String, tag::Model> = Tag::find()
        .filter(tag::Column::Id.is_in(tag_ids.iter().cloned()))
        .all(db)
        .await?
        .into_iter()
        .map(|t| (t.id.clone(), t))
        .collect();

    let mut resolved = Vec::with_capacity(tag_ids.len());
    for id in tag_ids {
        match known.get(id) {
            Some(existing) => resolved.push(existing.clone()),
            None => resolved.push(find_or_create_tag(db, id).await?),
        }
    }
    Ok(resolved)
}

/// Inserts the tag, or returns the existing row if the insert lost a race.
pub async fn find_or_create_tag<C: ConnectionTrait>(
    db: &C,
    tag_id: &str,
) -> Result<tag::Model, AppError> {
    match insert_tag(db, tag_id).await? {
        TagInsert::Created(model) => {
            debug!(tag_id, "Created tag.");
            Ok(model)
        }
        TagInsert::ConflictResolved(model) => {
            debug!(tag_id, "Tag already existed, reusing stored row.");
            Ok(model)
        }
    }
}

async fn insert_tag<C: ConnectionTrait>(db: &C, tag_id: &str) -> Result<TagInsert, AppError> {
    let new_tag = tag::ActiveModel {
        id: Set(tag_id.to_owned()),
    };
    match Tag::insert(new_tag).exec_without_returning(db).await {
        Ok(_) => Ok(TagInsert::Created(tag::Model {
            id: tag_id.to_owned(),
        })),
        // Backends report key conflicts differently, so the stored row is the arbiter:
        // if it exists now, the failure was a lost race.
        Err(insert_err) => match Tag::find_by_id(tag_id.to_owned()).one(db).await? {
            Some(existing) => Ok(TagInsert::ConflictResolved(existing)),
            None => Err(insert_err.into()),
        },
    }
}

/// Every known tag id, ascending.
pub async fn list_tag_ids<C: ConnectionTrait>(db: &C) -> Result<Vec<String>, AppError> {
    let tags = Tag::find().order_by_asc(tag::Column::Id).all(db).await?;
    Ok(tags.into_iter().map(|t| t.id).collect())
}
