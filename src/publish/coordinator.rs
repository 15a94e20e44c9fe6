//! Dual-write publishing: the rendered post goes to object storage while its metadata is
//! indexed in the catalog.
//!
//! The two writes share no transaction. Both branches run concurrently and the call
//! waits for both. The catalog write is staged in an open transaction and committed
//! only once the blob write has succeeded, so a failed blob write leaves the catalog
//! untouched. A failed catalog write after a successful blob write leaves an orphaned
//! blob that nothing references. Nothing is compensated: keys and ids are derived from
//! the slug, so the recovery is to retry the whole publish.

use chrono::{NaiveDate, Utc};
use sea_orm::DatabaseConnection;
use tracing::{info, warn};

use crate::db::models::Link;
use crate::db::services::link_service;
use crate::publish::models::Post;
use crate::storage::BlobPublisher;
use crate::web::error::{AppError, PublishBranch};

pub struct PublishCoordinator {
    db: DatabaseConnection,
    blobs: BlobPublisher,
    public_base_url: String,
}

impl PublishCoordinator {
    pub fn new(db: DatabaseConnection, blobs: BlobPublisher, public_base_url: &str) -> Self {
        Self {
            db,
            blobs,
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn db(&self) -> &DatabaseConnection {
        &self.db
    }

    /// Public URL a post is served from once published.
    pub fn public_url(&self, slug: &str) -> String {
        format!("{}/posts/{slug}.html", self.public_base_url)
    }

    /// Builds the catalog record for a post. An empty date means `today`.
    pub fn link_for(&self, post: &Post, today: NaiveDate) -> Result<Link, AppError> {
        let meta = &post.meta;
        validate_slug(&meta.slug)?;

        let date = match meta.date.trim() {
            "" => today,
            raw => NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|e| {
                AppError::InvalidInput(format!(
                    "Post '{}' has date '{raw}', expected YYYY-MM-DD: {e}",
                    meta.slug
                ))
            })?,
        };

        Ok(Link {
            id: meta.slug.clone(),
            url: self.public_url(&meta.slug),
            title: meta.title.clone(),
            subtitle: meta.subtitle.clone(),
            description: meta.description.clone(),
            date,
            image_url: meta.image_url.clone().filter(|v| !v.is_empty()),
            image_alt: meta.image_alt.clone().filter(|v| !v.is_empty()),
            tags: meta.tags.clone(),
        })
    }

    /// Publishes a rendered post and returns its public URL.
    ///
    /// When both branches fail the catalog error is the one reported.
    pub async fn publish(&self, post: &Post) -> Result<String, AppError> {
        let link = self.link_for(post, Utc::now().date_naive())?;
        let slug = link.id.as_str();

        let (blob_result, catalog_result) = tokio::join!(
            self.blobs.publish_post(slug, &post.post_html),
            link_service::stage_link(&self.db, &link),
        );

        let txn = match catalog_result {
            Ok(txn) => txn,
            Err(err) => {
                if blob_result.is_ok() {
                    warn!(slug, "Blob was written but the catalog write failed; the blob is orphaned until a retry succeeds.");
                }
                return Err(AppError::partial_publish(PublishBranch::Catalog, err));
            }
        };

        if let Err(err) = blob_result {
            if let Err(rollback_err) = txn.rollback().await {
                warn!(slug, error = %rollback_err, "Failed to roll back staged catalog write.");
            }
            return Err(AppError::partial_publish(PublishBranch::Blob, err));
        }

        txn.commit()
            .await
            .map_err(|e| AppError::partial_publish(PublishBranch::Catalog, e.into()))?;

        info!(slug, url = %link.url, "Published post.");
        Ok(link.url)
    }
}

/// Slugs become both a storage key and a catalog id, so only URL-safe characters pass.
pub fn validate_slug(slug: &str) -> Result<(), AppError> {
    if slug.is_empty() {
        return Err(AppError::InvalidInput("Post slug must not be empty".to_string()));
    }
    if let Some(bad) = slug
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || *c == '-' || *c == '_'))
    {
        return Err(AppError::InvalidInput(format!(
            "Post slug '{slug}' contains '{bad}'; only letters, digits, '-' and '_' are allowed"
        )));
    }
    Ok(())
}
