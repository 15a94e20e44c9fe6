//! Domain models exchanged between the catalog services and their callers.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::db::entities::link;

/// Default page size when a query leaves `limit` unset or zero.
pub const DEFAULT_PAGE_LIMIT: u64 = 50;
/// Largest page size a query may ask for.
pub const MAX_PAGE_LIMIT: u64 = 500;

/// A cataloged content item together with its tag set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Link {
    pub id: String,
    pub url: String,
    pub title: String,
    #[serde(default)]
    pub subtitle: String,
    #[serde(default)]
    pub description: String,
    pub date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_alt: Option<String>,
    #[serde(default)]
    pub tags: BTreeSet<String>,
}

impl Link {
    pub(crate) fn from_model(model: link::Model, tags: BTreeSet<String>) -> Self {
        Self {
            id: model.id,
            url: model.url,
            title: model.title,
            subtitle: model.subtitle,
            description: model.description,
            date: model.date,
            image_url: model.image_url,
            image_alt: model.image_alt,
            tags,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Pagination {
    /// 1-based; 0 means the first page.
    pub page: u64,
    /// 0 means [`DEFAULT_PAGE_LIMIT`].
    pub limit: u64,
}

/// Filter and pagination for a catalog lookup.
///
/// Dates are kept as the raw `YYYY-MM-DD` strings callers send so that a malformed
/// value is reported as a validation error instead of being dropped by deserialization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LinkQuery {
    pub pagination: Pagination,
    /// A link matches when it carries any of these tags.
    pub tags: Vec<String>,
    pub title_query: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

impl LinkQuery {
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_title(mut self, title_query: impl Into<String>) -> Self {
        self.title_query = Some(title_query.into());
        self
    }

    pub fn between(mut self, start_date: Option<&str>, end_date: Option<&str>) -> Self {
        self.start_date = start_date.map(str::to_owned);
        self.end_date = end_date.map(str::to_owned);
        self
    }

    pub fn page(mut self, page: u64, limit: u64) -> Self {
        self.pagination = Pagination { page, limit };
        self
    }
}

/// One page of query results, newest first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkPage {
    pub links: Vec<Link>,
    pub page: u64,
    pub limit: u64,
    pub is_last_page: bool,
}
