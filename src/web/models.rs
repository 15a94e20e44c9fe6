use serde::{Deserialize, Serialize};

use crate::db::models::Link;

/// `link` is `null` when no link has the requested id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetLinkResponse {
    pub link: Option<Link>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TagsResponse {
    pub tags: Vec<String>,
}
