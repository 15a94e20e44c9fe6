//! Catalog store for links and their tag associations.
//!
//! Writes go through [`upsert_link`] / [`stage_link`] and [`delete_link`]; there is no
//! optimistic concurrency token, so concurrent upserts of one id are last-writer-wins.

use chrono::NaiveDate;
use sea_orm::sea_query::{Expr, Func, LikeExpr, OnConflict, Query};
use sea_orm::{
    ColumnTrait, ConnectionTrait, DatabaseConnection, DatabaseTransaction, DbBackend, EntityTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use std::collections::{BTreeSet, HashMap};
use tracing::{debug, info};

use crate::db::entities::{link, link_tag, tag};
use crate::db::models::{DEFAULT_PAGE_LIMIT, Link, LinkPage, LinkQuery, MAX_PAGE_LIMIT};
use crate::db::services::tag_service;
use crate::web::error::AppError;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Inserts the link or fully replaces the stored one with the same id, including its
/// tag set. Calling it repeatedly with the same input leaves the same stored state.
pub async fn upsert_link(db: &DatabaseConnection, link: &Link) -> Result<String, AppError> {
    let txn = stage_link(db, link).await?;
    txn.commit().await?;
    info!(link_id = %link.id, tags = link.tags.len(), "Upserted link.");
    Ok(link.id.clone())
}

/// Resolves the link's tags, then writes the link row and its associations inside a
/// transaction that is handed back uncommitted.
///
/// Dropping the returned transaction rolls the write back. Tags created while
/// resolving stay, since tags are never garbage collected.
pub async fn stage_link(
    db: &DatabaseConnection,
    link: &Link,
) -> Result<DatabaseTransaction, AppError> {
    validate_link(link)?;
    let tags = tag_service::resolve_tags(db, &link.tags).await?;

    let txn = db.begin().await?;
    write_link(&txn, link, &tags).await?;
    debug!(link_id = %link.id, "Staged link write.");
    Ok(txn)
}

fn validate_link(link: &Link) -> Result<(), AppError> {
    if link.id.trim().is_empty() {
        return Err(AppError::InvalidInput("Link id must not be empty".to_string()));
    }
    if link.title.trim().is_empty() {
        return Err(AppError::InvalidInput(format!(
            "Link '{}' must have a title",
            link.id
        )));
    }
    Ok(())
}

async fn write_link<C: ConnectionTrait>(
    db: &C,
    link: &Link,
    tags: &[tag::Model],
) -> Result<(), AppError> {
    let row = link::ActiveModel {
        id: Set(link.id.clone()),
        url: Set(link.url.clone()),
        title: Set(link.title.clone()),
        subtitle: Set(link.subtitle.clone()),
        description: Set(link.description.clone()),
        date: Set(link.date),
        image_url: Set(link.image_url.clone()),
        image_alt: Set(link.image_alt.clone()),
    };

    link::Entity::insert(row)
        .on_conflict(
            OnConflict::column(link::Column::Id)
                .update_columns([
                    link::Column::Url,
                    link::Column::Title,
                    link::Column::Subtitle,
                    link::Column::Description,
                    link::Column::Date,
                    link::Column::ImageUrl,
                    link::Column::ImageAlt,
                ])
                .to_owned(),
        )
        .exec_without_returning(db)
        .await?;

    // The tag set is replaced wholesale, never merged.
    link_tag::Entity::delete_many()
        .filter(link_tag::Column::LinkId.eq(link.id.as_str()))
        .exec(db)
        .await?;

    if !tags.is_empty() {
        let associations = tags.iter().map(|t| link_tag::ActiveModel {
            link_id: Set(link.id.clone()),
            tag_id: Set(t.id.clone()),
        });
        link_tag::Entity::insert_many(associations)
            .exec_without_returning(db)
            .await?;
    }
    Ok(())
}

/// Looks a link up by id. `None` means the link does not exist.
pub async fn get_link<C: ConnectionTrait>(db: &C, link_id: &str) -> Result<Option<Link>, AppError> {
    let model = match link::Entity::find_by_id(link_id.to_owned()).one(db).await? {
        Some(m) => m,
        None => return Ok(None),
    };

    let tags = link_tag::Entity::find()
        .filter(link_tag::Column::LinkId.eq(link_id))
        .all(db)
        .await?
        .into_iter()
        .map(|lt| lt.tag_id)
        .collect();

    Ok(Some(Link::from_model(model, tags)))
}

/// Deletes a link and its associations; its tags are left in place.
pub async fn delete_link(db: &DatabaseConnection, link_id: &str) -> Result<(), AppError> {
    let txn = db.begin().await?;

    link_tag::Entity::delete_many()
        .filter(link_tag::Column::LinkId.eq(link_id))
        .exec(&txn)
        .await?;
    let result = link::Entity::delete_by_id(link_id.to_owned())
        .exec(&txn)
        .await?;

    if result.rows_affected == 0 {
        txn.rollback().await?;
        return Err(AppError::NotFound(format!("Link with id {link_id} not found")));
    }

    txn.commit().await?;
    info!(link_id, "Deleted link.");
    Ok(())
}

/// A [`LinkQuery`] after validation.
#[derive(Debug, Clone, PartialEq, Eq)]
struct LinkFilter {
    tags: Vec<String>,
    title_query: Option<String>,
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
    page: u64,
    limit: u64,
    offset: u64,
}

impl TryFrom<&LinkQuery> for LinkFilter {
    type Error = AppError;

    fn try_from(query: &LinkQuery) -> Result<Self, Self::Error> {
        let limit = match query.pagination.limit {
            0 => DEFAULT_PAGE_LIMIT,
            l if l > MAX_PAGE_LIMIT => {
                return Err(AppError::InvalidInput(format!(
                    "limit must not exceed {MAX_PAGE_LIMIT}, got {l}"
                )));
            }
            l => l,
        };
        let page = query.pagination.page.max(1);
        let offset = (page - 1).checked_mul(limit).ok_or_else(|| {
            AppError::InvalidInput(format!("page {page} is out of range"))
        })?;

        Ok(Self {
            tags: query
                .tags
                .iter()
                .filter(|t| !t.trim().is_empty())
                .cloned()
                .collect(),
            title_query: query
                .title_query
                .as_deref()
                .map(str::trim)
                .filter(|q| !q.is_empty())
                .map(str::to_owned),
            start_date: parse_filter_date("startDate", query.start_date.as_deref())?,
            end_date: parse_filter_date("endDate", query.end_date.as_deref())?,
            page,
            limit,
            offset,
        })
    }
}

fn parse_filter_date(field: &str, value: Option<&str>) -> Result<Option<NaiveDate>, AppError> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(raw) => NaiveDate::parse_from_str(raw, DATE_FORMAT)
            .map(Some)
            .map_err(|e| {
                AppError::InvalidInput(format!("{field} '{raw}' is not a YYYY-MM-DD date: {e}"))
            }),
    }
}

/// Escapes LIKE wildcards so the user's text matches literally.
///
/// The text is folded the way the backend's `lower()` folds the title column. SQLite
/// only folds ASCII, so there a non-ASCII letter matches only in its stored case.
fn like_contains_pattern(text: &str, backend: DbBackend) -> String {
    let folded = match backend {
        DbBackend::Sqlite => text.to_ascii_lowercase(),
        _ => text.to_lowercase(),
    };
    let mut escaped = String::with_capacity(folded.len() + 2);
    escaped.push('%');
    for c in folded.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

/// Runs a filtered, paginated lookup ordered by date, newest first.
///
/// A link matches the tag filter when it carries any of the requested tags.
pub async fn query_links<C: ConnectionTrait>(db: &C, query: &LinkQuery) -> Result<LinkPage, AppError> {
    let filter = LinkFilter::try_from(query)?;

    let mut select = link::Entity::find();

    if !filter.tags.is_empty() {
        select = select.filter(
            link::Column::Id.in_subquery(
                Query::select()
                    .column(link_tag::Column::LinkId)
                    .from(link_tag::Entity)
                    .and_where(link_tag::Column::TagId.is_in(filter.tags.clone()))
                    .to_owned(),
            ),
        );
    }
    if let Some(start) = filter.start_date {
        select = select.filter(link::Column::Date.gte(start));
    }
    if let Some(end) = filter.end_date {
        select = select.filter(link::Column::Date.lte(end));
    }
    if let Some(title_query) = &filter.title_query {
        select = select.filter(
            Expr::expr(Func::lower(Expr::col(link::Column::Title)))
                .like(LikeExpr::new(like_contains_pattern(title_query, db.get_database_backend())).escape('\\')),
        );
    }

    // One extra row tells whether another page follows.
    let mut rows = select
        .order_by_desc(link::Column::Date)
        .order_by_asc(link::Column::Id)
        .limit(filter.limit + 1)
        .offset(filter.offset)
        .all(db)
        .await?;

    let is_last_page = rows.len() as u64 <= filter.limit;
    rows.truncate(filter.limit as usize);

    let mut tag_map = load_tag_map(db, rows.iter().map(|r| r.id.clone()).collect()).await?;
    let links = rows
        .into_iter()
        .map(|row| {
            let tags = tag_map.remove(&row.id).unwrap_or_default();
            Link::from_model(row, tags)
        })
        .collect();

    Ok(LinkPage {
        links,
        page: filter.page,
        limit: filter.limit,
        is_last_page,
    })
}

async fn load_tag_map<C: ConnectionTrait>(
    db: &C,
    link_ids: Vec<String>,
) -> Result<HashMap<String, BTreeSet<String>>, AppError> {
    let mut tag_map: HashMap<String, BTreeSet<String>> = HashMap::new();
    if link_ids.is_empty() {
        return Ok(tag_map);
    }

    let associations = link_tag::Entity::find()
        .filter(link_tag::Column::LinkId.is_in(link_ids))
        .all(db)
        .await?;
    for association in associations {
        tag_map
            .entry(association.link_id)
            .or_default()
            .insert(association.tag_id);
    }
    Ok(tag_map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::entities::prelude::{LinkTag, Tag};
    use crate::db::{connect, schema};
    use chrono::Days;
    use sea_orm::PaginatorTrait;

    async fn setup() -> DatabaseConnection {
        let db = connect("sqlite::memory:", 1).await.unwrap();
        schema::create_tables(&db).await.unwrap();
        db
    }

    fn day(offset: u64) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .checked_add_days(Days::new(offset))
            .unwrap()
    }

    fn sample(id: &str, title: &str, date: NaiveDate, tags: &[&str]) -> Link {
        Link {
            id: id.to_string(),
            url: format!("/posts/{id}.html"),
            title: title.to_string(),
            subtitle: String::new(),
            description: String::new(),
            date,
            image_url: None,
            image_alt: None,
            tags: tags.iter().map(|t| t.to_string()).collect(),
        }
    }

    fn ids(page: &LinkPage) -> Vec<&str> {
        page.links.iter().map(|l| l.id.as_str()).collect()
    }

    #[tokio::test]
    async fn upsert_twice_keeps_one_row_and_one_tag_set() {
        let db = setup().await;
        let link = sample("hello", "Hello", day(0), &["rust", "web"]);

        upsert_link(&db, &link).await.unwrap();
        upsert_link(&db, &link).await.unwrap();

        assert_eq!(link::Entity::find().count(&db).await.unwrap(), 1);
        assert_eq!(Tag::find().count(&db).await.unwrap(), 2);
        assert_eq!(LinkTag::find().count(&db).await.unwrap(), 2);
        assert_eq!(get_link(&db, "hello").await.unwrap(), Some(link));
    }

    #[tokio::test]
    async fn republish_replaces_fields_and_tag_set() {
        let db = setup().await;
        upsert_link(&db, &sample("post", "First", day(0), &["a", "b"]))
            .await
            .unwrap();

        let mut replacement = sample("post", "Second", day(3), &["c"]);
        replacement.image_url = Some("https://img.example/x.png".to_string());
        upsert_link(&db, &replacement).await.unwrap();

        let stored = get_link(&db, "post").await.unwrap().unwrap();
        assert_eq!(stored, replacement);
        // Old tags remain as rows but are no longer associated.
        assert_eq!(Tag::find().count(&db).await.unwrap(), 3);
        assert_eq!(LinkTag::find().count(&db).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn get_unknown_is_none() {
        let db = setup().await;
        assert_eq!(get_link(&db, "unknown-id").await.unwrap(), None);
    }

    #[tokio::test]
    async fn delete_removes_link_but_keeps_tags() {
        let db = setup().await;
        upsert_link(&db, &sample("gone", "Gone", day(0), &["kept"]))
            .await
            .unwrap();

        delete_link(&db, "gone").await.unwrap();

        assert_eq!(get_link(&db, "gone").await.unwrap(), None);
        assert_eq!(LinkTag::find().count(&db).await.unwrap(), 0);
        assert_eq!(tag_service::list_tag_ids(&db).await.unwrap(), vec!["kept"]);
    }

    #[tokio::test]
    async fn delete_unknown_is_not_found() {
        let db = setup().await;
        let err = delete_link(&db, "nope").await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn dropped_stage_leaves_no_row() {
        let db = setup().await;
        let txn = stage_link(&db, &sample("staged", "Staged", day(0), &["t"]))
            .await
            .unwrap();
        txn.rollback().await.unwrap();

        assert_eq!(get_link(&db, "staged").await.unwrap(), None);
    }

    #[tokio::test]
    async fn query_by_tag_returns_only_tagged_links() {
        let db = setup().await;
        upsert_link(&db, &sample("a", "A", day(1), &["t1", "t2"])).await.unwrap();
        upsert_link(&db, &sample("b", "B", day(2), &["t2"])).await.unwrap();

        let page = query_links(&db, &LinkQuery::default().with_tags(["t1"]))
            .await
            .unwrap();
        assert_eq!(ids(&page), vec!["a"]);
        assert_eq!(page.links[0].tags.len(), 2);
    }

    #[tokio::test]
    async fn multiple_tags_match_any() {
        let db = setup().await;
        upsert_link(&db, &sample("a", "A", day(1), &["t1", "t2"])).await.unwrap();
        upsert_link(&db, &sample("b", "B", day(2), &["t2"])).await.unwrap();
        upsert_link(&db, &sample("c", "C", day(3), &["t3"])).await.unwrap();

        let page = query_links(&db, &LinkQuery::default().with_tags(["t1", "t2"]))
            .await
            .unwrap();
        assert_eq!(ids(&page), vec!["b", "a"]);
    }

    #[tokio::test]
    async fn title_query_is_case_insensitive() {
        let db = setup().await;
        upsert_link(&db, &sample("hw", "Hello World", day(0), &[])).await.unwrap();
        upsert_link(&db, &sample("other", "Goodbye", day(1), &[])).await.unwrap();

        let page = query_links(&db, &LinkQuery::default().with_title("HELLO"))
            .await
            .unwrap();
        assert_eq!(ids(&page), vec!["hw"]);
    }

    #[tokio::test]
    async fn title_query_wildcards_match_literally() {
        let db = setup().await;
        upsert_link(&db, &sample("pct", "100% Rust", day(0), &[])).await.unwrap();
        upsert_link(&db, &sample("plain", "100 Rust", day(1), &[])).await.unwrap();

        let page = query_links(&db, &LinkQuery::default().with_title("0%"))
            .await
            .unwrap();
        assert_eq!(ids(&page), vec!["pct"]);
    }

    #[tokio::test]
    async fn date_bounds_are_inclusive() {
        let db = setup().await;
        for i in 0..5u64 {
            upsert_link(&db, &sample(&format!("d{i}"), "Dated", day(i), &[]))
                .await
                .unwrap();
        }

        let page = query_links(
            &db,
            &LinkQuery::default().between(Some("2024-01-02"), Some("2024-01-04")),
        )
        .await
        .unwrap();
        assert_eq!(ids(&page), vec!["d3", "d2", "d1"]);
    }

    #[tokio::test]
    async fn malformed_date_is_a_validation_error() {
        let db = setup().await;
        let err = query_links(&db, &LinkQuery::default().between(Some("01/02/2024"), None))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn oversized_limit_is_a_validation_error() {
        let db = setup().await;
        let err = query_links(&db, &LinkQuery::default().page(1, MAX_PAGE_LIMIT + 1))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn pagination_marks_last_page() {
        let db = setup().await;
        for i in 0..55u64 {
            upsert_link(&db, &sample(&format!("l{i:02}"), "Paged", day(i), &[]))
                .await
                .unwrap();
        }

        let fifth = query_links(&db, &LinkQuery::default().page(5, 10)).await.unwrap();
        assert_eq!(fifth.links.len(), 10);
        assert!(!fifth.is_last_page);

        let sixth = query_links(&db, &LinkQuery::default().page(6, 10)).await.unwrap();
        assert_eq!(sixth.links.len(), 5);
        assert!(sixth.is_last_page);
        assert_eq!(ids(&sixth), vec!["l04", "l03", "l02", "l01", "l00"]);
    }

    #[tokio::test]
    async fn page_zero_and_default_limit() {
        let db = setup().await;
        for i in 0..55u64 {
            upsert_link(&db, &sample(&format!("l{i:02}"), "Paged", day(i), &[]))
                .await
                .unwrap();
        }

        let first = query_links(&db, &LinkQuery::default()).await.unwrap();
        assert_eq!(first.links.len(), DEFAULT_PAGE_LIMIT as usize);
        assert_eq!(first.page, 1);
        assert_eq!(first.links[0].id, "l54");
        assert!(!first.is_last_page);
    }

    #[test]
    fn like_pattern_escapes_wildcards() {
        assert_eq!(like_contains_pattern("A_b%", DbBackend::Postgres), "%a\\_b\\%%");
        assert_eq!(like_contains_pattern("ÉLAN", DbBackend::Postgres), "%élan%");
        assert_eq!(like_contains_pattern("ÉLAN", DbBackend::Sqlite), "%Élan%");
    }

    #[tokio::test]
    async fn non_ascii_title_matches_in_stored_case_on_sqlite() {
        let db = setup().await;
        upsert_link(&db, &sample("elan", "Élan Vital", day(0), &[])).await.unwrap();

        let exact = query_links(&db, &LinkQuery::default().with_title("Élan"))
            .await
            .unwrap();
        assert_eq!(ids(&exact), vec!["elan"]);

        let ascii_case = query_links(&db, &LinkQuery::default().with_title("Élan VITAL"))
            .await
            .unwrap();
        assert_eq!(ids(&ascii_case), vec!["elan"]);
    }
}
