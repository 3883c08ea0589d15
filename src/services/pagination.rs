//! Offset pagination with client-side deletion correction, plus a keyset feed.
//!
//! Offset windows: `skip = (page - 1) * max_limit - deleted_doc_count`, clamped at zero.
//! The correction is only valid for deletions the client itself performed on rows it had
//! already fetched; it is not a consistency guarantee against other writers.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;

use crate::error::{AppError, Result};
use crate::services::database::Database;
use crate::store::{Collection, Filter, FindOptions, Sort, SortOrder};

pub const LATEST_BLOGS_PAGE_SIZE: u64 = 5;
pub const SEARCH_BLOGS_PAGE_SIZE: u64 = 2;
pub const TRENDING_BLOGS_LIMIT: u64 = 5;
pub const NOTIFICATIONS_PAGE_SIZE: u64 = 10;
pub const USER_BLOGS_PAGE_SIZE: u64 = 5;
pub const ADMIN_BLOGS_PAGE_SIZE: u64 = 5;
pub const ADMIN_USERS_PAGE_SIZE: u64 = 5;
pub const COMMENTS_PAGE_SIZE: u64 = 5;
pub const REPLIES_PAGE_SIZE: u64 = 5;
pub const FEED_DEFAULT_LIMIT: u64 = 5;
pub const FEED_MAX_LIMIT: u64 = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    pub page: u64,
    pub max_limit: u64,
    pub deleted_doc_count: u64,
}

impl PageRequest {
    /// 页码从 1 开始，小于 1 按 1 处理
    pub fn new(page: u64, max_limit: u64) -> Self {
        Self {
            page: page.max(1),
            max_limit,
            deleted_doc_count: 0,
        }
    }

    pub fn with_deleted(mut self, deleted_doc_count: u64) -> Self {
        self.deleted_doc_count = deleted_doc_count;
        self
    }

    pub fn from_query(page: Option<u64>, max_limit: u64, deleted_doc_count: Option<u64>) -> Self {
        Self::new(page.unwrap_or(1), max_limit).with_deleted(deleted_doc_count.unwrap_or(0))
    }

    pub fn skip(&self) -> u64 {
        (self.page.max(1) - 1)
            .saturating_mul(self.max_limit)
            .saturating_sub(self.deleted_doc_count)
    }
}

/// One fetched window plus the size of the whole filtered set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub results: Vec<T>,
    #[serde(rename = "totalDocs")]
    pub total_docs: u64,
    pub page: u64,
    #[serde(rename = "deletedDocCount")]
    pub deleted_doc_count: u64,
}

impl<T> Page<T> {
    /// Same window metadata, different rows (e.g. after populating references).
    pub fn with_results<U>(self, results: Vec<U>) -> Page<U> {
        Page {
            results,
            total_docs: self.total_docs,
            page: self.page,
            deleted_doc_count: self.deleted_doc_count,
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            results: self.results.into_iter().map(f).collect(),
            total_docs: self.total_docs,
            page: self.page,
            deleted_doc_count: self.deleted_doc_count,
        }
    }
}

/// Fetch one offset window. `_id` is appended to `sort` so that windows never overlap.
pub async fn paginate<T>(
    db: &Database,
    collection: Collection,
    filter: &Filter,
    sort: Sort,
    request: PageRequest,
) -> Result<Page<T>>
where
    T: DeserializeOwned,
{
    let options = FindOptions::sorted(sort.with_id_tiebreak())
        .skip(request.skip())
        .limit(request.max_limit);

    let results = db.find(collection, filter, &options).await?;
    let total_docs = db.count(collection, filter).await?;

    tracing::debug!(
        "Paginated {} page {} (skip {}): {} of {}",
        collection,
        request.page,
        request.skip(),
        results.len(),
        total_docs
    );

    Ok(Page {
        results,
        total_docs,
        page: request.page,
        deleted_doc_count: request.deleted_doc_count,
    })
}

/// Plain `skip`/`limit` window without correction, used by comment and reply listings.
pub async fn fetch_window<T>(
    db: &Database,
    collection: Collection,
    filter: &Filter,
    sort: Sort,
    skip: u64,
    limit: u64,
) -> Result<Vec<T>>
where
    T: DeserializeOwned,
{
    let options = FindOptions::sorted(sort.with_id_tiebreak()).skip(skip).limit(limit);
    db.find(collection, filter, &options).await
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListingState {
    /// No matches at all.
    Empty,
    /// More rows exist than have been accumulated; show "load more".
    HasMore,
    /// Everything that matches has been accumulated.
    Exhausted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemovalOutcome {
    Removed,
    /// The container is empty but the server still has rows; start over from page 1.
    RefetchRequired,
}

/// Client-held result container for one filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageAccumulator<T> {
    pub results: Vec<T>,
    #[serde(rename = "totalDocs")]
    pub total_docs: u64,
    pub page: u64,
    #[serde(rename = "deletedDocCount")]
    pub deleted_doc_count: u64,
}

impl<T> PageAccumulator<T> {
    pub fn start(first: Page<T>) -> Self {
        Self {
            results: first.results,
            total_docs: first.total_docs,
            page: first.page,
            deleted_doc_count: first.deleted_doc_count,
        }
    }

    /// Concatenate a newly fetched page. The fresh `total_docs` wins, the local
    /// deletion count is carried forward.
    pub fn merge(&mut self, next: Page<T>) {
        self.results.extend(next.results);
        self.total_docs = next.total_docs;
        self.page = next.page;
    }

    pub fn remove_at(&mut self, index: usize) -> Option<(T, RemovalOutcome)> {
        if index >= self.results.len() {
            return None;
        }
        let removed = self.results.remove(index);
        self.total_docs = self.total_docs.saturating_sub(1);
        self.deleted_doc_count += 1;

        let outcome = if self.results.is_empty() && self.total_docs > 0 {
            RemovalOutcome::RefetchRequired
        } else {
            RemovalOutcome::Removed
        };
        Some((removed, outcome))
    }

    pub fn next_request(&self, max_limit: u64) -> PageRequest {
        PageRequest::new(self.page + 1, max_limit).with_deleted(self.deleted_doc_count)
    }

    pub fn state(&self) -> ListingState {
        if self.results.is_empty() && self.total_docs == 0 {
            ListingState::Empty
        } else if self.total_docs > self.results.len() as u64 {
            ListingState::HasMore
        } else {
            ListingState::Exhausted
        }
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

/// Keyset position: the sort value of the last row seen plus its `_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cursor {
    pub value: Value,
    pub id: String,
}

impl Cursor {
    pub fn encode(&self) -> Result<String> {
        let raw = serde_json::to_vec(self)?;
        Ok(URL_SAFE_NO_PAD.encode(raw))
    }

    pub fn decode(encoded: &str) -> Result<Self> {
        let raw = URL_SAFE_NO_PAD
            .decode(encoded)
            .map_err(|_| AppError::BadRequest("Malformed cursor".to_string()))?;
        serde_json::from_slice(&raw).map_err(|_| AppError::BadRequest("Malformed cursor".to_string()))
    }

    fn from_document(document: &Value, sort_field: &str) -> Option<Self> {
        let pointer = format!("/{}", sort_field.replace('.', "/"));
        let value = document.pointer(&pointer).cloned().unwrap_or(Value::Null);
        let id = document.get("_id")?.as_str()?.to_string();
        Some(Self { value, id })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeysetPage<T> {
    pub results: Vec<T>,
    #[serde(rename = "nextCursor")]
    pub next_cursor: Option<String>,
}

/// Rows strictly after `cursor` in (`sort_field` `order`, `_id` ASC) order.
pub async fn paginate_after<T>(
    db: &Database,
    collection: Collection,
    filter: &Filter,
    sort_field: &str,
    order: SortOrder,
    cursor: Option<&Cursor>,
    limit: u64,
) -> Result<KeysetPage<T>>
where
    T: DeserializeOwned,
{
    let limit = limit.max(1);
    let filter = match cursor {
        Some(c) => {
            let beyond = match order {
                SortOrder::Asc => Filter::gt(sort_field, c.value.clone()),
                SortOrder::Desc => Filter::lt(sort_field, c.value.clone()),
            };
            filter.clone().with(Filter::or([
                beyond,
                Filter::and([
                    Filter::eq(sort_field, c.value.clone()),
                    Filter::gt("_id", c.id.clone()),
                ]),
            ]))
        }
        None => filter.clone(),
    };

    let sort = Sort(vec![(sort_field.to_string(), order)]).with_id_tiebreak();
    // 多取一条判断是否还有下一页
    let options = FindOptions::sorted(sort).limit(limit + 1);
    let mut documents = db.store().find(collection, &filter, &options).await?;

    let has_more = documents.len() as u64 > limit;
    documents.truncate(limit as usize);

    let next_cursor = match (has_more, documents.last()) {
        (true, Some(last)) => Cursor::from_document(last, sort_field)
            .map(|c| c.encode())
            .transpose()?,
        _ => None,
    };

    let results = documents
        .into_iter()
        .map(serde_json::from_value)
        .collect::<std::result::Result<Vec<T>, _>>()?;

    Ok(KeysetPage { results, next_cursor })
}
