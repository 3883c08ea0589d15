//! Document store abstraction.
//!
//! Services never talk to a database directly; they go through [`DocumentStore`],
//! which offers the query, count and atomic single-document update primitives the
//! rest of the crate relies on. Multi-document operations are not transactional.

pub mod filter;
pub mod memory;
pub mod surreal;

use async_trait::async_trait;
use serde_json::Value;
use std::fmt;
use thiserror::Error;

pub use filter::{Filter, FindOptions, Sort, SortOrder, Update, UpdateOp};
pub use memory::MemoryStore;
pub use surreal::SurrealStore;

/// The four persisted collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Users,
    Blogs,
    Comments,
    Notifications,
}

impl Collection {
    pub const ALL: [Collection; 4] = [
        Collection::Users,
        Collection::Blogs,
        Collection::Comments,
        Collection::Notifications,
    ];

    pub const fn table_name(self) -> &'static str {
        match self {
            Collection::Users => "users",
            Collection::Blogs => "blogs",
            Collection::Comments => "comments",
            Collection::Notifications => "notifications",
        }
    }

    /// Fields that must hold distinct values across the collection.
    pub const fn unique_fields(self) -> &'static [&'static str] {
        match self {
            Collection::Users => &["personal_info.username", "personal_info.email"],
            Collection::Blogs => &["blog_id"],
            Collection::Comments | Collection::Notifications => &[],
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table_name())
    }
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Duplicate value for {collection}.{field}")]
    Duplicate { collection: Collection, field: String },

    #[error("Store backend error: {0}")]
    Backend(String),

    #[error("Document serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Operations every backend provides. Each single-document call is atomic.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Insert a document. The document must carry its own `_id`.
    async fn insert_one(&self, collection: Collection, document: Value) -> StoreResult<Value>;

    async fn find(
        &self,
        collection: Collection,
        filter: &Filter,
        options: &FindOptions,
    ) -> StoreResult<Vec<Value>>;

    async fn find_one(&self, collection: Collection, filter: &Filter) -> StoreResult<Option<Value>>;

    async fn count_documents(&self, collection: Collection, filter: &Filter) -> StoreResult<u64>;

    /// Apply `update` to the first matching document and return it as it was before.
    async fn find_one_and_update(
        &self,
        collection: Collection,
        filter: &Filter,
        update: &Update,
    ) -> StoreResult<Option<Value>>;

    /// Remove the first matching document and return it.
    async fn find_one_and_delete(
        &self,
        collection: Collection,
        filter: &Filter,
    ) -> StoreResult<Option<Value>>;

    /// Returns the number of documents touched.
    async fn update_many(
        &self,
        collection: Collection,
        filter: &Filter,
        update: &Update,
    ) -> StoreResult<u64>;

    /// Returns the number of documents removed.
    async fn delete_many(&self, collection: Collection, filter: &Filter) -> StoreResult<u64>;

    async fn ping(&self) -> StoreResult<()>;
}
