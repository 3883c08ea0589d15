use crate::config::{Config, DatabaseBackend};
use crate::error::{AppError, Result};
use crate::store::{
    Collection, DocumentStore, Filter, FindOptions, MemoryStore, SurrealStore, Update,
};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, info};

/// 数据库服务
///
/// 对 [`DocumentStore`] 的类型化封装：模型的序列化/反序列化、
/// 按 id 取单条记录以及按引用批量展开。
#[derive(Clone)]
pub struct Database {
    store: Arc<dyn DocumentStore>,
}

impl Database {
    /// 按配置创建数据库实例
    pub async fn new(config: &Config) -> Result<Self> {
        match config.database_backend {
            DatabaseBackend::Surreal => {
                info!("Initializing database connection to {}", config.database_url);
                let store = SurrealStore::connect(config).await?;
                Ok(Self::with_store(Arc::new(store)))
            }
            DatabaseBackend::Memory => {
                info!("Using in-memory document store");
                Ok(Self::in_memory())
            }
        }
    }

    pub fn with_store(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    pub fn in_memory() -> Self {
        Self::with_store(Arc::new(MemoryStore::new()))
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    /// 验证数据库连接
    pub async fn verify_connection(&self) -> Result<()> {
        match self.store.ping().await {
            Ok(()) => {
                info!("Database connection verified successfully");
                Ok(())
            }
            Err(e) => {
                error!("Failed to verify database connection: {}", e);
                Err(e.into())
            }
        }
    }

    /// 创建记录
    pub async fn create<T>(&self, collection: Collection, data: &T) -> Result<()>
    where
        T: Serialize,
    {
        let document = serde_json::to_value(data)?;
        self.store.insert_one(collection, document).await?;
        Ok(())
    }

    pub async fn find<T>(&self, collection: Collection, filter: &Filter, options: &FindOptions) -> Result<Vec<T>>
    where
        T: DeserializeOwned,
    {
        let documents = self.store.find(collection, filter, options).await?;
        decode_all(documents)
    }

    pub async fn find_one<T>(&self, collection: Collection, filter: &Filter) -> Result<Option<T>>
    where
        T: DeserializeOwned,
    {
        self.store
            .find_one(collection, filter)
            .await?
            .map(decode)
            .transpose()
    }

    /// 通过ID获取单个记录
    pub async fn get_by_id<T>(&self, collection: Collection, id: &str) -> Result<Option<T>>
    where
        T: DeserializeOwned,
    {
        debug!("Loading {} {}", collection, id);
        self.find_one(collection, &Filter::by_id(id)).await
    }

    /// 按引用批量展开，返回 id → 记录
    ///
    /// 不存在的引用直接缺席，调用方自行决定如何处理悬空引用。
    pub async fn get_many<T>(&self, collection: Collection, ids: &[String]) -> Result<HashMap<String, T>>
    where
        T: DeserializeOwned,
    {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let mut unique: Vec<&String> = ids.iter().collect();
        unique.sort();
        unique.dedup();

        let documents = self
            .store
            .find(
                collection,
                &Filter::is_in("_id", unique.into_iter().cloned()),
                &FindOptions::default(),
            )
            .await?;

        let mut by_id = HashMap::with_capacity(documents.len());
        for document in documents {
            let id = document
                .get("_id")
                .and_then(Value::as_str)
                .map(str::to_string)
                .ok_or_else(|| AppError::Internal(format!("{} document without _id", collection)))?;
            by_id.insert(id, decode(document)?);
        }
        Ok(by_id)
    }

    pub async fn count(&self, collection: Collection, filter: &Filter) -> Result<u64> {
        Ok(self.store.count_documents(collection, filter).await?)
    }

    /// 原子更新单条记录，返回更新前的记录
    pub async fn update_one<T>(&self, collection: Collection, filter: &Filter, update: &Update) -> Result<Option<T>>
    where
        T: DeserializeOwned,
    {
        self.store
            .find_one_and_update(collection, filter, update)
            .await?
            .map(decode)
            .transpose()
    }

    /// 通过ID更新记录，返回更新前的记录
    pub async fn update_by_id<T>(&self, collection: Collection, id: &str, update: &Update) -> Result<Option<T>>
    where
        T: DeserializeOwned,
    {
        self.update_one(collection, &Filter::by_id(id), update).await
    }

    pub async fn update_many(&self, collection: Collection, filter: &Filter, update: &Update) -> Result<u64> {
        Ok(self.store.update_many(collection, filter, update).await?)
    }

    /// 删除单条记录并返回
    pub async fn delete_one<T>(&self, collection: Collection, filter: &Filter) -> Result<Option<T>>
    where
        T: DeserializeOwned,
    {
        self.store
            .find_one_and_delete(collection, filter)
            .await?
            .map(decode)
            .transpose()
    }

    /// 通过ID删除记录
    pub async fn delete_by_id<T>(&self, collection: Collection, id: &str) -> Result<Option<T>>
    where
        T: DeserializeOwned,
    {
        self.delete_one(collection, &Filter::by_id(id)).await
    }

    pub async fn delete_many(&self, collection: Collection, filter: &Filter) -> Result<u64> {
        Ok(self.store.delete_many(collection, filter).await?)
    }
}

fn decode<T: DeserializeOwned>(document: Value) -> Result<T> {
    serde_json::from_value(document).map_err(AppError::from)
}

fn decode_all<T: DeserializeOwned>(documents: Vec<Value>) -> Result<Vec<T>> {
    documents.into_iter().map(decode).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Doc {
        #[serde(rename = "_id")]
        id: String,
        n: i64,
    }

    #[tokio::test]
    async fn get_many_skips_dangling_references() {
        let db = Database::in_memory();
        db.create(Collection::Blogs, &json!({"_id": "a", "blog_id": "a", "n": 1})).await.unwrap();
        db.create(Collection::Blogs, &json!({"_id": "b", "blog_id": "b", "n": 2})).await.unwrap();

        let ids = vec!["a".to_string(), "missing".to_string(), "a".to_string(), "b".to_string()];
        let found: HashMap<String, Doc> = db.get_many(Collection::Blogs, &ids).await.unwrap();

        assert_eq!(found.len(), 2);
        assert_eq!(found["b"], Doc { id: "b".into(), n: 2 });
    }

    #[tokio::test]
    async fn update_by_id_returns_previous_state() {
        let db = Database::in_memory();
        db.create(Collection::Comments, &Doc { id: "c".into(), n: 5 }).await.unwrap();

        let before: Option<Doc> = db
            .update_by_id(Collection::Comments, "c", &Update::new().inc("n", 1))
            .await
            .unwrap();
        let after: Option<Doc> = db.get_by_id(Collection::Comments, "c").await.unwrap();

        assert_eq!(before.unwrap().n, 5);
        assert_eq!(after.unwrap().n, 6);
    }

    #[tokio::test]
    async fn delete_of_missing_record_is_none() {
        let db = Database::in_memory();
        let gone: Option<Doc> = db.delete_by_id(Collection::Comments, "nope").await.unwrap();
        assert!(gone.is_none());
    }
}
