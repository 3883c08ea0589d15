//! In-process document store.
//!
//! Each collection is a `Vec` of JSON documents kept in insertion order behind a
//! `DashMap` shard lock, so every single-document operation is atomic with
//! respect to concurrent callers. Used for tests and the `memory` backend.

use super::{Collection, DocumentStore, Filter, FindOptions, Sort, SortOrder, StoreError, StoreResult, Update, UpdateOp};
use async_trait::async_trait;
use dashmap::DashMap;
use regex::RegexBuilder;
use serde_json::{Map, Value};
use std::cmp::Ordering;
use tracing::debug;

#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: DashMap<Collection, Vec<Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of documents currently held in a collection.
    pub fn len(&self, collection: Collection) -> usize {
        self.collections.get(&collection).map(|docs| docs.len()).unwrap_or(0)
    }

    pub fn is_empty(&self, collection: Collection) -> bool {
        self.len(collection) == 0
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn insert_one(&self, collection: Collection, document: Value) -> StoreResult<Value> {
        let id = document
            .get("_id")
            .and_then(Value::as_str)
            .ok_or_else(|| StoreError::Backend("document is missing a string _id".to_string()))?
            .to_string();

        let mut docs = self.collections.entry(collection).or_default();
        if docs.iter().any(|d| d.get("_id").and_then(Value::as_str) == Some(id.as_str())) {
            return Err(StoreError::Duplicate {
                collection,
                field: "_id".to_string(),
            });
        }
        check_unique(collection, &docs, &document, None)?;

        debug!("memory store: insert {}:{}", collection, id);
        docs.push(document.clone());
        Ok(document)
    }

    async fn find(
        &self,
        collection: Collection,
        filter: &Filter,
        options: &FindOptions,
    ) -> StoreResult<Vec<Value>> {
        let mut found: Vec<Value> = match self.collections.get(&collection) {
            Some(docs) => docs.iter().filter(|d| matches(d, filter)).cloned().collect(),
            None => Vec::new(),
        };

        sort_documents(&mut found, &options.sort);

        let skip = usize::try_from(options.skip).unwrap_or(usize::MAX);
        let iter = found.into_iter().skip(skip);
        Ok(match options.limit {
            Some(limit) => iter.take(usize::try_from(limit).unwrap_or(usize::MAX)).collect(),
            None => iter.collect(),
        })
    }

    async fn find_one(&self, collection: Collection, filter: &Filter) -> StoreResult<Option<Value>> {
        Ok(self
            .collections
            .get(&collection)
            .and_then(|docs| docs.iter().find(|d| matches(d, filter)).cloned()))
    }

    async fn count_documents(&self, collection: Collection, filter: &Filter) -> StoreResult<u64> {
        Ok(self
            .collections
            .get(&collection)
            .map(|docs| docs.iter().filter(|d| matches(d, filter)).count() as u64)
            .unwrap_or(0))
    }

    async fn find_one_and_update(
        &self,
        collection: Collection,
        filter: &Filter,
        update: &Update,
    ) -> StoreResult<Option<Value>> {
        let mut docs = self.collections.entry(collection).or_default();
        let Some(index) = docs.iter().position(|d| matches(d, filter)) else {
            return Ok(None);
        };

        let before = docs[index].clone();
        let mut after = before.clone();
        apply_update(&mut after, update)?;
        check_unique(collection, &docs, &after, Some(index))?;
        docs[index] = after;

        Ok(Some(before))
    }

    async fn find_one_and_delete(
        &self,
        collection: Collection,
        filter: &Filter,
    ) -> StoreResult<Option<Value>> {
        let mut docs = self.collections.entry(collection).or_default();
        let index = docs.iter().position(|d| matches(d, filter));
        Ok(index.map(|index| docs.remove(index)))
    }

    async fn update_many(
        &self,
        collection: Collection,
        filter: &Filter,
        update: &Update,
    ) -> StoreResult<u64> {
        let mut docs = self.collections.entry(collection).or_default();
        let targets: Vec<usize> = docs
            .iter()
            .enumerate()
            .filter(|(_, d)| matches(d, filter))
            .map(|(i, _)| i)
            .collect();

        for &index in &targets {
            let mut after = docs[index].clone();
            apply_update(&mut after, update)?;
            check_unique(collection, &docs, &after, Some(index))?;
            docs[index] = after;
        }

        Ok(targets.len() as u64)
    }

    async fn delete_many(&self, collection: Collection, filter: &Filter) -> StoreResult<u64> {
        let mut docs = self.collections.entry(collection).or_default();
        let before = docs.len();
        docs.retain(|d| !matches(d, filter));
        Ok((before - docs.len()) as u64)
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}

fn check_unique(
    collection: Collection,
    docs: &[Value],
    candidate: &Value,
    replacing: Option<usize>,
) -> StoreResult<()> {
    for field in collection.unique_fields() {
        let Some(value) = lookup(candidate, field).filter(|v| !v.is_null()) else {
            continue;
        };
        let clash = docs
            .iter()
            .enumerate()
            .filter(|(i, _)| Some(*i) != replacing)
            .any(|(_, d)| lookup(d, field).map_or(false, |other| values_equal(other, value)));
        if clash {
            return Err(StoreError::Duplicate {
                collection,
                field: field.to_string(),
            });
        }
    }
    Ok(())
}

/// Resolve a dotted path inside a document.
pub(crate) fn lookup<'a>(doc: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(doc, |current, key| current.get(key))
}

fn set_path(doc: &mut Value, path: &str, value: Value) -> StoreResult<()> {
    let mut current = doc;
    let mut keys = path.split('.').peekable();
    while let Some(key) = keys.next() {
        if !current.is_object() {
            if current.is_null() {
                *current = Value::Object(Map::new());
            } else {
                return Err(StoreError::Backend(format!("cannot set {} through a non-object", path)));
            }
        }
        let object = current
            .as_object_mut()
            .ok_or_else(|| StoreError::Backend(format!("cannot set {}", path)))?;
        if keys.peek().is_none() {
            object.insert(key.to_string(), value);
            return Ok(());
        }
        current = object.entry(key.to_string()).or_insert(Value::Null);
    }
    Ok(())
}

fn remove_path(doc: &mut Value, path: &str) {
    let (parent, key) = match path.rsplit_once('.') {
        Some((parent, key)) => (parent, key),
        None => {
            if let Some(object) = doc.as_object_mut() {
                object.remove(path);
            }
            return;
        }
    };
    let mut current = doc;
    for segment in parent.split('.') {
        match current.get_mut(segment) {
            Some(next) => current = next,
            None => return,
        }
    }
    if let Some(object) = current.as_object_mut() {
        object.remove(key);
    }
}

fn apply_update(doc: &mut Value, update: &Update) -> StoreResult<()> {
    for op in &update.0 {
        match op {
            UpdateOp::Set { field, value } => set_path(doc, field, value.clone())?,
            UpdateOp::Unset { field } => remove_path(doc, field),
            UpdateOp::Inc { field, by } => {
                let current = lookup(doc, field).and_then(Value::as_i64).unwrap_or(0);
                set_path(doc, field, Value::from(current.saturating_add(*by)))?;
            }
            UpdateOp::IncClamped { field, by, floor } => {
                let current = lookup(doc, field).and_then(Value::as_i64).unwrap_or(0);
                let next = current.saturating_add(*by).max(*floor);
                set_path(doc, field, Value::from(next))?;
            }
            UpdateOp::Push { field, value } => {
                let mut items = match lookup(doc, field) {
                    Some(Value::Array(items)) => items.clone(),
                    None | Some(Value::Null) => Vec::new(),
                    Some(_) => return Err(StoreError::Backend(format!("{} is not an array", field))),
                };
                items.push(value.clone());
                set_path(doc, field, Value::Array(items))?;
            }
            UpdateOp::Pull { field, value } => {
                if let Some(Value::Array(items)) = lookup(doc, field) {
                    let kept: Vec<Value> = items.iter().filter(|v| !values_equal(v, value)).cloned().collect();
                    set_path(doc, field, Value::Array(kept))?;
                }
            }
        }
    }
    Ok(())
}

pub(crate) fn matches(doc: &Value, filter: &Filter) -> bool {
    match filter {
        Filter::Eq { field, value } => values_equal(lookup(doc, field).unwrap_or(&Value::Null), value),
        Filter::Ne { field, value } => !values_equal(lookup(doc, field).unwrap_or(&Value::Null), value),
        Filter::In { field, values } => {
            let current = lookup(doc, field).unwrap_or(&Value::Null);
            values.iter().any(|v| values_equal(current, v))
        }
        Filter::Contains { field, value } => match lookup(doc, field) {
            Some(Value::Array(items)) => items.iter().any(|item| values_equal(item, value)),
            _ => false,
        },
        Filter::TextContains { field, value } => {
            let Some(haystack) = lookup(doc, field).and_then(Value::as_str) else {
                return false;
            };
            RegexBuilder::new(&regex::escape(value))
                .case_insensitive(true)
                .build()
                .map(|re| re.is_match(haystack))
                .unwrap_or(false)
        }
        Filter::Lt { field, value } => lookup(doc, field)
            .filter(|current| type_rank(current) == type_rank(value))
            .map_or(false, |current| compare_values(Some(current), Some(value)) == Ordering::Less),
        Filter::Gt { field, value } => lookup(doc, field)
            .filter(|current| type_rank(current) == type_rank(value))
            .map_or(false, |current| compare_values(Some(current), Some(value)) == Ordering::Greater),
        Filter::And(conditions) => conditions.iter().all(|c| matches(doc, c)),
        Filter::Or(conditions) => conditions.iter().any(|c| matches(doc, c)),
    }
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

pub(crate) fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    let a = a.unwrap_or(&Value::Null);
    let b = b.unwrap_or(&Value::Null);
    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

fn sort_documents(docs: &mut [Value], sort: &Sort) {
    if sort.is_empty() {
        return;
    }
    docs.sort_by(|a, b| {
        for (field, order) in &sort.0 {
            let ordering = compare_values(lookup(a, field), lookup(b, field));
            let ordering = match order {
                SortOrder::Asc => ordering,
                SortOrder::Desc => ordering.reverse(),
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn blog(id: &str, title: &str, reads: i64, published: &str) -> Value {
        json!({
            "_id": id,
            "blog_id": format!("{}-slug", id),
            "title": title,
            "draft": false,
            "active": true,
            "tags": ["rust", "campus"],
            "activity": { "total_reads": reads, "total_likes": 0 },
            "comments": [],
            "publishedAt": published,
        })
    }

    async fn seeded() -> MemoryStore {
        let store = MemoryStore::new();
        store.insert_one(Collection::Blogs, blog("b1", "Intro to Rust", 10, "2024-01-01T00:00:00.000000Z")).await.unwrap();
        store.insert_one(Collection::Blogs, blog("b2", "Campus news", 30, "2024-01-03T00:00:00.000000Z")).await.unwrap();
        store.insert_one(Collection::Blogs, blog("b3", "rusty bikes", 20, "2024-01-02T00:00:00.000000Z")).await.unwrap();
        store
    }

    #[tokio::test]
    async fn text_contains_is_case_insensitive_and_literal() {
        let store = seeded().await;

        let hits = store
            .count_documents(Collection::Blogs, &Filter::text_contains("title", "RUST"))
            .await
            .unwrap();
        assert_eq!(hits, 2);

        let literal = store
            .count_documents(Collection::Blogs, &Filter::text_contains("title", "r.st"))
            .await
            .unwrap();
        assert_eq!(literal, 0);
    }

    #[tokio::test]
    async fn find_sorts_then_skips_and_limits() {
        let store = seeded().await;
        let options = FindOptions::sorted(Sort::desc("publishedAt")).skip(1).limit(1);

        let page = store.find(Collection::Blogs, &Filter::all(), &options).await.unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0]["_id"], "b3");
    }

    #[tokio::test]
    async fn find_one_and_update_returns_previous_document() {
        let store = seeded().await;
        let update = Update::new().set("active", false).set("activity.total_reads", 0);

        let before = store
            .find_one_and_update(Collection::Blogs, &Filter::by_id("b2"), &update)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(before["activity"]["total_reads"], 30);

        let after = store.find_one(Collection::Blogs, &Filter::by_id("b2")).await.unwrap().unwrap();
        assert_eq!(after["active"], false);
        assert_eq!(after["activity"]["total_reads"], 0);
    }

    #[tokio::test]
    async fn clamped_increment_never_goes_below_floor() {
        let store = seeded().await;
        let update = Update::new().inc_clamped("activity.total_reads", -100, 0);

        store.find_one_and_update(Collection::Blogs, &Filter::by_id("b1"), &update).await.unwrap();

        let doc = store.find_one(Collection::Blogs, &Filter::by_id("b1")).await.unwrap().unwrap();
        assert_eq!(doc["activity"]["total_reads"], 0);
    }

    #[tokio::test]
    async fn push_pull_and_unset() {
        let store = seeded().await;
        let filter = Filter::by_id("b1");

        store.find_one_and_update(Collection::Blogs, &filter, &Update::new().push("comments", "c1")).await.unwrap();
        store.find_one_and_update(Collection::Blogs, &filter, &Update::new().push("comments", "c2")).await.unwrap();
        store.find_one_and_update(Collection::Blogs, &filter, &Update::new().pull("comments", "c1")).await.unwrap();
        store.find_one_and_update(Collection::Blogs, &filter, &Update::new().unset("title")).await.unwrap();

        let doc = store.find_one(Collection::Blogs, &filter).await.unwrap().unwrap();
        assert_eq!(doc["comments"], json!(["c2"]));
        assert!(doc.get("title").is_none());
    }

    #[tokio::test]
    async fn contains_matches_array_members() {
        let store = seeded().await;
        let n = store
            .count_documents(Collection::Blogs, &Filter::contains("tags", "campus"))
            .await
            .unwrap();
        assert_eq!(n, 3);
    }

    #[tokio::test]
    async fn unique_fields_are_enforced() {
        let store = seeded().await;
        let err = store
            .insert_one(Collection::Blogs, json!({ "_id": "b9", "blog_id": "b1-slug" }))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Duplicate { ref field, .. } if field == "blog_id"));

        let err = store
            .find_one_and_update(Collection::Blogs, &Filter::by_id("b2"), &Update::new().set("blog_id", "b3-slug"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Duplicate { .. }));
    }

    #[tokio::test]
    async fn delete_many_and_update_many_report_counts() {
        let store = seeded().await;

        let touched = store
            .update_many(Collection::Blogs, &Filter::gt("activity.total_reads", 15), &Update::new().set("active", false))
            .await
            .unwrap();
        assert_eq!(touched, 2);

        let removed = store
            .delete_many(Collection::Blogs, &Filter::eq("active", false))
            .await
            .unwrap();
        assert_eq!(removed, 2);
        assert_eq!(store.len(Collection::Blogs), 1);
    }

    #[test]
    fn missing_fields_sort_first() {
        let a = json!({ "n": 1 });
        let b = json!({});
        assert_eq!(compare_values(lookup(&b, "n"), lookup(&a, "n")), Ordering::Less);
    }
}
