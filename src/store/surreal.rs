//! SurrealDB-backed document store (HTTP protocol).
//!
//! Documents live in one table per collection and are addressed by their own
//! `_id` field; SurrealDB record ids are stripped from every returned document.
//! Filters and updates are rendered to SurrealQL with bound parameters.

use super::{Collection, DocumentStore, Filter, FindOptions, Sort, StoreError, StoreResult, Update, UpdateOp};
use crate::config::Config;
use async_trait::async_trait;
use serde_json::{json, Map, Value};
use surrealdb::engine::remote::http::{Client, Http};
use surrealdb::opt::auth::Root;
use surrealdb::Surreal;
use tracing::{debug, error, info};

#[derive(Clone)]
pub struct SurrealStore {
    db: Surreal<Client>,
}

impl SurrealStore {
    /// 连接数据库并确保唯一索引存在
    pub async fn connect(config: &Config) -> StoreResult<Self> {
        let address = config
            .database_url
            .trim_start_matches("http://")
            .trim_start_matches("https://")
            .to_string();
        info!("Connecting to SurrealDB at {}", address);

        let db = Surreal::new::<Http>(address.as_str())
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        db.signin(Root {
            username: &config.database_username,
            password: &config.database_password,
        })
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))?;
        db.use_ns(config.database_namespace.as_str())
            .use_db(config.database_name.as_str())
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        let store = Self { db };
        store.define_indexes().await?;
        Ok(store)
    }

    async fn define_indexes(&self) -> StoreResult<()> {
        let statements = schema_statements();
        self.db
            .query(statements)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(())
    }

    async fn run(
        &self,
        collection: Collection,
        sql: String,
        params: Map<String, Value>,
    ) -> StoreResult<surrealdb::Response> {
        debug!("surreal [{}]: {}", collection, sql);
        self.db
            .query(sql)
            .bind(Value::Object(params))
            .await
            .map_err(|e| map_error(collection, e))
    }

    async fn take_documents(
        &self,
        collection: Collection,
        sql: String,
        params: Map<String, Value>,
    ) -> StoreResult<Vec<Value>> {
        let mut response = self.run(collection, sql, params).await?;
        let rows: Vec<Value> = response.take(0).map_err(|e| map_error(collection, e))?;
        Ok(rows.into_iter().map(strip_record_id).collect())
    }

    async fn first_key(&self, collection: Collection, filter: &Filter) -> StoreResult<Option<String>> {
        let mut params = ParamBag::default();
        let clause = render_filter(filter, &mut params);
        let sql = format!(
            "SELECT VALUE `_id` FROM {} WHERE {} LIMIT 1",
            collection.table_name(),
            clause
        );
        let mut response = self.run(collection, sql, params.into_inner()).await?;
        let keys: Vec<String> = response.take(0).map_err(|e| map_error(collection, e))?;
        Ok(keys.into_iter().next())
    }
}

#[async_trait]
impl DocumentStore for SurrealStore {
    async fn insert_one(&self, collection: Collection, document: Value) -> StoreResult<Value> {
        let mut params = Map::new();
        params.insert("doc".to_string(), document.clone());
        let sql = format!("CREATE {} CONTENT $doc RETURN NONE", collection.table_name());
        self.run(collection, sql, params).await?;
        Ok(document)
    }

    async fn find(
        &self,
        collection: Collection,
        filter: &Filter,
        options: &FindOptions,
    ) -> StoreResult<Vec<Value>> {
        let mut params = ParamBag::default();
        let sql = render_find(collection, filter, options, &mut params);
        self.take_documents(collection, sql, params.into_inner()).await
    }

    async fn find_one(&self, collection: Collection, filter: &Filter) -> StoreResult<Option<Value>> {
        let docs = self
            .find(collection, filter, &FindOptions::default().limit(1))
            .await?;
        Ok(docs.into_iter().next())
    }

    async fn count_documents(&self, collection: Collection, filter: &Filter) -> StoreResult<u64> {
        let mut params = ParamBag::default();
        let clause = render_filter(filter, &mut params);
        let sql = format!(
            "SELECT count() AS total FROM {} WHERE {} GROUP ALL",
            collection.table_name(),
            clause
        );
        let mut response = self.run(collection, sql, params.into_inner()).await?;
        let rows: Vec<Value> = response.take(0).map_err(|e| map_error(collection, e))?;
        Ok(rows
            .first()
            .and_then(|row| row.get("total"))
            .and_then(Value::as_u64)
            .unwrap_or(0))
    }

    async fn find_one_and_update(
        &self,
        collection: Collection,
        filter: &Filter,
        update: &Update,
    ) -> StoreResult<Option<Value>> {
        let Some(key) = self.first_key(collection, filter).await? else {
            return Ok(None);
        };
        let mut params = ParamBag::default();
        let sets = render_update(update, &mut params);
        let key_param = params.bind(Value::String(key));
        let sql = format!(
            "UPDATE {} SET {} WHERE `_id` = {} RETURN BEFORE",
            collection.table_name(),
            sets,
            key_param
        );
        let docs = self.take_documents(collection, sql, params.into_inner()).await?;
        Ok(docs.into_iter().next())
    }

    async fn find_one_and_delete(
        &self,
        collection: Collection,
        filter: &Filter,
    ) -> StoreResult<Option<Value>> {
        let Some(key) = self.first_key(collection, filter).await? else {
            return Ok(None);
        };
        let mut params = Map::new();
        params.insert("key".to_string(), Value::String(key));
        let sql = format!(
            "DELETE {} WHERE `_id` = $key RETURN BEFORE",
            collection.table_name()
        );
        let docs = self.take_documents(collection, sql, params).await?;
        Ok(docs.into_iter().next())
    }

    async fn update_many(
        &self,
        collection: Collection,
        filter: &Filter,
        update: &Update,
    ) -> StoreResult<u64> {
        if update.is_empty() {
            return Ok(0);
        }
        let mut params = ParamBag::default();
        let sets = render_update(update, &mut params);
        let clause = render_filter(filter, &mut params);
        let sql = format!(
            "UPDATE {} SET {} WHERE {} RETURN BEFORE",
            collection.table_name(),
            sets,
            clause
        );
        let docs = self.take_documents(collection, sql, params.into_inner()).await?;
        Ok(docs.len() as u64)
    }

    async fn delete_many(&self, collection: Collection, filter: &Filter) -> StoreResult<u64> {
        let mut params = ParamBag::default();
        let clause = render_filter(filter, &mut params);
        let sql = format!(
            "DELETE {} WHERE {} RETURN BEFORE",
            collection.table_name(),
            clause
        );
        let docs = self.take_documents(collection, sql, params.into_inner()).await?;
        Ok(docs.len() as u64)
    }

    async fn ping(&self) -> StoreResult<()> {
        match self.db.query("INFO FOR DB").await {
            Ok(_) => Ok(()),
            Err(e) => {
                error!("Failed to verify database connection: {}", e);
                Err(StoreError::Backend(e.to_string()))
            }
        }
    }
}

/// Named query parameters, `$p0`, `$p1`, ...
#[derive(Debug, Default)]
pub(crate) struct ParamBag {
    params: Map<String, Value>,
}

impl ParamBag {
    fn bind(&mut self, value: Value) -> String {
        let name = format!("p{}", self.params.len());
        self.params.insert(name.clone(), value);
        format!("${}", name)
    }

    pub(crate) fn into_inner(self) -> Map<String, Value> {
        self.params
    }
}

fn index_name(collection: Collection, field: &str) -> String {
    format!("{}_{}_unique", collection.table_name(), field.replace('.', "_"))
}

fn schema_statements() -> String {
    let mut statements = String::new();
    for collection in Collection::ALL {
        let table = collection.table_name();
        statements.push_str(&format!(
            "DEFINE INDEX {} ON TABLE {} FIELDS `_id` UNIQUE;\n",
            index_name(collection, "_id"),
            table
        ));
        for field in collection.unique_fields() {
            statements.push_str(&format!(
                "DEFINE INDEX {} ON TABLE {} FIELDS {} UNIQUE;\n",
                index_name(collection, field),
                table,
                field_path(field)
            ));
        }
    }
    statements
}

fn map_error(collection: Collection, err: surrealdb::Error) -> StoreError {
    let message = err.to_string();
    if message.contains("already contains") {
        let field = collection
            .unique_fields()
            .iter()
            .find(|field| message.contains(&index_name(collection, field)))
            .map(|field| field.to_string())
            .unwrap_or_else(|| "_id".to_string());
        return StoreError::Duplicate { collection, field };
    }
    StoreError::Backend(message)
}

fn strip_record_id(mut document: Value) -> Value {
    if let Some(object) = document.as_object_mut() {
        object.remove("id");
    }
    document
}

fn field_path(path: &str) -> String {
    path.split('.')
        .map(|segment| format!("`{}`", segment))
        .collect::<Vec<_>>()
        .join(".")
}

pub(crate) fn render_filter(filter: &Filter, params: &mut ParamBag) -> String {
    match filter {
        Filter::Eq { field, value } if value.is_null() => {
            let f = field_path(field);
            format!("({f} = NONE OR {f} = NULL)")
        }
        Filter::Eq { field, value } => format!("{} = {}", field_path(field), params.bind(value.clone())),
        Filter::Ne { field, value } if value.is_null() => {
            let f = field_path(field);
            format!("({f} != NONE AND {f} != NULL)")
        }
        Filter::Ne { field, value } => format!("{} != {}", field_path(field), params.bind(value.clone())),
        Filter::In { field, values } => format!(
            "{} INSIDE {}",
            field_path(field),
            params.bind(Value::Array(values.clone()))
        ),
        Filter::Contains { field, value } => {
            format!("{} CONTAINS {}", field_path(field), params.bind(value.clone()))
        }
        Filter::TextContains { field, value } => format!(
            "string::lowercase({} ?? '') CONTAINS string::lowercase({})",
            field_path(field),
            params.bind(Value::String(value.clone()))
        ),
        Filter::Lt { field, value } => format!("{} < {}", field_path(field), params.bind(value.clone())),
        Filter::Gt { field, value } => format!("{} > {}", field_path(field), params.bind(value.clone())),
        Filter::And(conditions) => join_conditions(conditions, " AND ", "true", params),
        Filter::Or(conditions) => join_conditions(conditions, " OR ", "false", params),
    }
}

fn join_conditions(conditions: &[Filter], separator: &str, empty: &str, params: &mut ParamBag) -> String {
    if conditions.is_empty() {
        return empty.to_string();
    }
    let clauses: Vec<String> = conditions.iter().map(|c| render_filter(c, params)).collect();
    format!("({})", clauses.join(separator))
}

fn render_sort(sort: &Sort) -> String {
    if sort.is_empty() {
        return String::new();
    }
    let keys: Vec<String> = sort
        .0
        .iter()
        .map(|(field, order)| format!("{} {}", field_path(field), order.as_str()))
        .collect();
    format!(" ORDER BY {}", keys.join(", "))
}

pub(crate) fn render_update(update: &Update, params: &mut ParamBag) -> String {
    let sets: Vec<String> = update
        .0
        .iter()
        .map(|op| match op {
            UpdateOp::Set { field, value } => format!("{} = {}", field_path(field), params.bind(value.clone())),
            UpdateOp::Unset { field } => format!("{} = NONE", field_path(field)),
            UpdateOp::Inc { field, by } => {
                let f = field_path(field);
                format!("{f} = ({f} ?? 0) + {}", params.bind(json!(by)))
            }
            UpdateOp::IncClamped { field, by, floor } => {
                let f = field_path(field);
                let by = params.bind(json!(by));
                let floor = params.bind(json!(floor));
                format!("{f} = math::max([({f} ?? 0) + {by}, {floor}])")
            }
            UpdateOp::Push { field, value } => {
                let f = field_path(field);
                format!("{f} = array::append({f} ?? [], {})", params.bind(value.clone()))
            }
            UpdateOp::Pull { field, value } => {
                let f = field_path(field);
                format!("{f} = array::complement({f} ?? [], [{}])", params.bind(value.clone()))
            }
        })
        .collect();
    sets.join(", ")
}

pub(crate) fn render_find(
    collection: Collection,
    filter: &Filter,
    options: &FindOptions,
    params: &mut ParamBag,
) -> String {
    let clause = render_filter(filter, params);
    let mut sql = format!(
        "SELECT * FROM {} WHERE {}{}",
        collection.table_name(),
        clause,
        render_sort(&options.sort)
    );
    if let Some(limit) = options.limit {
        sql.push_str(&format!(" LIMIT {}", limit));
    }
    if options.skip > 0 {
        sql.push_str(&format!(" START {}", options.skip));
    }
    sql
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_listing_query_with_bound_parameters() {
        let filter = Filter::all()
            .with(Filter::eq("draft", false))
            .with(Filter::eq("active", true))
            .with(Filter::text_contains("title", "rust"));
        let options = FindOptions::sorted(Sort::desc("publishedAt").with_id_tiebreak())
            .skip(10)
            .limit(5);

        let mut params = ParamBag::default();
        let sql = render_find(Collection::Blogs, &filter, &options, &mut params);

        assert_eq!(
            sql,
            "SELECT * FROM blogs WHERE (`draft` = $p0 AND `active` = $p1 AND \
             string::lowercase(`title` ?? '') CONTAINS string::lowercase($p2)) \
             ORDER BY `publishedAt` DESC, `_id` ASC LIMIT 5 START 10"
        );
        let params = params.into_inner();
        assert_eq!(params["p0"], json!(false));
        assert_eq!(params["p2"], json!("rust"));
    }

    #[test]
    fn renders_clamped_increment_and_array_ops() {
        let update = Update::new()
            .inc_clamped("account_info.total_posts", -1, 0)
            .pull("blogs", "b1")
            .unset("reply");

        let mut params = ParamBag::default();
        let sql = render_update(&update, &mut params);

        assert_eq!(
            sql,
            "`account_info`.`total_posts` = math::max([(`account_info`.`total_posts` ?? 0) + $p0, $p1]), \
             `blogs` = array::complement(`blogs` ?? [], [$p2]), `reply` = NONE"
        );
    }

    #[test]
    fn empty_combinators_render_constants() {
        let mut params = ParamBag::default();
        assert_eq!(render_filter(&Filter::all(), &mut params), "true");
        assert_eq!(render_filter(&Filter::or(Vec::new()), &mut params), "false");
    }

    #[test]
    fn null_equality_matches_missing_fields() {
        let mut params = ParamBag::default();
        let sql = render_filter(&Filter::eq("parent", Value::Null), &mut params);
        assert_eq!(sql, "(`parent` = NONE OR `parent` = NULL)");
        assert!(params.into_inner().is_empty());
    }

    #[test]
    fn schema_defines_unique_username_index() {
        let schema = schema_statements();
        assert!(schema.contains(
            "DEFINE INDEX users_personal_info_username_unique ON TABLE users FIELDS `personal_info`.`username` UNIQUE;"
        ));
    }
}
