use crate::config::DatabaseConfig;
use anyhow::Context;
use async_trait::async_trait;
use serde_json::{Map, Value};
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};
use sqlx::types::Json;
use std::str::FromStr;
use thiserror::Error;
use tracing::{debug, info, instrument};

/// Document field routed into the partition key column
pub const PARTITION_KEY_FIELD: &str = "partitionKey";

/// Store-managed field holding the write time in Unix seconds
pub const TIMESTAMP_FIELD: &str = "_ts";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database not found")]
    DatabaseNotFound,

    #[error("Container not found")]
    ContainerNotFound,

    #[error("Record has no string id")]
    MissingId,

    #[error(transparent)]
    Backend(#[from] sqlx::Error),
}

/// Query parameters for record search
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordFilter {
    /// Match a single record id
    pub id: Option<String>,
}

/// Document collection holding catalog records
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Create the database and collection if they do not exist yet
    async fn ensure_collection(&self) -> Result<(), StoreError>;

    /// Insert one record; the record must already carry its `id`
    async fn insert(&self, record: &Map<String, Value>) -> Result<(), StoreError>;

    /// Check that the database and then the collection exist
    async fn resolve(&self) -> Result<(), StoreError>;

    /// Fetch every record matching the filter, across all partitions
    async fn query(&self, filter: &RecordFilter) -> Result<Vec<Value>, StoreError>;

    /// Round-trip to the backend for readiness checks
    async fn ping(&self) -> Result<(), StoreError>;
}

/// How much of the configured collection exists
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CollectionState {
    MissingDatabase,
    MissingContainer,
    Ready,
}

impl CollectionState {
    /// Map a missing database or container to its not-found error
    fn require(self) -> Result<(), StoreError> {
        match self {
            Self::MissingDatabase => Err(StoreError::DatabaseNotFound),
            Self::MissingContainer => Err(StoreError::ContainerNotFound),
            Self::Ready => Ok(()),
        }
    }

    /// Whether `ensure_collection` still has to create anything
    fn needs_ddl(self) -> bool {
        self != Self::Ready
    }
}

/// Catalog store backed by PostgreSQL.
///
/// A database maps to a schema and a container to a table of JSONB
/// documents keyed by `id`, with the partition key in its own column.
pub struct PgCatalogStore {
    pool: PgPool,
    database: String,
    container: String,
}

impl PgCatalogStore {
    /// Create a new catalog store with connection pool
    pub async fn new(config: &DatabaseConfig) -> anyhow::Result<Self> {
        let mut options =
            PgConnectOptions::from_str(&config.endpoint).context("Invalid database endpoint")?;

        if let Some(ref key) = config.key {
            options = options.password(key);
        }

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.connect_timeout())
            .idle_timeout(Some(config.idle_timeout()))
            .connect_with(options)
            .await
            .context("Failed to connect to PostgreSQL")?;

        info!(
            database = %config.name,
            container = %config.container,
            "Connected to catalog database"
        );

        Ok(Self {
            pool,
            database: config.name.clone(),
            container: config.container.clone(),
        })
    }

    /// Look up the schema and then the table in `information_schema`
    async fn collection_state(&self) -> Result<CollectionState, StoreError> {
        let database_exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM information_schema.schemata WHERE schema_name = $1)",
        )
        .bind(&self.database)
        .fetch_one(&self.pool)
        .await?;

        if !database_exists {
            return Ok(CollectionState::MissingDatabase);
        }

        let container_exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM information_schema.tables
                WHERE table_schema = $1 AND table_name = $2
            )
            "#,
        )
        .bind(&self.database)
        .bind(&self.container)
        .fetch_one(&self.pool)
        .await?;

        if !container_exists {
            return Ok(CollectionState::MissingContainer);
        }

        Ok(CollectionState::Ready)
    }

    fn table(&self) -> String {
        format!(
            "{}.{}",
            quote_ident(&self.database),
            quote_ident(&self.container)
        )
    }
}

#[async_trait]
impl CatalogStore for PgCatalogStore {
    #[instrument(skip(self), fields(database = %self.database, container = %self.container))]
    async fn ensure_collection(&self) -> Result<(), StoreError> {
        // DDL takes table locks, skip it once the collection exists
        if !self.collection_state().await?.needs_ddl() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;

        // Concurrent CREATE ... IF NOT EXISTS can still collide on the catalog
        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
            .bind(format!("{}.{}", self.database, self.container))
            .execute(&mut *tx)
            .await?;

        sqlx::query(&format!(
            "CREATE SCHEMA IF NOT EXISTS {}",
            quote_ident(&self.database)
        ))
        .execute(&mut *tx)
        .await?;

        sqlx::query(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS {} (
                id TEXT PRIMARY KEY,
                partition_key TEXT NOT NULL,
                body JSONB NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
            self.table()
        ))
        .execute(&mut *tx)
        .await?;

        sqlx::query(&format!(
            "CREATE INDEX IF NOT EXISTS {} ON {} (partition_key)",
            quote_ident(&format!("{}_partition_key_idx", self.container)),
            self.table()
        ))
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        info!("Catalog collection created");

        Ok(())
    }

    #[instrument(skip(self, record))]
    async fn insert(&self, record: &Map<String, Value>) -> Result<(), StoreError> {
        let id = record
            .get("id")
            .and_then(Value::as_str)
            .ok_or(StoreError::MissingId)?;

        // A missing partition key is rejected by the NOT NULL constraint
        sqlx::query(&format!(
            "INSERT INTO {} (id, partition_key, body) VALUES ($1, $2, $3)",
            self.table()
        ))
        .bind(id)
        .bind(partition_key_value(record))
        .bind(Json(record))
        .execute(&self.pool)
        .await?;

        debug!(id = %id, "Record inserted");

        Ok(())
    }

    async fn resolve(&self) -> Result<(), StoreError> {
        self.collection_state().await?.require()
    }

    #[instrument(skip(self))]
    async fn query(&self, filter: &RecordFilter) -> Result<Vec<Value>, StoreError> {
        let mut sql = format!(
            "SELECT body, EXTRACT(EPOCH FROM created_at)::BIGINT FROM {}",
            self.table()
        );

        // No partition key predicate: the id alone does not reveal the partition
        if filter.id.is_some() {
            sql.push_str(" WHERE id = $1");
        }

        let mut query_builder = sqlx::query_as::<_, (Json<Map<String, Value>>, i64)>(&sql);

        if let Some(ref id) = filter.id {
            query_builder = query_builder.bind(id);
        }

        let rows = query_builder.fetch_all(&self.pool).await?;

        debug!(count = rows.len(), "Records retrieved");

        Ok(rows
            .into_iter()
            .map(|(Json(body), ts)| with_timestamp(body, ts))
            .collect())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

/// Partition key column value for a document.
///
/// Strings are used verbatim, numbers and booleans in their JSON form;
/// anything else counts as absent.
pub fn partition_key_value(record: &Map<String, Value>) -> Option<String> {
    match record.get(PARTITION_KEY_FIELD)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn with_timestamp(mut body: Map<String, Value>, ts: i64) -> Value {
    body.insert(TIMESTAMP_FIELD.to_string(), Value::from(ts));
    Value::Object(body)
}

/// Quote a SQL identifier
fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn test_partition_key_value() {
        assert_eq!(
            partition_key_value(&record(json!({"partitionKey": "p1"}))),
            Some("p1".to_string())
        );
        assert_eq!(
            partition_key_value(&record(json!({"partitionKey": 1999}))),
            Some("1999".to_string())
        );
        assert_eq!(
            partition_key_value(&record(json!({"partitionKey": true}))),
            Some("true".to_string())
        );
        assert_eq!(partition_key_value(&record(json!({"partitionKey": null}))), None);
        assert_eq!(partition_key_value(&record(json!({"partitionKey": ["a"]}))), None);
        assert_eq!(partition_key_value(&record(json!({"title": "Matrix"}))), None);
    }

    #[test]
    fn test_with_timestamp() {
        let value = with_timestamp(record(json!({"id": "a", "title": "Matrix"})), 1_700_000_000);
        assert_eq!(value["_ts"], json!(1_700_000_000));
        assert_eq!(value["title"], json!("Matrix"));
    }

    #[test]
    fn test_quote_ident() {
        assert_eq!(quote_ident("movies"), "\"movies\"");
        assert_eq!(quote_ident("odd\"name"), "\"odd\"\"name\"");
    }

    #[test]
    fn test_collection_state_require() {
        assert!(CollectionState::Ready.require().is_ok());
        assert!(matches!(
            CollectionState::MissingDatabase.require(),
            Err(StoreError::DatabaseNotFound)
        ));
        assert!(matches!(
            CollectionState::MissingContainer.require(),
            Err(StoreError::ContainerNotFound)
        ));
    }

    #[test]
    fn test_only_incomplete_collection_needs_ddl() {
        assert!(!CollectionState::Ready.needs_ddl());
        assert!(CollectionState::MissingDatabase.needs_ddl());
        assert!(CollectionState::MissingContainer.needs_ddl());
    }

    #[test]
    fn test_record_filter_default() {
        assert_eq!(RecordFilter::default().id, None);
    }
}
