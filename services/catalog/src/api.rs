use crate::blob_store::BlobStore;
use crate::catalog_store::{CatalogStore, RecordFilter};
use crate::config::{ApiConfig, StorageConfig};
use crate::error::ApiError;
use crate::media::MediaKind;
use anyhow::{Context, Result};
use axum::{
    extract::{multipart::MultipartRejection, DefaultBodyLimit, Multipart, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::future::Future;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, info, instrument};
use uuid::Uuid;

/// Multipart field carrying the uploaded file
const FILE_FIELD: &str = "file";

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub blob_store: Arc<dyn BlobStore>,
    pub catalog_store: Arc<dyn CatalogStore>,
    pub storage: Arc<StorageConfig>,
}

/// Upload response
#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub message: String,
    /// Declared MIME type of the uploaded file
    pub content_type: String,
    /// Locator issued by the blob store
    pub blob_uri: String,
}

/// Record insert response
#[derive(Debug, Serialize)]
pub struct InsertResponse {
    pub message: String,
    /// Record as inserted, including its generated id
    pub data: Value,
}

/// Record query response
#[derive(Debug, Serialize)]
pub struct QueryResponse {
    pub message: String,
    pub data: Vec<Value>,
}

/// Query parameters for record lookup
#[derive(Debug, Deserialize)]
pub struct RecordQuery {
    /// Return only the record with this id
    pub id: Option<String>,
}

/// A file received by the upload route
#[derive(Debug)]
struct UploadedAsset {
    filename: String,
    content_type: Option<String>,
    data: Bytes,
}

/// Create the API router
pub fn create_router(state: AppState, config: &ApiConfig) -> Router {
    let cors = if config.cors_enabled {
        if config.cors_origins.is_empty() {
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
        } else {
            let origins: Vec<_> = config
                .cors_origins
                .iter()
                .filter_map(|o| o.parse().ok())
                .collect();
            CorsLayer::new()
                .allow_origin(origins)
                .allow_methods(Any)
                .allow_headers(Any)
        }
    } else {
        CorsLayer::new()
    };

    Router::new()
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .route(
            "/funcPostDataStorage",
            post(upload_media).layer(DefaultBodyLimit::max(config.max_upload_bytes)),
        )
        .route("/funcPostDatabase", post(insert_record))
        .route("/funcGetDatabase", get(query_records))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Health check endpoint
async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "catalog-service"
    }))
}

/// Readiness check endpoint
async fn readiness_check(State(state): State<AppState>) -> impl IntoResponse {
    match state.catalog_store.ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "status": "ready",
                "database": "connected"
            })),
        ),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({
                "status": "not_ready",
                "database": "disconnected",
                "error": e.to_string()
            })),
        ),
    }
}

/// Store an uploaded video or image and return its locator
#[instrument(skip_all)]
async fn upload_media(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<UploadResponse>, ApiError> {
    // Anything that is not a multipart body carries no file either
    let mut multipart = multipart.map_err(|_| ApiError::NoUploadFile)?;

    let asset = match read_file_field(&mut multipart).await? {
        Some(asset) => asset,
        None => {
            metrics::counter!("catalog.uploads.rejected").increment(1);
            return Err(ApiError::NoUploadFile);
        }
    };

    let content_type = asset.content_type.unwrap_or_default();
    let kind = match MediaKind::from_content_type(&content_type) {
        Some(kind) => kind,
        None => {
            metrics::counter!("catalog.uploads.rejected").increment(1);
            return Err(ApiError::UnsupportedMedia);
        }
    };

    let container = kind.container(&state.storage);

    info!(
        filename = %asset.filename,
        content_type = %content_type,
        container = %container,
        size_bytes = asset.data.len(),
        "Processing file to storage"
    );

    let blob_uri = state
        .blob_store
        .put_object(container, &asset.filename, &content_type, asset.data)
        .await?;

    metrics::counter!("catalog.uploads", "kind" => kind.as_str()).increment(1);

    Ok(Json(UploadResponse {
        message: "File Uploaded Successfully".to_string(),
        content_type,
        blob_uri,
    }))
}

/// Pull the first named file out of the form, skipping other fields
async fn read_file_field(multipart: &mut Multipart) -> Result<Option<UploadedAsset>, ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::Upload(e.body_text()))?
    {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let filename = match field.file_name() {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => continue,
        };
        let content_type = field.content_type().map(str::to_string);
        let data = field
            .bytes()
            .await
            .map_err(|e| ApiError::Upload(e.body_text()))?;

        return Ok(Some(UploadedAsset {
            filename,
            content_type,
            data,
        }));
    }

    Ok(None)
}

/// Insert a catalog record under a freshly generated id
#[instrument(skip_all)]
async fn insert_record(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<InsertResponse>, ApiError> {
    let mut record = parse_record(&body)?;
    record.insert("id".to_string(), Value::String(Uuid::new_v4().to_string()));

    debug!(record = ?record, "Item to be inserted");

    state.catalog_store.ensure_collection().await?;
    state.catalog_store.insert(&record).await?;

    metrics::counter!("catalog.records.inserted").increment(1);

    Ok(Json(InsertResponse {
        message: "Item inserted successfully".to_string(),
        data: Value::Object(record),
    }))
}

/// Parse a request body into a JSON object
fn parse_record(body: &[u8]) -> Result<Map<String, Value>, ApiError> {
    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(record)) => Ok(record),
        _ => Err(ApiError::InvalidInput),
    }
}

/// Fetch all records, or the one matching `id`
#[instrument(skip(state))]
async fn query_records(
    State(state): State<AppState>,
    Query(params): Query<RecordQuery>,
) -> Result<Json<QueryResponse>, ApiError> {
    state.catalog_store.resolve().await?;

    let filter = RecordFilter { id: params.id };
    let items = state.catalog_store.query(&filter).await?;

    debug!(count = items.len(), "Items retrieved");
    metrics::counter!("catalog.queries").increment(1);

    Ok(Json(QueryResponse {
        message: "Items retrieved successfully".to_string(),
        data: items,
    }))
}

/// Start the API server and run it until `shutdown` resolves
pub async fn start_api_server(
    state: AppState,
    config: &ApiConfig,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let router = create_router(state, config);
    let addr = format!("{}:{}", config.host, config.port);

    info!(address = %addr, "Starting catalog API server");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
        .context("API server error")?;

    Ok(())
}
