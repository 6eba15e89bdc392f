//! Dio Flix Catalog Service
//!
//! Media upload and catalog record service for the Dio Flix platform.
//! Clients upload videos and thumbnails to object storage, then register a
//! catalog record that points at the stored locators. The viewer lists the
//! catalog through the query endpoint.
//!
//! ## Endpoints
//!
//! - `POST /funcPostDataStorage`: multipart upload, routed by MIME type to
//!   the `videos` or `images` container
//! - `POST /funcPostDatabase`: insert a JSON record under a generated id
//! - `GET /funcGetDatabase`: list records, optionally filtered by `id`
//!
//! ## Architecture
//!
//! ```text
//!  HTTP client                                    S3 Buckets
//! ┌──────────────┐   upload    ┌──────────────┐  ┌──────────────┐
//! │              │────────────▶│ BlobStore    │─▶│ videos/      │
//! │              │             └──────────────┘  │ images/      │
//! │              │                               └──────────────┘
//! │              │   records   ┌──────────────┐  ┌──────────────┐
//! │              │────────────▶│ CatalogStore │─▶│ PostgreSQL   │
//! └──────────────┘             └──────────────┘  │ {db}.{table} │
//!        ▲                            ▲          └──────────────┘
//!        │                            │
//! ┌──────────────┐   query     ┌──────────────┐
//! │ Viewer       │────────────▶│ API router   │
//! └──────────────┘             └──────────────┘
//! ```
//!
//! Blob upload and record insert are independent writes. A failed insert
//! after a successful upload leaves the object in place.

pub mod api;
pub mod blob_store;
pub mod catalog_store;
pub mod config;
pub mod error;
pub mod media;

pub use api::{create_router, start_api_server, AppState};
pub use blob_store::{BlobStore, BlobStoreError, S3BlobStore};
pub use catalog_store::{CatalogStore, PgCatalogStore, RecordFilter, StoreError};
pub use config::Config;
pub use error::ApiError;
pub use media::MediaKind;
