use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, instrument, warn};

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("catalog responded with {0}")]
    Status(StatusCode),
}

/// The part of a catalog record the viewer renders
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoRecord {
    pub id: String,
    pub title: String,
    /// Thumbnail locator
    pub thumb: String,
    /// Video locator
    pub video: String,
}

#[derive(Debug, Deserialize)]
struct CatalogResponse {
    #[serde(default)]
    data: Vec<Value>,
}

/// Reads the catalog from the query endpoint
pub struct CatalogClient {
    http: reqwest::Client,
    url: String,
}

impl CatalogClient {
    pub fn new(url: impl Into<String>) -> Result<Self, FetchError> {
        Ok(Self {
            http: reqwest::Client::builder().build()?,
            url: url.into(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Fetch every record, failing on transport errors or non-2xx answers
    #[instrument(skip(self), fields(url = %self.url))]
    pub async fn fetch_records(&self) -> Result<Vec<VideoRecord>, FetchError> {
        let response = self.http.get(&self.url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status));
        }

        let body: CatalogResponse = response.json().await?;

        let videos: Vec<VideoRecord> = body
            .data
            .into_iter()
            .filter_map(|record| match serde_json::from_value(record) {
                Ok(video) => Some(video),
                Err(e) => {
                    warn!(error = %e, "Skipping catalog record that cannot be displayed");
                    None
                }
            })
            .collect();

        debug!(count = videos.len(), "Catalog fetched");

        Ok(videos)
    }

    /// Fetch the catalog, degrading to an empty list on any failure
    pub async fn fetch_videos(&self) -> Vec<VideoRecord> {
        match self.fetch_records().await {
            Ok(videos) => videos,
            Err(e) => {
                warn!(error = %e, url = %self.url, "Error fetching videos");
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode as AxumStatus;
    use axum::{routing::get, Json, Router};
    use serde_json::json;

    /// Serve `router` on an ephemeral port and return its base URL
    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn test_fetch_records() {
        let router = Router::new().route(
            "/funcGetDatabase",
            get(|| async {
                Json(json!({
                    "message": "Items retrieved successfully",
                    "data": [
                        {"id": "a", "title": "Matrix", "year": 1999, "thumb": "t.jpg", "video": "v.mp4", "partitionKey": "p1", "_ts": 1},
                        {"id": "b", "title": "Alien", "thumb": "a.jpg", "video": "a.mp4"}
                    ]
                }))
            }),
        );
        let base = serve(router).await;

        let client = CatalogClient::new(format!("{base}/funcGetDatabase")).unwrap();
        let videos = client.fetch_records().await.unwrap();

        assert_eq!(videos.len(), 2);
        assert_eq!(
            videos[0],
            VideoRecord {
                id: "a".to_string(),
                title: "Matrix".to_string(),
                thumb: "t.jpg".to_string(),
                video: "v.mp4".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn test_fetch_skips_incomplete_records() {
        let router = Router::new().route(
            "/funcGetDatabase",
            get(|| async {
                Json(json!({
                    "data": [
                        {"id": "a", "title": "Matrix"},
                        {"id": "b", "title": "Alien", "thumb": "a.jpg", "video": "a.mp4"}
                    ]
                }))
            }),
        );
        let base = serve(router).await;

        let client = CatalogClient::new(format!("{base}/funcGetDatabase")).unwrap();
        let videos = client.fetch_videos().await;

        assert_eq!(videos.len(), 1);
        assert_eq!(videos[0].id, "b");
    }

    #[tokio::test]
    async fn test_error_status_degrades_to_empty() {
        let router = Router::new().route(
            "/funcGetDatabase",
            get(|| async { (AxumStatus::NOT_FOUND, Json(json!({"error": "Database not found"}))) }),
        );
        let base = serve(router).await;

        let client = CatalogClient::new(format!("{base}/funcGetDatabase")).unwrap();

        assert!(matches!(
            client.fetch_records().await,
            Err(FetchError::Status(StatusCode::NOT_FOUND))
        ));
        assert!(client.fetch_videos().await.is_empty());
    }

    #[tokio::test]
    async fn test_unreachable_catalog_degrades_to_empty() {
        // Bind and release a port so nothing is listening on it
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = CatalogClient::new(format!("http://{addr}/funcGetDatabase")).unwrap();

        assert!(matches!(
            client.fetch_records().await,
            Err(FetchError::Request(_))
        ));
        assert!(client.fetch_videos().await.is_empty());
    }
}
