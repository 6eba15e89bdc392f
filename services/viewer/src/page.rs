use crate::client::{CatalogClient, VideoRecord};
use anyhow::{Context, Result};
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::get,
    Json, Router,
};
use minijinja::{context, Environment};
use serde::Deserialize;
use std::future::Future;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{error, info, instrument};

const INDEX_TEMPLATE: &str = "index.html";

// `.html` templates are auto-escaped by minijinja
const INDEX_SOURCE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <title>Dio Flix</title>
  <style>
    body { font-family: sans-serif; max-width: 960px; margin: 0 auto; padding: 1rem; }
    .card { display: flex; gap: 1rem; margin-bottom: 1.5rem; }
    .card .thumb { flex: 1; }
    .card .thumb img { width: 100%; }
    .card .details { flex: 3; }
    .card video { width: 100%; }
  </style>
</head>
<body>
  <h1>Dio Flix</h1>
{%- if videos %}
{%- for video in videos %}
  <div class="card" id="card-{{ video.id }}">
    <div class="thumb"><img src="{{ video.thumb }}" alt="{{ video.title }}"></div>
    <div class="details">
      <h3>{{ video.title }}</h3>
      <form method="get" action="/">
        <input type="hidden" name="play" value="{{ video.id }}">
        <button type="submit">Play Video</button>
      </form>
{%- if video.id == playing %}
      <video src="{{ video.video }}" controls preload="none"></video>
{%- endif %}
    </div>
  </div>
{%- endfor %}
{%- else %}
  <p>No videos available.</p>
{%- endif %}
</body>
</html>
"#;

/// Renders the catalog page
pub struct CatalogPage {
    env: Environment<'static>,
}

impl CatalogPage {
    pub fn new() -> Result<Self> {
        let mut env = Environment::new();
        env.add_template(INDEX_TEMPLATE, INDEX_SOURCE)
            .context("Failed to compile catalog template")?;
        Ok(Self { env })
    }

    /// Render one card per video; `playing` expands the matching card's player
    pub fn render(
        &self,
        videos: &[VideoRecord],
        playing: Option<&str>,
    ) -> Result<String, minijinja::Error> {
        self.env
            .get_template(INDEX_TEMPLATE)?
            .render(context! { videos => videos, playing => playing })
    }
}

/// State shared by the viewer routes
#[derive(Clone)]
pub struct ViewerState {
    pub client: Arc<CatalogClient>,
    pub page: Arc<CatalogPage>,
}

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    /// Id of the video whose player is open
    pub play: Option<String>,
}

pub fn create_router(state: ViewerState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/health", get(health_check))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "catalog-viewer"
    }))
}

/// Fetch the catalog and render it; the page waits for the fetch
#[instrument(skip(state))]
async fn index(State(state): State<ViewerState>, Query(params): Query<PageQuery>) -> Response {
    let videos = state.client.fetch_videos().await;

    match state.page.render(&videos, params.play.as_deref()) {
        Ok(html) => Html(html).into_response(),
        Err(e) => {
            error!(error = %e, "Failed to render catalog page");
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to render page").into_response()
        }
    }
}

/// Start the viewer and run it until `shutdown` resolves
pub async fn start_server(
    state: ViewerState,
    addr: &str,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    info!(address = %addr, catalog_url = %state.client.url(), "Starting catalog viewer");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(shutdown)
        .await
        .context("Viewer server error")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use tower::ServiceExt;

    fn video(id: &str, title: &str) -> VideoRecord {
        VideoRecord {
            id: id.to_string(),
            title: title.to_string(),
            thumb: format!("http://localhost:9000/images/{id}.jpg"),
            video: format!("http://localhost:9000/videos/{id}.mp4"),
        }
    }

    #[test]
    fn test_empty_catalog_message() {
        let page = CatalogPage::new().unwrap();
        let html = page.render(&[], None).unwrap();

        assert!(html.contains("<h1>Dio Flix</h1>"));
        assert!(html.contains("No videos available."));
        assert!(!html.contains("Play Video"));
    }

    #[test]
    fn test_one_card_per_video() {
        let page = CatalogPage::new().unwrap();
        let html = page
            .render(&[video("a", "Matrix"), video("b", "Alien")], None)
            .unwrap();

        assert_eq!(html.matches("class=\"card\"").count(), 2);
        assert_eq!(html.matches("Play Video").count(), 2);
        assert!(html.contains("id=\"card-a\""));
        assert!(html.contains("<h3>Alien</h3>"));
        // minijinja escapes '/' inside attributes, so match on the file name
        assert!(html.contains("a.jpg"));
        assert!(!html.contains("<video"));
        assert!(!html.contains("No videos available."));
    }

    #[test]
    fn test_play_expands_only_selected_card() {
        let page = CatalogPage::new().unwrap();
        let html = page
            .render(&[video("a", "Matrix"), video("b", "Alien")], Some("b"))
            .unwrap();

        assert_eq!(html.matches("<video").count(), 1);
        assert!(html.contains("b.mp4"));
        assert!(!html.contains("a.mp4"));
        assert!(html.contains("preload=\"none\""));
        // Playback starts from the controls, nothing is fetched on render
        assert!(!html.contains("autoplay"));
    }

    #[test]
    fn test_record_text_is_escaped() {
        let page = CatalogPage::new().unwrap();
        let html = page
            .render(&[video("x", "<script>alert(1)</script>")], None)
            .unwrap();

        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;"));
    }

    #[tokio::test]
    async fn test_index_without_catalog_renders_empty_state() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let state = ViewerState {
            client: Arc::new(CatalogClient::new(format!("http://{addr}/funcGetDatabase")).unwrap()),
            page: Arc::new(CatalogPage::new().unwrap()),
        };

        let response = create_router(state)
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let html = String::from_utf8(body.to_vec()).unwrap();
        assert!(html.contains("No videos available."));
    }
}
