//! HTTP API for the feed editor.
//!
//! | Route                  | Body                              | Response              |
//! |------------------------|-----------------------------------|-----------------------|
//! | `POST /api/load_feed`  | multipart `file`, or JSON `{url}` | feed record           |
//! | `POST /api/render_feed`| feed edit JSON                    | `{feed, xml}`         |
//! | `POST /api/upload_feed`| `{xml}`                           | `{url}`               |
//! | `GET /healthz`         |                                   | `ok`                  |
//!
//! Failures are reported as `{"error": message}`.
use std::sync::Arc;

use anyhow::Context;
use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, FromRequest, Multipart, Request, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::net::TcpListener;

use crate::config::Config;
use crate::feed::{
    build_client, normalize, serialize, FeedEdit, FetchError, Fetcher, ParseError, PodcastFeed,
    SerializeError,
};
use crate::publish::{PublishError, Publisher, S3Publisher};
use crate::util::sanitize_filename;

/// Headroom above `max_feed_bytes` for multipart framing and JSON escaping.
const BODY_OVERHEAD: usize = 64 * 1024;

const NO_URL: &str = "No feed URL provided";
const INVALID_FILE: &str = "Invalid file";
const NO_XML: &str = "No XML provided";

/// Shared, read-only handler state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub fetcher: Fetcher,
    pub publisher: Arc<dyn Publisher>,
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Publish(#[from] PublishError),
    #[error(transparent)]
    Serialize(#[from] SerializeError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            // The client sent a value that cannot be written as XML.
            ApiError::Serialize(SerializeError::InvalidChar { .. }) => StatusCode::BAD_REQUEST,
            ApiError::Serialize(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        } else {
            tracing::warn!(error = %self, status = status.as_u16(), "Request rejected");
        }
        (
            status,
            Json(ErrorBody {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}

#[derive(Deserialize)]
struct LoadRequest {
    url: Option<String>,
}

#[derive(Deserialize)]
struct UploadRequest {
    xml: Option<String>,
}

#[derive(Serialize)]
struct RenderResponse {
    feed: PodcastFeed,
    xml: String,
}

#[derive(Serialize)]
struct UploadResponse {
    url: String,
}

pub fn router(state: AppState) -> Router {
    let body_limit = state.config.max_feed_bytes.saturating_add(BODY_OVERHEAD);

    Router::new()
        .route("/healthz", get(healthz))
        .route("/api/load_feed", post(load_feed))
        .route("/api/render_feed", post(render_feed))
        .route("/api/upload_feed", post(upload_feed))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

/// Runs the API server until Ctrl-C.
pub async fn serve(config: Config) -> anyhow::Result<()> {
    let client = build_client(config.allow_private_hosts)
        .context("Failed to build HTTP client")?;
    let fetcher = Fetcher::new(client, &config);
    let publisher = S3Publisher::from_config(&config.s3).await;
    let addr = config.bind_addr();

    let state = AppState {
        config: Arc::new(config),
        fetcher,
        publisher: Arc::new(publisher),
    };

    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {addr}"))?;
    tracing::info!(addr = %addr, "Server running");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}

async fn healthz() -> &'static str {
    "ok"
}

async fn load_feed(
    State(state): State<AppState>,
    request: Request,
) -> Result<Json<PodcastFeed>, ApiError> {
    let content = if is_multipart(&request) {
        let multipart = Multipart::from_request(request, &state)
            .await
            .map_err(|e| ApiError::BadRequest(e.body_text()))?;
        read_upload(multipart)
            .await?
            .ok_or_else(|| ApiError::BadRequest(NO_URL.to_string()))?
    } else {
        let body = Bytes::from_request(request, &state)
            .await
            .map_err(|e| ApiError::BadRequest(e.body_text()))?;
        let url = serde_json::from_slice::<LoadRequest>(&body)
            .ok()
            .and_then(|r| r.url)
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| ApiError::BadRequest(NO_URL.to_string()))?;

        tracing::info!(url = %url, "Loading feed from URL");
        state.fetcher.fetch(url.trim()).await?
    };

    let feed = normalize(&content)?;
    tracing::info!(
        title = %feed.title,
        episodes = feed.episodes.len(),
        "Loaded feed"
    );
    Ok(Json(feed))
}

fn is_multipart(request: &Request) -> bool {
    request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("multipart/form-data"))
}

/// Returns the contents of the first `file` part that carries a file name.
async fn read_upload(mut multipart: Multipart) -> Result<Option<Vec<u8>>, ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(e.body_text()))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let filename = match field.file_name() {
            Some(name) if !name.is_empty() => sanitize_filename(name),
            _ => continue,
        };

        let data = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(e.body_text()))?;

        if filename.is_empty() {
            return Err(ApiError::BadRequest(INVALID_FILE.to_string()));
        }

        tracing::info!(filename = %filename, bytes = data.len(), "Received feed upload");
        return Ok(Some(data.to_vec()));
    }
    Ok(None)
}

async fn render_feed(body: Bytes) -> Result<Json<RenderResponse>, ApiError> {
    let edit: FeedEdit = serde_json::from_slice(&body)
        .map_err(|e| ApiError::BadRequest(format!("Invalid feed JSON: {e}")))?;

    let feed = edit.into_feed();
    let xml = serialize(&feed)?;
    tracing::debug!(episodes = feed.episodes.len(), bytes = xml.len(), "Rendered feed");

    Ok(Json(RenderResponse { feed, xml }))
}

async fn upload_feed(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<UploadResponse>, ApiError> {
    let xml = serde_json::from_slice::<UploadRequest>(&body)
        .ok()
        .and_then(|r| r.xml)
        .filter(|xml| !xml.is_empty())
        .ok_or_else(|| ApiError::BadRequest(NO_XML.to_string()))?;

    let url = state.publisher.publish(xml).await?;
    Ok(Json(UploadResponse { url }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_statuses() {
        assert_eq!(
            ApiError::BadRequest(NO_URL.to_string()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(ParseError::Empty).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(FetchError::HttpStatus(404)).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(PublishError::MissingBucket).status(),
            StatusCode::BAD_REQUEST
        );
        let io = std::io::Error::new(std::io::ErrorKind::Other, "sink closed");
        assert_eq!(
            ApiError::from(SerializeError::from(io)).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        let invalid = SerializeError::InvalidChar {
            field: "title".to_string(),
            code: 1,
        };
        assert_eq!(ApiError::from(invalid).status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_error_messages_pass_through() {
        assert_eq!(
            ApiError::from(PublishError::MissingBucket).to_string(),
            "S3_BUCKET_NAME environment variable is required to upload the feed"
        );
        assert_eq!(
            ApiError::BadRequest(NO_XML.to_string()).to_string(),
            "No XML provided"
        );
    }
}
