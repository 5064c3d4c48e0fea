// ABOUTME: Serves the playground UI for every request the API routes do not match.
// ABOUTME: Either static files from a built UI directory, or a reverse proxy to a local dev server.

use std::path::PathBuf;
use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::body::Body;
use axum::extract::Request;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde_json::json;
use tower_http::services::ServeDir;

/// How unmatched requests are answered.
#[derive(Clone)]
pub enum Frontend {
    /// Serve files from a directory, with `index.html` for directory paths.
    Static(PathBuf),
    DevProxy(Arc<DevProxy>),
}

impl Frontend {
    pub fn static_dir(dir: impl Into<PathBuf>) -> Self {
        Self::Static(dir.into())
    }

    pub fn dev_proxy(base_url: impl Into<String>) -> Self {
        Self::DevProxy(Arc::new(DevProxy::new(base_url)))
    }

    /// Install this frontend as the router's fallback.
    pub fn attach(self, router: Router) -> Router {
        match self {
            Self::Static(dir) => {
                if !dir.is_dir() {
                    tracing::warn!(dir = %dir.display(), "static UI directory does not exist");
                }
                router.fallback_service(ServeDir::new(dir).append_index_html_on_directories(true))
            }
            Self::DevProxy(proxy) => {
                tracing::info!(upstream = %proxy.base_url, "proxying UI requests to dev server");
                router.fallback(move |req: Request| {
                    let proxy = Arc::clone(&proxy);
                    async move { proxy.forward(req).await }
                })
            }
        }
    }
}

/// Largest request body the dev proxy buffers before forwarding.
pub const DEFAULT_PROXY_BODY_LIMIT: usize = 16 * 1024 * 1024;

/// Forwards requests to a UI dev server, preserving method, path, query, headers
/// (minus `host`) and body.
pub struct DevProxy {
    client: reqwest::Client,
    base_url: String,
    body_limit: usize,
}

impl DevProxy {
    pub fn new(base_url: impl Into<String>) -> Self {
        // The dev server is local; never route it through an environment proxy.
        let client = reqwest::Client::builder()
            .no_proxy()
            .build()
            .unwrap_or_default();
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            body_limit: DEFAULT_PROXY_BODY_LIMIT,
        }
    }

    pub fn with_body_limit(mut self, limit: usize) -> Self {
        self.body_limit = limit;
        self
    }

    pub async fn forward(&self, req: Request) -> Response {
        let (parts, body) = req.into_parts();
        let path = parts
            .uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/");
        let url = format!("{}{}", self.base_url, path);

        let body = match axum::body::to_bytes(body, self.body_limit).await {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    limit = self.body_limit,
                    "rejected request body for dev proxy"
                );
                return error_json(
                    StatusCode::PAYLOAD_TOO_LARGE,
                    format!(
                        "request body exceeds {} bytes or could not be read",
                        self.body_limit
                    ),
                );
            }
        };

        let mut headers = parts.headers;
        headers.remove(header::HOST);

        let upstream = match self
            .client
            .request(parts.method, &url)
            .headers(headers)
            .body(body)
            .send()
            .await
        {
            Ok(resp) => resp,
            Err(e) => {
                tracing::warn!(url = %url, error = %e, "dev server request failed");
                return error_json(
                    StatusCode::BAD_GATEWAY,
                    format!("dev server unavailable: {}", e),
                );
            }
        };

        let status = upstream.status();
        let mut headers = upstream.headers().clone();
        headers.remove(header::TRANSFER_ENCODING);
        headers.remove(header::CONNECTION);

        let bytes = match upstream.bytes().await {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(url = %url, error = %e, "failed to read dev server response");
                return error_json(
                    StatusCode::BAD_GATEWAY,
                    format!("dev server response failed: {}", e),
                );
            }
        };

        let mut response = Response::new(Body::from(bytes));
        *response.status_mut() = status;
        *response.headers_mut() = headers;
        response
    }
}

fn error_json(status: StatusCode, message: String) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}
