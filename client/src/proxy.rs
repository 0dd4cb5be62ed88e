//! Network Cache Proxy.
//!
//! Same-origin asset requests are answered from a named [`ResponseCache`],
//! falling back to the origin and keeping a copy of successful responses.
//! [`router`] puts the proxy behind an axum server.

use crate::error::{Result, SyncError};
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, HeaderValue, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Router;
use dashmap::DashMap;
use futures::future::try_join_all;
use reqwest::{Client, Url};
use std::sync::Arc;

/// Assets fetched at install time.
pub const DEFAULT_MANIFEST: &[&str] = &[
    "/",
    "/index.html",
    "/manifest.json",
    "/js/common-min.js",
    "/js/main-min.js",
    "/js/restaurant_info-min.js",
];

/// Path the root path is served from.
pub const ROOT_DOCUMENT: &str = "/index.html";

/// A stored response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Bytes,
}

impl CachedResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

impl IntoResponse for CachedResponse {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::BAD_GATEWAY);
        let mut response = (status, self.body).into_response();
        if let Some(value) = self
            .content_type
            .as_deref()
            .and_then(|ct| HeaderValue::from_str(ct).ok())
        {
            response.headers_mut().insert(header::CONTENT_TYPE, value);
        }
        response
    }
}

/// Named response cache, keyed by path and query.
#[derive(Debug)]
pub struct ResponseCache {
    name: String,
    entries: DashMap<String, CachedResponse>,
}

impl ResponseCache {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: DashMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn get(&self, key: &str) -> Option<CachedResponse> {
        self.entries.get(key).map(|entry| entry.value().clone())
    }

    pub fn put(&self, key: impl Into<String>, response: CachedResponse) {
        self.entries.insert(key.into(), response);
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Stored keys, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<_> = self.entries.iter().map(|e| e.key().clone()).collect();
        keys.sort();
        keys
    }
}

/// How a request is handled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// Different origin; not intercepted
    PassThrough,
    /// Served through the cache under this key
    Cache(String),
}

/// Where a response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Cache,
    Network,
}

/// Result of intercepting a request.
#[derive(Debug, Clone, PartialEq)]
pub enum Intercept {
    PassThrough,
    Respond {
        response: CachedResponse,
        source: Source,
    },
}

#[derive(Debug)]
pub struct CacheProxy {
    origin: Url,
    cache: ResponseCache,
    client: Client,
}

impl CacheProxy {
    pub fn new(origin: Url, cache_name: impl Into<String>) -> Self {
        Self::with_client(Client::new(), origin, cache_name)
    }

    pub fn with_client(client: Client, origin: Url, cache_name: impl Into<String>) -> Self {
        Self {
            origin,
            cache: ResponseCache::new(cache_name),
            client,
        }
    }

    pub fn origin(&self) -> &Url {
        &self.origin
    }

    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    /// Decide how a request URL is handled.
    pub fn route(&self, url: &Url) -> Route {
        if url.origin() != self.origin.origin() {
            return Route::PassThrough;
        }

        let path = match url.path() {
            "/" => ROOT_DOCUMENT,
            other => other,
        };
        match url.query() {
            Some(query) => Route::Cache(format!("{path}?{query}")),
            None => Route::Cache(path.to_string()),
        }
    }

    /// Pre-populate the cache with every manifest path.
    ///
    /// Nothing is stored unless every asset is fetched with a 2xx status.
    pub async fn install(&self, manifest: &[&str]) -> Result<usize> {
        let fetches = manifest.iter().map(|path| async move {
            let response = self.fetch(path).await?;
            if !response.is_success() {
                return Err(SyncError::Status {
                    status: StatusCode::from_u16(response.status)
                        .unwrap_or(StatusCode::BAD_GATEWAY),
                    url: path.to_string(),
                });
            }
            Ok::<_, SyncError>((path.to_string(), response))
        });

        let fetched = match try_join_all(fetches).await {
            Ok(fetched) => fetched,
            Err(e) => {
                tracing::error!(cache = self.cache.name(), "Cache install failed: {}", e);
                return Err(e);
            }
        };

        let count = fetched.len();
        for (path, response) in fetched {
            self.cache.put(path, response);
        }
        tracing::info!(cache = self.cache.name(), count, "Cache installed");
        Ok(count)
    }

    /// Answer a request from the cache, falling back to the origin.
    pub async fn respond(&self, url: &Url) -> Result<Intercept> {
        let key = match self.route(url) {
            Route::PassThrough => return Ok(Intercept::PassThrough),
            Route::Cache(key) => key,
        };

        if let Some(response) = self.cache.get(&key) {
            tracing::debug!(%key, "Cache hit");
            return Ok(Intercept::Respond {
                response,
                source: Source::Cache,
            });
        }

        tracing::debug!(%key, "Cache miss");
        let response = self.fetch(&key).await?;
        if response.is_success() {
            self.cache.put(key, response.clone());
        }
        Ok(Intercept::Respond {
            response,
            source: Source::Network,
        })
    }

    async fn fetch(&self, path_and_query: &str) -> Result<CachedResponse> {
        let url = self
            .origin
            .join(path_and_query)
            .map_err(|e| SyncError::Parse(format!("{path_and_query}: {e}")))?;

        let response = self.client.get(url).send().await?;
        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.bytes().await?;

        Ok(CachedResponse {
            status,
            content_type,
            body,
        })
    }
}

/// Router that serves every request through the proxy.
pub fn router(proxy: Arc<CacheProxy>) -> Router {
    Router::new().fallback(serve).with_state(proxy)
}

async fn serve(State(proxy): State<Arc<CacheProxy>>, method: Method, uri: Uri) -> Response {
    if method != Method::GET {
        return StatusCode::METHOD_NOT_ALLOWED.into_response();
    }

    let path_and_query = uri.path_and_query().map(|p| p.as_str()).unwrap_or("/");
    let url = match proxy.origin().join(path_and_query) {
        Ok(url) => url,
        Err(_) => return StatusCode::BAD_REQUEST.into_response(),
    };

    match proxy.respond(&url).await {
        Ok(Intercept::Respond { response, .. }) => response.into_response(),
        Ok(Intercept::PassThrough) => StatusCode::MISDIRECTED_REQUEST.into_response(),
        Err(e) => {
            tracing::warn!(%url, "Proxy fetch failed: {}", e);
            (StatusCode::BAD_GATEWAY, e.to_string()).into_response()
        }
    }
}
