//! HTTP surface.
//!
//! - `GET /health` liveness
//! - `GET /ico?url=…|domain=…` icon for a site
//! - `POST /refresh?url=…|domain=…` drop cached state for a site (`x-api-key`)
//!
//! Anything else, including a known path with the wrong method, is a 404.

use std::sync::Arc;

use axum::Router;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, Uri, header};
use axum::response::Response;
use axum::routing::{get, post};
use serde::Deserialize;
use tower_http::trace::TraceLayer;
use url::Url;

use icoproxy_client::{SiteError, SiteOrigin};

use crate::error::ApiError;
use crate::handler::{FaviconService, into_http};

/// Shared state for every route.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<FaviconService>,
    /// Maintenance credential; `None` leaves `/refresh` open.
    pub api_key: Option<String>,
    pub require_same_origin: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct SiteParams {
    url: Option<String>,
    domain: Option<String>,
}

/// Resolve the query into a site. A query that does not deserialize (duplicate
/// or malformed keys) is reported as an invalid url, after any access checks.
fn site_from_query(query: Result<Query<SiteParams>, QueryRejection>) -> Result<SiteOrigin, ApiError> {
    let Query(params) = query.map_err(|e| SiteError::InvalidUrl(e.to_string()))?;
    Ok(SiteOrigin::from_params(params.url.as_deref(), params.domain.as_deref())?)
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health).fallback(not_found))
        .route("/ico", get(ico).fallback(not_found))
        .route("/refresh", post(refresh).fallback(not_found))
        .fallback(not_found)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> &'static str {
    "OK"
}

async fn not_found() -> ApiError {
    ApiError::NotFound
}

async fn ico(
    State(state): State<AppState>, uri: Uri, headers: HeaderMap, query: Result<Query<SiteParams>, QueryRejection>,
) -> Result<Response, ApiError> {
    if state.require_same_origin && !is_same_origin(&headers, &uri) {
        return Err(ApiError::Forbidden);
    }

    let site = site_from_query(query)?;
    let cached = state.service.resolve(&site).await;
    Ok(into_http(cached))
}

async fn refresh(
    State(state): State<AppState>, headers: HeaderMap, query: Result<Query<SiteParams>, QueryRejection>,
) -> Result<&'static str, ApiError> {
    if let Some(expected) = state.api_key.as_deref() {
        let provided = headers.get("x-api-key").and_then(|v| v.to_str().ok());
        if provided != Some(expected) {
            return Err(ApiError::Unauthorized);
        }
    }

    let site = site_from_query(query)?;
    state.service.refresh(&site).await?;
    Ok("OK")
}

/// Whether the caller's page is served from the same host as this service.
///
/// Uses `Origin`, or `Referer` when `Origin` is absent, and compares its
/// hostname with the hostname of `Host`. HTTP/2 requests may omit `Host` and
/// carry the authority in the request URI instead.
fn is_same_origin(headers: &HeaderMap, uri: &Uri) -> bool {
    let caller = headers
        .get(header::ORIGIN)
        .or_else(|| headers.get(header::REFERER))
        .and_then(|v| v.to_str().ok())
        .and_then(|v| Url::parse(v).ok())
        .and_then(|u| u.host_str().map(str::to_string));

    let own = headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .and_then(|host| Url::parse(&format!("http://{host}")).ok())
        .and_then(|u| u.host_str().map(str::to_string))
        .or_else(|| uri.host().map(str::to_string));

    matches!((caller, own), (Some(caller), Some(own)) if caller == own)
}
