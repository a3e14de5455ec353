//! HTTP-facing errors for the icoproxy server.
//!
//! Every error renders as a plain-text body; callers are image tags and scripts,
//! not API clients.

use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};

use icoproxy_client::SiteError;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Caller input could not become a safe origin.
    #[error(transparent)]
    BadRequest(#[from] SiteError),

    #[error("Unauthorized")]
    Unauthorized,

    /// Same-origin guard rejected the request.
    #[error("Forbidden")]
    Forbidden,

    #[error("Not found")]
    NotFound,

    /// Store failure on a path that must report it.
    #[error("Internal error")]
    Store(#[from] icoproxy_core::Error),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match &self {
            ApiError::Store(e) => tracing::error!(error = %e, "store failure"),
            ApiError::BadRequest(e) => tracing::debug!(error = ?e, "rejected input"),
            _ => {}
        }
        (self.status(), [(header::CONTENT_TYPE, "text/plain; charset=utf-8")], self.to_string()).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(ApiError::from(SiteError::Missing).status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::Unauthorized.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::Forbidden.status(), StatusCode::FORBIDDEN);
        assert_eq!(ApiError::NotFound.status(), StatusCode::NOT_FOUND);
        let store = icoproxy_core::Error::MigrationFailed("boom".into());
        assert_eq!(ApiError::from(store).status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_bodies_are_plain_messages() {
        assert_eq!(ApiError::from(SiteError::Missing).to_string(), "Missing url");
        assert_eq!(ApiError::from(SiteError::UnsupportedScheme("ftp".into())).to_string(), "Invalid protocol");
        assert_eq!(ApiError::NotFound.to_string(), "Not found");
    }
}
