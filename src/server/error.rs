//! HTTP error responses
//!
//! Every error leaves the server as JSON `{ "error": CODE, "message": ... }`
//! with a matching status code.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::data::{IndicatorLookupError, RegionError, UpstreamError};
use crate::resolver::{DataError, ResolveError};

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    UnknownIndicator(String),

    #[error("{0}")]
    AmbiguousIndicator(String),

    #[error("{0}")]
    InvalidInput(String),

    #[error("{0}")]
    UpstreamUnavailable(String),
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::UnknownIndicator(_) => StatusCode::NOT_FOUND,
            ApiError::AmbiguousIndicator(_) | ApiError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            ApiError::UpstreamUnavailable(_) => StatusCode::BAD_GATEWAY,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            ApiError::UnknownIndicator(_) => "UNKNOWN_INDICATOR",
            ApiError::AmbiguousIndicator(_) => "AMBIGUOUS_INDICATOR",
            ApiError::InvalidInput(_) => "INVALID_INPUT",
            ApiError::UpstreamUnavailable(_) => "UPSTREAM_UNAVAILABLE",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.code(),
            message: self.to_string(),
        };
        (self.status(), Json(body)).into_response()
    }
}

impl From<IndicatorLookupError> for ApiError {
    fn from(err: IndicatorLookupError) -> Self {
        match err {
            IndicatorLookupError::Unknown(_) => ApiError::UnknownIndicator(err.to_string()),
            IndicatorLookupError::Ambiguous { .. } => ApiError::AmbiguousIndicator(err.to_string()),
        }
    }
}

impl From<RegionError> for ApiError {
    fn from(err: RegionError) -> Self {
        ApiError::InvalidInput(err.to_string())
    }
}

impl From<UpstreamError> for ApiError {
    fn from(err: UpstreamError) -> Self {
        ApiError::UpstreamUnavailable(err.to_string())
    }
}

impl From<ResolveError> for ApiError {
    fn from(err: ResolveError) -> Self {
        match err {
            ResolveError::Indicator(e) => e.into(),
            ResolveError::Region(e) => e.into(),
        }
    }
}

impl From<DataError> for ApiError {
    fn from(err: DataError) -> Self {
        match err {
            DataError::Region(e) => e.into(),
            DataError::Upstream(e) => e.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(ApiError::UnknownIndicator("x".into()).status(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::InvalidInput("x".into()).status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ApiError::from(UpstreamError::Status(500)).status(),
            StatusCode::BAD_GATEWAY
        );
    }

    #[test]
    fn test_ambiguous_lookup_is_bad_request() {
        let err = ApiError::from(IndicatorLookupError::Ambiguous {
            key: "kayntimaara".into(),
            candidates: "a.kayntimaara, b.kayntimaara".into(),
        });
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert!(err.to_string().contains("kayntimaara"));
    }
}
