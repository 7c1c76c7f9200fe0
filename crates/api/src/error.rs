use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use query::{RagError, Stage};
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Rag(#[from] RagError),

    #[error("query timed out after {0:?}")]
    Timeout(Duration),

    #[error("{0:#}")]
    Internal(anyhow::Error),
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    stage: Option<Stage>,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Rag(RagError::InvalidRequest(_)) => StatusCode::BAD_REQUEST,
            ApiError::Rag(RagError::RetrievalUnavailable { .. }) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Rag(RagError::GenerationFailed(_)) => StatusCode::BAD_GATEWAY,
            ApiError::Rag(RagError::MalformedContext { .. }) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn stage(&self) -> Option<Stage> {
        match self {
            ApiError::Rag(err) => Some(err.stage()),
            _ => None,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(status = %status, error = %self, "Request failed");
        } else {
            tracing::warn!(status = %status, error = %self, "Request rejected");
        }

        let body = ErrorBody {
            error: self.to_string(),
            stage: self.stage(),
        };
        (status, Json(body)).into_response()
    }
}
