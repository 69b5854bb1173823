//! Mapping of pipeline errors onto HTTP responses.

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use pipeline::{PipelineError, RetryPolicy};
use serde_json::json;
use thiserror::Error;

/// Non-standard "client closed request" status.
const CLIENT_CLOSED_REQUEST: u16 = 499;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    /// The body, path or query could not be decoded.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// The submission task panicked or was aborted.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl ApiError {
    fn status_and_kind(&self) -> (StatusCode, &'static str) {
        match self {
            Self::Pipeline(err) => match err {
                PipelineError::NoAgentForType { .. } => {
                    (StatusCode::UNPROCESSABLE_ENTITY, "no_agent_for_type")
                }
                PipelineError::GenerationFailed { cause, .. }
                | PipelineError::ReviewFailed { cause, .. } => {
                    if cause.is_timeout() {
                        (StatusCode::GATEWAY_TIMEOUT, "stage_timeout")
                    } else {
                        (StatusCode::BAD_GATEWAY, "stage_failed")
                    }
                }
                PipelineError::Cancelled { .. } => (
                    StatusCode::from_u16(CLIENT_CLOSED_REQUEST)
                        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
                    "cancelled",
                ),
                PipelineError::NotFound { .. } => (StatusCode::NOT_FOUND, "not_found"),
                PipelineError::InvalidTemplate(_) | PipelineError::InvalidRequest { .. } => {
                    (StatusCode::BAD_REQUEST, "invalid_request")
                }
                PipelineError::PersistenceError(_) => {
                    (StatusCode::INTERNAL_SERVER_ERROR, "persistence_error")
                }
                PipelineError::ConfigurationError { .. } | PipelineError::IllegalTransition(_) => {
                    (StatusCode::INTERNAL_SERVER_ERROR, "internal_error")
                }
            },
            Self::BadRequest(_) => (StatusCode::BAD_REQUEST, "invalid_request"),
            Self::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, kind) = self.status_and_kind();
        if status.is_server_error() {
            tracing::error!(error = %self, status = status.as_u16(), "request failed");
        } else {
            tracing::debug!(error = %self, status = status.as_u16(), "request rejected");
        }

        let mut body = json!({
            "error": {
                "message": self.to_string(),
                "type": kind,
            }
        });
        if let Self::Pipeline(err) = &self {
            if let Some(id) = err.petition_id() {
                body["petition_id"] = json!(id);
            }
            body["retryable"] = json!(matches!(err.retry_policy(), RetryPolicy::Retryable { .. }));
        }
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use pipeline::{GatewayError, PetitionId, ReviewStage, StageFailure};

    use super::*;

    fn status(err: PipelineError) -> u16 {
        ApiError::from(err).status_and_kind().0.as_u16()
    }

    #[test]
    fn stage_failures_are_gateway_errors() {
        let petition_id = PetitionId::new_random();
        assert_eq!(
            status(PipelineError::ReviewFailed {
                petition_id,
                stage: ReviewStage::Legal,
                cause: StageFailure::EmptyOutput,
            }),
            502
        );
        assert_eq!(
            status(PipelineError::GenerationFailed {
                petition_id,
                cause: StageFailure::Gateway(GatewayError::Timeout {
                    after: Duration::from_secs(120),
                }),
            }),
            504
        );
    }

    #[test]
    fn cancellation_uses_client_closed_request() {
        assert_eq!(
            status(PipelineError::Cancelled {
                petition_id: PetitionId::new_random()
            }),
            499
        );
    }

    #[test]
    fn input_problems_are_bad_requests() {
        assert_eq!(
            status(PipelineError::InvalidRequest {
                message: "x".into()
            }),
            400
        );
        assert_eq!(
            ApiError::BadRequest("x".into()).status_and_kind().0,
            StatusCode::BAD_REQUEST
        );
    }
}
