use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::inspector::error::{FetchReason, InspectorError};

/// Standard envelope: `{code, message, data}`. `code` mirrors the HTTP status.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub code: u16,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            code: StatusCode::OK.as_u16(),
            message: "success".to_string(),
            error: None,
            data: Some(data),
        }
    }

    pub fn created(data: T) -> Self {
        Self {
            code: StatusCode::CREATED.as_u16(),
            ..Self::ok(data)
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self)).into_response()
    }
}

pub type ApiResult<T> = Result<ApiResponse<T>, InspectorError>;

pub fn status_for(err: &InspectorError) -> StatusCode {
    match err {
        InspectorError::Fetch { reason } => match reason {
            FetchReason::TopicNotFound(_) | FetchReason::PartitionNotFound(_) | FetchReason::GroupNotFound(_) => {
                StatusCode::NOT_FOUND
            }
            FetchReason::OffsetOutOfRange { .. } => StatusCode::BAD_REQUEST,
            FetchReason::Transport(_) => StatusCode::BAD_GATEWAY,
        },
        InspectorError::Subscription { .. } => StatusCode::BAD_GATEWAY,
        InspectorError::InvalidBounds { .. } | InspectorError::PartialReset { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        InspectorError::OutOfRange { .. } | InspectorError::InvalidCommand(_) => StatusCode::BAD_REQUEST,
        InspectorError::InvalidState(_) => StatusCode::CONFLICT,
    }
}

impl IntoResponse for InspectorError {
    fn into_response(self) -> Response {
        let status = status_for(&self);
        if status.is_server_error() {
            tracing::warn!(error = %self, "[Dashboard] Request failed");
        }
        ApiResponse::<()> {
            code: status.as_u16(),
            message: self.to_string(),
            error: Some(self.code()),
            data: None,
        }
        .into_response()
    }
}

pub fn not_found(what: impl Into<String>) -> Response {
    ApiResponse::<()> {
        code: StatusCode::NOT_FOUND.as_u16(),
        message: what.into(),
        error: Some("NOT_FOUND"),
        data: None,
    }
    .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let missing = InspectorError::fetch(FetchReason::TopicNotFound("orders".into()));
        assert_eq!(status_for(&missing), StatusCode::NOT_FOUND);

        let seek = InspectorError::OutOfRange { offset: 600, beginning: 100, end: 500 };
        assert_eq!(status_for(&seek), StatusCode::BAD_REQUEST);

        assert_eq!(status_for(&InspectorError::subscription("broker gone")), StatusCode::BAD_GATEWAY);

        let group = InspectorError::fetch(FetchReason::GroupNotFound("billing".into()));
        assert_eq!(status_for(&group), StatusCode::NOT_FOUND);

        let partial = InspectorError::PartialReset { committed: vec![0], reason: "broker gone".into() };
        assert_eq!(status_for(&partial), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_envelope_shape() {
        let body = serde_json::to_value(ApiResponse::ok(vec![1, 2])).unwrap();
        assert_eq!(body, serde_json::json!({"code": 200, "message": "success", "data": [1, 2]}));
    }
}
