use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        FromRequest, FromRequestParts,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use shared::error::{ApiError, ErrorCode};

/// `Json` extractor whose rejections are `ApiError` bodies.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(RejectedRequest))]
pub(crate) struct ApiJson<T>(pub(crate) T);

/// `Path` extractor whose rejections are `ApiError` bodies.
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(RejectedRequest))]
pub(crate) struct ApiPath<T>(pub(crate) T);

/// Keeps axum's status for a malformed request but reports it as a
/// `validation` error.
#[derive(Debug)]
pub(crate) struct RejectedRequest {
    status: StatusCode,
    message: String,
}

impl From<JsonRejection> for RejectedRequest {
    fn from(rejection: JsonRejection) -> Self {
        Self {
            status: rejection.status(),
            message: rejection.body_text(),
        }
    }
}

impl From<PathRejection> for RejectedRequest {
    fn from(rejection: PathRejection) -> Self {
        Self {
            status: rejection.status(),
            message: rejection.body_text(),
        }
    }
}

impl IntoResponse for RejectedRequest {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ApiError::new(ErrorCode::Validation, self.message)),
        )
            .into_response()
    }
}
