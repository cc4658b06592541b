use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use hypeup_core::{ErrorCode, HypeError};
use tracing::error;

use super::dto::ErrorBody;

/// HTTP 层错误，包装领域错误并映射状态码
#[derive(Debug)]
pub struct ApiError(pub HypeError);

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self.0.code() {
            ErrorCode::InvalidArgument => StatusCode::BAD_REQUEST,
            ErrorCode::NotFound => StatusCode::NOT_FOUND,
            ErrorCode::Unauthorized => StatusCode::FORBIDDEN,
            ErrorCode::Conflict => StatusCode::CONFLICT,
            ErrorCode::StoreUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<HypeError> for ApiError {
    fn from(err: HypeError) -> Self {
        ApiError(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError(HypeError::invalid_argument(rejection.body_text()))
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError(HypeError::invalid_argument(rejection.body_text()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.0.code();
        // 内部错误与存储错误不向调用方暴露细节
        let message = match &self.0 {
            HypeError::InvalidArgument(msg)
            | HypeError::NotFound(msg)
            | HypeError::Unauthorized(msg)
            | HypeError::Conflict(msg) => msg.clone(),
            HypeError::StoreUnavailable { operation, .. } => {
                error!(error = %self.0, operation = %operation, "Store unavailable");
                "Service temporarily unavailable".to_string()
            }
            HypeError::Internal(err) => {
                error!(error = ?err, "Internal error");
                "Internal server error".to_string()
            }
        };

        (
            status,
            Json(ErrorBody {
                code,
                error: message,
            }),
        )
            .into_response()
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;
