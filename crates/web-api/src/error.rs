use application::ApplicationError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// 错误响应体。`code` 是稳定的机器可读标识，`error` 是给人看的描述。
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub error: String,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: ErrorBody,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            body: ErrorBody {
                code,
                error: message.into(),
            },
        }
    }
}

impl From<ApplicationError> for ApiError {
    fn from(error: ApplicationError) -> Self {
        use application::ApplicationError as AppErr;
        use domain::DomainError;

        match error {
            AppErr::Domain(DomainError::InvalidArgument { field, reason }) => ApiError::new(
                StatusCode::BAD_REQUEST,
                "INVALID_ARGUMENT",
                format!("{}: {}", field, reason),
            ),
            AppErr::Domain(DomainError::SelfTrade) => ApiError::new(
                StatusCode::CONFLICT,
                "SELF_TRADE",
                "buyer and seller must be different users",
            ),
            AppErr::Domain(DomainError::ChatAlreadyExists) => ApiError::new(
                StatusCode::CONFLICT,
                "CHAT_EXISTS",
                "chat already exists for this buyer and product",
            ),
            AppErr::Domain(DomainError::ChatNotFound) => {
                ApiError::new(StatusCode::NOT_FOUND, "CHAT_NOT_FOUND", "chat not found")
            }
            AppErr::Domain(DomainError::UserNotFound) => {
                ApiError::new(StatusCode::NOT_FOUND, "USER_NOT_FOUND", "user not found")
            }
            AppErr::Domain(DomainError::ListingNotFound) => ApiError::new(
                StatusCode::NOT_FOUND,
                "LISTING_NOT_FOUND",
                "listing not found",
            ),
            AppErr::Domain(DomainError::NotAParticipant) => ApiError::new(
                StatusCode::FORBIDDEN,
                "NOT_A_PARTICIPANT",
                "user is not a participant of this chat",
            ),
            AppErr::Domain(DomainError::RoleMismatch) => ApiError::new(
                StatusCode::FORBIDDEN,
                "ROLE_MISMATCH",
                "sender role does not match the acting user",
            ),
            AppErr::Repository(repo_err) => match repo_err {
                domain::RepositoryError::NotFound => ApiError::new(
                    StatusCode::NOT_FOUND,
                    "NOT_FOUND",
                    "requested resource not found",
                ),
                domain::RepositoryError::Conflict => {
                    ApiError::new(StatusCode::CONFLICT, "CONFLICT", "resource already exists")
                }
                domain::RepositoryError::Unavailable { message } => ApiError::new(
                    StatusCode::SERVICE_UNAVAILABLE,
                    "STORE_UNAVAILABLE",
                    format!("storage unavailable: {}", message),
                ),
                domain::RepositoryError::Storage { message } => ApiError::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "STORAGE",
                    format!("storage failure: {}", message),
                ),
            },
            AppErr::Gateway(gateway_err) => ApiError::new(
                StatusCode::BAD_GATEWAY,
                "GATEWAY_UNAVAILABLE",
                gateway_err.to_string(),
            ),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}
