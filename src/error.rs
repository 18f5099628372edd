use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 服务器错误类型
///
/// 前四种是调用方输入错误，`RefreshNotFound` 表示 refresh token 已被使用、
/// 已过期或从未签发，`Persistence` / `Issuance` 属于基础设施故障。
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServerError {
    /// token 无法解码为签名 token 结构
    #[error("Malformed token: {0}")]
    Malformed(String),
    /// 签名无效或签名算法不被允许
    #[error("Authentication error: {0}")]
    Authentication(String),
    /// refresh token 已过期
    #[error("Refresh token has expired")]
    Expired,
    /// access token 与 refresh token 不是同一次签发
    #[error("Provided tokens weren't issued together")]
    PairingMismatch,
    /// 没有可兑换的 refresh 记录（已使用、已过期或未签发）
    #[error("Refresh token is expired or was used already")]
    RefreshNotFound,
    /// 存储不可用或超时
    #[error("Persistence error: {0}")]
    Persistence(String),
    /// 签名失败
    #[error("Token issuance error: {0}")]
    Issuance(String),
    /// 错误请求
    #[error("Bad request: {0}")]
    BadRequest(String),
    /// 用户未找到
    #[error("User not found: {0}")]
    UserNotFound(String),
    /// 配置错误
    #[error("Configuration error: {0}")]
    Configuration(String),
    /// 内部错误
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ServerError {
    /// 是否属于调用方输入导致的错误（返回 4xx）
    pub fn is_client_fault(&self) -> bool {
        matches!(
            self,
            ServerError::Malformed(_)
                | ServerError::Authentication(_)
                | ServerError::Expired
                | ServerError::PairingMismatch
                | ServerError::RefreshNotFound
                | ServerError::BadRequest(_)
                | ServerError::UserNotFound(_)
        )
    }

    /// HTTP 状态码
    pub fn status_code(&self) -> StatusCode {
        match self {
            ServerError::Malformed(_)
            | ServerError::Authentication(_)
            | ServerError::Expired
            | ServerError::PairingMismatch
            | ServerError::RefreshNotFound
            | ServerError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ServerError::UserNotFound(_) => StatusCode::NOT_FOUND,
            ServerError::Persistence(_)
            | ServerError::Issuance(_)
            | ServerError::Configuration(_)
            | ServerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// 返回给调用方的安全消息，不回显内部细节
    pub fn public_message(&self) -> &'static str {
        match self {
            ServerError::Malformed(_) => "Invalid token format",
            ServerError::Authentication(_) => "Invalid token",
            ServerError::Expired => "Refresh token has expired",
            ServerError::PairingMismatch => "Provided tokens weren't issued together",
            ServerError::RefreshNotFound => "Refresh token is expired or was used already",
            ServerError::BadRequest(_) => "Invalid request",
            ServerError::UserNotFound(_) => "Can't find user with provided GUID",
            ServerError::Persistence(_) => "Can't store token data",
            ServerError::Issuance(_) => "Can't issue tokens",
            ServerError::Configuration(_) | ServerError::Internal(_) => "Internal server error",
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status_code = self.status_code();
        if self.is_client_fault() {
            tracing::debug!("请求被拒绝: {}", self);
        } else {
            tracing::error!("请求处理失败: {}", self);
        }

        let error_response = ErrorResponse::new(&self);
        (status_code, Json(error_response)).into_response()
    }
}

impl From<sqlx::Error> for ServerError {
    fn from(err: sqlx::Error) -> Self {
        ServerError::Persistence(err.to_string())
    }
}

impl From<tokio::time::error::Elapsed> for ServerError {
    fn from(err: tokio::time::error::Elapsed) -> Self {
        ServerError::Persistence(format!("store operation timed out: {}", err))
    }
}

/// 结果类型别名
pub type Result<T> = std::result::Result<T, ServerError>;

/// 错误代码
///
/// JSON 中按变体名序列化（如 `"RefreshNotFound"`），客户端按名称匹配
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    /// token 格式无效
    Malformed = 1001,
    /// 认证失败
    Authentication = 1002,
    /// refresh token 过期
    Expired = 1003,
    /// token 不成对
    PairingMismatch = 1004,
    /// refresh 记录不存在
    RefreshNotFound = 1005,
    /// 错误请求
    BadRequest = 1006,
    /// 用户未找到
    UserNotFound = 1007,
    /// 存储错误
    Persistence = 2000,
    /// 签发错误
    Issuance = 2001,
    /// 配置错误
    Configuration = 2002,
    /// 内部错误
    Internal = 9999,
}

impl From<&ServerError> for ErrorCode {
    fn from(error: &ServerError) -> Self {
        match error {
            ServerError::Malformed(_) => ErrorCode::Malformed,
            ServerError::Authentication(_) => ErrorCode::Authentication,
            ServerError::Expired => ErrorCode::Expired,
            ServerError::PairingMismatch => ErrorCode::PairingMismatch,
            ServerError::RefreshNotFound => ErrorCode::RefreshNotFound,
            ServerError::BadRequest(_) => ErrorCode::BadRequest,
            ServerError::UserNotFound(_) => ErrorCode::UserNotFound,
            ServerError::Persistence(_) => ErrorCode::Persistence,
            ServerError::Issuance(_) => ErrorCode::Issuance,
            ServerError::Configuration(_) => ErrorCode::Configuration,
            ServerError::Internal(_) => ErrorCode::Internal,
        }
    }
}

/// 错误响应
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// 错误代码
    pub code: ErrorCode,
    /// 错误消息
    pub message: String,
    /// 时间戳
    pub timestamp: u64,
}

impl ErrorResponse {
    /// 创建错误响应
    pub fn new(error: &ServerError) -> Self {
        Self {
            code: ErrorCode::from(error),
            message: error.public_message().to_string(),
            timestamp: chrono::Utc::now().timestamp() as u64,
        }
    }
}
