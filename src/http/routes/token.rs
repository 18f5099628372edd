//! token 签发与刷新接口

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    response::Json,
    routing::{get, post},
    Router,
};
use tracing::debug;

use crate::auth::{Principal, TokenPair};
use crate::error::{Result, ServerError};
use crate::http::HttpServerState;

pub fn create_route() -> Router<HttpServerState> {
    Router::new()
        .route("/authorize/{user_id}", get(authorize))
        .route("/refresh", post(refresh))
}

/// 为已存在的用户签发 token 对
///
/// GET /authorize/{user_id}
///
/// - GUID 无法解析：400
/// - 用户不存在：404
/// - 存储或签发失败：500
async fn authorize(
    State(state): State<HttpServerState>,
    Path(user_id): Path<String>,
) -> Result<Json<TokenPair>> {
    let principal: Principal = user_id.parse()?;

    if !state.directory.exists(principal).await? {
        debug!("用户不存在: {}", principal);
        return Err(ServerError::UserNotFound(principal.to_string()));
    }

    let pair = state.coordinator.authorize(principal).await?;
    Ok(Json(pair))
}

/// 用旧 token 对换取新 token 对
///
/// POST /refresh
///
/// ```json
/// { "access_token": "...", "refresh_token": "..." }
/// ```
async fn refresh(
    State(state): State<HttpServerState>,
    body: std::result::Result<Json<TokenPair>, JsonRejection>,
) -> Result<Json<TokenPair>> {
    let Json(pair) = body.map_err(|e| ServerError::BadRequest(e.body_text()))?;

    let new_pair = state.coordinator.rotate(&pair).await?;
    Ok(Json(new_pair))
}
