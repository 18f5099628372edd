//! HTTP 路由模块
//!
//! 路由结构：
//! - `GET /ping` - 健康检查
//! - `GET /authorize/{user_id}` - 为用户签发 token 对
//! - `POST /refresh` - 用旧 token 对换取新 token 对
//! - `GET /metrics` - Prometheus 抓取端点

pub mod metrics;
pub mod ping;
pub mod token;

use axum::{routing::get, Router};
use crate::http::HttpServerState;

/// 创建所有路由
pub fn create_routes() -> Router<HttpServerState> {
    Router::new()
        .route("/ping", get(ping::ping))
        .route("/metrics", get(metrics::metrics_handler))
        .merge(token::create_route())
}
