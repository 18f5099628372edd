//! HTTP 服务器

use axum::Router;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::auth::{PrincipalDirectory, RotationCoordinator};
use crate::http::routes;

/// HTTP 服务器共享状态
#[derive(Clone)]
pub struct HttpServerState {
    pub coordinator: Arc<RotationCoordinator>,
    pub directory: Arc<dyn PrincipalDirectory>,
}

impl HttpServerState {
    pub fn new(coordinator: Arc<RotationCoordinator>, directory: Arc<dyn PrincipalDirectory>) -> Self {
        Self {
            coordinator,
            directory,
        }
    }
}

/// 构建路由
pub fn build_router(state: HttpServerState) -> Router {
    Router::new()
        .merge(routes::create_routes())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// HTTP 服务器
pub struct HttpServer {
    state: HttpServerState,
    addr: String,
}

impl HttpServer {
    pub fn new(state: HttpServerState, addr: String) -> Self {
        Self { state, addr }
    }

    /// 启动 HTTP 服务器，直到收到 Ctrl+C
    pub async fn run(self) -> std::io::Result<()> {
        let app = build_router(self.state);
        let listener = tokio::net::TcpListener::bind(&self.addr).await?;

        info!("🌐 HTTP 服务器启动在 {}", self.addr);

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("无法监听退出信号: {}", e);
        std::future::pending::<()>().await;
    }
    info!("🛑 收到退出信号，正在关闭 HTTP 服务器");
}
