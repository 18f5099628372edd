//! 服务组装：按配置创建存储、用户目录、签发与刷新流程，并启动 HTTP 服务和过期清理任务

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{info, warn};

use crate::auth::{
    spawn_sweeper, InMemoryDirectory, InMemoryRefreshStore, PgDirectory, PgRefreshStore, Principal,
    PrincipalDirectory, RefreshStore, RotationCoordinator, TokenIssuer, TokenSigner, TokenValidator,
};
use crate::config::{ServerConfig, StoreBackend};
use crate::http::{HttpServer, HttpServerState};
use crate::infra::database::Database;
use crate::infra::metrics;

/// token 服务
pub struct TokenPairServer {
    config: ServerConfig,
    state: HttpServerState,
    store: Arc<dyn RefreshStore>,
    database: Option<Database>,
}

impl TokenPairServer {
    /// 按配置组装服务
    ///
    /// 配置无效或数据库连接失败时返回错误，调用方应该直接退出程序
    pub async fn new(config: ServerConfig) -> Result<Self> {
        config.validate().context("配置无效")?;

        let lifetimes = config.lifetimes();
        let hasher = config.hasher()?;
        let signer = Arc::new(TokenSigner::new(config.auth_secret.as_bytes()));

        let (store, directory, database) = match config.store {
            StoreBackend::Memory => {
                warn!("⚠️ 使用内存存储，重启后所有 refresh 记录都会丢失");
                let store: Arc<dyn RefreshStore> =
                    Arc::new(InMemoryRefreshStore::new(hasher, lifetimes.refresh));
                let directory: Arc<dyn PrincipalDirectory> = Arc::new(InMemoryDirectory::new());
                (store, directory, None)
            }
            StoreBackend::Postgres => {
                let database = Database::connect(&config.database_url, config.store_timeout())
                    .await
                    .context("数据库连接失败，请检查 DATABASE_URL")?;
                let pool = database.pool().clone();
                let store: Arc<dyn RefreshStore> = Arc::new(PgRefreshStore::new(
                    pool.clone(),
                    hasher,
                    lifetimes.refresh,
                    config.store_timeout(),
                ));
                let directory: Arc<dyn PrincipalDirectory> =
                    Arc::new(PgDirectory::new(pool, config.store_timeout()));
                (store, directory, Some(database))
            }
        };

        for user_id in &config.seed_users {
            directory
                .add(Principal::new(*user_id))
                .await
                .with_context(|| format!("添加用户失败: {}", user_id))?;
        }

        let coordinator = Arc::new(RotationCoordinator::new(
            TokenIssuer::new(signer.clone(), lifetimes),
            TokenValidator::new(signer),
            store.clone(),
        ));

        Ok(Self {
            state: HttpServerState::new(coordinator, directory),
            config,
            store,
            database,
        })
    }

    pub fn state(&self) -> HttpServerState {
        self.state.clone()
    }

    /// 运行服务直到收到退出信号
    pub async fn run(self) -> Result<()> {
        if self.config.enable_metrics {
            match metrics::init() {
                Ok(()) => info!("📈 Prometheus 指标已启用: GET /metrics"),
                Err(e) => warn!("⚠️ Prometheus 指标初始化失败: {}", e),
            }
        }

        let sweeper = spawn_sweeper(self.store.clone(), self.config.sweep_interval());
        info!(
            "✅ 过期 refresh 记录清理任务已启动 (间隔 {}秒)",
            self.config.sweep_interval_secs
        );

        let addr = format!("{}:{}", self.config.host, self.config.port);
        let result = HttpServer::new(self.state, addr.clone())
            .run()
            .await
            .with_context(|| format!("HTTP 服务器运行失败: {}", addr));

        sweeper.abort();
        if let Some(database) = &self.database {
            database.close().await;
        }
        info!("👋 服务已停止");

        result
    }
}
