use async_trait::async_trait;
use dashmap::DashSet;
use sqlx::PgPool;
use std::future::Future;
use tracing::info;

use crate::auth::models::Principal;
use crate::error::Result;

/// 用户目录：只回答“这个用户是否存在”
#[async_trait]
pub trait PrincipalDirectory: Send + Sync {
    async fn exists(&self, principal: Principal) -> Result<bool>;

    /// 添加用户，已存在时不报错
    async fn add(&self, principal: Principal) -> Result<()>;
}

/// 内存用户目录
#[derive(Default)]
pub struct InMemoryDirectory {
    users: DashSet<Principal>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_users(users: impl IntoIterator<Item = Principal>) -> Self {
        let directory = Self::new();
        for user in users {
            directory.users.insert(user);
        }
        directory
    }
}

#[async_trait]
impl PrincipalDirectory for InMemoryDirectory {
    async fn exists(&self, principal: Principal) -> Result<bool> {
        Ok(self.users.contains(&principal))
    }

    async fn add(&self, principal: Principal) -> Result<()> {
        self.users.insert(principal);
        Ok(())
    }
}

/// PostgreSQL 用户目录（`users` 表）
pub struct PgDirectory {
    pool: PgPool,
    timeout: std::time::Duration,
}

impl PgDirectory {
    pub fn new(pool: PgPool, timeout: std::time::Duration) -> Self {
        Self { pool, timeout }
    }

    async fn bounded<T, F>(&self, fut: F) -> Result<T>
    where
        F: Future<Output = std::result::Result<T, sqlx::Error>>,
    {
        Ok(tokio::time::timeout(self.timeout, fut).await??)
    }
}

#[async_trait]
impl PrincipalDirectory for PgDirectory {
    async fn exists(&self, principal: Principal) -> Result<bool> {
        let found: bool = self
            .bounded(
                sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM users WHERE user_id = $1)")
                    .bind(principal.as_uuid())
                    .fetch_one(&self.pool),
            )
            .await?;
        Ok(found)
    }

    async fn add(&self, principal: Principal) -> Result<()> {
        let result = self
            .bounded(
                sqlx::query("INSERT INTO users (user_id) VALUES ($1) ON CONFLICT (user_id) DO NOTHING")
                    .bind(principal.as_uuid())
                    .execute(&self.pool),
            )
            .await?;
        if result.rows_affected() > 0 {
            info!("👤 添加用户: {}", principal);
        }
        Ok(())
    }
}
