//! refresh 记录存储
//!
//! 每个配对 ID 最多只能兑换一次：`consume` 在一个不可分割的步骤里查找并删除记录。
//! 超过存活期的记录即使尚未清理也不能兑换。

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use sqlx::{PgPool, Row};
use std::future::Future;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::auth::models::{PairingId, Principal, RefreshRecord};
use crate::auth::token_hash::TokenHasher;
use crate::error::{Result, ServerError};
use crate::infra::metrics;

/// 默认存储操作超时
pub const DEFAULT_STORE_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(10);

/// refresh 记录存储接口
#[async_trait]
pub trait RefreshStore: Send + Sync {
    /// 保存一条新记录
    async fn save(&self, owner: Principal, id: PairingId) -> Result<()>;

    /// 兑换并删除记录；记录不存在、已兑换或已过期时返回 `RefreshNotFound`
    async fn consume(&self, owner: Principal, id: PairingId) -> Result<()>;

    /// 删除所有过期记录，返回删除条数
    async fn purge_expired(&self) -> Result<u64>;
}

/// 内存实现，用于测试和单机部署
pub struct InMemoryRefreshStore {
    records: DashMap<Principal, Vec<RefreshRecord>>,
    hasher: TokenHasher,
    lifetime: Duration,
}

impl InMemoryRefreshStore {
    pub fn new(hasher: TokenHasher, lifetime: Duration) -> Self {
        Self {
            records: DashMap::new(),
            hasher,
            lifetime,
        }
    }

    /// 当前保存的记录总数（包括已过期未清理的）
    pub fn len(&self) -> usize {
        self.records.iter().map(|entry| entry.value().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl RefreshStore for InMemoryRefreshStore {
    async fn save(&self, owner: Principal, id: PairingId) -> Result<()> {
        let record = RefreshRecord {
            owner,
            token_hash: self.hasher.hash(&id)?,
            created_at: Utc::now(),
        };
        self.records.entry(owner).or_default().push(record);
        Ok(())
    }

    async fn consume(&self, owner: Principal, id: PairingId) -> Result<()> {
        let now = Utc::now();
        let consumed = match self.records.get_mut(&owner) {
            // 持有分片写锁直到查找和删除都完成
            Some(mut records) => {
                let mut position = None;
                for (index, record) in records.iter().enumerate() {
                    if record.is_expired(self.lifetime, now) {
                        continue;
                    }
                    if self.hasher.verify(&id, &record.token_hash)? {
                        position = Some(index);
                        break;
                    }
                }
                position.map(|index| records.swap_remove(index)).is_some()
            }
            None => false,
        };

        self.records.remove_if(&owner, |_, records| records.is_empty());

        if consumed {
            Ok(())
        } else {
            Err(ServerError::RefreshNotFound)
        }
    }

    async fn purge_expired(&self) -> Result<u64> {
        let now = Utc::now();
        let mut purged = 0u64;
        for mut entry in self.records.iter_mut() {
            let before = entry.value().len();
            entry
                .value_mut()
                .retain(|record| !record.is_expired(self.lifetime, now));
            purged += (before - entry.value().len()) as u64;
        }
        self.records.retain(|_, records| !records.is_empty());
        Ok(purged)
    }
}

/// PostgreSQL 实现
///
/// 表结构见 `migrations/001_refresh_tokens.sql`。
pub struct PgRefreshStore {
    pool: PgPool,
    hasher: TokenHasher,
    lifetime: Duration,
    timeout: std::time::Duration,
}

impl PgRefreshStore {
    pub fn new(pool: PgPool, hasher: TokenHasher, lifetime: Duration, timeout: std::time::Duration) -> Self {
        Self {
            pool,
            hasher,
            lifetime,
            timeout,
        }
    }

    fn cutoff(&self) -> DateTime<Utc> {
        Utc::now() - self.lifetime
    }

    async fn bounded<T, F>(&self, fut: F) -> Result<T>
    where
        F: Future<Output = std::result::Result<T, sqlx::Error>>,
    {
        Ok(tokio::time::timeout(self.timeout, fut).await??)
    }

    /// 确定性哈希：一条条件 DELETE 完成查找和删除
    async fn consume_by_hash(&self, owner: Principal, id: PairingId) -> Result<bool> {
        let token_hash = self.hasher.hash(&id)?;
        let deleted = self
            .bounded(
                sqlx::query(
                    "DELETE FROM refresh_tokens \
                     WHERE user_id = $1 AND token_hash = $2 AND created_at > $3 \
                     RETURNING id",
                )
                .bind(owner.as_uuid())
                .bind(&token_hash)
                .bind(self.cutoff())
                .fetch_optional(&self.pool),
            )
            .await?;
        Ok(deleted.is_some())
    }

    /// 加盐哈希：逐条校验候选记录，再按 id 条件删除，受影响行数必须为 1
    async fn consume_by_scan(&self, owner: Principal, id: PairingId) -> Result<bool> {
        let cutoff = self.cutoff();
        let rows = self
            .bounded(
                sqlx::query(
                    "SELECT id, token_hash FROM refresh_tokens \
                     WHERE user_id = $1 AND created_at > $2",
                )
                .bind(owner.as_uuid())
                .bind(cutoff)
                .fetch_all(&self.pool),
            )
            .await?;

        for row in rows {
            let token_hash: Vec<u8> = row.try_get("token_hash")?;
            if !self.hasher.verify(&id, &token_hash)? {
                continue;
            }

            let record_id: i64 = row.try_get("id")?;
            let result = self
                .bounded(
                    sqlx::query("DELETE FROM refresh_tokens WHERE id = $1 AND created_at > $2")
                        .bind(record_id)
                        .bind(cutoff)
                        .execute(&self.pool),
                )
                .await?;
            // 并发兑换的失败方看到 0 行
            return Ok(result.rows_affected() == 1);
        }

        Ok(false)
    }
}

#[async_trait]
impl RefreshStore for PgRefreshStore {
    async fn save(&self, owner: Principal, id: PairingId) -> Result<()> {
        let token_hash = self.hasher.hash(&id)?;
        self.bounded(
            sqlx::query(
                "INSERT INTO refresh_tokens (user_id, token_hash, created_at) VALUES ($1, $2, $3)",
            )
            .bind(owner.as_uuid())
            .bind(&token_hash)
            .bind(Utc::now())
            .execute(&self.pool),
        )
        .await?;
        Ok(())
    }

    async fn consume(&self, owner: Principal, id: PairingId) -> Result<()> {
        let consumed = if self.hasher.is_deterministic() {
            self.consume_by_hash(owner, id).await?
        } else {
            self.consume_by_scan(owner, id).await?
        };

        if consumed {
            Ok(())
        } else {
            Err(ServerError::RefreshNotFound)
        }
    }

    async fn purge_expired(&self) -> Result<u64> {
        let result = self
            .bounded(
                sqlx::query("DELETE FROM refresh_tokens WHERE created_at <= $1")
                    .bind(self.cutoff())
                    .execute(&self.pool),
            )
            .await?;
        Ok(result.rows_affected())
    }
}

/// 启动过期记录清理任务
pub fn spawn_sweeper(store: Arc<dyn RefreshStore>, every: std::time::Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        loop {
            interval.tick().await;

            match store.purge_expired().await {
                Ok(0) => debug!("没有需要清理的 refresh 记录"),
                Ok(purged) => {
                    metrics::record_records_purged(purged);
                    info!("🧹 清理过期 refresh 记录: {} 条", purged);
                }
                Err(e) => error!("清理过期 refresh 记录失败: {}", e),
            }
        }
    })
}
