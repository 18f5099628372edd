use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::ServerError;

/// access token 默认有效期（10 分钟）
pub const ACCESS_TOKEN_TTL_SECS: i64 = 10 * 60;

/// refresh token 默认有效期（12 小时），同时也是 refresh 记录的过期时间
pub const REFRESH_TOKEN_TTL_SECS: i64 = 12 * 60 * 60;

/// 有效期上限（365 天）
pub const MAX_TOKEN_TTL_SECS: i64 = 365 * 24 * 60 * 60;

/// 主体标识（用户 GUID）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Principal(Uuid);

impl Principal {
    pub fn new(id: Uuid) -> Self {
        Self(id)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl From<Uuid> for Principal {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl FromStr for Principal {
    type Err = ServerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|_| ServerError::BadRequest("Can't parse provided GUID".to_string()))
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// 配对 ID：每次签发随机生成，把一个 access token 和一个 refresh token 绑定在一起
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PairingId(Uuid);

impl PairingId {
    /// 生成新的配对 ID（v4 UUID，来自操作系统 CSPRNG）
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        self.0.as_bytes()
    }
}

impl From<Uuid> for PairingId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

// 配对 ID 只出现在签名 payload 中，日志里不打印明文
impl fmt::Debug for PairingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PairingId(***)")
    }
}

/// access token claims
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessClaims {
    /// 用户 ID
    pub user_id: Principal,
    /// 配对 ID
    pub token_id: PairingId,
    /// 过期时间 (Unix timestamp)
    pub exp: i64,
}

/// refresh token claims，不携带用户 ID
///
/// 拒绝多余字段：带 `user_id` 的 access payload 不能冒充 refresh token。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RefreshClaims {
    /// 配对 ID
    pub token_id: PairingId,
    /// 过期时间 (Unix timestamp)
    pub exp: i64,
}

/// 一对 access / refresh token（均为传输编码后的不透明字符串）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// token 有效期配置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenLifetimes {
    pub access: Duration,
    pub refresh: Duration,
}

impl Default for TokenLifetimes {
    fn default() -> Self {
        Self {
            access: Duration::seconds(ACCESS_TOKEN_TTL_SECS),
            refresh: Duration::seconds(REFRESH_TOKEN_TTL_SECS),
        }
    }
}

impl TokenLifetimes {
    /// 调用方负责保证秒数不超过 `MAX_TOKEN_TTL_SECS`，配置经过 `validate()` 后才会走到这里
    pub fn from_secs(access_secs: i64, refresh_secs: i64) -> Self {
        Self {
            access: Duration::seconds(access_secs),
            refresh: Duration::seconds(refresh_secs),
        }
    }
}

/// 服务端保存的 refresh 记录
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshRecord {
    /// 所属用户
    pub owner: Principal,
    /// 配对 ID 的单向哈希
    pub token_hash: Vec<u8>,
    /// 创建时间
    pub created_at: DateTime<Utc>,
}

impl RefreshRecord {
    /// 记录是否已超过存活期
    pub fn is_expired(&self, lifetime: Duration, now: DateTime<Utc>) -> bool {
        now - self.created_at >= lifetime
    }
}
