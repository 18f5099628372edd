//! refresh 记录中配对 ID 的单向哈希
//!
//! 支持两种方案：
//! - `hmac-sha256`（默认）：带密钥的确定性哈希，同一配对 ID 总是得到同一哈希，
//!   可以直接按哈希查询和条件删除
//! - `bcrypt`：加盐慢哈希，只能逐条校验
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::fmt;
use std::str::FromStr;
use subtle::ConstantTimeEq;

use crate::auth::models::PairingId;
use crate::error::{Result, ServerError};

type HmacSha256 = Hmac<Sha256>;

/// 从签名密钥派生哈希子密钥时使用的标签
const HASH_KEY_LABEL: &[u8] = b"tokenpair/refresh-record-hash/v1";

/// bcrypt 默认成本（bcrypt 允许的最小值）
pub const DEFAULT_BCRYPT_COST: u32 = 4;

const BCRYPT_MIN_COST: u32 = 4;
const BCRYPT_MAX_COST: u32 = 31;

/// 哈希方案
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum HashScheme {
    #[default]
    #[serde(rename = "hmac-sha256")]
    HmacSha256,
    #[serde(rename = "bcrypt")]
    Bcrypt,
}

impl FromStr for HashScheme {
    type Err = ServerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "hmac-sha256" | "hmac" => Ok(HashScheme::HmacSha256),
            "bcrypt" => Ok(HashScheme::Bcrypt),
            other => Err(ServerError::Configuration(format!(
                "unknown token hash scheme: {}",
                other
            ))),
        }
    }
}

impl fmt::Display for HashScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HashScheme::HmacSha256 => f.write_str("hmac-sha256"),
            HashScheme::Bcrypt => f.write_str("bcrypt"),
        }
    }
}

#[derive(Clone)]
enum Inner {
    Hmac { key: Vec<u8> },
    Bcrypt { cost: u32 },
}

/// 配对 ID 哈希器
#[derive(Clone)]
pub struct TokenHasher {
    inner: Inner,
}

impl TokenHasher {
    /// HMAC-SHA256，子密钥由签名密钥派生
    pub fn hmac_sha256(secret: &[u8]) -> Result<Self> {
        let mut mac = HmacSha256::new_from_slice(secret)
            .map_err(|_| ServerError::Configuration("invalid hash key length".to_string()))?;
        mac.update(HASH_KEY_LABEL);
        let key = mac.finalize().into_bytes().to_vec();

        Ok(Self {
            inner: Inner::Hmac { key },
        })
    }

    /// bcrypt，成本需在 4..=31 之间
    pub fn bcrypt(cost: u32) -> Result<Self> {
        if !(BCRYPT_MIN_COST..=BCRYPT_MAX_COST).contains(&cost) {
            return Err(ServerError::Configuration(format!(
                "bcrypt cost must be between {} and {}, got {}",
                BCRYPT_MIN_COST,
                BCRYPT_MAX_COST,
                cost
            )));
        }
        Ok(Self {
            inner: Inner::Bcrypt { cost },
        })
    }

    /// 按配置构造
    pub fn from_scheme(scheme: HashScheme, secret: &[u8], bcrypt_cost: u32) -> Result<Self> {
        match scheme {
            HashScheme::HmacSha256 => Self::hmac_sha256(secret),
            HashScheme::Bcrypt => Self::bcrypt(bcrypt_cost),
        }
    }

    pub fn scheme(&self) -> HashScheme {
        match self.inner {
            Inner::Hmac { .. } => HashScheme::HmacSha256,
            Inner::Bcrypt { .. } => HashScheme::Bcrypt,
        }
    }

    /// 同一输入是否总是得到同一哈希
    pub fn is_deterministic(&self) -> bool {
        matches!(self.inner, Inner::Hmac { .. })
    }

    /// 计算配对 ID 的哈希
    pub fn hash(&self, id: &PairingId) -> Result<Vec<u8>> {
        match &self.inner {
            Inner::Hmac { key } => Ok(hmac_digest(key, id)?),
            Inner::Bcrypt { cost } => bcrypt::hash(id.as_bytes(), *cost)
                .map(String::into_bytes)
                .map_err(|e| ServerError::Internal(format!("bcrypt 哈希失败: {}", e))),
        }
    }

    /// 校验配对 ID 是否与存储的哈希匹配
    pub fn verify(&self, id: &PairingId, stored: &[u8]) -> Result<bool> {
        match &self.inner {
            Inner::Hmac { key } => {
                let computed = hmac_digest(key, id)?;
                Ok(computed.ct_eq(stored).into())
            }
            Inner::Bcrypt { .. } => {
                // 存储内容不是合法 bcrypt 串时视为不匹配
                let Ok(stored) = std::str::from_utf8(stored) else {
                    return Ok(false);
                };
                Ok(bcrypt::verify(id.as_bytes(), stored).unwrap_or(false))
            }
        }
    }
}

impl fmt::Debug for TokenHasher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenHasher")
            .field("scheme", &self.scheme())
            .finish()
    }
}

fn hmac_digest(key: &[u8], id: &PairingId) -> Result<Vec<u8>> {
    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|_| ServerError::Internal("invalid hash key length".to_string()))?;
    mac.update(id.as_bytes());
    Ok(mac.finalize().into_bytes().to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &[u8] = b"test-secret-key-at-least-32-chars";

    #[test]
    fn test_hmac_is_deterministic_and_keyed() {
        let hasher = TokenHasher::hmac_sha256(SECRET).unwrap();
        let id = PairingId::generate();

        let first = hasher.hash(&id).unwrap();
        assert_eq!(first.len(), 32);
        assert_eq!(first, hasher.hash(&id).unwrap());
        assert!(hasher.verify(&id, &first).unwrap());
        assert!(!hasher.verify(&PairingId::generate(), &first).unwrap());

        let other = TokenHasher::hmac_sha256(b"another-secret-key-at-least-32-chars").unwrap();
        assert_ne!(first, other.hash(&id).unwrap());
    }

    #[test]
    fn test_hash_is_not_the_raw_id() {
        let hasher = TokenHasher::hmac_sha256(SECRET).unwrap();
        let id = PairingId::generate();
        let hash = hasher.hash(&id).unwrap();
        assert!(!hash.windows(16).any(|w| w == id.as_bytes()));
    }

    #[test]
    fn test_bcrypt_is_salted() {
        let hasher = TokenHasher::bcrypt(DEFAULT_BCRYPT_COST).unwrap();
        assert!(!hasher.is_deterministic());
        let id = PairingId::generate();

        let a = hasher.hash(&id).unwrap();
        let b = hasher.hash(&id).unwrap();
        assert_ne!(a, b);
        assert!(hasher.verify(&id, &a).unwrap());
        assert!(hasher.verify(&id, &b).unwrap());
        assert!(!hasher.verify(&PairingId::generate(), &a).unwrap());
        assert!(!hasher.verify(&id, b"garbage").unwrap());
    }

    #[test]
    fn test_bcrypt_cost_bounds() {
        assert!(matches!(TokenHasher::bcrypt(3), Err(ServerError::Configuration(_))));
        assert!(matches!(TokenHasher::bcrypt(32), Err(ServerError::Configuration(_))));
    }

    #[test]
    fn test_scheme_parse() {
        assert_eq!("hmac-sha256".parse::<HashScheme>().unwrap(), HashScheme::HmacSha256);
        assert_eq!("BCRYPT".parse::<HashScheme>().unwrap(), HashScheme::Bcrypt);
        assert!("md5".parse::<HashScheme>().is_err());
        assert_eq!(HashScheme::default().to_string(), "hmac-sha256");
    }
}
