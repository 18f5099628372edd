use std::sync::Arc;
use tracing::{debug, error, info};

use crate::auth::models::{Principal, TokenPair};
use crate::auth::refresh_store::RefreshStore;
use crate::auth::token_issuer::TokenIssuer;
use crate::auth::token_validator::TokenValidator;
use crate::error::{Result, ServerError};
use crate::infra::metrics;

/// token 对签发与刷新流程
///
/// - 授权：签发 → 保存
/// - 刷新：校验 → 兑换 → 签发 → 保存
///
/// 每个配对 ID 只会从“已签发”转为“已兑换”一次。
pub struct RotationCoordinator {
    issuer: TokenIssuer,
    validator: TokenValidator,
    store: Arc<dyn RefreshStore>,
}

impl RotationCoordinator {
    pub fn new(issuer: TokenIssuer, validator: TokenValidator, store: Arc<dyn RefreshStore>) -> Self {
        Self {
            issuer,
            validator,
            store,
        }
    }

    /// 为已确认存在的用户签发新的 token 对
    pub async fn authorize(&self, principal: Principal) -> Result<TokenPair> {
        let (pair, token_id) = self.issuer.issue(principal)?;
        self.store.save(principal, token_id).await?;

        metrics::record_pair_issued();
        info!("✅ 授权成功: user_id={}", principal);
        Ok(pair)
    }

    /// 用旧 token 对换取新 token 对
    pub async fn rotate(&self, pair: &TokenPair) -> Result<TokenPair> {
        let (principal, token_id) = self.validator.validate(pair).map_err(|e| {
            metrics::record_refresh_rejected(rejection_reason(&e));
            e
        })?;

        if let Err(e) = self.store.consume(principal, token_id).await {
            metrics::record_refresh_rejected(rejection_reason(&e));
            debug!("refresh 记录兑换失败: user_id={}, error={}", principal, e);
            return Err(e);
        }

        // 旧记录已删除，之后任何失败都需要用户重新授权
        let (new_pair, new_token_id) = self.issuer.issue(principal).map_err(|e| {
            lost_rotation(principal, &e);
            e
        })?;

        if let Err(e) = self.store.save(principal, new_token_id).await {
            lost_rotation(principal, &e);
            return Err(match e {
                ServerError::Persistence(_) => e,
                other => ServerError::Persistence(other.to_string()),
            });
        }

        metrics::record_pair_issued();
        metrics::record_rotation();
        info!("🔄 刷新成功: user_id={}", principal);
        Ok(new_pair)
    }
}

fn lost_rotation(principal: Principal, err: &ServerError) {
    metrics::record_rotation_lost();
    error!(
        "❌ 刷新丢失: 旧 refresh 记录已兑换但新 token 对未能保存, user_id={}, error={}",
        principal, err
    );
}

fn rejection_reason(err: &ServerError) -> &'static str {
    match err {
        ServerError::Malformed(_) => "malformed",
        ServerError::Authentication(_) => "authentication",
        ServerError::Expired => "expired",
        ServerError::PairingMismatch => "pairing",
        ServerError::RefreshNotFound => "not_found",
        _ => "internal",
    }
}
