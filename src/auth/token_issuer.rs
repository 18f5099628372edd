use chrono::Utc;
use std::sync::Arc;
use tracing::debug;

use crate::auth::models::{AccessClaims, PairingId, Principal, RefreshClaims, TokenLifetimes, TokenPair};
use crate::auth::signer::TokenSigner;
use crate::auth::wire;
use crate::error::Result;

/// token 对签发
///
/// 每次签发生成新的配对 ID，access token 与 refresh token 共享该 ID，
/// 过期时间各自独立。
pub struct TokenIssuer {
    signer: Arc<TokenSigner>,
    lifetimes: TokenLifetimes,
}

impl TokenIssuer {
    pub fn new(signer: Arc<TokenSigner>, lifetimes: TokenLifetimes) -> Self {
        Self { signer, lifetimes }
    }

    pub fn lifetimes(&self) -> TokenLifetimes {
        self.lifetimes
    }

    /// 签发 token 对
    ///
    /// 返回的配对 ID 仅供调用方保存 refresh 记录使用。
    pub fn issue(&self, principal: Principal) -> Result<(TokenPair, PairingId)> {
        let token_id = PairingId::generate();
        let now = Utc::now();

        let access = AccessClaims {
            user_id: principal,
            token_id,
            exp: (now + self.lifetimes.access).timestamp(),
        };
        let refresh = RefreshClaims {
            token_id,
            exp: (now + self.lifetimes.refresh).timestamp(),
        };

        let access_token = wire::encode(&self.signer.sign(&access)?);
        let refresh_token = wire::encode(&self.signer.sign(&refresh)?);

        debug!("签发 token 对: user_id={}", principal);

        Ok((
            TokenPair {
                access_token,
                refresh_token,
            },
            token_id,
        ))
    }
}
