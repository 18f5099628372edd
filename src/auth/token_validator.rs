use std::sync::Arc;
use tracing::debug;

use crate::auth::models::{AccessClaims, PairingId, Principal, RefreshClaims, TokenPair};
use crate::auth::signer::TokenSigner;
use crate::auth::wire;
use crate::error::{Result, ServerError};

/// token 对校验
///
/// 检查顺序：access 解码/验签，refresh 解码/验签/过期，最后检查配对。
/// access token 的过期时间在刷新时不做要求。
pub struct TokenValidator {
    signer: Arc<TokenSigner>,
}

impl TokenValidator {
    pub fn new(signer: Arc<TokenSigner>) -> Self {
        Self { signer }
    }

    /// 校验 token 对，返回用户 ID 和配对 ID
    pub fn validate(&self, pair: &TokenPair) -> Result<(Principal, PairingId)> {
        let access_jwt = wire::decode(&pair.access_token)?;
        let access: AccessClaims = self.signer.verify(&access_jwt, false)?;

        let refresh_jwt = wire::decode(&pair.refresh_token)?;
        let refresh: RefreshClaims = self.signer.verify(&refresh_jwt, true)?;

        if access.token_id != refresh.token_id {
            debug!("token 对不匹配: user_id={}", access.user_id);
            return Err(ServerError::PairingMismatch);
        }

        Ok((access.user_id, access.token_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::models::TokenLifetimes;
    use crate::auth::token_issuer::TokenIssuer;
    use chrono::Utc;
    use uuid::Uuid;

    const SECRET: &[u8] = b"test-secret-key-at-least-32-chars";

    fn setup() -> (Arc<TokenSigner>, TokenIssuer, TokenValidator) {
        let signer = Arc::new(TokenSigner::new(SECRET));
        let issuer = TokenIssuer::new(signer.clone(), TokenLifetimes::default());
        let validator = TokenValidator::new(signer.clone());
        (signer, issuer, validator)
    }

    #[test]
    fn test_validate_issued_pair() {
        let (_, issuer, validator) = setup();
        let principal = Principal::new(Uuid::new_v4());

        let (pair, token_id) = issuer.issue(principal).unwrap();
        let (user_id, pairing_id) = validator.validate(&pair).unwrap();
        assert_eq!(user_id, principal);
        assert_eq!(pairing_id, token_id);
    }

    #[test]
    fn test_pairs_from_different_issuances_mismatch() {
        let (_, issuer, validator) = setup();
        let principal = Principal::new(Uuid::new_v4());

        let (first, _) = issuer.issue(principal).unwrap();
        let (second, _) = issuer.issue(principal).unwrap();
        let mixed = TokenPair {
            access_token: first.access_token,
            refresh_token: second.refresh_token,
        };
        assert!(matches!(validator.validate(&mixed), Err(ServerError::PairingMismatch)));
    }

    #[test]
    fn test_resigned_pairing_id_mismatch() {
        let (signer, issuer, validator) = setup();
        let principal = Principal::new(Uuid::new_v4());

        let (pair, _) = issuer.issue(principal).unwrap();
        let forged = RefreshClaims {
            token_id: PairingId::generate(),
            exp: Utc::now().timestamp() + 3600,
        };
        let tampered = TokenPair {
            access_token: pair.access_token,
            refresh_token: wire::encode(&signer.sign(&forged).unwrap()),
        };
        assert!(matches!(validator.validate(&tampered), Err(ServerError::PairingMismatch)));
    }

    #[test]
    fn test_expired_access_is_accepted() {
        let signer = Arc::new(TokenSigner::new(SECRET));
        let issuer = TokenIssuer::new(signer.clone(), TokenLifetimes::from_secs(-60, 3600));
        let validator = TokenValidator::new(signer);
        let principal = Principal::new(Uuid::new_v4());

        let (pair, _) = issuer.issue(principal).unwrap();
        assert_eq!(validator.validate(&pair).unwrap().0, principal);
    }

    #[test]
    fn test_expired_refresh_is_rejected() {
        let signer = Arc::new(TokenSigner::new(SECRET));
        let issuer = TokenIssuer::new(signer.clone(), TokenLifetimes::from_secs(600, -1));
        let validator = TokenValidator::new(signer);

        let (pair, _) = issuer.issue(Principal::new(Uuid::new_v4())).unwrap();
        assert!(matches!(validator.validate(&pair), Err(ServerError::Expired)));
    }

    #[test]
    fn test_foreign_secret_is_authentication_error() {
        let (_, _, validator) = setup();
        let foreign = TokenIssuer::new(
            Arc::new(TokenSigner::new(b"another-secret-key-at-least-32-chars")),
            TokenLifetimes::default(),
        );

        let (pair, _) = foreign.issue(Principal::new(Uuid::new_v4())).unwrap();
        assert!(matches!(validator.validate(&pair), Err(ServerError::Authentication(_))));
    }

    #[test]
    fn test_garbage_is_malformed() {
        let (_, issuer, validator) = setup();
        let (pair, _) = issuer.issue(Principal::new(Uuid::new_v4())).unwrap();

        let bad_outer = TokenPair {
            access_token: "not base64 at all!".to_string(),
            refresh_token: pair.refresh_token.clone(),
        };
        assert!(matches!(validator.validate(&bad_outer), Err(ServerError::Malformed(_))));

        let bad_inner = TokenPair {
            access_token: pair.access_token,
            refresh_token: wire::encode("just-one-segment"),
        };
        assert!(matches!(validator.validate(&bad_inner), Err(ServerError::Malformed(_))));
    }

    #[test]
    fn test_refresh_claims_in_access_slot_are_malformed() {
        let (signer, _, validator) = setup();

        // refresh claims 缺少 user_id，不能当作 access token 使用
        let refresh_only = RefreshClaims {
            token_id: PairingId::generate(),
            exp: Utc::now().timestamp() + 3600,
        };
        let token = wire::encode(&signer.sign(&refresh_only).unwrap());
        let pair = TokenPair {
            access_token: token.clone(),
            refresh_token: token,
        };
        assert!(matches!(validator.validate(&pair), Err(ServerError::Malformed(_))));
    }

    #[test]
    fn test_access_claims_in_refresh_slot_are_malformed() {
        let (_, issuer, validator) = setup();
        let (pair, _) = issuer.issue(Principal::new(Uuid::new_v4())).unwrap();

        // access token 不能代替 refresh token 完成轮换
        let forged = TokenPair {
            access_token: pair.access_token.clone(),
            refresh_token: pair.access_token,
        };
        assert!(matches!(validator.validate(&forged), Err(ServerError::Malformed(_))));
    }
}
