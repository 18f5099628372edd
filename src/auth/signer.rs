use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{Result, ServerError};

/// 允许的签名算法：只接受 HMAC-SHA 家族
pub const ALLOWED_ALGORITHMS: [Algorithm; 3] = [Algorithm::HS256, Algorithm::HS384, Algorithm::HS512];

/// 签发时使用的算法
pub const SIGNING_ALGORITHM: Algorithm = Algorithm::HS512;

#[derive(Deserialize)]
struct RawHeader {
    alg: String,
}

/// JWT 签名/验签
///
/// 整个进程只使用一个对称密钥，通过构造函数注入。
pub struct TokenSigner {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl TokenSigner {
    pub fn new(secret: &[u8]) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
        }
    }

    /// 签名 claims，返回紧凑 JWT 文本
    pub fn sign<T: Serialize>(&self, claims: &T) -> Result<String> {
        let header = Header::new(SIGNING_ALGORITHM);
        encode(&header, claims, &self.encoding_key)
            .map_err(|e| ServerError::Issuance(format!("JWT 签发失败: {}", e)))
    }

    /// 验签并解出 claims
    ///
    /// 在验签之前先检查 header 中的 `alg`，`none` 和非对称算法直接拒绝。
    /// `check_exp` 为 false 时不检查过期时间（access token 在刷新时不要求未过期）。
    pub fn verify<T: DeserializeOwned>(&self, compact: &str, check_exp: bool) -> Result<T> {
        check_header(compact)?;

        let mut validation = Validation::new(SIGNING_ALGORITHM);
        validation.algorithms = ALLOWED_ALGORITHMS.to_vec();
        validation.leeway = 0;
        validation.validate_exp = check_exp;

        let token_data = decode::<T>(compact, &self.decoding_key, &validation).map_err(|e| {
            match e.kind() {
                ErrorKind::InvalidSignature
                | ErrorKind::InvalidAlgorithm
                | ErrorKind::InvalidAlgorithmName
                | ErrorKind::InvalidKeyFormat => ServerError::Authentication(e.to_string()),
                ErrorKind::ExpiredSignature => ServerError::Expired,
                _ => ServerError::Malformed(e.to_string()),
            }
        })?;

        Ok(token_data.claims)
    }
}

fn check_header(compact: &str) -> Result<()> {
    let mut segments = compact.split('.');
    let header = match (segments.next(), segments.next(), segments.next(), segments.next()) {
        (Some(header), Some(_), Some(_), None) => header,
        _ => return Err(ServerError::Malformed("token must have three segments".to_string())),
    };

    let raw = URL_SAFE_NO_PAD
        .decode(header)
        .map_err(|e| ServerError::Malformed(format!("header: {}", e)))?;
    let header: RawHeader = serde_json::from_slice(&raw)
        .map_err(|e| ServerError::Malformed(format!("header: {}", e)))?;

    let allowed = header
        .alg
        .parse::<Algorithm>()
        .map(|alg| ALLOWED_ALGORITHMS.contains(&alg))
        .unwrap_or(false);
    if !allowed {
        return Err(ServerError::Authentication(format!(
            "signing algorithm {} is not allowed",
            header.alg
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    const SECRET: &[u8] = b"test-secret-key-at-least-32-chars";

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct TestClaims {
        token_id: String,
        exp: i64,
    }

    fn claims(exp_offset: i64) -> TestClaims {
        TestClaims {
            token_id: "abc".to_string(),
            exp: chrono::Utc::now().timestamp() + exp_offset,
        }
    }

    fn forge(header_json: &str, payload: &TestClaims, signature: &str) -> String {
        format!(
            "{}.{}.{}",
            URL_SAFE_NO_PAD.encode(header_json),
            URL_SAFE_NO_PAD.encode(serde_json::to_vec(payload).unwrap()),
            signature
        )
    }

    #[test]
    fn test_sign_and_verify() {
        let signer = TokenSigner::new(SECRET);
        let original = claims(3600);
        let token = signer.sign(&original).unwrap();

        let decoded: TestClaims = signer.verify(&token, true).unwrap();
        assert_eq!(decoded, original);
    }

    #[test]
    fn test_verify_accepts_other_hmac_algorithms() {
        let signer = TokenSigner::new(SECRET);
        let original = claims(3600);
        let token = encode(
            &Header::new(Algorithm::HS256),
            &original,
            &EncodingKey::from_secret(SECRET),
        )
        .unwrap();

        let decoded: TestClaims = signer.verify(&token, true).unwrap();
        assert_eq!(decoded, original);
    }

    #[test]
    fn test_wrong_secret_is_authentication_error() {
        let signer = TokenSigner::new(SECRET);
        let other = TokenSigner::new(b"another-secret-key-at-least-32-chars");
        let token = other.sign(&claims(3600)).unwrap();

        let result = signer.verify::<TestClaims>(&token, true);
        assert!(matches!(result, Err(ServerError::Authentication(_))));
    }

    #[test]
    fn test_disallowed_algorithms_rejected() {
        let signer = TokenSigner::new(SECRET);

        let none = forge(r#"{"alg":"none","typ":"JWT"}"#, &claims(3600), "");
        assert!(matches!(
            signer.verify::<TestClaims>(&none, true),
            Err(ServerError::Authentication(_))
        ));

        let rs256 = forge(r#"{"alg":"RS256","typ":"JWT"}"#, &claims(3600), "c2lnbmF0dXJl");
        assert!(matches!(
            signer.verify::<TestClaims>(&rs256, true),
            Err(ServerError::Authentication(_))
        ));
    }

    #[test]
    fn test_expiry_only_when_requested() {
        let signer = TokenSigner::new(SECRET);
        let token = signer.sign(&claims(-60)).unwrap();

        assert!(matches!(
            signer.verify::<TestClaims>(&token, true),
            Err(ServerError::Expired)
        ));
        assert!(signer.verify::<TestClaims>(&token, false).is_ok());
    }

    #[test]
    fn test_malformed_tokens() {
        let signer = TokenSigner::new(SECRET);

        for token in ["", "only.two", "a.b.c.d", "!!!.payload.sig"] {
            assert!(
                matches!(signer.verify::<TestClaims>(token, true), Err(ServerError::Malformed(_))),
                "token {:?}",
                token
            );
        }
    }
}
