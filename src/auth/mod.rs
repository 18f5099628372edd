// 认证模块 - 提供 token 对签发、校验、刷新和 refresh 记录存储

pub mod directory;
pub mod models;
pub mod refresh_store;
pub mod rotation;
pub mod signer;
pub mod token_hash;
pub mod token_issuer;
pub mod token_validator;
pub mod wire;

// 重新导出主要类型
pub use directory::{InMemoryDirectory, PgDirectory, PrincipalDirectory};
pub use models::{
    AccessClaims, PairingId, Principal, RefreshClaims, RefreshRecord, TokenLifetimes, TokenPair,
};
pub use refresh_store::{spawn_sweeper, InMemoryRefreshStore, PgRefreshStore, RefreshStore};
pub use rotation::RotationCoordinator;
pub use signer::TokenSigner;
pub use token_hash::{HashScheme, TokenHasher};
pub use token_issuer::TokenIssuer;
pub use token_validator::TokenValidator;
