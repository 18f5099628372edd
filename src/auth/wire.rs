//! token 传输编码
//!
//! 签名后的紧凑 JWT 文本（header.payload.signature）在传输前会再做一次标准 base64 编码。
//! 这一层不提供任何安全性，只是为了与已有客户端保持线上格式兼容。

use base64::{engine::general_purpose::STANDARD, Engine as _};

use crate::error::{Result, ServerError};

/// 把紧凑 JWT 编码为传输格式
pub fn encode(compact: &str) -> String {
    STANDARD.encode(compact.as_bytes())
}

/// 从传输格式还原紧凑 JWT
pub fn decode(wire: &str) -> Result<String> {
    let bytes = STANDARD
        .decode(wire.trim())
        .map_err(|e| ServerError::Malformed(format!("transport encoding: {}", e)))?;

    String::from_utf8(bytes)
        .map_err(|e| ServerError::Malformed(format!("transport encoding is not utf-8: {}", e)))
}
