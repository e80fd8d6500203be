// RPC响应校验模块 - 防止链上数据污染

use serde_json::Value;

use crate::error::{ChainError, Result};

/// 解析 JSON-RPC 2.0 响应，返回 result 字段
///
/// error 对象映射为带 code 的 `ChainError::Rpc`。
pub fn extract_result(chain: &str, json: Value) -> Result<Value> {
    // 检查是否有error字段
    if let Some(error) = json.get("error").filter(|e| !e.is_null()) {
        let error_msg = error
            .get("message")
            .and_then(|m| m.as_str())
            .unwrap_or("Unknown RPC error");
        return Err(match error.get("code").and_then(|c| c.as_i64()) {
            Some(code) => ChainError::rpc_with_code(chain, code, error_msg),
            None => ChainError::rpc(chain, error_msg),
        });
    }

    // 检查jsonrpc版本
    if let Some(version) = json.get("jsonrpc") {
        if version.as_str() != Some("2.0") {
            return Err(ChainError::rpc(
                chain,
                format!("Unsupported JSON-RPC version: {}", version),
            ));
        }
    }

    match json {
        Value::Object(mut map) => map
            .remove("result")
            .ok_or_else(|| ChainError::rpc(chain, "Missing result field in RPC response")),
        _ => Err(ChainError::rpc(chain, "RPC response is not an object")),
    }
}

/// 验证 0x 十六进制数量（余额等 u128 值）
pub fn parse_quantity_u128(chain: &str, value: &Value) -> Result<u128> {
    let hex_str = value
        .as_str()
        .ok_or_else(|| ChainError::rpc(chain, format!("expected hex quantity, got {}", value)))?;
    let digits = hex_str.trim_start_matches("0x");

    // 验证长度（u128 最多 32 个十六进制字符）
    if digits.is_empty() || digits.len() > 32 {
        return Err(ChainError::rpc(
            chain,
            format!("Quantity hex string has invalid length: {}", hex_str),
        ));
    }

    u128::from_str_radix(digits, 16)
        .map_err(|e| ChainError::rpc(chain, format!("Failed to parse quantity {}: {}", hex_str, e)))
}

/// 验证 0x 十六进制数量（nonce、gas 等 u64 值）
pub fn parse_quantity_u64(chain: &str, value: &Value) -> Result<u64> {
    let quantity = parse_quantity_u128(chain, value)?;
    u64::try_from(quantity)
        .map_err(|_| ChainError::rpc(chain, format!("Quantity {} exceeds u64", quantity)))
}

/// 验证交易哈希格式（32 字节十六进制）
pub fn validate_tx_hash(chain: &str, tx_hash: &str) -> Result<String> {
    // 移除0x前缀
    let hash = tx_hash.trim_start_matches("0x");

    if hash.len() != 64 {
        return Err(ChainError::invalid_hash(
            chain,
            tx_hash,
            format!("expected 64 hex characters, got {}", hash.len()),
        ));
    }

    // 验证是否为有效的十六进制字符串
    if !hash.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(ChainError::invalid_hash(
            chain,
            tx_hash,
            "contains non-hex characters",
        ));
    }

    Ok(format!("0x{}", hash.to_lowercase()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extract_result() {
        let ok = json!({ "jsonrpc": "2.0", "id": 1, "result": "0x5" });
        assert_eq!(extract_result("ethereum", ok).unwrap(), json!("0x5"));

        let err = json!({ "jsonrpc": "2.0", "id": 1, "error": { "code": -32000, "message": "nonce too low" } });
        assert_eq!(
            extract_result("ethereum", err).unwrap_err(),
            ChainError::rpc_with_code("ethereum", -32000, "nonce too low")
        );

        assert!(extract_result("ethereum", json!({ "jsonrpc": "2.0", "id": 1 })).is_err());
        assert!(extract_result("ethereum", json!({ "jsonrpc": "1.0", "result": 1 })).is_err());
    }

    #[test]
    fn test_null_result_is_kept() {
        let json = json!({ "jsonrpc": "2.0", "id": 1, "result": null });
        assert_eq!(extract_result("solana", json).unwrap(), Value::Null);
    }

    #[test]
    fn test_parse_quantity() {
        assert_eq!(
            parse_quantity_u128("ethereum", &json!("0x1bc16d674ec80000")).unwrap(),
            2_000_000_000_000_000_000
        ); // 2 ETH
        assert_eq!(parse_quantity_u64("ethereum", &json!("0x0")).unwrap(), 0);
        assert!(parse_quantity_u64("ethereum", &json!("invalid")).is_err());
        assert!(parse_quantity_u64("ethereum", &json!(5)).is_err());
        assert!(parse_quantity_u64("ethereum", &json!("0x10000000000000000")).is_err());
    }

    #[test]
    fn test_validate_tx_hash() {
        let hash = "0x1234567890ABCDEF1234567890abcdef1234567890abcdef1234567890abcdef";
        assert_eq!(
            validate_tx_hash("ethereum", hash).unwrap(),
            hash.to_lowercase()
        );
        assert!(validate_tx_hash("ethereum", "invalid").is_err());
    }
}
