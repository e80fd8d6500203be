//! Substrate 账户状态读取
//!
//! 只读路径：存储键推导与 `frame_system::AccountInfo` 的 SCALE 定宽解码。
//! 转账构建不在此处支持。

use serde::Serialize;

use crate::{
    codec::{concat_bytes, read_u128_le, read_u32_le},
    crypto::{blake2_128_concat, twox_128},
    error::{ChainError, Result},
};

/// 4 × u32 计数 + 3 × u128 余额
pub const ACCOUNT_INFO_MIN_LEN: usize = 4 * 4 + 3 * 16;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AccountData {
    pub free: u128,
    pub reserved: u128,
    pub frozen: u128,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AccountInfo {
    pub nonce: u32,
    pub consumers: u32,
    pub providers: u32,
    pub sufficients: u32,
    pub data: AccountData,
}

impl AccountInfo {
    /// 可转出余额（free − frozen）
    pub fn transferable(&self) -> u128 {
        self.data.free.saturating_sub(self.data.frozen)
    }
}

/// 解码 AccountInfo
///
/// 新版 runtime 在末尾追加 `flags: u128`，超出部分忽略。
pub fn decode_account_info(bytes: &[u8]) -> Result<AccountInfo> {
    if bytes.len() < ACCOUNT_INFO_MIN_LEN {
        return Err(ChainError::encoding(format!(
            "account info needs {} bytes, got {}",
            ACCOUNT_INFO_MIN_LEN,
            bytes.len()
        )));
    }

    Ok(AccountInfo {
        nonce: read_u32_le(bytes, 0)?,
        consumers: read_u32_le(bytes, 4)?,
        providers: read_u32_le(bytes, 8)?,
        sufficients: read_u32_le(bytes, 12)?,
        data: AccountData {
            free: read_u128_le(bytes, 16)?,
            reserved: read_u128_le(bytes, 32)?,
            frozen: read_u128_le(bytes, 48)?,
        },
    })
}

/// 存储 map 键：twox128(pallet) ‖ twox128(item) ‖ blake2_128_concat(key)
pub fn storage_map_key(pallet: &str, item: &str, key: &[u8]) -> Vec<u8> {
    concat_bytes(&[
        &twox_128(pallet.as_bytes())[..],
        &twox_128(item.as_bytes())[..],
        &blake2_128_concat(key)[..],
    ])
}

/// `System.Account` 存储键
pub fn account_storage_key(public_key: &[u8; 32]) -> Vec<u8> {
    storage_map_key("System", "Account", public_key)
}

/// 0x 前缀的 hex 键（state_getStorage 参数）
pub fn storage_key_hex(key: &[u8]) -> String {
    format!("0x{}", hex::encode(key))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_zero_with_free_balance() {
        let mut blob = vec![0u8; ACCOUNT_INFO_MIN_LEN];
        blob[16] = 100;
        let info = decode_account_info(&blob).unwrap();
        assert_eq!(
            info,
            AccountInfo {
                nonce: 0,
                consumers: 0,
                providers: 0,
                sufficients: 0,
                data: AccountData {
                    free: 100,
                    reserved: 0,
                    frozen: 0,
                },
            }
        );
    }

    #[test]
    fn test_decode_fields_and_trailing_flags() {
        let mut blob = Vec::new();
        for v in [5u32, 1, 1, 0] {
            blob.extend_from_slice(&v.to_le_bytes());
        }
        for v in [10_000_000_000u128, 25, 3_000_000_000] {
            blob.extend_from_slice(&v.to_le_bytes());
        }
        blob.extend_from_slice(&(1u128 << 127).to_le_bytes());

        let info = decode_account_info(&blob).unwrap();
        assert_eq!(info.nonce, 5);
        assert_eq!(info.providers, 1);
        assert_eq!(info.data.reserved, 25);
        assert_eq!(info.transferable(), 7_000_000_000);
    }

    #[test]
    fn test_decode_rejects_short_blob() {
        assert!(decode_account_info(&[0u8; 63]).is_err());
    }

    #[test]
    fn test_system_account_prefix() {
        let key = account_storage_key(&[0u8; 32]);
        assert_eq!(key.len(), 16 + 16 + 16 + 32);
        assert_eq!(
            hex::encode(&key[..32]),
            "26aa394eea5630e07c48ae0c9558cef7b99d880ec681799c0cf30e8886371da9"
        );
        assert_eq!(&key[48..], &[0u8; 32]);
    }
}
