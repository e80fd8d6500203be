//! 哈希原语
//!
//! - twox：XXHash64 双种子拼接，用于 Substrate 模块/存储名
//! - blake2：可调输出长度，用于 map 型存储键与 SS58 校验和
//! - sha256d / keccak256 / sha512_half：各链交易标识

pub mod xxhash;

use blake2::{digest::consts::U16, Blake2b, Blake2b512};
use sha2::{Digest, Sha256, Sha512};
use sha3::Keccak256;

use crate::error::{ChainError, Result};

pub use xxhash::xxh64;

type Blake2b128 = Blake2b<U16>;

/// twox_64：单种子 XXH64，小端输出
pub fn twox_64(data: &[u8]) -> [u8; 8] {
    xxh64(data, 0).to_le_bytes()
}

/// twox_128：种子 0 与种子 1 的 XXH64 拼接（共 16 字节）
pub fn twox_128(data: &[u8]) -> [u8; 16] {
    let mut out = [0u8; 16];
    out[..8].copy_from_slice(&xxh64(data, 0).to_le_bytes());
    out[8..].copy_from_slice(&xxh64(data, 1).to_le_bytes());
    out
}

/// 16 字节 Blake2b 摘要
pub fn blake2_128(data: &[u8]) -> [u8; 16] {
    Blake2b128::digest(data).into()
}

/// hash-then-concat：blake2_128(data) ‖ data
pub fn blake2_128_concat(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(16 + data.len());
    out.extend_from_slice(&blake2_128(data));
    out.extend_from_slice(data);
    out
}

/// 可调输出长度（1..=64 字节）的 Blake2b
pub fn blake2b(data: &[u8], out_len: usize) -> Result<Vec<u8>> {
    use blake2::{
        digest::{Update, VariableOutput},
        Blake2bVar,
    };

    let mut hasher = Blake2bVar::new(out_len)
        .map_err(|_| ChainError::encoding(format!("invalid blake2b output size: {}", out_len)))?;
    hasher.update(data);
    let mut out = vec![0u8; out_len];
    hasher
        .finalize_variable(&mut out)
        .map_err(|_| ChainError::encoding("blake2b finalize failed"))?;
    Ok(out)
}

pub fn blake2_512(data: &[u8]) -> [u8; 64] {
    let digest = Blake2b512::digest(data);
    let mut out = [0u8; 64];
    out.copy_from_slice(&digest);
    out
}

pub fn sha256(data: &[u8]) -> [u8; 32] {
    Sha256::digest(data).into()
}

/// 双重 SHA-256（Base58Check 校验和、Bitcoin txid）
pub fn sha256d(data: &[u8]) -> [u8; 32] {
    sha256(&sha256(data))
}

pub fn keccak256(data: &[u8]) -> [u8; 32] {
    Keccak256::digest(data).into()
}

/// SHA-512 前 32 字节（XRP Ledger 交易哈希）
pub fn sha512_half(data: &[u8]) -> [u8; 32] {
    let full = Sha512::digest(data);
    let mut out = [0u8; 32];
    out.copy_from_slice(&full[..32]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_twox_128_storage_prefixes() {
        assert_eq!(
            hex::encode(twox_128(b"System")),
            "26aa394eea5630e07c48ae0c9558cef7"
        );
        assert_eq!(
            hex::encode(twox_128(b"Account")),
            "b99d880ec681799c0cf30e8886371da9"
        );
    }

    #[test]
    fn test_blake2_128_concat() {
        let key = [0u8; 32];
        let out = blake2_128_concat(&key);
        assert_eq!(out.len(), 48);
        assert_eq!(hex::encode(&out[..16]), "ff0f22492f44bac4c4b30ae58d0e8daa");
        assert_eq!(&out[16..], &key);
    }

    #[test]
    fn test_blake2b_variable_matches_fixed() {
        let data = b"txforge";
        assert_eq!(blake2b(data, 16).unwrap(), blake2_128(data).to_vec());
        assert_eq!(blake2b(data, 64).unwrap(), blake2_512(data).to_vec());
        assert!(blake2b(data, 65).is_err());
    }

    #[test]
    fn test_sha256d() {
        assert_eq!(
            hex::encode(sha256d(b"")),
            "5df6e0e2761359d30a8275058e299fcc0381534545f55cf43e41983f5d4c9456"
        );
    }

    #[test]
    fn test_keccak256_empty() {
        assert_eq!(
            hex::encode(keccak256(b"")),
            "c5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470"
        );
    }
}
