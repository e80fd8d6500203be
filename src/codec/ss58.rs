//! SS58 地址编解码（单字节网络前缀）
//!
//! 布局：prefix(1) ‖ pubkey(32) ‖ blake2_512("SS58PRE" ‖ prefix ‖ pubkey)[..2]

use super::base58;
use crate::{
    crypto::blake2_512,
    error::{ChainError, Result},
};

const SS58_SALT: &[u8] = b"SS58PRE";
const CHECKSUM_LEN: usize = 2;

fn checksum(body: &[u8]) -> [u8; CHECKSUM_LEN] {
    let mut preimage = Vec::with_capacity(SS58_SALT.len() + body.len());
    preimage.extend_from_slice(SS58_SALT);
    preimage.extend_from_slice(body);
    let hash = blake2_512(&preimage);
    [hash[0], hash[1]]
}

pub fn encode(prefix: u8, public_key: &[u8; 32]) -> String {
    let mut data = Vec::with_capacity(1 + 32 + CHECKSUM_LEN);
    data.push(prefix);
    data.extend_from_slice(public_key);
    let sum = checksum(&data);
    data.extend_from_slice(&sum);
    base58::encode(&data)
}

/// 解码 SS58 地址，返回 (prefix, pubkey)
pub fn decode(address: &str) -> Result<(u8, [u8; 32])> {
    let data = base58::decode(address)?;
    if data.len() != 1 + 32 + CHECKSUM_LEN {
        return Err(ChainError::encoding(format!(
            "ss58 payload must be 35 bytes, got {}",
            data.len()
        )));
    }
    let prefix = data[0];
    if prefix >= 64 {
        return Err(ChainError::encoding(format!(
            "ss58 two-byte prefix not supported (first byte {})",
            prefix
        )));
    }
    let (body, sum) = data.split_at(33);
    if checksum(body) != sum {
        return Err(ChainError::encoding("ss58 checksum mismatch"));
    }
    let mut key = [0u8; 32];
    key.copy_from_slice(&body[1..]);
    Ok((prefix, key))
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALICE: &str = "d43593c715fdd31c61141abd04a99fd6822c8558854ccde39a5684e7a56da27d";

    fn alice() -> [u8; 32] {
        let mut key = [0u8; 32];
        key.copy_from_slice(&hex::decode(ALICE).unwrap());
        key
    }

    #[test]
    fn test_known_addresses() {
        assert_eq!(
            encode(42, &alice()),
            "5GrwvaEF5zXb26Fz9rcQpDWS57CtERHpNehXCPcNoHGKutQY"
        );
        assert_eq!(
            encode(0, &alice()),
            "15oF4uVJwmo4TdGW7VfQxNLavjCXviqxT9S1MgbjMNHr6Sp5"
        );
        assert_eq!(
            encode(2, &alice()),
            "HNZata7iMYWmk5RvZRTiAsSDhV8366zq2YGb3tLH5Upf74F"
        );
    }

    #[test]
    fn test_decode() {
        let (prefix, key) = decode("15oF4uVJwmo4TdGW7VfQxNLavjCXviqxT9S1MgbjMNHr6Sp5").unwrap();
        assert_eq!(prefix, 0);
        assert_eq!(key, alice());
    }

    #[test]
    fn test_bad_checksum() {
        // 末字符改动破坏校验和
        assert!(decode("15oF4uVJwmo4TdGW7VfQxNLavjCXviqxT9S1MgbjMNHr6Sp6").is_err());
        assert!(decode("1111").is_err());
    }
}
