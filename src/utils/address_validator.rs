//! 地址验证模块
//!
//! 统一的地址验证逻辑：每个链别名只接受自己格式的地址，
//! 校验在任何编码/网络工作之前同步完成。解析函数同时返回解码后的字节，
//! 供各生态构建器直接使用。

use std::str::FromStr;

use crate::{
    codec::{base58, ss58, BITCOIN_ALPHABET, XRP_ALPHABET},
    crypto::keccak256,
    domain::chain_config::{AddressFormat, ChainConfig, ChainParams, UtxoNetwork},
    error::{ChainError, Result},
};

/// Tron 地址版本字节
pub const TRON_ADDRESS_PREFIX: u8 = 0x41;
/// XRP classic 地址版本字节
pub const XRP_ACCOUNT_PREFIX: u8 = 0x00;

/// 地址验证器
pub struct AddressValidator;

impl AddressValidator {
    /// 按链配置验证地址格式
    ///
    /// # 返回
    /// - Ok(()): 地址有效
    /// - Err(InvalidAddress): 地址无效，带链别名和原因
    pub fn validate(config: &ChainConfig, address: &str) -> Result<()> {
        let chain = config.alias.as_str();
        match config.address_format {
            AddressFormat::Hex => Self::parse_evm(chain, address).map(|_| ()),
            AddressFormat::SolanaBase58 => Self::parse_solana(chain, address).map(|_| ()),
            AddressFormat::Bitcoin => {
                let network = match config.params {
                    ChainParams::Utxo { network, .. } => network,
                    _ => UtxoNetwork::Mainnet,
                };
                Self::parse_bitcoin(chain, address, network).map(|_| ())
            }
            AddressFormat::XrpBase58Check => Self::parse_xrp(chain, address).map(|_| ()),
            AddressFormat::TronBase58Check => Self::parse_tron(chain, address).map(|_| ()),
            AddressFormat::SS58 => {
                let prefix = match config.params {
                    ChainParams::Substrate { ss58_prefix, .. } => ss58_prefix,
                    _ => 42,
                };
                Self::parse_ss58(chain, address, prefix).map(|_| ())
            }
        }
    }

    pub fn is_valid(config: &ChainConfig, address: &str) -> bool {
        Self::validate(config, address).is_ok()
    }

    /// 验证EVM地址（支持EIP-55 Checksum），返回 20 字节
    pub fn parse_evm(chain: &str, address: &str) -> Result<[u8; 20]> {
        let hex_part = address.strip_prefix("0x").ok_or_else(|| {
            ChainError::invalid_address_with_reason(chain, address, "missing 0x prefix")
        })?;

        if hex_part.len() != 40 {
            return Err(ChainError::invalid_address_with_reason(
                chain,
                address,
                "expected 40 hex characters",
            ));
        }

        if !hex_part.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(ChainError::invalid_address_with_reason(
                chain,
                address,
                "non-hex character",
            ));
        }

        // EIP-55 Checksum验证（混合大小写时强制）
        let has_upper = hex_part.chars().any(|c| c.is_ascii_uppercase());
        let has_lower = hex_part.chars().any(|c| c.is_ascii_lowercase());
        if has_upper && has_lower && !Self::verify_eip55_checksum(hex_part) {
            return Err(ChainError::invalid_address_with_reason(
                chain,
                address,
                "EIP-55 checksum mismatch",
            ));
        }

        let mut out = [0u8; 20];
        hex::decode_to_slice(hex_part, &mut out)
            .map_err(|e| ChainError::invalid_address_with_reason(chain, address, e.to_string()))?;
        Ok(out)
    }

    /// https://eips.ethereum.org/EIPS/eip-55
    fn verify_eip55_checksum(hex_part: &str) -> bool {
        let hash = keccak256(hex_part.to_lowercase().as_bytes());

        hex_part.chars().enumerate().all(|(i, ch)| {
            if !ch.is_ascii_alphabetic() {
                return true;
            }
            let hash_byte = hash[i / 2];
            let nibble = if i % 2 == 0 {
                hash_byte >> 4
            } else {
                hash_byte & 0x0f
            };
            ch.is_ascii_uppercase() == (nibble >= 8)
        })
    }

    /// EIP-55 校验和格式
    pub fn to_checksum_address(address: &[u8; 20]) -> String {
        let lower = hex::encode(address);
        let hash = keccak256(lower.as_bytes());
        let mut out = String::with_capacity(42);
        out.push_str("0x");
        for (i, ch) in lower.chars().enumerate() {
            let nibble = if i % 2 == 0 {
                hash[i / 2] >> 4
            } else {
                hash[i / 2] & 0x0f
            };
            if ch.is_ascii_alphabetic() && nibble >= 8 {
                out.push(ch.to_ascii_uppercase());
            } else {
                out.push(ch);
            }
        }
        out
    }

    /// 验证Solana地址（Base58编码，32字节）
    pub fn parse_solana(chain: &str, address: &str) -> Result<[u8; 32]> {
        let decoded = base58::decode(address).map_err(|e| {
            ChainError::invalid_address_with_reason(chain, address, e.to_string())
        })?;
        <[u8; 32]>::try_from(decoded.as_slice()).map_err(|_| {
            ChainError::invalid_address_with_reason(
                chain,
                address,
                format!("expected 32 bytes, got {}", decoded.len()),
            )
        })
    }

    /// 验证Bitcoin地址（legacy / segwit / taproot），并要求网络匹配
    pub fn parse_bitcoin(
        chain: &str,
        address: &str,
        network: UtxoNetwork,
    ) -> Result<bitcoin::Address> {
        bitcoin::Address::from_str(address)
            .map_err(|e| ChainError::invalid_address_with_reason(chain, address, e.to_string()))?
            .require_network(network.to_bitcoin())
            .map_err(|e| ChainError::invalid_address_with_reason(chain, address, e.to_string()))
    }

    /// 验证XRP classic地址，返回 20 字节 AccountID
    pub fn parse_xrp(chain: &str, address: &str) -> Result<[u8; 20]> {
        if !address.starts_with('r') {
            return Err(ChainError::invalid_address_with_reason(
                chain,
                address,
                "classic address must start with 'r'",
            ));
        }
        let (version, body) = base58::decode_check(address, &XRP_ALPHABET)
            .map_err(|e| ChainError::invalid_address_with_reason(chain, address, e.to_string()))?;
        if version != XRP_ACCOUNT_PREFIX {
            return Err(ChainError::invalid_address_with_reason(
                chain,
                address,
                format!("unexpected version byte 0x{:02x}", version),
            ));
        }
        <[u8; 20]>::try_from(body.as_slice()).map_err(|_| {
            ChainError::invalid_address_with_reason(chain, address, "expected 20-byte account id")
        })
    }

    /// 验证Tron地址（Base58Check 或 41 开头的 hex），返回 21 字节
    pub fn parse_tron(chain: &str, address: &str) -> Result<[u8; 21]> {
        let raw = if address.len() == 42 && address.starts_with("41") {
            hex::decode(address).map_err(|e| {
                ChainError::invalid_address_with_reason(chain, address, e.to_string())
            })?
        } else {
            let (version, body) = base58::decode_check(address, &BITCOIN_ALPHABET).map_err(|e| {
                ChainError::invalid_address_with_reason(chain, address, e.to_string())
            })?;
            let mut raw = Vec::with_capacity(21);
            raw.push(version);
            raw.extend_from_slice(&body);
            raw
        };

        if raw.first() != Some(&TRON_ADDRESS_PREFIX) {
            return Err(ChainError::invalid_address_with_reason(
                chain,
                address,
                "missing 0x41 version byte",
            ));
        }
        <[u8; 21]>::try_from(raw.as_slice()).map_err(|_| {
            ChainError::invalid_address_with_reason(chain, address, "expected 21-byte address")
        })
    }

    /// Tron 21 字节地址 → Base58Check
    pub fn tron_to_base58(raw: &[u8; 21]) -> String {
        base58::encode_check(raw[0], &raw[1..], &BITCOIN_ALPHABET)
    }

    /// 验证SS58地址并要求前缀匹配，返回 32 字节公钥
    pub fn parse_ss58(chain: &str, address: &str, expected_prefix: u8) -> Result<[u8; 32]> {
        let (prefix, key) = ss58::decode(address)
            .map_err(|e| ChainError::invalid_address_with_reason(chain, address, e.to_string()))?;
        if prefix != expected_prefix {
            return Err(ChainError::invalid_address_with_reason(
                chain,
                address,
                format!("ss58 prefix {} does not match {}", prefix, expected_prefix),
            ));
        }
        Ok(key)
    }
}
