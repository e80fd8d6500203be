//! 链标识符标准化模块
//!
//! 统一所有链标识符的处理逻辑：别名、符号、EVM chain id 都映射到规范别名。

use std::collections::HashMap;

use once_cell::sync::Lazy;

use crate::{
    domain::chain_config::Ecosystem,
    error::{ChainError, Result},
};

/// 链标识符配置
#[derive(Debug, Clone)]
pub struct ChainIdentifier {
    /// 规范名称（小写，与 ChainConfig.alias 一致）
    pub canonical_name: &'static str,
    /// 生态
    pub ecosystem: Ecosystem,
    /// 符号（大写）
    pub symbol: &'static str,
    /// 别名列表（查找时大小写不敏感）
    pub aliases: &'static [&'static str],
}

/// 链标识符注册表（静态初始化，键为小写）
static CHAIN_REGISTRY: Lazy<HashMap<String, ChainIdentifier>> = Lazy::new(|| {
    let chains = vec![
        ChainIdentifier {
            canonical_name: "ethereum",
            ecosystem: Ecosystem::Evm,
            symbol: "ETH",
            aliases: &["eth", "mainnet", "1"],
        },
        ChainIdentifier {
            canonical_name: "sepolia",
            ecosystem: Ecosystem::Evm,
            symbol: "ETH",
            aliases: &["eth-sepolia", "11155111"],
        },
        ChainIdentifier {
            canonical_name: "polygon",
            ecosystem: Ecosystem::Evm,
            symbol: "POL",
            aliases: &["matic", "pol", "137"],
        },
        ChainIdentifier {
            canonical_name: "bsc",
            ecosystem: Ecosystem::Evm,
            symbol: "BNB",
            aliases: &["binance", "bnb", "56"],
        },
        ChainIdentifier {
            canonical_name: "solana",
            ecosystem: Ecosystem::Solana,
            symbol: "SOL",
            aliases: &["sol", "solana-mainnet"],
        },
        ChainIdentifier {
            canonical_name: "solana-devnet",
            ecosystem: Ecosystem::Solana,
            symbol: "SOL",
            aliases: &["sol-devnet", "devnet"],
        },
        ChainIdentifier {
            canonical_name: "bitcoin",
            ecosystem: Ecosystem::Utxo,
            symbol: "BTC",
            aliases: &["btc"],
        },
        ChainIdentifier {
            canonical_name: "bitcoin-testnet",
            ecosystem: Ecosystem::Utxo,
            symbol: "BTC",
            aliases: &["btc-testnet", "testnet3", "tbtc"],
        },
        ChainIdentifier {
            canonical_name: "xrp",
            ecosystem: Ecosystem::Xrp,
            symbol: "XRP",
            aliases: &["ripple", "xrpl"],
        },
        ChainIdentifier {
            canonical_name: "tron",
            ecosystem: Ecosystem::Tron,
            symbol: "TRX",
            aliases: &["trx"],
        },
        ChainIdentifier {
            canonical_name: "polkadot",
            ecosystem: Ecosystem::Substrate,
            symbol: "DOT",
            aliases: &["dot"],
        },
        ChainIdentifier {
            canonical_name: "kusama",
            ecosystem: Ecosystem::Substrate,
            symbol: "KSM",
            aliases: &["ksm"],
        },
    ];

    let mut registry = HashMap::new();
    for chain in chains {
        registry.insert(chain.canonical_name.to_string(), chain.clone());
        for alias in chain.aliases {
            registry.insert(alias.to_lowercase(), chain.clone());
        }
    }

    registry
});

/// 标准化链标识符
///
/// 接受别名、符号或 EVM chain id，返回规范别名。
///
/// ```rust
/// # use txforge::utils::chain_normalizer::normalize_chain_identifier;
/// assert_eq!(normalize_chain_identifier("ETH").unwrap(), "ethereum");
/// assert_eq!(normalize_chain_identifier("137").unwrap(), "polygon");
/// assert_eq!(normalize_chain_identifier("TRX").unwrap(), "tron");
/// ```
pub fn normalize_chain_identifier(input: &str) -> Result<&'static str> {
    get_chain_identifier(input).map(|chain| chain.canonical_name)
}

/// 获取链标识符配置
pub fn get_chain_identifier(input: &str) -> Result<&'static ChainIdentifier> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(ChainError::UnsupportedChain(
            "chain identifier cannot be empty".to_string(),
        ));
    }

    CHAIN_REGISTRY
        .get(&trimmed.to_lowercase())
        .ok_or_else(|| ChainError::UnsupportedChain(trimmed.to_string()))
}

/// 全部规范别名（已排序）
pub fn canonical_names() -> Vec<&'static str> {
    let mut names: Vec<&'static str> = CHAIN_REGISTRY.values().map(|c| c.canonical_name).collect();
    names.sort_unstable();
    names.dedup();
    names
}

/// 判断是否为 EVM 链
pub fn is_evm_chain(chain: &str) -> bool {
    get_chain_identifier(chain)
        .map(|c| c.ecosystem == Ecosystem::Evm)
        .unwrap_or(false)
}

/// 获取链符号
pub fn get_chain_symbol(chain: &str) -> Result<&'static str> {
    get_chain_identifier(chain).map(|c| c.symbol)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_ethereum() {
        assert_eq!(normalize_chain_identifier("ETH").unwrap(), "ethereum");
        assert_eq!(normalize_chain_identifier("eth").unwrap(), "ethereum");
        assert_eq!(normalize_chain_identifier("Ethereum").unwrap(), "ethereum");
        assert_eq!(normalize_chain_identifier("1").unwrap(), "ethereum");
    }

    #[test]
    fn test_normalize_non_evm() {
        assert_eq!(normalize_chain_identifier("SOL").unwrap(), "solana");
        assert_eq!(normalize_chain_identifier(" btc-testnet ").unwrap(), "bitcoin-testnet");
        assert_eq!(normalize_chain_identifier("Ripple").unwrap(), "xrp");
        assert_eq!(normalize_chain_identifier("KSM").unwrap(), "kusama");
    }

    #[test]
    fn test_is_evm_chain() {
        assert!(is_evm_chain("ethereum"));
        assert!(is_evm_chain("BNB"));
        assert!(is_evm_chain("polygon"));
        assert!(!is_evm_chain("solana"));
        assert!(!is_evm_chain("tron"));
        assert!(!is_evm_chain("unknown"));
    }

    #[test]
    fn test_get_chain_symbol() {
        assert_eq!(get_chain_symbol("trx").unwrap(), "TRX");
        assert_eq!(get_chain_symbol("polkadot").unwrap(), "DOT");
    }

    #[test]
    fn test_invalid_chain() {
        assert!(matches!(
            normalize_chain_identifier("invalid_chain"),
            Err(ChainError::UnsupportedChain(_))
        ));
        assert!(normalize_chain_identifier("").is_err());
    }
}
