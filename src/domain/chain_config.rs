//! 多链配置模块
//!
//! 每个链别名对应一份不可变的 `ChainConfig`，在 Provider 构建时创建，
//! 可在任意多个并发构建之间共享。

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::{
    config::Config,
    error::{ChainError, Result},
    utils::chain_normalizer,
};

/// 生态（决定交易构建器与 Provider 实现）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Ecosystem {
    Evm,
    Solana,
    Utxo,
    Xrp,
    Tron,
    Substrate,
}

impl Ecosystem {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Evm => "evm",
            Self::Solana => "solana",
            Self::Utxo => "utxo",
            Self::Xrp => "xrp",
            Self::Tron => "tron",
            Self::Substrate => "substrate",
        }
    }
}

/// 加密曲线类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CurveType {
    /// secp256k1 (EVM, Bitcoin, Tron, XRP)
    Secp256k1,
    /// ed25519 (Solana, Substrate 的 ed25519 账户)
    Ed25519,
}

/// 地址编码格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AddressFormat {
    /// 十六进制 0x... (EVM)
    Hex,
    /// Base58 32 字节公钥 (Solana)
    SolanaBase58,
    /// Bitcoin 全格式（legacy / segwit / taproot）
    Bitcoin,
    /// XRP classic 地址（r...）
    XrpBase58Check,
    /// Tron Base58Check（T...）
    TronBase58Check,
    /// SS58 (Substrate)
    SS58,
}

/// Bitcoin 网络
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UtxoNetwork {
    Mainnet,
    Testnet,
    Regtest,
}

impl UtxoNetwork {
    pub fn to_bitcoin(self) -> bitcoin::Network {
        match self {
            Self::Mainnet => bitcoin::Network::Bitcoin,
            Self::Testnet => bitcoin::Network::Testnet,
            Self::Regtest => bitcoin::Network::Regtest,
        }
    }
}

/// 各生态专属常量
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "ecosystem", rename_all = "lowercase")]
pub enum ChainParams {
    Evm {
        chain_id: u64,
    },
    Solana {
        lamports_per_signature: u64,
    },
    Utxo {
        network: UtxoNetwork,
        /// 低于该值的找零并入手续费
        dust_threshold: u64,
        min_confirmations: u32,
    },
    Xrp {
        base_reserve_drops: u64,
        owner_reserve_drops: u64,
        /// LastLedgerSequence = 当前账本 + offset
        ledger_offset: u32,
    },
    Tron {
        bandwidth_price_sun: u64,
        energy_price_sun: u64,
        default_fee_limit_sun: u64,
    },
    Substrate {
        ss58_prefix: u8,
        existential_deposit: u128,
        pallet: String,
        storage_item: String,
    },
}

impl ChainParams {
    pub fn ecosystem(&self) -> Ecosystem {
        match self {
            Self::Evm { .. } => Ecosystem::Evm,
            Self::Solana { .. } => Ecosystem::Solana,
            Self::Utxo { .. } => Ecosystem::Utxo,
            Self::Xrp { .. } => Ecosystem::Xrp,
            Self::Tron { .. } => Ecosystem::Tron,
            Self::Substrate { .. } => Ecosystem::Substrate,
        }
    }
}

/// 链配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainConfig {
    /// 规范别名（ethereum, solana, bitcoin-testnet ...）
    pub alias: String,
    /// 链名称
    pub name: String,
    /// 原生币符号
    pub symbol: String,
    /// 原生币精度
    pub decimals: u32,
    /// 加密曲线类型
    pub curve_type: CurveType,
    /// 地址格式
    pub address_format: AddressFormat,
    /// 是否为测试网
    pub is_testnet: bool,
    /// RPC 端点
    pub rpc_url: String,
    /// 生态专属常量
    pub params: ChainParams,
}

impl ChainConfig {
    pub fn ecosystem(&self) -> Ecosystem {
        self.params.ecosystem()
    }

    /// EVM chain id（非 EVM 链返回 None）
    pub fn evm_chain_id(&self) -> Option<u64> {
        match self.params {
            ChainParams::Evm { chain_id } => Some(chain_id),
            _ => None,
        }
    }
}

/// 链配置注册表
#[derive(Debug, Clone)]
pub struct ChainRegistry {
    configs: HashMap<String, ChainConfig>,
}

impl ChainRegistry {
    /// 创建预配置的注册表
    pub fn new() -> Self {
        let mut registry = Self {
            configs: HashMap::new(),
        };

        registry.register_default_chains();
        registry
    }

    /// 创建注册表并应用配置中的 RPC 覆盖
    pub fn with_config(config: &Config) -> Self {
        let mut registry = Self::new();
        for (alias, url) in &config.rpc.endpoints {
            match chain_normalizer::normalize_chain_identifier(alias) {
                Ok(canonical) => {
                    if let Some(chain) = registry.configs.get_mut(canonical) {
                        tracing::debug!(chain = %canonical, url = %url, "RPC endpoint overridden");
                        chain.rpc_url = url.clone();
                    }
                }
                Err(e) => {
                    tracing::warn!(alias = %alias, error = %e, "Ignoring RPC override for unknown chain");
                }
            }
        }
        for chain in registry.configs.values_mut() {
            if let ChainParams::Utxo {
                dust_threshold,
                min_confirmations,
                ..
            } = &mut chain.params
            {
                *dust_threshold = config.utxo.dust_threshold;
                *min_confirmations = config.utxo.min_confirmations;
            }
        }
        registry
    }

    /// 注册默认支持的链
    fn register_default_chains(&mut self) {
        // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
        // EVM
        // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
        for (alias, name, symbol, chain_id, testnet, url) in [
            ("ethereum", "Ethereum", "ETH", 1u64, false, "https://eth.llamarpc.com"),
            ("sepolia", "Ethereum Sepolia", "ETH", 11155111, true, "https://rpc.sepolia.org"),
            ("polygon", "Polygon", "POL", 137, false, "https://polygon-rpc.com"),
            ("bsc", "BNB Smart Chain", "BNB", 56, false, "https://bsc-dataseed.binance.org"),
        ] {
            self.register(ChainConfig {
                alias: alias.to_string(),
                name: name.to_string(),
                symbol: symbol.to_string(),
                decimals: 18,
                curve_type: CurveType::Secp256k1,
                address_format: AddressFormat::Hex,
                is_testnet: testnet,
                rpc_url: url.to_string(),
                params: ChainParams::Evm { chain_id },
            });
        }

        // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
        // Solana
        // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
        for (alias, name, testnet, url) in [
            ("solana", "Solana", false, "https://api.mainnet-beta.solana.com"),
            ("solana-devnet", "Solana Devnet", true, "https://api.devnet.solana.com"),
        ] {
            self.register(ChainConfig {
                alias: alias.to_string(),
                name: name.to_string(),
                symbol: "SOL".to_string(),
                decimals: 9,
                curve_type: CurveType::Ed25519,
                address_format: AddressFormat::SolanaBase58,
                is_testnet: testnet,
                rpc_url: url.to_string(),
                params: ChainParams::Solana {
                    lamports_per_signature: 5_000,
                },
            });
        }

        // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
        // Bitcoin (UTXO)
        // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
        for (alias, name, network, url) in [
            ("bitcoin", "Bitcoin", UtxoNetwork::Mainnet, "https://blockstream.info/api"),
            (
                "bitcoin-testnet",
                "Bitcoin Testnet",
                UtxoNetwork::Testnet,
                "https://blockstream.info/testnet/api",
            ),
        ] {
            self.register(ChainConfig {
                alias: alias.to_string(),
                name: name.to_string(),
                symbol: "BTC".to_string(),
                decimals: 8,
                curve_type: CurveType::Secp256k1,
                address_format: AddressFormat::Bitcoin,
                is_testnet: network != UtxoNetwork::Mainnet,
                rpc_url: url.to_string(),
                params: ChainParams::Utxo {
                    network,
                    dust_threshold: 546,
                    min_confirmations: 1,
                },
            });
        }

        // XRP Ledger
        self.register(ChainConfig {
            alias: "xrp".to_string(),
            name: "XRP Ledger".to_string(),
            symbol: "XRP".to_string(),
            decimals: 6,
            curve_type: CurveType::Secp256k1,
            address_format: AddressFormat::XrpBase58Check,
            is_testnet: false,
            rpc_url: "https://s1.ripple.com:51234".to_string(),
            params: ChainParams::Xrp {
                base_reserve_drops: 1_000_000,
                owner_reserve_drops: 200_000,
                ledger_offset: 20,
            },
        });

        // Tron
        self.register(ChainConfig {
            alias: "tron".to_string(),
            name: "Tron".to_string(),
            symbol: "TRX".to_string(),
            decimals: 6,
            curve_type: CurveType::Secp256k1,
            address_format: AddressFormat::TronBase58Check,
            is_testnet: false,
            rpc_url: "https://api.trongrid.io".to_string(),
            params: ChainParams::Tron {
                bandwidth_price_sun: 1_000,
                energy_price_sun: 210,
                default_fee_limit_sun: 100_000_000,
            },
        });

        // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
        // Substrate（只读）
        // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
        for (alias, name, symbol, decimals, prefix, ed, url) in [
            (
                "polkadot",
                "Polkadot",
                "DOT",
                10u32,
                0u8,
                10_000_000_000u128,
                "https://rpc.polkadot.io",
            ),
            (
                "kusama",
                "Kusama",
                "KSM",
                12,
                2,
                333_333_333,
                "https://kusama-rpc.polkadot.io",
            ),
        ] {
            self.register(ChainConfig {
                alias: alias.to_string(),
                name: name.to_string(),
                symbol: symbol.to_string(),
                decimals,
                curve_type: CurveType::Ed25519,
                address_format: AddressFormat::SS58,
                is_testnet: false,
                rpc_url: url.to_string(),
                params: ChainParams::Substrate {
                    ss58_prefix: prefix,
                    existential_deposit: ed,
                    pallet: "System".to_string(),
                    storage_item: "Account".to_string(),
                },
            });
        }
    }

    /// 注册链配置（同名覆盖）
    pub fn register(&mut self, config: ChainConfig) {
        self.configs.insert(config.alias.clone(), config);
    }

    /// 通过任意别名（ETH、sol、btc-testnet ...）获取配置
    pub fn get(&self, chain: &str) -> Result<&ChainConfig> {
        let canonical = chain_normalizer::normalize_chain_identifier(chain)?;
        self.configs
            .get(canonical)
            .ok_or_else(|| ChainError::UnsupportedChain(chain.to_string()))
    }

    /// 按生态分组获取所有链
    pub fn get_by_ecosystem(&self, ecosystem: Ecosystem) -> Vec<&ChainConfig> {
        let mut chains: Vec<_> = self
            .configs
            .values()
            .filter(|c| c.ecosystem() == ecosystem)
            .collect();
        chains.sort_by(|a, b| a.alias.cmp(&b.alias));
        chains
    }

    /// 列出所有支持的链
    pub fn list_all(&self) -> Vec<&ChainConfig> {
        let mut chains: Vec<_> = self.configs.values().collect();
        chains.sort_by(|a, b| a.alias.cmp(&b.alias));
        chains
    }

    /// 验证链配置完整性
    pub fn validate_configs(&self) -> std::result::Result<(), Vec<String>> {
        let mut errors = Vec::new();

        for (alias, config) in &self.configs {
            if config.name.is_empty() {
                errors.push(format!("Chain {} has empty name", alias));
            }
            if config.symbol.is_empty() {
                errors.push(format!("Chain {} has empty symbol", alias));
            }
            if config.decimals > 24 {
                errors.push(format!(
                    "Chain {} has unreasonable decimals: {}",
                    alias, config.decimals
                ));
            }
            if !config.rpc_url.starts_with("http://") && !config.rpc_url.starts_with("https://") {
                errors.push(format!("Chain {} has invalid rpc_url: {}", alias, config.rpc_url));
            }

            // 验证曲线类型、地址格式与生态匹配
            let compatible = matches!(
                (config.ecosystem(), config.curve_type, config.address_format),
                (Ecosystem::Evm, CurveType::Secp256k1, AddressFormat::Hex)
                    | (Ecosystem::Solana, CurveType::Ed25519, AddressFormat::SolanaBase58)
                    | (Ecosystem::Utxo, CurveType::Secp256k1, AddressFormat::Bitcoin)
                    | (Ecosystem::Xrp, CurveType::Secp256k1, AddressFormat::XrpBase58Check)
                    | (Ecosystem::Tron, CurveType::Secp256k1, AddressFormat::TronBase58Check)
                    | (Ecosystem::Substrate, CurveType::Ed25519, AddressFormat::SS58)
            );
            if !compatible {
                errors.push(format!(
                    "Chain {} has incompatible ecosystem/curve/address_format: {:?} / {:?} / {:?}",
                    alias,
                    config.ecosystem(),
                    config.curve_type,
                    config.address_format
                ));
            }

            match &config.params {
                ChainParams::Evm { chain_id } if *chain_id == 0 => {
                    errors.push(format!("Chain {} has chain_id 0", alias));
                }
                ChainParams::Substrate { ss58_prefix, .. } if *ss58_prefix >= 64 => {
                    errors.push(format!(
                        "Chain {} uses two-byte SS58 prefix {}, only simple prefixes are supported",
                        alias, ss58_prefix
                    ));
                }
                _ => {}
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

impl Default for ChainRegistry {
    fn default() -> Self {
        Self::new()
    }
}
