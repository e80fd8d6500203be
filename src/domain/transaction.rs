//! 跨链交易模型
//!
//! 调用方构造的转账意图、交给外部签名器的签名载荷、
//! 以及用于展示/分类的统一交易视图。

use serde::{Deserialize, Serialize};

use super::{amount::Amount, transaction_status::TransactionStatus};

/// 转账资产
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Asset {
    /// 原生币
    Native,
    /// ERC-20 代币（EVM）
    Erc20 { contract: String, decimals: u32 },
    /// SPL 代币（Solana），代币账户由调用方提供
    SplToken {
        mint: String,
        decimals: u8,
        source_account: String,
        destination_account: String,
    },
    /// TRC-20 代币（Tron）
    Trc20 { contract: String, decimals: u32 },
    /// XRP Ledger 发行资产，金额按十进制字符串传递
    XrpIssued { currency: String, issuer: String },
}

impl Default for Asset {
    fn default() -> Self {
        Self::Native
    }
}

/// 转账意图（单次使用）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferIntent {
    pub from: String,
    pub to: String,
    pub amount: Amount,
    #[serde(default)]
    pub asset: Asset,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memo: Option<String>,
    /// XRP DestinationTag
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination_tag: Option<u32>,
    /// 发送方公钥（hex），UTXO 见证需要
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_key: Option<String>,
    /// 费用/nonce/序列号覆盖
    #[serde(default)]
    pub overrides: RebuildOverrides,
}

impl TransferIntent {
    pub fn native(from: impl Into<String>, to: impl Into<String>, amount: Amount) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            amount,
            asset: Asset::Native,
            memo: None,
            destination_tag: None,
            public_key: None,
            overrides: RebuildOverrides::default(),
        }
    }

    pub fn with_asset(mut self, asset: Asset) -> Self {
        self.asset = asset;
        self
    }

    pub fn with_memo(mut self, memo: impl Into<String>) -> Self {
        self.memo = Some(memo.into());
        self
    }

    pub fn with_destination_tag(mut self, tag: u32) -> Self {
        self.destination_tag = Some(tag);
        self
    }

    pub fn with_public_key(mut self, public_key: impl Into<String>) -> Self {
        self.public_key = Some(public_key.into());
        self
    }

    pub fn with_overrides(mut self, overrides: RebuildOverrides) -> Self {
        self.overrides = overrides;
        self
    }
}

/// 重建覆盖项
///
/// 未设置的字段沿用原交易的值；各生态只读取与自己相关的字段。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RebuildOverrides {
    /// EVM nonce / XRP Sequence
    pub nonce: Option<u64>,
    pub gas_limit: Option<u64>,
    pub max_fee_per_gas: Option<u128>,
    pub max_priority_fee_per_gas: Option<u128>,
    /// XRP Fee（drops）/ Tron fee_limit（sun）
    pub fee: Option<u64>,
    /// UTXO 费率（sat/vB）
    pub fee_rate: Option<u64>,
    pub compute_unit_limit: Option<u32>,
    /// micro-lamports / CU
    pub compute_unit_price: Option<u64>,
    pub recent_blockhash: Option<String>,
    /// 与 `recent_blockhash` 配套；只换 blockhash 时高度清零（未知）
    pub last_valid_block_height: Option<u64>,
    pub last_ledger_sequence: Option<u32>,
    /// Tron 过期时间（毫秒时间戳）
    pub expiration: Option<i64>,
}

impl RebuildOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_nonce(mut self, nonce: u64) -> Self {
        self.nonce = Some(nonce);
        self
    }

    pub fn with_gas_limit(mut self, gas_limit: u64) -> Self {
        self.gas_limit = Some(gas_limit);
        self
    }

    pub fn with_max_fee_per_gas(mut self, value: u128) -> Self {
        self.max_fee_per_gas = Some(value);
        self
    }

    pub fn with_max_priority_fee_per_gas(mut self, value: u128) -> Self {
        self.max_priority_fee_per_gas = Some(value);
        self
    }

    pub fn with_fee(mut self, fee: u64) -> Self {
        self.fee = Some(fee);
        self
    }

    pub fn with_fee_rate(mut self, sat_per_vbyte: u64) -> Self {
        self.fee_rate = Some(sat_per_vbyte);
        self
    }

    pub fn with_compute_unit_limit(mut self, units: u32) -> Self {
        self.compute_unit_limit = Some(units);
        self
    }

    pub fn with_compute_unit_price(mut self, micro_lamports: u64) -> Self {
        self.compute_unit_price = Some(micro_lamports);
        self
    }

    pub fn with_recent_blockhash(mut self, blockhash: impl Into<String>) -> Self {
        self.recent_blockhash = Some(blockhash.into());
        self
    }

    pub fn with_last_valid_block_height(mut self, height: u64) -> Self {
        self.last_valid_block_height = Some(height);
        self
    }

    pub fn with_last_ledger_sequence(mut self, ledger: u32) -> Self {
        self.last_ledger_sequence = Some(ledger);
        self
    }

    pub fn with_expiration(mut self, expiration_ms: i64) -> Self {
        self.expiration = Some(expiration_ms);
        self
    }
}

/// 签名算法
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignatureAlgorithm {
    Secp256k1,
    Ed25519,
}

/// 交给外部签名器的载荷
///
/// UTXO 每个输入一条摘要；账户模型链恰好一条（Solana 每个必需签名者一条）。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SigningPayload {
    pub algorithm: SignatureAlgorithm,
    #[serde(with = "hex_list")]
    pub data: Vec<Vec<u8>>,
}

impl SigningPayload {
    pub fn single(algorithm: SignatureAlgorithm, data: Vec<u8>) -> Self {
        Self {
            algorithm,
            data: vec![data],
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

mod hex_list {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(data: &[Vec<u8>], s: S) -> Result<S::Ok, S::Error> {
        s.collect_seq(data.iter().map(hex::encode))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<Vec<u8>>, D::Error> {
        let items = Vec::<String>::deserialize(d)?;
        items
            .iter()
            .map(|s| hex::decode(s).map_err(serde::de::Error::custom))
            .collect()
    }
}

/// 统一交易类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    NativeTransfer,
    TokenTransfer,
    ContractCall,
    Unknown,
}

/// 跨链展示视图（type / from / to / value / fee / metadata）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalisedTransaction {
    pub chain: String,
    #[serde(rename = "type")]
    pub kind: TransactionKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
    pub from: String,
    pub to: String,
    /// 最小单位整数字符串
    pub value: String,
    /// 最小单位整数字符串（未知时为上限/估计值）
    pub fee: String,
    pub status: TransactionStatus,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl NormalisedTransaction {
    pub fn new(chain: impl Into<String>, kind: TransactionKind) -> Self {
        Self {
            chain: chain.into(),
            kind,
            hash: None,
            from: String::new(),
            to: String::new(),
            value: "0".to_string(),
            fee: "0".to_string(),
            status: TransactionStatus::Unsigned,
            metadata: serde_json::Map::new(),
        }
    }

    pub fn with_parties(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.from = from.into();
        self.to = to.into();
        self
    }

    pub fn with_value(mut self, value: impl ToString) -> Self {
        self.value = value.to_string();
        self
    }

    pub fn with_fee(mut self, fee: impl ToString) -> Self {
        self.fee = fee.to_string();
        self
    }

    pub fn with_hash(mut self, hash: impl Into<String>) -> Self {
        self.hash = Some(hash.into());
        self
    }

    pub fn with_status(mut self, status: TransactionStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_meta(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }
}
