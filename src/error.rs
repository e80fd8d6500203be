//! 统一错误定义
//!
//! 所有构建器、编解码器和 Provider 共用一个错误枚举。
//! 校验类错误在任何网络/编码工作开始前同步抛出。

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ChainError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChainError {
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // 输入校验
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    #[error("invalid address for {chain}: {address}{}", reason_suffix(.reason))]
    InvalidAddress {
        chain: String,
        address: String,
        reason: Option<String>,
    },

    #[error("invalid transaction hash for {chain}: {hash} ({reason})")]
    InvalidTransactionHash {
        chain: String,
        hash: String,
        reason: String,
    },

    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("unsupported chain: {0}")]
    UnsupportedChain(String),

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // 上游 RPC
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    #[error("rpc error on {chain}{}: {message}", code_suffix(.code))]
    Rpc {
        chain: String,
        code: Option<i64>,
        message: String,
    },

    #[error("{operation} is not supported on {chain}")]
    Contract { chain: String, operation: String },

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // 编解码
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    #[error("compact-u16 value out of range: {0}")]
    CompactU16OutOfRange(i64),

    #[error("invalid base58 character '{character}' at index {index}")]
    InvalidBase58Character { character: char, index: usize },

    #[error("expected {expected} signature(s), got {actual}")]
    SignatureCount { expected: usize, actual: usize },

    #[error("signature {index} must be {expected} bytes, got {actual}")]
    SignatureLength {
        index: usize,
        expected: usize,
        actual: usize,
    },

    #[error("encoding error: {0}")]
    Encoding(String),

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // UTXO
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    #[error("insufficient funds: available {available}, required {required}")]
    InsufficientFunds { available: u64, required: u64 },
}

fn reason_suffix(reason: &Option<String>) -> String {
    reason
        .as_deref()
        .map(|r| format!(" ({})", r))
        .unwrap_or_default()
}

fn code_suffix(code: &Option<i64>) -> String {
    code.map(|c| format!(" [{}]", c)).unwrap_or_default()
}

impl ChainError {
    pub fn invalid_address(chain: impl Into<String>, address: impl Into<String>) -> Self {
        Self::InvalidAddress {
            chain: chain.into(),
            address: address.into(),
            reason: None,
        }
    }

    pub fn invalid_address_with_reason(
        chain: impl Into<String>,
        address: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidAddress {
            chain: chain.into(),
            address: address.into(),
            reason: Some(reason.into()),
        }
    }

    pub fn invalid_hash(
        chain: impl Into<String>,
        hash: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidTransactionHash {
            chain: chain.into(),
            hash: hash.into(),
            reason: reason.into(),
        }
    }

    pub fn rpc(chain: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Rpc {
            chain: chain.into(),
            code: None,
            message: message.into(),
        }
    }

    pub fn rpc_with_code(chain: impl Into<String>, code: i64, message: impl Into<String>) -> Self {
        Self::Rpc {
            chain: chain.into(),
            code: Some(code),
            message: message.into(),
        }
    }

    pub fn contract(chain: impl Into<String>, operation: impl Into<String>) -> Self {
        Self::Contract {
            chain: chain.into(),
            operation: operation.into(),
        }
    }

    pub fn encoding(msg: impl Into<String>) -> Self {
        Self::Encoding(msg.into())
    }

    /// 稳定的错误码（与钱包后端错误码词表一致）
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidAddress { .. } => "invalid_address",
            Self::InvalidTransactionHash { .. } => "invalid_transaction_hash",
            Self::InvalidAmount(_) => "invalid_amount",
            Self::UnsupportedChain(_) => "chain_not_supported",
            Self::Rpc { .. } => "rpc_error",
            Self::Contract { .. } => "contract_not_supported",
            Self::CompactU16OutOfRange(_) => "compact_u16_out_of_range",
            Self::InvalidBase58Character { .. } => "invalid_base58_character",
            Self::SignatureCount { .. } => "signature_count_mismatch",
            Self::SignatureLength { .. } => "signature_length_mismatch",
            Self::Encoding(_) => "encoding_error",
            Self::InsufficientFunds { .. } => "insufficient_balance",
        }
    }

    /// 是否为上游 RPC 失败
    pub fn is_rpc(&self) -> bool {
        matches!(self, Self::Rpc { .. })
    }
}
