//! Domain 模块
//!
//! 链配置、金额、转账意图与交易生命周期

pub mod amount;
pub mod chain_config;
pub mod transaction;
pub mod transaction_status;

// 重新导出常用类型
pub use amount::Amount;
pub use chain_config::{
    AddressFormat, ChainConfig, ChainParams, ChainRegistry, CurveType, Ecosystem, UtxoNetwork,
};
pub use transaction::{
    Asset, NormalisedTransaction, RebuildOverrides, SignatureAlgorithm, SigningPayload,
    TransactionKind, TransferIntent,
};
pub use transaction_status::TransactionStatus;
