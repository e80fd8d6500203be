//! txforge - 多链交易构建核心
//!
//! 非托管模式：只构建未签名交易与签名载荷，签名由外部签名器完成。
//! 支持 EVM、Solana、Bitcoin（UTXO）、XRP Ledger、Tron，Substrate 只读。

pub mod codec;
pub mod config;
pub mod crypto;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod service;
pub mod utils;

pub use error::{ChainError, Result};

// 统一模块导出
pub mod prelude {
    pub use crate::{
        config::Config,
        domain::{
            Amount, Asset, ChainConfig, ChainRegistry, Ecosystem, NormalisedTransaction,
            RebuildOverrides, SigningPayload, TransactionStatus, TransferIntent,
        },
        error::{ChainError, Result},
        service::{
            provider_factory::ProviderFactory,
            providers::ChainProvider,
            transaction_builder::{
                BuildContext, SignedTransaction, TransactionBuilder, UnsignedTransaction,
            },
        },
    };
}
