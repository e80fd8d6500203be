//! 链 Provider
//!
//! 每条链一个实现，统一暴露：地址校验、余额查询、转账构建、广播、交易查询。
//! Provider 只做网络取数和响应映射，交易构造全部交给 [`TransactionBuilder`]。
//!
//! [`TransactionBuilder`]: crate::service::transaction_builder::TransactionBuilder

pub mod evm;
pub mod solana;
pub mod substrate;
pub mod tron;
pub mod utxo;
pub mod xrp;

use async_trait::async_trait;
use serde::Serialize;

pub use evm::EvmProvider;
pub use solana::SolanaProvider;
pub use substrate::SubstrateProvider;
pub use tron::TronProvider;
pub use utxo::BitcoinProvider;
pub use xrp::XrpProvider;

use crate::{
    domain::{chain_config::ChainConfig, transaction::{NormalisedTransaction, TransferIntent}},
    error::{ChainError, Result},
    service::transaction_builder::{SignedTransaction, UnsignedTransaction},
    utils::address_validator::AddressValidator,
};

/// Provider 支持的操作
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProviderCapabilities {
    pub native_transfer: bool,
    pub token_transfer: bool,
    pub memo: bool,
    pub contract_call: bool,
    pub transaction_lookup: bool,
}

impl ProviderCapabilities {
    /// 只读链（仅余额查询）
    pub const fn read_only() -> Self {
        Self {
            native_transfer: false,
            token_transfer: false,
            memo: false,
            contract_call: false,
            transaction_lookup: false,
        }
    }
}

/// 统一链 Provider 接口
#[async_trait]
pub trait ChainProvider: Send + Sync {
    fn config(&self) -> &ChainConfig;

    fn capabilities(&self) -> ProviderCapabilities;

    fn chain(&self) -> &str {
        &self.config().alias
    }

    /// 纯本地校验，不发起网络请求
    fn validate_address(&self, address: &str) -> Result<()> {
        AddressValidator::validate(self.config(), address)
    }

    /// 最小单位余额；账户不存在时返回 0
    async fn get_balance(&self, address: &str) -> Result<u128>;

    /// 批量余额（并发请求，任一失败即返回错误）
    async fn get_balances(&self, addresses: &[String]) -> Result<Vec<u128>> {
        futures::future::try_join_all(addresses.iter().map(|a| self.get_balance(a))).await
    }

    /// 拉取链上下文并构建未签名交易
    async fn build_transfer(&self, intent: &TransferIntent) -> Result<UnsignedTransaction>;

    /// 单次提交，返回节点确认的交易标识
    async fn broadcast(&self, tx: &SignedTransaction) -> Result<String>;

    /// 查询已上链交易；不存在时返回 None
    async fn get_transaction(&self, hash: &str) -> Result<Option<NormalisedTransaction>>;

    /// 只读合约调用，返回原始返回数据
    async fn call_contract(&self, contract: &str, data: &[u8]) -> Result<Vec<u8>> {
        let _ = (contract, data);
        Err(ChainError::contract(self.chain(), "contract call"))
    }
}

/// 发送方和接收方都先在本地校验，失败时不触发网络请求
pub(crate) fn validate_parties(config: &ChainConfig, intent: &TransferIntent) -> Result<()> {
    AddressValidator::validate(config, &intent.from)?;
    AddressValidator::validate(config, &intent.to)
}

/// 取 JSON 字符串字段
pub(crate) fn str_field<'a>(
    chain: &str,
    value: &'a serde_json::Value,
    field: &str,
) -> Result<&'a str> {
    value
        .get(field)
        .and_then(|v| v.as_str())
        .ok_or_else(|| ChainError::rpc(chain, format!("missing string field '{}'", field)))
}

/// 取 JSON 整数字段（数字或十进制字符串）
pub(crate) fn u64_field(chain: &str, value: &serde_json::Value, field: &str) -> Result<u64> {
    let v = value
        .get(field)
        .ok_or_else(|| ChainError::rpc(chain, format!("missing field '{}'", field)))?;
    v.as_u64()
        .or_else(|| v.as_str().and_then(|s| s.parse().ok()))
        .ok_or_else(|| ChainError::rpc(chain, format!("field '{}' is not an integer: {}", field, v)))
}
