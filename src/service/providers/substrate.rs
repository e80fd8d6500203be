//! Substrate Provider（只读：余额与账户信息）

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use super::{ChainProvider, ProviderCapabilities};
use crate::{
    codec::decode_hex,
    domain::{
        chain_config::{ChainConfig, ChainParams},
        transaction::{NormalisedTransaction, TransferIntent},
    },
    error::{ChainError, Result},
    service::{
        rpc_transport::RpcTransport,
        substrate::{decode_account_info, storage_key_hex, storage_map_key, AccountInfo},
        transaction_builder::{SignedTransaction, UnsignedTransaction},
    },
    utils::address_validator::AddressValidator,
};

pub struct SubstrateProvider {
    config: ChainConfig,
    transport: Arc<dyn RpcTransport>,
}

impl SubstrateProvider {
    pub fn new(config: ChainConfig, transport: Arc<dyn RpcTransport>) -> Self {
        Self { config, transport }
    }

    fn alias(&self) -> &str {
        &self.config.alias
    }

    /// (ss58 前缀, pallet, 存储项)
    fn storage_location(&self) -> Result<(u8, &str, &str)> {
        match &self.config.params {
            ChainParams::Substrate {
                ss58_prefix,
                pallet,
                storage_item,
                ..
            } => Ok((*ss58_prefix, pallet.as_str(), storage_item.as_str())),
            _ => Err(ChainError::UnsupportedChain(self.alias().to_string())),
        }
    }

    /// 读取 `System.Account`；存储不存在时返回全零账户
    pub async fn get_account_info(&self, address: &str) -> Result<AccountInfo> {
        let (prefix, pallet, item) = self.storage_location()?;
        let public_key = AddressValidator::parse_ss58(self.alias(), address, prefix)?;
        let key = storage_key_hex(&storage_map_key(pallet, item, &public_key));

        let result = self.transport.call("state_getStorage", json!([key])).await?;
        let Some(blob) = result.as_str() else {
            tracing::debug!(chain = %self.alias(), address = %address, "Account storage absent");
            return Ok(AccountInfo::default());
        };

        decode_account_info(&decode_hex(blob)?)
    }
}

#[async_trait]
impl ChainProvider for SubstrateProvider {
    fn config(&self) -> &ChainConfig {
        &self.config
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities::read_only()
    }

    async fn get_balance(&self, address: &str) -> Result<u128> {
        Ok(self.get_account_info(address).await?.data.free)
    }

    async fn build_transfer(&self, _intent: &TransferIntent) -> Result<UnsignedTransaction> {
        Err(ChainError::contract(self.alias(), "transfer"))
    }

    async fn broadcast(&self, _tx: &SignedTransaction) -> Result<String> {
        Err(ChainError::contract(self.alias(), "broadcast"))
    }

    async fn get_transaction(&self, _hash: &str) -> Result<Option<NormalisedTransaction>> {
        Err(ChainError::contract(self.alias(), "transaction lookup"))
    }
}
