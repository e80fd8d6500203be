//! Provider 工厂：按链配置的生态选择实现

use std::sync::Arc;

use crate::{
    config::RpcConfig,
    domain::chain_config::{ChainConfig, ChainRegistry, Ecosystem},
    error::Result,
    service::{
        providers::{
            BitcoinProvider, ChainProvider, EvmProvider, SolanaProvider, SubstrateProvider,
            TronProvider, XrpProvider,
        },
        rpc_transport::{HttpTransport, RpcTransport},
    },
};

pub struct ProviderFactory;

impl ProviderFactory {
    /// 使用注册表中的链配置与 HTTP 传输
    pub fn from_registry(
        registry: &ChainRegistry,
        chain: &str,
        rpc: &RpcConfig,
    ) -> Result<Arc<dyn ChainProvider>> {
        let config = registry.get(chain)?.clone();
        Ok(Self::create(config, rpc))
    }

    pub fn create(config: ChainConfig, rpc: &RpcConfig) -> Arc<dyn ChainProvider> {
        let transport: Arc<dyn RpcTransport> =
            Arc::new(HttpTransport::new(&config.alias, &config.rpc_url, rpc));
        Self::with_transport(config, transport)
    }

    /// 注入自定义传输（测试或自定义中间件）
    pub fn with_transport(
        config: ChainConfig,
        transport: Arc<dyn RpcTransport>,
    ) -> Arc<dyn ChainProvider> {
        tracing::debug!(
            chain = %config.alias,
            ecosystem = config.ecosystem().as_str(),
            "Creating chain provider"
        );

        match config.ecosystem() {
            Ecosystem::Evm => Arc::new(EvmProvider::new(config, transport)),
            Ecosystem::Solana => Arc::new(SolanaProvider::new(config, transport)),
            Ecosystem::Utxo => Arc::new(BitcoinProvider::new(config, transport)),
            Ecosystem::Xrp => Arc::new(XrpProvider::new(config, transport)),
            Ecosystem::Tron => Arc::new(TronProvider::new(config, transport)),
            Ecosystem::Substrate => Arc::new(SubstrateProvider::new(config, transport)),
        }
    }
}
