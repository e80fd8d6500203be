pub mod coin_selection; // UTXO 选币
pub mod provider_factory;
pub mod providers; // 各链 Provider
pub mod rpc_transport;
pub mod substrate; // Substrate 账户存储读取
pub mod transaction_builder; // 统一交易构建器
