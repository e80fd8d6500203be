//! Tron Provider（TronGrid / java-tron HTTP API）

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use super::{validate_parties, ChainProvider, ProviderCapabilities};
use crate::{
    domain::{
        chain_config::{ChainConfig, ChainParams},
        transaction::{NormalisedTransaction, TransactionKind, TransferIntent},
        transaction_status::TransactionStatus,
    },
    error::{ChainError, Result},
    service::{
        rpc_transport::RpcTransport,
        transaction_builder::{
            evm::decode_erc20_transfer,
            tron::{estimate_fee, TronContract},
            BuildContext, RawTransaction, SignedTransaction, TransactionBuilder, TronContext,
            UnsignedTransaction,
        },
    },
    utils::address_validator::{AddressValidator, TRON_ADDRESS_PREFIX},
};

/// 只读调用使用的占位调用方（零地址）
const CONSTANT_CALL_OWNER: &str = "410000000000000000000000000000000000000000";

pub struct TronProvider {
    config: ChainConfig,
    transport: Arc<dyn RpcTransport>,
}

impl TronProvider {
    pub fn new(config: ChainConfig, transport: Arc<dyn RpcTransport>) -> Self {
        Self { config, transport }
    }

    fn alias(&self) -> &str {
        &self.config.alias
    }

    fn hex_address(&self, address: &str) -> Result<String> {
        AddressValidator::parse_tron(self.alias(), address).map(hex::encode)
    }

    /// 41 前缀 hex → T 开头的 base58（无法解析时原样返回）
    fn display_address(&self, hex_address: &str) -> String {
        AddressValidator::parse_tron(self.alias(), hex_address)
            .map(|raw| AddressValidator::tron_to_base58(&raw))
            .unwrap_or_else(|_| hex_address.to_string())
    }

    /// 节点错误信息多为 hex 编码
    fn decode_message(message: &str) -> String {
        hex::decode(message)
            .ok()
            .and_then(|bytes| String::from_utf8(bytes).ok())
            .unwrap_or_else(|| message.to_string())
    }

    async fn trigger_constant(&self, owner: &str, contract: &str, data: &[u8]) -> Result<Value> {
        let result = self
            .transport
            .post_json(
                "/wallet/triggerconstantcontract",
                json!({
                    "owner_address": owner,
                    "contract_address": contract,
                    "data": hex::encode(data),
                    "visible": false,
                }),
            )
            .await?;

        if result["result"]["result"].as_bool() != Some(true) {
            let message = result["result"]["message"]
                .as_str()
                .map(Self::decode_message)
                .unwrap_or_else(|| "constant call failed".to_string());
            return Err(ChainError::rpc(self.alias(), message));
        }
        Ok(result)
    }

    /// 费用估算（sun）：账户剩余免费带宽 + 合约调用的能量模拟
    pub async fn estimate_fee(&self, unsigned: &UnsignedTransaction) -> Result<u64> {
        let RawTransaction::Tron(tx) = unsigned.raw() else {
            return Err(ChainError::encoding("not a Tron transaction"));
        };
        let (bandwidth_price, energy_price) = match self.config.params {
            ChainParams::Tron {
                bandwidth_price_sun,
                energy_price_sun,
                ..
            } => (bandwidth_price_sun, energy_price_sun),
            _ => return Err(ChainError::UnsupportedChain(self.alias().to_string())),
        };

        let owner = match &tx.contract {
            TronContract::Transfer { owner, .. } => owner,
            TronContract::TriggerSmartContract { owner, .. } => owner,
        };
        let resources = self
            .transport
            .post_json(
                "/wallet/getaccountresource",
                json!({ "address": hex::encode(owner), "visible": false }),
            )
            .await?;
        let free_limit = resources["freeNetLimit"].as_u64().unwrap_or_default();
        let free_used = resources["freeNetUsed"].as_u64().unwrap_or_default();

        let energy = match &tx.contract {
            TronContract::TriggerSmartContract {
                owner,
                contract,
                data,
                ..
            } => {
                let result = self
                    .trigger_constant(&hex::encode(owner), &hex::encode(contract), data)
                    .await?;
                result["energy_used"].as_u64().unwrap_or_default()
            }
            TronContract::Transfer { .. } => 0,
        };

        Ok(estimate_fee(
            tx.bandwidth_usage(),
            free_limit.saturating_sub(free_used),
            bandwidth_price,
            energy,
            energy_price,
        ))
    }

    fn normalise(&self, hash: &str, tx: &Value) -> NormalisedTransaction {
        let contract = &tx["raw_data"]["contract"][0];
        let value = &contract["parameter"]["value"];
        let owner = self.display_address(value["owner_address"].as_str().unwrap_or_default());

        let status = match tx["ret"][0]["contractRet"].as_str() {
            Some("SUCCESS") => TransactionStatus::Confirmed,
            Some(_) => TransactionStatus::Failed,
            None => TransactionStatus::Pending,
        };
        let base = NormalisedTransaction::new(self.alias(), TransactionKind::Unknown)
            .with_hash(hash)
            .with_status(status)
            .with_fee(tx["raw_data"]["fee_limit"].as_u64().unwrap_or_default());

        match contract["type"].as_str() {
            Some("TransferContract") => {
                let to = self.display_address(value["to_address"].as_str().unwrap_or_default());
                let mut n = base
                    .with_parties(owner, to)
                    .with_value(value["amount"].as_u64().unwrap_or_default());
                n.kind = TransactionKind::NativeTransfer;
                n
            }
            Some("TriggerSmartContract") => {
                let contract_address =
                    self.display_address(value["contract_address"].as_str().unwrap_or_default());
                let data = hex::decode(value["data"].as_str().unwrap_or_default()).unwrap_or_default();
                match decode_erc20_transfer(&data) {
                    Some((recipient, amount)) => {
                        let mut raw = [0u8; 21];
                        raw[0] = TRON_ADDRESS_PREFIX;
                        raw[1..].copy_from_slice(&recipient);
                        let mut n = base
                            .with_parties(owner, AddressValidator::tron_to_base58(&raw))
                            .with_value(amount)
                            .with_meta("contract", contract_address);
                        n.kind = TransactionKind::TokenTransfer;
                        n
                    }
                    None => {
                        let mut n = base
                            .with_parties(owner, contract_address)
                            .with_value(value["call_value"].as_u64().unwrap_or_default());
                        n.kind = TransactionKind::ContractCall;
                        n
                    }
                }
            }
            other => base
                .with_parties(owner, "")
                .with_meta("contract_type", other.unwrap_or_default()),
        }
    }
}

#[async_trait]
impl ChainProvider for TronProvider {
    fn config(&self) -> &ChainConfig {
        &self.config
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities {
            native_transfer: true,
            token_transfer: true,
            memo: true,
            contract_call: true,
            transaction_lookup: true,
        }
    }

    async fn get_balance(&self, address: &str) -> Result<u128> {
        let hex_address = self.hex_address(address)?;
        let account = self
            .transport
            .post_json(
                "/wallet/getaccount",
                json!({ "address": hex_address, "visible": false }),
            )
            .await?;

        // 未激活账户返回空对象
        if account.as_object().map_or(true, |o| o.is_empty()) {
            tracing::debug!(chain = %self.alias(), address = %address, "Account not activated");
            return Ok(0);
        }
        Ok(u128::from(account["balance"].as_u64().unwrap_or_default()))
    }

    async fn build_transfer(&self, intent: &TransferIntent) -> Result<UnsignedTransaction> {
        validate_parties(&self.config, intent)?;

        let block = self.transport.post_json("/wallet/getnowblock", json!({})).await?;
        let header = &block["block_header"]["raw_data"];
        let context = TronContext {
            block_number: super::u64_field(self.alias(), header, "number")?,
            block_id: super::str_field(self.alias(), &block, "blockID")?.to_string(),
            block_timestamp: header["timestamp"]
                .as_i64()
                .ok_or_else(|| ChainError::rpc(self.alias(), "missing block timestamp"))?,
            timestamp: chrono::Utc::now().timestamp_millis(),
        };

        tracing::debug!(
            chain = %self.alias(),
            block_number = context.block_number,
            "Tron reference block fetched"
        );
        TransactionBuilder::build(&self.config, intent, BuildContext::Tron(context))
    }

    async fn broadcast(&self, tx: &SignedTransaction) -> Result<String> {
        let body: Value = serde_json::from_str(tx.serialized())
            .map_err(|e| ChainError::encoding(format!("invalid Tron transaction JSON: {}", e)))?;
        let result = self
            .transport
            .post_json("/wallet/broadcasttransaction", body)
            .await?;

        if result["result"].as_bool() != Some(true) {
            let code = result["code"].as_str().unwrap_or("UNKNOWN");
            let message = result["message"]
                .as_str()
                .map(Self::decode_message)
                .unwrap_or_default();
            tracing::warn!(chain = %self.alias(), code = %code, error = %message, "Tron broadcast rejected");
            return Err(ChainError::rpc(self.alias(), format!("{}: {}", code, message)));
        }

        let txid = result["txid"]
            .as_str()
            .map(str::to_string)
            .unwrap_or_else(|| tx.hash().to_string());
        tracing::info!(chain = %self.alias(), tx_hash = %txid, "Transaction broadcast");
        Ok(txid)
    }

    async fn get_transaction(&self, hash: &str) -> Result<Option<NormalisedTransaction>> {
        if hash.len() != 64 || !hash.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(ChainError::invalid_hash(
                self.alias(),
                hash,
                "expected 64 hex characters",
            ));
        }

        let tx = self
            .transport
            .post_json("/wallet/gettransactionbyid", json!({ "value": hash }))
            .await?;
        if tx.as_object().map_or(true, |o| o.is_empty()) {
            return Ok(None);
        }
        Ok(Some(self.normalise(&hash.to_lowercase(), &tx)))
    }

    async fn call_contract(&self, contract: &str, data: &[u8]) -> Result<Vec<u8>> {
        let contract = self.hex_address(contract)?;
        let result = self
            .trigger_constant(CONSTANT_CALL_OWNER, &contract, data)
            .await?;
        let output = result["constant_result"][0].as_str().unwrap_or_default();
        hex::decode(output)
            .map_err(|e| ChainError::rpc(self.alias(), format!("invalid constant_result: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_message() {
        // "Contract validate error"
        assert_eq!(
            TronProvider::decode_message("436f6e74726163742076616c6964617465206572726f72"),
            "Contract validate error"
        );
        assert_eq!(TronProvider::decode_message("plain text"), "plain text");
    }
}
