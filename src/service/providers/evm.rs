//! EVM Provider（Ethereum / Polygon / BSC / Sepolia）

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use super::{validate_parties, ChainProvider, ProviderCapabilities};
use crate::{
    domain::{
        chain_config::ChainConfig,
        transaction::{Asset, NormalisedTransaction, TransactionKind, TransferIntent},
        transaction_status::TransactionStatus,
    },
    error::{ChainError, Result},
    infrastructure::rpc_validator::{parse_quantity_u128, parse_quantity_u64, validate_tx_hash},
    service::{
        rpc_transport::RpcTransport,
        transaction_builder::{
            evm::{decode_erc20_transfer, erc20_transfer_data},
            BuildContext, EvmContext, SignedTransaction, TransactionBuilder, UnsignedTransaction,
        },
    },
    utils::address_validator::AddressValidator,
};

/// maxFeePerGas = baseFee × 2 + priority，覆盖连续几个满块的基础费上涨
const BASE_FEE_MULTIPLIER: u128 = 2;

pub struct EvmProvider {
    config: ChainConfig,
    transport: Arc<dyn RpcTransport>,
}

impl EvmProvider {
    pub fn new(config: ChainConfig, transport: Arc<dyn RpcTransport>) -> Self {
        Self { config, transport }
    }

    fn alias(&self) -> &str {
        &self.config.alias
    }

    async fn fetch_nonce(&self, address: &str) -> Result<u64> {
        let result = self
            .transport
            .call("eth_getTransactionCount", json!([address, "pending"]))
            .await?;
        parse_quantity_u64(self.alias(), &result)
    }

    /// (max_fee_per_gas, max_priority_fee_per_gas)
    async fn fetch_fees(&self) -> Result<(u128, u128)> {
        let (block, priority) = tokio::try_join!(
            self.transport
                .call("eth_getBlockByNumber", json!(["latest", false])),
            self.transport.call("eth_maxPriorityFeePerGas", json!([])),
        )?;

        let base_fee = block
            .get("baseFeePerGas")
            .ok_or_else(|| ChainError::rpc(self.alias(), "baseFeePerGas not found in block"))
            .and_then(|v| parse_quantity_u128(self.alias(), v))?;
        let priority = parse_quantity_u128(self.alias(), &priority)?;

        let max_fee = base_fee
            .saturating_mul(BASE_FEE_MULTIPLIER)
            .saturating_add(priority);
        Ok((max_fee, priority))
    }

    async fn estimate_gas(&self, call: Value) -> Result<u64> {
        let result = self.transport.call("eth_estimateGas", json!([call])).await?;
        parse_quantity_u64(self.alias(), &result)
    }

    /// eth_estimateGas 的调用对象（与构建器产出的 to/value/data 一致）
    fn estimate_request(&self, intent: &TransferIntent) -> Result<Value> {
        let chain = self.alias();
        let recipient = AddressValidator::parse_evm(chain, &intent.to)?;
        match &intent.asset {
            Asset::Native => {
                let value = intent.amount.to_base_units(self.config.decimals)?;
                Ok(json!({
                    "from": intent.from,
                    "to": intent.to,
                    "value": format!("0x{:x}", value),
                }))
            }
            Asset::Erc20 { contract, decimals } => {
                let amount = intent.amount.to_base_units(*decimals)?;
                Ok(json!({
                    "from": intent.from,
                    "to": contract,
                    "data": format!("0x{}", hex::encode(erc20_transfer_data(&recipient, amount))),
                }))
            }
            _ => Err(ChainError::contract(chain, "non-ERC-20 token transfer")),
        }
    }

    fn normalise(&self, tx: &Value, receipt: Option<&Value>) -> Result<NormalisedTransaction> {
        let chain = self.alias();
        let hash = super::str_field(chain, tx, "hash")?;
        let from = super::str_field(chain, tx, "from")?;
        let to = tx.get("to").and_then(Value::as_str).unwrap_or_default();
        let value = parse_quantity_u128(chain, tx.get("value").unwrap_or(&Value::Null))?;
        let input = tx
            .get("input")
            .and_then(Value::as_str)
            .unwrap_or("0x")
            .trim_start_matches("0x");
        let data = hex::decode(input)
            .map_err(|e| ChainError::rpc(chain, format!("invalid input data: {}", e)))?;

        let (status, fee) = match receipt {
            Some(receipt) => {
                let status = match receipt.get("status").and_then(Value::as_str) {
                    Some("0x1") => TransactionStatus::Confirmed,
                    _ => TransactionStatus::Failed,
                };
                let gas_used = parse_quantity_u128(chain, &receipt["gasUsed"])?;
                let price = parse_quantity_u128(chain, &receipt["effectiveGasPrice"])?;
                (status, gas_used.saturating_mul(price))
            }
            None => {
                // 未上链：按上限估计
                let gas = parse_quantity_u128(chain, &tx["gas"])?;
                let price = tx
                    .get("maxFeePerGas")
                    .or_else(|| tx.get("gasPrice"))
                    .map(|v| parse_quantity_u128(chain, v))
                    .transpose()?
                    .unwrap_or_default();
                (TransactionStatus::Pending, gas.saturating_mul(price))
            }
        };

        let base = NormalisedTransaction::new(chain, TransactionKind::Unknown)
            .with_hash(hash)
            .with_fee(fee)
            .with_status(status);

        let normalised = if data.is_empty() {
            let mut n = base.with_parties(from, to).with_value(value);
            n.kind = TransactionKind::NativeTransfer;
            n
        } else if let Some((recipient, amount)) = decode_erc20_transfer(&data) {
            let mut n = base
                .with_parties(from, AddressValidator::to_checksum_address(&recipient))
                .with_value(amount)
                .with_meta("contract", to);
            n.kind = TransactionKind::TokenTransfer;
            n
        } else {
            let mut n = base
                .with_parties(from, to)
                .with_value(value)
                .with_meta("selector", hex::encode(&data[..data.len().min(4)]));
            n.kind = TransactionKind::ContractCall;
            n
        };

        Ok(match tx.get("nonce") {
            Some(nonce) => normalised.with_meta("nonce", parse_quantity_u64(chain, nonce)?),
            None => normalised,
        })
    }
}

#[async_trait]
impl ChainProvider for EvmProvider {
    fn config(&self) -> &ChainConfig {
        &self.config
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities {
            native_transfer: true,
            token_transfer: true,
            memo: false,
            contract_call: true,
            transaction_lookup: true,
        }
    }

    async fn get_balance(&self, address: &str) -> Result<u128> {
        self.validate_address(address)?;
        let result = self
            .transport
            .call("eth_getBalance", json!([address, "latest"]))
            .await?;
        parse_quantity_u128(self.alias(), &result)
    }

    async fn build_transfer(&self, intent: &TransferIntent) -> Result<UnsignedTransaction> {
        validate_parties(&self.config, intent)?;
        let estimate = self.estimate_request(intent)?;

        // nonce / 费用 / gas 互不依赖，并发拉取
        let (nonce, (max_fee_per_gas, max_priority_fee_per_gas), gas_limit) = tokio::try_join!(
            self.fetch_nonce(&intent.from),
            self.fetch_fees(),
            self.estimate_gas(estimate),
        )?;

        tracing::debug!(
            chain = %self.alias(),
            nonce,
            max_fee_per_gas = %max_fee_per_gas,
            gas_limit,
            "EVM context fetched"
        );

        let context = EvmContext {
            nonce,
            max_fee_per_gas: max_fee_per_gas.max(max_priority_fee_per_gas),
            max_priority_fee_per_gas,
            gas_limit: Some(gas_limit),
        };
        TransactionBuilder::build(&self.config, intent, BuildContext::Evm(context))
    }

    async fn broadcast(&self, tx: &SignedTransaction) -> Result<String> {
        let result = self
            .transport
            .call("eth_sendRawTransaction", json!([tx.serialized()]))
            .await?;
        let hash = result
            .as_str()
            .ok_or_else(|| ChainError::rpc(self.alias(), "Invalid transaction hash in response"))?;
        let hash = validate_tx_hash(self.alias(), hash)?;

        tracing::info!(chain = %self.alias(), tx_hash = %hash, "Transaction broadcast");
        Ok(hash)
    }

    async fn get_transaction(&self, hash: &str) -> Result<Option<NormalisedTransaction>> {
        let hash = validate_tx_hash(self.alias(), hash)?;
        let tx = self
            .transport
            .call("eth_getTransactionByHash", json!([hash]))
            .await?;
        if tx.is_null() {
            return Ok(None);
        }

        let receipt = match tx.get("blockNumber").filter(|b| !b.is_null()) {
            Some(_) => {
                let receipt = self
                    .transport
                    .call("eth_getTransactionReceipt", json!([hash]))
                    .await?;
                Some(receipt).filter(|r| !r.is_null())
            }
            None => None,
        };

        self.normalise(&tx, receipt.as_ref()).map(Some)
    }

    async fn call_contract(&self, contract: &str, data: &[u8]) -> Result<Vec<u8>> {
        AddressValidator::parse_evm(self.alias(), contract)?;
        let result = self
            .transport
            .call(
                "eth_call",
                json!([{ "to": contract, "data": format!("0x{}", hex::encode(data)) }, "latest"]),
            )
            .await?;
        let hex_str = result
            .as_str()
            .ok_or_else(|| ChainError::rpc(self.alias(), "eth_call result is not a string"))?;
        hex::decode(hex_str.trim_start_matches("0x"))
            .map_err(|e| ChainError::rpc(self.alias(), format!("invalid eth_call result: {}", e)))
    }
}
