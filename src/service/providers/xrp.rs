//! XRP Ledger Provider（rippled JSON-RPC）
//!
//! rippled 的业务错误放在 `result.status == "error"` 中，而不是 JSON-RPC error 对象。

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use super::{u64_field, validate_parties, ChainProvider, ProviderCapabilities};
use crate::{
    domain::{
        chain_config::ChainConfig,
        transaction::{NormalisedTransaction, TransactionKind, TransferIntent},
        transaction_status::TransactionStatus,
    },
    error::{ChainError, Result},
    service::{
        rpc_transport::RpcTransport,
        transaction_builder::{
            xrp::classify_submit_result, BuildContext, ChainTransaction, SignedTransaction,
            TransactionBuilder, UnsignedTransaction, XrpContext, XrpTransaction,
        },
    },
};

const ACCOUNT_NOT_FOUND: &str = "actNotFound";
const TRANSACTION_NOT_FOUND: &str = "txnNotFound";

pub struct XrpProvider {
    config: ChainConfig,
    transport: Arc<dyn RpcTransport>,
}

/// rippled 错误码（`result.error`）
fn error_code(result: &Value) -> Option<&str> {
    if result["status"].as_str() == Some("error") {
        result["error"].as_str().or(Some("unknown"))
    } else {
        None
    }
}

impl XrpProvider {
    pub fn new(config: ChainConfig, transport: Arc<dyn RpcTransport>) -> Self {
        Self { config, transport }
    }

    fn alias(&self) -> &str {
        &self.config.alias
    }

    /// rippled 参数为单元素数组
    async fn request(&self, method: &str, params: Value) -> Result<Value> {
        self.transport.call(method, json!([params])).await
    }

    fn check(&self, result: Value) -> Result<Value> {
        if let Some(code) = error_code(&result) {
            let message = result["error_message"].as_str().unwrap_or(code);
            return Err(ChainError::rpc(self.alias(), format!("{}: {}", code, message)));
        }
        Ok(result)
    }

    async fn fetch_sequence(&self, account: &str) -> Result<u32> {
        let result = self
            .request(
                "account_info",
                json!({ "account": account, "ledger_index": "current" }),
            )
            .await?;
        let result = self.check(result)?;
        let sequence = u64_field(self.alias(), &result["account_data"], "Sequence")?;
        u32::try_from(sequence)
            .map_err(|_| ChainError::rpc(self.alias(), format!("Sequence {} exceeds u32", sequence)))
    }

    async fn fetch_fee(&self) -> Result<u64> {
        let result = self.check(self.request("fee", json!({})).await?)?;
        u64_field(self.alias(), &result["drops"], "open_ledger_fee")
    }

    async fn fetch_ledger_index(&self) -> Result<u32> {
        let result = self.check(self.request("ledger_current", json!({})).await?)?;
        let index = u64_field(self.alias(), &result, "ledger_current_index")?;
        u32::try_from(index)
            .map_err(|_| ChainError::rpc(self.alias(), format!("ledger index {} exceeds u32", index)))
    }
}

#[async_trait]
impl ChainProvider for XrpProvider {
    fn config(&self) -> &ChainConfig {
        &self.config
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities {
            native_transfer: true,
            token_transfer: true,
            memo: true,
            contract_call: false,
            transaction_lookup: true,
        }
    }

    async fn get_balance(&self, address: &str) -> Result<u128> {
        self.validate_address(address)?;
        let result = self
            .request(
                "account_info",
                json!({ "account": address, "ledger_index": "validated" }),
            )
            .await?;

        // 未激活账户：余额为 0
        if error_code(&result) == Some(ACCOUNT_NOT_FOUND) {
            tracing::debug!(chain = %self.alias(), address = %address, "Account not funded");
            return Ok(0);
        }
        let result = self.check(result)?;
        u64_field(self.alias(), &result["account_data"], "Balance").map(u128::from)
    }

    async fn build_transfer(&self, intent: &TransferIntent) -> Result<UnsignedTransaction> {
        validate_parties(&self.config, intent)?;

        let (sequence, fee_drops, ledger_current_index) = tokio::try_join!(
            self.fetch_sequence(&intent.from),
            self.fetch_fee(),
            self.fetch_ledger_index(),
        )?;

        tracing::debug!(
            chain = %self.alias(),
            sequence,
            fee_drops,
            ledger_current_index,
            "XRP context fetched"
        );

        let context = XrpContext {
            sequence,
            fee_drops,
            ledger_current_index,
        };
        TransactionBuilder::build(&self.config, intent, BuildContext::Xrp(context))
    }

    async fn broadcast(&self, tx: &SignedTransaction) -> Result<String> {
        let result = self
            .request("submit", json!({ "tx_blob": tx.serialized() }))
            .await?;
        let outcome = classify_submit_result(&result);

        if !outcome.success {
            let error = outcome
                .error
                .unwrap_or_else(|| "submission rejected".to_string());
            tracing::warn!(
                chain = %self.alias(),
                engine_result = %outcome.engine_result,
                error = %error,
                "XRP submit rejected"
            );
            return Err(ChainError::rpc(self.alias(), error));
        }

        let hash = outcome.tx_hash.unwrap_or_else(|| tx.hash().to_string());
        tracing::info!(
            chain = %self.alias(),
            tx_hash = %hash,
            engine_result = %outcome.engine_result,
            "Transaction broadcast"
        );
        Ok(hash)
    }

    async fn get_transaction(&self, hash: &str) -> Result<Option<NormalisedTransaction>> {
        if hash.len() != 64 || !hash.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(ChainError::invalid_hash(
                self.alias(),
                hash,
                "expected 64 hex characters",
            ));
        }

        let result = self
            .request("tx", json!({ "transaction": hash, "binary": false }))
            .await?;
        if error_code(&result) == Some(TRANSACTION_NOT_FOUND) {
            return Ok(None);
        }
        let result = self.check(result)?;

        // API v2 把交易字段放在 tx_json 下
        let tx_json = result.get("tx_json").unwrap_or(&result);

        let status = if result["validated"].as_bool() == Some(true) {
            match result["meta"]["TransactionResult"].as_str() {
                Some("tesSUCCESS") => TransactionStatus::Confirmed,
                _ => TransactionStatus::Failed,
            }
        } else {
            TransactionStatus::Pending
        };

        let normalised = match XrpTransaction::from_json(tx_json) {
            Ok(payment) => payment.to_normalised(self.alias()),
            // 非 Payment 类型只保留发起方与费用
            Err(_) => NormalisedTransaction::new(self.alias(), TransactionKind::Unknown)
                .with_parties(tx_json["Account"].as_str().unwrap_or_default(), "")
                .with_fee(tx_json["Fee"].as_str().unwrap_or("0"))
                .with_meta(
                    "transaction_type",
                    tx_json["TransactionType"].as_str().unwrap_or_default(),
                ),
        };

        let mut normalised = normalised
            .with_hash(hash.to_uppercase())
            .with_status(status);
        if let Some(ledger) = result["ledger_index"].as_u64() {
            normalised = normalised.with_meta("ledger_index", ledger);
        }
        Ok(Some(normalised))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code() {
        let err = json!({ "status": "error", "error": "actNotFound", "error_message": "Account not found." });
        assert_eq!(error_code(&err), Some(ACCOUNT_NOT_FOUND));
        assert_eq!(error_code(&json!({ "status": "success" })), None);
        assert_eq!(error_code(&json!({ "status": "error" })), Some("unknown"));
    }
}
