//! Bitcoin Provider（Esplora REST）
//!
//! `GET /address/{addr}`、`GET /address/{addr}/utxo`、`GET /fee-estimates`、
//! `GET /blocks/tip/height`、`GET /tx/{txid}`、`POST /tx`。

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use super::{validate_parties, ChainProvider, ProviderCapabilities};
use crate::{
    domain::{
        chain_config::ChainConfig,
        transaction::{NormalisedTransaction, TransactionKind, TransferIntent},
        transaction_status::TransactionStatus,
    },
    error::{ChainError, Result},
    service::{
        coin_selection::Utxo,
        rpc_transport::{is_not_found, RpcTransport},
        transaction_builder::{
            BuildContext, SignedTransaction, TransactionBuilder, UnsignedTransaction, UtxoContext,
        },
    },
};

/// 目标确认块数（按优先级回退）
const FEE_TARGETS: [&str; 4] = ["6", "3", "2", "1"];
/// 节点无估计时的最低费率（sat/vB）
const MIN_FEE_RATE: u64 = 1;

#[derive(Debug, Deserialize)]
struct EsploraStatus {
    confirmed: bool,
    #[serde(default)]
    block_height: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct EsploraUtxo {
    txid: String,
    vout: u32,
    value: u64,
    status: EsploraStatus,
}

#[derive(Debug, Deserialize)]
struct EsploraPrevout {
    #[serde(default)]
    scriptpubkey_address: Option<String>,
    value: u64,
}

#[derive(Debug, Deserialize)]
struct EsploraVin {
    #[serde(default)]
    prevout: Option<EsploraPrevout>,
}

#[derive(Debug, Deserialize)]
struct EsploraTx {
    txid: String,
    vin: Vec<EsploraVin>,
    vout: Vec<EsploraPrevout>,
    #[serde(default)]
    fee: u64,
    status: EsploraStatus,
}

pub struct BitcoinProvider {
    config: ChainConfig,
    transport: Arc<dyn RpcTransport>,
}

impl BitcoinProvider {
    pub fn new(config: ChainConfig, transport: Arc<dyn RpcTransport>) -> Self {
        Self { config, transport }
    }

    fn alias(&self) -> &str {
        &self.config.alias
    }

    fn decode<T: for<'de> Deserialize<'de>>(&self, value: Value, what: &str) -> Result<T> {
        serde_json::from_value(value)
            .map_err(|e| ChainError::rpc(self.alias(), format!("invalid {} response: {}", what, e)))
    }

    async fn fetch_utxos(&self, address: &str) -> Result<Vec<EsploraUtxo>> {
        let value = self
            .transport
            .get_json(&format!("/address/{}/utxo", address))
            .await?;
        self.decode(value, "utxo")
    }

    async fn fetch_fee_rate(&self) -> Result<u64> {
        let estimates = self.transport.get_json("/fee-estimates").await?;
        let rate = FEE_TARGETS
            .iter()
            .find_map(|target| estimates.get(*target).and_then(Value::as_f64))
            .map(|r| r.ceil() as u64)
            .unwrap_or(MIN_FEE_RATE);
        Ok(rate.max(MIN_FEE_RATE))
    }

    async fn fetch_tip_height(&self) -> Result<u64> {
        let height = self.transport.get_json("/blocks/tip/height").await?;
        height
            .as_u64()
            .ok_or_else(|| ChainError::rpc(self.alias(), format!("invalid tip height: {}", height)))
    }
}

/// 确认数 = tip − 所在块 + 1；未确认为 0
fn confirmations(status: &EsploraStatus, tip: u64) -> u32 {
    match (status.confirmed, status.block_height) {
        (true, Some(height)) if tip >= height => {
            u32::try_from(tip - height + 1).unwrap_or(u32::MAX)
        }
        _ => 0,
    }
}

#[async_trait]
impl ChainProvider for BitcoinProvider {
    fn config(&self) -> &ChainConfig {
        &self.config
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities {
            native_transfer: true,
            token_transfer: false,
            memo: false,
            contract_call: false,
            transaction_lookup: true,
        }
    }

    async fn get_balance(&self, address: &str) -> Result<u128> {
        self.validate_address(address)?;
        let info = self
            .transport
            .get_json(&format!("/address/{}", address))
            .await?;
        let stats = &info["chain_stats"];
        let funded = stats["funded_txo_sum"].as_u64().unwrap_or_default();
        let spent = stats["spent_txo_sum"].as_u64().unwrap_or_default();
        Ok(u128::from(funded.saturating_sub(spent)))
    }

    async fn build_transfer(&self, intent: &TransferIntent) -> Result<UnsignedTransaction> {
        validate_parties(&self.config, intent)?;

        let (utxos, fee_rate, tip) = tokio::try_join!(
            self.fetch_utxos(&intent.from),
            self.fetch_fee_rate(),
            self.fetch_tip_height(),
        )?;

        // Esplora 不返回脚本；空脚本由构建器按发送方地址补齐
        let utxos: Vec<Utxo> = utxos
            .into_iter()
            .map(|u| Utxo {
                confirmations: confirmations(&u.status, tip),
                txid: u.txid,
                vout: u.vout,
                value: u.value,
                script_pubkey: Vec::new(),
            })
            .collect();

        tracing::debug!(
            chain = %self.alias(),
            utxos = utxos.len(),
            fee_rate,
            tip,
            "UTXO context fetched"
        );

        TransactionBuilder::build(
            &self.config,
            intent,
            BuildContext::Utxo(UtxoContext { utxos, fee_rate }),
        )
    }

    async fn broadcast(&self, tx: &SignedTransaction) -> Result<String> {
        let txid = self
            .transport
            .post_text("/tx", tx.serialized().to_string())
            .await?;
        if txid.len() != 64 || !txid.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(ChainError::rpc(
                self.alias(),
                format!("unexpected broadcast response: {}", txid),
            ));
        }

        tracing::info!(chain = %self.alias(), tx_hash = %txid, "Transaction broadcast");
        Ok(txid)
    }

    async fn get_transaction(&self, hash: &str) -> Result<Option<NormalisedTransaction>> {
        let txid = hash.trim_start_matches("0x");
        if txid.len() != 64 || !txid.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(ChainError::invalid_hash(
                self.alias(),
                hash,
                "expected 64 hex characters",
            ));
        }

        let value = match self.transport.get_json(&format!("/tx/{}", txid)).await {
            Ok(value) => value,
            Err(e) if is_not_found(&e) => return Ok(None),
            Err(e) => return Err(e),
        };
        let tx: EsploraTx = self.decode(value, "transaction")?;

        let from = tx
            .vin
            .iter()
            .find_map(|vin| vin.prevout.as_ref()?.scriptpubkey_address.clone())
            .unwrap_or_default();
        // 第一个非找零输出视为收款方
        let payment = tx
            .vout
            .iter()
            .find(|out| out.scriptpubkey_address.as_deref() != Some(from.as_str()))
            .or_else(|| tx.vout.first());
        let (to, value) = payment
            .map(|out| (out.scriptpubkey_address.clone().unwrap_or_default(), out.value))
            .unwrap_or_default();

        let status = if tx.status.confirmed {
            TransactionStatus::Confirmed
        } else {
            TransactionStatus::Pending
        };

        let mut normalised = NormalisedTransaction::new(self.alias(), TransactionKind::NativeTransfer)
            .with_hash(tx.txid)
            .with_parties(from, to)
            .with_value(value)
            .with_fee(tx.fee)
            .with_status(status)
            .with_meta("inputs", tx.vin.len())
            .with_meta("outputs", tx.vout.len());
        if let Some(height) = tx.status.block_height {
            normalised = normalised.with_meta("block_height", height);
        }
        Ok(Some(normalised))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confirmations() {
        let confirmed = EsploraStatus {
            confirmed: true,
            block_height: Some(100),
        };
        assert_eq!(confirmations(&confirmed, 100), 1);
        assert_eq!(confirmations(&confirmed, 105), 6);

        let mempool = EsploraStatus {
            confirmed: false,
            block_height: None,
        };
        assert_eq!(confirmations(&mempool, 105), 0);
    }
}
