//! Solana Provider

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use super::{u64_field, validate_parties, ChainProvider, ProviderCapabilities};
use crate::{
    codec::base58,
    domain::{
        chain_config::{ChainConfig, ChainParams},
        transaction::{NormalisedTransaction, TransferIntent},
        transaction_status::TransactionStatus,
    },
    error::{ChainError, Result},
    service::{
        rpc_transport::RpcTransport,
        transaction_builder::{
            solana::{CompiledInstruction, CompiledMessage, MessageHeader, Pubkey, SIGNATURE_LEN},
            BuildContext, ChainTransaction, SignedTransaction, SolanaContext, SolanaTransaction,
            TransactionBuilder, UnsignedTransaction,
        },
    },
};

pub struct SolanaProvider {
    config: ChainConfig,
    transport: Arc<dyn RpcTransport>,
}

impl SolanaProvider {
    pub fn new(config: ChainConfig, transport: Arc<dyn RpcTransport>) -> Self {
        Self { config, transport }
    }

    fn alias(&self) -> &str {
        &self.config.alias
    }

    fn lamports_per_signature(&self) -> u64 {
        match self.config.params {
            ChainParams::Solana {
                lamports_per_signature,
            } => lamports_per_signature,
            _ => 5_000,
        }
    }

    /// 交易签名：base58 的 64 字节
    fn check_signature(&self, signature: &str) -> Result<()> {
        let bytes = base58::decode(signature)
            .map_err(|e| ChainError::invalid_hash(self.alias(), signature, e.to_string()))?;
        if bytes.len() != SIGNATURE_LEN {
            return Err(ChainError::invalid_hash(
                self.alias(),
                signature,
                format!("expected {} bytes, got {}", SIGNATURE_LEN, bytes.len()),
            ));
        }
        Ok(())
    }

    /// getTransaction(json) 的 message 字段 → CompiledMessage
    fn parse_message(&self, message: &Value) -> Result<CompiledMessage> {
        let chain = self.alias();
        let header = &message["header"];
        let byte = |field: &str| -> Result<u8> {
            u8::try_from(u64_field(chain, header, field)?)
                .map_err(|_| ChainError::rpc(chain, format!("header field '{}' exceeds u8", field)))
        };

        let key = |s: &str| -> Result<Pubkey> {
            s.parse()
                .map_err(|_| ChainError::rpc(chain, format!("invalid account key {}", s)))
        };

        let account_keys = message["accountKeys"]
            .as_array()
            .ok_or_else(|| ChainError::rpc(chain, "missing accountKeys"))?
            .iter()
            .map(|k| key(k.as_str().unwrap_or_default()))
            .collect::<Result<Vec<_>>>()?;

        let instructions = message["instructions"]
            .as_array()
            .ok_or_else(|| ChainError::rpc(chain, "missing instructions"))?
            .iter()
            .map(|ix| {
                let program_id_index = u8::try_from(u64_field(chain, ix, "programIdIndex")?)
                    .map_err(|_| ChainError::rpc(chain, "programIdIndex exceeds u8"))?;
                let accounts = ix["accounts"]
                    .as_array()
                    .map(|a| {
                        a.iter()
                            .filter_map(Value::as_u64)
                            .filter_map(|i| u8::try_from(i).ok())
                            .collect()
                    })
                    .unwrap_or_default();
                let data = base58::decode(ix["data"].as_str().unwrap_or_default())
                    .map_err(|e| ChainError::rpc(chain, format!("invalid instruction data: {}", e)))?;
                Ok(CompiledInstruction {
                    program_id_index,
                    accounts,
                    data,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let header = MessageHeader {
            num_required_signatures: byte("numRequiredSignatures")?,
            num_readonly_signed_accounts: byte("numReadonlySignedAccounts")?,
            num_readonly_unsigned_accounts: byte("numReadonlyUnsignedAccounts")?,
        };
        header
            .check(account_keys.len())
            .map_err(|e| ChainError::rpc(chain, e.to_string()))?;

        Ok(CompiledMessage {
            header,
            account_keys,
            recent_blockhash: key(message["recentBlockhash"].as_str().unwrap_or_default())?,
            instructions,
        })
    }
}

#[async_trait]
impl ChainProvider for SolanaProvider {
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
            .transport
            .call("getBalance", json!([address, { "commitment": "confirmed" }]))
            .await?;
        u64_field(self.alias(), &result, "value").map(u128::from)
    }

    async fn build_transfer(&self, intent: &TransferIntent) -> Result<UnsignedTransaction> {
        validate_parties(&self.config, intent)?;

        let result = self
            .transport
            .call("getLatestBlockhash", json!([{ "commitment": "finalized" }]))
            .await?;
        let value = &result["value"];
        let context = SolanaContext {
            recent_blockhash: super::str_field(self.alias(), value, "blockhash")?.to_string(),
            last_valid_block_height: u64_field(self.alias(), value, "lastValidBlockHeight")?,
        };

        tracing::debug!(
            chain = %self.alias(),
            blockhash = %context.recent_blockhash,
            last_valid_block_height = context.last_valid_block_height,
            "Solana context fetched"
        );
        TransactionBuilder::build(&self.config, intent, BuildContext::Solana(context))
    }

    async fn broadcast(&self, tx: &SignedTransaction) -> Result<String> {
        let result = self
            .transport
            .call(
                "sendTransaction",
                json!([tx.serialized(), { "encoding": "base64", "preflightCommitment": "confirmed" }]),
            )
            .await?;
        let signature = result
            .as_str()
            .ok_or_else(|| ChainError::rpc(self.alias(), "Invalid signature in response"))?
            .to_string();

        tracing::info!(chain = %self.alias(), signature = %signature, "Transaction broadcast");
        Ok(signature)
    }

    async fn get_transaction(&self, hash: &str) -> Result<Option<NormalisedTransaction>> {
        self.check_signature(hash)?;
        let result = self
            .transport
            .call(
                "getTransaction",
                json!([hash, { "encoding": "json", "maxSupportedTransactionVersion": 0 }]),
            )
            .await?;
        if result.is_null() {
            return Ok(None);
        }

        let message = self.parse_message(&result["transaction"]["message"])?;
        let tx = SolanaTransaction::from_message(message, self.lamports_per_signature())?;

        let meta = &result["meta"];
        let status = if meta.get("err").map_or(true, Value::is_null) {
            TransactionStatus::Confirmed
        } else {
            TransactionStatus::Failed
        };

        let mut normalised = tx
            .to_normalised(self.alias())
            .with_hash(hash)
            .with_status(status);
        if let Some(fee) = meta.get("fee").and_then(Value::as_u64) {
            normalised = normalised.with_fee(fee);
        }
        if let Some(slot) = result.get("slot").and_then(Value::as_u64) {
            normalised = normalised.with_meta("slot", slot);
        }
        Ok(Some(normalised))
    }
}
