//! Tron 交易构建
//!
//! raw_data 按 protobuf 字段号升序编码；txID = SHA-256(raw_data)，签名对象即 txID。
//! 原生转账使用 TransferContract，TRC-20 使用 TriggerSmartContract。

use serde::{Serialize, Serializer};
use serde_json::{json, Value};

use super::{ChainTransaction, SignedParts};
use crate::{
    codec::{decode_hex, protobuf::ProtoWriter},
    crypto::sha256,
    domain::{
        chain_config::{ChainConfig, ChainParams, Ecosystem},
        transaction::{
            Asset, NormalisedTransaction, RebuildOverrides, SignatureAlgorithm, SigningPayload,
            TransactionKind, TransferIntent,
        },
    },
    error::{ChainError, Result},
    service::transaction_builder::evm::{decode_erc20_transfer, erc20_transfer_data},
    utils::address_validator::{AddressValidator, TRON_ADDRESS_PREFIX},
};

/// 65 字节可恢复签名 r ‖ s ‖ v
pub const SIGNATURE_LEN: usize = 65;
/// 默认过期窗口（毫秒）
pub const DEFAULT_EXPIRATION_MS: i64 = 60_000;
/// 带宽估算：签名 65 字节 + protobuf 封装等开销 64 字节
const BANDWIDTH_OVERHEAD: u64 = 65 + 64;

const TYPE_URL_PREFIX: &str = "type.googleapis.com/protocol.";
const TRANSFER_CONTRACT: (u64, &str) = (1, "TransferContract");
const TRIGGER_SMART_CONTRACT: (u64, &str) = (31, "TriggerSmartContract");

/// Provider 拉取的构建上下文（最新区块）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TronContext {
    pub block_number: u64,
    /// 32 字节区块 ID（hex）
    pub block_id: String,
    /// 区块时间戳（毫秒）
    pub block_timestamp: i64,
    /// 交易时间戳（毫秒）
    pub timestamp: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type")]
pub enum TronContract {
    #[serde(rename = "TransferContract")]
    Transfer {
        #[serde(serialize_with = "serialize_hex")]
        owner: [u8; 21],
        #[serde(serialize_with = "serialize_hex")]
        to: [u8; 21],
        amount: i64,
    },
    #[serde(rename = "TriggerSmartContract")]
    TriggerSmartContract {
        #[serde(serialize_with = "serialize_hex")]
        owner: [u8; 21],
        #[serde(serialize_with = "serialize_hex")]
        contract: [u8; 21],
        call_value: i64,
        #[serde(serialize_with = "serialize_hex")]
        data: Vec<u8>,
    },
}

fn serialize_hex<S: Serializer, T: AsRef<[u8]>>(
    value: &T,
    s: S,
) -> std::result::Result<S::Ok, S::Error> {
    s.serialize_str(&hex::encode(value.as_ref()))
}

impl TronContract {
    fn kind(&self) -> (u64, &'static str) {
        match self {
            Self::Transfer { .. } => TRANSFER_CONTRACT,
            Self::TriggerSmartContract { .. } => TRIGGER_SMART_CONTRACT,
        }
    }

    fn owner(&self) -> &[u8; 21] {
        match self {
            Self::Transfer { owner, .. } | Self::TriggerSmartContract { owner, .. } => owner,
        }
    }

    fn parameter_bytes(&self) -> Vec<u8> {
        let mut w = ProtoWriter::new();
        match self {
            Self::Transfer { owner, to, amount } => {
                w.bytes(1, owner).bytes(2, to).int64(3, *amount);
            }
            Self::TriggerSmartContract {
                owner,
                contract,
                call_value,
                data,
            } => {
                w.bytes(1, owner)
                    .bytes(2, contract)
                    .int64(3, *call_value)
                    .bytes(4, data);
            }
        }
        w.finish()
    }

    /// Transaction.Contract { type, parameter: Any }
    fn encode(&self) -> ProtoWriter {
        let (contract_type, name) = self.kind();
        let mut any = ProtoWriter::new();
        any.string(1, &format!("{}{}", TYPE_URL_PREFIX, name))
            .bytes(2, &self.parameter_bytes());

        let mut contract = ProtoWriter::new();
        contract.uint64(1, contract_type).message(2, &any);
        contract
    }

    fn to_json(&self) -> Value {
        let (_, name) = self.kind();
        let value = match self {
            Self::Transfer { owner, to, amount } => json!({
                "owner_address": hex::encode(owner),
                "to_address": hex::encode(to),
                "amount": amount,
            }),
            Self::TriggerSmartContract {
                owner,
                contract,
                call_value,
                data,
            } => {
                let mut value = json!({
                    "owner_address": hex::encode(owner),
                    "contract_address": hex::encode(contract),
                    "data": hex::encode(data),
                });
                if *call_value != 0 {
                    value["call_value"] = json!(call_value);
                }
                value
            }
        };
        json!({
            "parameter": {
                "value": value,
                "type_url": format!("{}{}", TYPE_URL_PREFIX, name),
            },
            "type": name,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TronTransaction {
    #[serde(serialize_with = "serialize_hex")]
    pub ref_block_bytes: [u8; 2],
    #[serde(serialize_with = "serialize_hex")]
    pub ref_block_hash: [u8; 8],
    pub expiration: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memo: Option<String>,
    pub contract: TronContract,
    pub timestamp: i64,
    /// 0 表示不设上限（原生转账）
    pub fee_limit: i64,
    #[serde(skip)]
    pub bandwidth_price_sun: u64,
}

impl TronTransaction {
    pub fn raw_data_bytes(&self) -> Vec<u8> {
        let mut raw = ProtoWriter::new();
        raw.bytes(1, &self.ref_block_bytes)
            .bytes(4, &self.ref_block_hash)
            .int64(8, self.expiration)
            .bytes(10, self.memo.as_deref().unwrap_or_default().as_bytes())
            .message(11, &self.contract.encode())
            .int64(14, self.timestamp)
            .int64(18, self.fee_limit);
        raw.finish()
    }

    pub fn tx_id(&self) -> [u8; 32] {
        sha256(&self.raw_data_bytes())
    }

    pub fn raw_data_json(&self) -> Value {
        let mut raw = json!({
            "contract": [self.contract.to_json()],
            "ref_block_bytes": hex::encode(self.ref_block_bytes),
            "ref_block_hash": hex::encode(self.ref_block_hash),
            "expiration": self.expiration,
            "timestamp": self.timestamp,
        });
        if self.fee_limit > 0 {
            raw["fee_limit"] = json!(self.fee_limit);
        }
        if let Some(memo) = &self.memo {
            raw["data"] = json!(hex::encode(memo.as_bytes()));
        }
        raw
    }

    /// /wallet/broadcasttransaction 请求体
    pub fn to_json(&self, signatures: &[Vec<u8>]) -> Value {
        json!({
            "txID": hex::encode(self.tx_id()),
            "raw_data": self.raw_data_json(),
            "raw_data_hex": hex::encode(self.raw_data_bytes()),
            "signature": signatures.iter().map(hex::encode).collect::<Vec<_>>(),
            "visible": false,
        })
    }

    /// 带宽占用估算（字节）
    pub fn bandwidth_usage(&self) -> u64 {
        self.raw_data_bytes().len() as u64 + BANDWIDTH_OVERHEAD
    }
}

/// 费用估算（sun）：免费带宽覆盖时带宽费为 0，能量按单价计费
pub fn estimate_fee(
    bandwidth: u64,
    free_bandwidth: u64,
    bandwidth_price_sun: u64,
    energy: u64,
    energy_price_sun: u64,
) -> u64 {
    let bandwidth_cost = if bandwidth <= free_bandwidth {
        0
    } else {
        bandwidth.saturating_mul(bandwidth_price_sun)
    };
    bandwidth_cost.saturating_add(energy.saturating_mul(energy_price_sun))
}

impl ChainTransaction for TronTransaction {
    fn ecosystem(&self) -> Ecosystem {
        Ecosystem::Tron
    }

    fn encode_unsigned(&self) -> Result<String> {
        serde_json::to_string(&self.to_json(&[])).map_err(|e| ChainError::encoding(e.to_string()))
    }

    fn signing_payload(&self) -> Result<SigningPayload> {
        Ok(SigningPayload::single(
            SignatureAlgorithm::Secp256k1,
            self.tx_id().to_vec(),
        ))
    }

    fn apply_signatures(&self, signatures: &[Vec<u8>]) -> Result<SignedParts> {
        let [signature] = signatures else {
            return Err(ChainError::SignatureCount {
                expected: 1,
                actual: signatures.len(),
            });
        };
        if signature.len() != SIGNATURE_LEN {
            return Err(ChainError::SignatureLength {
                index: 0,
                expected: SIGNATURE_LEN,
                actual: signature.len(),
            });
        }

        // Transaction { raw_data = 1, signature = 2 }
        let raw = self.raw_data_bytes();
        let mut signed = ProtoWriter::new();
        signed.bytes(1, &raw).bytes(2, signature);

        let body = self.to_json(signatures);
        Ok(SignedParts {
            bytes: signed.finish(),
            serialized: serde_json::to_string(&body)
                .map_err(|e| ChainError::encoding(e.to_string()))?,
            hash: hex::encode(sha256(&raw)),
        })
    }

    fn to_normalised(&self, chain: &str) -> NormalisedTransaction {
        let from = AddressValidator::tron_to_base58(self.contract.owner());
        let mut tx = match &self.contract {
            TronContract::Transfer { to, amount, .. } => {
                NormalisedTransaction::new(chain, TransactionKind::NativeTransfer)
                    .with_parties(from, AddressValidator::tron_to_base58(to))
                    .with_value(amount)
                    .with_fee(self.bandwidth_usage().saturating_mul(self.bandwidth_price_sun))
            }
            TronContract::TriggerSmartContract { contract, data, .. } => {
                let contract_addr = AddressValidator::tron_to_base58(contract);
                let base = match decode_erc20_transfer(data) {
                    Some((recipient, amount)) => {
                        let mut raw = [0u8; 21];
                        raw[0] = TRON_ADDRESS_PREFIX;
                        raw[1..].copy_from_slice(&recipient);
                        NormalisedTransaction::new(chain, TransactionKind::TokenTransfer)
                            .with_parties(from, AddressValidator::tron_to_base58(&raw))
                            .with_value(amount)
                    }
                    None => NormalisedTransaction::new(chain, TransactionKind::ContractCall)
                        .with_parties(from, contract_addr.clone()),
                };
                // fee_limit 为上限
                base.with_fee(self.fee_limit)
                    .with_meta("contract", contract_addr)
            }
        };

        tx = tx
            .with_meta("expiration", self.expiration)
            .with_meta("tx_id", hex::encode(self.tx_id()));
        if let Some(memo) = &self.memo {
            tx = tx.with_meta("memo", memo.as_str());
        }
        tx
    }

    fn rebuild(&self, overrides: &RebuildOverrides) -> Result<Self> {
        let mut tx = self.clone();
        if let Some(fee) = overrides.fee {
            tx.fee_limit = i64::try_from(fee)
                .map_err(|_| ChainError::InvalidAmount(format!("fee limit {} exceeds i64", fee)))?;
        }
        if let Some(expiration) = overrides.expiration {
            tx.expiration = expiration;
        }
        Ok(tx)
    }
}

fn to_i64(value: u64) -> Result<i64> {
    i64::try_from(value).map_err(|_| ChainError::InvalidAmount(format!("{} exceeds i64", value)))
}

/// 从最新区块推导 ref_block_bytes / ref_block_hash
pub fn reference_block(block_number: u64, block_id: &str) -> Result<([u8; 2], [u8; 8])> {
    let id = decode_hex(block_id)?;
    if id.len() != 32 {
        return Err(ChainError::invalid_hash(
            "tron",
            block_id,
            "block id must be 32 bytes",
        ));
    }
    let number = block_number.to_be_bytes();
    let mut ref_bytes = [0u8; 2];
    ref_bytes.copy_from_slice(&number[6..8]);
    let mut ref_hash = [0u8; 8];
    ref_hash.copy_from_slice(&id[8..16]);
    Ok((ref_bytes, ref_hash))
}

/// 构建 Tron 转账（TRX 或 TRC-20）
pub fn build(config: &ChainConfig, intent: &TransferIntent, ctx: &TronContext) -> Result<TronTransaction> {
    let chain = config.alias.as_str();
    let (bandwidth_price_sun, default_fee_limit_sun) = match config.params {
        ChainParams::Tron {
            bandwidth_price_sun,
            default_fee_limit_sun,
            ..
        } => (bandwidth_price_sun, default_fee_limit_sun),
        _ => return Err(ChainError::UnsupportedChain(chain.to_string())),
    };

    let owner = AddressValidator::parse_tron(chain, &intent.from)?;
    let to = AddressValidator::parse_tron(chain, &intent.to)?;
    let (ref_block_bytes, ref_block_hash) = reference_block(ctx.block_number, &ctx.block_id)?;

    let (contract, fee_limit) = match &intent.asset {
        Asset::Native => {
            let amount = to_i64(intent.amount.to_base_units_u64(config.decimals)?)?;
            (TronContract::Transfer { owner, to, amount }, 0)
        }
        Asset::Trc20 { contract, decimals } => {
            let contract = AddressValidator::parse_tron(chain, contract)?;
            let amount = intent.amount.to_base_units(*decimals)?;
            let mut recipient = [0u8; 20];
            recipient.copy_from_slice(&to[1..]);
            let fee_limit = to_i64(intent.overrides.fee.unwrap_or(default_fee_limit_sun))?;
            (
                TronContract::TriggerSmartContract {
                    owner,
                    contract,
                    call_value: 0,
                    data: erc20_transfer_data(&recipient, amount),
                },
                fee_limit,
            )
        }
        _ => return Err(ChainError::contract(chain, "non-TRC-20 token transfer")),
    };

    let tx = TronTransaction {
        ref_block_bytes,
        ref_block_hash,
        expiration: intent
            .overrides
            .expiration
            .unwrap_or(ctx.block_timestamp + DEFAULT_EXPIRATION_MS),
        memo: intent.memo.clone(),
        contract,
        timestamp: ctx.timestamp,
        fee_limit,
        bandwidth_price_sun,
    };

    tracing::debug!(
        chain = %chain,
        tx_id = %hex::encode(tx.tx_id()),
        expiration = tx.expiration,
        "Tron transaction built"
    );
    Ok(tx)
}
