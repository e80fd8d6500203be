//! XRP Ledger Payment 构建
//!
//! 交易以 rippled JSON 形态保存；签名器负责二进制编码并返回签名后的 blob。
//! 交易哈希 = SHA-512Half("TXN\0" ‖ blob)，大写十六进制。

use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{ChainTransaction, SignedParts};
use crate::{
    codec::decode_hex,
    crypto::sha512_half,
    domain::{
        amount::{parse_base_units, Amount},
        chain_config::{ChainConfig, ChainParams, Ecosystem},
        transaction::{
            Asset, NormalisedTransaction, RebuildOverrides, SignatureAlgorithm, SigningPayload,
            TransactionKind, TransferIntent,
        },
    },
    error::{ChainError, Result},
    utils::address_validator::AddressValidator,
};

/// 交易哈希前缀 "TXN\0"
pub const TRANSACTION_HASH_PREFIX: [u8; 4] = [0x54, 0x58, 0x4e, 0x00];
pub const PAYMENT: &str = "Payment";

/// Provider 拉取的构建上下文
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XrpContext {
    pub sequence: u32,
    pub fee_drops: u64,
    pub ledger_current_index: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuedAmount {
    pub currency: String,
    pub issuer: String,
    pub value: String,
}

/// XRP 以 drops 字符串表示，发行资产以对象表示
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum XrpAmount {
    Drops(#[serde(with = "u64_string")] u64),
    Issued(IssuedAmount),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoFields {
    #[serde(rename = "MemoData")]
    pub memo_data: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoEntry {
    #[serde(rename = "Memo")]
    pub memo: MemoFields,
}

impl MemoEntry {
    pub fn from_text(text: &str) -> Self {
        Self {
            memo: MemoFields {
                memo_data: hex::encode_upper(text.as_bytes()),
            },
        }
    }

    pub fn text(&self) -> Option<String> {
        hex::decode(&self.memo.memo_data)
            .ok()
            .and_then(|bytes| String::from_utf8(bytes).ok())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct XrpTransaction {
    pub transaction_type: String,
    pub account: String,
    pub destination: String,
    pub amount: XrpAmount,
    #[serde(with = "u64_string")]
    pub fee: u64,
    pub sequence: u32,
    pub last_ledger_sequence: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination_tag: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signing_pub_key: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub memos: Vec<MemoEntry>,
}

mod u64_string {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &u64, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(value)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<u64, D::Error> {
        String::deserialize(d)?
            .parse()
            .map_err(serde::de::Error::custom)
    }
}

impl XrpTransaction {
    pub fn to_json(&self) -> Result<Value> {
        serde_json::to_value(self).map_err(|e| ChainError::encoding(e.to_string()))
    }

    pub fn from_json(value: &Value) -> Result<Self> {
        let tx: Self = serde_json::from_value(value.clone())
            .map_err(|e| ChainError::encoding(format!("invalid XRP transaction: {}", e)))?;
        if tx.transaction_type != PAYMENT {
            return Err(ChainError::encoding(format!(
                "unsupported TransactionType {}",
                tx.transaction_type
            )));
        }
        Ok(tx)
    }
}

/// 签名后 blob 的交易哈希
pub fn transaction_hash(blob: &[u8]) -> String {
    let mut preimage = Vec::with_capacity(blob.len() + 4);
    preimage.extend_from_slice(&TRANSACTION_HASH_PREFIX);
    preimage.extend_from_slice(blob);
    hex::encode_upper(sha512_half(&preimage))
}

impl ChainTransaction for XrpTransaction {
    fn ecosystem(&self) -> Ecosystem {
        Ecosystem::Xrp
    }

    fn encode_unsigned(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| ChainError::encoding(e.to_string()))
    }

    /// 签名器接收交易 JSON，负责规范二进制编码
    fn signing_payload(&self) -> Result<SigningPayload> {
        let json = serde_json::to_vec(self).map_err(|e| ChainError::encoding(e.to_string()))?;
        Ok(SigningPayload::single(SignatureAlgorithm::Secp256k1, json))
    }

    /// 唯一的“签名”是签名器返回的完整 blob
    fn apply_signatures(&self, signatures: &[Vec<u8>]) -> Result<SignedParts> {
        let [blob] = signatures else {
            return Err(ChainError::SignatureCount {
                expected: 1,
                actual: signatures.len(),
            });
        };
        if blob.is_empty() {
            return Err(ChainError::encoding("signed blob is empty"));
        }

        Ok(SignedParts {
            serialized: hex::encode_upper(blob),
            hash: transaction_hash(blob),
            bytes: blob.clone(),
        })
    }

    fn to_normalised(&self, chain: &str) -> NormalisedTransaction {
        let (kind, value) = match &self.amount {
            XrpAmount::Drops(drops) => (TransactionKind::NativeTransfer, drops.to_string()),
            XrpAmount::Issued(issued) => (TransactionKind::TokenTransfer, issued.value.clone()),
        };

        let mut tx = NormalisedTransaction::new(chain, kind)
            .with_parties(&self.account, &self.destination)
            .with_value(value)
            .with_fee(self.fee)
            .with_meta("sequence", self.sequence)
            .with_meta("last_ledger_sequence", self.last_ledger_sequence);

        if let Some(tag) = self.destination_tag {
            tx = tx.with_meta("destination_tag", tag);
        }
        if let XrpAmount::Issued(issued) = &self.amount {
            tx = tx
                .with_meta("currency", issued.currency.as_str())
                .with_meta("issuer", issued.issuer.as_str());
        }
        if let Some(text) = self.memos.first().and_then(MemoEntry::text) {
            tx = tx.with_meta("memo", text);
        }
        tx
    }

    fn rebuild(&self, overrides: &RebuildOverrides) -> Result<Self> {
        let mut tx = self.clone();
        if let Some(fee) = overrides.fee {
            tx.fee = fee;
        }
        if let Some(nonce) = overrides.nonce {
            tx.sequence = u32::try_from(nonce)
                .map_err(|_| ChainError::encoding(format!("sequence {} exceeds u32", nonce)))?;
        }
        if let Some(ledger) = overrides.last_ledger_sequence {
            tx.last_ledger_sequence = ledger;
        }
        Ok(tx)
    }
}

/// submit 结果分类
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubmitResult {
    pub success: bool,
    pub engine_result: String,
    pub error: Option<String>,
    pub tx_hash: Option<String>,
}

/// 按 engine_result 判定提交是否被账本接受
///
/// tesSUCCESS、tec*（已扣费入账）与 terQUEUED 视为成功，其余返回包含结果码的错误信息。
pub fn classify_submit_result(result: &Value) -> SubmitResult {
    let engine_result = result["engine_result"].as_str().unwrap_or_default().to_string();
    let tx_hash = result["tx_json"]["hash"].as_str().map(str::to_string);

    let success = engine_result == "tesSUCCESS"
        || engine_result.starts_with("tec")
        || engine_result == "terQUEUED";

    let error = (!success).then(|| {
        let message = result["engine_result_message"]
            .as_str()
            .or_else(|| result["error_message"].as_str())
            .or_else(|| result["error"].as_str())
            .unwrap_or("submission rejected");
        if engine_result.is_empty() {
            message.to_string()
        } else {
            format!("{}: {}", engine_result, message)
        }
    });

    SubmitResult {
        success,
        engine_result,
        error,
        tx_hash,
    }
}

/// 发行资产金额保持十进制原样（无最小单位），必须为正数
fn issued_value(amount: &Amount) -> Result<String> {
    let value = match amount {
        Amount::Decimal(v) => Decimal::from_str(v.trim())
            .map_err(|e| ChainError::InvalidAmount(format!("'{}': {}", v, e)))?
            .normalize(),
        Amount::BaseUnits(v) => Decimal::from(
            u64::try_from(parse_base_units(v)?)
                .map_err(|_| ChainError::InvalidAmount(format!("'{}' out of range", v)))?,
        ),
    };
    if value <= Decimal::ZERO {
        return Err(ChainError::InvalidAmount(format!(
            "issued amount '{}' must be positive",
            value
        )));
    }
    Ok(value.to_string())
}

/// 构建 XRP Payment（原生 XRP 或发行资产）
pub fn build(config: &ChainConfig, intent: &TransferIntent, ctx: &XrpContext) -> Result<XrpTransaction> {
    let chain = config.alias.as_str();
    let ledger_offset = match config.params {
        ChainParams::Xrp { ledger_offset, .. } => ledger_offset,
        _ => return Err(ChainError::UnsupportedChain(chain.to_string())),
    };

    AddressValidator::parse_xrp(chain, &intent.from)?;
    AddressValidator::parse_xrp(chain, &intent.to)?;
    if intent.from == intent.to {
        return Err(ChainError::invalid_address_with_reason(
            chain,
            &intent.to,
            "destination equals source account",
        ));
    }

    let amount = match &intent.asset {
        Asset::Native => XrpAmount::Drops(intent.amount.to_base_units_u64(config.decimals)?),
        Asset::XrpIssued { currency, issuer } => {
            AddressValidator::parse_xrp(chain, issuer)?;
            XrpAmount::Issued(IssuedAmount {
                currency: currency.clone(),
                issuer: issuer.clone(),
                value: issued_value(&intent.amount)?,
            })
        }
        _ => return Err(ChainError::contract(chain, "non-XRPL token transfer")),
    };

    let overrides = &intent.overrides;
    let sequence = match overrides.nonce {
        Some(nonce) => u32::try_from(nonce)
            .map_err(|_| ChainError::encoding(format!("sequence {} exceeds u32", nonce)))?,
        None => ctx.sequence,
    };
    let last_ledger_sequence = overrides
        .last_ledger_sequence
        .unwrap_or_else(|| ctx.ledger_current_index.saturating_add(ledger_offset));

    let signing_pub_key = intent
        .public_key
        .as_deref()
        .map(|k| decode_hex(k).map(hex::encode_upper))
        .transpose()?;

    let tx = XrpTransaction {
        transaction_type: PAYMENT.to_string(),
        account: intent.from.clone(),
        destination: intent.to.clone(),
        amount,
        fee: overrides.fee.unwrap_or(ctx.fee_drops),
        sequence,
        last_ledger_sequence,
        destination_tag: intent.destination_tag,
        signing_pub_key,
        memos: intent.memo.as_deref().map(MemoEntry::from_text).into_iter().collect(),
    };

    tracing::debug!(
        chain = %chain,
        sequence = tx.sequence,
        last_ledger_sequence = tx.last_ledger_sequence,
        fee = tx.fee,
        "XRP payment built"
    );
    Ok(tx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{amount::Amount, chain_config::ChainRegistry};
    use serde_json::json;

    const ACCOUNT: &str = "rHb9CJAWyB4rj91VRWn96DkukG4bwdtyTh";
    const DESTINATION: &str = "rPT1Sjq2YGrBMTttX4GZHjKu9dyfzbpAYe";

    fn ctx() -> XrpContext {
        XrpContext {
            sequence: 7,
            fee_drops: 12,
            ledger_current_index: 1_000,
        }
    }

    fn payment() -> XrpTransaction {
        let registry = ChainRegistry::new();
        let intent = TransferIntent::native(ACCOUNT, DESTINATION, Amount::decimal("1.5"))
            .with_destination_tag(42)
            .with_memo("hi");
        build(registry.get("xrp").unwrap(), &intent, &ctx()).unwrap()
    }

    #[test]
    fn test_payment_json_shape() {
        let json = payment().to_json().unwrap();
        assert_eq!(
            json,
            json!({
                "TransactionType": "Payment",
                "Account": ACCOUNT,
                "Destination": DESTINATION,
                "Amount": "1500000",
                "Fee": "12",
                "Sequence": 7,
                "LastLedgerSequence": 1020,
                "DestinationTag": 42,
                "Memos": [{ "Memo": { "MemoData": "6869" } }]
            })
        );
        assert_eq!(XrpTransaction::from_json(&json).unwrap(), payment());
    }

    #[test]
    fn test_issued_amount() {
        let registry = ChainRegistry::new();
        let intent = TransferIntent::native(ACCOUNT, DESTINATION, Amount::decimal("10.25"))
            .with_asset(Asset::XrpIssued {
                currency: "USD".to_string(),
                issuer: DESTINATION.to_string(),
            });
        let tx = build(registry.get("xrp").unwrap(), &intent, &ctx()).unwrap();
        let json = tx.to_json().unwrap();
        assert_eq!(json["Amount"]["currency"], "USD");
        assert_eq!(json["Amount"]["value"], "10.25");

        let normalised = tx.to_normalised("xrp");
        assert_eq!(normalised.kind, TransactionKind::TokenTransfer);
        assert_eq!(normalised.metadata["issuer"], DESTINATION);
        assert_eq!(XrpTransaction::from_json(&json).unwrap(), tx);
    }

    #[test]
    fn test_issued_amount_must_be_positive_number() {
        let registry = ChainRegistry::new();
        let config = registry.get("xrp").unwrap();
        let issued = |amount: Amount| {
            TransferIntent::native(ACCOUNT, DESTINATION, amount).with_asset(Asset::XrpIssued {
                currency: "USD".to_string(),
                issuer: DESTINATION.to_string(),
            })
        };

        for bad in ["ten dollars", "", "-1", "0", "0.000", "1.2.3"] {
            let err = build(config, &issued(Amount::decimal(bad)), &ctx()).unwrap_err();
            assert_eq!(err.code(), "invalid_amount", "{:?}", bad);
        }
        assert!(build(config, &issued(Amount::base_units("0")), &ctx()).is_err());

        let tx = build(config, &issued(Amount::decimal(" 7.500 ")), &ctx()).unwrap();
        assert_eq!(tx.to_json().unwrap()["Amount"]["value"], "7.5");
        let tx = build(config, &issued(Amount::base_units("42")), &ctx()).unwrap();
        assert_eq!(tx.to_json().unwrap()["Amount"]["value"], "42");
    }

    #[test]
    fn test_signed_blob_hash() {
        let tx = payment();
        let blob = vec![0x12, 0x00, 0x00];
        let parts = tx.apply_signatures(&[blob.clone()]).unwrap();
        assert_eq!(parts.serialized, "120000");
        assert_eq!(parts.hash, transaction_hash(&blob));
        assert_eq!(parts.hash.len(), 64);
        assert_eq!(parts.hash, parts.hash.to_uppercase());

        assert!(tx.apply_signatures(&[]).is_err());
        assert!(tx.apply_signatures(&[vec![]]).is_err());
    }

    #[test]
    fn test_rebuild_overrides() {
        let tx = payment();
        let rebuilt = tx
            .rebuild(
                &RebuildOverrides::new()
                    .with_fee(20)
                    .with_nonce(9)
                    .with_last_ledger_sequence(2_000),
            )
            .unwrap();
        assert_eq!((tx.fee, tx.sequence), (12, 7));
        assert_eq!((rebuilt.fee, rebuilt.sequence, rebuilt.last_ledger_sequence), (20, 9, 2_000));
    }

    #[test]
    fn test_classify_submit_result() {
        let ok = classify_submit_result(&json!({
            "engine_result": "tesSUCCESS",
            "tx_json": { "hash": "ABC" }
        }));
        assert!(ok.success);
        assert_eq!(ok.tx_hash.as_deref(), Some("ABC"));

        assert!(classify_submit_result(&json!({ "engine_result": "tecPATH_DRY" })).success);
        assert!(classify_submit_result(&json!({ "engine_result": "terQUEUED" })).success);

        let rejected = classify_submit_result(&json!({
            "engine_result": "tefPAST_SEQ",
            "engine_result_message": "This sequence number has already passed."
        }));
        assert!(!rejected.success);
        assert!(rejected.error.unwrap().starts_with("tefPAST_SEQ"));
    }

    #[test]
    fn test_rejects_self_payment() {
        let registry = ChainRegistry::new();
        let intent = TransferIntent::native(ACCOUNT, ACCOUNT, Amount::decimal("1"));
        let err = build(registry.get("xrp").unwrap(), &intent, &ctx()).unwrap_err();
        assert_eq!(err.code(), "invalid_address");
    }
}
