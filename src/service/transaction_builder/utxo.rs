//! UTXO（Bitcoin）交易构建
//!
//! 选币后生成 BIP-174 PSBT；每个输入一条签名摘要：
//! - P2WPKH：BIP-143 sighash（SIGHASH_ALL），签名为 64 字节 compact，组装时转为 DER
//! - P2TR：BIP-341 key-path sighash（SIGHASH_DEFAULT），签名为 64 字节 Schnorr

use std::str::FromStr;

use bitcoin::{
    absolute::LockTime,
    consensus::encode::serialize as consensus_serialize,
    hashes::{hash160, Hash},
    psbt::Psbt,
    secp256k1::ecdsa::Signature as EcdsaSignature,
    sighash::{EcdsaSighashType, Prevouts, SighashCache, TapSighashType},
    transaction::Version,
    Amount as BtcAmount, OutPoint, ScriptBuf, Sequence, Transaction, TxIn, TxOut,
    Txid, Witness,
};
use serde::{Serialize, Serializer};

use super::{ChainTransaction, SignedParts};
use crate::{
    codec::decode_hex,
    domain::{
        chain_config::{ChainConfig, ChainParams, Ecosystem, UtxoNetwork},
        transaction::{
            Asset, NormalisedTransaction, RebuildOverrides, SignatureAlgorithm, SigningPayload,
            TransactionKind, TransferIntent,
        },
    },
    error::{ChainError, Result},
    service::coin_selection::{select_coins, CoinSelection, ScriptKind, SelectionParams, Utxo},
    utils::address_validator::AddressValidator,
};

pub const SIGNATURE_LEN: usize = 64;
const COMPRESSED_PUBKEY_LEN: usize = 33;

/// Provider 拉取的构建上下文
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UtxoContext {
    pub utxos: Vec<Utxo>,
    /// sat/vB
    pub fee_rate: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UtxoTransaction {
    pub network: UtxoNetwork,
    pub from: String,
    pub to: String,
    /// satoshi
    pub amount: u64,
    /// sat/vB
    pub fee_rate: u64,
    #[serde(serialize_with = "serialize_hex")]
    pub recipient_script: Vec<u8>,
    #[serde(serialize_with = "serialize_hex")]
    pub change_script: Vec<u8>,
    pub selection: CoinSelection,
    #[serde(skip_serializing_if = "Option::is_none", serialize_with = "serialize_opt_hex")]
    pub public_key: Option<Vec<u8>>,
    /// 重新选币时使用的候选集
    #[serde(skip)]
    available: Vec<Utxo>,
    #[serde(skip)]
    dust_threshold: u64,
    #[serde(skip)]
    min_confirmations: u32,
}

fn serialize_hex<S: Serializer>(data: &[u8], s: S) -> std::result::Result<S::Ok, S::Error> {
    s.serialize_str(&hex::encode(data))
}

fn serialize_opt_hex<S: Serializer>(
    data: &Option<Vec<u8>>,
    s: S,
) -> std::result::Result<S::Ok, S::Error> {
    match data {
        Some(bytes) => s.serialize_str(&hex::encode(bytes)),
        None => s.serialize_none(),
    }
}

fn btc_err(e: impl std::fmt::Display) -> ChainError {
    ChainError::encoding(e.to_string())
}

impl UtxoTransaction {
    fn prevouts(&self) -> Vec<TxOut> {
        self.selection
            .selected
            .iter()
            .map(|u| TxOut {
                value: BtcAmount::from_sat(u.value),
                script_pubkey: ScriptBuf::from_bytes(u.script_pubkey.clone()),
            })
            .collect()
    }

    /// 未签名交易（输入 RBF 序号，无 locktime）
    pub fn unsigned_tx(&self) -> Result<Transaction> {
        let input = self
            .selection
            .selected
            .iter()
            .map(|u| {
                let txid = Txid::from_str(&u.txid)
                    .map_err(|e| ChainError::invalid_hash("bitcoin", &u.txid, e.to_string()))?;
                Ok(TxIn {
                    previous_output: OutPoint::new(txid, u.vout),
                    script_sig: ScriptBuf::new(),
                    sequence: Sequence::ENABLE_RBF_NO_LOCKTIME,
                    witness: Witness::new(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let mut output = vec![TxOut {
            value: BtcAmount::from_sat(self.amount),
            script_pubkey: ScriptBuf::from_bytes(self.recipient_script.clone()),
        }];
        if self.selection.change > 0 {
            output.push(TxOut {
                value: BtcAmount::from_sat(self.selection.change),
                script_pubkey: ScriptBuf::from_bytes(self.change_script.clone()),
            });
        }

        Ok(Transaction {
            version: Version::TWO,
            lock_time: LockTime::ZERO,
            input,
            output,
        })
    }

    /// 带 witness_utxo 的 PSBT
    pub fn psbt(&self) -> Result<Psbt> {
        let mut psbt = Psbt::from_unsigned_tx(self.unsigned_tx()?).map_err(btc_err)?;
        for (input, prevout) in psbt.inputs.iter_mut().zip(self.prevouts()) {
            input.witness_utxo = Some(prevout);
        }
        Ok(psbt)
    }

    fn input_kinds(&self) -> Result<Vec<ScriptKind>> {
        self.selection
            .selected
            .iter()
            .map(|u| {
                u.script_kind().ok_or_else(|| {
                    ChainError::encoding(format!("unsupported script for {}:{}", u.txid, u.vout))
                })
            })
            .collect()
    }

    /// 每个输入的 sighash
    pub fn sighashes(&self) -> Result<Vec<[u8; 32]>> {
        let tx = self.unsigned_tx()?;
        let prevouts = self.prevouts();
        let kinds = self.input_kinds()?;
        let mut cache = SighashCache::new(&tx);

        kinds
            .iter()
            .enumerate()
            .map(|(index, kind)| match kind {
                ScriptKind::P2wpkh => {
                    let prevout = &prevouts[index];
                    cache
                        .p2wpkh_signature_hash(
                            index,
                            &prevout.script_pubkey,
                            prevout.value,
                            EcdsaSighashType::All,
                        )
                        .map(|h| h.to_byte_array())
                        .map_err(btc_err)
                }
                ScriptKind::P2tr => cache
                    .taproot_key_spend_signature_hash(
                        index,
                        &Prevouts::All(&prevouts),
                        TapSighashType::Default,
                    )
                    .map(|h| h.to_byte_array())
                    .map_err(btc_err),
            })
            .collect()
    }
}

impl ChainTransaction for UtxoTransaction {
    fn ecosystem(&self) -> Ecosystem {
        Ecosystem::Utxo
    }

    /// PSBT（hex）
    fn encode_unsigned(&self) -> Result<String> {
        Ok(hex::encode(self.psbt()?.serialize()))
    }

    fn signing_payload(&self) -> Result<SigningPayload> {
        Ok(SigningPayload {
            algorithm: SignatureAlgorithm::Secp256k1,
            data: self.sighashes()?.iter().map(|h| h.to_vec()).collect(),
        })
    }

    fn apply_signatures(&self, signatures: &[Vec<u8>]) -> Result<SignedParts> {
        let kinds = self.input_kinds()?;
        if signatures.len() != kinds.len() {
            return Err(ChainError::SignatureCount {
                expected: kinds.len(),
                actual: signatures.len(),
            });
        }

        let mut tx = self.unsigned_tx()?;
        for (index, (sig, kind)) in signatures.iter().zip(&kinds).enumerate() {
            if sig.len() != SIGNATURE_LEN {
                return Err(ChainError::SignatureLength {
                    index,
                    expected: SIGNATURE_LEN,
                    actual: sig.len(),
                });
            }

            tx.input[index].witness = match kind {
                ScriptKind::P2wpkh => {
                    let public_key = self.public_key.as_ref().ok_or_else(|| {
                        ChainError::encoding("public key required for P2WPKH witness")
                    })?;
                    let mut der = EcdsaSignature::from_compact(sig)
                        .map_err(btc_err)?
                        .serialize_der()
                        .to_vec();
                    der.push(EcdsaSighashType::All as u8);
                    Witness::from_slice(&[der, public_key.clone()])
                }
                // SIGHASH_DEFAULT 不附加类型字节
                ScriptKind::P2tr => Witness::from_slice(&[sig.clone()]),
            };
        }

        let bytes = consensus_serialize(&tx);
        Ok(SignedParts {
            serialized: hex::encode(&bytes),
            hash: tx.txid().to_string(),
            bytes,
        })
    }

    fn to_normalised(&self, chain: &str) -> NormalisedTransaction {
        NormalisedTransaction::new(chain, TransactionKind::NativeTransfer)
            .with_parties(&self.from, &self.to)
            .with_value(self.amount)
            .with_fee(self.selection.fee)
            .with_meta("fee_rate", self.fee_rate)
            .with_meta("vsize", self.selection.vsize)
            .with_meta("inputs", self.selection.selected.len())
            .with_meta("change", self.selection.change)
    }

    /// 仅费率可覆盖；按新费率重新选币
    fn rebuild(&self, overrides: &RebuildOverrides) -> Result<Self> {
        let Some(fee_rate) = overrides.fee_rate else {
            return Ok(self.clone());
        };
        if fee_rate == 0 {
            return Err(ChainError::InvalidAmount("fee rate must be positive".to_string()));
        }

        let candidates = if self.available.is_empty() {
            &self.selection.selected
        } else {
            &self.available
        };
        let selection = select_coins(
            candidates,
            &SelectionParams {
                target: self.amount,
                fee_rate,
                recipient_script: &self.recipient_script,
                change_script: &self.change_script,
                dust_threshold: self.dust_threshold,
                min_confirmations: self.min_confirmations,
            },
        )?;
        require_witness_key(&selection, self.public_key.as_deref())?;

        Ok(Self {
            fee_rate,
            selection,
            ..self.clone()
        })
    }
}

fn parse_public_key(hex_key: &str, sender_script: &[u8]) -> Result<Vec<u8>> {
    let key = decode_hex(hex_key)?;
    if key.len() != COMPRESSED_PUBKEY_LEN {
        return Err(ChainError::encoding(format!(
            "public key must be {} bytes, got {}",
            COMPRESSED_PUBKEY_LEN,
            key.len()
        )));
    }
    if ScriptKind::classify(sender_script) == Some(ScriptKind::P2wpkh)
        && hash160::Hash::hash(&key).to_byte_array()[..] != sender_script[2..22]
    {
        return Err(ChainError::encoding(
            "public key does not match sender address",
        ));
    }
    Ok(key)
}

/// P2WPKH 见证需要公钥，在交出签名载荷前确认已提供
fn require_witness_key(selection: &CoinSelection, public_key: Option<&[u8]>) -> Result<()> {
    if public_key.is_some() {
        return Ok(());
    }
    match selection
        .selected
        .iter()
        .find(|u| u.script_kind() == Some(ScriptKind::P2wpkh))
    {
        Some(u) => Err(ChainError::encoding(format!(
            "public key required for P2WPKH input {}:{}",
            u.txid, u.vout
        ))),
        None => Ok(()),
    }
}

/// 构建 UTXO 转账（选币 + PSBT）
pub fn build(
    config: &ChainConfig,
    intent: &TransferIntent,
    ctx: &UtxoContext,
) -> Result<UtxoTransaction> {
    let chain = config.alias.as_str();
    let (network, dust_threshold, min_confirmations) = match config.params {
        ChainParams::Utxo {
            network,
            dust_threshold,
            min_confirmations,
        } => (network, dust_threshold, min_confirmations),
        _ => return Err(ChainError::UnsupportedChain(chain.to_string())),
    };

    if !matches!(intent.asset, Asset::Native) {
        return Err(ChainError::contract(chain, "token transfer"));
    }
    if intent.memo.is_some() {
        return Err(ChainError::contract(chain, "memo"));
    }

    let sender = AddressValidator::parse_bitcoin(chain, &intent.from, network)?;
    let recipient = AddressValidator::parse_bitcoin(chain, &intent.to, network)?;
    let change_script = sender.script_pubkey().into_bytes();
    let recipient_script = recipient.script_pubkey().into_bytes();

    if ScriptKind::classify(&change_script).is_none() {
        return Err(ChainError::invalid_address_with_reason(
            chain,
            &intent.from,
            "only P2WPKH and P2TR senders are supported",
        ));
    }

    let amount = intent.amount.to_base_units_u64(config.decimals)?;
    if amount < dust_threshold {
        return Err(ChainError::InvalidAmount(format!(
            "{} sat is below dust threshold {}",
            amount, dust_threshold
        )));
    }

    let fee_rate = intent.overrides.fee_rate.unwrap_or(ctx.fee_rate);
    if fee_rate == 0 {
        return Err(ChainError::InvalidAmount("fee rate must be positive".to_string()));
    }

    let public_key = intent
        .public_key
        .as_deref()
        .map(|k| parse_public_key(k, &change_script))
        .transpose()?;

    // 未带脚本的 UTXO 视为属于发送方地址
    let available: Vec<Utxo> = ctx
        .utxos
        .iter()
        .cloned()
        .map(|mut u| {
            if u.script_pubkey.is_empty() {
                u.script_pubkey = change_script.clone();
            }
            u
        })
        .collect();

    let selection = select_coins(
        &available,
        &SelectionParams {
            target: amount,
            fee_rate,
            recipient_script: &recipient_script,
            change_script: &change_script,
            dust_threshold,
            min_confirmations,
        },
    )?;
    require_witness_key(&selection, public_key.as_deref())?;

    tracing::debug!(
        chain = %chain,
        inputs = selection.selected.len(),
        fee = selection.fee,
        fee_rate,
        "UTXO transaction assembled"
    );

    Ok(UtxoTransaction {
        network,
        from: intent.from.clone(),
        to: intent.to.clone(),
        amount,
        fee_rate,
        recipient_script,
        change_script,
        selection,
        public_key,
        available,
        dust_threshold,
        min_confirmations,
    })
}
