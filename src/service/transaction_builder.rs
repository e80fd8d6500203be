//! 统一交易构建器
//!
//! 为所有生态提供统一的交易模型：
//! `Draft → Unsigned → (请求签名载荷，不改变状态) → Signed → Broadcast`
//!
//! 各生态的原生交易形态收敛在 [`RawTransaction`] 这个封闭枚举里，
//! 统一契约由 [`ChainTransaction`] trait 表达，每个变体实现一次。
//! 所有“修改”（rebuild、应用签名）都构造新值，原实例保持不变。

pub mod evm;
pub mod solana;
pub mod tron;
pub mod utxo;
pub mod xrp;

use serde::Serialize;

pub use evm::{EvmContext, EvmTransaction};
pub use solana::{SolanaContext, SolanaTransaction};
pub use tron::{TronContext, TronTransaction};
pub use utxo::{UtxoContext, UtxoTransaction};
pub use xrp::{XrpContext, XrpTransaction};

use crate::{
    domain::{
        chain_config::{ChainConfig, Ecosystem},
        transaction::{NormalisedTransaction, RebuildOverrides, SigningPayload, TransferIntent},
        transaction_status::TransactionStatus,
    },
    error::{ChainError, Result},
    service::providers::ChainProvider,
};

/// 签名后的产物：链上字节、广播用字符串、链原生交易标识
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedParts {
    pub bytes: Vec<u8>,
    pub serialized: String,
    pub hash: String,
}

/// 各生态原生交易形态的统一契约
pub trait ChainTransaction: Sized {
    fn ecosystem(&self) -> Ecosystem;

    /// canonical 序列化（未签名）
    fn encode_unsigned(&self) -> Result<String>;

    fn signing_payload(&self) -> Result<SigningPayload>;

    /// 校验签名数量/长度并产出签名后的字节与标识；不校验签名的密码学正确性
    fn apply_signatures(&self, signatures: &[Vec<u8>]) -> Result<SignedParts>;

    fn to_normalised(&self, chain: &str) -> NormalisedTransaction;

    /// 返回覆盖了部分字段的新实例
    fn rebuild(&self, overrides: &RebuildOverrides) -> Result<Self>;
}

/// 各生态的原生交易形态（带生态标签）
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "ecosystem", content = "transaction", rename_all = "lowercase")]
pub enum RawTransaction {
    Evm(EvmTransaction),
    Solana(SolanaTransaction),
    Utxo(UtxoTransaction),
    Xrp(XrpTransaction),
    Tron(TronTransaction),
}

macro_rules! dispatch {
    ($raw:expr, $tx:ident => $body:expr) => {
        match $raw {
            RawTransaction::Evm($tx) => $body,
            RawTransaction::Solana($tx) => $body,
            RawTransaction::Utxo($tx) => $body,
            RawTransaction::Xrp($tx) => $body,
            RawTransaction::Tron($tx) => $body,
        }
    };
}

impl ChainTransaction for RawTransaction {
    fn ecosystem(&self) -> Ecosystem {
        dispatch!(self, tx => tx.ecosystem())
    }

    fn encode_unsigned(&self) -> Result<String> {
        dispatch!(self, tx => tx.encode_unsigned())
    }

    fn signing_payload(&self) -> Result<SigningPayload> {
        dispatch!(self, tx => tx.signing_payload())
    }

    fn apply_signatures(&self, signatures: &[Vec<u8>]) -> Result<SignedParts> {
        dispatch!(self, tx => tx.apply_signatures(signatures))
    }

    fn to_normalised(&self, chain: &str) -> NormalisedTransaction {
        dispatch!(self, tx => tx.to_normalised(chain))
    }

    fn rebuild(&self, overrides: &RebuildOverrides) -> Result<Self> {
        Ok(match self {
            Self::Evm(tx) => Self::Evm(tx.rebuild(overrides)?),
            Self::Solana(tx) => Self::Solana(tx.rebuild(overrides)?),
            Self::Utxo(tx) => Self::Utxo(tx.rebuild(overrides)?),
            Self::Xrp(tx) => Self::Xrp(tx.rebuild(overrides)?),
            Self::Tron(tx) => Self::Tron(tx.rebuild(overrides)?),
        })
    }
}

/// 已上下文填充的构建输入
#[derive(Debug, Clone)]
pub enum BuildContext {
    Evm(EvmContext),
    Solana(SolanaContext),
    Utxo(UtxoContext),
    Xrp(XrpContext),
    Tron(TronContext),
}

/// 统一交易构建器
///
/// 纯函数：`(ChainConfig, TransferIntent, 链上下文) → UnsignedTransaction`。
/// 网络取数由 Provider 完成，这里只接受已取得的值。
pub struct TransactionBuilder;

impl TransactionBuilder {
    pub fn build(
        config: &ChainConfig,
        intent: &TransferIntent,
        context: BuildContext,
    ) -> Result<UnsignedTransaction> {
        let raw = match (config.ecosystem(), context) {
            (Ecosystem::Evm, BuildContext::Evm(ctx)) => {
                RawTransaction::Evm(evm::build(config, intent, &ctx)?)
            }
            (Ecosystem::Solana, BuildContext::Solana(ctx)) => {
                RawTransaction::Solana(solana::build(config, intent, &ctx)?)
            }
            (Ecosystem::Utxo, BuildContext::Utxo(ctx)) => {
                RawTransaction::Utxo(utxo::build(config, intent, &ctx)?)
            }
            (Ecosystem::Xrp, BuildContext::Xrp(ctx)) => {
                RawTransaction::Xrp(xrp::build(config, intent, &ctx)?)
            }
            (Ecosystem::Tron, BuildContext::Tron(ctx)) => {
                RawTransaction::Tron(tron::build(config, intent, &ctx)?)
            }
            (Ecosystem::Substrate, _) => {
                return Err(ChainError::contract(&config.alias, "transfer"));
            }
            (ecosystem, _) => {
                return Err(ChainError::encoding(format!(
                    "build context does not match {} ecosystem",
                    ecosystem.as_str()
                )));
            }
        };

        tracing::debug!(
            chain = %config.alias,
            ecosystem = raw.ecosystem().as_str(),
            "Unsigned transaction built"
        );
        Ok(UnsignedTransaction::new(&config.alias, raw))
    }
}

/// 未签名交易（不可变）
#[derive(Debug, Clone, PartialEq)]
pub struct UnsignedTransaction {
    chain: String,
    raw: RawTransaction,
}

impl UnsignedTransaction {
    pub fn new(chain: impl Into<String>, raw: RawTransaction) -> Self {
        Self {
            chain: chain.into(),
            raw,
        }
    }

    pub fn chain(&self) -> &str {
        &self.chain
    }

    pub fn raw(&self) -> &RawTransaction {
        &self.raw
    }

    pub fn ecosystem(&self) -> Ecosystem {
        self.raw.ecosystem()
    }

    pub fn status(&self) -> TransactionStatus {
        TransactionStatus::Unsigned
    }

    pub fn serialized(&self) -> Result<String> {
        self.raw.encode_unsigned()
    }

    pub fn signing_payload(&self) -> Result<SigningPayload> {
        self.raw.signing_payload()
    }

    pub fn to_normalised(&self) -> NormalisedTransaction {
        self.raw.to_normalised(&self.chain)
    }

    /// 产生一个覆盖了部分字段的兄弟实例，自身不变
    pub fn rebuild(&self, overrides: &RebuildOverrides) -> Result<Self> {
        Ok(Self {
            chain: self.chain.clone(),
            raw: self.raw.rebuild(overrides)?,
        })
    }

    /// 应用外部签名器返回的签名（顺序与载荷一致）
    pub fn sign(&self, signatures: Vec<Vec<u8>>) -> Result<SignedTransaction> {
        let expected = self.signing_payload()?.len();
        if signatures.len() != expected {
            return Err(ChainError::SignatureCount {
                expected,
                actual: signatures.len(),
            });
        }

        let parts = self.raw.apply_signatures(&signatures)?;
        tracing::debug!(
            chain = %self.chain,
            tx_hash = %parts.hash,
            signatures = signatures.len(),
            "Signatures applied"
        );

        Ok(SignedTransaction {
            unsigned: self.clone(),
            signatures,
            parts,
        })
    }
}

/// 已签名交易
#[derive(Debug, Clone, PartialEq)]
pub struct SignedTransaction {
    unsigned: UnsignedTransaction,
    signatures: Vec<Vec<u8>>,
    parts: SignedParts,
}

impl SignedTransaction {
    pub fn unsigned(&self) -> &UnsignedTransaction {
        &self.unsigned
    }

    pub fn chain(&self) -> &str {
        self.unsigned.chain()
    }

    pub fn signatures(&self) -> &[Vec<u8>] {
        &self.signatures
    }

    /// 链上字节
    pub fn bytes(&self) -> &[u8] {
        &self.parts.bytes
    }

    /// 广播用编码（EVM 0x-hex、Solana base64、UTXO hex、XRP 大写 hex、Tron JSON）
    pub fn serialized(&self) -> &str {
        &self.parts.serialized
    }

    /// 链原生交易标识，由签名后字节确定性计算
    pub fn hash(&self) -> &str {
        &self.parts.hash
    }

    pub fn status(&self) -> TransactionStatus {
        TransactionStatus::Signed
    }

    pub fn to_normalised(&self) -> NormalisedTransaction {
        self.unsigned
            .to_normalised()
            .with_hash(self.hash())
            .with_status(TransactionStatus::Signed)
    }

    /// 单次尽力提交，返回节点确认的交易标识
    pub async fn broadcast(&self, provider: &dyn ChainProvider) -> Result<String> {
        provider.broadcast(self).await
    }
}

#[cfg(test)]
mod tests;
