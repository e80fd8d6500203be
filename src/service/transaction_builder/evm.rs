//! EVM 交易构建（EIP-1559，type 0x02）
//!
//! 未签名载荷：keccak256(0x02 ‖ rlp([chain_id, nonce, max_priority_fee_per_gas,
//! max_fee_per_gas, gas_limit, to, value, data, access_list]))

use rlp::RlpStream;
use serde::Serialize;

use super::{ChainTransaction, SignedParts};
use crate::{
    crypto::keccak256,
    domain::{
        chain_config::{ChainConfig, Ecosystem},
        transaction::{
            Asset, NormalisedTransaction, RebuildOverrides, SignatureAlgorithm, SigningPayload,
            TransactionKind, TransferIntent,
        },
    },
    error::{ChainError, Result},
    utils::address_validator::AddressValidator,
};

/// EIP-2718 交易类型
pub const EIP1559_TX_TYPE: u8 = 0x02;
/// transfer(address,uint256)
pub const ERC20_TRANSFER_SELECTOR: [u8; 4] = [0xa9, 0x05, 0x9c, 0xbb];

pub const NATIVE_TRANSFER_GAS: u64 = 21_000;
pub const ERC20_TRANSFER_GAS: u64 = 65_000;

/// Provider 拉取的构建上下文
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvmContext {
    pub nonce: u64,
    pub max_fee_per_gas: u128,
    pub max_priority_fee_per_gas: u128,
    /// 来自 eth_estimateGas；None 时按交易类型取默认值
    pub gas_limit: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EvmTransaction {
    pub chain_id: u64,
    #[serde(with = "hex_bytes")]
    pub from: [u8; 20],
    pub nonce: u64,
    pub max_priority_fee_per_gas: u128,
    pub max_fee_per_gas: u128,
    pub gas_limit: u64,
    #[serde(with = "hex_bytes")]
    pub to: [u8; 20],
    pub value: u128,
    #[serde(with = "hex_bytes")]
    pub data: Vec<u8>,
}

mod hex_bytes {
    use serde::Serializer;

    pub fn serialize<S: Serializer, T: AsRef<[u8]>>(v: &T, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&format!("0x{}", hex::encode(v.as_ref())))
    }
}

/// ERC-20 transfer 调用数据
pub fn erc20_transfer_data(recipient: &[u8; 20], amount: u128) -> Vec<u8> {
    let mut data = Vec::with_capacity(68);
    data.extend_from_slice(&ERC20_TRANSFER_SELECTOR);
    data.extend_from_slice(&[0u8; 12]);
    data.extend_from_slice(recipient);
    data.extend_from_slice(&[0u8; 16]);
    data.extend_from_slice(&amount.to_be_bytes());
    data
}

/// 解析 ERC-20 transfer 调用数据，返回 (recipient, amount)
pub fn decode_erc20_transfer(data: &[u8]) -> Option<([u8; 20], u128)> {
    if data.len() != 68 || data[..4] != ERC20_TRANSFER_SELECTOR {
        return None;
    }
    // 金额高 16 字节非零时超出 u128，不做展示解析
    if data[36..52].iter().any(|&b| b != 0) {
        return None;
    }
    let mut recipient = [0u8; 20];
    recipient.copy_from_slice(&data[16..36]);
    let mut amount = [0u8; 16];
    amount.copy_from_slice(&data[52..68]);
    Some((recipient, u128::from_be_bytes(amount)))
}

fn strip_leading_zeros(bytes: &[u8]) -> &[u8] {
    let start = bytes.iter().position(|&b| b != 0).unwrap_or(bytes.len());
    &bytes[start..]
}

/// RLP 整数：最短大端字节串
fn append_u128(stream: &mut RlpStream, value: u128) {
    stream.append(&strip_leading_zeros(&value.to_be_bytes()).to_vec());
}

impl EvmTransaction {
    fn append_fields(&self, stream: &mut RlpStream) {
        stream.append(&self.chain_id);
        stream.append(&self.nonce);
        append_u128(stream, self.max_priority_fee_per_gas);
        append_u128(stream, self.max_fee_per_gas);
        stream.append(&self.gas_limit);
        stream.append(&self.to.to_vec());
        append_u128(stream, self.value);
        stream.append(&self.data);
        stream.begin_list(0);
    }

    /// 0x02 ‖ rlp(9 字段)
    pub fn unsigned_bytes(&self) -> Vec<u8> {
        let mut stream = RlpStream::new_list(9);
        self.append_fields(&mut stream);
        let mut out = vec![EIP1559_TX_TYPE];
        out.extend_from_slice(&stream.out());
        out
    }

    /// 0x02 ‖ rlp(9 字段 + y_parity, r, s)
    pub fn signed_bytes(&self, signature: &[u8]) -> Result<Vec<u8>> {
        if signature.len() != 65 {
            return Err(ChainError::SignatureLength {
                index: 0,
                expected: 65,
                actual: signature.len(),
            });
        }
        let y_parity: u8 = match signature[64] {
            v @ (0 | 1) => v,
            v @ (27 | 28) => v - 27,
            v => {
                return Err(ChainError::encoding(format!(
                    "invalid signature recovery id: {}",
                    v
                )))
            }
        };

        let mut stream = RlpStream::new_list(12);
        self.append_fields(&mut stream);
        stream.append(&y_parity);
        stream.append(&strip_leading_zeros(&signature[..32]).to_vec());
        stream.append(&strip_leading_zeros(&signature[32..64]).to_vec());

        let mut out = vec![EIP1559_TX_TYPE];
        out.extend_from_slice(&stream.out());
        Ok(out)
    }

    /// 费用上限 gas_limit × max_fee_per_gas
    pub fn max_fee(&self) -> u128 {
        u128::from(self.gas_limit).saturating_mul(self.max_fee_per_gas)
    }
}

impl ChainTransaction for EvmTransaction {
    fn ecosystem(&self) -> Ecosystem {
        Ecosystem::Evm
    }

    fn encode_unsigned(&self) -> Result<String> {
        Ok(format!("0x{}", hex::encode(self.unsigned_bytes())))
    }

    fn signing_payload(&self) -> Result<SigningPayload> {
        Ok(SigningPayload::single(
            SignatureAlgorithm::Secp256k1,
            keccak256(&self.unsigned_bytes()).to_vec(),
        ))
    }

    fn apply_signatures(&self, signatures: &[Vec<u8>]) -> Result<SignedParts> {
        let [signature] = signatures else {
            return Err(ChainError::SignatureCount {
                expected: 1,
                actual: signatures.len(),
            });
        };
        let bytes = self.signed_bytes(signature)?;
        let hash = format!("0x{}", hex::encode(keccak256(&bytes)));
        Ok(SignedParts {
            serialized: format!("0x{}", hex::encode(&bytes)),
            bytes,
            hash,
        })
    }

    fn to_normalised(&self, chain: &str) -> NormalisedTransaction {
        let from = AddressValidator::to_checksum_address(&self.from);
        let base = NormalisedTransaction::new(chain, TransactionKind::NativeTransfer)
            .with_fee(self.max_fee())
            .with_meta("chain_id", self.chain_id)
            .with_meta("nonce", self.nonce)
            .with_meta("gas_limit", self.gas_limit);

        if self.data.is_empty() {
            return base
                .with_parties(from, AddressValidator::to_checksum_address(&self.to))
                .with_value(self.value);
        }

        match decode_erc20_transfer(&self.data) {
            Some((recipient, amount)) => NormalisedTransaction {
                kind: TransactionKind::TokenTransfer,
                ..base
            }
            .with_parties(from, AddressValidator::to_checksum_address(&recipient))
            .with_value(amount)
            .with_meta("contract", AddressValidator::to_checksum_address(&self.to)),
            None => NormalisedTransaction {
                kind: TransactionKind::ContractCall,
                ..base
            }
            .with_parties(from, AddressValidator::to_checksum_address(&self.to))
            .with_value(self.value)
            .with_meta("data", format!("0x{}", hex::encode(&self.data))),
        }
    }

    fn rebuild(&self, overrides: &RebuildOverrides) -> Result<Self> {
        let rebuilt = Self {
            nonce: overrides.nonce.unwrap_or(self.nonce),
            gas_limit: overrides.gas_limit.unwrap_or(self.gas_limit),
            max_fee_per_gas: overrides.max_fee_per_gas.unwrap_or(self.max_fee_per_gas),
            max_priority_fee_per_gas: overrides
                .max_priority_fee_per_gas
                .unwrap_or(self.max_priority_fee_per_gas),
            ..self.clone()
        };
        check_fees(&rebuilt)?;
        Ok(rebuilt)
    }
}

fn check_fees(tx: &EvmTransaction) -> Result<()> {
    if tx.max_priority_fee_per_gas > tx.max_fee_per_gas {
        return Err(ChainError::InvalidAmount(format!(
            "max_priority_fee_per_gas {} exceeds max_fee_per_gas {}",
            tx.max_priority_fee_per_gas, tx.max_fee_per_gas
        )));
    }
    Ok(())
}

/// 构建 EIP-1559 交易（原生币或 ERC-20）
pub fn build(config: &ChainConfig, intent: &TransferIntent, ctx: &EvmContext) -> Result<EvmTransaction> {
    let chain = config.alias.as_str();
    let chain_id = config
        .evm_chain_id()
        .ok_or_else(|| ChainError::UnsupportedChain(chain.to_string()))?;

    let from = AddressValidator::parse_evm(chain, &intent.from)?;
    let recipient = AddressValidator::parse_evm(chain, &intent.to)?;

    let (to, value, data, default_gas) = match &intent.asset {
        Asset::Native => (
            recipient,
            intent.amount.to_base_units(config.decimals)?,
            Vec::new(),
            NATIVE_TRANSFER_GAS,
        ),
        Asset::Erc20 { contract, decimals } => {
            let contract = AddressValidator::parse_evm(chain, contract)?;
            let amount = intent.amount.to_base_units(*decimals)?;
            (
                contract,
                0,
                erc20_transfer_data(&recipient, amount),
                ERC20_TRANSFER_GAS,
            )
        }
        _ => return Err(ChainError::contract(chain, "non-ERC-20 token transfer")),
    };

    let overrides = &intent.overrides;
    let tx = EvmTransaction {
        chain_id,
        from,
        nonce: overrides.nonce.unwrap_or(ctx.nonce),
        max_priority_fee_per_gas: overrides
            .max_priority_fee_per_gas
            .unwrap_or(ctx.max_priority_fee_per_gas),
        max_fee_per_gas: overrides.max_fee_per_gas.unwrap_or(ctx.max_fee_per_gas),
        gas_limit: overrides
            .gas_limit
            .or(ctx.gas_limit)
            .unwrap_or(default_gas),
        to,
        value,
        data,
    };
    check_fees(&tx)?;

    tracing::debug!(
        chain = %chain,
        nonce = tx.nonce,
        gas_limit = tx.gas_limit,
        token = !tx.data.is_empty(),
        "EVM transaction assembled"
    );
    Ok(tx)
}
