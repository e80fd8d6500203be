//! UTXO 选币
//!
//! 贪心最大优先：按金额降序累加，取第一个满足 `目标 + 手续费` 的前缀。
//! 找零低于粉尘阈值时并入手续费。

use serde::{Deserialize, Serialize};

use crate::error::{ChainError, Result};

/// 交易固定开销（version + locktime + 计数 + segwit 标记），单位 vB
pub const TX_OVERHEAD_VBYTES: u64 = 11;
/// P2WPKH 输入
pub const P2WPKH_INPUT_VBYTES: u64 = 68;
/// P2TR key-path 输入
pub const P2TR_INPUT_VBYTES: u64 = 58;

/// 支持花费的脚本类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScriptKind {
    P2wpkh,
    P2tr,
}

impl ScriptKind {
    /// 按脚本字节识别（仅 v0 keyhash 与 v1 taproot）
    pub fn classify(script_pubkey: &[u8]) -> Option<Self> {
        match script_pubkey {
            [0x00, 0x14, rest @ ..] if rest.len() == 20 => Some(Self::P2wpkh),
            [0x51, 0x20, rest @ ..] if rest.len() == 32 => Some(Self::P2tr),
            _ => None,
        }
    }

    pub fn input_vbytes(self) -> u64 {
        match self {
            Self::P2wpkh => P2WPKH_INPUT_VBYTES,
            Self::P2tr => P2TR_INPUT_VBYTES,
        }
    }
}

/// 输出 vsize：value(8) + 脚本长度前缀(1) + 脚本
pub fn output_vbytes(script_pubkey: &[u8]) -> u64 {
    9 + script_pubkey.len() as u64
}

/// 可花费输出
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Utxo {
    pub txid: String,
    pub vout: u32,
    /// satoshi
    pub value: u64,
    #[serde(with = "hex_script")]
    pub script_pubkey: Vec<u8>,
    pub confirmations: u32,
}

impl Utxo {
    pub fn script_kind(&self) -> Option<ScriptKind> {
        ScriptKind::classify(&self.script_pubkey)
    }
}

mod hex_script {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(script: &[u8], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&hex::encode(script))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(d)?;
        hex::decode(s).map_err(serde::de::Error::custom)
    }
}

/// 选币结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CoinSelection {
    pub selected: Vec<Utxo>,
    pub total_input: u64,
    pub fee: u64,
    /// 0 表示无找零输出
    pub change: u64,
    pub vsize: u64,
}

/// 选币参数
#[derive(Debug, Clone)]
pub struct SelectionParams<'a> {
    pub target: u64,
    pub fee_rate: u64,
    pub recipient_script: &'a [u8],
    pub change_script: &'a [u8],
    pub dust_threshold: u64,
    pub min_confirmations: u32,
}

/// 贪心选币
///
/// 每加入一个输入都重新计算手续费；找零 ≥ 粉尘阈值时才生成找零输出。
pub fn select_coins(utxos: &[Utxo], params: &SelectionParams<'_>) -> Result<CoinSelection> {
    let mut candidates: Vec<(&Utxo, ScriptKind)> = utxos
        .iter()
        .filter(|u| u.confirmations >= params.min_confirmations)
        .filter_map(|u| u.script_kind().map(|kind| (u, kind)))
        .collect();
    // 稳定排序：同额保持输入顺序
    candidates.sort_by(|a, b| b.0.value.cmp(&a.0.value));

    let base_vsize = TX_OVERHEAD_VBYTES + output_vbytes(params.recipient_script);
    let change_vsize = output_vbytes(params.change_script);

    let mut total: u64 = 0;
    let mut inputs_vsize: u64 = 0;

    for (index, (utxo, kind)) in candidates.iter().enumerate() {
        total = total.saturating_add(utxo.value);
        inputs_vsize += kind.input_vbytes();

        let vsize_no_change = base_vsize + inputs_vsize;
        let fee_no_change = vsize_no_change.saturating_mul(params.fee_rate);
        if total < params.target.saturating_add(fee_no_change) {
            continue;
        }

        let selected: Vec<Utxo> = candidates[..=index].iter().map(|(u, _)| (*u).clone()).collect();
        let vsize_with_change = vsize_no_change + change_vsize;
        let fee_with_change = vsize_with_change.saturating_mul(params.fee_rate);
        let change = total
            .checked_sub(params.target)
            .and_then(|rest| rest.checked_sub(fee_with_change))
            .filter(|&change| change >= params.dust_threshold);

        let selection = match change {
            Some(change) => CoinSelection {
                selected,
                total_input: total,
                fee: fee_with_change,
                change,
                vsize: vsize_with_change,
            },
            // 找零过小：全部剩余并入手续费
            None => CoinSelection {
                selected,
                total_input: total,
                fee: total - params.target,
                change: 0,
                vsize: vsize_no_change,
            },
        };

        tracing::debug!(
            inputs = selection.selected.len(),
            total_input = selection.total_input,
            fee = selection.fee,
            change = selection.change,
            vsize = selection.vsize,
            "Coins selected"
        );
        return Ok(selection);
    }

    let required = params
        .target
        .saturating_add((base_vsize + inputs_vsize).saturating_mul(params.fee_rate));
    Err(ChainError::InsufficientFunds {
        available: total,
        required,
    })
}
