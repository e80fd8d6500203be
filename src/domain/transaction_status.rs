//! 统一交易状态定义
//!
//! 构建阶段：Draft → Unsigned → Signed → Broadcast
//! 上链阶段：Broadcast → Pending → Confirmed | Failed

use std::fmt;

use serde::{Deserialize, Serialize};

/// 交易生命周期状态机
/// ✅ 适用于所有生态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    /// 转账意图已给出，尚未构建
    Draft,

    /// 已构建未签名交易（可 rebuild）
    Unsigned,

    /// 已应用签名，等待广播
    Signed,

    /// 已提交到节点
    Broadcast,

    /// 节点已接受，等待上链确认
    Pending,

    /// 交易已确认
    Confirmed,

    /// 交易失败（链上执行失败或被节点拒绝）
    Failed,
}

impl TransactionStatus {
    pub fn description(&self) -> &'static str {
        match self {
            Self::Draft => "转账草稿",
            Self::Unsigned => "交易待签名",
            Self::Signed => "交易已签名",
            Self::Broadcast => "交易已广播",
            Self::Pending => "交易待确认",
            Self::Confirmed => "交易已确认",
            Self::Failed => "交易失败",
        }
    }

    /// 是否为最终状态（不可再转换）
    pub fn is_final(&self) -> bool {
        matches!(self, Self::Confirmed | Self::Failed)
    }

    /// 验证状态转换合法性
    pub fn can_transition_to(&self, target: &Self) -> bool {
        use TransactionStatus::*;

        match (self, target) {
            (Draft, Unsigned) => true,

            // rebuild 产生新的未签名交易
            (Unsigned, Unsigned) | (Unsigned, Signed) => true,

            (Signed, Broadcast) | (Signed, Failed) => true,

            (Broadcast, Pending) | (Broadcast, Confirmed) | (Broadcast, Failed) => true,

            (Pending, Confirmed) | (Pending, Failed) => true,

            _ => false,
        }
    }

    /// 从链上/节点状态字符串解析
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "draft" => Some(Self::Draft),
            "unsigned" => Some(Self::Unsigned),
            "signed" => Some(Self::Signed),
            "broadcast" | "submitted" => Some(Self::Broadcast),
            "pending" | "queued" => Some(Self::Pending),
            "confirmed" | "success" | "finalized" | "validated" => Some(Self::Confirmed),
            "failed" | "error" | "revert" => Some(Self::Failed),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Unsigned => "unsigned",
            Self::Signed => "signed",
            Self::Broadcast => "broadcast",
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_transitions() {
        use TransactionStatus::*;

        // 合法转换
        assert!(Draft.can_transition_to(&Unsigned));
        assert!(Unsigned.can_transition_to(&Unsigned));
        assert!(Unsigned.can_transition_to(&Signed));
        assert!(Signed.can_transition_to(&Broadcast));
        assert!(Broadcast.can_transition_to(&Pending));
        assert!(Pending.can_transition_to(&Confirmed));

        // 非法转换
        assert!(!Draft.can_transition_to(&Signed));
        assert!(!Signed.can_transition_to(&Unsigned));

        // 最终状态不可转换
        assert!(!Confirmed.can_transition_to(&Pending));
        assert!(!Failed.can_transition_to(&Broadcast));
    }

    #[test]
    fn test_is_final() {
        use TransactionStatus::*;

        assert!(!Draft.is_final());
        assert!(!Pending.is_final());
        assert!(Confirmed.is_final());
        assert!(Failed.is_final());
    }

    #[test]
    fn test_parse() {
        assert_eq!(TransactionStatus::parse("success"), Some(TransactionStatus::Confirmed));
        assert_eq!(TransactionStatus::parse("Pending"), Some(TransactionStatus::Pending));
        assert_eq!(TransactionStatus::parse("whatever"), None);
        assert_eq!(TransactionStatus::Broadcast.to_string(), "broadcast");
    }
}
