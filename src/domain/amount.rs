//! 金额解析与格式化
//!
//! 所有链金额在内部统一为最小单位整数（wei、lamports、satoshi、drops、sun、planck）。

use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{ChainError, Result};

/// 转账金额：十进制字符串或最小单位整数字符串
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Amount {
    /// 人类可读金额，例如 "1.5"
    Decimal(String),
    /// 最小单位整数，例如 "1500000000"
    BaseUnits(String),
}

impl Amount {
    pub fn decimal(value: impl Into<String>) -> Self {
        Self::Decimal(value.into())
    }

    pub fn base_units(value: impl Into<String>) -> Self {
        Self::BaseUnits(value.into())
    }

    /// 换算为最小单位
    pub fn to_base_units(&self, decimals: u32) -> Result<u128> {
        match self {
            Self::Decimal(value) => parse_units(value, decimals),
            Self::BaseUnits(value) => parse_base_units(value),
        }
    }

    /// 换算为 u64 最小单位（Solana/UTXO/XRP/Tron）
    pub fn to_base_units_u64(&self, decimals: u32) -> Result<u64> {
        let value = self.to_base_units(decimals)?;
        u64::try_from(value)
            .map_err(|_| ChainError::InvalidAmount(format!("{} exceeds u64 range", value)))
    }
}

fn pow10(exp: u32) -> Result<u128> {
    10u128
        .checked_pow(exp)
        .ok_or_else(|| ChainError::InvalidAmount(format!("10^{} overflows u128", exp)))
}

/// 解析最小单位整数字符串
pub fn parse_base_units(value: &str) -> Result<u128> {
    let trimmed = value.trim();
    if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ChainError::InvalidAmount(format!(
            "'{}' is not an unsigned integer",
            value
        )));
    }
    trimmed
        .parse::<u128>()
        .map_err(|_| ChainError::InvalidAmount(format!("'{}' overflows u128", value)))
}

/// 十进制字符串 → 最小单位（小数位超过 decimals 视为错误，不截断）
pub fn parse_units(value: &str, decimals: u32) -> Result<u128> {
    let parsed = Decimal::from_str(value.trim())
        .map_err(|e| ChainError::InvalidAmount(format!("'{}': {}", value, e)))?;
    if parsed.is_sign_negative() && !parsed.is_zero() {
        return Err(ChainError::InvalidAmount(format!("'{}' is negative", value)));
    }

    let normalized = parsed.normalize();
    let scale = normalized.scale();
    if scale > decimals {
        return Err(ChainError::InvalidAmount(format!(
            "'{}' has more than {} fractional digits",
            value, decimals
        )));
    }

    normalized
        .mantissa()
        .unsigned_abs()
        .checked_mul(pow10(decimals - scale)?)
        .ok_or_else(|| ChainError::InvalidAmount(format!("'{}' overflows u128", value)))
}

/// 最小单位 → 十进制字符串（去掉尾随零）
pub fn format_units(value: u128, decimals: u32) -> String {
    if decimals == 0 {
        return value.to_string();
    }
    let Ok(unit) = pow10(decimals) else {
        return value.to_string();
    };

    let whole = value / unit;
    let frac = value % unit;
    if frac == 0 {
        return whole.to_string();
    }

    let frac_str = format!("{:0width$}", frac, width = decimals as usize);
    format!("{}.{}", whole, frac_str.trim_end_matches('0'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_units() {
        assert_eq!(parse_units("1", 9).unwrap(), 1_000_000_000);
        assert_eq!(parse_units("1.5", 18).unwrap(), 1_500_000_000_000_000_000);
        assert_eq!(parse_units("0.00000001", 8).unwrap(), 1);
        assert_eq!(parse_units("2.500", 6).unwrap(), 2_500_000);
        assert_eq!(parse_units("0", 6).unwrap(), 0);
    }

    #[test]
    fn test_parse_units_rejects_bad_input() {
        assert!(parse_units("0.000000001", 8).is_err());
        assert!(parse_units("-1", 8).is_err());
        assert!(parse_units("abc", 8).is_err());
        assert!(parse_units("", 8).is_err());
    }

    #[test]
    fn test_base_units() {
        let amount = Amount::base_units("1000000000");
        assert_eq!(amount.to_base_units(9).unwrap(), 1_000_000_000);
        assert!(Amount::base_units("1.5").to_base_units(9).is_err());
        assert!(Amount::base_units("-5").to_base_units(9).is_err());
        assert!(Amount::base_units("340282366920938463463374607431768211456")
            .to_base_units(0)
            .is_err());
    }

    #[test]
    fn test_u64_range() {
        assert!(Amount::base_units("18446744073709551616")
            .to_base_units_u64(0)
            .is_err());
        assert_eq!(Amount::decimal("0.1").to_base_units_u64(9).unwrap(), 100_000_000);
    }

    #[test]
    fn test_format_units() {
        assert_eq!(format_units(1_500_000_000, 9), "1.5");
        assert_eq!(format_units(1, 8), "0.00000001");
        assert_eq!(format_units(2_000_000, 6), "2");
        assert_eq!(format_units(42, 0), "42");
        assert_eq!(format_units(0, 18), "0");
    }
}
