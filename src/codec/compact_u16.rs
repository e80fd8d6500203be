//! compact-u16 变长长度前缀
//!
//! 0..=127 占 1 字节；0..=16383 占 2 字节；0..=65535 占 3 字节。
//! 每组 7 bit 小端排列，除最后一组外均置续位（0x80）。

use crate::error::{ChainError, Result};

const MAX_VALUE: i64 = u16::MAX as i64;

/// 编码 compact-u16
///
/// 接受 `i64` 以便对负数和超出 u16 的值显式报错，而不是在调用方静默截断。
pub fn encode_compact_u16(value: i64) -> Result<Vec<u8>> {
    if !(0..=MAX_VALUE).contains(&value) {
        return Err(ChainError::CompactU16OutOfRange(value));
    }

    let mut rem = value as u16;
    let mut out = Vec::with_capacity(3);
    loop {
        let mut byte = (rem & 0x7f) as u8;
        rem >>= 7;
        if rem == 0 {
            out.push(byte);
            break;
        }
        byte |= 0x80;
        out.push(byte);
    }
    Ok(out)
}

/// 长度前缀的便捷写入（数组长度总是 usize）
pub fn write_compact_len(out: &mut Vec<u8>, len: usize) -> Result<()> {
    let len = i64::try_from(len).map_err(|_| ChainError::CompactU16OutOfRange(i64::MAX))?;
    out.extend_from_slice(&encode_compact_u16(len)?);
    Ok(())
}

/// 解码 compact-u16，返回 (值, 消耗的字节数)
///
/// 截断输入、非最短编码以及超过 u16 范围的值都会报错。
pub fn decode_compact_u16(bytes: &[u8]) -> Result<(u16, usize)> {
    let mut value: u32 = 0;
    for i in 0..3 {
        let byte = *bytes
            .get(i)
            .ok_or_else(|| ChainError::encoding("truncated compact-u16"))?;
        let group = u32::from(byte & 0x7f);

        // 第三个字节只允许承载最高 2 bit
        if i == 2 && byte > 0x03 {
            return Err(ChainError::CompactU16OutOfRange(
                i64::from(value | (u32::from(byte) << 14)),
            ));
        }

        value |= group << (7 * i);

        if byte & 0x80 == 0 {
            if i > 0 && byte == 0 {
                return Err(ChainError::encoding("non-minimal compact-u16 encoding"));
            }
            return Ok((value as u16, i + 1));
        }
    }
    Err(ChainError::encoding("compact-u16 longer than 3 bytes"))
}
