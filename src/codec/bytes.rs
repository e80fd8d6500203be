//! 定宽小端整数与字节拼接

use crate::error::{ChainError, Result};

/// 拼接多个字节序列
pub fn concat_bytes(parts: &[&[u8]]) -> Vec<u8> {
    let total = parts.iter().map(|p| p.len()).sum();
    let mut out = Vec::with_capacity(total);
    for part in parts {
        out.extend_from_slice(part);
    }
    out
}

fn slice_at<const N: usize>(bytes: &[u8], offset: usize) -> Result<[u8; N]> {
    bytes
        .get(offset..offset + N)
        .and_then(|s| <[u8; N]>::try_from(s).ok())
        .ok_or_else(|| {
            ChainError::encoding(format!(
                "need {} bytes at offset {}, buffer has {}",
                N,
                offset,
                bytes.len()
            ))
        })
}

pub fn read_u32_le(bytes: &[u8], offset: usize) -> Result<u32> {
    slice_at::<4>(bytes, offset).map(u32::from_le_bytes)
}

pub fn read_u64_le(bytes: &[u8], offset: usize) -> Result<u64> {
    slice_at::<8>(bytes, offset).map(u64::from_le_bytes)
}

pub fn read_u128_le(bytes: &[u8], offset: usize) -> Result<u128> {
    slice_at::<16>(bytes, offset).map(u128::from_le_bytes)
}

pub fn write_u32_le(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_le_bytes());
}

pub fn write_u128_le(out: &mut Vec<u8>, value: u128) {
    out.extend_from_slice(&value.to_le_bytes());
}

/// 解析 0x 前缀可选的十六进制字符串
pub fn decode_hex(input: &str) -> Result<Vec<u8>> {
    hex::decode(input.trim_start_matches("0x"))
        .map_err(|e| ChainError::encoding(format!("invalid hex '{}': {}", input, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_le_round_trip() {
        let mut buf = Vec::new();
        write_u32_le(&mut buf, 0xdead_beef);
        write_u128_le(&mut buf, 100);
        assert_eq!(buf.len(), 20);
        assert_eq!(read_u32_le(&buf, 0).unwrap(), 0xdead_beef);
        assert_eq!(read_u128_le(&buf, 4).unwrap(), 100);
    }

    #[test]
    fn test_read_out_of_bounds() {
        let buf = [0u8; 10];
        assert!(read_u32_le(&buf, 8).is_err());
        assert!(read_u128_le(&buf, 0).is_err());
        assert!(read_u64_le(&buf, 2).is_ok());
    }

    #[test]
    fn test_concat() {
        assert_eq!(concat_bytes(&[b"ab", b"", b"c"]), b"abc".to_vec());
    }
}
