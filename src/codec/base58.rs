//! Base58 / Base58Check 编解码
//!
//! 输入字节按大端任意精度整数处理，反复除以 58 取余；前导零字节
//! 各自对应一个字母表首字符。字母表可替换（Bitcoin/Solana 与 XRP Ledger）。

use crate::{
    crypto::sha256d,
    error::{ChainError, Result},
};

/// Base58 字母表（58 个字符 + 反查表）
#[derive(Debug)]
pub struct Alphabet {
    chars: [u8; 58],
    decode: [i8; 128],
}

impl Alphabet {
    const fn new(chars: &[u8; 58]) -> Self {
        let mut decode = [-1i8; 128];
        let mut i = 0;
        while i < 58 {
            decode[chars[i] as usize] = i as i8;
            i += 1;
        }
        Self {
            chars: *chars,
            decode,
        }
    }

    fn zero_char(&self) -> char {
        self.chars[0] as char
    }

    fn digit(&self, c: char) -> Option<u8> {
        if !c.is_ascii() {
            return None;
        }
        let d = self.decode[c as usize];
        (d >= 0).then_some(d as u8)
    }
}

/// Bitcoin / Solana / Tron 字母表（无 0 O I l）
pub static BITCOIN_ALPHABET: Alphabet =
    Alphabet::new(b"123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz");

/// XRP Ledger 字母表
pub static XRP_ALPHABET: Alphabet =
    Alphabet::new(b"rpshnaf39wBUDNEGHJKLM4PQRST7VWXYZ2bcdeCg65jkm8oFqi1tuvAxyz");

/// 使用 Bitcoin 字母表编码
pub fn encode(input: &[u8]) -> String {
    encode_with(input, &BITCOIN_ALPHABET)
}

/// 使用 Bitcoin 字母表解码
pub fn decode(input: &str) -> Result<Vec<u8>> {
    decode_with(input, &BITCOIN_ALPHABET)
}

pub fn encode_with(input: &[u8], alphabet: &Alphabet) -> String {
    let zeros = input.iter().take_while(|&&b| b == 0).count();

    // log(256)/log(58) ≈ 1.366
    let size = (input.len() - zeros) * 138 / 100 + 1;
    let mut digits = vec![0u8; size];
    let mut length = 0usize;

    for &byte in &input[zeros..] {
        let mut carry = u32::from(byte);
        let mut i = 0;
        for digit in digits.iter_mut().rev() {
            if carry == 0 && i >= length {
                break;
            }
            carry += 256 * u32::from(*digit);
            *digit = (carry % 58) as u8;
            carry /= 58;
            i += 1;
        }
        length = i;
    }

    let start = digits
        .iter()
        .position(|&d| d != 0)
        .unwrap_or(size);
    let mut out = String::with_capacity(zeros + length);
    out.extend(std::iter::repeat(alphabet.zero_char()).take(zeros));
    out.extend(
        digits[start..]
            .iter()
            .map(|&d| alphabet.chars[d as usize] as char),
    );
    out
}

pub fn decode_with(input: &str, alphabet: &Alphabet) -> Result<Vec<u8>> {
    let zero = alphabet.zero_char();
    let zeros = input.chars().take_while(|&c| c == zero).count();

    // log(58)/log(256) ≈ 0.733
    let size = (input.len() - zeros) * 733 / 1000 + 1;
    let mut bytes = vec![0u8; size];

    for (index, character) in input.chars().enumerate().skip(zeros) {
        let digit = alphabet
            .digit(character)
            .ok_or(ChainError::InvalidBase58Character { character, index })?;

        let mut carry = u32::from(digit);
        for byte in bytes.iter_mut().rev() {
            carry += 58 * u32::from(*byte);
            *byte = (carry & 0xff) as u8;
            carry >>= 8;
        }
        if carry != 0 {
            return Err(ChainError::encoding("base58 accumulator overflow"));
        }
    }

    // 去掉累加器内部的前导零，再按前导 '1' 的个数补回零字节
    let leading = bytes.iter().take_while(|&&b| b == 0).count();
    let mut out = vec![0u8; zeros];
    out.extend_from_slice(&bytes[leading..]);
    Ok(out)
}

/// Base58Check 编码：version ‖ payload ‖ sha256d(...)[..4]
pub fn encode_check(version: u8, payload: &[u8], alphabet: &Alphabet) -> String {
    let mut data = Vec::with_capacity(payload.len() + 5);
    data.push(version);
    data.extend_from_slice(payload);
    let checksum = sha256d(&data);
    data.extend_from_slice(&checksum[..4]);
    encode_with(&data, alphabet)
}

/// Base58Check 解码，返回 (version, payload)
pub fn decode_check(input: &str, alphabet: &Alphabet) -> Result<(u8, Vec<u8>)> {
    let data = decode_with(input, alphabet)?;
    if data.len() < 5 {
        return Err(ChainError::encoding("base58check payload too short"));
    }
    let (body, checksum) = data.split_at(data.len() - 4);
    if sha256d(body)[..4] != *checksum {
        return Err(ChainError::encoding("base58check checksum mismatch"));
    }
    Ok((body[0], body[1..].to_vec()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_vectors() {
        assert_eq!(encode(b""), "");
        assert_eq!(encode(&[0]), "1");
        assert_eq!(encode(&[0, 0, 0]), "111");
        assert_eq!(encode(b"hello world"), "StV1DL6CwTryKyV");
        assert_eq!(encode(&[0x00, 0x01]), "12");
        assert_eq!(encode(&[0u8; 32]), "11111111111111111111111111111111");
    }

    #[test]
    fn test_round_trip_with_leading_zeros() {
        let cases: Vec<Vec<u8>> = vec![
            vec![],
            vec![0],
            vec![0, 0, 0, 1],
            vec![0, 0xff, 0xee],
            vec![0xff; 40],
            (0u8..=255).collect(),
        ];
        for case in cases {
            let encoded = encode(&case);
            assert_eq!(decode(&encoded).unwrap(), case, "round trip for {:?}", case);
        }
    }

    #[test]
    fn test_invalid_character_is_reported() {
        let err = decode("abc0def").unwrap_err();
        assert_eq!(
            err,
            ChainError::InvalidBase58Character {
                character: '0',
                index: 3
            }
        );
        assert!(decode("Il").is_err());
        assert!(decode("ab€").is_err());
    }

    #[test]
    fn test_xrp_alphabet_zero_char() {
        assert_eq!(encode_with(&[0, 0], &XRP_ALPHABET), "rr");
        assert_eq!(decode_with("rr", &XRP_ALPHABET).unwrap(), vec![0, 0]);
    }

    #[test]
    fn test_check_round_trip() {
        let payload = [7u8; 20];
        let encoded = encode_check(0x41, &payload, &BITCOIN_ALPHABET);
        assert!(encoded.starts_with('T'));
        let (version, decoded) = decode_check(&encoded, &BITCOIN_ALPHABET).unwrap();
        assert_eq!(version, 0x41);
        assert_eq!(decoded, payload);
    }

    #[test]
    fn test_check_rejects_bad_checksum() {
        let mut encoded = encode_check(0x00, &[1u8; 20], &XRP_ALPHABET).into_bytes();
        let last = encoded.len() - 1;
        encoded[last] = if encoded[last] == b'r' { b'p' } else { b'r' };
        let encoded = String::from_utf8(encoded).unwrap();
        assert!(decode_check(&encoded, &XRP_ALPHABET).is_err());
    }
}
