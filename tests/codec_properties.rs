//! 编码层性质测试：与参考实现交叉验证，覆盖全值域

use txforge::{
    codec::{base58, decode_compact_u16, encode_compact_u16, ss58, BITCOIN_ALPHABET},
    crypto::{twox_128, xxh64},
    error::ChainError,
};

/// 确定性伪随机字节（xorshift），避免引入随机数依赖
fn pseudo_random_bytes(seed: u64, len: usize) -> Vec<u8> {
    let mut state = seed.wrapping_mul(0x9E37_79B9_7F4A_7C15) | 1;
    (0..len)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            (state >> 24) as u8
        })
        .collect()
}

#[test]
fn test_base58_matches_bs58() {
    for seed in 0..200u64 {
        let len = (seed % 48) as usize;
        let mut input = pseudo_random_bytes(seed, len);
        // 前导零单独映射为 '1'
        if seed % 5 == 0 && !input.is_empty() {
            input[0] = 0;
        }

        let ours = base58::encode(&input);
        assert_eq!(ours, bs58::encode(&input).into_string(), "seed {}", seed);
        assert_eq!(base58::decode(&ours).unwrap(), input);
    }
}

#[test]
fn test_base58_check_matches_bs58() {
    for seed in 0..50u64 {
        let payload = pseudo_random_bytes(seed, 20);
        let ours = base58::encode_check(0x41, &payload, &BITCOIN_ALPHABET);

        let mut versioned = vec![0x41];
        versioned.extend_from_slice(&payload);
        assert_eq!(ours, bs58::encode(&versioned).with_check().into_string());

        let (version, body) = base58::decode_check(&ours, &BITCOIN_ALPHABET).unwrap();
        assert_eq!(version, 0x41);
        assert_eq!(body, payload);
    }
}

#[test]
fn test_base58_reports_first_invalid_character() {
    let err = base58::decode("3mJr0O").unwrap_err();
    assert!(matches!(err, ChainError::InvalidBase58Character { .. }));
    assert_eq!(err.code(), "invalid_base58_character");
}

#[test]
fn test_compact_u16_full_domain() {
    for value in 0..=0xFFFFi64 {
        let encoded = encode_compact_u16(value).unwrap();
        let expected_len = match value {
            0..=0x7F => 1,
            0x80..=0x3FFF => 2,
            _ => 3,
        };
        assert_eq!(encoded.len(), expected_len, "value {}", value);

        let (decoded, consumed) = decode_compact_u16(&encoded).unwrap();
        assert_eq!(i64::from(decoded), value);
        assert_eq!(consumed, encoded.len());
    }
}

#[test]
fn test_compact_u16_rejects_out_of_range() {
    for value in [-1i64, 0x1_0000, i64::MAX] {
        let err = encode_compact_u16(value).unwrap_err();
        assert_eq!(err.code(), "compact_u16_out_of_range");
    }
}

#[test]
fn test_xxhash_constants() {
    assert_eq!(xxh64(b"", 0), 0xEF46_DB37_51D8_E999);
    // twox128("System") 是 System pallet 存储前缀
    assert_eq!(hex::encode(twox_128(b"System")), "26aa394eea5630e07c48ae0c9558cef7");
}

#[test]
fn test_ss58_round_trip_across_prefixes() {
    for (seed, prefix) in [(1u64, 0u8), (2, 2), (3, 42), (4, 7)] {
        let key: [u8; 32] = pseudo_random_bytes(seed, 32).try_into().unwrap();
        let address = ss58::encode(prefix, &key);
        assert_eq!(ss58::decode(&address).unwrap(), (prefix, key));
    }
}
