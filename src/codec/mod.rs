//! 字节级编解码原语
//!
//! 各链构建器共用：compact-u16 长度前缀、Base58/Base58Check、
//! SS58、定宽小端整数以及 Tron 使用的最小 protobuf 写入器。

pub mod base58;
pub mod bytes;
pub mod compact_u16;
pub mod protobuf;
pub mod ss58;

pub use base58::{Alphabet, BITCOIN_ALPHABET, XRP_ALPHABET};
pub use bytes::{
    concat_bytes, decode_hex, read_u128_le, read_u32_le, read_u64_le, write_u128_le, write_u32_le,
};
pub use compact_u16::{decode_compact_u16, encode_compact_u16, write_compact_len};
