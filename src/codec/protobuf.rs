//! 最小 protobuf 写入器
//!
//! 只覆盖 Tron 交易 raw_data 需要的两种 wire type：varint(0) 与 length-delimited(2)。
//! 字段必须按字段号升序写入，调用方负责顺序。

#[derive(Debug, Default, Clone)]
pub struct ProtoWriter {
    buf: Vec<u8>,
}

impl ProtoWriter {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(&mut self, field: u32, wire_type: u8) {
        write_varint(&mut self.buf, (u64::from(field) << 3) | u64::from(wire_type));
    }

    /// varint 字段；0 值按 proto3 语义省略
    pub fn uint64(&mut self, field: u32, value: u64) -> &mut Self {
        if value != 0 {
            self.key(field, 0);
            write_varint(&mut self.buf, value);
        }
        self
    }

    /// int64 在 wire 上与 uint64 相同（负数为 10 字节补码）
    pub fn int64(&mut self, field: u32, value: i64) -> &mut Self {
        self.uint64(field, value as u64)
    }

    /// bytes / string / 嵌套消息；空值省略
    pub fn bytes(&mut self, field: u32, value: &[u8]) -> &mut Self {
        if !value.is_empty() {
            self.key(field, 2);
            write_varint(&mut self.buf, value.len() as u64);
            self.buf.extend_from_slice(value);
        }
        self
    }

    pub fn string(&mut self, field: u32, value: &str) -> &mut Self {
        self.bytes(field, value.as_bytes())
    }

    pub fn message(&mut self, field: u32, nested: &ProtoWriter) -> &mut Self {
        self.bytes(field, &nested.buf)
    }

    pub fn finish(&self) -> Vec<u8> {
        self.buf.clone()
    }
}

pub fn write_varint(out: &mut Vec<u8>, mut value: u64) {
    while value >= 0x80 {
        out.push((value as u8 & 0x7f) | 0x80);
        value >>= 7;
    }
    out.push(value as u8);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_varint() {
        let mut out = Vec::new();
        write_varint(&mut out, 300);
        assert_eq!(out, vec![0xac, 0x02]);
    }

    #[test]
    fn test_fields() {
        let mut w = ProtoWriter::new();
        w.uint64(1, 150).string(2, "testing").uint64(3, 0);
        assert_eq!(
            w.finish(),
            vec![0x08, 0x96, 0x01, 0x12, 0x07, b't', b'e', b's', b't', b'i', b'n', b'g']
        );
    }
}
