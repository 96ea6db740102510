//! Deterministic byte encoding for headers and transactions.
//!
//! Integers are written in an explicit byte order; variable-length fields are
//! prefixed with a Bitcoin-style compact-size integer.

use crate::consts::{COMPACT_SIZE_U16, COMPACT_SIZE_U32, COMPACT_SIZE_U64};

macro_rules! put_int {
    ($($le:ident, $be:ident: $ty:ty;)*) => {
        $(
            #[inline]
            fn $le(&mut self, value: $ty) {
                self.put_slice(&value.to_le_bytes());
            }

            #[inline]
            fn $be(&mut self, value: $ty) {
                self.put_slice(&value.to_be_bytes());
            }
        )*
    };
}

/// An append-only byte sink.
///
/// Encoding is total: no method can fail.
pub trait ByteSink {
    /// Append raw bytes.
    fn put_slice(&mut self, bytes: &[u8]);

    #[inline]
    fn put_u8(&mut self, value: u8) {
        self.put_slice(&[value]);
    }

    put_int! {
        put_u16_le, put_u16_be: u16;
        put_u32_le, put_u32_be: u32;
        put_u64_le, put_u64_be: u64;
        put_i16_le, put_i16_be: i16;
        put_i32_le, put_i32_be: i32;
        put_i64_le, put_i64_be: i64;
    }

    /// Append a compact-size integer.
    ///
    /// | value range              | encoding              |
    /// |--------------------------|-----------------------|
    /// | `< 0xfd`                 | 1 byte                |
    /// | `<= 0xffff`              | `0xfd` + u16 LE       |
    /// | `<= 0xffff_ffff`         | `0xfe` + u32 LE       |
    /// | otherwise                | `0xff` + u64 LE       |
    fn put_compact_size(&mut self, value: u64) {
        if value < COMPACT_SIZE_U16 as u64 {
            self.put_u8(value as u8);
        } else if value <= 0xffff {
            self.put_u8(COMPACT_SIZE_U16);
            self.put_u16_le(value as u16);
        } else if value <= 0xffff_ffff {
            self.put_u8(COMPACT_SIZE_U32);
            self.put_u32_le(value as u32);
        } else {
            self.put_u8(COMPACT_SIZE_U64);
            self.put_u64_le(value);
        }
    }

    /// Append a compact-size length followed by the bytes themselves.
    fn put_var_bytes(&mut self, bytes: &[u8]) {
        self.put_compact_size(bytes.len() as u64);
        self.put_slice(bytes);
    }
}

impl ByteSink for Vec<u8> {
    #[inline]
    fn put_slice(&mut self, bytes: &[u8]) {
        self.extend_from_slice(bytes);
    }

    #[inline]
    fn put_u8(&mut self, value: u8) {
        self.push(value);
    }
}

/// Number of bytes [`ByteSink::put_compact_size`] writes for `value`.
pub fn compact_size_len(value: u64) -> usize {
    match value {
        0..=0xfc => 1,
        0xfd..=0xffff => 3,
        0x1_0000..=0xffff_ffff => 5,
        _ => 9,
    }
}

/// Types with a canonical byte encoding.
pub trait Encodable {
    /// Append the canonical encoding to `sink`.
    fn encode_to<S: ByteSink + ?Sized>(&self, sink: &mut S);

    /// The canonical encoding as a fresh buffer.
    fn encoded(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        self.encode_to(&mut buf);
        buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_byte_order() {
        let mut out = Vec::new();
        out.put_u16_le(0x1234);
        out.put_u16_be(0x1234);
        assert_eq!(out, vec![0x34, 0x12, 0x12, 0x34]);

        out.clear();
        out.put_u32_le(1);
        out.put_u32_le(254);
        assert_eq!(out, vec![1, 0, 0, 0, 254, 0, 0, 0]);

        out.clear();
        out.put_u64_be(0x0102030405060708);
        assert_eq!(out, vec![1, 2, 3, 4, 5, 6, 7, 8]);

        out.clear();
        out.put_i32_le(-2);
        out.put_i16_be(-1);
        out.put_i64_le(-1);
        assert_eq!(&out[..4], &[0xfe, 0xff, 0xff, 0xff]);
        assert_eq!(&out[4..6], &[0xff, 0xff]);
        assert_eq!(&out[6..], &[0xff; 8]);
    }

    #[test]
    fn test_compact_size_boundaries() {
        let cases: [(u64, Vec<u8>); 8] = [
            (0, vec![0x00]),
            (100, vec![100]),
            (0xfc, vec![0xfc]),
            (0xfd, vec![0xfd, 0xfd, 0x00]),
            (0x1234, vec![0xfd, 0x34, 0x12]),
            (0xffff, vec![0xfd, 0xff, 0xff]),
            (0x10000, vec![0xfe, 0x00, 0x00, 0x01, 0x00]),
            (0x1_0000_0000, vec![0xff, 0x00, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00]),
        ];

        for (value, expected) in cases {
            let mut out = Vec::new();
            out.put_compact_size(value);
            assert_eq!(out, expected, "compact size of {:#x}", value);
            assert_eq!(compact_size_len(value), expected.len());
        }
    }

    #[test]
    fn test_var_bytes() {
        let mut out = Vec::new();
        out.put_var_bytes(&[]);
        out.put_var_bytes(&[0xaa, 0xbb]);
        assert_eq!(out, vec![0x00, 0x02, 0xaa, 0xbb]);

        let long = vec![0x55u8; 300];
        let mut out = Vec::new();
        out.put_var_bytes(&long);
        assert_eq!(&out[..3], &[0xfd, 0x2c, 0x01]);
        assert_eq!(out.len(), 303);
    }
}
