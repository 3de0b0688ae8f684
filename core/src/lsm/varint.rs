//! LEB128 lengths for the record format.

use crate::error::{CoreError, Result};

const MAX_VARINT_LEN: usize = 10;

pub(crate) fn varint_len(value: u64) -> usize {
    let bits = 64 - value.leading_zeros() as usize;
    bits.div_ceil(7).max(1)
}

pub(crate) fn encode_varint(mut value: u64, out: &mut Vec<u8>) -> usize {
    let start = out.len();
    loop {
        let low = (value & 0x7F) as u8;
        value >>= 7;
        if value == 0 {
            out.push(low);
            return out.len() - start;
        }
        out.push(low | 0x80);
    }
}

/// Returns the value and the number of bytes consumed.
pub(crate) fn decode_varint(bytes: &[u8]) -> Result<(u64, usize)> {
    let mut value = 0u64;
    for (i, &byte) in bytes.iter().take(MAX_VARINT_LEN).enumerate() {
        value |= u64::from(byte & 0x7F) << (7 * i);
        if byte & 0x80 == 0 {
            return Ok((value, i + 1));
        }
    }
    if bytes.len() >= MAX_VARINT_LEN {
        Err(CoreError::Corrupted("varint too large".into()))
    } else {
        Err(CoreError::Corrupted("varint not terminated".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_varint_boundaries() {
        for value in [0u64, 127, 128, 16_383, 16_384, u32::MAX as u64, u64::MAX] {
            let mut buf = Vec::new();
            let written = encode_varint(value, &mut buf);
            assert_eq!(written, varint_len(value));
            assert_eq!(decode_varint(&buf).unwrap(), (value, written));
        }
    }

    #[test]
    fn test_varint_truncated() {
        assert!(decode_varint(&[0x80, 0x80]).is_err());
        assert!(decode_varint(&[]).is_err());
        assert!(decode_varint(&[0xFF; 11]).is_err());
    }
}
