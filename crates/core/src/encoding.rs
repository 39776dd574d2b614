//! NDN-TLV primitives used for the wire form of names.
//!
//! Only the pieces needed to encode and decode names are provided: the
//! variable-length number encoding shared by TLV types and lengths, and the
//! non-negative integer encoding used inside version components.

use crate::error::{CoreError, Result};

/// TLV type of a Name.
pub const TLV_NAME: u64 = 0x07;
/// TLV type of a generic name component.
pub const TLV_GENERIC_NAME_COMPONENT: u64 = 0x08;

/// Append a TLV variable-length number.
pub fn write_var_number(buf: &mut Vec<u8>, value: u64) {
    if value < 253 {
        buf.push(value as u8);
    } else if value <= u16::MAX as u64 {
        buf.push(253);
        buf.extend_from_slice(&(value as u16).to_be_bytes());
    } else if value <= u32::MAX as u64 {
        buf.push(254);
        buf.extend_from_slice(&(value as u32).to_be_bytes());
    } else {
        buf.push(255);
        buf.extend_from_slice(&value.to_be_bytes());
    }
}

/// Read a TLV variable-length number starting at `*pos`, advancing `*pos`.
pub fn read_var_number(bytes: &[u8], pos: &mut usize) -> Result<u64> {
    let first = *bytes
        .get(*pos)
        .ok_or_else(|| CoreError::Decode("unexpected end of input in var-number".to_string()))?;
    *pos += 1;

    let width = match first {
        0..=252 => return Ok(first as u64),
        253 => 2,
        254 => 4,
        _ => 8,
    };

    let end = *pos + width;
    let slice = bytes
        .get(*pos..end)
        .ok_or_else(|| CoreError::Decode("truncated var-number".to_string()))?;
    *pos = end;

    Ok(slice.iter().fold(0u64, |acc, b| (acc << 8) | *b as u64))
}

/// Append a complete TLV element.
pub fn write_tlv(buf: &mut Vec<u8>, tlv_type: u64, value: &[u8]) {
    write_var_number(buf, tlv_type);
    write_var_number(buf, value.len() as u64);
    buf.extend_from_slice(value);
}

/// Read one TLV element starting at `*pos`, returning its type and value.
pub fn read_tlv<'a>(bytes: &'a [u8], pos: &mut usize) -> Result<(u64, &'a [u8])> {
    let tlv_type = read_var_number(bytes, pos)?;
    let length = read_var_number(bytes, pos)? as usize;
    let end = pos
        .checked_add(length)
        .ok_or_else(|| CoreError::Decode("TLV length overflow".to_string()))?;
    let value = bytes.get(*pos..end).ok_or_else(|| {
        CoreError::Decode(format!(
            "TLV type {} declares {} bytes but only {} remain",
            tlv_type,
            length,
            bytes.len().saturating_sub(*pos)
        ))
    })?;
    *pos = end;
    Ok((tlv_type, value))
}

/// Encode a non-negative integer in the shortest of 1, 2, 4 or 8 bytes.
pub fn encode_non_negative_integer(value: u64) -> Vec<u8> {
    if value <= u8::MAX as u64 {
        vec![value as u8]
    } else if value <= u16::MAX as u64 {
        (value as u16).to_be_bytes().to_vec()
    } else if value <= u32::MAX as u64 {
        (value as u32).to_be_bytes().to_vec()
    } else {
        value.to_be_bytes().to_vec()
    }
}

/// Decode a non-negative integer; the input must be 1, 2, 4 or 8 bytes long.
pub fn decode_non_negative_integer(bytes: &[u8]) -> Option<u64> {
    match bytes.len() {
        1 | 2 | 4 | 8 => Some(bytes.iter().fold(0u64, |acc, b| (acc << 8) | *b as u64)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_var_number_widths() {
        for (value, expected_len) in [(0u64, 1), (252, 1), (253, 3), (65_535, 3), (65_536, 5), (u64::MAX, 9)] {
            let mut buf = Vec::new();
            write_var_number(&mut buf, value);
            assert_eq!(buf.len(), expected_len, "width for {}", value);

            let mut pos = 0;
            assert_eq!(read_var_number(&buf, &mut pos).unwrap(), value);
            assert_eq!(pos, buf.len());
        }
    }

    #[test]
    fn test_read_tlv_rejects_truncated_value() {
        let buf = vec![0x08, 0x05, b'a', b'b'];
        let mut pos = 0;
        assert!(matches!(read_tlv(&buf, &mut pos), Err(CoreError::Decode(_))));
    }

    #[test]
    fn test_non_negative_integer_is_minimal() {
        assert_eq!(encode_non_negative_integer(1), vec![1]);
        assert_eq!(encode_non_negative_integer(0x0102), vec![1, 2]);
        assert_eq!(encode_non_negative_integer(0x010203).len(), 4);
        assert_eq!(decode_non_negative_integer(&[1, 2, 3]), None);
        assert_eq!(decode_non_negative_integer(&[0, 0, 1, 0]), Some(256));
    }
}
