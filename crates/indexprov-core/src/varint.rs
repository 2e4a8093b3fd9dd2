//! Unsigned LEB128 varints, as used throughout the multiformats family.
//!
//! Values are limited to 63 bits (9 encoded bytes).

use crate::error::CoreError;

/// Maximum encoded length of a varint.
pub const MAX_VARINT_LEN: usize = 9;

/// Append the varint encoding of `n` to `buf`.
pub fn encode(mut n: u64, buf: &mut Vec<u8>) {
    while n >= 0x80 {
        buf.push((n as u8) | 0x80);
        n >>= 7;
    }
    buf.push(n as u8);
}

/// Encode `n` into a fresh buffer.
pub fn to_vec(n: u64) -> Vec<u8> {
    let mut buf = Vec::with_capacity(MAX_VARINT_LEN);
    encode(n, &mut buf);
    buf
}

/// Decode a varint from the front of `bytes`.
///
/// Returns the value and the number of bytes consumed.
pub fn decode(bytes: &[u8]) -> Result<(u64, usize), CoreError> {
    let mut value: u64 = 0;
    for (i, &b) in bytes.iter().enumerate() {
        if i >= MAX_VARINT_LEN {
            return Err(CoreError::DecodingError("varint too long".into()));
        }
        value |= u64::from(b & 0x7f) << (7 * i);
        if b & 0x80 == 0 {
            // Reject non-minimal encodings such as 0x80 0x00.
            if b == 0 && i > 0 {
                return Err(CoreError::DecodingError("varint not minimally encoded".into()));
            }
            return Ok((value, i + 1));
        }
    }
    Err(CoreError::DecodingError("truncated varint".into()))
}

/// Read a varint from a byte stream.
///
/// Returns `Ok(None)` on a clean end of stream before the first byte.
pub fn read<R: std::io::Read>(reader: &mut R) -> std::io::Result<Option<u64>> {
    let mut value: u64 = 0;
    let mut byte = [0u8; 1];
    for i in 0..MAX_VARINT_LEN {
        match reader.read(&mut byte)? {
            0 if i == 0 => return Ok(None),
            0 => {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    "truncated varint",
                ))
            }
            _ => {}
        }
        value |= u64::from(byte[0] & 0x7f) << (7 * i);
        if byte[0] & 0x80 == 0 {
            return Ok(Some(value));
        }
    }
    Err(std::io::Error::new(
        std::io::ErrorKind::InvalidData,
        "varint too long",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_encodings() {
        assert_eq!(to_vec(0), vec![0x00]);
        assert_eq!(to_vec(1), vec![0x01]);
        assert_eq!(to_vec(127), vec![0x7f]);
        assert_eq!(to_vec(128), vec![0x80, 0x01]);
        assert_eq!(to_vec(300), vec![0xac, 0x02]);
        assert_eq!(to_vec(0x0401), vec![0x81, 0x08]);
    }

    #[test]
    fn test_decode_reports_consumed() {
        let bytes = [0xac, 0x02, 0xff];
        assert_eq!(decode(&bytes).unwrap(), (300, 2));
    }

    #[test]
    fn test_decode_rejects_truncated_and_padded() {
        assert!(decode(&[0x80]).is_err());
        assert!(decode(&[]).is_err());
        assert!(decode(&[0x80, 0x00]).is_err());
    }

    #[test]
    fn test_read_clean_eof() {
        let mut empty: &[u8] = &[];
        assert_eq!(read(&mut empty).unwrap(), None);

        let mut truncated: &[u8] = &[0x80];
        assert!(read(&mut truncated).is_err());

        let mut data: &[u8] = &[0x81, 0x08, 0x05];
        assert_eq!(read(&mut data).unwrap(), Some(0x0401));
        assert_eq!(read(&mut data).unwrap(), Some(5));
    }
}
