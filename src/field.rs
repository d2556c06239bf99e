use thiserror::Error;

/// Wire-level kind of a single instruction operand.
///
/// Every kind occupies a fixed-width span of `width` bytes inside the
/// instruction. `Offset` and `StrLen` spans are never written from a literal
/// value: the assembler reserves them and patches them once the label offset
/// or payload length is known.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    /// Unsigned little-endian integer.
    Uint(u8),

    /// Two's-complement little-endian integer.
    Int(u8),

    /// Byte position elsewhere in the same stream, resolved through labels.
    Offset(u8),

    /// Byte length of the text payload following the fixed fields.
    StrLen(u8),

    /// Opaque byte array, copied verbatim.
    Raw(u8),
}

impl FieldType {
    /// Width of the fixed span this field occupies, in bytes.
    pub fn width(self) -> usize {
        match self {
            FieldType::Uint(w)
            | FieldType::Int(w)
            | FieldType::Offset(w)
            | FieldType::StrLen(w)
            | FieldType::Raw(w) => w as usize,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FieldError {
    #[error("value {value} does not fit in {width} byte(s)")]
    OutOfRange { value: i128, width: u8 },

    #[error("raw field expects {expected} byte(s), got {got}")]
    LengthMismatch { expected: u8, got: usize },
}

/// Append `value` as a `width`-byte little-endian unsigned integer.
pub fn encode_uint(buf: &mut Vec<u8>, width: u8, value: u64) -> Result<(), FieldError> {
    if width < 8 && value >> (8 * width as u32) != 0 {
        return Err(FieldError::OutOfRange {
            value: value as i128,
            width,
        });
    }

    buf.extend_from_slice(&value.to_le_bytes()[..width as usize]);
    Ok(())
}

/// Append `value` as a `width`-byte little-endian two's-complement integer.
///
/// Negative values wrap into the unsigned representation before the bytes are
/// split out.
pub fn encode_int(buf: &mut Vec<u8>, width: u8, value: i64) -> Result<(), FieldError> {
    if width < 8 {
        let bound = 1i64 << (8 * width as u32 - 1);

        if value < -bound || value >= bound {
            return Err(FieldError::OutOfRange {
                value: value as i128,
                width,
            });
        }
    }

    buf.extend_from_slice(&value.to_le_bytes()[..width as usize]);
    Ok(())
}

/// Append a raw field, which must match its declared width exactly.
pub fn encode_raw(buf: &mut Vec<u8>, width: u8, bytes: &[u8]) -> Result<(), FieldError> {
    if bytes.len() != width as usize {
        return Err(FieldError::LengthMismatch {
            expected: width,
            got: bytes.len(),
        });
    }

    buf.extend_from_slice(bytes);
    Ok(())
}

/// Overwrite an already-reserved span with `value` (label resolution and
/// string-length back-fill).
pub fn patch_uint(span: &mut [u8], value: u64) -> Result<(), FieldError> {
    let width = span.len();

    if width < 8 && value >> (8 * width as u32) != 0 {
        return Err(FieldError::OutOfRange {
            value: value as i128,
            width: width as u8,
        });
    }

    span.copy_from_slice(&value.to_le_bytes()[..width]);
    Ok(())
}

/// Read a little-endian unsigned integer from a span of up to 8 bytes.
pub fn decode_uint(span: &[u8]) -> u64 {
    let mut value = 0u64;

    for (i, byte) in span.iter().enumerate() {
        value |= (*byte as u64) << (8 * i);
    }

    value
}

/// Read a little-endian two's-complement integer from a span of up to 8
/// bytes, sign-extending from the span's most significant bit.
pub fn decode_int(span: &[u8]) -> i64 {
    let shift = 64 - 8 * span.len() as u32;
    ((decode_uint(span) << shift) as i64) >> shift
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uint_range_edges() {
        let mut buf = vec![];
        encode_uint(&mut buf, 1, 0xFF).unwrap();
        encode_uint(&mut buf, 2, 0xFFFF).unwrap();
        assert_eq!(buf, [0xFF, 0xFF, 0xFF]);

        assert_eq!(
            encode_uint(&mut buf, 1, 0x100),
            Err(FieldError::OutOfRange {
                value: 0x100,
                width: 1
            })
        );
    }

    #[test]
    fn test_int_range_edges() {
        let mut buf = vec![];
        encode_int(&mut buf, 2, -0x8000).unwrap();
        encode_int(&mut buf, 2, 0x7FFF).unwrap();
        assert_eq!(buf, [0x00, 0x80, 0xFF, 0x7F]);

        assert!(encode_int(&mut buf, 2, -0x8001).is_err());
        assert!(encode_int(&mut buf, 2, 0x8000).is_err());
    }

    #[test]
    fn test_int_wraps_negative() {
        let mut buf = vec![];
        encode_int(&mut buf, 4, -1).unwrap();
        assert_eq!(buf, [0xFF, 0xFF, 0xFF, 0xFF]);
        assert_eq!(decode_int(&buf), -1);
    }

    #[test]
    fn test_uint_never_sign_extends() {
        assert_eq!(decode_uint(&[0xFF, 0xFF, 0xFF, 0xFF]), 0xFFFFFFFF);
        assert_eq!(decode_uint(&[0x64, 0x00]), 0x64);
    }

    #[test]
    fn test_full_width() {
        let mut buf = vec![];
        encode_uint(&mut buf, 8, u64::MAX).unwrap();
        assert_eq!(decode_uint(&buf), u64::MAX);

        let mut buf = vec![];
        encode_int(&mut buf, 8, i64::MIN).unwrap();
        assert_eq!(decode_int(&buf), i64::MIN);
    }

    #[test]
    fn test_raw_length_mismatch() {
        let mut buf = vec![];
        encode_raw(&mut buf, 3, &[1, 2, 3]).unwrap();

        assert_eq!(
            encode_raw(&mut buf, 3, &[1, 2]),
            Err(FieldError::LengthMismatch {
                expected: 3,
                got: 2
            })
        );
    }

    #[test]
    fn test_patch() {
        let mut buf = vec![0u8; 6];
        patch_uint(&mut buf[2..6], 0x1234).unwrap();
        assert_eq!(buf, [0, 0, 0x34, 0x12, 0, 0]);

        assert!(patch_uint(&mut buf[0..1], 0x100).is_err());
    }
}
