//! Binary encoding shared by frozen invocation arguments and state-history messages.
//!
//! Integers are little-endian, lengths and variant indices are LEB128 `varuint32`, optionals
//! carry a presence byte, and byte strings are length-prefixed.

use alloy_primitives::{Bytes, B256};

/// Errors raised while decoding a binary message.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    /// The input ended before the value was complete.
    #[error("unexpected end of input: needed {needed} bytes at offset {offset}")]
    UnexpectedEof {
        /// Offset at which the read started
        offset: usize,
        /// Number of bytes the read needed
        needed: usize,
    },
    /// A `varuint32` did not terminate within five bytes or overflowed.
    #[error("invalid varuint32 at offset {0}")]
    InvalidVarUint(usize),
    /// A `bool` byte was neither 0 nor 1.
    #[error("invalid bool byte {0:#04x}")]
    InvalidBool(u8),
    /// A variant index is not defined for the type being decoded.
    #[error("unknown {ty} variant index {index}")]
    UnknownVariant {
        /// Name of the variant type
        ty: &'static str,
        /// The decoded index
        index: u32,
    },
    /// Bytes remained after the message was fully decoded.
    #[error("{0} trailing bytes after message")]
    TrailingBytes(usize),
}

/// A length does not fit the 32-bit length prefix of the encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("length {0} does not fit in a 32-bit length prefix")]
pub struct LengthOverflow(pub usize);

/// Converts a length or count to its `varuint32` prefix.
pub fn encode_len(len: usize) -> Result<u32, LengthOverflow> {
    u32::try_from(len).map_err(|_| LengthOverflow(len))
}

/// A cursor over an encoded message.
#[derive(Debug, Clone)]
pub struct AbiReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> AbiReader<'a> {
    /// Creates a reader positioned at the start of `buf`.
    pub const fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Number of bytes not yet consumed.
    pub const fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// Fails unless the whole input has been consumed.
    pub const fn finish(&self) -> Result<(), DecodeError> {
        match self.remaining() {
            0 => Ok(()),
            n => Err(DecodeError::TrailingBytes(n)),
        }
    }

    fn take(&mut self, needed: usize) -> Result<&'a [u8], DecodeError> {
        if self.remaining() < needed {
            return Err(DecodeError::UnexpectedEof { offset: self.pos, needed });
        }
        let out = &self.buf[self.pos..self.pos + needed];
        self.pos += needed;
        Ok(out)
    }

    /// Reads one byte.
    pub fn read_u8(&mut self) -> Result<u8, DecodeError> {
        Ok(self.take(1)?[0])
    }

    /// Reads a little-endian `u32`.
    pub fn read_u32(&mut self) -> Result<u32, DecodeError> {
        let bytes = self.take(4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// Reads a LEB128 `varuint32`.
    pub fn read_varuint32(&mut self) -> Result<u32, DecodeError> {
        let start = self.pos;
        let mut result = 0u32;
        for i in 0..5 {
            let byte = self.read_u8()?;
            let bits = u32::from(byte & 0x7f);
            if i == 4 && bits > 0x0f {
                return Err(DecodeError::InvalidVarUint(start));
            }
            result |= bits << (7 * i);
            if byte & 0x80 == 0 {
                return Ok(result);
            }
        }
        Err(DecodeError::InvalidVarUint(start))
    }

    /// Reads a `bool` byte.
    pub fn read_bool(&mut self) -> Result<bool, DecodeError> {
        match self.read_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(DecodeError::InvalidBool(other)),
        }
    }

    /// Reads a 32-byte checksum.
    pub fn read_checksum256(&mut self) -> Result<B256, DecodeError> {
        Ok(B256::from_slice(self.take(32)?))
    }

    /// Reads a length-prefixed byte string.
    pub fn read_bytes(&mut self) -> Result<Bytes, DecodeError> {
        let len = self.read_varuint32()? as usize;
        Ok(Bytes::copy_from_slice(self.take(len)?))
    }

    /// Reads an optional value whose body is decoded by `read`.
    pub fn read_optional<T>(
        &mut self,
        read: impl FnOnce(&mut Self) -> Result<T, DecodeError>,
    ) -> Result<Option<T>, DecodeError> {
        if self.read_bool()? {
            read(self).map(Some)
        } else {
            Ok(None)
        }
    }

    /// Reads a vector whose elements are decoded by `read`.
    pub fn read_vec<T>(
        &mut self,
        mut read: impl FnMut(&mut Self) -> Result<T, DecodeError>,
    ) -> Result<Vec<T>, DecodeError> {
        let len = self.read_varuint32()? as usize;
        // Each element takes at least one byte, so cap the reservation by the input left.
        let mut out = Vec::with_capacity(len.min(self.remaining()));
        for _ in 0..len {
            out.push(read(self)?);
        }
        Ok(out)
    }
}

/// Appends a LEB128 `varuint32`.
pub fn write_varuint32(out: &mut Vec<u8>, mut value: u32) {
    loop {
        let byte = (value & 0x7f) as u8;
        value >>= 7;
        if value == 0 {
            out.push(byte);
            return;
        }
        out.push(byte | 0x80);
    }
}

/// Appends a little-endian `u32`.
pub fn write_u32(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_le_bytes());
}

/// Appends a `bool` byte.
pub fn write_bool(out: &mut Vec<u8>, value: bool) {
    out.push(u8::from(value));
}

/// Appends a length-prefixed byte string. Nothing is written when the length overflows.
pub fn write_bytes(out: &mut Vec<u8>, bytes: &[u8]) -> Result<(), LengthOverflow> {
    write_varuint32(out, encode_len(bytes.len())?);
    out.extend_from_slice(bytes);
    Ok(())
}

/// Freezes invocation arguments into the `vector<string>` encoding handed to `get_args`.
pub fn encode_args<S: AsRef<str>>(args: &[S]) -> Result<Bytes, LengthOverflow> {
    let mut out = Vec::new();
    write_varuint32(&mut out, encode_len(args.len())?);
    for arg in args {
        write_bytes(&mut out, arg.as_ref().as_bytes())?;
    }
    Ok(out.into())
}

/// Decodes arguments frozen with [`encode_args`].
pub fn decode_args(buf: &[u8]) -> Result<Vec<String>, DecodeError> {
    let mut reader = AbiReader::new(buf);
    let args = reader.read_vec(|r| {
        let bytes = r.read_bytes()?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    })?;
    reader.finish()?;
    Ok(args)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(0, &[0x00])]
    #[case(127, &[0x7f])]
    #[case(128, &[0x80, 0x01])]
    #[case(300, &[0xac, 0x02])]
    #[case(u32::MAX, &[0xff, 0xff, 0xff, 0xff, 0x0f])]
    fn test_varuint32_encoding(#[case] value: u32, #[case] expected: &[u8]) {
        let mut out = Vec::new();
        write_varuint32(&mut out, value);
        assert_eq!(out, expected);
        assert_eq!(AbiReader::new(expected).read_varuint32().unwrap(), value);
    }

    #[test]
    fn test_varuint32_overflow_is_rejected() {
        let err = AbiReader::new(&[0xff, 0xff, 0xff, 0xff, 0x1f]).read_varuint32().unwrap_err();
        assert_eq!(err, DecodeError::InvalidVarUint(0));
        let err =
            AbiReader::new(&[0x80, 0x80, 0x80, 0x80, 0x80, 0x01]).read_varuint32().unwrap_err();
        assert_eq!(err, DecodeError::InvalidVarUint(0));
    }

    #[test]
    fn test_args_encoding() {
        let encoded = encode_args(&["x", "yz"]).unwrap();
        assert_eq!(encoded.as_ref(), &[2, 1, b'x', 2, b'y', b'z']);
        assert_eq!(decode_args(&encoded).unwrap(), vec!["x".to_string(), "yz".to_string()]);
        assert_eq!(encode_args::<&str>(&[]).unwrap().as_ref(), &[0]);
    }

    #[test]
    fn test_length_prefix_overflow() {
        assert_eq!(encode_len(u32::MAX as usize), Ok(u32::MAX));
        #[cfg(target_pointer_width = "64")]
        {
            let len = u32::MAX as usize + 1;
            assert_eq!(encode_len(len), Err(LengthOverflow(len)));
            assert_eq!(
                LengthOverflow(len).to_string(),
                "length 4294967296 does not fit in a 32-bit length prefix"
            );
        }
    }

    #[test]
    fn test_truncated_input() {
        let mut reader = AbiReader::new(&[3, b'a']);
        assert_eq!(
            reader.read_bytes().unwrap_err(),
            DecodeError::UnexpectedEof { offset: 1, needed: 3 }
        );
    }

    #[test]
    fn test_trailing_bytes() {
        let err = decode_args(&[0, 9, 9]).unwrap_err();
        assert_eq!(err, DecodeError::TrailingBytes(2));
    }

    #[test]
    fn test_optional_and_bool() {
        let mut reader = AbiReader::new(&[1, 0x2a, 0, 0, 0, 0, 2]);
        assert_eq!(reader.read_optional(AbiReader::read_u32).unwrap(), Some(42));
        assert_eq!(reader.read_optional(AbiReader::read_u32).unwrap(), None);
        assert_eq!(reader.read_bool().unwrap_err(), DecodeError::InvalidBool(2));
    }
}
