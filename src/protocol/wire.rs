use bytes::{Buf, BufMut, BytesMut};

use crate::protocol::ProtocolError;

/// Maximum message size in bytes (16 MB).
/// PostgreSQL allows up to 1 GB, but 16 MB is a reasonable default for most use cases.
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;

/// Read a null-terminated string from a BytesMut buffer.
/// Returns an error if there's not enough data (no null terminator found).
/// Returns the string (without the null terminator) if successful.
///
/// The scan for the null byte is capped to prevent unbounded memory
/// consumption from malicious input.
pub fn get_cstring(src: &mut BytesMut) -> Result<String, ProtocolError> {
    const MAX_CSTRING_LENGTH: usize = 64 * 1024; // 64KB limit

    let Some(null_pos) = src.iter().take(MAX_CSTRING_LENGTH).position(|&b| b == 0) else {
        return Err(ProtocolError::InsufficientData);
    };

    let bytes = src.split_to(null_pos);
    src.advance(1);
    String::from_utf8(bytes.to_vec()).map_err(|_| ProtocolError::InvalidUtf8)
}

/// Write a null-terminated string to a BytesMut buffer.
pub fn put_cstring(dst: &mut BytesMut, s: &str) {
    dst.put_slice(s.as_bytes());
    dst.put_u8(0);
}

pub fn get_u8(src: &mut BytesMut) -> Result<u8, ProtocolError> {
    if src.is_empty() {
        return Err(ProtocolError::InsufficientData);
    }
    Ok(src.get_u8())
}

pub fn get_i8(src: &mut BytesMut) -> Result<i8, ProtocolError> {
    if src.is_empty() {
        return Err(ProtocolError::InsufficientData);
    }
    Ok(src.get_i8())
}

pub fn get_i16(src: &mut BytesMut) -> Result<i16, ProtocolError> {
    if src.len() < 2 {
        return Err(ProtocolError::InsufficientData);
    }
    Ok(src.get_i16())
}

pub fn get_i32(src: &mut BytesMut) -> Result<i32, ProtocolError> {
    if src.len() < 4 {
        return Err(ProtocolError::InsufficientData);
    }
    Ok(src.get_i32())
}

/// Read exactly `len` bytes from the buffer.
pub fn get_bytes(src: &mut BytesMut, len: usize) -> Result<Vec<u8>, ProtocolError> {
    if src.len() < len {
        return Err(ProtocolError::InsufficientData);
    }
    Ok(src.split_to(len).to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_cstring() {
        let mut buf = BytesMut::from(&b"hello\0world"[..]);
        assert_eq!(get_cstring(&mut buf).unwrap(), "hello".to_string());
        assert_eq!(buf, b"world"[..]);
    }

    #[test]
    fn test_get_cstring_incomplete() {
        let mut buf = BytesMut::from(&b"hello"[..]);
        assert!(get_cstring(&mut buf).is_err());
    }

    #[test]
    fn test_put_cstring() {
        let mut buf = BytesMut::new();
        put_cstring(&mut buf, "test");
        assert_eq!(buf, b"test\0"[..]);
    }

    #[test]
    fn test_get_scalars() {
        let mut buf = BytesMut::from(&[0x01, 0x00, 0x02, 0x00, 0x00, 0x00, 0x03][..]);
        assert_eq!(get_u8(&mut buf).unwrap(), 1);
        assert_eq!(get_i16(&mut buf).unwrap(), 2);
        assert_eq!(get_i32(&mut buf).unwrap(), 3);
        assert!(get_u8(&mut buf).is_err());
    }

    #[test]
    fn test_get_bytes_short() {
        let mut buf = BytesMut::from(&b"ab"[..]);
        assert!(get_bytes(&mut buf, 3).is_err());
    }
}
