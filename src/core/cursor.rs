//! # Byte Cursor
//!
//! Bounds-checked big-endian reader over an immutable byte slice.
//!
//! Every read checks `position + size <= length` before touching the buffer and
//! only advances on success. A failed read returns
//! [`ProtocolError::OutOfBounds`]; callers discard the whole decode attempt.

use crate::error::{ProtocolError, Result};

/// Cursor over a borrowed byte slice.
#[derive(Debug, Clone)]
pub struct ByteCursor<'a> {
    buf: &'a [u8],
    position: usize,
}

impl<'a> ByteCursor<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, position: 0 }
    }

    #[inline]
    pub fn position(&self) -> usize {
        self.position
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    #[inline]
    pub fn remaining(&self) -> usize {
        self.buf.len().saturating_sub(self.position)
    }

    #[inline]
    pub fn is_exhausted(&self) -> bool {
        self.position >= self.buf.len()
    }

    /// Borrow the next `size` bytes and advance past them.
    fn take(&mut self, size: usize) -> Result<&'a [u8]> {
        let end = self
            .position
            .checked_add(size)
            .filter(|end| *end <= self.buf.len())
            .ok_or(ProtocolError::OutOfBounds {
                position: self.position,
                size,
                length: self.buf.len(),
            })?;
        let slice = &self.buf[self.position..end];
        self.position = end;
        Ok(slice)
    }

    fn take_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take_array::<1>()?[0])
    }

    pub fn read_i8(&mut self) -> Result<i8> {
        Ok(i8::from_be_bytes(self.take_array()?))
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        Ok(u16::from_be_bytes(self.take_array()?))
    }

    pub fn read_i16(&mut self) -> Result<i16> {
        Ok(i16::from_be_bytes(self.take_array()?))
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        Ok(u32::from_be_bytes(self.take_array()?))
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        Ok(i32::from_be_bytes(self.take_array()?))
    }

    pub fn read_u64(&mut self) -> Result<u64> {
        Ok(u64::from_be_bytes(self.take_array()?))
    }

    pub fn read_i64(&mut self) -> Result<i64> {
        Ok(i64::from_be_bytes(self.take_array()?))
    }

    pub fn read_f32(&mut self) -> Result<f32> {
        Ok(f32::from_be_bytes(self.take_array()?))
    }

    pub fn read_f64(&mut self) -> Result<f64> {
        Ok(f64::from_be_bytes(self.take_array()?))
    }

    /// Read exactly `len` bytes.
    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        self.take(len)
    }

    /// Read a byte run prefixed by a 4-byte big-endian length.
    pub fn read_len_prefixed(&mut self) -> Result<&'a [u8]> {
        let len = self.read_u32()? as usize;
        self.take(len)
    }

    /// Read `len` bytes as UTF-8; invalid sequences become U+FFFD.
    pub fn read_string(&mut self, len: usize) -> Result<String> {
        let raw = self.take(len)?;
        Ok(String::from_utf8_lossy(raw).into_owned())
    }

    pub fn skip(&mut self, len: usize) -> Result<()> {
        self.take(len).map(|_| ())
    }

    /// Unread bytes from the current position, without advancing.
    pub fn rest(&self) -> &'a [u8] {
        self.buf.get(self.position..).unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_big_endian_integers() {
        let data = [0x01, 0x02, 0xFF, 0xFE, 0x00, 0x00, 0x01, 0x00];
        let mut cursor = ByteCursor::new(&data);
        assert_eq!(cursor.read_u16().unwrap(), 0x0102);
        assert_eq!(cursor.read_i16().unwrap(), -2);
        assert_eq!(cursor.read_i32().unwrap(), 256);
        assert!(cursor.is_exhausted());
    }

    #[test]
    fn test_floats() {
        let mut data = Vec::new();
        data.extend_from_slice(&1.5f32.to_be_bytes());
        data.extend_from_slice(&(-2.25f64).to_be_bytes());
        let mut cursor = ByteCursor::new(&data);
        assert_eq!(cursor.read_f32().unwrap(), 1.5);
        assert_eq!(cursor.read_f64().unwrap(), -2.25);
    }

    #[test]
    fn test_out_of_bounds_does_not_advance() {
        let data = [0xAA, 0xBB, 0xCC];
        let mut cursor = ByteCursor::new(&data);
        cursor.read_u8().unwrap();
        let err = cursor.read_u32().unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::OutOfBounds {
                position: 1,
                size: 4,
                length: 3
            }
        ));
        assert_eq!(cursor.position(), 1);
        assert_eq!(cursor.read_bytes(2).unwrap(), &[0xBB, 0xCC]);
    }

    #[test]
    fn test_lossy_string() {
        let data = [b'h', 0xFF, b'i'];
        let mut cursor = ByteCursor::new(&data);
        assert_eq!(cursor.read_string(3).unwrap(), "h\u{FFFD}i");
    }

    #[test]
    fn test_len_prefixed_and_rest() {
        let data = [0, 0, 0, 2, 7, 8, 9];
        let mut cursor = ByteCursor::new(&data);
        assert_eq!(cursor.read_len_prefixed().unwrap(), &[7, 8]);
        assert_eq!(cursor.rest(), &[9]);
        assert_eq!(cursor.remaining(), 1);
    }

    #[test]
    fn test_huge_length_overflow_is_bounds_error() {
        let data = [0u8; 4];
        let mut cursor = ByteCursor::new(&data);
        cursor.skip(2).unwrap();
        assert!(cursor.read_bytes(usize::MAX).is_err());
    }
}
