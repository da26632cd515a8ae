//! Big-endian primitive encoding shared by every binary structure.
//!
//! Strings and byte arrays are prefixed with an `i32` byte length, int arrays
//! with an `i32` element count. An absent optional string is written as
//! length `-1`.

use byteorder::{BigEndian, ByteOrder};

use crate::error::WireError;

pub type Result<T, E = WireError> = std::result::Result<T, E>;

#[derive(Debug, Default)]
pub struct BinaryWriter {
    buf: Vec<u8>,
}

impl BinaryWriter {
    pub fn new() -> Self {
        Self { buf: Vec::new() }
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.buf
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn write_u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    pub fn write_bool(&mut self, v: bool) {
        self.buf.push(u8::from(v));
    }

    pub fn write_i32(&mut self, v: i32) {
        let mut bytes = [0; 4];
        BigEndian::write_i32(&mut bytes, v);
        self.buf.extend_from_slice(&bytes);
    }

    pub fn write_i64(&mut self, v: i64) {
        let mut bytes = [0; 8];
        BigEndian::write_i64(&mut bytes, v);
        self.buf.extend_from_slice(&bytes);
    }

    /// Writes a length or count. Lengths never exceed `i32::MAX` in practice;
    /// larger values are clamped.
    pub fn write_len(&mut self, len: usize) {
        self.write_i32(i32::try_from(len).unwrap_or(i32::MAX));
    }

    pub fn write_string(&mut self, s: &str) {
        self.write_byte_array(s.as_bytes());
    }

    pub fn write_optional_string(&mut self, s: Option<&str>) {
        match s {
            Some(s) => self.write_string(s),
            None => self.write_i32(-1),
        }
    }

    pub fn write_byte_array(&mut self, bytes: &[u8]) {
        self.write_len(bytes.len());
        self.buf.extend_from_slice(bytes);
    }

    pub fn write_int_array(&mut self, values: &[i32]) {
        self.write_len(values.len());
        for value in values {
            self.write_i32(*value);
        }
    }
}

#[derive(Debug, Clone)]
pub struct BinaryReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> BinaryReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn require(&self, n: usize) -> Result<()> {
        let underflow = || WireError::Truncated {
            needed: n,
            position: self.pos,
            available: self.remaining(),
        };
        let end = self.pos.checked_add(n).ok_or_else(underflow)?;
        if end > self.buf.len() {
            return Err(underflow());
        }
        Ok(())
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.buf.len().saturating_sub(self.pos)
    }

    pub fn is_at_end(&self) -> bool {
        self.remaining() == 0
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        self.require(1)?;
        let v = self.buf[self.pos];
        self.pos += 1;
        Ok(v)
    }

    pub fn read_bool(&mut self) -> Result<bool> {
        Ok(self.read_u8()? != 0)
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        self.require(4)?;
        let v = BigEndian::read_i32(&self.buf[self.pos..]);
        self.pos += 4;
        Ok(v)
    }

    pub fn read_i64(&mut self) -> Result<i64> {
        self.require(8)?;
        let v = BigEndian::read_i64(&self.buf[self.pos..]);
        self.pos += 8;
        Ok(v)
    }

    /// Reads a non-negative length or count.
    pub fn read_len(&mut self) -> Result<usize> {
        let position = self.pos;
        let length = self.read_i32()?;
        usize::try_from(length).map_err(|_| WireError::NegativeLength { length, position })
    }

    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8]> {
        self.require(n)?;
        let bytes = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(bytes)
    }

    pub fn read_byte_array(&mut self) -> Result<&'a [u8]> {
        let len = self.read_len()?;
        self.read_bytes(len)
    }

    pub fn read_string(&mut self) -> Result<String> {
        let position = self.pos;
        let bytes = self.read_byte_array()?;
        std::str::from_utf8(bytes)
            .map(str::to_owned)
            .map_err(|_| WireError::InvalidUtf8 { position })
    }

    pub fn read_optional_string(&mut self) -> Result<Option<String>> {
        let position = self.pos;
        let length = self.read_i32()?;
        if length == -1 {
            return Ok(None);
        }
        let len =
            usize::try_from(length).map_err(|_| WireError::NegativeLength { length, position })?;
        let bytes = self.read_bytes(len)?;
        std::str::from_utf8(bytes)
            .map(|s| Some(s.to_owned()))
            .map_err(|_| WireError::InvalidUtf8 { position })
    }

    pub fn read_int_array(&mut self) -> Result<Vec<i32>> {
        let count = self.read_len()?;
        self.require(count.saturating_mul(4))?;
        let mut values = Vec::with_capacity(count);
        for _ in 0..count {
            values.push(self.read_i32()?);
        }
        Ok(values)
    }

    pub fn skip_int_array(&mut self) -> Result<()> {
        let count = self.read_len()?;
        self.read_bytes(count.saturating_mul(4)).map(|_| ())
    }
}
