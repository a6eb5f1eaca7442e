//! Payload encoding primitives.
//!
//! - integers: little-endian, fixed width
//! - strings: `[u32 LE length][UTF-8 bytes]`
//! - sequences: `[u32 LE count][element…]`
//! - nested composites: `[u32 LE byte length][fields…]`, so a reader can
//!   skip trailing fields it does not know about
//!
//! Readers check every length against the remaining input before
//! touching it; underflow is a framing error, never a panic.

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{Error, Result};

/// Incremental payload builder.
#[derive(Default)]
pub struct PayloadWriter {
    buf: BytesMut,
}

impl PayloadWriter {
    /// Create an empty writer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a little-endian u32.
    pub fn put_u32(&mut self, value: u32) {
        self.buf.put_u32_le(value);
    }

    /// Append a little-endian i64.
    pub fn put_i64(&mut self, value: i64) {
        self.buf.put_i64_le(value);
    }

    /// Append a length-prefixed UTF-8 string.
    pub fn put_string(&mut self, value: &str) {
        self.buf.put_u32_le(value.len() as u32);
        self.buf.put_slice(value.as_bytes());
    }

    /// Append a nested composite, prefixed with its own byte length.
    pub fn put_block(&mut self, build: impl FnOnce(&mut PayloadWriter)) {
        let mut inner = PayloadWriter::new();
        build(&mut inner);
        let block = inner.into_bytes();
        self.buf.put_u32_le(block.len() as u32);
        self.buf.put_slice(&block);
    }

    /// Finish and take the encoded payload.
    pub fn into_bytes(self) -> Bytes {
        self.buf.freeze()
    }
}

/// Cursor over an encoded payload.
pub struct PayloadReader<'a> {
    buf: &'a [u8],
}

impl<'a> PayloadReader<'a> {
    /// Create a reader over the full payload.
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }

    /// Bytes not yet consumed.
    pub fn remaining(&self) -> usize {
        self.buf.len()
    }

    fn take(&mut self, count: usize) -> Result<&'a [u8]> {
        if self.buf.len() < count {
            return Err(Error::frame("payload underflow"));
        }
        let (head, tail) = self.buf.split_at(count);
        self.buf = tail;
        Ok(head)
    }

    /// Read a little-endian u32.
    pub fn get_u32(&mut self) -> Result<u32> {
        let bytes = self.take(4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// Read a little-endian i64.
    pub fn get_i64(&mut self) -> Result<i64> {
        let bytes = self.take(8)?;
        let mut raw = [0u8; 8];
        raw.copy_from_slice(bytes);
        Ok(i64::from_le_bytes(raw))
    }

    /// Read a length-prefixed UTF-8 string.
    pub fn get_string(&mut self) -> Result<String> {
        let len = self.get_u32()? as usize;
        let bytes = self.take(len)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| Error::frame("string is not valid UTF-8"))
    }

    /// Read a sequence count.
    pub fn get_count(&mut self) -> Result<usize> {
        Ok(self.get_u32()? as usize)
    }

    /// Read a nested composite as its own reader.
    ///
    /// The outer cursor advances past the whole block regardless of how
    /// much of it the caller consumes, which is what lets old readers
    /// skip fields appended by newer writers.
    pub fn get_block(&mut self) -> Result<PayloadReader<'a>> {
        let len = self.get_u32()? as usize;
        let bytes = self.take(len)?;
        Ok(PayloadReader::new(bytes))
    }
}
