//! Field-level primitives: an append-only writer and a bounds-checked reader.
//!
//! Every multi-byte integer is big-endian. Fixed-width byte fields are
//! zero-padded on the right; values wider than their slot are rejected.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{Result, WireError};

/// Append-only builder for a single outgoing message.
#[derive(Debug, Default, Clone)]
pub struct WireWriter {
    buf: BytesMut,
}

impl WireWriter {
    /// Create an empty writer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a writer with room for `capacity` bytes.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(capacity),
        }
    }

    pub fn put_u8(&mut self, value: u8) -> &mut Self {
        self.buf.put_u8(value);
        self
    }

    pub fn put_u32(&mut self, value: u32) -> &mut Self {
        self.buf.put_u32(value);
        self
    }

    pub fn put_u64(&mut self, value: u64) -> &mut Self {
        self.buf.put_u64(value);
        self
    }

    /// Append exactly `width` bytes: `bytes` followed by zero fill.
    ///
    /// Fails with [`WireError::FieldTooLong`] if `bytes` is wider than `width`.
    pub fn put_fixed(&mut self, field: &'static str, bytes: &[u8], width: usize) -> Result<&mut Self> {
        check_fixed(field, bytes, width)?;
        self.buf.reserve(width);
        self.buf.put_slice(bytes);
        self.buf.put_bytes(0, width - bytes.len());
        Ok(self)
    }

    /// Bytes written so far.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Drop everything written after the first `len` bytes.
    pub fn truncate(&mut self, len: usize) {
        self.buf.truncate(len);
    }

    /// View of the bytes written so far.
    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    /// Finish the message.
    pub fn freeze(self) -> Bytes {
        self.buf.freeze()
    }
}

/// Read cursor over one complete datagram.
///
/// Every read checks the remaining length first, so a short buffer yields
/// [`WireError::InsufficientData`] instead of a panic.
#[derive(Debug, Clone)]
pub struct WireReader<'a> {
    buf: &'a [u8],
}

impl<'a> WireReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }

    /// Bytes not yet consumed.
    pub fn remaining(&self) -> usize {
        self.buf.len()
    }

    /// Fail unless at least `needed` bytes remain.
    pub fn ensure(&self, needed: usize) -> Result<()> {
        if self.buf.len() < needed {
            return Err(WireError::InsufficientData {
                needed,
                remaining: self.buf.len(),
            });
        }
        Ok(())
    }

    pub fn get_u8(&mut self) -> Result<u8> {
        self.ensure(1)?;
        Ok(self.buf.get_u8())
    }

    pub fn get_u32(&mut self) -> Result<u32> {
        self.ensure(4)?;
        Ok(self.buf.get_u32())
    }

    pub fn get_u64(&mut self) -> Result<u64> {
        self.ensure(8)?;
        Ok(self.buf.get_u64())
    }

    /// Read exactly `width` bytes.
    pub fn get_slice(&mut self, width: usize) -> Result<&'a [u8]> {
        self.ensure(width)?;
        let (head, tail) = self.buf.split_at(width);
        self.buf = tail;
        Ok(head)
    }

    /// Read exactly `N` bytes into an array.
    pub fn get_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.get_slice(N)?);
        Ok(out)
    }

}

/// Fail with [`WireError::FieldTooLong`] unless `bytes` fits in `width`.
pub fn check_fixed(field: &'static str, bytes: &[u8], width: usize) -> Result<()> {
    if bytes.len() > width {
        return Err(WireError::FieldTooLong {
            field,
            len: bytes.len(),
            max: width,
        });
    }
    Ok(())
}

/// Logical content of a NUL-padded field: everything before the first NUL,
/// or the whole field when there is none.
pub fn trim_nul(raw: &[u8]) -> &[u8] {
    let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
    &raw[..end]
}
