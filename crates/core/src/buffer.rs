// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Growable little-endian byte buffer
//!
//! Writes append at the end, reads advance an independent reader position.
//! Size markers reserve a 4-byte slot that is back-filled once the framed
//! payload has been written.

use bytes::{BufMut, BytesMut};
use thiserror::Error;

/// Errors raised while reading from a [`Buffer`]
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BufferError {
    #[error("read of {requested} bytes at position {position} exceeds {available} available")]
    OutOfBounds {
        position: usize,
        requested: usize,
        available: usize,
    },
}

/// A reserved 4-byte size slot returned by [`Buffer::mark_size`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizeMark(usize);

#[derive(Debug, Default, Clone)]
pub struct Buffer {
    bytes: BytesMut,
    reader: usize,
}

impl Buffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            bytes: BytesMut::with_capacity(capacity),
            reader: 0,
        }
    }

    /// Wrap existing bytes for reading from the start
    pub fn from_vec(bytes: Vec<u8>) -> Self {
        Self {
            bytes: BytesMut::from(&bytes[..]),
            reader: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.bytes.to_vec()
    }

    /// Drop all written bytes and rewind the reader
    pub fn clear(&mut self) {
        self.bytes.clear();
        self.reader = 0;
    }

    /// Discard bytes written at or after `len`
    pub fn truncate(&mut self, len: usize) {
        self.bytes.truncate(len);
        self.reader = self.reader.min(len);
    }

    pub fn write_u8(&mut self, value: u8) {
        self.bytes.put_u8(value);
    }

    pub fn write_u32(&mut self, value: u32) {
        self.bytes.put_u32_le(value);
    }

    pub fn write_u64(&mut self, value: u64) {
        self.bytes.put_u64_le(value);
    }

    pub fn write_i64(&mut self, value: i64) {
        self.bytes.put_i64_le(value);
    }

    pub fn write_bytes(&mut self, value: &[u8]) {
        self.bytes.put_slice(value);
    }

    /// Write a long that is usually zero: one byte for zero, nine otherwise
    pub fn write_nullable_u64(&mut self, value: u64) {
        if value == 0 {
            self.write_u8(0);
        } else {
            self.write_u8(1);
            self.write_u64(value);
        }
    }

    /// Reserve a 4-byte size slot at the current write position
    pub fn mark_size(&mut self) -> SizeMark {
        let mark = SizeMark(self.bytes.len());
        self.bytes.put_u32_le(0);
        mark
    }

    /// Fill a reserved slot with the number of bytes written after it
    pub fn write_size(&mut self, mark: SizeMark) {
        let start = mark.0;
        let size = (self.bytes.len() - start - 4) as u32;
        self.bytes[start..start + 4].copy_from_slice(&size.to_le_bytes());
    }

    pub fn reader_position(&self) -> usize {
        self.reader
    }

    pub fn set_reader_position(&mut self, position: usize) {
        self.reader = position.min(self.bytes.len());
    }

    pub fn remaining(&self) -> usize {
        self.bytes.len() - self.reader
    }

    fn take(&mut self, requested: usize) -> Result<&[u8], BufferError> {
        let available = self.remaining();
        if requested > available {
            return Err(BufferError::OutOfBounds {
                position: self.reader,
                requested,
                available,
            });
        }
        let start = self.reader;
        self.reader += requested;
        Ok(&self.bytes[start..start + requested])
    }

    pub fn read_u8(&mut self) -> Result<u8, BufferError> {
        Ok(self.take(1)?[0])
    }

    pub fn read_u32(&mut self) -> Result<u32, BufferError> {
        Ok(u32::from_le_bytes(self.read_array()?))
    }

    pub fn read_u64(&mut self) -> Result<u64, BufferError> {
        Ok(u64::from_le_bytes(self.read_array()?))
    }

    pub fn read_i64(&mut self) -> Result<i64, BufferError> {
        Ok(i64::from_le_bytes(self.read_array()?))
    }

    pub fn read_nullable_u64(&mut self) -> Result<u64, BufferError> {
        match self.read_u8()? {
            0 => Ok(0),
            _ => self.read_u64(),
        }
    }

    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N], BufferError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    pub fn read_bytes(&mut self, len: usize) -> Result<&[u8], BufferError> {
        self.take(len)
    }
}

#[cfg(test)]
#[path = "buffer_tests.rs"]
mod tests;
