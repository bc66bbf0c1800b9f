//! Bounds-checked little-endian reader over a byte region
//!
//! Every descriptor and payload header parse goes through a [`ByteCursor`].
//! The cursor is limited to the record's declared length, so a 27-byte
//! format record never reads byte 28 even when the backing slice is longer.
//!
//! # Usage
//!
//! ```rust
//! use uvc_stream::cursor::ByteCursor;
//!
//! let record = [0x1B, 0x24, 0x04, 0x01, 0x02];
//! let mut cursor = ByteCursor::new(&record);
//! assert_eq!(cursor.u8().unwrap(), 0x1B);
//! assert_eq!(cursor.u16().unwrap(), 0x0424);
//! ```

use thiserror::Error;

/// A read would cross the cursor's declared limit.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("read of {requested} bytes at offset {offset} exceeds limit {limit}")]
pub struct OutOfBounds {
    /// Position the read started at.
    pub offset: usize,
    /// Number of bytes requested.
    pub requested: usize,
    /// Declared limit of the region.
    pub limit: usize,
}

/// Sequential little-endian reader over a length-limited byte region
#[derive(Debug, Clone)]
pub struct ByteCursor<'a> {
    data: &'a [u8],
    position: usize,
}

impl<'a> ByteCursor<'a> {
    /// Create a cursor over the whole of `data`
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, position: 0 }
    }

    /// Create a cursor that stops at `limit` even if `data` is longer
    ///
    /// A limit larger than `data` is clamped to `data.len()`.
    pub fn with_limit(data: &'a [u8], limit: usize) -> Self {
        Self {
            data: &data[..limit.min(data.len())],
            position: 0,
        }
    }

    /// Current read position
    pub fn position(&self) -> usize {
        self.position
    }

    /// Declared limit of the region
    pub fn limit(&self) -> usize {
        self.data.len()
    }

    /// Bytes left before the limit
    pub fn remaining(&self) -> usize {
        self.data.len() - self.position
    }

    /// Move to an absolute offset within the region
    ///
    /// # Errors
    ///
    /// Returns [`OutOfBounds`] if `offset` is past the limit.
    pub fn seek(&mut self, offset: usize) -> Result<(), OutOfBounds> {
        if offset > self.data.len() {
            return Err(OutOfBounds {
                offset,
                requested: 0,
                limit: self.data.len(),
            });
        }
        self.position = offset;
        Ok(())
    }

    /// Advance past `count` bytes without reading them
    ///
    /// # Errors
    ///
    /// Returns [`OutOfBounds`] if fewer than `count` bytes remain.
    pub fn skip(&mut self, count: usize) -> Result<(), OutOfBounds> {
        self.bytes(count).map(|_| ())
    }

    /// Read `count` raw bytes
    ///
    /// # Errors
    ///
    /// Returns [`OutOfBounds`] if fewer than `count` bytes remain.
    pub fn bytes(&mut self, count: usize) -> Result<&'a [u8], OutOfBounds> {
        let end = self
            .position
            .checked_add(count)
            .filter(|&end| end <= self.data.len())
            .ok_or(OutOfBounds {
                offset: self.position,
                requested: count,
                limit: self.data.len(),
            })?;
        let slice = &self.data[self.position..end];
        self.position = end;
        Ok(slice)
    }

    /// Read a fixed-size byte array
    ///
    /// # Errors
    ///
    /// Returns [`OutOfBounds`] if fewer than `N` bytes remain.
    pub fn array<const N: usize>(&mut self) -> Result<[u8; N], OutOfBounds> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.bytes(N)?);
        Ok(out)
    }

    /// Read one byte
    ///
    /// # Errors
    ///
    /// Returns [`OutOfBounds`] at the limit.
    pub fn u8(&mut self) -> Result<u8, OutOfBounds> {
        Ok(self.array::<1>()?[0])
    }

    /// Read a little-endian `u16`
    ///
    /// # Errors
    ///
    /// Returns [`OutOfBounds`] if fewer than 2 bytes remain.
    pub fn u16(&mut self) -> Result<u16, OutOfBounds> {
        Ok(u16::from_le_bytes(self.array()?))
    }

    /// Read a little-endian `u32`
    ///
    /// # Errors
    ///
    /// Returns [`OutOfBounds`] if fewer than 4 bytes remain.
    pub fn u32(&mut self) -> Result<u32, OutOfBounds> {
        Ok(u32::from_le_bytes(self.array()?))
    }

    /// Everything from the current position up to the limit
    pub fn rest(&mut self) -> &'a [u8] {
        let slice = &self.data[self.position..];
        self.position = self.data.len();
        slice
    }
}
