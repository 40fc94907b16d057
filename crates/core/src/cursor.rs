//! Bounds-checked little-endian cursors for reading input images and assembling the output file.
//!
//! [`ByteReader`] wraps a borrowed slice for parsing ELF headers and raw images.
//! [`ImageWriter`] wraps an owned, growable buffer that behaves like a seekable file: writing past
//! the current end extends the buffer with zeroes, matching the `fseek`+`fwrite` pattern the output
//! layout (spec §4.F) depends on to leave gaps for later patching (e.g. the ROM-mode branch at
//! offset 0).

use snafu::prelude::*;

/// Error conditions for [`ByteReader`].
#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum Error {
    /// Thrown if reading tries to go out of bounds.
    #[snafu(display("Unexpected end-of-file"))]
    EndOfFile,
}
type Result<T> = core::result::Result<T, Error>;

/// A borrowed, bounds-checked little-endian reader over a byte slice.
pub struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    #[inline]
    #[must_use]
    pub const fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    #[inline]
    #[must_use]
    pub const fn position(&self) -> usize {
        self.pos
    }

    #[inline]
    pub fn set_position(&mut self, pos: usize) {
        self.pos = pos;
    }

    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Returns a slice of `length` bytes starting at the current position, advancing the cursor.
    ///
    /// # Errors
    /// Returns [`EndOfFile`](Error::EndOfFile) if the read would go out of bounds.
    #[inline]
    pub fn get_slice(&mut self, length: usize) -> Result<&'a [u8]> {
        ensure!(self.data.len() >= self.pos + length, EndOfFileSnafu);
        let slice = &self.data[self.pos..self.pos + length];
        self.pos += length;
        Ok(slice)
    }

    /// Reads one byte.
    ///
    /// # Errors
    /// Returns [`EndOfFile`](Error::EndOfFile) if trying to read out of bounds.
    #[inline]
    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.get_slice(1)?[0])
    }

    /// Reads a little-endian `u16`.
    ///
    /// # Errors
    /// Returns [`EndOfFile`](Error::EndOfFile) if trying to read out of bounds.
    #[inline]
    pub fn read_u16(&mut self) -> Result<u16> {
        let bytes: [u8; 2] = self.get_slice(2)?.try_into().unwrap();
        Ok(u16::from_le_bytes(bytes))
    }

    /// Reads a little-endian `u32`.
    ///
    /// # Errors
    /// Returns [`EndOfFile`](Error::EndOfFile) if trying to read out of bounds.
    #[inline]
    pub fn read_u32(&mut self) -> Result<u32> {
        let bytes: [u8; 4] = self.get_slice(4)?.try_into().unwrap();
        Ok(u32::from_le_bytes(bytes))
    }
}

/// An owned, growable little-endian writer that models a seekable output file.
///
/// Seeking past the current end and writing there zero-fills the gap, the same as reusing a
/// `FILE*` opened for writing: the layout pass relies on this to reserve the entry-point branch at
/// offset 0 before the loader's size is known.
#[derive(Debug, Default)]
pub struct ImageWriter {
    data: Vec<u8>,
    pos: usize,
}

impl ImageWriter {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    #[must_use]
    pub const fn position(&self) -> usize {
        self.pos
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[inline]
    pub fn seek_start(&mut self, pos: usize) {
        self.pos = pos;
    }

    #[inline]
    pub fn seek_end(&mut self) {
        self.pos = self.data.len();
    }

    /// Writes `bytes` at the current position, extending the buffer (zero-filling any gap) as
    /// needed, then advances the position past the written data.
    #[inline]
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        let end = self.pos + bytes.len();
        if end > self.data.len() {
            self.data.resize(end, 0);
        }
        self.data[self.pos..end].copy_from_slice(bytes);
        self.pos = end;
    }

    #[inline]
    pub fn write_u8(&mut self, value: u8) {
        self.write_bytes(&[value]);
    }

    #[inline]
    pub fn write_u32(&mut self, value: u32) {
        self.write_bytes(&value.to_le_bytes());
    }

    #[inline]
    #[must_use]
    pub fn into_inner(self) -> Vec<u8> {
        self.data
    }
}
