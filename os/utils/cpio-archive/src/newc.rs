//! # In-place append codec
//!
//! Walks an archive record by record without building a table and appends new
//! records where the trailer used to be. Used when a ramdisk only grows.

use crate::cursor::{ReadCursor, WriteCursor};
use crate::header::{HEADER_LEN, Header, NEWC_MAGIC, TRAILER_NAME, field_value};
use crate::legacy::write_record;
use crate::{CpioError, Mode};

/// Whether `buf` starts with a newc header.
#[must_use]
pub fn is_newc(buf: &[u8]) -> bool {
    buf.starts_with(NEWC_MAGIC)
}

/// Read-only walker over the records of an archive.
#[derive(Debug, Clone, Copy)]
pub struct Records<'a> {
    buf: &'a [u8],
}

impl<'a> Records<'a> {
    #[must_use]
    pub const fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }

    /// Header of the record at `offset`.
    ///
    /// # Errors
    /// See [`Header::parse`].
    pub fn header_at(&self, offset: usize) -> Result<Header, CpioError> {
        let bytes = ReadCursor::at(self.buf, offset).peek(HEADER_LEN)?;
        Header::parse(bytes, offset)
    }

    /// Whether the record at `offset` is a regular member rather than the
    /// trailer.
    ///
    /// # Errors
    /// See [`Header::parse`]; also [`CpioError::PrematureEnd`] if the name
    /// runs past the buffer.
    pub fn has_next(&self, offset: usize) -> Result<bool, CpioError> {
        let header = self.header_at(offset)?;
        let mut cursor = ReadCursor::at(self.buf, offset + HEADER_LEN);
        let name = cursor.take(header.namesize as usize)?;
        let name = name.strip_suffix(&[0]).unwrap_or(name);
        Ok(name != TRAILER_NAME)
    }

    /// Offset of the record following the one at `offset`.
    ///
    /// # Errors
    /// See [`Records::header_at`].
    pub fn next_offset(&self, offset: usize) -> Result<usize, CpioError> {
        let header = self.header_at(offset)?;
        offset
            .checked_add(header.record_size())
            .ok_or(CpioError::PrematureEnd {
                offset,
                needed: header.record_size(),
            })
    }

    /// Offset of the trailer record, i.e. the insertion point for appends.
    ///
    /// # Errors
    /// * [`CpioError::MissingTrailer`] if the buffer ends before a trailer.
    /// * Any header error met on the way.
    pub fn trailer_offset(&self) -> Result<usize, CpioError> {
        let mut offset = 0;
        while offset < self.buf.len() {
            if !self.has_next(offset)? {
                return Ok(offset);
            }
            offset = self.next_offset(offset)?;
        }
        Err(CpioError::MissingTrailer)
    }
}

/// Appends records to an archive in place.
///
/// The writer starts on the old trailer, overwrites it with new records and
/// writes a fresh trailer in [`Appender::finish`].
#[derive(Debug)]
pub struct Appender<'a> {
    out: WriteCursor<'a>,
}

impl<'a> Appender<'a> {
    /// Positions the writer on the trailer of the archive occupying the first
    /// `len` bytes of `buf`. The rest of `buf` is room to grow.
    ///
    /// # Errors
    /// See [`Records::trailer_offset`].
    pub fn at_trailer(buf: &'a mut [u8], len: usize) -> Result<Self, CpioError> {
        let archive = buf.get(..len).ok_or(CpioError::PrematureEnd {
            offset: 0,
            needed: len,
        })?;
        let offset = Records::new(archive).trailer_offset()?;
        Ok(Self {
            out: WriteCursor::at(buf, offset),
        })
    }

    /// Current end of the written archive.
    #[must_use]
    pub const fn position(&self) -> usize {
        self.out.position()
    }

    /// Appends one record with a zeroed header carrying `mode`.
    ///
    /// Returns the new cursor position.
    ///
    /// # Errors
    /// * [`CpioError::BufferTooSmall`] if the record does not fit.
    /// * [`CpioError::EmptyName`] for an empty name.
    pub fn append(&mut self, name: &[u8], mode: Mode, data: &[u8]) -> Result<usize, CpioError> {
        if name.is_empty() {
            return Err(CpioError::EmptyName);
        }
        self.write(Header::with_mode(mode), name, data)
    }

    fn write(
        &mut self,
        mut header: Header,
        name: &[u8],
        data: &[u8],
    ) -> Result<usize, CpioError> {
        header.namesize = field_value(name.len() + 1)?;
        header.filesize = field_value(data.len())?;
        write_record(&mut self.out, &header, name, data)?;
        Ok(self.out.position())
    }

    /// Re-terminates the archive and returns its total length.
    ///
    /// The trailer is the same record [`crate::Archive::encode`] writes.
    ///
    /// # Errors
    /// [`CpioError::BufferTooSmall`] if the trailer does not fit.
    pub fn finish(mut self) -> Result<usize, CpioError> {
        self.write(Header::trailer(), TRAILER_NAME, &[])
    }
}
