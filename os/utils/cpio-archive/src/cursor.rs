//! Bounds-checked read and write positions over archive buffers.

use crate::CpioError;

/// Rounds `n` up to the next multiple of four.
#[inline]
#[must_use]
pub const fn align4(n: usize) -> usize {
    (n + 3) & !3
}

/// Number of zero bytes needed after `n` bytes to reach a four byte boundary.
#[inline]
#[must_use]
pub const fn pad4(n: usize) -> usize {
    (4 - (n & 3)) & 3
}

/// Read position within an archive.
///
/// Every advance is checked against the end of the buffer; nothing is ever
/// read past it.
#[derive(Debug, Clone)]
pub struct ReadCursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> ReadCursor<'a> {
    #[must_use]
    pub const fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    #[must_use]
    pub const fn at(buf: &'a [u8], pos: usize) -> Self {
        Self { buf, pos }
    }

    #[must_use]
    pub const fn position(&self) -> usize {
        self.pos
    }

    #[must_use]
    pub const fn remaining(&self) -> usize {
        self.buf.len().saturating_sub(self.pos)
    }

    #[must_use]
    pub const fn is_at_end(&self) -> bool {
        self.remaining() == 0
    }

    /// Returns the next `len` bytes without consuming them.
    ///
    /// # Errors
    /// [`CpioError::PrematureEnd`] if fewer than `len` bytes remain.
    pub fn peek(&self, len: usize) -> Result<&'a [u8], CpioError> {
        let end = self.pos.checked_add(len).ok_or_else(|| self.premature(len))?;
        self.buf.get(self.pos..end).ok_or_else(|| self.premature(len))
    }

    /// Consumes and returns the next `len` bytes.
    ///
    /// # Errors
    /// [`CpioError::PrematureEnd`] if fewer than `len` bytes remain.
    pub fn take(&mut self, len: usize) -> Result<&'a [u8], CpioError> {
        let bytes = self.peek(len)?;
        self.pos += len;
        Ok(bytes)
    }

    /// Skips `len` bytes.
    ///
    /// # Errors
    /// [`CpioError::PrematureEnd`] if fewer than `len` bytes remain.
    pub fn skip(&mut self, len: usize) -> Result<(), CpioError> {
        self.take(len).map(|_| ())
    }

    const fn premature(&self, needed: usize) -> CpioError {
        CpioError::PrematureEnd {
            offset: self.pos,
            needed,
        }
    }
}

/// Write position within a caller-provided destination buffer.
#[derive(Debug)]
pub struct WriteCursor<'a> {
    buf: &'a mut [u8],
    pos: usize,
}

impl<'a> WriteCursor<'a> {
    pub const fn new(buf: &'a mut [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub const fn at(buf: &'a mut [u8], pos: usize) -> Self {
        Self { buf, pos }
    }

    #[must_use]
    pub const fn position(&self) -> usize {
        self.pos
    }

    #[must_use]
    pub const fn remaining(&self) -> usize {
        self.buf.len().saturating_sub(self.pos)
    }

    /// Fails unless at least `len` more bytes fit.
    ///
    /// # Errors
    /// [`CpioError::BufferTooSmall`] with the total size that would be needed.
    pub const fn reserve(&self, len: usize) -> Result<(), CpioError> {
        if len > self.remaining() {
            return Err(CpioError::BufferTooSmall {
                needed: self.pos.saturating_add(len),
                available: self.buf.len(),
            });
        }
        Ok(())
    }

    /// Hands out the next `len` bytes for in-place formatting.
    ///
    /// # Errors
    /// [`CpioError::BufferTooSmall`] if the buffer ends before `len` bytes.
    pub fn slot(&mut self, len: usize) -> Result<&mut [u8], CpioError> {
        self.reserve(len)?;
        let start = self.pos;
        self.pos += len;
        Ok(&mut self.buf[start..self.pos])
    }

    /// Appends `bytes`.
    ///
    /// # Errors
    /// [`CpioError::BufferTooSmall`] if `bytes` do not fit.
    pub fn put(&mut self, bytes: &[u8]) -> Result<(), CpioError> {
        self.slot(bytes.len())?.copy_from_slice(bytes);
        Ok(())
    }

    /// Zero-fills up to the next four byte boundary of the absolute position.
    ///
    /// # Errors
    /// [`CpioError::BufferTooSmall`] if the padding does not fit.
    pub fn pad(&mut self) -> Result<(), CpioError> {
        let len = pad4(self.pos);
        self.slot(len)?.fill(0);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alignment_helpers() {
        assert_eq!(align4(0), 0);
        assert_eq!(align4(1), 4);
        assert_eq!(align4(4), 4);
        assert_eq!(align4(110 + 11), 124);
        assert_eq!(pad4(0), 0);
        assert_eq!(pad4(5), 3);
        assert_eq!(pad4(6), 2);
        assert_eq!(pad4(7), 1);
    }

    #[test]
    fn read_cursor_never_passes_the_end() {
        let data = [1u8, 2, 3, 4, 5];
        let mut cursor = ReadCursor::new(&data);
        assert_eq!(cursor.take(2).unwrap(), &[1, 2]);
        assert_eq!(cursor.peek(3).unwrap(), &[3, 4, 5]);
        assert_eq!(
            cursor.take(4),
            Err(CpioError::PrematureEnd {
                offset: 2,
                needed: 4
            })
        );
        assert_eq!(cursor.position(), 2);
        cursor.skip(3).unwrap();
        assert!(cursor.is_at_end());
        assert!(cursor.skip(usize::MAX).is_err());
    }

    #[test]
    fn write_cursor_pads_and_reports_shortfall() {
        let mut buf = [0xAAu8; 8];
        let mut cursor = WriteCursor::new(&mut buf);
        cursor.put(b"abcde").unwrap();
        cursor.pad().unwrap();
        assert_eq!(cursor.position(), 8);
        assert_eq!(
            cursor.put(b"x"),
            Err(CpioError::BufferTooSmall {
                needed: 9,
                available: 8
            })
        );
        assert_eq!(&buf, b"abcde\0\0\0");
    }
}
