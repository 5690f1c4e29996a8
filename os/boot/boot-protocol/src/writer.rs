use crate::AtagError;
use crate::atags::{
    ATAG_CMDLINE, ATAG_CORE, ATAG_INITRD2, ATAG_MEM, ATAG_NONE, CORE_SHORT_WORDS, TagCore,
    TagInitrd, TagMem32, cmdline_words, tag_words,
};

/// Bytes needed for a list with `mem_regions` memory records and a command
/// line of `cmdline_len` bytes, sentinel included.
#[must_use]
pub const fn list_len(mem_regions: usize, cmdline_len: usize) -> usize {
    let words = CORE_SHORT_WORDS as usize
        + tag_words::<TagInitrd>() as usize
        + mem_regions * tag_words::<TagMem32>() as usize
        + cmdline_words(cmdline_len) as usize
        + CORE_SHORT_WORDS as usize;
    words * 4
}

/// Writes a tag list into a byte buffer.
///
/// The core record is written on construction and the sentinel on
/// [`TagWriter::finish`], so a finished list is always well-formed.
#[derive(Debug)]
pub struct TagWriter<'a> {
    buf: &'a mut [u8],
    pos: usize,
}

impl<'a> TagWriter<'a> {
    /// Starts a list with a core record that names no root device.
    ///
    /// # Errors
    /// [`AtagError::BufferTooSmall`] if `buf` cannot even hold the core record.
    pub fn new(buf: &'a mut [u8]) -> Result<Self, AtagError> {
        let mut writer = Self { buf, pos: 0 };
        writer.record(ATAG_CORE, CORE_SHORT_WORDS, &[])?;
        Ok(writer)
    }

    /// Starts a list with a full core record.
    ///
    /// # Errors
    /// [`AtagError::BufferTooSmall`] if `buf` cannot hold the core record.
    pub fn with_core(buf: &'a mut [u8], core: TagCore) -> Result<Self, AtagError> {
        let mut writer = Self { buf, pos: 0 };
        writer.record(
            ATAG_CORE,
            tag_words::<TagCore>(),
            &[core.flags.into_bits(), core.page_size, core.root_dev],
        )?;
        Ok(writer)
    }

    /// Bytes written so far.
    #[must_use]
    pub const fn position(&self) -> usize {
        self.pos
    }

    /// # Errors
    /// [`AtagError::BufferTooSmall`] if the record does not fit.
    pub fn initrd(&mut self, start: u32, size: u32) -> Result<&mut Self, AtagError> {
        self.record(ATAG_INITRD2, tag_words::<TagInitrd>(), &[start, size])?;
        Ok(self)
    }

    /// # Errors
    /// [`AtagError::BufferTooSmall`] if the record does not fit.
    pub fn memory(&mut self, start: u32, size: u32) -> Result<&mut Self, AtagError> {
        self.record(ATAG_MEM, tag_words::<TagMem32>(), &[size, start])?;
        Ok(self)
    }

    /// Writes `cmdline` followed by a NUL, zero-padded to a whole word.
    ///
    /// # Errors
    /// * [`AtagError::CmdlineContainsNul`] if `cmdline` has an embedded NUL.
    /// * [`AtagError::BufferTooSmall`] if the record does not fit.
    pub fn cmdline(&mut self, cmdline: &[u8]) -> Result<&mut Self, AtagError> {
        if cmdline.contains(&0) {
            return Err(AtagError::CmdlineContainsNul);
        }
        let words = cmdline_words(cmdline.len());
        let start = self.header(ATAG_CMDLINE, words)?;
        let payload = &mut self.buf[start..self.pos];
        payload.fill(0);
        payload[..cmdline.len()].copy_from_slice(cmdline);
        Ok(self)
    }

    /// Terminates the list and returns its length in bytes.
    ///
    /// # Errors
    /// [`AtagError::BufferTooSmall`] if the sentinel does not fit.
    pub fn finish(mut self) -> Result<usize, AtagError> {
        self.header(ATAG_NONE, 0)?;
        Ok(self.pos)
    }

    fn record(&mut self, tag: u32, words: u32, payload: &[u32]) -> Result<(), AtagError> {
        let start = self.header(tag, words)?;
        for (word, chunk) in payload.iter().zip(self.buf[start..self.pos].chunks_exact_mut(4)) {
            chunk.copy_from_slice(&word.to_le_bytes());
        }
        Ok(())
    }

    /// Writes a header for a record of `words` words, reserves its payload
    /// and returns the payload offset.
    ///
    /// The sentinel has a size of zero but still occupies a header.
    fn header(&mut self, tag: u32, words: u32) -> Result<usize, AtagError> {
        let len = (words as usize).max(CORE_SHORT_WORDS as usize) * 4;
        let end = self.pos.saturating_add(len);
        if end > self.buf.len() {
            return Err(AtagError::BufferTooSmall {
                needed: end,
                available: self.buf.len(),
            });
        }
        self.buf[self.pos..self.pos + 4].copy_from_slice(&words.to_le_bytes());
        self.buf[self.pos + 4..self.pos + 8].copy_from_slice(&tag.to_le_bytes());
        let payload = self.pos + 8;
        self.pos = end;
        Ok(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CoreFlags;

    fn words(bytes: &[u8]) -> Vec<u32> {
        bytes
            .chunks_exact(4)
            .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect()
    }

    #[test]
    fn writes_the_canonical_sequence() {
        let mut buf = [0xFFu8; 64];
        let mut writer = TagWriter::new(&mut buf).unwrap();
        writer
            .initrd(0x1100_0000, 0x2345)
            .unwrap()
            .memory(0x1000_0000, 0x4000_0000)
            .unwrap()
            .cmdline(b"abcd")
            .unwrap();
        let len = writer.finish().unwrap();
        assert_eq!(len, list_len(1, 4));

        assert_eq!(
            words(&buf[..len]),
            [
                2, ATAG_CORE, //
                4, ATAG_INITRD2, 0x1100_0000, 0x2345, //
                4, ATAG_MEM, 0x4000_0000, 0x1000_0000, //
                4, ATAG_CMDLINE, u32::from_le_bytes(*b"abcd"), 0, //
                0, ATAG_NONE,
            ]
        );
    }

    #[test]
    fn full_core_record_carries_flags() {
        let mut buf = [0u8; 32];
        let core = TagCore {
            flags: CoreFlags::new().with_read_only(true),
            page_size: 4096,
            root_dev: 0x0100,
        };
        let writer = TagWriter::with_core(&mut buf, core).unwrap();
        assert_eq!(writer.position(), 20);
        assert_eq!(words(&buf[..20]), [5, ATAG_CORE, 1, 4096, 0x0100]);
    }

    #[test]
    fn refuses_to_overflow_the_tag_area() {
        let mut buf = [0u8; 24];
        let mut writer = TagWriter::new(&mut buf).unwrap();
        writer.initrd(1, 2).unwrap();
        assert_eq!(
            writer.cmdline(b"x").map(|_| ()),
            Err(AtagError::BufferTooSmall {
                needed: 36,
                available: 24
            })
        );
        assert!(writer.finish().is_err());
    }

    #[test]
    fn cmdline_must_be_a_c_string() {
        let mut buf = [0u8; 64];
        let mut writer = TagWriter::new(&mut buf).unwrap();
        assert_eq!(
            writer.cmdline(b"a\0b").map(|_| ()),
            Err(AtagError::CmdlineContainsNul)
        );
    }
}
