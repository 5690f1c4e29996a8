use core::iter::FusedIterator;

use crate::AtagError;
use crate::atags::{
    ATAG_CMDLINE, ATAG_CORE, ATAG_INITRD2, ATAG_MEM, ATAG_NONE, CoreFlags, TagCore,
};

/// One decoded record.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Atag<'a> {
    /// Core record; `None` when it carries no root device.
    Core(Option<TagCore>),
    Mem { start: u32, size: u32 },
    Initrd { start: u32, size: u32 },
    /// Command line without the terminator.
    Cmdline(&'a [u8]),
    Unknown { tag: u32, payload: &'a [u8] },
}

/// Iterator over the records of a tag list, ending after `ATAG_NONE`.
///
/// Each step moves `size` words forward, exactly as a kernel does.
#[derive(Debug, Clone)]
pub struct Tags<'a> {
    buf: &'a [u8],
    pos: usize,
    done: bool,
}

impl<'a> Tags<'a> {
    #[must_use]
    pub const fn new(buf: &'a [u8]) -> Self {
        Self {
            buf,
            pos: 0,
            done: false,
        }
    }

    fn word(&self, off: usize) -> Option<u32> {
        let s = self.buf.get(off..off.checked_add(4)?)?;
        Some(u32::from_le_bytes([s[0], s[1], s[2], s[3]]))
    }

    fn step(&mut self) -> Result<Option<Atag<'a>>, AtagError> {
        let offset = self.pos;
        let (Some(size), Some(tag)) = (self.word(offset), self.word(offset + 4)) else {
            return Err(AtagError::Unterminated { offset });
        };

        if tag == ATAG_NONE {
            return if size == 0 {
                Ok(None)
            } else {
                Err(AtagError::BadSize { offset, size })
            };
        }

        let len = (size as usize) * 4;
        if size < 2 {
            return Err(AtagError::BadSize { offset, size });
        }
        let payload = self
            .buf
            .get(offset + 8..offset + len)
            .ok_or(AtagError::Unterminated { offset })?;
        self.pos = offset + len;

        let word = |i: usize| {
            let s = &payload[i * 4..i * 4 + 4];
            u32::from_le_bytes([s[0], s[1], s[2], s[3]])
        };

        Ok(Some(match (tag, payload.len()) {
            (ATAG_CORE, 0) => Atag::Core(None),
            (ATAG_CORE, 12..) => Atag::Core(Some(TagCore {
                flags: CoreFlags::from_bits(word(0)),
                page_size: word(1),
                root_dev: word(2),
            })),
            (ATAG_MEM, 8..) => Atag::Mem {
                size: word(0),
                start: word(1),
            },
            (ATAG_INITRD2, 8..) => Atag::Initrd {
                start: word(0),
                size: word(1),
            },
            (ATAG_CMDLINE, _) => {
                let end = payload.iter().position(|&b| b == 0).unwrap_or(payload.len());
                Atag::Cmdline(&payload[..end])
            }
            _ => Atag::Unknown { tag, payload },
        }))
    }
}

impl<'a> Iterator for Tags<'a> {
    type Item = Result<Atag<'a>, AtagError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.step() {
            Ok(Some(tag)) => Some(Ok(tag)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

impl FusedIterator for Tags<'_> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TagWriter;

    #[test]
    fn walks_what_the_writer_wrote() {
        let mut buf = [0u8; 128];
        let mut writer = TagWriter::new(&mut buf).unwrap();
        writer
            .initrd(0x1100_0000, 999)
            .unwrap()
            .memory(0x1000_0000, 0x1000)
            .unwrap()
            .memory(0x2000_0000, 0x2000)
            .unwrap()
            .cmdline(b"console=ttyS0")
            .unwrap();
        let len = writer.finish().unwrap();

        let tags: Vec<_> = Tags::new(&buf[..len]).collect::<Result<_, _>>().unwrap();
        assert_eq!(
            tags,
            [
                Atag::Core(None),
                Atag::Initrd {
                    start: 0x1100_0000,
                    size: 999
                },
                Atag::Mem {
                    start: 0x1000_0000,
                    size: 0x1000
                },
                Atag::Mem {
                    start: 0x2000_0000,
                    size: 0x2000
                },
                Atag::Cmdline(b"console=ttyS0"),
            ]
        );
    }

    #[test]
    fn missing_sentinel_is_reported() {
        let mut buf = [0u8; 64];
        let mut writer = TagWriter::new(&mut buf).unwrap();
        writer.initrd(1, 2).unwrap();
        let end = writer.position();

        let mut tags = Tags::new(&buf[..end]);
        assert_eq!(tags.next(), Some(Ok(Atag::Core(None))));
        assert!(matches!(tags.next(), Some(Ok(Atag::Initrd { .. }))));
        assert_eq!(tags.next(), Some(Err(AtagError::Unterminated { offset: 24 })));
        assert_eq!(tags.next(), None);
    }

    #[test]
    fn zero_sized_records_other_than_the_sentinel_are_rejected() {
        let mut buf = [0u8; 16];
        buf[4..8].copy_from_slice(&ATAG_MEM.to_le_bytes());
        let mut tags = Tags::new(&buf);
        assert_eq!(
            tags.next(),
            Some(Err(AtagError::BadSize { offset: 0, size: 0 }))
        );
    }
}
