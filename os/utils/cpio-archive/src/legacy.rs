//! # Table codec
//!
//! Decodes a complete archive into an [`Archive`] of entries and writes a
//! complete archive back out. Used when a ramdisk is rebuilt from scratch.

use alloc::vec::Vec;

use crate::cursor::{ReadCursor, WriteCursor, align4};
use crate::entry::Entry;
use crate::header::{HEADER_LEN, Header, TRAILER_NAME, entry_size};
use crate::CpioError;

/// Entry limit used by [`Archive::decode`] callers that have no better idea.
pub const DEFAULT_MAX_ENTRIES: usize = 4096;

/// Ordered table of archive members.
///
/// The trailer is never part of the table; it is produced by
/// [`Archive::encode`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Archive<'a> {
    entries: Vec<Entry<'a>>,
    max_entries: usize,
}

impl<'a> Archive<'a> {
    /// Empty table holding at most `max_entries` entries.
    #[must_use]
    pub const fn new(max_entries: usize) -> Self {
        Self {
            entries: Vec::new(),
            max_entries,
        }
    }

    /// Decodes every entry in `buf` up to the trailer.
    ///
    /// Decoding also ends when the buffer is exhausted without a trailer. An
    /// entry whose name or data runs past the end of `buf` is an error.
    ///
    /// # Errors
    /// * [`CpioError::BadArchive`] for a wrong magic or a `namesize` below 2.
    /// * [`CpioError::PrematureEnd`] for a truncated entry.
    /// * [`CpioError::TooManyEntries`] when `max_entries` is exceeded.
    pub fn decode(buf: &'a [u8], max_entries: usize) -> Result<Self, CpioError> {
        let mut archive = Self::new(max_entries);
        let mut cursor = ReadCursor::new(buf);

        while !cursor.is_at_end() {
            let offset = cursor.position();
            let header = Header::parse(cursor.take(HEADER_LEN)?, offset)?;
            let namesize = header.namesize as usize;
            if namesize < 2 {
                return Err(CpioError::BadArchive {
                    offset,
                    reason: "name size below 2",
                });
            }

            let name = cursor.take(namesize)?;
            let name = &name[..namesize - 1];
            cursor.skip(align4(HEADER_LEN + namesize) - HEADER_LEN - namesize)?;

            if name == TRAILER_NAME {
                break;
            }

            let filesize = header.filesize as usize;
            let data = cursor.take(filesize)?;
            cursor.skip(align4(filesize) - filesize)?;

            archive.push(Entry::decoded(header, name, data))?;
        }

        Ok(archive)
    }

    /// Appends an entry.
    ///
    /// # Errors
    /// [`CpioError::TooManyEntries`] when the table is full.
    pub fn push(&mut self, entry: Entry<'a>) -> Result<(), CpioError> {
        if self.entries.len() >= self.max_entries {
            return Err(CpioError::TooManyEntries {
                limit: self.max_entries,
            });
        }
        self.entries.push(entry);
        Ok(())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn entries(&self) -> &[Entry<'a>] {
        &self.entries
    }

    pub fn entries_mut(&mut self) -> &mut [Entry<'a>] {
        &mut self.entries
    }

    #[must_use]
    pub fn into_entries(self) -> Vec<Entry<'a>> {
        self.entries
    }

    /// First entry that is not skipped and has exactly `name`.
    #[must_use]
    pub fn find(&self, name: &[u8]) -> Option<&Entry<'a>> {
        self.entries
            .iter()
            .find(|entry| !entry.is_skipped() && entry.name() == name)
    }

    /// Marks every entry called `name` as skipped and returns how many were.
    pub fn skip(&mut self, name: &[u8]) -> usize {
        let mut count = 0;
        for entry in self
            .entries
            .iter_mut()
            .filter(|entry| !entry.is_skipped() && entry.name() == name)
        {
            entry.set_skipped(true);
            count += 1;
        }
        count
    }

    /// Exact number of bytes [`Archive::encode`] writes, trailer included.
    #[must_use]
    pub fn encoded_len(&self) -> usize {
        self.entries
            .iter()
            .filter(|entry| !entry.is_skipped())
            .map(Entry::encoded_len)
            .sum::<usize>()
            + entry_size(TRAILER_NAME.len() + 1, 0)
    }

    /// Writes all entries that are not skipped, followed by the trailer.
    ///
    /// Returns the number of bytes written.
    ///
    /// # Errors
    /// * [`CpioError::BufferTooSmall`] if an entry does not fit into `dest`.
    /// * [`CpioError::EmptyName`] / [`CpioError::FieldOverflow`] for entries
    ///   that cannot be represented.
    pub fn encode(&self, dest: &mut [u8]) -> Result<usize, CpioError> {
        let mut out = WriteCursor::new(dest);

        for entry in self.entries.iter().filter(|entry| !entry.is_skipped()) {
            write_record(&mut out, &entry.header()?, entry.name(), entry.data())?;
        }

        let mut trailer = Header::trailer();
        trailer.namesize = crate::header::field_value(TRAILER_NAME.len() + 1)?;
        write_record(&mut out, &trailer, TRAILER_NAME, &[])?;

        Ok(out.position())
    }
}

/// Writes one header, name and data with their padding.
///
/// The full record size is reserved up front so a record is never written
/// partially.
pub(crate) fn write_record(
    out: &mut WriteCursor<'_>,
    header: &Header,
    name: &[u8],
    data: &[u8],
) -> Result<(), CpioError> {
    out.reserve(header.record_size())?;
    header.write(out.slot(HEADER_LEN)?)?;
    out.put(name)?;
    out.put(&[0])?;
    out.pad()?;
    out.put(data)?;
    out.pad()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Mode;

    fn sample() -> Archive<'static> {
        let mut archive = Archive::new(8);
        archive.push(Entry::file(&b"hello"[..], &b"world"[..])).unwrap();
        archive.push(Entry::directory(&b"etc"[..])).unwrap();
        archive
            .push(Entry::executable(&b"etc/run.sh"[..], &b"#!/bin/sh\n"[..]))
            .unwrap();
        archive
    }

    fn encode(archive: &Archive<'_>) -> Vec<u8> {
        let mut buf = vec![0u8; archive.encoded_len()];
        let written = archive.encode(&mut buf).unwrap();
        assert_eq!(written, buf.len());
        buf
    }

    #[test]
    fn decode_restores_names_data_and_order() {
        let bytes = encode(&sample());
        let decoded = Archive::decode(&bytes, 8).unwrap();

        let names: Vec<&[u8]> = decoded.entries().iter().map(Entry::name).collect();
        assert_eq!(names, [&b"hello"[..], b"etc", b"etc/run.sh"]);
        assert_eq!(decoded.entries()[0].data(), b"world");
        assert_eq!(decoded.entries()[2].data(), b"#!/bin/sh\n");
        assert!(decoded.entries()[1].mode().is_directory());
        assert_eq!(decoded.entries()[2].mode(), Mode::executable());
    }

    #[test]
    fn names_and_data_start_on_four_byte_boundaries() {
        let bytes = encode(&sample());
        let mut offset = 0;
        loop {
            let header = Header::parse(&bytes[offset..], offset).unwrap();
            let data_start = offset + header.data_offset();
            assert_eq!(data_start % 4, 0);
            assert!(
                bytes[offset + HEADER_LEN + header.namesize as usize..data_start]
                    .iter()
                    .all(|&b| b == 0)
            );
            offset += header.record_size();
            assert_eq!(offset % 4, 0);
            if &bytes[offset - header.record_size() + HEADER_LEN..][..10] == TRAILER_NAME {
                break;
            }
        }
        assert_eq!(offset, bytes.len());
    }

    #[test]
    fn skipped_entries_are_not_written() {
        let mut archive = sample();
        assert_eq!(archive.skip(b"etc"), 1);
        assert!(archive.find(b"etc").is_none());
        let bytes = encode(&archive);
        let decoded = Archive::decode(&bytes, 8).unwrap();
        assert_eq!(decoded.len(), 2);
        assert!(decoded.find(b"etc/run.sh").is_some());
    }

    #[test]
    fn trailer_only_archive_is_empty() {
        let bytes = encode(&Archive::new(1));
        assert_eq!(bytes.len(), 124);
        assert!(Archive::decode(&bytes, 1).unwrap().is_empty());
    }

    #[test]
    fn tiny_names_are_rejected() {
        let mut bytes = encode(&sample());
        // namesize field of the first header: "00000006" -> "00000001"
        bytes[94..102].copy_from_slice(b"00000001");
        assert_eq!(
            Archive::decode(&bytes, 8),
            Err(CpioError::BadArchive {
                offset: 0,
                reason: "name size below 2"
            })
        );
    }

    #[test]
    fn truncated_data_is_reported() {
        let bytes = encode(&sample());
        let err = Archive::decode(&bytes[..HEADER_LEN + 8], 8).unwrap_err();
        assert!(matches!(err, CpioError::PrematureEnd { .. }));
    }

    #[test]
    fn decoding_without_trailer_stops_at_buffer_end() {
        let bytes = encode(&sample());
        let first = Header::parse(&bytes, 0).unwrap().record_size();
        let decoded = Archive::decode(&bytes[..first], 8).unwrap();
        assert_eq!(decoded.len(), 1);
    }

    #[test]
    fn table_bound_is_enforced() {
        let bytes = encode(&sample());
        assert_eq!(
            Archive::decode(&bytes, 2),
            Err(CpioError::TooManyEntries { limit: 2 })
        );

        let mut archive = Archive::new(0);
        assert!(archive.push(Entry::directory(&b"x"[..])).is_err());
    }

    #[test]
    fn encode_refuses_a_short_destination() {
        let archive = sample();
        let mut buf = vec![0u8; archive.encoded_len() - 1];
        assert!(matches!(
            archive.encode(&mut buf),
            Err(CpioError::BufferTooSmall { .. })
        ));
    }

    #[test]
    fn tolerant_size_fields_are_accepted() {
        let mut bytes = encode(&sample());
        // filesize of "hello" is 5; write it as " 5x" padded with blanks
        bytes[54..62].copy_from_slice(b"  5x    ");
        let decoded = Archive::decode(&bytes, 8).unwrap();
        assert_eq!(decoded.entries()[0].data(), b"world");
    }
}
