//! # cpio archives for boot ramdisks
//!
//! Reads and writes the SVR4 "newc" cpio format used by Linux initramfs and
//! Android boot image ramdisks. Two codecs share one header model:
//!
//! * [`Archive`] decodes a whole archive into a table of [`Entry`] values that
//!   can be edited (added, renamed, soft-deleted) and written out again.
//! * [`newc::Appender`] walks an archive to its trailer and appends records in
//!   place, for ramdisks that only grow.
//!
//! ```
//! # use cpio_archive::{Archive, Entry};
//! let mut archive = Archive::new(16);
//! archive.push(Entry::file(&b"hello"[..], &b"world"[..])).unwrap();
//!
//! let mut buf = vec![0u8; archive.encoded_len()];
//! let len = archive.encode(&mut buf).unwrap();
//!
//! let decoded = Archive::decode(&buf[..len], 16).unwrap();
//! assert_eq!(decoded.entries()[0].data(), b"world");
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]
extern crate alloc;

pub mod cursor;
mod entry;
pub mod header;
pub mod hex;
mod legacy;
mod mode;
#[cfg(feature = "newc")]
pub mod newc;

pub use entry::{Entry, EntryKind};
pub use header::{HEADER_LEN, Header, TRAILER_NAME, entry_size};
pub use legacy::{Archive, DEFAULT_MAX_ENTRIES};
pub use mode::{FileType, Mode};

/// Bytes an entry called `name` holding `data_len` bytes occupies on disk.
#[must_use]
pub const fn predicted_size(name: &[u8], data_len: usize) -> usize {
    entry_size(name.len() + 1, data_len)
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CpioError {
    #[error("Malformed archive at offset {offset}: {reason}")]
    BadArchive { offset: usize, reason: &'static str },
    #[error("Archive ends at offset {offset}, {needed} more bytes were expected")]
    PrematureEnd { offset: usize, needed: usize },
    #[error("Destination too small: {needed} bytes needed, {available} available")]
    BufferTooSmall { needed: usize, available: usize },
    #[error("Value {value:#x} does not fit into a {width} digit header field")]
    FieldOverflow { value: u64, width: usize },
    #[error("Archive has more than {limit} entries")]
    TooManyEntries { limit: usize },
    #[error("Archive has no trailer record")]
    MissingTrailer,
    #[error("Entry names must not be empty")]
    EmptyName,
}
