//! # Image Sources
//!
//! A boot image is read through a [`Source`]: random access reads plus a total
//! size. Images come from memory, from a file, or straight from a block device.

use crate::platform::StorageError;
use alloc::vec;

/// Sector size of [`BlockDevice`]s.
pub const SECTOR_SIZE: u64 = 512;

#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SourceError {
    #[error("Read of {len} bytes at {offset} exceeds source size {size}")]
    PrematureEnd { offset: u64, len: u64, size: u64 },
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Random access byte source.
pub trait Source {
    /// Total size in bytes.
    fn size(&self) -> u64;

    /// Fills `buf` with the bytes at `offset`.
    ///
    /// # Errors
    /// [`SourceError::PrematureEnd`] if the read extends past [`Source::size`].
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<(), SourceError>;
}

fn check_bounds(offset: u64, len: usize, size: u64) -> Result<(), SourceError> {
    let len = len as u64;
    match offset.checked_add(len) {
        Some(end) if end <= size => Ok(()),
        _ => Err(SourceError::PrematureEnd { offset, len, size }),
    }
}

/// A source over bytes already in memory.
pub struct MemorySource<'a> {
    bytes: &'a [u8],
}

impl<'a> MemorySource<'a> {
    #[must_use]
    pub const fn new(bytes: &'a [u8]) -> Self {
        Self { bytes }
    }
}

impl Source for MemorySource<'_> {
    fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    #[allow(clippy::cast_possible_truncation)]
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<(), SourceError> {
        check_bounds(offset, buf.len(), self.size())?;
        let start = offset as usize;
        buf.copy_from_slice(&self.bytes[start..start + buf.len()]);
        Ok(())
    }
}

/// Sector addressed device.
pub trait BlockDevice {
    /// Number of [`SECTOR_SIZE`] byte sectors.
    fn sector_count(&self) -> u64;

    /// Reads whole sectors starting at `lba`; `buf.len()` is a multiple of [`SECTOR_SIZE`].
    ///
    /// # Errors
    /// An I/O error from the device.
    fn read_sectors(&mut self, lba: u64, buf: &mut [u8]) -> Result<(), StorageError>;
}

/// A source reading an image written raw onto a block device.
pub struct DiskSource<D> {
    device: D,
}

impl<D: BlockDevice> DiskSource<D> {
    pub const fn new(device: D) -> Self {
        Self { device }
    }
}

impl<D: BlockDevice> Source for DiskSource<D> {
    fn size(&self) -> u64 {
        self.device.sector_count().saturating_mul(SECTOR_SIZE)
    }

    #[allow(clippy::cast_possible_truncation)]
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<(), SourceError> {
        check_bounds(offset, buf.len(), self.size())?;
        if buf.is_empty() {
            return Ok(());
        }

        let first = offset / SECTOR_SIZE;
        let skip = (offset % SECTOR_SIZE) as usize;
        let span = (skip + buf.len()).div_ceil(SECTOR_SIZE as usize) * SECTOR_SIZE as usize;

        let mut sectors = vec![0u8; span];
        self.device.read_sectors(first, &mut sectors)?;
        buf.copy_from_slice(&sectors[skip..skip + buf.len()]);
        Ok(())
    }
}

/// Seekable file handle.
pub trait FileReader {
    fn len(&self) -> u64;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Reads up to `buf.len()` bytes at `offset` and returns how many were read.
    ///
    /// # Errors
    /// An I/O error from the filesystem.
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<usize, StorageError>;
}

/// A source over an image file.
pub struct FileSource<F> {
    file: F,
}

impl<F: FileReader> FileSource<F> {
    pub const fn new(file: F) -> Self {
        Self { file }
    }
}

impl<F: FileReader> Source for FileSource<F> {
    fn size(&self) -> u64 {
        self.file.len()
    }

    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<(), SourceError> {
        check_bounds(offset, buf.len(), self.size())?;

        let mut done = 0;
        while done < buf.len() {
            let read = self.file.read_at(offset + done as u64, &mut buf[done..])?;
            if read == 0 {
                return Err(SourceError::PrematureEnd {
                    offset: offset + done as u64,
                    len: (buf.len() - done) as u64,
                    size: self.size(),
                });
            }
            done += read;
        }
        Ok(())
    }
}

/// Where the image named on the command line lives.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ImageLocation<'a> {
    /// `(device)`: the image is written raw to the device.
    Disk(&'a str),
    /// Anything else is a file path.
    File(&'a str),
}

impl<'a> ImageLocation<'a> {
    /// Classifies an image argument.
    ///
    /// Returns `None` for an empty argument or an empty device name.
    #[must_use]
    pub fn parse(arg: &'a str) -> Option<Self> {
        if arg.is_empty() {
            return None;
        }
        match arg.strip_prefix('(').and_then(|rest| rest.strip_suffix(')')) {
            Some("") => None,
            Some(device) => Some(Self::Disk(device)),
            None => Some(Self::File(arg)),
        }
    }
}
