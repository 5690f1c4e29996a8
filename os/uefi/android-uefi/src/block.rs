//! Raw block devices.
//!
//! Whole-media devices are named in firmware handle order: optical media
//! (2048 byte blocks) as `cd0`, `cd1`, ... and everything else as `hd0`,
//! `hd1`, ... Partitions are not addressable.

use alloc::format;
use alloc::string::String;
use alloc::vec;
use alloc::vec::Vec;
use android_loader::source::SECTOR_SIZE;
use android_loader::{BlockDevice, StorageError};
use log::debug;
use uefi::boot::{self, OpenProtocolAttributes, OpenProtocolParams, ScopedProtocol};
use uefi::proto::media::block::{BlockIO, Lba};
use uefi::{Handle, Status};

const OPTICAL_BLOCK_SIZE: u32 = 2048;

pub struct UefiBlockDevice {
    io: ScopedProtocol<BlockIO>,
    media_id: u32,
    block_size: u64,
    blocks: u64,
}

fn open_shared(handle: Handle) -> uefi::Result<ScopedProtocol<BlockIO>> {
    // SAFETY: the protocol is only read from, and the file system driver
    // bound to the same handle keeps working alongside it.
    unsafe {
        boot::open_protocol::<BlockIO>(
            OpenProtocolParams {
                handle,
                agent: boot::image_handle(),
                controller: None,
            },
            OpenProtocolAttributes::GetProtocol,
        )
    }
}

impl UefiBlockDevice {
    /// Opens the whole-media device called `name`.
    ///
    /// # Errors
    /// [`StorageError::NotFound`] if there is no such device.
    pub fn open(name: &str) -> Result<Self, StorageError> {
        let handles = boot::find_handles::<BlockIO>().map_err(|_| StorageError::NotFound)?;
        let (mut disks, mut optical) = (0usize, 0usize);

        for handle in handles {
            let Ok(io) = open_shared(handle) else {
                continue;
            };
            let media = io.media();
            if media.is_logical_partition() || !media.is_media_present() {
                continue;
            }

            let device: String = if media.block_size() == OPTICAL_BLOCK_SIZE {
                optical += 1;
                format!("cd{}", optical - 1)
            } else {
                disks += 1;
                format!("hd{}", disks - 1)
            };
            if device == name {
                return Ok(Self::new(io));
            }
        }
        Err(StorageError::NotFound)
    }

    fn new(io: ScopedProtocol<BlockIO>) -> Self {
        let media = io.media();
        let block_size = u64::from(media.block_size());
        let blocks = media.last_block().saturating_add(1);
        let media_id = media.media_id();
        debug!("Block device: {blocks} blocks of {block_size} bytes");
        Self {
            io,
            media_id,
            block_size,
            blocks,
        }
    }

    fn read_blocks(&self, first: Lba, buf: &mut [u8]) -> Result<(), StorageError> {
        self.io
            .read_blocks(self.media_id, first, buf)
            .map_err(|e| match e.status() {
                Status::NO_MEDIA | Status::MEDIA_CHANGED => StorageError::NotFound,
                _ => StorageError::Io("block read"),
            })
    }

    /// Reads the whole medium.
    ///
    /// # Errors
    /// An I/O error, or [`StorageError::Io`] if the medium does not fit into memory.
    pub fn read_all(&mut self) -> Result<Vec<u8>, StorageError> {
        let len = self
            .blocks
            .checked_mul(self.block_size)
            .and_then(|len| usize::try_from(len).ok())
            .ok_or(StorageError::Io("medium too large"))?;
        let mut data = vec![0u8; len];
        self.read_blocks(0, &mut data)?;
        Ok(data)
    }
}

impl BlockDevice for UefiBlockDevice {
    fn sector_count(&self) -> u64 {
        self.blocks.saturating_mul(self.block_size) / SECTOR_SIZE
    }

    #[allow(clippy::cast_possible_truncation)]
    fn read_sectors(&mut self, lba: u64, buf: &mut [u8]) -> Result<(), StorageError> {
        let offset = lba * SECTOR_SIZE;
        let first = offset / self.block_size;
        let skip = (offset % self.block_size) as usize;
        let block = self.block_size as usize;

        if skip == 0 && buf.len() % block == 0 {
            return self.read_blocks(first, buf);
        }

        let mut blocks = vec![0u8; (skip + buf.len()).div_ceil(block) * block];
        self.read_blocks(first, &mut blocks)?;
        buf.copy_from_slice(&blocks[skip..skip + buf.len()]);
        Ok(())
    }
}
