use alloc::vec;
use alloc::vec::Vec;
use boot_addresses::{PageSize, PhysicalAddress};

use crate::BootImageError;

/// Magic signature at the start of every boot image.
pub const BOOT_MAGIC: &[u8; 8] = b"ANDROID!";

pub const NAME_LEN: usize = 16;
pub const CMDLINE_LEN: usize = 512;
pub const ID_LEN: usize = 8;
pub const EXTRA_CMDLINE_LEN: usize = 1024;

/// Size of the classic header.
pub const HEADER_LEN: usize = 608;

/// Size of the header including the extra command line.
pub const HEADER_WITH_EXTRA_LEN: usize = HEADER_LEN + EXTRA_CMDLINE_LEN;

const NAME_OFF: usize = 48;
const CMDLINE_OFF: usize = NAME_OFF + NAME_LEN;
const ID_OFF: usize = CMDLINE_OFF + CMDLINE_LEN;

const _: () = assert!(ID_OFF + ID_LEN * 4 == HEADER_LEN);

/// Size and requested load address of one image segment.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct Segment {
    pub size: u32,
    pub addr: PhysicalAddress,
}

impl Segment {
    #[must_use]
    pub const fn new(size: u32, addr: u32) -> Self {
        Self {
            size,
            addr: PhysicalAddress::new(addr as u64),
        }
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.size == 0
    }
}

/// Decoded boot image header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootImageHeader {
    pub kernel: Segment,
    pub ramdisk: Segment,
    pub second: Segment,
    pub tags_addr: PhysicalAddress,
    pub page_size: PageSize,
    pub dt_size: u32,
    pub name: [u8; NAME_LEN],
    pub cmdline: [u8; CMDLINE_LEN],
    pub id: [u32; ID_LEN],
    /// Only present in images built with the extended header.
    pub extra_cmdline: Option<[u8; EXTRA_CMDLINE_LEN]>,
}

#[inline]
fn read_u32_le(buf: &[u8], off: usize) -> Result<u32, BootImageError> {
    let end = off.checked_add(4).ok_or(BootImageError::TooShort(buf.len()))?;
    let s = buf.get(off..end).ok_or(BootImageError::TooShort(buf.len()))?;
    Ok(u32::from_le_bytes([s[0], s[1], s[2], s[3]]))
}

#[inline]
fn write_u32_le(buf: &mut [u8], off: usize, value: u32) {
    buf[off..off + 4].copy_from_slice(&value.to_le_bytes());
}

fn header_u32(addr: PhysicalAddress) -> Result<u32, BootImageError> {
    u32::try_from(addr.as_u64()).map_err(|_| BootImageError::AddressOverflow(addr.as_u64()))
}

/// Bytes of `field` up to the first NUL.
fn c_str(field: &[u8]) -> &[u8] {
    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    &field[..end]
}

impl BootImageHeader {
    /// Header with empty segments and the given page size.
    #[must_use]
    pub const fn new(page_size: PageSize) -> Self {
        Self {
            kernel: Segment::new(0, 0),
            ramdisk: Segment::new(0, 0),
            second: Segment::new(0, 0),
            tags_addr: PhysicalAddress::zero(),
            page_size,
            dt_size: 0,
            name: [0; NAME_LEN],
            cmdline: [0; CMDLINE_LEN],
            id: [0; ID_LEN],
            extra_cmdline: None,
        }
    }

    /// Parses a header from the first bytes of an image.
    ///
    /// Pass at least [`HEADER_WITH_EXTRA_LEN`] bytes, when available, to pick
    /// up the extra command line.
    ///
    /// # Errors
    /// * [`BootImageError::TooShort`] if fewer than [`HEADER_LEN`] bytes are given.
    /// * [`BootImageError::InvalidMagic`] if the image does not start with [`BOOT_MAGIC`].
    /// * [`BootImageError::InvalidPageSize`] for a zero or non power of two page size.
    pub fn parse(bytes: &[u8]) -> Result<Self, BootImageError> {
        let magic = bytes
            .get(..BOOT_MAGIC.len())
            .ok_or(BootImageError::TooShort(bytes.len()))?;
        if magic != BOOT_MAGIC {
            return Err(BootImageError::InvalidMagic);
        }
        if bytes.len() < HEADER_LEN {
            return Err(BootImageError::TooShort(bytes.len()));
        }

        let page_size = read_u32_le(bytes, 36)?;
        let page_size =
            PageSize::new(u64::from(page_size)).ok_or(BootImageError::InvalidPageSize(page_size))?;

        let mut name = [0; NAME_LEN];
        name.copy_from_slice(&bytes[NAME_OFF..CMDLINE_OFF]);
        let mut cmdline = [0; CMDLINE_LEN];
        cmdline.copy_from_slice(&bytes[CMDLINE_OFF..ID_OFF]);
        let mut id = [0; ID_LEN];
        for (i, slot) in id.iter_mut().enumerate() {
            *slot = read_u32_le(bytes, ID_OFF + i * 4)?;
        }

        let extra_cmdline = bytes.get(HEADER_LEN..HEADER_WITH_EXTRA_LEN).map(|raw| {
            let mut extra = [0; EXTRA_CMDLINE_LEN];
            extra.copy_from_slice(raw);
            extra
        });

        Ok(Self {
            kernel: Segment::new(read_u32_le(bytes, 8)?, read_u32_le(bytes, 12)?),
            ramdisk: Segment::new(read_u32_le(bytes, 16)?, read_u32_le(bytes, 20)?),
            second: Segment::new(read_u32_le(bytes, 24)?, read_u32_le(bytes, 28)?),
            tags_addr: PhysicalAddress::from(read_u32_le(bytes, 32)?),
            page_size,
            dt_size: read_u32_le(bytes, 40)?,
            name,
            cmdline,
            id,
            extra_cmdline,
        })
    }

    /// Number of bytes [`BootImageHeader::write`] produces.
    #[must_use]
    pub const fn encoded_len(&self) -> usize {
        if self.extra_cmdline.is_some() {
            HEADER_WITH_EXTRA_LEN
        } else {
            HEADER_LEN
        }
    }

    /// Serializes the header into `out` and returns the number of bytes written.
    ///
    /// # Errors
    /// * [`BootImageError::BufferTooSmall`] if `out` cannot hold the header.
    /// * [`BootImageError::AddressOverflow`] for addresses above 4 GiB.
    pub fn write(&self, out: &mut [u8]) -> Result<usize, BootImageError> {
        let len = self.encoded_len();
        if out.len() < len {
            return Err(BootImageError::BufferTooSmall {
                needed: len,
                available: out.len(),
            });
        }
        let page_size = u32::try_from(self.page_size.get())
            .map_err(|_| BootImageError::AddressOverflow(self.page_size.get()))?;

        out[..BOOT_MAGIC.len()].copy_from_slice(BOOT_MAGIC);
        write_u32_le(out, 8, self.kernel.size);
        write_u32_le(out, 12, header_u32(self.kernel.addr)?);
        write_u32_le(out, 16, self.ramdisk.size);
        write_u32_le(out, 20, header_u32(self.ramdisk.addr)?);
        write_u32_le(out, 24, self.second.size);
        write_u32_le(out, 28, header_u32(self.second.addr)?);
        write_u32_le(out, 32, header_u32(self.tags_addr)?);
        write_u32_le(out, 36, page_size);
        write_u32_le(out, 40, self.dt_size);
        write_u32_le(out, 44, 0);
        out[NAME_OFF..CMDLINE_OFF].copy_from_slice(&self.name);
        out[CMDLINE_OFF..ID_OFF].copy_from_slice(&self.cmdline);
        for (i, word) in self.id.iter().enumerate() {
            write_u32_le(out, ID_OFF + i * 4, *word);
        }
        if let Some(extra) = &self.extra_cmdline {
            out[HEADER_LEN..HEADER_WITH_EXTRA_LEN].copy_from_slice(extra);
        }
        Ok(len)
    }

    /// Serializes the header into a buffer of exactly [`BootImageHeader::encoded_len`] bytes.
    ///
    /// # Errors
    /// [`BootImageError::AddressOverflow`] for addresses above 4 GiB.
    pub fn to_bytes(&self) -> Result<Vec<u8>, BootImageError> {
        let mut out = vec![0; self.encoded_len()];
        self.write(&mut out)?;
        Ok(out)
    }

    /// Product name without trailing NULs.
    #[must_use]
    pub fn name(&self) -> &[u8] {
        c_str(&self.name)
    }

    /// Command line from the classic header field, without the terminator.
    #[must_use]
    pub fn cmdline(&self) -> &[u8] {
        c_str(&self.cmdline)
    }

    /// Continuation of the command line, empty when absent.
    #[must_use]
    pub fn extra_cmdline(&self) -> &[u8] {
        self.extra_cmdline.as_ref().map_or(&[][..], |extra| c_str(extra))
    }

    /// Stores `cmdline`, spilling into the extra command line if it does not
    /// fit the classic field. Both fields keep a terminating NUL.
    ///
    /// # Errors
    /// [`BootImageError::CmdlineTooLong`] if even both fields are too small.
    pub fn set_cmdline(&mut self, cmdline: &[u8]) -> Result<(), BootImageError> {
        const HEAD: usize = CMDLINE_LEN - 1;
        const MAX: usize = HEAD + EXTRA_CMDLINE_LEN - 1;
        if cmdline.len() > MAX {
            return Err(BootImageError::CmdlineTooLong {
                len: cmdline.len(),
                max: MAX,
            });
        }

        let (head, tail) = cmdline.split_at(cmdline.len().min(HEAD));
        self.cmdline = [0; CMDLINE_LEN];
        self.cmdline[..head.len()].copy_from_slice(head);
        if !tail.is_empty() {
            let mut extra = [0; EXTRA_CMDLINE_LEN];
            extra[..tail.len()].copy_from_slice(tail);
            self.extra_cmdline = Some(extra);
        } else if let Some(extra) = &mut self.extra_cmdline {
            extra.fill(0);
        }
        Ok(())
    }

    /// Stores the product name, truncated to fit its field with a NUL.
    pub fn set_name(&mut self, name: &[u8]) {
        let len = name.len().min(NAME_LEN - 1);
        self.name = [0; NAME_LEN];
        self.name[..len].copy_from_slice(&name[..len]);
    }
}
