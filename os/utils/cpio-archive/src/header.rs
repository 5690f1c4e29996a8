//! # The 110-byte newc header
//!
//! ```text
//! offset  len  field
//!      0    6  magic "070701"
//!      6    8  ino
//!     14    8  mode
//!     22    8  uid
//!     30    8  gid
//!     38    8  nlink
//!     46    8  mtime
//!     54    8  filesize
//!     62    8  devmajor
//!     70    8  devminor
//!     78    8  rdevmajor
//!     86    8  rdevminor
//!     94    8  namesize (including the NUL)
//!    102    8  check
//! ```

use crate::cursor::align4;
use crate::hex::{FIELD_WIDTH, parse_hex, write_hex};
use crate::{CpioError, Mode};

/// Size of a header in bytes.
pub const HEADER_LEN: usize = 110;

/// Magic of the SVR4 format without checksums.
pub const NEWC_MAGIC: &[u8; 6] = b"070701";

/// Name of the record that terminates every archive.
pub const TRAILER_NAME: &[u8] = b"TRAILER!!!";

/// Inode number written into the trailer record.
pub const TRAILER_INO: u32 = 0x0004_94ff;

const MAGIC_LEN: usize = NEWC_MAGIC.len();
const FIELD_COUNT: usize = 13;

const _: () = assert!(MAGIC_LEN + FIELD_COUNT * FIELD_WIDTH == HEADER_LEN);

/// Parsed header fields.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct Header {
    pub ino: u32,
    pub mode: Mode,
    pub uid: u32,
    pub gid: u32,
    pub nlink: u32,
    pub mtime: u32,
    pub filesize: u32,
    pub dev_major: u32,
    pub dev_minor: u32,
    pub rdev_major: u32,
    pub rdev_minor: u32,
    pub namesize: u32,
    pub check: u32,
}

impl Header {
    /// All-zero header carrying only `mode`.
    #[must_use]
    pub const fn with_mode(mode: Mode) -> Self {
        Self {
            ino: 0,
            mode,
            uid: 0,
            gid: 0,
            nlink: 0,
            mtime: 0,
            filesize: 0,
            dev_major: 0,
            dev_minor: 0,
            rdev_major: 0,
            rdev_minor: 0,
            namesize: 0,
            check: 0,
        }
    }

    /// Header of the `TRAILER!!!` record.
    #[must_use]
    pub const fn trailer() -> Self {
        let mut header = Self::with_mode(Mode::trailer());
        header.ino = TRAILER_INO;
        header.nlink = 1;
        header
    }

    /// Parses the header at the start of `bytes`.
    ///
    /// `offset` is only used to make error messages point into the archive.
    ///
    /// # Errors
    /// * [`CpioError::PrematureEnd`] if `bytes` is shorter than a header.
    /// * [`CpioError::BadArchive`] if the magic does not match.
    pub fn parse(bytes: &[u8], offset: usize) -> Result<Self, CpioError> {
        let raw = bytes.get(..HEADER_LEN).ok_or(CpioError::PrematureEnd {
            offset,
            needed: HEADER_LEN,
        })?;
        if !raw.starts_with(NEWC_MAGIC) {
            return Err(CpioError::BadArchive {
                offset,
                reason: "bad magic",
            });
        }

        let field = |index: usize| {
            let start = MAGIC_LEN + index * FIELD_WIDTH;
            parse_hex(&raw[start..start + FIELD_WIDTH])
        };

        Ok(Self {
            ino: field(0),
            mode: Mode::from_bits(field(1)),
            uid: field(2),
            gid: field(3),
            nlink: field(4),
            mtime: field(5),
            filesize: field(6),
            dev_major: field(7),
            dev_minor: field(8),
            rdev_major: field(9),
            rdev_minor: field(10),
            namesize: field(11),
            check: field(12),
        })
    }

    /// Formats the header into the first [`HEADER_LEN`] bytes of `out`.
    ///
    /// # Errors
    /// [`CpioError::BufferTooSmall`] if `out` is shorter than a header.
    pub fn write(&self, out: &mut [u8]) -> Result<(), CpioError> {
        let available = out.len();
        let raw = out
            .get_mut(..HEADER_LEN)
            .ok_or(CpioError::BufferTooSmall {
                needed: HEADER_LEN,
                available,
            })?;

        raw[..MAGIC_LEN].copy_from_slice(NEWC_MAGIC);
        let fields = [
            self.ino,
            self.mode.into_bits(),
            self.uid,
            self.gid,
            self.nlink,
            self.mtime,
            self.filesize,
            self.dev_major,
            self.dev_minor,
            self.rdev_major,
            self.rdev_minor,
            self.namesize,
            self.check,
        ];
        for (value, slot) in fields
            .into_iter()
            .zip(raw[MAGIC_LEN..].chunks_exact_mut(FIELD_WIDTH))
        {
            write_hex(u64::from(value), slot)?;
        }
        Ok(())
    }

    /// Bytes this record occupies, see [`entry_size`].
    #[must_use]
    pub const fn record_size(&self) -> usize {
        entry_size(self.namesize as usize, self.filesize as usize)
    }

    /// Offset of the data relative to the start of the header.
    #[must_use]
    pub const fn data_offset(&self) -> usize {
        align4(HEADER_LEN + self.namesize as usize)
    }
}

/// Bytes one record occupies on disk: the header and name padded to four,
/// followed by the data padded to four.
///
/// `namesize` includes the terminating NUL.
#[must_use]
pub const fn entry_size(namesize: usize, filesize: usize) -> usize {
    align4(HEADER_LEN + namesize) + align4(filesize)
}

/// Converts a host size into a header field value.
pub(crate) fn field_value(value: usize) -> Result<u32, CpioError> {
    u32::try_from(value).map_err(|_| CpioError::FieldOverflow {
        value: value as u64,
        width: FIELD_WIDTH,
    })
}
