//! The `c_mode` header field.

use core::fmt;

/// File mode as stored in the `c_mode` header field.
///
/// ```
/// # use cpio_archive::{FileType, Mode};
/// let mode = Mode::executable();
/// assert_eq!(mode.into_bits(), 0o100_755);
/// assert_eq!(mode.file_type(), FileType::Regular);
/// ```
#[bitfield_struct::bitfield(u32)]
#[derive(PartialEq, Eq)]
pub struct Mode {
    /// `rwxrwxrwx` permission bits.
    #[bits(9)]
    pub permissions: u16,
    /// Sticky, set-group-id and set-user-id bits.
    #[bits(3)]
    pub special: u8,
    #[bits(4)]
    pub file_type: FileType,
    #[bits(16)]
    __: u16,
}

impl Mode {
    /// `0o100644`, a plain regular file.
    #[must_use]
    pub const fn file() -> Self {
        Self::new()
            .with_file_type(FileType::Regular)
            .with_permissions(0o644)
    }

    /// `0o100755`, a regular file everyone may execute.
    #[must_use]
    pub const fn executable() -> Self {
        Self::new()
            .with_file_type(FileType::Regular)
            .with_permissions(0o755)
    }

    /// `0o40755`.
    #[must_use]
    pub const fn directory() -> Self {
        Self::new()
            .with_file_type(FileType::Directory)
            .with_permissions(0o755)
    }

    /// Mode of the end-of-archive marker, `0o644` with no type bits.
    #[must_use]
    pub const fn trailer() -> Self {
        Self::new().with_permissions(0o644)
    }

    #[must_use]
    pub const fn is_directory(self) -> bool {
        matches!(self.file_type(), FileType::Directory)
    }
}

/// The `S_IFMT` part of a mode.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum FileType {
    /// No type bits set, as in the trailer record.
    None,
    Fifo,
    CharDevice,
    Directory,
    BlockDevice,
    Regular,
    Symlink,
    Socket,
    Unknown(u8),
}

impl FileType {
    pub const fn into_bits(self) -> u8 {
        match self {
            Self::None => 0,
            Self::Fifo => 0o01,
            Self::CharDevice => 0o02,
            Self::Directory => 0o04,
            Self::BlockDevice => 0o06,
            Self::Regular => 0o10,
            Self::Symlink => 0o12,
            Self::Socket => 0o14,
            Self::Unknown(bits) => bits,
        }
    }

    pub const fn from_bits(bits: u8) -> Self {
        match bits {
            0 => Self::None,
            0o01 => Self::Fifo,
            0o02 => Self::CharDevice,
            0o04 => Self::Directory,
            0o06 => Self::BlockDevice,
            0o10 => Self::Regular,
            0o12 => Self::Symlink,
            0o14 => Self::Socket,
            other => Self::Unknown(other),
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:06o}", self.into_bits())
    }
}
