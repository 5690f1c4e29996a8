use crate::plan::PlanError;
use crate::platform::FirmwareError;
use crate::ramdisk::PatchError;
use crate::source::SourceError;
use boot_addresses::PhysicalAddress;
use boot_protocol::AtagError;
use bootimg::BootImageError;
use cpio_archive::CpioError;

/// Why a boot image could not be loaded or started.
#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LoaderError {
    #[error("Bad argument: {0}")]
    BadArgument(&'static str),
    #[error("Invalid magic in boot image header")]
    InvalidMagic,
    #[error("Invalid boot image header")]
    InvalidHeader(#[source] BootImageError),
    #[error("Malformed cpio archive")]
    BadArchive(#[source] CpioError),
    #[error("Premature end of {what}")]
    PrematureEnd {
        what: &'static str,
        #[source]
        source: SourceError,
    },
    #[error("Unable to read the {what}")]
    Read {
        what: &'static str,
        #[source]
        source: SourceError,
    },
    #[error("Buffer too small: {needed} bytes needed, {available} available")]
    BufferTooSmall { needed: u64, available: u64 },
    #[error("Allocation of the {what} failed")]
    AllocationFailure {
        what: &'static str,
        #[source]
        source: FirmwareError,
    },
    #[error("Invalid ramdisk address {address}, must not be below {minimum}")]
    InvalidRamdiskAddress {
        address: PhysicalAddress,
        minimum: PhysicalAddress,
    },
    #[error("Invalid address {address} for the {what}")]
    InvalidAddress {
        what: &'static str,
        address: PhysicalAddress,
    },
    #[error("Invalid ramdisk format")]
    InvalidRamdiskFormat(#[source] CpioError),
    #[error("Unsupported: {0}")]
    Unsupported(&'static str),
    #[error("Unable to build the boot tags")]
    Tags(#[from] AtagError),
    #[error("Firmware failure")]
    Firmware(#[from] FirmwareError),
    #[error("Linux call returned")]
    KernelReturned,
    #[error("Internal error: {0}")]
    Bug(&'static str),
}

impl LoaderError {
    /// Maps a read failure on the `what` segment.
    pub(crate) fn read(what: &'static str) -> impl FnOnce(SourceError) -> Self {
        move |source| match source {
            SourceError::PrematureEnd { .. } => Self::PrematureEnd { what, source },
            SourceError::Storage(_) => Self::Read { what, source },
        }
    }
}

impl From<BootImageError> for LoaderError {
    fn from(value: BootImageError) -> Self {
        match value {
            BootImageError::InvalidMagic => Self::InvalidMagic,
            other => Self::InvalidHeader(other),
        }
    }
}

impl From<CpioError> for LoaderError {
    fn from(value: CpioError) -> Self {
        match value {
            CpioError::BufferTooSmall { needed, available } => Self::BufferTooSmall {
                needed: needed as u64,
                available: available as u64,
            },
            other => Self::BadArchive(other),
        }
    }
}

impl From<PlanError> for LoaderError {
    fn from(value: PlanError) -> Self {
        match value {
            PlanError::AllocationFailure { what, source, .. } => {
                Self::AllocationFailure { what, source }
            }
            PlanError::InvalidRamdiskAddress { address, minimum } => {
                Self::InvalidRamdiskAddress { address, minimum }
            }
            PlanError::AddressOverflow { what, address, .. } => {
                Self::InvalidAddress { what, address }
            }
        }
    }
}

impl From<PatchError> for LoaderError {
    fn from(value: PatchError) -> Self {
        match value {
            PatchError::InvalidFormat(e) => Self::InvalidRamdiskFormat(e),
            PatchError::BufferTooSmall { needed, available } => {
                Self::BufferTooSmall { needed, available }
            }
            PatchError::Archive(e) => Self::from(e),
            PatchError::PrematureEnd { expected, actual } => Self::PrematureEnd {
                what: "compressed ramdisk",
                source: SourceError::PrematureEnd {
                    offset: actual,
                    len: expected.saturating_sub(actual),
                    size: actual,
                },
            },
            PatchError::Decompress(e) => Self::Firmware(e),
            PatchError::Unsupported(what) => Self::Unsupported(what),
        }
    }
}
