use android_loader::{FirmwareError, LoaderError};
use uefi::Status;

const fn firmware_status(e: FirmwareError) -> Status {
    match e {
        FirmwareError::OutOfResources => Status::OUT_OF_RESOURCES,
        FirmwareError::AddressUnavailable(_) => Status::NOT_FOUND,
        FirmwareError::NotAllocated(_) => Status::ACCESS_DENIED,
        FirmwareError::Decompression => Status::COMPROMISED_DATA,
        FirmwareError::Unsupported(_) => Status::UNSUPPORTED,
        FirmwareError::Platform(_) => Status::DEVICE_ERROR,
    }
}

/// Status returned to the firmware when loading or booting fails.
pub const fn status_of(e: &LoaderError) -> Status {
    match *e {
        LoaderError::BadArgument(_)
        | LoaderError::InvalidRamdiskAddress { .. }
        | LoaderError::InvalidAddress { .. } => Status::INVALID_PARAMETER,
        LoaderError::InvalidMagic
        | LoaderError::InvalidHeader(_)
        | LoaderError::BadArchive(_)
        | LoaderError::InvalidRamdiskFormat(_)
        | LoaderError::Tags(_) => Status::LOAD_ERROR,
        LoaderError::PrematureEnd { .. } => Status::END_OF_FILE,
        LoaderError::Read { .. } => Status::DEVICE_ERROR,
        LoaderError::BufferTooSmall { .. } => Status::BUFFER_TOO_SMALL,
        LoaderError::AllocationFailure { source, .. } | LoaderError::Firmware(source) => {
            firmware_status(source)
        }
        LoaderError::Unsupported(_) => Status::UNSUPPORTED,
        LoaderError::KernelReturned | LoaderError::Bug(_) => Status::ABORTED,
    }
}
