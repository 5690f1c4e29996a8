//! # Platform Collaborators
//!
//! The loader never touches firmware directly. Memory allocation, platform
//! variables, decompression, cache control and the final jump go through
//! [`Firmware`]; file and device access goes through [`Storage`].

use alloc::string::String;
use alloc::vec::Vec;
use boot_addresses::{AddressRange, PhysicalAddress};

#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FirmwareError {
    #[error("Not enough memory to satisfy the request")]
    OutOfResources,
    #[error("The requested address {0} is not available")]
    AddressUnavailable(PhysicalAddress),
    #[error("The range {0:?} was not allocated by the loader")]
    NotAllocated(AddressRange),
    #[error("The compressed stream is corrupt")]
    Decompression,
    #[error("Not supported by this platform: {0}")]
    Unsupported(&'static str),
    #[error("Platform failure: {0}")]
    Platform(&'static str),
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StorageError {
    #[error("No such file or device")]
    NotFound,
    #[error("Not a regular file")]
    NotAFile,
    #[error("I/O error: {0}")]
    Io(&'static str),
}

/// Everything the kernel receives when control is transferred.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Handoff {
    /// Address jumped to.
    pub entry: PhysicalAddress,
    /// Board identifier passed in `r1`.
    pub machine_type: u32,
    /// Tag list address passed in `r2`.
    pub tags: PhysicalAddress,
    pub kernel: AddressRange,
    pub ramdisk: AddressRange,
    /// Empty when the image has no second stage.
    pub second: AddressRange,
    /// Length of the written tag list in bytes.
    pub tags_len: u64,
}

/// Firmware services needed to place and start a kernel.
pub trait Firmware {
    /// Claims `range` at exactly its address.
    ///
    /// `range` is page aligned on both ends.
    ///
    /// # Errors
    /// [`FirmwareError::AddressUnavailable`] or [`FirmwareError::OutOfResources`].
    fn allocate_at(&mut self, range: AddressRange) -> Result<AddressRange, FirmwareError>;

    /// Claims `size` bytes at the lowest page aligned address not below `minimum`.
    ///
    /// # Errors
    /// [`FirmwareError::OutOfResources`] if no such region exists.
    fn allocate_above(
        &mut self,
        minimum: PhysicalAddress,
        size: u64,
    ) -> Result<AddressRange, FirmwareError>;

    /// Gives write access to memory claimed through this firmware.
    ///
    /// # Errors
    /// [`FirmwareError::NotAllocated`] if `range` is not inside a claimed region.
    fn memory(&mut self, range: AddressRange) -> Result<&mut [u8], FirmwareError>;

    /// Usable RAM regions, in any order.
    ///
    /// # Errors
    /// Platform specific.
    fn memory_map(&self) -> Result<Vec<AddressRange>, FirmwareError>;

    /// Reads a platform variable, `None` if it is not set.
    fn get_variable(&self, name: &str) -> Option<Vec<u8>>;

    /// Machine type used when no override variable is set.
    fn default_machine_type(&self) -> u32;

    /// Inflates the gzip stream `src` into `dst` and returns the bytes produced.
    ///
    /// # Errors
    /// [`FirmwareError::Decompression`] or [`FirmwareError::Unsupported`].
    fn decompress(&mut self, src: &[u8], dst: &mut [u8]) -> Result<usize, FirmwareError>;

    /// Releases firmware resources that must not outlive the handoff.
    ///
    /// # Errors
    /// Platform specific. No further firmware calls except
    /// [`Firmware::disable_caches`] and [`Firmware::enter_kernel`] are made afterwards.
    fn prepare_handoff(&mut self) -> Result<(), FirmwareError>;

    /// Cleans and disables data/instruction caches and the MMU.
    fn disable_caches(&mut self);

    /// Jumps to the kernel.
    ///
    /// Returning at all, `Ok` included, means the kernel gave control back.
    ///
    /// # Errors
    /// Platform specific.
    ///
    /// # Safety
    /// The handoff ranges must hold a complete kernel image and tag list.
    unsafe fn enter_kernel(&mut self, handoff: &Handoff) -> Result<(), FirmwareError>;
}

/// Read access to the filesystem the loader was started from and to raw devices.
pub trait Storage {
    /// Paths of all regular files below `dir`, relative to `dir`, recursively.
    ///
    /// # Errors
    /// [`StorageError::NotFound`] if `dir` does not exist.
    fn list_dir(&mut self, dir: &str) -> Result<Vec<String>, StorageError>;

    /// Whole contents of a file.
    ///
    /// # Errors
    /// [`StorageError::NotFound`], [`StorageError::NotAFile`] or an I/O error.
    fn read_file(&mut self, path: &str) -> Result<Vec<u8>, StorageError>;

    /// Whole contents of a device such as a ramdisk.
    ///
    /// # Errors
    /// [`StorageError::NotFound`] or an I/O error.
    fn read_device(&mut self, device: &str) -> Result<Vec<u8>, StorageError>;
}
