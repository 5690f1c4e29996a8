//! [`Firmware`] on top of UEFI boot and runtime services.
//!
//! Physical memory is identity mapped while boot services run, so claimed
//! ranges are accessed through their physical address.

use crate::{arch, uefi_mmap};
use alloc::vec::Vec;
use android_loader::config::PAGE_SIZE;
use android_loader::{Firmware, FirmwareError, Handoff, LoaderLogger, gzip};
use boot_addresses::{AddressRange, PhysicalAddress};
use log::{debug, warn};
use miniz_oxide::inflate::TINFLStatus;
use miniz_oxide::inflate::core::inflate_flags::TINFL_FLAG_USING_NON_WRAPPING_OUTPUT_BUF;
use miniz_oxide::inflate::core::{DecompressorOxide, decompress};
use uefi::boot::{self, AllocateType, MemoryType};
use uefi::runtime::{self, VariableVendor};
use uefi::{CString16, Status};

const PAGE: u64 = PAGE_SIZE.get();

/// Machine type reported when `android_machine_type` is not set.
///
/// UEFI platforms describe the board through a device tree, which ATAG
/// kernels signal with an all-ones machine number.
pub const DEVICE_TREE_MACHINE_TYPE: u32 = 0xFFFF_FFFF;

pub struct UefiFirmware {
    claimed: Vec<AddressRange>,
    logger: &'static LoaderLogger,
}

impl UefiFirmware {
    pub const fn new(logger: &'static LoaderLogger) -> Self {
        Self {
            claimed: Vec::new(),
            logger,
        }
    }

    fn claim(&mut self, range: AddressRange) -> Result<AddressRange, FirmwareError> {
        let pages = usize::try_from(range.len().div_ceil(PAGE))
            .map_err(|_| FirmwareError::OutOfResources)?;
        boot::allocate_pages(
            AllocateType::Address(range.start().as_u64()),
            MemoryType::LOADER_DATA,
            pages,
        )
        .map_err(|e| match e.status() {
            Status::NOT_FOUND => FirmwareError::AddressUnavailable(range.start()),
            _ => FirmwareError::OutOfResources,
        })?;

        debug!("Allocated {pages} pages at {}", range.start());
        self.claimed.push(range);
        Ok(range)
    }
}

impl Firmware for UefiFirmware {
    fn allocate_at(&mut self, range: AddressRange) -> Result<AddressRange, FirmwareError> {
        self.claim(range)
    }

    fn allocate_above(
        &mut self,
        minimum: PhysicalAddress,
        size: u64,
    ) -> Result<AddressRange, FirmwareError> {
        let size = size.div_ceil(PAGE) * PAGE;
        let free =
            uefi_mmap::free_regions().map_err(|_| FirmwareError::Platform("memory map"))?;

        for region in free {
            let Some(start) = region.start().max(minimum).align_up(PAGE_SIZE) else {
                continue;
            };
            let Some(end) = start.checked_add(size) else {
                continue;
            };
            if end <= region.end() {
                return self.claim(AddressRange::new(start, end));
            }
        }
        Err(FirmwareError::OutOfResources)
    }

    fn memory(&mut self, range: AddressRange) -> Result<&mut [u8], FirmwareError> {
        let claimed = range.is_empty()
            || self
                .claimed
                .iter()
                .any(|c| c.start() <= range.start() && range.end() <= c.end());
        if !claimed {
            return Err(FirmwareError::NotAllocated(range));
        }

        let start = usize::try_from(range.start().as_u64())
            .map_err(|_| FirmwareError::NotAllocated(range))?;
        let len = usize::try_from(range.len()).map_err(|_| FirmwareError::NotAllocated(range))?;
        if len == 0 {
            return Ok(&mut []);
        }

        // SAFETY: the range lies inside pages this loader allocated from the
        // firmware, and memory is identity mapped while boot services run.
        Ok(unsafe { core::slice::from_raw_parts_mut(start as *mut u8, len) })
    }

    fn memory_map(&self) -> Result<Vec<AddressRange>, FirmwareError> {
        uefi_mmap::usable_regions().map_err(|_| FirmwareError::Platform("memory map"))
    }

    fn get_variable(&self, name: &str) -> Option<Vec<u8>> {
        let name = CString16::try_from(name).ok()?;
        match runtime::get_variable_boxed(&name, &VariableVendor::GLOBAL_VARIABLE) {
            Ok((data, _)) => Some(data.into_vec()),
            Err(e) if e.status() == Status::NOT_FOUND => None,
            Err(e) => {
                warn!("Unable to read variable {name}: {:?}", e.status());
                None
            }
        }
    }

    fn default_machine_type(&self) -> u32 {
        DEVICE_TREE_MACHINE_TYPE
    }

    fn decompress(&mut self, src: &[u8], dst: &mut [u8]) -> Result<usize, FirmwareError> {
        let payload = gzip::deflate_payload(src).ok_or(FirmwareError::Decompression)?;

        let mut inflater = DecompressorOxide::new();
        let (status, _, written) = decompress(
            &mut inflater,
            payload,
            dst,
            0,
            TINFL_FLAG_USING_NON_WRAPPING_OUTPUT_BUF,
        );
        match status {
            TINFLStatus::Done => Ok(written),
            other => {
                debug!("Inflate stopped with {other:?} after {written} bytes");
                Err(FirmwareError::Decompression)
            }
        }
    }

    fn prepare_handoff(&mut self) -> Result<(), FirmwareError> {
        self.logger.exit_boot_services();
        uefi_mmap::exit_boot_services();
        Ok(())
    }

    fn disable_caches(&mut self) {
        arch::disable_caches(&self.claimed);
    }

    unsafe fn enter_kernel(&mut self, handoff: &Handoff) -> Result<(), FirmwareError> {
        // SAFETY: forwarded from the caller.
        unsafe { arch::enter_kernel(handoff) }
    }
}
