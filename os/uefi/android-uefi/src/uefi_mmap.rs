//! # UEFI Memory Map Utilities
//!
//! Reading the firmware memory map and leaving boot services.

use alloc::vec::Vec;
use android_loader::config::PAGE_SIZE;
use boot_addresses::{AddressRange, PhysicalAddress};
use log::info;
use uefi::boot::{self, MemoryType};
use uefi::mem::memory_map::{MemoryDescriptor, MemoryMap};

const PAGE: u64 = PAGE_SIZE.get();

/// Memory the kernel may use once boot services are gone.
const fn is_usable(ty: MemoryType) -> bool {
    matches!(
        ty,
        MemoryType::CONVENTIONAL
            | MemoryType::LOADER_CODE
            | MemoryType::LOADER_DATA
            | MemoryType::BOOT_SERVICES_CODE
            | MemoryType::BOOT_SERVICES_DATA
    )
}

fn range_of(desc: &MemoryDescriptor) -> AddressRange {
    AddressRange::from_len(
        PhysicalAddress::new(desc.phys_start),
        desc.page_count.saturating_mul(PAGE),
    )
}

fn regions(filter: impl Fn(MemoryType) -> bool) -> Result<Vec<AddressRange>, uefi::Error> {
    let map = boot::memory_map(MemoryType::LOADER_DATA)?;
    Ok(map
        .entries()
        .filter(|desc| filter(desc.ty))
        .map(range_of)
        .collect())
}

/// RAM regions reported to the kernel, unsorted.
pub fn usable_regions() -> Result<Vec<AddressRange>, uefi::Error> {
    regions(is_usable)
}

/// Free RAM, sorted by address.
pub fn free_regions() -> Result<Vec<AddressRange>, uefi::Error> {
    let mut free = regions(|ty| ty == MemoryType::CONVENTIONAL)?;
    free.sort_by_key(|r| r.start());
    Ok(free)
}

/// Exits the UEFI boot services.
///
/// The final memory map is leaked: its buffer belongs to a pool that can no
/// longer be freed.
pub fn exit_boot_services() {
    info!("Exiting boot services ...");

    // SAFETY: no boot services handles or allocations are used past this point.
    let map = unsafe { boot::exit_boot_services(None) };
    let descriptors = map.len();
    core::mem::forget(map);

    info!("Boot services exited with {descriptors} memory descriptors.");
}
