//! # Boot Tags
//!
//! Turns the firmware memory map, the final ramdisk placement and the command
//! line into an ATAG list.

use crate::cmdline::Cmdline;
use crate::error::LoaderError;
use alloc::vec::Vec;
use boot_addresses::{AddressRange, PhysicalAddress};
use boot_protocol::{TagWriter, list_len};
use log::{debug, warn};

const LIMIT_4G: u64 = 1 << 32;

/// Sorts `regions` and merges those that touch or overlap. Empty regions are dropped.
#[must_use]
pub fn coalesce(mut regions: Vec<AddressRange>) -> Vec<AddressRange> {
    regions.retain(|r| !r.is_empty());
    regions.sort_by_key(|r| r.start());

    let mut merged: Vec<AddressRange> = Vec::with_capacity(regions.len());
    for region in regions {
        match merged.last_mut() {
            Some(last) if region.start() <= last.end() => {
                *last = AddressRange::new(last.start(), last.end().max(region.end()));
            }
            _ => merged.push(region),
        }
    }
    merged
}

/// `(start, size)` pairs for the 32-bit MEM records.
///
/// Regions starting at or above 4 GiB are left out, regions crossing it are cut.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn mem_records(regions: &[AddressRange]) -> Vec<(u32, u32)> {
    let mut records = Vec::with_capacity(regions.len());
    for region in regions {
        let start = region.start().as_u64();
        if start >= LIMIT_4G {
            warn!("Memory region {region:?} is above 4 GiB, not reported");
            continue;
        }
        let end = region.end().as_u64().min(LIMIT_4G);
        if end < region.end().as_u64() {
            warn!("Memory region {region:?} is cut at 4 GiB");
        }
        // A region of exactly 4 GiB does not fit the size field.
        let size = (end - start).min(u64::from(u32::MAX) & !0xfff);
        records.push((start as u32, size as u32));
    }
    records
}

fn address_u32(what: &'static str, address: PhysicalAddress) -> Result<u32, LoaderError> {
    u32::try_from(address.as_u64()).map_err(|_| LoaderError::InvalidAddress { what, address })
}

/// Bytes [`write_tags`] needs.
#[must_use]
pub fn tags_len(mem: &[(u32, u32)], cmdline: &Cmdline) -> usize {
    list_len(mem.len(), cmdline.len())
}

/// Writes CORE, INITRD2, MEM (per record), CMDLINE and NONE into `buf`.
///
/// Returns the list length in bytes.
///
/// # Errors
/// * [`LoaderError::InvalidAddress`] if the ramdisk does not sit below 4 GiB.
/// * [`LoaderError::Tags`] if `buf` is too small.
pub fn write_tags(
    buf: &mut [u8],
    ramdisk: AddressRange,
    mem: &[(u32, u32)],
    cmdline: &Cmdline,
) -> Result<usize, LoaderError> {
    let start = address_u32("ramdisk", ramdisk.start())?;
    let size = u32::try_from(ramdisk.len()).map_err(|_| LoaderError::InvalidAddress {
        what: "ramdisk end",
        address: ramdisk.end(),
    })?;

    let mut writer = TagWriter::new(buf)?;
    writer.initrd(start, size)?;
    for &(start, size) in mem {
        writer.memory(start, size)?;
    }
    writer.cmdline(cmdline.as_bytes())?;
    let len = writer.finish()?;

    debug!(
        "Wrote {len} bytes of tags: initrd {start:#x}+{size:#x}, {} memory regions",
        mem.len()
    );
    Ok(len)
}
