//! # Kernel Entry
//!
//! A 32-bit ARM kernel expects the MMU and data cache off, `r0 = 0`,
//! `r1` = machine type and `r2` = tag list address.

use android_loader::{FirmwareError, Handoff};
use boot_addresses::AddressRange;

#[cfg(target_arch = "arm")]
mod imp {
    use super::{AddressRange, FirmwareError, Handoff};
    use core::arch::asm;

    const SCTLR_M: u32 = 1 << 0;
    const SCTLR_C: u32 = 1 << 2;
    const SCTLR_I: u32 = 1 << 12;

    /// Smallest data cache line in bytes, from CTR.DminLine.
    fn dcache_line() -> u64 {
        let ctr: u32;
        // SAFETY: reading CTR has no side effects.
        unsafe { asm!("mrc p15, 0, {}, c0, c0, 1", out(reg) ctr, options(nomem, nostack)) };
        4 << ((ctr >> 16) & 0xF)
    }

    /// Cleans and invalidates the data cache over `range` (DCCIMVAC).
    fn clean_range(range: AddressRange, line: u64) {
        let mut addr = range.start().as_u64() & !(line - 1);
        while addr < range.end().as_u64() {
            // SAFETY: cache maintenance by address does not change memory contents.
            #[allow(clippy::cast_possible_truncation)]
            unsafe {
                asm!("mcr p15, 0, {}, c7, c14, 1", in(reg) addr as u32, options(nostack));
            }
            addr += line;
        }
    }

    pub fn disable_caches(claimed: &[AddressRange]) {
        let line = dcache_line();
        for range in claimed {
            clean_range(*range, line);
        }

        // SAFETY: the loader runs identity mapped, so turning the MMU off
        // keeps the current instruction stream and stack valid.
        unsafe {
            let mut sctlr: u32;
            asm!("dsb", "mrc p15, 0, {}, c1, c0, 0", out(reg) sctlr, options(nostack));
            sctlr &= !(SCTLR_M | SCTLR_C | SCTLR_I);
            asm!(
                "mcr p15, 0, {sctlr}, c1, c0, 0",
                "isb",
                "mcr p15, 0, {zero}, c7, c5, 0",
                "mcr p15, 0, {zero}, c7, c5, 6",
                "dsb",
                "isb",
                sctlr = in(reg) sctlr,
                zero = in(reg) 0u32,
                options(nostack),
            );
        }
    }

    #[allow(clippy::cast_possible_truncation)]
    pub unsafe fn enter_kernel(handoff: &Handoff) -> Result<(), FirmwareError> {
        type KernelEntry = extern "C" fn(u32, u32, u32);

        let entry = handoff.entry.as_u64() as usize;
        // SAFETY: the caller guarantees a complete kernel image at the entry point.
        let kernel = unsafe { core::mem::transmute::<usize, KernelEntry>(entry) };
        kernel(0, handoff.machine_type, handoff.tags.as_u64() as u32);
        Ok(())
    }
}

#[cfg(not(target_arch = "arm"))]
mod imp {
    use super::{AddressRange, FirmwareError, Handoff};
    use log::warn;

    pub fn disable_caches(_claimed: &[AddressRange]) {
        warn!("Cache maintenance is only implemented for 32-bit ARM");
    }

    pub unsafe fn enter_kernel(_handoff: &Handoff) -> Result<(), FirmwareError> {
        Err(FirmwareError::Unsupported("ATAG kernel entry on this architecture"))
    }
}

/// Cleans the claimed ranges to memory, then turns off caches and MMU.
pub fn disable_caches(claimed: &[AddressRange]) {
    imp::disable_caches(claimed);
}

/// Calls the kernel and returns if it does.
///
/// # Safety
/// The handoff must describe a loaded kernel and a valid tag list.
pub unsafe fn enter_kernel(handoff: &Handoff) -> Result<(), FirmwareError> {
    // SAFETY: forwarded from the caller.
    unsafe { imp::enter_kernel(handoff) }
}
