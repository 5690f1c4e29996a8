//! # Memory Layout Planning
//!
//! Resolves where each segment goes, claims that memory from the firmware and
//! finds a new home for a ramdisk that outgrew its slot.
//!
//! Addresses come from the image header unless a platform variable overrides
//! them. Claims are page granular; a segment keeps its exact, possibly
//! unaligned, address inside the claimed window.
//!
//! ```text
//!            claimed windows                     relocated ramdisk
//! ┌────────┐ ┌────────┐ ┌───────┐ ┌──────┐      ┌──────────────────┐
//! │ tags   │ │ kernel │ │ ramdsk│ │second│ ...  │ new ramdisk      │
//! └────────┘ └────────┘ └───────┘ └──────┘      └──────────────────┘
//!                                         ^ end of span = minimum address
//! ```

use crate::config::{
    ADDRESS_VARIABLE_LEN, PAGE_SIZE, RELOCATION_SLACK, VAR_KERNEL_ADDR, VAR_KERNEL64_ADDR,
    VAR_RAMDISK_ADDR, VAR_TAGS_ADDR,
};
use crate::platform::{Firmware, FirmwareError};
use alloc::vec::Vec;
use boot_addresses::{AddressRange, PhysicalAddress, Span};
use bootimg::BootImageHeader;
use log::{debug, warn};

#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlanError {
    #[error("Unable to allocate {len:#x} bytes at {address} for the {what}")]
    AllocationFailure {
        what: &'static str,
        address: PhysicalAddress,
        len: u64,
        #[source]
        source: FirmwareError,
    },
    #[error("Invalid ramdisk address {address}, must not be below {minimum}")]
    InvalidRamdiskAddress {
        address: PhysicalAddress,
        minimum: PhysicalAddress,
    },
    #[error("The {what} at {address} with {len:#x} bytes exceeds the address space")]
    AddressOverflow {
        what: &'static str,
        address: PhysicalAddress,
        len: u64,
    },
}

/// Reads an address override. Values of any width other than 8 bytes are ignored.
pub fn address_override(firmware: &impl Firmware, name: &str) -> Option<PhysicalAddress> {
    let value = firmware.get_variable(name)?;
    let Ok(bytes) = <[u8; ADDRESS_VARIABLE_LEN]>::try_from(value.as_slice()) else {
        warn!(
            "Ignoring {name}: expected {ADDRESS_VARIABLE_LEN} bytes, got {}",
            value.len()
        );
        return None;
    };
    let address = PhysicalAddress::new(u64::from_le_bytes(bytes));
    debug!("{name} overrides the load address with {address}");
    Some(address)
}

/// Resolved load addresses and the memory claimed so far.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryPlan {
    kernel: PhysicalAddress,
    ramdisk: PhysicalAddress,
    second: PhysicalAddress,
    tags: PhysicalAddress,
    claimed: Vec<AddressRange>,
}

impl MemoryPlan {
    /// Takes the header's addresses and applies platform overrides.
    ///
    /// `arm64` selects the 64-bit kernel address variable.
    pub fn resolve(header: &BootImageHeader, arm64: bool, firmware: &impl Firmware) -> Self {
        let kernel_var = if arm64 {
            VAR_KERNEL64_ADDR
        } else {
            VAR_KERNEL_ADDR
        };

        Self {
            kernel: address_override(firmware, kernel_var).unwrap_or(header.kernel.addr),
            ramdisk: address_override(firmware, VAR_RAMDISK_ADDR).unwrap_or(header.ramdisk.addr),
            second: header.second.addr,
            tags: address_override(firmware, VAR_TAGS_ADDR).unwrap_or(header.tags_addr),
            claimed: Vec::new(),
        }
    }

    #[must_use]
    pub const fn kernel(&self) -> PhysicalAddress {
        self.kernel
    }

    #[must_use]
    pub const fn ramdisk(&self) -> PhysicalAddress {
        self.ramdisk
    }

    #[must_use]
    pub const fn second(&self) -> PhysicalAddress {
        self.second
    }

    #[must_use]
    pub const fn tags(&self) -> PhysicalAddress {
        self.tags
    }

    /// Page windows claimed so far.
    #[must_use]
    pub fn claimed(&self) -> &[AddressRange] {
        &self.claimed
    }

    /// Claims `len` bytes at `address` and returns the exact byte range.
    ///
    /// Nothing is claimed for an empty segment.
    ///
    /// # Errors
    /// * [`PlanError::AddressOverflow`] if the range wraps.
    /// * [`PlanError::AllocationFailure`] with the firmware's error.
    pub fn claim(
        &mut self,
        firmware: &mut impl Firmware,
        what: &'static str,
        address: PhysicalAddress,
        len: u64,
    ) -> Result<AddressRange, PlanError> {
        if len == 0 {
            return Ok(AddressRange::from_len(address, 0));
        }

        let overflow = PlanError::AddressOverflow { what, address, len };
        let end = address.checked_add(len).ok_or(overflow)?;
        let window = AddressRange::new(
            address.align_down(PAGE_SIZE),
            end.align_up(PAGE_SIZE).ok_or(overflow)?,
        );

        debug!("Claiming {window:?} for the {what}");
        let granted = firmware
            .allocate_at(window)
            .map_err(|source| PlanError::AllocationFailure {
                what,
                address,
                len,
                source,
            })?;
        self.claimed.push(granted);
        Ok(AddressRange::from_len(address, len))
    }

    /// Lowest address a relocated ramdisk may start at.
    ///
    /// This is the end of every claimed window and of the tag area, which is
    /// counted even while it is not claimed yet.
    #[must_use]
    pub fn relocation_floor(&self, tag_area: u64) -> PhysicalAddress {
        let mut span = Span::new();
        for window in &self.claimed {
            span.include(*window);
        }
        span.include(AddressRange::from_len(self.tags, tag_area));
        span.end().unwrap_or(PhysicalAddress::zero())
    }

    /// Finds room for a ramdisk of `len` bytes.
    ///
    /// The ramdisk stays at its address if `len` fits into `current`, the
    /// range it was loaded into. Otherwise a new region above every claimed
    /// window is claimed and becomes the ramdisk address.
    ///
    /// # Errors
    /// * [`PlanError::AllocationFailure`] if the firmware has no room.
    /// * [`PlanError::InvalidRamdiskAddress`] if the granted region starts too low.
    pub fn place_ramdisk(
        &mut self,
        firmware: &mut impl Firmware,
        current: AddressRange,
        len: u64,
        tag_area: u64,
    ) -> Result<AddressRange, PlanError> {
        if len <= current.len() {
            return Ok(AddressRange::from_len(current.start(), len));
        }

        let minimum = self.relocation_floor(tag_area);
        let request = len
            .checked_add(RELOCATION_SLACK)
            .ok_or(PlanError::AddressOverflow {
                what: "ramdisk",
                address: minimum,
                len,
            })?;
        let granted = firmware.allocate_above(minimum, request).map_err(|source| {
            PlanError::AllocationFailure {
                what: "ramdisk",
                address: minimum,
                len: request,
                source,
            }
        })?;
        self.claimed.push(granted);

        let address = granted
            .start()
            .align_up(PAGE_SIZE)
            .ok_or(PlanError::AddressOverflow {
                what: "ramdisk",
                address: granted.start(),
                len,
            })?;
        if address < minimum {
            return Err(PlanError::InvalidRamdiskAddress { address, minimum });
        }

        debug!("Relocating the ramdisk from {} to {address}", current.start());
        self.ramdisk = address;
        Ok(AddressRange::from_len(address, len))
    }
}
