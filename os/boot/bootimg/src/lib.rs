//! # Android Boot Images
//!
//! An Android boot image starts with a one-page header followed by the
//! kernel, the ramdisk, an optional second-stage loader and an optional
//! device tree, each padded to a whole number of pages:
//!
//! ```text
//! offset 0                    ┌──────────────────────────┐
//!                             │ header (1 page)          │
//! page_size                   ├──────────────────────────┤
//!                             │ kernel  (n pages)        │
//! + align(kernel_size)        ├──────────────────────────┤
//!                             │ ramdisk (m pages)        │
//! + align(ramdisk_size)       ├──────────────────────────┤
//!                             │ second  (o pages)        │
//! + align(second_size)        ├──────────────────────────┤
//!                             │ device tree (p pages)    │
//!                             └──────────────────────────┘
//! ```
//!
//! The header itself is little-endian:
//!
//! ```text
//! offset  size  field
//!      0     8  magic "ANDROID!"
//!      8     4  kernel_size
//!     12     4  kernel_addr
//!     16     4  ramdisk_size
//!     20     4  ramdisk_addr
//!     24     4  second_size
//!     28     4  second_addr
//!     32     4  tags_addr
//!     36     4  page_size
//!     40     4  dt_size
//!     44     4  unused
//!     48    16  name
//!     64   512  cmdline
//!    576    32  id
//!    608  1024  extra_cmdline (newer images only)
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]
extern crate alloc;

mod header;
mod layout;

pub use header::{
    BOOT_MAGIC, BootImageHeader, CMDLINE_LEN, EXTRA_CMDLINE_LEN, HEADER_LEN, HEADER_WITH_EXTRA_LEN,
    ID_LEN, NAME_LEN, Segment,
};
pub use layout::{ImageLayout, SegmentKind, is_arm64_image, ARM64_MAGIC, ARM64_MAGIC_OFFSET};

#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BootImageError {
    #[error("Boot image header needs {HEADER_LEN} bytes, got {0}")]
    TooShort(usize),
    #[error("Invalid magic")]
    InvalidMagic,
    #[error("Page size {0} is not a power of two")]
    InvalidPageSize(u32),
    #[error("Segment offsets exceed the addressable range")]
    LayoutOverflow,
    #[error("Address {0:#x} does not fit into a 32-bit header field")]
    AddressOverflow(u64),
    #[error("Command line of {len} bytes exceeds the {max} bytes the header can hold")]
    CmdlineTooLong { len: usize, max: usize },
    #[error("Destination too small: {needed} bytes needed, {available} available")]
    BufferTooSmall { needed: usize, available: usize },
}
