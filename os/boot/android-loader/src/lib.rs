//! # Android Boot Image Loader
//!
//! Loads an Android boot image into memory, optionally injects the multiboot
//! files into its ramdisk and prepares the ATAG handoff for a 32-bit ARM
//! kernel.
//!
//! ```text
//!  Source ──► header ──► MemoryPlan ──► segments in memory
//!                                          │
//!                       Storage ──► Injection ──► patched ramdisk (maybe moved)
//!                                          │
//!                 variables ──► Cmdline ──► tag list ──► PreparedBoot ──► boot()
//! ```
//!
//! Everything platform specific sits behind [`Firmware`] and [`Storage`].
//! The UEFI application implements both on top of boot services; the tests
//! use an in-memory mock.

#![cfg_attr(not(any(test, doctest)), no_std)]
extern crate alloc;

pub mod cmdline;
pub mod config;
mod error;
pub mod gzip;
mod loader;
mod logger;
pub mod plan;
pub mod platform;
pub mod ramdisk;
pub mod source;
pub mod tags;
mod tracing;

pub use config::{LoaderConfig, PatchStrategy};
pub use error::LoaderError;
pub use loader::{LoadRequest, PreparedBoot, boot, load, machine_type};
pub use logger::{LoaderLogger, Sink};
pub use platform::{Firmware, FirmwareError, Handoff, Storage, StorageError};
pub use source::{
    BlockDevice, DiskSource, FileReader, FileSource, ImageLocation, MemorySource, Source,
    SourceError,
};
pub use tracing::trace_handoff;
