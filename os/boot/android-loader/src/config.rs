//! # Loader Configuration
//!
//! Fixed names shared with the platform (variable names, command line keys,
//! multiboot paths) live here as constants. Everything a caller may want to
//! tune per boot is carried by [`LoaderConfig`].

use boot_addresses::{PLATFORM_PAGE_SIZE, PageSize};
use cpio_archive::DEFAULT_MAX_ENTRIES;
use utils_accessors_derive::Accessors;

/// Platform variable overriding the kernel load address (8 bytes, LE).
pub const VAR_KERNEL_ADDR: &str = "android_kernel_addr";

/// Kernel load address override used instead of [`VAR_KERNEL_ADDR`] for arm64 images.
pub const VAR_KERNEL64_ADDR: &str = "android_kernel64_addr";

/// Platform variable overriding the ramdisk load address (8 bytes, LE).
pub const VAR_RAMDISK_ADDR: &str = "android_ramdisk_addr";

/// Platform variable overriding the tag list address (8 bytes, LE).
pub const VAR_TAGS_ADDR: &str = "android_tags_addr";

/// Platform variable overriding the machine type passed to the kernel (4 bytes, LE).
pub const VAR_MACHINE_TYPE: &str = "android_machine_type";

/// Platform variable holding a command line fragment appended after the header's.
pub const VAR_ADDITIONAL_CMDLINE: &str = "android_additional_cmdline";

/// Width of an address override variable.
pub const ADDRESS_VARIABLE_LEN: usize = 8;

/// Width of the machine type variable.
pub const MACHINE_TYPE_VARIABLE_LEN: usize = 4;

/// Page size used for allocations, independent of the image's page size.
pub const PAGE_SIZE: PageSize = PLATFORM_PAGE_SIZE;

/// Slack requested on top of a relocated ramdisk so it can be page aligned.
pub const RELOCATION_SLACK: u64 = PAGE_SIZE.get();

/// Default upper bound of a patched (or inflated) ramdisk.
pub const DEFAULT_MAX_RAMDISK_SIZE: u64 = 64 * 1024 * 1024;

/// Default size reserved for the tag list at the tags address.
pub const DEFAULT_TAG_AREA_SIZE: u64 = 16 * 1024;

/// How the ramdisk archive is grown.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PatchStrategy {
    /// Decode the whole archive and write it out again.
    ///
    /// Injected files land below [`LoaderConfig::inject_root`], the nested
    /// ramdisk is merged entry by entry and replaced paths are dropped.
    Rewrite,
    /// Append records in front of the existing trailer.
    ///
    /// The nested ramdisk is added as a single file. Requires the `newc` feature.
    Append,
}

/// Per-boot loader settings.
///
/// ```
/// use android_loader::config::{LoaderConfig, PatchStrategy};
///
/// const CONFIG: LoaderConfig = LoaderConfig::DEFAULT
///     .with_strategy(PatchStrategy::Append)
///     .with_max_entries(128);
/// assert_eq!(CONFIG.max_entries(), 128);
/// assert_eq!(CONFIG.init_name(), "init.multiboot");
/// ```
#[derive(Debug, Copy, Clone, PartialEq, Eq, Accessors)]
pub struct LoaderConfig {
    /// Directory below the search prefix whose files are injected.
    multiboot_dir: &'static str,
    /// File inside [`LoaderConfig::multiboot_dir`] that becomes the ramdisk init.
    init_source: &'static str,
    /// Archive path of the injected init, without the leading slash.
    init_name: &'static str,
    /// Archive directory receiving the injected files (rewrite only).
    inject_root: &'static str,
    /// Archive name of the nested ramdisk taken from the root device.
    nested_name: &'static str,
    /// Command line key announcing the loader's own path.
    loader_path_key: &'static str,
    /// How the archive is grown.
    strategy: PatchStrategy,
    /// Upper bound of the patched ramdisk in bytes.
    max_ramdisk_size: u64,
    /// Upper bound of entries decoded from one archive.
    max_entries: usize,
    /// Bytes reserved at the tags address.
    tag_area_size: u64,
}

impl LoaderConfig {
    pub const DEFAULT: Self = Self {
        multiboot_dir: "multiboot",
        init_source: "sbin/init",
        init_name: "init.multiboot",
        inject_root: "multiboot",
        nested_name: "grub_ramdisk",
        loader_path_key: "multiboot.grubdir",
        strategy: PatchStrategy::Rewrite,
        max_ramdisk_size: DEFAULT_MAX_RAMDISK_SIZE,
        max_entries: DEFAULT_MAX_ENTRIES,
        tag_area_size: DEFAULT_TAG_AREA_SIZE,
    };
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

const _: () = {
    assert!(PAGE_SIZE.get().is_power_of_two());
    assert!(DEFAULT_TAG_AREA_SIZE % PAGE_SIZE.get() == 0);
    assert!(DEFAULT_MAX_RAMDISK_SIZE <= u32::MAX as u64);
};
