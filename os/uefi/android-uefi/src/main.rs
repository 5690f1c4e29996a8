//! # Android Boot Image UEFI Application
//!
//! Boots an Android boot image on 32-bit ARM UEFI firmware:
//!
//! ```text
//! UEFI Firmware
//!         ↓
//! ┌─────────────────────────────────────────────┐
//! │  1. Parse load options                      │
//! │  2. Open the image (file or raw device)     │
//! │  3. android_loader::load                    │
//! │     • claim and fill kernel/ramdisk/second  │
//! │     • inject the multiboot payload          │
//! │     • write the ATAG list                   │
//! │  4. android_loader::boot                    │
//! │     • ExitBootServices                      │
//! │     • caches and MMU off                    │
//! │     • kernel(0, machine type, tags)         │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! On any failure the error is logged and the application returns to the
//! firmware with a matching [`uefi::Status`].

#![cfg_attr(target_os = "uefi", no_std, no_main)]
#![cfg_attr(not(target_os = "uefi"), allow(dead_code))]
#![allow(unsafe_code)]
extern crate alloc;

mod options;

#[cfg(target_os = "uefi")]
mod arch;
#[cfg(target_os = "uefi")]
mod block;
#[cfg(target_os = "uefi")]
mod file_system;
#[cfg(target_os = "uefi")]
mod firmware;
#[cfg(target_os = "uefi")]
mod status;
#[cfg(target_os = "uefi")]
mod storage;
#[cfg(target_os = "uefi")]
mod uefi_mmap;

#[cfg(target_os = "uefi")]
#[uefi::entry]
fn efi_main() -> uefi::Status {
    app::main()
}

#[cfg(not(target_os = "uefi"))]
fn main() {
    println!("android-uefi only runs as a UEFI application; build it for a *-unknown-uefi target.");
}

#[cfg(target_os = "uefi")]
mod app {
    use crate::block::UefiBlockDevice;
    use crate::file_system::UefiFile;
    use crate::firmware::UefiFirmware;
    use crate::options::{self, LaunchOptions};
    use crate::status::status_of;
    use crate::storage::UefiStorage;
    use alloc::string::{String, ToString};
    use android_loader::{
        DiskSource, FileSource, ImageLocation, LoadRequest, LoaderConfig, LoaderError,
        LoaderLogger, PatchStrategy, PreparedBoot, Source, load,
    };
    use core::fmt;
    use log::{LevelFilter, error, info};
    use uefi::proto::device_path::text::{AllowShortcuts, DisplayOnly};
    use uefi::proto::loaded_image::LoadedImage;
    use uefi::{CStr16, Status, boot};

    fn console(args: fmt::Arguments<'_>) {
        uefi::println!("{args}");
    }

    pub fn main() -> Status {
        if uefi::helpers::init().is_err() {
            return Status::UNSUPPORTED;
        }

        let Ok(logger) = LoaderLogger::new(LevelFilter::Debug, console).init() else {
            return Status::ABORTED;
        };

        let options = match launch_options() {
            Ok(options) => options,
            Err(e) => {
                error!("{e}");
                return status_of(&e);
            }
        };

        let mut firmware = UefiFirmware::new(logger);
        match run(&options, &mut firmware) {
            Ok(()) => Status::SUCCESS,
            Err(e) => {
                error!("{e}");
                status_of(&e)
            }
        }
    }

    fn launch_options() -> Result<LaunchOptions, LoaderError> {
        let image = boot::open_protocol_exclusive::<LoadedImage>(boot::image_handle())
            .map_err(|_| LoaderError::BadArgument("no loaded image protocol"))?;
        let raw = match image.load_options_as_cstr16() {
            Ok(options) => options.to_string(),
            Err(_) => String::new(),
        };
        let own_path = image
            .file_path()
            .and_then(|path| path.to_string(DisplayOnly(false), AllowShortcuts(false)).ok())
            .map(|text| {
                let text: &CStr16 = &text;
                text.to_string()
            })
            .unwrap_or_default();
        options::parse(&raw, &options::loader_dir(&own_path))
    }

    fn run(options: &LaunchOptions, firmware: &mut UefiFirmware) -> Result<(), LoaderError> {
        let args = options.kernel_args();
        let request = LoadRequest {
            args: &args,
            multiboot: options.multiboot,
            root_device: options.root_device.as_deref(),
            search_prefix: &options.prefix,
            loader_path: &options.loader_path,
        };
        let config = if options.append {
            LoaderConfig::DEFAULT.with_strategy(PatchStrategy::Append)
        } else {
            LoaderConfig::DEFAULT
        };

        let mut storage = UefiStorage;
        let prepared = match options.location()? {
            ImageLocation::Disk(device) => {
                info!("Loading boot image from device {device} ...");
                let device = UefiBlockDevice::open(device).map_err(|e| LoaderError::Read {
                    what: "boot image",
                    source: e.into(),
                })?;
                prepare(&mut DiskSource::new(device), firmware, &mut storage, &request, &config)?
            }
            ImageLocation::File(path) => {
                info!("Loading boot image {path} ...");
                let file = UefiFile::open(path).map_err(|e| LoaderError::Read {
                    what: "boot image",
                    source: e.into(),
                })?;
                prepare(&mut FileSource::new(file), firmware, &mut storage, &request, &config)?
            }
        };

        match android_loader::boot(firmware, &prepared)? {}
    }

    fn prepare(
        source: &mut impl Source,
        firmware: &mut UefiFirmware,
        storage: &mut UefiStorage,
        request: &LoadRequest<'_>,
        config: &LoaderConfig,
    ) -> Result<PreparedBoot, LoaderError> {
        let prepared = load(source, firmware, storage, request, config)?;
        info!(
            "Boot image loaded: {} bytes of command line, entry at {}",
            prepared.cmdline().len(),
            prepared.entry()
        );
        Ok(prepared)
    }
}
