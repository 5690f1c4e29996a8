//! # Loading and Starting
//!
//! [`load`] turns a boot image into a [`PreparedBoot`]: every segment sits at
//! its final address, the ramdisk is patched and the tag list is written.
//! [`boot`] consumes that state and transfers control.

use crate::cmdline::{Cmdline, CmdlineBuilder, variable_str};
use crate::config::{
    LoaderConfig, MACHINE_TYPE_VARIABLE_LEN, VAR_ADDITIONAL_CMDLINE, VAR_MACHINE_TYPE,
};
use crate::error::LoaderError;
use crate::gzip;
use crate::plan::MemoryPlan;
use crate::platform::{Firmware, Handoff, Storage};
use crate::ramdisk::{self, Injection};
use crate::source::{Source, SourceError};
use crate::tags::{coalesce, mem_records, tags_len, write_tags};
use crate::tracing::trace_handoff;
use alloc::vec;
use alloc::vec::Vec;
use boot_addresses::{AddressRange, PhysicalAddress};
use bootimg::{
    ARM64_MAGIC, ARM64_MAGIC_OFFSET, BootImageHeader, HEADER_WITH_EXTRA_LEN, ImageLayout,
    SegmentKind, is_arm64_image,
};
use core::convert::Infallible;
use log::{debug, info, warn};

/// Per-boot inputs coming from the invocation.
#[derive(Debug, Copy, Clone, Default)]
pub struct LoadRequest<'a> {
    /// Extra kernel arguments, appended to the command line.
    pub args: &'a [&'a str],
    /// Patch the ramdisk with the multiboot files.
    pub multiboot: bool,
    /// Device the loader was started from, e.g. `cd0` or `hd0,msdos1`.
    pub root_device: Option<&'a str>,
    /// Directory the multiboot files are searched in.
    pub search_prefix: &'a str,
    /// Directory of the loader itself, announced on the command line.
    pub loader_path: &'a str,
}

/// A loaded image that is ready to be started.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedBoot {
    header: BootImageHeader,
    kernel: AddressRange,
    ramdisk: AddressRange,
    second: AddressRange,
    tags: PhysicalAddress,
    tags_len: u64,
    cmdline: Cmdline,
    arm64: bool,
}

impl PreparedBoot {
    /// The header with final addresses and ramdisk size.
    #[must_use]
    pub const fn header(&self) -> &BootImageHeader {
        &self.header
    }

    #[must_use]
    pub const fn kernel(&self) -> AddressRange {
        self.kernel
    }

    /// Final ramdisk placement with its patched size.
    #[must_use]
    pub const fn ramdisk(&self) -> AddressRange {
        self.ramdisk
    }

    #[must_use]
    pub const fn second(&self) -> AddressRange {
        self.second
    }

    #[must_use]
    pub const fn tags(&self) -> AddressRange {
        AddressRange::from_len(self.tags, self.tags_len)
    }

    #[must_use]
    pub const fn cmdline(&self) -> &Cmdline {
        &self.cmdline
    }

    #[must_use]
    pub const fn is_arm64(&self) -> bool {
        self.arm64
    }

    /// Second stage if present, the kernel otherwise.
    #[must_use]
    pub const fn entry(&self) -> PhysicalAddress {
        if self.second.is_empty() {
            self.kernel.start()
        } else {
            self.second.start()
        }
    }

    /// Register state and ranges handed to the kernel.
    #[must_use]
    pub const fn handoff(&self, machine_type: u32) -> Handoff {
        Handoff {
            entry: self.entry(),
            machine_type,
            tags: self.tags,
            kernel: self.kernel,
            ramdisk: self.ramdisk,
            second: self.second,
            tags_len: self.tags_len,
        }
    }
}

/// Machine type from the platform variable, the firmware default otherwise.
pub fn machine_type(firmware: &impl Firmware) -> u32 {
    if let Some(value) = firmware.get_variable(VAR_MACHINE_TYPE) {
        if let Ok(bytes) = <[u8; MACHINE_TYPE_VARIABLE_LEN]>::try_from(value.as_slice()) {
            return u32::from_le_bytes(bytes);
        }
        warn!(
            "Ignoring {VAR_MACHINE_TYPE}: expected {MACHINE_TYPE_VARIABLE_LEN} bytes, got {}",
            value.len()
        );
    }
    firmware.default_machine_type()
}

fn read_header(source: &mut impl Source) -> Result<BootImageHeader, LoaderError> {
    let available = source.size().min(HEADER_WITH_EXTRA_LEN as u64);
    #[allow(clippy::cast_possible_truncation)]
    let mut head = vec![0u8; available as usize];
    source
        .read_at(0, &mut head)
        .map_err(LoaderError::read("boot image header"))?;

    let mut header = BootImageHeader::parse(&head)?;
    // With small pages the extra command line area is already kernel data.
    if header.page_size.get() < HEADER_WITH_EXTRA_LEN as u64 {
        header.extra_cmdline = None;
    }
    Ok(header)
}

/// End of the last byte any segment occupies in the image.
fn required_len(layout: &ImageLayout) -> u64 {
    [
        SegmentKind::Kernel,
        SegmentKind::Ramdisk,
        SegmentKind::Second,
        SegmentKind::DeviceTree,
    ]
    .into_iter()
    .filter(|&kind| layout.size(kind) != 0)
    .map(|kind| layout.offset(kind) + layout.size(kind))
    .max()
    .unwrap_or(0)
}

fn detect_arm64(
    source: &mut impl Source,
    layout: &ImageLayout,
) -> Result<bool, LoaderError> {
    let wanted = (ARM64_MAGIC_OFFSET + ARM64_MAGIC.len()) as u64;
    if layout.size(SegmentKind::Kernel) < wanted {
        return Ok(false);
    }
    let mut head = [0u8; ARM64_MAGIC_OFFSET + ARM64_MAGIC.len()];
    source
        .read_at(layout.offset(SegmentKind::Kernel), &mut head)
        .map_err(LoaderError::read("kernel"))?;
    Ok(is_arm64_image(&head))
}

/// Copies the segment into claimed memory and clears the page padding.
fn load_segment(
    source: &mut impl Source,
    firmware: &mut impl Firmware,
    what: &'static str,
    range: AddressRange,
    offset: u64,
    size: u64,
) -> Result<(), LoaderError> {
    if range.is_empty() {
        return Ok(());
    }
    let size = usize::try_from(size).map_err(|_| LoaderError::Bug("segment size"))?;
    let memory = firmware.memory(range)?;
    let (data, padding) = memory
        .split_at_mut_checked(size)
        .ok_or(LoaderError::Bug("segment exceeds its extent"))?;
    source
        .read_at(offset, data)
        .map_err(LoaderError::read(what))?;
    padding.fill(0);

    debug!("Loaded {size} bytes of {what} to {range:?}");
    Ok(())
}

/// Patches the ramdisk at `loaded` and writes it to its final place.
///
/// Returns the final ramdisk range.
fn patch_ramdisk(
    firmware: &mut impl Firmware,
    storage: &mut impl Storage,
    plan: &mut MemoryPlan,
    loaded: AddressRange,
    size: u64,
    request: &LoadRequest<'_>,
    config: &LoaderConfig,
) -> Result<AddressRange, LoaderError> {
    let size = usize::try_from(size).map_err(|_| LoaderError::Bug("ramdisk size"))?;
    let raw: Vec<u8> = match firmware.memory(loaded)?.get(..size) {
        Some(bytes) => bytes.to_vec(),
        None => return Err(LoaderError::Bug("ramdisk exceeds its extent")),
    };

    let inflated;
    let original: &[u8] = if gzip::is_gzip(&raw) {
        inflated = ramdisk::inflate(firmware, &raw, config)?;
        &inflated
    } else {
        &raw
    };

    let injection = Injection::gather(storage, request.search_prefix, request.root_device, config);
    let patched = ramdisk::patch(original, &injection, config)?;
    let len = patched.len() as u64;

    let placed = plan.place_ramdisk(firmware, loaded, len, config.tag_area_size())?;
    let written = patched.write(firmware.memory(placed)?)?;
    if written as u64 != len {
        return Err(LoaderError::Bug("patched ramdisk size changed while writing"));
    }
    Ok(placed)
}

fn build_cmdline(
    firmware: &impl Firmware,
    header: &BootImageHeader,
    request: &LoadRequest<'_>,
    config: &LoaderConfig,
) -> Cmdline {
    let fragment = firmware
        .get_variable(VAR_ADDITIONAL_CMDLINE)
        .unwrap_or_default();
    CmdlineBuilder::new(header.cmdline(), header.extra_cmdline())
        .fragment(variable_str(&fragment))
        .args(request.args)
        .rdinit(request.multiboot.then_some(config.init_name()))
        .loader_path(config.loader_path_key(), request.loader_path)
        .build()
}

/// Writes the tag list into the claimed tag area and returns its length.
fn write_tag_list(
    firmware: &mut impl Firmware,
    tag_area: AddressRange,
    ramdisk: AddressRange,
    cmdline: &Cmdline,
) -> Result<u64, LoaderError> {
    let mem = mem_records(&coalesce(firmware.memory_map()?));
    let needed = tags_len(&mem, cmdline) as u64;
    if needed > tag_area.len() {
        return Err(LoaderError::BufferTooSmall {
            needed,
            available: tag_area.len(),
        });
    }
    Ok(write_tags(firmware.memory(tag_area)?, ramdisk, &mem, cmdline)? as u64)
}

/// Loads the boot image from `source` and prepares everything up to the jump.
///
/// The sequence is:
/// 1. Parse the header; a foreign magic fails before anything is allocated.
/// 2. Resolve load addresses and claim the tag area and every segment.
/// 3. Copy kernel, ramdisk and second stage to their addresses.
/// 4. With [`LoadRequest::multiboot`], patch the ramdisk and move it if it grew.
/// 5. Build the command line and write the tag list.
///
/// # Errors
/// * [`LoaderError::InvalidMagic`] / [`LoaderError::InvalidHeader`] for a foreign or broken header.
/// * [`LoaderError::Unsupported`] for images carrying a device tree.
/// * [`LoaderError::PrematureEnd`] if the image is shorter than its header claims.
/// * [`LoaderError::AllocationFailure`] if a segment's memory cannot be claimed.
/// * [`LoaderError::InvalidRamdiskFormat`] if the ramdisk to patch is not a cpio archive.
/// * [`LoaderError::BufferTooSmall`] if the patched ramdisk or the tags do not fit.
pub fn load(
    source: &mut impl Source,
    firmware: &mut impl Firmware,
    storage: &mut impl Storage,
    request: &LoadRequest<'_>,
    config: &LoaderConfig,
) -> Result<PreparedBoot, LoaderError> {
    let mut header = read_header(source)?;
    if header.dt_size != 0 {
        return Err(LoaderError::Unsupported("device tree"));
    }

    let layout = ImageLayout::of(&header)?;
    let required = required_len(&layout);
    if required > source.size() {
        return Err(LoaderError::PrematureEnd {
            what: "boot image",
            source: SourceError::PrematureEnd {
                offset: 0,
                len: required,
                size: source.size(),
            },
        });
    }

    let arm64 = detect_arm64(source, &layout)?;
    info!(
        "Boot image: {} kernel of {} bytes, ramdisk of {} bytes, second stage of {} bytes, page size {}",
        if arm64 { "arm64" } else { "arm" },
        header.kernel.size,
        header.ramdisk.size,
        header.second.size,
        layout.page_size()
    );

    let mut plan = MemoryPlan::resolve(&header, arm64, &*firmware);
    let tag_area = plan.claim(firmware, "tags", plan.tags(), config.tag_area_size())?;

    let mut loaded = [AddressRange::from_len(PhysicalAddress::zero(), 0); 3];
    for (slot, (what, kind, address)) in loaded.iter_mut().zip([
        ("kernel", SegmentKind::Kernel, plan.kernel()),
        ("ramdisk", SegmentKind::Ramdisk, plan.ramdisk()),
        ("second stage", SegmentKind::Second, plan.second()),
    ]) {
        *slot = plan.claim(firmware, what, address, layout.extent(kind))?;
        load_segment(
            source,
            firmware,
            what,
            *slot,
            layout.offset(kind),
            layout.size(kind),
        )?;
    }
    let [kernel, loaded_ramdisk, second] = loaded;
    let kernel = AddressRange::from_len(kernel.start(), layout.size(SegmentKind::Kernel));
    let second = AddressRange::from_len(second.start(), layout.size(SegmentKind::Second));

    let ramdisk = if request.multiboot {
        patch_ramdisk(
            firmware,
            storage,
            &mut plan,
            loaded_ramdisk,
            layout.size(SegmentKind::Ramdisk),
            request,
            config,
        )?
    } else {
        AddressRange::from_len(loaded_ramdisk.start(), layout.size(SegmentKind::Ramdisk))
    };

    let cmdline = build_cmdline(&*firmware, &header, request, config);
    let tags_len = write_tag_list(firmware, tag_area, ramdisk, &cmdline)?;

    header.kernel.addr = kernel.start();
    header.ramdisk.addr = ramdisk.start();
    header.ramdisk.size =
        u32::try_from(ramdisk.len()).map_err(|_| LoaderError::Bug("ramdisk size"))?;
    header.second.addr = second.start();
    header.tags_addr = tag_area.start();

    info!(
        "Prepared kernel at {}, ramdisk at {} ({} bytes), tags at {} ({tags_len} bytes)",
        kernel.start(),
        ramdisk.start(),
        ramdisk.len(),
        tag_area.start()
    );

    Ok(PreparedBoot {
        header,
        kernel,
        ramdisk,
        second,
        tags: tag_area.start(),
        tags_len,
        cmdline,
        arm64,
    })
}

/// Hands control to the prepared kernel.
///
/// Firmware resources are released, caches and the MMU disabled and the
/// kernel entered with `(0, machine type, tags)`. This only returns on
/// failure; a kernel that comes back yields [`LoaderError::KernelReturned`].
///
/// # Errors
/// * [`LoaderError::Firmware`] if the handoff could not be prepared.
/// * [`LoaderError::KernelReturned`] if the kernel returned.
pub fn boot(
    firmware: &mut impl Firmware,
    prepared: &PreparedBoot,
) -> Result<Infallible, LoaderError> {
    let handoff = prepared.handoff(machine_type(&*firmware));
    trace_handoff(&handoff);

    firmware.prepare_handoff()?;
    firmware.disable_caches();
    // SAFETY: `prepared` comes from `load`, which placed every segment and the tag list.
    unsafe { firmware.enter_kernel(&handoff)? };
    Err(LoaderError::KernelReturned)
}
