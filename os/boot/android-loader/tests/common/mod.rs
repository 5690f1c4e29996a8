//! Host stand-ins for the firmware and the boot filesystem.

#![allow(dead_code)]

use android_loader::{Firmware, FirmwareError, Handoff, Storage, StorageError, gzip};
use boot_addresses::{AddressRange, PageSize, PhysicalAddress};
use bootimg::{BootImageHeader, ImageLayout, Segment, SegmentKind};
use cpio_archive::{Archive, Entry};
use std::collections::BTreeMap;

pub const RAM_BASE: u64 = 0x1000_0000;
pub const RAM_SIZE: u64 = 32 * 1024 * 1024;
const PAGE: u64 = 4096;

pub const KERNEL_ADDR: u32 = 0x1000_8000;
pub const RAMDISK_ADDR: u32 = 0x1100_0000;
pub const SECOND_ADDR: u32 = 0x10f0_0000;
pub const TAGS_ADDR: u32 = 0x1000_0100;
pub const DEFAULT_MACHINE_TYPE: u32 = 3138;

pub fn range(start: u64, len: u64) -> AddressRange {
    AddressRange::from_len(PhysicalAddress::new(start), len)
}

/// 32 MiB of RAM with an allocation log.
pub struct MockFirmware {
    ram: Vec<u8>,
    pub allocations: Vec<AddressRange>,
    pub variables: BTreeMap<String, Vec<u8>>,
    pub calls: Vec<&'static str>,
    pub entered: Option<Handoff>,
    pub refuse_handoff: bool,
}

impl Default for MockFirmware {
    fn default() -> Self {
        Self {
            ram: vec![0xAA; RAM_SIZE as usize],
            allocations: Vec::new(),
            variables: BTreeMap::new(),
            calls: Vec::new(),
            entered: None,
            refuse_handoff: false,
        }
    }
}

impl MockFirmware {
    pub fn set_variable(&mut self, name: &str, value: &[u8]) {
        self.variables.insert(name.to_string(), value.to_vec());
    }

    /// Bytes of RAM, allocated or not.
    pub fn read(&self, range: AddressRange) -> &[u8] {
        let start = (range.start().as_u64() - RAM_BASE) as usize;
        &self.ram[start..start + range.len() as usize]
    }

    fn is_free(&self, range: AddressRange) -> bool {
        !self.allocations.iter().any(|a| a.overlaps(range))
    }

    fn in_ram(range: AddressRange) -> bool {
        range.start().as_u64() >= RAM_BASE && range.end().as_u64() <= RAM_BASE + RAM_SIZE
    }
}

impl Firmware for MockFirmware {
    fn allocate_at(&mut self, range: AddressRange) -> Result<AddressRange, FirmwareError> {
        assert_eq!(range.start().as_u64() % PAGE, 0, "unaligned claim {range:?}");
        assert_eq!(range.end().as_u64() % PAGE, 0, "unaligned claim {range:?}");
        if !Self::in_ram(range) || !self.is_free(range) {
            return Err(FirmwareError::AddressUnavailable(range.start()));
        }
        self.allocations.push(range);
        Ok(range)
    }

    fn allocate_above(
        &mut self,
        minimum: PhysicalAddress,
        size: u64,
    ) -> Result<AddressRange, FirmwareError> {
        let size = size.div_ceil(PAGE) * PAGE;
        let mut start = minimum.as_u64().max(RAM_BASE).div_ceil(PAGE) * PAGE;
        loop {
            let candidate = range(start, size);
            if !Self::in_ram(candidate) {
                return Err(FirmwareError::OutOfResources);
            }
            match self.allocations.iter().find(|a| a.overlaps(candidate)) {
                Some(hit) => start = hit.end().as_u64().div_ceil(PAGE) * PAGE,
                None => {
                    self.allocations.push(candidate);
                    return Ok(candidate);
                }
            }
        }
    }

    fn memory(&mut self, range: AddressRange) -> Result<&mut [u8], FirmwareError> {
        if range.is_empty() {
            return Ok(&mut self.ram[..0]);
        }
        let claimed = self
            .allocations
            .iter()
            .any(|a| a.start() <= range.start() && range.end() <= a.end());
        if !claimed {
            return Err(FirmwareError::NotAllocated(range));
        }
        let start = (range.start().as_u64() - RAM_BASE) as usize;
        Ok(&mut self.ram[start..start + range.len() as usize])
    }

    fn memory_map(&self) -> Result<Vec<AddressRange>, FirmwareError> {
        // Two halves, reported out of order, that coalesce into one bank.
        let half = RAM_SIZE / 2;
        Ok(vec![range(RAM_BASE + half, half), range(RAM_BASE, half)])
    }

    fn get_variable(&self, name: &str) -> Option<Vec<u8>> {
        self.variables.get(name).cloned()
    }

    fn default_machine_type(&self) -> u32 {
        DEFAULT_MACHINE_TYPE
    }

    fn decompress(&mut self, src: &[u8], dst: &mut [u8]) -> Result<usize, FirmwareError> {
        let payload = gzip::deflate_payload(src).ok_or(FirmwareError::Decompression)?;
        let out = miniz_oxide::inflate::decompress_to_vec(payload)
            .map_err(|_| FirmwareError::Decompression)?;
        let target = dst
            .get_mut(..out.len())
            .ok_or(FirmwareError::Decompression)?;
        target.copy_from_slice(&out);
        Ok(out.len())
    }

    fn prepare_handoff(&mut self) -> Result<(), FirmwareError> {
        self.calls.push("prepare_handoff");
        if self.refuse_handoff {
            return Err(FirmwareError::Platform("stale memory map"));
        }
        Ok(())
    }

    fn disable_caches(&mut self) {
        self.calls.push("disable_caches");
    }

    unsafe fn enter_kernel(&mut self, handoff: &Handoff) -> Result<(), FirmwareError> {
        self.calls.push("enter_kernel");
        self.entered = Some(*handoff);
        Ok(())
    }
}

/// Files keyed by their full path, devices by name.
#[derive(Default)]
pub struct MockStorage {
    pub files: BTreeMap<String, Vec<u8>>,
    pub devices: BTreeMap<String, Vec<u8>>,
    pub unreadable: Vec<String>,
}

impl MockStorage {
    pub fn with_file(mut self, path: &str, data: &[u8]) -> Self {
        self.files.insert(path.to_string(), data.to_vec());
        self
    }

    pub fn with_device(mut self, name: &str, data: &[u8]) -> Self {
        self.devices.insert(name.to_string(), data.to_vec());
        self
    }
}

impl Storage for MockStorage {
    fn list_dir(&mut self, dir: &str) -> Result<Vec<String>, StorageError> {
        let prefix = format!("{}/", dir.trim_end_matches('/'));
        let names: Vec<String> = self
            .files
            .keys()
            .filter_map(|path| path.strip_prefix(&prefix))
            .map(str::to_string)
            .collect();
        if names.is_empty() {
            return Err(StorageError::NotFound);
        }
        Ok(names)
    }

    fn read_file(&mut self, path: &str) -> Result<Vec<u8>, StorageError> {
        if self.unreadable.iter().any(|p| p == path) {
            return Err(StorageError::Io("sector checksum"));
        }
        self.files.get(path).cloned().ok_or(StorageError::NotFound)
    }

    fn read_device(&mut self, device: &str) -> Result<Vec<u8>, StorageError> {
        self.devices.get(device).cloned().ok_or(StorageError::NotFound)
    }
}

/// Boot image assembled the way `mkbootimg` lays it out.
pub struct TestImage {
    pub header: BootImageHeader,
    pub kernel: Vec<u8>,
    pub ramdisk: Vec<u8>,
    pub second: Vec<u8>,
    pub device_tree: Vec<u8>,
}

impl TestImage {
    pub fn new(kernel: &[u8], ramdisk: &[u8]) -> Self {
        let mut header = BootImageHeader::new(PageSize::new(2048).unwrap());
        header.kernel = Segment::new(0, KERNEL_ADDR);
        header.ramdisk = Segment::new(0, RAMDISK_ADDR);
        header.second = Segment::new(0, SECOND_ADDR);
        header.tags_addr = PhysicalAddress::from(TAGS_ADDR);
        header.set_cmdline(b"console=ttyS0").unwrap();
        Self {
            header,
            kernel: kernel.to_vec(),
            ramdisk: ramdisk.to_vec(),
            second: Vec::new(),
            device_tree: Vec::new(),
        }
    }

    pub fn with_second(mut self, second: &[u8]) -> Self {
        self.second = second.to_vec();
        self
    }

    pub fn with_device_tree(mut self, device_tree: &[u8]) -> Self {
        self.device_tree = device_tree.to_vec();
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let mut header = self.header.clone();
        header.kernel.size = u32::try_from(self.kernel.len()).unwrap();
        header.ramdisk.size = u32::try_from(self.ramdisk.len()).unwrap();
        header.second.size = u32::try_from(self.second.len()).unwrap();
        header.dt_size = u32::try_from(self.device_tree.len()).unwrap();

        let layout = ImageLayout::of(&header).unwrap();
        let mut image = vec![0u8; layout.image_len() as usize];
        header.write(&mut image).unwrap();
        for (kind, data) in [
            (SegmentKind::Kernel, &self.kernel),
            (SegmentKind::Ramdisk, &self.ramdisk),
            (SegmentKind::Second, &self.second),
            (SegmentKind::DeviceTree, &self.device_tree),
        ] {
            let at = layout.offset(kind) as usize;
            image[at..at + data.len()].copy_from_slice(data);
        }
        image
    }
}

/// Legacy cpio archive of regular files.
pub fn cpio(files: &[(&str, &[u8])]) -> Vec<u8> {
    let mut archive = Archive::new(64);
    for (name, data) in files {
        archive
            .push(Entry::file(name.as_bytes(), *data))
            .unwrap();
    }
    let mut buf = vec![0u8; archive.encoded_len()];
    archive.encode(&mut buf).unwrap();
    buf
}

/// Names and contents of every entry in `buf`.
pub fn entries(buf: &[u8]) -> Vec<(String, Vec<u8>)> {
    Archive::decode(buf, 256)
        .unwrap()
        .entries()
        .iter()
        .map(|e| (String::from_utf8(e.name().to_vec()).unwrap(), e.data().to_vec()))
        .collect()
}

/// Single gzip member around `data`. The CRC is left zero.
pub fn gzip(data: &[u8]) -> Vec<u8> {
    let mut out = vec![0x1f, 0x8b, 8, 0, 0, 0, 0, 0, 0, 3];
    out.extend(miniz_oxide::deflate::compress_to_vec(data, 6));
    out.extend(0u32.to_le_bytes());
    out.extend(u32::try_from(data.len()).unwrap().to_le_bytes());
    out
}
