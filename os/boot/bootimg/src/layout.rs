use boot_addresses::PageSize;

use crate::{BootImageError, BootImageHeader};

/// Offset of the arm64 `Image` magic within the kernel segment.
pub const ARM64_MAGIC_OFFSET: usize = 0x38;

/// `"ARM\x64"`, marks a 64-bit ARM kernel `Image`.
pub const ARM64_MAGIC: &[u8; 4] = b"ARM\x64";

/// Whether a kernel segment starting with `kernel_head` is an arm64 `Image`.
#[must_use]
pub fn is_arm64_image(kernel_head: &[u8]) -> bool {
    kernel_head
        .get(ARM64_MAGIC_OFFSET..ARM64_MAGIC_OFFSET + ARM64_MAGIC.len())
        .is_some_and(|magic| magic == ARM64_MAGIC)
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SegmentKind {
    Kernel,
    Ramdisk,
    Second,
    DeviceTree,
}

/// Byte offsets and page-rounded extents of all segments within an image.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ImageLayout {
    page_size: PageSize,
    offsets: [u64; 4],
    sizes: [u64; 4],
    extents: [u64; 4],
}

impl ImageLayout {
    /// Computes where each segment lives in the image.
    ///
    /// # Errors
    /// [`BootImageError::LayoutOverflow`] if an offset does not fit 64 bits.
    pub fn of(header: &BootImageHeader) -> Result<Self, BootImageError> {
        let page_size = header.page_size;
        let sizes = [
            u64::from(header.kernel.size),
            u64::from(header.ramdisk.size),
            u64::from(header.second.size),
            u64::from(header.dt_size),
        ];

        let mut offsets = [0; 4];
        let mut extents = [0; 4];
        let mut cursor = page_size.get();
        for ((offset, extent), size) in offsets.iter_mut().zip(extents.iter_mut()).zip(sizes) {
            *offset = cursor;
            *extent = page_size
                .align_up(size)
                .ok_or(BootImageError::LayoutOverflow)?;
            cursor = cursor
                .checked_add(*extent)
                .ok_or(BootImageError::LayoutOverflow)?;
        }

        Ok(Self {
            page_size,
            offsets,
            sizes,
            extents,
        })
    }

    const fn index(kind: SegmentKind) -> usize {
        match kind {
            SegmentKind::Kernel => 0,
            SegmentKind::Ramdisk => 1,
            SegmentKind::Second => 2,
            SegmentKind::DeviceTree => 3,
        }
    }

    #[must_use]
    pub const fn page_size(&self) -> PageSize {
        self.page_size
    }

    /// Byte offset of the segment from the start of the image.
    #[must_use]
    pub const fn offset(&self, kind: SegmentKind) -> u64 {
        self.offsets[Self::index(kind)]
    }

    /// Size of the segment as declared in the header.
    #[must_use]
    pub const fn size(&self, kind: SegmentKind) -> u64 {
        self.sizes[Self::index(kind)]
    }

    /// Size of the segment rounded up to whole pages.
    #[must_use]
    pub const fn extent(&self, kind: SegmentKind) -> u64 {
        self.extents[Self::index(kind)]
    }

    /// Total image size implied by the header.
    #[must_use]
    pub const fn image_len(&self) -> u64 {
        self.offsets[3] + self.extents[3]
    }
}
