//! Boot image assembly.

use crate::ToolError;
use bootimg::{BootImageHeader, ImageLayout, SegmentKind};

/// Segment contents of a boot image.
#[derive(Debug, Default)]
pub struct Payload {
    pub kernel: Vec<u8>,
    pub ramdisk: Vec<u8>,
    pub second: Vec<u8>,
}

fn size_field(what: &'static str, data: &[u8]) -> Result<u32, ToolError> {
    u32::try_from(data.len()).map_err(|_| ToolError::TooLarge(what))
}

/// Writes `header` with the segment sizes of `payload`, followed by every
/// segment at its page aligned offset.
///
/// # Errors
/// [`ToolError::TooLarge`] for a segment beyond 4 GiB, or a header error.
#[allow(clippy::cast_possible_truncation)]
pub fn assemble(mut header: BootImageHeader, payload: &Payload) -> Result<Vec<u8>, ToolError> {
    header.kernel.size = size_field("kernel", &payload.kernel)?;
    header.ramdisk.size = size_field("ramdisk", &payload.ramdisk)?;
    header.second.size = size_field("second stage", &payload.second)?;
    header.dt_size = 0;

    let layout = ImageLayout::of(&header)?;
    let len = usize::try_from(layout.image_len()).map_err(|_| ToolError::TooLarge("image"))?;
    let mut image = vec![0u8; len];
    header.write(&mut image)?;

    for (kind, data) in [
        (SegmentKind::Kernel, &payload.kernel),
        (SegmentKind::Ramdisk, &payload.ramdisk),
        (SegmentKind::Second, &payload.second),
    ] {
        let at = layout.offset(kind) as usize;
        image[at..at + data.len()].copy_from_slice(data);
    }
    Ok(image)
}
