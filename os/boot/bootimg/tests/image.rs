use boot_addresses::{PageSize, PhysicalAddress};
use bootimg::{BootImageError, BootImageHeader, ImageLayout, Segment, SegmentKind};

/// Builds an image the way `mkbootimg` lays it out.
fn build_image(kernel: &[u8], ramdisk: &[u8], page: u64) -> Vec<u8> {
    let mut header = BootImageHeader::new(PageSize::new(page).unwrap());
    header.kernel = Segment::new(u32::try_from(kernel.len()).unwrap(), 0x1000_8000);
    header.ramdisk = Segment::new(u32::try_from(ramdisk.len()).unwrap(), 0x1100_0000);
    header.tags_addr = PhysicalAddress::new(0x1000_0100);

    let layout = ImageLayout::of(&header).unwrap();
    let mut image = vec![0u8; usize::try_from(layout.image_len()).unwrap()];
    header.write(&mut image).unwrap();
    let k = usize::try_from(layout.offset(SegmentKind::Kernel)).unwrap();
    image[k..k + kernel.len()].copy_from_slice(kernel);
    let r = usize::try_from(layout.offset(SegmentKind::Ramdisk)).unwrap();
    image[r..r + ramdisk.len()].copy_from_slice(ramdisk);
    image
}

#[test]
fn segments_are_found_where_the_layout_says() {
    let image = build_image(b"KERNEL-PAYLOAD", b"RAMDISK", 4096);
    assert_eq!(image.len(), 3 * 4096);

    let header = BootImageHeader::parse(&image).unwrap();
    let layout = ImageLayout::of(&header).unwrap();
    let k = usize::try_from(layout.offset(SegmentKind::Kernel)).unwrap();
    let r = usize::try_from(layout.offset(SegmentKind::Ramdisk)).unwrap();
    assert_eq!(&image[k..k + 14], b"KERNEL-PAYLOAD");
    assert_eq!(&image[r..r + 7], b"RAMDISK");
    assert!(header.second.is_empty());
    assert_eq!(header.tags_addr, PhysicalAddress::new(0x1000_0100));
}

#[test]
fn a_page_sized_prefix_is_enough_to_parse() {
    let image = build_image(b"K", b"R", 2048);
    let header = BootImageHeader::parse(&image[..2048]).unwrap();
    // The extra command line area is read from the zeroed header page.
    assert!(header.extra_cmdline.is_some());
    assert!(header.extra_cmdline().is_empty());
    assert_eq!(header.page_size.get(), 2048);
}

#[test]
fn other_formats_are_refused() {
    let mut not_android = build_image(b"K", b"R", 2048);
    not_android[..8].copy_from_slice(b"\x7fELF\x02\x01\x01\x00");
    assert_eq!(
        BootImageHeader::parse(&not_android),
        Err(BootImageError::InvalidMagic)
    );
}

#[test]
fn long_command_lines_spill_into_the_extra_field() {
    let mut header = BootImageHeader::new(PageSize::new(2048).unwrap());
    let cmdline = b"x".repeat(700);
    header.set_cmdline(&cmdline).unwrap();

    let bytes = header.to_bytes().unwrap();
    assert_eq!(bytes.len(), bootimg::HEADER_WITH_EXTRA_LEN);

    let parsed = BootImageHeader::parse(&bytes).unwrap();
    assert_eq!(parsed.cmdline().len(), 511);
    assert_eq!(parsed.extra_cmdline().len(), 189);
    assert_eq!([parsed.cmdline(), parsed.extra_cmdline()].concat(), cmdline);
}
