use boot_protocol::{ATAG_CMDLINE, ATAG_NONE, TagWriter, cmdline_words, list_len};

fn word(buf: &[u8], index: usize) -> u32 {
    let b = &buf[index * 4..index * 4 + 4];
    u32::from_le_bytes([b[0], b[1], b[2], b[3]])
}

/// Follows `next = current + size` the way the kernel does and returns the
/// word index of the sentinel.
fn find_sentinel(buf: &[u8]) -> usize {
    let mut index = 0;
    loop {
        let size = word(buf, index) as usize;
        if size == 0 {
            assert_eq!(word(buf, index + 1), ATAG_NONE);
            return index;
        }
        index += size;
    }
}

#[test]
fn sentinel_is_reachable_for_every_cmdline_length() {
    for len in 0..40 {
        let cmdline = vec![b'c'; len];
        for regions in 0..4u32 {
            let mut buf = vec![0xEEu8; list_len(regions as usize, len)];
            let mut writer = TagWriter::new(&mut buf).unwrap();
            writer.initrd(0x1100_0000, 1).unwrap();
            for r in 0..regions {
                writer.memory(r * 0x1000_0000, 0x1000_0000).unwrap();
            }
            writer.cmdline(&cmdline).unwrap();
            let written = writer.finish().unwrap();
            assert_eq!(written, buf.len());

            let sentinel = find_sentinel(&buf);
            assert_eq!((sentinel + 2) * 4, written);
        }
    }
}

#[test]
fn cmdline_record_is_sized_from_the_string_length() {
    let cmdline = b"root=/dev/ram0 rdinit=/init.multiboot";
    let mut buf = vec![0u8; list_len(0, cmdline.len())];
    let mut writer = TagWriter::new(&mut buf).unwrap();
    writer.initrd(0, 0).unwrap();
    let at = writer.position() / 4;
    writer.cmdline(cmdline).unwrap();
    writer.finish().unwrap();

    assert_eq!(word(&buf, at + 1), ATAG_CMDLINE);
    let size = word(&buf, at);
    assert_eq!(size, cmdline_words(cmdline.len()));
    assert_eq!(size as usize, (cmdline.len() + 1).div_ceil(4) + 2);
    // The string is NUL-terminated inside the record.
    let payload = &buf[(at + 2) * 4..(at + size as usize) * 4];
    assert_eq!(&payload[..cmdline.len()], cmdline);
    assert_eq!(payload[cmdline.len()], 0);
}
