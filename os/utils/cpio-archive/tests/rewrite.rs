use cpio_archive::newc::{Appender, Records};
use cpio_archive::{Archive, CpioError, Entry, Mode, TRAILER_NAME, predicted_size};

fn initramfs() -> Vec<u8> {
    let mut archive = Archive::new(16);
    archive.push(Entry::directory(&b"."[..])).unwrap();
    archive.push(Entry::directory(&b"sbin"[..])).unwrap();
    archive.push(Entry::executable(&b"init"[..], &b"#!/bin/sh\nexec /sbin/real-init\n"[..])).unwrap();
    archive.push(Entry::file(&b"default.prop"[..], &b"ro.secure=1\n"[..])).unwrap();
    let mut out = vec![0u8; archive.encoded_len()];
    archive.encode(&mut out).unwrap();
    out
}

#[test]
fn nested_archive_is_merged_below_a_prefix() {
    let outer = initramfs();
    let nested = initramfs();

    let mut merged = Archive::decode(&outer, 32).unwrap().into_entries();
    merged.push(Entry::directory(&b"multiboot"[..]));
    for mut entry in Archive::decode(&nested, 32).unwrap().into_entries() {
        if entry.name() == b"." {
            continue;
        }
        let mut name = b"multiboot/".to_vec();
        name.extend_from_slice(entry.name());
        entry.rename(name);
        merged.push(entry);
    }

    let mut archive = Archive::new(32);
    for entry in merged {
        archive.push(entry).unwrap();
    }
    let mut out = vec![0u8; archive.encoded_len()];
    let len = archive.encode(&mut out).unwrap();

    let decoded = Archive::decode(&out[..len], 32).unwrap();
    assert_eq!(decoded.len(), 4 + 1 + 3);
    let init = decoded.find(b"multiboot/init").unwrap();
    assert_eq!(init.mode(), Mode::executable());
    assert_eq!(init.data(), b"#!/bin/sh\nexec /sbin/real-init\n");
    assert!(decoded.find(b"multiboot/.").is_none());
}

#[test]
fn replacing_an_entry_soft_deletes_the_old_one() {
    let bytes = initramfs();
    let mut archive = Archive::decode(&bytes, 32).unwrap();
    assert_eq!(archive.skip(b"init"), 1);
    archive.push(Entry::executable(&b"init"[..], &b"new"[..])).unwrap();

    let mut out = vec![0u8; archive.encoded_len()];
    let len = archive.encode(&mut out).unwrap();
    assert_eq!(len, bytes.len() - predicted_size(b"init", 31) + predicted_size(b"init", 3));

    let decoded = Archive::decode(&out[..len], 32).unwrap();
    let inits: Vec<_> = decoded.entries().iter().filter(|e| e.name() == b"init").collect();
    assert_eq!(inits.len(), 1);
    assert_eq!(inits[0].data(), b"new");
}

#[test]
fn both_codecs_agree_on_the_insertion_point() {
    let bytes = initramfs();
    let trailer = Records::new(&bytes).trailer_offset().unwrap();
    assert_eq!(trailer, bytes.len() - predicted_size(TRAILER_NAME, 0));

    let mut grown = bytes.clone();
    grown.resize(bytes.len() + 256, 0);
    let mut appender = Appender::at_trailer(&mut grown, bytes.len()).unwrap();
    appender.append(b"init.multiboot", Mode::executable(), b"ELF").unwrap();
    let len = appender.finish().unwrap();
    assert_eq!(len, bytes.len() + predicted_size(b"init.multiboot", 3));

    let decoded = Archive::decode(&grown[..len], 32).unwrap();
    assert_eq!(decoded.len(), 5);
    assert_eq!(decoded.entries()[4].name(), b"init.multiboot");
}

#[test]
fn garbage_is_not_an_archive() {
    let mut garbage = b"\x1f\x8b\x08\x00".to_vec();
    garbage.resize(256, b'.');
    let err = Archive::decode(&garbage, 8).unwrap_err();
    assert!(matches!(err, CpioError::BadArchive { offset: 0, .. }));
}
