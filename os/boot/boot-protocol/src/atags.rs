//! # Record Layouts

/// Ends the list.
pub const ATAG_NONE: u32 = 0x0000_0000;
/// First record of every list.
pub const ATAG_CORE: u32 = 0x5441_0001;
/// One contiguous region of physical memory.
pub const ATAG_MEM: u32 = 0x5441_0002;
/// Physical location of the initial ramdisk.
pub const ATAG_INITRD2: u32 = 0x5442_0005;
/// Kernel command line.
pub const ATAG_CMDLINE: u32 = 0x5441_0009;

/// Header preceding every record.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct TagHeader {
    /// Record size in 32-bit words, header included.
    pub size: u32,
    pub tag: u32,
}

/// Flags word of a full [`TagCore`].
#[bitfield_struct::bitfield(u32)]
#[derive(PartialEq, Eq)]
pub struct CoreFlags {
    /// Mount the root device read-only.
    pub read_only: bool,
    #[bits(31)]
    __: u32,
}

/// Payload of a full `ATAG_CORE` record.
///
/// The payload is optional; a core record of [`CORE_SHORT_WORDS`] carries no
/// root device at all.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct TagCore {
    pub flags: CoreFlags,
    pub page_size: u32,
    pub root_dev: u32,
}

/// Payload of `ATAG_MEM`. Note the size comes first.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct TagMem32 {
    pub size: u32,
    pub start: u32,
}

/// Payload of `ATAG_INITRD2`.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct TagInitrd {
    pub start: u32,
    pub size: u32,
}

/// Size in words of a record with payload `T`.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub const fn tag_words<T>() -> u32 {
    ((size_of::<TagHeader>() + size_of::<T>()) / 4) as u32
}

/// Size in words of a core record without root device.
#[allow(clippy::cast_possible_truncation)]
pub const CORE_SHORT_WORDS: u32 = (size_of::<TagHeader>() / 4) as u32;

/// Size in words of the command-line record for a string of `len` bytes:
/// the string plus its NUL, rounded up to whole words, plus the header.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub const fn cmdline_words(len: usize) -> u32 {
    (((len + 1 + 3) & !3) / 4) as u32 + CORE_SHORT_WORDS
}

const _: () = {
    assert!(size_of::<TagHeader>() == 8);
    assert!(tag_words::<TagMem32>() == 4);
    assert!(tag_words::<TagInitrd>() == 4);
    assert!(tag_words::<TagCore>() == 5);
    assert!(cmdline_words(0) == 3);
    assert!(cmdline_words(3) == 3);
    assert!(cmdline_words(4) == 4);
};
