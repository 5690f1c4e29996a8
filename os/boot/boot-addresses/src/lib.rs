//! # Physical Addresses and Ranges
//!
//! Strongly typed wrappers for the physical addresses a boot loader juggles
//! while placing kernel, ramdisk and parameter blocks.
//!
//! ## Overview
//!
//! | Type | Description |
//! |------|-------------|
//! | [`PhysicalAddress`] | A raw 64-bit physical address. |
//! | [`AddressRange`] | A half-open `[start, end)` range of physical memory. |
//! | [`PageSize`] | A power-of-two page size known only at runtime. |
//! | [`Span`] | The smallest range covering a set of ranges. |
//!
//! Boot images declare their own page size in the header, so unlike kernel
//! paging code the page size is a value here, not a type parameter.
//!
//! ```rust
//! # use boot_addresses::*;
//! let page = PageSize::new(2048).unwrap();
//! let kernel = AddressRange::from_len(PhysicalAddress::new(0x1000_8000), 5000);
//! assert_eq!(page.align_up(kernel.len()), Some(6144));
//!
//! let mut span = Span::new();
//! span.include(kernel);
//! span.include(AddressRange::from_len(PhysicalAddress::new(0x1100_0000), 0x800));
//! assert_eq!(span.end(), Some(PhysicalAddress::new(0x1100_0800)));
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(clippy::inline_always)]

use core::fmt;

/// Page size of the platform allocator.
pub const PLATFORM_PAGE_SIZE: PageSize = PageSize(4096);

/// Physical memory address.
#[repr(transparent)]
#[derive(Copy, Clone, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct PhysicalAddress(u64);

impl PhysicalAddress {
    #[inline(always)]
    #[must_use]
    pub const fn new(v: u64) -> Self {
        Self(v)
    }

    #[inline(always)]
    #[must_use]
    pub const fn zero() -> Self {
        Self(0)
    }

    #[inline(always)]
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    #[inline]
    #[must_use]
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }

    /// Adds `rhs`, returning `None` on overflow.
    #[inline]
    #[must_use]
    pub const fn checked_add(self, rhs: u64) -> Option<Self> {
        match self.0.checked_add(rhs) {
            Some(v) => Some(Self(v)),
            None => None,
        }
    }

    /// Distance from `base` to `self`, `None` if `self` lies below `base`.
    #[inline]
    #[must_use]
    pub const fn offset_from(self, base: Self) -> Option<u64> {
        self.0.checked_sub(base.0)
    }

    /// Rounds up to the next multiple of `page`, `None` on overflow.
    #[inline]
    #[must_use]
    pub const fn align_up(self, page: PageSize) -> Option<Self> {
        match page.align_up(self.0) {
            Some(v) => Some(Self(v)),
            None => None,
        }
    }

    #[inline]
    #[must_use]
    pub const fn align_down(self, page: PageSize) -> Self {
        Self(page.align_down(self.0))
    }

    #[inline]
    #[must_use]
    pub const fn is_aligned(self, page: PageSize) -> bool {
        self.0 & page.mask() == 0
    }
}

impl fmt::Debug for PhysicalAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PA(0x{:016X})", self.0)
    }
}

impl fmt::Display for PhysicalAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08X}", self.0)
    }
}

impl From<u64> for PhysicalAddress {
    #[inline]
    fn from(v: u64) -> Self {
        Self::new(v)
    }
}

impl From<u32> for PhysicalAddress {
    #[inline]
    fn from(v: u32) -> Self {
        Self::new(u64::from(v))
    }
}

impl From<PhysicalAddress> for u64 {
    #[inline]
    fn from(a: PhysicalAddress) -> Self {
        a.as_u64()
    }
}

/// A power-of-two page size.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct PageSize(u64);

impl PageSize {
    /// Returns `None` unless `size` is a non-zero power of two.
    #[must_use]
    pub const fn new(size: u64) -> Option<Self> {
        if size.is_power_of_two() {
            Some(Self(size))
        } else {
            None
        }
    }

    #[inline(always)]
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }

    #[inline(always)]
    const fn mask(self) -> u64 {
        self.0 - 1
    }

    /// Rounds `value` up to a multiple of the page size, `None` on overflow.
    #[inline]
    #[must_use]
    pub const fn align_up(self, value: u64) -> Option<u64> {
        match value.checked_add(self.mask()) {
            Some(v) => Some(v & !self.mask()),
            None => None,
        }
    }

    #[inline]
    #[must_use]
    pub const fn align_down(self, value: u64) -> u64 {
        value & !self.mask()
    }

    /// Number of pages needed to hold `len` bytes.
    #[inline]
    #[must_use]
    pub const fn pages_for(self, len: u64) -> u64 {
        len.div_ceil(self.0)
    }
}

impl fmt::Debug for PageSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PageSize({})", self.0)
    }
}

impl fmt::Display for PageSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Half-open range `[start, end)` of physical memory.
#[derive(Copy, Clone, Default, Eq, PartialEq, Hash)]
pub struct AddressRange {
    start: PhysicalAddress,
    end: PhysicalAddress,
}

impl AddressRange {
    /// Range from `start` to `end`; an inverted pair yields an empty range at
    /// `start`.
    #[must_use]
    pub const fn new(start: PhysicalAddress, end: PhysicalAddress) -> Self {
        if end.0 < start.0 {
            Self { start, end: start }
        } else {
            Self { start, end }
        }
    }

    /// Range of `len` bytes at `start`, saturating at the top of the address
    /// space.
    #[must_use]
    pub const fn from_len(start: PhysicalAddress, len: u64) -> Self {
        Self {
            start,
            end: PhysicalAddress(start.0.saturating_add(len)),
        }
    }

    #[inline]
    #[must_use]
    pub const fn start(self) -> PhysicalAddress {
        self.start
    }

    #[inline]
    #[must_use]
    pub const fn end(self) -> PhysicalAddress {
        self.end
    }

    #[inline]
    #[must_use]
    pub const fn len(self) -> u64 {
        self.end.0 - self.start.0
    }

    #[inline]
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.end.0 == self.start.0
    }

    #[must_use]
    pub const fn contains(self, addr: PhysicalAddress) -> bool {
        self.start.0 <= addr.0 && addr.0 < self.end.0
    }

    /// Whether the two ranges share at least one byte.
    #[must_use]
    pub const fn overlaps(self, other: Self) -> bool {
        !self.is_empty() && !other.is_empty() && self.start.0 < other.end.0 && other.start.0 < self.end.0
    }

    /// Whether `other` starts exactly where `self` ends.
    #[must_use]
    pub const fn is_followed_by(self, other: Self) -> bool {
        self.end.0 == other.start.0
    }
}

impl fmt::Debug for AddressRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}..{})", self.start, self.end)
    }
}

/// Smallest range covering every range passed to [`Span::include`].
///
/// Empty ranges still contribute their start address.
#[derive(Copy, Clone, Default, Eq, PartialEq, Debug)]
pub struct Span {
    bounds: Option<(PhysicalAddress, PhysicalAddress)>,
}

impl Span {
    #[must_use]
    pub const fn new() -> Self {
        Self { bounds: None }
    }

    pub fn include(&mut self, range: AddressRange) {
        self.bounds = Some(match self.bounds {
            None => (range.start, range.end),
            Some((lo, hi)) => (lo.min(range.start), hi.max(range.end)),
        });
    }

    #[must_use]
    pub fn start(&self) -> Option<PhysicalAddress> {
        self.bounds.map(|(lo, _)| lo)
    }

    #[must_use]
    pub fn end(&self) -> Option<PhysicalAddress> {
        self.bounds.map(|(_, hi)| hi)
    }

    #[must_use]
    pub fn range(&self) -> Option<AddressRange> {
        self.bounds.map(|(lo, hi)| AddressRange::new(lo, hi))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_size_must_be_a_power_of_two() {
        assert!(PageSize::new(0).is_none());
        assert!(PageSize::new(3000).is_none());
        assert_eq!(PageSize::new(2048).map(PageSize::get), Some(2048));
        assert_eq!(PLATFORM_PAGE_SIZE.get(), 4096);
    }

    #[test]
    fn alignment_helpers() {
        let page = PageSize::new(2048).unwrap();
        assert_eq!(page.align_up(0), Some(0));
        assert_eq!(page.align_up(1), Some(2048));
        assert_eq!(page.align_up(2048), Some(2048));
        assert_eq!(page.align_up(u64::MAX), None);
        assert_eq!(page.align_down(4097), 4096);
        assert_eq!(page.pages_for(4097), 3);

        let a = PhysicalAddress::new(0x12345);
        assert_eq!(a.align_up(PLATFORM_PAGE_SIZE), Some(PhysicalAddress::new(0x13000)));
        assert_eq!(a.align_down(PLATFORM_PAGE_SIZE), PhysicalAddress::new(0x12000));
        assert!(!a.is_aligned(PLATFORM_PAGE_SIZE));
        assert!(PhysicalAddress::new(0x13000).is_aligned(PLATFORM_PAGE_SIZE));
    }

    #[test]
    fn address_arithmetic_reports_overflow() {
        let top = PhysicalAddress::new(u64::MAX - 0xF);
        assert_eq!(top.checked_add(0xF), Some(PhysicalAddress::new(u64::MAX)));
        assert_eq!(top.checked_add(0x10), None);
    }

    #[test]
    fn ranges() {
        let a = AddressRange::from_len(PhysicalAddress::new(0x1000), 0x1000);
        let b = AddressRange::from_len(PhysicalAddress::new(0x2000), 0x10);
        assert_eq!(a.len(), 0x1000);
        assert!(a.contains(PhysicalAddress::new(0x1fff)));
        assert!(!a.contains(PhysicalAddress::new(0x2000)));
        assert!(!a.overlaps(b));
        assert!(a.is_followed_by(b));
        assert!(a.overlaps(AddressRange::from_len(PhysicalAddress::new(0x1800), 0x1000)));
        assert!(AddressRange::new(PhysicalAddress::new(5), PhysicalAddress::new(1)).is_empty());
        assert_eq!(
            AddressRange::from_len(PhysicalAddress::new(u64::MAX - 1), 10).end(),
            PhysicalAddress::new(u64::MAX)
        );
    }

    #[test]
    fn span_covers_everything_included() {
        let mut span = Span::new();
        assert_eq!(span.range(), None);
        span.include(AddressRange::from_len(PhysicalAddress::new(0x8000), 0x100));
        span.include(AddressRange::from_len(PhysicalAddress::new(0x100), 0));
        span.include(AddressRange::from_len(PhysicalAddress::new(0x4000), 0x8000));
        assert_eq!(span.start(), Some(PhysicalAddress::new(0x100)));
        assert_eq!(span.end(), Some(PhysicalAddress::new(0xC000)));
    }

    #[test]
    fn formatting() {
        let pa = PhysicalAddress::new(0x1000_8000);
        assert_eq!(format!("{pa}"), "0x10008000");
        assert_eq!(format!("{pa:?}"), "PA(0x0000000010008000)");
        let r = AddressRange::from_len(pa, 0x10);
        assert_eq!(format!("{r:?}"), "[0x10008000..0x10008010)");
    }
}
