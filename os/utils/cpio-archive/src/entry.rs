use alloc::borrow::Cow;
use alloc::vec::Vec;

use crate::header::{Header, entry_size};
use crate::{CpioError, Mode};

/// Where an entry's header comes from when it is written out again.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum EntryKind {
    /// Header decoded from an existing archive, written back unchanged apart
    /// from the size fields.
    Preserved(Header),
    /// Fresh header with the given mode and all other fields zero.
    Synthesized(Mode),
}

/// One archive member.
///
/// Decoded entries borrow name and data from the archive buffer; synthesized
/// entries usually own them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry<'a> {
    name: Cow<'a, [u8]>,
    data: Cow<'a, [u8]>,
    kind: EntryKind,
    skip: bool,
}

impl<'a> Entry<'a> {
    pub(crate) const fn decoded(header: Header, name: &'a [u8], data: &'a [u8]) -> Self {
        Self {
            name: Cow::Borrowed(name),
            data: Cow::Borrowed(data),
            kind: EntryKind::Preserved(header),
            skip: false,
        }
    }

    /// Creates an entry with a synthesized header.
    pub fn new(
        name: impl Into<Cow<'a, [u8]>>,
        mode: Mode,
        data: impl Into<Cow<'a, [u8]>>,
    ) -> Self {
        Self {
            name: name.into(),
            data: data.into(),
            kind: EntryKind::Synthesized(mode),
            skip: false,
        }
    }

    /// A regular `0o100644` file.
    pub fn file(name: impl Into<Cow<'a, [u8]>>, data: impl Into<Cow<'a, [u8]>>) -> Self {
        Self::new(name, Mode::file(), data)
    }

    /// A regular `0o100755` file.
    pub fn executable(name: impl Into<Cow<'a, [u8]>>, data: impl Into<Cow<'a, [u8]>>) -> Self {
        Self::new(name, Mode::executable(), data)
    }

    /// A `0o40755` directory without data.
    pub fn directory(name: impl Into<Cow<'a, [u8]>>) -> Self {
        Self::new(name, Mode::directory(), Vec::new())
    }

    /// Name without the terminating NUL.
    #[must_use]
    pub fn name(&self) -> &[u8] {
        &self.name
    }

    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    #[must_use]
    pub const fn kind(&self) -> EntryKind {
        self.kind
    }

    #[must_use]
    pub const fn mode(&self) -> Mode {
        match self.kind {
            EntryKind::Preserved(header) => header.mode,
            EntryKind::Synthesized(mode) => mode,
        }
    }

    /// Whether the entry is left out when the archive is written.
    #[must_use]
    pub const fn is_skipped(&self) -> bool {
        self.skip
    }

    /// Soft-deletes the entry: it stays in the table but is not written.
    pub const fn set_skipped(&mut self, skip: bool) {
        self.skip = skip;
    }

    /// Replaces the name, e.g. to move a nested archive member below a prefix.
    pub fn rename(&mut self, name: impl Into<Cow<'a, [u8]>>) {
        self.name = name.into();
    }

    /// `namesize` as written into the header, including the NUL.
    #[must_use]
    pub fn namesize(&self) -> usize {
        self.name.len() + 1
    }

    /// Bytes this entry occupies when written.
    #[must_use]
    pub fn encoded_len(&self) -> usize {
        entry_size(self.namesize(), self.data.len())
    }

    /// Header to write for this entry, with size fields filled in.
    ///
    /// # Errors
    /// * [`CpioError::EmptyName`] for an entry without a name.
    /// * [`CpioError::FieldOverflow`] when a size does not fit a header field.
    pub fn header(&self) -> Result<Header, CpioError> {
        if self.name.is_empty() {
            return Err(CpioError::EmptyName);
        }
        let mut header = match self.kind {
            EntryKind::Preserved(header) => header,
            EntryKind::Synthesized(mode) => Header::with_mode(mode),
        };
        header.namesize = crate::header::field_value(self.namesize())?;
        header.filesize = crate::header::field_value(self.data.len())?;
        Ok(header)
    }

    /// Detaches the entry from the buffer it was decoded from.
    #[must_use]
    pub fn into_owned(self) -> Entry<'static> {
        Entry {
            name: Cow::Owned(self.name.into_owned()),
            data: Cow::Owned(self.data.into_owned()),
            kind: self.kind,
            skip: self.skip,
        }
    }
}
