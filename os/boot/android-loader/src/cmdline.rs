//! # Kernel Command Line
//!
//! The command line handed to the kernel is assembled from, in order:
//!
//! 1. the image header's command line (with its extra part),
//! 2. a platform supplied fragment,
//! 3. the arguments given to the loader, escaped,
//! 4. `rdinit=/<init>` when the ramdisk was patched,
//! 5. `<key>=<loader path>`.
//!
//! Parts 2 to 5 are separated from what precedes them by one space.

use alloc::vec::Vec;

fn needs_escape(b: u8) -> bool {
    matches!(b, b'\\' | b'\'' | b'"')
}

fn escaped_arg_len(arg: &str) -> usize {
    let quotes = if arg.contains(' ') { 2 } else { 0 };
    arg.len() + arg.bytes().filter(|&b| needs_escape(b)).count() + quotes
}

/// Length of `args` once escaped and joined by spaces.
#[must_use]
pub fn escaped_len(args: &[&str]) -> usize {
    args.iter().map(|arg| escaped_arg_len(arg)).sum::<usize>() + args.len().saturating_sub(1)
}

/// Appends `args` joined by spaces.
///
/// Backslashes and quotes are escaped with a backslash; an argument with a
/// space is wrapped in double quotes.
pub fn escape_args(args: &[&str], out: &mut Vec<u8>) {
    for (i, arg) in args.iter().enumerate() {
        if i > 0 {
            out.push(b' ');
        }
        let quoted = arg.contains(' ');
        if quoted {
            out.push(b'"');
        }
        for b in arg.bytes() {
            if needs_escape(b) {
                out.push(b'\\');
            }
            out.push(b);
        }
        if quoted {
            out.push(b'"');
        }
    }
}

/// Bytes of a platform variable up to the first NUL.
#[must_use]
pub fn variable_str(raw: &[u8]) -> &[u8] {
    let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
    &raw[..end]
}

/// The parts of a command line.
#[derive(Debug, Copy, Clone, Default)]
pub struct CmdlineBuilder<'a> {
    header: &'a [u8],
    header_extra: &'a [u8],
    fragment: &'a [u8],
    args: &'a [&'a str],
    rdinit: Option<&'a str>,
    key: &'a str,
    loader_path: &'a str,
}

impl<'a> CmdlineBuilder<'a> {
    #[must_use]
    pub const fn new(header: &'a [u8], header_extra: &'a [u8]) -> Self {
        Self {
            header,
            header_extra,
            fragment: &[],
            args: &[],
            rdinit: None,
            key: "",
            loader_path: "",
        }
    }

    /// Platform fragment, skipped when empty.
    #[must_use]
    pub const fn fragment(mut self, fragment: &'a [u8]) -> Self {
        self.fragment = fragment;
        self
    }

    /// Loader arguments, skipped when empty.
    #[must_use]
    pub const fn args(mut self, args: &'a [&'a str]) -> Self {
        self.args = args;
        self
    }

    /// Init binary inside the ramdisk, without the leading slash.
    #[must_use]
    pub const fn rdinit(mut self, init: Option<&'a str>) -> Self {
        self.rdinit = init;
        self
    }

    /// `key=path` announcing where the loader was started from.
    #[must_use]
    pub const fn loader_path(mut self, key: &'a str, path: &'a str) -> Self {
        self.key = key;
        self.loader_path = path;
        self
    }

    /// Length of the built command line, terminating NUL excluded.
    #[must_use]
    pub fn predicted_len(&self) -> usize {
        let mut len = self.header.len() + self.header_extra.len();
        if !self.fragment.is_empty() {
            len += 1 + self.fragment.len();
        }
        if !self.args.is_empty() {
            len += 1 + escaped_len(self.args);
        }
        if let Some(init) = self.rdinit {
            len += " rdinit=/".len() + init.len();
        }
        if !self.key.is_empty() {
            len += 1 + self.key.len() + 1 + self.loader_path.len();
        }
        len
    }

    /// Builds the NUL terminated command line.
    #[must_use]
    pub fn build(&self) -> Cmdline {
        let predicted = self.predicted_len();
        let mut bytes = Vec::with_capacity(predicted + 1);

        bytes.extend_from_slice(self.header);
        bytes.extend_from_slice(self.header_extra);
        if !self.fragment.is_empty() {
            bytes.push(b' ');
            bytes.extend_from_slice(self.fragment);
        }
        if !self.args.is_empty() {
            bytes.push(b' ');
            escape_args(self.args, &mut bytes);
        }
        if let Some(init) = self.rdinit {
            bytes.extend_from_slice(b" rdinit=/");
            bytes.extend_from_slice(init.as_bytes());
        }
        if !self.key.is_empty() {
            bytes.push(b' ');
            bytes.extend_from_slice(self.key.as_bytes());
            bytes.push(b'=');
            bytes.extend_from_slice(self.loader_path.as_bytes());
        }

        debug_assert_eq!(bytes.len(), predicted);
        bytes.push(0);
        Cmdline { bytes }
    }
}

/// A NUL terminated kernel command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cmdline {
    bytes: Vec<u8>,
}

impl Cmdline {
    /// Without the terminating NUL.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        self.bytes.strip_suffix(&[0]).unwrap_or(&self.bytes)
    }

    #[must_use]
    pub fn as_bytes_with_nul(&self) -> &[u8] {
        &self.bytes
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
