//! # Ramdisk Patching
//!
//! Adds the multiboot payload to the image's ramdisk:
//!
//! ```text
//! <inject_root>/              directory, plus one per subdirectory
//! <inject_root>/<file>        every file below <prefix>/<multiboot_dir>, mode 0755
//! <init_name>                 copy of <multiboot_dir>/<init_source>, mode 0755
//! <nested_name>/...           the root device's ramdisk (rewrite: merged)
//! <nested_name>               the root device's ramdisk (append: one file)
//! ```
//!
//! Files that cannot be read are logged and left out. Anything wrong with the
//! ramdisk itself aborts the patch.

use crate::config::{LoaderConfig, PatchStrategy};
use crate::gzip;
use crate::platform::{Firmware, FirmwareError, Storage};
use alloc::collections::BTreeSet;
use alloc::string::String;
use alloc::vec;
use alloc::vec::Vec;
use cpio_archive::{Archive, CpioError, Entry, Mode};
use log::{debug, info, warn};

#[cfg(feature = "newc")]
use cpio_archive::{TRAILER_NAME, newc, predicted_size};

#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PatchError {
    #[error("The ramdisk is not a cpio archive")]
    InvalidFormat(#[source] CpioError),
    #[error("The patched ramdisk needs {needed} bytes, only {available} are available")]
    BufferTooSmall { needed: u64, available: u64 },
    #[error("Unable to assemble the patched archive")]
    Archive(#[source] CpioError),
    #[error("Premature end of compressed ramdisk: got {actual} of {expected} bytes")]
    PrematureEnd { expected: u64, actual: u64 },
    #[error("Unable to inflate the ramdisk")]
    Decompress(#[source] FirmwareError),
    #[error("{0} is not supported")]
    Unsupported(&'static str),
}

impl PatchError {
    fn encode(e: CpioError) -> Self {
        match e {
            CpioError::BufferTooSmall { needed, available } => Self::BufferTooSmall {
                needed: needed as u64,
                available: available as u64,
            },
            other => Self::Archive(other),
        }
    }
}

/// Joins two `/` separated path fragments.
pub(crate) fn join(base: &str, name: &str) -> String {
    let base = base.trim_end_matches('/');
    let name = name.trim_start_matches('/');
    match (base.is_empty(), name.is_empty()) {
        (true, _) => String::from(name),
        (false, true) => String::from(base),
        (false, false) => {
            let mut path = String::with_capacity(base.len() + 1 + name.len());
            path.push_str(base);
            path.push('/');
            path.push_str(name);
            path
        }
    }
}

/// Whether `device` names a whole ramdisk device rather than a partition.
#[must_use]
pub fn is_ramdisk_device(device: &str) -> bool {
    device.starts_with("cd") && !device.contains(',')
}

/// Content to be added to the ramdisk.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Injection {
    /// Paths relative to the injection root, sorted, with their contents.
    pub files: Vec<(String, Vec<u8>)>,
    /// Contents of the init binary.
    pub init: Option<Vec<u8>>,
    /// The root device's ramdisk.
    pub nested: Option<Vec<u8>>,
}

impl Injection {
    /// Collects the multiboot files below `search_prefix` and, if `root_device`
    /// is a ramdisk, its whole contents.
    pub fn gather(
        storage: &mut impl Storage,
        search_prefix: &str,
        root_device: Option<&str>,
        config: &LoaderConfig,
    ) -> Self {
        let mut injection = Self::default();
        let dir = join(search_prefix, config.multiboot_dir());

        match storage.list_dir(&dir) {
            Ok(names) => {
                for name in names {
                    let path = join(&dir, &name);
                    match storage.read_file(&path) {
                        Ok(data) => {
                            if name == config.init_source() {
                                injection.init = Some(data.clone());
                            }
                            injection.files.push((name, data));
                        }
                        Err(e) => warn!("Skipping {path}: {e}"),
                    }
                }
            }
            Err(e) => warn!("No multiboot files in {dir}: {e}"),
        }
        injection.files.sort_by(|a, b| a.0.cmp(&b.0));

        if let Some(device) = root_device.filter(|d| is_ramdisk_device(d)) {
            match storage.read_device(device) {
                Ok(data) => injection.nested = Some(data),
                Err(e) => warn!("Skipping ramdisk device {device}: {e}"),
            }
        }

        debug!(
            "Injecting {} files, init: {}, nested ramdisk: {}",
            injection.files.len(),
            injection.init.is_some(),
            injection.nested.as_ref().map_or(0, Vec::len)
        );
        injection
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty() && self.init.is_none() && self.nested.is_none()
    }
}

/// One synthesized record.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Addition<'a> {
    name: String,
    mode: Mode,
    data: &'a [u8],
}

/// Directories, files and init, in write order. The nested ramdisk is
/// handled per strategy.
fn additions<'a>(injection: &'a Injection, config: &LoaderConfig) -> Vec<Addition<'a>> {
    let root = config.inject_root();
    let mut out = Vec::new();

    if !injection.files.is_empty() {
        let mut dirs = BTreeSet::new();
        let mut prefix = String::new();
        for part in root.split('/').filter(|p| !p.is_empty()) {
            prefix = join(&prefix, part);
            dirs.insert(prefix.clone());
        }
        for (name, _) in &injection.files {
            let path = join(root, name);
            let mut parent = path.as_str();
            while let Some((head, _)) = parent.rsplit_once('/') {
                dirs.insert(String::from(head));
                parent = head;
            }
        }

        out.extend(dirs.into_iter().map(|name| Addition {
            name,
            mode: Mode::directory(),
            data: &[],
        }));
        out.extend(injection.files.iter().map(|(name, data)| Addition {
            name: join(root, name),
            mode: Mode::executable(),
            data: data.as_slice(),
        }));
    }

    if let Some(init) = &injection.init {
        out.push(Addition {
            name: String::from(config.init_name()),
            mode: Mode::executable(),
            data: init.as_slice(),
        });
    }

    out
}

/// Adds `entry`, soft-deleting older entries with the same name.
fn replace<'a>(archive: &mut Archive<'a>, entry: Entry<'a>) -> Result<(), PatchError> {
    let replaced = archive.skip(entry.name());
    if replaced > 0 {
        debug!(
            "Replacing {} existing entries called {}",
            replaced,
            String::from_utf8_lossy(entry.name())
        );
    }
    archive.push(entry).map_err(PatchError::Archive)
}

fn merge_nested<'a>(
    archive: &mut Archive<'a>,
    nested: &'a [u8],
    config: &LoaderConfig,
) -> Result<(), PatchError> {
    let inner = match Archive::decode(nested, config.max_entries()) {
        Ok(inner) => inner,
        Err(e) => {
            warn!("Nested ramdisk is not a cpio archive, skipping it: {e}");
            return Ok(());
        }
    };

    let prefix = config.nested_name();
    replace(archive, Entry::directory(prefix.as_bytes().to_vec()))?;
    for mut entry in inner.into_entries() {
        if entry.name() == b"." {
            continue;
        }
        let mut name = Vec::with_capacity(prefix.len() + 1 + entry.name().len());
        name.extend_from_slice(prefix.as_bytes());
        name.push(b'/');
        name.extend_from_slice(entry.name());
        entry.rename(name);
        replace(archive, entry)?;
    }
    Ok(())
}

/// A patched ramdisk that has not been written yet.
#[derive(Debug)]
pub enum PatchedRamdisk<'a> {
    /// Fully decoded table, written out with the legacy codec.
    Rewrite(Archive<'a>),
    /// The original archive with records appended at its trailer.
    #[cfg(feature = "newc")]
    Append {
        original: &'a [u8],
        trailer: usize,
        additions: Vec<(String, Mode, &'a [u8])>,
    },
}

impl PatchedRamdisk<'_> {
    /// Exact size of the patched archive.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Rewrite(archive) => archive.encoded_len(),
            #[cfg(feature = "newc")]
            Self::Append {
                trailer, additions, ..
            } => {
                trailer
                    + additions
                        .iter()
                        .map(|(name, _, data)| predicted_size(name.as_bytes(), data.len()))
                        .sum::<usize>()
                    + predicted_size(TRAILER_NAME, 0)
            }
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Writes the archive to `dest` and returns its length.
    ///
    /// `dest` may be the memory the original ramdisk was loaded to.
    ///
    /// # Errors
    /// [`PatchError::BufferTooSmall`] if `dest` is shorter than [`PatchedRamdisk::len`].
    pub fn write(&self, dest: &mut [u8]) -> Result<usize, PatchError> {
        match self {
            Self::Rewrite(archive) => archive.encode(dest).map_err(PatchError::encode),
            #[cfg(feature = "newc")]
            Self::Append {
                original,
                additions,
                ..
            } => {
                let needed = self.len();
                if dest.len() < needed {
                    return Err(PatchError::BufferTooSmall {
                        needed: needed as u64,
                        available: dest.len() as u64,
                    });
                }
                let keep = original.len().min(dest.len());
                dest[..keep].copy_from_slice(&original[..keep]);

                let mut appender =
                    newc::Appender::at_trailer(dest, keep).map_err(PatchError::InvalidFormat)?;
                for (name, mode, data) in additions {
                    appender
                        .append(name.as_bytes(), *mode, data)
                        .map_err(PatchError::encode)?;
                }
                appender.finish().map_err(PatchError::encode)
            }
        }
    }
}

/// Plans the patch of `original` with `injection`.
///
/// # Errors
/// * [`PatchError::InvalidFormat`] if `original` is not a cpio archive.
/// * [`PatchError::BufferTooSmall`] if the result exceeds the configured maximum.
/// * [`PatchError::Archive`] if the entry table overflows.
pub fn patch<'a>(
    original: &'a [u8],
    injection: &'a Injection,
    config: &LoaderConfig,
) -> Result<PatchedRamdisk<'a>, PatchError> {
    let additions = additions(injection, config);

    let patched = match config.strategy() {
        PatchStrategy::Rewrite => {
            let mut archive = Archive::decode(original, config.max_entries())
                .map_err(PatchError::InvalidFormat)?;
            for addition in additions {
                replace(
                    &mut archive,
                    Entry::new(addition.name.into_bytes(), addition.mode, addition.data),
                )?;
            }
            if let Some(nested) = &injection.nested {
                merge_nested(&mut archive, nested, config)?;
            }
            PatchedRamdisk::Rewrite(archive)
        }
        #[cfg(feature = "newc")]
        PatchStrategy::Append => {
            let trailer = newc::Records::new(original)
                .trailer_offset()
                .map_err(PatchError::InvalidFormat)?;
            let mut additions: Vec<_> = additions
                .into_iter()
                .map(|a| (a.name, a.mode, a.data))
                .collect();
            if let Some(nested) = &injection.nested {
                additions.push((
                    String::from(config.nested_name()),
                    Mode::file(),
                    nested.as_slice(),
                ));
            }
            PatchedRamdisk::Append {
                original,
                trailer,
                additions,
            }
        }
        #[cfg(not(feature = "newc"))]
        PatchStrategy::Append => return Err(PatchError::Unsupported("in-place append")),
    };

    let needed = patched.len() as u64;
    if needed > config.max_ramdisk_size() {
        return Err(PatchError::BufferTooSmall {
            needed,
            available: config.max_ramdisk_size(),
        });
    }
    info!(
        "Ramdisk grows from {} to {} bytes",
        original.len(),
        patched.len()
    );
    Ok(patched)
}

/// Inflates a gzip ramdisk through the platform.
///
/// The output size is taken from the stream's trailing size field.
///
/// # Errors
/// * [`PatchError::PrematureEnd`] if fewer bytes come out than announced.
/// * [`PatchError::BufferTooSmall`] if the announced size exceeds the maximum.
/// * [`PatchError::Decompress`] for a corrupt stream.
pub fn inflate(
    firmware: &mut impl Firmware,
    compressed: &[u8],
    config: &LoaderConfig,
) -> Result<Vec<u8>, PatchError> {
    let expected = gzip::uncompressed_size(compressed)
        .map(u64::from)
        .ok_or(PatchError::Decompress(FirmwareError::Decompression))?;
    if expected > config.max_ramdisk_size() {
        return Err(PatchError::BufferTooSmall {
            needed: expected,
            available: config.max_ramdisk_size(),
        });
    }

    #[allow(clippy::cast_possible_truncation)]
    let mut out = vec![0u8; expected as usize];
    let actual = firmware
        .decompress(compressed, &mut out)
        .map_err(PatchError::Decompress)? as u64;
    if actual != expected {
        return Err(PatchError::PrematureEnd { expected, actual });
    }

    debug!("Inflated ramdisk from {} to {expected} bytes", compressed.len());
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn archive_of(entries: &[(&[u8], &[u8])]) -> Vec<u8> {
        let mut archive = Archive::new(16);
        for (name, data) in entries {
            archive.push(Entry::file(*name, *data)).unwrap();
        }
        let mut buf = vec![0u8; archive.encoded_len()];
        archive.encode(&mut buf).unwrap();
        buf
    }

    fn names(buf: &[u8]) -> Vec<String> {
        Archive::decode(buf, 64)
            .unwrap()
            .entries()
            .iter()
            .map(|e| String::from_utf8(e.name().to_vec()).unwrap())
            .collect()
    }

    fn written(patched: &PatchedRamdisk<'_>) -> Vec<u8> {
        let mut out = vec![0u8; patched.len()];
        assert_eq!(patched.write(&mut out).unwrap(), patched.len());
        out
    }

    #[test]
    fn join_paths() {
        assert_eq!(join("", "multiboot"), "multiboot");
        assert_eq!(join("/boot/", "/multiboot"), "/boot/multiboot");
        assert_eq!(join("a", ""), "a");
    }

    #[test]
    fn ramdisk_devices() {
        assert!(is_ramdisk_device("cd0"));
        assert!(!is_ramdisk_device("cd0,1"));
        assert!(!is_ramdisk_device("hd0"));
    }

    #[test]
    fn rewrite_adds_parents_before_files() {
        let original = archive_of(&[(&b"init"[..], &b"#!"[..])]);
        let injection = Injection {
            files: vec![
                (String::from("bin/tool"), b"T".to_vec()),
                (String::from("sbin/init"), b"I".to_vec()),
            ],
            init: Some(b"I".to_vec()),
            nested: None,
        };
        let config = LoaderConfig::DEFAULT.with_inject_root("boot/mb");
        let patched = patch(&original, &injection, &config).unwrap();
        assert_eq!(
            names(&written(&patched)),
            [
                "init",
                "boot",
                "boot/mb",
                "boot/mb/bin",
                "boot/mb/sbin",
                "boot/mb/bin/tool",
                "boot/mb/sbin/init",
                "init.multiboot"
            ]
        );
    }

    #[test]
    fn rewrite_replaces_colliding_entries() {
        let original = archive_of(&[
            (&b"init.multiboot"[..], &b"old"[..]),
            (&b"keep"[..], &b"k"[..]),
        ]);
        let injection = Injection {
            init: Some(b"new".to_vec()),
            ..Injection::default()
        };
        let patched = patch(&original, &injection, &LoaderConfig::DEFAULT).unwrap();
        let out = written(&patched);
        let decoded = Archive::decode(&out, 8).unwrap();
        assert_eq!(names(&out), ["keep", "init.multiboot"]);
        assert_eq!(decoded.find(b"init.multiboot").unwrap().data(), b"new");
        assert_eq!(
            decoded.find(b"init.multiboot").unwrap().mode(),
            Mode::executable()
        );
    }

    #[test]
    fn rewrite_merges_nested_ramdisk_without_dot() {
        let original = archive_of(&[(&b"a"[..], &b"1"[..])]);
        let nested = archive_of(&[(&b"."[..], &b""[..]), (&b"init"[..], &b"nested-init"[..])]);
        let injection = Injection {
            nested: Some(nested),
            ..Injection::default()
        };
        let patched = patch(&original, &injection, &LoaderConfig::DEFAULT).unwrap();
        let out = written(&patched);
        assert_eq!(names(&out), ["a", "grub_ramdisk", "grub_ramdisk/init"]);
        let decoded = Archive::decode(&out, 8).unwrap();
        assert_eq!(
            decoded.find(b"grub_ramdisk/init").unwrap().data(),
            b"nested-init"
        );
    }

    #[test]
    fn broken_nested_ramdisk_is_skipped() {
        let original = archive_of(&[(&b"a"[..], &b"1"[..])]);
        let injection = Injection {
            nested: Some(b"not an archive at all, definitely not one".repeat(4)),
            ..Injection::default()
        };
        let patched = patch(&original, &injection, &LoaderConfig::DEFAULT).unwrap();
        assert_eq!(names(&written(&patched)), ["a"]);
    }

    #[test]
    fn garbage_ramdisk_is_rejected() {
        let original = vec![b'x'; 256];
        let err = patch(&original, &Injection::default(), &LoaderConfig::DEFAULT).unwrap_err();
        assert!(matches!(err, PatchError::InvalidFormat(CpioError::BadArchive { .. })));
    }

    #[test]
    fn entry_bound_is_enforced() {
        let original = archive_of(&[(&b"a"[..], &b"1"[..]), (&b"b"[..], &b"2"[..])]);
        let injection = Injection {
            init: Some(b"x".to_vec()),
            ..Injection::default()
        };
        let config = LoaderConfig::DEFAULT.with_max_entries(2);
        assert_eq!(
            patch(&original, &injection, &config).unwrap_err(),
            PatchError::Archive(CpioError::TooManyEntries { limit: 2 })
        );
    }

    #[test]
    fn size_bound_is_enforced() {
        let original = archive_of(&[(&b"a"[..], &b"1"[..])]);
        let injection = Injection {
            init: Some(vec![0; 4096]),
            ..Injection::default()
        };
        let config = LoaderConfig::DEFAULT.with_max_ramdisk_size(1024);
        assert!(matches!(
            patch(&original, &injection, &config),
            Err(PatchError::BufferTooSmall {
                available: 1024,
                ..
            })
        ));
    }

    #[test]
    fn short_destination_is_reported() {
        let original = archive_of(&[(&b"a"[..], &b"1"[..])]);
        let injection = Injection::default();
        let patched = patch(&original, &injection, &LoaderConfig::DEFAULT).unwrap();
        let mut dest = vec![0u8; patched.len() - 4];
        assert!(matches!(
            patched.write(&mut dest),
            Err(PatchError::BufferTooSmall { .. })
        ));
    }

    #[cfg(feature = "newc")]
    #[test]
    fn append_keeps_original_bytes_and_adds_nested_as_file() {
        let original = archive_of(&[(&b"hello"[..], &b"world"[..])]);
        let injection = Injection {
            files: vec![(String::from("tool"), b"T".to_vec())],
            init: None,
            nested: Some(b"RAW".to_vec()),
        };
        let config = LoaderConfig::DEFAULT.with_strategy(PatchStrategy::Append);
        let patched = patch(&original, &injection, &config).unwrap();
        let out = written(&patched);

        let trailer = newc::Records::new(&original).trailer_offset().unwrap();
        assert_eq!(&out[..trailer], &original[..trailer]);
        assert_eq!(
            names(&out),
            ["hello", "multiboot", "multiboot/tool", "grub_ramdisk"]
        );
        let decoded = Archive::decode(&out, 8).unwrap();
        assert_eq!(decoded.find(b"grub_ramdisk").unwrap().data(), b"RAW");
    }

    #[cfg(feature = "newc")]
    #[test]
    fn append_requires_a_trailer() {
        let mut original = archive_of(&[(&b"hello"[..], &b"world"[..])]);
        original.truncate(original.len() - 124);
        let config = LoaderConfig::DEFAULT.with_strategy(PatchStrategy::Append);
        assert_eq!(
            patch(&original, &Injection::default(), &config).unwrap_err(),
            PatchError::InvalidFormat(CpioError::MissingTrailer)
        );
    }
}
