//! Directory to legacy cpio archive.

use crate::ToolError;
use cpio_archive::{Archive, Entry};
use std::fs;
use std::path::Path;

#[cfg(unix)]
fn is_executable(meta: &fs::Metadata) -> bool {
    use std::os::unix::fs::PermissionsExt;
    meta.permissions().mode() & 0o111 != 0
}

#[cfg(not(unix))]
const fn is_executable(_meta: &fs::Metadata) -> bool {
    false
}

/// Archive paths (relative, `/` separated) below `dir`, directories before
/// their contents, siblings sorted by name.
fn collect(
    dir: &Path,
    prefix: &str,
    out: &mut Vec<Entry<'static>>,
) -> Result<(), ToolError> {
    let mut children = fs::read_dir(dir)?.collect::<Result<Vec<_>, _>>()?;
    children.sort_by_key(fs::DirEntry::file_name);

    for child in children {
        let name = child
            .file_name()
            .into_string()
            .map_err(|_| ToolError::NonUtf8Name(child.path()))?;
        let path = if prefix.is_empty() {
            name
        } else {
            format!("{prefix}/{name}")
        };

        let meta = child.metadata()?;
        if meta.is_dir() {
            out.push(Entry::directory(path.clone().into_bytes()));
            collect(&child.path(), &path, out)?;
        } else if meta.is_file() {
            let data = fs::read(child.path())?;
            out.push(if is_executable(&meta) {
                Entry::executable(path.into_bytes(), data)
            } else {
                Entry::file(path.into_bytes(), data)
            });
        }
    }
    Ok(())
}

/// Packs every directory and regular file below `dir` into a legacy cpio archive.
///
/// # Errors
/// I/O errors, non UTF-8 file names, or entries the archive format cannot hold.
pub fn pack_dir(dir: &Path) -> Result<Vec<u8>, ToolError> {
    let mut entries = Vec::new();
    collect(dir, "", &mut entries)?;

    let mut archive = Archive::new(entries.len());
    for entry in entries {
        archive.push(entry)?;
    }

    let mut buf = vec![0u8; archive.encoded_len()];
    let written = archive.encode(&mut buf)?;
    buf.truncate(written);
    Ok(buf)
}
