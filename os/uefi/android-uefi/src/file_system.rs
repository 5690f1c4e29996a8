//! Files on the volume the application was loaded from.
//!
//! Paths use `/` as separator; they are converted to UEFI's `\` here.

use alloc::format;
use alloc::string::{String, ToString};
use alloc::vec;
use alloc::vec::Vec;
use android_loader::{FileReader, StorageError};
use log::{debug, warn};
use uefi::proto::media::file::{Directory, File, FileAttribute, FileHandle, FileMode, RegularFile};
use uefi::{CString16, Status, boot};

fn uefi_path(path: &str) -> Result<CString16, StorageError> {
    let path = path.replace('/', "\\");
    CString16::try_from(path.as_str()).map_err(|_| StorageError::Io("path not representable"))
}

fn io_error(e: &uefi::Error, what: &'static str) -> StorageError {
    match e.status() {
        Status::NOT_FOUND => StorageError::NotFound,
        status => {
            warn!("Failed to {what}: {status:?}");
            StorageError::Io(what)
        }
    }
}

fn open(path: &str) -> Result<FileHandle, StorageError> {
    let mut sfs = boot::get_image_file_system(boot::image_handle())
        .map_err(|e| io_error(&e, "get file system"))?;
    let mut volume = sfs
        .open_volume()
        .map_err(|e| io_error(&e, "open root directory"))?;
    volume
        .open(&uefi_path(path)?, FileMode::Read, FileAttribute::empty())
        .map_err(|e| io_error(&e, "open file"))
}

/// An open regular file.
pub struct UefiFile {
    file: RegularFile,
    len: u64,
}

impl UefiFile {
    /// # Errors
    /// [`StorageError::NotFound`], [`StorageError::NotAFile`] for directories,
    /// or an I/O error.
    pub fn open(path: &str) -> Result<Self, StorageError> {
        let mut file = open(path)?
            .into_regular_file()
            .ok_or(StorageError::NotAFile)?;

        file.set_position(RegularFile::END_OF_FILE)
            .map_err(|e| io_error(&e, "seek to file end"))?;
        let len = file
            .get_position()
            .map_err(|e| io_error(&e, "get file size"))?;

        Ok(Self { file, len })
    }
}

impl FileReader for UefiFile {
    fn len(&self) -> u64 {
        self.len
    }

    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<usize, StorageError> {
        self.file
            .set_position(offset)
            .map_err(|e| io_error(&e, "seek"))?;
        self.file
            .read(buf)
            .map_err(|_| StorageError::Io("read file contents"))
    }
}

/// Whole contents of the file at `path`.
///
/// # Errors
/// As [`UefiFile::open`], or [`StorageError::Io`] if the file shrinks while read.
pub fn read_file(path: &str) -> Result<Vec<u8>, StorageError> {
    let mut file = UefiFile::open(path)?;
    let len = usize::try_from(file.len).map_err(|_| StorageError::Io("file too large"))?;

    let mut buf = vec![0u8; len];
    let mut done = 0;
    while done < len {
        let read = file.read_at(done as u64, &mut buf[done..])?;
        if read == 0 {
            warn!("Mismatch in file size: read {done} bytes, expected {len} bytes");
            return Err(StorageError::Io("short read"));
        }
        done += read;
    }
    Ok(buf)
}

/// Paths of all regular files below `dir`, relative to it.
///
/// # Errors
/// [`StorageError::NotFound`] if `dir` is missing or not a directory.
pub fn list_files(dir: &str) -> Result<Vec<String>, StorageError> {
    let mut root = open(dir)?
        .into_directory()
        .ok_or(StorageError::NotFound)?;
    let mut files = Vec::new();
    walk(&mut root, "", &mut files)?;
    debug!("{} files below {dir}", files.len());
    Ok(files)
}

fn walk(dir: &mut Directory, prefix: &str, out: &mut Vec<String>) -> Result<(), StorageError> {
    while let Some(info) = dir
        .read_entry_boxed()
        .map_err(|e| io_error(&e, "read directory"))?
    {
        let name = info.file_name().to_string();
        if name == "." || name == ".." {
            continue;
        }
        let path = if prefix.is_empty() {
            name
        } else {
            format!("{prefix}/{name}")
        };

        if info.is_directory() {
            let handle = dir
                .open(info.file_name(), FileMode::Read, FileAttribute::empty())
                .map_err(|e| io_error(&e, "open directory"))?;
            if let Some(mut sub) = handle.into_directory() {
                walk(&mut sub, &path, out)?;
            }
        } else {
            out.push(path);
        }
    }
    Ok(())
}
