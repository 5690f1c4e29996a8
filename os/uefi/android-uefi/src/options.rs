//! # Load Options
//!
//! The application is started as
//!
//! ```text
//! android-uefi.efi [--root=DEV] [--prefix=DIR] [--loader-path=DIR] [--no-multiboot] [--append] IMAGE [ARGS...]
//! ```
//!
//! `IMAGE` is a path on the boot volume or `(device)` for an image written raw
//! to a block device. Everything after it is passed to the kernel.
//!
//! `--prefix` is where the multiboot payload is searched. `--loader-path`
//! replaces the directory the application was started from, which the kernel
//! sees on its command line.

use alloc::string::String;
use alloc::vec::Vec;
use android_loader::{ImageLocation, LoaderError};

/// Directory searched for the multiboot payload unless `--prefix` is given.
pub const DEFAULT_PREFIX: &str = "/EFI/android";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchOptions {
    pub image: String,
    pub root_device: Option<String>,
    pub prefix: String,
    pub loader_path: String,
    pub multiboot: bool,
    pub append: bool,
    pub kernel_args: Vec<String>,
}

impl LaunchOptions {
    /// Where [`LaunchOptions::image`] lives.
    ///
    /// # Errors
    /// [`LoaderError::BadArgument`] for an empty device name.
    pub fn location(&self) -> Result<ImageLocation<'_>, LoaderError> {
        ImageLocation::parse(&self.image).ok_or(LoaderError::BadArgument("empty image name"))
    }

    pub fn kernel_args(&self) -> Vec<&str> {
        self.kernel_args.iter().map(String::as_str).collect()
    }
}

/// Directory part of the device path text of this application.
///
/// A leading device node such as `HD(1,GPT,..)` is dropped and `\`
/// separators become `/`, so `\EFI\android\android-uefi.efi` yields
/// `/EFI/android`.
pub fn loader_dir(image_path: &str) -> String {
    let file = image_path.rsplit_once(')').map_or(image_path, |(_, file)| file);
    let mut path = String::with_capacity(file.len() + 1);
    for part in file.split(['\\', '/']).filter(|part| !part.is_empty()) {
        path.push('/');
        path.push_str(part);
    }
    match path.rfind('/') {
        Some(0) | None => String::from("/"),
        Some(end) => {
            path.truncate(end);
            path
        }
    }
}

/// Splits at whitespace; double quotes group words and are removed.
fn split(options: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut word = String::new();
    let mut quoted = false;
    let mut pending = false;

    for c in options.chars() {
        match c {
            '"' => {
                quoted = !quoted;
                pending = true;
            }
            c if c.is_whitespace() && !quoted => {
                if pending {
                    words.push(core::mem::take(&mut word));
                    pending = false;
                }
            }
            c => {
                word.push(c);
                pending = true;
            }
        }
    }
    if pending {
        words.push(word);
    }
    words
}

/// Parses the load options string handed over by the firmware.
///
/// A leading `*.efi` word, as the UEFI shell passes it, is skipped.
/// `own_dir` is the directory the application was started from.
///
/// # Errors
/// [`LoaderError::BadArgument`] for a missing image or an unknown option.
pub fn parse(options: &str, own_dir: &str) -> Result<LaunchOptions, LoaderError> {
    let mut words = split(options).into_iter().peekable();
    if words
        .peek()
        .is_some_and(|w| w.to_ascii_lowercase().ends_with(".efi"))
    {
        words.next();
    }

    let mut root_device = None;
    let mut prefix = String::from(DEFAULT_PREFIX);
    let mut loader_path = String::from(own_dir);
    let mut multiboot = true;
    let mut append = false;

    let image = loop {
        let Some(word) = words.next() else {
            return Err(LoaderError::BadArgument("filename expected"));
        };
        if let Some(device) = word.strip_prefix("--root=") {
            root_device = Some(String::from(device));
        } else if let Some(dir) = word.strip_prefix("--prefix=") {
            prefix = String::from(dir);
        } else if let Some(dir) = word.strip_prefix("--loader-path=") {
            loader_path = String::from(dir);
        } else if word == "--no-multiboot" {
            multiboot = false;
        } else if word == "--append" {
            append = true;
        } else if word.starts_with("--") {
            return Err(LoaderError::BadArgument("unknown option"));
        } else {
            break word;
        }
    };

    Ok(LaunchOptions {
        image,
        root_device,
        prefix,
        loader_path,
        multiboot,
        append,
        kernel_args: words.collect(),
    })
}
