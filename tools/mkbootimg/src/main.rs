//! Builds Android boot images for testing the loader.
//!
//! ```text
//! mkbootimg --kernel zImage --ramdisk-dir rootfs/ --cmdline "console=ttyS0" -o boot.img
//! ```

mod image;
mod ramdisk;

use crate::image::{Payload, assemble};
use boot_addresses::{PageSize, PhysicalAddress};
use bootimg::{BootImageError, BootImageHeader, Segment};
use clap::{ArgGroup, Parser};
use cpio_archive::CpioError;
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("ramdisk archive: {0}")]
    Archive(#[from] CpioError),
    #[error("boot image header: {0}")]
    Header(#[from] BootImageError),
    #[error("{0} exceeds 4 GiB")]
    TooLarge(&'static str),
    #[error("file name is not UTF-8: {}", .0.display())]
    NonUtf8Name(PathBuf),
    #[error("page size {page_size} cannot hold the {needed} byte header")]
    PageTooSmall { page_size: u64, needed: usize },
}

fn parse_u32(s: &str) -> Result<u32, String> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => s.parse(),
    };
    parsed.map_err(|e| format!("{s}: {e}"))
}

fn parse_page_size(s: &str) -> Result<PageSize, String> {
    let size = parse_u32(s)?;
    PageSize::new(u64::from(size)).ok_or_else(|| format!("{size} is not a power of two"))
}

#[derive(Debug, Parser)]
#[command(name = "mkbootimg", about = "Create an Android boot image")]
#[command(group(ArgGroup::new("initrd").args(["ramdisk", "ramdisk_dir"])))]
struct Cli {
    /// Kernel image.
    #[arg(long)]
    kernel: PathBuf,
    /// Ramdisk image, used as is.
    #[arg(long)]
    ramdisk: Option<PathBuf>,
    /// Directory packed into a cpio ramdisk.
    #[arg(long)]
    ramdisk_dir: Option<PathBuf>,
    /// Second stage loader.
    #[arg(long)]
    second: Option<PathBuf>,
    #[arg(long, default_value = "")]
    cmdline: String,
    /// Product name stored in the header.
    #[arg(long, default_value = "")]
    board: String,
    #[arg(long, default_value = "2048", value_parser = parse_page_size)]
    pagesize: PageSize,
    /// Physical base all offsets are relative to.
    #[arg(long, default_value = "0x10000000", value_parser = parse_u32)]
    base: u32,
    #[arg(long, default_value = "0x00008000", value_parser = parse_u32)]
    kernel_offset: u32,
    #[arg(long, default_value = "0x01000000", value_parser = parse_u32)]
    ramdisk_offset: u32,
    #[arg(long, default_value = "0x00f00000", value_parser = parse_u32)]
    second_offset: u32,
    #[arg(long, default_value = "0x00000100", value_parser = parse_u32)]
    tags_offset: u32,
    /// Output file.
    #[arg(short, long)]
    output: PathBuf,
}

impl Cli {
    fn header(&self) -> Result<BootImageHeader, ToolError> {
        let mut header = BootImageHeader::new(self.pagesize);
        header.kernel = Segment::new(0, self.base.wrapping_add(self.kernel_offset));
        header.ramdisk = Segment::new(0, self.base.wrapping_add(self.ramdisk_offset));
        header.second = Segment::new(0, self.base.wrapping_add(self.second_offset));
        header.tags_addr = PhysicalAddress::from(self.base.wrapping_add(self.tags_offset));
        header.set_name(self.board.as_bytes());
        header.set_cmdline(self.cmdline.as_bytes())?;

        let needed = header.encoded_len();
        if self.pagesize.get() < needed as u64 {
            return Err(ToolError::PageTooSmall {
                page_size: self.pagesize.get(),
                needed,
            });
        }
        Ok(header)
    }

    fn payload(&self) -> Result<Payload, ToolError> {
        let ramdisk = match (&self.ramdisk, &self.ramdisk_dir) {
            (Some(file), _) => fs::read(file)?,
            (None, Some(dir)) => ramdisk::pack_dir(dir)?,
            (None, None) => Vec::new(),
        };
        Ok(Payload {
            kernel: fs::read(&self.kernel)?,
            ramdisk,
            second: self.second.as_ref().map(fs::read).transpose()?.unwrap_or_default(),
        })
    }
}

fn run(cli: &Cli) -> Result<usize, ToolError> {
    let image = assemble(cli.header()?, &cli.payload()?)?;
    fs::write(&cli.output, &image)?;
    Ok(image.len())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(&cli) {
        Ok(len) => {
            eprintln!("wrote {len} bytes to {}", cli.output.display());
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("mkbootimg: {e}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::OsStr;

    #[test]
    fn addresses_are_base_plus_offset() {
        let cli = Cli::parse_from([
            "mkbootimg",
            "--kernel",
            "k",
            "--base",
            "0x80000000",
            "--tags-offset",
            "0x200",
            "-o",
            "boot.img",
        ]);
        let header = cli.header().unwrap();
        assert_eq!(header.kernel.addr, PhysicalAddress::from(0x8000_8000u32));
        assert_eq!(header.ramdisk.addr, PhysicalAddress::from(0x8100_0000u32));
        assert_eq!(header.tags_addr, PhysicalAddress::from(0x8000_0200u32));
        assert_eq!(header.page_size.get(), 2048);
    }

    #[test]
    fn number_formats() {
        assert_eq!(parse_u32("0x10"), Ok(16));
        assert_eq!(parse_u32("4096"), Ok(4096));
        assert!(parse_u32("0xZZ").is_err());
        assert!(parse_page_size("3000").is_err());
    }

    #[test]
    fn extra_command_line_needs_a_large_page() {
        let long = "x".repeat(700);
        let cli = Cli::parse_from([
            "mkbootimg",
            "--kernel",
            "k",
            "--pagesize",
            "1024",
            "--cmdline",
            long.as_str(),
            "-o",
            "boot.img",
        ]);
        assert!(matches!(
            cli.header(),
            Err(ToolError::PageTooSmall {
                page_size: 1024,
                ..
            })
        ));
    }

    #[test]
    fn packs_a_directory_into_the_image() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("root");
        fs::create_dir(&root).unwrap();
        fs::write(root.join("init"), b"#!").unwrap();
        let kernel = dir.path().join("zImage");
        fs::write(&kernel, b"KERNEL").unwrap();
        let output = dir.path().join("boot.img");

        let cli = Cli::parse_from([
            OsStr::new("mkbootimg"),
            OsStr::new("--kernel"),
            kernel.as_os_str(),
            OsStr::new("--ramdisk-dir"),
            root.as_os_str(),
            OsStr::new("-o"),
            output.as_os_str(),
        ]);
        let written = run(&cli).unwrap();

        let image = fs::read(&output).unwrap();
        assert_eq!(image.len(), written);
        let header = BootImageHeader::parse(&image).unwrap();
        assert_eq!(header.kernel.size, 6);
        assert_eq!(&image[2048..2054], b"KERNEL");
        let ramdisk = &image[4096..4096 + header.ramdisk.size as usize];
        let archive = cpio_archive::Archive::decode(ramdisk, 4).unwrap();
        assert_eq!(archive.find(b"init").unwrap().data(), b"#!");
    }
}
