//! # ARM Boot Parameters
//!
//! The 32-bit ARM Linux boot protocol passes a pointer to a tagged list of
//! records ("ATAGs") in `r2`. Each record starts with a two-word header
//! holding its size in 32-bit words (header included) and its tag. The next
//! record begins `size` words after the current one; a record with size `0`
//! and tag [`ATAG_NONE`] ends the list.
//!
//! ```text
//! tags_addr → ┌──────────────┬──────────────┬────────────────┐
//!             │ size = 2     │ ATAG_CORE    │                │
//!             ├──────────────┼──────────────┼────────┬───────┤
//!             │ size = 4     │ ATAG_INITRD2 │ start  │ size  │
//!             ├──────────────┼──────────────┼────────┼───────┤
//!             │ size = 4     │ ATAG_MEM     │ size   │ start │   (0..n times)
//!             ├──────────────┼──────────────┼────────┴───────┤
//!             │ size = n     │ ATAG_CMDLINE │ "...\0" padded │
//!             ├──────────────┼──────────────┼────────────────┘
//!             │ size = 0     │ ATAG_NONE    │
//!             └──────────────┴──────────────┘
//! ```
//!
//! [`TagWriter`] produces such a list in this order and [`Tags`] walks one.
//! All words are little-endian.

#![cfg_attr(not(any(test, doctest)), no_std)]

pub mod atags;
mod walker;
mod writer;

pub use atags::*;
pub use walker::{Atag, Tags};
pub use writer::{TagWriter, list_len};

#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AtagError {
    #[error("Tag area too small: {needed} bytes needed, {available} available")]
    BufferTooSmall { needed: usize, available: usize },
    #[error("Tag list ends at offset {offset} without an ATAG_NONE record")]
    Unterminated { offset: usize },
    #[error("Tag at offset {offset} has an invalid size of {size} words")]
    BadSize { offset: usize, size: u32 },
    #[error("Command line must not contain NUL bytes")]
    CmdlineContainsNul,
}
