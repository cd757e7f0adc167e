//! Read-only FAT16/32 storage layer used to find and stream boot files.
//!
//! The crate is layered the same way the data flows:
//! [`cache::SectorCache`] sits on top of a [`BlockDevice`], the FAT code in
//! [`fs::fat`] only ever talks to the cache through [`cache::SectorSource`].
#![cfg_attr(not(test), no_std)]
#![forbid(unsafe_code)]
#![warn(clippy::pedantic, clippy::nursery)]
#![allow(clippy::missing_errors_doc, clippy::module_name_repetitions)]

extern crate alloc;
pub use boot_core::storage::{BlockDevice, BlockDeviceError};

pub mod log;

pub mod cache;
pub mod fs;
pub mod rand;
