//! On-disk layout and mutators for the DogeFS block filesystem.
//!
//! This crate has no knowledge of any host filesystem ABI; `mount-dogefs`
//! binds [`Filesystem`]'s plain methods to `fuser`, and `mkdogefs` drives
//! [`format::format`] directly.

pub mod device;
pub mod dir;
pub mod error;
pub mod file;
pub mod format;
pub mod fs;
pub mod geometry;
pub mod inode;
pub mod layout;
pub mod spacemap;

pub use device::Device;
pub use error::{Error, Result};
pub use fs::{DirEntry, Filesystem, SetAttr, Stat};
pub use geometry::Geometry;
pub use layout::SuperBlock;
