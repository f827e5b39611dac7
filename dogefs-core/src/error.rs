//! Error kinds produced by the core (see spec §7).

use std::io;

/// Every fallible core operation returns this error type.
///
/// `IoError` wraps a short/failed read or write against the backing device;
/// the other variants are allocator and namespace failures specific to the
/// on-disk format.
#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("device I/O error: {0}")]
	Io(#[from] io::Error),
	#[error("no space left on device")]
	NoSpace,
	#[error("not a directory")]
	NotDir,
	#[error("no such file or directory")]
	NotFound,
	#[error("not a DogeFS filesystem")]
	Invalid,
	#[error("directory not empty")]
	NotEmpty,
}

impl Error {
	/// Maps a core error onto the POSIX errno the host adapter replies with.
	pub fn errno(&self) -> libc::c_int {
		match self {
			Error::Io(_) => libc::EIO,
			Error::NoSpace => libc::ENOSPC,
			Error::NotDir => libc::ENOTDIR,
			Error::NotFound => libc::ENOENT,
			Error::Invalid => libc::EIO,
			Error::NotEmpty => libc::ENOTEMPTY,
		}
	}
}

pub type Result<T> = std::result::Result<T, Error>;
