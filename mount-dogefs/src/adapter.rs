//! Translates `fuser` lowlevel requests onto [`dogefs_core::Filesystem`]
//! method calls (§9 "Host adapter boundary"). Every method here is a thin,
//! two-step wrapper: unwrap the request, call the core, map the result.

use std::ffi::OsStr;
use std::os::unix::ffi::OsStrExt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use dogefs_core::fs::SetAttr;
use dogefs_core::{Filesystem, Stat};
use fuser::{
	FileAttr, FileType, Filesystem as FuserFilesystem, ReplyAttr, ReplyCreate, ReplyData,
	ReplyDirectory, ReplyEmpty, ReplyEntry, ReplyOpen, ReplyWrite, Request, TimeOrNow,
};
use log::warn;

const TTL: Duration = Duration::from_secs(1);

pub struct Adapter {
	fs: Filesystem,
}

impl Adapter {
	pub fn new(fs: Filesystem) -> Self {
		Self { fs }
	}
}

fn system_time(stamp: (i64, i32)) -> SystemTime {
	if stamp.0 >= 0 {
		UNIX_EPOCH + Duration::new(stamp.0 as u64, stamp.1 as u32)
	} else {
		UNIX_EPOCH - Duration::new((-stamp.0) as u64, 0)
	}
}

fn file_type(mode: u32) -> FileType {
	match mode & dogefs_core::layout::mode::S_IFMT {
		dogefs_core::layout::mode::S_IFDIR => FileType::Directory,
		dogefs_core::layout::mode::S_IFCHR => FileType::CharDevice,
		dogefs_core::layout::mode::S_IFBLK => FileType::BlockDevice,
		_ => FileType::RegularFile,
	}
}

fn file_attr(stat: &Stat) -> FileAttr {
	FileAttr {
		ino: stat.ino,
		size: stat.size,
		blocks: stat.blocks,
		atime: system_time(stat.atime),
		mtime: system_time(stat.mtime),
		ctime: system_time(stat.ctime),
		crtime: system_time(stat.ctime),
		kind: file_type(stat.mode),
		perm: (stat.mode & 0o7777) as u16,
		nlink: stat.nlink as u32,
		uid: stat.uid,
		gid: stat.gid,
		rdev: stat.rdev as u32,
		blksize: 4096,
		flags: 0,
	}
}

impl FuserFilesystem for Adapter {
	fn lookup(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEntry) {
		match self.fs.lookup(parent, name.as_bytes()) {
			Ok(stat) => reply.entry(&TTL, &file_attr(&stat), 0),
			Err(e) => reply.error(e.errno()),
		}
	}

	fn getattr(&mut self, _req: &Request<'_>, ino: u64, reply: ReplyAttr) {
		match self.fs.getattr(ino) {
			Ok(stat) => reply.attr(&TTL, &file_attr(&stat)),
			Err(e) => reply.error(e.errno()),
		}
	}

	#[allow(clippy::too_many_arguments)]
	fn setattr(
		&mut self,
		_req: &Request<'_>,
		ino: u64,
		mode: Option<u32>,
		uid: Option<u32>,
		gid: Option<u32>,
		size: Option<u64>,
		_atime: Option<TimeOrNow>,
		mtime: Option<TimeOrNow>,
		_ctime: Option<SystemTime>,
		_fh: Option<u64>,
		_crtime: Option<SystemTime>,
		_chgtime: Option<SystemTime>,
		_bkuptime: Option<SystemTime>,
		_flags: Option<u32>,
		reply: ReplyAttr,
	) {
		let (mtime_value, mtime_now) = match mtime {
			Some(TimeOrNow::SpecificTime(t)) => {
				let dur = t.duration_since(UNIX_EPOCH).unwrap_or_default();
				(Some((dur.as_secs() as i64, dur.subsec_nanos() as i32)), false)
			}
			Some(TimeOrNow::Now) => (None, true),
			None => (None, false),
		};
		let attrs = SetAttr {
			mode,
			uid,
			gid,
			size,
			mtime: mtime_value,
			mtime_now,
		};
		match self.fs.setattr(ino, attrs) {
			Ok(stat) => reply.attr(&TTL, &file_attr(&stat)),
			Err(e) => reply.error(e.errno()),
		}
	}

	fn readdir(&mut self, _req: &Request<'_>, ino: u64, _fh: u64, offset: i64, mut reply: ReplyDirectory) {
		let entries = match self.fs.readdir(ino, offset.max(0) as u64, u64::MAX) {
			Ok(entries) => entries,
			Err(e) => {
				reply.error(e.errno());
				return;
			}
		};
		for entry in entries {
			let name = OsStr::from_bytes(&entry.name);
			let next_offset = (entry.index + 1) as i64;
			if reply.add(entry.ino, next_offset, file_type(entry.stat.mode), name) {
				break;
			}
		}
		reply.ok();
	}

	fn mkdir(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, mode: u32, _umask: u32, reply: ReplyEntry) {
		match self.fs.mkdir(parent, name.as_bytes(), mode) {
			Ok(stat) => reply.entry(&TTL, &file_attr(&stat), 0),
			Err(e) => reply.error(e.errno()),
		}
	}

	fn unlink(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEmpty) {
		match self.fs.unlink(parent, name.as_bytes()) {
			Ok(()) => reply.ok(),
			Err(e) => reply.error(e.errno()),
		}
	}

	fn rmdir(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEmpty) {
		match self.fs.rmdir(parent, name.as_bytes()) {
			Ok(()) => reply.ok(),
			Err(e) => reply.error(e.errno()),
		}
	}

	fn open(&mut self, _req: &Request<'_>, ino: u64, flags: i32, reply: ReplyOpen) {
		match self.fs.open(ino) {
			Ok(()) => reply.opened(0, flags as u32),
			Err(e) => reply.error(e.errno()),
		}
	}

	#[allow(clippy::too_many_arguments)]
	fn read(
		&mut self,
		_req: &Request<'_>,
		ino: u64,
		_fh: u64,
		offset: i64,
		size: u32,
		_flags: i32,
		_lock_owner: Option<u64>,
		reply: ReplyData,
	) {
		match self.fs.read(ino, offset.max(0) as u64, size as u64) {
			Ok(data) => reply.data(&data),
			Err(e) => reply.error(e.errno()),
		}
	}

	#[allow(clippy::too_many_arguments)]
	fn write(
		&mut self,
		_req: &Request<'_>,
		ino: u64,
		_fh: u64,
		offset: i64,
		data: &[u8],
		_write_flags: u32,
		_flags: i32,
		_lock_owner: Option<u64>,
		reply: ReplyWrite,
	) {
		match self.fs.write(ino, offset.max(0) as u64, data) {
			Ok(written) => reply.written(written as u32),
			Err(e) => reply.error(e.errno()),
		}
	}

	#[allow(clippy::too_many_arguments)]
	fn create(
		&mut self,
		_req: &Request<'_>,
		parent: u64,
		name: &OsStr,
		mode: u32,
		_umask: u32,
		flags: i32,
		reply: ReplyCreate,
	) {
		match self.fs.create(parent, name.as_bytes(), mode) {
			Ok(stat) => reply.created(&TTL, &file_attr(&stat), 0, 0, flags as u32),
			Err(e) => reply.error(e.errno()),
		}
	}

	fn destroy(&mut self) {
		if let Err(e) = self.fs.sync() {
			warn!("failed to flush device on unmount: {e}");
		}
	}
}
