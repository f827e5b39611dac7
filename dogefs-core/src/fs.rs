//! The public core API: every host-interface operation as a plain typed
//! method, with zero knowledge of `fuser` (§9 "Host adapter boundary").

use log::debug;

use crate::device::Device;
use crate::dir;
use crate::error::{Error, Result};
use crate::file;
use crate::geometry::Geometry;
use crate::inode::InodeTable;
use crate::layout::{mode, DirItem, Inode, HOST_ROOT_INO, SUPER_BLOCK_MAGIC};
use crate::spacemap::SpaceMap;
use crate::SuperBlock;

/// A `stat(2)`-shaped view of an inode, independent of any host ABI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stat {
	pub ino: u64,
	pub mode: u32,
	pub nlink: u64,
	pub uid: u32,
	pub gid: u32,
	pub size: u64,
	pub blocks: u64,
	pub rdev: u64,
	pub atime: (i64, i32),
	pub mtime: (i64, i32),
	pub ctime: (i64, i32),
}

/// One live directory entry, windowed by [`Filesystem::readdir`].
#[derive(Debug, Clone)]
pub struct DirEntry {
	pub index: u64,
	pub name: Vec<u8>,
	pub ino: u64,
	pub stat: Stat,
}

/// Fields a caller wants to change via `setattr`; `None` leaves the field untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct SetAttr {
	pub mode: Option<u32>,
	pub uid: Option<u32>,
	pub gid: Option<u32>,
	pub size: Option<u64>,
	pub mtime: Option<(i64, i32)>,
	pub mtime_now: bool,
}

fn now() -> (i64, i32) {
	let since_epoch = std::time::SystemTime::now()
		.duration_since(std::time::UNIX_EPOCH)
		.unwrap_or_default();
	(since_epoch.as_secs() as i64, since_epoch.subsec_nanos() as i32)
}

/// An open DogeFS device: the backing file, its superblock, and derived geometry.
pub struct Filesystem {
	device: Device,
	super_block: SuperBlock,
	geometry: Geometry,
}

impl Filesystem {
	/// Opens an already-formatted device, validating the superblock magic.
	pub fn open(file: std::fs::File) -> Result<Self> {
		let device = Device::new(file);
		let mut buf = [0u8; crate::layout::SUPER_BLOCK_SIZE];
		device.read_at(0, &mut buf)?;
		let super_block = SuperBlock::from_bytes(&buf);
		if super_block.magic != SUPER_BLOCK_MAGIC {
			return Err(Error::Invalid);
		}
		let geometry = Geometry::new(&super_block);
		Ok(Self {
			device,
			super_block,
			geometry,
		})
	}

	pub fn super_block(&self) -> &SuperBlock {
		&self.super_block
	}

	pub fn geometry(&self) -> Geometry {
		self.geometry
	}

	fn space_map(&self) -> SpaceMap {
		SpaceMap::new(
			&self.device,
			self.geometry,
			self.super_block.ptr_space_map,
			self.super_block.blk_space_map,
		)
	}

	fn inode_table(&self) -> InodeTable {
		InodeTable::new(&self.device, self.geometry)
	}

	/// Translates the host interface's fixed root identifier (1) to the
	/// superblock's actual root inode number (§4.5).
	fn resolve(&self, ino: u64) -> u64 {
		if ino == HOST_ROOT_INO {
			self.super_block.ptr_root_inode
		} else {
			ino
		}
	}

	fn stat_of(&self, ino: u64, inode: &Inode) -> Stat {
		let rdev = if inode.is_device() {
			(inode.dev_major() as u64) << 32 | inode.dev_minor() as u64
		} else {
			0
		};
		let blocks = if inode.is_device() || inode.size() <= crate::layout::INLINE_CONTENTS as u64 {
			0
		} else {
			let bs = self.geometry.block_size;
			let per_block = bs / 512;
			((inode.size() + bs - 1) / bs) * per_block
		};
		Stat {
			ino,
			mode: inode.mode,
			nlink: inode.nlink,
			uid: inode.uid,
			gid: inode.gid,
			size: if inode.is_device() { 0 } else { inode.size() },
			blocks,
			rdev,
			atime: (inode.sec_modify, inode.nsec_modify),
			mtime: (inode.sec_modify, inode.nsec_modify),
			ctime: (inode.sec_change, inode.nsec_change),
		}
	}

	/// getattr(ino) (§6).
	pub fn getattr(&self, ino: u64) -> Result<Stat> {
		let real = self.resolve(ino);
		let inode = self.inode_table().read(real)?;
		Ok(self.stat_of(real, &inode))
	}

	/// lookup(parent, name) (§4.6).
	pub fn lookup(&self, parent: u64, name: &[u8]) -> Result<Stat> {
		let parent = self.resolve(parent);
		let parent_inode = self.inode_table().read(parent)?;
		let (_, item) = dir::find_entry(&self.device, &self.geometry, &parent_inode, name)?
			.ok_or(Error::NotFound)?;
		self.getattr(item.inode)
	}

	/// readdir(ino, offset, limit) (§4.6).
	pub fn readdir(&self, ino: u64, offset: u64, limit: u64) -> Result<Vec<DirEntry>> {
		let real = self.resolve(ino);
		let inode = self.inode_table().read(real)?;
		let entries = dir::list_entries(&self.device, &self.geometry, &inode)?;
		let mut out = Vec::new();
		for (index, item) in entries {
			if index < offset {
				continue;
			}
			if out.len() as u64 >= limit {
				break;
			}
			let stat = self.getattr(item.inode)?;
			out.push(DirEntry {
				index,
				name: item.name().to_vec(),
				ino: item.inode,
				stat,
			});
		}
		Ok(out)
	}

	/// setattr(ino, attrs) (§4.6). Reads first, stamps ctime, applies the
	/// requested fields, then writes — an uninitialized buffer must never
	/// reach disk ahead of the read it's meant to follow.
	pub fn setattr(&self, ino: u64, attrs: SetAttr) -> Result<Stat> {
		let real = self.resolve(ino);
		let table = self.inode_table();
		let mut inode = table.read(real)?;
		let (sec, nsec) = now();
		inode.sec_change = sec;
		inode.nsec_change = nsec;
		if let Some(m) = attrs.mode {
			inode.mode = m;
		}
		if let Some(uid) = attrs.uid {
			inode.uid = uid;
			inode.mode &= !mode::S_ISUID;
		}
		if let Some(gid) = attrs.gid {
			inode.gid = gid;
			inode.mode &= !mode::S_ISGID;
		}
		if let Some(size) = attrs.size {
			inode.set_size(size);
		}
		if let Some((sec, nsec)) = attrs.mtime {
			inode.sec_modify = sec;
			inode.nsec_modify = nsec;
		}
		if attrs.mtime_now {
			let (sec, nsec) = now();
			inode.sec_modify = sec;
			inode.nsec_modify = nsec;
		}
		table.write(real, &inode)?;
		Ok(self.stat_of(real, &inode))
	}

	fn touch_mtime(&self, inode: &mut Inode) {
		let (sec, nsec) = now();
		inode.sec_modify = sec;
		inode.nsec_modify = nsec;
	}

	fn new_child_inode(&self, mode_bits: u32, nlink: u64, size: u64) -> Inode {
		let mut inode = Inode::zeroed();
		inode.mode = mode_bits;
		inode.nlink = nlink;
		inode.set_size(size);
		let (sec, nsec) = now();
		inode.sec_create = sec;
		inode.nsec_create = nsec;
		inode.sec_modify = sec;
		inode.nsec_modify = nsec;
		inode.sec_change = sec;
		inode.nsec_change = nsec;
		inode
	}

	fn link_into_parent(&self, parent: u64, parent_inode: &mut Inode, name: &[u8], child_ino: u64) -> Result<()> {
		let space_map = self.space_map();
		let dir_block = parent_inode.ptr_direct(0);
		let id = space_map.allocate_dir_item(dir_block)?;
		if id == 0 {
			return Err(Error::NoSpace);
		}
		debug!("link {:?} -> inode {child_ino} in parent {parent}", String::from_utf8_lossy(name));
		dir::insert_entry(&self.device, &self.geometry, dir_block, id, DirItem::new(name, child_ino))
	}

	/// create(parent, name, mode) (§4.6 Create-regular).
	pub fn create(&self, parent: u64, name: &[u8], mode_bits: u32) -> Result<Stat> {
		let parent = self.resolve(parent);
		let table = self.inode_table();
		let mut parent_inode = table.read(parent)?;
		dir::require_dir(&parent_inode)?;
		self.touch_mtime(&mut parent_inode);

		let child_ino = self.space_map().allocate_inode()?;
		if child_ino == 0 {
			return Err(Error::NoSpace);
		}
		let child = self.new_child_inode(dir::regular_mode(mode_bits), 1, 0);
		table.write(child_ino, &child)?;

		parent_inode.nlink += 1;
		table.write(parent, &parent_inode)?;

		self.link_into_parent(parent, &mut parent_inode, name, child_ino)?;
		self.getattr(child_ino)
	}

	/// mkdir(parent, name, mode) (§4.6 Create-directory).
	pub fn mkdir(&self, parent: u64, name: &[u8], mode_bits: u32) -> Result<Stat> {
		let parent = self.resolve(parent);
		let table = self.inode_table();
		let mut parent_inode = table.read(parent)?;
		dir::require_dir(&parent_inode)?;
		self.touch_mtime(&mut parent_inode);

		let child_ino = self.space_map().allocate_inode()?;
		if child_ino == 0 {
			return Err(Error::NoSpace);
		}
		let sub_block = self.space_map().allocate_whole_block(crate::layout::BlockType::Dir)?;
		if sub_block == 0 {
			return Err(Error::NoSpace);
		}
		dir::write_new_directory_block(&self.device, &self.geometry, sub_block, child_ino, parent)?;

		let mut child = self.new_child_inode(dir::directory_mode(mode_bits), 2, self.geometry.block_size);
		child.set_ptr_direct(0, sub_block);
		table.write(child_ino, &child)?;

		parent_inode.nlink += 1;
		table.write(parent, &parent_inode)?;

		self.link_into_parent(parent, &mut parent_inode, name, child_ino)?;
		self.getattr(child_ino)
	}

	fn unlink_common(&self, parent: u64, name: &[u8], want_dir: bool) -> Result<()> {
		let parent = self.resolve(parent);
		let table = self.inode_table();
		let mut parent_inode = table.read(parent)?;
		dir::require_dir(&parent_inode)?;

		let (_, item) = dir::find_entry(&self.device, &self.geometry, &parent_inode, name)?
			.ok_or(Error::NotFound)?;
		let child = table.read(item.inode)?;
		if want_dir && !child.is_dir() {
			return Err(Error::NotDir);
		}
		if want_dir && !dir::is_empty_directory(&self.device, &self.geometry, &child)? {
			return Err(Error::NotEmpty);
		}

		dir::remove_entry(&self.device, &self.geometry, &parent_inode, name)?;
		self.touch_mtime(&mut parent_inode);
		if want_dir {
			parent_inode.nlink -= 1;
		}
		table.write(parent, &parent_inode)
	}

	/// unlink(parent, name) (§4.6, improved per §9: stops at the first
	/// matching slot; works on any entry, directory or not).
	pub fn unlink(&self, parent: u64, name: &[u8]) -> Result<()> {
		self.unlink_common(parent, name, false)
	}

	/// rmdir(parent, name) (§4.6, improved per §9: refuses a non-empty directory).
	pub fn rmdir(&self, parent: u64, name: &[u8]) -> Result<()> {
		self.unlink_common(parent, name, true)
	}

	/// open(ino) — no-op beyond existence; file handles are stateless.
	pub fn open(&self, ino: u64) -> Result<()> {
		let real = self.resolve(ino);
		self.inode_table().read(real)?;
		Ok(())
	}

	/// read(ino, off, size) (§4.7).
	pub fn read(&self, ino: u64, off: u64, size: u64) -> Result<Vec<u8>> {
		let real = self.resolve(ino);
		let table = self.inode_table();
		let inode = table.read(real)?;
		file::read(&self.device, &self.geometry, &table, &inode, off, size)
	}

	/// write(ino, off, buf) (§4.7).
	pub fn write(&self, ino: u64, off: u64, buf: &[u8]) -> Result<u64> {
		let real = self.resolve(ino);
		let table = self.inode_table();
		let space_map = self.space_map();
		let mut inode = table.read(real)?;
		self.touch_mtime(&mut inode);
		let written = file::write(&self.device, &self.geometry, &table, &space_map, &mut inode, off, buf)?;
		table.write(real, &inode)?;
		Ok(written)
	}

	/// Flushes the backing device (called by the adapter on `destroy`/unmount).
	pub fn sync(&self) -> Result<()> {
		self.device.flush()
	}
}
