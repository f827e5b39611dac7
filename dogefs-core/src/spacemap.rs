//! The space map: a contiguous run of blocks classifying every device
//! block and, for sub-allocated kinds, counting free sub-slots (§4.3).

use log::debug;

use crate::device::Device;
use crate::error::Result;
use crate::geometry::Geometry;
use crate::layout::{BlockType, SpaceMapEntry, SUPER_BLOCK_SIZE};

/// Handle bundling what the space map needs to locate and mutate itself.
pub struct SpaceMap<'a> {
	device: &'a Device,
	geometry: Geometry,
	ptr_space_map: u64,
	blk_space_map: u64,
}

impl<'a> SpaceMap<'a> {
	pub fn new(device: &'a Device, geometry: Geometry, ptr_space_map: u64, blk_space_map: u64) -> Self {
		Self {
			device,
			geometry,
			ptr_space_map,
			blk_space_map,
		}
	}

	fn read_block(&self, i: u64) -> Result<Vec<u8>> {
		let mut buf = vec![0u8; self.geometry.block_size as usize];
		self.device
			.read_at(self.geometry.block_offset(self.ptr_space_map + i), &mut buf)?;
		Ok(buf)
	}

	fn write_block(&self, i: u64, buf: &[u8]) -> Result<()> {
		self.device
			.write_at(self.geometry.block_offset(self.ptr_space_map + i), buf)
	}

	fn entry_at(buf: &[u8], j: u64) -> SpaceMapEntry {
		let off = (j as usize) * SpaceMapEntry::SIZE;
		SpaceMapEntry::from_bytes(&buf[off..off + SpaceMapEntry::SIZE])
	}

	fn set_entry_at(buf: &mut [u8], j: u64, entry: SpaceMapEntry) {
		let off = (j as usize) * SpaceMapEntry::SIZE;
		buf[off..off + SpaceMapEntry::SIZE].copy_from_slice(&entry.to_bytes());
	}

	/// Returns the raw space-map entry describing device block `b`.
	pub fn entry_for(&self, b: u64) -> Result<SpaceMapEntry> {
		let i = b / self.geometry.entries_per_spacemap_block;
		let j = b % self.geometry.entries_per_spacemap_block;
		let buf = self.read_block(i)?;
		Ok(Self::entry_at(&buf, j))
	}

	/// Scans the whole run for the first `UNUSED` entry and claims it as `block_type`.
	///
	/// Returns 0 (ENOSPC) if the run is exhausted.
	pub fn allocate_whole_block(&self, block_type: BlockType) -> Result<u64> {
		for i in 0..self.blk_space_map {
			let mut buf = self.read_block(i)?;
			let per_block = self.geometry.entries_per_spacemap_block;
			for j in 0..per_block {
				let entry = Self::entry_at(&buf, j);
				if entry.block_type == BlockType::Unused as u8 {
					let target_block = i * per_block + j;
					let items_left = match block_type {
						BlockType::Inode => (self.geometry.inodes_per_inode_block - 1).min(255) as u8,
						BlockType::Dir => (self.geometry.items_per_dir_block - 1).min(255) as u8,
						other => other as u8,
					};
					Self::set_entry_at(
						&mut buf,
						j,
						SpaceMapEntry {
							block_type: block_type as u8,
							items_left,
						},
					);
					self.write_block(i, &buf)?;
					debug!("allocate_whole_block({block_type:?}) -> block {target_block}");
					return Ok(target_block);
				}
			}
		}
		Ok(0)
	}

	/// Claims the next free inode slot, creating a new INODE block on demand.
	pub fn allocate_inode(&self) -> Result<u64> {
		for i in 0..self.blk_space_map {
			let mut buf = self.read_block(i)?;
			let per_block = self.geometry.entries_per_spacemap_block;
			for j in 0..per_block {
				let entry = Self::entry_at(&buf, j);
				if entry.block_type == BlockType::Inode as u8 && entry.items_left != 0 {
					let target_block = i * per_block + j;
					let items_left = entry.items_left;
					Self::set_entry_at(
						&mut buf,
						j,
						SpaceMapEntry {
							block_type: entry.block_type,
							items_left: items_left - 1,
						},
					);
					self.write_block(i, &buf)?;
					let ino = (target_block + 1) * self.geometry.inodes_per_inode_block
						- items_left as u64;
					debug!("allocate_inode -> {ino}");
					return Ok(ino);
				}
			}
		}
		let block = self.allocate_whole_block(BlockType::Inode)?;
		if block == 0 {
			return Ok(0);
		}
		Ok(block * self.geometry.inodes_per_inode_block)
	}

	/// Claims the next free directory-entry slot inside `block_number`.
	pub fn allocate_dir_item(&self, block_number: u64) -> Result<u64> {
		let i = block_number / self.geometry.entries_per_spacemap_block;
		let j = block_number % self.geometry.entries_per_spacemap_block;
		let mut buf = self.read_block(i)?;
		let entry = Self::entry_at(&buf, j);
		if entry.block_type != BlockType::Dir as u8 || entry.items_left == 0 {
			return Ok(0);
		}
		let items_left = entry.items_left;
		Self::set_entry_at(
			&mut buf,
			j,
			SpaceMapEntry {
				block_type: entry.block_type,
				items_left: items_left - 1,
			},
		);
		self.write_block(i, &buf)?;
		let id = (block_number + 1) * self.geometry.items_per_dir_block - items_left as u64;
		debug!("allocate_dir_item(block {block_number}) -> {id}");
		Ok(id)
	}
}

/// `sizeof(SuperBlock)`, used by callers that need to skip past it on disk.
pub const SUPERBLOCK_BYTES: usize = SUPER_BLOCK_SIZE;

#[cfg(test)]
mod tests {
	use super::*;
	use crate::layout::SuperBlock;

	fn setup(block_count: u64) -> (Device, Geometry, u64, u64) {
		let file = tempfile::tempfile().unwrap();
		let device = Device::new(file);
		let sb = SuperBlock {
			boot_jump: [0; 16],
			magic: 0,
			version: (1, 0),
			dirty_level: 0,
			block_size: 4096,
			block_count,
			ptr_space_map: 1,
			blk_space_map: 1,
			ptr_journal: 0,
			blk_journal: 0,
			ptr_label_directory: 0,
			ptr_root_inode: 0,
			boot_code: [0; 416],
		};
		let geometry = Geometry::new(&sb);
		// initialize every entry to UNUSED
		let per_block = geometry.entries_per_spacemap_block;
		let mut buf = vec![0u8; geometry.block_size as usize];
		for j in 0..per_block {
			SpaceMap::set_entry_at(
				&mut buf,
				j,
				SpaceMapEntry {
					block_type: BlockType::Unused as u8,
					items_left: BlockType::Unused as u8,
				},
			);
		}
		device
			.write_at(geometry.block_offset(sb.ptr_space_map), &buf)
			.unwrap();
		(device, geometry, sb.ptr_space_map, sb.blk_space_map)
	}

	#[test]
	fn allocate_whole_block_claims_first_unused() {
		let (device, geometry, ptr, blk) = setup(4096);
		let map = SpaceMap::new(&device, geometry, ptr, blk);
		let b1 = map.allocate_whole_block(BlockType::File).unwrap();
		let b2 = map.allocate_whole_block(BlockType::File).unwrap();
		assert_ne!(b1, 0);
		assert_ne!(b2, 0);
		assert_ne!(b1, b2);
		let e = map.entry_for(b1).unwrap();
		assert_eq!(e.block_type, BlockType::File as u8);
	}

	#[test]
	fn allocate_inode_increases_monotonically_within_block() {
		let (device, geometry, ptr, blk) = setup(4096);
		let map = SpaceMap::new(&device, geometry, ptr, blk);
		let i1 = map.allocate_inode().unwrap();
		let i2 = map.allocate_inode().unwrap();
		assert_eq!(i2, i1 + 1);
	}

	#[test]
	fn allocate_dir_item_then_exhaust() {
		let (device, geometry, ptr, blk) = setup(4096);
		let map = SpaceMap::new(&device, geometry, ptr, blk);
		let dir_block = map.allocate_whole_block(BlockType::Dir).unwrap();
		let items = geometry.items_per_dir_block - 1;
		let mut last = 0;
		for _ in 0..items {
			last = map.allocate_dir_item(dir_block).unwrap();
			assert_ne!(last, 0);
		}
		assert_eq!(map.allocate_dir_item(dir_block).unwrap(), 0);
		assert_eq!(last, (dir_block + 1) * geometry.items_per_dir_block - 1);
	}

	#[test]
	fn allocate_whole_block_enospc_returns_zero() {
		let (device, geometry, ptr, blk) = setup(4096);
		let map = SpaceMap::new(&device, geometry, ptr, blk);
		let per_block = geometry.entries_per_spacemap_block;
		for _ in 0..per_block {
			assert_ne!(map.allocate_whole_block(BlockType::File).unwrap(), 0);
		}
		assert_eq!(map.allocate_whole_block(BlockType::File).unwrap(), 0);
	}
}
