//! Inode record I/O and logical-to-physical block index resolution (§4.4, §4.5).

use log::debug;

use crate::device::Device;
use crate::error::Result;
use crate::geometry::Geometry;
use crate::layout::{BlockType, Inode, DIRECT_POINTERS};
use crate::spacemap::SpaceMap;

pub struct InodeTable<'a> {
	device: &'a Device,
	geometry: Geometry,
}

impl<'a> InodeTable<'a> {
	pub fn new(device: &'a Device, geometry: Geometry) -> Self {
		Self { device, geometry }
	}

	pub fn read(&self, ino: u64) -> Result<Inode> {
		let mut buf = [0u8; Inode::SIZE];
		self.device.read_at(self.geometry.inode_offset(ino), &mut buf)?;
		Ok(Inode::from_bytes(&buf))
	}

	pub fn write(&self, ino: u64, inode: &Inode) -> Result<()> {
		self.device
			.write_at(self.geometry.inode_offset(ino), &inode.to_bytes())
	}

	fn read_index_block(&self, block: u64) -> Result<Vec<u64>> {
		let mut buf = vec![0u8; self.geometry.block_size as usize];
		self.device.read_at(self.geometry.block_offset(block), &mut buf)?;
		Ok(buf
			.chunks_exact(8)
			.map(|c| u64::from_le_bytes(c.try_into().unwrap()))
			.collect())
	}

	fn write_index_block(&self, block: u64, slots: &[u64]) -> Result<()> {
		let mut buf = vec![0u8; self.geometry.block_size as usize];
		for (i, v) in slots.iter().enumerate() {
			buf[i * 8..i * 8 + 8].copy_from_slice(&v.to_le_bytes());
		}
		self.device.write_at(self.geometry.block_offset(block), &buf)
	}

	/// Returns the device block backing logical block `k`, or 0 for a sparse hole.
	/// Higher indirection levels (2/3/4) are not implemented (§9) and resolve to 0.
	pub fn get_index_for_read(&self, inode: &Inode, k: u64) -> Result<u64> {
		if k < DIRECT_POINTERS as u64 {
			return Ok(inode.ptr_direct(k as usize));
		}
		if k < DIRECT_POINTERS as u64 + self.geometry.indices_per_index_block {
			if inode.ptr_indirect1() == 0 {
				return Ok(0);
			}
			let index = self.read_index_block(inode.ptr_indirect1())?;
			return Ok(index[(k - DIRECT_POINTERS as u64) as usize]);
		}
		Ok(0)
	}

	/// Like [`Self::get_index_for_read`] but materializes direct/index/data
	/// blocks on demand, mutating `inode` in place. Returns 0 on ENOSPC or
	/// if `k` exceeds the addressable range (single-indirect only).
	pub fn get_index_for_write(
		&self,
		space_map: &SpaceMap,
		inode: &mut Inode,
		k: u64,
	) -> Result<u64> {
		if k < DIRECT_POINTERS as u64 {
			let slot = k as usize;
			if inode.ptr_direct(slot) == 0 {
				let block = space_map.allocate_whole_block(BlockType::File)?;
				if block == 0 {
					return Ok(0);
				}
				self.device.zero_at(self.geometry.block_offset(block), self.geometry.block_size)?;
				debug!("allocate data block [{k}] at {block:#x}");
				inode.set_ptr_direct(slot, block);
			}
			return Ok(inode.ptr_direct(slot));
		}
		if k < DIRECT_POINTERS as u64 + self.geometry.indices_per_index_block {
			if inode.ptr_indirect1() == 0 {
				let block = space_map.allocate_whole_block(BlockType::Index)?;
				if block == 0 {
					return Ok(0);
				}
				self.device.zero_at(self.geometry.block_offset(block), self.geometry.block_size)?;
				debug!("allocate index block [1] at {block:#x}");
				inode.set_ptr_indirect1(block);
			}
			let mut index = self.read_index_block(inode.ptr_indirect1())?;
			let slot = (k - DIRECT_POINTERS as u64) as usize;
			if index[slot] == 0 {
				let block = space_map.allocate_whole_block(BlockType::File)?;
				if block == 0 {
					return Ok(0);
				}
				self.device.zero_at(self.geometry.block_offset(block), self.geometry.block_size)?;
				debug!("allocate data block [{k}] at {block:#x}");
				index[slot] = block;
				self.write_index_block(inode.ptr_indirect1(), &index)?;
			}
			return Ok(index[slot]);
		}
		debug!("block [{k}] exceeds addressable range, limits exceeded");
		Ok(0)
	}
}
