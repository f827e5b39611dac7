//! File content I/O: inline storage and direct/indirect block iteration (§4.7).

use log::debug;

use crate::device::Device;
use crate::error::Result;
use crate::geometry::Geometry;
use crate::inode::InodeTable;
use crate::layout::{BlockType, Inode, INLINE_CONTENTS};
use crate::spacemap::SpaceMap;

fn ceil_div(a: u64, b: u64) -> u64 {
	(a + b - 1) / b
}

/// Reads up to `size` bytes starting at `off`, clamped to `inode.size`.
pub fn read(
	device: &Device,
	geometry: &Geometry,
	inode_table: &InodeTable,
	inode: &Inode,
	off: u64,
	size: u64,
) -> Result<Vec<u8>> {
	if off >= inode.size() {
		return Ok(Vec::new());
	}
	let size = size.min(inode.size() - off);
	if inode.size() <= INLINE_CONTENTS as u64 {
		let start = off as usize;
		let end = start + size as usize;
		return Ok(inode.contents()[start..end].to_vec());
	}
	let bs = geometry.block_size;
	let begin_block = off / bs;
	let end_block = ceil_div(off + size, bs);
	let mut out = Vec::with_capacity(size as usize);
	for k in begin_block..end_block {
		let begin_byte = off.max(k * bs);
		let end_byte = (off + size).min((k + 1) * bs);
		let index = inode_table.get_index_for_read(inode, k)?;
		if index != 0 {
			let mut chunk = vec![0u8; (end_byte - begin_byte) as usize];
			device.read_at(index * bs + (begin_byte - k * bs), &mut chunk)?;
			out.extend_from_slice(&chunk);
		} else {
			debug!("sparse read at block [{k}]");
			out.resize(out.len() + (end_byte - begin_byte) as usize, 0);
		}
	}
	Ok(out)
}

/// Writes `buf` at `off`, growing `inode.size` and materializing storage as
/// needed, including the one-way inline-to-external transition. Mutates
/// `inode` in place; the caller persists it.
pub fn write(
	device: &Device,
	geometry: &Geometry,
	inode_table: &InodeTable,
	space_map: &SpaceMap,
	inode: &mut Inode,
	off: u64,
	buf: &[u8],
) -> Result<u64> {
	let old_size = inode.size();
	let size = buf.len() as u64;
	if off + size > old_size {
		inode.set_size(off + size);
	}
	let new_size = inode.size();

	if old_size <= INLINE_CONTENTS as u64 && new_size > INLINE_CONTENTS as u64 {
		let block = space_map.allocate_whole_block(BlockType::File)?;
		if block == 0 {
			return Err(crate::error::Error::NoSpace);
		}
		let inline = *inode.contents();
		device.write_at(geometry.block_offset(block), &inline[..old_size as usize])?;
		debug!("inline contents promoted to external block {block:#x}");
		inode.set_ptr_direct(0, block);
	}

	if new_size <= INLINE_CONTENTS as u64 {
		let start = off as usize;
		inode.contents_mut()[start..start + size as usize].copy_from_slice(&buf[..size as usize]);
	} else {
		let bs = geometry.block_size;
		let begin_block = off / bs;
		let end_block = ceil_div(off + size, bs);
		let mut written = 0u64;
		for k in begin_block..end_block {
			let index = inode_table.get_index_for_write(space_map, inode, k)?;
			if index == 0 {
				return Err(crate::error::Error::NoSpace);
			}
			let begin_byte = off.max(k * bs);
			let end_byte = (off + size).min((k + 1) * bs);
			let chunk = &buf[written as usize..(written + (end_byte - begin_byte)) as usize];
			device.write_at(index * bs + (begin_byte - k * bs), chunk)?;
			written += end_byte - begin_byte;
		}
	}
	Ok(size)
}
