//! Directory block scanning and mutation (§4.6).

use log::debug;

use crate::device::Device;
use crate::error::{Error, Result};
use crate::geometry::Geometry;
use crate::layout::{mode, DirItem, Inode};

fn read_dir_block(device: &Device, geometry: &Geometry, block: u64) -> Result<Vec<DirItem>> {
	let mut buf = vec![0u8; geometry.block_size as usize];
	device.read_at(geometry.block_offset(block), &mut buf)?;
	Ok((0..geometry.items_per_dir_block)
		.map(|j| {
			let off = (j as usize) * DirItem::SIZE;
			DirItem::from_bytes(&buf[off..off + DirItem::SIZE])
		})
		.collect())
}

fn write_dir_block(device: &Device, geometry: &Geometry, block: u64, items: &[DirItem]) -> Result<()> {
	let mut buf = vec![0u8; geometry.block_size as usize];
	for (j, item) in items.iter().enumerate() {
		let off = j * DirItem::SIZE;
		buf[off..off + DirItem::SIZE].copy_from_slice(&item.to_bytes());
	}
	device.write_at(geometry.block_offset(block), &buf)
}

pub fn require_dir(inode: &Inode) -> Result<()> {
	if !inode.is_dir() {
		return Err(Error::NotDir);
	}
	Ok(())
}

/// Scans `parent`'s directory block for a live entry named `name`.
/// Returns the matching slot index and its `DirItem`.
pub fn find_entry(
	device: &Device,
	geometry: &Geometry,
	parent: &Inode,
	name: &[u8],
) -> Result<Option<(usize, DirItem)>> {
	require_dir(parent)?;
	let items = read_dir_block(device, geometry, parent.ptr_direct(0))?;
	let trimmed = &name[..name.len().min(crate::layout::MAX_FILENAME)];
	Ok(items
		.into_iter()
		.enumerate()
		.find(|(_, item)| item.live() && item.name() == trimmed))
}

/// Every live entry in on-disk slot order, numbered by position among live
/// entries (§4.6 Readdir).
pub fn list_entries(device: &Device, geometry: &Geometry, dir: &Inode) -> Result<Vec<(u64, DirItem)>> {
	require_dir(dir)?;
	let items = read_dir_block(device, geometry, dir.ptr_direct(0))?;
	Ok(items
		.into_iter()
		.filter(|item| item.live())
		.enumerate()
		.map(|(i, item)| (i as u64, item))
		.collect())
}

/// Writes a new live entry into the first free (non-live) slot of `block`,
/// at the id handed back by the space map.
pub fn insert_entry(
	device: &Device,
	geometry: &Geometry,
	block: u64,
	id: u64,
	item: DirItem,
) -> Result<()> {
	let slot = id % geometry.items_per_dir_block;
	let mut items = read_dir_block(device, geometry, block)?;
	items[slot as usize] = item;
	write_dir_block(device, geometry, block, &items)?;
	debug!("insert_entry(block {block}, slot {slot})");
	Ok(())
}

/// Tombstones the first live entry matching `name` and returns the removed item.
pub fn remove_entry(
	device: &Device,
	geometry: &Geometry,
	dir: &Inode,
	name: &[u8],
) -> Result<DirItem> {
	require_dir(dir)?;
	let block = dir.ptr_direct(0);
	let mut items = read_dir_block(device, geometry, block)?;
	let trimmed = &name[..name.len().min(crate::layout::MAX_FILENAME)];
	let slot = items
		.iter()
		.position(|item| item.live() && item.name() == trimmed)
		.ok_or(Error::NotFound)?;
	let removed = items[slot].clone();
	items[slot] = DirItem::tombstoned();
	write_dir_block(device, geometry, block, &items)?;
	debug!("remove_entry(block {block}, slot {slot})");
	Ok(removed)
}

/// A newly allocated directory's own block: "." and ".." pre-populated,
/// everything else tombstoned.
pub fn new_directory_block(self_ino: u64, parent_ino: u64) -> Vec<DirItem> {
	vec![DirItem::new(b".", self_ino), DirItem::new(b"..", parent_ino)]
}

pub fn write_new_directory_block(
	device: &Device,
	geometry: &Geometry,
	block: u64,
	self_ino: u64,
	parent_ino: u64,
) -> Result<()> {
	let mut items = new_directory_block(self_ino, parent_ino);
	items.resize(geometry.items_per_dir_block as usize, DirItem::tombstoned());
	write_dir_block(device, geometry, block, &items)
}

/// An empty directory has exactly "." and ".." live (§9 rmdir fix).
pub fn is_empty_directory(device: &Device, geometry: &Geometry, dir: &Inode) -> Result<bool> {
	Ok(list_entries(device, geometry, dir)?.len() <= 2)
}

pub fn regular_mode(mode_bits: u32) -> u32 {
	mode::S_IFREG | (mode_bits & 0o7777)
}

pub fn directory_mode(mode_bits: u32) -> u32 {
	mode::S_IFDIR | (mode_bits & 0o7777)
}
