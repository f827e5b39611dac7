//! The `mkdogefs` formatter: lays down a blank filesystem on an opened
//! device (§4.8).

use log::info;

use crate::device::Device;
use crate::dir;
use crate::error::{Error, Result};
use crate::geometry::Geometry;
use crate::layout::{
	mode, BlockType, Inode, JournalItem, SpaceMapEntry, SuperBlock, DIR_ITEM_SIZE, INODE_SIZE,
	SUPER_BLOCK_MAGIC,
};

pub const DEFAULT_BLOCK_SIZE: u64 = 4096;
pub const DEFAULT_MINIMUM_BLOCKS: u64 = 4096;
pub const DEFAULT_JOURNAL_BLOCKS: u64 = 256;

const BOOT_JUMP: [u8; 16] = [
	0xe9, 0x83, 0x00, 0xcc, 0xcc, 0xcc, 0xcc, 0xcc, 0xcc, 0xcc, 0xcc, 0xcc, 0xcc, 0xcc, 0xcc, 0xcc,
];

const BOOT_CODE: [u8; 64] = [
	0x45, 0x72, 0x72, 0x6f, 0x72, 0x3a, 0x20, 0x54, 0x68, 0x69, 0x73, 0x20, 0x64, 0x65, 0x76, 0x69,
	0x63, 0x65, 0x20, 0x69, 0x73, 0x20, 0x6e, 0x6f, 0x74, 0x20, 0x62, 0x6f, 0x6f, 0x74, 0x61, 0x62,
	0x6c, 0x65, 0x2e, 0x0d, 0x0a, 0x00, 0x31, 0xc0, 0x8e, 0xd8, 0xbe, 0x60, 0x7c, 0xac, 0x08, 0xc0,
	0x74, 0x06, 0xb4, 0x0e, 0xcd, 0x10, 0xeb, 0xf5, 0xf4, 0xeb, 0xfd, 0xcc, 0xcc, 0xcc, 0xcc, 0xcc,
];

fn ceil_div(a: u64, b: u64) -> u64 {
	(a + b - 1) / b
}

/// Formats `device_size_bytes` worth of device with a blank filesystem and
/// returns the superblock written to it.
pub fn format(device: &Device, device_size_bytes: u64) -> Result<SuperBlock> {
	let block_size = DEFAULT_BLOCK_SIZE;
	let block_count = device_size_bytes / block_size;
	info!(
		"device size: {:.1} MiB ({block_count} blocks)",
		device_size_bytes as f64 / 1_048_576.0
	);
	if block_count < DEFAULT_MINIMUM_BLOCKS {
		return Err(Error::Invalid);
	}

	let blk_space_map = ceil_div(block_count, block_size / SpaceMapEntry::SIZE as u64);
	let ptr_space_map = 1u64;
	let ptr_journal = block_count - DEFAULT_JOURNAL_BLOCKS;
	let blk_journal = DEFAULT_JOURNAL_BLOCKS;

	// §9: inode numbers use a single portable policy, byte-offset/sizeof(Inode),
	// regardless of whatever divisor a directory block happens to use.
	let ptr_root_inode_block = ptr_space_map + blk_space_map;
	let ptr_root_dir_block = ptr_root_inode_block + 1;
	let inodes_per_inode_block = block_size / INODE_SIZE as u64;
	let items_per_dir_block = block_size / DIR_ITEM_SIZE as u64;
	let ptr_root_inode = ptr_root_inode_block * inodes_per_inode_block;

	let mut super_block = SuperBlock {
		boot_jump: BOOT_JUMP,
		magic: SUPER_BLOCK_MAGIC,
		version: (1, 0),
		dirty_level: 0,
		block_size,
		block_count,
		ptr_space_map,
		blk_space_map,
		ptr_journal,
		blk_journal,
		ptr_label_directory: 0,
		ptr_root_inode,
		boot_code: [0u8; 416],
	};
	super_block.boot_code[..BOOT_CODE.len()].copy_from_slice(&BOOT_CODE);

	info!("writing superblocks every 256 blocks up to the journal");
	let bytes = super_block.to_bytes();
	let mut i = 0u64;
	while i < super_block.ptr_journal {
		device.write_at(i * block_size, &bytes)?;
		i += 256;
	}

	info!("writing {} space map block(s)", blk_space_map);
	let geometry = Geometry::new(&super_block);
	for i in 0..blk_space_map {
		let mut entries = vec![0u8; block_size as usize];
		for j in 0..geometry.entries_per_spacemap_block {
			let target_block = i * geometry.entries_per_spacemap_block + j;
			let entry = if target_block >= block_count {
				SpaceMapEntry {
					block_type: BlockType::Bad as u8,
					items_left: BlockType::Bad as u8,
				}
			} else if target_block >= ptr_space_map && target_block < ptr_space_map + blk_space_map {
				SpaceMapEntry {
					block_type: BlockType::Special as u8,
					items_left: BlockType::Special as u8,
				}
			} else if target_block >= ptr_journal {
				SpaceMapEntry {
					block_type: BlockType::Journal as u8,
					items_left: BlockType::Journal as u8,
				}
			} else if target_block == ptr_root_inode_block {
				SpaceMapEntry {
					block_type: BlockType::Inode as u8,
					items_left: (inodes_per_inode_block - 1).min(255) as u8,
				}
			} else if target_block == ptr_root_dir_block {
				SpaceMapEntry {
					block_type: BlockType::Dir as u8,
					items_left: (items_per_dir_block - 2).min(255) as u8,
				}
			} else if target_block % 256 == 0 {
				SpaceMapEntry {
					block_type: BlockType::Super as u8,
					items_left: BlockType::Super as u8,
				}
			} else {
				SpaceMapEntry {
					block_type: BlockType::Unused as u8,
					items_left: BlockType::Unused as u8,
				}
			};
			let off = (j as usize) * SpaceMapEntry::SIZE;
			entries[off..off + SpaceMapEntry::SIZE].copy_from_slice(&entry.to_bytes());
		}
		device.write_at(geometry.block_offset(ptr_space_map + i), &entries)?;
	}

	info!("writing root inode");
	let mut root_inode = Inode::zeroed();
	root_inode.mode = mode::S_IFDIR | 0o755;
	root_inode.nlink = 2;
	root_inode.set_size(block_size);
	root_inode.set_ptr_direct(0, ptr_root_dir_block);
	device.write_at(geometry.inode_offset(ptr_root_inode), &root_inode.to_bytes())?;

	info!("writing root directory");
	dir::write_new_directory_block(device, &geometry, ptr_root_dir_block, ptr_root_inode, ptr_root_inode)?;

	info!("zero-filling {} journal blocks", blk_journal);
	let zero_journal = JournalItem {
		magic: 0,
		trans_id: 0,
		order: 0,
		ptr_block: 0,
	}
	.to_bytes();
	let mut journal_block = vec![0u8; block_size as usize];
	for chunk in journal_block.chunks_exact_mut(JournalItem::SIZE) {
		chunk.copy_from_slice(&zero_journal);
	}
	for i in ptr_journal..ptr_journal + blk_journal {
		device.write_at(geometry.block_offset(i), &journal_block)?;
	}

	device.flush()?;
	Ok(super_block)
}
