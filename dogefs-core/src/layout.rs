//! On-disk struct layout (§3). Every struct here is packed, fixed-size
//! and little-endian; a `to_bytes`/`from_bytes` pair moves it to and
//! from a disk-sized buffer, the same `BlockGroupDescriptor::read`/`write`
//! pattern of treating a fixed-size struct as a flat byte range at a
//! known disk offset.

/// Value stored in [`SuperBlock::magic`] for a valid DogeFS device.
pub const SUPER_BLOCK_MAGIC: u64 = 6_000_595_048_440_531_660;
/// Value stored in [`DirItem::magic`] for a live directory slot.
pub const DIR_ITEM_MAGIC: u64 = 2_322_280_074_159_983_117;
/// Value stored in [`JournalItem::magic`]; the journal region is otherwise untouched.
pub const JOURNAL_ITEM_MAGIC: u64 = 2_322_287_779_482_569_229;

/// Inode number reserved to mean "no inode" / sparse hole.
pub const NULL_INODE: u64 = 0;
/// The host interface's fixed root identifier, remapped to `SuperBlock::ptr_root_inode`.
pub const HOST_ROOT_INO: u64 = 1;

pub const SUPER_BLOCK_SIZE: usize = 512;
pub const SPACE_MAP_ENTRY_SIZE: usize = 2;
pub const INODE_SIZE: usize = 128;
pub const DIR_ITEM_SIZE: usize = 64;
pub const JOURNAL_ITEM_SIZE: usize = 32;

/// Number of direct block pointers held inline in an inode.
pub const DIRECT_POINTERS: usize = 4;
/// Maximum length, in bytes, of a directory entry name.
pub const MAX_FILENAME: usize = 32;
/// Size of the inline-content union member of an inode.
pub const INLINE_CONTENTS: usize = 64;

/// Classification of a single device block, stored in its space-map entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum BlockType {
	Bad = 0x00,
	Index = 0x11,
	Inode = 0x22,
	Super = 0x33,
	Dir = 0x44,
	Unused = 0x55,
	File = 0x66,
	Journal = 0x77,
	Special = 0xCC,
}

impl BlockType {
	pub fn from_u8(v: u8) -> Option<Self> {
		Some(match v {
			0x00 => Self::Bad,
			0x11 => Self::Index,
			0x22 => Self::Inode,
			0x33 => Self::Super,
			0x44 => Self::Dir,
			0x55 => Self::Unused,
			0x66 => Self::File,
			0x77 => Self::Journal,
			0xCC => Self::Special,
			_ => return None,
		})
	}
}

/// File-type bits within [`Inode::mode`] (the `S_IFMT` mask and its members).
pub mod mode {
	pub const S_IFMT: u32 = 0o170000;
	pub const S_IFDIR: u32 = 0o040000;
	pub const S_IFREG: u32 = 0o100000;
	pub const S_IFCHR: u32 = 0o020000;
	pub const S_IFBLK: u32 = 0o060000;
	pub const S_ISUID: u32 = 0o004000;
	pub const S_ISGID: u32 = 0o002000;
}

/// The filesystem's primary metadata block, replicated every 256 blocks (§3).
#[derive(Debug, Clone)]
pub struct SuperBlock {
	pub boot_jump: [u8; 16],
	pub magic: u64,
	pub version: (u16, u16),
	pub dirty_level: u32,
	pub block_size: u64,
	pub block_count: u64,
	pub ptr_space_map: u64,
	pub blk_space_map: u64,
	pub ptr_journal: u64,
	pub blk_journal: u64,
	pub ptr_label_directory: u64,
	pub ptr_root_inode: u64,
	pub boot_code: [u8; 416],
}

impl SuperBlock {
	pub fn to_bytes(&self) -> [u8; SUPER_BLOCK_SIZE] {
		let mut buf = [0u8; SUPER_BLOCK_SIZE];
		buf[0..16].copy_from_slice(&self.boot_jump);
		buf[16..24].copy_from_slice(&self.magic.to_le_bytes());
		buf[24..26].copy_from_slice(&self.version.0.to_le_bytes());
		buf[26..28].copy_from_slice(&self.version.1.to_le_bytes());
		buf[28..32].copy_from_slice(&self.dirty_level.to_le_bytes());
		buf[32..40].copy_from_slice(&self.block_size.to_le_bytes());
		buf[40..48].copy_from_slice(&self.block_count.to_le_bytes());
		buf[48..56].copy_from_slice(&self.ptr_space_map.to_le_bytes());
		buf[56..64].copy_from_slice(&self.blk_space_map.to_le_bytes());
		buf[64..72].copy_from_slice(&self.ptr_journal.to_le_bytes());
		buf[72..80].copy_from_slice(&self.blk_journal.to_le_bytes());
		buf[80..88].copy_from_slice(&self.ptr_label_directory.to_le_bytes());
		buf[88..96].copy_from_slice(&self.ptr_root_inode.to_le_bytes());
		buf[96..512].copy_from_slice(&self.boot_code);
		buf
	}

	pub fn from_bytes(buf: &[u8]) -> Self {
		let mut boot_jump = [0u8; 16];
		boot_jump.copy_from_slice(&buf[0..16]);
		let mut boot_code = [0u8; 416];
		boot_code.copy_from_slice(&buf[96..512]);
		Self {
			boot_jump,
			magic: u64::from_le_bytes(buf[16..24].try_into().unwrap()),
			version: (
				u16::from_le_bytes(buf[24..26].try_into().unwrap()),
				u16::from_le_bytes(buf[26..28].try_into().unwrap()),
			),
			dirty_level: u32::from_le_bytes(buf[28..32].try_into().unwrap()),
			block_size: u64::from_le_bytes(buf[32..40].try_into().unwrap()),
			block_count: u64::from_le_bytes(buf[40..48].try_into().unwrap()),
			ptr_space_map: u64::from_le_bytes(buf[48..56].try_into().unwrap()),
			blk_space_map: u64::from_le_bytes(buf[56..64].try_into().unwrap()),
			ptr_journal: u64::from_le_bytes(buf[64..72].try_into().unwrap()),
			blk_journal: u64::from_le_bytes(buf[72..80].try_into().unwrap()),
			ptr_label_directory: u64::from_le_bytes(buf[80..88].try_into().unwrap()),
			ptr_root_inode: u64::from_le_bytes(buf[88..96].try_into().unwrap()),
			boot_code,
		}
	}
}

/// A single space-map entry: the classification of one device block (§3).
#[derive(Debug, Clone, Copy)]
pub struct SpaceMapEntry {
	pub block_type: u8,
	pub items_left: u8,
}

impl SpaceMapEntry {
	pub const SIZE: usize = SPACE_MAP_ENTRY_SIZE;

	pub fn to_bytes(self) -> [u8; Self::SIZE] {
		[self.block_type, self.items_left]
	}

	pub fn from_bytes(buf: &[u8]) -> Self {
		Self {
			block_type: buf[0],
			items_left: buf[1],
		}
	}
}

/// A 128-byte inode record (§3).
///
/// The two C unions (`size`/`devMajor+devMinor`, and `contents`/the
/// direct+indirect pointer table) have no safe stable-Rust equivalent, so
/// they're stored as plain byte arrays (`size_or_dev`, `data`) with typed
/// accessors below — see DESIGN.md.
#[derive(Debug, Clone)]
pub struct Inode {
	pub mode: u32,
	pub nlink: u64,
	pub uid: u32,
	pub gid: u32,
	size_or_dev: [u8; 8],
	pub sec_create: i64,
	pub nsec_create: i32,
	pub sec_modify: i64,
	pub nsec_modify: i32,
	pub sec_change: i64,
	pub nsec_change: i32,
	data: [u8; INLINE_CONTENTS],
}

impl Inode {
	pub const SIZE: usize = INODE_SIZE;

	pub fn zeroed() -> Self {
		Self {
			mode: 0,
			nlink: 0,
			uid: 0,
			gid: 0,
			size_or_dev: [0; 8],
			sec_create: 0,
			nsec_create: 0,
			sec_modify: 0,
			nsec_modify: 0,
			sec_change: 0,
			nsec_change: 0,
			data: [0; INLINE_CONTENTS],
		}
	}

	pub fn file_type(&self) -> u32 {
		self.mode & mode::S_IFMT
	}

	pub fn is_dir(&self) -> bool {
		self.file_type() == mode::S_IFDIR
	}

	pub fn is_device(&self) -> bool {
		matches!(self.file_type(), mode::S_IFCHR | mode::S_IFBLK)
	}

	pub fn size(&self) -> u64 {
		u64::from_le_bytes(self.size_or_dev)
	}

	pub fn set_size(&mut self, size: u64) {
		self.size_or_dev = size.to_le_bytes();
	}

	pub fn dev_major(&self) -> u32 {
		u32::from_le_bytes(self.size_or_dev[0..4].try_into().unwrap())
	}

	pub fn dev_minor(&self) -> u32 {
		u32::from_le_bytes(self.size_or_dev[4..8].try_into().unwrap())
	}

	pub fn set_dev(&mut self, major: u32, minor: u32) {
		self.size_or_dev[0..4].copy_from_slice(&major.to_le_bytes());
		self.size_or_dev[4..8].copy_from_slice(&minor.to_le_bytes());
	}

	pub fn contents(&self) -> &[u8; INLINE_CONTENTS] {
		&self.data
	}

	pub fn contents_mut(&mut self) -> &mut [u8; INLINE_CONTENTS] {
		&mut self.data
	}

	pub fn ptr_direct(&self, i: usize) -> u64 {
		assert!(i < DIRECT_POINTERS);
		u64::from_le_bytes(self.data[i * 8..i * 8 + 8].try_into().unwrap())
	}

	pub fn set_ptr_direct(&mut self, i: usize, block: u64) {
		assert!(i < DIRECT_POINTERS);
		self.data[i * 8..i * 8 + 8].copy_from_slice(&block.to_le_bytes());
	}

	fn ptr_indirect_at(&self, byte_off: usize) -> u64 {
		u64::from_le_bytes(self.data[byte_off..byte_off + 8].try_into().unwrap())
	}

	fn set_ptr_indirect_at(&mut self, byte_off: usize, block: u64) {
		self.data[byte_off..byte_off + 8].copy_from_slice(&block.to_le_bytes());
	}

	pub fn ptr_indirect1(&self) -> u64 {
		self.ptr_indirect_at(32)
	}

	pub fn set_ptr_indirect1(&mut self, block: u64) {
		self.set_ptr_indirect_at(32, block)
	}

	pub fn ptr_indirect2(&self) -> u64 {
		self.ptr_indirect_at(40)
	}

	pub fn ptr_indirect3(&self) -> u64 {
		self.ptr_indirect_at(48)
	}

	pub fn ptr_indirect4(&self) -> u64 {
		self.ptr_indirect_at(56)
	}

	pub fn to_bytes(&self) -> [u8; Self::SIZE] {
		let mut buf = [0u8; Self::SIZE];
		buf[0..4].copy_from_slice(&self.mode.to_le_bytes());
		buf[4..12].copy_from_slice(&self.nlink.to_le_bytes());
		buf[12..16].copy_from_slice(&self.uid.to_le_bytes());
		buf[16..20].copy_from_slice(&self.gid.to_le_bytes());
		buf[20..28].copy_from_slice(&self.size_or_dev);
		buf[28..36].copy_from_slice(&self.sec_create.to_le_bytes());
		buf[36..40].copy_from_slice(&self.nsec_create.to_le_bytes());
		buf[40..48].copy_from_slice(&self.sec_modify.to_le_bytes());
		buf[48..52].copy_from_slice(&self.nsec_modify.to_le_bytes());
		buf[52..60].copy_from_slice(&self.sec_change.to_le_bytes());
		buf[60..64].copy_from_slice(&self.nsec_change.to_le_bytes());
		buf[64..128].copy_from_slice(&self.data);
		buf
	}

	pub fn from_bytes(buf: &[u8]) -> Self {
		let mut size_or_dev = [0u8; 8];
		size_or_dev.copy_from_slice(&buf[20..28]);
		let mut data = [0u8; INLINE_CONTENTS];
		data.copy_from_slice(&buf[64..128]);
		Self {
			mode: u32::from_le_bytes(buf[0..4].try_into().unwrap()),
			nlink: u64::from_le_bytes(buf[4..12].try_into().unwrap()),
			uid: u32::from_le_bytes(buf[12..16].try_into().unwrap()),
			gid: u32::from_le_bytes(buf[16..20].try_into().unwrap()),
			size_or_dev,
			sec_create: i64::from_le_bytes(buf[28..36].try_into().unwrap()),
			nsec_create: i32::from_le_bytes(buf[36..40].try_into().unwrap()),
			sec_modify: i64::from_le_bytes(buf[40..48].try_into().unwrap()),
			nsec_modify: i32::from_le_bytes(buf[48..52].try_into().unwrap()),
			sec_change: i64::from_le_bytes(buf[52..60].try_into().unwrap()),
			nsec_change: i32::from_le_bytes(buf[60..64].try_into().unwrap()),
			data,
		}
	}
}

/// A 64-byte directory entry slot (§3). Live iff `magic == DIR_ITEM_MAGIC`.
#[derive(Debug, Clone)]
pub struct DirItem {
	pub magic: u64,
	pub filename: [u8; MAX_FILENAME],
	pub inode: u64,
	pub hash: u64,
	pub next_chunk: u64,
}

impl DirItem {
	pub const SIZE: usize = DIR_ITEM_SIZE;

	pub fn live(&self) -> bool {
		self.magic == DIR_ITEM_MAGIC
	}

	pub fn tombstoned() -> Self {
		Self {
			magic: 0,
			filename: [0; MAX_FILENAME],
			inode: 0,
			hash: 0,
			next_chunk: 0,
		}
	}

	/// Builds a live entry, truncating `name` to [`MAX_FILENAME`] bytes.
	pub fn new(name: &[u8], inode: u64) -> Self {
		let mut filename = [0u8; MAX_FILENAME];
		let len = name.len().min(MAX_FILENAME);
		filename[..len].copy_from_slice(&name[..len]);
		Self {
			magic: DIR_ITEM_MAGIC,
			filename,
			inode,
			hash: 0,
			next_chunk: 0,
		}
	}

	/// Returns the name with trailing NUL padding stripped.
	pub fn name(&self) -> &[u8] {
		let end = self
			.filename
			.iter()
			.position(|&b| b == 0)
			.unwrap_or(MAX_FILENAME);
		&self.filename[..end]
	}

	pub fn to_bytes(&self) -> [u8; Self::SIZE] {
		let mut buf = [0u8; Self::SIZE];
		buf[0..8].copy_from_slice(&self.magic.to_le_bytes());
		buf[8..40].copy_from_slice(&self.filename);
		buf[40..48].copy_from_slice(&self.inode.to_le_bytes());
		buf[48..56].copy_from_slice(&self.hash.to_le_bytes());
		buf[56..64].copy_from_slice(&self.next_chunk.to_le_bytes());
		buf
	}

	pub fn from_bytes(buf: &[u8]) -> Self {
		let mut filename = [0u8; MAX_FILENAME];
		filename.copy_from_slice(&buf[8..40]);
		Self {
			magic: u64::from_le_bytes(buf[0..8].try_into().unwrap()),
			filename,
			inode: u64::from_le_bytes(buf[40..48].try_into().unwrap()),
			hash: u64::from_le_bytes(buf[48..56].try_into().unwrap()),
			next_chunk: u64::from_le_bytes(buf[56..64].try_into().unwrap()),
		}
	}
}

/// A reserved, currently-unwritten write-ahead log record (§3, §9).
#[derive(Debug, Clone, Copy)]
pub struct JournalItem {
	pub magic: u64,
	pub trans_id: u64,
	pub order: u64,
	pub ptr_block: u64,
}

impl JournalItem {
	pub const SIZE: usize = JOURNAL_ITEM_SIZE;

	pub fn to_bytes(self) -> [u8; Self::SIZE] {
		let mut buf = [0u8; Self::SIZE];
		buf[0..8].copy_from_slice(&self.magic.to_le_bytes());
		buf[8..16].copy_from_slice(&self.trans_id.to_le_bytes());
		buf[16..24].copy_from_slice(&self.order.to_le_bytes());
		buf[24..32].copy_from_slice(&self.ptr_block.to_le_bytes());
		buf
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn struct_sizes() {
		assert_eq!(SUPER_BLOCK_SIZE, 512);
		assert_eq!(SpaceMapEntry::SIZE, 2);
		assert_eq!(Inode::SIZE, 128);
		assert_eq!(DirItem::SIZE, 64);
		assert_eq!(JournalItem::SIZE, 32);
	}

	#[test]
	fn superblock_round_trip() {
		let sb = SuperBlock {
			boot_jump: [0xAB; 16],
			magic: SUPER_BLOCK_MAGIC,
			version: (1, 0),
			dirty_level: 0,
			block_size: 4096,
			block_count: 4096,
			ptr_space_map: 1,
			blk_space_map: 2,
			ptr_journal: 3840,
			blk_journal: 256,
			ptr_label_directory: 0,
			ptr_root_inode: 192,
			boot_code: [0xCD; 416],
		};
		let bytes = sb.to_bytes();
		assert_eq!(bytes.len(), SUPER_BLOCK_SIZE);
		let back = SuperBlock::from_bytes(&bytes);
		assert_eq!(back.magic, sb.magic);
		assert_eq!(back.version, sb.version);
		assert_eq!(back.block_size, sb.block_size);
		assert_eq!(back.ptr_root_inode, sb.ptr_root_inode);
	}

	#[test]
	fn inode_union_accessors() {
		let mut ino = Inode::zeroed();
		ino.set_size(65);
		assert_eq!(ino.size(), 65);
		ino.set_ptr_direct(0, 7);
		ino.set_ptr_direct(3, 9);
		assert_eq!(ino.ptr_direct(0), 7);
		assert_eq!(ino.ptr_direct(3), 9);
		let bytes = ino.to_bytes();
		let back = Inode::from_bytes(&bytes);
		assert_eq!(back.size(), 65);
		assert_eq!(back.ptr_direct(0), 7);
		assert_eq!(back.ptr_direct(3), 9);
	}

	#[test]
	fn dir_item_name_roundtrip() {
		let item = DirItem::new(b"hello", 42);
		assert!(item.live());
		assert_eq!(item.name(), b"hello");
		let bytes = item.to_bytes();
		let back = DirItem::from_bytes(&bytes);
		assert_eq!(back.name(), b"hello");
		assert_eq!(back.inode, 42);
	}

	#[test]
	fn dir_item_full_length_name_not_nul_terminated() {
		let name = [b'x'; MAX_FILENAME];
		let item = DirItem::new(&name, 1);
		assert_eq!(item.name(), &name[..]);
	}
}
