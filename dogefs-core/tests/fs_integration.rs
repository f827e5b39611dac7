//! End-to-end scenarios driven through the `Filesystem` API against a
//! `tempfile`-backed image, without a real FUSE mount (§8).

use dogefs_core::device::Device;
use dogefs_core::error::Error;
use dogefs_core::format::format;
use dogefs_core::layout::{mode, HOST_ROOT_INO};
use dogefs_core::Filesystem;

const SIXTEEN_MIB: u64 = 16 * 1024 * 1024;

fn formatted_image(size: u64) -> Filesystem {
	let file = tempfile::tempfile().unwrap();
	file.set_len(size).unwrap();
	let device = Device::new(file);
	format(&device, size).unwrap();
	Filesystem::open(device.into_file()).unwrap()
}

#[test]
fn format_reports_expected_geometry() {
	let fs = formatted_image(SIXTEEN_MIB);
	let sb = fs.super_block();
	assert_eq!(sb.block_size, 4096);
	assert_eq!(sb.block_count, 4096);
	assert_eq!(sb.ptr_space_map, 1);
	assert_eq!(sb.blk_space_map, 2);
	assert_eq!(sb.ptr_journal, 3840);
	assert_eq!(sb.blk_journal, 256);
}

#[test]
fn root_directory_starts_with_dot_and_dotdot_only() {
	let fs = formatted_image(SIXTEEN_MIB);
	let stat = fs.getattr(HOST_ROOT_INO).unwrap();
	assert_eq!(stat.mode, mode::S_IFDIR | 0o755);
	assert_eq!(stat.nlink, 2);
	assert_eq!(stat.size, 4096);

	let entries = fs.readdir(HOST_ROOT_INO, 0, 100).unwrap();
	let names: Vec<&[u8]> = entries.iter().map(|e| e.name.as_slice()).collect();
	assert_eq!(names, vec![b".".as_slice(), b"..".as_slice()]);
}

#[test]
fn create_then_lookup_then_small_write_stays_inline() {
	let fs = formatted_image(SIXTEEN_MIB);
	let created = fs.create(HOST_ROOT_INO, b"hello", 0o644).unwrap();
	assert_eq!(created.mode & mode::S_IFMT, mode::S_IFREG);

	let looked_up = fs.lookup(HOST_ROOT_INO, b"hello").unwrap();
	assert_eq!(looked_up.ino, created.ino);

	let empty = fs.read(created.ino, 0, 64).unwrap();
	assert!(empty.is_empty());

	let written = fs.write(created.ino, 0, b"hi").unwrap();
	assert_eq!(written, 2);
	assert_eq!(fs.read(created.ino, 0, 2).unwrap(), b"hi");
	assert_eq!(fs.getattr(created.ino).unwrap().size, 2);
}

#[test]
fn write_past_inline_boundary_promotes_to_external_block() {
	let fs = formatted_image(SIXTEEN_MIB);
	let created = fs.create(HOST_ROOT_INO, b"big", 0o644).unwrap();

	fs.write(created.ino, 0, &[b'A'; 64]).unwrap();
	fs.write(created.ino, 64, b"B").unwrap();

	let stat = fs.getattr(created.ino).unwrap();
	assert_eq!(stat.size, 65);

	let mut expected = vec![b'A'; 64];
	expected.push(b'B');
	assert_eq!(fs.read(created.ino, 0, 65).unwrap(), expected);
}

#[test]
fn sparse_write_reads_back_zero_filled_hole() {
	let fs = formatted_image(SIXTEEN_MIB);
	let created = fs.create(HOST_ROOT_INO, b"sparse", 0o644).unwrap();

	fs.write(created.ino, 8192, b"z").unwrap();
	let stat = fs.getattr(created.ino).unwrap();
	assert_eq!(stat.size, 8193);

	let data = fs.read(created.ino, 0, 8193).unwrap();
	assert_eq!(data.len(), 8193);
	assert!(data[..8192].iter().all(|&b| b == 0));
	assert_eq!(data[8192], b'z');
}

#[test]
fn mkdir_then_readdir_then_unlink() {
	let fs = formatted_image(SIXTEEN_MIB);
	fs.mkdir(HOST_ROOT_INO, b"sub", 0o755).unwrap();

	let entries = fs.readdir(HOST_ROOT_INO, 0, 100).unwrap();
	assert!(entries.iter().any(|e| e.name == b"sub"));

	let sub = fs.lookup(HOST_ROOT_INO, b"sub").unwrap();
	let sub_entries = fs.readdir(sub.ino, 0, 100).unwrap();
	let names: Vec<&[u8]> = sub_entries.iter().map(|e| e.name.as_slice()).collect();
	assert_eq!(names, vec![b".".as_slice(), b"..".as_slice()]);

	fs.unlink(HOST_ROOT_INO, b"sub").unwrap();

	let err = fs.lookup(HOST_ROOT_INO, b"sub").unwrap_err();
	assert!(matches!(err, Error::NotFound));
}

#[test]
fn rmdir_refuses_non_empty_directory() {
	let fs = formatted_image(SIXTEEN_MIB);
	fs.mkdir(HOST_ROOT_INO, b"sub", 0o755).unwrap();
	let sub = fs.lookup(HOST_ROOT_INO, b"sub").unwrap();
	fs.create(sub.ino, b"child", 0o644).unwrap();

	let err = fs.rmdir(HOST_ROOT_INO, b"sub").unwrap_err();
	assert!(matches!(err, Error::NotEmpty));
}

#[test]
fn directory_runs_out_of_space_without_corrupting_earlier_entries() {
	let fs = formatted_image(SIXTEEN_MIB);
	let geometry = fs.geometry();
	let capacity = geometry.items_per_dir_block - 2;

	for i in 0..capacity {
		fs.create(HOST_ROOT_INO, format!("f{i}").as_bytes(), 0o644).unwrap();
	}
	let err = fs.create(HOST_ROOT_INO, b"overflow", 0o644).unwrap_err();
	assert!(matches!(err, Error::NoSpace));

	assert!(fs.lookup(HOST_ROOT_INO, b"f0").is_ok());
}
