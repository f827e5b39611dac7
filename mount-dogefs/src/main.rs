//! `mount.dogefs DEVICE MOUNTPOINT` — mounts a DogeFS device via FUSE (§4.11).

mod adapter;

use std::fs::OpenOptions;
use std::process::ExitCode;

use clap::Parser;
use dogefs_core::Filesystem;
use log::{error, info};

use adapter::Adapter;

#[derive(Parser)]
#[command(name = "mount.dogefs", about = "FUSE adapter that mounts a DogeFS device")]
struct Args {
	/// Path to the backing device or image file
	device: String,
	/// Directory to mount the filesystem at
	mountpoint: String,
}

fn main() -> ExitCode {
	env_logger::init();
	let args = Args::parse();

	let file = match OpenOptions::new().read(true).write(true).open(&args.device) {
		Ok(f) => f,
		Err(e) => {
			error!("failed to open {}: {e}", args.device);
			return ExitCode::FAILURE;
		}
	};
	let fs = match Filesystem::open(file) {
		Ok(fs) => fs,
		Err(e) => {
			error!("{}: {e}", args.device);
			return ExitCode::FAILURE;
		}
	};
	let super_block = fs.super_block().clone();
	info!(
		"device size: {:.1} MiB ({} blocks)",
		(super_block.block_count * super_block.block_size) as f64 / 1_048_576.0,
		super_block.block_count
	);

	let options = vec![fuser::MountOption::FSName("dogefs".to_string())];
	match fuser::mount2(Adapter::new(fs), &args.mountpoint, &options) {
		Ok(()) => ExitCode::SUCCESS,
		Err(e) => {
			error!("mount failed: {e}");
			ExitCode::FAILURE
		}
	}
}
