//! `mkdogefs DEVICE` — formats a blank DogeFS filesystem (§4.11).

use std::fs::OpenOptions;
use std::process::ExitCode;

use clap::Parser;
use dogefs_core::device::Device;
use log::error;

#[derive(Parser)]
#[command(name = "mkdogefs", about = "Creates a blank DogeFS filesystem on a device")]
struct Args {
	/// Path to the backing device or image file
	device: String,
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
	let size = match file.metadata() {
		Ok(m) => m.len(),
		Err(e) => {
			error!("failed to stat {}: {e}", args.device);
			return ExitCode::FAILURE;
		}
	};

	let device = Device::new(file);
	match dogefs_core::format::format(&device, size) {
		Ok(super_block) => {
			println!(
				"Device size: {:.1} MiB ({} blocks)",
				size as f64 / 1_048_576.0,
				super_block.block_count
			);
			println!("Done!");
			ExitCode::SUCCESS
		}
		Err(e) => {
			error!("format failed: {e}");
			ExitCode::FAILURE
		}
	}
}
