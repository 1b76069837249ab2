//! Binary entry point: parses argv, opens the disk image, and dispatches
//! to [`fatmod::cli`].
//!
//! Exit codes follow spec.md §6: 1 only when the backing store cannot be
//! opened or its boot sector cannot be parsed; 0 for every other outcome,
//! including invalid arguments and every operational error, each of
//! which has already printed its message by the time `main` sees it.

use std::fs::OpenOptions;
use std::process::ExitCode;

use fatmod::cli;
use fatmod::device::FileDevice;
use fatmod::volume::Volume;
use fatmod::FatModError;

fn main() -> ExitCode {
    env_logger::init();

    let args: Vec<String> = std::env::args().skip(1).collect();

    if cli::is_help(&args) {
        println!("{}", cli::help_text());
        return ExitCode::SUCCESS;
    }

    if args.is_empty() {
        println!("{}", cli::INVALID_ARGS);
        return ExitCode::SUCCESS;
    }

    let disk_path = &args[0];
    let op_args = &args[1..];

    let file = match OpenOptions::new().read(true).write(true).open(disk_path) {
        Ok(f) => f,
        Err(source) => {
            let err = FatModError::IoOpen {
                path: disk_path.into(),
                source,
            };
            eprintln!("{}", err);
            return ExitCode::FAILURE;
        }
    };

    let device = FileDevice::new(file, fatmod::DEFAULT_SECTOR_SIZE as usize);
    let mut volume = match Volume::open(device) {
        Ok(v) => v,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = cli::dispatch(op_args, &mut volume) {
        println!("{}", e);
    }

    ExitCode::SUCCESS
}
