//! Argument dispatch.
//!
//! The grammar is fixed and small enough that a declarative parser buys
//! nothing: `fatmod -h`, or `fatmod <DISK> -l|-c NAME|-w NAME OFFSET
//! LENGTH BYTE|-r -b|-a NAME|-d NAME`. Any other shape prints the single
//! fixed message and exits 0, not 2 as a conventional CLI would — this
//! is an observed contract of the program being modeled, not an
//! oversight, so it is preserved rather than "fixed".

use std::io::{self, Write as _};

use log::{debug, warn};

use crate::device::BlockDevice;
use crate::error::{FatModError, Result};
use crate::volume::{ListEntry, Volume};

const HELP_TEXT: &str = "\
fatmod <DISK> -l
fatmod <DISK> -c NAME
fatmod <DISK> -w NAME OFFSET LENGTH BYTE
fatmod <DISK> -r -b|-a NAME
fatmod <DISK> -d NAME
fatmod -h";

pub const INVALID_ARGS: &str = "Invalid arguments. Please enter -h for help";

/// True if `args` (the full `argv[1..]`) asks for help, in which case
/// `main` prints [`HELP_TEXT`] without ever opening a disk image.
pub fn is_help(args: &[String]) -> bool {
    args.len() == 1 && args[0] == "-h"
}

pub fn help_text() -> &'static str {
    HELP_TEXT
}

/// Parses and runs the operation named by `op_args` (`argv[2..]`, the
/// part of the command line after the disk path) against `volume`.
/// Every outcome, success or error, is printed here; the caller only
/// needs to know whether to map the error to a nonzero exit code.
pub fn dispatch<D: BlockDevice>(op_args: &[String], volume: &mut Volume<D>) -> Result<()> {
    match op_args {
        [flag] if flag == "-l" => cmd_list(volume),
        [flag, name] if flag == "-c" => cmd_create(volume, name),
        [flag, name, offset, length, byte] if flag == "-w" => {
            cmd_write(volume, name, offset, length, byte)
        }
        [flag, mode, name] if flag == "-r" && (mode == "-b" || mode == "-a") => {
            cmd_read(volume, name, mode == "-b")
        }
        [flag, name] if flag == "-d" => cmd_delete(volume, name),
        _ => Err(FatModError::InvalidArguments),
    }
}

fn cmd_list<D: BlockDevice>(volume: &mut Volume<D>) -> Result<()> {
    let entries = volume.list()?;
    for entry in entries {
        match entry {
            ListEntry::File { name, size } => println!("{} {}", name, size),
            ListEntry::VolumeLabel { name } => println!("Volume label: {}", name),
            ListEntry::Unsupported { name, kind } => {
                warn!("unsupported entry kind ({}): {}", kind, name);
                println!("WARNING: unsupported entry kind ({}): {}", kind, name);
            }
        }
    }
    debug!("listed directory");
    Ok(())
}

fn cmd_create<D: BlockDevice>(volume: &mut Volume<D>, name: &str) -> Result<()> {
    volume.create(name)?;
    println!("File created successfully!");
    Ok(())
}

fn cmd_write<D: BlockDevice>(
    volume: &mut Volume<D>,
    name: &str,
    offset: &str,
    length: &str,
    byte: &str,
) -> Result<()> {
    let offset: u32 = offset
        .parse()
        .map_err(|_| FatModError::InvalidArguments)?;
    let length: usize = length
        .parse()
        .map_err(|_| FatModError::InvalidArguments)?;
    let byte: u8 = byte.parse().map_err(|_| FatModError::InvalidArguments)?;
    let data = vec![byte; length];
    volume.write(name, offset, &data)?;
    println!("Bytes written to the file successfully!");
    Ok(())
}

fn cmd_read<D: BlockDevice>(volume: &mut Volume<D>, name: &str, binary: bool) -> Result<()> {
    let data = volume.read(name)?;
    if binary {
        print!("{}", hex_dump(&data));
    } else {
        io::stdout().write_all(&data)?;
    }
    println!("Succesfully read!");
    Ok(())
}

fn cmd_delete<D: BlockDevice>(volume: &mut Volume<D>, name: &str) -> Result<()> {
    volume.delete(name)?;
    println!("File deleted successfully!");
    Ok(())
}

/// One line per 16 bytes: an 8-digit uppercase hex offset, then each
/// byte as a space-separated 2-digit uppercase hex pair.
fn hex_dump(data: &[u8]) -> String {
    let mut out = String::new();
    for (i, chunk) in data.chunks(16).enumerate() {
        let offset = i * 16;
        let hex: Vec<String> = chunk.iter().map(|b| format!("{:02X}", b)).collect();
        out.push_str(&format!("{:08X} {}\n", offset, hex.join(" ")));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_dump_formats_offset_and_bytes() {
        assert_eq!(hex_dump(&[0xDE, 0xAD, 0xBE, 0xEF]), "00000000 DE AD BE EF\n");
    }

    #[test]
    fn hex_dump_wraps_at_sixteen_bytes_per_line() {
        let data: Vec<u8> = (0..20).collect();
        let dumped = hex_dump(&data);
        let lines: Vec<&str> = dumped.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("00000000 "));
        assert!(lines[1].starts_with("00000010 "));
    }
}
